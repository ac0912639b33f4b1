pub mod geometry;
pub mod occupant;
pub mod value;

pub use geometry::{GridLimits, Rect, SheetId};
pub use occupant::{Occupant, OccupantShape, PivotZones};
pub use value::CellValue;
