use serde::{Deserialize, Serialize};

use crate::geometry::Rect;

/// The four constituent zones of a pivot table. A pivot only blocks a target
/// area when every zone individually overlaps it; a filter area that merely
/// abuts the target does not count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PivotZones {
    pub table_range1: Rect,
    pub table_range2: Rect,
    pub page_area: Rect,
    pub data_body: Rect,
}

impl PivotZones {
    pub fn zones(&self) -> [Rect; 4] {
        [self.table_range1, self.table_range2, self.page_area, self.data_body]
    }

    /// Bounding box of all four zones.
    pub fn bounds(&self) -> Rect {
        let z = self.zones();
        z[1..].iter().fold(z[0], |acc, r| acc.union(r))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum OccupantShape {
    Table(Rect),
    PivotTable(PivotZones),
    Chart(Rect),
}

/// A grid object occupying space on a sheet, as reported by the host for one
/// refresh call. The sync engine never owns these.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Occupant {
    /// Host identity, used to exclude an object from colliding with itself.
    pub tag: String,
    pub shape: OccupantShape,
}

impl Occupant {
    pub fn bounds(&self) -> Rect {
        match &self.shape {
            OccupantShape::Table(r) | OccupantShape::Chart(r) => *r,
            OccupantShape::PivotTable(z) => z.bounds(),
        }
    }
}
