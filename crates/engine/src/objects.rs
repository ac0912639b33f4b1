use serde::{Deserialize, Serialize};

use gridlink_core::{Occupant, OccupantShape, PivotZones, Rect, SheetId};

/// A bound table object: a rectangular range with optional header and totals
/// rows, named columns, and a connect/disconnect state toward its data source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TableObject {
    pub name: String,
    pub sheet: SheetId,
    pub range: Rect,
    pub header_row: bool,
    pub totals_row: bool,
    pub columns: Vec<String>,
    pub connected: bool,
}

impl TableObject {
    pub fn new(name: &str, sheet: SheetId, range: Rect, header_row: bool) -> Self {
        let columns = (0..range.cols).map(default_column_name).collect();
        Self {
            name: name.to_string(),
            sheet,
            range,
            header_row,
            totals_row: false,
            columns,
            connected: false,
        }
    }

    /// The data sub-rectangle: the range minus header and totals rows.
    pub fn data_body(&self) -> Rect {
        let header = self.header_row as usize;
        let totals = self.totals_row as usize;
        let rows = self.range.rows.saturating_sub(header + totals);
        Rect::new(self.sheet, self.range.top + header, self.range.left, rows, self.range.cols)
    }

    /// Resize to a new range, keeping column labels where they still fit and
    /// padding with default-generated names.
    pub fn resize(&mut self, range: Rect) {
        self.range = range;
        if self.columns.len() > range.cols {
            self.columns.truncate(range.cols);
        } else {
            for i in self.columns.len()..range.cols {
                self.columns.push(default_column_name(i));
            }
        }
    }

    pub fn occupant(&self) -> Occupant {
        Occupant { tag: self.name.clone(), shape: OccupantShape::Table(self.range) }
    }
}

/// Positional fallback name for column `index` (0-based).
pub fn default_column_name(index: usize) -> String {
    format!("Column{}", index + 1)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PivotObject {
    pub name: String,
    pub sheet: SheetId,
    pub zones: PivotZones,
}

impl PivotObject {
    pub fn occupant(&self) -> Occupant {
        Occupant { tag: self.name.clone(), shape: OccupantShape::PivotTable(self.zones) }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartObject {
    pub name: String,
    pub sheet: SheetId,
    pub bounds: Rect,
}

impl ChartObject {
    pub fn occupant(&self) -> Occupant {
        Occupant { tag: self.name.clone(), shape: OccupantShape::Chart(self.bounds) }
    }
}
