use gridlink_core::{CellValue, GridLimits, Occupant, Rect, SheetId};
use gridlink_engine::document::Document;
use gridlink_engine::objects::TableObject;

/// Snapshot of a bound table object as the host reports it.
#[derive(Debug, Clone, PartialEq)]
pub struct TableRef {
    pub name: String,
    pub sheet: SheetId,
    pub range: Rect,
    pub header_row: bool,
    pub totals_row: bool,
    pub connected: bool,
}

impl TableRef {
    fn from_object(t: &TableObject) -> Self {
        Self {
            name: t.name.clone(),
            sheet: t.sheet,
            range: t.range,
            header_row: t.header_row,
            totals_row: t.totals_row,
            connected: t.connected,
        }
    }
}

/// Capability port over the host grid.
///
/// The sync engine sees sheets, ranges and bound objects only through this
/// trait; an adapter implements it over the real host object model.
/// Implementations degrade instead of panicking: operations on unknown
/// sheets or objects are no-ops that return `false` or `None`.
pub trait GridHost {
    fn limits(&self) -> GridLimits;

    /// Stable document identity, created on first use.
    fn document_id(&mut self) -> String;
    fn document_name(&self) -> String;

    // -- global flags; callers save and restore around scoped operations --
    fn screen_refresh(&self) -> bool;
    fn set_screen_refresh(&mut self, on: bool);
    fn change_events(&self) -> bool;
    fn set_change_events(&mut self, on: bool);

    // -- sheets --
    fn sheet_id(&self, name: &str) -> Option<SheetId>;
    /// `None` when the host cannot create a scratch sheet at all.
    fn add_scratch_sheet(&mut self, hidden: bool) -> Option<SheetId>;
    fn raise_sheet_visibility(&mut self, sheet: SheetId);
    fn remove_sheet(&mut self, sheet: SheetId) -> bool;
    fn activate_sheet(&mut self, sheet: SheetId);

    // -- cells --
    fn value(&self, sheet: SheetId, row: usize, col: usize) -> CellValue;
    fn set_value(&mut self, sheet: SheetId, row: usize, col: usize, value: CellValue);
    /// Write a row-position formula: the cell shows `row + 1 + offset`.
    fn set_row_formula(&mut self, sheet: SheetId, row: usize, col: usize, offset: i64);
    fn clear_range(&mut self, area: &Rect);
    /// Reset formatting inside `area` to the default import formatting.
    fn reset_formats(&mut self, area: &Rect);

    // -- geometry queries --
    /// Row indices inside `area` not hidden by filters/grouping, in order.
    fn visible_rows(&self, area: &Rect) -> Vec<usize>;
    /// Minimal rect bounding all non-empty cells inside `area`.
    fn non_empty_bounds(&self, area: &Rect) -> Option<Rect>;
    /// True when column `col` (0-based within `area`) holds any value.
    fn column_has_values(&self, area: &Rect, col: usize) -> bool;
    fn insert_rows(&mut self, sheet: SheetId, at_row: usize, count: usize);
    fn insert_cols(&mut self, sheet: SheetId, at_col: usize, count: usize);

    // -- bound objects --
    /// Objects occupying space on the sheet, in host-enumeration order.
    fn occupants(&self, sheet: SheetId) -> Vec<Occupant>;
    fn find_table(&self, sheet_name: &str, object_name: &str) -> Option<TableRef>;
    fn table(&self, object_name: &str) -> Option<TableRef>;
    fn create_table(&mut self, sheet: SheetId, name: &str, range: Rect, header_row: bool) -> bool;
    fn resize_table(&mut self, object_name: &str, range: Rect) -> bool;
    fn set_table_connected(&mut self, object_name: &str, on: bool) -> bool;
    /// Rename one output column; writes the header cell when there is one.
    fn rename_table_column(&mut self, object_name: &str, index: usize, label: &str) -> bool;
}

impl GridHost for Document {
    fn limits(&self) -> GridLimits {
        Document::limits(self)
    }

    fn document_id(&mut self) -> String {
        self.ensure_id().to_string()
    }

    fn document_name(&self) -> String {
        self.name.clone()
    }

    fn screen_refresh(&self) -> bool {
        Document::screen_refresh(self)
    }

    fn set_screen_refresh(&mut self, on: bool) {
        Document::set_screen_refresh(self, on);
    }

    fn change_events(&self) -> bool {
        Document::change_events(self)
    }

    fn set_change_events(&mut self, on: bool) {
        Document::set_change_events(self, on);
    }

    fn sheet_id(&self, name: &str) -> Option<SheetId> {
        self.sheet_by_name(name).map(|s| s.id)
    }

    fn add_scratch_sheet(&mut self, hidden: bool) -> Option<SheetId> {
        Some(Document::add_scratch_sheet(self, hidden))
    }

    fn raise_sheet_visibility(&mut self, sheet: SheetId) {
        Document::raise_sheet_visibility(self, sheet);
    }

    fn remove_sheet(&mut self, sheet: SheetId) -> bool {
        self.delete_sheet(sheet)
    }

    fn activate_sheet(&mut self, sheet: SheetId) {
        Document::activate_sheet(self, sheet);
    }

    fn value(&self, sheet: SheetId, row: usize, col: usize) -> CellValue {
        self.sheet_by_id(sheet).map(|s| s.value(row, col)).unwrap_or(CellValue::Empty)
    }

    fn set_value(&mut self, sheet: SheetId, row: usize, col: usize, value: CellValue) {
        if let Some(s) = self.sheet_by_id_mut(sheet) {
            s.set_value(row, col, value);
        }
    }

    fn set_row_formula(&mut self, sheet: SheetId, row: usize, col: usize, offset: i64) {
        if let Some(s) = self.sheet_by_id_mut(sheet) {
            s.set_row_formula(row, col, offset);
        }
    }

    fn clear_range(&mut self, area: &Rect) {
        if let Some(s) = self.sheet_by_id_mut(area.sheet) {
            s.clear_area(area.top, area.left, area.rows, area.cols);
        }
    }

    fn reset_formats(&mut self, area: &Rect) {
        if let Some(s) = self.sheet_by_id_mut(area.sheet) {
            s.reset_formats(area.top, area.left, area.rows, area.cols);
        }
    }

    fn visible_rows(&self, area: &Rect) -> Vec<usize> {
        self.sheet_by_id(area.sheet)
            .map(|s| s.visible_rows(area.top, area.rows))
            .unwrap_or_default()
    }

    fn non_empty_bounds(&self, area: &Rect) -> Option<Rect> {
        self.sheet_by_id(area.sheet)?
            .non_empty_bounds(area.top, area.left, area.rows, area.cols)
    }

    fn column_has_values(&self, area: &Rect, col: usize) -> bool {
        self.sheet_by_id(area.sheet)
            .map(|s| s.column_has_values(area.top, area.rows, area.left + col))
            .unwrap_or(false)
    }

    fn insert_rows(&mut self, sheet: SheetId, at_row: usize, count: usize) {
        Document::insert_rows(self, sheet, at_row, count);
    }

    fn insert_cols(&mut self, sheet: SheetId, at_col: usize, count: usize) {
        Document::insert_cols(self, sheet, at_col, count);
    }

    fn occupants(&self, sheet: SheetId) -> Vec<Occupant> {
        Document::occupants(self, sheet)
    }

    fn find_table(&self, sheet_name: &str, object_name: &str) -> Option<TableRef> {
        Document::find_table(self, sheet_name, object_name).map(TableRef::from_object)
    }

    fn table(&self, object_name: &str) -> Option<TableRef> {
        Document::table(self, object_name).map(TableRef::from_object)
    }

    fn create_table(&mut self, sheet: SheetId, name: &str, range: Rect, header_row: bool) -> bool {
        self.add_table(TableObject::new(name, sheet, range, header_row))
    }

    fn resize_table(&mut self, object_name: &str, range: Rect) -> bool {
        Document::resize_table(self, object_name, range)
    }

    fn set_table_connected(&mut self, object_name: &str, on: bool) -> bool {
        Document::set_table_connected(self, object_name, on)
    }

    fn rename_table_column(&mut self, object_name: &str, index: usize, label: &str) -> bool {
        self.set_table_column_label(object_name, index, label)
    }
}
