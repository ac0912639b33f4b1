use serde::{Deserialize, Serialize};

use gridlink_core::{GridLimits, Occupant, Rect, SheetId};

use crate::objects::{ChartObject, PivotObject, TableObject};
use crate::sheet::{is_valid_sheet_name, normalize_sheet_name, Sheet, SheetVisibility};

/// A document containing multiple sheets and the grid objects bound to them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub name: String,
    /// Stable identity, created lazily and persisted with the document so
    /// bindings can find their way back after reopen.
    id: Option<String>,
    limits: GridLimits,
    sheets: Vec<Sheet>,
    active_sheet: usize,
    /// Next ID to assign to a new sheet. Monotonically increasing, never reused.
    next_sheet_id: u64,
    tables: Vec<TableObject>,
    pivots: Vec<PivotObject>,
    charts: Vec<ChartObject>,
    /// Screen updating flag. Bulk operations disable it and must restore it.
    #[serde(skip, default = "default_flag")]
    screen_refresh: bool,
    /// Change-notification flag. Disabled during a rebind window so the
    /// rebind cannot trigger itself recursively.
    #[serde(skip, default = "default_flag")]
    change_events: bool,
}

fn default_flag() -> bool {
    true
}

impl Document {
    pub fn new(name: &str, limits: GridLimits) -> Self {
        let sheet = Sheet::new_with_name(SheetId(1), limits.max_rows, limits.max_cols, "Sheet1");
        Self {
            name: name.to_string(),
            id: None,
            limits,
            sheets: vec![sheet],
            active_sheet: 0,
            next_sheet_id: 2,
            tables: Vec::new(),
            pivots: Vec::new(),
            charts: Vec::new(),
            screen_refresh: true,
            change_events: true,
        }
    }

    pub fn limits(&self) -> GridLimits {
        self.limits
    }

    /// Document identity, created on first use. Stable across save/reopen.
    pub fn ensure_id(&mut self) -> &str {
        if self.id.is_none() {
            self.id = Some(uuid::Uuid::new_v4().to_string());
        }
        self.id.as_deref().unwrap()
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    fn generate_sheet_id(&mut self) -> SheetId {
        let id = SheetId(self.next_sheet_id);
        self.next_sheet_id += 1;
        id
    }

    // =========================================================================
    // Sheets
    // =========================================================================

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    pub fn sheets(&self) -> &[Sheet] {
        &self.sheets
    }

    pub fn sheet_by_id(&self, id: SheetId) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.id == id)
    }

    pub fn sheet_by_id_mut(&mut self, id: SheetId) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|s| s.id == id)
    }

    pub fn sheet_by_name(&self, name: &str) -> Option<&Sheet> {
        let key = normalize_sheet_name(name);
        self.sheets.iter().find(|s| s.name_key == key)
    }

    pub fn sheet_name_exists(&self, name: &str) -> bool {
        self.sheet_by_name(name).is_some()
    }

    pub fn active_sheet_id(&self) -> SheetId {
        self.sheets[self.active_sheet].id
    }

    pub fn activate_sheet(&mut self, id: SheetId) -> bool {
        if let Some(idx) = self.sheets.iter().position(|s| s.id == id) {
            self.active_sheet = idx;
            true
        } else {
            false
        }
    }

    /// Add a new sheet with a specific name.
    /// Returns None if the name is invalid or already exists.
    pub fn add_sheet_named(&mut self, name: &str) -> Option<SheetId> {
        if !is_valid_sheet_name(name) || self.sheet_name_exists(name) {
            return None;
        }
        let id = self.generate_sheet_id();
        let sheet = Sheet::new_with_name(id, self.limits.max_rows, self.limits.max_cols, name);
        self.sheets.push(sheet);
        self.active_sheet = self.sheets.len() - 1;
        Some(id)
    }

    /// Add a scratch sheet with a generated collision-free name.
    ///
    /// Hidden scratch sheets are created most-hidden so users cannot stumble
    /// into them mid-build; callers raise visibility before deleting.
    pub fn add_scratch_sheet(&mut self, hidden: bool) -> SheetId {
        let mut n = 1usize;
        let mut name = format!("Staging{n}");
        while self.sheet_name_exists(&name) {
            n += 1;
            name = format!("Staging{n}");
        }
        let id = self.generate_sheet_id();
        let mut sheet = Sheet::new_with_name(id, self.limits.max_rows, self.limits.max_cols, &name);
        if hidden {
            sheet.visibility = SheetVisibility::VeryHidden;
        }
        self.sheets.push(sheet);
        if !hidden {
            // Visible scratch takes focus; hidden scratch never does.
            self.active_sheet = self.sheets.len() - 1;
        }
        id
    }

    pub fn raise_sheet_visibility(&mut self, id: SheetId) {
        if let Some(sheet) = self.sheet_by_id_mut(id) {
            sheet.visibility = sheet.visibility.raised();
        }
    }

    /// Delete a sheet. Refused for the last remaining sheet and for sheets in
    /// the most-hidden state.
    pub fn delete_sheet(&mut self, id: SheetId) -> bool {
        if self.sheets.len() <= 1 {
            return false;
        }
        let Some(idx) = self.sheets.iter().position(|s| s.id == id) else {
            return false;
        };
        if self.sheets[idx].visibility.is_most_hidden() {
            return false;
        }
        self.sheets.remove(idx);
        self.tables.retain(|t| t.sheet != id);
        self.pivots.retain(|p| p.sheet != id);
        self.charts.retain(|c| c.sheet != id);
        if self.active_sheet >= self.sheets.len() {
            self.active_sheet = self.sheets.len() - 1;
        } else if self.active_sheet > idx {
            self.active_sheet -= 1;
        }
        true
    }

    pub fn rename_sheet(&mut self, id: SheetId, new_name: &str) -> bool {
        if !is_valid_sheet_name(new_name) {
            return false;
        }
        let key = normalize_sheet_name(new_name);
        if self.sheets.iter().any(|s| s.id != id && s.name_key == key) {
            return false;
        }
        if let Some(sheet) = self.sheet_by_id_mut(id) {
            sheet.set_name(new_name);
            true
        } else {
            false
        }
    }

    // =========================================================================
    // Structural edits (cells and objects shift together)
    // =========================================================================

    /// Insert rows, shifting cells and any grid objects at/below the
    /// insertion point down. Objects straddling the insertion point grow.
    pub fn insert_rows(&mut self, id: SheetId, at_row: usize, count: usize) {
        if let Some(sheet) = self.sheet_by_id_mut(id) {
            sheet.insert_rows(at_row, count);
        } else {
            return;
        }
        for t in self.tables.iter_mut().filter(|t| t.sheet == id) {
            shift_rows(&mut t.range, at_row, count);
        }
        for p in self.pivots.iter_mut().filter(|p| p.sheet == id) {
            shift_rows(&mut p.zones.table_range1, at_row, count);
            shift_rows(&mut p.zones.table_range2, at_row, count);
            shift_rows(&mut p.zones.page_area, at_row, count);
            shift_rows(&mut p.zones.data_body, at_row, count);
        }
        for c in self.charts.iter_mut().filter(|c| c.sheet == id) {
            shift_rows(&mut c.bounds, at_row, count);
        }
    }

    /// Insert columns, shifting cells and any grid objects at/right of the
    /// insertion point right. Objects straddling the insertion point grow.
    pub fn insert_cols(&mut self, id: SheetId, at_col: usize, count: usize) {
        if let Some(sheet) = self.sheet_by_id_mut(id) {
            sheet.insert_cols(at_col, count);
        } else {
            return;
        }
        for t in self.tables.iter_mut().filter(|t| t.sheet == id) {
            shift_cols(&mut t.range, at_col, count);
        }
        for p in self.pivots.iter_mut().filter(|p| p.sheet == id) {
            shift_cols(&mut p.zones.table_range1, at_col, count);
            shift_cols(&mut p.zones.table_range2, at_col, count);
            shift_cols(&mut p.zones.page_area, at_col, count);
            shift_cols(&mut p.zones.data_body, at_col, count);
        }
        for c in self.charts.iter_mut().filter(|c| c.sheet == id) {
            shift_cols(&mut c.bounds, at_col, count);
        }
    }

    // =========================================================================
    // Grid objects
    // =========================================================================

    /// All objects occupying space on a sheet, in enumeration order:
    /// tables, then pivot tables, then charts.
    pub fn occupants(&self, id: SheetId) -> Vec<Occupant> {
        let mut out = Vec::new();
        out.extend(self.tables.iter().filter(|t| t.sheet == id).map(|t| t.occupant()));
        out.extend(self.pivots.iter().filter(|p| p.sheet == id).map(|p| p.occupant()));
        out.extend(self.charts.iter().filter(|c| c.sheet == id).map(|c| c.occupant()));
        out
    }

    fn object_name_taken(&self, name: &str) -> bool {
        self.tables.iter().any(|t| t.name.eq_ignore_ascii_case(name))
            || self.pivots.iter().any(|p| p.name.eq_ignore_ascii_case(name))
            || self.charts.iter().any(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Returns false when the name is already taken or the sheet is unknown.
    pub fn add_table(&mut self, table: TableObject) -> bool {
        if self.object_name_taken(&table.name) || self.sheet_by_id(table.sheet).is_none() {
            return false;
        }
        self.tables.push(table);
        true
    }

    pub fn add_pivot(&mut self, pivot: PivotObject) -> bool {
        if self.object_name_taken(&pivot.name) || self.sheet_by_id(pivot.sheet).is_none() {
            return false;
        }
        self.pivots.push(pivot);
        true
    }

    pub fn add_chart(&mut self, chart: ChartObject) -> bool {
        if self.object_name_taken(&chart.name) || self.sheet_by_id(chart.sheet).is_none() {
            return false;
        }
        self.charts.push(chart);
        true
    }

    pub fn table(&self, name: &str) -> Option<&TableObject> {
        self.tables.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    pub fn table_mut(&mut self, name: &str) -> Option<&mut TableObject> {
        self.tables.iter_mut().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Locate a bound table by sheet name + object name, the way a binding
    /// finds its live counterpart after reopen.
    pub fn find_table(&self, sheet_name: &str, object_name: &str) -> Option<&TableObject> {
        let sheet = self.sheet_by_name(sheet_name)?;
        self.tables
            .iter()
            .find(|t| t.sheet == sheet.id && t.name.eq_ignore_ascii_case(object_name))
    }

    pub fn remove_table(&mut self, name: &str) -> bool {
        let before = self.tables.len();
        self.tables.retain(|t| !t.name.eq_ignore_ascii_case(name));
        self.tables.len() != before
    }

    /// Resize a table's range, padding/truncating its column labels.
    pub fn resize_table(&mut self, name: &str, range: Rect) -> bool {
        match self.table_mut(name) {
            Some(t) => {
                t.resize(range);
                true
            }
            None => false,
        }
    }

    /// Set one column label, writing the header cell as well when the table
    /// carries a header row.
    pub fn set_table_column_label(&mut self, name: &str, index: usize, label: &str) -> bool {
        let Some(t) = self.table_mut(name) else { return false };
        if index >= t.columns.len() {
            return false;
        }
        t.columns[index] = label.to_string();
        let (sheet, header_row, top, left) = (t.sheet, t.header_row, t.range.top, t.range.left);
        if header_row {
            if let Some(s) = self.sheet_by_id_mut(sheet) {
                s.set_value(top, left + index, gridlink_core::CellValue::Text(label.to_string()));
            }
        }
        true
    }

    pub fn set_table_connected(&mut self, name: &str, connected: bool) -> bool {
        match self.table_mut(name) {
            Some(t) => {
                t.connected = connected;
                true
            }
            None => false,
        }
    }

    // =========================================================================
    // Global flags
    // =========================================================================

    pub fn screen_refresh(&self) -> bool {
        self.screen_refresh
    }

    pub fn set_screen_refresh(&mut self, on: bool) {
        self.screen_refresh = on;
    }

    pub fn change_events(&self) -> bool {
        self.change_events
    }

    pub fn set_change_events(&mut self, on: bool) {
        self.change_events = on;
    }
}

fn shift_rows(rect: &mut Rect, at_row: usize, count: usize) {
    if at_row <= rect.top {
        rect.top += count;
    } else if at_row < rect.top + rect.rows {
        rect.rows += count;
    }
}

fn shift_cols(rect: &mut Rect, at_col: usize, count: usize) {
    if at_col <= rect.left {
        rect.left += count;
    } else if at_col < rect.left + rect.cols {
        rect.cols += count;
    }
}
