//! Ephemeral staging area: a scratch sheet holding a transformed copy of a
//! source range, with guaranteed cleanup.
//!
//! The staging area is a scoped resource: it captures the host's redraw flag
//! on construction, builds at most once, and releases everything exactly once
//! on disposal. Dropping it without an explicit [`StagingArea::dispose`] call
//! releases too, so teardown runs on every path.

use gridlink_core::{CellValue, Rect, SheetId};
use gridlink_config::Settings;

use crate::host::GridHost;

/// Which transform the build step produces.
#[derive(Debug, Clone, PartialEq)]
pub enum StagingVariant {
    /// Straight values-only copy of the visible rows.
    Copy,
    /// Copy plus one leading synthetic key column of row-position formulas.
    CopyWithKey { first_row_is_header: bool },
    /// Column-remapped subset: each output column names a 0-based source
    /// column, or `None` to stay blank.
    ColumnMapped(Vec<Option<usize>>),
}

#[derive(Debug, Clone)]
pub struct StagingOptions {
    /// Shrink the source to the minimal rect bounding its non-empty cells.
    pub crop_to_non_empty: bool,
    /// In `Copy`, leave out source columns with no data.
    pub skip_empty_columns: bool,
    /// Hide the scratch sheet from the user and delete it on disposal.
    pub hide_and_delete: bool,
    /// Cap on rows copied. `None` = unlimited.
    pub row_limit: Option<usize>,
}

impl Default for StagingOptions {
    fn default() -> Self {
        Self {
            crop_to_non_empty: false,
            skip_empty_columns: false,
            hide_and_delete: true,
            row_limit: None,
        }
    }
}

impl StagingOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            crop_to_non_empty: false,
            skip_empty_columns: settings.skip_empty_columns,
            hide_and_delete: settings.hide_scratch_sheets,
            row_limit: settings.default_row_limit,
        }
    }
}

/// One staging area over a borrowed host.
///
/// Failure to stage is not an error: an empty source or a host that cannot
/// create scratch sheets leaves the area inert, every build returns `None`,
/// and callers abort the dependent operation.
pub struct StagingArea<'h, H: GridHost> {
    host: &'h mut H,
    source: Option<Rect>,
    scratch: Option<SheetId>,
    variant: StagingVariant,
    options: StagingOptions,
    output: Option<Rect>,
    built: bool,
    disposed: bool,
    prior_refresh: bool,
}

impl<'h, H: GridHost> StagingArea<'h, H> {
    pub fn new(
        host: &'h mut H,
        source: Rect,
        variant: StagingVariant,
        options: StagingOptions,
    ) -> Self {
        let prior_refresh = host.screen_refresh();
        host.set_screen_refresh(false);

        let source = crop_source(host, &source, options.crop_to_non_empty);
        let scratch = match source {
            Some(_) => match host.add_scratch_sheet(options.hide_and_delete) {
                Some(id) => Some(id),
                None => {
                    log::warn!("staging sheet could not be created; staging degraded to a no-op");
                    None
                }
            },
            None => None,
        };

        Self {
            host,
            source,
            scratch,
            variant,
            options,
            output: None,
            built: false,
            disposed: false,
            prior_refresh,
        }
    }

    /// The host, for callers that need to read the built output before
    /// disposal.
    pub fn host(&self) -> &H {
        self.host
    }

    pub fn host_mut(&mut self) -> &mut H {
        self.host
    }

    /// Rect produced by the last build, while the area is alive.
    pub fn output(&self) -> Option<Rect> {
        self.output
    }

    /// Build the requested transform into scratch space. Single-shot: a
    /// second call returns the first result without copying again. `None`
    /// means staging failed silently and the dependent operation must abort.
    pub fn build(&mut self) -> Option<Rect> {
        if self.built {
            return self.output;
        }
        self.built = true;
        let (source, scratch) = match (self.source, self.scratch) {
            (Some(source), Some(scratch)) => (source, scratch),
            _ => return None,
        };
        let variant = self.variant.clone();
        let rect = match variant {
            StagingVariant::Copy => self.build_copy(source, scratch, self.options.skip_empty_columns),
            StagingVariant::CopyWithKey { first_row_is_header } => {
                self.build_copy_with_key(source, scratch, first_row_is_header)
            }
            StagingVariant::ColumnMapped(mapping) => self.build_mapped(source, scratch, &mapping),
        };
        self.output = Some(rect);
        self.output
    }

    /// Release scratch space. Idempotent: the second call is a no-op. Runs
    /// automatically on drop.
    pub fn dispose(&mut self) {
        self.release();
    }

    fn rows_to_copy(&self, source: &Rect) -> Vec<usize> {
        let visible = self.host.visible_rows(source);
        let take = self.options.row_limit.map_or(visible.len(), |limit| limit.min(visible.len()));
        visible[..take].to_vec()
    }

    fn build_copy(&mut self, source: Rect, scratch: SheetId, skip_empty: bool) -> Rect {
        let rows = self.rows_to_copy(&source);
        let mut out_col = 0usize;
        for col in 0..source.cols {
            if skip_empty && !self.host.column_has_values(&source, col) {
                continue;
            }
            for (i, &src_row) in rows.iter().enumerate() {
                let value = self.host.value(source.sheet, src_row, source.left + col);
                if !value.is_empty() {
                    self.host.set_value(scratch, i, out_col, value);
                }
            }
            out_col += 1;
        }
        Rect::clamped(scratch, 0, 0, rows.len(), out_col, self.host.limits())
    }

    fn build_copy_with_key(
        &mut self,
        source: Rect,
        scratch: SheetId,
        first_row_is_header: bool,
    ) -> Rect {
        let copied = self.build_copy(source, scratch, self.options.skip_empty_columns);
        self.host.insert_cols(scratch, 0, 1);
        // 1-based position per row; with a header the data rows, not the
        // header, start at 1.
        let offset = if first_row_is_header { -1 } else { 0 };
        for row in 0..copied.rows {
            self.host.set_row_formula(scratch, row, 0, offset);
        }
        Rect::clamped(scratch, 0, 0, copied.rows, copied.cols + 1, self.host.limits())
    }

    fn build_mapped(&mut self, source: Rect, scratch: SheetId, mapping: &[Option<usize>]) -> Rect {
        let rows = self.rows_to_copy(&source);
        for (out_col, mapped) in mapping.iter().enumerate() {
            let Some(src_col) = mapped else { continue };
            if *src_col >= source.cols {
                continue;
            }
            for (i, &src_row) in rows.iter().enumerate() {
                let value = self.host.value(source.sheet, src_row, source.left + src_col);
                if !value.is_empty() {
                    self.host.set_value(scratch, i, out_col, value);
                }
            }
        }
        Rect::clamped(scratch, 0, 0, rows.len(), mapping.len(), self.host.limits())
    }

    fn release(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        // No redraw or alerts while tearing down.
        self.host.set_screen_refresh(false);
        if let Some(scratch) = self.scratch.take() {
            if self.options.hide_and_delete {
                // Hosts refuse to delete a most-hidden sheet; raise first.
                self.host.raise_sheet_visibility(scratch);
                if !self.host.remove_sheet(scratch) {
                    log::debug!("scratch sheet survived disposal");
                }
            } else if let Some(source) = self.source {
                self.host.activate_sheet(source.sheet);
            }
        }
        self.source = None;
        self.output = None;
        self.host.set_screen_refresh(self.prior_refresh);
    }
}

impl<H: GridHost> Drop for StagingArea<'_, H> {
    fn drop(&mut self) {
        self.release();
    }
}

/// Apply the crop policy. A single-cell source is non-empty iff it holds a
/// value; anything larger is shrunk to the bounding box of its non-empty
/// cells. `None` means there is nothing to stage.
fn crop_source<H: GridHost>(host: &H, source: &Rect, crop: bool) -> Option<Rect> {
    if source.is_empty() {
        return None;
    }
    if !crop {
        return Some(*source);
    }
    if source.rows == 1 && source.cols == 1 {
        if host.value(source.sheet, source.top, source.left).is_empty() {
            return None;
        }
        return Some(*source);
    }
    host.non_empty_bounds(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gridlink_core::{GridLimits, Occupant};
    use gridlink_engine::document::Document;

    fn doc() -> Document {
        Document::new("Book1", GridLimits { max_rows: 1000, max_cols: 100 })
    }

    fn fill(doc: &mut Document, top: usize, left: usize, rows: &[&[&str]]) {
        let sheet = doc.active_sheet_id();
        for (r, row) in rows.iter().enumerate() {
            for (c, text) in row.iter().enumerate() {
                if let Some(s) = doc.sheet_by_id_mut(sheet) {
                    s.set_value(top + r, left + c, CellValue::from_input(text));
                }
            }
        }
    }

    fn source_rect(doc: &Document, top: usize, left: usize, rows: usize, cols: usize) -> Rect {
        Rect::new(doc.active_sheet_id(), top, left, rows, cols)
    }

    #[test]
    fn copy_reproduces_source_values_exactly() {
        let mut doc = doc();
        fill(&mut doc, 0, 0, &[&["a", "1"], &["b", "2"], &["c", "3"]]);
        let source = source_rect(&doc, 0, 0, 3, 2);

        let mut staging =
            StagingArea::new(&mut doc, source, StagingVariant::Copy, StagingOptions::default());
        let out = staging.build().unwrap();
        assert_eq!((out.rows, out.cols), (3, 2));
        assert_eq!(staging.host().value(out.sheet, 0, 0), CellValue::Text("a".into()));
        assert_eq!(staging.host().value(out.sheet, 2, 1), CellValue::Number(3.0));
    }

    #[test]
    fn copy_excludes_filtered_rows_and_honors_row_limit() {
        let mut doc = doc();
        fill(&mut doc, 0, 0, &[&["r0"], &["r1"], &["r2"], &["r3"], &["r4"]]);
        let sheet = doc.active_sheet_id();
        doc.sheet_by_id_mut(sheet).unwrap().set_row_hidden(1, true);
        let source = source_rect(&doc, 0, 0, 5, 1);

        let options = StagingOptions { row_limit: Some(3), ..Default::default() };
        let mut staging = StagingArea::new(&mut doc, source, StagingVariant::Copy, options);
        let out = staging.build().unwrap();
        assert_eq!(out.rows, 3);
        // Row 1 is hidden, so the copied rows are 0, 2, 3.
        assert_eq!(staging.host().value(out.sheet, 0, 0), CellValue::Text("r0".into()));
        assert_eq!(staging.host().value(out.sheet, 1, 0), CellValue::Text("r2".into()));
        assert_eq!(staging.host().value(out.sheet, 2, 0), CellValue::Text("r3".into()));
    }

    #[test]
    fn copy_skips_empty_columns_when_asked() {
        let mut doc = doc();
        fill(&mut doc, 0, 0, &[&["a", "", "x"], &["b", "", "y"]]);
        let source = source_rect(&doc, 0, 0, 2, 3);

        let options = StagingOptions { skip_empty_columns: true, ..Default::default() };
        let mut staging = StagingArea::new(&mut doc, source, StagingVariant::Copy, options);
        let out = staging.build().unwrap();
        assert_eq!(out.cols, 2);
        assert_eq!(staging.host().value(out.sheet, 0, 1), CellValue::Text("x".into()));
    }

    #[test]
    fn copy_with_key_numbers_data_rows_from_one() {
        let mut doc = doc();
        fill(
            &mut doc,
            0,
            0,
            &[&["name"], &["ada"], &["grace"], &["edsger"], &["donald"]],
        );
        let source = source_rect(&doc, 0, 0, 5, 1);

        let mut staging = StagingArea::new(
            &mut doc,
            source,
            StagingVariant::CopyWithKey { first_row_is_header: true },
            StagingOptions::default(),
        );
        let out = staging.build().unwrap();
        assert_eq!((out.rows, out.cols), (5, 2));
        for (i, expected) in [1.0, 2.0, 3.0, 4.0].iter().enumerate() {
            assert_eq!(staging.host().value(out.sheet, i + 1, 0), CellValue::Number(*expected));
        }
        assert_eq!(staging.host().value(out.sheet, 1, 1), CellValue::Text("ada".into()));
    }

    #[test]
    fn column_mapped_reorders_and_blanks() {
        let mut doc = doc();
        fill(&mut doc, 0, 0, &[&["A", "B", "C"], &["a2", "b2", "c2"]]);
        let source = source_rect(&doc, 0, 0, 2, 3);

        let mut staging = StagingArea::new(
            &mut doc,
            source,
            StagingVariant::ColumnMapped(vec![Some(2), None, Some(0)]),
            StagingOptions::default(),
        );
        let out = staging.build().unwrap();
        assert_eq!((out.rows, out.cols), (2, 3));
        assert_eq!(staging.host().value(out.sheet, 0, 0), CellValue::Text("C".into()));
        assert_eq!(staging.host().value(out.sheet, 0, 1), CellValue::Empty);
        assert_eq!(staging.host().value(out.sheet, 0, 2), CellValue::Text("A".into()));
        assert_eq!(staging.host().value(out.sheet, 1, 2), CellValue::Text("a2".into()));
    }

    #[test]
    fn crop_to_non_empty_shrinks_the_source() {
        let mut doc = doc();
        fill(&mut doc, 5, 5, &[&["x", "y"], &["z", "w"]]);
        let source = source_rect(&doc, 0, 0, 50, 50);

        let options = StagingOptions { crop_to_non_empty: true, ..Default::default() };
        let mut staging = StagingArea::new(&mut doc, source, StagingVariant::Copy, options);
        let out = staging.build().unwrap();
        assert_eq!((out.rows, out.cols), (2, 2));
        assert_eq!(staging.host().value(out.sheet, 0, 0), CellValue::Text("x".into()));
    }

    #[test]
    fn all_empty_source_is_inert() {
        let mut doc = doc();
        let source = source_rect(&doc, 0, 0, 10, 10);
        let sheets_before = doc.sheet_count();

        let options = StagingOptions { crop_to_non_empty: true, ..Default::default() };
        let mut staging = StagingArea::new(&mut doc, source, StagingVariant::Copy, options);
        assert!(staging.build().is_none());
        assert!(staging.output().is_none());
        drop(staging);
        // No scratch sheet was ever created.
        assert_eq!(doc.sheet_count(), sheets_before);
    }

    #[test]
    fn single_cell_source_needs_no_search() {
        let mut doc = doc();
        fill(&mut doc, 3, 3, &[&["v"]]);
        let options = StagingOptions { crop_to_non_empty: true, ..Default::default() };

        let source = source_rect(&doc, 3, 3, 1, 1);
        let mut staging = StagingArea::new(&mut doc, source, StagingVariant::Copy, options.clone());
        assert!(staging.build().is_some());
        drop(staging);

        let empty = source_rect(&doc, 7, 7, 1, 1);
        let mut staging = StagingArea::new(&mut doc, empty, StagingVariant::Copy, options);
        assert!(staging.build().is_none());
    }

    #[test]
    fn build_is_single_shot() {
        let mut doc = doc();
        fill(&mut doc, 0, 0, &[&["a"]]);
        let source = source_rect(&doc, 0, 0, 1, 1);
        let mut staging =
            StagingArea::new(&mut doc, source, StagingVariant::Copy, StagingOptions::default());
        let first = staging.build();
        let second = staging.build();
        assert_eq!(first, second);
    }

    #[test]
    fn dispose_removes_hidden_scratch_and_is_idempotent() {
        let mut doc = doc();
        fill(&mut doc, 0, 0, &[&["a"]]);
        let source = source_rect(&doc, 0, 0, 1, 1);
        let sheets_before = doc.sheet_count();

        let mut staging =
            StagingArea::new(&mut doc, source, StagingVariant::Copy, StagingOptions::default());
        staging.build();
        staging.dispose();
        staging.dispose();
        assert!(staging.output().is_none());
        drop(staging);
        assert_eq!(doc.sheet_count(), sheets_before);
    }

    #[test]
    fn dispose_restores_prior_redraw_setting() {
        let mut doc = doc();
        fill(&mut doc, 0, 0, &[&["a"]]);
        let source = source_rect(&doc, 0, 0, 1, 1);
        assert!(doc.screen_refresh());

        let mut staging =
            StagingArea::new(&mut doc, source, StagingVariant::Copy, StagingOptions::default());
        assert!(!staging.host().screen_refresh());
        staging.build();
        drop(staging);
        assert!(doc.screen_refresh());
    }

    #[test]
    fn visible_scratch_survives_and_focus_returns_to_source() {
        let mut doc = doc();
        fill(&mut doc, 0, 0, &[&["a"]]);
        let source = source_rect(&doc, 0, 0, 1, 1);
        let source_sheet = source.sheet;
        let sheets_before = doc.sheet_count();

        let options = StagingOptions { hide_and_delete: false, ..Default::default() };
        let mut staging = StagingArea::new(&mut doc, source, StagingVariant::Copy, options);
        staging.build();
        drop(staging);
        assert_eq!(doc.sheet_count(), sheets_before + 1);
        assert_eq!(doc.active_sheet_id(), source_sheet);
    }

    /// Host wrapper whose scratch-sheet creation always fails, for the
    /// degraded path.
    struct Scratchless(Document);

    impl GridHost for Scratchless {
        fn limits(&self) -> GridLimits {
            self.0.limits()
        }
        fn document_id(&mut self) -> String {
            GridHost::document_id(&mut self.0)
        }
        fn document_name(&self) -> String {
            GridHost::document_name(&self.0)
        }
        fn screen_refresh(&self) -> bool {
            self.0.screen_refresh()
        }
        fn set_screen_refresh(&mut self, on: bool) {
            self.0.set_screen_refresh(on);
        }
        fn change_events(&self) -> bool {
            self.0.change_events()
        }
        fn set_change_events(&mut self, on: bool) {
            self.0.set_change_events(on);
        }
        fn sheet_id(&self, name: &str) -> Option<SheetId> {
            GridHost::sheet_id(&self.0, name)
        }
        fn add_scratch_sheet(&mut self, _hidden: bool) -> Option<SheetId> {
            None
        }
        fn raise_sheet_visibility(&mut self, sheet: SheetId) {
            GridHost::raise_sheet_visibility(&mut self.0, sheet);
        }
        fn remove_sheet(&mut self, sheet: SheetId) -> bool {
            GridHost::remove_sheet(&mut self.0, sheet)
        }
        fn activate_sheet(&mut self, sheet: SheetId) {
            GridHost::activate_sheet(&mut self.0, sheet);
        }
        fn value(&self, sheet: SheetId, row: usize, col: usize) -> CellValue {
            GridHost::value(&self.0, sheet, row, col)
        }
        fn set_value(&mut self, sheet: SheetId, row: usize, col: usize, value: CellValue) {
            GridHost::set_value(&mut self.0, sheet, row, col, value);
        }
        fn set_row_formula(&mut self, sheet: SheetId, row: usize, col: usize, offset: i64) {
            GridHost::set_row_formula(&mut self.0, sheet, row, col, offset);
        }
        fn clear_range(&mut self, area: &Rect) {
            GridHost::clear_range(&mut self.0, area);
        }
        fn reset_formats(&mut self, area: &Rect) {
            GridHost::reset_formats(&mut self.0, area);
        }
        fn visible_rows(&self, area: &Rect) -> Vec<usize> {
            GridHost::visible_rows(&self.0, area)
        }
        fn non_empty_bounds(&self, area: &Rect) -> Option<Rect> {
            GridHost::non_empty_bounds(&self.0, area)
        }
        fn column_has_values(&self, area: &Rect, col: usize) -> bool {
            GridHost::column_has_values(&self.0, area, col)
        }
        fn insert_rows(&mut self, sheet: SheetId, at_row: usize, count: usize) {
            GridHost::insert_rows(&mut self.0, sheet, at_row, count);
        }
        fn insert_cols(&mut self, sheet: SheetId, at_col: usize, count: usize) {
            GridHost::insert_cols(&mut self.0, sheet, at_col, count);
        }
        fn occupants(&self, sheet: SheetId) -> Vec<Occupant> {
            GridHost::occupants(&self.0, sheet)
        }
        fn find_table(&self, sheet_name: &str, object_name: &str) -> Option<crate::host::TableRef> {
            GridHost::find_table(&self.0, sheet_name, object_name)
        }
        fn table(&self, object_name: &str) -> Option<crate::host::TableRef> {
            GridHost::table(&self.0, object_name)
        }
        fn create_table(
            &mut self,
            sheet: SheetId,
            name: &str,
            range: Rect,
            header_row: bool,
        ) -> bool {
            GridHost::create_table(&mut self.0, sheet, name, range, header_row)
        }
        fn resize_table(&mut self, object_name: &str, range: Rect) -> bool {
            GridHost::resize_table(&mut self.0, object_name, range)
        }
        fn set_table_connected(&mut self, object_name: &str, on: bool) -> bool {
            GridHost::set_table_connected(&mut self.0, object_name, on)
        }
        fn rename_table_column(&mut self, object_name: &str, index: usize, label: &str) -> bool {
            GridHost::rename_table_column(&mut self.0, object_name, index, label)
        }
    }

    #[test]
    fn options_follow_user_settings() {
        let mut settings = gridlink_config::Settings::default();
        settings.hide_scratch_sheets = false;
        settings.default_row_limit = Some(2);
        settings.skip_empty_columns = true;
        let options = StagingOptions::from_settings(&settings);
        assert!(!options.hide_and_delete);
        assert_eq!(options.row_limit, Some(2));
        assert!(options.skip_empty_columns);

        let mut doc = doc();
        fill(&mut doc, 0, 0, &[&["a"], &["b"], &["c"]]);
        let source = source_rect(&doc, 0, 0, 3, 1);
        let mut staging = StagingArea::new(&mut doc, source, StagingVariant::Copy, options);
        let out = staging.build().unwrap();
        assert_eq!(out.rows, 2);
    }

    #[test]
    fn unavailable_scratch_degrades_to_null_not_panic() {
        let mut host = Scratchless(doc());
        fill(&mut host.0, 0, 0, &[&["a"]]);
        let source = Rect::new(host.0.active_sheet_id(), 0, 0, 1, 1);

        let mut staging =
            StagingArea::new(&mut host, source, StagingVariant::Copy, StagingOptions::default());
        assert!(staging.build().is_none());
        staging.dispose();
        drop(staging);
        assert!(host.0.screen_refresh());
    }
}
