//! Persisted binding identity and the refresh protocol.
//!
//! A [`BindingDescriptor`] carries enough state to find its live table again
//! after the document is closed and reopened, plus the query that regenerates
//! the table's contents. Faults are a bitset: a binding can have lost its
//! upstream connection *and* had its table renamed at the same time.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use gridlink_core::{CellValue, Rect};

use crate::collide;
use crate::error::SyncError;
use crate::host::{GridHost, TableRef};
use crate::source::{Connection, TableData};
use crate::store::BindingStore;

bitflags::bitflags! {
    /// Fault bits for one binding. Healthy is the empty set; any subset may
    /// be active simultaneously.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
    pub struct FaultState: u8 {
        /// The upstream connection identity is gone. Unrecoverable.
        const CONNECTION_MISSING = 1 << 0;
        /// The upstream exists but refused the live probe.
        const CONNECTION_REFUSED = 1 << 1;
        /// The recorded schema no longer exists upstream.
        const SCHEMA_MISSING = 1 << 2;
        /// The recorded table/view no longer exists upstream.
        const TABLE_MISSING = 1 << 3;
        /// The bound grid object can no longer be found in the document.
        const OBJECT_MISSING = 1 << 4;
    }
}

fn faults_for(err: &SyncError) -> FaultState {
    match err {
        SyncError::ConnectionRefused(_) => FaultState::CONNECTION_REFUSED,
        SyncError::SchemaMissing(_) => FaultState::SCHEMA_MISSING,
        SyncError::TableMissing(_) => FaultState::TABLE_MISSING,
        SyncError::ObjectMissing { .. } => FaultState::OBJECT_MISSING,
        _ => FaultState::empty(),
    }
}

/// Saved global host flags, restored on every exit path of a scoped
/// operation.
struct HostFlags {
    screen_refresh: bool,
    change_events: bool,
}

impl HostFlags {
    fn save<H: GridHost>(host: &H) -> Self {
        Self { screen_refresh: host.screen_refresh(), change_events: host.change_events() }
    }

    fn restore<H: GridHost>(self, host: &mut H) {
        host.set_screen_refresh(self.screen_refresh);
        host.set_change_events(self.change_events);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BindingDescriptor {
    /// Unique within a registry; derived from the bound object name and the
    /// document identity.
    pub binding_id: String,
    pub connection_id: String,
    pub schema_name: String,
    pub table_name: String,
    pub query: String,
    pub result_set: usize,
    /// Output column labels as of the last import/refresh.
    pub column_names: Vec<String>,
    /// First bound column is the synthetic sequential key.
    pub with_row_key: bool,
    pub bound_object: String,
    pub document_id: String,
    pub document_name: String,
    pub sheet_name: String,
    pub last_access: DateTime<Utc>,
    #[serde(default)]
    pub faults: FaultState,
    /// True once the live counterpart has been located in this session.
    #[serde(skip)]
    resolved: bool,
    /// Re-entrancy latch for the refresh window.
    #[serde(skip)]
    refreshing: bool,
}

impl BindingDescriptor {
    pub fn binding_id_for(document_id: &str, object_name: &str) -> String {
        format!("{document_id}/{object_name}")
    }

    /// A freshly imported binding: healthy and already resolved.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        document_id: &str,
        document_name: &str,
        sheet_name: &str,
        bound_object: &str,
        connection_id: &str,
        schema_name: &str,
        table_name: &str,
        query: &str,
        result_set: usize,
    ) -> Self {
        Self {
            binding_id: Self::binding_id_for(document_id, bound_object),
            connection_id: connection_id.to_string(),
            schema_name: schema_name.to_string(),
            table_name: table_name.to_string(),
            query: query.to_string(),
            result_set,
            column_names: Vec::new(),
            with_row_key: false,
            bound_object: bound_object.to_string(),
            document_id: document_id.to_string(),
            document_name: document_name.to_string(),
            sheet_name: sheet_name.to_string(),
            last_access: Utc::now(),
            faults: FaultState::empty(),
            resolved: true,
            refreshing: false,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolved
    }

    /// Try to locate the live counterpart after a reopen. No-op unless the
    /// host document's identity matches the recorded one. An unresolved
    /// descriptor stays inert, state untouched, until a later restore
    /// succeeds.
    pub fn restore<H: GridHost>(&mut self, host: &mut H) -> bool {
        if host.document_id() != self.document_id {
            return false;
        }
        if host.find_table(&self.sheet_name, &self.bound_object).is_some() {
            self.resolved = true;
        }
        self.resolved
    }

    /// Probe the upstream and update the connection fault bits.
    pub fn test_connection(&mut self, conn: Option<&dyn Connection>) {
        match conn {
            None => {
                self.faults.insert(FaultState::CONNECTION_MISSING);
            }
            Some(conn) => match conn.probe() {
                Ok(()) => {
                    self.faults
                        .remove(FaultState::CONNECTION_MISSING | FaultState::CONNECTION_REFUSED);
                }
                Err(_) => {
                    self.faults.remove(FaultState::CONNECTION_MISSING);
                    self.faults.insert(FaultState::CONNECTION_REFUSED);
                }
            },
        }
    }

    /// Re-run the stored query and rebind the live table to the new data.
    ///
    /// A descriptor whose upstream identity is gone is removed from the
    /// registry and never retried; any other fault stops the refresh but
    /// keeps the descriptor for a later manual retry. Errors during the
    /// rebind itself are logged with the object's display name and
    /// swallowed — the caller sees a silent no-op with consistent state.
    pub fn refresh<H: GridHost>(
        &mut self,
        host: &mut H,
        conn: Option<&dyn Connection>,
        store: &mut dyn BindingStore,
    ) {
        if self.refreshing || !self.resolved || self.query.trim().is_empty() {
            return;
        }
        if host.find_table(&self.sheet_name, &self.bound_object).is_none() {
            self.faults.insert(FaultState::OBJECT_MISSING);
            return;
        }
        self.faults.remove(FaultState::OBJECT_MISSING);

        self.test_connection(conn);
        if self.faults.contains(FaultState::CONNECTION_MISSING) {
            // A deleted upstream identity is unrecoverable. Drop the binding.
            log::warn!(
                "upstream connection for '{}' no longer exists; binding removed",
                self.bound_object
            );
            if let Err(err) = store.remove(&self.binding_id) {
                log::warn!("binding '{}': registry remove failed: {err}", self.bound_object);
            }
            return;
        }
        if !self.faults.is_empty() {
            // Recoverable; left for a later manual refresh.
            return;
        }
        let Some(conn) = conn else { return };

        // The rebind window: change notifications are suppressed so the
        // rebind cannot trigger itself, redraw is paused, and both flags are
        // restored whatever happens inside.
        self.refreshing = true;
        let saved = HostFlags::save(host);
        host.set_screen_refresh(false);
        host.set_change_events(false);

        let result = self.refresh_connected(host, conn);

        saved.restore(host);
        self.refreshing = false;

        match result {
            Ok(()) => {
                self.last_access = Utc::now();
            }
            Err(err) => {
                self.faults.insert(faults_for(&err));
                log::warn!("refresh of '{}' failed: {err}", self.bound_object);
            }
        }
    }

    fn refresh_connected<H: GridHost>(
        &mut self,
        host: &mut H,
        conn: &dyn Connection,
    ) -> Result<(), SyncError> {
        // Never run against a live binding.
        if host.table(&self.bound_object).is_some_and(|t| t.connected) {
            host.set_table_connected(&self.bound_object, false);
        }
        let data = conn.execute(&self.query, self.result_set)?;
        self.rebind(host, &data)
    }

    fn locate<H: GridHost>(&self, host: &H) -> Result<TableRef, SyncError> {
        host.find_table(&self.sheet_name, &self.bound_object).ok_or_else(|| {
            SyncError::ObjectMissing {
                sheet: self.sheet_name.clone(),
                object: self.bound_object.clone(),
            }
        })
    }

    /// Resize + rebind: clamp the new footprint, clear the first colliding
    /// neighbor out of the way, resize, rewrite the data body, reformat it,
    /// re-attach, relabel columns back-to-front, and disconnect again so the
    /// cells stay user-editable between refreshes.
    fn rebind<H: GridHost>(&mut self, host: &mut H, data: &TableData) -> Result<(), SyncError> {
        let table = self.locate(host)?;
        let header = table.header_row as usize;
        let totals = table.totals_row as usize;
        let key = self.with_row_key as usize;
        let want_rows = data.rows.len() + header + totals;
        let want_cols = data.columns.len() + key;
        let limits = host.limits();

        let target =
            Rect::clamped(table.sheet, table.range.top, table.range.left, want_rows, want_cols, limits);
        if let Some(hit) =
            collide::find_first_intersection(&target, &host.occupants(table.sheet), Some(&table.name))
        {
            collide::resolve(&target, &hit).apply(host, table.sheet);
        }

        // The insertion may have shifted the anchor; re-read it and clamp
        // again with the same extents.
        let table = self.locate(host)?;
        let prior = table.range;
        let target =
            Rect::clamped(table.sheet, prior.top, prior.left, want_rows, want_cols, limits);
        if target.is_empty() {
            return Err(SyncError::NoRoom { sheet: self.sheet_name.clone() });
        }

        host.resize_table(&self.bound_object, target);
        // A shrink leaves no residue behind.
        for leftover in prior.subtract(&target) {
            host.clear_range(&leftover);
        }

        let body = Rect::new(
            target.sheet,
            target.top + header,
            target.left,
            target.rows.saturating_sub(header + totals),
            target.cols,
        );
        host.clear_range(&body);
        for i in 0..body.rows.min(data.rows.len()) {
            let row = body.top + i;
            if key == 1 {
                // First data row counts 1.
                host.set_row_formula(target.sheet, row, body.left, -(body.top as i64));
            }
            for j in 0..body.cols.saturating_sub(key) {
                let value = data.rows[i].get(j).cloned().unwrap_or(CellValue::Empty);
                host.set_value(target.sheet, row, body.left + key + j, value);
            }
        }
        host.reset_formats(&body);

        host.set_table_connected(&self.bound_object, true);
        let labels = self.output_labels(data, target.cols);
        // Back-to-front: renaming forward can transiently collide with a
        // default-generated column name.
        for (index, label) in labels.iter().enumerate().rev() {
            host.rename_table_column(&self.bound_object, index, label);
        }
        self.column_names = labels;
        host.set_table_connected(&self.bound_object, false);
        Ok(())
    }

    /// One label per output column: the synthetic key keeps its recorded
    /// name, everything else takes the source display name or a positional
    /// fallback.
    fn output_labels(&self, data: &TableData, total_cols: usize) -> Vec<String> {
        let key = self.with_row_key as usize;
        let mut labels = Vec::with_capacity(total_cols);
        for index in 0..total_cols {
            if key == 1 && index == 0 {
                labels.push(
                    self.column_names.first().cloned().unwrap_or_else(|| "Row".to_string()),
                );
                continue;
            }
            let name = data
                .columns
                .get(index - key)
                .map(|s| s.trim())
                .filter(|s| !s.is_empty())
                .map(str::to_string);
            labels.push(name.unwrap_or_else(|| format!("Column{}", index + 1)));
        }
        labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::StaticConnection;
    use crate::store::{BindingStore, MemoryBindingStore};
    use gridlink_core::{GridLimits, Rect};
    use gridlink_engine::document::Document;
    use gridlink_engine::objects::TableObject;

    fn doc() -> Document {
        Document::new("Book1", GridLimits { max_rows: 1000, max_cols: 100 })
    }

    fn data(cols: &[&str], rows: usize) -> TableData {
        TableData {
            columns: cols.iter().map(|c| c.to_string()).collect(),
            rows: (0..rows)
                .map(|r| {
                    cols.iter()
                        .enumerate()
                        .map(|(c, _)| CellValue::Text(format!("r{r}c{c}")))
                        .collect()
                })
                .collect(),
        }
    }

    fn descriptor(host: &mut Document, store: &mut MemoryBindingStore) -> BindingDescriptor {
        let sheet = host.active_sheet_id();
        host.add_table(TableObject::new("Orders", sheet, Rect::new(sheet, 2, 1, 4, 2), true));
        let document_id = host.ensure_id().to_string();
        let desc = BindingDescriptor::new(
            &document_id,
            "Book1",
            "Sheet1",
            "Orders",
            "conn-1",
            "dbo",
            "orders",
            "select * from dbo.orders",
            0,
        );
        store.add(&desc).unwrap();
        desc
    }

    #[test]
    fn missing_connection_removes_descriptor_and_does_not_rebind() {
        let mut host = doc();
        let mut store = MemoryBindingStore::new();
        let mut desc = descriptor(&mut host, &mut store);
        let before = host.table("Orders").unwrap().range;

        desc.refresh(&mut host, None, &mut store);

        assert!(desc.faults.contains(FaultState::CONNECTION_MISSING));
        assert!(store.find_all(&desc.document_id).unwrap().is_empty());
        assert_eq!(host.table("Orders").unwrap().range, before);
    }

    #[test]
    fn refused_probe_sets_bit_and_keeps_descriptor() {
        let mut host = doc();
        let mut store = MemoryBindingStore::new();
        let mut desc = descriptor(&mut host, &mut store);
        let conn = StaticConnection::new(data(&["id"], 2));
        conn.set_failure(Some(SyncError::ConnectionRefused("timeout".into())));

        desc.refresh(&mut host, Some(&conn as &dyn Connection), &mut store);

        assert!(desc.faults.contains(FaultState::CONNECTION_REFUSED));
        assert_eq!(store.find_all(&desc.document_id).unwrap().len(), 1);

        // The fault is recoverable: a later healthy refresh clears it.
        conn.set_failure(None);
        desc.refresh(&mut host, Some(&conn as &dyn Connection), &mut store);
        assert!(desc.faults.is_empty());
    }

    #[test]
    fn refresh_resizes_to_new_row_count() {
        let mut host = doc();
        let mut store = MemoryBindingStore::new();
        let mut desc = descriptor(&mut host, &mut store);
        let conn = StaticConnection::new(data(&["id", "name"], 8));

        desc.refresh(&mut host, Some(&conn as &dyn Connection), &mut store);

        let table = host.table("Orders").unwrap();
        // 8 data rows + header.
        assert_eq!(table.range, Rect::new(table.sheet, 2, 1, 9, 2));
        assert!(!table.connected);
        let sheet = host.sheet_by_id(table.sheet).unwrap();
        assert_eq!(sheet.value(2, 1), CellValue::Text("id".into()));
        assert_eq!(sheet.value(3, 1), CellValue::Text("r0c0".into()));
        assert_eq!(sheet.value(10, 2), CellValue::Text("r7c1".into()));
    }

    #[test]
    fn refresh_clears_residual_rows_on_shrink() {
        let mut host = doc();
        let mut store = MemoryBindingStore::new();
        let mut desc = descriptor(&mut host, &mut store);
        let conn = StaticConnection::new(data(&["id", "name"], 8));
        desc.refresh(&mut host, Some(&conn as &dyn Connection), &mut store);

        conn.set_data(data(&["id", "name"], 3));
        desc.refresh(&mut host, Some(&conn as &dyn Connection), &mut store);

        let table = host.table("Orders").unwrap();
        assert_eq!(table.range.rows, 4);
        let sheet = host.sheet_by_id(table.sheet).unwrap();
        assert_eq!(sheet.value(5, 1), CellValue::Text("r2c0".into()));
        // Old rows 6..11 hold nothing.
        for row in 6..11 {
            assert_eq!(sheet.value(row, 1), CellValue::Empty);
            assert_eq!(sheet.value(row, 2), CellValue::Empty);
        }
    }

    #[test]
    fn refresh_relabels_columns_with_fallbacks() {
        let mut host = doc();
        let mut store = MemoryBindingStore::new();
        let mut desc = descriptor(&mut host, &mut store);
        let conn = StaticConnection::new(data(&["id", ""], 1));

        desc.refresh(&mut host, Some(&conn as &dyn Connection), &mut store);

        let table = host.table("Orders").unwrap();
        let sheet = host.sheet_by_id(table.sheet).unwrap();
        assert_eq!(sheet.value(2, 1), CellValue::Text("id".into()));
        assert_eq!(sheet.value(2, 2), CellValue::Text("Column2".into()));
        assert_eq!(desc.column_names, vec!["id", "Column2"]);
    }

    #[test]
    fn refresh_moves_a_colliding_neighbor_out_of_the_way() {
        let mut host = doc();
        let mut store = MemoryBindingStore::new();
        let mut desc = descriptor(&mut host, &mut store);
        let sheet = host.active_sheet_id();
        // A wide neighbor overlaps the bottom row of the grown footprint
        // (rows 2..13 for 10 data rows + header).
        host.add_table(TableObject::new("Other", sheet, Rect::new(sheet, 12, 0, 3, 10), true));
        let conn = StaticConnection::new(data(&["id", "name"], 10));

        desc.refresh(&mut host, Some(&conn as &dyn Connection), &mut store);

        let orders = host.table("Orders").unwrap();
        assert_eq!(orders.range, Rect::new(sheet, 2, 1, 11, 2));
        let other = host.table("Other").unwrap();
        // 1-row intersection: two rows inserted at the target's bottom row
        // pushed the neighbor clear of the refreshed footprint.
        assert_eq!(other.range.top, 14);
        assert!(orders.range.intersect(&other.range).is_none());
    }

    #[test]
    fn refresh_restores_host_flags_on_every_path() {
        let mut host = doc();
        let mut store = MemoryBindingStore::new();
        let mut desc = descriptor(&mut host, &mut store);
        let conn = StaticConnection::new(data(&["id"], 2));

        desc.refresh(&mut host, Some(&conn as &dyn Connection), &mut store);
        assert!(host.screen_refresh());
        assert!(host.change_events());

        // A failure inside the rebind window restores too.
        conn.set_execute_failure(Some(SyncError::Query("boom".into())));
        desc.refresh(&mut host, Some(&conn as &dyn Connection), &mut store);
        assert!(host.screen_refresh());
        assert!(host.change_events());
        // An unexpected query failure is swallowed without setting a fault.
        assert!(desc.faults.is_empty());
    }

    #[test]
    fn query_failure_is_swallowed_and_leaves_grid_untouched() {
        let mut host = doc();
        let mut store = MemoryBindingStore::new();
        let mut desc = descriptor(&mut host, &mut store);
        let before = host.table("Orders").unwrap().range;
        let conn = StaticConnection::new(data(&["id"], 2));
        conn.set_failure(Some(SyncError::TableMissing("orders".into())));

        // probe() fails with TableMissing as well; that surfaces as a
        // refused-style stop before any rebind runs.
        desc.refresh(&mut host, Some(&conn as &dyn Connection), &mut store);
        assert_eq!(host.table("Orders").unwrap().range, before);
        assert_eq!(store.find_all(&desc.document_id).unwrap().len(), 1);
    }

    #[test]
    fn vanished_object_sets_bit_and_refresh_noops() {
        let mut host = doc();
        let mut store = MemoryBindingStore::new();
        let mut desc = descriptor(&mut host, &mut store);
        host.remove_table("Orders");
        let conn = StaticConnection::new(data(&["id"], 2));

        desc.refresh(&mut host, Some(&conn as &dyn Connection), &mut store);

        assert!(desc.faults.contains(FaultState::OBJECT_MISSING));
        assert_eq!(store.find_all(&desc.document_id).unwrap().len(), 1);
    }

    #[test]
    fn restore_requires_matching_document_identity() {
        let mut host = doc();
        let mut store = MemoryBindingStore::new();
        let mut desc = descriptor(&mut host, &mut store);
        // Simulate a reopen: serde skips the resolved flag.
        let json = serde_json::to_string(&desc).unwrap();
        desc = serde_json::from_str(&json).unwrap();
        assert!(!desc.is_resolved());

        let mut other = Document::new("Other", GridLimits { max_rows: 100, max_cols: 100 });
        other.ensure_id();
        assert!(!desc.restore(&mut other));
        assert!(!desc.is_resolved());

        assert!(desc.restore(&mut host));
        assert!(desc.is_resolved());
    }

    #[test]
    fn unresolved_descriptor_never_refreshes() {
        let mut host = doc();
        let mut store = MemoryBindingStore::new();
        let mut desc = descriptor(&mut host, &mut store);
        let json = serde_json::to_string(&desc).unwrap();
        desc = serde_json::from_str(&json).unwrap();
        let conn = StaticConnection::new(data(&["id"], 5));

        desc.refresh(&mut host, Some(&conn as &dyn Connection), &mut store);
        // Still the original 4-row range: nothing ran.
        assert_eq!(host.table("Orders").unwrap().range.rows, 4);
    }

    #[test]
    fn faults_accumulate_as_a_bitset() {
        let mut desc = BindingDescriptor::new("d", "n", "s", "o", "c", "sch", "t", "q", 0);
        desc.faults.insert(FaultState::CONNECTION_REFUSED);
        desc.faults.insert(FaultState::TABLE_MISSING);
        assert!(desc.faults.contains(FaultState::CONNECTION_REFUSED));
        assert!(desc.faults.contains(FaultState::TABLE_MISSING));
        assert_eq!(desc.faults.bits(), 0b0000_1010);
    }
}
