// Binding registry backed by SQLite

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use gridlink_sync::{BindingDescriptor, BindingStore, FaultState};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS bindings (
    binding_id TEXT PRIMARY KEY,
    connection_id TEXT NOT NULL,
    schema_name TEXT NOT NULL DEFAULT '',
    table_name TEXT NOT NULL DEFAULT '',
    query TEXT NOT NULL,
    result_set INTEGER NOT NULL DEFAULT 0,
    column_names TEXT NOT NULL DEFAULT '[]',  -- JSON array of labels
    with_row_key INTEGER NOT NULL DEFAULT 0,
    bound_object TEXT NOT NULL,
    document_id TEXT NOT NULL,
    document_name TEXT NOT NULL DEFAULT '',
    sheet_name TEXT NOT NULL,
    last_access TEXT NOT NULL,                -- RFC 3339
    fault_bits INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS idx_bindings_document ON bindings (document_id);

CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);
"#;

/// Per-document binding registry stored in a SQLite file.
pub struct SqliteBindingStore {
    conn: Connection,
}

impl SqliteBindingStore {
    pub fn open(path: &Path) -> Result<Self, String> {
        let conn = Connection::open(path).map_err(|e| e.to_string())?;
        Self::init(conn)
    }

    /// Registry held entirely in memory; useful for tests.
    pub fn open_in_memory() -> Result<Self, String> {
        let conn = Connection::open_in_memory().map_err(|e| e.to_string())?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, String> {
        conn.execute_batch(SCHEMA).map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT OR IGNORE INTO meta (key, value) VALUES ('format_version', ?1)",
            params![crate::REGISTRY_FORMAT_VERSION.to_string()],
        )
        .map_err(|e| e.to_string())?;
        Ok(Self { conn })
    }

    pub fn format_version(&self) -> Result<u32, String> {
        let value: String = self
            .conn
            .query_row("SELECT value FROM meta WHERE key = 'format_version'", [], |row| {
                row.get(0)
            })
            .map_err(|e| e.to_string())?;
        value.parse().map_err(|_| format!("bad format version: {value}"))
    }
}

fn row_to_descriptor(row: &rusqlite::Row<'_>) -> rusqlite::Result<BindingDescriptor> {
    let column_names_json: String = row.get("column_names")?;
    let last_access_text: String = row.get("last_access")?;
    let fault_bits: u8 = row.get("fault_bits")?;

    let mut descriptor = BindingDescriptor::new(
        &row.get::<_, String>("document_id")?,
        &row.get::<_, String>("document_name")?,
        &row.get::<_, String>("sheet_name")?,
        &row.get::<_, String>("bound_object")?,
        &row.get::<_, String>("connection_id")?,
        &row.get::<_, String>("schema_name")?,
        &row.get::<_, String>("table_name")?,
        &row.get::<_, String>("query")?,
        row.get::<_, i64>("result_set")? as usize,
    );
    descriptor.binding_id = row.get("binding_id")?;
    descriptor.column_names = serde_json::from_str(&column_names_json).unwrap_or_default();
    descriptor.with_row_key = row.get::<_, i64>("with_row_key")? != 0;
    descriptor.last_access = DateTime::parse_from_rfc3339(&last_access_text)
        .map(|t| t.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now());
    descriptor.faults = FaultState::from_bits_truncate(fault_bits);
    Ok(descriptor)
}

impl BindingStore for SqliteBindingStore {
    fn add(&mut self, descriptor: &BindingDescriptor) -> Result<(), String> {
        let column_names =
            serde_json::to_string(&descriptor.column_names).map_err(|e| e.to_string())?;
        self.conn
            .execute(
                "INSERT OR REPLACE INTO bindings (
                    binding_id, connection_id, schema_name, table_name, query,
                    result_set, column_names, with_row_key, bound_object,
                    document_id, document_name, sheet_name, last_access, fault_bits
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                params![
                    descriptor.binding_id,
                    descriptor.connection_id,
                    descriptor.schema_name,
                    descriptor.table_name,
                    descriptor.query,
                    descriptor.result_set as i64,
                    column_names,
                    descriptor.with_row_key as i64,
                    descriptor.bound_object,
                    descriptor.document_id,
                    descriptor.document_name,
                    descriptor.sheet_name,
                    descriptor.last_access.to_rfc3339(),
                    descriptor.faults.bits() as i64,
                ],
            )
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    fn remove(&mut self, binding_id: &str) -> Result<(), String> {
        self.conn
            .execute("DELETE FROM bindings WHERE binding_id = ?1", params![binding_id])
            .map_err(|e| e.to_string())?;
        Ok(())
    }

    fn find_all(&self, document_id: &str) -> Result<Vec<BindingDescriptor>, String> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT binding_id, connection_id, schema_name, table_name, query,
                        result_set, column_names, with_row_key, bound_object,
                        document_id, document_name, sheet_name, last_access, fault_bits
                 FROM bindings WHERE document_id = ?1 ORDER BY binding_id",
            )
            .map_err(|e| e.to_string())?;
        let rows = stmt
            .query_map(params![document_id], row_to_descriptor)
            .map_err(|e| e.to_string())?;
        let mut out = Vec::new();
        for row in rows {
            out.push(row.map_err(|e| e.to_string())?);
        }
        Ok(out)
    }
}
