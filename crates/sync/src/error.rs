use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum SyncError {
    /// The upstream was reachable but rejected the probe or the session.
    ConnectionRefused(String),
    /// The recorded schema no longer exists upstream.
    SchemaMissing(String),
    /// The recorded table or view no longer exists upstream.
    TableMissing(String),
    /// Query execution failed for another reason.
    Query(String),
    /// The named sheet does not exist in the document.
    SheetMissing(String),
    /// The bound grid object can no longer be found.
    ObjectMissing { sheet: String, object: String },
    /// An object with that name already exists in the document.
    ObjectExists(String),
    /// The destination clamps to a zero-size rectangle.
    NoRoom { sheet: String },
    /// Staging could not produce an output rectangle.
    StagingFailed,
    /// Registry operation failed.
    Store(String),
}

impl fmt::Display for SyncError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionRefused(msg) => write!(f, "connection refused: {msg}"),
            Self::SchemaMissing(name) => write!(f, "schema '{name}' no longer exists"),
            Self::TableMissing(name) => write!(f, "table '{name}' no longer exists"),
            Self::Query(msg) => write!(f, "query failed: {msg}"),
            Self::SheetMissing(name) => write!(f, "sheet '{name}' not found"),
            Self::ObjectMissing { sheet, object } => {
                write!(f, "object '{object}' not found on sheet '{sheet}'")
            }
            Self::ObjectExists(name) => write!(f, "object '{name}' already exists"),
            Self::NoRoom { sheet } => {
                write!(f, "no room left on sheet '{sheet}' for the requested area")
            }
            Self::StagingFailed => write!(f, "staging produced no output"),
            Self::Store(msg) => write!(f, "registry error: {msg}"),
        }
    }
}

impl std::error::Error for SyncError {}
