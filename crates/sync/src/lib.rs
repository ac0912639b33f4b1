//! `gridlink-sync` — staging, collision resolution and live binding refresh.
//!
//! Pure protocol crate: it sees the host grid only through the [`GridHost`]
//! capability port and the upstream only through [`Connection`]. No dialogs,
//! no connection strings, no persistence format — those live with the
//! collaborators.

pub mod binding;
pub mod collide;
pub mod error;
pub mod host;
pub mod import;
pub mod source;
pub mod staging;
pub mod store;

pub use binding::{BindingDescriptor, FaultState};
pub use collide::{find_first_intersection, resolve, InsertAxis, InsertionPlan};
pub use error::SyncError;
pub use host::{GridHost, TableRef};
pub use import::{run_import, ImportRequest, ImportShape};
pub use source::{Connection, StaticConnection, TableData};
pub use staging::{StagingArea, StagingOptions, StagingVariant};
pub use store::{BindingStore, MemoryBindingStore};
