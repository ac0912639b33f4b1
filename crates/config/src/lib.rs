pub mod settings;

pub use settings::{GridMode, Settings};
