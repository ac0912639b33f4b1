pub mod cell;
pub mod document;
pub mod objects;
pub mod sheet;
