//! Interactive episode picker

pub mod interactive;
pub mod selector;

pub use interactive::pick_entry;
