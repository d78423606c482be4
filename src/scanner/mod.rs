pub mod file_filter;
pub mod structure_scanner;

pub use file_filter::StructureFilter;
pub use structure_scanner::{StructureFile, StructureScanner};
