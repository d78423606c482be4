pub mod extractor;
pub mod repackager;

pub use extractor::{ArchiveExtractor, ExtractedTree};
pub use repackager::{OutputArchive, Repackager, REPORT_ENTRY_NAME};
