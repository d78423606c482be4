pub mod file_converter;

pub use file_converter::{ConversionResult, FileConverter, ReportedError};
