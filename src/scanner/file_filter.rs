use crate::structure::StructureFormat;
use std::path::Path;

/// Decides which extracted files are conversion candidates.
pub struct StructureFilter {
    source_format: StructureFormat,
}

impl StructureFilter {
    pub fn new(source_format: StructureFormat) -> Self {
        Self { source_format }
    }

    pub fn is_structure_file(&self, path: &Path) -> bool {
        if !self.source_format.matches_path(path) {
            return false;
        }

        // AppleDouble companions share the extension but hold resource forks
        match path.file_name().and_then(|s| s.to_str()) {
            Some(name) => !name.starts_with("._"),
            None => false,
        }
    }

    pub fn should_traverse_directory(&self, path: &Path) -> bool {
        match path.file_name().and_then(|s| s.to_str()) {
            Some(dir_name) => dir_name != "__MACOSX",
            None => true,
        }
    }

    pub fn source_format(&self) -> StructureFormat {
        self.source_format
    }
}
