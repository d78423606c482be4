//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::io::{Cursor, Read, Write};
use std::path::{Path, PathBuf};
use zip::write::SimpleFileOptions;

/// A minimal two-chain mmCIF model.
pub const SAMPLE_CIF: &str = "data_sample
loop_
_atom_site.group_PDB
_atom_site.id
_atom_site.type_symbol
_atom_site.label_atom_id
_atom_site.label_alt_id
_atom_site.label_comp_id
_atom_site.label_asym_id
_atom_site.label_seq_id
_atom_site.pdbx_PDB_ins_code
_atom_site.Cartn_x
_atom_site.Cartn_y
_atom_site.Cartn_z
_atom_site.occupancy
_atom_site.B_iso_or_equiv
_atom_site.auth_seq_id
_atom_site.auth_asym_id
_atom_site.pdbx_PDB_model_num
ATOM 1 N N . MET A 1 ? 12.345 -3.210 7.000 1.00 85.20 1 A 1
ATOM 2 C CA . MET A 1 ? 13.100 -2.000 6.500 1.00 86.10 1 A 1
ATOM 3 C C . GLY B 1 ? 1.000 2.000 3.000 1.00 90.00 1 B 1
#
";

pub const MALFORMED_CIF: &str = "this is not a structure file\n";

/// Build an in-memory ZIP. Names ending in `/` become directory entries.
pub fn build_zip(entries: &[(&str, &str)]) -> Vec<u8> {
    let mut buffer = Vec::new();
    {
        let mut writer = zip::ZipWriter::new(Cursor::new(&mut buffer));
        let options =
            SimpleFileOptions::default().compression_method(zip::CompressionMethod::Deflated);
        for (name, content) in entries {
            if name.ends_with('/') {
                writer.add_directory(name.to_string(), options).unwrap();
            } else {
                writer.start_file(name.to_string(), options).unwrap();
                writer.write_all(content.as_bytes()).unwrap();
            }
        }
        writer.finish().unwrap();
    }
    buffer
}

pub fn write_zip(dir: &Path, name: &str, entries: &[(&str, &str)]) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, build_zip(entries)).unwrap();
    path
}

/// Entry names of the ZIP at `path`, in archive order.
pub fn zip_entry_names(path: &Path) -> Vec<String> {
    let file = std::fs::File::open(path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    (0..archive.len())
        .map(|i| archive.by_index(i).unwrap().name().to_string())
        .collect()
}

pub fn sorted_entry_names(path: &Path) -> Vec<String> {
    let mut names = zip_entry_names(path);
    names.sort();
    names
}

pub fn read_zip_entry(path: &Path, entry: &str) -> String {
    let file = std::fs::File::open(path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let mut content = String::new();
    archive
        .by_name(entry)
        .unwrap()
        .read_to_string(&mut content)
        .unwrap();
    content
}
