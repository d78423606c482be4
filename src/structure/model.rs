use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordKind {
    Atom,
    Hetatm,
}

impl RecordKind {
    pub fn from_group(group: &str) -> Self {
        if group.eq_ignore_ascii_case("HETATM") {
            RecordKind::Hetatm
        } else {
            RecordKind::Atom
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Atom => "ATOM",
            RecordKind::Hetatm => "HETATM",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    pub record: RecordKind,
    pub serial: u32,
    pub name: String,
    pub alt_loc: Option<char>,
    pub residue_name: String,
    pub chain_id: String,
    pub residue_seq: i32,
    pub insertion_code: Option<char>,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub occupancy: f64,
    pub b_factor: f64,
    pub element: String,
    pub charge: Option<i32>,
    pub model: u32,
}

/// Coordinates and identifiers of one structure, in file order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StructuralModel {
    pub id: String,
    pub atoms: Vec<Atom>,
}

impl StructuralModel {
    pub fn new<S: Into<String>>(id: S) -> Self {
        Self {
            id: id.into(),
            atoms: Vec::new(),
        }
    }

    pub fn atom_count(&self) -> usize {
        self.atoms.len()
    }

    /// Distinct chain identifiers in order of first appearance.
    pub fn chain_ids(&self) -> Vec<String> {
        let mut chains: Vec<String> = Vec::new();
        for atom in &self.atoms {
            if !chains.contains(&atom.chain_id) {
                chains.push(atom.chain_id.clone());
            }
        }
        chains
    }

    /// Distinct model numbers in order of first appearance.
    pub fn model_numbers(&self) -> Vec<u32> {
        let mut models: Vec<u32> = Vec::new();
        for atom in &self.atoms {
            if !models.contains(&atom.model) {
                models.push(atom.model);
            }
        }
        models
    }
}

/// Infer an element symbol from an atom name when the file omits it.
pub(crate) fn element_from_atom_name(name: &str) -> String {
    name.chars()
        .find(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_uppercase().to_string())
        .unwrap_or_default()
}
