//! Reader and writer for the `_atom_site` table of mmCIF files.

use crate::structure::model::{element_from_atom_name, Atom, RecordKind, StructuralModel};
use std::fmt::Write;

#[derive(Debug, Clone, PartialEq)]
enum Token {
    DataBlock(String),
    Loop,
    Reserved,
    Tag(String),
    Value(CifValue),
}

#[derive(Debug, Clone, PartialEq)]
struct CifValue {
    text: String,
    quoted: bool,
}

impl CifValue {
    fn is_null(&self) -> bool {
        !self.quoted && (self.text == "." || self.text == "?")
    }
}

#[derive(Debug, Default)]
struct CifLoop {
    tags: Vec<String>,
    values: Vec<CifValue>,
}

#[derive(Debug, Default)]
struct CifBlock {
    name: String,
    items: Vec<(String, CifValue)>,
    loops: Vec<CifLoop>,
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let mut tokens = Vec::new();
    let mut lines = input.lines().enumerate();

    while let Some((index, line)) = lines.next() {
        let Some(first) = line.strip_prefix(';') else {
            tokenize_line(line, index + 1, &mut tokens)?;
            continue;
        };

        let mut text = first.to_string();
        let mut closing = None;
        for (_, next) in lines.by_ref() {
            if let Some(rest) = next.strip_prefix(';') {
                closing = Some(rest);
                break;
            }
            text.push('\n');
            text.push_str(next);
        }

        let rest = closing
            .ok_or_else(|| format!("unterminated text field starting on line {}", index + 1))?;
        tokens.push(Token::Value(CifValue {
            text: text.trim().to_string(),
            quoted: true,
        }));
        tokenize_line(rest, index + 1, &mut tokens)?;
    }

    Ok(tokens)
}

fn tokenize_line(line: &str, line_no: usize, tokens: &mut Vec<Token>) -> Result<(), String> {
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }
        if c == '#' {
            break;
        }

        if c == '\'' || c == '"' {
            // A quote only closes the string when followed by whitespace or end of line
            let start = i + 1;
            let mut end = start;
            loop {
                if end >= chars.len() {
                    return Err(format!("unterminated quoted string on line {}", line_no));
                }
                if chars[end] == c && chars.get(end + 1).map_or(true, |n| n.is_whitespace()) {
                    break;
                }
                end += 1;
            }
            tokens.push(Token::Value(CifValue {
                text: chars[start..end].iter().collect(),
                quoted: true,
            }));
            i = end + 1;
            continue;
        }

        let start = i;
        while i < chars.len() && !chars[i].is_whitespace() {
            i += 1;
        }
        tokens.push(classify(chars[start..i].iter().collect()));
    }

    Ok(())
}

fn classify(word: String) -> Token {
    let lower = word.to_ascii_lowercase();
    if lower == "loop_" {
        Token::Loop
    } else if lower.starts_with("data_") {
        Token::DataBlock(word[5..].to_string())
    } else if lower.starts_with("save_") || lower == "global_" || lower == "stop_" {
        Token::Reserved
    } else if word.starts_with('_') {
        Token::Tag(lower)
    } else {
        Token::Value(CifValue {
            text: word,
            quoted: false,
        })
    }
}

/// Parse the first data block of a CIF document.
fn parse_block(tokens: Vec<Token>) -> Result<CifBlock, String> {
    let mut iter = tokens.into_iter().peekable();

    let name = match iter.next() {
        Some(Token::DataBlock(name)) => name,
        Some(_) => return Err("missing data_ block header".to_string()),
        None => return Err("file is empty".to_string()),
    };

    let mut block = CifBlock {
        name,
        ..CifBlock::default()
    };

    while let Some(token) = iter.next() {
        match token {
            Token::DataBlock(_) => break,
            Token::Reserved => {}
            Token::Loop => {
                let mut cif_loop = CifLoop::default();
                while matches!(iter.peek(), Some(Token::Tag(_))) {
                    if let Some(Token::Tag(tag)) = iter.next() {
                        cif_loop.tags.push(tag);
                    }
                }
                if cif_loop.tags.is_empty() {
                    return Err("loop_ without column tags".to_string());
                }
                while matches!(iter.peek(), Some(Token::Value(_))) {
                    if let Some(Token::Value(value)) = iter.next() {
                        cif_loop.values.push(value);
                    }
                }
                if cif_loop.values.len() % cif_loop.tags.len() != 0 {
                    return Err(format!(
                        "loop starting with {} has {} values, not a multiple of its {} columns",
                        cif_loop.tags[0],
                        cif_loop.values.len(),
                        cif_loop.tags.len()
                    ));
                }
                block.loops.push(cif_loop);
            }
            Token::Tag(tag) => match iter.next() {
                Some(Token::Value(value)) => block.items.push((tag, value)),
                _ => return Err(format!("tag {} has no value", tag)),
            },
            Token::Value(value) => {
                return Err(format!("unexpected value '{}' outside of a loop", value.text));
            }
        }
    }

    Ok(block)
}

const ATOM_SITE: &str = "_atom_site.";

struct AtomSiteTable {
    columns: Vec<String>,
    rows: Vec<Vec<CifValue>>,
}

impl AtomSiteTable {
    fn from_block(block: CifBlock) -> Result<Self, String> {
        if let Some(cif_loop) = block
            .loops
            .into_iter()
            .find(|l| l.tags.iter().all(|t| t.starts_with(ATOM_SITE)))
        {
            let columns: Vec<String> = cif_loop
                .tags
                .iter()
                .map(|t| t[ATOM_SITE.len()..].to_string())
                .collect();
            let rows = cif_loop
                .values
                .chunks(columns.len())
                .map(|chunk| chunk.to_vec())
                .collect();
            return Ok(Self { columns, rows });
        }

        let (columns, row): (Vec<String>, Vec<CifValue>) = block
            .items
            .into_iter()
            .filter(|(tag, _)| tag.starts_with(ATOM_SITE))
            .map(|(tag, value)| (tag[ATOM_SITE.len()..].to_string(), value))
            .unzip();

        if columns.is_empty() {
            return Err("no _atom_site records found".to_string());
        }

        Ok(Self {
            columns,
            rows: vec![row],
        })
    }

    fn column(&self, names: &[&str]) -> Option<usize> {
        names
            .iter()
            .find_map(|name| self.columns.iter().position(|c| c == name))
    }

    fn required(&self, names: &[&str]) -> Result<usize, String> {
        self.column(names)
            .ok_or_else(|| format!("_atom_site table has no {} column", names[0]))
    }
}

fn value<'a>(row: &'a [CifValue], column: Option<usize>) -> Option<&'a str> {
    column
        .and_then(|i| row.get(i))
        .filter(|v| !v.is_null())
        .map(|v| v.text.as_str())
}

fn number<T: std::str::FromStr>(
    row: &[CifValue],
    column: Option<usize>,
    field: &str,
    row_no: usize,
) -> Result<Option<T>, String> {
    match value(row, column) {
        Some(text) => text
            .parse::<T>()
            .map(Some)
            .map_err(|_| format!("atom {} has non-numeric {}: '{}'", row_no, field, text)),
        None => Ok(None),
    }
}

/// Parse mmCIF text into a structural model.
pub fn parse_str(input: &str) -> Result<StructuralModel, String> {
    let block = parse_block(tokenize(input)?)?;
    let id = block.name.clone();
    let table = AtomSiteTable::from_block(block)?;

    let x = table.required(&["cartn_x"])?;
    let y = table.required(&["cartn_y"])?;
    let z = table.required(&["cartn_z"])?;
    let atom_name = table.required(&["auth_atom_id", "label_atom_id"])?;
    let residue_name = table.required(&["auth_comp_id", "label_comp_id"])?;
    let chain = table.required(&["auth_asym_id", "label_asym_id"])?;

    let group = table.column(&["group_pdb"]);
    let serial = table.column(&["id"]);
    let element = table.column(&["type_symbol"]);
    let alt_loc = table.column(&["label_alt_id"]);
    let residue_seq = table.column(&["auth_seq_id", "label_seq_id"]);
    let insertion = table.column(&["pdbx_pdb_ins_code"]);
    let occupancy = table.column(&["occupancy"]);
    let b_factor = table.column(&["b_iso_or_equiv"]);
    let charge = table.column(&["pdbx_formal_charge"]);
    let model = table.column(&["pdbx_pdb_model_num"]);

    let mut structure = StructuralModel::new(id);
    for (index, row) in table.rows.iter().enumerate() {
        let row_no = index + 1;
        let coordinate = |column: usize, field: &str| -> Result<f64, String> {
            number::<f64>(row, Some(column), field, row_no)?
                .ok_or_else(|| format!("atom {} has no {} coordinate", row_no, field))
        };

        let name = value(row, Some(atom_name)).unwrap_or("").to_string();
        let element = value(row, element)
            .map(|e| e.to_ascii_uppercase())
            .unwrap_or_else(|| element_from_atom_name(&name));

        structure.atoms.push(Atom {
            record: RecordKind::from_group(value(row, group).unwrap_or("ATOM")),
            serial: number::<u32>(row, serial, "id", row_no)?.unwrap_or(row_no as u32),
            alt_loc: value(row, alt_loc).and_then(|v| v.chars().next()),
            residue_name: value(row, Some(residue_name)).unwrap_or("").to_string(),
            chain_id: value(row, Some(chain)).unwrap_or("").to_string(),
            residue_seq: number::<i32>(row, residue_seq, "seq_id", row_no)?.unwrap_or(0),
            insertion_code: value(row, insertion).and_then(|v| v.chars().next()),
            x: coordinate(x, "Cartn_x")?,
            y: coordinate(y, "Cartn_y")?,
            z: coordinate(z, "Cartn_z")?,
            occupancy: number::<f64>(row, occupancy, "occupancy", row_no)?.unwrap_or(1.0),
            b_factor: number::<f64>(row, b_factor, "B_iso_or_equiv", row_no)?.unwrap_or(0.0),
            charge: value(row, charge).and_then(|v| v.parse::<i32>().ok()),
            model: number::<u32>(row, model, "pdbx_PDB_model_num", row_no)?.unwrap_or(1),
            element,
            name,
        });
    }

    if structure.atoms.is_empty() {
        return Err("_atom_site table is empty".to_string());
    }

    Ok(structure)
}

const WRITTEN_COLUMNS: &[&str] = &[
    "group_PDB",
    "id",
    "type_symbol",
    "label_atom_id",
    "label_alt_id",
    "label_comp_id",
    "label_asym_id",
    "label_seq_id",
    "pdbx_PDB_ins_code",
    "Cartn_x",
    "Cartn_y",
    "Cartn_z",
    "occupancy",
    "B_iso_or_equiv",
    "pdbx_formal_charge",
    "auth_seq_id",
    "auth_comp_id",
    "auth_asym_id",
    "auth_atom_id",
    "pdbx_PDB_model_num",
];

fn format_value(text: &str) -> String {
    if text.is_empty() {
        return ".".to_string();
    }

    let lower = text.to_ascii_lowercase();
    let needs_quotes = text.chars().any(char::is_whitespace)
        || text.starts_with(['_', '#', '$', '\'', '"', '[', ']', ';'])
        || text == "."
        || text == "?"
        || lower == "loop_"
        || lower == "global_"
        || lower == "stop_"
        || lower.starts_with("data_")
        || lower.starts_with("save_");

    if !needs_quotes {
        text.to_string()
    } else if text.contains('"') {
        format!("'{}'", text)
    } else {
        format!("\"{}\"", text)
    }
}

fn block_name(id: &str) -> String {
    let name: String = id
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .collect();
    if name.is_empty() {
        "structure".to_string()
    } else {
        name
    }
}

/// Serialize a structural model as an mmCIF `_atom_site` loop.
pub fn write_string(model: &StructuralModel) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "data_{}", block_name(&model.id));
    out.push_str("#\nloop_\n");
    for column in WRITTEN_COLUMNS {
        let _ = writeln!(out, "{}{}", ATOM_SITE, column);
    }

    for atom in &model.atoms {
        let alt_loc = atom.alt_loc.map(String::from).unwrap_or_else(|| ".".to_string());
        let insertion = atom
            .insertion_code
            .map(String::from)
            .unwrap_or_else(|| "?".to_string());
        let charge = atom
            .charge
            .map(|c| c.to_string())
            .unwrap_or_else(|| "?".to_string());
        let name = format_value(&atom.name);
        let residue = format_value(&atom.residue_name);
        let chain = format_value(&atom.chain_id);

        let _ = writeln!(
            out,
            "{} {} {} {} {} {} {} {} {} {:.3} {:.3} {:.3} {:.2} {:.2} {} {} {} {} {} {}",
            atom.record.as_str(),
            atom.serial,
            format_value(&atom.element),
            name,
            alt_loc,
            residue,
            chain,
            atom.residue_seq,
            insertion,
            atom.x,
            atom.y,
            atom.z,
            atom.occupancy,
            atom.b_factor,
            charge,
            atom.residue_seq,
            residue,
            chain,
            name,
            atom.model,
        );
    }

    out.push_str("#\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::structure::fixtures::SAMPLE_CIF as SAMPLE;

    #[test]
    fn test_parse_atom_site_loop() {
        let model = parse_str(SAMPLE).unwrap();

        assert_eq!(model.id, "fold_test_model_0");
        assert_eq!(model.atom_count(), 4);
        assert_eq!(model.chain_ids(), vec!["A", "B"]);

        let ca = &model.atoms[1];
        assert_eq!(ca.name, "CA");
        assert_eq!(ca.residue_name, "MET");
        assert_eq!(ca.element, "C");
        assert!((ca.x - 13.1).abs() < 1e-9);

        let water = &model.atoms[3];
        assert_eq!(water.record, RecordKind::Hetatm);
        assert_eq!(water.name, "O5'");
        assert_eq!(water.residue_seq, 101);
        assert_eq!(water.alt_loc, None);
    }

    #[test]
    fn test_missing_header_is_rejected() {
        let err = parse_str("loop_\n_atom_site.id\n1\n").unwrap_err();
        assert!(err.contains("data_"));

        assert!(parse_str("").is_err());
    }

    #[test]
    fn test_missing_atom_site_is_rejected() {
        let err = parse_str("data_x\n_entry.id x\n").unwrap_err();
        assert!(err.contains("_atom_site"));
    }

    #[test]
    fn test_ragged_loop_is_rejected() {
        let input = "data_x\nloop_\n_atom_site.id\n_atom_site.Cartn_x\n1 2.0 3\n";
        let err = parse_str(input).unwrap_err();
        assert!(err.contains("not a multiple"));
    }

    #[test]
    fn test_non_numeric_coordinate_is_rejected() {
        let input = "data_x
loop_
_atom_site.label_atom_id
_atom_site.label_comp_id
_atom_site.label_asym_id
_atom_site.Cartn_x
_atom_site.Cartn_y
_atom_site.Cartn_z
CA GLY A abc 1.0 2.0
";
        let err = parse_str(input).unwrap_err();
        assert!(err.contains("Cartn_x"));
    }

    #[test]
    fn test_text_fields_and_comments() {
        let input = "data_x
_struct.title
;A multi-line
title
;
# a comment line
_atom_site.label_atom_id CA # trailing comment
_atom_site.label_comp_id GLY
_atom_site.label_asym_id A
_atom_site.Cartn_x 1.5
_atom_site.Cartn_y 2.5
_atom_site.Cartn_z 3.5
";
        let model = parse_str(input).unwrap();
        assert_eq!(model.atom_count(), 1);
        assert_eq!(model.atoms[0].name, "CA");
        assert!((model.atoms[0].z - 3.5).abs() < 1e-9);
    }

    #[test]
    fn test_auth_identifiers_take_precedence() {
        let input = "data_x
loop_
_atom_site.label_atom_id
_atom_site.label_comp_id
_atom_site.label_asym_id
_atom_site.auth_asym_id
_atom_site.Cartn_x
_atom_site.Cartn_y
_atom_site.Cartn_z
CA GLY A X 1.0 2.0 3.0
";
        let model = parse_str(input).unwrap();
        assert_eq!(model.atoms[0].chain_id, "X");
    }

    #[test]
    fn test_written_cif_parses_back() {
        let model = parse_str(SAMPLE).unwrap();
        let text = write_string(&model);

        assert!(text.starts_with("data_fold_test_model_0\n"));
        let reparsed = parse_str(&text).unwrap();
        assert_eq!(reparsed.atom_count(), model.atom_count());
        assert_eq!(reparsed.chain_ids(), model.chain_ids());
        assert_eq!(reparsed.atoms[3].name, "O5'");
    }

    #[test]
    fn test_format_value_quoting() {
        assert_eq!(format_value("CA"), "CA");
        assert_eq!(format_value("O5'"), "O5'");
        assert_eq!(format_value("two words"), "\"two words\"");
        assert_eq!(format_value("."), "\".\"");
        assert_eq!(format_value(""), ".");
    }
}
