//! Fixed-column PDB coordinate records.

use crate::structure::model::{element_from_atom_name, Atom, RecordKind, StructuralModel};
use std::fmt::Write;

const MAX_SERIAL: u32 = 99_999;

fn fixed(value: f64, width: usize, precision: usize, field: &str) -> Result<String, String> {
    let text = format!("{:>width$.precision$}", value, width = width, precision = precision);
    if text.len() > width || !value.is_finite() {
        return Err(format!(
            "{} value {} does not fit in {} columns",
            field, value, width
        ));
    }
    Ok(text)
}

fn padded_atom_name(atom: &Atom) -> String {
    // Names of one-letter elements start in column 14
    if atom.name.len() < 4 && atom.element.len() <= 1 {
        format!(" {:<3}", atom.name)
    } else {
        format!("{:<4}", atom.name)
    }
}

fn format_charge(charge: Option<i32>) -> Result<String, String> {
    match charge {
        None | Some(0) => Ok("  ".to_string()),
        Some(c) if (-9..=9).contains(&c) => Ok(format!(
            "{}{}",
            c.unsigned_abs(),
            if c > 0 { '+' } else { '-' }
        )),
        Some(c) => Err(format!("formal charge {} does not fit in 2 columns", c)),
    }
}

fn check_identifiers(atom: &Atom) -> Result<(), String> {
    // Widths below are counted in bytes once everything is ASCII
    for (field, text) in [
        ("chain identifier", atom.chain_id.as_str()),
        ("residue name", atom.residue_name.as_str()),
        ("atom name", atom.name.as_str()),
        ("element", atom.element.as_str()),
    ] {
        if !text.is_ascii() {
            return Err(format!("{} '{}' is not ASCII", field, text));
        }
    }
    for (field, code) in [
        ("alternate location", atom.alt_loc),
        ("insertion code", atom.insertion_code),
    ] {
        if let Some(c) = code.filter(|c| !c.is_ascii()) {
            return Err(format!("{} '{}' is not ASCII", field, c));
        }
    }
    if atom.chain_id.chars().count() > 1 {
        return Err(format!(
            "chain identifier '{}' is longer than one character",
            atom.chain_id
        ));
    }
    if atom.residue_name.chars().count() > 3 {
        return Err(format!(
            "residue name '{}' is longer than three characters",
            atom.residue_name
        ));
    }
    if atom.name.chars().count() > 4 {
        return Err(format!("atom name '{}' is longer than four characters", atom.name));
    }
    if atom.element.chars().count() > 2 {
        return Err(format!("element '{}' is longer than two characters", atom.element));
    }
    if !(-999..=9999).contains(&atom.residue_seq) {
        return Err(format!(
            "residue number {} does not fit in 4 columns",
            atom.residue_seq
        ));
    }
    Ok(())
}

fn chain_char(atom: &Atom) -> char {
    atom.chain_id.chars().next().unwrap_or(' ')
}

fn format_atom_line(serial: u32, atom: &Atom) -> Result<String, String> {
    check_identifiers(atom)?;

    Ok(format!(
        "{:<6}{:>5} {}{}{:>3} {}{:>4}{}   {}{}{}{}{}          {:>2}{}",
        atom.record.as_str(),
        serial,
        padded_atom_name(atom),
        atom.alt_loc.unwrap_or(' '),
        atom.residue_name,
        chain_char(atom),
        atom.residue_seq,
        atom.insertion_code.unwrap_or(' '),
        fixed(atom.x, 8, 3, "x coordinate")?,
        fixed(atom.y, 8, 3, "y coordinate")?,
        fixed(atom.z, 8, 3, "z coordinate")?,
        fixed(atom.occupancy, 6, 2, "occupancy")?,
        fixed(atom.b_factor, 6, 2, "B-factor")?,
        atom.element.to_ascii_uppercase(),
        format_charge(atom.charge)?,
    ))
}

fn format_ter_line(serial: u32, atom: &Atom) -> String {
    format!(
        "TER   {:>5}      {:>3} {}{:>4}{}",
        serial,
        atom.residue_name,
        chain_char(atom),
        atom.residue_seq,
        atom.insertion_code.unwrap_or(' '),
    )
}

fn next_serial(serial: &mut u32) -> Result<u32, String> {
    *serial += 1;
    if *serial > MAX_SERIAL {
        return Err(format!(
            "structure has more than {} records per model",
            MAX_SERIAL
        ));
    }
    Ok(*serial)
}

/// Serialize a structural model as PDB coordinate records.
///
/// Atoms are renumbered from 1 in every model. A `TER` record closes the
/// polymer part of each chain and `MODEL`/`ENDMDL` wrap models only when
/// there is more than one.
pub fn write_string(model: &StructuralModel) -> Result<String, String> {
    let models = model.model_numbers();
    let multi_model = models.len() > 1;
    let mut out = String::new();

    for model_no in models {
        if multi_model {
            let _ = writeln!(out, "MODEL     {:>4}", model_no);
        }

        let atoms: Vec<&Atom> = model.atoms.iter().filter(|a| a.model == model_no).collect();
        let mut serial = 0;
        for (i, atom) in atoms.iter().enumerate() {
            let line = format_atom_line(next_serial(&mut serial)?, atom)?;
            out.push_str(&line);
            out.push('\n');

            let polymer_ends = atom.record == RecordKind::Atom
                && atoms
                    .get(i + 1)
                    .map_or(true, |n| n.chain_id != atom.chain_id || n.record != RecordKind::Atom);
            if polymer_ends {
                out.push_str(&format_ter_line(next_serial(&mut serial)?, atom));
                out.push('\n');
            }
        }

        if multi_model {
            out.push_str("ENDMDL\n");
        }
    }

    out.push_str("END\n");
    Ok(out)
}

fn column(line: &str, start: usize, end: usize) -> &str {
    let end = end.min(line.len());
    if start >= end {
        return "";
    }
    line.get(start..end).unwrap_or("")
}

fn column_char(line: &str, index: usize) -> Option<char> {
    column(line, index, index + 1)
        .chars()
        .next()
        .filter(|c| !c.is_whitespace())
}

fn parse_atom_line(line: &str, line_no: usize, model: u32, fallback_serial: u32) -> Result<Atom, String> {
    let coordinate = |start: usize, field: &str| -> Result<f64, String> {
        let text = column(line, start, start + 8).trim();
        text.parse::<f64>()
            .map_err(|_| format!("line {} has invalid {} coordinate '{}'", line_no, field, text))
    };
    let optional = |start: usize, end: usize, default: f64| -> f64 {
        column(line, start, end).trim().parse::<f64>().unwrap_or(default)
    };

    let name = column(line, 12, 16).trim().to_string();
    let residue_seq_text = column(line, 22, 26).trim();
    let residue_seq = if residue_seq_text.is_empty() {
        0
    } else {
        residue_seq_text
            .parse::<i32>()
            .map_err(|_| format!("line {} has invalid residue number '{}'", line_no, residue_seq_text))?
    };

    let element = match column(line, 76, 78).trim() {
        "" => element_from_atom_name(&name),
        e => e.to_ascii_uppercase(),
    };

    let charge_text = column(line, 78, 80).trim();
    let charge = match (charge_text.get(..1), charge_text.get(1..2)) {
        (Some(d), Some("+")) => d.parse::<i32>().ok(),
        (Some(d), Some("-")) => d.parse::<i32>().ok().map(|c| -c),
        _ => None,
    };

    Ok(Atom {
        record: RecordKind::from_group(column(line, 0, 6).trim()),
        serial: column(line, 6, 11).trim().parse::<u32>().unwrap_or(fallback_serial),
        alt_loc: column_char(line, 16),
        residue_name: column(line, 17, 20).trim().to_string(),
        chain_id: column(line, 21, 22).trim().to_string(),
        residue_seq,
        insertion_code: column_char(line, 26),
        x: coordinate(30, "x")?,
        y: coordinate(38, "y")?,
        z: coordinate(46, "z")?,
        occupancy: optional(54, 60, 1.0),
        b_factor: optional(60, 66, 0.0),
        element,
        charge,
        model,
        name,
    })
}

/// Parse PDB coordinate records into a structural model.
pub fn parse_str(input: &str, id: &str) -> Result<StructuralModel, String> {
    let mut structure = StructuralModel::new(id);
    let mut model_no = 1;

    for (index, line) in input.lines().enumerate() {
        match column(line, 0, 6).trim_end() {
            "MODEL" => {
                let text = column(line, 6, line.len()).trim();
                model_no = text
                    .parse::<u32>()
                    .map_err(|_| format!("line {} has invalid model number '{}'", index + 1, text))?;
            }
            "ATOM" | "HETATM" => {
                let fallback = structure.atoms.len() as u32 + 1;
                structure
                    .atoms
                    .push(parse_atom_line(line, index + 1, model_no, fallback)?);
            }
            _ => {}
        }
    }

    if structure.atoms.is_empty() {
        return Err("no ATOM or HETATM records found".to_string());
    }

    Ok(structure)
}
