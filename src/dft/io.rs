/*
MIT License

Copyright (c) 2025 dmft-rs developers
*/

//! Native interchange files for the Kohn-Sham data
//!
//! Adaptors for specific electronic-structure codes convert their output
//! into these plain-text files once; everything downstream reads only
//! this format. Blank lines and `#` comments are skipped everywhere.
//!
//! ```text
//! case.kmesh:   "nkpt"                    then  "kx ky kz weight"
//! case.enk:     "nband nkpt nspin"        then  "band kpt spin energy occupation"
//! case.chipsi:  "nproj nband nkpt nspin"  then  nproj x "site desc",
//!                                         then  "proj band kpt spin re im"
//! ```

use super::{BandStructure, DftError, KMesh, ProjectorTrait, RawProjectors, Result};
use ndarray::{Array1, Array2, Array3, Array4};
use num_complex::Complex64;
use std::fs;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

/// Data lines of a file with the comment and blank lines stripped,
/// each paired with its 1-based line number
fn data_lines(path: &Path) -> Result<Vec<(usize, String)>> {
    let file = fs::File::open(path)?;
    let reader = BufReader::new(file);
    let mut lines = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        lines.push((idx + 1, trimmed.to_string()));
    }
    Ok(lines)
}

fn malformed(path: &Path, line: usize, reason: impl Into<String>) -> DftError {
    DftError::Malformed {
        file: path.display().to_string(),
        line,
        reason: reason.into(),
    }
}

fn parse_fields<T: std::str::FromStr>(
    path: &Path,
    line: usize,
    text: &str,
    expected: usize,
) -> Result<Vec<T>> {
    let fields: Vec<&str> = text.split_whitespace().collect();
    if fields.len() != expected {
        return Err(malformed(
            path,
            line,
            format!("expected {} fields, found {}", expected, fields.len()),
        ));
    }
    fields
        .iter()
        .map(|f| {
            f.parse::<T>()
                .map_err(|_| malformed(path, line, format!("cannot parse '{}'", f)))
        })
        .collect()
}

/// Read a k-mesh file
pub fn read_kmesh(path: &Path) -> Result<KMesh> {
    let lines = data_lines(path)?;
    let (first_no, header) = lines
        .first()
        .ok_or_else(|| malformed(path, 1, "empty file"))?;
    let nkpt = parse_fields::<usize>(path, *first_no, header, 1)?[0];
    if lines.len() != nkpt + 1 {
        return Err(malformed(
            path,
            *first_no,
            format!("header declares {} k-points, file holds {}", nkpt, lines.len() - 1),
        ));
    }

    let mut points = Array2::<f64>::zeros((nkpt, 3));
    let mut weights = Array1::<f64>::zeros(nkpt);
    for (k, (no, text)) in lines[1..].iter().enumerate() {
        let v = parse_fields::<f64>(path, *no, text, 4)?;
        points[(k, 0)] = v[0];
        points[(k, 1)] = v[1];
        points[(k, 2)] = v[2];
        weights[k] = v[3];
    }
    KMesh::new(points, weights)
}

/// Write a k-mesh file
pub fn write_kmesh(path: &Path, kmesh: &KMesh) -> Result<()> {
    let mut out = BufWriter::new(fs::File::create(path)?);
    writeln!(out, "{}", kmesh.nkpt())?;
    for k in 0..kmesh.nkpt() {
        writeln!(
            out,
            "{:.16e} {:.16e} {:.16e} {:.16e}",
            kmesh.points[(k, 0)],
            kmesh.points[(k, 1)],
            kmesh.points[(k, 2)],
            kmesh.weights[k]
        )?;
    }
    out.flush()?;
    Ok(())
}

/// Read a band-structure file
pub fn read_bands(path: &Path) -> Result<BandStructure> {
    let lines = data_lines(path)?;
    let (first_no, header) = lines
        .first()
        .ok_or_else(|| malformed(path, 1, "empty file"))?;
    let dims = parse_fields::<usize>(path, *first_no, header, 3)?;
    let (nband, nkpt, nspin) = (dims[0], dims[1], dims[2]);
    let expected = nband * nkpt * nspin;
    if lines.len() != expected + 1 {
        return Err(malformed(
            path,
            *first_no,
            format!("header declares {} entries, file holds {}", expected, lines.len() - 1),
        ));
    }

    let mut enk = Array3::<f64>::zeros((nband, nkpt, nspin));
    let mut occupy = Array3::<f64>::zeros((nband, nkpt, nspin));
    for (no, text) in &lines[1..] {
        let fields: Vec<&str> = text.split_whitespace().collect();
        if fields.len() != 5 {
            return Err(malformed(
                path,
                *no,
                format!("expected 5 fields, found {}", fields.len()),
            ));
        }
        let b: usize = fields[0]
            .parse()
            .map_err(|_| malformed(path, *no, "bad band index"))?;
        let k: usize = fields[1]
            .parse()
            .map_err(|_| malformed(path, *no, "bad k-point index"))?;
        let s: usize = fields[2]
            .parse()
            .map_err(|_| malformed(path, *no, "bad spin index"))?;
        if b >= nband || k >= nkpt || s >= nspin {
            return Err(malformed(path, *no, "index out of declared range"));
        }
        enk[(b, k, s)] = fields[3]
            .parse()
            .map_err(|_| malformed(path, *no, "bad energy"))?;
        occupy[(b, k, s)] = fields[4]
            .parse()
            .map_err(|_| malformed(path, *no, "bad occupation"))?;
    }
    BandStructure::new(enk, occupy)
}

/// Write a band-structure file
pub fn write_bands(path: &Path, bands: &BandStructure) -> Result<()> {
    let mut out = BufWriter::new(fs::File::create(path)?);
    writeln!(out, "{} {} {}", bands.nband(), bands.nkpt(), bands.nspin())?;
    for s in 0..bands.nspin() {
        for k in 0..bands.nkpt() {
            for b in 0..bands.nband() {
                writeln!(
                    out,
                    "{} {} {} {:.16e} {:.16e}",
                    b,
                    k,
                    s,
                    bands.enk[(b, k, s)],
                    bands.occupy[(b, k, s)]
                )?;
            }
        }
    }
    out.flush()?;
    Ok(())
}

/// Read a raw-projector file, checking against the band structure
pub fn read_projectors(path: &Path, bands: &BandStructure) -> Result<RawProjectors> {
    let lines = data_lines(path)?;
    let (first_no, header) = lines
        .first()
        .ok_or_else(|| malformed(path, 1, "empty file"))?;
    let dims = parse_fields::<usize>(path, *first_no, header, 4)?;
    let (nproj, nband, nkpt, nspin) = (dims[0], dims[1], dims[2], dims[3]);
    let expected = nproj + nproj * nband * nkpt * nspin;
    if lines.len() != expected + 1 {
        return Err(malformed(
            path,
            *first_no,
            format!("header declares {} lines, file holds {}", expected, lines.len() - 1),
        ));
    }

    let mut traits = Vec::with_capacity(nproj);
    for (no, text) in &lines[1..=nproj] {
        let fields: Vec<&str> = text.split_whitespace().collect();
        if fields.len() != 2 {
            return Err(malformed(path, *no, "trait line must be 'site desc'"));
        }
        let site: usize = fields[0]
            .parse()
            .map_err(|_| malformed(path, *no, "bad site index"))?;
        traits.push(ProjectorTrait::parse(site, fields[1])?);
    }

    let mut chipsi = Array4::<Complex64>::zeros((nproj, nband, nkpt, nspin));
    for (no, text) in &lines[nproj + 1..] {
        let fields: Vec<&str> = text.split_whitespace().collect();
        if fields.len() != 6 {
            return Err(malformed(
                path,
                *no,
                format!("expected 6 fields, found {}", fields.len()),
            ));
        }
        let p: usize = fields[0]
            .parse()
            .map_err(|_| malformed(path, *no, "bad projector index"))?;
        let b: usize = fields[1]
            .parse()
            .map_err(|_| malformed(path, *no, "bad band index"))?;
        let k: usize = fields[2]
            .parse()
            .map_err(|_| malformed(path, *no, "bad k-point index"))?;
        let s: usize = fields[3]
            .parse()
            .map_err(|_| malformed(path, *no, "bad spin index"))?;
        if p >= nproj || b >= nband || k >= nkpt || s >= nspin {
            return Err(malformed(path, *no, "index out of declared range"));
        }
        let re: f64 = fields[4]
            .parse()
            .map_err(|_| malformed(path, *no, "bad real part"))?;
        let im: f64 = fields[5]
            .parse()
            .map_err(|_| malformed(path, *no, "bad imaginary part"))?;
        chipsi[(p, b, k, s)] = Complex64::new(re, im);
    }
    RawProjectors::new(chipsi, traits, bands)
}

/// Write a raw-projector file
pub fn write_projectors(path: &Path, raw: &RawProjectors) -> Result<()> {
    let (nproj, nband, nkpt, nspin) = raw.chipsi.dim();
    let mut out = BufWriter::new(fs::File::create(path)?);
    writeln!(out, "{} {} {} {}", nproj, nband, nkpt, nspin)?;
    for t in &raw.traits {
        writeln!(out, "{} {}", t.site, t.desc)?;
    }
    for s in 0..nspin {
        for k in 0..nkpt {
            for b in 0..nband {
                for p in 0..nproj {
                    let v = raw.chipsi[(p, b, k, s)];
                    writeln!(out, "{} {} {} {} {:.16e} {:.16e}", p, b, k, s, v.re, v.im)?;
                }
            }
        }
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use tempfile::tempdir;

    #[test]
    fn test_kmesh_roundtrip_with_comments() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.kmesh");

        let mut points = Array2::zeros((2, 3));
        points[(1, 0)] = 0.5;
        let kmesh = KMesh::new(points, Array1::from_vec(vec![1.0, 3.0])).unwrap();
        write_kmesh(&path, &kmesh).unwrap();

        // Prepend a comment; the reader must skip it
        let text = fs::read_to_string(&path).unwrap();
        fs::write(&path, format!("# reduced mesh\n\n{}", text)).unwrap();

        let back = read_kmesh(&path).unwrap();
        assert_eq!(back.nkpt(), 2);
        assert_relative_eq!(back.points[(1, 0)], 0.5, epsilon = 1e-14);
        assert_relative_eq!(back.weight_sum(), 4.0, epsilon = 1e-14);
    }

    #[test]
    fn test_kmesh_count_mismatch() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.kmesh");
        fs::write(&path, "2\n0.0 0.0 0.0 1.0\n").unwrap();
        assert!(matches!(
            read_kmesh(&path),
            Err(DftError::Malformed { .. })
        ));
    }

    #[test]
    fn test_bands_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.enk");

        let enk = Array3::from_shape_fn((2, 2, 1), |(b, k, _)| b as f64 - 0.25 * k as f64);
        let occupy = Array3::from_elem((2, 2, 1), 1.0);
        let bands = BandStructure::new(enk, occupy).unwrap();
        write_bands(&path, &bands).unwrap();

        let back = read_bands(&path).unwrap();
        assert_eq!((back.nband(), back.nkpt(), back.nspin()), (2, 2, 1));
        assert_relative_eq!(back.enk[(1, 1, 0)], 0.75, epsilon = 1e-14);
    }

    #[test]
    fn test_bands_bad_index_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.enk");
        fs::write(&path, "1 1 1\n3 0 0 0.0 0.0\n").unwrap();
        assert!(matches!(
            read_bands(&path),
            Err(DftError::Malformed { .. })
        ));
    }

    #[test]
    fn test_projectors_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.chipsi");

        let bands = BandStructure::new(Array3::zeros((2, 1, 1)), Array3::zeros((2, 1, 1))).unwrap();
        let chipsi = Array4::from_shape_fn((1, 2, 1, 1), |(_, b, _, _)| {
            Complex64::new(0.5 + b as f64, -0.1)
        });
        let traits = vec![ProjectorTrait::parse(0, "s").unwrap()];
        let raw = RawProjectors::new(chipsi, traits, &bands).unwrap();
        write_projectors(&path, &raw).unwrap();

        let back = read_projectors(&path, &bands).unwrap();
        assert_eq!(back.nproj(), 1);
        assert_eq!(back.traits[0].desc, "s");
        assert_relative_eq!(back.chipsi[(0, 1, 0, 0)].re, 1.5, epsilon = 1e-14);
        assert_relative_eq!(back.chipsi[(0, 1, 0, 0)].im, -0.1, epsilon = 1e-14);
    }

    #[test]
    fn test_projectors_unknown_descriptor() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("t.chipsi");
        let bands = BandStructure::new(Array3::zeros((1, 1, 1)), Array3::zeros((1, 1, 1))).unwrap();
        fs::write(&path, "1 1 1 1\n0 q7\n0 0 0 0 1.0 0.0\n").unwrap();
        assert!(matches!(
            read_projectors(&path, &bands),
            Err(DftError::UnknownDescriptor(_))
        ));
    }
}
