//! Common fixtures for dirspec integration tests.
//!
//! Builds small on-disk experiment directories and binary MAT fixtures so the
//! tests exercise real filesystem matching and real file parsing.

// Allow dead code because these utilities are shared across test files and
// not every test file uses every helper
#![allow(dead_code)]

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// A representative experiment directory:
///
/// ```text
/// sub_m77/
///   2020-01-01/trial_01.bin
///   2020-01-01/trial_02.bin
///   session.json
///   notes.yaml
/// ```
pub fn session_tree() -> Result<TempDir> {
    let dir = TempDir::new().context("failed to create temp dir")?;
    let base = dir.path();

    fs::create_dir_all(base.join("sub_m77/2020-01-01"))?;
    fs::write(base.join("sub_m77/2020-01-01/trial_01.bin"), b"")?;
    fs::write(base.join("sub_m77/2020-01-01/trial_02.bin"), b"")?;
    fs::write(
        base.join("sub_m77/session.json"),
        r#"{"session": {"experimenter": "jonny", "weights": [23.4, 23.1]}}"#,
    )?;
    fs::write(
        base.join("sub_m77/notes.yaml"),
        "rig: box2\nprobes:\n  - NP1\n  - NP2\n",
    )?;

    Ok(dir)
}

/// Writes a MATLAB level-5 file containing the given double arrays.
///
/// Each entry is `(variable name, dimensions, column-major values)`. The
/// format is the documented MAT 5 layout: a 128-byte header followed by one
/// miMATRIX element per variable.
pub fn write_mat_f64(path: &Path, arrays: &[(&str, &[usize], &[f64])]) -> Result<()> {
    let mut buf = Vec::new();

    // 116-byte description, 8-byte subsystem offset, version, endianness
    let mut description = b"MATLAB 5.0 MAT-file, written by dirspec tests".to_vec();
    description.resize(116, b' ');
    buf.extend_from_slice(&description);
    buf.extend_from_slice(&[0u8; 8]);
    buf.extend_from_slice(&0x0100u16.to_le_bytes());
    buf.extend_from_slice(b"IM");

    for (name, dims, values) in arrays {
        buf.extend_from_slice(&matrix_element(name, dims, values));
    }

    fs::write(path, buf).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

const MI_INT8: u32 = 1;
const MI_INT32: u32 = 5;
const MI_UINT32: u32 = 6;
const MI_DOUBLE: u32 = 9;
const MI_MATRIX: u32 = 14;
const MX_DOUBLE_CLASS: u32 = 6;

fn matrix_element(name: &str, dims: &[usize], values: &[f64]) -> Vec<u8> {
    let mut body = Vec::new();

    // array flags subelement
    body.extend_from_slice(&MI_UINT32.to_le_bytes());
    body.extend_from_slice(&8u32.to_le_bytes());
    body.extend_from_slice(&MX_DOUBLE_CLASS.to_le_bytes());
    body.extend_from_slice(&0u32.to_le_bytes());

    // dimensions subelement
    body.extend_from_slice(&MI_INT32.to_le_bytes());
    body.extend_from_slice(&((dims.len() * 4) as u32).to_le_bytes());
    for dim in dims {
        body.extend_from_slice(&(*dim as i32).to_le_bytes());
    }
    pad_to_8(&mut body);

    // array name subelement
    body.extend_from_slice(&MI_INT8.to_le_bytes());
    body.extend_from_slice(&(name.len() as u32).to_le_bytes());
    body.extend_from_slice(name.as_bytes());
    pad_to_8(&mut body);

    // real part subelement
    body.extend_from_slice(&MI_DOUBLE.to_le_bytes());
    body.extend_from_slice(&((values.len() * 8) as u32).to_le_bytes());
    for value in values {
        body.extend_from_slice(&value.to_le_bytes());
    }
    pad_to_8(&mut body);

    let mut element = Vec::with_capacity(body.len() + 8);
    element.extend_from_slice(&MI_MATRIX.to_le_bytes());
    element.extend_from_slice(&(body.len() as u32).to_le_bytes());
    element.extend_from_slice(&body);
    element
}

fn pad_to_8(buf: &mut Vec<u8>) {
    while buf.len() % 8 != 0 {
        buf.push(0);
    }
}
