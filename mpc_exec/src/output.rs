//! # Trajectory output
//!
//! Writes the simulated trajectory as plain text, one sample per line with
//! space separated values, so it can be plotted alongside the reference path.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

// External
use log::debug;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

// Internal
use crate::model::{Control, State};

// ---------------------------------------------------------------------------
// ENUMERATIONS
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("Cannot create the output directory {0:?}: {1}")]
    CreateDirError(PathBuf, std::io::Error),

    #[error("Cannot write the output file {0:?}: {1}")]
    WriteError(PathBuf, std::io::Error),
}

// ---------------------------------------------------------------------------
// PUBLIC FUNCTIONS
// ---------------------------------------------------------------------------

/// Write states as `x y theta` lines.
pub fn write_states<P: AsRef<Path>>(path: P, states: &[State]) -> Result<(), OutputError> {
    write_rows(path.as_ref(), states.iter().map(|x| x.as_slice()))
}

/// Write controls as `speed steer` lines.
pub fn write_controls<P: AsRef<Path>>(path: P, controls: &[Control]) -> Result<(), OutputError> {
    write_rows(path.as_ref(), controls.iter().map(|u| u.as_slice()))
}

// ---------------------------------------------------------------------------
// PRIVATE FUNCTIONS
// ---------------------------------------------------------------------------

fn write_rows<'a, I>(path: &Path, rows: I) -> Result<(), OutputError>
where
    I: Iterator<Item = &'a [f64]>,
{
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .map_err(|e| OutputError::CreateDirError(parent.to_path_buf(), e))?;
        }
    }

    let write_err = |e| OutputError::WriteError(path.to_path_buf(), e);

    let mut writer = BufWriter::new(File::create(path).map_err(write_err)?);
    let mut num_rows = 0;

    for row in rows {
        let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        writeln!(writer, "{}", line.join(" ")).map_err(write_err)?;
        num_rows += 1;
    }

    writer.flush().map_err(write_err)?;

    debug!("Wrote {} rows to {:?}", num_rows, path);

    Ok(())
}
