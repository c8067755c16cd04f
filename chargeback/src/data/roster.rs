//! Roster CSV loader

use std::fs::File;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::domain::RosterEntry;

/// Column holding the join key
pub const USER_NAME_COLUMN: &str = "user_name";

/// Default column holding the attribution target
pub const DEFAULT_TARGET_COLUMN: &str = "cost_center";

#[derive(Error, Debug)]
pub enum RosterError {
    #[error("Failed to open roster {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read roster {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Roster {path} has no '{column}' column")]
    MissingColumn { path: PathBuf, column: String },

    #[error("Roster {path} line {line}: empty {column}")]
    BlankUserName {
        path: PathBuf,
        line: u64,
        column: &'static str,
    },
}

/// Load roster entries from a CSV file with a header row.
///
/// Values are trimmed. Rows with an empty target are skipped; an empty user
/// name is an error. Other columns are ignored.
pub fn load_roster(path: &Path, target_column: &str) -> Result<Vec<RosterEntry>, RosterError> {
    let file = File::open(path).map_err(|source| RosterError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    read_roster(file, path, target_column)
}

fn read_roster<R: std::io::Read>(
    input: R,
    path: &Path,
    target_column: &str,
) -> Result<Vec<RosterEntry>, RosterError> {
    let csv_err = |source| RosterError::Csv {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(input);

    let headers = reader.headers().map_err(csv_err)?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| RosterError::MissingColumn {
                path: path.to_path_buf(),
                column: name.to_string(),
            })
    };
    let user_idx = column(USER_NAME_COLUMN)?;
    let target_idx = column(target_column)?;

    let mut entries = Vec::new();
    let mut skipped = 0usize;
    for row in reader.records() {
        let row = row.map_err(csv_err)?;
        let line = row.position().map(|p| p.line()).unwrap_or_default();

        let user_name = row.get(user_idx).unwrap_or_default();
        if user_name.is_empty() {
            return Err(RosterError::BlankUserName {
                path: path.to_path_buf(),
                line,
                column: USER_NAME_COLUMN,
            });
        }

        let target = row.get(target_idx).unwrap_or_default();
        if target.is_empty() {
            tracing::debug!(line, user_name, "Roster row without a target skipped");
            skipped += 1;
            continue;
        }

        entries.push(RosterEntry::new(user_name, target));
    }

    if skipped > 0 {
        tracing::warn!(
            skipped,
            column = target_column,
            "Roster rows without a target were ignored"
        );
    }
    tracing::debug!(
        entries = entries.len(),
        path = %path.display(),
        "Roster loaded"
    );
    Ok(entries)
}
