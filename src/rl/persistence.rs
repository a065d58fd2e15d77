//! Q-table persistence
//!
//! Tables are stored as a JSON object mapping each state key to its four
//! action values in action order (left, right, up, down):
//!
//! ```json
//! {"basic:R,U,0000,1": [0.12, 0.4, -0.03, 0.0]}
//! ```
//!
//! Writes go to a temporary file next to the destination which is then
//! renamed over it, so an interrupted save never leaves a truncated table.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use super::qtable::QTable;

/// Failure to read or write a persisted table
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("failed to read Q-table {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Q-table {path:?} is malformed")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Q-table {path:?} holds key {key:?}, expected keys of the '{expected}' representation")]
    ForeignKey {
        path: PathBuf,
        key: String,
        expected: String,
    },
    #[error("failed to write Q-table {path:?}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Save a table, creating parent directories if they don't exist
pub fn save_table(table: &QTable, path: &Path) -> Result<(), PersistenceError> {
    let write_err = |source| PersistenceError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(write_err)?;
    }

    let tmp_path = temp_path(path);
    let result = (|| {
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer(&mut writer, table)?;
        writer.flush()?;
        writer.get_ref().sync_all()?;
        fs::rename(&tmp_path, path)
    })();

    if let Err(source) = result {
        let _ = fs::remove_file(&tmp_path);
        return Err(write_err(source));
    }

    Ok(())
}

/// Load a table saved by [`save_table`]
///
/// A missing file yields an empty table. Any other read failure, malformed
/// JSON, a row without exactly one value per action, or a key produced by a
/// different representation than `strategy` is an error.
pub fn load_table(path: &Path, strategy: &str) -> Result<QTable, PersistenceError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(QTable::new()),
        Err(source) => {
            return Err(PersistenceError::Read {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    let table: QTable = serde_json::from_reader(BufReader::new(file)).map_err(|source| {
        PersistenceError::Malformed {
            path: path.to_path_buf(),
            source,
        }
    })?;

    if let Some(key) = table.keys().find(|k| k.strategy() != Some(strategy)) {
        return Err(PersistenceError::ForeignKey {
            path: path.to_path_buf(),
            key: key.to_string(),
            expected: strategy.to_string(),
        });
    }

    Ok(table)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}
