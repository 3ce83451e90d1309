//! Persistence of the strategic layer's value table between runs.

use std::fs::File;
use std::io::{self, BufReader, Write};
use std::path::Path;

use crate::control::ValueTable;
use crate::error::SimError;

/// Reads a value table saved by [`save_table`].
///
/// # Errors
///
/// Returns [`SimError::Io`] if the file cannot be opened and
/// [`SimError::Json`] if it is not a value table.
pub fn load_table(path: &Path) -> Result<ValueTable, SimError> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

/// Writes `table` as JSON.
///
/// # Errors
///
/// Returns [`SimError`] if the file cannot be created or written.
pub fn save_table(table: &ValueTable, path: &Path) -> Result<(), SimError> {
    let mut buf = io::BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut buf, table)?;
    buf.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_io_error() {
        let err = load_table(Path::new("/nonexistent/dir/table.json")).unwrap_err();
        assert!(matches!(err, SimError::Io(_)));
    }

    #[test]
    fn saved_table_loads_back() {
        let dir = std::env::temp_dir().join(format!("naheo-table-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("table.json");
        let table = ValueTable::new(4, vec![0.1, 1.0], -0.5);
        save_table(&table, &path).unwrap();
        assert_eq!(load_table(&path).unwrap(), table);
        std::fs::remove_dir_all(&dir).ok();
    }
}
