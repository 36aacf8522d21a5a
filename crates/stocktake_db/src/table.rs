//! CSV table I/O shared by the user store and the scan ledger.
//!
//! Tables are a header row followed by one row per record. Writes go to a
//! temp file in the same directory which is then renamed over the target,
//! so a concurrent reader sees either the old table or the new one.

use crate::error::StorageError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

/// A parsed row together with the 1-based line it came from.
pub(crate) struct Row<T> {
    pub line: u64,
    pub value: T,
}

/// Read every row of a table.
///
/// Returns `Ok(None)` if the file does not exist. An empty file (not even a
/// header) reads as an empty table.
pub(crate) fn read_table<T: DeserializeOwned>(
    path: &Path,
    required: &[&str],
) -> Result<Option<Vec<Row<T>>>, StorageError> {
    let file = match File::open(path) {
        Ok(file) => file,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StorageError::io(path, e)),
    };

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .from_reader(file);

    let headers = reader
        .headers()
        .map_err(|e| StorageError::csv(path, e))?
        .clone();
    if headers.is_empty() {
        return Ok(Some(Vec::new()));
    }
    for column in required {
        if !headers.iter().any(|h| h == *column) {
            return Err(StorageError::corrupt(
                path,
                1,
                format!("missing column '{}'", column),
            ));
        }
    }

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| StorageError::csv(path, e))?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        if record.iter().all(|field| field.trim().is_empty()) {
            continue;
        }
        let value = record
            .deserialize::<T>(Some(&headers))
            .map_err(|e| StorageError::corrupt(path, line, describe_csv_error(&e)))?;
        rows.push(Row { line, value });
    }

    debug!(rows = rows.len(), "Read table {}", path.display());
    Ok(Some(rows))
}

fn describe_csv_error(err: &csv::Error) -> String {
    match err.kind() {
        csv::ErrorKind::Deserialize { err, .. } => match err.field() {
            Some(field) => format!("field {}: {}", field + 1, err.kind()),
            None => err.kind().to_string(),
        },
        _ => err.to_string(),
    }
}

/// Replace a table with `rows`, atomically.
pub(crate) fn write_table<'a, T, I>(path: &Path, headers: &[&str], rows: I) -> Result<(), StorageError>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let temp_path = temp_path_for(path);
    let result = write_rows(&temp_path, headers, rows).and_then(|()| {
        fs::rename(&temp_path, path).map_err(|e| StorageError::io(path, e))
    });
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
        return result;
    }
    sync_parent(path);
    Ok(())
}

fn write_rows<'a, T, I>(temp_path: &Path, headers: &[&str], rows: I) -> Result<(), StorageError>
where
    T: Serialize + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let file = File::create(temp_path).map_err(|e| StorageError::io(temp_path, e))?;
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(file);

    writer
        .write_record(headers)
        .map_err(|e| StorageError::csv(temp_path, e))?;
    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| StorageError::csv(temp_path, e))?;
    }

    let mut file = writer
        .into_inner()
        .map_err(|e| StorageError::io(temp_path, e.into_error()))?;
    file.flush().map_err(|e| StorageError::io(temp_path, e))?;
    file.sync_all().map_err(|e| StorageError::io(temp_path, e))?;
    Ok(())
}

/// Write a small text file atomically (temp file + rename).
pub(crate) fn write_text(path: &Path, content: &str) -> Result<(), StorageError> {
    let temp_path = temp_path_for(path);
    let result = (|| {
        let mut file = File::create(&temp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        fs::rename(&temp_path, path)
    })();
    if let Err(e) = result {
        let _ = fs::remove_file(&temp_path);
        return Err(StorageError::io(path, e));
    }
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "table".to_string());
    parent.join(format!(".{}.tmp_{}", name, uuid::Uuid::new_v4()))
}

#[cfg(unix)]
fn sync_parent(path: &Path) {
    if let Some(parent) = path.parent() {
        let dir = if parent.as_os_str().is_empty() {
            Path::new(".")
        } else {
            parent
        };
        if let Err(e) = File::open(dir).and_then(|d| d.sync_all()) {
            debug!("Failed to sync directory {}: {}", dir.display(), e);
        }
    }
}

#[cfg(not(unix))]
fn sync_parent(_path: &Path) {}

/// Create the parent directory of a table path if needed.
pub(crate) fn ensure_parent(path: &Path) -> Result<(), StorageError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Pair {
        key: String,
        value: u32,
    }

    #[test]
    fn test_missing_file_is_none() {
        let temp = TempDir::new().unwrap();
        let rows = read_table::<Pair>(&temp.path().join("absent.csv"), &["key"]).unwrap();
        assert!(rows.is_none());
    }

    #[test]
    fn test_write_then_read() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("pairs.csv");
        let pairs = vec![
            Pair { key: "a,b".to_string(), value: 1 },
            Pair { key: "c".to_string(), value: 2 },
        ];
        write_table(&path, &["key", "value"], &pairs).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.starts_with("key,value\n"));
        assert!(content.contains("\"a,b\",1"));

        let rows = read_table::<Pair>(&path, &["key", "value"]).unwrap().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].line, 2);
        assert_eq!(rows[1].value, pairs[1]);
    }

    #[test]
    fn test_empty_table_keeps_header() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("pairs.csv");
        write_table::<Pair, _>(&path, &["key", "value"], &[]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "key,value\n");
        let rows = read_table::<Pair>(&path, &["key", "value"]).unwrap().unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn test_missing_column_is_corrupt() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("pairs.csv");
        fs::write(&path, "key\nx\n").unwrap();
        let err = read_table::<Pair>(&path, &["key", "value"]).err().unwrap();
        assert!(matches!(err, StorageError::Corrupt { line: 1, .. }));
    }

    #[test]
    fn test_bad_row_reports_line() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("pairs.csv");
        fs::write(&path, "key,value\na,1\nb,notanumber\n").unwrap();
        let err = read_table::<Pair>(&path, &["key", "value"]).err().unwrap();
        assert!(matches!(err, StorageError::Corrupt { line: 3, .. }));
    }

    #[test]
    fn test_no_temp_files_left_behind() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("pairs.csv");
        write_table(&path, &["key", "value"], &[Pair { key: "a".to_string(), value: 1 }]).unwrap();
        write_text(&temp.path().join("seq"), "4\n").unwrap();
        let names: Vec<String> = fs::read_dir(temp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert!(names.iter().all(|n| !n.contains(".tmp_")), "{:?}", names);
    }
}
