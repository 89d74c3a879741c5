//! Map file providers backed by a directory of CSV files or by memory.

use super::{MapFile, MapFileProvider, MapFileRow, MappingError};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::debug;

/// Date layout of the first column of a map file row.
const MAP_FILE_DATE_FORMAT: &str = "%Y%m%d";

/// Loads `<dir>/<ticker lower-cased>.csv`, caching each table after the
/// first successful read.
///
/// Rows are `yyyyMMdd,SYMBOL[,exchange...]`; extra columns are ignored.
#[derive(Debug)]
pub struct DirectoryMapFiles {
    root: PathBuf,
    cache: RwLock<HashMap<String, Arc<MapFile>>>,
}

impl DirectoryMapFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, ticker: &str) -> PathBuf {
        self.root.join(format!("{}.csv", ticker.to_lowercase()))
    }
}

impl MapFileProvider for DirectoryMapFiles {
    fn map_file(&self, ticker: &str) -> Result<Arc<MapFile>, MappingError> {
        let key = ticker.trim().to_uppercase();
        if let Some(cached) = self.cache.read().ok().and_then(|c| c.get(&key).cloned()) {
            return Ok(cached);
        }

        let path = self.path_for(&key);
        let map_file = if path.exists() {
            let rows = read_rows(&path)?;
            if rows.is_empty() {
                return Err(MappingError::NoData { ticker: key });
            }
            Arc::new(MapFile::new(rows))
        } else {
            debug!("No map file at {}", path.display());
            Arc::new(MapFile::default())
        };

        if let Ok(mut cache) = self.cache.write() {
            cache.insert(key, Arc::clone(&map_file));
        }
        Ok(map_file)
    }
}

fn read_rows(path: &Path) -> Result<Vec<MapFileRow>, MappingError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| csv_error(path, 0, e))?;

    let mut rows = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let row = index + 1;
        let record = record.map_err(|e| csv_error(path, row, e))?;

        let (Some(date), Some(symbol)) = (record.get(0), record.get(1)) else {
            return Err(MappingError::Malformed {
                path: path.to_path_buf(),
                row,
                message: "expected at least two columns".to_string(),
            });
        };

        let date = NaiveDate::parse_from_str(date, MAP_FILE_DATE_FORMAT).map_err(|e| {
            MappingError::Malformed {
                path: path.to_path_buf(),
                row,
                message: format!("bad date '{}': {}", date, e),
            }
        })?;

        rows.push(MapFileRow::new(date, symbol.to_uppercase()));
    }

    Ok(rows)
}

fn csv_error(path: &Path, row: usize, err: csv::Error) -> MappingError {
    let message = err.to_string();
    match err.into_kind() {
        csv::ErrorKind::Io(source) => MappingError::Io {
            path: path.to_path_buf(),
            source,
        },
        _ => MappingError::Malformed {
            path: path.to_path_buf(),
            row,
            message,
        },
    }
}

/// Map files held in memory, keyed by upper-cased ticker.
#[derive(Debug, Clone, Default)]
#[allow(dead_code)] // Used when tables come from somewhere other than disk
pub struct InMemoryMapFiles {
    files: HashMap<String, Arc<MapFile>>,
}

#[allow(dead_code)]
impl InMemoryMapFiles {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the rows for `ticker`, replacing any previous table.
    pub fn with(mut self, ticker: &str, rows: Vec<MapFileRow>) -> Self {
        self.files
            .insert(ticker.trim().to_uppercase(), Arc::new(MapFile::new(rows)));
        self
    }
}

impl MapFileProvider for InMemoryMapFiles {
    fn map_file(&self, ticker: &str) -> Result<Arc<MapFile>, MappingError> {
        let key = ticker.trim().to_uppercase();
        match self.files.get(&key) {
            Some(file) if !file.has_coverage() => Err(MappingError::NoData { ticker: key }),
            Some(file) => Ok(Arc::clone(file)),
            None => Ok(Arc::new(MapFile::default())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use std::fs;

    #[test]
    fn test_directory_reads_rows() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("fb.csv"),
            "20120518,FB,Q\n20220608,FB,Q\n20501231,META,Q\n",
        )
        .unwrap();

        let provider = DirectoryMapFiles::new(dir.path());
        let map = provider.map_file(" FB ").unwrap();

        assert_eq!(map.rows().len(), 3);
        let before = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2022, 6, 9, 0, 0, 0).unwrap();
        assert_eq!(map.mapped_symbol_as_of(before), Some("FB"));
        assert_eq!(map.mapped_symbol_as_of(after), Some("META"));
    }

    #[test]
    fn test_directory_caches_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.csv");
        fs::write(&path, "20501231,ABC\n").unwrap();

        let provider = DirectoryMapFiles::new(dir.path());
        assert_eq!(provider.root(), dir.path());
        let first = provider.map_file("abc").unwrap();

        fs::remove_file(&path).unwrap();
        let second = provider.map_file("ABC").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_directory_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let provider = DirectoryMapFiles::new(dir.path());
        let map = provider.map_file("NOPE").unwrap();
        assert!(!map.has_coverage());
    }

    #[test]
    fn test_directory_empty_file_is_no_data() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("zz.csv"), "").unwrap();

        let provider = DirectoryMapFiles::new(dir.path());
        assert!(matches!(
            provider.map_file("ZZ"),
            Err(MappingError::NoData { ticker }) if ticker == "ZZ"
        ));
    }

    #[test]
    fn test_directory_malformed_date() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.csv"), "2020-01-01,BAD\n").unwrap();

        let provider = DirectoryMapFiles::new(dir.path());
        assert!(matches!(
            provider.map_file("BAD"),
            Err(MappingError::Malformed { row: 1, .. })
        ));
    }

    #[test]
    fn test_in_memory_lookup_is_case_insensitive() {
        let day = NaiveDate::from_ymd_opt(2050, 12, 31).unwrap();
        let provider = InMemoryMapFiles::new()
            .with("abc", vec![MapFileRow::new(day, "ABC")])
            .with("EMPTY", vec![]);

        assert!(provider.map_file("Abc").unwrap().has_coverage());
        assert!(!provider.map_file("XYZ").unwrap().has_coverage());
        assert!(matches!(
            provider.map_file("empty"),
            Err(MappingError::NoData { .. })
        ));
    }
}
