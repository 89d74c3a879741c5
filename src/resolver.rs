//! Point-in-time ticker resolution.
//!
//! Turns a company's raw ticker plus a release timestamp into the ticker
//! that was in effect on that day, using the configured map file provider.

use crate::mapping::{MapFileProvider, MappingError};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::{debug, info};

/// Marker the provider appends to tickers of delisted companies.
const DEFUNCT_MARKER: &str = "defunct";

/// Outcome of a point-in-time lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The ticker in effect at the requested time.
    Found {
        identity: String,
        /// True when `identity` differs from the requested ticker.
        remapped: bool,
    },
    /// No mapping covers the ticker at that time.
    NotFound,
}

impl Resolution {
    #[allow(dead_code)] // Convenience accessor
    pub fn identity(&self) -> Option<&str> {
        match self {
            Resolution::Found { identity, .. } => Some(identity),
            Resolution::NotFound => None,
        }
    }
}

/// Strip the defunct marker and canonicalize a raw provider ticker.
///
/// `ABC-defunct-1234` becomes `ABC`. Returns `None` when nothing usable
/// is left or the ticker contains whitespace or separators.
pub fn normalize_ticker(raw: &str) -> Option<String> {
    let raw = raw.trim();
    let lowered = raw.to_ascii_lowercase();

    let base = match lowered.find(DEFUNCT_MARKER) {
        Some(pos) if pos > 0 => {
            let dash = raw.find('-')?;
            &raw[..dash]
        }
        Some(_) => return None,
        None => raw,
    };

    let base = base.trim();
    if base.is_empty()
        || base
            .chars()
            .any(|c| c.is_whitespace() || c == ',' || c == '/' || c == '\\')
    {
        return None;
    }

    Some(base.to_uppercase())
}

/// Resolves tickers against a point-in-time mapping table.
#[derive(Clone)]
pub struct IdentityResolver {
    provider: Arc<dyn MapFileProvider>,
}

impl IdentityResolver {
    pub fn new(provider: Arc<dyn MapFileProvider>) -> Self {
        Self { provider }
    }

    /// Resolve an already-normalized ticker as of `as_of`.
    ///
    /// A table with no rows is reported by some providers as
    /// [`MappingError::NoData`]; that case is folded into `NotFound` here.
    /// Any other mapping error is returned.
    pub fn resolve(&self, ticker: &str, as_of: DateTime<Utc>) -> Result<Resolution, MappingError> {
        let map_file = match self.provider.map_file(ticker) {
            Ok(map_file) => map_file,
            Err(MappingError::NoData { .. }) => {
                debug!(ticker, %as_of, "Map file has no data");
                return Ok(Resolution::NotFound);
            }
            Err(e) => return Err(e),
        };

        if !map_file.has_coverage() {
            debug!(ticker, %as_of, "No map file entries");
            return Ok(Resolution::NotFound);
        }

        let Some(mapped) = map_file.mapped_symbol_as_of(as_of) else {
            debug!(ticker, %as_of, "No mapped symbol at this date");
            return Ok(Resolution::NotFound);
        };

        let remapped = !mapped.eq_ignore_ascii_case(ticker);
        if remapped {
            info!(ticker, mapped, %as_of, "Ticker remapped");
        }

        Ok(Resolution::Found {
            identity: mapped.to_uppercase(),
            remapped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::{InMemoryMapFiles, MapFile, MapFileRow};
    use chrono::{NaiveDate, TimeZone};
    use std::path::PathBuf;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn at(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 20, 0, 0).unwrap()
    }

    fn resolver() -> IdentityResolver {
        let provider = InMemoryMapFiles::new()
            .with("A", vec![MapFileRow::new(day(2050, 12, 31), "A")])
            .with(
                "B",
                vec![
                    MapFileRow::new(day(2019, 12, 31), "B"),
                    MapFileRow::new(day(2050, 12, 31), "BNEW"),
                ],
            )
            .with("GONE", vec![MapFileRow::new(day(2015, 1, 1), "GONE")])
            .with("HOLLOW", vec![]);
        IdentityResolver::new(Arc::new(provider))
    }

    struct BrokenProvider;

    impl MapFileProvider for BrokenProvider {
        fn map_file(&self, _ticker: &str) -> Result<Arc<MapFile>, MappingError> {
            Err(MappingError::Malformed {
                path: PathBuf::from("x.csv"),
                row: 1,
                message: "broken".to_string(),
            })
        }
    }

    #[test]
    fn test_normalize_ticker() {
        assert_eq!(normalize_ticker("aapl"), Some("AAPL".to_string()));
        assert_eq!(normalize_ticker(" B-defunct-tag "), Some("B".to_string()));
        assert_eq!(normalize_ticker("XYZ-DEFUNCT-99"), Some("XYZ".to_string()));
        assert_eq!(normalize_ticker("BRK.B"), Some("BRK.B".to_string()));
        assert_eq!(normalize_ticker(""), None);
        assert_eq!(normalize_ticker("defunct-1"), None);
        assert_eq!(normalize_ticker("-defunct-1"), None);
        assert_eq!(normalize_ticker("AB CD"), None);
        assert_eq!(normalize_ticker("ABCdefunct"), None);
    }

    #[test]
    fn test_resolve_identity_unchanged() {
        let r = resolver();
        assert_eq!(
            r.resolve("A", at(2019, 6, 1)).unwrap(),
            Resolution::Found {
                identity: "A".to_string(),
                remapped: false
            }
        );
    }

    #[test]
    fn test_resolve_remap_around_date() {
        let r = resolver();
        assert_eq!(
            r.resolve("B", at(2019, 12, 1)).unwrap().identity(),
            Some("B")
        );
        let after = r.resolve("B", at(2020, 1, 1)).unwrap();
        assert_eq!(
            after,
            Resolution::Found {
                identity: "BNEW".to_string(),
                remapped: true
            }
        );
    }

    #[test]
    fn test_resolve_is_idempotent() {
        let r = resolver();
        let first = r.resolve("B", at(2020, 2, 1)).unwrap();
        for _ in 0..5 {
            assert_eq!(r.resolve("B", at(2020, 2, 1)).unwrap(), first);
        }
    }

    #[test]
    fn test_resolve_not_found_cases() {
        let r = resolver();
        assert_eq!(r.resolve("MISSING", at(2020, 1, 1)).unwrap(), Resolution::NotFound);
        assert_eq!(r.resolve("GONE", at(2020, 1, 1)).unwrap(), Resolution::NotFound);
        assert_eq!(r.resolve("HOLLOW", at(2020, 1, 1)).unwrap(), Resolution::NotFound);
    }

    #[test]
    fn test_resolve_propagates_other_errors() {
        let r = IdentityResolver::new(Arc::new(BrokenProvider));
        assert!(matches!(
            r.resolve("A", at(2020, 1, 1)),
            Err(MappingError::Malformed { .. })
        ));
    }
}
