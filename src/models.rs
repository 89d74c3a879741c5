//! Data models for release ingestion.
//!
//! This module contains the core data structures shared by the fetch
//! workers and the aggregation coordinator: companies, releases, and
//! the registry tuples handed back to the caller.

use chrono::{DateTime, NaiveDateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Timestamp layout used in output lines (`yyyyMMdd HH:mm:ss`, UTC).
pub const LINE_TIMESTAMP_FORMAT: &str = "%Y%m%d %H:%M:%S";

/// Number of fields in a serialized release line.
const LINE_FIELD_COUNT: usize = 13;

/// A company as returned by the provider's company list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    /// Display name of the company.
    #[serde(default)]
    pub name: String,
    /// Raw ticker, possibly carrying a defunct marker (`ABC-defunct-123`).
    pub ticker: String,
}

impl Company {
    /// Creates a company with the given ticker and name.
    #[allow(dead_code)] // Constructor for callers building lists by hand
    pub fn new(ticker: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ticker: ticker.into(),
        }
    }
}

impl fmt::Display for Company {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.ticker)
        } else {
            write!(f, "{} ({})", self.ticker, self.name)
        }
    }
}

/// De-duplicate companies by raw ticker, keeping the first occurrence.
pub fn dedupe_companies(companies: Vec<Company>) -> Vec<Company> {
    let mut seen = HashSet::new();
    companies
        .into_iter()
        .filter(|c| seen.insert(c.ticker.clone()))
        .collect()
}

/// Release record exactly as the provider sends it.
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseRecord {
    pub id: String,
    pub release_date: DateTime<Utc>,
    #[serde(default)]
    pub fiscal_year: Option<i32>,
    #[serde(default)]
    pub fiscal_quarter: Option<u8>,
    #[serde(default)]
    pub eps: Option<f64>,
    #[serde(default)]
    pub revenue: Option<f64>,
    #[serde(default)]
    pub consensus_eps_estimate: Option<f64>,
    #[serde(default)]
    pub consensus_revenue_estimate: Option<f64>,
    #[serde(default, rename = "wallstreet_eps_estimate")]
    pub wall_street_eps_estimate: Option<f64>,
    #[serde(default, rename = "wallstreet_revenue_estimate")]
    pub wall_street_revenue_estimate: Option<f64>,
    #[serde(default)]
    pub consensus_weighted_eps_estimate: Option<f64>,
    #[serde(default)]
    pub consensus_weighted_revenue_estimate: Option<f64>,
    #[serde(default)]
    pub estimate_count: Option<u32>,
}

/// One earnings release for a company.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Release {
    /// Provider-assigned unique id.
    pub id: String,
    /// Release timestamp, UTC, second precision.
    pub release_date: DateTime<Utc>,
    pub fiscal_year: Option<i32>,
    pub fiscal_quarter: Option<u8>,
    pub eps: Option<f64>,
    pub revenue: Option<f64>,
    pub consensus_eps_estimate: Option<f64>,
    pub consensus_revenue_estimate: Option<f64>,
    pub wall_street_eps_estimate: Option<f64>,
    pub wall_street_revenue_estimate: Option<f64>,
    pub consensus_weighted_eps_estimate: Option<f64>,
    pub consensus_weighted_revenue_estimate: Option<f64>,
    pub estimate_count: Option<u32>,
}

impl From<ReleaseRecord> for Release {
    fn from(r: ReleaseRecord) -> Self {
        Self {
            id: r.id,
            release_date: truncate_to_seconds(r.release_date),
            fiscal_year: r.fiscal_year,
            fiscal_quarter: r.fiscal_quarter,
            eps: r.eps,
            revenue: r.revenue,
            consensus_eps_estimate: r.consensus_eps_estimate,
            consensus_revenue_estimate: r.consensus_revenue_estimate,
            wall_street_eps_estimate: r.wall_street_eps_estimate,
            wall_street_revenue_estimate: r.wall_street_revenue_estimate,
            consensus_weighted_eps_estimate: r.consensus_weighted_eps_estimate,
            consensus_weighted_revenue_estimate: r.consensus_weighted_revenue_estimate,
            estimate_count: r.estimate_count,
        }
    }
}

/// Error returned when a serialized line cannot be read back.
#[derive(Debug, Error, PartialEq)]
pub enum LineError {
    #[error("expected {expected} fields, found {found}")]
    FieldCount { expected: usize, found: usize },

    #[error("invalid timestamp '{0}'")]
    Timestamp(String),

    #[error("invalid value '{value}' for field {field}")]
    Value { field: &'static str, value: String },

    #[error("csv error: {0}")]
    Csv(String),
}

impl Release {
    /// Creates a release with only the id and timestamp populated.
    #[allow(dead_code)] // Builder utility
    pub fn new(id: impl Into<String>, release_date: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            release_date: truncate_to_seconds(release_date),
            fiscal_year: None,
            fiscal_quarter: None,
            eps: None,
            revenue: None,
            consensus_eps_estimate: None,
            consensus_revenue_estimate: None,
            wall_street_eps_estimate: None,
            wall_street_revenue_estimate: None,
            consensus_weighted_eps_estimate: None,
            consensus_weighted_revenue_estimate: None,
            estimate_count: None,
        }
    }

    /// Serialize to one comma-delimited output line (no trailing newline).
    ///
    /// Field order is fixed; `None` renders as an empty field. Fields holding
    /// a comma or quote are quoted. An id containing a line break is rejected
    /// so every release stays on exactly one line.
    pub fn to_line(&self) -> Result<String, LineError> {
        if self.id.contains(['\r', '\n']) {
            return Err(LineError::Value {
                field: "id",
                value: self.id.clone(),
            });
        }

        let fields = [
            self.release_date.format(LINE_TIMESTAMP_FORMAT).to_string(),
            self.id.clone(),
            opt(self.fiscal_year),
            opt(self.fiscal_quarter),
            opt(self.eps),
            opt(self.revenue),
            opt(self.consensus_eps_estimate),
            opt(self.consensus_revenue_estimate),
            opt(self.wall_street_eps_estimate),
            opt(self.wall_street_revenue_estimate),
            opt(self.consensus_weighted_eps_estimate),
            opt(self.consensus_weighted_revenue_estimate),
            opt(self.estimate_count),
        ];

        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());
        writer
            .write_record(&fields)
            .map_err(|e| LineError::Csv(e.to_string()))?;
        let bytes = writer
            .into_inner()
            .map_err(|e| LineError::Csv(e.error().to_string()))?;

        let mut line = String::from_utf8(bytes).map_err(|e| LineError::Csv(e.to_string()))?;
        line.truncate(line.trim_end_matches('\n').len());
        Ok(line)
    }

    /// Parse a line produced by [`Release::to_line`].
    #[allow(dead_code)] // Reader side for consumers of the output files
    pub fn parse_line(line: &str) -> Result<Self, LineError> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(line.as_bytes());

        let mut record = csv::StringRecord::new();
        let found = reader
            .read_record(&mut record)
            .map_err(|e| LineError::Csv(e.to_string()))?;
        if !found || record.len() != LINE_FIELD_COUNT {
            return Err(LineError::FieldCount {
                expected: LINE_FIELD_COUNT,
                found: record.len(),
            });
        }
        let fields: Vec<&str> = record.iter().collect();

        let release_date = NaiveDateTime::parse_from_str(fields[0], LINE_TIMESTAMP_FORMAT)
            .map_err(|_| LineError::Timestamp(fields[0].to_string()))?
            .and_utc();

        Ok(Self {
            id: fields[1].to_string(),
            release_date,
            fiscal_year: parse_opt("fiscal_year", fields[2])?,
            fiscal_quarter: parse_opt("fiscal_quarter", fields[3])?,
            eps: parse_opt("eps", fields[4])?,
            revenue: parse_opt("revenue", fields[5])?,
            consensus_eps_estimate: parse_opt("consensus_eps_estimate", fields[6])?,
            consensus_revenue_estimate: parse_opt("consensus_revenue_estimate", fields[7])?,
            wall_street_eps_estimate: parse_opt("wall_street_eps_estimate", fields[8])?,
            wall_street_revenue_estimate: parse_opt("wall_street_revenue_estimate", fields[9])?,
            consensus_weighted_eps_estimate: parse_opt(
                "consensus_weighted_eps_estimate",
                fields[10],
            )?,
            consensus_weighted_revenue_estimate: parse_opt(
                "consensus_weighted_revenue_estimate",
                fields[11],
            )?,
            estimate_count: parse_opt("estimate_count", fields[12])?,
        })
    }
}

fn truncate_to_seconds(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.with_nanosecond(0).unwrap_or(ts)
}

fn opt<T: fmt::Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

fn parse_opt<T: std::str::FromStr>(field: &'static str, raw: &str) -> Result<Option<T>, LineError> {
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse().map(Some).map_err(|_| LineError::Value {
        field,
        value: raw.to_string(),
    })
}

/// Cross-reference record emitted for every resolved release.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RegistryTuple {
    pub release_id: String,
    pub identity: String,
    pub fiscal_year: Option<i32>,
    pub fiscal_quarter: Option<u8>,
}

impl RegistryTuple {
    /// Builds the tuple for a release resolved to `identity`.
    pub fn for_release(release: &Release, identity: &str) -> Self {
        Self {
            release_id: release.id.clone(),
            identity: identity.to_string(),
            fiscal_year: release.fiscal_year,
            fiscal_quarter: release.fiscal_quarter,
        }
    }
}

/// Counters describing a completed run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Entities handed to the coordinator.
    pub entities: usize,
    /// Entities that produced at least one line.
    pub contributing: usize,
    /// Entities skipped before or during fetch.
    pub skipped: usize,
    /// Total lines appended across all destinations.
    pub lines_written: usize,
    /// Releases whose identity differed from the company ticker.
    pub remaps: usize,
    /// Releases dropped because they could not be resolved or written.
    pub unresolved: usize,
    /// Wall-clock duration in seconds.
    pub duration_seconds: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn full_release() -> Release {
        Release {
            id: "5f2a".to_string(),
            release_date: Utc.with_ymd_and_hms(2019, 12, 1, 21, 5, 0).unwrap(),
            fiscal_year: Some(2020),
            fiscal_quarter: Some(1),
            eps: Some(1.25),
            revenue: Some(10_500.5),
            consensus_eps_estimate: Some(1.2),
            consensus_revenue_estimate: Some(10_400.0),
            wall_street_eps_estimate: Some(1.18),
            wall_street_revenue_estimate: None,
            consensus_weighted_eps_estimate: Some(-0.031),
            consensus_weighted_revenue_estimate: None,
            estimate_count: Some(42),
        }
    }

    #[test]
    fn test_to_line_layout() {
        let line = full_release().to_line().unwrap();
        assert_eq!(
            line,
            "20191201 21:05:00,5f2a,2020,1,1.25,10500.5,1.2,10400,1.18,,-0.031,,42"
        );
    }

    #[test]
    fn test_line_parses_back_to_same_values() {
        let release = full_release();
        let parsed = Release::parse_line(&release.to_line().unwrap()).unwrap();
        assert_eq!(parsed, release);

        let sparse = Release::new("x", Utc.with_ymd_and_hms(2020, 2, 1, 0, 0, 0).unwrap());
        assert_eq!(Release::parse_line(&sparse.to_line().unwrap()).unwrap(), sparse);
    }

    #[test]
    fn test_parse_line_rejects_bad_input() {
        assert!(matches!(
            Release::parse_line("20200101 00:00:00,id"),
            Err(LineError::FieldCount { found: 2, .. })
        ));
        assert!(matches!(
            Release::parse_line("2020-01-01,id,,,,,,,,,,,"),
            Err(LineError::Timestamp(_))
        ));
        assert!(matches!(
            Release::parse_line("20200101 00:00:00,id,abc,,,,,,,,,,"),
            Err(LineError::Value { field: "fiscal_year", .. })
        ));
    }

    #[test]
    fn test_line_quotes_delimiters_in_id() {
        let mut release = full_release();
        release.id = "id,with \"quoted\" comma".to_string();

        let line = release.to_line().unwrap();
        assert!(line.starts_with("20191201 21:05:00,\"id,with \"\"quoted\"\" comma\","));
        assert!(!line.contains('\n'));
        assert_eq!(Release::parse_line(&line).unwrap(), release);
    }

    #[test]
    fn test_line_rejects_line_break_in_id() {
        let release = Release::new("id\nsplit", Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap());
        assert!(matches!(
            release.to_line(),
            Err(LineError::Value { field: "id", .. })
        ));
    }

    #[test]
    fn test_record_conversion_truncates_subseconds() {
        let json = r#"{
            "id": "r1",
            "release_date": "2021-05-04T20:01:02.789Z",
            "fiscal_year": 2021,
            "fiscal_quarter": 2,
            "eps": 0.5,
            "wallstreet_eps_estimate": 0.45
        }"#;
        let record: ReleaseRecord = serde_json::from_str(json).unwrap();
        let release = Release::from(record);

        assert_eq!(
            release.release_date,
            Utc.with_ymd_and_hms(2021, 5, 4, 20, 1, 2).unwrap()
        );
        assert_eq!(release.wall_street_eps_estimate, Some(0.45));
        assert_eq!(release.revenue, None);
    }

    #[test]
    fn test_dedupe_companies_keeps_first() {
        let companies = vec![
            Company::new("AAPL", "Apple"),
            Company::new("MSFT", "Microsoft"),
            Company::new("AAPL", "Apple duplicate"),
        ];
        let deduped = dedupe_companies(companies);
        assert_eq!(deduped.len(), 2);
        assert_eq!(deduped[0].name, "Apple");
    }

    #[test]
    fn test_registry_tuple_set_semantics() {
        let release = full_release();
        let mut set = HashSet::new();
        set.insert(RegistryTuple::for_release(&release, "ABC"));
        set.insert(RegistryTuple::for_release(&release, "ABC"));
        set.insert(RegistryTuple::for_release(&release, "ABCD"));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_run_summary_compares_with_duration() {
        let summary = RunSummary {
            entities: 2,
            lines_written: 3,
            duration_seconds: 0.25,
            ..RunSummary::default()
        };
        assert_eq!(summary.clone(), summary);
        assert_ne!(summary, RunSummary::default());
    }
}
