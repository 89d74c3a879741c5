//! Per-company fetch, resolve, and group.

use crate::models::{Company, RegistryTuple, Release};
use crate::provider::ProviderClient;
use crate::resolver::{normalize_ticker, IdentityResolver, Resolution};
use std::collections::{BTreeMap, HashSet};
use tracing::{debug, trace, warn};

/// Why a company contributed nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    InvalidTicker,
    NotAllowed,
    FetchFailed,
}

/// Everything one company contributes to a run.
#[derive(Debug, Clone, Default)]
pub struct EntityOutput {
    /// Raw ticker the output came from.
    pub ticker: String,
    /// Serialized lines keyed by resolved identity, in arrival order.
    pub groups: BTreeMap<String, Vec<String>>,
    pub registry: Vec<RegistryTuple>,
    pub remaps: usize,
    pub unresolved: usize,
    pub skipped: Option<SkipReason>,
}

impl EntityOutput {
    fn skipped(ticker: &str, reason: SkipReason) -> Self {
        Self {
            ticker: ticker.to_string(),
            skipped: Some(reason),
            ..Self::default()
        }
    }

    /// Number of lines across all groups.
    #[allow(dead_code)] // Utility for callers inspecting outputs
    pub fn line_count(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }
}

/// Processes one company at a time; shared read-only across tasks.
pub struct FetchWorker {
    client: ProviderClient,
    resolver: IdentityResolver,
    /// Normalized, upper-cased tickers to restrict the run to.
    allow_list: Option<HashSet<String>>,
}

impl FetchWorker {
    pub fn new(
        client: ProviderClient,
        resolver: IdentityResolver,
        allow_list: Option<Vec<String>>,
    ) -> Self {
        let allow_list = allow_list
            .map(|tickers| {
                tickers
                    .iter()
                    .map(|t| t.trim().to_uppercase())
                    .filter(|t| !t.is_empty())
                    .collect::<HashSet<_>>()
            })
            .filter(|set| !set.is_empty());

        Self {
            client,
            resolver,
            allow_list,
        }
    }

    /// Whether `ticker` (normalized) passes the allow-list.
    pub fn is_allowed(&self, ticker: &str) -> bool {
        self.allow_list
            .as_ref()
            .map_or(true, |allowed| allowed.contains(ticker))
    }

    /// Normalized ticker to fetch and resolve with, or why the company is
    /// skipped before any request is made.
    pub fn admit(&self, company: &Company) -> Result<String, SkipReason> {
        let Some(ticker) = normalize_ticker(&company.ticker) else {
            warn!(ticker = %company.ticker, "Unparseable ticker, skipping");
            return Err(SkipReason::InvalidTicker);
        };

        if !self.is_allowed(&ticker) {
            trace!(%ticker, "Not in allow-list");
            return Err(SkipReason::NotAllowed);
        }

        Ok(ticker)
    }

    /// Fetch and group one company's releases. Never fails; problems are
    /// logged and reported through [`EntityOutput::skipped`].
    pub async fn process(&self, company: &Company) -> EntityOutput {
        let ticker = match self.admit(company) {
            Ok(ticker) => ticker,
            Err(reason) => return EntityOutput::skipped(&company.ticker, reason),
        };

        let releases = match self.client.releases(&ticker).await {
            Ok(releases) => releases,
            Err(e) => {
                warn!(%ticker, "Fetch failed: {}", e);
                return EntityOutput::skipped(&company.ticker, SkipReason::FetchFailed);
            }
        };

        debug!(%ticker, count = releases.len(), "Fetched releases");
        let mut output = self.group_releases(&ticker, releases);
        output.ticker = company.ticker.clone();
        output
    }

    /// Resolve each release as of its own timestamp and group by identity.
    pub fn group_releases(&self, ticker: &str, releases: Vec<Release>) -> EntityOutput {
        let mut output = EntityOutput {
            ticker: ticker.to_string(),
            ..EntityOutput::default()
        };

        for release in releases {
            let (identity, remapped) = match self.resolver.resolve(ticker, release.release_date) {
                Ok(Resolution::Found { identity, remapped }) => (identity, remapped),
                Ok(Resolution::NotFound) => {
                    debug!(
                        ticker,
                        id = %release.id,
                        as_of = %release.release_date,
                        "Unresolved release dropped"
                    );
                    output.unresolved += 1;
                    continue;
                }
                Err(e) => {
                    warn!(
                        ticker,
                        id = %release.id,
                        as_of = %release.release_date,
                        "Resolution failed: {}",
                        e
                    );
                    output.unresolved += 1;
                    continue;
                }
            };

            let line = match release.to_line() {
                Ok(line) => line,
                Err(e) => {
                    warn!(ticker, id = %release.id, "Release not writable: {}", e);
                    output.unresolved += 1;
                    continue;
                }
            };

            if remapped {
                output.remaps += 1;
            }
            output
                .registry
                .push(RegistryTuple::for_release(&release, &identity));
            output.groups.entry(identity).or_default().push(line);
        }

        output
    }
}
