use std::sync::Arc;

use tracing::{info, warn};

use crate::config::{DataSource, Settings};
use crate::error::{Outcome, Result};
use crate::fetch::DownloadCache;
use crate::filter::{self, FilterCriteria};
use crate::load;
use crate::memo::Memo;
use crate::merge;
use crate::table::Table;

type MergeKey = (Arc<Table>, DataSource);

/// Loaded officials table and the count of rows dropped while deriving
/// territory codes.
type Loaded = (Arc<Table>, usize);

/// One explorer session: the download cache plus memoized load and merge
/// results. Every interaction recomputes Loader → Merger → Filter, hitting the
/// memo for the first two when their inputs are unchanged.
///
/// Failed stages are never cached, so the next interaction retries them.
pub struct Session {
    cache: DownloadCache,
    officials: DataSource,
    towns: DataSource,
    loaded: Memo<DataSource, Loaded>,
    merged: Memo<MergeKey, Table>,
}

impl Session {
    pub fn new(cache: DownloadCache, officials: DataSource, towns: DataSource) -> Self {
        Self {
            cache,
            officials,
            towns,
            loaded: Memo::new(),
            merged: Memo::new(),
        }
    }

    /// Session backed by the HTTP client and data directory of `settings`.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let cache = DownloadCache::http(&settings.data_dir, &settings.http)?;
        Ok(Self::new(
            cache,
            settings.officials_source(),
            settings.towns_source(),
        ))
    }

    /// Officials table with territory codes, or an empty table and the
    /// reason it could not be loaded.
    pub fn officials(&self) -> Outcome<Arc<Table>> {
        let result = self
            .loaded
            .try_get_or_compute(&self.officials, || {
                load::try_load_officials(&self.cache, &self.officials)
                    .map(|officials| (Arc::new(officials.table), officials.dropped))
            })
            .map(|loaded| Arc::clone(&loaded.0));
        Outcome::recover(result, || Arc::new(Table::empty()))
    }

    /// Officials rows left out of the dataset because they carry neither a
    /// department nor a collectivity code. Zero until the officials loaded.
    pub fn dropped_officials(&self) -> usize {
        self.loaded
            .get(&self.officials)
            .map_or(0, |loaded| loaded.1)
    }

    /// Officials enriched with town coordinates. A failed merge falls back to
    /// the unenriched officials; a failed load falls back to an empty table.
    pub fn dataset(&self) -> Outcome<Arc<Table>> {
        let officials = match self.officials() {
            Outcome::Complete(table) => table,
            degraded => return degraded,
        };

        let key = (Arc::clone(&officials), self.towns.clone());
        let result = self.merged.try_get_or_compute(&key, || {
            merge::try_enrich(&officials, &self.cache, &self.towns)
        });
        Outcome::recover(result, || officials)
    }

    /// Filtered dataset for one interaction. When loading or merging
    /// degraded, the filters still run on the fallback table and the first
    /// error is reported.
    pub fn query(&self, criteria: &FilterCriteria) -> Outcome<Table> {
        let (dataset, upstream) = self.dataset().into_parts();
        let (filtered, filter_error) = filter::apply(&dataset, criteria).into_parts();

        info!(
            total = dataset.len(),
            shown = filtered.len(),
            "query answered"
        );
        match upstream.or(filter_error) {
            None => Outcome::Complete(filtered),
            Some(error) => {
                warn!(error = %error, "query answered from degraded data");
                Outcome::Degraded {
                    value: filtered,
                    error,
                }
            }
        }
    }
}
