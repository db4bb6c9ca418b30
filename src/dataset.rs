//! Magnitude dataset: global and per-domain client estimators plus exact query counters.
//!
//! The `*_count` client fields are derived values. They are only meaningful after
//! [`Dataset::finalize`] has recomputed them from the estimators.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::net::IpAddr;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::address::Address;
use crate::config::{DATASET_VERSION, GENERATOR};
use crate::domain::DomainName;
use crate::estimator::Hll;
use crate::settings::HllSettings;

/// Exact membership sets kept only when verbose tracking is enabled. Never encoded.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DebugSets {
    /// Truncated addresses of all clients
    pub clients: HashSet<IpAddr>,
    /// Truncated addresses of IPv6 clients
    pub v6_clients: HashSet<IpAddr>,
    /// Every domain seen, including those later removed by truncation
    pub domains: HashSet<DomainName>,
}

impl DebugSets {
    pub(crate) fn union(&mut self, other: &DebugSets) {
        self.clients.extend(other.clients.iter().copied());
        self.v6_clients.extend(other.v6_clients.iter().copied());
        self.domains.extend(other.domains.iter().cloned());
    }

    fn clear(&mut self) {
        self.clients.clear();
        self.v6_clients.clear();
        self.domains.clear();
    }
}

/// Per-domain statistics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainStats {
    #[serde(rename = "clients_hll")]
    pub hll: Hll,
    /// Estimated number of distinct clients, valid after finalize
    pub clients_count: u64,
    /// Exact number of queries
    pub queries_count: u64,
    #[serde(skip)]
    pub(crate) clients: Option<HashSet<IpAddr>>,
}

impl DomainStats {
    pub fn new(settings: HllSettings) -> Self {
        Self {
            hll: Hll::new(settings),
            clients_count: 0,
            queries_count: 0,
            clients: None,
        }
    }

    fn verbose(settings: HllSettings) -> Self {
        Self {
            clients: Some(HashSet::new()),
            ..Self::new(settings)
        }
    }

    /// Exact client set, when tracked
    pub fn exact_clients(&self) -> Option<&HashSet<IpAddr>> {
        self.clients.as_ref()
    }
}

/// Ranking entry, recomputed on demand
#[derive(Debug, Clone, Copy)]
pub struct DomainMagnitude<'a> {
    pub domain: &'a DomainName,
    pub magnitude: f64,
    pub stats: &'a DomainStats,
}

/// Collected statistics for one day, as written to and read from CBOR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub version: u16,
    /// Unique identifier
    pub id: String,
    /// Software that created the dataset
    pub generator: String,
    /// UTC collection date
    #[serde(with = "crate::serde::date_tag")]
    pub date: NaiveDate,
    pub all_clients_hll: Hll,
    /// Estimated number of distinct clients, valid after finalize
    pub all_clients_count: u64,
    pub all_queries_count: u64,
    pub domains: BTreeMap<DomainName, DomainStats>,
    #[serde(skip)]
    pub(crate) debug: Option<DebugSets>,
    /// Where the dataset was loaded from, e.g. `day1.dnsmag#2`
    #[serde(skip)]
    pub(crate) source: Option<String>,
}

impl Dataset {
    /// Creates an empty dataset dated `date`, or today (UTC) when `None`.
    pub fn new(settings: HllSettings, date: Option<NaiveDate>) -> Self {
        Self {
            version: DATASET_VERSION,
            id: Uuid::new_v4().to_string(),
            generator: GENERATOR.to_string(),
            date: date.unwrap_or_else(|| Utc::now().date_naive()),
            all_clients_hll: Hll::new(settings),
            all_clients_count: 0,
            all_queries_count: 0,
            domains: BTreeMap::new(),
            debug: None,
            source: None,
        }
    }

    /// Enable exact client and domain tracking next to the estimators.
    pub fn with_debug_sets(mut self) -> Self {
        self.debug = Some(DebugSets::default());
        self
    }

    #[inline]
    pub fn is_verbose(&self) -> bool {
        self.debug.is_some()
    }

    pub fn debug_sets(&self) -> Option<&DebugSets> {
        self.debug.as_ref()
    }

    /// Settings of the global estimator, used for every new domain estimator.
    #[inline]
    pub fn settings(&self) -> HllSettings {
        *self.all_clients_hll.settings()
    }

    /// Name identifying the dataset in error messages: its source if known, else its id.
    pub fn name(&self) -> &str {
        self.source.as_deref().unwrap_or(&self.id)
    }

    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = Some(source.into());
    }

    pub fn set_date(&mut self, date: NaiveDate) {
        self.date = date;
    }

    /// Date as `YYYY-MM-DD`
    pub fn date_string(&self) -> String {
        self.date.format("%Y-%m-%d").to_string()
    }

    /// Count `queries` queries from `address` for `domain`. Root queries only count globally.
    pub fn update_stats(&mut self, domain: &DomainName, address: &Address, queries: u64) {
        if queries == 0 {
            return;
        }

        self.all_queries_count += queries;
        self.all_clients_hll.add_raw(address.hash());

        if let Some(debug) = self.debug.as_mut() {
            debug.clients.insert(address.truncated());
            if address.is_ipv6() {
                debug.v6_clients.insert(address.truncated());
            }
            if !domain.is_root() {
                debug.domains.insert(domain.clone());
            }
        }

        if domain.is_root() {
            return;
        }

        if !self.domains.contains_key(domain) {
            let stats = if self.debug.is_some() {
                DomainStats::verbose(self.settings())
            } else {
                DomainStats::new(self.settings())
            };
            self.domains.insert(domain.clone(), stats);
        }
        if let Some(stats) = self.domains.get_mut(domain) {
            stats.queries_count += queries;
            stats.hll.add_raw(address.hash());
            if let Some(clients) = stats.clients.as_mut() {
                clients.insert(address.truncated());
            }
        }
    }

    /// Recompute the derived client counts from the estimators.
    pub fn finalize(&mut self) {
        for stats in self.domains.values_mut() {
            stats.clients_count = stats.hll.cardinality();
        }
        self.all_clients_count = self.all_clients_hll.cardinality();
    }

    /// Magnitude of a domain with `clients` estimated clients, in `[0, 10]`.
    ///
    /// `10 * ln(clients) / ln(all clients)`. A domain without clients has magnitude 0, and
    /// when the whole dataset has at most one client every domain with a client has 10.
    pub fn magnitude(&self, clients: u64) -> f64 {
        if clients == 0 {
            return 0.0;
        }
        if self.all_clients_count <= 1 {
            return 10.0;
        }
        let magnitude = (clients as f64).ln() / (self.all_clients_count as f64).ln() * 10.0;
        magnitude.clamp(0.0, 10.0)
    }

    /// Domains in ascending magnitude order. Magnitudes are compared at 0.001 resolution,
    /// ties are broken by domain name.
    pub fn sorted_by_magnitude(&self) -> Vec<DomainMagnitude<'_>> {
        let mut sorted: Vec<DomainMagnitude<'_>> = self
            .domains
            .iter()
            .map(|(domain, stats)| DomainMagnitude {
                domain,
                magnitude: self.magnitude(stats.clients_count),
                stats,
            })
            .collect();

        sorted.sort_by(|a, b| {
            let a_milli = (a.magnitude * 1000.0) as i64;
            let b_milli = (b.magnitude * 1000.0) as i64;
            a_milli.cmp(&b_milli).then_with(|| a.domain.cmp(b.domain))
        });
        sorted
    }

    /// Keep only the `max_domains` domains with the highest magnitude. Global counters and the
    /// global estimator are left alone. `0` disables truncation.
    pub fn truncate(&mut self, max_domains: usize) {
        if max_domains == 0 || self.domains.len() <= max_domains {
            return;
        }

        let sorted = self.sorted_by_magnitude();
        let keep: BTreeSet<DomainName> = sorted[sorted.len() - max_domains..]
            .iter()
            .map(|dm| dm.domain.clone())
            .collect();
        self.domains.retain(|domain, _| keep.contains(domain));
    }

    /// Turn this dataset into a fresh empty one dated `date`, keeping its settings and
    /// debug tracking mode.
    pub fn reset(&mut self, date: NaiveDate) {
        self.version = DATASET_VERSION;
        self.id = Uuid::new_v4().to_string();
        self.generator = GENERATOR.to_string();
        self.date = date;
        self.all_clients_hll = Hll::new(self.settings());
        self.all_clients_count = 0;
        self.all_queries_count = 0;
        self.domains.clear();
        if let Some(debug) = self.debug.as_mut() {
            debug.clear();
        }
        self.source = None;
    }
}
