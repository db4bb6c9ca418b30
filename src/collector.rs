//! Chunked collection of query records into a dataset.
//!
//! Records are counted into a `current` dataset. Every `chunk_size` records the current
//! dataset is merged into the `result`, the result is truncated to the top domains and the
//! current dataset is emptied again, so memory use is bounded by the chunk size and the
//! number of domains kept rather than by the length of the input.

use std::time::Instant;

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::address::Address;
use crate::aggregate::aggregate;
use crate::config::CollectorConfig;
use crate::dataset::Dataset;
use crate::domain::DomainName;
use crate::error::Result;

/// Accumulates `(domain, client, query count)` records
#[derive(Debug)]
pub struct Collector {
    config: CollectorConfig,
    current: Dataset,
    result: Dataset,
    record_count: u64,
    chunk_count: u64,
    invalid_domain_count: u64,
    invalid_record_count: u64,
    started: Instant,
}

impl Collector {
    /// Creates a collector for records of `date`, or today (UTC) when `None`.
    pub fn new(config: CollectorConfig, date: Option<NaiveDate>) -> Self {
        let dataset = || {
            let dataset = Dataset::new(config.hll, date);
            if config.verbose {
                dataset.with_debug_sets()
            } else {
                dataset
            }
        };
        Self {
            config,
            current: dataset(),
            result: dataset(),
            record_count: 0,
            chunk_count: 0,
            invalid_domain_count: 0,
            invalid_record_count: 0,
            started: Instant::now(),
        }
    }

    /// Count `queries` queries for `domain` from `address`.
    ///
    /// An invalid domain is counted and skipped. Errors are only returned when folding a
    /// completed chunk into the result fails.
    pub fn process_record(&mut self, domain: &str, address: &Address, queries: u64) -> Result<()> {
        let domain = match DomainName::parse(domain, self.config.domain_labels) {
            Ok(domain) => domain,
            Err(_) => {
                self.invalid_domain_count += 1;
                return Ok(());
            }
        };

        self.current.update_stats(&domain, address, queries);

        self.record_count += 1;
        if self.config.chunk_size != 0 && self.record_count % self.config.chunk_size == 0 {
            self.migrate()?;
        }
        Ok(())
    }

    /// Like [`Collector::process_record`] with a textual address. An address that does not
    /// parse is counted as an invalid record and skipped.
    pub fn process_address_str(&mut self, domain: &str, address: &str, queries: u64) -> Result<()> {
        match address.parse::<Address>() {
            Ok(address) => self.process_record(domain, &address, queries),
            Err(_) => {
                self.record_invalid();
                Ok(())
            }
        }
    }

    /// Count a record the producer could not make sense of.
    pub fn record_invalid(&mut self) {
        self.invalid_record_count += 1;
    }

    /// Re-date the records being accumulated. Takes effect for the result at the next
    /// migration.
    pub fn set_date(&mut self, date: NaiveDate) {
        self.current.set_date(date);
    }

    /// Flush the remaining records, truncate the result and compute its client counts.
    pub fn finalize(&mut self) -> Result<()> {
        self.migrate()?;
        self.result.truncate(self.config.top_count);
        self.result.finalize();

        info!(
            action = "finalize",
            component = "collector",
            records = self.record_count,
            chunks = self.chunk_count,
            invalid_domains = self.invalid_domain_count,
            invalid_records = self.invalid_record_count,
            domains = self.result.domains.len(),
            duration_ms = self.started.elapsed().as_millis(),
            "Collection finalized"
        );
        Ok(())
    }

    /// Fold `current` into `result`. Does nothing when no queries were counted since the last
    /// migration.
    fn migrate(&mut self) -> Result<()> {
        if self.current.all_queries_count == 0 {
            return Ok(());
        }
        let start = Instant::now();

        self.result.date = self.current.date;
        let mut merged = aggregate(&[&self.result, &self.current])?;
        merged.truncate(self.config.top_count);
        self.result = merged;

        // reuse the current dataset's allocations for the next chunk
        self.current.reset(self.result.date);
        self.chunk_count += 1;

        debug!(
            action = "migrate",
            component = "collector",
            chunk = self.chunk_count,
            records = self.record_count,
            domains = self.result.domains.len(),
            duration_ms = start.elapsed().as_millis(),
            "Chunk merged into result"
        );
        Ok(())
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Collected dataset, complete after [`Collector::finalize`].
    pub fn result(&self) -> &Dataset {
        &self.result
    }

    pub fn into_result(self) -> Dataset {
        self.result
    }

    /// Valid records processed
    pub fn record_count(&self) -> u64 {
        self.record_count
    }

    /// Number of migrations performed
    pub fn chunk_count(&self) -> u64 {
        self.chunk_count
    }

    pub fn invalid_domain_count(&self) -> u64 {
        self.invalid_domain_count
    }

    pub fn invalid_record_count(&self) -> u64 {
        self.invalid_record_count
    }
}
