//! Data handed to reporting consumers: ranked domains and global aggregates.
//! Rendering (tables, files) is left to the consumer.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dataset::Dataset;

/// One ranked domain
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DomainSummary {
    pub domain: String,
    pub magnitude: f64,
    /// Estimated distinct clients
    pub clients: u64,
    /// Exact distinct clients, when tracked
    pub exact_clients: Option<usize>,
    pub queries: u64,
    /// Canonical storage size of the domain's estimator in bytes
    pub hll_size: usize,
}

/// Dataset statistics, domains in ascending magnitude order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetSummary {
    pub date: String,
    pub queries: u64,
    /// Domains in the dataset
    pub domain_count: usize,
    /// Domains seen before truncation, when tracked
    pub total_domain_count: Option<usize>,
    pub clients: u64,
    pub exact_clients: Option<usize>,
    pub exact_v6_clients: Option<usize>,
    /// Canonical storage size of the global estimator in bytes
    pub hll_size: usize,
    /// Sum of the per-domain estimator storage sizes
    pub domains_hll_size: usize,
    pub domains: Vec<DomainSummary>,
}

impl DatasetSummary {
    pub fn from_dataset(dataset: &Dataset) -> Self {
        let domains: Vec<DomainSummary> = dataset
            .sorted_by_magnitude()
            .into_iter()
            .map(|dm| DomainSummary {
                domain: dm.domain.to_string(),
                magnitude: dm.magnitude,
                clients: dm.stats.clients_count,
                exact_clients: dm.stats.exact_clients().map(|c| c.len()),
                queries: dm.stats.queries_count,
                hll_size: dm.stats.hll.storage_size(),
            })
            .collect();
        let debug = dataset.debug_sets();

        Self {
            date: dataset.date_string(),
            queries: dataset.all_queries_count,
            domain_count: dataset.domains.len(),
            total_domain_count: debug.map(|d| d.domains.len()),
            clients: dataset.all_clients_count,
            exact_clients: debug.map(|d| d.clients.len()),
            exact_v6_clients: debug.map(|d| d.v6_clients.len()),
            hll_size: dataset.all_clients_hll.storage_size(),
            domains_hll_size: domains.iter().map(|d| d.hll_size).sum(),
            domains,
        }
    }
}

/// Per-domain entry of a [`Report`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MagnitudeData {
    pub domain: String,
    pub magnitude: f64,
    pub unique_clients: u64,
    pub query_volume: u64,
}

/// Shareable magnitude report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub id: String,
    pub date: String,
    pub source: String,
    pub source_type: String,
    pub total_unique_clients: u64,
    pub total_query_volume: u64,
    pub magnitude_data: Vec<MagnitudeData>,
}

impl Report {
    /// Build a report for `dataset`, attributed to `source` of kind `source_type`.
    pub fn generate(dataset: &Dataset, source: &str, source_type: &str) -> Self {
        let magnitude_data = dataset
            .sorted_by_magnitude()
            .into_iter()
            .map(|dm| MagnitudeData {
                domain: dm.domain.to_string(),
                magnitude: dm.magnitude,
                unique_clients: dm.stats.clients_count,
                query_volume: dm.stats.queries_count,
            })
            .collect();

        Self {
            id: Uuid::new_v4().to_string(),
            date: dataset.date_string(),
            source: source.to_string(),
            source_type: source_type.to_string(),
            total_unique_clients: dataset.all_clients_count,
            total_query_volume: dataset.all_queries_count,
            magnitude_data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::tests::{address, dataset_with_clients, date, domain};
    use crate::settings::HllSettings;

    #[test]
    fn test_summary() {
        let mut dataset = Dataset::new(HllSettings::production(), Some(date())).with_debug_sets();
        dataset.update_stats(&domain("se"), &address("192.0.2.1"), 3);
        dataset.update_stats(&domain("se"), &address("2001:db8::1"), 1);
        dataset.update_stats(&domain("nu"), &address("192.0.2.1"), 1);
        dataset.finalize();
        dataset.truncate(1);

        let summary = DatasetSummary::from_dataset(&dataset);
        assert_eq!(summary.date, "2007-09-09");
        assert_eq!(summary.queries, 5);
        assert_eq!(summary.domain_count, 1);
        assert_eq!(summary.total_domain_count, Some(2));
        assert_eq!(summary.exact_clients, Some(2));
        assert_eq!(summary.exact_v6_clients, Some(1));
        assert_eq!(summary.domains[0].domain, "se");
        assert_eq!(summary.domains[0].exact_clients, Some(2));
        assert_eq!(summary.domains[0].magnitude, 10.0);
        assert_eq!(summary.hll_size, 8);
        assert_eq!(summary.domains_hll_size, 8);
    }

    #[test]
    fn test_report_json_shape() {
        let dataset = dataset_with_clients(&[2, 1]);
        let report = Report::generate(&dataset, "ns1.example", "authoritative");
        let json = serde_json::to_value(&report).unwrap();

        assert_eq!(json["date"], "2007-09-09");
        assert_eq!(json["source"], "ns1.example");
        assert_eq!(json["sourceType"], "authoritative");
        assert_eq!(json["totalQueryVolume"], 3);
        assert_eq!(json["totalUniqueClients"], dataset.all_clients_count);
        let data = json["magnitudeData"].as_array().unwrap();
        assert_eq!(data.len(), 2);
        // ascending magnitude
        assert_eq!(data[0]["domain"], "db");
        assert_eq!(data[1]["domain"], "da");
        assert_eq!(data[1]["uniqueClients"], dataset.domains[&domain("da")].clients_count);
        assert_eq!(data[1]["queryVolume"], 2);

        let parsed: Report = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, report);
    }
}
