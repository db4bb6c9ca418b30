//! Merging of datasets collected for the same day.

use tracing::debug;

use crate::dataset::{Dataset, DebugSets, DomainStats};
use crate::error::{Error, Result};

/// Merge two or more datasets into a new finalized dataset.
///
/// All inputs must share the version and date of the first one. Exact query counters are
/// summed, estimators are unioned and the derived client counts are recomputed from the
/// unions. Debug sets are unioned when present.
pub fn aggregate(datasets: &[&Dataset]) -> Result<Dataset> {
    let [first, ..] = datasets else {
        return Err(Error::NoDatasets);
    };
    if datasets.len() < 2 {
        return Err(Error::NoDatasets);
    }

    for dataset in datasets {
        if dataset.version != first.version {
            return Err(Error::VersionMismatch {
                name: dataset.name().to_string(),
                version: dataset.version,
                expected: first.version,
            });
        }
        if dataset.date != first.date {
            return Err(Error::DateMismatch {
                name: dataset.name().to_string(),
                date: dataset.date,
                expected: first.date,
            });
        }
    }

    let settings = first.settings();
    let mut result = Dataset::new(settings, Some(first.date));

    for dataset in datasets {
        result
            .all_clients_hll
            .strict_union(&dataset.all_clients_hll)
            .map_err(|source| Error::Union {
                context: "global".to_string(),
                source,
            })?;
        result.all_queries_count += dataset.all_queries_count;

        if let Some(other) = dataset.debug.as_ref() {
            result.debug.get_or_insert_with(DebugSets::default).union(other);
        }

        for (domain, stats) in &dataset.domains {
            if !result.domains.contains_key(domain) {
                result.domains.insert(domain.clone(), DomainStats::new(settings));
            }
            let Some(merged) = result.domains.get_mut(domain) else {
                continue;
            };
            merged.queries_count += stats.queries_count;
            merged
                .hll
                .strict_union(&stats.hll)
                .map_err(|source| Error::Union {
                    context: format!("domain {domain}"),
                    source,
                })?;
            if let Some(clients) = stats.clients.as_ref() {
                merged
                    .clients
                    .get_or_insert_with(Default::default)
                    .extend(clients.iter().copied());
            }
        }
    }

    result.finalize();

    debug!(
        action = "aggregate",
        component = "aggregator",
        inputs = datasets.len(),
        domains = result.domains.len(),
        queries = result.all_queries_count,
        "datasets aggregated"
    );

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::tests::{address, dataset_with_clients, date, domain};
    use crate::settings::{ExplicitThreshold, HllSettings};
    use chrono::NaiveDate;
    use test_case::test_case;

    #[test]
    fn test_needs_two_datasets() {
        let dataset = dataset_with_clients(&[1]);
        assert!(matches!(aggregate(&[]), Err(Error::NoDatasets)));
        assert!(matches!(aggregate(&[&dataset]), Err(Error::NoDatasets)));
    }

    #[test_case(2; "twice")]
    #[test_case(5; "five times")]
    fn test_self_merge_sums_queries_keeps_estimates(n: usize) {
        let dataset = dataset_with_clients(&[3, 1, 7]);
        let inputs = vec![&dataset; n];
        let merged = aggregate(&inputs).unwrap();

        assert_eq!(merged.all_queries_count, dataset.all_queries_count * n as u64);
        assert_eq!(merged.all_clients_count, dataset.all_clients_count);
        assert_eq!(merged.all_clients_hll.to_bytes(), dataset.all_clients_hll.to_bytes());
        for (name, stats) in &dataset.domains {
            let merged_stats = &merged.domains[name];
            assert_eq!(merged_stats.queries_count, stats.queries_count * n as u64);
            assert_eq!(merged_stats.clients_count, stats.clients_count);
        }
        assert_eq!(merged.date, dataset.date);
        assert_ne!(merged.id, dataset.id);
    }

    #[test]
    fn test_domains_are_unioned() {
        let mut a = Dataset::new(HllSettings::production(), Some(date()));
        a.update_stats(&domain("se"), &address("192.0.2.1"), 1);
        a.update_stats(&domain("nu"), &address("192.0.2.1"), 1);
        let mut b = Dataset::new(HllSettings::production(), Some(date()));
        b.update_stats(&domain("se"), &address("198.51.100.1"), 4);

        let merged = aggregate(&[&a, &b]).unwrap();
        assert_eq!(merged.all_queries_count, 6);
        assert_eq!(merged.domains[&domain("se")].queries_count, 5);
        assert_eq!(merged.domains[&domain("nu")].queries_count, 1);
        // two distinct /24s, derived counts recomputed from the union
        assert_eq!(merged.all_clients_count, 3);
        assert_eq!(merged.domains[&domain("se")].clients_count, 3);
    }

    #[test]
    fn test_date_mismatch() {
        let mut a = dataset_with_clients(&[1]);
        a.set_source("a.dnsmag#1");
        let mut b = dataset_with_clients(&[1]);
        b.set_source("b.dnsmag#1");
        b.set_date(NaiveDate::from_ymd_opt(2009, 12, 21).unwrap());

        let err = aggregate(&[&a, &b]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "date mismatch: dataset b.dnsmag#1 has date 2009-12-21, expected 2007-09-09"
        );
    }

    #[test]
    fn test_version_mismatch() {
        let a = dataset_with_clients(&[1]);
        let mut b = dataset_with_clients(&[1]);
        b.version = 2;
        b.set_source("b.dnsmag#3");

        let err = aggregate(&[&a, &b]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "version mismatch: dataset b.dnsmag#3 has version 2, expected 1"
        );
    }

    #[test]
    fn test_incompatible_settings_name_the_context() {
        let a = dataset_with_clients(&[1]);
        let other = HllSettings::new(12, 5, ExplicitThreshold::Disabled, true).unwrap();
        let mut b = Dataset::new(other, Some(date()));
        b.update_stats(&domain("da"), &address("192.0.2.1"), 1);

        let err = aggregate(&[&a, &b]).unwrap_err();
        assert!(matches!(err, Error::Union { ref context, .. } if context == "global"));

        // same global settings, mismatching domain estimator
        let mut c = dataset_with_clients(&[1]);
        c.domains.get_mut(&domain("da")).unwrap().hll = b.domains[&domain("da")].hll.clone();
        let err = aggregate(&[&a, &c]).unwrap_err();
        assert!(err.to_string().starts_with("failed to union HLL for domain da: "));
    }

    #[test]
    fn test_debug_sets_are_unioned() {
        let mut a = Dataset::new(HllSettings::production(), Some(date())).with_debug_sets();
        a.update_stats(&domain("se"), &address("192.0.2.1"), 1);
        let mut b = Dataset::new(HllSettings::production(), Some(date())).with_debug_sets();
        b.update_stats(&domain("se"), &address("2001:db8::1"), 1);

        let merged = aggregate(&[&a, &b]).unwrap();
        let debug = merged.debug_sets().unwrap();
        assert_eq!(debug.clients.len(), 2);
        assert_eq!(debug.v6_clients.len(), 1);
        assert_eq!(merged.domains[&domain("se")].exact_clients().unwrap().len(), 2);

        let plain = dataset_with_clients(&[1]);
        assert!(aggregate(&[&plain, &plain]).unwrap().debug_sets().is_none());
    }
}
