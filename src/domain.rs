//! Query name normalization.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// TLD grammar: plain ASCII letters, or an IDN A-label.
const TLD_PATTERN: &str = "^(?:[a-z]{2,63}|xn--[a-z0-9-]{1,59})$";

static TLD_REGEX: OnceLock<Regex> = OnceLock::new();

fn tld_regex() -> &'static Regex {
    TLD_REGEX.get_or_init(|| Regex::new(TLD_PATTERN).expect("TLD pattern compiles"))
}

/// Lowercased, reduced domain name as tracked in a dataset.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DomainName(String);

impl DomainName {
    /// Sentinel for the root domain, counted globally but never tracked per domain.
    pub const ROOT: &'static str = ".";

    /// Reduce `name` to its last `labels` labels. The empty name and `.` map to the root.
    pub fn parse(name: &str, labels: u8) -> Result<Self> {
        if name.is_empty() || name == Self::ROOT {
            return Ok(Self::root());
        }

        let name = name.to_lowercase();
        let name = name.strip_suffix('.').unwrap_or(&name);
        let split: Vec<&str> = name.split('.').collect();

        let required = usize::from(labels);
        let Some(idx) = split.len().checked_sub(required) else {
            return Err(Error::TooFewLabels {
                found: split.len(),
                required,
            });
        };

        // further labels are the caller's concern when more than one is tracked
        let tld = split[split.len() - 1];
        if !tld_regex().is_match(tld) {
            return Err(Error::InvalidTld(tld.to_string()));
        }

        Ok(Self(split[idx..].join(".")))
    }

    pub fn root() -> Self {
        Self(Self::ROOT.to_string())
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.0 == Self::ROOT
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DomainName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for DomainName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
