//! Client address normalization.
//!
//! Clients are never counted by their full address: the address is first truncated to a
//! network prefix (/24 for IPv4, /48 for IPv6), and only the truncated form is hashed.
//! IPv4 prefixes are hashed in their IPv4-mapped IPv6 form so that both families share
//! one 16 byte hash input layout.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use xxhash_rust::xxh3::xxh3_64;

use crate::config::{DEFAULT_IPV4_MASK, DEFAULT_IPV6_MASK};
use crate::error::{Error, Result};

/// Normalized client address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address {
    address: IpAddr,
    truncated: IpAddr,
    hash_input: [u8; 16],
    hash: u64,
}

impl Address {
    /// Normalize `address` with the default prefix lengths.
    pub fn new(address: IpAddr) -> Result<Self> {
        Self::with_masks(address, DEFAULT_IPV4_MASK, DEFAULT_IPV6_MASK)
    }

    /// Normalize `address` keeping `v4_mask` or `v6_mask` leading bits.
    pub fn with_masks(address: IpAddr, v4_mask: u8, v6_mask: u8) -> Result<Self> {
        let (truncated, hash_input) = match address {
            IpAddr::V4(v4) => {
                if v4_mask > 32 {
                    return Err(Error::InvalidIpv4Mask(v4_mask));
                }
                let mask = u32::MAX.checked_shl(32 - u32::from(v4_mask)).unwrap_or(0);
                let truncated = Ipv4Addr::from(u32::from(v4) & mask);
                (IpAddr::V4(truncated), truncated.to_ipv6_mapped().octets())
            }
            IpAddr::V6(v6) => {
                if v6_mask > 128 {
                    return Err(Error::InvalidIpv6Mask(v6_mask));
                }
                let mask = u128::MAX.checked_shl(128 - u32::from(v6_mask)).unwrap_or(0);
                let truncated = Ipv6Addr::from(u128::from(v6) & mask);
                (IpAddr::V6(truncated), truncated.octets())
            }
        };

        Ok(Self {
            address,
            truncated,
            hash_input,
            hash: xxh3_64(&hash_input),
        })
    }

    /// Address as given
    #[inline]
    pub fn address(&self) -> IpAddr {
        self.address
    }

    /// Network prefix that is actually counted
    #[inline]
    pub fn truncated(&self) -> IpAddr {
        self.truncated
    }

    #[inline]
    pub fn hash_input(&self) -> &[u8; 16] {
        &self.hash_input
    }

    /// XXH3 hash of the 16 byte hash input
    #[inline]
    pub fn hash(&self) -> u64 {
        self.hash
    }

    #[inline]
    pub fn is_ipv6(&self) -> bool {
        self.address.is_ipv6()
    }
}

impl FromStr for Address {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let address = s
            .trim()
            .parse::<IpAddr>()
            .map_err(|_| Error::InvalidAddress(s.to_string()))?;
        Self::new(address)
    }
}

impl TryFrom<IpAddr> for Address {
    type Error = Error;

    fn try_from(address: IpAddr) -> Result<Self> {
        Self::new(address)
    }
}
