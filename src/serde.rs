//! # Serde support for estimators and dataset dates
//!
//! `Hll` serializes as a byte string holding its canonical storage bytes, so the encoded
//! value is exactly what other implementations of the storage format produce and accept.
//! Deserialization also accepts a sequence of bytes for formats without a native byte
//! string type (e.g. JSON).
//!
//! Dataset dates serialize as CBOR tag 1004 (RFC 8943 full-date) wrapping a `YYYY-MM-DD`
//! text string, see [`date_tag`].
//!
//! Refer to the serde documentation for more details on custom serialization and deserialization:
//! - [Serialization](https://serde.rs/impl-serialize.html)
//! - [Deserialization](https://serde.rs/impl-deserialize.html)
use std::fmt;

use serde::de::{Error, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::estimator::Hll;

impl Serialize for Hll {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_bytes(&self.to_bytes())
    }
}

impl<'de> Deserialize<'de> for Hll {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_byte_buf(HllVisitor)
    }
}

struct HllVisitor;

impl<'de> Visitor<'de> for HllVisitor {
    type Value = Hll;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("canonical HLL storage bytes")
    }

    fn visit_bytes<E: Error>(self, v: &[u8]) -> Result<Self::Value, E> {
        Hll::from_bytes(v).map_err(E::custom)
    }

    fn visit_byte_buf<E: Error>(self, v: Vec<u8>) -> Result<Self::Value, E> {
        self.visit_bytes(&v)
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<Self::Value, A::Error>
    where
        A: SeqAccess<'de>,
    {
        let mut bytes = Vec::with_capacity(seq.size_hint().unwrap_or(0));
        while let Some(b) = seq.next_element::<u8>()? {
            bytes.push(b);
        }
        self.visit_bytes(&bytes)
    }
}

/// `#[serde(with = "date_tag")]` helpers for day-granularity dates.
pub(crate) mod date_tag {
    use chrono::NaiveDate;
    use ciborium::tag::Required;
    use serde::de::Error;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    use crate::config::DATE_TAG;

    const DATE_FORMAT: &str = "%Y-%m-%d";

    pub(crate) fn serialize<S>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        Required::<String, DATE_TAG>(date.format(DATE_FORMAT).to_string()).serialize(serializer)
    }

    pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<NaiveDate, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Required(text) = Required::<String, DATE_TAG>::deserialize(deserializer)?;
        NaiveDate::parse_from_str(&text, DATE_FORMAT)
            .map_err(|e| D::Error::custom(format!("invalid date {text:?}: {e}")))
    }
}
