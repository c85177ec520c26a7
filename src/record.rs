//! Opaque record values carried by policy tree leaves
//!
//! The policy model never validates or interprets these; it only needs
//! value equality, a total order for deterministic diff output, and the
//! JSON object form used inside the tree interchange format. Validation
//! and storage belong to the record layer that supplies them.

use std::fmt;

use serde::{Deserialize, Serialize};

/// DNS record type of a leaf value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordType {
    A,
    Aaaa,
    Caa,
    Cname,
    Mx,
    Ns,
    Ptr,
    Soa,
    Srv,
    Txt,
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordType::A => "A",
            RecordType::Aaaa => "AAAA",
            RecordType::Caa => "CAA",
            RecordType::Cname => "CNAME",
            RecordType::Mx => "MX",
            RecordType::Ns => "NS",
            RecordType::Ptr => "PTR",
            RecordType::Soa => "SOA",
            RecordType::Srv => "SRV",
            RecordType::Txt => "TXT",
        };
        write!(f, "{}", name)
    }
}

/// DNS record class of a leaf value. Almost always `In`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordClass {
    In,
    Ch,
    Hs,
}

impl fmt::Display for RecordClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RecordClass::In => "IN",
            RecordClass::Ch => "CH",
            RecordClass::Hs => "HS",
        };
        write!(f, "{}", name)
    }
}

/// Whether the record is asserted to exist or to be withheld.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Presence {
    Present,
    Absent,
}

/// One immutable record value.
///
/// Field order drives the derived total order: type, class, ttl, rdata.
/// Diff output lists records in this order.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordValue {
    #[serde(rename = "type")]
    pub rdtype: RecordType,
    #[serde(rename = "class")]
    pub rdclass: RecordClass,
    pub ttl: u32,
    pub rdata: String,
    pub presence: Presence,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl RecordValue {
    /// A present record with no source annotation.
    pub fn new(
        rdtype: RecordType,
        rdclass: RecordClass,
        ttl: u32,
        rdata: impl Into<String>,
    ) -> Self {
        Self {
            rdtype,
            rdclass,
            ttl,
            rdata: rdata.into(),
            presence: Presence::Present,
            source: None,
        }
    }

    /// The implicit-CNAME form attached to geo/weighted entries.
    pub fn cname(rdata: impl Into<String>, ttl: u32) -> Self {
        Self::new(RecordType::Cname, RecordClass::In, ttl, rdata)
    }

    /// Same record, annotated with its origin (vendor name, zone file, ...).
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl fmt::Display for RecordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.rdclass, self.rdtype, self.ttl, self.rdata
        )
    }
}
