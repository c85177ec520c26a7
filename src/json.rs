//! JSON interchange form for policy trees
//!
//! Wire shape, round-trip exact for well-formed trees:
//!
//! ```text
//! Node  := { "kind": "Geo"|"Weighted"|"RecordSet"|"Record",
//!            "members": [Member...]?,     // container kinds
//!            "value": RecordJSON? }       // kind == "Record" only
//! Member:= Node plus "info" (Geo: comma-joined codes; Weighted: integer
//!          percentage) and optional "cname"/"cname_ttl"
//! ```
//!
//! The empty tree is JSON `null`. Decoding is strict: semantically wrong
//! shapes fail with a typed error instead of being silently repaired.

use std::collections::BTreeMap;

use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, instrument};

use crate::errors::{ConstructionError, PolicyError, PolicyResult, StructuralError};
use crate::record::RecordValue;
use crate::tree::{
    GeoEntry, GeoNode, PolicyNode, RecordSetNode, RegionCodes, ResolutionTree, WeightedEntry,
    WeightedNode, MAX_POLICY_DEPTH,
};

#[derive(Debug, Deserialize)]
struct WireNode {
    kind: String,
    #[serde(default)]
    members: Option<Vec<WireMember>>,
    #[serde(default)]
    value: Option<RecordValue>,
}

#[derive(Debug, Deserialize)]
struct WireMember {
    #[serde(flatten)]
    node: WireNode,
    #[serde(default)]
    info: Option<WireInfo>,
    #[serde(default)]
    cname: Option<String>,
    #[serde(default)]
    cname_ttl: Option<u32>,
}

/// Member `info` is a code string for geo members and an integer
/// percentage for weighted members.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum WireInfo {
    Percent(u64),
    Codes(String),
}

impl ResolutionTree {
    /// Wire form of the tree; the empty tree is `null`.
    pub fn to_json(&self) -> Value {
        match self.root() {
            Some(root) => Value::Object(encode_node(root)),
            None => Value::Null,
        }
    }

    /// Decodes the wire form, strictly.
    #[instrument(level = "debug", skip(value))]
    pub fn from_json(value: &Value) -> PolicyResult<Self> {
        if value.is_null() {
            return Ok(Self::empty());
        }
        let wire = WireNode::deserialize(value).map_err(StructuralError::Json)?;
        debug!(kind = %wire.kind, "decoding policy tree");
        let root = decode_node(&wire, 1)?;
        Ok(Self::new(root))
    }

    /// [`from_json`](Self::from_json) over raw JSON text.
    pub fn from_json_str(text: &str) -> PolicyResult<Self> {
        let value: Value = serde_json::from_str(text).map_err(StructuralError::Json)?;
        Self::from_json(&value)
    }
}

fn encode_node(node: &PolicyNode) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("kind".to_string(), json!(node.kind().name()));
    match node {
        PolicyNode::Geo(geo) => {
            let members: Vec<Value> = geo
                .entries()
                .iter()
                .map(|(key, entry)| {
                    let mut member = encode_node(&entry.child);
                    member.insert("info".to_string(), json!(key.key()));
                    encode_entry_cname(&mut member, &entry.cname);
                    Value::Object(member)
                })
                .collect();
            map.insert("members".to_string(), Value::Array(members));
        }
        PolicyNode::Weighted(weighted) => {
            let members: Vec<Value> = weighted
                .entries()
                .iter()
                .map(|entry| {
                    let mut member = encode_node(&entry.child);
                    member.insert("info".to_string(), json!(percent_of(entry.weight())));
                    encode_entry_cname(&mut member, &entry.cname);
                    Value::Object(member)
                })
                .collect();
            map.insert("members".to_string(), Value::Array(members));
        }
        PolicyNode::RecordSet(set) => {
            let members: Vec<Value> = set
                .records()
                .iter()
                .map(|record| {
                    let mut member = Map::new();
                    member.insert("kind".to_string(), json!("Record"));
                    member.insert("value".to_string(), json!(record));
                    Value::Object(member)
                })
                .collect();
            map.insert("members".to_string(), Value::Array(members));
        }
        PolicyNode::Record(value) => {
            map.insert("value".to_string(), json!(value));
        }
    }
    map
}

fn encode_entry_cname(member: &mut Map<String, Value>, cname: &Option<RecordValue>) {
    if let Some(cname) = cname {
        member.insert("cname".to_string(), json!(cname.rdata));
        member.insert("cname_ttl".to_string(), json!(cname.ttl));
    }
}

/// Nearest-integer percentage; renormalization on decode recovers the
/// fraction for well-formed trees. Must round, not truncate: the nearest
/// f64 to 29/100 sits just below it.
pub(crate) fn percent_of(weight: f64) -> u64 {
    (weight * 100.0).round() as u64
}

fn decode_node(wire: &WireNode, depth: usize) -> PolicyResult<PolicyNode> {
    if depth > MAX_POLICY_DEPTH {
        return Err(ConstructionError::DepthExceeded(MAX_POLICY_DEPTH).into());
    }

    match wire.kind.as_str() {
        "Geo" => {
            ensure_no_value(wire)?;
            let mut entries = BTreeMap::new();
            for member in required_members(wire)? {
                let codes = decode_geo_key(member)?;
                if entries.contains_key(&codes) {
                    return Err(StructuralError::DuplicateRegion(codes.key()).into());
                }
                let cname = decode_member_cname(member)?;
                let child = decode_node(&member.node, depth + 1)?;
                entries.insert(codes, GeoEntry { cname, child });
            }
            Ok(PolicyNode::Geo(GeoNode::new(entries)))
        }
        "Weighted" => {
            ensure_no_value(wire)?;
            let mut entries = Vec::new();
            for member in required_members(wire)? {
                let weight = decode_weight(member)?;
                let cname = decode_member_cname(member)?;
                let child = decode_node(&member.node, depth + 1)?;
                let entry = match cname {
                    Some(cname) => WeightedEntry::with_cname(weight, child, cname),
                    None => WeightedEntry::new(weight, child),
                };
                entries.push(entry);
            }
            Ok(PolicyNode::Weighted(WeightedNode::new(entries)?))
        }
        "RecordSet" => {
            ensure_no_value(wire)?;
            let mut records = Vec::new();
            for member in required_members(wire)? {
                if member.node.kind != "Record" {
                    return Err(StructuralError::RecordSetChild {
                        kind: member.node.kind.clone(),
                    }
                    .into());
                }
                ensure_plain_member(member)?;
                let value = member
                    .node
                    .value
                    .clone()
                    .ok_or(StructuralError::MissingRecordValue)?;
                records.push(value);
            }
            Ok(PolicyNode::RecordSet(RecordSetNode::new(records)))
        }
        "Record" => {
            if wire.members.is_some() {
                return Err(unexpected(wire.kind.clone(), "members"));
            }
            let value = wire
                .value
                .clone()
                .ok_or(StructuralError::MissingRecordValue)?;
            Ok(PolicyNode::Record(value))
        }
        other => Err(StructuralError::UnknownKind(other.to_string()).into()),
    }
}

fn required_members(wire: &WireNode) -> Result<&[WireMember], StructuralError> {
    wire.members
        .as_deref()
        .ok_or_else(|| StructuralError::MissingMembers {
            kind: wire.kind.clone(),
        })
}

fn ensure_no_value(wire: &WireNode) -> Result<(), PolicyError> {
    if wire.value.is_some() {
        return Err(unexpected(wire.kind.clone(), "value"));
    }
    Ok(())
}

/// Record members inside a record set carry neither info nor cname fields.
fn ensure_plain_member(member: &WireMember) -> Result<(), PolicyError> {
    if member.info.is_some() {
        return Err(unexpected("RecordSet member".to_string(), "info"));
    }
    if member.cname.is_some() || member.cname_ttl.is_some() {
        return Err(unexpected("RecordSet member".to_string(), "cname"));
    }
    if member.node.members.is_some() {
        return Err(unexpected("Record".to_string(), "members"));
    }
    Ok(())
}

fn unexpected(kind: String, field: &str) -> PolicyError {
    StructuralError::UnexpectedField {
        kind,
        field: field.to_string(),
    }
    .into()
}

fn decode_geo_key(member: &WireMember) -> PolicyResult<RegionCodes> {
    let text = match &member.info {
        Some(WireInfo::Codes(text)) => text,
        Some(WireInfo::Percent(_)) => {
            return Err(StructuralError::MemberInfoType {
                kind: "Geo".to_string(),
                expected: "a region code string".to_string(),
            }
            .into())
        }
        None => {
            return Err(StructuralError::MissingMemberInfo {
                kind: "Geo".to_string(),
            }
            .into())
        }
    };

    let codes: Vec<&str> = text.split(',').collect();
    if codes.iter().any(|code| code.is_empty()) {
        return Err(StructuralError::EmptyRegionInfo.into());
    }
    Ok(RegionCodes::new(codes)?)
}

fn decode_weight(member: &WireMember) -> PolicyResult<f64> {
    match &member.info {
        Some(WireInfo::Percent(percent)) => Ok(*percent as f64),
        Some(WireInfo::Codes(_)) => Err(StructuralError::MemberInfoType {
            kind: "Weighted".to_string(),
            expected: "an integer percentage".to_string(),
        }
        .into()),
        None => Err(StructuralError::MissingMemberInfo {
            kind: "Weighted".to_string(),
        }
        .into()),
    }
}

fn decode_member_cname(member: &WireMember) -> Result<Option<RecordValue>, StructuralError> {
    match (&member.cname, member.cname_ttl) {
        (Some(rdata), Some(ttl)) => Ok(Some(RecordValue::cname(rdata.clone(), ttl))),
        (None, None) => Ok(None),
        _ => Err(StructuralError::PartialCname),
    }
}
