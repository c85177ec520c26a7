//! Resolution-policy tree model
//!
//! A policy tree selects a DNS answer set by requester geography
//! (`GeoNode`), weighted random distribution (`WeightedNode`), or both.
//! The layers bottom out in flat record sets and record leaves. Nodes are
//! immutable after construction and own their children exclusively; edits
//! build new trees.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use itertools::Itertools;

use crate::errors::ConstructionError;
use crate::record::RecordValue;

/// Depth accepted by the JSON decoder and the diff traversal before they
/// fail fast. Real policies are a handful of levels deep.
pub const MAX_POLICY_DEPTH: usize = 64;

/// The key of a geo entry: an immutable, non-empty set of region codes.
///
/// Same concept as [`Region`](crate::region::Region), scoped to the tree:
/// the canonical key here is the bare comma-joined form used on the wire.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegionCodes {
    codes: BTreeSet<String>,
}

impl RegionCodes {
    pub fn new<I, S>(codes: I) -> Result<Self, ConstructionError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let codes: BTreeSet<String> = codes.into_iter().map(Into::into).collect();
        if codes.is_empty() {
            return Err(ConstructionError::EmptyRegion);
        }
        Ok(Self { codes })
    }

    pub fn codes(&self) -> &BTreeSet<String> {
        &self.codes
    }

    /// Canonical key: codes sorted, comma-joined, no spaces.
    pub fn key(&self) -> String {
        self.codes.iter().join(",")
    }
}

impl fmt::Display for RegionCodes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// One geo branch: an optional implicit CNAME plus the subtree served to
/// requesters from the keyed regions.
#[derive(Debug, Clone, PartialEq)]
pub struct GeoEntry {
    pub cname: Option<RecordValue>,
    pub child: PolicyNode,
}

impl GeoEntry {
    pub fn new(child: PolicyNode) -> Self {
        Self { cname: None, child }
    }

    pub fn with_cname(child: PolicyNode, cname: RecordValue) -> Self {
        Self {
            cname: Some(cname),
            child,
        }
    }
}

/// Geographic selection: distinct region-code keys, each owning a subtree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeoNode {
    entries: BTreeMap<RegionCodes, GeoEntry>,
}

impl GeoNode {
    pub fn new(entries: BTreeMap<RegionCodes, GeoEntry>) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &BTreeMap<RegionCodes, GeoEntry> {
        &self.entries
    }

    pub fn get(&self, key: &RegionCodes) -> Option<&GeoEntry> {
        self.entries.get(key)
    }
}

impl FromIterator<(RegionCodes, GeoEntry)> for GeoNode {
    fn from_iter<I: IntoIterator<Item = (RegionCodes, GeoEntry)>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// One weighted branch. The weight is normalized by [`WeightedNode::new`];
/// before that it is the caller's raw weight.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedEntry {
    index: usize,
    weight: f64,
    pub cname: Option<RecordValue>,
    pub child: PolicyNode,
}

impl WeightedEntry {
    pub fn new(weight: f64, child: PolicyNode) -> Self {
        Self {
            index: 0,
            weight,
            cname: None,
            child,
        }
    }

    pub fn with_cname(weight: f64, child: PolicyNode, cname: RecordValue) -> Self {
        Self {
            index: 0,
            weight,
            cname: Some(cname),
            child,
        }
    }

    /// Position within the owning node, assigned at construction.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Normalized weight in [0, 1].
    pub fn weight(&self) -> f64 {
        self.weight
    }
}

/// Weighted random selection over an ordered list of branches.
///
/// Construction normalizes the raw entry weights once: each becomes
/// `weight / total`, or `1 / N` for every entry when the total is zero.
/// Weights never change afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct WeightedNode {
    entries: Vec<WeightedEntry>,
}

impl WeightedNode {
    pub fn new(entries: Vec<WeightedEntry>) -> Result<Self, ConstructionError> {
        if entries.is_empty() {
            return Err(ConstructionError::EmptyWeighted);
        }

        let total: f64 = entries.iter().map(|entry| entry.weight).sum();
        let count = entries.len() as f64;
        let entries = entries
            .into_iter()
            .enumerate()
            .map(|(index, entry)| WeightedEntry {
                index,
                weight: if total == 0.0 {
                    1.0 / count
                } else {
                    entry.weight / total
                },
                ..entry
            })
            .collect();

        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[WeightedEntry] {
        &self.entries
    }
}

/// A flat answer set: record leaves with no weight or region semantics.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSetNode {
    records: Vec<RecordValue>,
}

impl RecordSetNode {
    pub fn new(records: Vec<RecordValue>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[RecordValue] {
        &self.records
    }
}

/// Discriminant of a policy node; the names double as the wire `kind`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Geo,
    Weighted,
    RecordSet,
    Record,
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Geo => "Geo",
            NodeKind::Weighted => "Weighted",
            NodeKind::RecordSet => "RecordSet",
            NodeKind::Record => "Record",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// One node of a routing policy: the closed set of policy layers.
///
/// Every consumer matches exhaustively, so adding a variant without
/// updating serialization, diffing, and the collectors will not compile.
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyNode {
    Geo(GeoNode),
    Weighted(WeightedNode),
    RecordSet(RecordSetNode),
    Record(RecordValue),
}

impl PolicyNode {
    pub fn kind(&self) -> NodeKind {
        match self {
            PolicyNode::Geo(_) => NodeKind::Geo,
            PolicyNode::Weighted(_) => NodeKind::Weighted,
            PolicyNode::RecordSet(_) => NodeKind::RecordSet,
            PolicyNode::Record(_) => NodeKind::Record,
        }
    }

    /// Record sets and record leaves resolve directly to answers.
    pub fn is_leaf(&self) -> bool {
        matches!(self, PolicyNode::RecordSet(_) | PolicyNode::Record(_))
    }

    /// Every record leaf reachable from this node, deduplicated and in
    /// record order.
    pub fn all_records(&self) -> BTreeSet<RecordValue> {
        let mut records = BTreeSet::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match node {
                PolicyNode::Geo(geo) => {
                    stack.extend(geo.entries().values().map(|entry| &entry.child));
                }
                PolicyNode::Weighted(weighted) => {
                    stack.extend(weighted.entries().iter().map(|entry| &entry.child));
                }
                PolicyNode::RecordSet(set) => {
                    records.extend(set.records().iter().cloned());
                }
                PolicyNode::Record(value) => {
                    records.insert(value.clone());
                }
            }
        }
        records
    }

    /// Every implicit-CNAME target attached to any geo or weighted entry
    /// below this node.
    pub fn referenced_cnames(&self) -> BTreeSet<String> {
        let mut targets = BTreeSet::new();
        let mut stack = vec![self];
        while let Some(node) = stack.pop() {
            match node {
                PolicyNode::Geo(geo) => {
                    for entry in geo.entries().values() {
                        if let Some(cname) = &entry.cname {
                            targets.insert(cname.rdata.clone());
                        }
                        stack.push(&entry.child);
                    }
                }
                PolicyNode::Weighted(weighted) => {
                    for entry in weighted.entries() {
                        if let Some(cname) = &entry.cname {
                            targets.insert(cname.rdata.clone());
                        }
                        stack.push(&entry.child);
                    }
                }
                PolicyNode::RecordSet(_) | PolicyNode::Record(_) => {}
            }
        }
        targets
    }

    /// Height of the subtree rooted here; a leaf is 1.
    pub fn depth(&self) -> usize {
        let mut max = 0;
        let mut stack = vec![(self, 1)];
        while let Some((node, level)) = stack.pop() {
            max = max.max(level);
            match node {
                PolicyNode::Geo(geo) => {
                    stack.extend(geo.entries().values().map(|entry| (&entry.child, level + 1)));
                }
                PolicyNode::Weighted(weighted) => {
                    stack.extend(
                        weighted
                            .entries()
                            .iter()
                            .map(|entry| (&entry.child, level + 1)),
                    );
                }
                PolicyNode::RecordSet(_) | PolicyNode::Record(_) => {}
            }
        }
        max
    }
}

/// One resource's routing policy. An absent root means the resource has no
/// distribution policy, only plain records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolutionTree {
    root: Option<PolicyNode>,
}

impl ResolutionTree {
    pub fn new(root: PolicyNode) -> Self {
        Self { root: Some(root) }
    }

    pub fn empty() -> Self {
        Self { root: None }
    }

    pub fn root(&self) -> Option<&PolicyNode> {
        self.root.as_ref()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    pub fn all_records(&self) -> BTreeSet<RecordValue> {
        self.root
            .as_ref()
            .map(PolicyNode::all_records)
            .unwrap_or_default()
    }

    pub fn referenced_cnames(&self) -> BTreeSet<String> {
        self.root
            .as_ref()
            .map(PolicyNode::referenced_cnames)
            .unwrap_or_default()
    }

    /// Height of the tree; the empty tree is 0.
    pub fn depth(&self) -> usize {
        self.root.as_ref().map(PolicyNode::depth).unwrap_or(0)
    }
}
