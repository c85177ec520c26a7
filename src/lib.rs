//! DNS traffic-routing policy model.
//!
//! Three pieces fit together:
//!
//! * [`tree`]: resolution policy trees, with geo pools keyed by DNS
//!   location codes, weighted split pools, and record leaves; JSON wire
//!   encoding lives in [`json`] and visual rendering behind [`Display`].
//! * [`region`]: named distribution schemes over location codes, with
//!   weighted cross-scheme mapping, translation and partition refinement.
//! * [`diff`]: ordered, human-readable change lists between two trees.
//!
//! [`Display`]: std::fmt::Display

pub mod diff;
pub mod errors;
pub mod json;
pub mod record;
pub mod region;
mod render;
pub mod tree;
pub mod util;

pub use diff::describe;
pub use errors::{
    ConsistencyViolation, ConstructionError, PolicyError, PolicyResult, StructuralError,
};
pub use record::{Presence, RecordClass, RecordType, RecordValue};
pub use region::{DistributionScheme, Region};
pub use tree::{
    GeoEntry, GeoNode, NodeKind, PolicyNode, RecordSetNode, RegionCodes, ResolutionTree,
    WeightedEntry, WeightedNode, MAX_POLICY_DEPTH,
};
