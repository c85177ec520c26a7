//! Error taxonomy for the policy model
//!
//! Three categories, one per failure domain: structural (malformed tree
//! shape, almost always at the JSON boundary), consistency (scheme algebra
//! preconditions), and construction (invariants of the value types
//! themselves). All are unrecoverable for the caller; none are retried.

use thiserror::Error;

/// Malformed tree shape: unknown kinds, ill-typed members, bad wire JSON.
///
/// With the closed node enum these can only arise while decoding the
/// interchange form, never from an already-constructed tree.
#[derive(Error, Debug)]
pub enum StructuralError {
    #[error("unknown node kind: {0}")]
    UnknownKind(String),

    #[error("record set member must be a Record, got {kind}")]
    RecordSetChild { kind: String },

    #[error("{kind} node has no members list")]
    MissingMembers { kind: String },

    #[error("Record node has no record value")]
    MissingRecordValue,

    #[error("{kind} node cannot carry {field}")]
    UnexpectedField { kind: String, field: String },

    #[error("{kind} member has no info field")]
    MissingMemberInfo { kind: String },

    #[error("{kind} member info must be {expected}")]
    MemberInfoType { kind: String, expected: String },

    #[error("Geo member has an empty region code list")]
    EmptyRegionInfo,

    #[error("duplicate geo region key: {0}")]
    DuplicateRegion(String),

    #[error("member cname and cname_ttl must be present together")]
    PartialCname,

    #[error("invalid policy JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Scheme algebra called across schemes that do not describe the same
/// universe of region codes, or with incomplete translation input.
#[derive(Error, Debug)]
pub enum ConsistencyViolation {
    #[error(
        "schemes cover different code universes: only in source: [{}], only in target: [{}]",
        .only_in_source.join(", "),
        .only_in_target.join(", ")
    )]
    CodeUniverseMismatch {
        only_in_source: Vec<String>,
        only_in_target: Vec<String>,
    },

    #[error("no value distribution for region: {0}")]
    MissingDistribution(String),
}

/// Invariant violations at value construction time.
#[derive(Error, Debug)]
pub enum ConstructionError {
    #[error("weighted node requires at least one entry")]
    EmptyWeighted,

    #[error("region requires at least one code")]
    EmptyRegion,

    #[error("policy tree exceeds maximum depth of {0}")]
    DepthExceeded(usize),
}

/// Crate-level error, one variant per category.
#[derive(Error, Debug)]
pub enum PolicyError {
    #[error("{0}")]
    Structural(#[from] StructuralError),

    #[error("{0}")]
    Consistency(#[from] ConsistencyViolation),

    #[error("{0}")]
    Construction(#[from] ConstructionError),
}

/// Result type for policy operations.
pub type PolicyResult<T> = Result<T, PolicyError>;
