//! Tests for the structural diff engine
//!
//! Each test pins the exact ordered message list for one kind of edit:
//! reweights, renames, CNAME changes, kind replacements, and record-level
//! set differences, plus the scope suffixes on nested changes.

use dnsroute::describe;
use dnsroute::errors::{ConstructionError, PolicyError};
use dnsroute::record::{RecordClass, RecordType, RecordValue};
use dnsroute::tree::{
    GeoEntry, GeoNode, PolicyNode, RecordSetNode, RegionCodes, ResolutionTree, WeightedEntry,
    WeightedNode, MAX_POLICY_DEPTH,
};
use dnsroute::util::testing;

#[ctor::ctor]
fn init() {
    testing::init_test_setup();
}

/// Distinct rdata per weighted group so record messages are attributable.
const GROUP_RDATA: [&str; 4] = ["203.0.113.1", "203.0.113.2", "203.0.113.3", "203.0.113.4"];

fn record(rdata: &str) -> RecordValue {
    RecordValue::new(RecordType::A, RecordClass::In, 300, rdata)
}

fn record_set(rdatas: &[&str]) -> PolicyNode {
    PolicyNode::RecordSet(RecordSetNode::new(
        rdatas.iter().map(|&rdata| record(rdata)).collect(),
    ))
}

fn codes(list: &[&str]) -> RegionCodes {
    RegionCodes::new(list.iter().copied()).unwrap()
}

/// Helper to build a geo-rooted tree from (single code, subtree) pairs.
fn geo_tree(entries: Vec<(&str, PolicyNode)>) -> ResolutionTree {
    let geo: GeoNode = entries
        .into_iter()
        .map(|(code, child)| (codes(&[code]), GeoEntry::new(child)))
        .collect();
    ResolutionTree::new(PolicyNode::Geo(geo))
}

/// Helper to build a weighted-rooted tree; group N serves `GROUP_RDATA[N-1]`.
fn weighted_tree(weights: &[f64]) -> ResolutionTree {
    let entries = weights
        .iter()
        .enumerate()
        .map(|(index, &weight)| WeightedEntry::new(weight, record_set(&[GROUP_RDATA[index]])))
        .collect();
    ResolutionTree::new(PolicyNode::Weighted(WeightedNode::new(entries).unwrap()))
}

// ============================================================
// equal trees
// ============================================================

#[test]
fn given_identical_trees_when_described_then_no_changes() {
    let tree = geo_tree(vec![("US", record_set(&["203.0.113.1"]))]);

    let changes = describe(&tree, &tree).unwrap();

    assert!(changes.is_empty());
}

#[test]
fn given_two_empty_trees_when_described_then_no_changes() {
    let changes = describe(&ResolutionTree::empty(), &ResolutionTree::empty()).unwrap();

    assert!(changes.is_empty());
}

#[test]
fn given_weight_drift_below_tolerance_when_described_then_no_changes() {
    let source = weighted_tree(&[1.0, 1.0]);
    let dest = weighted_tree(&[1.0 + 1e-9, 1.0]);

    let changes = describe(&source, &dest).unwrap();

    assert!(changes.is_empty());
}

// ============================================================
// weighted edits
// ============================================================

#[test]
fn given_reweighted_groups_when_described_then_weight_changes_in_order() {
    let source = weighted_tree(&[1.0, 1.0]);
    let dest = weighted_tree(&[1.0, 3.0]);

    let changes = describe(&source, &dest).unwrap();

    assert_eq!(
        changes,
        vec![
            "Group 1: Change weight 50% -> 25%",
            "Group 2: Change weight 50% -> 75%",
        ]
    );
}

#[test]
fn given_dropped_group_when_described_then_records_deleted_before_group() {
    let source = weighted_tree(&[1.0, 1.0, 2.0]);
    let dest = weighted_tree(&[1.0, 1.0]);

    let changes = describe(&source, &dest).unwrap();

    assert_eq!(
        changes,
        vec![
            "Group 1: Change weight 25% -> 50%",
            "Group 2: Change weight 25% -> 50%",
            "Delete Record IN A 300 203.0.113.3 in Group 3",
            "Delete Group 3 (weight 50%)",
        ]
    );
}

#[test]
fn given_group_cname_change_when_described_then_old_and_new_named() {
    let entry = |target: &str| {
        WeightedEntry::with_cname(
            1.0,
            record_set(&["203.0.113.1"]),
            RecordValue::cname(target, 30),
        )
    };
    let source = ResolutionTree::new(PolicyNode::Weighted(
        WeightedNode::new(vec![entry("w-old.example.net")]).unwrap(),
    ));
    let dest = ResolutionTree::new(PolicyNode::Weighted(
        WeightedNode::new(vec![entry("w-new.example.net")]).unwrap(),
    ));

    let changes = describe(&source, &dest).unwrap();

    assert_eq!(
        changes,
        vec!["Change CNAME of Group 1: w-old.example.net (TTL 30) -> w-new.example.net (TTL 30)"]
    );
}

// ============================================================
// geo edits
// ============================================================

#[test]
fn given_moved_subtree_when_described_then_rename_only() {
    let source = geo_tree(vec![("US", record_set(&["203.0.113.9"]))]);
    let dest = geo_tree(vec![("USA", record_set(&["203.0.113.9"]))]);

    let changes = describe(&source, &dest).unwrap();

    assert_eq!(changes, vec!["Rename US -> USA"]);
}

#[test]
fn given_rekeyed_region_with_changed_subtree_when_described_then_delete_and_add() {
    // the subtree changed too, so this is not a rename
    let source = geo_tree(vec![("US", record_set(&["203.0.113.9"]))]);
    let dest = geo_tree(vec![("USA", record_set(&["203.0.113.10"]))]);

    let changes = describe(&source, &dest).unwrap();

    assert_eq!(
        changes,
        vec![
            "Delete Record IN A 300 203.0.113.9 in Region \"US\"",
            "Delete Region \"US\"",
            "Add Region \"USA\"",
            "Add Record IN A 300 203.0.113.10 in Region \"USA\"",
        ]
    );
}

#[test]
fn given_two_identical_moved_subtrees_when_described_then_renames_pair_greedily() {
    let sub = || record_set(&["203.0.113.9"]);
    let source = geo_tree(vec![("AA", sub()), ("BB", sub())]);
    let dest = geo_tree(vec![("CC", sub()), ("DD", sub())]);

    let changes = describe(&source, &dest).unwrap();

    assert_eq!(changes, vec!["Rename AA -> CC", "Rename BB -> DD"]);
}

#[test]
fn given_region_cname_change_when_described_then_old_and_new_named() {
    let tree = |target: &str| {
        let geo: GeoNode = [(
            codes(&["EU"]),
            GeoEntry::with_cname(
                record_set(&["198.51.100.1"]),
                RecordValue::cname(target, 60),
            ),
        )]
        .into_iter()
        .collect();
        ResolutionTree::new(PolicyNode::Geo(geo))
    };

    let changes = describe(&tree("edge-a.example.net"), &tree("edge-b.example.net")).unwrap();

    assert_eq!(
        changes,
        vec![
            "Change CNAME of Region \"EU\": edge-a.example.net (TTL 60) -> edge-b.example.net (TTL 60)"
        ]
    );
}

#[test]
fn given_added_region_cname_when_described_then_old_side_is_none() {
    let source = geo_tree(vec![("EU", record_set(&["198.51.100.1"]))]);
    let geo: GeoNode = [(
        codes(&["EU"]),
        GeoEntry::with_cname(
            record_set(&["198.51.100.1"]),
            RecordValue::cname("edge.example.net", 60),
        ),
    )]
    .into_iter()
    .collect();
    let dest = ResolutionTree::new(PolicyNode::Geo(geo));

    let changes = describe(&source, &dest).unwrap();

    assert_eq!(
        changes,
        vec!["Change CNAME of Region \"EU\": none -> edge.example.net (TTL 60)"]
    );
}

#[test]
fn given_mixed_region_edits_when_described_then_deletes_adds_then_shared() {
    let source = geo_tree(vec![
        ("EU", record_set(&["198.51.100.1"])),
        ("US", record_set(&["203.0.113.1"])),
    ]);
    let dest = geo_tree(vec![
        ("AP", record_set(&["192.0.2.1"])),
        ("US", record_set(&["203.0.113.1", "203.0.113.2"])),
    ]);

    let changes = describe(&source, &dest).unwrap();

    assert_eq!(
        changes,
        vec![
            "Delete Record IN A 300 198.51.100.1 in Region \"EU\"",
            "Delete Region \"EU\"",
            "Add Region \"AP\"",
            "Add Record IN A 300 192.0.2.1 in Region \"AP\"",
            "Add Record IN A 300 203.0.113.2 in Region \"US\"",
        ]
    );
}

// ============================================================
// growing and shrinking whole trees
// ============================================================

#[test]
fn given_empty_source_when_described_then_adds_outside_in() {
    let dest = geo_tree(vec![("US", record_set(&["203.0.113.1", "203.0.113.2"]))]);

    let changes = describe(&ResolutionTree::empty(), &dest).unwrap();

    assert_eq!(
        changes,
        vec![
            "Add Geo pool",
            "Add Region \"US\" in Geo pool",
            "Add Record IN A 300 203.0.113.1 in Region \"US\", Geo pool",
            "Add Record IN A 300 203.0.113.2 in Region \"US\", Geo pool",
        ]
    );
}

#[test]
fn given_empty_dest_when_described_then_deletes_inside_out() {
    let source = geo_tree(vec![("US", record_set(&["203.0.113.1", "203.0.113.2"]))]);

    let changes = describe(&source, &ResolutionTree::empty()).unwrap();

    assert_eq!(
        changes,
        vec![
            "Delete Record IN A 300 203.0.113.1 in Region \"US\", Geo pool",
            "Delete Record IN A 300 203.0.113.2 in Region \"US\", Geo pool",
            "Delete Region \"US\" in Geo pool",
            "Delete Geo pool",
        ]
    );
}

// ============================================================
// kind changes
// ============================================================

#[test]
fn given_root_kind_change_when_described_then_full_replace() {
    let source = geo_tree(vec![("US", record_set(&["203.0.113.1"]))]);
    let dest = weighted_tree(&[1.0]);

    let changes = describe(&source, &dest).unwrap();

    assert_eq!(
        changes,
        vec![
            "Delete Record IN A 300 203.0.113.1 in Region \"US\", Geo pool",
            "Delete Region \"US\" in Geo pool",
            "Delete Geo pool",
            "Add Weighted pool",
            "Add Group 1 (weight 100%) in Weighted pool",
            "Add Record IN A 300 203.0.113.1 in Group 1, Weighted pool",
        ]
    );
}

#[test]
fn given_nested_kind_change_when_described_then_replace_scoped_to_region() {
    let weighted =
        WeightedNode::new(vec![WeightedEntry::new(1.0, record_set(&["203.0.113.1"]))]).unwrap();
    let source = geo_tree(vec![("US", PolicyNode::Weighted(weighted))]);
    let dest = geo_tree(vec![("US", record_set(&["203.0.113.1"]))]);

    let changes = describe(&source, &dest).unwrap();

    assert_eq!(
        changes,
        vec![
            "Delete Record IN A 300 203.0.113.1 in Group 1, Weighted pool, Region \"US\"",
            "Delete Group 1 (weight 100%) in Weighted pool, Region \"US\"",
            "Delete Weighted pool in Region \"US\"",
            "Add Record set in Region \"US\"",
            "Add Record IN A 300 203.0.113.1 in Record set, Region \"US\"",
        ]
    );
}

// ============================================================
// leaf slots
// ============================================================

#[test]
fn given_changed_record_sets_when_described_then_set_difference() {
    let source = ResolutionTree::new(record_set(&["203.0.113.1", "203.0.113.2"]));
    let dest = ResolutionTree::new(record_set(&["203.0.113.2", "203.0.113.3"]));

    let changes = describe(&source, &dest).unwrap();

    assert_eq!(
        changes,
        vec![
            "Delete Record IN A 300 203.0.113.1",
            "Add Record IN A 300 203.0.113.3",
        ]
    );
}

#[test]
fn given_record_widened_to_set_when_described_then_only_new_records() {
    // leaf kinds diff by flattened records, not as a kind change
    let source = ResolutionTree::new(PolicyNode::Record(record("203.0.113.1")));
    let dest = ResolutionTree::new(record_set(&["203.0.113.1", "203.0.113.2"]));

    let changes = describe(&source, &dest).unwrap();

    assert_eq!(changes, vec!["Add Record IN A 300 203.0.113.2"]);
}

// ============================================================
// depth guard
// ============================================================

#[test]
fn given_overdeep_tree_when_described_then_depth_error() {
    // Arrange: leaf ends up one level past the maximum
    let mut node = record_set(&["203.0.113.1"]);
    for _ in 0..MAX_POLICY_DEPTH {
        node = PolicyNode::Geo([(codes(&["US"]), GeoEntry::new(node))].into_iter().collect());
    }
    let tree = ResolutionTree::new(node);

    // Act
    let err = describe(&tree, &tree).unwrap_err();

    // Assert
    assert!(matches!(
        err,
        PolicyError::Construction(ConstructionError::DepthExceeded(_))
    ));
}
