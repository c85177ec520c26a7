//! Visual tree rendering of policy trees
//!
//! Labels use the same vocabulary as the diff messages: `Region "US,CA"`
//! for geo entries, `Group 1 (weight 50.0%)` for weighted entries, with
//! an optional `; CNAME <rdata> (TTL <ttl>)` tail on either.

use std::fmt;

use termtree::Tree;
use tracing::instrument;

use crate::record::RecordValue;
use crate::tree::{PolicyNode, ResolutionTree};

impl ResolutionTree {
    #[instrument(level = "debug", skip(self))]
    pub fn to_tree_string(&self) -> Tree<String> {
        match self.root() {
            Some(node) => node.to_tree_string(),
            None => Tree::new("Empty tree".to_string()),
        }
    }
}

impl PolicyNode {
    pub fn to_tree_string(&self) -> Tree<String> {
        match self {
            PolicyNode::Geo(geo) => {
                let leaves: Vec<_> = geo
                    .entries()
                    .iter()
                    .map(|(key, entry)| {
                        entry_tree(
                            format!("Region \"{}\"", key.key()),
                            entry.cname.as_ref(),
                            &entry.child,
                        )
                    })
                    .collect();
                Tree::new("Geo".to_string()).with_leaves(leaves)
            }
            PolicyNode::Weighted(weighted) => {
                let leaves: Vec<_> = weighted
                    .entries()
                    .iter()
                    .map(|entry| {
                        entry_tree(
                            format!(
                                "Group {} (weight {:.1}%)",
                                entry.index() + 1,
                                entry.weight() * 100.0
                            ),
                            entry.cname.as_ref(),
                            &entry.child,
                        )
                    })
                    .collect();
                Tree::new("Weighted".to_string()).with_leaves(leaves)
            }
            PolicyNode::RecordSet(records) => {
                let leaves: Vec<_> = records
                    .records()
                    .iter()
                    .map(|record| Tree::new(record.to_string()))
                    .collect();
                Tree::new("Record set".to_string()).with_leaves(leaves)
            }
            PolicyNode::Record(record) => Tree::new(record.to_string()),
        }
    }
}

fn entry_tree(mut label: String, cname: Option<&RecordValue>, child: &PolicyNode) -> Tree<String> {
    if let Some(cname) = cname {
        label.push_str(&format!("; CNAME {} (TTL {})", cname.rdata, cname.ttl));
    }
    Tree::new(label).with_leaves([child.to_tree_string()])
}

impl fmt::Display for ResolutionTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_tree_string())
    }
}
