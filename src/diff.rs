//! Structural diff of two policy trees
//!
//! [`describe`] walks two trees in lockstep and emits an ordered,
//! human-readable change list: geo keys are matched by region (with rename
//! detection), weighted entries by position, and leaves by flattened
//! record sets. Deletions come before additions at every scope, and
//! messages carry their enclosing region/group context, so the flat list
//! reads as a hierarchical diff.

use tracing::{debug, instrument};

use crate::errors::{ConstructionError, PolicyResult};
use crate::json::percent_of;
use crate::record::RecordValue;
use crate::tree::{
    GeoNode, NodeKind, PolicyNode, ResolutionTree, WeightedNode, MAX_POLICY_DEPTH,
};

/// Normalized weights closer than this are reported unchanged.
const WEIGHT_TOLERANCE: f64 = 1e-6;

/// Ordered change messages turning `source` into `dest`.
///
/// Equal trees (including two empty trees) produce an empty list. A kind
/// change at any slot is reported as a full delete plus a full add, never
/// as an error; the only failure is a tree nested beyond
/// [`MAX_POLICY_DEPTH`].
#[instrument(level = "debug", skip_all)]
pub fn describe(source: &ResolutionTree, dest: &ResolutionTree) -> PolicyResult<Vec<String>> {
    let mut walker = DiffWalker::default();
    walker.diff_slot(source.root(), dest.root(), Context::Pool, "", 1)?;
    debug!(changes = walker.messages.len(), "described tree differences");
    Ok(walker.messages)
}

/// How a slot hangs off its parent, for message text.
#[derive(Debug, Clone)]
enum Context {
    /// Parentless or replacing a whole subtree: label by node kind.
    Pool,
    /// A geo entry, labeled by its canonical key.
    Region(String),
    /// A weighted entry; add/delete messages carry its weight.
    Group { index: usize, weight: f64 },
}

impl Context {
    fn message_label(&self, kind: NodeKind) -> String {
        match self {
            Context::Pool => pool_label(kind).to_string(),
            Context::Region(key) => format!("Region \"{}\"", key),
            Context::Group { index, weight } => {
                format!("Group {} (weight {}%)", index + 1, percent_of(*weight))
            }
        }
    }

    fn scope_label(&self, kind: NodeKind) -> String {
        match self {
            Context::Pool => pool_label(kind).to_string(),
            Context::Region(key) => format!("Region \"{}\"", key),
            Context::Group { index, .. } => format!("Group {}", index + 1),
        }
    }
}

fn pool_label(kind: NodeKind) -> &'static str {
    match kind {
        NodeKind::Geo => "Geo pool",
        NodeKind::Weighted => "Weighted pool",
        NodeKind::RecordSet => "Record set",
        NodeKind::Record => "Record",
    }
}

#[derive(Default)]
struct DiffWalker {
    messages: Vec<String>,
}

impl DiffWalker {
    fn emit(&mut self, text: String) {
        debug!("{}", text);
        self.messages.push(text);
    }

    /// Diffs one slot. `suffix` names the scopes around the slot, not the
    /// slot itself; `ctx` is the slot's own label relative to its parent.
    fn diff_slot(
        &mut self,
        source: Option<&PolicyNode>,
        dest: Option<&PolicyNode>,
        ctx: Context,
        suffix: &str,
        depth: usize,
    ) -> PolicyResult<()> {
        check_depth(depth)?;

        match (source, dest) {
            (None, None) => Ok(()),
            (None, Some(node)) => {
                // announce the container, then fill it
                self.emit(format!(
                    "Add {}{}",
                    ctx.message_label(node.kind()),
                    use_suffix(suffix)
                ));
                let inner = amend(&ctx.scope_label(node.kind()), suffix);
                self.walk_added(node, &inner, depth)
            }
            (Some(node), None) => {
                // empty the container, then remove it
                let inner = amend(&ctx.scope_label(node.kind()), suffix);
                self.walk_deleted(node, &inner, depth)?;
                self.emit(format!(
                    "Delete {}{}",
                    ctx.message_label(node.kind()),
                    use_suffix(suffix)
                ));
                Ok(())
            }
            (Some(a), Some(b)) => match (a, b) {
                (PolicyNode::Geo(g1), PolicyNode::Geo(g2)) => {
                    self.diff_geo(g1, g2, suffix, depth)
                }
                (PolicyNode::Weighted(w1), PolicyNode::Weighted(w2)) => {
                    self.diff_weighted(w1, w2, suffix, depth)
                }
                _ if a.is_leaf() && b.is_leaf() => {
                    self.diff_leaf_records(a, b, suffix);
                    Ok(())
                }
                // kind change: replace the whole subtree, delete first
                _ => {
                    self.diff_slot(Some(a), None, Context::Pool, suffix, depth)?;
                    self.diff_slot(None, Some(b), Context::Pool, suffix, depth)
                }
            },
        }
    }

    /// Nested additions for a node that exists only on the dest side.
    fn walk_added(&mut self, node: &PolicyNode, suffix: &str, depth: usize) -> PolicyResult<()> {
        match node {
            PolicyNode::Geo(geo) => {
                for (key, entry) in geo.entries() {
                    self.diff_slot(
                        None,
                        Some(&entry.child),
                        Context::Region(key.key()),
                        suffix,
                        depth + 1,
                    )?;
                }
            }
            PolicyNode::Weighted(weighted) => {
                for entry in weighted.entries() {
                    self.diff_slot(
                        None,
                        Some(&entry.child),
                        Context::Group {
                            index: entry.index(),
                            weight: entry.weight(),
                        },
                        suffix,
                        depth + 1,
                    )?;
                }
            }
            PolicyNode::RecordSet(_) | PolicyNode::Record(_) => {
                for record in node.all_records() {
                    self.emit(format!("Add Record {}{}", record, use_suffix(suffix)));
                }
            }
        }
        Ok(())
    }

    /// Nested deletions for a node that exists only on the source side.
    fn walk_deleted(&mut self, node: &PolicyNode, suffix: &str, depth: usize) -> PolicyResult<()> {
        match node {
            PolicyNode::Geo(geo) => {
                for (key, entry) in geo.entries() {
                    self.diff_slot(
                        Some(&entry.child),
                        None,
                        Context::Region(key.key()),
                        suffix,
                        depth + 1,
                    )?;
                }
            }
            PolicyNode::Weighted(weighted) => {
                for entry in weighted.entries() {
                    self.diff_slot(
                        Some(&entry.child),
                        None,
                        Context::Group {
                            index: entry.index(),
                            weight: entry.weight(),
                        },
                        suffix,
                        depth + 1,
                    )?;
                }
            }
            PolicyNode::RecordSet(_) | PolicyNode::Record(_) => {
                for record in node.all_records() {
                    self.emit(format!("Delete Record {}{}", record, use_suffix(suffix)));
                }
            }
        }
        Ok(())
    }

    fn diff_geo(
        &mut self,
        source: &GeoNode,
        dest: &GeoNode,
        suffix: &str,
        depth: usize,
    ) -> PolicyResult<()> {
        let source_only: Vec<_> = source
            .entries()
            .iter()
            .filter(|(key, _)| !dest.entries().contains_key(*key))
            .collect();
        let dest_only: Vec<_> = dest
            .entries()
            .iter()
            .filter(|(key, _)| !source.entries().contains_key(*key))
            .collect();

        // Rename detection before add/delete: a key pair whose entries are
        // deeply equal moved, it was not replaced. Greedy in key order.
        let mut renamed_from = Vec::new();
        let mut renamed_to = Vec::new();
        for &(old_key, old_entry) in &source_only {
            let candidate = dest_only
                .iter()
                .filter(|(new_key, _)| !renamed_to.contains(new_key))
                .find(|(_, new_entry)| *new_entry == old_entry);
            if let Some(&(new_key, _)) = candidate {
                self.emit(format!(
                    "Rename {} -> {}{}",
                    old_key.key(),
                    new_key.key(),
                    use_suffix(suffix)
                ));
                renamed_from.push(old_key);
                renamed_to.push(new_key);
            }
        }

        for &(key, entry) in &source_only {
            if renamed_from.contains(&key) {
                continue;
            }
            self.diff_slot(
                Some(&entry.child),
                None,
                Context::Region(key.key()),
                suffix,
                depth + 1,
            )?;
        }

        for &(key, entry) in &dest_only {
            if renamed_to.contains(&key) {
                continue;
            }
            self.diff_slot(
                None,
                Some(&entry.child),
                Context::Region(key.key()),
                suffix,
                depth + 1,
            )?;
        }

        for (key, source_entry) in source.entries() {
            let Some(dest_entry) = dest.get(key) else {
                continue;
            };
            if !cname_pair_equal(&source_entry.cname, &dest_entry.cname) {
                self.emit(format!(
                    "Change CNAME of Region \"{}\": {} -> {}{}",
                    key.key(),
                    cname_text(&source_entry.cname),
                    cname_text(&dest_entry.cname),
                    use_suffix(suffix)
                ));
            }
            let inner = amend(&format!("Region \"{}\"", key.key()), suffix);
            self.diff_slot(
                Some(&source_entry.child),
                Some(&dest_entry.child),
                Context::Pool,
                &inner,
                depth + 1,
            )?;
        }
        Ok(())
    }

    fn diff_weighted(
        &mut self,
        source: &WeightedNode,
        dest: &WeightedNode,
        suffix: &str,
        depth: usize,
    ) -> PolicyResult<()> {
        let aligned = source.entries().len().min(dest.entries().len());

        for (source_entry, dest_entry) in source.entries().iter().zip(dest.entries()) {
            let group = source_entry.index() + 1;
            if (source_entry.weight() - dest_entry.weight()).abs() > WEIGHT_TOLERANCE {
                self.emit(format!(
                    "Group {}: Change weight {}% -> {}%{}",
                    group,
                    percent_of(source_entry.weight()),
                    percent_of(dest_entry.weight()),
                    use_suffix(suffix)
                ));
            }
            if !cname_pair_equal(&source_entry.cname, &dest_entry.cname) {
                self.emit(format!(
                    "Change CNAME of Group {}: {} -> {}{}",
                    group,
                    cname_text(&source_entry.cname),
                    cname_text(&dest_entry.cname),
                    use_suffix(suffix)
                ));
            }
            let inner = amend(&format!("Group {}", group), suffix);
            self.diff_slot(
                Some(&source_entry.child),
                Some(&dest_entry.child),
                Context::Pool,
                &inner,
                depth + 1,
            )?;
        }

        for entry in &source.entries()[aligned..] {
            self.diff_slot(
                Some(&entry.child),
                None,
                Context::Group {
                    index: entry.index(),
                    weight: entry.weight(),
                },
                suffix,
                depth + 1,
            )?;
        }
        for entry in &dest.entries()[aligned..] {
            self.diff_slot(
                None,
                Some(&entry.child),
                Context::Group {
                    index: entry.index(),
                    weight: entry.weight(),
                },
                suffix,
                depth + 1,
            )?;
        }
        Ok(())
    }

    /// Leaf slots diff as flat record sets regardless of leaf kind.
    fn diff_leaf_records(&mut self, source: &PolicyNode, dest: &PolicyNode, suffix: &str) {
        let source_records = source.all_records();
        let dest_records = dest.all_records();

        for record in source_records.difference(&dest_records) {
            self.emit(format!("Delete Record {}{}", record, use_suffix(suffix)));
        }
        for record in dest_records.difference(&source_records) {
            self.emit(format!("Add Record {}{}", record, use_suffix(suffix)));
        }
    }
}

fn check_depth(depth: usize) -> PolicyResult<()> {
    if depth > MAX_POLICY_DEPTH {
        return Err(ConstructionError::DepthExceeded(MAX_POLICY_DEPTH).into());
    }
    Ok(())
}

fn use_suffix(suffix: &str) -> String {
    if suffix.is_empty() {
        String::new()
    } else {
        format!(" in {}", suffix)
    }
}

fn amend(label: &str, suffix: &str) -> String {
    if suffix.is_empty() {
        label.to_string()
    } else {
        format!("{}, {}", label, suffix)
    }
}

fn cname_pair_equal(a: &Option<RecordValue>, b: &Option<RecordValue>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.rdata == b.rdata && a.ttl == b.ttl,
        _ => false,
    }
}

fn cname_text(cname: &Option<RecordValue>) -> String {
    match cname {
        Some(cname) => format!("{} (TTL {})", cname.rdata, cname.ttl),
        None => "none".to_string(),
    }
}
