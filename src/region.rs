//! Region partitions and the distribution-scheme algebra
//!
//! A `DistributionScheme` is one vendor's named partition of the
//! region-code universe. Mapping one scheme onto another produces the
//! fractional overlap between their regions; translating pushes a
//! per-region value distribution through that mapping; partitioning a set
//! of schemes yields the coarsest common refinement of all of them.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use itertools::Itertools;
use tracing::{debug, instrument};

use crate::errors::{ConsistencyViolation, ConstructionError};

/// Fraction of each source region landing in each target region,
/// keyed source region name -> target region name.
pub type SchemeMapping = BTreeMap<String, BTreeMap<String, f64>>;

/// A value distribution per region name, e.g. answer-set shares.
pub type RegionValues<V> = BTreeMap<String, BTreeMap<V, f64>>;

/// An immutable, non-empty set of region codes.
///
/// Equality, ordering, and hashing follow the code set; the canonical key
/// is the sorted, comma-joined code list.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Region {
    codes: BTreeSet<String>,
}

impl Region {
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

    /// Internal constructor for code sets already known to be non-empty.
    pub(crate) fn from_set(codes: BTreeSet<String>) -> Self {
        debug_assert!(!codes.is_empty());
        Self { codes }
    }

    pub fn codes(&self) -> &BTreeSet<String> {
        &self.codes
    }

    pub fn contains(&self, code: &str) -> bool {
        self.codes.contains(code)
    }

    /// Canonical key: codes sorted and joined.
    pub fn key(&self) -> String {
        self.codes.iter().join(", ")
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// An immutable mapping from region name to [`Region`].
///
/// Regions of one scheme should not share codes; that disjointness is the
/// vendor's contract and is not enforced here. The algebra below tolerates
/// overlap by letting a shared code contribute to every pair it belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistributionScheme {
    regions: BTreeMap<String, Region>,
}

impl DistributionScheme {
    pub fn new(regions: BTreeMap<String, Region>) -> Self {
        Self { regions }
    }

    pub fn regions(&self) -> &BTreeMap<String, Region> {
        &self.regions
    }

    pub fn get(&self, name: &str) -> Option<&Region> {
        self.regions.get(name)
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Every code named by any region of this scheme.
    pub fn codes(&self) -> BTreeSet<&str> {
        self.regions
            .values()
            .flat_map(|region| region.codes().iter().map(String::as_str))
            .collect()
    }

    /// Fractional overlap of this scheme's regions with `other`'s, with
    /// every code weighing 1.
    ///
    /// For each source region the fractions sum to 1; pairs with no shared
    /// code are omitted. Both schemes must cover the same code universe.
    #[instrument(level = "debug", skip_all)]
    pub fn map(&self, other: &DistributionScheme) -> Result<SchemeMapping, ConsistencyViolation> {
        self.map_weighted(other, |_| 1.0)
    }

    /// [`map`](Self::map) with an injected per-code weight, e.g. observed
    /// traffic share.
    ///
    /// A source region whose codes all weigh 0 falls back to equal per-code
    /// weighting rather than dividing by zero, mirroring the all-zero rule
    /// of weighted nodes.
    pub fn map_weighted<F>(
        &self,
        other: &DistributionScheme,
        weight_of: F,
    ) -> Result<SchemeMapping, ConsistencyViolation>
    where
        F: Fn(&str) -> f64,
    {
        self.ensure_same_universe(other)?;

        let mut mapping = SchemeMapping::new();
        for (name, region) in &self.regions {
            let total: f64 = region.codes().iter().map(|code| weight_of(code)).sum();
            let row = if total > 0.0 {
                Self::overlap_row(region, other, &weight_of, total)
            } else {
                // all-zero weighting: treat the region's codes as equal
                Self::overlap_row(region, other, &|_: &str| 1.0, region.codes().len() as f64)
            };
            debug!(region = %name, targets = row.len(), "mapped region");
            mapping.insert(name.clone(), row);
        }
        Ok(mapping)
    }

    fn overlap_row<F>(
        region: &Region,
        other: &DistributionScheme,
        weight_of: &F,
        total: f64,
    ) -> BTreeMap<String, f64>
    where
        F: Fn(&str) -> f64,
    {
        let mut row = BTreeMap::new();
        for (other_name, other_region) in &other.regions {
            let shared: f64 = region
                .codes()
                .intersection(other_region.codes())
                .map(|code| weight_of(code))
                .sum();
            if shared > 0.0 {
                row.insert(other_name.clone(), shared / total);
            }
        }
        row
    }

    /// Re-expresses a per-region value distribution of `other` in this
    /// scheme's regions: `result[r][v] = Σ over o of map(r,o) * other_values[o][v]`.
    #[instrument(level = "debug", skip_all)]
    pub fn translate<V>(
        &self,
        other: &DistributionScheme,
        other_values: &RegionValues<V>,
    ) -> Result<RegionValues<V>, ConsistencyViolation>
    where
        V: Ord + Clone,
    {
        let mapping = self.map(other)?;

        let mut result = RegionValues::new();
        for (name, row) in &mapping {
            let mut combined: BTreeMap<V, f64> = BTreeMap::new();
            for (other_name, fraction) in row {
                let values = other_values.get(other_name).ok_or_else(|| {
                    ConsistencyViolation::MissingDistribution(other_name.clone())
                })?;
                for (value, share) in values {
                    *combined.entry(value.clone()).or_insert(0.0) += fraction * share;
                }
            }
            result.insert(name.clone(), combined);
        }
        Ok(result)
    }

    /// Coarsest refinement of all the given schemes: codes contained by the
    /// same set of regions across every scheme end up in one output region,
    /// so every input region is a union of output regions.
    #[instrument(level = "debug", skip(schemes))]
    pub fn partition(schemes: &[DistributionScheme]) -> BTreeSet<Region> {
        let mut regions_by_code: BTreeMap<&str, BTreeSet<&Region>> = BTreeMap::new();
        for scheme in schemes {
            for region in scheme.regions.values() {
                for code in region.codes() {
                    regions_by_code
                        .entry(code.as_str())
                        .or_default()
                        .insert(region);
                }
            }
        }

        let mut codes_by_group: BTreeMap<BTreeSet<&Region>, BTreeSet<String>> = BTreeMap::new();
        for (code, group) in regions_by_code {
            codes_by_group
                .entry(group)
                .or_default()
                .insert(code.to_string());
        }

        debug!(groups = codes_by_group.len(), "partitioned code universe");
        codes_by_group.into_values().map(Region::from_set).collect()
    }

    fn ensure_same_universe(&self, other: &Self) -> Result<(), ConsistencyViolation> {
        let source = self.codes();
        let target = other.codes();
        if source == target {
            return Ok(());
        }
        Err(ConsistencyViolation::CodeUniverseMismatch {
            only_in_source: source
                .difference(&target)
                .map(|code| code.to_string())
                .collect(),
            only_in_target: target
                .difference(&source)
                .map(|code| code.to_string())
                .collect(),
        })
    }
}

impl<S: Into<String>> FromIterator<(S, Region)> for DistributionScheme {
    fn from_iter<I: IntoIterator<Item = (S, Region)>>(iter: I) -> Self {
        Self::new(
            iter.into_iter()
                .map(|(name, region)| (name.into(), region))
                .collect(),
        )
    }
}

impl fmt::Display for DistributionScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines = self
            .regions
            .iter()
            .map(|(name, region)| format!("{}: [{}]", name, region.key()))
            .join("\n");
        write!(f, "{}", lines)
    }
}
