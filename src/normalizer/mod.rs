// Normalizer module: canonical medicine names and unit-suffix resolution.

pub mod canonical;
pub mod suffix;

pub use canonical::Canonicalizer;
pub use suffix::UnitSuffixResolver;

use crate::config::NormalizerConfig;
use crate::model::{CanonicalName, ConfigError, ReferenceSet};
use std::collections::BTreeSet;

/// Placeholders spreadsheet exports leave in empty cells.
const EMPTY_PLACEHOLDERS: [&str; 2] = ["nan", "none"];

/// Resolved, deduplicated names for one corpus pass.
#[derive(Debug, Clone, Default)]
pub struct ReferenceList {
    /// Sorted resolved names.
    pub names: Vec<CanonicalName>,
    /// `(canonical, resolved)` for every name the resolver changed.
    pub remapped: Vec<(CanonicalName, CanonicalName)>,
}

pub struct Normalizer {
    canonicalizer: Canonicalizer,
    resolver: UnitSuffixResolver,
}

impl Normalizer {
    pub fn new(cfg: &NormalizerConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            canonicalizer: Canonicalizer::new(cfg)?,
            resolver: UnitSuffixResolver::new(cfg),
        })
    }

    /// Splits a raw cell on commas and canonicalizes each item, dropping empties.
    pub fn split_cell(&self, raw: &str) -> Vec<CanonicalName> {
        raw.split(',')
            .map(|item| self.canonicalizer.canonicalize(item))
            .filter(|name| !name.is_empty() && !EMPTY_PLACEHOLDERS.contains(&name.as_str()))
            .collect()
    }

    /// Canonicalizes every cell, builds the reference set once, and resolves each name against it.
    pub fn build_reference_list<'a, I>(&self, cells: I) -> ReferenceList
    where
        I: IntoIterator<Item = &'a str>,
    {
        let canonical: BTreeSet<CanonicalName> = cells
            .into_iter()
            .flat_map(|cell| self.split_cell(cell))
            .collect();
        let reference: ReferenceSet = canonical.iter().cloned().collect();

        let mut names = BTreeSet::new();
        let mut remapped = Vec::new();
        for name in canonical {
            let resolved = self.resolver.resolve(&name, &reference);
            if resolved != name {
                remapped.push((name, resolved.clone()));
            }
            names.insert(resolved);
        }

        ReferenceList {
            names: names.into_iter().collect(),
            remapped,
        }
    }
}
