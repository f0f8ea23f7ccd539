use crate::config::NormalizerConfig;
use crate::model::{CanonicalName, ReferenceSet};

/// Disambiguates names ending in a bare number against the reference set.
pub struct UnitSuffixResolver {
    units: Vec<String>,
}

impl UnitSuffixResolver {
    pub fn new(cfg: &NormalizerConfig) -> Self {
        Self {
            units: cfg.suffix_units.clone(),
        }
    }

    /// First unit in priority order whose concatenation is already known wins.
    /// Names not ending in a digit come back unchanged, so resolving twice is a no-op.
    pub fn resolve(&self, name: &str, reference: &ReferenceSet) -> CanonicalName {
        if !ends_in_bare_number(name) {
            return name.to_string();
        }

        self.units
            .iter()
            .map(|unit| format!("{}{}", name, unit))
            .find(|candidate| reference.contains(candidate))
            .unwrap_or_else(|| name.to_string())
    }
}

impl Default for UnitSuffixResolver {
    fn default() -> Self {
        Self::new(&NormalizerConfig::default())
    }
}

fn ends_in_bare_number(name: &str) -> bool {
    name.chars().last().is_some_and(|c| c.is_ascii_digit())
}
