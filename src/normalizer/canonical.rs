use crate::config::NormalizerConfig;
use crate::model::{CanonicalName, ConfigError};
use regex::Regex;

/// Case-folds, collapses whitespace, trims stray delimiters and pulls unit
/// abbreviations up against the preceding token.
pub struct Canonicalizer {
    unit_spacing: Option<Regex>,
    trim_chars: Vec<char>,
}

impl Canonicalizer {
    pub fn new(cfg: &NormalizerConfig) -> Result<Self, ConfigError> {
        let mut units: Vec<&str> = cfg
            .unit_tokens
            .iter()
            .map(String::as_str)
            .filter(|u| !u.is_empty())
            .collect();
        // longest first so `gm` is never read as `g` + `m`
        units.sort_by(|a, b| b.len().cmp(&a.len()));
        let alternation = units
            .iter()
            .map(|u| regex::escape(&u.to_lowercase()))
            .collect::<Vec<_>>()
            .join("|");
        let unit_spacing = if alternation.is_empty() {
            None
        } else {
            let pattern = format!(r"\s+({})\b", alternation);
            let re = Regex::new(&pattern)
                .map_err(|source| ConfigError::InvalidPattern { pattern, source })?;
            Some(re)
        };

        Ok(Self {
            unit_spacing,
            trim_chars: cfg.trim_chars.clone(),
        })
    }

    /// Never fails. Empty or all-whitespace input yields an empty name.
    pub fn canonicalize(&self, raw: &str) -> CanonicalName {
        let lowered = self.trim_stray(raw).to_lowercase();
        let mut name = lowered.split_whitespace().collect::<Vec<_>>().join(" ");

        // repeat until stable: removing one space can expose another unit token
        if let Some(re) = &self.unit_spacing {
            loop {
                let next = re.replace_all(&name, "$1");
                if next == name {
                    break;
                }
                name = next.into_owned();
            }
        }

        self.trim_stray(&name).to_string()
    }

    fn trim_stray<'a>(&self, s: &'a str) -> &'a str {
        s.trim_matches(|c: char| c.is_whitespace() || self.trim_chars.contains(&c))
    }
}
