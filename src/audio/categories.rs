use std::collections::{BTreeMap, BTreeSet};

use crate::config::CategoryConfig;

/// Immutable tag-term → category lookup
///
/// Terms are stored lowercase so matching is case-insensitive. One term may
/// select several categories (`traffic` is both a place and a sound type).
#[derive(Debug, Clone)]
pub struct CategoryDictionary {
    by_term: BTreeMap<String, BTreeSet<String>>,
    fallback: String,
}

impl CategoryDictionary {
    pub fn new(config: &CategoryConfig) -> Self {
        let mut by_term: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (label, terms) in &config.terms {
            for term in terms {
                let term = term.trim().to_lowercase();
                if term.is_empty() {
                    continue;
                }
                by_term.entry(term).or_default().insert(label.clone());
            }
        }

        Self {
            by_term,
            fallback: config.fallback.clone(),
        }
    }

    /// Label given to recordings nothing else matches
    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    /// Categories selected by a comma-separated comment, sorted, never empty
    pub fn categorize(&self, comment: &str) -> Vec<String> {
        let found: BTreeSet<&String> = comment
            .split(',')
            .map(|tag| tag.trim().to_lowercase())
            .filter(|tag| !tag.is_empty())
            .filter_map(|tag| self.by_term.get(&tag))
            .flatten()
            .collect();

        if found.is_empty() {
            vec![self.fallback.clone()]
        } else {
            found.into_iter().cloned().collect()
        }
    }
}

/// Human-readable track name for a category label
///
/// A leading icon token (a first word with no letters or digits, such as
/// `🌿`) is dropped; labels without one are returned trimmed.
pub fn display_label(label: &str) -> &str {
    let label = label.trim();
    match label.split_once(' ') {
        Some((head, rest)) if !head.chars().any(char::is_alphanumeric) && !rest.trim().is_empty() => {
            rest.trim()
        }
        _ => label,
    }
}
