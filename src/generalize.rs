//! Generalized ("plain") postal codes.
//!
//! A code such as `1000-001` also gets a `1000-000` entry so lookups by the
//! four-digit prefix alone still resolve to a position.

use std::collections::HashSet;

/// Suffix that replaces everything after the first hyphen
pub const GENERALIZED_SUFFIX: &str = "-000";

/// Replace everything from the first hyphen onward with `-000`.
///
/// A code with no hyphen is treated as a bare prefix: `1000` becomes
/// `1000-000`.
pub fn generalize(code: &str) -> String {
    let prefix = code.split_once('-').map_or(code, |(prefix, _)| prefix);
    format!("{}{}", prefix, GENERALIZED_SUFFIX)
}

/// Tracks which generalized codes were already synthesized during one build
#[derive(Debug, Default)]
pub struct Generalizer {
    emitted: HashSet<String>,
}

impl Generalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generalized code for `code`, or `None` when it is a real code in
    /// `is_real` or was already handed out earlier in this run.
    pub fn synthesize(&mut self, code: &str, is_real: impl Fn(&str) -> bool) -> Option<String> {
        let general = generalize(code);
        if is_real(&general) || self.emitted.contains(&general) {
            return None;
        }
        self.emitted.insert(general.clone());
        Some(general)
    }

    pub fn count(&self) -> usize {
        self.emitted.len()
    }
}
