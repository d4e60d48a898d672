//! Plain-text generator persistence.
//!
//! One line per slot: the action name, then each rule with its current
//! probability. Probabilities are normalized again on load, so a file
//! edited by hand only needs relative weights to be sensible.

use std::fs;
use std::path::Path;

use tracing::debug;

use cer_core::{parse_rule, CerError, RelationalRule, Result};
use cer_policy::PolicyGenerator;

/// Separates entries on a slot line.
pub const RULE_DELIMITER: char = '|';
/// Separates a rule's text from its probability inside one entry.
pub const PROBABILITY_DELIMITER: char = '@';

pub fn save_generator(generator: &PolicyGenerator, path: &Path) -> Result<()> {
    let mut out = String::new();
    for (action, rules) in generator.slot_snapshot() {
        out.push_str(&action);
        for (rule, probability) in rules {
            out.push(RULE_DELIMITER);
            out.push_str(&format!("{rule}{PROBABILITY_DELIMITER}{probability}"));
        }
        out.push('\n');
    }
    fs::write(path, out)?;
    debug!(path = %path.display(), "generator saved");
    Ok(())
}

/// Load slot lines written by [`save_generator`] into `generator`.
/// Probabilities are normalized per slot after loading.
pub fn load_generator(path: &Path, generator: &mut PolicyGenerator) -> Result<()> {
    let text = fs::read_to_string(path)?;
    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let mut fields = line.split(RULE_DELIMITER);
        let action = fields
            .next()
            .ok_or_else(|| CerError::Persist(format!("empty slot line: `{line}`")))?;
        let mut rules: Vec<(RelationalRule, f64)> = Vec::new();
        for entry in fields {
            let (text, probability) = entry
                .rsplit_once(PROBABILITY_DELIMITER)
                .ok_or_else(|| {
                    CerError::Persist(format!("missing probability in `{entry}`"))
                })?;
            let probability: f64 = probability.parse().map_err(|_| {
                CerError::Persist(format!("bad probability `{probability}`"))
            })?;
            rules.push((parse_rule(text)?, probability));
        }
        generator.load_slot(action, rules);
    }
    debug!(path = %path.display(), "generator loaded");
    Ok(())
}
