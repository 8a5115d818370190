//! Applies suggested fixes to a source string
//!
//! Fixes are plain data on each diagnostic. This module is the one place
//! that turns them into edited text: it takes the first fix of every
//! diagnostic, drops edits that overlap an earlier one, and applies the
//! rest from the end of the text backwards so offsets stay valid.

use crate::diagnostic::{CodeError, TextEdit};

/// Result of applying fixes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FixOutcome {
    /// The edited text
    pub output: String,
    /// Number of edits applied
    pub applied: usize,
    /// Number of edits skipped (overlapping or out of range)
    pub skipped: usize,
}

impl FixOutcome {
    pub fn changed(&self) -> bool {
        self.applied > 0
    }
}

/// Apply the first fix of each diagnostic in `errors` to `source`
pub fn apply_fixes(source: &str, errors: &[CodeError]) -> FixOutcome {
    let edits: Vec<&TextEdit> = errors
        .iter()
        .filter_map(|e| e.fixes.first())
        .map(|fix| &fix.edit)
        .collect();
    apply_edits(source, &edits)
}

/// Apply `edits` to `source`.
///
/// Edits are taken in offset order; when two start at the same offset the
/// one listed first ends up first in the output.
pub fn apply_edits(source: &str, edits: &[&TextEdit]) -> FixOutcome {
    let mut ordered: Vec<(usize, &TextEdit)> = edits.iter().copied().enumerate().collect();
    ordered.sort_by_key(|(i, edit)| (edit.from, edit.to, *i));

    let mut accepted: Vec<&TextEdit> = Vec::with_capacity(ordered.len());
    let mut skipped = 0;
    let mut covered_to = 0;

    for (_, edit) in ordered {
        let in_range = edit.from <= edit.to
            && edit.to <= source.len()
            && source.is_char_boundary(edit.from)
            && source.is_char_boundary(edit.to);
        // Inserts may share a position; replacements may not overlap
        let overlaps = accepted
            .last()
            .is_some_and(|prev| edit.from < covered_to || (edit.from == prev.from && prev.from != prev.to));
        if !in_range || overlaps {
            log::debug!("Skipping fix edit {}..{}", edit.from, edit.to);
            skipped += 1;
            continue;
        }
        covered_to = covered_to.max(edit.to);
        accepted.push(edit);
    }

    let mut output = source.to_string();
    for edit in accepted.iter().rev() {
        output.replace_range(edit.from..edit.to, &edit.text);
    }

    FixOutcome {
        output,
        applied: accepted.len(),
        skipped,
    }
}
