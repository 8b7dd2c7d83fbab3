use std::ops::Range;

use crate::rules::{Rule, SyntaxKind};

/// A captured sub-group of a match, in raw (pre-pass) byte offsets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capture {
    pub range: Range<usize>,
    pub text: String,
}

/// One occurrence of a rule's pattern in the buffer as it was when the
/// rule's pass began.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch {
    pub kind: SyntaxKind,
    pub raw: Range<usize>,
    /// The full matched text.
    pub text: String,
    /// Capture groups 1..n; `None` where a group did not participate.
    pub groups: Vec<Option<Capture>>,
}

impl RuleMatch {
    /// Returns capture group `index` (1-based, as in the pattern).
    pub fn group(&self, index: usize) -> Option<&Capture> {
        index
            .checked_sub(1)
            .and_then(|i| self.groups.get(i))
            .and_then(Option::as_ref)
    }
}

/// Finds the non-overlapping matches of `rule` in `text`, leftmost first.
///
/// The iterator is lazy and borrows `text`; calling again restarts the scan.
pub fn find_matches<'a>(rule: &'a Rule, text: &'a str) -> impl Iterator<Item = RuleMatch> + 'a {
    rule.pattern.captures_iter(text).filter_map(move |caps| {
        let whole = caps.get(0)?;
        if let Some(c) = rule.not_after
            && text[..whole.start()].ends_with(c)
        {
            return None;
        }
        Some(RuleMatch {
            kind: rule.kind,
            raw: whole.range(),
            text: whole.as_str().to_string(),
            groups: caps
                .iter()
                .skip(1)
                .map(|g| {
                    g.map(|m| Capture {
                        range: m.range(),
                        text: m.as_str().to_string(),
                    })
                })
                .collect(),
        })
    })
}
