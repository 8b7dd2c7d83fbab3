//! # Rule Table
//!
//! The fixed, ordered catalogue of syntax rules the rewriter applies.
//!
//! Order matters because every rule scans the buffer as left by the rules
//! before it:
//!
//! 1. Headings, smallest first (`######` down to `#`)
//! 2. Link, bold, emphasis
//! 3. Ordered then unordered list items (bold/emphasis markers are already
//!    gone, so a leading `**` can no longer look like a `*` bullet)
//! 4. Code block, inline code, quote
//! 5. Image, always last: a remote image leaves a placeholder that is only
//!    replaced after `render` returns, so no rule may run after it.

use std::sync::OnceLock;

use regex::Regex;

/// Relative text size for heading levels 1 through 6.
const HEADING_SCALES: [f32; 6] = [2.0, 1.8, 1.6, 1.4, 1.2, 1.0];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SyntaxKind {
    /// Level 1 (`#`) to 6 (`######`).
    Heading(u8),
    Link,
    Bold,
    Emphasis,
    OrderedList,
    UnorderedList,
    CodeBlock,
    InlineCode,
    Quote,
    Image,
}

impl SyntaxKind {
    /// Scale applied to heading text, `None` for every other kind.
    pub fn relative_scale(self) -> Option<f32> {
        match self {
            SyntaxKind::Heading(level @ 1..=6) => Some(HEADING_SCALES[usize::from(level) - 1]),
            _ => None,
        }
    }
}

/// A syntax-to-style mapping: what to look for and how it is presented.
#[derive(Debug)]
pub struct Rule {
    pub kind: SyntaxKind,
    pub pattern: Regex,
    pub relative_scale: Option<f32>,
    /// Matches whose first character directly follows this one are discarded.
    pub not_after: Option<char>,
}

impl Rule {
    fn new(kind: SyntaxKind, pattern: &str) -> Self {
        Self {
            kind,
            pattern: Regex::new(pattern).expect("Invalid rule pattern"),
            relative_scale: kind.relative_scale(),
            not_after: None,
        }
    }

    fn not_after(mut self, c: char) -> Self {
        self.not_after = Some(c);
        self
    }
}

/// Returns the process-wide rule table in evaluation order.
pub fn rule_table() -> &'static [Rule] {
    static RULES: OnceLock<Vec<Rule>> = OnceLock::new();
    RULES.get_or_init(build_rules)
}

fn build_rules() -> Vec<Rule> {
    let mut rules: Vec<Rule> = (1..=6u8)
        .rev()
        .map(|level| {
            Rule::new(
                SyntaxKind::Heading(level),
                &format!(r"(?mR)^#{{{level}}}[ \t]+(.*)$"),
            )
        })
        .collect();

    rules.extend([
        // `![alt](src)` is left alone here and picked up by the image rule
        Rule::new(SyntaxKind::Link, r"\[(.*?)\]\((.*?)\)").not_after('!'),
        Rule::new(SyntaxKind::Bold, r"(?R)\*\*(.*)\*\*"),
        Rule::new(SyntaxKind::Emphasis, r"(?R)_(.*)_"),
        Rule::new(SyntaxKind::OrderedList, r"(?mR)^[ \t]*(\d+\.)[ \t]+.*$"),
        Rule::new(SyntaxKind::UnorderedList, r"(?mR)^[ \t]*(\*)[ \t]+.*$"),
        Rule::new(SyntaxKind::CodeBlock, r"(?s)```(.*?)```"),
        Rule::new(SyntaxKind::InlineCode, r"(?R)`(.*)`"),
        Rule::new(SyntaxKind::Quote, r"(?mR)^(>)(.*)$"),
        Rule::new(SyntaxKind::Image, r"!\[(.*?)\]\((.*?)\)"),
    ]);

    rules
}
