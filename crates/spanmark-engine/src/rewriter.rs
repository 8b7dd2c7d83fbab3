//! # Buffer Rewriter
//!
//! Applies the rule table to a working buffer, one full pass per rule.
//!
//! Within a pass every match was found against the buffer as it stood before
//! the pass began. Each edit changes the length of the buffer, so a running
//! `removed` count (bytes deleted minus bytes inserted by earlier matches of
//! the same pass) is folded through the matches and subtracted from each raw
//! offset before it is used. The count starts at zero for every rule because
//! the next rule rescans the edited buffer.

use std::collections::BTreeMap;
use std::ops::Range;
use std::sync::Arc;

use crate::buffer::Buffer;
use crate::document::{ClickPayload, OBJECT_REPLACEMENT, SchemeKind, StyledDocument};
use crate::matcher::{Capture, RuleMatch, find_matches};
use crate::placeholder::{Placeholder, next_token};
use crate::resolver::{ImageResolver, NoopResolver, ResolutionRequest};
use crate::rules::{SyntaxKind, rule_table};
use crate::style::{Attribute, ClickId, EmbeddedImage, StyleRun};
use crate::theme::Theme;

/// Replaces a leading `*` list marker.
pub const BULLET: &str = "\u{2022}";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RewriteError {
    #[error("{kind:?} match is missing capture group {group}")]
    MissingCapture { kind: SyntaxKind, group: usize },
    #[error("{kind:?} match offset {offset} lies before the start of the buffer")]
    Misaligned { kind: SyntaxKind, offset: usize },
}

/// Converts raw markdown into a [`StyledDocument`].
pub struct Renderer {
    theme: Theme,
    resolver: Arc<dyn ImageResolver>,
}

impl Default for Renderer {
    fn default() -> Self {
        Self::new(Theme::default(), Arc::new(NoopResolver))
    }
}

/// State owned by one `render` call.
struct Pass {
    buffer: Buffer,
    payloads: BTreeMap<ClickId, ClickPayload>,
    pending: Vec<Placeholder>,
    next_click: u64,
}

impl Pass {
    fn click_id(&mut self) -> ClickId {
        let id = ClickId(self.next_click);
        self.next_click += 1;
        id
    }
}

impl Renderer {
    pub fn new(theme: Theme, resolver: Arc<dyn ImageResolver>) -> Self {
        Self { theme, resolver }
    }

    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    /// Runs every rule over `raw`, top to bottom, once.
    ///
    /// Images that cannot be resolved locally are replaced by a placeholder
    /// token and a [`ResolutionRequest`] is sent to the resolver before this
    /// returns.
    pub fn render(&self, raw: &str) -> StyledDocument {
        let mut pass = Pass {
            buffer: Buffer::new(raw),
            payloads: BTreeMap::new(),
            pending: Vec::new(),
            next_click: 0,
        };

        for rule in rule_table() {
            let snapshot = pass.buffer.text();
            let removed = find_matches(rule, &snapshot).fold(0isize, |removed, m| {
                match self.apply_match(&mut pass, &m, removed) {
                    Ok(delta) => removed + delta,
                    Err(e) => {
                        log::warn!("Skipping {:?} match at {:?}: {e}", m.kind, m.raw);
                        removed
                    }
                }
            });
            log::debug!("Rule {:?} done, net {removed} bytes removed", rule.kind);
        }

        StyledDocument::new(pass.buffer, pass.payloads, pass.pending)
    }

    /// Edits the buffer for one match and records its runs.
    ///
    /// Returns the bytes removed by this match (negative if it grew the buffer).
    fn apply_match(
        &self,
        pass: &mut Pass,
        m: &RuleMatch,
        removed: isize,
    ) -> Result<isize, RewriteError> {
        let outer = realign(m.kind, &m.raw, removed)?;
        let group = |index: usize| capture(m, index, removed);

        match m.kind {
            SyntaxKind::Heading(_) => {
                let (text, _) = group(1)?;
                let delta = pass.buffer.delete(outer.start..text.start);
                let mut attributes =
                    vec![Attribute::Bold, Attribute::Foreground(self.theme.text)];
                attributes.extend(m.kind.relative_scale().map(Attribute::RelativeScale));
                pass.buffer.add_run(StyleRun::new(
                    outer.start..outer.start + text.len(),
                    attributes,
                ));
                Ok(delta)
            }
            SyntaxKind::Bold => {
                let (inner, _) = group(1)?;
                Ok(unwrap_delimited(pass, outer, inner, vec![Attribute::Bold]))
            }
            SyntaxKind::Emphasis => {
                let (inner, _) = group(1)?;
                Ok(unwrap_delimited(pass, outer, inner, vec![Attribute::Italic]))
            }
            SyntaxKind::InlineCode => {
                let (inner, _) = group(1)?;
                let attributes = vec![
                    Attribute::Monospace,
                    Attribute::Background(self.theme.code_background),
                ];
                Ok(unwrap_delimited(pass, outer, inner, attributes))
            }
            SyntaxKind::CodeBlock => {
                let (inner, _) = group(1)?;
                let attributes = vec![
                    Attribute::BlockBackground(self.theme.code_background),
                    Attribute::Monospace,
                ];
                Ok(unwrap_delimited(pass, outer, inner, attributes))
            }
            SyntaxKind::Quote => {
                let (marker, _) = group(1)?;
                let delta = pass.buffer.replace(marker, " ");
                pass.buffer
                    .add_run(StyleRun::new(outer, vec![Attribute::QuoteMarker]));
                Ok(delta)
            }
            SyntaxKind::OrderedList => {
                let (marker, _) = group(1)?;
                pass.buffer
                    .add_run(StyleRun::new(marker, vec![Attribute::Bold]));
                Ok(0)
            }
            SyntaxKind::UnorderedList => {
                let (marker, _) = group(1)?;
                let delta = pass.buffer.replace(marker, BULLET);
                let end = outer
                    .end
                    .checked_add_signed(-delta)
                    .ok_or(RewriteError::Misaligned {
                        kind: m.kind,
                        offset: outer.end,
                    })?;
                pass.buffer.add_run(StyleRun::new(
                    outer.start..end,
                    vec![Attribute::BlockBackground(self.theme.list_background)],
                ));
                Ok(delta)
            }
            SyntaxKind::Link => {
                let (_, text) = group(1)?;
                let (_, url) = group(2)?;
                let id = pass.click_id();
                let delta = pass.buffer.replace(outer.clone(), &text.text);
                pass.buffer.add_run(StyleRun::new(
                    outer.start..outer.start + text.text.len(),
                    vec![Attribute::Foreground(self.theme.link), Attribute::Click(id)],
                ));
                pass.payloads.insert(
                    id,
                    ClickPayload {
                        click_id: id,
                        scheme: SchemeKind::Link,
                        raw_match: m.text.clone(),
                        value: url.text.clone(),
                        located_range: None,
                    },
                );
                Ok(delta)
            }
            SyntaxKind::Image => {
                let (_, reference) = group(2)?;
                Ok(self.apply_image(pass, m, outer, &reference.text))
            }
        }
    }

    fn apply_image(
        &self,
        pass: &mut Pass,
        m: &RuleMatch,
        outer: Range<usize>,
        reference: &str,
    ) -> isize {
        let id = pass.click_id();
        pass.payloads.insert(
            id,
            ClickPayload {
                click_id: id,
                scheme: SchemeKind::Image,
                raw_match: m.text.clone(),
                value: reference.to_string(),
                located_range: None,
            },
        );

        if let Some(resource) = self.resolver.resolve_bundled(reference) {
            let delta = pass.buffer.replace(outer.clone(), OBJECT_REPLACEMENT);
            pass.buffer.add_run(StyleRun::new(
                outer.start..outer.start + OBJECT_REPLACEMENT.len(),
                vec![
                    Attribute::Embedded(EmbeddedImage::Bundled(resource)),
                    Attribute::Click(id),
                ],
            ));
            return delta;
        }

        let token = next_token();
        let delta = pass.buffer.replace(outer, &token);
        pass.pending.push(Placeholder {
            token: token.clone(),
            click_id: id,
            reference: reference.to_string(),
        });
        log::debug!("Requesting image {reference} for placeholder {token}");
        self.resolver.request_image(ResolutionRequest {
            token,
            reference: reference.to_string(),
        });
        delta
    }
}

/// Looks up capture `index` and maps it onto the current buffer.
fn capture(
    m: &RuleMatch,
    index: usize,
    removed: isize,
) -> Result<(Range<usize>, &Capture), RewriteError> {
    let capture = m.group(index).ok_or(RewriteError::MissingCapture {
        kind: m.kind,
        group: index,
    })?;
    Ok((realign(m.kind, &capture.range, removed)?, capture))
}

/// Maps a raw (pre-pass) range onto the current buffer.
fn realign(
    kind: SyntaxKind,
    raw: &Range<usize>,
    removed: isize,
) -> Result<Range<usize>, RewriteError> {
    let shift = |offset: usize| {
        offset
            .checked_add_signed(-removed)
            .ok_or(RewriteError::Misaligned { kind, offset })
    };
    Ok(shift(raw.start)?..shift(raw.end)?)
}

/// Deletes the delimiters around `inner` (closing first, so `outer.start`
/// stays valid) and styles what is left.
fn unwrap_delimited(
    pass: &mut Pass,
    outer: Range<usize>,
    inner: Range<usize>,
    attributes: Vec<Attribute>,
) -> isize {
    let delta = pass.buffer.delete(inner.end..outer.end)
        + pass.buffer.delete(outer.start..inner.start);
    pass.buffer.add_run(StyleRun::new(
        outer.start..outer.start + inner.len(),
        attributes,
    ));
    delta
}
