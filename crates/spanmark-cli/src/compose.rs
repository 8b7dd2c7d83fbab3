//! Turns a [`StyledDocument`] into terminal lines, or a plain text dump.

use std::collections::BTreeSet;

use ratatui::{
    style::{Color as TermColor, Modifier, Style},
    text::{Line, Span},
};
use spanmark_engine::{Attribute, ClickId, Color, EmbeddedImage, OBJECT_REPLACEMENT, StyledDocument};

const IMAGE_GLYPH: &str = "\u{25A3}";
const QUOTE_GUTTER: &str = "\u{2502}";

fn term_color(color: Color) -> TermColor {
    TermColor::Rgb(color.red(), color.green(), color.blue())
}

fn apply(style: Style, attr: &Attribute, selected: Option<ClickId>) -> Style {
    match attr {
        Attribute::Foreground(c) => style.fg(term_color(*c)),
        Attribute::Background(c) | Attribute::BlockBackground(c) => style.bg(term_color(*c)),
        Attribute::Bold => style.add_modifier(Modifier::BOLD),
        Attribute::Italic => style.add_modifier(Modifier::ITALIC),
        Attribute::Monospace => style.fg(TermColor::Black),
        Attribute::RelativeScale(scale) if *scale > 1.0 => style.add_modifier(Modifier::UNDERLINED),
        Attribute::RelativeScale(_) => style,
        Attribute::QuoteMarker => style.fg(TermColor::DarkGray).add_modifier(Modifier::ITALIC),
        Attribute::Click(id) if Some(*id) == selected => {
            style.add_modifier(Modifier::UNDERLINED | Modifier::REVERSED)
        }
        Attribute::Click(_) => style.add_modifier(Modifier::UNDERLINED),
        Attribute::Embedded(_) => style,
    }
}

fn finish(spans: Vec<Span<'static>>, quoted: bool) -> Line<'static> {
    if quoted {
        let mut with_gutter = vec![Span::styled(QUOTE_GUTTER, Style::default().fg(TermColor::DarkGray))];
        with_gutter.extend(spans);
        Line::from(with_gutter)
    } else {
        Line::from(spans)
    }
}

/// Splits the text at every run boundary and line break, styling each piece
/// with all runs that cover it.
pub fn compose(doc: &StyledDocument, selected: Option<ClickId>) -> Vec<Line<'static>> {
    let text = doc.text();
    let runs = doc.runs();

    let mut cuts: BTreeSet<usize> = BTreeSet::from([0, text.len()]);
    for run in runs {
        cuts.insert(run.range.start);
        cuts.insert(run.range.end);
    }
    for (i, _) in text.match_indices('\n') {
        cuts.insert(i);
        cuts.insert(i + 1);
    }
    let bounds: Vec<usize> = cuts.into_iter().collect();

    let mut lines = Vec::new();
    let mut spans = Vec::new();
    let mut quoted = false;
    for pair in bounds.windows(2) {
        let (start, end) = (pair[0], pair[1]);
        let segment = &text[start..end];
        if segment == "\n" {
            lines.push(finish(std::mem::take(&mut spans), quoted));
            quoted = false;
            continue;
        }

        let mut style = Style::default();
        for run in runs
            .iter()
            .filter(|r| r.range.start <= start && end <= r.range.end)
        {
            for attr in &run.attributes {
                style = apply(style, attr, selected);
                quoted |= *attr == Attribute::QuoteMarker;
            }
        }
        let content = segment
            .replace(OBJECT_REPLACEMENT, IMAGE_GLYPH)
            .replace('\r', "");
        spans.push(Span::styled(content, style));
    }
    if !spans.is_empty() {
        lines.push(finish(spans, quoted));
    }
    lines
}

fn describe(attr: &Attribute) -> String {
    match attr {
        Attribute::Foreground(c) => format!("fg={c}"),
        Attribute::Background(c) => format!("bg={c}"),
        Attribute::Bold => "bold".to_string(),
        Attribute::Italic => "italic".to_string(),
        Attribute::Monospace => "monospace".to_string(),
        Attribute::RelativeScale(s) => format!("scale={s}"),
        Attribute::BlockBackground(c) => format!("block={c}"),
        Attribute::QuoteMarker => "quote".to_string(),
        Attribute::Click(id) => format!("click={id}"),
        Attribute::Embedded(EmbeddedImage::Bundled(r)) => format!("image=bundled:{}", r.0),
        Attribute::Embedded(EmbeddedImage::Decoded(d)) => format!("image={}B", d.bytes.len()),
    }
}

/// Text, then a separator, then one line per run and one per payload.
pub fn dump(doc: &StyledDocument) -> String {
    let text = doc.text();
    let mut out = text.clone();
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("---\n");
    for run in doc.runs() {
        let attrs: Vec<String> = run.attributes.iter().map(describe).collect();
        out.push_str(&format!(
            "{}..{} {:?} [{}]\n",
            run.range.start,
            run.range.end,
            &text[run.range.clone()],
            attrs.join(" ")
        ));
    }
    for payload in doc.payloads().values() {
        out.push_str(&format!(
            "click {} {:?} {:?} at {:?}\n",
            payload.click_id, payload.scheme, payload.value, payload.located_range
        ));
    }
    out
}
