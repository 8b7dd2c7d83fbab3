use std::sync::Arc;

use pretty_assertions::assert_eq;
use rstest::rstest;
use spanmark_engine::{
    Attribute, BundledImages, ChannelResolver, ClickId, Color, EmbeddedImage, ImageData,
    OBJECT_REPLACEMENT, Renderer, ResolutionOutcome, ResourceId, SchemeKind, StyledDocument,
    Theme,
};

fn render(md: &str) -> StyledDocument {
    Renderer::default().render(md)
}

fn black() -> Color {
    Color::parse("#000000").unwrap()
}

fn png() -> Option<ImageData> {
    Some(ImageData::new(vec![0x89, b'P', b'N', b'G']).with_size(16, 16))
}

fn describe(attr: &Attribute) -> String {
    match attr {
        Attribute::Foreground(c) => format!("fg {c}"),
        Attribute::Background(c) => format!("bg {c}"),
        Attribute::Bold => "bold".to_string(),
        Attribute::Italic => "italic".to_string(),
        Attribute::Monospace => "mono".to_string(),
        Attribute::RelativeScale(s) => format!("scale {s:?}"),
        Attribute::BlockBackground(c) => format!("block {c}"),
        Attribute::QuoteMarker => "quote".to_string(),
        Attribute::Click(id) => format!("click {id}"),
        Attribute::Embedded(EmbeddedImage::Bundled(r)) => format!("image res {}", r.0),
        Attribute::Embedded(EmbeddedImage::Decoded(_)) => "image decoded".to_string(),
    }
}

/// One line for the text, one per run, one per payload.
fn dump(doc: &StyledDocument) -> String {
    let text = doc.text();
    let visible = |s: &str| format!("{:?}", s.replace(OBJECT_REPLACEMENT, "<obj>"));
    let mut lines = vec![visible(&text)];
    for run in doc.runs() {
        let attrs: Vec<String> = run.attributes.iter().map(describe).collect();
        lines.push(format!(
            "{}..{} {} {}",
            run.range.start,
            run.range.end,
            visible(&text[run.range.clone()]),
            attrs.join(", ")
        ));
    }
    for p in doc.payloads().values() {
        lines.push(format!(
            "click {} {:?} {} at {:?}",
            p.click_id, p.scheme, p.value, p.located_range
        ));
    }
    lines.join("\n")
}

#[rstest]
#[case(1, 2.0)]
#[case(2, 1.8)]
#[case(3, 1.6)]
#[case(4, 1.4)]
#[case(5, 1.2)]
#[case(6, 1.0)]
fn heading_marker_is_stripped_and_scaled(#[case] level: usize, #[case] scale: f32) {
    let md = format!("{} Markdown Renderer\n", "#".repeat(level));
    let doc = render(&md);

    assert_eq!(doc.text(), "Markdown Renderer\n");
    assert_eq!(doc.runs().len(), 1);
    let run = &doc.runs()[0];
    assert_eq!(run.range, 0..17);
    assert_eq!(
        run.attributes,
        vec![
            Attribute::Bold,
            Attribute::Foreground(black()),
            Attribute::RelativeScale(scale)
        ]
    );
}

#[test]
fn title_heading() {
    let doc = render("# Title\n");
    assert_eq!(doc.text(), "Title\n");
    assert_eq!(doc.runs().len(), 1);
    assert_eq!(doc.runs()[0].range, 0..5);
    assert!(doc.runs()[0].is_bold());
    assert_eq!(doc.runs()[0].relative_scale(), Some(2.0));
}

#[test]
fn heading_without_trailing_newline() {
    let doc = render("text\n## End");
    assert_eq!(doc.text(), "text\nEnd");
    assert_eq!(doc.runs()[0].range, 5..8);
}

#[test]
fn heading_with_crlf_keeps_terminator_unstyled() {
    let doc = render("# Title\r\nbody\r\n");
    assert_eq!(doc.text(), "Title\r\nbody\r\n");
    assert_eq!(doc.runs()[0].range, 0..5);
}

#[rstest]
#[case("**Bold**\n", "Bold\n", Attribute::Bold)]
#[case("_Italic_\n", "Italic\n", Attribute::Italic)]
#[case("a: **Markdown Renderer**\n", "a: Markdown Renderer\n", Attribute::Bold)]
#[case("a: _Markdown Renderer_\n", "a: Markdown Renderer\n", Attribute::Italic)]
fn inline_delimiters_are_stripped(
    #[case] md: &str,
    #[case] expected: &str,
    #[case] attribute: Attribute,
) {
    let doc = render(md);
    assert_eq!(doc.text(), expected);
    assert_eq!(doc.runs().len(), 1);

    let run = &doc.runs()[0];
    assert_eq!(run.attributes, vec![attribute]);
    assert_eq!(&expected[run.range.clone()], expected.trim_start_matches("a: ").trim_end());
}

#[test]
fn inline_code() {
    let doc = render("`Code`\n");
    assert_eq!(doc.text(), "Code\n");
    assert_eq!(doc.runs().len(), 1);
    assert_eq!(doc.runs()[0].range, 0..4);
    assert_eq!(
        doc.runs()[0].attributes,
        vec![
            Attribute::Monospace,
            Attribute::Background(Theme::default().code_background)
        ]
    );
}

#[test]
fn inline_code_mid_line() {
    let doc = render("a: `Markdown Renderer`\n");
    assert_eq!(doc.text(), "a: Markdown Renderer\n");
    assert_eq!(doc.runs()[0].range, 3..20);
}

#[test]
fn greedy_bold_spans_from_first_to_last_delimiter() {
    let doc = render("**a** and **b**\n");
    assert_eq!(doc.text(), "a** and **b\n");
    assert_eq!(doc.runs().len(), 1);
    assert_eq!(doc.runs()[0].range, 0..11);
    assert!(doc.runs()[0].is_bold());
}

#[test]
fn greedy_emphasis_spans_whole_line() {
    let doc = render("_one_ two _three_\n");
    assert_eq!(doc.text(), "one_ two _three\n");
    assert_eq!(doc.runs()[0].range, 0..15);
}

#[test]
fn bold_on_separate_lines_realigns_within_the_pass() {
    let doc = render("**one**\n**two**\n");
    assert_eq!(doc.text(), "one\ntwo\n");
    let ranges: Vec<_> = doc.runs().iter().map(|r| r.range.clone()).collect();
    assert_eq!(ranges, vec![0..3, 4..7]);
}

#[test]
fn heading_runs_before_emphasis() {
    let doc = render("# _Title_\n");
    assert_eq!(doc.text(), "Title\n");
    assert_eq!(doc.runs().len(), 2);

    let heading = &doc.runs()[0];
    let italic = &doc.runs()[1];
    assert_eq!(heading.range, 0..5);
    assert_eq!(heading.relative_scale(), Some(2.0));
    assert_eq!(italic.range, 0..5);
    assert!(italic.is_italic());
}

#[test]
fn earlier_runs_follow_later_edits() {
    let doc = render("## Intro\n**x** then `y`\n");
    assert_eq!(doc.text(), "Intro\nx then y\n");
    let ranges: Vec<_> = doc.runs().iter().map(|r| r.range.clone()).collect();
    assert_eq!(ranges, vec![0..5, 6..7, 13..14]);
}

#[test]
fn link_text_is_kept_and_clickable() {
    let doc = render("See [docs](http://d.io) now\n");
    assert_eq!(doc.text(), "See docs now\n");

    let run = &doc.runs()[0];
    assert_eq!(run.range, 4..8);
    assert_eq!(
        run.attributes,
        vec![
            Attribute::Foreground(Theme::default().link),
            Attribute::Click(ClickId(0))
        ]
    );

    let payload = doc.payload(ClickId(0)).unwrap();
    assert_eq!(payload.scheme, SchemeKind::Link);
    assert_eq!(payload.value, "http://d.io");
    assert_eq!(payload.raw_match, "[docs](http://d.io)");
    assert_eq!(payload.located_range, Some(4..8));
    assert_eq!(doc.payload_at(5), Some(payload));
    assert_eq!(doc.payload_at(9), None);
}

#[test]
fn several_links_on_one_line() {
    let doc = render("[a](1) [bb](2) [c](3)\n");
    assert_eq!(doc.text(), "a bb c\n");
    let ranges: Vec<_> = doc.runs().iter().map(|r| r.range.clone()).collect();
    assert_eq!(ranges, vec![0..1, 2..4, 5..6]);
    let values: Vec<_> = doc.payloads().values().map(|p| p.value.as_str()).collect();
    assert_eq!(values, vec!["1", "2", "3"]);
}

#[test]
fn payload_location_tracks_later_rules() {
    let doc = render("**b** [link](x)\n");
    assert_eq!(doc.text(), "b link\n");
    assert_eq!(doc.payload(ClickId(0)).unwrap().located_range, Some(2..6));
}

#[test]
fn ordered_list_bolds_only_the_number() {
    let doc = render("1. First\n12. Second\n");
    assert_eq!(doc.text(), "1. First\n12. Second\n");
    let ranges: Vec<_> = doc.runs().iter().map(|r| r.range.clone()).collect();
    assert_eq!(ranges, vec![0..2, 9..12]);
    assert!(doc.runs().iter().all(|r| r.attributes == vec![Attribute::Bold]));
}

#[test]
fn unordered_list_gets_bullet_and_block_background() {
    let doc = render("* one\n* two\n");
    assert_eq!(doc.text(), "\u{2022} one\n\u{2022} two\n");
    let ranges: Vec<_> = doc.runs().iter().map(|r| r.range.clone()).collect();
    assert_eq!(ranges, vec![0..7, 8..15]);
    assert_eq!(
        doc.runs()[0].attributes,
        vec![Attribute::BlockBackground(Theme::default().list_background)]
    );
}

#[test]
fn bold_is_removed_before_list_items_are_scanned() {
    let doc = render("* **b**\n**c** d\n");
    assert_eq!(doc.text(), "\u{2022} b\nc d\n");
    let bold: Vec<_> = doc
        .runs()
        .iter()
        .filter(|r| r.is_bold())
        .map(|r| r.range.clone())
        .collect();
    assert_eq!(bold, vec![4..5, 6..7]);
}

#[test]
fn quote_marker_becomes_space() {
    let doc = render("> quoted\n");
    assert_eq!(doc.text(), "  quoted\n");
    assert_eq!(doc.runs()[0].range, 0..8);
    assert_eq!(doc.runs()[0].attributes, vec![Attribute::QuoteMarker]);
}

#[test]
fn code_block_fences_are_removed() {
    let doc = render("```\nlet x = 1;\n```\n");
    assert_eq!(doc.text(), "\nlet x = 1;\n\n");
    assert_eq!(doc.runs()[0].range, 0..12);
    assert!(doc.runs()[0].is_monospace());
}

#[test]
fn remote_image_leaves_placeholder_and_requests_it() {
    let (resolver, rx) = ChannelResolver::new(BundledImages::new());
    let doc = Renderer::new(Theme::default(), Arc::new(resolver)).render("![t](http://x/y.png)\n");

    let requests: Vec<_> = rx.try_iter().collect();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].reference, "http://x/y.png");

    let text = doc.text();
    assert!(!text.contains("!["));
    assert_eq!(text, format!("{}\n", requests[0].token));
    assert!(doc.runs().is_empty());

    let pending = doc.pending_placeholders();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].token, requests[0].token);
    assert_eq!(pending[0].reference, "http://x/y.png");

    let payload = doc.payload(pending[0].click_id).unwrap();
    assert_eq!(payload.scheme, SchemeKind::Image);
    assert_eq!(payload.located_range, None);
}

#[test]
fn resolving_inserts_marker_where_the_token_is_now() {
    let (resolver, rx) = ChannelResolver::new(BundledImages::new());
    let renderer = Renderer::new(Theme::default(), Arc::new(resolver));
    let mut doc = renderer.render("a: ![Image title](http://website.com/image.png)\n");
    let token = rx.try_recv().unwrap().token;
    assert_eq!(doc.text().find(&token), Some(3));

    let outcome = doc.complete_image_resolution(&token, png());
    assert_eq!(outcome, ResolutionOutcome::Inserted(3..6));
    assert_eq!(doc.text(), "a: \u{FFFC}\n");

    let embedded: Vec<_> = doc.runs().iter().filter(|r| r.embedded().is_some()).collect();
    assert_eq!(embedded.len(), 1);
    assert_eq!(embedded[0].range, 3..6);
    assert!(doc.pending_placeholders().is_empty());
}

#[test]
fn out_of_order_resolution() {
    let (resolver, rx) = ChannelResolver::new(BundledImages::new());
    let renderer = Renderer::new(Theme::default(), Arc::new(resolver));
    let mut doc = renderer.render("**x** ![a](http://x/a.png) and ![b](http://x/b.png)\n");
    let tokens: Vec<_> = rx.try_iter().map(|r| r.token).collect();
    assert_eq!(tokens.len(), 2);

    let second = doc.complete_image_resolution(&tokens[1], png());
    let first = doc.complete_image_resolution(&tokens[0], png());
    assert_eq!(first, ResolutionOutcome::Inserted(2..5));
    assert!(matches!(second, ResolutionOutcome::Inserted(_)));

    assert_eq!(doc.text(), "x \u{FFFC} and \u{FFFC}\n");
    let embedded: Vec<_> = doc
        .runs()
        .iter()
        .filter(|r| r.embedded().is_some())
        .map(|r| r.range.clone())
        .collect();
    assert_eq!(embedded, vec![10..13, 2..5]);
    assert!(doc.runs()[0].is_bold());
    assert_eq!(doc.runs()[0].range, 0..1);
}

#[test]
fn unknown_and_repeated_tokens_are_no_ops() {
    let (resolver, rx) = ChannelResolver::new(BundledImages::new());
    let renderer = Renderer::new(Theme::default(), Arc::new(resolver));
    let mut doc = renderer.render("_keep_ ![a](http://x/a.png)\n");
    let token = rx.try_recv().unwrap().token;

    let before = doc.text();
    assert_eq!(
        doc.complete_image_resolution("\u{27E6}img:0:nope\u{27E7}", png()),
        ResolutionOutcome::Stale
    );
    assert_eq!(doc.text(), before);

    assert!(matches!(
        doc.complete_image_resolution(&token, png()),
        ResolutionOutcome::Inserted(_)
    ));
    let after = doc.text();
    let runs = doc.runs().to_vec();
    assert_eq!(
        doc.complete_image_resolution(&token, png()),
        ResolutionOutcome::Stale
    );
    assert_eq!(doc.text(), after);
    assert_eq!(doc.runs(), &runs[..]);
}

#[test]
fn failed_fetch_leaves_token_visible() {
    let (resolver, rx) = ChannelResolver::new(BundledImages::new());
    let renderer = Renderer::new(Theme::default(), Arc::new(resolver));
    let mut doc = renderer.render("![a](http://x/a.png)");
    let token = rx.try_recv().unwrap().token;

    assert_eq!(
        doc.complete_image_resolution(&token, None),
        ResolutionOutcome::NoImage
    );
    assert_eq!(doc.text(), token);
    assert!(doc.runs().is_empty());
}

#[test]
fn bundled_image_resolves_in_the_same_pass() {
    let bundled: BundledImages = [("logo", ResourceId(7))].into_iter().collect();
    let (resolver, rx) = ChannelResolver::new(bundled);
    let doc = Renderer::new(Theme::default(), Arc::new(resolver)).render("x ![Logo](logo) y\n");

    assert!(rx.try_recv().is_err());
    assert_eq!(doc.text(), "x \u{FFFC} y\n");
    assert_eq!(doc.runs().len(), 1);
    assert_eq!(
        doc.runs()[0].embedded(),
        Some(&EmbeddedImage::Bundled(ResourceId(7)))
    );
    assert_eq!(doc.runs()[0].range, 2..5);
    assert!(doc.pending_placeholders().is_empty());
}

#[test]
fn into_parts_returns_text_runs_and_payloads() {
    let (text, runs, payloads) = render("[a](b)\n").into_parts();
    assert_eq!(text, "a\n");
    assert_eq!(runs.len(), 1);
    assert_eq!(payloads.len(), 1);
}

#[test]
fn empty_and_plain_input_pass_through() {
    assert_eq!(render("").text(), "");
    let doc = render("just text\n");
    assert_eq!(doc.text(), "just text\n");
    assert!(doc.runs().is_empty());
    assert!(doc.payloads().is_empty());
}

#[test]
fn mixed_document_snapshot() {
    let doc = render("# Spanmark\nSome **bold** and `code`.\n* item\n> quote\n");
    insta::assert_snapshot!(dump(&doc), @r#"
    "Spanmark\nSome bold and code.\n• item\n  quote\n"
    0..8 "Spanmark" bold, fg #000000, scale 2.0
    14..18 "bold" bold
    29..37 "• item" block #F0F0F0
    23..27 "code" mono, bg #DEDEDE
    38..45 "  quote" quote
    "#);
}

#[test]
fn links_and_images_snapshot() {
    let bundled: BundledImages = [("logo", ResourceId(1))].into_iter().collect();
    let doc = Renderer::new(Theme::default(), Arc::new(bundled))
        .render("Read [the guide](guide.md) or ![logo](logo)\n");
    insta::assert_snapshot!(dump(&doc), @r#"
    "Read the guide or <obj>\n"
    5..14 "the guide" fg #FF00CC, click 0
    18..21 "<obj>" image res 1, click 1
    click 0 Link guide.md at Some(5..14)
    click 1 Image logo at Some(18..21)
    "#);
}
