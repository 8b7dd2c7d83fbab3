//! UniFFI bindings for spanmark mobile apps
//!
//! Exposes rendering and the image placeholder protocol to Kotlin. Offsets
//! crossing the boundary are UTF-16 code units so they index straight into a
//! JVM string; the engine works in UTF-8 bytes internally.

use spanmark_engine::{
    Attribute, ClickPayload, Color, EmbeddedImage, ImageData, ImageResolver, Renderer,
    ResolutionOutcome, ResolutionRequest, ResourceId, SchemeKind, SharedDocument,
    StyledDocument, Theme, placeholder::is_token,
};
use std::sync::{Arc, Mutex};

uniffi::setup_scaffolding!();

// ============ Host callbacks ============

/// Implemented in Kotlin: bundled resource lookup and asynchronous fetching.
#[uniffi::export(with_foreign)]
pub trait HostImageResolver: Send + Sync {
    /// Resource id of an image packaged with the app, if `reference` names one.
    fn resolve_bundled(&self, reference: String) -> Option<u32>;

    /// Start fetching `reference`; answer later with
    /// `DocumentHandle::complete_image_resolution(token, ...)`. Must not block.
    fn request_image(&self, token: String, reference: String);
}

/// Resolver for a single render. Fetch requests are held back until
/// `flush`, which runs once the rendered document is in place, so a host that
/// answers inside `request_image` finds its token.
struct HostResolver {
    host: Arc<dyn HostImageResolver>,
    pending: Mutex<Vec<ResolutionRequest>>,
}

impl HostResolver {
    fn new(host: Arc<dyn HostImageResolver>) -> Self {
        Self {
            host,
            pending: Mutex::new(Vec::new()),
        }
    }

    fn flush(&self) {
        let pending = {
            let mut pending = self.pending.lock().unwrap_or_else(|e| e.into_inner());
            std::mem::take(&mut *pending)
        };
        for request in pending {
            self.host.request_image(request.token, request.reference);
        }
    }
}

impl ImageResolver for HostResolver {
    fn resolve_bundled(&self, reference: &str) -> Option<ResourceId> {
        self.host.resolve_bundled(reference.to_string()).map(ResourceId)
    }

    fn request_image(&self, request: ResolutionRequest) {
        self.pending
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);
    }
}

/// Routes `log` output to logcat. Safe to call more than once.
#[uniffi::export]
pub fn init_logging() {
    #[cfg(target_os = "android")]
    {
        android_logger::init_once(
            android_logger::Config::default()
                .with_max_level(log::LevelFilter::Debug)
                .with_tag("Spanmark"),
        );
    }
    log::info!("spanmark logging ready");
}

// ============ Document Handle ============

/// Renders markdown and holds the latest result so fetched images can be
/// slotted in from any thread.
#[derive(uniffi::Object)]
pub struct DocumentHandle {
    theme: Theme,
    host: Arc<dyn HostImageResolver>,
    document: SharedDocument,
}

#[uniffi::export]
impl DocumentHandle {
    #[uniffi::constructor]
    pub fn new(resolver: Arc<dyn HostImageResolver>) -> Self {
        Self::with_theme(ThemeDto::from(Theme::default()), resolver)
    }

    #[uniffi::constructor]
    pub fn with_theme(theme: ThemeDto, resolver: Arc<dyn HostImageResolver>) -> Self {
        Self {
            theme: theme.into(),
            host: resolver,
            document: SharedDocument::empty(),
        }
    }

    /// Render `content`, replacing the previous document. Placeholder tokens
    /// from earlier renders become stale.
    ///
    /// Image requests reach the host only after the new document is stored.
    /// The result includes any image the host answered during this call.
    pub fn render(&self, content: String) -> StyledTextDto {
        let resolver = Arc::new(HostResolver::new(self.host.clone()));
        let doc = Renderer::new(self.theme.clone(), resolver.clone()).render(&content);
        let dto = StyledTextDto::from_document(&doc);
        self.document.replace(doc);
        resolver.flush();
        self.document.with(StyledTextDto::from_document).unwrap_or(dto)
    }

    /// Hand back a fetched image. `bytes` of `None` means the fetch failed
    /// and the placeholder stays. A zero width or height means unknown.
    ///
    /// Returns true if the document changed; call `styled_text` to redraw.
    /// Unknown, stale or malformed tokens change nothing.
    pub fn complete_image_resolution(
        &self,
        token: String,
        bytes: Option<Vec<u8>>,
        width: u32,
        height: u32,
    ) -> bool {
        if !is_token(&token) {
            log::debug!("Ignoring resolution for {token:?}: not a placeholder token");
            return false;
        }

        let image = bytes.map(|bytes| {
            let image = ImageData::new(bytes);
            if width > 0 && height > 0 {
                image.with_size(width, height)
            } else {
                image
            }
        });
        let outcome = self.document.complete_image_resolution(&token, image);
        log::debug!("Resolution of {token}: {outcome:?}");
        matches!(outcome, ResolutionOutcome::Inserted(_))
    }

    /// The current document, or `None` before the first render.
    pub fn styled_text(&self) -> Option<StyledTextDto> {
        self.document.with(StyledTextDto::from_document)
    }

    pub fn click_payload(&self, click_id: u64) -> Option<ClickPayloadDto> {
        self.document
            .with(|doc| {
                let map = Utf16Map::new(&doc.text());
                doc.payloads()
                    .values()
                    .find(|p| p.click_id.0 == click_id)
                    .map(|p| ClickPayloadDto::from_payload(p, &map))
            })
            .flatten()
    }

    /// The payload under a tap at `utf16_offset`, if any.
    pub fn payload_at(&self, utf16_offset: u32) -> Option<ClickPayloadDto> {
        self.document
            .with(|doc| {
                let map = Utf16Map::new(&doc.text());
                doc.payload_at(map.to_byte(utf16_offset))
                    .map(|p| ClickPayloadDto::from_payload(p, &map))
            })
            .flatten()
    }
}

// ============ Offsets ============

/// Converts between UTF-8 byte offsets and UTF-16 code unit offsets.
struct Utf16Map {
    /// (byte offset, utf-16 offset) at each char start, plus the end.
    starts: Vec<(usize, u32)>,
}

impl Utf16Map {
    fn new(text: &str) -> Self {
        let mut starts = Vec::with_capacity(text.len() + 1);
        let mut units = 0u32;
        for (byte, c) in text.char_indices() {
            starts.push((byte, units));
            units += c.len_utf16() as u32;
        }
        starts.push((text.len(), units));
        Self { starts }
    }

    fn to_utf16(&self, byte: usize) -> u32 {
        let i = self.starts.partition_point(|(b, _)| *b < byte);
        match self.starts.get(i) {
            Some((_, units)) => *units,
            None => self.starts.last().map_or(0, |(_, units)| *units),
        }
    }

    /// Byte offset of the char containing code unit `unit`.
    fn to_byte(&self, unit: u32) -> usize {
        let i = self.starts.partition_point(|(_, u)| *u <= unit);
        self.starts
            .get(i.saturating_sub(1))
            .map_or(0, |(byte, _)| *byte)
    }
}

// ============ DTOs ============

/// Colours as ARGB integers, matching Android's `Color` ints.
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct ThemeDto {
    pub text: u32,
    pub link: u32,
    pub code_background: u32,
    pub list_background: u32,
}

impl From<Theme> for ThemeDto {
    fn from(theme: Theme) -> Self {
        Self {
            text: theme.text.0,
            link: theme.link.0,
            code_background: theme.code_background.0,
            list_background: theme.list_background.0,
        }
    }
}

impl From<ThemeDto> for Theme {
    fn from(dto: ThemeDto) -> Self {
        Self {
            text: Color(dto.text),
            link: Color(dto.link),
            code_background: Color(dto.code_background),
            list_background: Color(dto.list_background),
        }
    }
}

/// Everything needed to build a spannable string.
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct StyledTextDto {
    pub text: String,
    pub runs: Vec<StyleRunDto>,
    pub payloads: Vec<ClickPayloadDto>,
}

impl StyledTextDto {
    fn from_document(doc: &StyledDocument) -> Self {
        let text = doc.text();
        let map = Utf16Map::new(&text);
        Self {
            runs: doc
                .runs()
                .iter()
                .map(|run| {
                    let mut dto = StyleRunDto::new(
                        map.to_utf16(run.range.start),
                        map.to_utf16(run.range.end),
                    );
                    run.attributes.iter().for_each(|attr| dto.apply(attr));
                    dto
                })
                .collect(),
            payloads: doc
                .payloads()
                .values()
                .map(|p| ClickPayloadDto::from_payload(p, &map))
                .collect(),
            text,
        }
    }
}

/// One style run with its attributes flattened into fields.
#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct StyleRunDto {
    /// UTF-16 offsets, end exclusive
    pub start: u32,
    pub end: u32,
    pub foreground: Option<u32>,
    pub background: Option<u32>,
    pub block_background: Option<u32>,
    pub bold: bool,
    pub italic: bool,
    pub monospace: bool,
    pub quote: bool,
    pub relative_scale: Option<f32>,
    pub click_id: Option<u64>,
    /// Resource id for an image packaged with the app
    pub bundled_image: Option<u32>,
    /// Bytes of a fetched image
    pub image_bytes: Option<Vec<u8>>,
    pub image_width: Option<u32>,
    pub image_height: Option<u32>,
}

impl StyleRunDto {
    fn new(start: u32, end: u32) -> Self {
        Self {
            start,
            end,
            foreground: None,
            background: None,
            block_background: None,
            bold: false,
            italic: false,
            monospace: false,
            quote: false,
            relative_scale: None,
            click_id: None,
            bundled_image: None,
            image_bytes: None,
            image_width: None,
            image_height: None,
        }
    }

    fn apply(&mut self, attr: &Attribute) {
        match attr {
            Attribute::Foreground(c) => self.foreground = Some(c.0),
            Attribute::Background(c) => self.background = Some(c.0),
            Attribute::BlockBackground(c) => self.block_background = Some(c.0),
            Attribute::Bold => self.bold = true,
            Attribute::Italic => self.italic = true,
            Attribute::Monospace => self.monospace = true,
            Attribute::QuoteMarker => self.quote = true,
            Attribute::RelativeScale(s) => self.relative_scale = Some(*s),
            Attribute::Click(id) => self.click_id = Some(id.0),
            Attribute::Embedded(EmbeddedImage::Bundled(id)) => self.bundled_image = Some(id.0),
            Attribute::Embedded(EmbeddedImage::Decoded(image)) => {
                self.image_bytes = Some(image.bytes.to_vec());
                self.image_width = image.width;
                self.image_height = image.height;
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, uniffi::Record)]
pub struct ClickPayloadDto {
    pub click_id: u64,
    /// "link" or "image"
    pub kind: String,
    pub raw_match: String,
    pub value: String,
    /// UTF-16 range of the clickable text, absent while an image is pending
    pub start: Option<u32>,
    pub end: Option<u32>,
}

impl ClickPayloadDto {
    fn from_payload(payload: &ClickPayload, map: &Utf16Map) -> Self {
        let kind = match payload.scheme {
            SchemeKind::Link => "link",
            SchemeKind::Image => "image",
        };
        let range = payload.located_range.as_ref();
        Self {
            click_id: payload.click_id.0,
            kind: kind.to_string(),
            raw_match: payload.raw_match.clone(),
            value: payload.value.clone(),
            start: range.map(|r| map.to_utf16(r.start)),
            end: range.map(|r| map.to_utf16(r.end)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::sync::{OnceLock, Weak};

    #[derive(Default)]
    struct RecordingHost {
        requests: Mutex<Vec<(String, String)>>,
    }

    impl HostImageResolver for RecordingHost {
        fn resolve_bundled(&self, reference: String) -> Option<u32> {
            (reference == "logo").then_some(42)
        }

        fn request_image(&self, token: String, reference: String) {
            self.requests.lock().unwrap().push((token, reference));
        }
    }

    fn handle() -> (DocumentHandle, Arc<RecordingHost>) {
        let host = Arc::new(RecordingHost::default());
        (DocumentHandle::new(host.clone()), host)
    }

    #[test]
    fn test_no_document_before_render() {
        let (doc, _) = handle();
        assert!(doc.styled_text().is_none());
        assert!(doc.payload_at(0).is_none());
    }

    #[test]
    fn test_render_heading() {
        let (doc, _) = handle();
        let styled = doc.render("# Title\n".to_string());

        assert_eq!(styled.text, "Title\n");
        assert_eq!(styled.runs.len(), 1);
        let run = &styled.runs[0];
        assert_eq!((run.start, run.end), (0, 5));
        assert!(run.bold);
        assert_eq!(run.relative_scale, Some(2.0));
        assert_eq!(run.foreground, Some(0xFF00_0000));
        assert_eq!(doc.styled_text(), Some(styled));
    }

    #[test]
    fn test_offsets_are_utf16() {
        let (doc, _) = handle();
        let styled = doc.render("# H\u{e9}llo \u{1F600}\n[a](b)\n".to_string());

        assert_eq!(styled.text, "H\u{e9}llo \u{1F600}\na\n");
        assert_eq!((styled.runs[0].start, styled.runs[0].end), (0, 8));
        assert_eq!((styled.runs[1].start, styled.runs[1].end), (9, 10));
        assert_eq!(styled.payloads[0].start, Some(9));
        assert_eq!(styled.payloads[0].end, Some(10));

        assert_eq!(doc.payload_at(9).map(|p| p.value), Some("b".to_string()));
        assert!(doc.payload_at(8).is_none());
    }

    #[test]
    fn test_bundled_image_is_resolved_by_host() {
        let (doc, host) = handle();
        let styled = doc.render("![Logo](logo)".to_string());

        assert_eq!(styled.text, "\u{FFFC}");
        assert_eq!(styled.runs[0].bundled_image, Some(42));
        assert_eq!(styled.runs[0].click_id, Some(0));
        assert!(host.requests.lock().unwrap().is_empty());
    }

    #[test]
    fn test_remote_image_round_trip() {
        let (doc, host) = handle();
        let styled = doc.render("a ![pic](http://x/p.png) b".to_string());
        let (token, reference) = host.requests.lock().unwrap()[0].clone();

        assert_eq!(reference, "http://x/p.png");
        assert_eq!(styled.text, format!("a {token} b"));
        assert_eq!(styled.payloads[0].kind, "image");
        assert_eq!(styled.payloads[0].start, None);

        assert!(!doc.complete_image_resolution(token.clone(), None, 0, 0));
        assert!(doc.complete_image_resolution(token.clone(), Some(vec![1, 2, 3]), 4, 5));
        assert!(!doc.complete_image_resolution(token, Some(vec![1, 2, 3]), 4, 5));

        let styled = doc.styled_text().unwrap();
        assert_eq!(styled.text, "a \u{FFFC} b");
        let run = &styled.runs[0];
        assert_eq!((run.start, run.end), (2, 3));
        assert_eq!(run.image_bytes, Some(vec![1, 2, 3]));
        assert_eq!((run.image_width, run.image_height), (Some(4), Some(5)));

        let payload = doc.click_payload(0).unwrap();
        assert_eq!((payload.start, payload.end), (Some(2), Some(3)));
        assert_eq!(payload.value, "http://x/p.png");
    }

    #[test]
    fn test_rerender_makes_old_tokens_stale() {
        let (doc, host) = handle();
        doc.render("![pic](http://x/p.png)".to_string());
        let (old, _) = host.requests.lock().unwrap()[0].clone();

        doc.render("plain".to_string());
        assert!(!doc.complete_image_resolution(old, Some(vec![1]), 0, 0));
        assert_eq!(doc.styled_text().unwrap().text, "plain");
    }

    #[test]
    fn test_foreign_token_is_ignored() {
        let (doc, _) = handle();
        doc.render("text".to_string());
        assert!(!doc.complete_image_resolution("text".to_string(), Some(vec![1]), 0, 0));
        assert_eq!(doc.styled_text().unwrap().text, "text");
    }

    /// Answers every request before returning, like a host with a cache hit.
    #[derive(Default)]
    struct ImmediateHost {
        handle: OnceLock<Weak<DocumentHandle>>,
        answers: Mutex<Vec<bool>>,
    }

    impl HostImageResolver for ImmediateHost {
        fn resolve_bundled(&self, _reference: String) -> Option<u32> {
            None
        }

        fn request_image(&self, token: String, _reference: String) {
            if let Some(handle) = self.handle.get().and_then(Weak::upgrade) {
                let changed = handle.complete_image_resolution(token, Some(vec![1, 2, 3]), 1, 1);
                self.answers.lock().unwrap().push(changed);
            }
        }
    }

    #[test]
    fn test_image_answered_during_render_is_inserted() {
        let host = Arc::new(ImmediateHost::default());
        let doc = Arc::new(DocumentHandle::new(host.clone()));
        host.handle.set(Arc::downgrade(&doc)).unwrap();

        let styled = doc.render("![a](http://x/a.png)".to_string());

        assert_eq!(*host.answers.lock().unwrap(), vec![true]);
        assert_eq!(styled.text, "\u{FFFC}");
        assert_eq!(styled.runs[0].image_bytes, Some(vec![1, 2, 3]));
        assert_eq!(styled.payloads[0].start, Some(0));
        assert_eq!(doc.styled_text(), Some(styled));
    }

    #[test]
    fn test_custom_theme() {
        let host = Arc::new(RecordingHost::default());
        let theme = ThemeDto {
            link: 0xFF00_00FF,
            ..ThemeDto::from(Theme::default())
        };
        let doc = DocumentHandle::with_theme(theme, host);
        let styled = doc.render("[a](b)".to_string());
        assert_eq!(styled.runs[0].foreground, Some(0xFF00_00FF));
    }

    #[test]
    fn test_utf16_map_inside_surrogate_pair() {
        let map = Utf16Map::new("a\u{1F600}b");
        assert_eq!(map.to_utf16(1), 1);
        assert_eq!(map.to_utf16(5), 3);
        assert_eq!(map.to_byte(2), 1);
        assert_eq!(map.to_byte(3), 5);
        assert_eq!(map.to_byte(99), 6);
    }
}
