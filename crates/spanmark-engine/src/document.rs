use std::collections::BTreeMap;
use std::ops::Range;

use crate::buffer::Buffer;
use crate::placeholder::Placeholder;
use crate::style::{Attribute, ClickId, EmbeddedImage, ImageData, StyleRun};

/// Stands in for embedded content (an image) in the final text.
pub const OBJECT_REPLACEMENT: &str = "\u{FFFC}";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SchemeKind {
    Link,
    Image,
}

/// Data handed to the interaction boundary when a link or image is activated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClickPayload {
    pub click_id: ClickId,
    pub scheme: SchemeKind,
    /// Full markdown the payload was created from, e.g. `[text](url)`.
    pub raw_match: String,
    /// Link target or image reference.
    pub value: String,
    /// Where the clickable content currently sits in the text, if anywhere.
    pub located_range: Option<Range<usize>>,
}

/// Receives activated payloads from the rendering surface.
pub trait InteractionHandler {
    fn on_interaction(&self, payload: &ClickPayload);
}

impl<F: Fn(&ClickPayload)> InteractionHandler for F {
    fn on_interaction(&self, payload: &ClickPayload) {
        self(payload)
    }
}

/// Result of handing a fetched image back to a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolutionOutcome {
    /// The placeholder was replaced; the marker now occupies this range.
    Inserted(Range<usize>),
    /// No image data came back; the placeholder stays visible.
    NoImage,
    /// The token is not in the current text (resolved already, edited away,
    /// from another render, or the document is gone).
    Stale,
}

/// The render-ready output: final text, style runs and click payloads.
///
/// Remains mutable only through [`complete_image_resolution`](Self::complete_image_resolution)
/// while placeholders are outstanding.
#[derive(Debug, Clone)]
pub struct StyledDocument {
    buffer: Buffer,
    payloads: BTreeMap<ClickId, ClickPayload>,
    pending: Vec<Placeholder>,
}

impl StyledDocument {
    pub(crate) fn new(
        buffer: Buffer,
        payloads: BTreeMap<ClickId, ClickPayload>,
        pending: Vec<Placeholder>,
    ) -> Self {
        let mut doc = Self {
            buffer,
            payloads,
            pending,
        };
        doc.relocate_payloads();
        doc
    }

    pub fn text(&self) -> String {
        self.buffer.text()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn runs(&self) -> &[StyleRun] {
        self.buffer.runs()
    }

    pub fn payloads(&self) -> &BTreeMap<ClickId, ClickPayload> {
        &self.payloads
    }

    pub fn payload(&self, id: ClickId) -> Option<&ClickPayload> {
        self.payloads.get(&id)
    }

    /// Placeholders still waiting for their image.
    pub fn pending_placeholders(&self) -> &[Placeholder] {
        &self.pending
    }

    /// The payload of the first click run covering `offset`.
    pub fn payload_at(&self, offset: usize) -> Option<&ClickPayload> {
        self.runs()
            .iter()
            .filter(|run| run.contains(offset))
            .find_map(|run| run.click_id())
            .and_then(|id| self.payloads.get(&id))
    }

    /// Hands the payload under `offset` to `handler`. Returns false if
    /// nothing clickable is there.
    pub fn dispatch_interaction(&self, offset: usize, handler: &dyn InteractionHandler) -> bool {
        match self.payload_at(offset) {
            Some(payload) => {
                handler.on_interaction(payload);
                true
            }
            None => false,
        }
    }

    /// Replaces the placeholder `token` with an embedded image.
    ///
    /// The token is found by searching the current text, never by a stored
    /// offset, so placeholders may be resolved in any order.
    pub fn complete_image_resolution(
        &mut self,
        token: &str,
        image: Option<ImageData>,
    ) -> ResolutionOutcome {
        let Some(image) = image.filter(|image| !image.is_empty()) else {
            log::debug!("No image data for placeholder {token}, leaving it in place");
            return ResolutionOutcome::NoImage;
        };
        let Some(found) = self.buffer.find(token) else {
            log::debug!("Placeholder {token} not found, ignoring resolution");
            return ResolutionOutcome::Stale;
        };

        let click_id = self
            .pending
            .iter()
            .position(|p| p.token == token)
            .map(|i| self.pending.remove(i).click_id);

        self.buffer.replace(found.clone(), OBJECT_REPLACEMENT);
        let marker = found.start..found.start + OBJECT_REPLACEMENT.len();

        let mut attributes = vec![Attribute::Embedded(EmbeddedImage::Decoded(image))];
        attributes.extend(click_id.map(Attribute::Click));
        self.buffer.add_run(StyleRun::new(marker.clone(), attributes));
        self.relocate_payloads();

        ResolutionOutcome::Inserted(marker)
    }

    /// Splits into `(text, runs, payloads)`.
    pub fn into_parts(self) -> (String, Vec<StyleRun>, BTreeMap<ClickId, ClickPayload>) {
        (self.buffer.text(), self.buffer.runs().to_vec(), self.payloads)
    }

    /// Points each payload at the click run carrying its id.
    fn relocate_payloads(&mut self) {
        let mut located: BTreeMap<ClickId, Range<usize>> = BTreeMap::new();
        for run in self.buffer.runs() {
            if let Some(id) = run.click_id() {
                located.entry(id).or_insert_with(|| run.range.clone());
            }
        }
        for (id, payload) in &mut self.payloads {
            payload.located_range = located.get(id).cloned();
        }
    }
}
