//! Boundary to the host's image sources.
//!
//! The engine asks two things of the host: whether an image reference names
//! something packaged locally, and (if not) to fetch it. Fetching is
//! fire-and-forget; the host answers later through
//! [`StyledDocument::complete_image_resolution`](crate::StyledDocument::complete_image_resolution).

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};

use crate::style::ResourceId;

/// Emitted for every image that could not be resolved locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionRequest {
    /// Placeholder token standing in for the image in the rendered text.
    pub token: String,
    /// Image reference as written in the source, e.g. a URL.
    pub reference: String,
}

pub trait ImageResolver: Send + Sync {
    /// Synchronous lookup of an image packaged with the host.
    fn resolve_bundled(&self, reference: &str) -> Option<ResourceId>;

    /// Asks the host to fetch an image. Must not block.
    fn request_image(&self, request: ResolutionRequest);
}

/// Resolves nothing and drops every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopResolver;

impl ImageResolver for NoopResolver {
    fn resolve_bundled(&self, _reference: &str) -> Option<ResourceId> {
        None
    }

    fn request_image(&self, request: ResolutionRequest) {
        log::debug!("No fetcher for image {}", request.reference);
    }
}

/// Explicit name to resource table for images packaged with the host.
#[derive(Debug, Clone, Default)]
pub struct BundledImages {
    by_name: HashMap<String, ResourceId>,
}

impl BundledImages {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, id: ResourceId) {
        self.by_name.insert(name.into(), id);
    }

    pub fn get(&self, name: &str) -> Option<ResourceId> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, ResourceId)> for BundledImages {
    fn from_iter<I: IntoIterator<Item = (S, ResourceId)>>(iter: I) -> Self {
        Self {
            by_name: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl ImageResolver for BundledImages {
    fn resolve_bundled(&self, reference: &str) -> Option<ResourceId> {
        self.get(reference)
    }

    fn request_image(&self, request: ResolutionRequest) {
        log::debug!("No fetcher for image {}", request.reference);
    }
}

/// Bundled lookup plus a channel that carries fetch requests to a worker.
#[derive(Debug)]
pub struct ChannelResolver {
    bundled: BundledImages,
    sender: Sender<ResolutionRequest>,
}

impl ChannelResolver {
    pub fn new(bundled: BundledImages) -> (Self, Receiver<ResolutionRequest>) {
        let (sender, receiver) = mpsc::channel();
        (Self { bundled, sender }, receiver)
    }
}

impl ImageResolver for ChannelResolver {
    fn resolve_bundled(&self, reference: &str) -> Option<ResourceId> {
        self.bundled.get(reference)
    }

    fn request_image(&self, request: ResolutionRequest) {
        if let Err(e) = self.sender.send(request) {
            log::debug!("Image fetcher has gone away, dropping request for {}", e.0.reference);
        }
    }
}
