//! # spanmark engine
//!
//! Converts a small Markdown dialect into styled text: a plain string plus
//! additive style runs and a table of click payloads.
//!
//! ```rust
//! use spanmark_engine::Renderer;
//!
//! let doc = Renderer::default().render("# Title\n**Bold** and _italic_\n");
//! assert_eq!(doc.text(), "Title\nBold and italic\n");
//! assert_eq!(doc.runs().len(), 3);
//! ```
//!
//! Remote images are replaced by placeholder tokens during `render` and
//! swapped for the real image later through
//! [`StyledDocument::complete_image_resolution`].

pub mod buffer;
pub mod document;
pub mod matcher;
pub mod placeholder;
pub mod resolver;
pub mod rewriter;
pub mod rules;
pub mod shared;
pub mod style;
pub mod theme;

// Re-export key types for easier usage
pub use document::{
    ClickPayload, InteractionHandler, OBJECT_REPLACEMENT, ResolutionOutcome, SchemeKind,
    StyledDocument,
};
pub use placeholder::Placeholder;
pub use resolver::{BundledImages, ChannelResolver, ImageResolver, NoopResolver, ResolutionRequest};
pub use rewriter::{BULLET, Renderer, RewriteError};
pub use rules::{Rule, SyntaxKind, rule_table};
pub use shared::{SharedDocument, WeakDocument};
pub use style::{
    Attribute, ClickId, Color, ColorParseError, EmbeddedImage, ImageData, ResourceId, StyleRun,
};
pub use theme::Theme;
