use std::fmt;
use std::ops::Range;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// An ARGB colour, stored the way Android packs colour ints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color(pub u32);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ColorParseError {
    #[error("Colour must start with '#': {0}")]
    MissingHash(String),
    #[error("Colour must be #RRGGBB or #AARRGGBB: {0}")]
    BadLength(String),
    #[error("Invalid hex digits in colour: {0}")]
    BadDigits(String),
}

impl Color {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self(0xFF00_0000 | (r as u32) << 16 | (g as u32) << 8 | b as u32)
    }

    pub fn alpha(self) -> u8 {
        (self.0 >> 24) as u8
    }

    pub fn red(self) -> u8 {
        (self.0 >> 16) as u8
    }

    pub fn green(self) -> u8 {
        (self.0 >> 8) as u8
    }

    pub fn blue(self) -> u8 {
        self.0 as u8
    }

    /// Parses `#RRGGBB` (opaque) or `#AARRGGBB`.
    pub fn parse(s: &str) -> Result<Self, ColorParseError> {
        let hex = s
            .strip_prefix('#')
            .ok_or_else(|| ColorParseError::MissingHash(s.to_string()))?;
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ColorParseError::BadDigits(s.to_string()));
        }
        if hex.len() != 6 && hex.len() != 8 {
            return Err(ColorParseError::BadLength(s.to_string()));
        }
        let value =
            u32::from_str_radix(hex, 16).map_err(|_| ColorParseError::BadDigits(s.to_string()))?;
        match hex.len() {
            6 => Ok(Self(0xFF00_0000 | value)),
            8 => Ok(Self(value)),
            _ => Err(ColorParseError::BadLength(s.to_string())),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.alpha() == 0xFF {
            write!(f, "#{:06X}", self.0 & 0x00FF_FFFF)
        } else {
            write!(f, "#{:08X}", self.0)
        }
    }
}

impl TryFrom<String> for Color {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Color> for String {
    fn from(color: Color) -> Self {
        color.to_string()
    }
}

/// Identifier for an image packaged with the host application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u32);

/// Identifier tying a click run to its entry in the payload table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClickId(pub u64);

impl fmt::Display for ClickId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Raw image bytes handed back by the host once a remote fetch completes.
///
/// The engine never decodes these; it only carries them to the rendering surface.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageData {
    pub bytes: Arc<[u8]>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

impl ImageData {
    pub fn new(bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            bytes: bytes.into(),
            width: None,
            height: None,
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Content carried by an embedded-content marker run.
#[derive(Debug, Clone, PartialEq)]
pub enum EmbeddedImage {
    /// Packaged with the host, resolved synchronously during render.
    Bundled(ResourceId),
    /// Fetched by the host and supplied through a resolution callback.
    Decoded(ImageData),
}

/// One presentational attribute of a [`StyleRun`].
#[derive(Debug, Clone, PartialEq)]
pub enum Attribute {
    Foreground(Color),
    Background(Color),
    Bold,
    Italic,
    /// Only honoured where the rendering surface has a monospace face.
    Monospace,
    RelativeScale(f32),
    /// Background painted across the full line rather than behind glyphs.
    BlockBackground(Color),
    QuoteMarker,
    Click(ClickId),
    Embedded(EmbeddedImage),
}

/// A byte range of the final text plus the attributes to present it with.
///
/// Runs are additive: several runs may cover the same bytes and the surface
/// composes all of them.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleRun {
    pub range: Range<usize>,
    pub attributes: Vec<Attribute>,
}

impl StyleRun {
    pub fn new(range: Range<usize>, attributes: Vec<Attribute>) -> Self {
        Self { range, attributes }
    }

    pub fn is_bold(&self) -> bool {
        self.attributes.contains(&Attribute::Bold)
    }

    pub fn is_italic(&self) -> bool {
        self.attributes.contains(&Attribute::Italic)
    }

    pub fn is_monospace(&self) -> bool {
        self.attributes.contains(&Attribute::Monospace)
    }

    pub fn relative_scale(&self) -> Option<f32> {
        self.attributes.iter().find_map(|a| match a {
            Attribute::RelativeScale(scale) => Some(*scale),
            _ => None,
        })
    }

    pub fn click_id(&self) -> Option<ClickId> {
        self.attributes.iter().find_map(|a| match a {
            Attribute::Click(id) => Some(*id),
            _ => None,
        })
    }

    pub fn embedded(&self) -> Option<&EmbeddedImage> {
        self.attributes.iter().find_map(|a| match a {
            Attribute::Embedded(image) => Some(image),
            _ => None,
        })
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.range.contains(&offset)
    }
}
