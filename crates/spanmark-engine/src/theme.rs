use serde::{Deserialize, Serialize};

use crate::style::Color;

/// Colours the rewriter attaches to style runs.
///
/// Every field has a default so a partial `[theme]` table in the config file
/// only overrides what it names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Theme {
    /// Heading foreground.
    pub text: Color,
    pub link: Color,
    /// Behind inline code and fenced code blocks.
    pub code_background: Color,
    /// Behind unordered list lines.
    pub list_background: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            text: Color::rgb(0x00, 0x00, 0x00),
            link: Color::rgb(0xFF, 0x00, 0xCC),
            code_background: Color::rgb(0xDE, 0xDE, 0xDE),
            list_background: Color::rgb(0xF0, 0xF0, 0xF0),
        }
    }
}
