use std::sync::atomic::{AtomicU64, Ordering};

use uuid::Uuid;

use crate::style::ClickId;

const OPEN: char = '\u{27E6}';
const CLOSE: char = '\u{27E7}';

/// Stand-in for an image whose bytes are fetched after `render` returns.
///
/// Only the token is meaningful at resolution time; it is looked up by text
/// search because offsets recorded during render no longer hold by then.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placeholder {
    pub token: String,
    pub click_id: ClickId,
    /// The image reference exactly as written in the source.
    pub reference: String,
}

/// Generates a token no other render or literal text will contain: a
/// process-wide counter plus a random UUID.
pub fn next_token() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("{OPEN}img:{n}:{}{CLOSE}", Uuid::new_v4().simple())
}

/// True if `text` has the shape produced by [`next_token`].
pub fn is_token(text: &str) -> bool {
    text.strip_prefix(OPEN)
        .and_then(|rest| rest.strip_suffix(CLOSE))
        .and_then(|inner| inner.strip_prefix("img:"))
        .and_then(|inner| inner.split_once(':'))
        .is_some_and(|(n, id)| {
            n.parse::<u64>().is_ok() && id.len() == 32 && id.chars().all(|c| c.is_ascii_hexdigit())
        })
}
