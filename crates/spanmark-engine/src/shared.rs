use std::sync::{Arc, Mutex, MutexGuard, Weak};

use crate::document::{ResolutionOutcome, StyledDocument};
use crate::style::ImageData;

type Slot = Mutex<Option<StyledDocument>>;

/// A rendered document shared between the UI thread and image fetchers.
///
/// Resolutions against one document run one at a time under the lock; their
/// relative order does not matter because each one searches for its own token.
/// Once the document is retired or dropped, late resolutions are no-ops.
#[derive(Debug, Clone)]
pub struct SharedDocument {
    inner: Arc<Slot>,
}

/// Handle for fetch workers that must not keep a discarded document alive.
#[derive(Debug, Clone)]
pub struct WeakDocument {
    inner: Weak<Slot>,
}

impl SharedDocument {
    pub fn new(doc: StyledDocument) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(doc))),
        }
    }

    /// A handle with nothing rendered yet.
    pub fn empty() -> Self {
        Self {
            inner: Arc::new(Mutex::new(None)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<StyledDocument>> {
        // Recover from poisoned mutex (another thread panicked while holding lock)
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn complete_image_resolution(
        &self,
        token: &str,
        image: Option<ImageData>,
    ) -> ResolutionOutcome {
        resolve_in(&self.inner, token, image)
    }

    /// Runs `f` against the document, or returns `None` once it is retired.
    pub fn with<R>(&self, f: impl FnOnce(&StyledDocument) -> R) -> Option<R> {
        self.lock().as_ref().map(f)
    }

    /// Swaps in a freshly rendered document, returning the previous one.
    pub fn replace(&self, doc: StyledDocument) -> Option<StyledDocument> {
        self.lock().replace(doc)
    }

    /// Discards the document; outstanding resolutions become no-ops.
    pub fn retire(&self) -> Option<StyledDocument> {
        self.lock().take()
    }

    pub fn downgrade(&self) -> WeakDocument {
        WeakDocument {
            inner: Arc::downgrade(&self.inner),
        }
    }
}

impl WeakDocument {
    pub fn complete_image_resolution(
        &self,
        token: &str,
        image: Option<ImageData>,
    ) -> ResolutionOutcome {
        match self.inner.upgrade() {
            Some(slot) => resolve_in(&slot, token, image),
            None => ResolutionOutcome::Stale,
        }
    }
}

fn resolve_in(slot: &Slot, token: &str, image: Option<ImageData>) -> ResolutionOutcome {
    let mut guard = slot.lock().unwrap_or_else(|e| e.into_inner());
    match guard.as_mut() {
        Some(doc) => doc.complete_image_resolution(token, image),
        None => ResolutionOutcome::Stale,
    }
}
