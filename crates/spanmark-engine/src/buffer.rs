use std::borrow::Cow;
use std::ops::Range;

use xi_rope::Rope;
use xi_rope::delta::{Builder, Transformer};

use crate::style::StyleRun;

/// The working text of one render plus the runs recorded against it.
///
/// Every edit is compiled into an xi-rope delta and existing runs are carried
/// through that delta, so a run recorded by an earlier rule keeps covering the
/// same characters however later rules grow or shrink the text around it.
/// Run boundaries are exclusive: text inserted exactly at a run's start or end
/// is never absorbed into the run.
#[derive(Debug, Clone)]
pub struct Buffer {
    rope: Rope,
    runs: Vec<StyleRun>,
}

impl Buffer {
    pub fn new(text: &str) -> Self {
        Self {
            rope: Rope::from(text),
            runs: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.rope.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rope.len() == 0
    }

    pub fn text(&self) -> String {
        self.rope.to_string()
    }

    pub fn slice(&self, range: Range<usize>) -> Cow<'_, str> {
        self.rope.slice_to_cow(range)
    }

    /// Byte range of the first literal occurrence of `needle`.
    pub fn find(&self, needle: &str) -> Option<Range<usize>> {
        if needle.is_empty() {
            return None;
        }
        let text = self.text();
        text.find(needle).map(|start| start..start + needle.len())
    }

    /// Replaces `range` with `text`.
    ///
    /// Returns the net number of bytes removed (negative when the buffer grew).
    pub fn replace(&mut self, range: Range<usize>, text: &str) -> isize {
        let removed = range.len() as isize - text.len() as isize;
        let mut builder = Builder::new(self.rope.len());
        if text.is_empty() {
            builder.delete(range);
        } else {
            builder.replace(range, Rope::from(text));
        }
        let delta = builder.build();
        self.rope = delta.apply(&self.rope);

        let mut transformer = Transformer::new(&delta);
        for run in &mut self.runs {
            let start = transformer.transform(run.range.start, true);
            let end = transformer.transform(run.range.end, false);
            run.range = start..end.max(start);
        }
        self.runs.retain(|run| !run.range.is_empty());

        removed
    }

    pub fn delete(&mut self, range: Range<usize>) -> isize {
        self.replace(range, "")
    }

    /// Records a run over the current text. Empty runs are dropped.
    pub fn add_run(&mut self, run: StyleRun) {
        if !run.range.is_empty() && run.range.end <= self.rope.len() {
            self.runs.push(run);
        }
    }

    pub fn runs(&self) -> &[StyleRun] {
        &self.runs
    }
}
