use serde::{Deserialize, Serialize};

/// A window `[start, end)` into a larger list of `total` entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub start: usize,
    pub end: usize,
    pub total: usize,
    pub items: Vec<T>,
}

impl<T> Page<T> {
    pub fn new(start: usize, total: usize, items: Vec<T>) -> Self {
        Self {
            start,
            end: start + items.len(),
            total,
            items,
        }
    }

    pub fn empty() -> Self {
        Self::new(0, 0, Vec::new())
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Start index of the following page, if any.
    pub fn next_start(&self, count: usize) -> Option<usize> {
        (self.end < self.total).then_some(self.start + count)
    }

    /// Start index of the preceding page, if any.
    pub fn prev_start(&self, count: usize) -> Option<usize> {
        (self.start > 0).then(|| self.start.saturating_sub(count))
    }
}
