use serde::Serialize;

/// Position in the remote action feed.
///
/// `exhausted` is set once a page yields no unseen ids and never clears;
/// only a fresh cursor (accumulator reset) starts over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaginationCursor {
    offset: u64,
    page_size: u64,
    exhausted: bool,
}

impl PaginationCursor {
    /// A zero page size is bumped to 1.
    pub fn new(page_size: u64) -> Self {
        Self {
            offset: 0,
            page_size: page_size.max(1),
            exhausted: false,
        }
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn page_size(&self) -> u64 {
        self.page_size
    }

    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    pub(crate) fn mark_exhausted(&mut self) {
        self.exhausted = true;
    }

    pub(crate) fn step_forward(&mut self) -> u64 {
        self.offset = self.offset.saturating_add(self.page_size);
        self.offset
    }

    /// Undo a step whose page never arrived, so the next advance retries it.
    pub(crate) fn step_back(&mut self) {
        self.offset = self.offset.saturating_sub(self.page_size);
    }
}
