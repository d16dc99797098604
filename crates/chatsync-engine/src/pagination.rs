//! Pagination state for the active conversation.
//!
//! This module provides a pure state machine for history paging. No I/O is
//! performed here; the engine fetches pages and reports the outcome back.
//!
//! # Design
//!
//! - Pure synchronous state machine (no async, no I/O, no tracing)
//! - Every request carries the generation captured when it was issued
//! - A response whose generation is no longer current is stale and changes
//!   nothing
//!
//! # States
//!
//! `IDLE -> LOADING_INITIAL -> READY <-> LOADING_MORE`, ending in
//! `EXHAUSTED` once the server reports no further pages. A failed initial
//! load returns to `IDLE` so it can be retried.

use thiserror::Error;

use chatsync_core::domain::{HistoryPage, PageCursor, PaginationState};
use chatsync_core::events::PaginationView;

/// Which load a request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    Initial,
    Older,
}

/// A history fetch to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub participant_id: String,
    pub page: u32,
    pub page_size: u32,
    pub generation: u64,
    pub kind: RequestKind,
}

/// The response belongs to a conversation that is no longer active.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Stale response for generation {request} (current {current})")]
pub struct StaleResponse {
    pub request: u64,
    pub current: u64,
}

/// Page cursor and lifecycle for the active conversation.
///
/// This is a sync type with no internal locking; the engine is responsible
/// for synchronization.
#[derive(Debug, Clone)]
pub struct PaginationController {
    participant_id: Option<String>,
    state: PaginationState,
    cursor: PageCursor,
    generation: u64,
}

impl PaginationController {
    pub const fn new(page_size: u32) -> Self {
        Self {
            participant_id: None,
            state: PaginationState::Idle,
            cursor: PageCursor::initial(page_size),
            generation: 0,
        }
    }

    pub const fn state(&self) -> PaginationState {
        self.state
    }

    pub const fn cursor(&self) -> &PageCursor {
        &self.cursor
    }

    pub const fn generation(&self) -> u64 {
        self.generation
    }

    pub fn participant_id(&self) -> Option<&str> {
        self.participant_id.as_deref()
    }

    pub const fn view(&self) -> PaginationView {
        PaginationView::new(self.state, &self.cursor)
    }

    /// Switch to `participant_id`. Bumps the generation, which makes every
    /// outstanding request stale, and resets the cursor.
    pub fn activate(&mut self, participant_id: impl Into<String>) -> u64 {
        self.generation += 1;
        self.participant_id = Some(participant_id.into());
        self.state = PaginationState::Idle;
        self.cursor = PageCursor::initial(self.cursor.page_size);
        self.generation
    }

    /// No conversation is active anymore.
    pub fn deactivate(&mut self) {
        self.generation += 1;
        self.participant_id = None;
        self.state = PaginationState::Idle;
        self.cursor = PageCursor::initial(self.cursor.page_size);
    }

    /// Start the first-page load. `None` unless a conversation is active
    /// and idle.
    pub fn begin_initial(&mut self) -> Option<PageRequest> {
        if self.state != PaginationState::Idle {
            return None;
        }
        let participant_id = self.participant_id.clone()?;
        self.state = PaginationState::LoadingInitial;
        Some(self.request(participant_id, 1, RequestKind::Initial))
    }

    /// Start loading the next older page. `None` unless ready with more
    /// pages available.
    pub fn begin_older(&mut self) -> Option<PageRequest> {
        if self.state != PaginationState::Ready || !self.cursor.has_more {
            return None;
        }
        let participant_id = self.participant_id.clone()?;
        self.state = PaginationState::LoadingMore;
        let page = self.cursor.page + 1;
        Some(self.request(participant_id, page, RequestKind::Older))
    }

    /// Whether `request` still belongs to the active conversation.
    pub fn is_current(&self, request: &PageRequest) -> bool {
        request.generation == self.generation
            && self.participant_id.as_deref() == Some(request.participant_id.as_str())
    }

    /// Record a successful fetch.
    pub fn complete(
        &mut self,
        request: &PageRequest,
        page: &HistoryPage,
    ) -> Result<PageCursor, StaleResponse> {
        self.check(request)?;
        self.cursor.page = request.page;
        self.cursor.has_more = page.has_more();
        self.cursor.total_known = Some(page.total);
        self.state = if self.cursor.has_more {
            PaginationState::Ready
        } else {
            PaginationState::Exhausted
        };
        Ok(self.cursor)
    }

    /// Record a failed fetch.
    pub fn fail(&mut self, request: &PageRequest) -> Result<(), StaleResponse> {
        self.check(request)?;
        self.state = match request.kind {
            RequestKind::Initial => PaginationState::Idle,
            RequestKind::Older => PaginationState::Ready,
        };
        Ok(())
    }

    fn check(&self, request: &PageRequest) -> Result<(), StaleResponse> {
        if self.is_current(request) {
            Ok(())
        } else {
            Err(StaleResponse {
                request: request.generation,
                current: self.generation,
            })
        }
    }

    fn request(&self, participant_id: String, page: u32, kind: RequestKind) -> PageRequest {
        PageRequest {
            participant_id,
            page,
            page_size: self.cursor.page_size,
            generation: self.generation,
            kind,
        }
    }
}
