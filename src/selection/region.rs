//! Drag-gesture state machine for the region of interest.
//!
//! Tracks which state the gesture is in and the rectangle it last produced,
//! always in video-pixel space.

use serde::{Deserialize, Serialize};

use super::coords::VideoPoint;

/// Selected rectangle in video-pixel space.
///
/// `left`/`top` may be negative when the drag started outside the frame; the
/// sampler clamps against the frame bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionRect {
    pub left: i32,
    pub top: i32,
    pub width: u32,
    pub height: u32,
}

impl SelectionRect {
    /// Axis-aligned rectangle spanning two corners, in either drag direction.
    pub fn from_corners(a: VideoPoint, b: VideoPoint) -> Self {
        let left = a.x.min(b.x);
        let top = a.y.min(b.y);
        Self {
            left: left.floor() as i32,
            top: top.floor() as i32,
            width: (b.x - a.x).abs().floor() as u32,
            height: (b.y - a.y).abs().floor() as u32,
        }
    }

    /// True when both dimensions reach `min_px`.
    pub fn is_valid(&self, min_px: u32) -> bool {
        self.width >= min_px && self.height >= min_px
    }
}

/// Gesture state.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DragState {
    Idle,
    Dragging { anchor: VideoPoint },
}

/// Tracks a user-drawn rectangle.
#[derive(Debug)]
pub struct RegionSelector {
    state: DragState,
    rect: Option<SelectionRect>,
}

impl Default for RegionSelector {
    fn default() -> Self {
        Self::new()
    }
}

impl RegionSelector {
    pub fn new() -> Self {
        Self {
            state: DragState::Idle,
            rect: None,
        }
    }

    /// Starts with a preset rectangle, e.g. from config in headless mode.
    pub fn with_selection(rect: SelectionRect) -> Self {
        Self {
            state: DragState::Idle,
            rect: Some(rect),
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> DragState {
        self.state
    }

    pub fn is_dragging(&self) -> bool {
        matches!(self.state, DragState::Dragging { .. })
    }

    /// Records the anchor and enters Dragging.
    pub fn pointer_down(&mut self, point: VideoPoint) {
        self.state = DragState::Dragging { anchor: point };
    }

    /// Updates the rectangle while dragging. Returns false when idle.
    pub fn pointer_move(&mut self, point: VideoPoint) -> bool {
        match self.state {
            DragState::Dragging { anchor } => {
                self.rect = Some(SelectionRect::from_corners(anchor, point));
                true
            }
            DragState::Idle => false,
        }
    }

    /// Ends the gesture. Returns true when a drag was in progress, meaning
    /// the next successful reading starts a new measurement session.
    pub fn pointer_up(&mut self) -> bool {
        let was_dragging = self.is_dragging();
        self.state = DragState::Idle;
        was_dragging
    }

    /// The last rectangle drawn, whatever its size.
    pub fn rect(&self) -> Option<SelectionRect> {
        self.rect
    }

    /// The rectangle, if it is large enough to sample.
    pub fn selection(&self, min_px: u32) -> Option<SelectionRect> {
        self.rect.filter(|r| r.is_valid(min_px))
    }
}
