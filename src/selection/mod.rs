//! Region selection on the captured frame.
//!
//! The user drags a rectangle over the preview; pointer positions are mapped
//! from display space into video-pixel space before the rectangle is stored.

pub mod coords;
pub mod region;

pub use coords::{DisplayRect, VideoPoint};
pub use region::{RegionSelector, SelectionRect};
