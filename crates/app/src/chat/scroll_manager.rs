use gpui::{Bounds, Pixels, point};
use gpui_component::VirtualListScrollHandle;

/// Frames over which a bottom jump is re-applied. Row heights are measured
/// lazily, so the first frame after an append can still report a stale extent.
const SCROLL_SETTLE_FRAMES: u8 = 2;

/// Forces the message list to its bottom whenever a jump is requested.
pub struct ScrollManager {
    scroll_handle: VirtualListScrollHandle,
    pending_frames: u8,
}

impl ScrollManager {
    pub fn new() -> Self {
        Self {
            scroll_handle: VirtualListScrollHandle::new(),
            pending_frames: 0,
        }
    }

    pub fn handle(&self) -> &VirtualListScrollHandle {
        &self.scroll_handle
    }

    pub fn bounds(&self) -> Bounds<Pixels> {
        self.scroll_handle.bounds()
    }

    pub fn is_pending(&self) -> bool {
        self.pending_frames > 0
    }

    pub fn request_scroll_to_bottom(&mut self) {
        self.pending_frames = SCROLL_SETTLE_FRAMES;
    }

    /// Jumps to the bottom if a request is pending. Returns true when it scrolled.
    pub fn apply_pending_scroll(&mut self) -> bool {
        if self.pending_frames == 0 {
            return false;
        }

        let max_offset = self.scroll_handle.max_offset().height;
        let current_x = self.scroll_handle.offset().x;
        self.scroll_handle
            .set_offset(point(current_x, bottom_offset(max_offset)));

        self.pending_frames -= 1;
        true
    }
}

impl Default for ScrollManager {
    fn default() -> Self {
        Self::new()
    }
}

/// GPUI scrolls down with negative Y offsets, so the tail sits at `-max_offset`.
fn bottom_offset(max_offset: Pixels) -> Pixels {
    if max_offset > Pixels::ZERO {
        -max_offset
    } else {
        Pixels::ZERO
    }
}
