use std::fmt;

use serde::Deserialize;

/// Added to negative coordinates so an ascending sort reads top row first,
/// left to right, whatever the sign.
pub const CANONICAL_OFFSET: i32 = 20000;

/// Absolute rectangle in the multi-monitor coordinate space. The primary
/// monitor's top-left corner is (0,0).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub struct Rect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl Rect {
    #[cfg_attr(not(any(windows, test)), allow(dead_code))]
    pub const fn new(left: i32, top: i32, right: i32, bottom: i32) -> Self {
        Self {
            left,
            top,
            right,
            bottom,
        }
    }

    pub fn width(&self) -> u32 {
        self.right.abs_diff(self.left)
    }

    pub fn height(&self) -> u32 {
        self.bottom.abs_diff(self.top)
    }

    pub fn is_empty(&self) -> bool {
        self.width() == 0 || self.height() == 0
    }
}

/// One display as reported by the display enumerator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawMonitor {
    pub rect: Rect,
    pub primary: bool,
}

impl RawMonitor {
    pub const fn new(rect: Rect, primary: bool) -> Self {
        Self { rect, primary }
    }
}

/// Axis along which a monitor's tile is torn for the wrap split.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SplitAxis {
    /// Straddles y=0; the tile is cut along a row.
    Vertical,
    /// Straddles x=0; the tile is cut along a column.
    Horizontal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitorDescriptor {
    /// Position in the resolved layout; 0 is always the primary monitor.
    pub index: usize,
    pub rect: Rect,
    pub primary: bool,
    pub width: u32,
    pub height: u32,
    pub canonical_top: i32,
    pub canonical_left: i32,
    /// Where the tile's top-left pixel lands on the virtual canvas. Filled in
    /// by the layout resolver.
    pub render_offset: (u32, u32),
    pub split: Option<SplitAxis>,
}

impl MonitorDescriptor {
    pub fn new(index: usize, raw: RawMonitor) -> Self {
        let rect = raw.rect;
        let vertical = rect.top < 0 && rect.bottom > 0;
        let horizontal = rect.left < 0 && rect.right > 0;

        // Straddling both axes is unsupported; the row split wins.
        let split = if vertical {
            Some(SplitAxis::Vertical)
        } else if horizontal {
            Some(SplitAxis::Horizontal)
        } else {
            None
        };

        Self {
            index,
            rect,
            primary: raw.primary,
            width: rect.width(),
            height: rect.height(),
            canonical_top: canonical(rect.top),
            canonical_left: canonical(rect.left),
            render_offset: (0, 0),
            split,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn needs_split(&self) -> bool {
        self.split.is_some()
    }

    pub fn straddles_both_axes(&self) -> bool {
        self.rect.top < 0 && self.rect.bottom > 0 && self.rect.left < 0 && self.rect.right > 0
    }

    pub fn reading_order_key(&self) -> (i32, i32) {
        (self.canonical_top, self.canonical_left)
    }
}

impl fmt::Display for MonitorDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} extent=[l={},t={},r={},b={}] size={}x{} primary={} offset=({},{}) split={:?}",
            self.index,
            self.rect.left,
            self.rect.top,
            self.rect.right,
            self.rect.bottom,
            self.width,
            self.height,
            self.primary,
            self.render_offset.0,
            self.render_offset.1,
            self.split
        )
    }
}

fn canonical(coord: i32) -> i32 {
    if coord < 0 {
        CANONICAL_OFFSET + coord
    } else {
        coord
    }
}
