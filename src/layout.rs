//! Turns raw monitor rectangles into one virtual canvas.
//!
//! Monitors at negative offsets wrap around the canvas like a cylinder: a
//! monitor left of the primary lands at `canvas_width + left`, so the tiled
//! desktop shows its content at the right place. Monitors straddling x=0 or
//! y=0 get a split axis and are torn in two when placed.

use crate::{
    error::LayoutError,
    monitor::{MonitorDescriptor, RawMonitor},
    platform::TilingMode,
    warn, DEBUG_NAME,
};

/// Non-primary monitors grouped by their position relative to the primary,
/// each group in reading order. A diagonal monitor sits in two groups.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Neighbours {
    pub left: Vec<usize>,
    pub right: Vec<usize>,
    pub top: Vec<usize>,
    pub bottom: Vec<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualDesktop {
    monitors: Vec<MonitorDescriptor>,
    width: u32,
    height: u32,
    neighbours: Neighbours,
}

impl VirtualDesktop {
    pub fn monitors(&self) -> &[MonitorDescriptor] {
        &self.monitors
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn neighbours(&self) -> &Neighbours {
        &self.neighbours
    }

    pub fn primary(&self) -> &MonitorDescriptor {
        // resolve() puts the primary first and rejects layouts without one
        &self.monitors[0]
    }

    pub fn tiling_mode(&self) -> TilingMode {
        if self.monitors.len() > 1 {
            TilingMode::Tiled
        } else {
            TilingMode::Single
        }
    }
}

/// Builds the virtual desktop. The primary monitor becomes index 0, the rest
/// keep the enumerator's order.
pub fn resolve(raw: &[RawMonitor]) -> Result<VirtualDesktop, LayoutError> {
    if raw.is_empty() {
        return Err(LayoutError::NoMonitors);
    }

    match raw.iter().filter(|m| m.primary).count() {
        0 => return Err(LayoutError::NoPrimary(raw.len())),
        1 => {}
        n => return Err(LayoutError::MultiplePrimaries(n)),
    }

    if let Some(index) = raw.iter().position(|m| m.rect.is_empty()) {
        return Err(LayoutError::EmptyMonitor { index });
    }

    let mut ordered: Vec<RawMonitor> = raw.iter().filter(|m| m.primary).copied().collect();
    ordered.extend(raw.iter().filter(|m| !m.primary).copied());

    let primary_rect = ordered[0].rect;
    if primary_rect.left != 0 || primary_rect.top != 0 {
        return Err(LayoutError::PrimaryNotAtOrigin {
            left: primary_rect.left,
            top: primary_rect.top,
        });
    }

    let mut monitors: Vec<MonitorDescriptor> = ordered
        .into_iter()
        .enumerate()
        .map(|(index, m)| MonitorDescriptor::new(index, m))
        .collect();

    let neighbours = group_neighbours(&monitors);
    let width = extent(monitors.iter().map(|m| (m.rect.left, m.rect.right)));
    let height = extent(monitors.iter().map(|m| (m.rect.top, m.rect.bottom)));

    for monitor in &mut monitors {
        monitor.render_offset = (
            wrap_offset(monitor.rect.left, width),
            wrap_offset(monitor.rect.top, height),
        );

        if monitor.straddles_both_axes() {
            warn!(
                "[{}][LAYOUT] Monitor {} straddles both axes; only the row split is applied",
                DEBUG_NAME,
                monitor.index
            );
        }
    }

    Ok(VirtualDesktop {
        monitors,
        width,
        height,
        neighbours,
    })
}

fn group_neighbours(monitors: &[MonitorDescriptor]) -> Neighbours {
    let primary = &monitors[0].rect;
    let others = || monitors.iter().skip(1);

    let mut groups = Neighbours {
        left: others().filter(|m| m.rect.left < 0).map(|m| m.index).collect(),
        right: others().filter(|m| m.rect.left >= primary.right).map(|m| m.index).collect(),
        top: others().filter(|m| m.rect.top < 0).map(|m| m.index).collect(),
        bottom: others().filter(|m| m.rect.top >= primary.bottom).map(|m| m.index).collect(),
    };

    for group in [
        &mut groups.left,
        &mut groups.right,
        &mut groups.top,
        &mut groups.bottom,
    ] {
        group.sort_by_key(|&i| monitors[i].reading_order_key());
    }

    groups
}

/// Canvas length on one axis: the furthest far edge plus whatever hangs off
/// into negative space.
fn extent(spans: impl Iterator<Item = (i32, i32)>) -> u32 {
    let (min_near, max_far) = spans.fold((0i64, 0i64), |(lo, hi), (near, far)| {
        (lo.min(near as i64), hi.max(far as i64))
    });
    let extra = (-min_near).max(0);
    u32::try_from(max_far + extra).unwrap_or(u32::MAX)
}

fn wrap_offset(near: i32, canvas: u32) -> u32 {
    if near < 0 {
        (canvas as i64 + near as i64).max(0) as u32
    } else {
        near as u32
    }
}
