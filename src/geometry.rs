// Letterbox/pillarbox-aware geometry. Pure functions of (box size, native
// video size); both decoration controllers map authored coordinates through
// here, and the session re-runs it after resize and fullscreen transitions.

use crate::types::{ContentRect, CoordBasis, PixelRect, PointConfig, RenderedPoint, VideoSize};

/// Nominal authoring canvas for legacy pixel coordinates.
pub const LEGACY_CANVAS_WIDTH: f64 = 800.0;
pub const LEGACY_CANVAS_HEIGHT: f64 = 600.0;

/// Minimum gap kept between a tooltip and its anchor or the container edge.
pub const TOOLTIP_PADDING: f64 = 8.0;

/// Compute the sub-rectangle of the player box actually occupied by video
/// pixels. Falls back to the full box while native dimensions are unknown;
/// the session recomputes once metadata arrives.
pub fn content_rect(native: Option<VideoSize>, box_width: f64, box_height: f64) -> ContentRect {
    let Some(video) = native else {
        return ContentRect {
            left: 0.0,
            top: 0.0,
            width: box_width,
            height: box_height,
        };
    };

    if box_height <= 0.0 {
        return ContentRect {
            left: 0.0,
            top: 0.0,
            width: box_width,
            height: box_height,
        };
    }

    let box_aspect = box_width / box_height;
    let video_aspect = video.aspect();

    if box_aspect > video_aspect {
        // Pillarbox: bars left and right.
        let width = box_height * video_aspect;
        ContentRect {
            left: (box_width - width) / 2.0,
            top: 0.0,
            width,
            height: box_height,
        }
    } else {
        // Letterbox: bars above and below.
        let height = box_width / video_aspect;
        ContentRect {
            left: 0.0,
            top: (box_height - height) / 2.0,
            width: box_width,
            height,
        }
    }
}

/// Map one authored point onto the content rect. Percentage coordinates are
/// fractions of the rect; legacy coordinates are pixels on the 800x600
/// authoring canvas, scaled onto the rect. The diameter scales with the
/// horizontal dimension in both bases.
pub fn map_point(point: &PointConfig, rect: &ContentRect) -> RenderedPoint {
    let (x, y, diameter) = match point.basis {
        CoordBasis::Percent => (
            rect.left + point.x / 100.0 * rect.width,
            rect.top + point.y / 100.0 * rect.height,
            point.diameter / 100.0 * rect.width,
        ),
        CoordBasis::LegacyCanvas => (
            rect.left + point.x / LEGACY_CANVAS_WIDTH * rect.width,
            rect.top + point.y / LEGACY_CANVAS_HEIGHT * rect.height,
            point.diameter / LEGACY_CANVAS_WIDTH * rect.width,
        ),
    };

    RenderedPoint {
        point_id: point.id.clone(),
        x,
        y,
        diameter,
        link: point.link.clone(),
    }
}

/// Map a whole layer's points at once.
pub fn map_points(points: &[PointConfig], rect: &ContentRect) -> Vec<RenderedPoint> {
    points.iter().map(|p| map_point(p, rect)).collect()
}

/// Vertical side a tooltip is placed on relative to its anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TooltipSide {
    Above,
    Below,
}

/// Resolved tooltip position. `arrow` is false when the box had to be clamped
/// to a container edge and the pointer arrow would no longer line up.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TooltipPlacement {
    pub x: f64,
    pub y: f64,
    pub side: TooltipSide,
    pub arrow: bool,
}

/// Place a tooltip of measured size next to an anchor box. Prefers above when
/// there is room for the tooltip plus padding, then below, then whichever
/// side has more space. Horizontally centered on the anchor unless that runs
/// past a container edge, in which case the box is clamped and the arrow
/// suppressed.
pub fn place_tooltip(
    anchor: PixelRect,
    tip_width: f64,
    tip_height: f64,
    container_width: f64,
    container_height: f64,
) -> TooltipPlacement {
    let space_above = anchor.top;
    let space_below = container_height - (anchor.top + anchor.height);
    let needed = tip_height + TOOLTIP_PADDING;

    let side = if space_above >= needed {
        TooltipSide::Above
    } else if space_below >= needed {
        TooltipSide::Below
    } else if space_above >= space_below {
        TooltipSide::Above
    } else {
        TooltipSide::Below
    };

    let y = match side {
        TooltipSide::Above => anchor.top - tip_height - TOOLTIP_PADDING,
        TooltipSide::Below => anchor.top + anchor.height + TOOLTIP_PADDING,
    };

    let centered = anchor.left + anchor.width / 2.0 - tip_width / 2.0;
    let (x, arrow) = if centered < 0.0 {
        (0.0, false)
    } else if centered + tip_width > container_width {
        ((container_width - tip_width).max(0.0), false)
    } else {
        (centered, true)
    };

    TooltipPlacement { x, y, side, arrow }
}
