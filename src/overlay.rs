//! Overlay geometry in display pixels.
//!
//! Everything here is re-derived on each frame from the selector and the
//! mapper; nothing is cached between frames.

use crate::coords::{CoordinateMapper, DisplayPoint, ImagePoint, PointerPoint};
use crate::selector::RegionSelector;

pub const HIGHLIGHT_OUTER_RADIUS: f32 = 6.0;
pub const HIGHLIGHT_INNER_RADIUS: f32 = 4.0;
pub const DASH_LENGTH: f32 = 5.0;
pub const OVERSIZE_HALF_WIDTH: f32 = 2.0;
pub const OVERSIZE_ARM: f32 = 20.0;

pub const BUTTON_BAR_WIDTH: f32 = 200.0;
pub const BUTTON_BAR_HEIGHT: f32 = 48.0;
pub const BUTTON_BAR_PADDING: f32 = 12.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DisplayRect {
    pub min: DisplayPoint,
    pub max: DisplayPoint,
}

impl DisplayRect {
    fn from_coords(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            min: DisplayPoint::new(x0, y0),
            max: DisplayPoint::new(x1, y1),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    pub from: DisplayPoint,
    pub to: DisplayPoint,
}

impl Segment {
    fn new(x0: f32, y0: f32, x1: f32, y1: f32) -> Self {
        Self {
            from: DisplayPoint::new(x0, y0),
            to: DisplayPoint::new(x1, y1),
        }
    }
}

/// Shapes to paint above the image for the current selection.
#[derive(Clone, Debug, PartialEq)]
pub struct OverlayScene {
    /// Top, left, right, bottom.
    pub mask: [DisplayRect; 4],
    pub thirds: [Segment; 4],
    pub outline: [Segment; 4],
    /// Corner accents shown when the box is larger than the export size.
    pub oversize_marks: Option<[[DisplayPoint; 3]; 4]>,
    pub highlight: Option<DisplayPoint>,
}

/// Derive the overlay for the selector's current box, if it has one.
pub fn build_scene(
    selector: &RegionSelector,
    mapper: &CoordinateMapper,
    hover: Option<ImagePoint>,
    max_export_size: f32,
) -> Option<OverlayScene> {
    let region = selector.state().current_region()?;
    let c1 = mapper.image_to_display(region.corner1);
    let c2 = mapper.image_to_display(region.corner2);
    let surface = mapper.surface();
    let oversize_marks = (region.side() > max_export_size).then(|| oversize_marks(c1, c2));
    let highlight = hover
        .and_then(|p| selector.highlighted_corner(p))
        .map(|corner| mapper.image_to_display(corner));
    Some(OverlayScene {
        mask: mask_rects(c1, c2, surface.width as f32, surface.height as f32),
        thirds: thirds(c1, c2),
        outline: dashed_box(c1, c2),
        oversize_marks,
        highlight,
    })
}

/// The four rectangles of the surface outside the box.
pub fn mask_rects(c1: DisplayPoint, c2: DisplayPoint, width: f32, height: f32) -> [DisplayRect; 4] {
    let x_min = c1.x.min(c2.x).round();
    let x_max = c1.x.max(c2.x).round();
    let y_min = c1.y.min(c2.y).round();
    let y_max = c1.y.max(c2.y).round();
    [
        DisplayRect::from_coords(0.0, 0.0, width, y_min),
        DisplayRect::from_coords(0.0, y_min, x_min, y_max),
        DisplayRect::from_coords(x_max, y_min, width, y_max),
        DisplayRect::from_coords(0.0, y_max, width, height),
    ]
}

/// Rule-of-thirds guides: two vertical, then two horizontal lines.
pub fn thirds(c1: DisplayPoint, c2: DisplayPoint) -> [Segment; 4] {
    let x_min = c1.x.min(c2.x).round();
    let y_min = c1.y.min(c2.y).round();
    let width = (c1.x - c2.x).abs();
    let height = (c1.y - c2.y).abs();
    let x0 = (x_min + width / 3.0).round();
    let x1 = (x_min + width * 2.0 / 3.0).round();
    let y0 = (y_min + height / 3.0).round();
    let y1 = (y_min + height * 2.0 / 3.0).round();
    [
        Segment::new(x0, y_min, x0, y_min + height),
        Segment::new(x1, y_min, x1, y_min + height),
        Segment::new(x_min, y0, x_min + width, y0),
        Segment::new(x_min, y1, x_min + width, y1),
    ]
}

/// Box edges drawn from both corners toward the other two.
pub fn dashed_box(c1: DisplayPoint, c2: DisplayPoint) -> [Segment; 4] {
    [
        Segment::new(c1.x, c1.y, c2.x, c1.y),
        Segment::new(c1.x, c1.y, c1.x, c2.y),
        Segment::new(c2.x, c2.y, c1.x, c2.y),
        Segment::new(c2.x, c2.y, c2.x, c1.y),
    ]
}

/// L-shaped accents just outside each corner of the box.
pub fn oversize_marks(c1: DisplayPoint, c2: DisplayPoint) -> [[DisplayPoint; 3]; 4] {
    let x_min = c1.x.min(c2.x) - OVERSIZE_HALF_WIDTH;
    let x_max = c1.x.max(c2.x) + OVERSIZE_HALF_WIDTH;
    let y_min = c1.y.min(c2.y) - OVERSIZE_HALF_WIDTH;
    let y_max = c1.y.max(c2.y) + OVERSIZE_HALF_WIDTH;
    let p = DisplayPoint::new;
    [
        [p(x_min, y_min + OVERSIZE_ARM), p(x_min, y_min), p(x_min + OVERSIZE_ARM, y_min)],
        [p(x_max - OVERSIZE_ARM, y_min), p(x_max, y_min), p(x_max, y_min + OVERSIZE_ARM)],
        [p(x_min, y_max - OVERSIZE_ARM), p(x_min, y_max), p(x_min + OVERSIZE_ARM, y_max)],
        [p(x_max - OVERSIZE_ARM, y_max), p(x_max, y_max), p(x_max, y_max - OVERSIZE_ARM)],
    ]
}

/// Top-left corner of the floating button bar for a selection.
///
/// The bar goes below the box when it fits above the surface bottom, else
/// above the box when it fits below the surface top, else inside the box's
/// bottom edge.
pub fn button_bar_origin(
    selection_min: PointerPoint,
    selection_max: PointerPoint,
    surface_top: f32,
    surface_bottom: f32,
) -> PointerPoint {
    let reserved = BUTTON_BAR_HEIGHT + BUTTON_BAR_PADDING;
    let top = selection_min.y;
    let bottom = selection_max.y;
    let y = if bottom + reserved < surface_bottom {
        bottom + BUTTON_BAR_PADDING
    } else if top - reserved > surface_top {
        top - reserved
    } else {
        bottom - reserved
    };
    let x = (selection_min.x + selection_max.x) / 2.0 - BUTTON_BAR_WIDTH / 2.0;
    PointerPoint::new(x, y)
}
