//! Square region selection in image coordinates.
//!
//! The selector is a small state machine driven by pointer events that have
//! already been mapped into image space. Every state it can reach keeps its
//! corners inside `[0, width] x [0, height]`, and every `Defined` region is
//! a square.

use crate::coords::{GeometryError, ImagePoint, check_image_size, clamp_point};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Corner {
    NorthWest,
    NorthEast,
    SouthWest,
    SouthEast,
}

impl Corner {
    /// Order in which corners are tested for proximity; the first hit wins.
    pub const ALL: [Corner; 4] = [
        Corner::NorthWest,
        Corner::NorthEast,
        Corner::SouthWest,
        Corner::SouthEast,
    ];

    pub fn opposite(self) -> Self {
        match self {
            Corner::NorthWest => Corner::SouthEast,
            Corner::NorthEast => Corner::SouthWest,
            Corner::SouthWest => Corner::NorthEast,
            Corner::SouthEast => Corner::NorthWest,
        }
    }

    pub fn cursor(self) -> CursorStyle {
        match self {
            Corner::NorthWest | Corner::SouthEast => CursorStyle::NwseResize,
            Corner::NorthEast | Corner::SouthWest => CursorStyle::NeswResize,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CursorStyle {
    Default,
    Crosshair,
    Move,
    NwseResize,
    NeswResize,
}

impl CursorStyle {
    pub fn as_css(self) -> &'static str {
        match self {
            CursorStyle::Default => "default",
            CursorStyle::Crosshair => "crosshair",
            CursorStyle::Move => "move",
            CursorStyle::NwseResize => "nwse-resize",
            CursorStyle::NeswResize => "nesw-resize",
        }
    }
}

/// Two opposite corners of an axis-aligned box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Region {
    pub corner1: ImagePoint,
    pub corner2: ImagePoint,
}

impl Region {
    pub fn new(corner1: ImagePoint, corner2: ImagePoint) -> Self {
        Self { corner1, corner2 }
    }

    pub fn min(&self) -> ImagePoint {
        ImagePoint::new(
            self.corner1.x.min(self.corner2.x),
            self.corner1.y.min(self.corner2.y),
        )
    }

    pub fn max(&self) -> ImagePoint {
        ImagePoint::new(
            self.corner1.x.max(self.corner2.x),
            self.corner1.y.max(self.corner2.y),
        )
    }

    /// Side length, measured along x.
    pub fn side(&self) -> f32 {
        (self.corner1.x - self.corner2.x).abs()
    }

    /// Inclusive containment test.
    pub fn contains(&self, p: ImagePoint) -> bool {
        let (min, max) = (self.min(), self.max());
        p.x >= min.x && p.x <= max.x && p.y >= min.y && p.y <= max.y
    }

    pub fn corner(&self, corner: Corner) -> ImagePoint {
        let (min, max) = (self.min(), self.max());
        match corner {
            Corner::NorthWest => min,
            Corner::NorthEast => ImagePoint::new(max.x, min.y),
            Corner::SouthWest => ImagePoint::new(min.x, max.y),
            Corner::SouthEast => max,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CornerHit {
    pub corner: Corner,
    pub point: ImagePoint,
    pub opposite: ImagePoint,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SelectorState {
    Empty,
    DraggingCorner {
        fixed_corner: ImagePoint,
        start_moved_corner: ImagePoint,
        current_moved_corner: ImagePoint,
        drag_anchor: ImagePoint,
    },
    DraggingRegion {
        corner1: ImagePoint,
        corner2: ImagePoint,
        drag_anchor: ImagePoint,
        current1: ImagePoint,
        current2: ImagePoint,
    },
    Defined(Region),
}

impl SelectorState {
    /// The box as it should be drawn right now, if there is one.
    pub fn current_region(&self) -> Option<Region> {
        match *self {
            SelectorState::Empty => None,
            SelectorState::DraggingCorner {
                fixed_corner,
                current_moved_corner,
                ..
            } => Some(Region::new(fixed_corner, current_moved_corner)),
            SelectorState::DraggingRegion {
                current1, current2, ..
            } => Some(Region::new(current1, current2)),
            SelectorState::Defined(region) => Some(region),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            SelectorState::Empty => "empty",
            SelectorState::DraggingCorner { .. } => "dragging-corner",
            SelectorState::DraggingRegion { .. } => "dragging-region",
            SelectorState::Defined(_) => "defined",
        }
    }
}

#[derive(Clone, Debug)]
pub struct RegionSelector {
    image_width: f32,
    image_height: f32,
    proximity_threshold: f32,
    state: SelectorState,
}

impl RegionSelector {
    pub fn new(
        image_width: u32,
        image_height: u32,
        proximity_threshold: f32,
    ) -> Result<Self, GeometryError> {
        check_image_size(image_width, image_height)?;
        Ok(Self {
            image_width: image_width as f32,
            image_height: image_height as f32,
            proximity_threshold,
            state: SelectorState::Empty,
        })
    }

    pub fn state(&self) -> &SelectorState {
        &self.state
    }

    pub fn proximity_threshold(&self) -> f32 {
        self.proximity_threshold
    }

    /// Called whenever the surface changes, since the threshold depends on scale.
    pub fn set_proximity_threshold(&mut self, threshold: f32) {
        self.proximity_threshold = threshold;
    }

    pub fn is_dragging(&self) -> bool {
        matches!(
            self.state,
            SelectorState::DraggingCorner { .. } | SelectorState::DraggingRegion { .. }
        )
    }

    pub fn defined_region(&self) -> Option<Region> {
        match self.state {
            SelectorState::Defined(region) => Some(region),
            _ => None,
        }
    }

    pub fn reset(&mut self) {
        self.state = SelectorState::Empty;
    }

    pub fn pointer_down(&mut self, p: ImagePoint) {
        match self.state {
            SelectorState::Empty => {
                let start = self.clamp(p);
                self.state = SelectorState::DraggingCorner {
                    fixed_corner: start,
                    start_moved_corner: start,
                    current_moved_corner: start,
                    drag_anchor: start,
                };
            }
            SelectorState::Defined(region) => {
                if let Some(hit) = self.close_corner(&region, p) {
                    self.state = SelectorState::DraggingCorner {
                        fixed_corner: hit.opposite,
                        start_moved_corner: hit.point,
                        current_moved_corner: hit.point,
                        drag_anchor: p,
                    };
                } else if region.contains(p) {
                    self.state = SelectorState::DraggingRegion {
                        corner1: region.corner1,
                        corner2: region.corner2,
                        drag_anchor: p,
                        current1: region.corner1,
                        current2: region.corner2,
                    };
                } else {
                    log::debug!("pointer down outside the selection at ({}, {})", p.x, p.y);
                }
            }
            SelectorState::DraggingCorner { .. } | SelectorState::DraggingRegion { .. } => {
                log::warn!("no transition for pointer down in state {}", self.state.name());
            }
        }
    }

    pub fn pointer_move(&mut self, p: ImagePoint) {
        match self.state {
            SelectorState::DraggingCorner {
                fixed_corner,
                start_moved_corner,
                drag_anchor,
                ..
            } => {
                let moved = self.moved_corner(fixed_corner, start_moved_corner, drag_anchor, p);
                self.state = SelectorState::DraggingCorner {
                    fixed_corner,
                    start_moved_corner,
                    current_moved_corner: moved,
                    drag_anchor,
                };
            }
            SelectorState::DraggingRegion {
                corner1,
                corner2,
                drag_anchor,
                ..
            } => {
                let (current1, current2) = self.translated(corner1, corner2, drag_anchor, p);
                self.state = SelectorState::DraggingRegion {
                    corner1,
                    corner2,
                    drag_anchor,
                    current1,
                    current2,
                };
            }
            SelectorState::Empty | SelectorState::Defined(_) => {}
        }
    }

    pub fn pointer_up(&mut self, p: ImagePoint) {
        match self.state {
            SelectorState::DraggingCorner {
                fixed_corner,
                start_moved_corner,
                drag_anchor,
                ..
            } => {
                let moved = self.moved_corner(fixed_corner, start_moved_corner, drag_anchor, p);
                let size = (fixed_corner.x - moved.x).abs();
                if size < self.proximity_threshold {
                    log::debug!("discarding {size}px selection");
                    self.state = SelectorState::Empty;
                } else {
                    self.state = SelectorState::Defined(Region::new(fixed_corner, moved));
                }
            }
            SelectorState::DraggingRegion {
                corner1,
                corner2,
                drag_anchor,
                ..
            } => {
                let (current1, current2) = self.translated(corner1, corner2, drag_anchor, p);
                self.state = SelectorState::Defined(Region::new(current1, current2));
            }
            SelectorState::Empty | SelectorState::Defined(_) => {
                log::debug!("pointer up ignored in state {}", self.state.name());
            }
        }
    }

    pub fn cancel(&mut self) {
        self.reset();
    }

    /// Hands out the defined region and starts over.
    pub fn commit(&mut self) -> Option<Region> {
        match self.state {
            SelectorState::Defined(region) => {
                self.state = SelectorState::Empty;
                Some(region)
            }
            _ => {
                log::warn!("nothing to commit in state {}", self.state.name());
                None
            }
        }
    }

    /// Shrinks an oversized defined region around its own center.
    pub fn reduce_to_max_size(&mut self, max_size: f32) {
        let SelectorState::Defined(region) = self.state else {
            log::warn!("cannot reduce selection in state {}", self.state.name());
            return;
        };
        let excess = region.side() - max_size;
        if excess <= 0.0 {
            return;
        }
        let d1 = (excess / 2.0).ceil();
        let d2 = (excess / 2.0).floor();
        let (min, max) = (region.min(), region.max());
        self.state = SelectorState::Defined(Region::new(
            ImagePoint::new(min.x + d1, min.y + d1),
            ImagePoint::new(max.x - d2, max.y - d2),
        ));
    }

    /// Largest centered square that fits the image.
    pub fn set_full_image_crop(&mut self) {
        let side = self.image_width.min(self.image_height);
        let offset_x = ((self.image_width - side) / 2.0).floor();
        let offset_y = ((self.image_height - side) / 2.0).floor();
        self.state = SelectorState::Defined(Region::new(
            ImagePoint::new(offset_x, offset_y),
            ImagePoint::new(offset_x + side, offset_y + side),
        ));
    }

    pub fn cursor(&self, p: ImagePoint) -> CursorStyle {
        match self.state {
            SelectorState::Defined(region) => {
                if let Some(hit) = self.close_corner(&region, p) {
                    hit.corner.cursor()
                } else if region.contains(p) {
                    CursorStyle::Move
                } else {
                    CursorStyle::Default
                }
            }
            SelectorState::DraggingRegion { .. } => CursorStyle::Move,
            SelectorState::Empty | SelectorState::DraggingCorner { .. } => CursorStyle::Crosshair,
        }
    }

    pub fn highlighted_corner(&self, p: ImagePoint) -> Option<ImagePoint> {
        match self.state {
            SelectorState::Defined(region) => self.close_corner(&region, p).map(|hit| hit.point),
            SelectorState::DraggingCorner {
                current_moved_corner,
                ..
            } => Some(current_moved_corner),
            SelectorState::Empty | SelectorState::DraggingRegion { .. } => None,
        }
    }

    pub fn close_corner(&self, region: &Region, p: ImagePoint) -> Option<CornerHit> {
        Corner::ALL
            .into_iter()
            .find(|&corner| p.distance(region.corner(corner)) < self.proximity_threshold)
            .map(|corner| CornerHit {
                corner,
                point: region.corner(corner),
                opposite: region.corner(corner.opposite()),
            })
    }

    fn clamp(&self, p: ImagePoint) -> ImagePoint {
        clamp_point(p, self.image_width, self.image_height)
    }

    fn moved_corner(
        &self,
        fixed: ImagePoint,
        start_moved: ImagePoint,
        anchor: ImagePoint,
        p: ImagePoint,
    ) -> ImagePoint {
        let target = ImagePoint::new(
            start_moved.x + (p.x - anchor.x),
            start_moved.y + (p.y - anchor.y),
        );
        self.square_corner(fixed, target)
    }

    /// Opposite corner of the square spanned from `fixed` toward `target`.
    ///
    /// The box grows toward the larger of the two intended dimensions but
    /// never past the image edge in either direction, so the result needs no
    /// second clamp.
    fn square_corner(&self, fixed: ImagePoint, target: ImagePoint) -> ImagePoint {
        let clipped = self.clamp(target);
        let width = non_zero(clipped.x - fixed.x);
        let height = non_zero(clipped.y - fixed.y);
        let max_selection_size = width.abs().max(height.abs());
        let max_box_width = if width > 0.0 {
            self.image_width - fixed.x
        } else {
            fixed.x
        };
        let max_box_height = if height > 0.0 {
            self.image_height - fixed.y
        } else {
            fixed.y
        };
        let box_size = max_selection_size.min(max_box_width.min(max_box_height));
        ImagePoint::new(
            fixed.x + box_size * width.signum(),
            fixed.y + box_size * height.signum(),
        )
    }

    fn translated(
        &self,
        corner1: ImagePoint,
        corner2: ImagePoint,
        anchor: ImagePoint,
        p: ImagePoint,
    ) -> (ImagePoint, ImagePoint) {
        let region = Region::new(corner1, corner2);
        let (min, max) = (region.min(), region.max());
        let dx = (p.x - anchor.x).clamp(-min.x, self.image_width - max.x);
        let dy = (p.y - anchor.y).clamp(-min.y, self.image_height - max.y);
        (
            ImagePoint::new(corner1.x + dx, corner1.y + dy),
            ImagePoint::new(corner2.x + dx, corner2.y + dy),
        )
    }
}

fn non_zero(delta: f32) -> f32 {
    if delta == 0.0 { 1.0 } else { delta }
}
