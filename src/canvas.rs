//! Turns mapper geometry and overlay scenes into egui shapes.
//!
//! Overlay geometry is in display pixels; egui paints in points, so every
//! position goes through the mapper and every length is divided by the
//! pixel ratio.

use eframe::egui::{self, Color32, Pos2, Rect, Shape, Stroke};

use crate::coords::{CoordinateMapper, DisplayPoint, ImagePoint, PointerPoint, Surface};
use crate::metadata::CropArea;
use crate::overlay::{
    DASH_LENGTH, HIGHLIGHT_INNER_RADIUS, HIGHLIGHT_OUTER_RADIUS, OVERSIZE_HALF_WIDTH, OverlayScene,
    Segment,
};

const MASK_COLOR: Color32 = Color32::from_black_alpha(128);
const THIRDS_COLOR: Color32 = Color32::from_black_alpha(128);
const RELATED_COLOR: Color32 = Color32::from_rgb(120, 200, 255);

pub fn to_pos(p: PointerPoint) -> Pos2 {
    egui::pos2(p.x, p.y)
}

pub fn to_pointer(p: Pos2) -> PointerPoint {
    PointerPoint::new(p.x, p.y)
}

/// Surface for a widget rect, with the backing size in display pixels.
pub fn surface_for(rect: Rect, pixels_per_point: f32) -> Surface {
    Surface::new(
        to_pointer(rect.min),
        (rect.width() * pixels_per_point).round().max(0.0) as u32,
        (rect.height() * pixels_per_point).round().max(0.0) as u32,
        pixels_per_point,
    )
}

/// Where the fitted image lands, in points.
pub fn image_rect(mapper: &CoordinateMapper) -> Rect {
    let fit = mapper.fit_geometry();
    let min = mapper.display_to_pointer(DisplayPoint::new(fit.left, fit.top));
    let max = mapper.display_to_pointer(DisplayPoint::new(
        fit.left + fit.scaled_width,
        fit.top + fit.scaled_height,
    ));
    Rect::from_min_max(to_pos(min), to_pos(max))
}

pub fn paint_image(painter: &egui::Painter, mapper: &CoordinateMapper, texture: egui::TextureId) {
    painter.image(
        texture,
        image_rect(mapper),
        Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
        Color32::WHITE,
    );
}

/// Dashed boxes marking crops exported earlier from the same photo.
pub fn related_shapes(mapper: &CoordinateMapper, areas: &[CropArea]) -> Vec<Shape> {
    let ppp = mapper.surface().pixels_per_point;
    let stroke = Stroke::new(1.0 / ppp, RELATED_COLOR);
    let mut shapes = Vec::new();
    for area in areas {
        let min = ImagePoint::new(area.x as f32, area.y as f32);
        let max = ImagePoint::new((area.x + area.width) as f32, (area.y + area.height) as f32);
        let a = to_pos(mapper.image_to_pointer(min));
        let b = to_pos(mapper.image_to_pointer(max));
        let path = [a, egui::pos2(b.x, a.y), b, egui::pos2(a.x, b.y), a];
        shapes.extend(Shape::dashed_line(
            &path,
            stroke,
            DASH_LENGTH / ppp,
            DASH_LENGTH / ppp,
        ));
    }
    shapes
}

pub fn scene_shapes(mapper: &CoordinateMapper, scene: &OverlayScene) -> Vec<Shape> {
    let ppp = mapper.surface().pixels_per_point;
    let pos = |p: DisplayPoint| to_pos(mapper.display_to_pointer(p));
    let line = |seg: &Segment| [pos(seg.from), pos(seg.to)];
    let mut shapes = Vec::new();

    for rect in &scene.mask {
        let rect = Rect::from_min_max(pos(rect.min), pos(rect.max));
        if rect.is_positive() {
            shapes.push(Shape::rect_filled(rect, 0.0, MASK_COLOR));
        }
    }

    let thin = 1.0 / ppp;
    for seg in &scene.thirds {
        shapes.push(Shape::line_segment(line(seg), Stroke::new(thin, THIRDS_COLOR)));
    }

    // White base with black dashes on top.
    for seg in &scene.outline {
        shapes.push(Shape::line_segment(line(seg), Stroke::new(thin, Color32::WHITE)));
    }
    for seg in &scene.outline {
        shapes.extend(Shape::dashed_line(
            &line(seg),
            Stroke::new(thin, Color32::BLACK),
            DASH_LENGTH / ppp,
            DASH_LENGTH / ppp,
        ));
    }

    if let Some(marks) = &scene.oversize_marks {
        let width = (OVERSIZE_HALF_WIDTH * 2.0 + 1.0) / ppp;
        for mark in marks {
            let points = mark.iter().map(|p| pos(*p)).collect();
            shapes.push(Shape::line(points, Stroke::new(width, Color32::YELLOW)));
        }
    }

    if let Some(center) = scene.highlight {
        let center = pos(center);
        shapes.push(Shape::circle_filled(
            center,
            HIGHLIGHT_OUTER_RADIUS / ppp,
            Color32::BLACK,
        ));
        shapes.push(Shape::circle_filled(
            center,
            HIGHLIGHT_INNER_RADIUS / ppp,
            Color32::WHITE,
        ));
    }
    shapes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::overlay;
    use crate::selector::RegionSelector;

    fn mapper(ppp: f32) -> CoordinateMapper {
        let rect = Rect::from_min_size(egui::pos2(10.0, 20.0), egui::vec2(300.0, 250.0));
        CoordinateMapper::new(100, 100, surface_for(rect, ppp), 16.0, 24.0).unwrap()
    }

    #[test]
    fn surface_is_measured_in_display_pixels() {
        let rect = Rect::from_min_size(egui::pos2(10.0, 20.0), egui::vec2(300.0, 250.0));
        let surface = surface_for(rect, 2.0);
        assert_eq!(surface.origin, PointerPoint::new(10.0, 20.0));
        assert_eq!((surface.width, surface.height), (600, 500));
    }

    #[test]
    fn image_rect_is_centered_in_points() {
        let rect = image_rect(&mapper(1.0));
        assert_eq!(rect.min, egui::pos2(110.0, 95.0));
        assert_eq!(rect.size(), egui::vec2(100.0, 100.0));

        // Same layout on a 2x screen: the image is drawn at native size,
        // so it covers half as many points.
        let rect = image_rect(&mapper(2.0));
        assert_eq!(rect.size(), egui::vec2(50.0, 50.0));
        assert_eq!(rect.center(), egui::pos2(160.0, 145.0));
    }

    #[test]
    fn scene_emits_mask_guides_and_highlight() {
        let mapper = mapper(1.0);
        let mut selector = RegionSelector::new(100, 100, mapper.proximity_threshold()).unwrap();
        selector.set_full_image_crop();
        let scene =
            overlay::build_scene(&selector, &mapper, Some(ImagePoint::new(1.0, 1.0)), 50.0).unwrap();
        let shapes = scene_shapes(&mapper, &scene);
        let circles = shapes
            .iter()
            .filter(|s| matches!(s, Shape::Circle(_)))
            .count();
        assert_eq!(circles, 2);
        let masks = shapes.iter().filter(|s| matches!(s, Shape::Rect(_))).count();
        assert_eq!(masks, 4);
        assert!(shapes.iter().any(|s| matches!(s, Shape::Path(_))));
    }

    #[test]
    fn related_areas_become_dashes() {
        let mapper = mapper(1.0);
        let area = CropArea {
            x: 10,
            y: 10,
            width: 50,
            height: 50,
        };
        assert!(related_shapes(&mapper, &[]).is_empty());
        assert!(!related_shapes(&mapper, &[area]).is_empty());
    }
}
