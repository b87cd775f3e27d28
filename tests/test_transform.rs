//! Properties of the view-to-page transform.

use pdf_stamper::geometry::{view_rect_to_page, Rect, ViewTransform};
use proptest::prelude::*;

#[test]
fn test_letter_page_flip() {
    let rect = view_rect_to_page(&Rect::new(50.0, 40.0, 120.0, 30.0), &ViewTransform::IDENTITY, 792.0);
    assert_eq!(rect, Rect::new(50.0, 722.0, 120.0, 30.0));
}

#[test]
fn test_rect_touching_top_edge() {
    let rect = view_rect_to_page(&Rect::new(0.0, 0.0, 612.0, 100.0), &ViewTransform::IDENTITY, 792.0);
    assert_eq!(rect.y, 692.0);
    assert_eq!(rect.far_y(), 792.0);
}

#[test]
fn test_zoomed_and_panned_view() {
    // Placed at 2x zoom with the page scrolled by (30, 60)
    let transform = ViewTransform::new(2.0, 30.0, 60.0);
    let rect = view_rect_to_page(&Rect::new(130.0, 140.0, 240.0, 60.0), &transform, 792.0);
    assert_eq!(rect, Rect::new(50.0, 722.0, 120.0, 30.0));
}

proptest! {
    #[test]
    fn prop_size_survives_flip(
        x in -1000.0f32..1000.0,
        y in -1000.0f32..1000.0,
        w in 0.0f32..1000.0,
        h in 0.0f32..1000.0,
        page_height in 1.0f32..5000.0,
    ) {
        let rect = view_rect_to_page(&Rect::new(x, y, w, h), &ViewTransform::IDENTITY, page_height);
        prop_assert_eq!(rect.x, x);
        prop_assert_eq!(rect.width, w);
        prop_assert_eq!(rect.height, h);
        prop_assert_eq!(rect.y, page_height - (y + h));
    }

    #[test]
    fn prop_transform_is_deterministic(
        x in -500.0f32..500.0,
        y in -500.0f32..500.0,
        w in 0.0f32..500.0,
        h in 0.0f32..500.0,
        scale in 0.1f32..8.0,
        tx in -500.0f32..500.0,
        ty in -500.0f32..500.0,
    ) {
        let view = Rect::new(x, y, w, h);
        let transform = ViewTransform::new(scale, tx, ty);
        let a = view_rect_to_page(&view, &transform, 792.0);
        let b = view_rect_to_page(&view, &transform, 792.0);
        prop_assert_eq!(a.x.to_bits(), b.x.to_bits());
        prop_assert_eq!(a.y.to_bits(), b.y.to_bits());
        prop_assert_eq!(a.width.to_bits(), b.width.to_bits());
        prop_assert_eq!(a.height.to_bits(), b.height.to_bits());
    }

    #[test]
    fn prop_scale_divides_size(
        w in 1.0f32..500.0,
        h in 1.0f32..500.0,
        scale in 0.25f32..4.0,
    ) {
        let rect = view_rect_to_page(&Rect::new(0.0, 0.0, w, h), &ViewTransform::new(scale, 0.0, 0.0), 792.0);
        prop_assert!((rect.width - w / scale).abs() <= 1e-3 * (w / scale));
        prop_assert!((rect.height - h / scale).abs() <= 1e-3 * (h / scale));
    }
}
