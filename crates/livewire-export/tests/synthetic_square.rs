//! Integration test: trace a synthetic image end to end and export the
//! result as SVG and PNG.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use livewire_core::{
    FreezeOutcome, Instant, LiveWireSession, Pixel, SessionConfig, build_cost_matrix,
};

/// A bright rectangle on a dark background, as PNG bytes.
fn square_png() -> Vec<u8> {
    let img = image::RgbImage::from_fn(64, 48, |x, y| {
        if (16..48).contains(&x) && (12..36).contains(&y) {
            image::Rgb([220, 180, 40])
        } else {
            image::Rgb([25, 30, 60])
        }
    });
    let mut buf = Vec::new();
    image::ImageEncoder::write_image(
        image::codecs::png::PngEncoder::new(&mut buf),
        img.as_raw(),
        img.width(),
        img.height(),
        image::ExtendedColorType::Rgb8,
    )
    .unwrap();
    buf
}

#[test]
fn synthetic_square_trace_to_svg_and_png() {
    let config = SessionConfig::default();
    let (image, matrix) =
        build_cost_matrix(&square_png(), config.weights).expect("cost matrix should build");
    let mut session = LiveWireSession::new(std::sync::Arc::new(matrix), config.clone()).unwrap();

    // Loose clicks near the corners; the cursor snaps onto the edge.
    let t0 = Instant::now();
    assert_eq!(
        session.on_seed_click(Pixel::new(16, 12)),
        FreezeOutcome::SeedPlaced
    );
    for (i, corner) in [(46, 13), (47, 34), (17, 35)].into_iter().enumerate() {
        let now = t0 + config.settle_interval * u32::try_from(i).unwrap();
        let preview = session.on_cursor_move(Pixel::new(corner.0, corner.1), now);
        assert!(!preview.is_empty());
        let cursor = session.cursor().unwrap();
        assert_eq!(session.on_seed_click(cursor), FreezeOutcome::Appended);
    }
    assert_eq!(
        session.on_seed_click(Pixel::new(18, 14)),
        FreezeOutcome::Closed
    );

    // Every segment is an 8-connected chain.
    for segment in session.frozen_segments() {
        assert!(segment.is_connected());
    }

    let svg = livewire_export::to_svg(
        session.boundary(),
        None,
        session.matrix().dimensions(),
        &livewire_export::SvgMetadata {
            title: Some("synthetic-square"),
            description: None,
            config_json: Some(&serde_json::to_string(&config).unwrap()),
        },
    );
    assert!(svg.contains("<svg"));
    assert!(svg.contains("<path"));
    assert!(svg.contains("settle_interval"));

    let mask = session.export_mask().unwrap();
    assert!(mask.contains(Pixel::new(32, 24)));
    assert!(!mask.contains(Pixel::new(4, 4)));
    let mask_png = livewire_export::mask_to_png(&mask).unwrap();
    let decoded = image::load_from_memory(&mask_png).unwrap().to_luma8();
    assert_eq!(decoded.dimensions(), (64, 48));

    let cutout = session.cutout(&image).unwrap();
    let bounds = mask.bounds().unwrap();
    assert!(cutout.width() > bounds.width && cutout.width() <= bounds.width + 10);
    let cutout_png = livewire_export::rgba_to_png(&cutout).unwrap();
    let decoded = image::load_from_memory(&cutout_png).unwrap().to_rgba8();
    assert_eq!(decoded.get_pixel(0, 0).0[3], 0);
}
