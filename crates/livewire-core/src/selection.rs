//! Closed-boundary rasterization and alpha-masked cut-outs.
//!
//! The outline of a closed [`Boundary`] is filled as a polygon with
//! vertices at integer pixel coordinates. `tiny-skia` samples pixel
//! centres, so with anti-aliasing off a pixel is selected exactly when
//! its centre `(x + 0.5, y + 0.5)` lies inside the polygon under the
//! non-zero winding rule.

use image::{DynamicImage, GrayImage, Luma, Rgba, RgbaImage, imageops};
use tiny_skia::{FillRule, Paint, PathBuilder, Pixmap, Transform};

use crate::types::{Boundary, BoundingBox, Dimensions, Pixel};

/// Mask value of a selected pixel.
pub const SELECTED: u8 = 255;

/// Binary selection mask with the bounding box of its selected pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionMask {
    mask: GrayImage,
    bounds: Option<BoundingBox>,
}

impl SelectionMask {
    /// A mask selecting nothing.
    #[must_use]
    pub fn empty(dimensions: Dimensions) -> Self {
        Self {
            mask: GrayImage::new(dimensions.width, dimensions.height),
            bounds: None,
        }
    }

    /// Wrap a mask image; any non-zero value counts as selected.
    #[must_use]
    pub fn from_image(mut mask: GrayImage) -> Self {
        for pixel in mask.pixels_mut() {
            if pixel.0[0] != 0 {
                pixel.0[0] = SELECTED;
            }
        }
        let bounds = selected_bounds(&mask);
        Self { mask, bounds }
    }

    /// The mask raster: 255 inside, 0 outside.
    #[must_use]
    pub const fn image(&self) -> &GrayImage {
        &self.mask
    }

    /// Bounding box of the selected pixels, `None` when nothing is
    /// selected.
    #[must_use]
    pub const fn bounds(&self) -> Option<BoundingBox> {
        self.bounds
    }

    /// Whether `pixel` is selected. Pixels outside the mask are not.
    #[must_use]
    pub fn contains(&self, pixel: Pixel) -> bool {
        match (u32::try_from(pixel.x), u32::try_from(pixel.y)) {
            (Ok(x), Ok(y)) => self
                .mask
                .get_pixel_checked(x, y)
                .is_some_and(|p| p.0[0] == SELECTED),
            _ => false,
        }
    }

    /// Number of selected pixels.
    #[must_use]
    pub fn selected_count(&self) -> usize {
        self.mask.pixels().filter(|p| p.0[0] == SELECTED).count()
    }
}

/// Fill the outline of `boundary` into a mask of the given size.
///
/// All segment pixels are joined into one polygon, closed back to its
/// first vertex. Fewer than three distinct vertices select nothing.
#[must_use = "returns the selection mask"]
#[allow(clippy::cast_precision_loss)]
pub fn rasterize_boundary(boundary: &Boundary, dimensions: Dimensions) -> SelectionMask {
    let outline = boundary.outline();
    let mut distinct = outline.clone();
    distinct.sort_unstable();
    distinct.dedup();
    if distinct.len() < 3 || dimensions.is_empty() {
        return SelectionMask::empty(dimensions);
    }

    let mut pb = PathBuilder::new();
    if let Some(first) = outline.first() {
        pb.move_to(first.x as f32, first.y as f32);
        for p in &outline[1..] {
            pb.line_to(p.x as f32, p.y as f32);
        }
        pb.close();
    }
    let Some(path) = pb.finish() else {
        return SelectionMask::empty(dimensions);
    };

    let Some(mut pixmap) = Pixmap::new(dimensions.width, dimensions.height) else {
        return SelectionMask::empty(dimensions);
    };
    let mut paint = Paint::default();
    paint.set_color_rgba8(255, 255, 255, 255);
    paint.anti_alias = false;
    pixmap.fill_path(&path, &paint, FillRule::Winding, Transform::identity(), None);

    let data = pixmap.data();
    let mask = GrayImage::from_fn(dimensions.width, dimensions.height, |x, y| {
        let offset = (y as usize * dimensions.width as usize + x as usize) * 4;
        Luma([if data[offset + 3] > 0 { SELECTED } else { 0 }])
    });
    let bounds = selected_bounds(&mask);
    log::debug!(
        "rasterized {}-vertex outline into {dimensions} mask, bounds {bounds:?}",
        outline.len()
    );
    SelectionMask { mask, bounds }
}

/// Copy the selected pixels of `image` onto a transparent background.
///
/// Selected pixels keep their colour with alpha 255. The result is
/// cropped to the mask bounds grown by `padding` and clipped to the
/// image; an empty selection returns the whole image, fully transparent.
#[must_use = "returns the cut-out image"]
pub fn cutout(image: &DynamicImage, mask: &SelectionMask, padding: u32) -> RgbaImage {
    let rgba = image.to_rgba8();
    let dims = Dimensions::new(rgba.width(), rgba.height());
    let masked = RgbaImage::from_fn(dims.width, dims.height, |x, y| {
        let selected = mask
            .mask
            .get_pixel_checked(x, y)
            .is_some_and(|p| p.0[0] == SELECTED);
        if selected {
            let [r, g, b, _] = rgba.get_pixel(x, y).0;
            Rgba([r, g, b, 255])
        } else {
            Rgba([0, 0, 0, 0])
        }
    });

    let Some(bounds) = mask.bounds else {
        return masked;
    };
    let crop = bounds.padded(padding, dims);
    imageops::crop_imm(&masked, crop.x, crop.y, crop.width, crop.height).to_image()
}

fn selected_bounds(mask: &GrayImage) -> Option<BoundingBox> {
    let mut extent: Option<(u32, u32, u32, u32)> = None;
    for (x, y, pixel) in mask.enumerate_pixels() {
        if pixel.0[0] != SELECTED {
            continue;
        }
        extent = Some(match extent {
            None => (x, y, x, y),
            Some((x0, y0, x1, y1)) => (x0.min(x), y0.min(y), x1.max(x), y1.max(y)),
        });
    }
    extent.map(|(x0, y0, x1, y1)| BoundingBox {
        x: x0,
        y: y0,
        width: x1 - x0 + 1,
        height: y1 - y0 + 1,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::types::Path;

    fn square_boundary() -> Boundary {
        let mut boundary = Boundary::new(Pixel::new(2, 2));
        let corners = [(2, 2), (7, 2), (7, 7), (2, 7), (2, 2)];
        for pair in corners.windows(2) {
            let (a, b) = (pair[0], pair[1]);
            boundary.push_segment(Path::new(vec![
                Pixel::new(a.0, a.1),
                Pixel::new(b.0, b.1),
            ]));
        }
        boundary.close();
        boundary
    }

    #[test]
    fn square_selects_interior_pixel_centres() {
        let mask = rasterize_boundary(&square_boundary(), Dimensions::new(10, 10));
        assert_eq!(mask.selected_count(), 25);
        assert!(mask.contains(Pixel::new(2, 2)));
        assert!(mask.contains(Pixel::new(6, 6)));
        assert!(!mask.contains(Pixel::new(7, 7)));
        assert!(!mask.contains(Pixel::new(1, 4)));
        assert_eq!(
            mask.bounds(),
            Some(BoundingBox {
                x: 2,
                y: 2,
                width: 5,
                height: 5,
            })
        );
    }

    #[test]
    fn degenerate_outline_selects_nothing() {
        let mut boundary = Boundary::new(Pixel::new(3, 3));
        boundary.push_segment(Path::new(vec![Pixel::new(3, 3), Pixel::new(4, 3)]));
        boundary.push_segment(Path::new(vec![Pixel::new(4, 3), Pixel::new(3, 3)]));
        let mask = rasterize_boundary(&boundary, Dimensions::new(8, 8));
        assert_eq!(mask.selected_count(), 0);
        assert_eq!(mask.bounds(), None);
    }

    #[test]
    fn mask_values_are_binary() {
        let mask = rasterize_boundary(&square_boundary(), Dimensions::new(10, 10));
        assert!(mask.image().pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }

    #[test]
    fn from_image_binarizes() {
        let mask = SelectionMask::from_image(GrayImage::from_fn(3, 1, |x, _| {
            Luma([u8::try_from(x).unwrap()])
        }));
        assert_eq!(mask.image().as_raw(), &[0, 255, 255]);
        assert_eq!(mask.bounds().map(|b| (b.x, b.width)), Some((1, 2)));
    }

    #[test]
    fn cutout_crops_with_padding_and_clears_outside() {
        let image = DynamicImage::ImageRgb8(image::RgbImage::from_pixel(
            20,
            20,
            image::Rgb([10, 200, 30]),
        ));
        let mask = rasterize_boundary(&square_boundary(), Dimensions::new(20, 20));
        let cut = cutout(&image, &mask, 5);
        // Bounds 2..=6 grown by 5, clipped at 0: columns 0..12.
        assert_eq!(cut.dimensions(), (12, 12));
        assert_eq!(cut.get_pixel(2, 2).0, [10, 200, 30, 255]);
        assert_eq!(cut.get_pixel(8, 8).0, [0, 0, 0, 0]);
        assert_eq!(cut.get_pixel(0, 0).0[3], 0);
    }

    #[test]
    fn cutout_of_empty_selection_is_transparent_image() {
        let image = DynamicImage::ImageRgb8(image::RgbImage::new(6, 4));
        let cut = cutout(&image, &SelectionMask::empty(Dimensions::new(6, 4)), 5);
        assert_eq!(cut.dimensions(), (6, 4));
        assert!(cut.pixels().all(|p| p.0[3] == 0));
    }
}
