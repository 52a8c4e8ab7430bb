//! SVG export serializer.
//!
//! Converts a traced [`Boundary`] (and optionally the live preview path)
//! into an SVG string using the [`svg`] crate for document construction,
//! XML escaping, and path data formatting.
//!
//! The `viewBox` is the image's pixel grid, so the output can be laid
//! directly over the source image. A closed boundary becomes a single
//! closed `<path>`; an open one emits one `<path>` per frozen segment.
//!
//! This is a pure function with no I/O -- it returns a `String`.

use svg::Document;
use svg::node::element::path::Data;
use svg::node::element::{Description, Element, Group, Path as SvgPath, Title};
use svg::node::{Node, Text, Value};

use livewire_core::{Boundary, Dimensions, Path, Pixel};

/// Stroke colour of frozen segments and closed outlines.
const BOUNDARY_STROKE: &str = "#00c8ff";
/// Stroke colour of the live preview path.
const PREVIEW_STROKE: &str = "#ff3b30";

/// Metadata to embed in the SVG document.
///
/// When present, a `<title>` and/or `<desc>` element is emitted
/// immediately after the opening `<svg>` tag. Text values are
/// XML-escaped automatically by the `svg` crate.
#[derive(Debug, Clone, Default)]
pub struct SvgMetadata<'a> {
    /// Document title, emitted as `<title>`.
    ///
    /// Typically the source image filename (without extension).
    pub title: Option<&'a str>,

    /// Document description, emitted as `<desc>`.
    pub description: Option<&'a str>,

    /// Serialized session configuration, emitted inside
    /// `<metadata><livewire:session>` so exported files carry the
    /// settings they were traced with.
    pub config_json: Option<&'a str>,
}

fn point(p: Pixel) -> (f64, f64) {
    (f64::from(p.x), f64::from(p.y))
}

/// Build an SVG path `d` attribute string from pixel coordinates.
///
/// Uses `M` for the first pixel and `L` for the rest, appending `z`
/// when `close` is set. Returns an empty string for fewer than 2 pixels.
///
/// # Examples
///
/// ```
/// use livewire_core::Pixel;
/// use livewire_export::build_path_data;
///
/// let d = build_path_data(&[Pixel::new(10, 20), Pixel::new(11, 21)], false);
/// assert_eq!(d, "M10,20 L11,21");
/// ```
#[must_use]
pub fn build_path_data(pixels: &[Pixel], close: bool) -> String {
    let [first, rest @ ..] = pixels else {
        return String::new();
    };
    if rest.is_empty() {
        return String::new();
    }
    let mut data = Data::new().move_to(point(*first));
    for p in rest {
        data = data.line_to(point(*p));
    }
    if close {
        data = data.close();
    }
    String::from(Value::from(data))
}

fn stroked(d: String, stroke: &str) -> SvgPath {
    SvgPath::new()
        .set("d", d)
        .set("fill", "none")
        .set("stroke", stroke)
        .set("stroke-width", 1)
        .set("stroke-linejoin", "round")
}

/// Serialize a boundary, and optionally the current preview, into an
/// SVG document sized to `dimensions`.
///
/// Segments with fewer than 2 pixels are skipped. The preview is drawn
/// dashed in its own `<g id="preview">`.
///
/// # Examples
///
/// ```
/// use livewire_core::{Boundary, Dimensions};
/// use livewire_export::{SvgMetadata, to_svg};
///
/// let svg = to_svg(&Boundary::default(), None, Dimensions::new(64, 48), &SvgMetadata::default());
/// assert!(svg.contains(r#"viewBox="0 0 64 48""#));
/// ```
#[must_use]
pub fn to_svg(
    boundary: &Boundary,
    preview: Option<&Path>,
    dimensions: Dimensions,
    metadata: &SvgMetadata<'_>,
) -> String {
    let w = dimensions.width;
    let h = dimensions.height;
    let mut doc = Document::new()
        .set("width", w)
        .set("height", h)
        .set("viewBox", (0, 0, w, h));

    if let Some(title) = metadata.title {
        doc = doc.add(Title::new(title));
    }
    if let Some(description) = metadata.description {
        doc = doc.add(Description::new().add(Text::new(description)));
    }
    if let Some(config_json) = metadata.config_json {
        let mut session_el = Element::new("livewire:session");
        session_el.assign("xmlns:livewire", "urn:livewire:session:1");
        session_el.append(Text::new(config_json));
        let mut metadata_el = Element::new("metadata");
        metadata_el.append(session_el);
        doc = doc.add(metadata_el);
    }

    let mut group = Group::new().set("id", "boundary");
    if boundary.is_closed() {
        let d = build_path_data(&boundary.outline(), true);
        if !d.is_empty() {
            group = group.add(stroked(d, BOUNDARY_STROKE));
        }
    } else {
        for segment in boundary.segments() {
            let d = build_path_data(segment.pixels(), false);
            if !d.is_empty() {
                group = group.add(stroked(d, BOUNDARY_STROKE));
            }
        }
    }
    doc = doc.add(group);

    if let Some(preview) = preview {
        let d = build_path_data(preview.pixels(), false);
        if !d.is_empty() {
            doc = doc.add(
                Group::new()
                    .set("id", "preview")
                    .add(stroked(d, PREVIEW_STROKE).set("stroke-dasharray", "2 1")),
            );
        }
    }

    // The svg crate omits the XML declaration, so we prepend it.
    format!("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n{doc}\n")
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use livewire_core::SessionConfig;

    use super::*;

    fn no_meta() -> SvgMetadata<'static> {
        SvgMetadata::default()
    }

    fn px(coords: &[(i32, i32)]) -> Vec<Pixel> {
        coords.iter().map(|&(x, y)| Pixel::new(x, y)).collect()
    }

    fn traced(close: bool) -> Boundary {
        let image = livewire_core::DynamicImage::ImageLuma8(livewire_core::GrayImage::from_pixel(
            30,
            30,
            image::Luma([90]),
        ));
        let mut session = livewire_core::start_session(
            &image,
            SessionConfig {
                snap_radius: 0,
                ..SessionConfig::default()
            },
        )
        .unwrap();
        for p in [(3, 3), (25, 3), (25, 25)] {
            session.on_seed_click(Pixel::new(p.0, p.1));
        }
        if close {
            session.on_seed_click(Pixel::new(4, 4));
        }
        session.boundary().clone()
    }

    // --- build_path_data ---

    #[test]
    fn path_data_needs_two_pixels() {
        assert_eq!(build_path_data(&[], false), "");
        assert_eq!(build_path_data(&px(&[(5, 5)]), true), "");
    }

    #[test]
    fn path_data_move_then_lines() {
        let d = build_path_data(&px(&[(1, 2), (2, 3), (3, 3)]), false);
        assert_eq!(d, "M1,2 L2,3 L3,3");
    }

    #[test]
    fn path_data_closes_on_request() {
        let d = build_path_data(&px(&[(0, 0), (4, 0), (4, 4)]), true);
        assert!(d.ends_with('z') || d.ends_with('Z'), "{d}");
    }

    // --- to_svg ---

    #[test]
    fn empty_boundary_is_valid_svg_without_paths() {
        let svg = to_svg(&Boundary::default(), None, Dimensions::new(100, 50), &no_meta());
        assert!(svg.starts_with(r#"<?xml version="1.0" encoding="UTF-8"?>"#));
        assert!(svg.contains(r#"width="100""#));
        assert!(svg.contains(r#"height="50""#));
        assert!(svg.contains(r#"viewBox="0 0 100 50""#));
        assert!(!svg.contains("<path"));
    }

    #[test]
    fn open_boundary_has_one_path_per_segment() {
        let svg = to_svg(&traced(false), None, Dimensions::new(30, 30), &no_meta());
        assert_eq!(svg.matches("<path").count(), 2);
    }

    #[test]
    fn closed_boundary_is_one_closed_path() {
        let boundary = traced(true);
        assert!(boundary.is_closed());
        let svg = to_svg(&boundary, None, Dimensions::new(30, 30), &no_meta());
        assert_eq!(svg.matches("<path").count(), 1);
        assert!(svg.contains('z') || svg.contains(" Z"));
    }

    #[test]
    fn preview_is_drawn_dashed() {
        let preview = Path::new(px(&[(1, 1), (2, 2), (3, 3)]));
        let svg = to_svg(
            &Boundary::default(),
            Some(&preview),
            Dimensions::new(10, 10),
            &no_meta(),
        );
        assert!(svg.contains(r#"id="preview""#));
        assert!(svg.contains("stroke-dasharray"));
        assert!(svg.contains("M1,1 L2,2 L3,3"));
    }

    #[test]
    fn metadata_is_escaped() {
        let meta = SvgMetadata {
            title: Some("cat & dog"),
            description: Some("<traced>"),
            config_json: Some(r#"{"closure_threshold":10.0}"#),
        };
        let svg = to_svg(&Boundary::default(), None, Dimensions::new(10, 10), &meta);
        assert!(svg.contains("<title>cat &amp; dog</title>"));
        assert!(svg.contains("&lt;traced&gt;"));
        assert!(svg.contains("<livewire:session"));
        assert!(svg.contains("closure_threshold"));
    }
}
