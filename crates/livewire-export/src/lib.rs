//! livewire-export: Pure format serializers (sans-IO)
//!
//! Converts traced boundaries into SVG and selection masks, cut-outs and
//! cost maps into PNG bytes.

pub mod png;
pub mod svg;

pub use png::{ExportError, gray_to_png, mask_to_png, rgba_to_png};
pub use svg::{SvgMetadata, build_path_data, to_svg};
