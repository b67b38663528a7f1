//! Image primitives backing the key-frame trigger: a running background
//! model, binarization and morphology over foreground masks, and connected
//! component extraction. All operate on 8-bit grayscale planes.

pub mod background;
pub mod contour;
pub mod mask;

pub use background::BackgroundModel;
pub use contour::{connected_components, largest_component, BoundingBox, Component};
pub use mask::{close, count_white, count_white_in_columns, otsu_level, threshold};
