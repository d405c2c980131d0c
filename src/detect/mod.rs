//! Spatial detection records produced by the device's detection channel.

mod detection;
mod labels;

pub use detection::{Detection, NormalizedBox, PixelBox, SpatialPoint};
pub use labels::{label_name, LABELS};
