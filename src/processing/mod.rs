//! Block-level processing between parsing and boundary scoring.

mod noise;
mod segmenter;

pub use noise::NoiseFilter;
pub use segmenter::UnitSegmenter;

pub(crate) use noise::normalize_whitespace;
