mod prediction;
mod smoothing;

pub use prediction::PredictionBuffer;
pub use smoothing::SmoothingBuffer;
