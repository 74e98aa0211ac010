// Deterministic rule-based risk scoring for stethoscan.

pub mod confidence;
pub mod engine;
pub mod recommendation;

pub use confidence::estimate_confidence;
pub use engine::{evaluate, evaluate_series};
pub use recommendation::recommendation;
