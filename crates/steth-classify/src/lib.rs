// Classifier adapter, score post-processing, and scoring models for stethoscan.

pub mod adapter;
pub mod demo;
pub mod model;
pub mod postprocess;

pub use adapter::ClassifierAdapter;
pub use model::{DenseModel, FnModel};
