pub mod classifier;
pub mod embedding;
pub mod features;
pub mod similarity;
