pub mod features;
pub mod inference;
pub mod normalizer;
pub mod orchestrator;
pub mod prompt;
