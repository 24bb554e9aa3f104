pub mod constants;
pub mod expected;
pub mod rating_model;
pub mod rating_tracker;
pub mod replay;
pub mod scoring;
pub mod structures;
