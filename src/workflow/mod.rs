pub mod response_processor;
pub mod variation_builder;

pub use response_processor::{ProcessedMessage, RejectedMessage, ResponseProcessor};
pub use variation_builder::{summarize_text, VariationBuilder, SUMMARY_MAX_CHARS};
