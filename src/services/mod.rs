pub mod json_extract;
pub mod json_repair;
pub mod output_writer;
pub mod prompt_builder;
pub mod schema_validator;

pub use json_extract::{extract_json, patch_json_syntax, Extracted};
pub use json_repair::{IdGenerator, JsonRepair, RepairResult};
pub use output_writer::OutputWriter;
pub use prompt_builder::{
    BrandGuidelines, KnowledgeContext, LayoutPromptBuilder, PromptBuilder, PromptContext,
    PromptParts,
};
pub use schema_validator::{Candidate, SchemaValidator, ROOT_PATH};
