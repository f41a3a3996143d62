pub mod document;
pub mod issue;
pub mod loaders;
pub mod pipeline_log;
pub mod variation;
pub mod widget_catalog;

pub use document::{Document, Node, NodeKind, ParentKind, StructuralCounts};
pub use issue::{Issue, IssueCode, RepairEntry, RepairKind, ValidationReport};
pub use loaders::{
    ensure_unique_names, load_job_folder, load_jobs_file, sanitize_file_name, GenerationJob, JobFile,
};
pub use pipeline_log::{PartialResult, PipelineEvent, PipelineLog, PipelineStep};
pub use variation::{RateLimitContext, Variation, VariationContent};
