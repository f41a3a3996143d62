pub mod toml_loader;

pub use toml_loader::{
    ensure_unique_names, load_job_folder, load_jobs_file, sanitize_file_name, GenerationJob, JobFile,
};
