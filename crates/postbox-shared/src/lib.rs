pub mod constants;
pub mod jobs;
pub mod types;
