pub mod analysis_job_repo;
pub mod report_repo;
