pub mod args;
pub mod errors;
pub mod request_spec;
pub mod result;
pub mod run_config;
pub mod status_code_stats;
