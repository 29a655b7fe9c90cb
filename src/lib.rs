pub mod client;
pub mod config;
pub mod contract;
pub mod presenter;
pub mod session;
pub mod submission_error;
pub mod upload;
