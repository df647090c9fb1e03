//! GCP provider scanner.
//!
//! Enumerates Cloud Storage buckets into canonical resources using
//! service-account JSON credentials or Application Default Credentials.

pub mod auth;
pub mod config;
pub mod error;
pub mod scanner;

pub use auth::build_gcp_credentials;
pub use config::GcpScannerConfig;
pub use error::{GcpScannerError, classify_gcp_error};
pub use scanner::GcpScanner;
