//! AWS provider scanner.
//!
//! Enumerates EC2 instances and S3 buckets into canonical resources. SDK
//! clients are built once at construction and reused across scans;
//! transient API failures (throttling, timeouts) are retried with
//! exponential backoff inside the per-scan budget.

pub mod auth;
pub mod config;
pub mod ec2;
pub mod error;
pub mod s3;
pub mod scanner;

pub use auth::build_sdk_config;
pub use config::AwsScannerConfig;
pub use error::{AwsScannerError, classify_sdk_error};
pub use scanner::AwsScanner;
