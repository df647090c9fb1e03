//! Azure provider scanner.
//!
//! Enumerates Blob Storage containers into canonical resources using the
//! service-principal credential chain with an Azure CLI fallback for
//! development environments.

pub mod auth;
pub mod config;
pub mod error;
pub mod scanner;

pub use auth::build_azure_credential;
pub use config::AzureScannerConfig;
pub use error::{AzureScannerError, classify_azure_error};
pub use scanner::AzureScanner;
