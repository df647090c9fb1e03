use std::collections::HashMap;
use std::sync::Arc;

use crate::error::ScanError;
use crate::scanner::DynScanner;

/// Registry mapping canonical provider names to scanner instances.
///
/// Populated once at startup and then shared read-only; scans never mutate
/// the registry.
#[derive(Default)]
pub struct ScannerRegistry {
    scanners: HashMap<String, Arc<dyn DynScanner>>,
}

impl std::fmt::Debug for ScannerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScannerRegistry")
            .field("names", &self.names())
            .finish()
    }
}

impl ScannerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a scanner under its own [`name`](DynScanner::name).
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::Configuration`] when a scanner is already
    /// registered under that name.
    pub fn register(&mut self, scanner: Arc<dyn DynScanner>) -> Result<(), ScanError> {
        let name = scanner.name().to_owned();
        if self.scanners.contains_key(&name) {
            return Err(ScanError::Configuration(format!(
                "scanner already registered: {name}"
            )));
        }
        self.scanners.insert(name, scanner);
        Ok(())
    }

    /// Look up a scanner by provider name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn DynScanner>, ScanError> {
        self.scanners
            .get(name)
            .cloned()
            .ok_or_else(|| ScanError::NotRegistered(name.to_owned()))
    }

    /// Registered provider names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.scanners.keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of registered scanners.
    pub fn len(&self) -> usize {
        self.scanners.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.scanners.is_empty()
    }
}
