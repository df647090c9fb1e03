use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use stratus_core::Resource;

use crate::error::ScanError;
use crate::registry::ScannerRegistry;
use crate::scanner::DynScanner;

/// Per-provider result of a fan-out scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScanOutcome {
    /// The provider enumerated completely.
    Ok {
        /// Number of resources produced.
        count: usize,
    },
    /// The provider failed partway; the collected resources were merged.
    Partial {
        /// Number of resources merged despite the failure.
        count: usize,
        /// Description of the interrupting failure.
        error: String,
    },
    /// The provider produced nothing.
    Failed {
        /// Description of the failure.
        error: String,
    },
}

/// Merged output of a fan-out scan: one outcome per provider plus all
/// produced resources, each stamped with `metadata.last_scanned_at`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanReport {
    /// Per-provider outcome, keyed by canonical provider name.
    pub outcomes: BTreeMap<String, ScanOutcome>,
    /// All resources produced across providers.
    pub resources: Vec<Resource>,
}

impl ScanReport {
    /// Whether every provider enumerated completely.
    pub fn all_ok(&self) -> bool {
        self.outcomes
            .values()
            .all(|outcome| matches!(outcome, ScanOutcome::Ok { .. }))
    }
}

/// Fans provider scans out in parallel and merges their results.
///
/// One task per provider; tasks share no mutable state, and cancellation
/// propagates from the caller's context into every scanner.
pub struct ScanManager {
    registry: Arc<ScannerRegistry>,
}

impl std::fmt::Debug for ScanManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanManager")
            .field("providers", &self.registry.names())
            .finish()
    }
}

impl ScanManager {
    /// Create a manager over a populated registry.
    #[must_use]
    pub fn new(registry: Arc<ScannerRegistry>) -> Self {
        Self { registry }
    }

    /// The registered provider names.
    pub fn provider_names(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Scan every registered provider in parallel.
    ///
    /// Never fails as a whole: individual provider failures are reported in
    /// the per-provider outcomes, and partial enumerations are merged.
    #[instrument(skip(self, ctx))]
    pub async fn scan_all(&self, ctx: &CancellationToken) -> ScanReport {
        let names = self.registry.names();
        self.scan_named(ctx, &names).await
    }

    /// Scan a subset of providers by name. Unknown names are reported as
    /// failed outcomes rather than failing the whole fan-out.
    #[instrument(skip(self, ctx), fields(count = providers.len()))]
    pub async fn scan_providers(
        &self,
        ctx: &CancellationToken,
        providers: &[String],
    ) -> ScanReport {
        self.scan_named(ctx, providers).await
    }

    async fn scan_named(&self, ctx: &CancellationToken, providers: &[String]) -> ScanReport {
        let mut report = ScanReport::default();
        let mut tasks: JoinSet<(String, ScanOutcome, Vec<Resource>)> = JoinSet::new();

        for name in providers {
            let scanner = match self.registry.get(name) {
                Ok(scanner) => scanner,
                Err(error) => {
                    report.outcomes.insert(
                        name.clone(),
                        ScanOutcome::Failed {
                            error: error.to_string(),
                        },
                    );
                    continue;
                }
            };
            let ctx = ctx.clone();
            let name = name.clone();
            tasks.spawn(async move { run_one_scan(name, scanner, ctx).await });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, outcome, resources)) => {
                    report.outcomes.insert(name, outcome);
                    report.resources.extend(resources);
                }
                Err(join_error) => {
                    warn!(error = %join_error, "scan task panicked");
                }
            }
        }

        info!(
            providers = report.outcomes.len(),
            resources = report.resources.len(),
            "scan fan-out finished"
        );
        report
    }

    /// Validate every registered scanner sequentially, returning the first
    /// failure.
    pub async fn validate_all(&self) -> Result<(), ScanError> {
        for name in self.registry.names() {
            self.registry.get(&name)?.validate().await?;
        }
        Ok(())
    }
}

async fn run_one_scan(
    name: String,
    scanner: Arc<dyn DynScanner>,
    ctx: CancellationToken,
) -> (String, ScanOutcome, Vec<Resource>) {
    match scanner.scan(&ctx).await {
        Ok(mut resources) => {
            stamp(&mut resources);
            let outcome = ScanOutcome::Ok {
                count: resources.len(),
            };
            (name, outcome, resources)
        }
        Err(ScanError::Partial {
            mut resources,
            source,
        }) => {
            warn!(provider = %name, error = %source, "merging partial scan");
            stamp(&mut resources);
            let outcome = ScanOutcome::Partial {
                count: resources.len(),
                error: source.to_string(),
            };
            (name, outcome, resources)
        }
        Err(error) => {
            warn!(provider = %name, %error, "scan failed");
            let outcome = ScanOutcome::Failed {
                error: error.to_string(),
            };
            (name, outcome, Vec::new())
        }
    }
}

fn stamp(resources: &mut [Resource]) {
    let now = Utc::now();
    for resource in resources {
        resource.metadata.last_scanned_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::scanner::Scanner;
    use stratus_core::CloudProvider;

    enum Behavior {
        Ok(Vec<&'static str>),
        Partial(Vec<&'static str>),
        Fail,
        BadCredentials,
    }

    struct FakeScanner {
        provider: &'static str,
        behavior: Behavior,
        validations: AtomicUsize,
    }

    impl FakeScanner {
        fn new(provider: &'static str, behavior: Behavior) -> Self {
            Self {
                provider,
                behavior,
                validations: AtomicUsize::new(0),
            }
        }

        fn resources(&self, ids: &[&'static str]) -> Vec<Resource> {
            ids.iter()
                .map(|id| {
                    Resource::new(
                        *id,
                        "aws.ec2.instance",
                        CloudProvider::Aws,
                        *id,
                        "scanner",
                    )
                })
                .collect()
        }
    }

    impl Scanner for FakeScanner {
        fn name(&self) -> &str {
            self.provider
        }

        async fn validate(&self) -> Result<(), ScanError> {
            self.validations.fetch_add(1, Ordering::SeqCst);
            match self.behavior {
                Behavior::BadCredentials => Err(ScanError::Credentials("expired".into())),
                _ => Ok(()),
            }
        }

        async fn scan(&self, _ctx: &CancellationToken) -> Result<Vec<Resource>, ScanError> {
            match &self.behavior {
                Behavior::Ok(ids) => Ok(self.resources(ids)),
                Behavior::Partial(ids) => Err(ScanError::partial(
                    self.resources(ids),
                    ScanError::RateLimited,
                )),
                Behavior::Fail | Behavior::BadCredentials => {
                    Err(ScanError::Connection("unreachable".into()))
                }
            }
        }

        async fn get_resource(&self, id: &str) -> Result<Resource, ScanError> {
            Err(ScanError::NotRegistered(id.to_owned()))
        }
    }

    fn manager(scanners: Vec<FakeScanner>) -> ScanManager {
        let mut registry = ScannerRegistry::new();
        for scanner in scanners {
            registry.register(Arc::new(scanner)).unwrap();
        }
        ScanManager::new(Arc::new(registry))
    }

    #[tokio::test]
    async fn scan_all_merges_and_reports_per_provider() {
        let manager = manager(vec![
            FakeScanner::new("aws", Behavior::Ok(vec!["i-1"])),
            FakeScanner::new("gcp", Behavior::Fail),
        ]);

        let report = manager.scan_all(&CancellationToken::new()).await;

        assert_eq!(report.resources.len(), 1);
        assert_eq!(report.resources[0].id, "i-1");
        assert!(report.resources[0].metadata.last_scanned_at.is_some());

        assert!(matches!(
            report.outcomes["aws"],
            ScanOutcome::Ok { count: 1 }
        ));
        assert!(matches!(report.outcomes["gcp"], ScanOutcome::Failed { .. }));
        assert!(!report.all_ok());
    }

    #[tokio::test]
    async fn partial_results_are_merged() {
        let manager = manager(vec![FakeScanner::new(
            "azure",
            Behavior::Partial(vec!["c-1", "c-2"]),
        )]);

        let report = manager.scan_all(&CancellationToken::new()).await;

        assert_eq!(report.resources.len(), 2);
        match &report.outcomes["azure"] {
            ScanOutcome::Partial { count, error } => {
                assert_eq!(*count, 2);
                assert!(error.contains("rate limited"));
            }
            other => panic!("expected partial outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn subset_scan_flags_unknown_providers() {
        let manager = manager(vec![FakeScanner::new("aws", Behavior::Ok(vec!["i-1"]))]);

        let report = manager
            .scan_providers(
                &CancellationToken::new(),
                &["aws".to_owned(), "oci".to_owned()],
            )
            .await;

        assert!(matches!(report.outcomes["aws"], ScanOutcome::Ok { .. }));
        assert!(matches!(report.outcomes["oci"], ScanOutcome::Failed { .. }));
        assert_eq!(report.resources.len(), 1);
    }

    #[tokio::test]
    async fn validate_all_returns_first_failure() {
        let manager = manager(vec![
            FakeScanner::new("aws", Behavior::Ok(vec![])),
            FakeScanner::new("azure", Behavior::BadCredentials),
            FakeScanner::new("gcp", Behavior::Ok(vec![])),
        ]);

        let err = manager.validate_all().await.unwrap_err();
        assert!(matches!(err, ScanError::Credentials(_)));
    }

    #[tokio::test]
    async fn validate_all_passes_when_healthy() {
        let manager = manager(vec![
            FakeScanner::new("aws", Behavior::Ok(vec![])),
            FakeScanner::new("gcp", Behavior::Ok(vec![])),
        ]);
        manager.validate_all().await.unwrap();
    }

    #[tokio::test]
    async fn empty_registry_scan_is_empty() {
        let manager = ScanManager::new(Arc::new(ScannerRegistry::new()));
        let report = manager.scan_all(&CancellationToken::new()).await;
        assert!(report.outcomes.is_empty());
        assert!(report.resources.is_empty());
        assert!(report.all_ok());
    }
}
