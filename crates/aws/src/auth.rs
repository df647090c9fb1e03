use tracing::{debug, info};

use crate::config::AwsScannerConfig;

/// Build an AWS SDK configuration from the given [`AwsScannerConfig`].
///
/// Uses the standard AWS SDK environment credential chain and optionally:
/// - Overrides the endpoint URL for local development (e.g. `LocalStack`)
/// - Assumes an IAM role via STS if `role_arn` is configured
pub async fn build_sdk_config(config: &AwsScannerConfig) -> aws_config::SdkConfig {
    let mut loader = aws_config::from_env().region(aws_config::Region::new(config.region.clone()));

    if let Some(endpoint) = &config.endpoint_url {
        debug!(endpoint = %endpoint, "using custom AWS endpoint");
        loader = loader.endpoint_url(endpoint);
    }

    // If a role ARN is specified, assume it via STS. We first load the base
    // config to create an STS client, then use the assumed-role credentials
    // to build the final config.
    if let Some(role_arn) = &config.role_arn {
        info!(role_arn = %role_arn, "assuming IAM role via STS");
        let base_config = loader.load().await;
        let sts_client = aws_sdk_sts::Client::new(&base_config);

        let session_name = config
            .session_name
            .clone()
            .unwrap_or_else(|| "stratus-aws-scanner".to_owned());
        let mut request = sts_client
            .assume_role()
            .role_arn(role_arn)
            .role_session_name(session_name);
        if let Some(external_id) = &config.external_id {
            request = request.external_id(external_id);
        }

        match request.send().await {
            Ok(response) => {
                if let Some(creds) = response.credentials() {
                    let static_creds = aws_credential_types::Credentials::from_keys(
                        creds.access_key_id(),
                        creds.secret_access_key(),
                        Some(creds.session_token().to_owned()),
                    );

                    let mut assumed_loader = aws_config::from_env()
                        .region(aws_config::Region::new(config.region.clone()))
                        .credentials_provider(static_creds);

                    if let Some(endpoint) = &config.endpoint_url {
                        assumed_loader = assumed_loader.endpoint_url(endpoint);
                    }

                    info!("STS assume-role succeeded");
                    return assumed_loader.load().await;
                }
                tracing::warn!("STS response had no credentials, falling back to base config");
            }
            Err(e) => {
                tracing::error!(error = %e, "STS assume-role failed, falling back to base config");
            }
        }
        return base_config;
    }

    loader.load().await
}
