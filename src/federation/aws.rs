//! Identity broker backed by IAM Identity Center and STS

use async_trait::async_trait;
use aws_config::{Region, SdkConfig};
use aws_sdk_ssooidc::operation::create_token_with_iam::CreateTokenWithIAMError;
use aws_sdk_sts::types::ProvidedContext;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::{debug, info};

use super::{
    IDENTITY_CENTER_CONTEXT_PROVIDER, IdentityBroker, JWT_BEARER_GRANT, MSG_INVALID_GRANT,
    MSG_NO_TEMPORARY_CREDENTIAL, SecurityContext, TemporaryCredential, role_session_name,
};
use crate::oidc::decode_unverified;
use crate::{Error, Result};

/// Claims of the token returned by `CreateTokenWithIAM`
#[derive(Debug, Deserialize)]
struct ExchangedIdentityClaims {
    #[serde(rename = "sts:identity_context")]
    identity_context: Option<String>,
}

/// [`IdentityBroker`] using the ambient AWS configuration of the process
#[derive(Debug, Clone)]
pub struct AwsIdentityBroker {
    base: SdkConfig,
}

impl AwsIdentityBroker {
    /// Load the shared AWS configuration from the environment
    pub async fn from_env() -> Self {
        Self::new(aws_config::load_from_env().await)
    }

    /// Broker over an already loaded configuration
    pub fn new(base: SdkConfig) -> Self {
        Self { base }
    }

    fn config_for(&self, region: &str) -> SdkConfig {
        self.base
            .to_builder()
            .region(Region::new(region.to_string()))
            .build()
    }
}

#[async_trait]
impl IdentityBroker for AwsIdentityBroker {
    async fn exchange_identity_for_context(
        &self,
        auth_provider_reference: &str,
        id_token: &str,
        region: &str,
    ) -> Result<SecurityContext> {
        let client = aws_sdk_ssooidc::Client::new(&self.config_for(region));

        let output = client
            .create_token_with_iam()
            .client_id(auth_provider_reference)
            .grant_type(JWT_BEARER_GRANT)
            .assertion(id_token)
            .send()
            .await
            .map_err(|e| {
                if e
                    .as_service_error()
                    .is_some_and(CreateTokenWithIAMError::is_invalid_grant_exception)
                {
                    Error::Exchange(MSG_INVALID_GRANT.to_string())
                } else {
                    Error::Upstream(format!(
                        "CreateTokenWithIAM failed: {}",
                        aws_sdk_ssooidc::error::DisplayErrorContext(&e)
                    ))
                }
            })?;
        debug!(
            token_type = ?output.token_type(),
            expires_in = output.expires_in(),
            "Identity Center token exchange complete"
        );

        let token = output.id_token().ok_or_else(|| {
            Error::Exchange("CreateTokenWithIAM returned no identity token.".to_string())
        })?;
        let claims: ExchangedIdentityClaims = decode_unverified(token)?;
        let context = claims.identity_context.ok_or_else(|| {
            Error::Exchange("Identity token does not carry an STS identity context.".to_string())
        })?;

        info!(region = %region, "Obtained STS identity context");
        Ok(SecurityContext::new(context))
    }

    async fn assume_role_with_context(
        &self,
        role_reference: &str,
        context: SecurityContext,
        region: &str,
    ) -> Result<TemporaryCredential> {
        let client = aws_sdk_sts::Client::new(&self.config_for(region));
        let session_name = role_session_name();

        let output = client
            .assume_role()
            .role_arn(role_reference)
            .role_session_name(&session_name)
            .provided_contexts(
                ProvidedContext::builder()
                    .provider_arn(IDENTITY_CENTER_CONTEXT_PROVIDER)
                    .context_assertion(context.into_assertion())
                    .build(),
            )
            .send()
            .await
            .map_err(|e| {
                Error::Upstream(format!(
                    "AssumeRole failed: {}",
                    aws_sdk_sts::error::DisplayErrorContext(&e)
                ))
            })?;

        let credentials = output
            .credentials()
            .ok_or_else(|| Error::Exchange(MSG_NO_TEMPORARY_CREDENTIAL.to_string()))?;
        let expiration = DateTime::<Utc>::from_timestamp(credentials.expiration().secs(), 0);
        info!(
            role = %role_reference,
            session = %session_name,
            expiration = ?expiration,
            "Assumed role with identity context"
        );

        Ok(TemporaryCredential {
            access_key_id: credentials.access_key_id().to_string(),
            secret_access_key: credentials.secret_access_key().to_string(),
            session_token: credentials.session_token().to_string(),
            expiration,
        })
    }
}
