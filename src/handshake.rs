//! Sign-in handshake
//!
//! Runs the token exchange for one authorization code, strictly in order:
//! code exchange, user info, context exchange, role assumption. Nothing is
//! retried and the first failure aborts the attempt. A credential is only
//! handed out once every step has succeeded.

use std::fmt;
use std::sync::Arc;

use reqwest::Client;
use tracing::{info, warn};

use crate::Result;
use crate::config::Settings;
use crate::federation::{IdentityBroker, TemporaryCredential};
use crate::oidc::{
    OidcConfiguration, OidcIdentity, UserInfo, exchange_code_for_identity, fetch_user_info,
};

/// Progress of a single sign-in request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignInStage {
    /// No sign-in attempted
    Anonymous,
    /// Browser sent to the authorization endpoint
    AuthorizationRequested,
    /// Authorization code returned to the callback
    CodeReceived,
    /// Code exchanged for identity and access tokens
    IdentityExchanged,
    /// Identity token exchanged for a security context
    ContextObtained,
    /// Role assumed, temporary credential issued
    CredentialObtained,
    /// User record stored and session cookie set
    SessionEstablished,
}

impl fmt::Display for SignInStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Anonymous => "anonymous",
            Self::AuthorizationRequested => "authorization_requested",
            Self::CodeReceived => "code_received",
            Self::IdentityExchanged => "identity_exchanged",
            Self::ContextObtained => "context_obtained",
            Self::CredentialObtained => "credential_obtained",
            Self::SessionEstablished => "session_established",
        };
        f.write_str(name)
    }
}

/// Outcome of a completed handshake
#[derive(Debug, Clone)]
pub struct SignIn {
    /// Tokens and claims from the code exchange
    pub identity: OidcIdentity,
    /// Profile from the userinfo endpoint
    pub user_info: UserInfo,
    /// Credential scoped to the signed-in user
    pub credential: TemporaryCredential,
}

impl SignIn {
    /// Name shown to the user: given name, else email
    pub fn display_name(&self) -> &str {
        if self.user_info.given_name.is_empty() {
            &self.user_info.email
        } else {
            &self.user_info.given_name
        }
    }
}

/// Token exchange driver for the web app callback
#[derive(Clone)]
pub struct SignInFlow {
    http: Client,
    oidc: OidcConfiguration,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    auth_provider_reference: String,
    role_reference: String,
    region: String,
    broker: Arc<dyn IdentityBroker>,
}

impl fmt::Debug for SignInFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignInFlow")
            .field("issuer", &self.oidc.issuer)
            .field("client_id", &self.client_id)
            .field("redirect_uri", &self.redirect_uri)
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

impl SignInFlow {
    /// Build a flow from loaded settings and a discovered provider
    pub fn new(
        http: Client,
        oidc: OidcConfiguration,
        settings: &Settings,
        broker: Arc<dyn IdentityBroker>,
    ) -> Self {
        Self {
            http,
            oidc,
            client_id: settings.client_id.clone(),
            client_secret: settings.client_secret.clone(),
            redirect_uri: settings.redirect_uri(),
            auth_provider_reference: settings.idc_provider_apl_arn.clone(),
            role_reference: settings.qb_sts_role.clone(),
            region: settings.region(),
            broker,
        }
    }

    /// Discovered provider configuration
    pub fn oidc(&self) -> &OidcConfiguration {
        &self.oidc
    }

    /// OIDC client id
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Registered redirect URI
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Region the federation calls target
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Run every exchange step for `code`
    ///
    /// # Errors
    ///
    /// Propagates the first failing step's error unchanged.
    pub async fn complete(&self, code: &str) -> Result<SignIn> {
        let mut stage = SignInStage::CodeReceived;
        let result = self.run(code, &mut stage).await;
        match &result {
            Ok(sign_in) => info!(
                subject = %sign_in.identity.subject,
                stage = %stage,
                "Sign-in handshake complete"
            ),
            Err(e) => warn!(stage = %stage, error = %e, "Sign-in handshake aborted"),
        }
        result
    }

    async fn run(&self, code: &str, stage: &mut SignInStage) -> Result<SignIn> {
        let identity = exchange_code_for_identity(
            &self.http,
            &self.redirect_uri,
            code,
            &self.oidc.token_endpoint,
            &self.client_id,
            &self.client_secret,
        )
        .await?;
        *stage = SignInStage::IdentityExchanged;

        let user_info =
            fetch_user_info(&self.http, &self.oidc.userinfo_endpoint, &identity.access_token)
                .await?;

        let context = self
            .broker
            .exchange_identity_for_context(
                &self.auth_provider_reference,
                &identity.id_token,
                &self.region,
            )
            .await?;
        *stage = SignInStage::ContextObtained;

        let credential = self
            .broker
            .assume_role_with_context(&self.role_reference, context, &self.region)
            .await?;
        *stage = SignInStage::CredentialObtained;

        Ok(SignIn {
            identity,
            user_info,
            credential,
        })
    }
}
