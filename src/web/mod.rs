//! Demo web application
//!
//! Signs users in through the OIDC provider, exchanges their identity for
//! Q Business credentials and calls the API on their behalf.
//!
//! | Route                             | Session  |
//! |-----------------------------------|----------|
//! | `GET /`                           | optional |
//! | `GET /login`                      | -        |
//! | `GET /authorization-code/callback`| -        |
//! | `GET /chat`, `POST /answer`       | required |
//! | `GET /conversations`              | required |
//! | `POST /delete_chat`               | required |
//! | `GET /profile`                    | required |
//! | `GET, POST /logout`               | required |

mod error;
mod handlers;
pub mod pages;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::info;

pub use error::{MSG_MISSING_CODE, MSG_STATE_MISMATCH, WebError};
pub use handlers::{SESSION_COOKIE, STATE_COOKIE};

use crate::config::Settings;
use crate::federation::{AwsIdentityBroker, IdentityBroker};
use crate::handshake::SignInFlow;
use crate::oidc::discover_configuration;
use crate::qbusiness::{QBusinessClient, ServiceIdentity};
use crate::session::{InMemorySessionStore, SessionStore, UserRecord};
use crate::{Error, Result};

/// Shared application state
pub struct AppState {
    /// Token exchange for the callback
    pub flow: SignInFlow,
    /// Signed-in users
    pub sessions: Arc<dyn SessionStore>,
    /// Q Business application the app chats with
    pub application_id: String,
    /// Region of the Q Business application
    pub region: String,
    /// Endpoint override for the Q Business API
    pub qbusiness_endpoint: Option<String>,
}

impl AppState {
    /// Q Business client acting as `user`
    pub async fn client_for(&self, user: &UserRecord) -> Result<QBusinessClient> {
        QBusinessClient::connect(
            ServiceIdentity::Propagated(user.credential.clone()),
            &self.region,
            self.qbusiness_endpoint.as_deref(),
        )
        .await
    }
}

/// Create the router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(handlers::home))
        .route("/login", get(handlers::login))
        .route("/authorization-code/callback", get(handlers::callback))
        .route("/chat", get(handlers::chat))
        .route("/answer", post(handlers::answer))
        .route("/conversations", get(handlers::conversations))
        .route("/delete_chat", post(handlers::delete_chat))
        .route("/profile", get(handlers::profile))
        .route("/logout", get(handlers::logout).post(handlers::logout))
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Discover the provider, then serve the app on `addr` until Ctrl+C/SIGTERM
///
/// # Errors
///
/// Returns an error if discovery fails or the address cannot be bound.
pub async fn serve(settings: Settings, addr: SocketAddr) -> Result<()> {
    let http = reqwest::Client::new();
    let oidc = discover_configuration(&http, &settings.issuer_url).await?;
    let broker: Arc<dyn IdentityBroker> = Arc::new(AwsIdentityBroker::from_env().await);

    let state = Arc::new(AppState {
        flow: SignInFlow::new(http, oidc, &settings, broker),
        sessions: Arc::new(InMemorySessionStore::new()),
        application_id: settings.qb_apl_id.clone(),
        region: settings.region(),
        qbusiness_endpoint: settings.qbusiness_endpoint.clone(),
    });

    let listener = TcpListener::bind(addr).await?;
    info!(
        addr = %addr,
        redirect_uri = %state.flow.redirect_uri(),
        application = %state.application_id,
        "Q Business demo app listening"
    );

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(Error::Io)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
