//! Route handlers

use std::sync::Arc;

use axum::{
    Json,
    extract::{FromRequestParts, Query, State},
    http::request::Parts,
    response::{Html, Redirect},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use futures::TryStreamExt;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::AppState;
use super::error::WebError;
use super::pages;
use crate::handshake::SignInStage;
use crate::oidc::authorization_url;
use crate::qbusiness::{ChatRequest, ChatSyncResponse, Conversation};
use crate::random::alphanumeric;
use crate::session::UserRecord;

/// Cookie carrying the `state` of a pending sign-in
pub const STATE_COOKIE: &str = "qbapi_state";

/// Cookie carrying the opaque session token
pub const SESSION_COOKIE: &str = "qbapi_session";

fn cookie(name: &'static str, value: String) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .same_site(SameSite::Lax)
        .path("/")
        .build()
}

fn removal(name: &'static str) -> Cookie<'static> {
    Cookie::build(name).path("/").build()
}

/// The user behind the request's session cookie
pub(super) struct SignedIn {
    user: UserRecord,
    token: String,
}

impl FromRequestParts<Arc<AppState>> for SignedIn {
    type Rejection = WebError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_headers(&parts.headers);
        let token = jar
            .get(SESSION_COOKIE)
            .map(|c| c.value().to_string())
            .ok_or(WebError::Unauthorized)?;
        let user = state
            .sessions
            .resolve(&token)
            .await
            .ok_or(WebError::Unauthorized)?;
        Ok(Self { user, token })
    }
}

pub(super) async fn home(State(state): State<Arc<AppState>>, jar: CookieJar) -> Html<String> {
    let user = match jar.get(SESSION_COOKIE) {
        Some(token) => state.sessions.resolve(token.value()).await,
        None => None,
    };
    Html(pages::home(user.as_ref()))
}

pub(super) async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<(CookieJar, Redirect), WebError> {
    let request_state = alphanumeric(32);
    let nonce = alphanumeric(32);
    let url = authorization_url(
        state.flow.oidc(),
        state.flow.client_id(),
        state.flow.redirect_uri(),
        &request_state,
        &nonce,
    )
    .map_err(WebError::SignIn)?;

    debug!(stage = %SignInStage::AuthorizationRequested, url = %url, "Redirecting to identity provider");
    Ok((
        jar.add(cookie(STATE_COOKIE, request_state)),
        Redirect::to(url.as_str()),
    ))
}

#[derive(Debug, Deserialize)]
pub(super) struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

pub(super) async fn callback(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Query(params): Query<CallbackParams>,
) -> Result<(CookieJar, Redirect), WebError> {
    if let Some(error) = &params.error {
        let description = params.error_description.as_deref().unwrap_or_default();
        warn!(error = %error, description = %description, "Identity provider returned an error");
    }

    let code = params
        .code
        .filter(|c| !c.is_empty())
        .ok_or(WebError::MissingCode)?;
    debug!(stage = %SignInStage::CodeReceived, "Authorization code received");

    let expected = jar.get(STATE_COOKIE).map(|c| c.value().to_string());
    if expected.is_none() || params.state != expected {
        warn!("Sign-in state mismatch");
        return Err(WebError::StateMismatch);
    }

    let sign_in = state.flow.complete(&code).await.map_err(WebError::SignIn)?;

    // Existing users keep their record; the credential is replaced with the fresh one
    let record = match state.sessions.get(&sign_in.identity.subject).await {
        Some(existing) => UserRecord {
            credential: sign_in.credential.clone(),
            ..existing
        },
        None => UserRecord {
            subject: sign_in.identity.subject.clone(),
            display_name: sign_in.display_name().to_string(),
            email: if sign_in.user_info.email.is_empty() {
                sign_in.identity.email.clone().unwrap_or_default()
            } else {
                sign_in.user_info.email.clone()
            },
            credential: sign_in.credential.clone(),
        },
    };
    let record = state.sessions.create(record).await;
    let token = state.sessions.activate(&record.subject).await;
    info!(subject = %record.subject, stage = %SignInStage::SessionEstablished, "Signed in");

    Ok((
        jar.remove(removal(STATE_COOKIE))
            .add(cookie(SESSION_COOKIE, token)),
        Redirect::to("/conversations"),
    ))
}

pub(super) async fn chat(signed_in: SignedIn) -> Html<String> {
    Html(pages::chat(&signed_in.user))
}

pub(super) async fn profile(signed_in: SignedIn) -> Html<String> {
    Html(pages::profile(&signed_in.user))
}

pub(super) async fn conversations(
    State(state): State<Arc<AppState>>,
    signed_in: SignedIn,
) -> Result<Html<String>, WebError> {
    let client = state.client_for(&signed_in.user).await.map_err(WebError::Api)?;
    let list: Vec<Conversation> = client
        .conversations(&state.application_id, None)
        .try_collect()
        .await
        .map_err(WebError::Api)?;
    debug!(count = list.len(), "Listed conversations");
    Ok(Html(pages::conversations(&signed_in.user, &list)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct AnswerRequest {
    question: String,
    #[serde(default)]
    conversation_id: Option<String>,
    #[serde(default)]
    prev_sys_message_id: Option<String>,
}

pub(super) async fn answer(
    State(state): State<Arc<AppState>>,
    signed_in: SignedIn,
    Json(request): Json<AnswerRequest>,
) -> Result<Json<ChatSyncResponse>, WebError> {
    let client = state.client_for(&signed_in.user).await.map_err(WebError::Api)?;
    let reply = client
        .chat_sync_propagated(ChatRequest {
            conversation_id: request.conversation_id,
            parent_message_id: request.prev_sys_message_id,
            ..ChatRequest::new(state.application_id.as_str(), request.question)
        })
        .await
        .map_err(WebError::Api)?;
    Ok(Json(reply))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(super) struct DeleteChatRequest {
    conversation_id: String,
}

pub(super) async fn delete_chat(
    State(state): State<Arc<AppState>>,
    signed_in: SignedIn,
    Json(request): Json<DeleteChatRequest>,
) -> Result<Json<Value>, WebError> {
    let client = state.client_for(&signed_in.user).await.map_err(WebError::Api)?;
    let deleted = client
        .delete_conversation(&state.application_id, &request.conversation_id, None)
        .await
        .map_err(WebError::Api)?;
    let status = if deleted { "success" } else { "fail" };
    Ok(Json(json!({ "status": status })))
}

pub(super) async fn logout(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    signed_in: SignedIn,
) -> (CookieJar, Redirect) {
    state.sessions.deactivate(&signed_in.token).await;
    state.sessions.delete(&signed_in.user.subject).await;
    info!(subject = %signed_in.user.subject, "Signed out");
    (jar.remove(removal(SESSION_COOKIE)), Redirect::to("/"))
}
