//! Chat with an application as a given user using ambient AWS credentials.
//!
//! Requires AI knowledge fallback to answer the generic questions below.
//!
//! Run with: cargo run --example chat -- <application-id> <user-email> [file...]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::bail;
use futures::TryStreamExt;
use qbapi_tools::qbusiness::{
    ChatRequest, ChatSyncResponse, QBusinessClient, ServiceIdentity, SourceAttribution,
};
use qbapi_tools::setup_tracing;
use tracing::{debug, info};

/// Chat controls take a moment to apply
const SETTING_UPDATE_WAIT: Duration = Duration::from_secs(5);

fn citations(attributions: &[SourceAttribution]) -> Vec<String> {
    attributions
        .iter()
        .map(|a| format!("{}/ {} ({})", a.citation_number, a.title, a.url))
        .collect()
}

async fn ask(
    client: &QBusinessClient,
    request: ChatRequest,
) -> qbapi_tools::Result<ChatSyncResponse> {
    debug!("User Message:\n{}", request.message);
    let reply = client.chat_sync(request).await?;
    debug!("System Message:\n{}", reply.system_message);
    Ok(reply)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let level = std::env::var("logging").unwrap_or_else(|_| "debug".to_string());
    setup_tracing(&level, None)?;

    let region = std::env::var("AWS_DEFAULT_REGION").unwrap_or_else(|_| "us-east-1".to_string());
    let mut args = std::env::args().skip(1);
    let (Some(app_id), Some(user_id)) = (args.next(), args.next()) else {
        bail!("usage: chat <application-id> <user-email> [file...]");
    };
    let files: Vec<PathBuf> = args.map(PathBuf::from).collect();

    let client = QBusinessClient::connect(ServiceIdentity::Ambient, &region, None).await?;

    info!("Use case: have a conversation");
    let mut previous: Option<ChatSyncResponse> = None;
    for message in [
        "who are you?",
        "How far is Earth from Mars?",
        "Summarize as an email to John Doe",
    ] {
        let mut request = ChatRequest::new(&app_id, message).user(&user_id);
        if let Some(reply) = &previous {
            request = request.continuing(&reply.conversation_id, &reply.system_message_id);
        }
        previous = Some(ask(&client, request).await?);
    }

    if !files.is_empty() {
        info!("Use case: chat with files and citations");
        let mut request = ChatRequest::new(&app_id, "Summarize the documents").user(&user_id);
        for file in &files {
            request = request.attach(file);
        }
        let summary = ask(&client, request).await?;
        let reply = ask(
            &client,
            ChatRequest::new(&app_id, "What best practices do the documents recommend?")
                .user(&user_id)
                .continuing(&summary.conversation_id, &summary.system_message_id),
        )
        .await?;
        debug!(citations = ?citations(&reply.source_attributions));
    }

    info!("Use case: chat with AI knowledge fallback off and on");
    let ai_allowed = client.is_ai_fallback_allowed(&app_id).await?;
    let creator_allowed = client.is_creator_mode_allowed(&app_id).await?;
    debug!(ai_allowed, creator_allowed, "Current chat controls");

    for allow in [false, true] {
        client.allow_ai_fallback(&app_id, allow).await?;
        if !allow {
            client.allow_creator_mode(&app_id, false).await?;
        }
        tokio::time::sleep(SETTING_UPDATE_WAIT).await;
        debug!(ai_fallback = allow);
        ask(&client, ChatRequest::new(&app_id, "How far is moon?").user(&user_id)).await?;
    }

    client.allow_ai_fallback(&app_id, ai_allowed).await?;
    client.allow_creator_mode(&app_id, creator_allowed).await?;
    tokio::time::sleep(SETTING_UPDATE_WAIT).await;
    debug!(
        ai_allowed = client.is_ai_fallback_allowed(&app_id).await?,
        creator_allowed = client.is_creator_mode_allowed(&app_id).await?,
        "Restored chat controls"
    );

    info!("Use case: list, then delete every conversation");
    let conversations: Vec<_> = client
        .conversations(&app_id, Some(&user_id))
        .try_collect()
        .await?;
    for conversation in &conversations {
        debug!("{conversation:#?}");
    }
    let deleted = client
        .delete_conversations_by_age(&app_id, Some(&user_id), None)
        .await?;
    info!(deleted, "Deleted all conversations");

    Ok(())
}
