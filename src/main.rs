//! Amazon Q Business API tools - command-line entry point

use std::net::SocketAddr;
use std::process::ExitCode;

use chrono::Duration;
use clap::Parser;
use futures::{Stream, TryStreamExt, pin_mut};
use serde::Serialize;
use tracing::{error, info};

use qbapi_tools::{
    Error, Result,
    cli::{Cli, Command},
    config::Settings,
    qbusiness::{ChatRequest, DocumentUpload, QBusinessClient, ServiceIdentity},
    setup_tracing, web,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("❌ {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    if let Command::Serve { host, port } = &cli.command {
        let settings = Settings::load(&cli.settings)?;
        let addr: SocketAddr = format!("{host}:{port}")
            .parse()
            .map_err(|e| Error::Config(format!("Invalid bind address {host}:{port}: {e}")))?;
        info!(settings = %cli.settings.display(), "Starting web app");
        return web::serve(settings, addr).await;
    }

    let client =
        QBusinessClient::connect(ServiceIdentity::Ambient, &cli.region, cli.endpoint.as_deref())
            .await?;

    match cli.command {
        Command::Serve { .. } => Ok(()),
        Command::Apps => print_all(client.applications()).await,
        Command::Indices { app } => print_all(client.indices(&app)).await,
        Command::DataSources { app, index } => print_all(client.data_sources(&app, &index)).await,
        Command::Documents {
            app,
            index: Some(index),
            data_source,
            ..
        } => print_all(client.documents(&app, &index, &data_source)).await,
        Command::Documents {
            app, source_type, ..
        } => print_all(client.documents_by_datasource_type(&app, source_type)).await,
        Command::Conversations { app, user } => {
            print_all(client.conversations(&app, Some(&user))).await
        }
        Command::Chat {
            app,
            user,
            message,
            conversation,
            parent,
            attach,
            mode,
        } => {
            let reply = client
                .chat_sync(ChatRequest {
                    user_id: Some(user),
                    conversation_id: conversation,
                    parent_message_id: parent,
                    attachments: attach,
                    chat_mode: mode,
                    ..ChatRequest::new(app, message)
                })
                .await?;
            print_json(&reply)
        }
        Command::DeleteConversations {
            app,
            user,
            age_minutes,
        } => {
            let done = client
                .delete_conversations_by_age(&app, Some(&user), Some(Duration::minutes(age_minutes)))
                .await?;
            if done {
                println!("Deleted expired conversations");
                Ok(())
            } else {
                Err(Error::Upstream("Stopped at the first failed delete".to_string()))
            }
        }
        Command::AiFallback { app, set } => {
            if let Some(allow) = set {
                client.allow_ai_fallback(&app, allow).await?;
            }
            println!("AI fallback allowed: {}", client.is_ai_fallback_allowed(&app).await?);
            Ok(())
        }
        Command::CreatorMode { app, set } => {
            if let Some(allow) = set {
                client.allow_creator_mode(&app, allow).await?;
            }
            println!("Creator mode allowed: {}", client.is_creator_mode_allowed(&app).await?);
            Ok(())
        }
        Command::AddUserAlias {
            app,
            index,
            data_source,
            email,
            alias,
        } => {
            let outcome = client
                .add_user_alias(&email, &alias, &app, &index, &data_source)
                .await?;
            println!("{outcome:?}");
            Ok(())
        }
        Command::CreateDataSource { app, index, name } => {
            print_json(&client.create_custom_data_source(&app, &index, &name).await?)
        }
        Command::DeleteDataSource {
            app,
            index,
            data_source,
        } => client.delete_data_source(&app, &index, &data_source).await,
        Command::StartSync {
            app,
            index,
            data_source,
        } => print_json(&client.start_sync_job(&app, &index, &data_source).await?),
        Command::StopSync {
            app,
            index,
            data_source,
        } => client.stop_sync_job(&app, &index, &data_source).await,
        Command::PutDocument {
            app,
            index,
            sync_id,
            file,
            id,
            title,
            content_type,
        } => {
            let content = tokio::fs::read(&file).await?;
            let id = id.unwrap_or_else(|| {
                file.file_name()
                    .map_or_else(|| file.display().to_string(), |n| n.to_string_lossy().into_owned())
            });
            let document = DocumentUpload {
                id,
                title,
                content_type,
                content,
            };
            print_json(&client.put_documents(&app, &index, &sync_id, &[document]).await?)
        }
    }
}

async fn print_all<T: Serialize>(stream: impl Stream<Item = Result<T>>) -> Result<()> {
    pin_mut!(stream);
    let mut count = 0_usize;
    while let Some(item) = stream.try_next().await? {
        print_json(&item)?;
        count += 1;
    }
    info!(count, "Done");
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}
