//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::{DEFAULT_REGION, DEFAULT_SETTINGS_PATH};
use crate::qbusiness::{ChatMode, DataSourceType};

/// Amazon Q Business API tools
#[derive(Parser, Debug)]
#[command(name = "qbapi")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Web app settings file (env-style key=value)
    #[arg(
        short,
        long,
        env = "QBAPI_SETTINGS",
        default_value = DEFAULT_SETTINGS_PATH,
        global = true
    )]
    pub settings: PathBuf,

    /// AWS region of the Q Business application
    #[arg(long, env = "AWS_DEFAULT_REGION", default_value = DEFAULT_REGION, global = true)]
    pub region: String,

    /// Q Business endpoint override
    #[arg(long, env = "QBAPI_QBUSINESS_ENDPOINT", global = true)]
    pub endpoint: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "debug", env = "logging", global = true)]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "QBAPI_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the demo web app
    Serve {
        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port to listen on
        #[arg(short, long, default_value_t = 8080)]
        port: u16,
    },

    /// List applications
    Apps,

    /// List indices of an application
    Indices {
        #[arg(short, long, env = "QBAPI_QB_APL_ID")]
        app: String,
    },

    /// List data sources of an index
    DataSources {
        #[arg(short, long, env = "QBAPI_QB_APL_ID")]
        app: String,

        #[arg(short, long)]
        index: String,
    },

    /// List indexed documents
    ///
    /// With `--index` and `--data-source`, lists those data sources only.
    /// Otherwise walks every index, optionally filtered by connector type.
    Documents {
        #[arg(short, long, env = "QBAPI_QB_APL_ID")]
        app: String,

        #[arg(short, long, requires = "data_source")]
        index: Option<String>,

        /// Data source id (repeatable)
        #[arg(short, long = "data-source", requires = "index")]
        data_source: Vec<String>,

        /// Connector type filter, e.g. CONFLUENCE
        #[arg(short = 't', long, conflicts_with = "index")]
        source_type: Option<DataSourceType>,
    },

    /// List a user's conversations
    Conversations {
        #[arg(short, long, env = "QBAPI_QB_APL_ID")]
        app: String,

        #[arg(short, long)]
        user: String,
    },

    /// Send a chat message
    Chat {
        #[arg(short, long, env = "QBAPI_QB_APL_ID")]
        app: String,

        #[arg(short, long)]
        user: String,

        message: String,

        /// Conversation to continue
        #[arg(long, requires = "parent")]
        conversation: Option<String>,

        /// Previous system message id of that conversation
        #[arg(long, requires = "conversation")]
        parent: Option<String>,

        /// File to attach (repeatable)
        #[arg(long)]
        attach: Vec<PathBuf>,

        /// RETRIEVAL_MODE, CREATOR_MODE or PLUGIN_MODE
        #[arg(long, default_value = "RETRIEVAL_MODE")]
        mode: ChatMode,
    },

    /// Delete conversations older than the given age
    DeleteConversations {
        #[arg(short, long, env = "QBAPI_QB_APL_ID")]
        app: String,

        #[arg(short, long)]
        user: String,

        /// Minimum age in minutes (0 deletes everything started so far)
        #[arg(long, default_value_t = 0)]
        age_minutes: i64,
    },

    /// Show or set AI knowledge fallback
    AiFallback {
        #[arg(short, long, env = "QBAPI_QB_APL_ID")]
        app: String,

        /// true or false; omit to show the current setting
        #[arg(long)]
        set: Option<bool>,
    },

    /// Show or set creator mode
    CreatorMode {
        #[arg(short, long, env = "QBAPI_QB_APL_ID")]
        app: String,

        /// true or false; omit to show the current setting
        #[arg(long)]
        set: Option<bool>,
    },

    /// Map a user to a data source identity
    AddUserAlias {
        #[arg(short, long, env = "QBAPI_QB_APL_ID")]
        app: String,

        #[arg(short, long)]
        index: String,

        #[arg(short, long)]
        data_source: String,

        /// User email
        email: String,

        /// User id within the data source
        alias: String,
    },

    /// Create a CUSTOM data source
    CreateDataSource {
        #[arg(short, long, env = "QBAPI_QB_APL_ID")]
        app: String,

        #[arg(short, long)]
        index: String,

        /// Display name
        name: String,
    },

    /// Delete a data source
    DeleteDataSource {
        #[arg(short, long, env = "QBAPI_QB_APL_ID")]
        app: String,

        #[arg(short, long)]
        index: String,

        data_source: String,
    },

    /// Start a data source sync job
    StartSync {
        #[arg(short, long, env = "QBAPI_QB_APL_ID")]
        app: String,

        #[arg(short, long)]
        index: String,

        data_source: String,
    },

    /// Stop a data source sync job
    StopSync {
        #[arg(short, long, env = "QBAPI_QB_APL_ID")]
        app: String,

        #[arg(short, long)]
        index: String,

        data_source: String,
    },

    /// Upload a file to a CUSTOM data source within a running sync job
    PutDocument {
        #[arg(short, long, env = "QBAPI_QB_APL_ID")]
        app: String,

        #[arg(short, long)]
        index: String,

        /// Execution id returned by start-sync
        #[arg(long)]
        sync_id: String,

        file: PathBuf,

        /// Document id (defaults to the file name)
        #[arg(long)]
        id: Option<String>,

        #[arg(long)]
        title: Option<String>,

        /// PLAIN_TEXT, MD, HTML, PDF, ...
        #[arg(long, default_value = "PLAIN_TEXT")]
        content_type: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_chat_continuation() {
        let cli = Cli::try_parse_from([
            "qbapi", "chat", "--app", "app-1", "--user", "jdoe", "hello", "--conversation",
            "c-1", "--parent", "s-1", "--mode", "creator_mode",
        ])
        .unwrap();
        match cli.command {
            Command::Chat {
                conversation,
                parent,
                mode,
                ..
            } => {
                assert_eq!(conversation.as_deref(), Some("c-1"));
                assert_eq!(parent.as_deref(), Some("s-1"));
                assert_eq!(mode, ChatMode::CreatorMode);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn conversation_requires_parent() {
        assert!(
            Cli::try_parse_from([
                "qbapi", "chat", "--app", "a", "--user", "u", "hi", "--conversation", "c-1"
            ])
            .is_err()
        );
    }

    #[test]
    fn documents_accepts_type_filter() {
        let cli =
            Cli::try_parse_from(["qbapi", "documents", "--app", "a", "-t", "confluence"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Documents {
                source_type: Some(DataSourceType::Confluence),
                ..
            }
        ));
    }
}
