//! Amazon Q Business API
//!
//! [`QBusinessClient`] turns the paginated REST API into typed async streams
//! and enforces the cross-field rules of chat and conversation calls.

mod client;
pub mod model;
mod pagination;
mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{ChatRequest, QBusinessClient};
pub use model::{
    AliasOutcome, Application, BatchPutResult, ChatControlsConfiguration, ChatMode,
    ChatSyncResponse, Conversation, CreatedDataSource, CreatorModeConfiguration,
    CreatorModeControl, DataSource, DataSourceType, DocumentDetail, DocumentIndexError,
    DocumentUpload, FailedDocument, Index, Lookup, ResponseScope, SourceAttribution,
    StartedSyncJob, TextMessageSegment, UserAlias, UserAliases,
};
pub use pagination::NEXT_TOKEN;
pub use transport::{
    ApiRequest, HttpTransport, REQUEST_TIMEOUT, SERVICE_NAME, ServiceIdentity, Transport,
    default_endpoint,
};
