//! Q Business API façade

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_stream::try_stream;
use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, Duration, Local, Utc};
use futures::{Stream, StreamExt, TryStreamExt};
use reqwest::Method;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, error, info, warn};

use super::model::{
    AliasOutcome, Application, BatchPutResult, ChatControlsConfiguration, ChatMode,
    ChatSyncResponse, Conversation, CreatedDataSource, CreatorModeControl, DataSource,
    DataSourceType, DocumentDetail, DocumentUpload, Index, Lookup, ResponseScope, StartedSyncJob,
    UserAlias, UserAliases,
};
use super::pagination::{
    ApplicationsPage, ConversationsPage, DataSourcesPage, DocumentsPage, IndicesPage, items,
    pages,
};
use super::transport::{ApiRequest, HttpTransport, ServiceIdentity, Transport};
use crate::error::{MSG_MISSING_CONV_SYSMSG_ID, MSG_MISSING_USER_ID};
use crate::random::client_token;
use crate::{Error, Result};

/// Single-turn chat request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatRequest {
    pub application_id: String,
    pub message: String,
    /// Required unless the client holds a propagated identity
    pub user_id: Option<String>,
    /// Conversation to continue; requires `parent_message_id`
    pub conversation_id: Option<String>,
    /// Previous system message of that conversation
    pub parent_message_id: Option<String>,
    /// Files read from disk when the request is sent
    pub attachments: Vec<PathBuf>,
    pub chat_mode: ChatMode,
}

impl ChatRequest {
    pub fn new(application_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            application_id: application_id.into(),
            message: message.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    #[must_use]
    pub fn continuing(
        mut self,
        conversation_id: impl Into<String>,
        parent_message_id: impl Into<String>,
    ) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self.parent_message_id = Some(parent_message_id.into());
        self
    }

    #[must_use]
    pub fn attach(mut self, path: impl Into<PathBuf>) -> Self {
        self.attachments.push(path.into());
        self
    }

    #[must_use]
    pub fn mode(mut self, chat_mode: ChatMode) -> Self {
        self.chat_mode = chat_mode;
        self
    }
}

/// Client for the Q Business API bound to one service identity
#[derive(Clone)]
pub struct QBusinessClient {
    transport: Arc<dyn Transport>,
    identity: ServiceIdentity,
}

impl std::fmt::Debug for QBusinessClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QBusinessClient")
            .field("identity", &self.identity)
            .finish_non_exhaustive()
    }
}

impl QBusinessClient {
    /// Client over the signed HTTP transport
    ///
    /// # Errors
    ///
    /// See [`HttpTransport::connect`].
    pub async fn connect(
        identity: ServiceIdentity,
        region: &str,
        endpoint: Option<&str>,
    ) -> Result<Self> {
        let transport = HttpTransport::connect(&identity, region, endpoint).await?;
        Ok(Self::with_transport(Arc::new(transport), identity))
    }

    /// Client over any transport
    pub fn with_transport(transport: Arc<dyn Transport>, identity: ServiceIdentity) -> Self {
        Self {
            transport,
            identity,
        }
    }

    pub fn identity(&self) -> &ServiceIdentity {
        &self.identity
    }

    /// Attach `userId` when acting with ambient credentials
    fn scoped_to_user(&self, request: ApiRequest, user_id: Option<&str>) -> Result<ApiRequest> {
        if self.identity.is_propagated() {
            return Ok(request);
        }
        match present(user_id) {
            Some(user_id) => Ok(request.query("userId", user_id)),
            None => Err(Error::Parameter(MSG_MISSING_USER_ID.to_string())),
        }
    }

    async fn send<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        let operation = request.operation;
        let raw = self.transport.call(request).await?;
        serde_json::from_value(raw).map_err(|e| Error::schema(operation, e))
    }

    // Listings

    /// All applications
    pub fn applications(&self) -> impl Stream<Item = Result<Application>> + Send + '_ {
        items::<ApplicationsPage>(
            self.transport.as_ref(),
            ApiRequest::new("ListApplications", Method::GET, ["applications"]),
        )
    }

    /// Indices of an application
    pub fn indices(&self, app_id: &str) -> impl Stream<Item = Result<Index>> + Send + '_ {
        items::<IndicesPage>(
            self.transport.as_ref(),
            ApiRequest::new(
                "ListIndices",
                Method::GET,
                ["applications", app_id, "indices"],
            ),
        )
    }

    /// Data sources of an index
    pub fn data_sources(
        &self,
        app_id: &str,
        index_id: &str,
    ) -> impl Stream<Item = Result<DataSource>> + Send + '_ {
        items::<DataSourcesPage>(
            self.transport.as_ref(),
            ApiRequest::new(
                "ListDataSources",
                Method::GET,
                ["applications", app_id, "indices", index_id, "datasources"],
            ),
        )
    }

    /// Documents of the given data sources, one traversal per data source
    pub fn documents(
        &self,
        app_id: &str,
        index_id: &str,
        data_source_ids: &[String],
    ) -> impl Stream<Item = Result<DocumentDetail>> + Send + '_ {
        // The API accepts a single data source id per call
        let requests: Vec<ApiRequest> = data_source_ids
            .iter()
            .map(|ds_id| {
                ApiRequest::new(
                    "ListDocuments",
                    Method::GET,
                    ["applications", app_id, "index", index_id, "documents"],
                )
                .query("dataSourceIds", ds_id.as_str())
            })
            .collect();

        futures::stream::iter(requests)
            .flat_map(|request| items::<DocumentsPage>(self.transport.as_ref(), request))
    }

    /// Documents across every index, optionally limited to one connector type
    pub fn documents_by_datasource_type(
        &self,
        app_id: &str,
        data_source_type: Option<DataSourceType>,
    ) -> impl Stream<Item = Result<DocumentDetail>> + Send + '_ {
        let app_id = app_id.to_string();
        try_stream! {
            for await index in self.indices(&app_id) {
                let index = index?;
                let ds_ids: Vec<String> = self
                    .data_sources(&app_id, &index.index_id)
                    .try_filter(|ds| {
                        let keep = data_source_type
                            .is_none_or(|wanted| ds.data_source_type == wanted.as_str());
                        futures::future::ready(keep)
                    })
                    .map_ok(|ds| ds.data_source_id)
                    .try_collect()
                    .await?;
                debug!(index = %index.index_id, data_sources = ds_ids.len(), "Listing documents");

                for await doc in self.documents(&app_id, &index.index_id, &ds_ids) {
                    yield doc?;
                }
            }
        }
    }

    /// Conversations of a user
    ///
    /// A missing user id is reported as the first item.
    pub fn conversations<'a>(
        &'a self,
        app_id: &str,
        user_id: Option<&str>,
    ) -> impl Stream<Item = Result<Conversation>> + Send + 'a {
        let request = self.scoped_to_user(
            ApiRequest::new(
                "ListConversations",
                Method::GET,
                ["applications", app_id, "conversations"],
            ),
            user_id,
        );
        try_stream! {
            let request = request?;
            for await conversation in items::<ConversationsPage>(self.transport.as_ref(), request) {
                yield conversation?;
            }
        }
    }

    // Conversations

    /// Delete one conversation
    ///
    /// Service failures are logged and reported as `false`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parameter`] if a user id is required and missing.
    pub async fn delete_conversation(
        &self,
        app_id: &str,
        conversation_id: &str,
        user_id: Option<&str>,
    ) -> Result<bool> {
        let request = self.scoped_to_user(
            ApiRequest::new(
                "DeleteConversation",
                Method::DELETE,
                ["applications", app_id, "conversations", conversation_id],
            ),
            user_id,
        )?;

        match self.transport.call(request).await {
            Ok(_) => {
                info!(conversation = %conversation_id, "Deleted conversation");
                Ok(true)
            }
            Err(e) => {
                error!(conversation = %conversation_id, error = %e, "Failed to delete conversation");
                Ok(false)
            }
        }
    }

    /// Delete every conversation started at or before local now minus `age`
    ///
    /// Stops at the first failed delete and returns `false`.
    ///
    /// # Errors
    ///
    /// Returns an error if the conversations cannot be listed.
    pub async fn delete_conversations_by_age(
        &self,
        app_id: &str,
        user_id: Option<&str>,
        age: Option<Duration>,
    ) -> Result<bool> {
        let cutoff = (Local::now() - age.unwrap_or_else(Duration::zero)).with_timezone(&Utc);
        self.delete_conversations_started_before(app_id, user_id, cutoff)
            .await
    }

    async fn delete_conversations_started_before(
        &self,
        app_id: &str,
        user_id: Option<&str>,
        cutoff: DateTime<Utc>,
    ) -> Result<bool> {
        debug!(cutoff = %cutoff, "Deleting expired conversations");
        let conversations = self.conversations(app_id, user_id);
        futures::pin_mut!(conversations);
        while let Some(conversation) = conversations.try_next().await? {
            if conversation.start_time > cutoff {
                continue;
            }
            if !self
                .delete_conversation(app_id, &conversation.conversation_id, user_id)
                .await?
            {
                return Ok(false);
            }
        }
        Ok(true)
    }

    // Chat

    /// Send one message and wait for the complete reply
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parameter`] for a missing user id or a half-specified
    /// continuation, [`Error::AttachmentNotFound`] for a missing file, and
    /// any service error.
    pub async fn chat_sync(&self, request: ChatRequest) -> Result<ChatSyncResponse> {
        let api_request = ApiRequest::new(
            "ChatSync",
            Method::POST,
            ["applications", request.application_id.as_str(), "conversations"],
        )
        .flag("sync");
        let api_request = self.scoped_to_user(api_request, request.user_id.as_deref())?;

        let mut body = json!({
            "userMessage": request.message,
            "chatMode": request.chat_mode,
            "clientToken": client_token(),
        });
        match (
            present(request.conversation_id.as_deref()),
            present(request.parent_message_id.as_deref()),
        ) {
            (Some(conversation_id), Some(parent_message_id)) => {
                body["conversationId"] = json!(conversation_id);
                body["parentMessageId"] = json!(parent_message_id);
            }
            (None, None) => {}
            _ => return Err(Error::Parameter(MSG_MISSING_CONV_SYSMSG_ID.to_string())),
        }

        if !request.attachments.is_empty() {
            let mut attachments = Vec::with_capacity(request.attachments.len());
            for path in &request.attachments {
                attachments.push(read_attachment(path).await?);
            }
            body["attachments"] = Value::Array(attachments);
        }

        self.send(api_request.body(body)).await
    }

    /// [`chat_sync`](Self::chat_sync) for propagated identities; never sends a user id
    ///
    /// # Errors
    ///
    /// As for [`chat_sync`](Self::chat_sync).
    pub async fn chat_sync_propagated(&self, mut request: ChatRequest) -> Result<ChatSyncResponse> {
        request.user_id = None;
        self.chat_sync(request).await
    }

    // Chat controls

    fn chat_controls(
        &self,
        app_id: &str,
    ) -> impl Stream<Item = Result<ChatControlsConfiguration>> + Send + '_ {
        pages::<ChatControlsConfiguration>(
            self.transport.as_ref(),
            ApiRequest::new(
                "GetChatControlsConfiguration",
                Method::GET,
                ["applications", app_id, "chatcontrols"],
            ),
        )
    }

    async fn update_chat_controls(&self, app_id: &str, mut body: Value) -> Result<()> {
        body["clientToken"] = json!(client_token());
        let _: Value = self
            .send(
                ApiRequest::new(
                    "UpdateChatControlsConfiguration",
                    Method::PATCH,
                    ["applications", app_id, "chatcontrols"],
                )
                .body(body),
            )
            .await?;
        Ok(())
    }

    /// Let answers fall back to general model knowledge
    ///
    /// Takes effect after a short propagation delay that is not awaited here.
    pub async fn allow_ai_fallback(&self, app_id: &str, allow: bool) -> Result<()> {
        let scope = if allow {
            ResponseScope::ExtendedKnowledgeEnabled
        } else {
            ResponseScope::EnterpriseContentOnly
        };
        info!(app = %app_id, scope = ?scope, "Updating response scope");
        self.update_chat_controls(app_id, json!({ "responseScope": scope }))
            .await
    }

    /// Whether answers may fall back to general model knowledge
    ///
    /// # Errors
    ///
    /// Returns [`Error::ResponseScopeNotFound`] if no page carries a scope.
    pub async fn is_ai_fallback_allowed(&self, app_id: &str) -> Result<bool> {
        let controls = self.chat_controls(app_id);
        futures::pin_mut!(controls);
        while let Some(page) = controls.try_next().await? {
            if let Some(scope) = page.response_scope {
                return Ok(scope == ResponseScope::ExtendedKnowledgeEnabled);
            }
        }
        Err(Error::ResponseScopeNotFound)
    }

    /// Enable or disable creator mode
    pub async fn allow_creator_mode(&self, app_id: &str, allow: bool) -> Result<()> {
        let control = if allow {
            CreatorModeControl::Enabled
        } else {
            CreatorModeControl::Disabled
        };
        info!(app = %app_id, control = ?control, "Updating creator mode");
        self.update_chat_controls(
            app_id,
            json!({ "creatorModeConfiguration": { "creatorModeControl": control } }),
        )
        .await
    }

    /// Whether creator mode is enabled; `false` when not configured
    pub async fn is_creator_mode_allowed(&self, app_id: &str) -> Result<bool> {
        let controls = self.chat_controls(app_id);
        futures::pin_mut!(controls);
        while let Some(page) = controls.try_next().await? {
            if let Some(config) = page.creator_mode_configuration {
                return Ok(config.creator_mode_control == CreatorModeControl::Enabled);
            }
        }
        warn!(app = %app_id, "Creator mode configuration not found.");
        Ok(false)
    }

    // Users

    /// Look up a user and their aliases
    pub async fn get_user(&self, app_id: &str, user_id: &str) -> Result<Lookup<UserAliases>> {
        let request = ApiRequest::new(
            "GetUser",
            Method::GET,
            ["applications", app_id, "users", user_id],
        );
        match self.send(request).await {
            Ok(user) => Ok(Lookup::Found(user)),
            Err(Error::NotFound(_)) => Ok(Lookup::NotFound),
            Err(e) => Err(e),
        }
    }

    /// Ensure `email` exists and maps to `alias` in the given data source
    pub async fn add_user_alias(
        &self,
        email: &str,
        alias: &str,
        app_id: &str,
        index_id: &str,
        data_source_id: &str,
    ) -> Result<AliasOutcome> {
        let wanted = UserAlias::new(index_id, data_source_id, alias);

        match self.get_user(app_id, email).await? {
            Lookup::NotFound => {
                warn!(user = %email, "User not found. Will create.");
                info!(user = %email, alias = %alias, "Creating user");
                let _: Value = self
                    .send(
                        ApiRequest::new("CreateUser", Method::POST, ["applications", app_id, "users"])
                            .body(json!({
                                "userId": email,
                                "userAliases": [wanted],
                                "clientToken": client_token(),
                            })),
                    )
                    .await?;
                Ok(AliasOutcome::Created)
            }
            Lookup::Found(user) if user.contains(&wanted) => {
                debug!(user = %email, alias = %alias, "Alias already present");
                Ok(AliasOutcome::Unchanged)
            }
            Lookup::Found(_) => {
                info!(user = %email, alias = %alias, "Updating user");
                let _: Value = self
                    .send(
                        ApiRequest::new(
                            "UpdateUser",
                            Method::PUT,
                            ["applications", app_id, "users", email],
                        )
                        .body(json!({ "userAliasesToUpdate": [wanted] })),
                    )
                    .await?;
                Ok(AliasOutcome::Updated)
            }
        }
    }

    // Data source administration

    /// Create a data source of type `CUSTOM` for documents put via the API
    pub async fn create_custom_data_source(
        &self,
        app_id: &str,
        index_id: &str,
        name: &str,
    ) -> Result<CreatedDataSource> {
        self.send(
            ApiRequest::new(
                "CreateDataSource",
                Method::POST,
                ["applications", app_id, "indices", index_id, "datasources"],
            )
            .body(json!({
                "displayName": name,
                "configuration": { "type": DataSourceType::Custom, "version": "1.0.0" },
                "clientToken": client_token(),
            })),
        )
        .await
    }

    pub async fn delete_data_source(
        &self,
        app_id: &str,
        index_id: &str,
        data_source_id: &str,
    ) -> Result<()> {
        let _: Value = self
            .send(ApiRequest::new(
                "DeleteDataSource",
                Method::DELETE,
                ["applications", app_id, "indices", index_id, "datasources", data_source_id],
            ))
            .await?;
        Ok(())
    }

    /// Start a sync job; its execution id is the `dataSourceSyncId` for puts
    pub async fn start_sync_job(
        &self,
        app_id: &str,
        index_id: &str,
        data_source_id: &str,
    ) -> Result<StartedSyncJob> {
        self.send(ApiRequest::new(
            "StartDataSourceSyncJob",
            Method::POST,
            [
                "applications",
                app_id,
                "indices",
                index_id,
                "datasources",
                data_source_id,
                "startsync",
            ],
        ))
        .await
    }

    pub async fn stop_sync_job(
        &self,
        app_id: &str,
        index_id: &str,
        data_source_id: &str,
    ) -> Result<()> {
        let _: Value = self
            .send(ApiRequest::new(
                "StopDataSourceSyncJob",
                Method::POST,
                [
                    "applications",
                    app_id,
                    "indices",
                    index_id,
                    "datasources",
                    data_source_id,
                    "stopsync",
                ],
            ))
            .await?;
        Ok(())
    }

    /// Upload documents to a custom data source within a running sync job
    pub async fn put_documents(
        &self,
        app_id: &str,
        index_id: &str,
        sync_id: &str,
        documents: &[DocumentUpload],
    ) -> Result<BatchPutResult> {
        let documents: Vec<Value> = documents.iter().map(DocumentUpload::to_wire).collect();
        let result: BatchPutResult = self
            .send(
                ApiRequest::new(
                    "BatchPutDocument",
                    Method::POST,
                    ["applications", app_id, "indices", index_id, "documents"],
                )
                .body(json!({ "dataSourceSyncId": sync_id, "documents": documents })),
            )
            .await?;
        if !result.failed_documents.is_empty() {
            warn!(failed = result.failed_documents.len(), "Some documents were rejected");
        }
        Ok(result)
    }
}

fn present(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}

async fn read_attachment(path: &Path) -> Result<Value> {
    let missing = || {
        Error::AttachmentNotFound(std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf()))
    };
    let is_file = tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false);
    if !is_file {
        return Err(missing());
    }
    let name = path
        .file_name()
        .ok_or_else(missing)?
        .to_string_lossy()
        .into_owned();
    let data = tokio::fs::read(path).await?;
    Ok(json!({ "name": name, "data": STANDARD.encode(data) }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::federation::TemporaryCredential;
    use crate::qbusiness::testing::ScriptedTransport;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn client(transport: &Arc<ScriptedTransport>) -> QBusinessClient {
        QBusinessClient::with_transport(transport.clone(), ServiceIdentity::Ambient)
    }

    fn propagated(transport: &Arc<ScriptedTransport>) -> QBusinessClient {
        QBusinessClient::with_transport(
            transport.clone(),
            ServiceIdentity::Propagated(TemporaryCredential {
                access_key_id: "ASIA".into(),
                secret_access_key: "secret".into(),
                session_token: "token".into(),
                expiration: None,
            }),
        )
    }

    fn chat_reply() -> Value {
        json!({
            "conversationId": "c-1",
            "systemMessage": "Hello!",
            "systemMessageId": "s-1",
            "userMessageId": "u-1",
            "sourceAttributions": [{
                "citationNumber": 1,
                "snippet": "snippet",
                "title": "Doc",
                "url": "https://example.com/doc",
                "textMessageSegments": [{"beginOffset": 0, "endOffset": 5}],
                "updatedAt": 1_700_000_000
            }]
        })
    }

    fn conversation(id: &str, start: DateTime<Utc>) -> Value {
        json!({"conversationId": id, "title": id, "startTime": start.timestamp()})
    }

    fn data_source(id: &str, kind: &str) -> Value {
        json!({
            "dataSourceId": id, "displayName": id, "type": kind, "status": "ACTIVE",
            "createdAt": 1, "updatedAt": 1
        })
    }

    fn document(id: &str) -> Value {
        json!({"documentId": id, "status": "INDEXED", "createdAt": 1, "updatedAt": 1})
    }

    #[tokio::test]
    async fn chat_requires_user_id_for_ambient_identity() {
        let transport = Arc::new(ScriptedTransport::default());
        let err = client(&transport)
            .chat_sync(ChatRequest::new("app", "hi"))
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), MSG_MISSING_USER_ID);
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn chat_rejects_half_continuation() {
        for request in [
            ChatRequest {
                conversation_id: Some("c-1".into()),
                ..ChatRequest::new("app", "hi").user("jdoe")
            },
            ChatRequest {
                parent_message_id: Some("s-1".into()),
                ..ChatRequest::new("app", "hi").user("jdoe")
            },
        ] {
            let transport = Arc::new(ScriptedTransport::default());
            let err = client(&transport).chat_sync(request).await.unwrap_err();
            assert_eq!(err.to_string(), MSG_MISSING_CONV_SYSMSG_ID);
        }
    }

    #[tokio::test]
    async fn chat_sends_continuation_and_user() {
        let transport = Arc::new(ScriptedTransport::new(vec![chat_reply()]));
        let reply = client(&transport)
            .chat_sync(ChatRequest::new("app", "next?").user("jdoe").continuing("c-1", "s-0"))
            .await
            .unwrap();

        assert_eq!(reply.system_message, "Hello!");
        assert_eq!(reply.source_attributions[0].text_message_segments[0].end_offset, 5);

        let sent = &transport.requests()[0];
        assert_eq!(sent.path_string(), "/applications/app/conversations");
        assert_eq!(sent.query_value("userId"), Some("jdoe"));
        assert!(sent.query.iter().any(|(k, v)| k == "sync" && v.is_none()));
        let body = sent.body.as_ref().unwrap();
        assert_eq!(body["conversationId"], "c-1");
        assert_eq!(body["parentMessageId"], "s-0");
        assert_eq!(body["chatMode"], "RETRIEVAL_MODE");
        assert_eq!(body["clientToken"].as_str().unwrap().len(), 32);
    }

    #[tokio::test]
    async fn propagated_chat_never_sends_user_id() {
        let transport = Arc::new(ScriptedTransport::new(vec![chat_reply()]));
        propagated(&transport)
            .chat_sync_propagated(ChatRequest::new("app", "hi").user("ignored"))
            .await
            .unwrap();
        assert_eq!(transport.requests()[0].query_value("userId"), None);
    }

    #[tokio::test]
    async fn chat_reads_attachments_at_call_time() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.md");
        std::fs::File::create(&path).unwrap().write_all(b"# notes").unwrap();

        let transport = Arc::new(ScriptedTransport::new(vec![chat_reply()]));
        client(&transport)
            .chat_sync(ChatRequest::new("app", "summarize").user("jdoe").attach(&path))
            .await
            .unwrap();

        let body = transport.requests()[0].body.clone().unwrap();
        assert_eq!(body["attachments"][0]["name"], "notes.md");
        assert_eq!(body["attachments"][0]["data"], STANDARD.encode(b"# notes"));
    }

    #[tokio::test]
    async fn missing_attachment_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.md");
        let transport = Arc::new(ScriptedTransport::default());

        let err = client(&transport)
            .chat_sync(ChatRequest::new("app", "hi").user("jdoe").attach(&path))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::AttachmentNotFound(ref p) if p.ends_with("missing.md")));
        assert!(transport.requests().is_empty());
    }

    #[tokio::test]
    async fn conversations_require_user_id() {
        let transport = Arc::new(ScriptedTransport::default());
        let client = client(&transport);
        let err = client
            .conversations("app", None)
            .try_collect::<Vec<_>>()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Parameter(_)));
    }

    #[tokio::test]
    async fn delete_failure_becomes_false() {
        let transport = Arc::new(ScriptedTransport::with_results(vec![Err(Error::Api {
            status: 400,
            kind: "ValidationException".into(),
            message: "nope".into(),
        })]));
        assert!(!client(&transport)
            .delete_conversation("app", "c-1", Some("jdoe"))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn delete_without_user_propagates_parameter_error() {
        let transport = Arc::new(ScriptedTransport::default());
        let result = client(&transport).delete_conversation("app", "c-1", None).await;
        assert!(matches!(result, Err(Error::Parameter(_))));
    }

    #[tokio::test]
    async fn delete_by_age_boundary_is_inclusive() {
        let now = Utc::now();
        let age = Duration::hours(1);
        let cutoff = now - age;
        let transport = Arc::new(ScriptedTransport::new(vec![
            json!({"conversations": [
                conversation("old", cutoff - Duration::days(2)),
                conversation("edge", cutoff),
                conversation("new", cutoff + Duration::minutes(5)),
            ]}),
            json!({}),
            json!({}),
        ]));

        let ok = client(&transport)
            .delete_conversations_started_before("app", Some("jdoe"), cutoff)
            .await
            .unwrap();

        assert!(ok);
        let deleted: Vec<String> = transport
            .requests()
            .iter()
            .filter(|r| r.operation == "DeleteConversation")
            .map(|r| r.path.last().cloned().unwrap())
            .collect();
        assert_eq!(deleted, ["old", "edge"]);
    }

    #[tokio::test]
    async fn delete_by_age_zero_deletes_everything_started() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            json!({"conversations": [conversation("a", Utc::now() - Duration::seconds(5))]}),
            json!({}),
        ]));
        assert!(client(&transport)
            .delete_conversations_by_age("app", Some("jdoe"), None)
            .await
            .unwrap());
        assert_eq!(transport.operations(), ["ListConversations", "DeleteConversation"]);
    }

    #[tokio::test]
    async fn delete_by_age_aborts_on_first_failure() {
        let old = Utc::now() - Duration::days(3);
        let transport = Arc::new(ScriptedTransport::with_results(vec![
            Ok(json!({"conversations": [conversation("a", old), conversation("b", old)]})),
            Err(Error::Upstream("boom".into())),
        ]));

        let ok = client(&transport)
            .delete_conversations_by_age("app", Some("jdoe"), Some(Duration::days(1)))
            .await
            .unwrap();
        assert!(!ok);
        assert_eq!(transport.operations(), ["ListConversations", "DeleteConversation"]);
    }

    #[tokio::test]
    async fn documents_traverse_each_data_source() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            json!({"documentDetailList": [document("d1")], "nextToken": "t"}),
            json!({"documentDetailList": [document("d2")]}),
            json!({"documentDetailList": [document("d3")]}),
        ]));
        let client = client(&transport);
        let ids: Vec<String> = client
            .documents("app", "idx", &["ds-1".to_string(), "ds-2".to_string()])
            .map_ok(|d| d.document_id)
            .try_collect()
            .await
            .unwrap();

        assert_eq!(ids, ["d1", "d2", "d3"]);
        let requests = transport.requests();
        assert_eq!(requests[0].path_string(), "/applications/app/index/idx/documents");
        assert_eq!(requests[1].query_value("dataSourceIds"), Some("ds-1"));
        assert_eq!(requests[2].query_value("dataSourceIds"), Some("ds-2"));
    }

    #[tokio::test]
    async fn documents_by_type_filters_data_sources() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            json!({"indices": [{
                "indexId": "idx", "displayName": "Main", "status": "ACTIVE",
                "createdAt": 1, "updatedAt": 1
            }]}),
            json!({"dataSources": [data_source("s3", "S3"), data_source("wiki", "CONFLUENCE")]}),
            json!({"documentDetailList": [document("page-1")]}),
        ]));
        let client = client(&transport);
        let docs: Vec<DocumentDetail> = client
            .documents_by_datasource_type("app", Some(DataSourceType::Confluence))
            .try_collect()
            .await
            .unwrap();

        assert_eq!(docs.len(), 1);
        assert_eq!(
            transport.requests()[2].query_value("dataSourceIds"),
            Some("wiki")
        );
    }

    #[tokio::test]
    async fn ai_fallback_reads_first_scope() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            json!({"nextToken": "t"}),
            json!({"responseScope": "EXTENDED_KNOWLEDGE_ENABLED"}),
        ]));
        assert!(client(&transport).is_ai_fallback_allowed("app").await.unwrap());
    }

    #[tokio::test]
    async fn ai_fallback_without_scope_is_error() {
        let transport = Arc::new(ScriptedTransport::new(vec![json!({})]));
        let err = client(&transport).is_ai_fallback_allowed("app").await.unwrap_err();
        assert_eq!(err.to_string(), "AI chat response scope setting not found.");
    }

    #[tokio::test]
    async fn toggles_send_wire_values() {
        let transport = Arc::new(ScriptedTransport::new(vec![json!({}), json!({})]));
        let client = client(&transport);
        client.allow_ai_fallback("app", false).await.unwrap();
        client.allow_creator_mode("app", true).await.unwrap();

        let requests = transport.requests();
        assert_eq!(requests[0].method, Method::PATCH);
        assert_eq!(
            requests[0].body.as_ref().unwrap()["responseScope"],
            "ENTERPRISE_CONTENT_ONLY"
        );
        assert_eq!(
            requests[1].body.as_ref().unwrap()["creatorModeConfiguration"]["creatorModeControl"],
            "ENABLED"
        );
    }

    #[tokio::test]
    async fn creator_mode_defaults_to_false() {
        let transport = Arc::new(ScriptedTransport::new(vec![json!({
            "responseScope": "ENTERPRISE_CONTENT_ONLY"
        })]));
        assert!(!client(&transport).is_creator_mode_allowed("app").await.unwrap());
    }

    #[tokio::test]
    async fn missing_user_is_a_lookup_result() {
        let transport = Arc::new(ScriptedTransport::with_results(vec![Err(Error::NotFound(
            "User not found".into(),
        ))]));
        assert_eq!(
            client(&transport).get_user("app", "jdoe@example.com").await.unwrap(),
            Lookup::NotFound
        );
    }

    #[tokio::test]
    async fn alias_upsert_is_idempotent() {
        let existing = json!({"userAliases": [
            {"indexId": "idx", "dataSourceId": "ds", "userId": "jdoe"}
        ]});
        let transport = Arc::new(ScriptedTransport::with_results(vec![
            Err(Error::NotFound("missing".into())),
            Ok(json!({})),
            Ok(existing),
        ]));
        let client = client(&transport);

        let first = client
            .add_user_alias("jdoe@example.com", "jdoe", "app", "idx", "ds")
            .await
            .unwrap();
        let second = client
            .add_user_alias("jdoe@example.com", "jdoe", "app", "idx", "ds")
            .await
            .unwrap();

        assert_eq!(first, AliasOutcome::Created);
        assert_eq!(second, AliasOutcome::Unchanged);
        assert_eq!(transport.operations(), ["GetUser", "CreateUser", "GetUser"]);
        let create = &transport.requests()[1];
        assert_eq!(
            create.body.as_ref().unwrap()["userAliases"],
            json!([{"indexId": "idx", "dataSourceId": "ds", "userId": "jdoe"}])
        );
    }

    #[tokio::test]
    async fn alias_added_to_existing_user() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            json!({"userAliases": [{"indexId": "idx", "dataSourceId": "other", "userId": "jdoe"}]}),
            json!({}),
        ]));
        let outcome = client(&transport)
            .add_user_alias("jdoe@example.com", "jdoe", "app", "idx", "ds")
            .await
            .unwrap();
        assert_eq!(outcome, AliasOutcome::Updated);
        assert_eq!(transport.requests()[1].method, Method::PUT);
    }

    #[tokio::test]
    async fn custom_data_source_lifecycle() {
        let transport = Arc::new(ScriptedTransport::new(vec![
            json!({"dataSourceId": "ds-9", "dataSourceArn": "arn:ds-9"}),
            json!({"executionId": "exec-1"}),
            json!({"failedDocuments": []}),
            json!({}),
        ]));
        let client = client(&transport);

        let created = client.create_custom_data_source("app", "idx", "Uploads").await.unwrap();
        let job = client.start_sync_job("app", "idx", &created.data_source_id).await.unwrap();
        let result = client
            .put_documents(
                "app",
                "idx",
                &job.execution_id,
                &[DocumentUpload {
                    id: "doc-1".into(),
                    title: None,
                    content_type: "PLAIN_TEXT".into(),
                    content: b"hello".to_vec(),
                }],
            )
            .await
            .unwrap();
        client.stop_sync_job("app", "idx", "ds-9").await.unwrap();

        assert!(result.failed_documents.is_empty());
        let requests = transport.requests();
        assert_eq!(
            requests[0].body.as_ref().unwrap()["configuration"],
            json!({"type": "CUSTOM", "version": "1.0.0"})
        );
        assert_eq!(requests[1].path.last().map(String::as_str), Some("startsync"));
        assert_eq!(requests[2].body.as_ref().unwrap()["dataSourceSyncId"], "exec-1");
        assert_eq!(requests[3].path.last().map(String::as_str), Some("stopsync"));
    }
}
