//! Typed records of the Q Business API
//!
//! Read-only projections of the JSON payloads. Required fields are enforced
//! at deserialization; unknown fields are ignored.

use std::fmt;
use std::str::FromStr;

use base64::{Engine as _, engine::general_purpose::STANDARD};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Data source connector types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DataSourceType {
    S3,
    Sharepoint,
    Database,
    Salesforce,
    Onedrive,
    Servicenow,
    Custom,
    Confluence,
    Googledrive,
    Webcrawler,
    Workdocs,
    Fsx,
    Slack,
    Box,
    Quip,
    Jira,
    Github,
    Alfresco,
}

impl DataSourceType {
    /// Every supported type
    pub const ALL: [Self; 18] = [
        Self::S3,
        Self::Sharepoint,
        Self::Database,
        Self::Salesforce,
        Self::Onedrive,
        Self::Servicenow,
        Self::Custom,
        Self::Confluence,
        Self::Googledrive,
        Self::Webcrawler,
        Self::Workdocs,
        Self::Fsx,
        Self::Slack,
        Self::Box,
        Self::Quip,
        Self::Jira,
        Self::Github,
        Self::Alfresco,
    ];

    /// Wire name, e.g. `CONFLUENCE`
    pub fn as_str(self) -> &'static str {
        match self {
            Self::S3 => "S3",
            Self::Sharepoint => "SHAREPOINT",
            Self::Database => "DATABASE",
            Self::Salesforce => "SALESFORCE",
            Self::Onedrive => "ONEDRIVE",
            Self::Servicenow => "SERVICENOW",
            Self::Custom => "CUSTOM",
            Self::Confluence => "CONFLUENCE",
            Self::Googledrive => "GOOGLEDRIVE",
            Self::Webcrawler => "WEBCRAWLER",
            Self::Workdocs => "WORKDOCS",
            Self::Fsx => "FSX",
            Self::Slack => "SLACK",
            Self::Box => "BOX",
            Self::Quip => "QUIP",
            Self::Jira => "JIRA",
            Self::Github => "GITHUB",
            Self::Alfresco => "ALFRESCO",
        }
    }
}

impl fmt::Display for DataSourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataSourceType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| Error::Parameter(format!("Unknown data source type: {s}")))
    }
}

/// Whether chat answers may draw on model knowledge beyond enterprise content
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResponseScope {
    EnterpriseContentOnly,
    ExtendedKnowledgeEnabled,
}

/// Chat mode of a `ChatSync` call
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChatMode {
    #[default]
    RetrievalMode,
    CreatorMode,
    PluginMode,
}

impl FromStr for ChatMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "RETRIEVAL_MODE" | "RETRIEVAL" => Ok(Self::RetrievalMode),
            "CREATOR_MODE" | "CREATOR" => Ok(Self::CreatorMode),
            "PLUGIN_MODE" | "PLUGIN" => Ok(Self::PluginMode),
            _ => Err(Error::Parameter(format!("Unknown chat mode: {s}"))),
        }
    }
}

/// Creator mode switch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CreatorModeControl {
    Enabled,
    Disabled,
}

/// Q Business application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub application_id: String,
    pub display_name: String,
    #[serde(deserialize_with = "timestamp::required")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "timestamp::required")]
    pub updated_at: DateTime<Utc>,
    pub status: String,
}

/// Index of an application
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Index {
    pub index_id: String,
    pub display_name: String,
    #[serde(deserialize_with = "timestamp::required")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "timestamp::required")]
    pub updated_at: DateTime<Utc>,
    pub status: String,
}

/// Data source attached to an index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataSource {
    pub data_source_id: String,
    pub display_name: String,
    #[serde(deserialize_with = "timestamp::required")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "timestamp::required")]
    pub updated_at: DateTime<Utc>,
    pub status: String,
    /// Connector type as reported; may name a type this crate does not know
    #[serde(rename = "type")]
    pub data_source_type: String,
}

impl DataSource {
    /// Connector type, if it is one of [`DataSourceType::ALL`]
    pub fn source_type(&self) -> Option<DataSourceType> {
        self.data_source_type.parse().ok()
    }
}

/// Indexing failure of a document
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentIndexError {
    #[serde(default)]
    pub error_code: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Indexed document status
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentDetail {
    pub document_id: String,
    #[serde(default)]
    pub error: DocumentIndexError,
    #[serde(deserialize_with = "timestamp::required")]
    pub created_at: DateTime<Utc>,
    #[serde(deserialize_with = "timestamp::required")]
    pub updated_at: DateTime<Utc>,
    pub status: String,
}

/// Chat conversation summary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub conversation_id: String,
    pub title: String,
    #[serde(deserialize_with = "timestamp::required")]
    pub start_time: DateTime<Utc>,
}

/// Span of the reply a citation supports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextMessageSegment {
    pub begin_offset: i64,
    pub end_offset: i64,
}

/// Citation attached to a chat reply
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceAttribution {
    pub citation_number: u32,
    pub snippet: String,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub text_message_segments: Vec<TextMessageSegment>,
    #[serde(default, deserialize_with = "timestamp::optional")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Reply to a `ChatSync` call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSyncResponse {
    pub conversation_id: String,
    pub system_message: String,
    pub system_message_id: String,
    pub user_message_id: String,
    #[serde(default)]
    pub source_attributions: Vec<SourceAttribution>,
}

/// Creator mode setting of the chat controls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorModeConfiguration {
    pub creator_mode_control: CreatorModeControl,
}

/// One page of `GetChatControlsConfiguration`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatControlsConfiguration {
    #[serde(default)]
    pub next_token: Option<String>,
    #[serde(default)]
    pub response_scope: Option<ResponseScope>,
    #[serde(default)]
    pub creator_mode_configuration: Option<CreatorModeConfiguration>,
}

/// Mapping of a user to a data source identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAlias {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_source_id: Option<String>,
    pub user_id: String,
}

impl UserAlias {
    /// Alias scoped to one index and data source
    pub fn new(index_id: &str, data_source_id: &str, user_id: &str) -> Self {
        Self {
            index_id: Some(index_id.to_string()),
            data_source_id: Some(data_source_id.to_string()),
            user_id: user_id.to_string(),
        }
    }
}

/// Aliases registered for a user (`GetUser`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAliases {
    #[serde(default)]
    pub user_aliases: Vec<UserAlias>,
}

impl UserAliases {
    /// Whether `alias` is registered exactly
    pub fn contains(&self, alias: &UserAlias) -> bool {
        self.user_aliases.iter().any(|a| a == alias)
    }
}

/// Result of a lookup that may legitimately find nothing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    NotFound,
}

impl<T> Lookup<T> {
    /// Convert into an `Option`
    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            Self::NotFound => None,
        }
    }
}

/// What an alias upsert did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasOutcome {
    /// User did not exist and was created with the alias
    Created,
    /// Alias was added to an existing user
    Updated,
    /// User already had the alias
    Unchanged,
}

/// Response of `CreateDataSource`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedDataSource {
    pub data_source_id: String,
    #[serde(default)]
    pub data_source_arn: Option<String>,
}

/// Response of `StartDataSourceSyncJob`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartedSyncJob {
    pub execution_id: String,
}

/// Document rejected by `BatchPutDocument`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedDocument {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub error: DocumentIndexError,
    #[serde(default)]
    pub data_source_id: Option<String>,
}

/// Response of `BatchPutDocument`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchPutResult {
    #[serde(default)]
    pub failed_documents: Vec<FailedDocument>,
}

/// Document uploaded to a custom data source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentUpload {
    pub id: String,
    pub title: Option<String>,
    /// Wire content type, e.g. `PLAIN_TEXT`, `MD`, `PDF`
    pub content_type: String,
    pub content: Vec<u8>,
}

impl DocumentUpload {
    pub(crate) fn to_wire(&self) -> serde_json::Value {
        let mut doc = serde_json::json!({
            "id": self.id,
            "contentType": self.content_type,
            "content": { "blob": STANDARD.encode(&self.content) },
        });
        if let Some(title) = &self.title {
            doc["title"] = serde_json::Value::String(title.clone());
        }
        doc
    }
}

/// Timestamps arrive as epoch seconds (possibly fractional) or RFC 3339
pub(crate) mod timestamp {
    use chrono::{DateTime, Utc};
    use serde::{Deserialize, Deserializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Seconds(f64),
        Text(String),
    }

    fn convert<E: serde::de::Error>(raw: Raw) -> Result<DateTime<Utc>, E> {
        match raw {
            Raw::Seconds(secs) => {
                let whole = secs.floor();
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let (seconds, nanos) = (whole as i64, ((secs - whole) * 1e9).round() as u32);
                DateTime::from_timestamp(seconds, nanos.min(999_999_999))
                    .ok_or_else(|| E::custom(format!("timestamp out of range: {secs}")))
            }
            Raw::Text(text) => DateTime::parse_from_rfc3339(&text)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| E::custom(format!("invalid timestamp {text:?}: {e}"))),
        }
    }

    pub fn required<'de, D: Deserializer<'de>>(d: D) -> Result<DateTime<Utc>, D::Error> {
        convert(Raw::deserialize(d)?)
    }

    pub fn optional<'de, D: Deserializer<'de>>(d: D) -> Result<Option<DateTime<Utc>>, D::Error> {
        Option::<Raw>::deserialize(d)?
            .map(convert::<D::Error>)
            .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn application_accepts_epoch_and_rfc3339() {
        let app: Application = serde_json::from_value(json!({
            "applicationId": "app-1",
            "displayName": "Demo",
            "createdAt": 1_700_000_000.5,
            "updatedAt": "2023-11-14T22:13:20Z",
            "status": "ACTIVE",
            "identityType": "AWS_IAM_IDC"
        }))
        .unwrap();

        assert_eq!(app.created_at.timestamp(), 1_700_000_000);
        assert_eq!(app.created_at.timestamp_subsec_millis(), 500);
        assert_eq!(app.updated_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn missing_required_field_is_rejected() {
        let err = serde_json::from_value::<Conversation>(json!({
            "conversationId": "c-1",
            "startTime": 1_700_000_000
        }))
        .unwrap_err();
        assert!(err.to_string().contains("title"));
    }

    #[test]
    fn data_source_type_parses_case_insensitively() {
        assert_eq!("confluence".parse::<DataSourceType>().unwrap(), DataSourceType::Confluence);
        assert_eq!(DataSourceType::Googledrive.to_string(), "GOOGLEDRIVE");
        assert!("GOPHER".parse::<DataSourceType>().is_err());
    }

    #[test]
    fn data_source_keeps_unknown_type() {
        let ds: DataSource = serde_json::from_value(json!({
            "dataSourceId": "ds-1",
            "displayName": "Wiki",
            "createdAt": 1,
            "updatedAt": 2,
            "status": "ACTIVE",
            "type": "NEWCONNECTOR"
        }))
        .unwrap();
        assert_eq!(ds.data_source_type, "NEWCONNECTOR");
        assert_eq!(ds.source_type(), None);
    }

    #[test]
    fn chat_response_defaults_attributions() {
        let resp: ChatSyncResponse = serde_json::from_value(json!({
            "conversationId": "c-1",
            "systemMessage": "Hello",
            "systemMessageId": "s-1",
            "userMessageId": "u-1"
        }))
        .unwrap();
        assert!(resp.source_attributions.is_empty());

        let out = serde_json::to_value(&resp).unwrap();
        assert_eq!(out["systemMessage"], "Hello");
    }

    #[test]
    fn enums_use_wire_names() {
        assert_eq!(
            serde_json::to_value(ResponseScope::ExtendedKnowledgeEnabled).unwrap(),
            json!("EXTENDED_KNOWLEDGE_ENABLED")
        );
        assert_eq!(serde_json::to_value(ChatMode::default()).unwrap(), json!("RETRIEVAL_MODE"));
        assert_eq!("creator".parse::<ChatMode>().unwrap(), ChatMode::CreatorMode);
    }

    #[test]
    fn alias_membership_is_exact() {
        let aliases = UserAliases {
            user_aliases: vec![UserAlias::new("idx", "ds", "jdoe")],
        };
        assert!(aliases.contains(&UserAlias::new("idx", "ds", "jdoe")));
        assert!(!aliases.contains(&UserAlias::new("idx", "ds2", "jdoe")));
    }

    #[test]
    fn upload_encodes_blob() {
        let doc = DocumentUpload {
            id: "doc-1".into(),
            title: Some("Readme".into()),
            content_type: "PLAIN_TEXT".into(),
            content: b"hi".to_vec(),
        };
        assert_eq!(
            doc.to_wire(),
            json!({"id": "doc-1", "title": "Readme", "contentType": "PLAIN_TEXT", "content": {"blob": "aGk="}})
        );
    }
}
