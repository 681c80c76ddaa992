//! Transport for Q Business REST-JSON calls
//!
//! The façade builds [`ApiRequest`]s and parses the raw JSON it gets back.
//! [`HttpTransport`] signs each request with SigV4 and sends it with reqwest.

use std::fmt;
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use aws_credential_types::Credentials;
use aws_credential_types::provider::{ProvideCredentials, SharedCredentialsProvider};
use aws_sigv4::http_request::{SignableBody, SignableRequest, SigningSettings, sign};
use aws_sigv4::sign::v4;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::federation::TemporaryCredential;
use crate::{Error, Result};

/// SigV4 service name
pub const SERVICE_NAME: &str = "qbusiness";

/// Timeout for a single API call
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

const PROVIDER_NAME: &str = "qbapi-tools";

/// Credentials a [`QBusinessClient`](super::QBusinessClient) acts with
#[derive(Debug, Clone)]
pub enum ServiceIdentity {
    /// Caller's default credential chain; every user-scoped call names a user
    Ambient,
    /// Temporary credential bound to the signed-in user; user ids are never sent
    Propagated(TemporaryCredential),
}

impl ServiceIdentity {
    /// Whether the identity carries the user with it
    pub fn is_propagated(&self) -> bool {
        matches!(self, Self::Propagated(_))
    }
}

/// One REST call: method, path segments, query and optional JSON body
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    /// API operation name, used in logs and schema errors
    pub operation: &'static str,
    pub method: Method,
    /// Unencoded path segments
    pub path: Vec<String>,
    /// Query parameters; `None` values are sent as bare keys
    pub query: Vec<(String, Option<String>)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new<I, S>(operation: &'static str, method: Method, path: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            operation,
            method,
            path: path.into_iter().map(Into::into).collect(),
            query: Vec::new(),
            body: None,
        }
    }

    #[must_use]
    pub fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), Some(value.into())));
        self
    }

    #[must_use]
    pub fn flag(mut self, key: &str) -> Self {
        self.query.push((key.to_string(), None));
        self
    }

    #[must_use]
    pub fn body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Value of the first query parameter named `key`
    pub fn query_value(&self, key: &str) -> Option<&str> {
        self.query
            .iter()
            .find(|(k, _)| k == key)
            .and_then(|(_, v)| v.as_deref())
    }

    /// `/`-joined path, for logging
    pub fn path_string(&self) -> String {
        format!("/{}", self.path.join("/"))
    }
}

/// Sends API requests and returns the raw JSON payload
#[async_trait]
pub trait Transport: Send + Sync {
    /// Perform `request`
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for a missing resource and [`Error::Api`]
    /// for any other service error.
    async fn call(&self, request: ApiRequest) -> Result<Value>;
}

/// SigV4-signed HTTP transport
#[derive(Clone)]
pub struct HttpTransport {
    http: Client,
    endpoint: Url,
    region: String,
    credentials: SharedCredentialsProvider,
}

impl fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpTransport")
            .field("endpoint", &self.endpoint.as_str())
            .field("region", &self.region)
            .finish_non_exhaustive()
    }
}

/// Regional endpoint of the service
pub fn default_endpoint(region: &str) -> String {
    format!("https://{SERVICE_NAME}.{region}.api.aws")
}

impl HttpTransport {
    /// Transport for `identity` in `region`, optionally at a custom endpoint
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoint is not a URL, or ambient credentials
    /// are requested and none are configured.
    pub async fn connect(
        identity: &ServiceIdentity,
        region: &str,
        endpoint: Option<&str>,
    ) -> Result<Self> {
        let credentials = match identity {
            ServiceIdentity::Ambient => aws_config::load_from_env()
                .await
                .credentials_provider()
                .ok_or_else(|| Error::Config("No AWS credentials configured".to_string()))?,
            ServiceIdentity::Propagated(credential) => {
                SharedCredentialsProvider::new(static_credentials(credential))
            }
        };
        let endpoint = endpoint.map_or_else(|| default_endpoint(region), str::to_string);
        Self::new(Client::new(), &endpoint, region, credentials)
    }

    /// Transport with explicit parts
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `endpoint` is not a URL.
    pub fn new(
        http: Client,
        endpoint: &str,
        region: &str,
        credentials: SharedCredentialsProvider,
    ) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| Error::Config(format!("Invalid endpoint {endpoint}: {e}")))?;
        Ok(Self {
            http,
            endpoint,
            region: region.to_string(),
            credentials,
        })
    }

    fn url_for(&self, request: &ApiRequest) -> Result<Url> {
        let mut url = self.endpoint.clone();
        url.path_segments_mut()
            .map_err(|()| Error::Config(format!("Endpoint cannot be a base: {}", self.endpoint)))?
            .pop_if_empty()
            .extend(&request.path);
        if !request.query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in &request.query {
                match value {
                    Some(value) => pairs.append_pair(key, value),
                    None => pairs.append_key_only(key),
                };
            }
        }
        Ok(url)
    }

    async fn signed_headers(
        &self,
        method: &Method,
        url: &Url,
        headers: &[(&str, &str)],
        body: &[u8],
    ) -> Result<Vec<(String, String)>> {
        let credentials = self
            .credentials
            .provide_credentials()
            .await
            .map_err(|e| Error::Signing(format!("Unable to load credentials: {e}")))?;
        let identity = credentials.into();

        let params = v4::SigningParams::builder()
            .identity(&identity)
            .region(&self.region)
            .name(SERVICE_NAME)
            .time(SystemTime::now())
            .settings(SigningSettings::default())
            .build()
            .map_err(|e| Error::Signing(e.to_string()))?
            .into();

        let signable = SignableRequest::new(
            method.as_str(),
            url.as_str(),
            headers.iter().copied(),
            SignableBody::Bytes(body),
        )
        .map_err(|e| Error::Signing(e.to_string()))?;

        let (instructions, _signature) = sign(signable, &params)
            .map_err(|e| Error::Signing(e.to_string()))?
            .into_parts();

        Ok(instructions
            .headers()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect())
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn call(&self, request: ApiRequest) -> Result<Value> {
        let url = self.url_for(&request)?;
        let body = match &request.body {
            Some(body) => serde_json::to_vec(body)?,
            None => Vec::new(),
        };
        let headers = [("content-type", "application/json")];
        let signed = self
            .signed_headers(&request.method, &url, &headers, &body)
            .await?;

        debug!(
            operation = request.operation,
            method = %request.method,
            path = %request.path_string(),
            "Q Business request"
        );

        let mut builder = self
            .http
            .request(request.method.clone(), url)
            .timeout(REQUEST_TIMEOUT)
            .body(body);
        for (name, value) in headers {
            builder = builder.header(name, value);
        }
        for (name, value) in signed {
            builder = builder.header(name, value);
        }

        let response = builder.send().await?;
        let status = response.status();
        let error_type = response
            .headers()
            .get("x-amzn-errortype")
            .and_then(|v| v.to_str().ok())
            .map(|v| v.split(':').next().unwrap_or(v).to_string());
        let bytes = response.bytes().await?;
        let payload: Value = if bytes.is_empty() {
            Value::Object(serde_json::Map::new())
        } else {
            serde_json::from_slice(&bytes).map_err(|e| Error::schema(request.operation, e))?
        };

        if status.is_success() {
            return Ok(payload);
        }

        let message = payload
            .get("message")
            .or_else(|| payload.get("Message"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        debug!(
            operation = request.operation,
            status = %status,
            kind = ?error_type,
            "Q Business request failed"
        );

        if status == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(message));
        }
        Err(Error::Api {
            status: status.as_u16(),
            kind: error_type.unwrap_or_else(|| "UnknownError".to_string()),
            message,
        })
    }
}

fn static_credentials(credential: &TemporaryCredential) -> Credentials {
    Credentials::new(
        credential.access_key_id.clone(),
        credential.secret_access_key.clone(),
        Some(credential.session_token.clone()),
        credential.expiration.map(SystemTime::from),
        PROVIDER_NAME,
    )
}
