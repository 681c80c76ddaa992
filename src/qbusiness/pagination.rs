//! Token-based pagination
//!
//! A page is fetched only when the consumer has drained the previous one.
//! Traversal ends when `nextToken` is absent or empty.

use async_stream::try_stream;
use futures::Stream;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::trace;

use super::model::{
    Application, ChatControlsConfiguration, Conversation, DataSource, DocumentDetail, Index,
};
use super::transport::{ApiRequest, Transport};
use crate::{Error, Result};

/// Query parameter carrying the continuation token
pub const NEXT_TOKEN: &str = "nextToken";

/// A deserialized page of any paginated operation
pub(crate) trait Page: DeserializeOwned + Send {
    fn next_token(&self) -> Option<&str>;
}

/// A page holding a list of records
pub(crate) trait Listing: Page {
    type Item: Send;

    fn into_items(self) -> Vec<Self::Item>;
}

/// Stream every page of `request`, parsing each into `P`
pub(crate) fn pages<'a, P>(
    transport: &'a dyn Transport,
    request: ApiRequest,
) -> impl Stream<Item = Result<P>> + Send + 'a
where
    P: Page + 'a,
{
    try_stream! {
        let mut next_token: Option<String> = None;
        let mut page_number = 0_u32;
        loop {
            let mut page_request = request.clone();
            if let Some(token) = next_token.take() {
                page_request = page_request.query(NEXT_TOKEN, token);
            }
            let operation = page_request.operation;
            let raw = transport.call(page_request).await?;
            let page: P = serde_json::from_value(raw).map_err(|e| Error::schema(operation, e))?;

            page_number += 1;
            next_token = page
                .next_token()
                .filter(|token| !token.is_empty())
                .map(str::to_string);
            trace!(operation, page = page_number, more = next_token.is_some(), "Fetched page");

            let last = next_token.is_none();
            yield page;
            if last {
                break;
            }
        }
    }
}

/// Stream every record of a paginated listing
pub(crate) fn items<'a, P>(
    transport: &'a dyn Transport,
    request: ApiRequest,
) -> impl Stream<Item = Result<P::Item>> + Send + 'a
where
    P: Listing + 'a,
{
    try_stream! {
        for await page in pages::<P>(transport, request) {
            for item in page?.into_items() {
                yield item;
            }
        }
    }
}

macro_rules! listing {
    ($page:ident, $field:ident, $wire:literal, $item:ty) => {
        #[derive(Debug, Deserialize)]
        pub(crate) struct $page {
            #[serde(default, rename = "nextToken")]
            next_token: Option<String>,
            #[serde(default, rename = $wire)]
            $field: Vec<$item>,
        }

        impl Page for $page {
            fn next_token(&self) -> Option<&str> {
                self.next_token.as_deref()
            }
        }

        impl Listing for $page {
            type Item = $item;

            fn into_items(self) -> Vec<$item> {
                self.$field
            }
        }
    };
}

listing!(ApplicationsPage, applications, "applications", Application);
listing!(IndicesPage, indices, "indices", Index);
listing!(DataSourcesPage, data_sources, "dataSources", DataSource);
listing!(DocumentsPage, documents, "documentDetailList", DocumentDetail);
listing!(ConversationsPage, conversations, "conversations", Conversation);

impl Page for ChatControlsConfiguration {
    fn next_token(&self) -> Option<&str> {
        self.next_token.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qbusiness::testing::ScriptedTransport;
    use futures::{StreamExt, TryStreamExt, pin_mut};
    use reqwest::Method;
    use serde_json::json;

    fn app(id: &str) -> serde_json::Value {
        json!({
            "applicationId": id,
            "displayName": id,
            "createdAt": 1_700_000_000,
            "updatedAt": 1_700_000_000,
            "status": "ACTIVE"
        })
    }

    fn list_request() -> ApiRequest {
        ApiRequest::new("ListApplications", Method::GET, ["applications"])
    }

    #[tokio::test]
    async fn flattens_pages_in_order() {
        let transport = ScriptedTransport::new(vec![
            json!({"applications": [app("a"), app("b")], "nextToken": "t1"}),
            json!({"applications": [], "nextToken": "t2"}),
            json!({"applications": [app("c")]}),
        ]);

        let ids: Vec<String> = items::<ApplicationsPage>(&transport, list_request())
            .map_ok(|a| a.application_id)
            .try_collect()
            .await
            .unwrap();

        assert_eq!(ids, ["a", "b", "c"]);
        let requests = transport.requests();
        assert_eq!(requests.len(), 3);
        assert_eq!(requests[0].query_value(NEXT_TOKEN), None);
        assert_eq!(requests[1].query_value(NEXT_TOKEN), Some("t1"));
        assert_eq!(requests[2].query_value(NEXT_TOKEN), Some("t2"));
    }

    #[tokio::test]
    async fn empty_token_ends_traversal() {
        let transport = ScriptedTransport::new(vec![
            json!({"applications": [app("a")], "nextToken": ""}),
            json!({"applications": [app("never")]}),
        ]);

        let all: Vec<Application> = items::<ApplicationsPage>(&transport, list_request())
            .try_collect()
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn next_page_is_fetched_lazily() {
        let transport = ScriptedTransport::new(vec![
            json!({"applications": [app("a"), app("b")], "nextToken": "t1"}),
            json!({"applications": [app("c")]}),
        ]);

        let stream = items::<ApplicationsPage>(&transport, list_request());
        pin_mut!(stream);
        stream.next().await.unwrap().unwrap();
        stream.next().await.unwrap().unwrap();
        assert_eq!(transport.requests().len(), 1);
        stream.next().await.unwrap().unwrap();
        assert_eq!(transport.requests().len(), 2);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn schema_mismatch_is_reported_per_operation() {
        let transport = ScriptedTransport::new(vec![json!({
            "applications": [{"applicationId": "a"}]
        })]);

        let err = items::<ApplicationsPage>(&transport, list_request())
            .try_collect::<Vec<_>>()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Schema { operation: "ListApplications", .. }));
    }
}
