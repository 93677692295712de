use http::Method;
use serde::Serialize;
use serde_json::Value as JsonValue;

use super::types::{Collection, CollectionDraft, CollectionId, CollectionQuery};
use crate::client::{ApiClient, RequestOptions};
use crate::error::Error;

#[derive(Serialize)]
struct ParseUrlRequest<'a> {
    url: &'a str,
}

/// Saved links.
#[derive(Debug, Clone, Copy)]
pub struct Collections<'a> {
    client: &'a ApiClient,
}

impl<'a> Collections<'a> {
    pub(crate) fn new(client: &'a ApiClient) -> Self {
        Self { client }
    }

    /// An envelope without data is an empty page.
    pub async fn list(&self, query: &CollectionQuery) -> Result<Vec<Collection>, Error> {
        let options = query
            .pairs()
            .into_iter()
            .fold(RequestOptions::new(), |options, (key, value)| {
                options.with_query(key, value)
            });
        self.client.fetch_list("/collections", options).await
    }

    pub async fn get(&self, id: CollectionId) -> Result<Collection, Error> {
        self.client
            .fetch(Method::GET, &path(id), RequestOptions::default())
            .await
    }

    pub async fn create(&self, draft: &CollectionDraft) -> Result<Collection, Error> {
        self.client
            .submit(Method::POST, "/collections", draft, RequestOptions::default())
            .await
    }

    pub async fn update(
        &self,
        id: CollectionId,
        draft: &CollectionDraft,
    ) -> Result<Collection, Error> {
        self.client
            .submit(Method::PUT, &path(id), draft, RequestOptions::default())
            .await
    }

    pub async fn delete(&self, id: CollectionId) -> Result<(), Error> {
        self.client.perform(Method::DELETE, &path(id)).await
    }

    pub async fn like(&self, id: CollectionId) -> Result<(), Error> {
        self.client
            .perform(Method::POST, &format!("{}/like", path(id)))
            .await
    }

    pub async fn unlike(&self, id: CollectionId) -> Result<(), Error> {
        self.client
            .perform(Method::DELETE, &format!("{}/like", path(id)))
            .await
    }

    /// Ask the server what it can extract from `url`. The result shape
    /// depends on the platform, so it is returned as raw JSON.
    pub async fn parse_url(&self, url: &str) -> Result<JsonValue, Error> {
        let envelope: crate::types::ApiEnvelope<JsonValue> = self
            .client
            .request_with_body(
                Method::POST,
                "/collections/parse-url",
                &ParseUrlRequest { url },
                RequestOptions::default(),
            )
            .await?;
        Ok(envelope.data.unwrap_or(JsonValue::Null))
    }
}

fn path(id: CollectionId) -> String {
    format!("/collections/{id}")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use http::StatusCode;
    use serde_json::json;

    use super::*;
    use crate::api::types::{CategoryId, Platform};
    use crate::session::SessionStore;
    use crate::testing::FakeServer;
    use crate::transport::ApiResponse;
    use crate::types::Credential;

    fn collection(id: i64, title: &str) -> JsonValue {
        json!({
            "id": id,
            "user_id": 7,
            "platform": "bilibili",
            "content_id": "BV1xx411c7mD",
            "title": title,
            "url": "https://www.bilibili.com/video/BV1xx411c7mD",
            "content_type": "video",
            "tags": ["music"],
            "like_count": 3,
            "collected_at": "2024-05-01T08:00:00",
            "created_at": "2024-05-01T08:00:00",
            "updated_at": "2024-05-01T08:00:00"
        })
    }

    fn client(server: FakeServer) -> (ApiClient, Arc<FakeServer>) {
        let server = Arc::new(server);
        let session = SessionStore::in_memory();
        session
            .set_credential(Credential::new("tok1").with_refresh_token("r1"))
            .unwrap();
        (ApiClient::new(server.clone(), session), server)
    }

    #[tokio::test]
    async fn list_sends_filters_and_accepts_bare_arrays() {
        let (client, server) = client(FakeServer::new("tok1").with_route(
            Method::GET,
            "/collections",
            |_| ApiResponse::json(StatusCode::OK, &json!([collection(1, "Lofi mix")])),
        ));
        let query = CollectionQuery {
            limit: Some(20),
            platform: Some("bilibili".into()),
            category_id: Some(CategoryId(2)),
            ..CollectionQuery::default()
        };

        let items = client.collections().list(&query).await.unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].platform, Platform::Bilibili);
        assert_eq!(items[0].tags, vec!["music"]);
        assert_eq!(
            server.requests_to("/collections")[0].path_and_query(),
            "/collections?limit=20&platform=bilibili&category_id=2"
        );
    }

    #[tokio::test]
    async fn list_without_data_is_empty() {
        let (client, _) = client(FakeServer::new("tok1").with_route(
            Method::GET,
            "/collections",
            |_| ApiResponse::json(StatusCode::OK, &json!({"success": true, "message": "ok"})),
        ));
        let items = client
            .collections()
            .list(&CollectionQuery::default())
            .await
            .unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn get_survives_expired_token() {
        let (client, server) = client(FakeServer::expired().with_route(
            Method::GET,
            "/collections/4",
            |_| {
                ApiResponse::json(
                    StatusCode::OK,
                    &json!({"success": true, "message": "ok", "data": collection(4, "Recipe")}),
                )
            },
        ));

        let item = client.collections().get(CollectionId(4)).await.unwrap();

        assert_eq!(item.id, CollectionId(4));
        assert_eq!(item.title, "Recipe");
        assert_eq!(server.refresh_calls(), 1);
        assert_eq!(
            server.tokens_sent_to("/collections/4"),
            vec![Some("tok1".to_owned()), Some("tok2".to_owned())]
        );
    }

    #[tokio::test]
    async fn create_omits_unset_fields() {
        let (client, server) = client(FakeServer::new("tok1").with_route(
            Method::POST,
            "/collections",
            |_| ApiResponse::json(StatusCode::OK, &collection(9, "New")),
        ));
        let draft = CollectionDraft {
            platform: Some(Platform::Wechat),
            content_id: Some("abc".into()),
            title: Some("New".into()),
            ..CollectionDraft::default()
        };

        let created = client.collections().create(&draft).await.unwrap();

        assert_eq!(created.id, CollectionId(9));
        assert_eq!(
            server.requests_to("/collections")[0].body,
            Some(json!({"platform": "wechat", "content_id": "abc", "title": "New"}))
        );
    }

    #[tokio::test]
    async fn like_and_unlike_hit_the_same_path() {
        let (client, server) = client(FakeServer::new("tok1"));

        client.collections().like(CollectionId(3)).await.unwrap();
        client.collections().unlike(CollectionId(3)).await.unwrap();

        let methods: Vec<Method> = server
            .requests_to("/collections/3/like")
            .into_iter()
            .map(|r| r.method)
            .collect();
        assert_eq!(methods, vec![Method::POST, Method::DELETE]);
    }

    #[tokio::test]
    async fn parse_url_returns_raw_data() {
        let (client, server) = client(FakeServer::new("tok1").with_route(
            Method::POST,
            "/collections/parse-url",
            |_| {
                ApiResponse::json(
                    StatusCode::OK,
                    &json!({"success": true, "message": "ok", "data": {"platform": "xiaohongshu"}}),
                )
            },
        ));

        let parsed = client
            .collections()
            .parse_url("https://xhslink.com/a/xyz")
            .await
            .unwrap();

        assert_eq!(parsed["platform"], "xiaohongshu");
        assert_eq!(
            server.requests_to("/collections/parse-url")[0].body,
            Some(json!({"url": "https://xhslink.com/a/xyz"}))
        );
    }
}
