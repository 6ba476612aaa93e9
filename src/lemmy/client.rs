use super::types::{
    ApiErrorBody, GetPostsResponse, GetRepliesResponse, ListingType, ModlogEntry, SortType,
};
use crate::feed::{FetchError, PageCursor};
use futures::StreamExt;
use reqwest::redirect::Policy;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

const MAX_RETRIES: u32 = 3;
const MAX_RESPONSE_SIZE: usize = 10 * 1024 * 1024; // 10MB
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const USER_AGENT: &str = concat!("voyager-tui/", env!("CARGO_PKG_VERSION"));

/// Parameters for `GET /api/v3/post/list`.
#[derive(Debug, Clone)]
pub struct GetPosts {
    pub listing: ListingType,
    pub sort: SortType,
    pub limit: usize,
    pub cursor: PageCursor,
    pub community_name: Option<String>,
}

/// Parameters for `GET /api/v3/user/replies`.
#[derive(Debug, Clone)]
pub struct GetReplies {
    pub page: u32,
    pub limit: usize,
    pub unread_only: bool,
}

/// Parameters for `GET /api/v3/modlog`.
#[derive(Debug, Clone, Default)]
pub struct GetModlog {
    pub page: u32,
    pub limit: usize,
    pub community_id: Option<i64>,
    pub other_person_id: Option<i64>,
    pub mod_person_id: Option<i64>,
}

/// Minimal client for the Lemmy v3 HTTP API.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Clone)]
pub struct LemmyClient {
    http: reqwest::Client,
    api_base: Url,
    jwt: Option<Arc<SecretString>>,
}

impl std::fmt::Debug for LemmyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LemmyClient")
            .field("api_base", &self.api_base.as_str())
            .field("jwt", &self.jwt.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

/// Redirects are limited to 3 hops and loops are rejected.
fn create_redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= 3 {
            return attempt.error("Too many redirects (max 3)");
        }

        let url = attempt.url();
        if attempt.previous().iter().any(|prev| prev == url) {
            return attempt.error("Redirect loop detected");
        }

        tracing::debug!(to = %url, hop = attempt.previous().len() + 1, "Following redirect");
        attempt.follow()
    })
}

impl LemmyClient {
    /// Create a client for `instance` (e.g. `https://lemmy.world/`).
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Network`] if the HTTP client cannot be built.
    pub fn new(instance: Url, jwt: Option<SecretString>) -> Result<Self, FetchError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .redirect(create_redirect_policy())
            .build()?;

        let mut api_base = instance;
        api_base.set_query(None);
        api_base.set_fragment(None);
        let path = format!("{}/api/v3/", api_base.path().trim_end_matches('/'));
        api_base.set_path(&path);

        Ok(Self {
            http,
            api_base,
            jwt: jwt.map(Arc::new),
        })
    }

    pub fn api_base(&self) -> &Url {
        &self.api_base
    }

    pub fn is_authenticated(&self) -> bool {
        self.jwt.is_some()
    }

    /// Fetch one page of posts.
    pub async fn get_posts(
        &self,
        params: &GetPosts,
        cancel: &CancellationToken,
    ) -> Result<GetPostsResponse, FetchError> {
        let mut query = vec![
            ("type_", params.listing.as_str().to_string()),
            ("sort", params.sort.as_str().to_string()),
            ("limit", params.limit.to_string()),
        ];
        match &params.cursor {
            PageCursor::Page(page) => query.push(("page", (*page).max(1).to_string())),
            PageCursor::Token(token) => query.push(("page_cursor", token.clone())),
        }
        if let Some(name) = &params.community_name {
            query.push(("community_name", name.clone()));
        }

        self.get_json("post/list", &query, cancel).await
    }

    /// Fetch one page of comment replies addressed to the logged-in user.
    pub async fn get_replies(
        &self,
        params: &GetReplies,
        cancel: &CancellationToken,
    ) -> Result<GetRepliesResponse, FetchError> {
        let query = [
            ("sort", "New".to_string()),
            ("page", params.page.max(1).to_string()),
            ("limit", params.limit.to_string()),
            ("unread_only", params.unread_only.to_string()),
        ];
        self.get_json("user/replies", &query, cancel).await
    }

    /// Fetch one page of the moderation log, merged across categories, newest first.
    pub async fn get_modlog(
        &self,
        params: &GetModlog,
        cancel: &CancellationToken,
    ) -> Result<Vec<ModlogEntry>, FetchError> {
        let mut query = vec![
            ("page", params.page.max(1).to_string()),
            ("limit", params.limit.to_string()),
        ];
        if let Some(id) = params.community_id {
            query.push(("community_id", id.to_string()));
        }
        if let Some(id) = params.other_person_id {
            query.push(("other_person_id", id.to_string()));
        }
        if let Some(id) = params.mod_person_id {
            query.push(("mod_person_id", id.to_string()));
        }

        let body: Value = self.get_json("modlog", &query, cancel).await?;
        Ok(flatten_modlog(&body))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
        cancel: &CancellationToken,
    ) -> Result<T, FetchError> {
        let mut url = self
            .api_base
            .join(endpoint)
            .map_err(|e| FetchError::Decode(format!("bad endpoint {}: {}", endpoint, e)))?;
        url.query_pairs_mut()
            .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));

        let bytes = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(FetchError::Cancelled),
            result = self.get_with_retry(&url) => result?,
        };

        serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode(e.to_string()))
    }

    /// GET with 429/5xx backoff (1s, 2s, 4s). Caller handles cancellation.
    async fn get_with_retry(&self, url: &Url) -> Result<Vec<u8>, FetchError> {
        let mut retry_count = 0;

        loop {
            let mut request = self.http.get(url.clone());
            if let Some(jwt) = &self.jwt {
                request = request.bearer_auth(jwt.expose_secret());
            }

            let response = tokio::time::timeout(REQUEST_TIMEOUT, request.send())
                .await
                .map_err(|_| FetchError::Timeout)??;
            let status = response.status();

            if status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                if retry_count >= MAX_RETRIES {
                    return Err(if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                        FetchError::RateLimited(MAX_RETRIES)
                    } else {
                        FetchError::HttpStatus(status.as_u16())
                    });
                }

                let delay_secs = 2u64.pow(retry_count); // 1s, 2s, 4s
                tracing::warn!(
                    url = %url.path(),
                    status = %status,
                    retry = retry_count,
                    delay_secs,
                    "Lemmy request failed, retrying after delay"
                );
                tokio::time::sleep(Duration::from_secs(delay_secs)).await;
                retry_count += 1;
                continue;
            }

            let bytes = read_limited_bytes(response, MAX_RESPONSE_SIZE).await?;

            if !status.is_success() {
                // Lemmy reports most failures as 400 with {"error": "..."}
                return Err(match serde_json::from_slice::<ApiErrorBody>(&bytes) {
                    Ok(body) => FetchError::Api(body.error),
                    Err(_) => FetchError::HttpStatus(status.as_u16()),
                });
            }

            return Ok(bytes);
        }
    }
}

async fn read_limited_bytes(
    response: reqwest::Response,
    limit: usize,
) -> Result<Vec<u8>, FetchError> {
    if let Some(len) = response.content_length() {
        if len as usize > limit {
            return Err(FetchError::ResponseTooLarge);
        }
    }

    let mut bytes = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        if bytes.len().saturating_add(chunk.len()) > limit {
            return Err(FetchError::ResponseTooLarge);
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(bytes)
}

/// Merge the per-category modlog arrays into one list, newest first.
///
/// Every entry carries exactly one `mod_*`/`admin_*` object holding the
/// action's `id` and `when_`; the surrounding fields name the actors.
pub(crate) fn flatten_modlog(body: &Value) -> Vec<ModlogEntry> {
    let Some(categories) = body.as_object() else {
        return Vec::new();
    };

    let mut entries: Vec<ModlogEntry> = categories
        .values()
        .filter_map(Value::as_array)
        .flatten()
        .filter_map(parse_modlog_entry)
        .collect();

    // None sorts before Some, so reverse order puts undated entries last
    entries.sort_by(|a, b| b.when.cmp(&a.when));
    entries
}

fn parse_modlog_entry(entry: &Value) -> Option<ModlogEntry> {
    let fields = entry.as_object()?;
    let (kind, action) = fields.iter().find(|(name, value)| {
        (name.starts_with("mod_") || name.starts_with("admin_")) && value.get("id").is_some()
    })?;

    let name_of = |field: &str| {
        fields
            .get(field)
            .and_then(|v| v.get("name"))
            .and_then(Value::as_str)
            .map(str::to_string)
    };

    Some(ModlogEntry {
        kind: kind.clone(),
        id: action.get("id")?.as_i64()?,
        when: action
            .get("when_")
            .and_then(Value::as_str)
            .and_then(super::types::parse_lemmy_date),
        reason: action
            .get("reason")
            .and_then(Value::as_str)
            .map(str::to_string),
        moderator: name_of("moderator").or_else(|| name_of("admin")),
        target: ["post", "banned_person", "modded_person", "community"]
            .iter()
            .find_map(|field| name_of(*field)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, jwt: Option<&str>) -> LemmyClient {
        let url = Url::parse(&server.uri()).unwrap();
        LemmyClient::new(url, jwt.map(|t| SecretString::from(t.to_string()))).unwrap()
    }

    fn post_json(id: i64, name: &str) -> Value {
        json!({
            "post": {"id": id, "name": name, "published": "2024-01-01T00:00:00Z"},
            "creator": {"id": 1, "name": "alice", "actor_id": "https://lemmy.test/u/alice"},
            "community": {"id": 2, "name": "rust", "title": "Rust"},
            "counts": {"score": 10, "comments": 3}
        })
    }

    fn posts_params(cursor: PageCursor) -> GetPosts {
        GetPosts {
            listing: ListingType::All,
            sort: SortType::Hot,
            limit: 20,
            cursor,
            community_name: None,
        }
    }

    #[test]
    fn test_api_base_appends_api_path() {
        let client = LemmyClient::new(Url::parse("https://lemmy.world").unwrap(), None).unwrap();
        assert_eq!(client.api_base().as_str(), "https://lemmy.world/api/v3/");

        let client =
            LemmyClient::new(Url::parse("https://example.com/lemmy/?x=1").unwrap(), None).unwrap();
        assert_eq!(client.api_base().as_str(), "https://example.com/lemmy/api/v3/");
    }

    #[test]
    fn test_debug_redacts_jwt() {
        let client = LemmyClient::new(
            Url::parse("https://lemmy.world").unwrap(),
            Some(SecretString::from("secret-token".to_string())),
        )
        .unwrap();
        let debug = format!("{:?}", client);
        assert!(!debug.contains("secret-token"));
        assert!(debug.contains("REDACTED"));
    }

    #[tokio::test]
    async fn test_get_posts_numbered_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/post/list"))
            .and(query_param("page", "2"))
            .and(query_param("type_", "All"))
            .and(query_param("sort", "Hot"))
            .and(query_param("limit", "20"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "posts": [post_json(1, "First"), post_json(2, "Second")],
                "next_page": "Pa2"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        let response = client
            .get_posts(&posts_params(PageCursor::Page(2)), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(response.posts.len(), 2);
        assert_eq!(response.posts[1].post.name, "Second");
        assert_eq!(response.next_page.as_deref(), Some("Pa2"));
    }

    #[tokio::test]
    async fn test_get_posts_uses_page_cursor_and_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/post/list"))
            .and(query_param("page_cursor", "Pa2"))
            .and(header("authorization", "Bearer jwt-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"posts": []})))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Some("jwt-123"));
        assert!(client.is_authenticated());
        let response = client
            .get_posts(
                &posts_params(PageCursor::Token("Pa2".into())),
                &CancellationToken::new(),
            )
            .await
            .unwrap();
        assert!(response.posts.is_empty());
        assert_eq!(response.next_page, None);
    }

    #[tokio::test]
    async fn test_api_error_body_is_surfaced() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({"error": "not_logged_in"})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        let err = client
            .get_replies(
                &GetReplies {
                    page: 1,
                    limit: 20,
                    unread_only: false,
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        match err {
            FetchError::Api(msg) => assert_eq!(msg, "not_logged_in"),
            e => panic!("Expected Api error, got {:?}", e),
        }
    }

    #[tokio::test]
    async fn test_404_without_body_maps_to_status() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        let err = client
            .get_posts(&posts_params(PageCursor::FIRST), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::HttpStatus(404)));
    }

    #[tokio::test]
    async fn test_503_retry_then_success() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "posts": [post_json(5, "After retry")]
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        let response = client
            .get_posts(&posts_params(PageCursor::FIRST), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(response.posts[0].post.id, 5);
    }

    #[tokio::test]
    async fn test_invalid_json_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>"))
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        let err = client
            .get_posts(&posts_params(PageCursor::FIRST), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
    }

    #[tokio::test]
    async fn test_cancellation_aborts_slow_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"posts": []}))
                    .set_delay(Duration::from_secs(10)),
            )
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let started = std::time::Instant::now();
        let err = client
            .get_posts(&posts_params(PageCursor::FIRST), &cancel)
            .await
            .unwrap_err();
        assert!(err.is_cancelled());
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_get_modlog_merges_categories_newest_first() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v3/modlog"))
            .and(query_param("community_id", "4"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "removed_posts": [{
                    "mod_remove_post": {"id": 1, "when_": "2024-01-01T10:00:00", "reason": "spam"},
                    "moderator": {"id": 9, "name": "mod"},
                    "post": {"id": 3, "name": "Buy now"}
                }],
                "banned": [{
                    "mod_ban": {"id": 1, "when_": "2024-01-02T10:00:00Z"},
                    "banned_person": {"id": 5, "name": "troll"}
                }],
                "locked_posts": []
            })))
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        let entries = client
            .get_modlog(
                &GetModlog {
                    page: 1,
                    limit: 20,
                    community_id: Some(4),
                    ..Default::default()
                },
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key(), "mod_ban-1");
        assert_eq!(entries[0].target.as_deref(), Some("troll"));
        assert_eq!(entries[1].key(), "mod_remove_post-1");
        assert_eq!(entries[1].reason.as_deref(), Some("spam"));
        assert_eq!(entries[1].moderator.as_deref(), Some("mod"));
    }

    #[test]
    fn test_flatten_modlog_puts_undated_last_and_skips_garbage() {
        let body = json!({
            "added": [
                {"mod_add": {"id": 1}},
                {"mod_add": {"id": 2, "when_": "2024-03-01T00:00:00Z"}},
                {"unrelated": true}
            ],
            "not_a_list": 5
        });
        let entries = flatten_modlog(&body);
        let keys: Vec<String> = entries.iter().map(ModlogEntry::key).collect();
        assert_eq!(keys, vec!["mod_add-2", "mod_add-1"]);
    }
}
