use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    routing::post,
    Json, Router,
};
use chrono::Utc;
use herald_core::config::{AggregatorConfig, GoogleConfig};
use herald_core::{Platform, PlatformFamily};
use herald_integrations::{
    GoogleTokenEndpoint, IntegrationStore, NewIntegration, TokenCache, TokenRefresher,
};
use herald_publish::{
    build_client, AggregatorAdapter, GoogleBusinessAdapter, PublishAdapter, PublishError,
    PublishRequest,
};
use rusqlite::Connection;
use serde_json::{json, Value};

/// Fake Google + aggregator upstream.
#[derive(Clone)]
struct Upstream {
    token: (StatusCode, Value),
    post: (StatusCode, Value),
    delay: Duration,
    token_calls: Arc<AtomicUsize>,
    posts: Arc<Mutex<Vec<(String, Value)>>>,
}

impl Upstream {
    fn new(post: (StatusCode, Value)) -> Self {
        Self {
            token: (
                StatusCode::OK,
                json!({"access_token": "refreshed-token", "expires_in": 3600}),
            ),
            post,
            delay: Duration::ZERO,
            token_calls: Arc::new(AtomicUsize::new(0)),
            posts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn posts(&self) -> Vec<(String, Value)> {
        self.posts.lock().unwrap().clone()
    }
}

async fn token_handler(State(up): State<Upstream>, _body: String) -> (StatusCode, Json<Value>) {
    up.token_calls.fetch_add(1, Ordering::SeqCst);
    (up.token.0, Json(up.token.1.clone()))
}

async fn post_handler(
    State(up): State<Upstream>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    up.posts.lock().unwrap().push((auth, body));
    if !up.delay.is_zero() {
        tokio::time::sleep(up.delay).await;
    }
    (up.post.0, Json(up.post.1.clone()))
}

async fn spawn(up: Upstream) -> String {
    let app = Router::new()
        .route("/token", post(token_handler))
        .route("/v4/locations/{loc}/localPosts", post(post_handler))
        .route("/api/v1/posts", post(post_handler))
        .with_state(up);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}")
}

fn store() -> Arc<IntegrationStore> {
    Arc::new(IntegrationStore::new(Connection::open_in_memory().unwrap()).unwrap())
}

fn connect_google(store: &IntegrationStore, expires_in: chrono::Duration) {
    store
        .upsert(&NewIntegration {
            user_id: "u1".into(),
            business_id: Some("b1".into()),
            platform: PlatformFamily::Direct.integration_key().into(),
            access_token: Some("stored-token".into()),
            refresh_token: Some("rt".into()),
            token_expires_at: Some(Utc::now() + expires_in),
            location_id: Some("locations/42".into()),
            ..Default::default()
        })
        .unwrap();
}

fn connect_aggregator(store: &IntegrationStore) {
    store
        .upsert(&NewIntegration {
            user_id: "u1".into(),
            business_id: Some("b1".into()),
            platform: PlatformFamily::Aggregator.integration_key().into(),
            account_id: Some("profile-7".into()),
            ..Default::default()
        })
        .unwrap();
}

fn google_adapter(base: &str, store: Arc<IntegrationStore>, timeout: Duration) -> GoogleBusinessAdapter {
    let client = build_client(timeout).unwrap();
    let config = GoogleConfig {
        client_id: Some("cid".into()),
        client_secret: Some("secret".into()),
        token_url: format!("{base}/token"),
        posts_api_base: format!("{base}/v4"),
        ..Default::default()
    };
    let endpoint = Arc::new(GoogleTokenEndpoint::new(client.clone(), &config));
    let refresher = Arc::new(TokenRefresher::new(store, endpoint, 60));
    GoogleBusinessAdapter::new(client, &config, refresher)
}

fn aggregator_adapter(base: &str, store: Arc<IntegrationStore>, api_key: Option<&str>) -> AggregatorAdapter {
    let config = AggregatorConfig {
        api_key: api_key.map(String::from),
        base_url: format!("{base}/api/v1"),
    };
    AggregatorAdapter::new(build_client(Duration::from_secs(5)).unwrap(), &config, store)
}

fn request(platform: Platform, options: Value) -> PublishRequest {
    PublishRequest {
        item_id: "item-1".into(),
        user_id: "u1".into(),
        business_id: Some("b1".into()),
        platform,
        post_text: "Spring sale starts today".into(),
        media_url: Some("https://cdn.example.com/sale.jpg".into()),
        platform_options: options.as_object().cloned().unwrap_or_default(),
    }
}

#[tokio::test]
async fn google_publishes_with_stored_token() {
    let up = Upstream::new((
        StatusCode::OK,
        json!({"name": "locations/42/localPosts/abc123", "searchUrl": "https://g.page/p/abc"}),
    ));
    let base = spawn(up.clone()).await;
    let store = store();
    connect_google(&store, chrono::Duration::hours(1));
    let adapter = google_adapter(&base, store, Duration::from_secs(5));

    let published = adapter
        .publish(
            &request(
                Platform::GoogleBusiness,
                json!({"callToAction": {"actionType": "LEARN_MORE", "url": "https://example.com"}}),
            ),
            &TokenCache::new(),
        )
        .await
        .unwrap();

    assert_eq!(published.post_id, "locations/42/localPosts/abc123");
    assert_eq!(published.post_url.as_deref(), Some("https://g.page/p/abc"));
    assert_eq!(up.token_calls.load(Ordering::SeqCst), 0);

    let posts = up.posts();
    assert_eq!(posts.len(), 1);
    let (auth, body) = &posts[0];
    assert_eq!(auth, "Bearer stored-token");
    assert_eq!(body["summary"], "Spring sale starts today");
    assert_eq!(body["languageCode"], "en");
    assert_eq!(body["topicType"], "STANDARD");
    assert_eq!(body["callToAction"]["actionType"], "LEARN_MORE");
    assert_eq!(body["media"][0]["mediaFormat"], "PHOTO");
    assert_eq!(body["media"][0]["sourceUrl"], "https://cdn.example.com/sale.jpg");
    assert!(body.get("offer").is_none());
}

#[tokio::test]
async fn google_refreshes_expired_token_before_posting() {
    let up = Upstream::new((StatusCode::OK, json!({"name": "locations/42/localPosts/x"})));
    let base = spawn(up.clone()).await;
    let store = store();
    connect_google(&store, -chrono::Duration::minutes(10));
    let adapter = google_adapter(&base, store.clone(), Duration::from_secs(5));

    adapter
        .publish(&request(Platform::GoogleBusiness, json!({"topicType": "offer"})), &TokenCache::new())
        .await
        .unwrap();

    assert_eq!(up.token_calls.load(Ordering::SeqCst), 1);
    let (auth, body) = &up.posts()[0];
    assert_eq!(auth, "Bearer refreshed-token");
    assert_eq!(body["topicType"], "OFFER");

    let stored = store
        .get("u1", Some("b1"), PlatformFamily::Direct)
        .unwrap()
        .unwrap();
    assert_eq!(stored.access_token.as_deref(), Some("refreshed-token"));
}

#[tokio::test]
async fn google_failed_refresh_is_auth_expired_and_skips_post() {
    let mut up = Upstream::new((StatusCode::OK, json!({"name": "unused"})));
    up.token = (StatusCode::BAD_REQUEST, json!({"error": "invalid_grant"}));
    let base = spawn(up.clone()).await;
    let store = store();
    connect_google(&store, -chrono::Duration::minutes(10));
    let adapter = google_adapter(&base, store, Duration::from_secs(5));

    let err = adapter
        .publish(&request(Platform::GoogleBusiness, json!({})), &TokenCache::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PublishError::AuthExpired(_)), "{err:?}");
    assert!(!err.is_transient());
    assert!(up.posts().is_empty());
}

#[tokio::test]
async fn google_rejection_carries_upstream_message() {
    let up = Upstream::new((
        StatusCode::BAD_REQUEST,
        json!({"error": {"code": 400, "message": "Request contains an invalid argument."}}),
    ));
    let base = spawn(up).await;
    let store = store();
    connect_google(&store, chrono::Duration::hours(1));
    let adapter = google_adapter(&base, store, Duration::from_secs(5));

    let err = adapter
        .publish(&request(Platform::GoogleBusiness, json!({})), &TokenCache::new())
        .await
        .unwrap_err();
    match err {
        PublishError::PlatformRejected { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "Request contains an invalid argument.");
        }
        other => panic!("expected PlatformRejected, got {other:?}"),
    }
}

#[tokio::test]
async fn google_without_integration_is_integration_missing() {
    let up = Upstream::new((StatusCode::OK, json!({})));
    let base = spawn(up.clone()).await;
    let adapter = google_adapter(&base, store(), Duration::from_secs(5));

    let err = adapter
        .publish(&request(Platform::GoogleBusiness, json!({})), &TokenCache::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PublishError::IntegrationMissing(_)));
    assert!(err.to_string().contains("not connected"));
    assert!(up.posts().is_empty());
}

#[tokio::test]
async fn slow_upstream_times_out() {
    let mut up = Upstream::new((StatusCode::OK, json!({"name": "late"})));
    up.delay = Duration::from_secs(3);
    let base = spawn(up).await;
    let store = store();
    connect_google(&store, chrono::Duration::hours(1));
    let adapter = google_adapter(&base, store, Duration::from_millis(300));

    let err = adapter
        .publish(&request(Platform::GoogleBusiness, json!({})), &TokenCache::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PublishError::Timeout), "{err:?}");
    assert!(err.is_transient());
}

#[tokio::test]
async fn aggregator_publishes_to_requested_platform() {
    let up = Upstream::new((
        StatusCode::OK,
        json!({
            "_id": "agg-post-1",
            "platforms": {
                "instagram": {"postId": "ig-555", "postUrl": "https://instagram.com/p/555"}
            }
        }),
    ));
    let base = spawn(up.clone()).await;
    let store = store();
    connect_aggregator(&store);
    let adapter = aggregator_adapter(&base, store, Some("late-key"));

    let published = adapter
        .publish(&request(Platform::Instagram, json!({})), &TokenCache::new())
        .await
        .unwrap();
    assert_eq!(published.post_id, "ig-555");
    assert_eq!(published.post_url.as_deref(), Some("https://instagram.com/p/555"));

    let (auth, body) = &up.posts()[0];
    assert_eq!(auth, "Bearer late-key");
    assert_eq!(body["profileId"], "profile-7");
    assert_eq!(body["content"], "Spring sale starts today");
    assert_eq!(body["mediaUrls"], json!(["https://cdn.example.com/sale.jpg"]));
    assert_eq!(body["platforms"], json!(["instagram"]));
}

#[tokio::test]
async fn aggregator_falls_back_to_top_level_id() {
    let up = Upstream::new((StatusCode::OK, json!({"_id": "agg-post-2", "platforms": {}})));
    let base = spawn(up).await;
    let store = store();
    connect_aggregator(&store);
    let adapter = aggregator_adapter(&base, store, Some("late-key"));

    let published = adapter
        .publish(&request(Platform::LinkedIn, json!({})), &TokenCache::new())
        .await
        .unwrap();
    assert_eq!(published.post_id, "agg-post-2");
}

#[tokio::test]
async fn aggregator_empty_platform_post_id_uses_top_level_id() {
    let up = Upstream::new((
        StatusCode::OK,
        json!({"_id": "agg-5", "platforms": {"linkedin": {"postId": ""}}}),
    ));
    let base = spawn(up).await;
    let store = store();
    connect_aggregator(&store);
    let adapter = aggregator_adapter(&base, store, Some("late-key"));

    let published = adapter
        .publish(&request(Platform::LinkedIn, json!({})), &TokenCache::new())
        .await
        .unwrap();
    assert_eq!(published.post_id, "agg-5");
}

#[tokio::test]
async fn aggregator_blank_ids_everywhere_are_invalid() {
    let up = Upstream::new((
        StatusCode::OK,
        json!({"_id": "", "platforms": {"linkedin": {"postId": ""}}}),
    ));
    let base = spawn(up).await;
    let store = store();
    connect_aggregator(&store);
    let adapter = aggregator_adapter(&base, store, Some("late-key"));

    let err = adapter
        .publish(&request(Platform::LinkedIn, json!({})), &TokenCache::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PublishError::InvalidResponse(_)), "{err:?}");
}

#[tokio::test]
async fn aggregator_platform_error_on_http_200_is_failure() {
    let up = Upstream::new((
        StatusCode::OK,
        json!({
            "_id": "agg-post-3",
            "platforms": {
                "facebook": {"postId": "fb-1"},
                "tiktok": {"error": "TikTok requires a video"}
            }
        }),
    ));
    let base = spawn(up).await;
    let store = store();
    connect_aggregator(&store);
    let adapter = aggregator_adapter(&base, store, Some("late-key"));

    let err = adapter
        .publish(&request(Platform::TikTok, json!({})), &TokenCache::new())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "TikTok requires a video");
    assert!(matches!(err, PublishError::PlatformRejected { status: 200, .. }));
}

#[tokio::test]
async fn aggregator_requires_api_key_and_profile() {
    let up = Upstream::new((StatusCode::OK, json!({"_id": "x"})));
    let base = spawn(up.clone()).await;

    let store_without_profile = store();
    let err = aggregator_adapter(&base, store_without_profile.clone(), Some("late-key"))
        .publish(&request(Platform::Threads, json!({})), &TokenCache::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PublishError::IntegrationMissing(_)));

    connect_aggregator(&store_without_profile);
    let err = aggregator_adapter(&base, store_without_profile, None)
        .publish(&request(Platform::Threads, json!({})), &TokenCache::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PublishError::NotConfigured(_)));
    assert!(up.posts().is_empty());
}
