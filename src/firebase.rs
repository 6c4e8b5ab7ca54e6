//! ==============================================================================
//! firebase.rs - firebase realtime database over its rest api
//! ==============================================================================
//!
//! purpose:
//!     the production `RemoteStore`. each collection is a child of the database
//!     root, addressed as `{database_url}/{collection}.json`.
//!
//!     - fetch_latest: GET ...?orderBy="timestamp"&limitToLast=n
//!     - append:       POST (firebase "push", server assigns the key)
//!
//! relationships:
//!     - implements: store.rs (RemoteStore)
//!     - built by: main.rs (when store.backend = "firebase" and a url is set)
//!
//! credentials (store.credential_path):
//!     - service account key (`"type": "service_account"`): exchanged for an
//!       oauth2 access token via gcp_auth, sent as `access_token=`. gcp_auth
//!       caches the token and fetches a new one once it expires.
//!     - legacy database secret / id token: sent as `auth=`.
//!     - missing or unusable file: requests go out unauthenticated.
//!
//! notes:
//!     filtered queries come back as an unordered object keyed by push id,
//!     so results are re-sorted locally. every request is bounded by the
//!     client timeout from `store.timeout_ms`.
//!
//! ==============================================================================

use async_trait::async_trait;
use gcp_auth::{CustomServiceAccount, TokenProvider};
use serde_json::Value;
use std::path::Path;
use std::time::Duration;

use crate::config::StoreConfig;
use crate::store::{latest_by_timestamp, RemoteStore, StoreError};

const SCOPES: &[&str] = &[
    "https://www.googleapis.com/auth/firebase.database",
    "https://www.googleapis.com/auth/userinfo.email",
];

pub enum Credential {
    /// database secret or id token
    Secret(String),
    /// service account key, traded for short-lived access tokens
    ServiceAccount(CustomServiceAccount),
}

impl Credential {
    /// query parameter carrying the credential on each request
    async fn query_param(&self) -> Result<(&'static str, String), StoreError> {
        match self {
            Credential::Secret(secret) => Ok(("auth", secret.clone())),
            Credential::ServiceAccount(account) => {
                let token = account
                    .token(SCOPES)
                    .await
                    .map_err(|e| StoreError::Connectivity(format!("token exchange failed: {}", e)))?;
                Ok(("access_token", token.as_str().to_string()))
            }
        }
    }
}

pub struct FirebaseStore {
    client: reqwest::Client,
    base_url: String,
    credential: Option<Credential>,
}

impl FirebaseStore {
    pub fn new(database_url: &str, config: &StoreConfig) -> anyhow::Result<Self> {
        Self::with_credential(database_url, config.timeout(), load_credential(&config.credential_path))
    }

    pub fn with_credential(
        database_url: &str,
        timeout: Duration,
        credential: Option<Credential>,
    ) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: database_url.trim_end_matches('/').to_string(),
            credential,
        })
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/{}.json", self.base_url, collection)
    }

    async fn authorize(&self, request: reqwest::RequestBuilder) -> Result<reqwest::RequestBuilder, StoreError> {
        match &self.credential {
            Some(credential) => {
                let (key, value) = credential.query_param().await?;
                Ok(request.query(&[(key, value)]))
            }
            None => Ok(request),
        }
    }
}

#[async_trait]
impl RemoteStore for FirebaseStore {
    async fn fetch_latest(&self, collection: &str, n: usize) -> Result<Vec<Value>, StoreError> {
        let request = self
            .client
            .get(self.collection_url(collection))
            .query(&[("orderBy", "\"timestamp\"".to_string()), ("limitToLast", n.to_string())]);

        let response = self
            .authorize(request)
            .await?
            .send()
            .await
            .map_err(|e| StoreError::Connectivity(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Connectivity(format!("GET {} returned {}", collection, status)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| StoreError::Connectivity(e.to_string()))?;
        let snapshot: Value =
            serde_json::from_slice(&body).map_err(|e| StoreError::Parse(e.to_string()))?;

        records_from_snapshot(snapshot, n)
    }

    async fn append(&self, collection: &str, record: &Value) -> Result<(), StoreError> {
        let request = self.client.post(self.collection_url(collection)).json(record);

        let response = self
            .authorize(request)
            .await?
            .send()
            .await
            .map_err(|e| StoreError::Connectivity(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(StoreError::Connectivity(format!("POST {} returned {}", collection, status)));
        }
        Ok(())
    }
}

/// turn a query snapshot into records ordered oldest-first
///
/// null means the collection is empty. firebase renders children with
/// small integer keys as an array, so arrays are accepted too.
pub fn records_from_snapshot(snapshot: Value, n: usize) -> Result<Vec<Value>, StoreError> {
    let entries: Vec<(String, Value)> = match snapshot {
        Value::Null => return Ok(Vec::new()),
        Value::Object(map) => map.into_iter().collect(),
        Value::Array(items) => items
            .into_iter()
            .enumerate()
            .filter(|(_, v)| !v.is_null())
            .map(|(i, v)| (format!("{:020}", i), v))
            .collect(),
        other => {
            return Err(StoreError::Parse(format!("expected object or null, got {}", other)));
        }
    };
    Ok(latest_by_timestamp(entries, n))
}

/// read the credential file named by `store.credential_path`
///
/// a missing or unusable file is not fatal: requests go out unauthenticated.
pub fn load_credential(path: &Path) -> Option<Credential> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) => {
            tracing::warn!("[STORE] Could not read credentials {}: {}", path.display(), e);
            return None;
        }
    };

    let credential = match serde_json::from_str::<Value>(&content) {
        Ok(Value::Object(map)) if map.get("type").and_then(Value::as_str) == Some("service_account") => {
            match CustomServiceAccount::from_json(&content) {
                Ok(account) => Some(Credential::ServiceAccount(account)),
                Err(e) => {
                    tracing::warn!("[STORE] Invalid service account key {}: {}", path.display(), e);
                    return None;
                }
            }
        }
        Ok(Value::Object(map)) => ["database_secret", "token"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str))
            .filter(|secret| !secret.is_empty())
            .map(|secret| Credential::Secret(secret.to_string())),
        Ok(Value::String(secret)) if !secret.is_empty() => Some(Credential::Secret(secret)),
        Ok(_) => None,
        Err(_) => Some(content.trim())
            .filter(|secret| !secret.is_empty())
            .map(|secret| Credential::Secret(secret.to_string())),
    };

    if credential.is_none() {
        tracing::warn!("[STORE] No usable credential in {}", path.display());
    }
    credential
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::RawQuery;
    use axum::http::StatusCode;
    use axum::response::Json;
    use axum::routing::{get, post};
    use axum::Router;
    use serde_json::json;
    use std::path::PathBuf;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    fn fixture(name: &str) -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("testdata").join(name)
    }

    /// serve `app` on an ephemeral local port and return its base url
    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn store_at(url: &str, credential: Option<Credential>) -> FirebaseStore {
        FirebaseStore::with_credential(url, Duration::from_secs(3), credential).unwrap()
    }

    #[test]
    fn null_snapshot_is_empty() {
        assert!(records_from_snapshot(Value::Null, 1).unwrap().is_empty());
    }

    #[test]
    fn object_snapshot_returns_latest() {
        let snapshot = json!({
            "-Nb2": {"timestamp": "2025-05-01T09:00:00", "waterLevel": 6.5, "temperature": 81, "humidity": 60},
            "-Na1": {"timestamp": "2025-05-01T08:00:00", "waterLevel": 5.5, "temperature": 80, "humidity": 55},
        });
        let records = records_from_snapshot(snapshot, 1).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0]["waterLevel"], 6.5);
    }

    #[test]
    fn array_snapshot_skips_holes() {
        let snapshot = json!([null, {"timestamp": 2}, {"timestamp": 1}]);
        let records = records_from_snapshot(snapshot, 5).unwrap();
        assert_eq!(records, vec![json!({"timestamp": 1}), json!({"timestamp": 2})]);
    }

    #[test]
    fn scalar_snapshot_is_parse_error() {
        assert!(matches!(records_from_snapshot(json!("oops"), 1), Err(StoreError::Parse(_))));
    }

    #[test]
    fn collection_url_trims_trailing_slash() {
        let config = StoreConfig { credential_path: PathBuf::from("/nonexistent/creds.json"), ..StoreConfig::default() };
        let store = FirebaseStore::new("https://farm-default-rtdb.firebaseio.com/", &config).unwrap();
        assert_eq!(store.collection_url("sensors"), "https://farm-default-rtdb.firebaseio.com/sensors.json");
        assert!(store.credential.is_none());
    }

    #[tokio::test]
    async fn service_account_key_is_recognised() {
        let credential = load_credential(&fixture("service_account.json"));
        let Some(Credential::ServiceAccount(account)) = credential else {
            panic!("expected a service account credential");
        };
        assert_eq!(&*account.project_id().unwrap(), "farm-monitor-test");
    }

    #[test]
    fn secret_from_json_or_plain_file() {
        let dir = std::env::temp_dir().join(format!("farm-creds-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let json_path = dir.join("creds.json");
        std::fs::write(&json_path, r#"{"database_secret": "s3cret"}"#).unwrap();
        assert!(matches!(load_credential(&json_path), Some(Credential::Secret(s)) if s == "s3cret"));

        let plain_path = dir.join("token.txt");
        std::fs::write(&plain_path, "abc123\n").unwrap();
        assert!(matches!(load_credential(&plain_path), Some(Credential::Secret(s)) if s == "abc123"));

        let unknown_path = dir.join("unknown.json");
        std::fs::write(&unknown_path, r#"{"project": "farm"}"#).unwrap();
        assert!(load_credential(&unknown_path).is_none());

        let broken_key_path = dir.join("broken.json");
        std::fs::write(&broken_key_path, r#"{"type": "service_account", "private_key": "nope"}"#).unwrap();
        assert!(load_credential(&broken_key_path).is_none());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn fetch_latest_sends_query_and_reads_snapshot() {
        let queries = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new().route(
            "/sensors.json",
            get({
                let queries = queries.clone();
                move |RawQuery(query): RawQuery| {
                    let queries = queries.clone();
                    async move {
                        queries.lock().await.push(query.unwrap_or_default());
                        Json(json!({
                            "-Na1": {"timestamp": "2025-05-01T08:00:00", "waterLevel": 5.5},
                            "-Nb2": {"timestamp": "2025-05-01T09:00:00", "waterLevel": 6.5},
                        }))
                    }
                }
            }),
        );
        let store = store_at(&serve(app).await, Some(Credential::Secret("s3cret".to_string())));

        let records = store.fetch_latest("sensors", 1).await.unwrap();
        assert_eq!(records, vec![json!({"timestamp": "2025-05-01T09:00:00", "waterLevel": 6.5})]);

        let queries = queries.lock().await;
        assert_eq!(queries.len(), 1);
        assert!(queries[0].contains("orderBy=%22timestamp%22"), "{}", queries[0]);
        assert!(queries[0].contains("limitToLast=1"), "{}", queries[0]);
        assert!(queries[0].contains("auth=s3cret"), "{}", queries[0]);
    }

    #[tokio::test]
    async fn append_posts_record_body() {
        let bodies = Arc::new(Mutex::new(Vec::new()));
        let app = Router::new().route(
            "/controls.json",
            post({
                let bodies = bodies.clone();
                move |Json(body): Json<Value>| {
                    let bodies = bodies.clone();
                    async move {
                        bodies.lock().await.push(body);
                        Json(json!({"name": "-Nc3"}))
                    }
                }
            }),
        );
        let store = store_at(&serve(app).await, None);

        let record = json!({"timestamp": "2025-05-01T10:00:00", "settings": {"pumpOn": true}});
        store.append("controls", &record).await.unwrap();
        assert_eq!(*bodies.lock().await, vec![record]);
    }

    #[tokio::test]
    async fn error_statuses_are_connectivity_errors() {
        let app = Router::new().route(
            "/sensors.json",
            get(|| async { StatusCode::INTERNAL_SERVER_ERROR }).post(|| async { StatusCode::UNAUTHORIZED }),
        );
        let store = store_at(&serve(app).await, None);

        assert!(matches!(store.fetch_latest("sensors", 1).await, Err(StoreError::Connectivity(_))));
        assert!(matches!(store.append("sensors", &json!({})).await, Err(StoreError::Connectivity(_))));
    }

    #[tokio::test]
    async fn garbage_body_is_parse_error() {
        let app = Router::new().route("/sensors.json", get(|| async { "not json" }));
        let store = store_at(&serve(app).await, None);

        assert!(matches!(store.fetch_latest("sensors", 1).await, Err(StoreError::Parse(_))));
    }

    #[tokio::test]
    async fn slow_store_times_out() {
        let app = Router::new().route(
            "/sensors.json",
            get(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(Value::Null)
            }),
        );
        let url = serve(app).await;
        let store = FirebaseStore::with_credential(&url, Duration::from_millis(200), None).unwrap();

        assert!(matches!(store.fetch_latest("sensors", 1).await, Err(StoreError::Connectivity(_))));
    }

    #[tokio::test]
    async fn unreachable_store_is_connectivity_error() {
        // bind then drop to get a port nothing listens on
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let store = store_at(&format!("http://{}", addr), None);
        assert!(matches!(store.fetch_latest("sensors", 1).await, Err(StoreError::Connectivity(_))));
    }
}
