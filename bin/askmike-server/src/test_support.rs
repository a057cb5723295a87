//! Shared fixtures for unit and router tests: a signing key matching a
//! static key set, a scripted completion provider, and an in-process app.

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use askmike_types::StreamEvent;
use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use axum::response::Response;
use axum::routing::get;
use chrono::{DateTime, Utc};
use http_body_util::BodyExt;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use serde_json::{Map, Value, json};
use tower::ServiceExt;

use crate::auth::{JwtVerifier, KeySet};
use crate::config::Config;
use crate::entities::{SqliteStore, Suggestion};
use crate::llm::{CompletionProvider, CompletionRequest, LlmError, Persona, model_catalog};
use crate::state::AppState;

pub const APP_ID: &str = "test-app-id";
pub const TEST_KID: &str = "test-key";

const TEST_KEY_PEM: &str = include_str!("../fixtures/jwt_test_key.pem");

/// Public half of `fixtures/jwt_test_key.pem`.
pub const TEST_JWKS: &str = r#"{"keys":[{"kty":"RSA","use":"sig","alg":"RS256","kid":"test-key","e":"AQAB","n":"7KSsVImD_RzYiohyBBnCGtPiPhjItZKNrlvOT6M68uLk_u5NNfCCL7YIvrLAWC9gSnxQR4fvnnv9BX4P4U-o5hRVx4rXxFTzl9f9aZLcI0VvkF1lPDZ8dK1N0cr_voDNysk7nGfPT5dnjqUtYza8gGJwnMBBKw6Vp-h9sjVLkB8WGCGEE85sF4hEY_koKnRLNkxawG4sJuUGxZOBH8pvutQ9E8S7zt742MMIXLdRIvIVNB7L5P5kStoJtV7jw_FBq5DObQvhaURRsmMomrGbQXdeKFjbmTNx3t9j_9O5M_ROgUXMb193VGch_FRDgxpu2dfzsUKzhNaI_EbR3c5kDQ"}]}"#;

pub fn test_key_set() -> KeySet {
    KeySet::from_json(TEST_JWKS).expect("test key set parses")
}

// ── Tokens ───────────────────────────────────────────────────────────────────

/// Builds RS256 tokens signed with the fixture key. Defaults produce a token
/// the test verifier accepts.
pub struct TokenBuilder {
    kid: Option<String>,
    claims: Map<String, Value>,
}

impl TokenBuilder {
    pub fn new(sub: &str) -> Self {
        let now = Utc::now().timestamp();
        let mut claims = Map::new();
        claims.insert("sub".into(), json!(sub));
        claims.insert("iss".into(), json!("privy.io"));
        claims.insert("aud".into(), json!(APP_ID));
        claims.insert("iat".into(), json!(now));
        claims.insert("exp".into(), json!(now + 3600));
        Self {
            kid: Some(TEST_KID.to_owned()),
            claims,
        }
    }

    pub fn wallet(mut self, address: &str) -> Self {
        self.claims.insert("wallet_address".into(), json!(address));
        self
    }

    pub fn issuer(mut self, iss: &str) -> Self {
        self.claims.insert("iss".into(), json!(iss));
        self
    }

    pub fn audience(mut self, aud: &str) -> Self {
        self.claims.insert("aud".into(), json!(aud));
        self
    }

    pub fn without(mut self, claim: &str) -> Self {
        self.claims.remove(claim);
        self
    }

    pub fn expired(mut self) -> Self {
        let now = Utc::now().timestamp();
        self.claims.insert("iat".into(), json!(now - 600));
        self.claims.insert("exp".into(), json!(now - 300));
        self
    }

    pub fn issued_secs_ago(mut self, secs: i64) -> Self {
        let now = Utc::now().timestamp();
        self.claims.insert("iat".into(), json!(now - secs));
        self
    }

    pub fn kid(mut self, kid: &str) -> Self {
        self.kid = Some(kid.to_owned());
        self
    }

    pub fn sign(self) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = self.kid;
        let key = EncodingKey::from_rsa_pem(TEST_KEY_PEM.as_bytes()).expect("fixture key");
        encode(&header, &self.claims, &key).expect("token signs")
    }
}

/// `Authorization` value for a fresh token of `sub`.
pub fn bearer(sub: &str) -> String {
    format!("Bearer {}", TokenBuilder::new(sub).wallet("0xwallet").sign())
}

/// Serve `/jwks.json`, answering the n-th request with the n-th response
/// (the last one repeats). Returns the URL and a hit counter.
pub async fn spawn_jwks_server(responses: Vec<(StatusCode, String)>) -> (String, Arc<AtomicUsize>) {
    let hits = Arc::new(AtomicUsize::new(0));
    let responses = Arc::new(responses);
    let app = Router::new().route(
        "/jwks.json",
        get({
            let hits = Arc::clone(&hits);
            move || {
                let hits = Arc::clone(&hits);
                let responses = Arc::clone(&responses);
                async move {
                    let i = hits.fetch_add(1, Ordering::SeqCst);
                    responses[i.min(responses.len() - 1)].clone()
                }
            }
        }),
    );

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}/jwks.json"), hits)
}

// ── Store ────────────────────────────────────────────────────────────────────

pub async fn memory_store() -> SqliteStore {
    SqliteStore::connect("sqlite::memory:").await.expect("in-memory store")
}

pub fn suggestion_for(id: &str, document_id: &str, document_created_at: DateTime<Utc>) -> Suggestion {
    Suggestion {
        id: id.into(),
        document_id: document_id.into(),
        document_created_at,
        original_text: "teh".into(),
        suggested_text: "the".into(),
        description: Some("typo".into()),
        is_resolved: false,
        user_id: "u1".into(),
        created_at: crate::entities::now(),
    }
}

// ── Completion ───────────────────────────────────────────────────────────────

/// Replays fixed deltas and records every request it receives.
pub struct ScriptedProvider {
    deltas: Vec<String>,
    fail: bool,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    pub fn replying(deltas: &[&str]) -> Self {
        Self {
            deltas: deltas.iter().map(|d| d.to_string()).collect(),
            fail: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Emits the deltas, then fails instead of finishing.
    pub fn failing_after(deltas: &[&str]) -> Self {
        Self {
            fail: true,
            ..Self::replying(deltas)
        }
    }
}

#[async_trait]
impl CompletionProvider for ScriptedProvider {
    async fn complete_stream(
        &self,
        request: &CompletionRequest,
        on_delta: &(dyn Fn(String) + Send + Sync),
    ) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(request.clone());
        for delta in &self.deltas {
            on_delta(delta.clone());
        }
        if self.fail {
            return Err(LlmError::Api {
                status: 500,
                message: "scripted failure".into(),
            });
        }
        Ok(self.deltas.concat())
    }
}

// ── In-process app ───────────────────────────────────────────────────────────

pub struct TestApp {
    pub router: Router,
    pub state: Arc<AppState>,
    pub provider: Arc<ScriptedProvider>,
    uploads: tempfile::TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_provider(ScriptedProvider::replying(&["Hi", " there"])).await
    }

    pub async fn with_provider(provider: ScriptedProvider) -> Self {
        let uploads = tempfile::tempdir().expect("upload dir");
        let config = Config::for_tests(uploads.path().to_path_buf());
        let provider = Arc::new(provider);
        let persona = Persona::mike().expect("bundled persona parses");

        let state = Arc::new(AppState {
            config: Arc::new(config),
            store: Arc::new(memory_store().await),
            verifier: Arc::new(JwtVerifier::from_key_set(test_key_set(), APP_ID)),
            provider: provider.clone(),
            models: Arc::new(model_catalog()),
            system_prompt: persona.system_prompt().into(),
        });
        Self {
            router: crate::routes::build(Arc::clone(&state)),
            state,
            provider,
            uploads,
        }
    }

    pub fn upload_dir(&self) -> PathBuf {
        self.uploads.path().to_path_buf()
    }

    pub async fn send(&self, req: Request<Body>) -> Response {
        self.router.clone().oneshot(req).await.expect("router is infallible")
    }

    /// Send a JSON request as `sub` (or anonymously when `None`).
    pub async fn json(&self, method: Method, uri: &str, sub: Option<&str>, body: Value) -> Response {
        let mut req = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(sub) = sub {
            req = req.header(header::AUTHORIZATION, bearer(sub));
        }
        self.send(req.body(Body::from(body.to_string())).unwrap()).await
    }

    pub async fn get(&self, uri: &str, sub: Option<&str>) -> Response {
        let mut req = Request::builder().uri(uri);
        if let Some(sub) = sub {
            req = req.header(header::AUTHORIZATION, bearer(sub));
        }
        self.send(req.body(Body::empty()).unwrap()).await
    }

    pub async fn delete(&self, uri: &str, sub: &str) -> Response {
        let req = Request::builder()
            .method(Method::DELETE)
            .uri(uri)
            .header(header::AUTHORIZATION, bearer(sub))
            .body(Body::empty())
            .unwrap();
        self.send(req).await
    }

    /// Run one chat turn and return its events in order.
    pub async fn chat(&self, sub: &str, chat_id: &str, text: &str) -> Vec<StreamEvent> {
        let resp = self
            .json(
                Method::POST,
                "/api/chat",
                Some(sub),
                json!({ "id": chat_id, "messages": [{ "role": "user", "content": text }] }),
            )
            .await;
        assert_eq!(resp.status(), StatusCode::OK);
        sse_events(resp).await
    }
}

pub async fn body_bytes(resp: Response) -> Vec<u8> {
    resp.into_body().collect().await.unwrap().to_bytes().to_vec()
}

pub async fn body_json(resp: Response) -> Value {
    serde_json::from_slice(&body_bytes(resp).await).unwrap()
}

/// Drain a server-sent event response into its decoded `data:` payloads.
pub async fn sse_events(resp: Response) -> Vec<StreamEvent> {
    let text = String::from_utf8(body_bytes(resp).await).unwrap();
    text.lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|data| serde_json::from_str(data.trim()).unwrap())
        .collect()
}

/// A `multipart/form-data` body with one field.
pub fn multipart_body(field: &str, file_name: &str, content_type: &str, data: &[u8]) -> (String, Vec<u8>) {
    let boundary = "askmike-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(data);
    body.extend_from_slice(format!("\r\n--{boundary}--\r\n").as_bytes());
    (format!("multipart/form-data; boundary={boundary}"), body)
}
