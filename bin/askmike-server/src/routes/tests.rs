//! End-to-end tests driving the full router in process.

use askmike_types::StreamEvent;
use axum::body::Body;
use axum::http::{Method, Request, StatusCode, header};
use serde_json::{Value, json};
use tracing_test::traced_test;

use crate::entities::{ChatStore, MessageStore, UserStore};
use crate::test_support::{
    ScriptedProvider, TestApp, TokenBuilder, body_json, multipart_body, sse_events,
};

const ALICE: &str = "did:privy:alice";
const BOB: &str = "did:privy:bob";

fn finish_id(events: &[StreamEvent]) -> &str {
    match events.last() {
        Some(StreamEvent::Finish { message_id }) => message_id,
        other => panic!("turn did not finish: {other:?}"),
    }
}

// ── Auth gate ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_is_public_and_api_requires_a_token() {
    let app = TestApp::new().await;

    let resp = app.get("/health", None).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = app.get("/api/history", None).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let req = Request::builder()
        .uri("/api/history")
        .header(header::AUTHORIZATION, "Basic abc")
        .body(Body::empty())
        .unwrap();
    assert_eq!(app.send(req).await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_token_is_rejected_without_side_effects() {
    let app = TestApp::new().await;
    let token = TokenBuilder::new(ALICE).expired().sign();
    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::from(
            json!({ "id": "c1", "messages": [{ "role": "user", "content": "Hello" }] }).to_string(),
        ))
        .unwrap();

    let resp = app.send(req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(app.state.store.get_chat("c1").await.unwrap().is_none());
    assert!(app.state.store.get_user(ALICE).await.unwrap().is_none());
    assert!(app.provider.requests.lock().unwrap().is_empty());
}

#[tokio::test]
#[traced_test]
async fn rejected_tokens_are_logged_by_prefix_only() {
    let app = TestApp::new().await;
    let token = TokenBuilder::new(ALICE).audience("other-app").sign();
    let req = Request::builder()
        .uri("/api/history")
        .header(header::AUTHORIZATION, format!("Bearer {token}"))
        .body(Body::empty())
        .unwrap();

    assert_eq!(app.send(req).await.status(), StatusCode::UNAUTHORIZED);
    assert!(logs_contain("token verification failed"));
    assert!(!logs_contain(&token));
}

#[tokio::test]
async fn protected_route_echoes_the_identity() {
    let app = TestApp::new().await;
    let body = body_json(app.get("/api/protected", Some(ALICE)).await).await;
    assert_eq!(body["message"], "This is a protected route");
    assert_eq!(body["user"]["id"], ALICE);
    assert_eq!(body["user"]["walletAddress"], "0xwallet");
}

// ── Chat turns ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn first_turn_creates_chat_and_stores_both_messages() {
    let app = TestApp::new().await;
    let events = app.chat(ALICE, "c1", "Hello").await;

    let StreamEvent::UserMessageId { content: user_message_id } = &events[0] else {
        panic!("first event must carry the user message id: {events:?}");
    };
    let deltas: Vec<&str> = events
        .iter()
        .filter_map(|e| match e {
            StreamEvent::TextDelta { content } => Some(content.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(deltas, ["Hi", " there"]);
    let assistant_id = finish_id(&events).to_owned();

    let body = body_json(app.get("/api/chat?id=c1", Some(ALICE)).await).await;
    assert_eq!(body["chat"]["title"], "Hello");
    assert_eq!(body["chat"]["userId"], ALICE);
    assert_eq!(body["chat"]["visibility"], "private");
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["id"], user_message_id.as_str());
    assert_eq!(messages[0]["role"], "user");
    assert_eq!(messages[0]["content"], "Hello");
    assert_eq!(messages[1]["id"], assistant_id.as_str());
    assert_eq!(messages[1]["role"], "assistant");
    assert_eq!(messages[1]["content"], "Hi there");

    let user = app.state.store.get_user(ALICE).await.unwrap().unwrap();
    assert_eq!(user.wallet_address.as_deref(), Some("0xwallet"));
}

#[tokio::test]
async fn completion_gets_persona_prompt_and_default_model() {
    let app = TestApp::new().await;
    app.chat(ALICE, "c1", "Hello").await;

    let requests = app.provider.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].model, "gpt-4o-mini");
    assert_eq!(requests[0].system, app.state.system_prompt.as_ref());
    assert_eq!(requests[0].messages.len(), 1);
    assert_eq!(requests[0].messages[0].content, json!("Hello"));
}

#[tokio::test]
async fn repeated_turns_keep_messages_in_order() {
    let app = TestApp::new().await;
    for i in 0..3 {
        let events = app.chat(ALICE, "c1", &format!("question {i}")).await;
        assert!(matches!(events[0], StreamEvent::UserMessageId { .. }));
        finish_id(&events);
    }

    let messages = app.state.store.list_messages("c1").await.unwrap();
    assert_eq!(messages.len(), 6);
    for (i, pair) in messages.chunks(2).enumerate() {
        assert_eq!(pair[0].role, "user");
        assert_eq!(pair[0].content, json!(format!("question {i}")));
        assert_eq!(pair[1].role, "assistant");
    }
    // Title comes from the first message only.
    let chat = app.state.store.get_chat("c1").await.unwrap().unwrap();
    assert_eq!(chat.title, "question 0");
}

#[tokio::test]
async fn failed_completion_ends_with_error_and_keeps_user_message() {
    let app = TestApp::with_provider(ScriptedProvider::failing_after(&["partial"])).await;
    let events = app.chat(ALICE, "c1", "Hello").await;

    assert!(matches!(events[0], StreamEvent::UserMessageId { .. }));
    assert!(matches!(events.last(), Some(StreamEvent::Error { .. })));
    assert!(!events.iter().any(|e| matches!(e, StreamEvent::Finish { .. })));

    let messages = app.state.store.list_messages("c1").await.unwrap();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].role, "user");
}

#[tokio::test]
async fn malformed_chat_requests_are_rejected() {
    let app = TestApp::new().await;

    let missing_id = json!({ "messages": [{ "role": "user", "content": "hi" }] });
    let empty = json!({ "id": "c1", "messages": [] });
    let no_user = json!({ "id": "c1", "messages": [{ "role": "assistant", "content": "hi" }] });
    for body in [missing_id, empty, no_user] {
        let resp = app.json(Method::POST, "/api/chat", Some(ALICE), body.clone()).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{body}");
    }

    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::AUTHORIZATION, crate::test_support::bearer(ALICE))
        .body(Body::from("{not json"))
        .unwrap();
    assert_eq!(app.send(req).await.status(), StatusCode::BAD_REQUEST);

    assert!(app.state.store.get_chat("c1").await.unwrap().is_none());
}

#[tokio::test]
async fn unknown_model_falls_back_to_default() {
    let app = TestApp::new().await;
    let resp = app
        .json(
            Method::POST,
            "/api/chat",
            Some(ALICE),
            json!({ "id": "c1", "modelId": "no-such-model", "messages": [{ "role": "user", "content": "hi" }] }),
        )
        .await;
    finish_id(&sse_events(resp).await);
    assert_eq!(app.provider.requests.lock().unwrap()[0].model, "gpt-4o-mini");
}

// ── Ownership ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn other_users_cannot_post_read_or_delete_a_private_chat() {
    let app = TestApp::new().await;
    app.chat(ALICE, "c1", "Hello").await;

    let resp = app
        .json(
            Method::POST,
            "/api/chat",
            Some(BOB),
            json!({ "id": "c1", "messages": [{ "role": "user", "content": "hijack" }] }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.state.store.list_messages("c1").await.unwrap().len(), 2);

    assert_eq!(app.get("/api/chat?id=c1", Some(BOB)).await.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.delete("/api/chat?id=c1", BOB).await.status(), StatusCode::UNAUTHORIZED);
    assert!(app.state.store.get_chat("c1").await.unwrap().is_some());
}

#[tokio::test]
async fn public_chats_are_readable_but_not_writable_by_others() {
    let app = TestApp::new().await;
    app.chat(ALICE, "c1", "Hello").await;

    let resp = app
        .json(Method::PATCH, "/api/chat?id=c1", Some(BOB), json!({ "visibility": "public" }))
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app
        .json(Method::PATCH, "/api/chat?id=c1", Some(ALICE), json!({ "visibility": "public" }))
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["visibility"], "public");

    let body = body_json(app.get("/api/chat?id=c1", Some(BOB)).await).await;
    assert_eq!(body["messages"].as_array().unwrap().len(), 2);

    let resp = app
        .json(
            Method::POST,
            "/api/chat",
            Some(BOB),
            json!({ "id": "c1", "messages": [{ "role": "user", "content": "me too" }] }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn chat_lookup_and_delete_report_missing_ids() {
    let app = TestApp::new().await;
    assert_eq!(app.get("/api/chat", Some(ALICE)).await.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.get("/api/chat?id=nope", Some(ALICE)).await.status(), StatusCode::NOT_FOUND);
    assert_eq!(app.delete("/api/chat?id=nope", ALICE).await.status(), StatusCode::NOT_FOUND);

    app.chat(ALICE, "c1", "Hello").await;
    let resp = app.delete("/api/chat?id=c1", ALICE).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["deleted"], 1);
    assert!(app.state.store.list_messages("c1").await.unwrap().is_empty());
    assert_eq!(app.get("/api/chat?id=c1", Some(ALICE)).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn trailing_messages_are_deleted_from_the_pivot_on() {
    let app = TestApp::new().await;
    app.chat(ALICE, "c1", "first").await;
    let events = app.chat(ALICE, "c1", "second").await;
    let StreamEvent::UserMessageId { content: pivot } = &events[0] else {
        panic!("missing user message id");
    };

    let uri = format!("/api/chat/messages?id={pivot}");
    assert_eq!(app.delete(&uri, BOB).await.status(), StatusCode::UNAUTHORIZED);

    let resp = app.delete(&uri, ALICE).await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["deleted"], 2);

    let left = app.state.store.list_messages("c1").await.unwrap();
    assert_eq!(left.len(), 2);
    assert_eq!(left[0].content, json!("first"));

    assert_eq!(app.delete(&uri, ALICE).await.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn history_lists_only_the_callers_chats_newest_first() {
    let app = TestApp::new().await;
    assert_eq!(body_json(app.get("/api/history", Some(ALICE)).await).await, json!([]));

    app.chat(ALICE, "a1", "one").await;
    app.chat(BOB, "b1", "bob's").await;
    app.chat(ALICE, "a2", "two").await;

    let body = body_json(app.get("/api/history", Some(ALICE)).await).await;
    let ids: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["a2", "a1"]);
}

// ── Users ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn user_sync_upserts_and_enforces_subject_and_email_uniqueness() {
    let app = TestApp::new().await;

    let resp = app
        .json(Method::POST, "/api/user/sync", Some(ALICE), json!({ "id": BOB }))
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert!(app.state.store.get_user(BOB).await.unwrap().is_none());

    let resp = app
        .json(
            Method::POST,
            "/api/user/sync",
            Some(ALICE),
            json!({ "id": ALICE, "email": "alice@example.com", "name": "Alice" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let user = &body_json(resp).await["user"];
    assert_eq!(user["email"], "alice@example.com");
    assert_eq!(user["walletAddress"], "0xwallet");
    assert_eq!(user["walletPublicKey"], "0xwallet");

    // A later partial sync keeps earlier values.
    let resp = app
        .json(Method::POST, "/api/user/sync", Some(ALICE), json!({ "id": ALICE, "image": "a.png" }))
        .await;
    let user = &body_json(resp).await["user"];
    assert_eq!(user["name"], "Alice");
    assert_eq!(user["image"], "a.png");

    let resp = app
        .json(
            Method::POST,
            "/api/user/sync",
            Some(BOB),
            json!({ "id": BOB, "email": "alice@example.com" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn models_are_listed_default_first() {
    let app = TestApp::new().await;
    let body = body_json(app.get("/api/models", Some(ALICE)).await).await;
    assert_eq!(body[0]["id"], "gpt-4o-mini");
    assert_eq!(body[0]["apiIdentifier"], "gpt-4o-mini");
}

// ── Documents ────────────────────────────────────────────────────────────────

async fn save_version(app: &TestApp, sub: &str, title: &str) -> Value {
    let resp = app
        .json(
            Method::POST,
            "/api/document?id=d1",
            Some(sub),
            json!({ "title": title, "content": format!("{title} body"), "kind": "text" }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK, "saving {title}");
    body_json(resp).await
}

#[tokio::test]
async fn document_versions_are_listed_and_trimmed_by_timestamp() {
    let app = TestApp::new().await;
    let v1 = save_version(&app, ALICE, "v1").await;
    save_version(&app, ALICE, "v2").await;
    save_version(&app, ALICE, "v3").await;

    let body = body_json(app.get("/api/document?id=d1", Some(ALICE)).await).await;
    let titles: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["title"].as_str().unwrap())
        .collect();
    assert_eq!(titles, ["v1", "v2", "v3"]);

    let resp = app
        .json(
            Method::PATCH,
            "/api/document?id=d1",
            Some(ALICE),
            json!({ "timestamp": v1["createdAt"] }),
        )
        .await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_json(resp).await["deleted"], 2);

    let body = body_json(app.get("/api/document?id=d1", Some(ALICE)).await).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["title"], "v1");
}

#[tokio::test]
async fn documents_belong_to_the_author_of_the_first_version() {
    let app = TestApp::new().await;
    save_version(&app, ALICE, "v1").await;

    assert_eq!(app.get("/api/document?id=d1", Some(BOB)).await.status(), StatusCode::UNAUTHORIZED);
    let resp = app
        .json(Method::POST, "/api/document?id=d1", Some(BOB), json!({ "title": "mine now" }))
        .await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(app.get("/api/document?id=zz", Some(ALICE)).await.status(), StatusCode::NOT_FOUND);

    let resp = app
        .json(Method::POST, "/api/document?id=d2", Some(ALICE), json!({ "title": "" }))
        .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn suggestions_require_a_document_id_and_ownership() {
    let app = TestApp::new().await;
    save_version(&app, ALICE, "v1").await;

    assert_eq!(app.get("/api/suggestions", Some(ALICE)).await.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        app.get("/api/suggestions?documentId=d1", Some(BOB)).await.status(),
        StatusCode::UNAUTHORIZED
    );
    let body = body_json(app.get("/api/suggestions?documentId=d1", Some(ALICE)).await).await;
    assert_eq!(body, json!([]));
}

// ── Uploads ──────────────────────────────────────────────────────────────────

async fn upload(app: &TestApp, field: &str, data: &[u8]) -> axum::response::Response {
    let (content_type, body) = multipart_body(field, "notes.txt", "text/plain", data);
    let req = Request::builder()
        .method(Method::POST)
        .uri("/api/files/upload")
        .header(header::CONTENT_TYPE, content_type)
        .header(header::AUTHORIZATION, crate::test_support::bearer(ALICE))
        .body(Body::from(body))
        .unwrap();
    app.send(req).await
}

#[tokio::test]
async fn upload_stores_file_and_serves_it_back() {
    let app = TestApp::new().await;
    let resp = upload(&app, "file", b"hello upload").await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    let pathname = body["pathname"].as_str().unwrap().to_owned();
    assert!(pathname.ends_with("-notes.txt"));
    assert_eq!(body["url"], format!("/uploads/{pathname}"));
    assert_eq!(body["contentType"], "text/plain");

    let stored = std::fs::read(app.upload_dir().join(&pathname)).unwrap();
    assert_eq!(stored, b"hello upload");

    let resp = app.get(&format!("/uploads/{pathname}"), None).await;
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn upload_rejects_oversized_or_missing_files() {
    let app = TestApp::new().await;
    let limit = app.state.config.max_upload_bytes;

    let resp = upload(&app, "file", &vec![b'x'; limit + 1]).await;
    assert_eq!(resp.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let resp = upload(&app, "attachment", b"wrong field").await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    assert_eq!(std::fs::read_dir(app.upload_dir()).unwrap().count(), 0);
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = TestApp::new().await;
    let resp = app.get("/api-docs/openapi.json", None).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert!(body["paths"]["/api/chat"].is_object());
}
