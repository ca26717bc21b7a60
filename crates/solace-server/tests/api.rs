//! HTTP-level tests against a server bound to an ephemeral port.

use std::sync::Arc;

use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use uuid::Uuid;

use solace_api::AppStateInner;
use solace_db::Database;
use solace_gateway::dispatcher::Dispatcher;
use solace_server::app::build_router;

const CALMNESS: &str = "dfc45935-a240-455b-b658-e7ed2a73032f";

struct TestServer {
    base: String,
    http: Client,
}

impl TestServer {
    async fn spawn() -> Self {
        let state = Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            jwt_secret: "test-secret".into(),
            dispatcher: Dispatcher::new(),
        });
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, build_router(state)).await.unwrap();
        });
        Self {
            base: format!("http://{}", addr),
            http: Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    /// Register and return (user_id, token).
    async fn register(&self, name: &str, professional: bool) -> (Uuid, String) {
        let resp = self
            .http
            .post(self.url("/auth/register"))
            .json(&json!({
                "email": format!("{}@example.com", name.to_lowercase()),
                "password": "correct horse",
                "name": name,
                "is_professional": professional,
            }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = resp.json().await.unwrap();
        let id = body["user"]["id"].as_str().unwrap().parse().unwrap();
        (id, body["token"].as_str().unwrap().to_string())
    }

    async fn create_post(&self, token: &str, content: &str) -> Uuid {
        let resp = self
            .http
            .post(self.url("/posts"))
            .bearer_auth(token)
            .json(&json!({ "content": content }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body: Value = resp.json().await.unwrap();
        body["id"].as_str().unwrap().parse().unwrap()
    }
}

#[tokio::test]
async fn duplicate_registration_conflicts() {
    let server = TestServer::spawn().await;
    server.register("Ana", false).await;

    let resp = server
        .http
        .post(server.url("/auth/register"))
        .json(&json!({
            "email": "ANA@example.com",
            "password": "another password",
            "name": "Other",
            "is_professional": true,
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Email already registered");

    let resp = server
        .http
        .post(server.url("/auth/login"))
        .json(&json!({ "email": "ana@example.com", "password": "correct horse" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["user"]["name"], "Ana");
    assert_eq!(body["user"]["is_professional"], false);
}

#[tokio::test]
async fn bad_credentials_are_unauthorized() {
    let server = TestServer::spawn().await;
    server.register("Ana", false).await;

    let resp = server
        .http
        .post(server.url("/auth/login"))
        .json(&json!({ "email": "ana@example.com", "password": "wrong password" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = server.http.get(server.url("/posts")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn only_the_author_can_edit_or_delete() {
    let server = TestServer::spawn().await;
    let (_, ana) = server.register("Ana", false).await;
    let (_, bo) = server.register("Bo", false).await;
    let post_id = server.create_post(&ana, "mine").await;

    let resp = server
        .http
        .patch(server.url(&format!("/posts/{post_id}")))
        .bearer_auth(&bo)
        .json(&json!({ "content": "hijacked" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let resp = server
        .http
        .delete(server.url(&format!("/posts/{post_id}")))
        .bearer_auth(&bo)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let feed: Value = server
        .http
        .get(server.url("/posts"))
        .bearer_auth(&ana)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(feed[0]["content"], "mine");

    let resp = server
        .http
        .patch(server.url(&format!("/posts/{post_id}")))
        .bearer_auth(&ana)
        .json(&json!({ "content": "edited" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = server
        .http
        .delete(server.url(&format!("/posts/{post_id}")))
        .bearer_auth(&ana)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn repeated_like_requests_leave_one_row() {
    let server = TestServer::spawn().await;
    let (_, ana) = server.register("Ana", false).await;
    let post_id = server.create_post(&ana, "like me").await;
    let like_url = server.url(&format!("/posts/{post_id}/like"));

    for _ in 0..3 {
        let state: Value = server
            .http
            .put(&like_url)
            .bearer_auth(&ana)
            .json(&json!({ "liked": true }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(state["liked"], true);
        assert_eq!(state["like_count"], 1);
    }

    let toggle_url = server.url(&format!("/posts/{post_id}/like/toggle"));
    for expected in [false, true] {
        let state: Value = server
            .http
            .post(&toggle_url)
            .bearer_auth(&ana)
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(state["liked"], expected);
    }

    let resp = server
        .http
        .put(server.url(&format!("/posts/{}/like", Uuid::new_v4())))
        .bearer_auth(&ana)
        .json(&json!({ "liked": true }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn conversation_is_two_party_only() {
    let server = TestServer::spawn().await;
    let (a_id, a) = server.register("A", false).await;
    let (b_id, b) = server.register("B", false).await;
    let (c_id, _) = server.register("C", false).await;

    for (token, to, text) in [(&a, b_id, "to b"), (&a, c_id, "to c"), (&b, a_id, "to a")] {
        let resp = server
            .http
            .post(server.url("/messages"))
            .bearer_auth(token)
            .json(&json!({ "receiver_id": to, "content": text }))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::CREATED);
    }

    let convo: Value = server
        .http
        .get(server.url(&format!("/messages?with={b_id}")))
        .bearer_auth(&a)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let contents: Vec<&str> = convo
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["content"].as_str().unwrap())
        .collect();
    assert_eq!(contents, vec!["to b", "to a"]);
    assert_eq!(convo[1]["sender"]["name"], "B");
}

#[tokio::test]
async fn roster_is_professional_only() {
    let server = TestServer::spawn().await;
    let (_, user) = server.register("Una", false).await;
    let (_, doc) = server.register("Doc", true).await;

    let resp = server
        .http
        .post(server.url("/moods/daily"))
        .bearer_auth(&user)
        .json(&json!({ "mood_id": CALMNESS, "notes": "" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = server
        .http
        .get(server.url("/patients"))
        .bearer_auth(&user)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);

    let roster: Value = server
        .http
        .get(server.url("/patients"))
        .bearer_auth(&doc)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(roster.as_array().unwrap().len(), 1);
    assert_eq!(roster[0]["name"], "Una");
    assert_eq!(roster[0]["latest_mood"]["name"], "Calmness");
}

#[tokio::test]
async fn unknown_mood_is_rejected() {
    let server = TestServer::spawn().await;
    let (_, token) = server.register("Ana", false).await;

    let resp = server
        .http
        .post(server.url("/moods/daily"))
        .bearer_auth(&token)
        .json(&json!({ "mood_id": Uuid::new_v4() }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let catalog: Value = server
        .http
        .get(server.url("/moods"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(catalog.as_array().unwrap().len(), 27);
    assert_eq!(catalog[0]["name"], "Envy");
}
