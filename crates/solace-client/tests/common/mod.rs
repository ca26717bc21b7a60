#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use tokio::sync::watch;
use uuid::Uuid;

use solace_api::AppStateInner;
use solace_client::{AccessToken, Backend, ClientError, HttpBackend, Session, Subscription};
use solace_db::Database;
use solace_gateway::dispatcher::Dispatcher;
use solace_server::app::build_router;
use solace_types::api::{
    AuthResponse, CommentView, FeedPost, LikeState, MessageView, MoodHistoryEntry, PatientSummary,
    RegisterRequest,
};
use solace_types::events::Topic;
use solace_types::models::{DailyMoodEntry, Post, User, UserSummary};

type Result<T> = std::result::Result<T, ClientError>;

/// Serve the full router on an ephemeral port with a fresh in-memory store.
pub async fn spawn_server() -> String {
    spawn_server_with_gateway().await.0
}

/// Like `spawn_server`, also handing back the gateway's dispatcher.
pub async fn spawn_server_with_gateway() -> (String, Dispatcher) {
    let dispatcher = Dispatcher::new();
    let state = Arc::new(AppStateInner {
        db: Database::open_in_memory().unwrap(),
        jwt_secret: "test-secret".into(),
        dispatcher: dispatcher.clone(),
    });
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, build_router(state)).await.unwrap();
    });
    (format!("http://{}", addr), dispatcher)
}

/// A signed-in session for a fresh account.
pub async fn signed_up<B: Backend>(backend: &B, name: &str, professional: bool) -> Arc<Session> {
    let session = Arc::new(Session::new());
    session
        .sign_up(
            backend,
            &format!("{}@example.com", name.to_lowercase()),
            "correct horse",
            name,
            professional,
        )
        .await
        .unwrap();
    session
}

pub fn user_id(session: &Session) -> Uuid {
    session.user().unwrap().id
}

/// Block until the watched value satisfies `pred`, failing after 5s.
pub async fn wait_until<T>(rx: &mut watch::Receiver<T>, pred: impl FnMut(&T) -> bool) {
    tokio::time::timeout(Duration::from_secs(5), rx.wait_for(pred))
        .await
        .expect("timed out waiting for update")
        .expect("watch closed");
}

/// Forwards to an `HttpBackend` and counts every call. Feed fetches can be
/// made to fail on demand.
pub struct Counting {
    inner: HttpBackend,
    calls: AtomicUsize,
    feed_down: AtomicBool,
}

impl Counting {
    pub fn new(base_url: &str) -> Self {
        Self {
            inner: HttpBackend::new(base_url),
            calls: AtomicUsize::new(0),
            feed_down: AtomicBool::new(false),
        }
    }

    pub fn set_feed_down(&self, down: bool) {
        self.feed_down.store(down, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl Backend for Counting {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthResponse> {
        self.hit();
        self.inner.sign_in(email, password).await
    }

    async fn sign_up(&self, req: &RegisterRequest) -> Result<AuthResponse> {
        self.hit();
        self.inner.sign_up(req).await
    }

    async fn sign_out(&self, token: &AccessToken) -> Result<()> {
        self.hit();
        self.inner.sign_out(token).await
    }

    async fn profile(&self, token: &AccessToken) -> Result<User> {
        self.hit();
        self.inner.profile(token).await
    }

    async fn list_users(&self, token: &AccessToken) -> Result<Vec<UserSummary>> {
        self.hit();
        self.inner.list_users(token).await
    }

    async fn record_mood(&self, token: &AccessToken, mood_id: Uuid, notes: &str) -> Result<DailyMoodEntry> {
        self.hit();
        self.inner.record_mood(token, mood_id, notes).await
    }

    async fn mood_history(&self, token: &AccessToken) -> Result<Vec<MoodHistoryEntry>> {
        self.hit();
        self.inner.mood_history(token).await
    }

    async fn fetch_feed(&self, token: &AccessToken) -> Result<Vec<FeedPost>> {
        self.hit();
        if self.feed_down.load(Ordering::SeqCst) {
            return Err(ClientError::Remote {
                status: 503,
                message: "Service Unavailable".into(),
            });
        }
        self.inner.fetch_feed(token).await
    }

    async fn create_post(&self, token: &AccessToken, content: &str) -> Result<Post> {
        self.hit();
        self.inner.create_post(token, content).await
    }

    async fn edit_post(&self, token: &AccessToken, post_id: Uuid, content: &str) -> Result<Post> {
        self.hit();
        self.inner.edit_post(token, post_id, content).await
    }

    async fn delete_post(&self, token: &AccessToken, post_id: Uuid) -> Result<()> {
        self.hit();
        self.inner.delete_post(token, post_id).await
    }

    async fn flag_post(&self, token: &AccessToken, post_id: Uuid) -> Result<Post> {
        self.hit();
        self.inner.flag_post(token, post_id).await
    }

    async fn set_like(&self, token: &AccessToken, post_id: Uuid, liked: bool) -> Result<LikeState> {
        self.hit();
        self.inner.set_like(token, post_id, liked).await
    }

    async fn add_comment(&self, token: &AccessToken, post_id: Uuid, content: &str) -> Result<CommentView> {
        self.hit();
        self.inner.add_comment(token, post_id, content).await
    }

    async fn fetch_conversation(&self, token: &AccessToken, with: Uuid) -> Result<Vec<MessageView>> {
        self.hit();
        self.inner.fetch_conversation(token, with).await
    }

    async fn send_message(&self, token: &AccessToken, receiver_id: Uuid, content: &str) -> Result<MessageView> {
        self.hit();
        self.inner.send_message(token, receiver_id, content).await
    }

    async fn mark_read(&self, token: &AccessToken, message_id: Uuid) -> Result<MessageView> {
        self.hit();
        self.inner.mark_read(token, message_id).await
    }

    async fn fetch_patients(&self, token: &AccessToken) -> Result<Vec<PatientSummary>> {
        self.hit();
        self.inner.fetch_patients(token).await
    }

    async fn subscribe(&self, token: &AccessToken, topics: &[Topic]) -> Result<Subscription> {
        self.hit();
        self.inner.subscribe(token, topics).await
    }
}
