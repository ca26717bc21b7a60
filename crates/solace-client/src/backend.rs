use std::fmt;
use std::future::Future;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use solace_types::api::{
    AuthResponse, CommentView, FeedPost, LikeState, MessageView, MoodHistoryEntry, PatientSummary,
    RegisterRequest,
};
use solace_types::events::{ChangeEvent, Topic};
use solace_types::models::{DailyMoodEntry, Post, User, UserSummary};

use crate::error::Result;

/// Bearer token returned by sign-in. Never printed.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccessToken(..)")
    }
}

/// The remote service the views depend on. `HttpBackend` is the real
/// implementation; tests wrap it to observe calls.
pub trait Backend: Send + Sync + 'static {
    fn sign_in(&self, email: &str, password: &str) -> impl Future<Output = Result<AuthResponse>> + Send;

    fn sign_up(&self, req: &RegisterRequest) -> impl Future<Output = Result<AuthResponse>> + Send;

    fn sign_out(&self, token: &AccessToken) -> impl Future<Output = Result<()>> + Send;

    /// The caller's profile row.
    fn profile(&self, token: &AccessToken) -> impl Future<Output = Result<User>> + Send;

    /// Every user except the caller.
    fn list_users(&self, token: &AccessToken) -> impl Future<Output = Result<Vec<UserSummary>>> + Send;

    fn record_mood(
        &self,
        token: &AccessToken,
        mood_id: Uuid,
        notes: &str,
    ) -> impl Future<Output = Result<DailyMoodEntry>> + Send;

    fn mood_history(&self, token: &AccessToken) -> impl Future<Output = Result<Vec<MoodHistoryEntry>>> + Send;

    fn fetch_feed(&self, token: &AccessToken) -> impl Future<Output = Result<Vec<FeedPost>>> + Send;

    fn create_post(&self, token: &AccessToken, content: &str) -> impl Future<Output = Result<Post>> + Send;

    fn edit_post(
        &self,
        token: &AccessToken,
        post_id: Uuid,
        content: &str,
    ) -> impl Future<Output = Result<Post>> + Send;

    fn delete_post(&self, token: &AccessToken, post_id: Uuid) -> impl Future<Output = Result<()>> + Send;

    fn flag_post(&self, token: &AccessToken, post_id: Uuid) -> impl Future<Output = Result<Post>> + Send;

    /// Bring the caller's like on `post_id` to `liked`. Idempotent.
    fn set_like(
        &self,
        token: &AccessToken,
        post_id: Uuid,
        liked: bool,
    ) -> impl Future<Output = Result<LikeState>> + Send;

    fn add_comment(
        &self,
        token: &AccessToken,
        post_id: Uuid,
        content: &str,
    ) -> impl Future<Output = Result<CommentView>> + Send;

    /// Messages between the caller and `with`, oldest first.
    fn fetch_conversation(
        &self,
        token: &AccessToken,
        with: Uuid,
    ) -> impl Future<Output = Result<Vec<MessageView>>> + Send;

    fn send_message(
        &self,
        token: &AccessToken,
        receiver_id: Uuid,
        content: &str,
    ) -> impl Future<Output = Result<MessageView>> + Send;

    fn mark_read(&self, token: &AccessToken, message_id: Uuid) -> impl Future<Output = Result<MessageView>> + Send;

    fn fetch_patients(&self, token: &AccessToken) -> impl Future<Output = Result<Vec<PatientSummary>>> + Send;

    /// Open a change feed for `topics`. Returns once the server has
    /// confirmed the subscription.
    fn subscribe(
        &self,
        token: &AccessToken,
        topics: &[Topic],
    ) -> impl Future<Output = Result<Subscription>> + Send;
}

/// A live change feed. Dropping it closes the underlying connection.
pub struct Subscription {
    events: mpsc::Receiver<ChangeEvent>,
    task: Option<JoinHandle<()>>,
}

impl Subscription {
    /// `task` is whatever pumps `events`; it is aborted on drop.
    pub fn new(events: mpsc::Receiver<ChangeEvent>, task: Option<JoinHandle<()>>) -> Self {
        Self { events, task }
    }

    /// Next change, or `None` once the feed has ended.
    pub async fn next(&mut self) -> Option<ChangeEvent> {
        self.events.recv().await
    }

    pub fn unsubscribe(self) {
        drop(self);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}
