use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use solace_types::api::{CommentView, FeedPost, LikeState};
use solace_types::models::Post;

use crate::backend::Backend;
use crate::busy::{BusyFlag, InFlight};
use crate::error::{ClientError, Result};
use crate::session::{Session, SignedIn};
use crate::view::ViewScope;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum PostAction {
    Like,
    Comment,
    Edit,
    Delete,
    Flag,
}

/// An edit in progress. Only one post is edited at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditDraft {
    pub post_id: Uuid,
    pub content: String,
}

/// The shared social feed, newest first.
pub struct FeedView<B> {
    session: Arc<Session>,
    backend: Arc<B>,
    scope: ViewScope,
    posts: watch::Sender<Vec<FeedPost>>,
    draft: Mutex<Option<EditDraft>>,
    posting: BusyFlag,
    pending: InFlight<(Uuid, PostAction)>,
    /// Set when the re-fetch after a successful write failed.
    stale: AtomicBool,
}

impl<B: Backend> FeedView<B> {
    pub fn new(session: Arc<Session>, backend: Arc<B>) -> Self {
        let (posts, _) = watch::channel(Vec::new());
        Self {
            session,
            backend,
            scope: ViewScope::default(),
            posts,
            draft: Mutex::new(None),
            posting: BusyFlag::default(),
            pending: InFlight::default(),
            stale: AtomicBool::new(false),
        }
    }

    pub fn posts(&self) -> Vec<FeedPost> {
        self.posts.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Vec<FeedPost>> {
        self.posts.subscribe()
    }

    /// Whether the signed-in user may edit or delete `post`.
    pub fn can_modify(&self, post: &FeedPost) -> bool {
        self.session.user().is_some_and(|u| u.id == post.author.id)
    }

    pub fn is_liking(&self, post_id: Uuid) -> bool {
        self.pending.contains(&(post_id, PostAction::Like))
    }

    /// Replace the local list with the server's.
    pub async fn refresh(&self) -> Result<()> {
        let signed_in = self.credentials()?;
        let feed = self.scope.run(self.backend.fetch_feed(&signed_in.token)).await?;
        debug!("Feed refreshed, {} posts", feed.len());
        self.posts.send_replace(feed);
        self.stale.store(false, Ordering::Release);
        Ok(())
    }

    /// True when the local list missed a write this view made.
    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Acquire)
    }

    /// Re-fetch after a write that already succeeded. Failures mark the
    /// view stale; the write itself still reports success.
    async fn refresh_after_write(&self) {
        if let Err(e) = self.refresh().await {
            warn!("Feed re-fetch after write failed: {}", e);
            self.stale.store(true, Ordering::Release);
        }
    }

    pub async fn create_post(&self, content: &str) -> Result<Post> {
        let content = non_empty(content, "Post")?;
        let signed_in = self.credentials()?;
        let _posting = self.posting.try_acquire()?;

        let post = self
            .scope
            .run(self.backend.create_post(&signed_in.token, content))
            .await?;
        info!("Created post {}", post.id);
        self.refresh_after_write().await;
        Ok(post)
    }

    /// Start editing a post the signed-in user wrote.
    pub fn begin_edit(&self, post_id: Uuid) -> Result<EditDraft> {
        self.scope.ensure_open()?;
        let post = self.owned_post(post_id)?;
        let draft = EditDraft {
            post_id,
            content: post.content,
        };
        *self.lock_draft() = Some(draft.clone());
        Ok(draft)
    }

    pub fn draft(&self) -> Option<EditDraft> {
        self.lock_draft().clone()
    }

    pub fn update_draft(&self, content: &str) -> Result<()> {
        let mut draft = self.lock_draft();
        let draft = draft
            .as_mut()
            .ok_or_else(|| ClientError::InvalidInput("No edit in progress".into()))?;
        draft.content = content.to_string();
        Ok(())
    }

    pub fn cancel_edit(&self) {
        *self.lock_draft() = None;
    }

    /// Persist the draft. It stays open if the save fails.
    pub async fn save_edit(&self) -> Result<Post> {
        let draft = self
            .draft()
            .ok_or_else(|| ClientError::InvalidInput("No edit in progress".into()))?;
        let content = non_empty(&draft.content, "Post")?.to_string();
        self.owned_post(draft.post_id)?;
        let signed_in = self.credentials()?;
        let _pending = self.pending.try_acquire((draft.post_id, PostAction::Edit))?;

        let post = self
            .scope
            .run(self.backend.edit_post(&signed_in.token, draft.post_id, &content))
            .await?;
        self.cancel_edit();
        self.refresh_after_write().await;
        Ok(post)
    }

    pub async fn delete_post(&self, post_id: Uuid) -> Result<()> {
        self.owned_post(post_id)?;
        let signed_in = self.credentials()?;
        let _pending = self.pending.try_acquire((post_id, PostAction::Delete))?;

        self.scope
            .run(self.backend.delete_post(&signed_in.token, post_id))
            .await?;
        info!("Deleted post {}", post_id);
        {
            let mut draft = self.lock_draft();
            if draft.as_ref().is_some_and(|d| d.post_id == post_id) {
                *draft = None;
            }
        }
        self.refresh_after_write().await;
        Ok(())
    }

    /// Ask for the opposite of what the feed currently shows. The server
    /// applies the requested state, so a repeated request cannot double-like.
    pub async fn toggle_like(&self, post_id: Uuid) -> Result<LikeState> {
        let signed_in = self.credentials()?;
        let liked = self.post(post_id)?.liked_by_me;
        let _pending = self.pending.try_acquire((post_id, PostAction::Like))?;

        let state = self
            .scope
            .run(self.backend.set_like(&signed_in.token, post_id, !liked))
            .await?;
        self.refresh_after_write().await;
        Ok(state)
    }

    pub async fn add_comment(&self, post_id: Uuid, content: &str) -> Result<CommentView> {
        let content = non_empty(content, "Comment")?;
        let signed_in = self.credentials()?;
        let _pending = self.pending.try_acquire((post_id, PostAction::Comment))?;

        let comment = self
            .scope
            .run(self.backend.add_comment(&signed_in.token, post_id, content))
            .await?;
        self.refresh_after_write().await;
        Ok(comment)
    }

    /// Report a post for moderation.
    pub async fn flag_post(&self, post_id: Uuid) -> Result<Post> {
        let signed_in = self.credentials()?;
        let _pending = self.pending.try_acquire((post_id, PostAction::Flag))?;

        let post = self
            .scope
            .run(self.backend.flag_post(&signed_in.token, post_id))
            .await?;
        self.refresh_after_write().await;
        Ok(post)
    }

    /// Abandon in-flight requests. Nothing is applied afterwards.
    pub fn close(&self) {
        self.scope.close();
    }

    fn credentials(&self) -> Result<SignedIn> {
        self.scope.ensure_open()?;
        self.session.credentials()
    }

    fn post(&self, post_id: Uuid) -> Result<FeedPost> {
        self.posts
            .borrow()
            .iter()
            .find(|p| p.id == post_id)
            .cloned()
            .ok_or_else(|| ClientError::NotFound("Post not found".into()))
    }

    fn owned_post(&self, post_id: Uuid) -> Result<FeedPost> {
        let post = self.post(post_id)?;
        if !self.can_modify(&post) {
            return Err(ClientError::Forbidden("Only the author can modify this post".into()));
        }
        Ok(post)
    }

    fn lock_draft(&self) -> std::sync::MutexGuard<'_, Option<EditDraft>> {
        self.draft.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<B> Drop for FeedView<B> {
    fn drop(&mut self) {
        self.scope.close();
    }
}

fn non_empty<'a>(content: &'a str, what: &str) -> Result<&'a str> {
    let content = content.trim();
    if content.is_empty() {
        return Err(ClientError::InvalidInput(format!("{} cannot be empty", what)));
    }
    Ok(content)
}
