use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use solace_types::api::MessageView;
use solace_types::events::{ChangeKind, Record, Table, Topic};
use solace_types::models::UserSummary;

use crate::backend::{Backend, Subscription};
use crate::busy::BusyFlag;
use crate::error::{ClientError, Result};
use crate::session::Session;
use crate::view::ViewScope;

const NEW_MESSAGES: Topic = Topic::new(Table::Messages, ChangeKind::Insert);

/// Entry point for direct messaging: pick a contact, open a conversation.
pub struct Messenger<B> {
    session: Arc<Session>,
    backend: Arc<B>,
}

impl<B: Backend> Messenger<B> {
    pub fn new(session: Arc<Session>, backend: Arc<B>) -> Self {
        Self { session, backend }
    }

    /// Everyone except the signed-in user.
    pub async fn contacts(&self) -> Result<Vec<UserSummary>> {
        let signed_in = self.session.credentials()?;
        self.backend.list_users(&signed_in.token).await
    }

    /// Load the conversation with `counterpart` and follow new messages
    /// until the view is closed.
    pub async fn open(&self, counterpart: Uuid) -> Result<ConversationView<B>> {
        let signed_in = self.session.credentials()?;
        let me = signed_in.user.id;
        if counterpart == me {
            return Err(ClientError::InvalidInput("Cannot message yourself".into()));
        }

        let messages = Arc::new(watch::channel(Vec::new()).0);
        let scope = ViewScope::default();

        // Subscribe before fetching so nothing sent in between is missed.
        let subscription = self.backend.subscribe(&signed_in.token, &[NEW_MESSAGES]).await?;
        let feed_task = tokio::spawn(follow(subscription, messages.clone(), scope.token(), me, counterpart));

        let history = match self.backend.fetch_conversation(&signed_in.token, counterpart).await {
            Ok(history) => history,
            Err(e) => {
                feed_task.abort();
                return Err(e);
            }
        };
        messages.send_modify(|current| {
            let live = std::mem::take(current);
            for message in history.into_iter().chain(live) {
                apply(current, message, me, counterpart);
            }
        });

        info!("Opened conversation {} <-> {}", me, counterpart);
        Ok(ConversationView {
            session: self.session.clone(),
            backend: self.backend.clone(),
            scope,
            me,
            counterpart,
            messages,
            sending: BusyFlag::default(),
            feed_task,
        })
    }
}

/// One two-party conversation, oldest message first.
pub struct ConversationView<B> {
    session: Arc<Session>,
    backend: Arc<B>,
    scope: ViewScope,
    me: Uuid,
    counterpart: Uuid,
    messages: Arc<watch::Sender<Vec<MessageView>>>,
    sending: BusyFlag,
    feed_task: JoinHandle<()>,
}

impl<B: Backend> ConversationView<B> {
    pub fn counterpart(&self) -> Uuid {
        self.counterpart
    }

    pub fn messages(&self) -> Vec<MessageView> {
        self.messages.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Vec<MessageView>> {
        self.messages.subscribe()
    }

    pub fn is_sending(&self) -> bool {
        self.sending.is_busy()
    }

    /// Send and show immediately. The change feed echo is de-duplicated.
    pub async fn send(&self, content: &str) -> Result<MessageView> {
        let content = content.trim();
        if content.is_empty() {
            return Err(ClientError::InvalidInput("Message cannot be empty".into()));
        }
        self.scope.ensure_open()?;
        let signed_in = self.session.credentials()?;
        let _sending = self.sending.try_acquire()?;

        let message = self
            .scope
            .run(self.backend.send_message(&signed_in.token, self.counterpart, content))
            .await?;
        let (me, counterpart) = (self.me, self.counterpart);
        let sent = message.clone();
        self.messages.send_modify(|current| apply(current, sent, me, counterpart));
        Ok(message)
    }

    /// Mark a message addressed to the signed-in user as read.
    pub async fn mark_read(&self, message_id: Uuid) -> Result<()> {
        self.scope.ensure_open()?;
        let received = self
            .messages
            .borrow()
            .iter()
            .find(|m| m.id == message_id)
            .map(|m| m.receiver_id == self.me)
            .ok_or_else(|| ClientError::NotFound("Message not found".into()))?;
        if !received {
            return Err(ClientError::Forbidden("Only the receiver can mark a message read".into()));
        }
        let signed_in = self.session.credentials()?;

        let updated = self
            .scope
            .run(self.backend.mark_read(&signed_in.token, message_id))
            .await?;
        self.messages.send_modify(|current| {
            if let Some(m) = current.iter_mut().find(|m| m.id == updated.id) {
                m.read = updated.read;
            }
        });
        Ok(())
    }

    /// Stop following the conversation. Late responses are discarded.
    pub fn close(&self) {
        self.scope.close();
        self.feed_task.abort();
    }

    pub fn is_closed(&self) -> bool {
        self.scope.is_closed()
    }
}

impl<B> Drop for ConversationView<B> {
    fn drop(&mut self) {
        self.scope.close();
        self.feed_task.abort();
    }
}

/// Apply live inserts in arrival order until the feed ends or the view closes.
async fn follow(
    mut subscription: Subscription,
    messages: Arc<watch::Sender<Vec<MessageView>>>,
    closed: tokio_util::sync::CancellationToken,
    me: Uuid,
    counterpart: Uuid,
) {
    loop {
        let change = tokio::select! {
            _ = closed.cancelled() => break,
            change = subscription.next() => match change {
                Some(change) => change,
                None => break,
            },
        };
        if change.kind != ChangeKind::Insert {
            continue;
        }
        if let Record::Message(message) = change.record {
            messages.send_modify(|current| apply(current, message, me, counterpart));
        }
    }
    debug!("Stopped following {} <-> {}", me, counterpart);
}

/// Append `message` if it belongs to this conversation and is not shown yet.
fn apply(current: &mut Vec<MessageView>, message: MessageView, me: Uuid, counterpart: Uuid) {
    if !message.is_between(me, counterpart) {
        return;
    }
    if current.iter().any(|m| m.id == message.id) {
        return;
    }
    current.push(message);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn message(sender_id: Uuid, receiver_id: Uuid) -> MessageView {
        MessageView {
            id: Uuid::new_v4(),
            sender_id,
            receiver_id,
            content: "hi".into(),
            read: false,
            created_at: Utc::now(),
            sender: UserSummary {
                id: sender_id,
                name: "x".into(),
                is_professional: false,
            },
        }
    }

    #[test]
    fn apply_keeps_only_this_pair_once() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let mut shown = Vec::new();

        let first = message(a, b);
        apply(&mut shown, first.clone(), a, b);
        apply(&mut shown, first.clone(), a, b);
        apply(&mut shown, message(a, c), a, b);
        apply(&mut shown, message(c, b), a, b);
        let reply = message(b, a);
        apply(&mut shown, reply.clone(), a, b);

        assert_eq!(shown, vec![first, reply]);
    }
}
