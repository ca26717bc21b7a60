use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::{CommentView, MessageView};
use crate::models::{DailyMoodEntry, Like, Post};

/// Tables that publish row-level changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Table {
    Posts,
    Comments,
    Likes,
    Messages,
    DailyMoods,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A (table, event kind) pair a client can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Topic {
    pub table: Table,
    pub kind: ChangeKind,
}

impl Topic {
    pub const fn new(table: Table, kind: ChangeKind) -> Self {
        Self { table, kind }
    }
}

/// The changed row. Deletes carry the row as it was before removal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "row", rename_all = "snake_case")]
pub enum Record {
    Post(Post),
    Comment(CommentView),
    Like(Like),
    Message(MessageView),
    DailyMood(DailyMoodEntry),
}

impl Record {
    pub fn table(&self) -> Table {
        match self {
            Self::Post(_) => Table::Posts,
            Self::Comment(_) => Table::Comments,
            Self::Like(_) => Table::Likes,
            Self::Message(_) => Table::Messages,
            Self::DailyMood(_) => Table::DailyMoods,
        }
    }
}

/// Who may observe a change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    Everyone,
    Users(Vec<Uuid>),
}

impl Audience {
    pub fn includes(&self, user_id: Uuid) -> bool {
        match self {
            Self::Everyone => true,
            Self::Users(ids) => ids.contains(&user_id),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: Table,
    pub kind: ChangeKind,
    pub record: Record,
}

impl ChangeEvent {
    pub fn new(kind: ChangeKind, record: Record) -> Self {
        Self {
            table: record.table(),
            kind,
            record,
        }
    }

    pub fn topic(&self) -> Topic {
        Topic::new(self.table, self.kind)
    }

    /// Messages are private to their two participants and mood entries to
    /// their owner. Feed activity is public.
    pub fn audience(&self) -> Audience {
        match &self.record {
            Record::Message(m) => Audience::Users(vec![m.sender_id, m.receiver_id]),
            Record::DailyMood(d) => Audience::Users(vec![d.user_id]),
            Record::Post(_) | Record::Comment(_) | Record::Like(_) => Audience::Everyone,
        }
    }
}

/// Events sent over the WebSocket gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayEvent {
    /// Server confirms successful authentication
    Ready { user_id: Uuid },

    /// Server confirms the connection's full topic set after a
    /// Subscribe or Unsubscribe. Changes published afterwards are delivered.
    Subscribed { topics: Vec<Topic> },

    /// A subscribed table changed
    Change(ChangeEvent),
}

/// Commands sent FROM client TO server over WebSocket.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum GatewayCommand {
    /// Authenticate the WebSocket connection
    Identify { token: String },

    /// Start receiving changes for these topics.
    Subscribe { topics: Vec<Topic> },

    /// Stop receiving changes for these topics.
    Unsubscribe { topics: Vec<Topic> },
}
