use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{DailyMoodEntry, User, UserSummary};

// -- JWT Claims --

/// JWT claims shared by the REST middleware and the gateway handshake.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub exp: usize,
}

/// Body of every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

// -- Auth --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub name: String,
    #[serde(default)]
    pub is_professional: bool,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

// -- Moods --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RecordMoodRequest {
    pub mood_id: Uuid,
    #[serde(default)]
    pub notes: Option<String>,
}

/// A daily mood entry joined with its catalog name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoodHistoryEntry {
    #[serde(flatten)]
    pub entry: DailyMoodEntry,
    pub mood_name: String,
    pub mood_emoji: String,
}

// -- Posts --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PostContentRequest {
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SetLikeRequest {
    pub liked: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LikeState {
    pub post_id: Uuid,
    pub liked: bool,
    pub like_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentView {
    pub id: Uuid,
    pub post_id: Uuid,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub author: UserSummary,
}

/// A post as rendered in the feed. `like_count` and `liked_by_me` are
/// derived per caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedPost {
    pub id: Uuid,
    pub content: String,
    pub flagged: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub author: UserSummary,
    pub comments: Vec<CommentView>,
    pub like_count: usize,
    pub liked_by_me: bool,
}

// -- Messages --

#[derive(Debug, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SendMessageRequest {
    pub receiver_id: Uuid,
    pub content: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ConversationQuery {
    pub with: Uuid,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageView {
    pub id: Uuid,
    pub sender_id: Uuid,
    pub receiver_id: Uuid,
    pub content: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
    pub sender: UserSummary,
}

impl MessageView {
    /// True when the message was exchanged between exactly `a` and `b`,
    /// in either direction.
    pub fn is_between(&self, a: Uuid, b: Uuid) -> bool {
        (self.sender_id == a && self.receiver_id == b)
            || (self.sender_id == b && self.receiver_id == a)
    }
}

// -- Patients --

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatestMood {
    pub mood_id: Uuid,
    pub name: String,
    pub emoji: String,
    pub date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatientSummary {
    pub id: Uuid,
    pub name: String,
    pub latest_mood: Option<LatestMood>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn summary(id: Uuid) -> UserSummary {
        UserSummary { id, name: "x".into(), is_professional: false }
    }

    #[test]
    fn is_between_ignores_third_parties() {
        let (a, b, c) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
        let msg = |sender_id, receiver_id| MessageView {
            id: Uuid::new_v4(),
            sender_id,
            receiver_id,
            content: "hi".into(),
            read: false,
            created_at: Utc::now(),
            sender: summary(sender_id),
        };

        assert!(msg(a, b).is_between(a, b));
        assert!(msg(b, a).is_between(a, b));
        assert!(!msg(a, c).is_between(a, b));
        assert!(!msg(c, b).is_between(a, b));
    }
}
