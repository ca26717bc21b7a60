use std::collections::{HashMap, HashSet};

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use solace_types::api::{
    CommentView, FeedPost, LatestMood, LikeState, MessageView, MoodHistoryEntry, PatientSummary,
};
use solace_types::models::{DailyMoodEntry, Post, User, UserSummary};

use crate::Database;
use crate::models::{
    CredentialRow, date_at, encode_date, encode_time, summary_at, time_at, user_at, uuid_at,
};

const USER_COLUMNS: &str = "id, email, name, is_professional, created_at";

const MESSAGE_SELECT: &str = "SELECT m.id, m.sender_id, m.receiver_id, m.content, m.read, m.created_at,
                                     m.sender_id, u.name, u.is_professional
                              FROM messages m
                              LEFT JOIN users u ON m.sender_id = u.id";

impl Database {
    // -- Users --

    /// Insert a new account. Returns `None` when the email is already taken.
    pub fn create_user(
        &self,
        id: Uuid,
        email: &str,
        password_hash: &str,
        name: &str,
        is_professional: bool,
    ) -> Result<Option<User>> {
        self.with_conn(|conn| {
            let created_at = Utc::now();
            let inserted = conn.execute(
                "INSERT INTO users (id, email, password, name, is_professional, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(email) DO NOTHING",
                params![
                    id.to_string(),
                    email,
                    password_hash,
                    name,
                    is_professional,
                    encode_time(created_at)
                ],
            )?;

            if inserted == 0 {
                return Ok(None);
            }
            query_user(conn, id)
        })
    }

    pub fn get_credentials(&self, email: &str) -> Result<Option<CredentialRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    &format!("SELECT {USER_COLUMNS}, password FROM users WHERE email = ?1"),
                    [email],
                    |row| {
                        Ok(CredentialRow {
                            user: user_at(row, 0)?,
                            password_hash: row.get(5)?,
                        })
                    },
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn get_user(&self, id: Uuid) -> Result<Option<User>> {
        self.with_conn(|conn| query_user(conn, id))
    }

    /// Everyone except `viewer`, ordered by name.
    pub fn list_users_except(&self, viewer: Uuid) -> Result<Vec<UserSummary>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, name, is_professional FROM users WHERE id != ?1 ORDER BY name, id",
            )?;
            let rows = stmt
                .query_map([viewer.to_string()], |row| summary_at(row, 0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    // -- Daily moods --

    pub fn insert_daily_mood(
        &self,
        id: Uuid,
        user_id: Uuid,
        mood_id: Uuid,
        date: NaiveDate,
        notes: Option<&str>,
    ) -> Result<DailyMoodEntry> {
        self.with_conn(|conn| {
            let created_at = Utc::now();
            conn.execute(
                "INSERT INTO daily_moods (id, user_id, mood_id, date, notes, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    id.to_string(),
                    user_id.to_string(),
                    mood_id.to_string(),
                    encode_date(date),
                    notes,
                    encode_time(created_at)
                ],
            )?;

            Ok(DailyMoodEntry {
                id,
                user_id,
                mood_id,
                date,
                notes: notes.map(str::to_string),
                created_at,
            })
        })
    }

    /// A user's mood entries, newest first.
    pub fn mood_history(&self, user_id: Uuid) -> Result<Vec<MoodHistoryEntry>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT d.id, d.user_id, d.mood_id, d.date, d.notes, d.created_at, m.name, m.emoji
                 FROM daily_moods d
                 JOIN moods m ON d.mood_id = m.id
                 WHERE d.user_id = ?1
                 ORDER BY d.created_at DESC, d.rowid DESC",
            )?;
            let rows = stmt
                .query_map([user_id.to_string()], |row| {
                    Ok(MoodHistoryEntry {
                        entry: DailyMoodEntry {
                            id: uuid_at(row, 0)?,
                            user_id: uuid_at(row, 1)?,
                            mood_id: uuid_at(row, 2)?,
                            date: date_at(row, 3)?,
                            notes: row.get(4)?,
                            created_at: time_at(row, 5)?,
                        },
                        mood_name: row.get(6)?,
                        mood_emoji: row.get(7)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    /// Non-professional users ordered by name, each with their most recent
    /// mood entry.
    pub fn list_patients(&self) -> Result<Vec<PatientSummary>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT u.id, u.name, d.mood_id, m.name, m.emoji, d.date
                 FROM users u
                 LEFT JOIN daily_moods d ON d.id = (
                     SELECT id FROM daily_moods
                     WHERE user_id = u.id
                     ORDER BY created_at DESC, rowid DESC
                     LIMIT 1
                 )
                 LEFT JOIN moods m ON d.mood_id = m.id
                 WHERE u.is_professional = 0
                 ORDER BY u.name, u.id",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    let mood_id: Option<String> = row.get(2)?;
                    let latest_mood = match mood_id {
                        Some(_) => Some(LatestMood {
                            mood_id: uuid_at(row, 2)?,
                            name: row.get(3)?,
                            emoji: row.get(4)?,
                            date: date_at(row, 5)?,
                        }),
                        None => None,
                    };
                    Ok(PatientSummary {
                        id: uuid_at(row, 0)?,
                        name: row.get(1)?,
                        latest_mood,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    // -- Posts --

    pub fn insert_post(&self, id: Uuid, user_id: Uuid, content: &str) -> Result<Post> {
        self.with_conn(|conn| {
            let now = Utc::now();
            conn.execute(
                "INSERT INTO posts (id, user_id, content, flagged, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 0, ?4, ?4)",
                params![id.to_string(), user_id.to_string(), content, encode_time(now)],
            )?;
            Ok(Post {
                id,
                user_id,
                content: content.to_string(),
                flagged: false,
                created_at: now,
                updated_at: now,
            })
        })
    }

    pub fn get_post(&self, id: Uuid) -> Result<Option<Post>> {
        self.with_conn(|conn| query_post(conn, id))
    }

    pub fn update_post_content(&self, id: Uuid, content: &str) -> Result<Option<Post>> {
        self.with_conn(|conn| {
            conn.execute(
                "UPDATE posts SET content = ?2, updated_at = ?3 WHERE id = ?1",
                params![id.to_string(), content, encode_time(Utc::now())],
            )?;
            query_post(conn, id)
        })
    }

    /// Mark a post for moderation. Idempotent.
    pub fn flag_post(&self, id: Uuid) -> Result<Option<Post>> {
        self.with_conn(|conn| {
            conn.execute("UPDATE posts SET flagged = 1 WHERE id = ?1", [id.to_string()])?;
            query_post(conn, id)
        })
    }

    /// Delete a post; comments and likes go with it. Returns whether a row was removed.
    pub fn delete_post(&self, id: Uuid) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM posts WHERE id = ?1", [id.to_string()])?;
            Ok(removed > 0)
        })
    }

    /// Every post, newest first, with author, comments and per-viewer like state.
    pub fn feed(&self, viewer: Uuid) -> Result<Vec<FeedPost>> {
        self.with_conn(|conn| {
            let mut comments: HashMap<Uuid, Vec<CommentView>> = HashMap::new();
            for comment in query_comments(conn, None)? {
                comments.entry(comment.post_id).or_default().push(comment);
            }

            // post_id -> like count, plus the set the viewer liked
            let mut like_counts: HashMap<Uuid, usize> = HashMap::new();
            let mut liked_by_viewer: HashSet<Uuid> = HashSet::new();
            {
                let mut stmt = conn.prepare("SELECT post_id, user_id FROM likes")?;
                let mut rows = stmt.query([])?;
                while let Some(row) = rows.next()? {
                    let post_id = uuid_at(row, 0)?;
                    *like_counts.entry(post_id).or_default() += 1;
                    if uuid_at(row, 1)? == viewer {
                        liked_by_viewer.insert(post_id);
                    }
                }
            }

            let mut stmt = conn.prepare(
                "SELECT p.id, p.content, p.flagged, p.created_at, p.updated_at,
                        p.user_id, u.name, u.is_professional
                 FROM posts p
                 LEFT JOIN users u ON p.user_id = u.id
                 ORDER BY p.created_at DESC, p.rowid DESC",
            )?;
            let posts = stmt
                .query_map([], |row| {
                    let id = uuid_at(row, 0)?;
                    Ok(FeedPost {
                        id,
                        content: row.get(1)?,
                        flagged: row.get(2)?,
                        created_at: time_at(row, 3)?,
                        updated_at: time_at(row, 4)?,
                        author: summary_at(row, 5)?,
                        comments: comments.remove(&id).unwrap_or_default(),
                        like_count: like_counts.get(&id).copied().unwrap_or(0),
                        liked_by_me: liked_by_viewer.contains(&id),
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;

            Ok(posts)
        })
    }

    // -- Likes --

    /// Bring the (post, user) like to the requested state in one statement.
    /// Repeating the same request is a no-op. Returns whether a row changed.
    pub fn set_like(&self, post_id: Uuid, user_id: Uuid, liked: bool) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = if liked {
                conn.execute(
                    "INSERT OR IGNORE INTO likes (post_id, user_id, created_at) VALUES (?1, ?2, ?3)",
                    params![post_id.to_string(), user_id.to_string(), encode_time(Utc::now())],
                )?
            } else {
                conn.execute(
                    "DELETE FROM likes WHERE post_id = ?1 AND user_id = ?2",
                    params![post_id.to_string(), user_id.to_string()],
                )?
            };
            Ok(changed > 0)
        })
    }

    /// Flip the like inside a single transaction. Returns the new state.
    pub fn toggle_like(&self, post_id: Uuid, user_id: Uuid) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let removed = tx.execute(
                "DELETE FROM likes WHERE post_id = ?1 AND user_id = ?2",
                params![post_id.to_string(), user_id.to_string()],
            )?;
            if removed == 0 {
                tx.execute(
                    "INSERT INTO likes (post_id, user_id, created_at) VALUES (?1, ?2, ?3)",
                    params![post_id.to_string(), user_id.to_string(), encode_time(Utc::now())],
                )?;
            }
            tx.commit()?;
            Ok(removed == 0)
        })
    }

    pub fn like_state(&self, post_id: Uuid, user_id: Uuid) -> Result<LikeState> {
        self.with_conn(|conn| {
            let (like_count, liked): (i64, bool) = conn.query_row(
                "SELECT COUNT(*), COALESCE(SUM(user_id = ?2), 0) > 0
                 FROM likes WHERE post_id = ?1",
                params![post_id.to_string(), user_id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            Ok(LikeState {
                post_id,
                liked,
                like_count: like_count as usize,
            })
        })
    }

    // -- Comments --

    pub fn insert_comment(
        &self,
        id: Uuid,
        post_id: Uuid,
        user_id: Uuid,
        content: &str,
    ) -> Result<CommentView> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO comments (id, post_id, user_id, content, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    id.to_string(),
                    post_id.to_string(),
                    user_id.to_string(),
                    content,
                    encode_time(Utc::now())
                ],
            )?;
            query_comments(conn, Some(id))?
                .pop()
                .ok_or_else(|| anyhow::anyhow!("Comment vanished after insert: {}", id))
        })
    }

    // -- Messages --

    pub fn insert_message(
        &self,
        id: Uuid,
        sender_id: Uuid,
        receiver_id: Uuid,
        content: &str,
    ) -> Result<MessageView> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO messages (id, sender_id, receiver_id, content, read, created_at)
                 VALUES (?1, ?2, ?3, ?4, 0, ?5)",
                params![
                    id.to_string(),
                    sender_id.to_string(),
                    receiver_id.to_string(),
                    content,
                    encode_time(Utc::now())
                ],
            )?;
            query_message(conn, id)?
                .ok_or_else(|| anyhow::anyhow!("Message vanished after insert: {}", id))
        })
    }

    pub fn get_message(&self, id: Uuid) -> Result<Option<MessageView>> {
        self.with_conn(|conn| query_message(conn, id))
    }

    /// Messages exchanged between exactly `a` and `b`, oldest first.
    pub fn conversation(&self, a: Uuid, b: Uuid) -> Result<Vec<MessageView>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "{MESSAGE_SELECT}
                 WHERE (m.sender_id = ?1 AND m.receiver_id = ?2)
                    OR (m.sender_id = ?2 AND m.receiver_id = ?1)
                 ORDER BY m.created_at ASC, m.rowid ASC"
            ))?;
            let rows = stmt
                .query_map(params![a.to_string(), b.to_string()], message_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }

    pub fn mark_message_read(&self, id: Uuid) -> Result<Option<MessageView>> {
        self.with_conn(|conn| {
            conn.execute("UPDATE messages SET read = 1 WHERE id = ?1", [id.to_string()])?;
            query_message(conn, id)
        })
    }
}

fn query_user(conn: &Connection, id: Uuid) -> Result<Option<User>> {
    let row = conn
        .query_row(
            &format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?1"),
            [id.to_string()],
            |row| user_at(row, 0),
        )
        .optional()?;
    Ok(row)
}

fn query_post(conn: &Connection, id: Uuid) -> Result<Option<Post>> {
    let row = conn
        .query_row(
            "SELECT id, user_id, content, flagged, created_at, updated_at FROM posts WHERE id = ?1",
            [id.to_string()],
            |row| {
                Ok(Post {
                    id: uuid_at(row, 0)?,
                    user_id: uuid_at(row, 1)?,
                    content: row.get(2)?,
                    flagged: row.get(3)?,
                    created_at: time_at(row, 4)?,
                    updated_at: time_at(row, 5)?,
                })
            },
        )
        .optional()?;
    Ok(row)
}

/// All comments oldest first, or the single comment `only`.
fn query_comments(conn: &Connection, only: Option<Uuid>) -> Result<Vec<CommentView>> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.post_id, c.content, c.created_at, c.user_id, u.name, u.is_professional
         FROM comments c
         LEFT JOIN users u ON c.user_id = u.id
         WHERE ?1 IS NULL OR c.id = ?1
         ORDER BY c.created_at ASC, c.rowid ASC",
    )?;
    let rows = stmt
        .query_map([only.map(|id| id.to_string())], |row| {
            Ok(CommentView {
                id: uuid_at(row, 0)?,
                post_id: uuid_at(row, 1)?,
                content: row.get(2)?,
                created_at: time_at(row, 3)?,
                author: summary_at(row, 4)?,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows)
}

fn query_message(conn: &Connection, id: Uuid) -> Result<Option<MessageView>> {
    let row = conn
        .query_row(
            &format!("{MESSAGE_SELECT} WHERE m.id = ?1"),
            [id.to_string()],
            message_from_row,
        )
        .optional()?;
    Ok(row)
}

fn message_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MessageView> {
    Ok(MessageView {
        id: uuid_at(row, 0)?,
        sender_id: uuid_at(row, 1)?,
        receiver_id: uuid_at(row, 2)?,
        content: row.get(3)?,
        read: row.get(4)?,
        created_at: time_at(row, 5)?,
        sender: summary_at(row, 6)?,
    })
}
