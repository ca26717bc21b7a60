use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use chrono::Utc;
use tracing::debug;
use uuid::Uuid;

use solace_types::api::{Claims, MoodHistoryEntry, RecordMoodRequest};
use solace_types::events::{ChangeEvent, ChangeKind, Record};
use solace_types::moods::{self, MOOD_CATALOG, Mood};

use crate::error::ApiError;
use crate::{AppState, blocking};

/// The fixed catalog, in catalog order.
pub async fn list_moods() -> Json<Vec<Mood>> {
    Json(MOOD_CATALOG.iter().map(Mood::from).collect())
}

/// Append a daily mood entry for the caller, dated today (UTC).
pub async fn record_mood(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<RecordMoodRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let mood = moods::find(req.mood_id)
        .ok_or_else(|| ApiError::BadRequest(format!("Unknown mood: {}", req.mood_id)))?;

    let notes = req.notes.map(|n| n.trim().to_string());
    let today = Utc::now().date_naive();
    let entry = blocking(&state, move |db| {
        db.insert_daily_mood(Uuid::new_v4(), claims.sub, mood.id, today, notes.as_deref())
    })
    .await?;

    debug!("{} recorded mood {} for {}", entry.user_id, mood.name, entry.date);
    state
        .dispatcher
        .publish(ChangeEvent::new(ChangeKind::Insert, Record::DailyMood(entry.clone())));

    Ok((StatusCode::CREATED, Json(entry)))
}

pub async fn mood_history(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<MoodHistoryEntry>>, ApiError> {
    let history = blocking(&state, move |db| db.mood_history(claims.sub)).await?;
    Ok(Json(history))
}
