use axum::{Extension, Json, extract::State};
use tracing::warn;

use solace_types::api::{Claims, PatientSummary};

use crate::error::ApiError;
use crate::{AppState, blocking};

/// Roster of non-professional users with their latest mood. Professionals only;
/// the flag is read from the profile row, not the token.
pub async fn list_patients(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<PatientSummary>>, ApiError> {
    let caller = claims.sub;
    let patients = blocking(&state, move |db| {
        let is_professional = db.get_user(caller)?.is_some_and(|u| u.is_professional);
        if !is_professional {
            return Ok(None);
        }
        db.list_patients().map(Some)
    })
    .await?;

    match patients {
        Some(patients) => Ok(Json(patients)),
        None => {
            warn!("{} requested the patient roster without the professional flag", caller);
            Err(ApiError::Forbidden("Only professionals can view patients"))
        }
    }
}
