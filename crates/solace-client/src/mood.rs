use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::debug;

use solace_types::api::MoodHistoryEntry;
use solace_types::models::DailyMoodEntry;
use solace_types::moods::{CatalogEntry, MOOD_CATALOG, Mood};

use crate::backend::Backend;
use crate::busy::BusyFlag;
use crate::error::Result;
use crate::session::Session;

/// Picks one entry of the mood catalog by position.
pub struct MoodSlider<B> {
    session: Arc<Session>,
    backend: Arc<B>,
    index: AtomicUsize,
    saving: BusyFlag,
}

impl<B: Backend> MoodSlider<B> {
    /// Starts in the middle of the catalog.
    pub fn new(session: Arc<Session>, backend: Arc<B>) -> Self {
        Self {
            session,
            backend,
            index: AtomicUsize::new(MOOD_CATALOG.len() / 2),
            saving: BusyFlag::default(),
        }
    }

    pub fn catalog(&self) -> &'static [CatalogEntry] {
        &MOOD_CATALOG
    }

    pub fn index(&self) -> usize {
        self.index.load(Ordering::Relaxed)
    }

    /// Out-of-range positions are clamped to the last entry.
    pub fn set_index(&self, index: usize) {
        self.index.store(index.min(MOOD_CATALOG.len() - 1), Ordering::Relaxed);
    }

    pub fn selected(&self) -> &'static CatalogEntry {
        &MOOD_CATALOG[self.index()]
    }

    pub fn is_saving(&self) -> bool {
        self.saving.is_busy()
    }

    /// Signed in: record today's entry, then make it the current mood.
    /// Signed out: only the current mood changes and `None` is returned.
    pub async fn save(&self) -> Result<Option<DailyMoodEntry>> {
        let _saving = self.saving.try_acquire()?;
        let selected = self.selected();
        let mood = Mood::from(selected);

        let Ok(signed_in) = self.session.credentials() else {
            debug!("Not signed in, keeping {} locally", selected.name);
            self.session.set_current_mood(mood);
            return Ok(None);
        };

        let entry = self.backend.record_mood(&signed_in.token, selected.id, "").await?;
        debug!("Recorded {} for {}", selected.name, entry.date);
        self.session.set_current_mood(mood);
        Ok(Some(entry))
    }

    /// The signed-in user's recorded moods, newest first.
    pub async fn history(&self) -> Result<Vec<MoodHistoryEntry>> {
        let signed_in = self.session.credentials()?;
        let history = self.backend.mood_history(&signed_in.token).await?;
        debug!("Loaded {} mood entries", history.len());
        Ok(history)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpBackend;

    fn slider() -> MoodSlider<HttpBackend> {
        MoodSlider::new(
            Arc::new(Session::new()),
            Arc::new(HttpBackend::new("http://127.0.0.1:9")),
        )
    }

    #[test]
    fn starts_at_middle_entry() {
        let slider = slider();
        assert_eq!(slider.index(), 13);
        assert_eq!(slider.selected().name, "Amusement");
    }

    #[test]
    fn index_is_clamped() {
        let slider = slider();
        slider.set_index(500);
        assert_eq!(slider.index(), MOOD_CATALOG.len() - 1);
        slider.set_index(0);
        assert_eq!(slider.selected().name, MOOD_CATALOG[0].name);
    }

    #[tokio::test]
    async fn signed_out_save_stays_local() {
        let slider = slider();
        slider.set_index(1);
        assert!(slider.save().await.unwrap().is_none());
        assert_eq!(
            slider.session.current_mood().map(|m| m.name),
            Some(MOOD_CATALOG[1].name.to_string())
        );
    }
}
