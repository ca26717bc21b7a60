use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};
use uuid::Uuid;

use solace_types::api::PatientSummary;

use crate::backend::Backend;
use crate::conversation::{ConversationView, Messenger};
use crate::error::{ClientError, Result};
use crate::session::Session;
use crate::view::ViewScope;

/// Professionals' list of patients with each one's latest mood.
pub struct PatientRoster<B> {
    session: Arc<Session>,
    backend: Arc<B>,
    scope: ViewScope,
    patients: watch::Sender<Vec<PatientSummary>>,
}

impl<B: Backend> PatientRoster<B> {
    pub fn new(session: Arc<Session>, backend: Arc<B>) -> Self {
        let (patients, _) = watch::channel(Vec::new());
        Self {
            session,
            backend,
            scope: ViewScope::default(),
            patients,
        }
    }

    pub fn patients(&self) -> Vec<PatientSummary> {
        self.patients.borrow().clone()
    }

    pub fn watch(&self) -> watch::Receiver<Vec<PatientSummary>> {
        self.patients.subscribe()
    }

    /// Fetch the roster. Non-professional sessions are refused here,
    /// before any request is made.
    pub async fn load(&self) -> Result<()> {
        self.scope.ensure_open()?;
        let signed_in = self.session.credentials()?;
        if !signed_in.user.is_professional {
            warn!("{} is not a professional, roster unavailable", signed_in.user.id);
            return Err(ClientError::Forbidden("Only professionals can view patients".into()));
        }

        let patients = self
            .scope
            .run(self.backend.fetch_patients(&signed_in.token))
            .await?;
        debug!("Loaded {} patients", patients.len());
        self.patients.send_replace(patients);
        Ok(())
    }

    /// Open a conversation with a patient from the loaded roster.
    pub async fn start_chat(&self, patient_id: Uuid) -> Result<ConversationView<B>> {
        self.scope.ensure_open()?;
        if !self.patients.borrow().iter().any(|p| p.id == patient_id) {
            return Err(ClientError::NotFound("Patient not found".into()));
        }
        Messenger::new(self.session.clone(), self.backend.clone())
            .open(patient_id)
            .await
    }

    pub fn close(&self) {
        self.scope.close();
    }
}

impl<B> Drop for PatientRoster<B> {
    fn drop(&mut self) {
        self.scope.close();
    }
}
