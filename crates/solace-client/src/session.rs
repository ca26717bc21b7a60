use tokio::sync::watch;
use tracing::{info, warn};

use solace_types::api::RegisterRequest;
use solace_types::models::User;
use solace_types::moods::Mood;

use crate::backend::{AccessToken, Backend};
use crate::busy::BusyFlag;
use crate::error::{ClientError, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedIn {
    pub user: User,
    pub token: AccessToken,
}

/// Snapshot of who is signed in and the mood they last picked.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub signed_in: Option<SignedIn>,
    pub current_mood: Option<Mood>,
}

/// The one place the signed-in user lives. Views read it; only the
/// sign-in/sign-up/sign-out operations (and a saved mood) change it.
#[derive(Debug)]
pub struct Session {
    state: watch::Sender<SessionState>,
    busy: BusyFlag,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        let (state, _) = watch::channel(SessionState::default());
        Self {
            state,
            busy: BusyFlag::default(),
        }
    }

    /// Re-render trigger for UIs.
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn user(&self) -> Option<User> {
        self.state.borrow().signed_in.as_ref().map(|s| s.user.clone())
    }

    pub fn current_mood(&self) -> Option<Mood> {
        self.state.borrow().current_mood.clone()
    }

    pub fn is_busy(&self) -> bool {
        self.busy.is_busy()
    }

    /// User and token, or `NotAuthenticated`.
    pub(crate) fn credentials(&self) -> Result<SignedIn> {
        self.state
            .borrow()
            .signed_in
            .clone()
            .ok_or(ClientError::NotAuthenticated)
    }

    pub(crate) fn set_current_mood(&self, mood: Mood) {
        self.state.send_modify(|s| s.current_mood = Some(mood));
    }

    /// A mood picked while signed out is kept; another account's is not.
    fn establish(&self, signed_in: SignedIn) {
        self.state.send_modify(|s| {
            let switched = s
                .signed_in
                .as_ref()
                .is_some_and(|prev| prev.user.id != signed_in.user.id);
            if switched {
                s.current_mood = None;
            }
            s.signed_in = Some(signed_in);
        });
    }

    pub async fn sign_in<B: Backend>(&self, backend: &B, email: &str, password: &str) -> Result<User> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(ClientError::InvalidInput("Email and password are required".into()));
        }
        let _busy = self.busy.try_acquire()?;

        let auth = backend.sign_in(email, password).await?;
        let token = AccessToken::new(auth.token);
        // The profile row, not the auth payload, decides the professional flag.
        let user = backend.profile(&token).await?;

        info!("Signed in as {} ({})", user.email, user.id);
        self.establish(SignedIn {
            user: user.clone(),
            token,
        });
        Ok(user)
    }

    /// Create an account and sign straight into it.
    pub async fn sign_up<B: Backend>(
        &self,
        backend: &B,
        email: &str,
        password: &str,
        name: &str,
        is_professional: bool,
    ) -> Result<User> {
        let (email, name) = (email.trim(), name.trim());
        if email.is_empty() || password.is_empty() || name.is_empty() {
            return Err(ClientError::InvalidInput("Name, email and password are required".into()));
        }
        let _busy = self.busy.try_acquire()?;

        let req = RegisterRequest {
            email: email.to_string(),
            password: password.to_string(),
            name: name.to_string(),
            is_professional,
        };
        let auth = backend.sign_up(&req).await?;

        info!("Signed up as {} ({})", auth.user.email, auth.user.id);
        let user = auth.user;
        self.establish(SignedIn {
            user: user.clone(),
            token: AccessToken::new(auth.token),
        });
        Ok(user)
    }

    /// Clears the user and the current mood, but only once the backend has
    /// accepted the sign-out.
    pub async fn sign_out<B: Backend>(&self, backend: &B) -> Result<()> {
        let _busy = self.busy.try_acquire()?;

        let token = self.state.borrow().signed_in.as_ref().map(|s| s.token.clone());
        if let Some(token) = token {
            if let Err(e) = backend.sign_out(&token).await {
                warn!("Sign-out failed: {}", e);
                return Err(e);
            }
        }

        self.state.send_replace(SessionState::default());
        info!("Signed out");
        Ok(())
    }
}
