//! Client-side application layer: an explicit session context, the views
//! a front end renders (mood slider, feed, conversation, patient roster),
//! and the backend they talk to.
//!
//! Views never touch shared globals. Each one is built from an
//! `Arc<Session>` and an `Arc<B: Backend>` and publishes its state through
//! `tokio::sync::watch` so a UI can re-render on change.

pub mod backend;
mod busy;
pub mod conversation;
pub mod error;
pub mod feed;
pub mod http;
pub mod mood;
pub mod roster;
pub mod session;
mod view;

pub use backend::{AccessToken, Backend, Subscription};
pub use conversation::{ConversationView, Messenger};
pub use error::ClientError;
pub use feed::{EditDraft, FeedView};
pub use http::HttpBackend;
pub use mood::MoodSlider;
pub use roster::PatientRoster;
pub use session::{Session, SessionState, SignedIn};
