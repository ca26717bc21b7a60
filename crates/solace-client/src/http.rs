use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, warn};
use uuid::Uuid;

use solace_types::api::{
    AuthResponse, CommentView, ErrorBody, FeedPost, LikeState, LoginRequest, MessageView,
    MoodHistoryEntry, PatientSummary, RegisterRequest,
};
use solace_types::events::{GatewayCommand, GatewayEvent, Topic};
use solace_types::models::{DailyMoodEntry, Post, User, UserSummary};

use crate::backend::{AccessToken, Backend, Subscription};
use crate::error::{ClientError, Result};

/// How long the gateway handshake (Ready, then Subscribed) may take.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// Buffered change events per subscription.
const EVENT_BUFFER: usize = 256;

type Socket = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Talks to a solace server over its REST API and WebSocket gateway.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    http: Client,
    base_url: String,
}

impl HttpBackend {
    /// `base_url` is the server root, e.g. `http://127.0.0.1:3000`.
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: Client::new(),
            base_url,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn gateway_url(&self) -> String {
        let ws_base = if let Some(rest) = self.base_url.strip_prefix("https://") {
            format!("wss://{}", rest)
        } else if let Some(rest) = self.base_url.strip_prefix("http://") {
            format!("ws://{}", rest)
        } else {
            self.base_url.clone()
        };
        format!("{}/gateway", ws_base)
    }

    async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
        let resp = req.send().await?;
        let resp = check(resp).await?;
        Ok(resp.json().await?)
    }

    async fn send_empty(&self, req: RequestBuilder) -> Result<()> {
        let resp = req.send().await?;
        check(resp).await?;
        Ok(())
    }
}

/// Map a non-2xx response onto the client's error taxonomy using the
/// server's `{ "error": ... }` body.
async fn check(resp: reqwest::Response) -> Result<reqwest::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let message = match resp.json::<ErrorBody>().await {
        Ok(body) => body.error,
        Err(_) => status.canonical_reason().unwrap_or("Request failed").to_string(),
    };
    debug!("Request failed with {}: {}", status, message);

    Err(match status {
        StatusCode::UNAUTHORIZED | StatusCode::CONFLICT => ClientError::Auth(message),
        StatusCode::FORBIDDEN => ClientError::Forbidden(message),
        StatusCode::NOT_FOUND => ClientError::NotFound(message),
        StatusCode::BAD_REQUEST => ClientError::InvalidInput(message),
        _ => ClientError::Remote {
            status: status.as_u16(),
            message,
        },
    })
}

impl Backend for HttpBackend {
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthResponse> {
        let body = LoginRequest {
            email: email.to_string(),
            password: password.to_string(),
        };
        self.send(self.http.post(self.url("/auth/login")).json(&body)).await
    }

    async fn sign_up(&self, req: &RegisterRequest) -> Result<AuthResponse> {
        self.send(self.http.post(self.url("/auth/register")).json(req)).await
    }

    async fn sign_out(&self, token: &AccessToken) -> Result<()> {
        self.send_empty(self.http.post(self.url("/auth/logout")).bearer_auth(token.as_str()))
            .await
    }

    async fn profile(&self, token: &AccessToken) -> Result<User> {
        self.send(self.http.get(self.url("/me")).bearer_auth(token.as_str())).await
    }

    async fn list_users(&self, token: &AccessToken) -> Result<Vec<UserSummary>> {
        self.send(self.http.get(self.url("/users")).bearer_auth(token.as_str())).await
    }

    async fn record_mood(&self, token: &AccessToken, mood_id: Uuid, notes: &str) -> Result<DailyMoodEntry> {
        let req = self
            .http
            .post(self.url("/moods/daily"))
            .bearer_auth(token.as_str())
            .json(&json!({ "mood_id": mood_id, "notes": notes }));
        self.send(req).await
    }

    async fn mood_history(&self, token: &AccessToken) -> Result<Vec<MoodHistoryEntry>> {
        self.send(self.http.get(self.url("/moods/daily")).bearer_auth(token.as_str())).await
    }

    async fn fetch_feed(&self, token: &AccessToken) -> Result<Vec<FeedPost>> {
        self.send(self.http.get(self.url("/posts")).bearer_auth(token.as_str())).await
    }

    async fn create_post(&self, token: &AccessToken, content: &str) -> Result<Post> {
        let req = self
            .http
            .post(self.url("/posts"))
            .bearer_auth(token.as_str())
            .json(&json!({ "content": content }));
        self.send(req).await
    }

    async fn edit_post(&self, token: &AccessToken, post_id: Uuid, content: &str) -> Result<Post> {
        let req = self
            .http
            .patch(self.url(&format!("/posts/{}", post_id)))
            .bearer_auth(token.as_str())
            .json(&json!({ "content": content }));
        self.send(req).await
    }

    async fn delete_post(&self, token: &AccessToken, post_id: Uuid) -> Result<()> {
        let req = self
            .http
            .delete(self.url(&format!("/posts/{}", post_id)))
            .bearer_auth(token.as_str());
        self.send_empty(req).await
    }

    async fn flag_post(&self, token: &AccessToken, post_id: Uuid) -> Result<Post> {
        let req = self
            .http
            .post(self.url(&format!("/posts/{}/flag", post_id)))
            .bearer_auth(token.as_str());
        self.send(req).await
    }

    async fn set_like(&self, token: &AccessToken, post_id: Uuid, liked: bool) -> Result<LikeState> {
        let req = self
            .http
            .put(self.url(&format!("/posts/{}/like", post_id)))
            .bearer_auth(token.as_str())
            .json(&json!({ "liked": liked }));
        self.send(req).await
    }

    async fn add_comment(&self, token: &AccessToken, post_id: Uuid, content: &str) -> Result<CommentView> {
        let req = self
            .http
            .post(self.url(&format!("/posts/{}/comments", post_id)))
            .bearer_auth(token.as_str())
            .json(&json!({ "content": content }));
        self.send(req).await
    }

    async fn fetch_conversation(&self, token: &AccessToken, with: Uuid) -> Result<Vec<MessageView>> {
        let req = self
            .http
            .get(self.url("/messages"))
            .bearer_auth(token.as_str())
            .query(&[("with", with.to_string())]);
        self.send(req).await
    }

    async fn send_message(&self, token: &AccessToken, receiver_id: Uuid, content: &str) -> Result<MessageView> {
        let req = self
            .http
            .post(self.url("/messages"))
            .bearer_auth(token.as_str())
            .json(&json!({ "receiver_id": receiver_id, "content": content }));
        self.send(req).await
    }

    async fn mark_read(&self, token: &AccessToken, message_id: Uuid) -> Result<MessageView> {
        let req = self
            .http
            .post(self.url(&format!("/messages/{}/read", message_id)))
            .bearer_auth(token.as_str());
        self.send(req).await
    }

    async fn fetch_patients(&self, token: &AccessToken) -> Result<Vec<PatientSummary>> {
        self.send(self.http.get(self.url("/patients")).bearer_auth(token.as_str())).await
    }

    async fn subscribe(&self, token: &AccessToken, topics: &[Topic]) -> Result<Subscription> {
        let (mut socket, _) = connect_async(self.gateway_url())
            .await
            .map_err(|e| ClientError::Gateway(e.to_string()))?;

        send_command(
            &mut socket,
            &GatewayCommand::Identify {
                token: token.as_str().to_string(),
            },
        )
        .await?;
        let user_id = match next_event(&mut socket).await? {
            GatewayEvent::Ready { user_id } => user_id,
            other => return Err(ClientError::Gateway(format!("expected Ready, got {:?}", other))),
        };

        send_command(
            &mut socket,
            &GatewayCommand::Subscribe {
                topics: topics.to_vec(),
            },
        )
        .await?;
        // Changes may already be flowing; skip them until the ack.
        loop {
            if let GatewayEvent::Subscribed { .. } = next_event(&mut socket).await? {
                break;
            }
        }
        debug!("{} subscribed to {:?}", user_id, topics);

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let task = tokio::spawn(async move {
            while let Some(frame) = socket.next().await {
                let text = match frame {
                    Ok(Message::Text(text)) => text,
                    Ok(Message::Close(_)) => break,
                    Ok(_) => continue,
                    Err(e) => {
                        warn!("Change feed for {} failed: {}", user_id, e);
                        break;
                    }
                };
                match serde_json::from_str::<GatewayEvent>(&text) {
                    Ok(GatewayEvent::Change(change)) => {
                        if tx.send(change).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Undecodable gateway event: {}", e),
                }
            }
            debug!("Change feed for {} closed", user_id);
        });

        Ok(Subscription::new(rx, Some(task)))
    }
}

async fn send_command(socket: &mut Socket, cmd: &GatewayCommand) -> Result<()> {
    let text = serde_json::to_string(cmd).map_err(|e| ClientError::Gateway(e.to_string()))?;
    socket
        .send(Message::Text(text.into()))
        .await
        .map_err(|e| ClientError::Gateway(e.to_string()))
}

/// Next decodable event during the handshake.
async fn next_event(socket: &mut Socket) -> Result<GatewayEvent> {
    let read = async {
        while let Some(frame) = socket.next().await {
            match frame {
                Ok(Message::Text(text)) => {
                    return serde_json::from_str::<GatewayEvent>(&text)
                        .map_err(|e| ClientError::Gateway(e.to_string()));
                }
                Ok(Message::Close(_)) => break,
                Ok(_) => continue,
                Err(e) => return Err(ClientError::Gateway(e.to_string())),
            }
        }
        Err(ClientError::Gateway("gateway closed during handshake".into()))
    };

    tokio::time::timeout(HANDSHAKE_TIMEOUT, read)
        .await
        .map_err(|_| ClientError::Gateway("gateway handshake timed out".into()))?
}
