use crate::api::{Channel, EventSocket, Frame, LoginSession, MattermostApi, Team, User};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use matterbridge_core::{BridgeError, BridgeResult, Credentials};
use reqwest::{Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{header::AUTHORIZATION, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream};
use tracing::debug;

/// Page size used for paginated listings.
const PER_PAGE: usize = 200;

// ── Request / response bodies ───────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    login_id: &'a str,
    password: &'a str,
}

#[derive(Debug, Serialize)]
struct CreatePostRequest<'a> {
    channel_id: &'a str,
    message: &'a str,
}

#[derive(Debug, Serialize)]
struct AddMemberRequest<'a> {
    user_id: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChannelMember {
    user_id: String,
}

/// [`MattermostApi`] over the Mattermost v4 REST API.
pub struct HttpApi {
    client: reqwest::Client,
    base_url: String,
    ws_url: String,
    skip_tls_verify: bool,
}

impl HttpApi {
    /// Client for `server` (host and optional port, no scheme).
    pub fn new(server: &str, no_tls: bool, skip_tls_verify: bool) -> BridgeResult<Self> {
        let server = server.trim_end_matches('/');
        let (http, ws) = if no_tls { ("http", "ws") } else { ("https", "wss") };
        Self::with_base_urls(
            format!("{http}://{server}"),
            format!("{ws}://{server}"),
            skip_tls_verify,
        )
    }

    /// Client with explicit HTTP and WebSocket base URLs.
    pub fn with_base_urls(
        base_url: impl Into<String>,
        ws_url: impl Into<String>,
        skip_tls_verify: bool,
    ) -> BridgeResult<Self> {
        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(skip_tls_verify)
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| BridgeError::Http(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            ws_url: ws_url.into().trim_end_matches('/').to_string(),
            skip_tls_verify,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v4{path}", self.base_url)
    }

    async fn get_json<T: DeserializeOwned>(&self, session: &LoginSession, path: &str) -> BridgeResult<T> {
        let resp = self
            .client
            .get(self.url(path))
            .bearer_auth(&session.token)
            .send()
            .await
            .map_err(transport_error)?;
        let resp = check_status(resp, path).await?;
        resp.json::<T>()
            .await
            .map_err(|e| BridgeError::Remote(format!("Invalid response from {path}: {e}")))
    }

    async fn post_json<B: Serialize + Sync>(&self, session: &LoginSession, path: &str, body: &B) -> BridgeResult<()> {
        let resp = self
            .client
            .post(self.url(path))
            .bearer_auth(&session.token)
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        check_status(resp, path).await?;
        Ok(())
    }

    async fn login_with_password(&self, login: &str, password: &str) -> BridgeResult<LoginSession> {
        let resp = self
            .client
            .post(self.url("/users/login"))
            .json(&LoginRequest {
                login_id: login,
                password,
            })
            .send()
            .await
            .map_err(transport_error)?;
        let resp = check_login_status(resp).await?;

        let token = resp
            .headers()
            .get("Token")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| BridgeError::Transient("Login response carried no session token".into()))?;
        let user: User = resp
            .json()
            .await
            .map_err(|e| BridgeError::Transient(format!("Invalid login response: {e}")))?;
        Ok(LoginSession { token, user })
    }

    async fn login_with_token(&self, token: &str) -> BridgeResult<LoginSession> {
        let resp = self
            .client
            .get(self.url("/users/me"))
            .bearer_auth(token)
            .send()
            .await
            .map_err(transport_error)?;
        let resp = check_login_status(resp).await?;
        let user: User = resp
            .json()
            .await
            .map_err(|e| BridgeError::Transient(format!("Invalid user response: {e}")))?;
        Ok(LoginSession {
            token: token.to_string(),
            user,
        })
    }
}

fn transport_error(e: reqwest::Error) -> BridgeError {
    BridgeError::Transient(e.to_string())
}

/// Server errors are worth retrying, anything else non-2xx is not.
async fn check_status(resp: Response, path: &str) -> BridgeResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    if status.is_server_error() {
        Err(BridgeError::Transient(format!("{path} returned {status}: {body}")))
    } else {
        Err(BridgeError::Remote(format!("{path} returned {status}: {body}")))
    }
}

async fn check_login_status(resp: Response) -> BridgeResult<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(BridgeError::AuthRejected(format!("Login refused ({status}): {body}")))
        }
        s if s.is_server_error() => Err(BridgeError::Transient(format!("Login failed ({status}): {body}"))),
        _ => Err(BridgeError::Remote(format!("Login failed ({status}): {body}"))),
    }
}

#[async_trait]
impl MattermostApi for HttpApi {
    async fn login(&self, credentials: &Credentials) -> BridgeResult<LoginSession> {
        match credentials {
            Credentials::Password { login, password } => self.login_with_password(login, password).await,
            Credentials::Token(token) => self.login_with_token(token).await,
        }
    }

    async fn teams(&self, session: &LoginSession) -> BridgeResult<Vec<Team>> {
        self.get_json(session, "/users/me/teams").await
    }

    async fn team_users(&self, session: &LoginSession, team_id: &str) -> BridgeResult<Vec<User>> {
        let mut users = Vec::new();
        let mut page = 0;
        loop {
            let path = format!("/users?in_team={team_id}&page={page}&per_page={PER_PAGE}");
            let batch: Vec<User> = self.get_json(session, &path).await?;
            let done = batch.len() < PER_PAGE;
            users.extend(batch);
            if done {
                break;
            }
            page += 1;
        }
        Ok(users)
    }

    async fn my_channels(&self, session: &LoginSession, team_id: &str) -> BridgeResult<Vec<Channel>> {
        self.get_json(session, &format!("/users/me/teams/{team_id}/channels"))
            .await
    }

    async fn more_channels(&self, session: &LoginSession, team_id: &str) -> BridgeResult<Vec<Channel>> {
        self.get_json(session, &format!("/teams/{team_id}/channels?per_page={PER_PAGE}"))
            .await
    }

    async fn create_post(&self, session: &LoginSession, channel_id: &str, message: &str) -> BridgeResult<()> {
        self.post_json(session, "/posts", &CreatePostRequest { channel_id, message })
            .await
    }

    async fn join_channel(&self, session: &LoginSession, channel_id: &str) -> BridgeResult<()> {
        let body = AddMemberRequest {
            user_id: &session.user.id,
        };
        self.post_json(session, &format!("/channels/{channel_id}/members"), &body)
            .await
    }

    async fn channel_member_ids(&self, session: &LoginSession, channel_id: &str) -> BridgeResult<Vec<String>> {
        let members: Vec<ChannelMember> = self
            .get_json(session, &format!("/channels/{channel_id}/members?per_page={PER_PAGE}"))
            .await?;
        Ok(members.into_iter().map(|m| m.user_id).collect())
    }

    async fn connect_websocket(&self, session: &LoginSession) -> BridgeResult<Box<dyn EventSocket>> {
        let url = format!("{}/api/v4/websocket", self.ws_url);
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| BridgeError::Remote(format!("Invalid WebSocket URL '{url}': {e}")))?;
        let auth = HeaderValue::from_str(&format!("Bearer {}", session.token))
            .map_err(|e| BridgeError::Remote(format!("Invalid session token: {e}")))?;
        request.headers_mut().insert(AUTHORIZATION, auth);

        let connector = if self.skip_tls_verify {
            let tls = native_tls::TlsConnector::builder()
                .danger_accept_invalid_certs(true)
                .build()
                .map_err(|e| BridgeError::Remote(format!("TLS setup failed: {e}")))?;
            Some(Connector::NativeTls(tls))
        } else {
            None
        };

        debug!(url = %url, "Dialing Mattermost WebSocket");
        let (stream, _) = connect_async_tls_with_config(request, None, false, connector)
            .await
            .map_err(|e| BridgeError::Transient(format!("WebSocket connect to {url} failed: {e}")))?;
        Ok(Box::new(WsSocket { stream }))
    }
}

/// Event stream over a tungstenite WebSocket.
struct WsSocket {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl EventSocket for WsSocket {
    async fn next_frame(&mut self) -> BridgeResult<Option<Frame>> {
        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => return Ok(Some(Frame::Text(text))),
                Some(Ok(Message::Ping(payload))) => return Ok(Some(Frame::Ping(payload))),
                Some(Ok(Message::Close(_))) | None => return Ok(None),
                Some(Ok(_)) => {} // pong, binary
                Some(Err(e)) => return Err(BridgeError::Transient(format!("WebSocket read: {e}"))),
            }
        }
    }

    async fn pong(&mut self, payload: Vec<u8>) -> BridgeResult<()> {
        self.stream
            .send(Message::Pong(payload))
            .await
            .map_err(|e| BridgeError::Transient(format!("WebSocket write: {e}")))
    }
}
