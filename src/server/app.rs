//! Chat entry points
//!
//! `ChatApp` owns the process-wide chat state and turns each request into
//! either a finished response or a subscription to stream.

use std::sync::Arc;

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::log::{BroadcastLog, Entry, Subscription};
use crate::page::{MESSAGE_FIELD, NICK_FIELD};
use crate::session::{Claims, NickRegistry, SessionError, SessionKeys, SESSION_COOKIE};

use super::config::ServerConfig;
use super::form::FormFields;

/// What to send back for a request
#[derive(Debug)]
pub enum Reply {
    /// A complete response
    Response(Response),
    /// Open a chat stream delivering this subscription
    Stream(Subscription),
}

/// Shared chat state: the message log, the nickname registry and the token keys
pub struct ChatApp {
    log: Arc<BroadcastLog>,
    nicks: Arc<NickRegistry>,
    keys: SessionKeys,
}

impl ChatApp {
    /// Assemble an app from its parts
    pub fn new(log: Arc<BroadcastLog>, nicks: Arc<NickRegistry>, keys: SessionKeys) -> Self {
        Self { log, nicks, keys }
    }

    /// Build a fresh app for `config`
    ///
    /// Generates a random signing secret unless the config provides keys.
    pub fn from_config(config: &ServerConfig) -> Self {
        let keys = config
            .session_keys
            .clone()
            .unwrap_or_else(SessionKeys::generate);

        Self::new(
            Arc::new(BroadcastLog::new()),
            Arc::new(NickRegistry::new(config.nick_ttl)),
            keys,
        )
    }

    /// The message log
    pub fn log(&self) -> &Arc<BroadcastLog> {
        &self.log
    }

    /// The nickname registry
    pub fn nicks(&self) -> &Arc<NickRegistry> {
        &self.nicks
    }

    /// The token keys
    pub fn keys(&self) -> &SessionKeys {
        &self.keys
    }

    /// Claim the submitted nickname and hand out a session cookie
    pub fn register(&self, form: &FormFields, now: u64) -> Response {
        let nick = match form.get(NICK_FIELD) {
            Some(nick) if !nick.is_empty() => nick,
            _ => return bad_request(),
        };

        let expire = match self.nicks.register(nick, now) {
            Ok(expire) => expire,
            Err(SessionError::NickTaken(_)) => {
                tracing::debug!(nick = nick, "Nickname taken");
                return (StatusCode::CONFLICT, "nick already exists").into_response();
            }
            Err(_) => return bad_request(),
        };

        let claims = Claims {
            nick: nick.to_string(),
            expire,
        };
        match self.keys.issue(&claims) {
            Ok(token) => (
                StatusCode::FOUND,
                [(header::LOCATION, "/")],
                [(
                    header::SET_COOKIE,
                    format!("{}={}; Path=/; HttpOnly; SameSite=Lax", SESSION_COOKIE, token),
                )],
            )
                .into_response(),
            Err(e) => {
                tracing::error!(error = %e, "Failed to issue session token");
                (StatusCode::INTERNAL_SERVER_ERROR, "error").into_response()
            }
        }
    }

    /// Open a stream of the whole log
    pub fn view(&self, token: Option<&str>, now: u64) -> Reply {
        let claims = match self.authenticate(token, now) {
            Ok(claims) => claims,
            Err(e) => return reject(e),
        };

        let subscription = self.log.subscribe();
        tracing::debug!(
            nick = %claims.nick,
            subscription = %subscription.id(),
            "Viewer joined"
        );

        Reply::Stream(subscription)
    }

    /// Append a message, then stream like `view`
    pub fn post(&self, token: Option<&str>, form: &FormFields, now: u64) -> Reply {
        let claims = match self.authenticate(token, now) {
            Ok(claims) => claims,
            Err(e) => return reject(e),
        };

        let text = match form.get(MESSAGE_FIELD) {
            Some(text) => text,
            None => return Reply::Response(bad_request()),
        };

        let index = self.log.append(Entry::new(claims.nick.as_str(), text));
        let subscription = self.log.subscribe();
        tracing::debug!(
            nick = %claims.nick,
            index = index,
            subscription = %subscription.id(),
            "Message posted"
        );

        Reply::Stream(subscription)
    }

    fn authenticate(&self, token: Option<&str>, now: u64) -> Result<Claims, SessionError> {
        let token = token.ok_or(SessionError::MissingToken)?;
        self.keys.verify(token, now)
    }
}

/// Send an unauthenticated client back to registration
fn reject(reason: SessionError) -> Reply {
    tracing::debug!(reason = %reason, "Session rejected");

    Reply::Response(
        (
            StatusCode::FOUND,
            [(header::LOCATION, "/register")],
            [(
                header::SET_COOKIE,
                format!("{}=; Path=/; Max-Age=0", SESSION_COOKIE),
            )],
        )
            .into_response(),
    )
}

fn bad_request() -> Response {
    (StatusCode::BAD_REQUEST, "error").into_response()
}
