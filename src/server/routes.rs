//! HTTP routes
//!
//! ```text
//!   GET  /register ──► nickname form
//!   POST /register ──► ChatApp::register ──► 302 / + cookie | 400 | 409
//!   GET  /         ──► ChatApp::view ─┐
//!   POST /         ──► ChatApp::post ─┴─► chunked body ◄── mpsc ◄── DeliveryLoop
//! ```
//!
//! A chat stream is a response body fed by a spawned [`DeliveryLoop`]. When
//! the client goes away hyper drops the body, the channel closes and the loop
//! stops with [`CloseReason::PeerClosed`].

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::rejection::FormRejection;
use axum::extract::{ConnectInfo, DefaultBodyLimit, Form, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use bytes::Bytes;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::ReceiverStream;
use tokio_stream::StreamExt;

use crate::delivery::{CloseReason, DeliveryLoop};
use crate::log::Subscription;
use crate::page;
use crate::session::{unix_now, SESSION_COOKIE};

use super::app::{ChatApp, Reply};
use super::form::FormFields;
use super::listener::ChatPeer;

/// Content type of every HTML page
pub const HTML_CONTENT_TYPE: &str = "text/html; charset=utf-8";

/// Frames buffered between a delivery loop and its response body
const STREAM_BUFFER: usize = 8;

/// State shared by all handlers
#[derive(Clone)]
pub struct ChatState {
    app: Arc<ChatApp>,
    shutdown: watch::Receiver<bool>,
}

impl ChatState {
    /// Create handler state; streams end once `shutdown` turns `true`
    pub fn new(app: Arc<ChatApp>, shutdown: watch::Receiver<bool>) -> Self {
        Self { app, shutdown }
    }
}

/// Build the chat router
pub fn router(state: ChatState, max_request_size: usize) -> Router {
    Router::new()
        .route("/register", get(register_page).post(register))
        .route("/", get(view).post(post))
        .layer(DefaultBodyLimit::max(max_request_size))
        .with_state(state)
}

async fn register_page() -> Html<&'static str> {
    Html(page::REGISTER_PAGE)
}

async fn register(
    State(state): State<ChatState>,
    ConnectInfo(ChatPeer(peer)): ConnectInfo<ChatPeer>,
    form: Result<Form<FormFields>, FormRejection>,
) -> Response {
    let form = match form_fields(form) {
        Ok(form) => form,
        Err(response) => return response,
    };

    let response = state.app.register(&form, unix_now());
    tracing::debug!(peer = %peer, status = %response.status(), "Register");
    response
}

async fn view(
    State(state): State<ChatState>,
    ConnectInfo(ChatPeer(peer)): ConnectInfo<ChatPeer>,
    headers: HeaderMap,
) -> Response {
    let reply = state.app.view(session_token(&headers), unix_now());
    respond(&state, peer, reply)
}

async fn post(
    State(state): State<ChatState>,
    ConnectInfo(ChatPeer(peer)): ConnectInfo<ChatPeer>,
    headers: HeaderMap,
    form: Result<Form<FormFields>, FormRejection>,
) -> Response {
    let form = match form_fields(form) {
        Ok(form) => form,
        Err(response) => return response,
    };

    let reply = state.app.post(session_token(&headers), &form, unix_now());
    respond(&state, peer, reply)
}

/// Treat unreadable forms as empty; oversized bodies keep their 413
fn form_fields(form: Result<Form<FormFields>, FormRejection>) -> Result<FormFields, Response> {
    match form {
        Ok(Form(form)) => Ok(form),
        Err(rejection) if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE => {
            Err(rejection.into_response())
        }
        Err(rejection) => {
            tracing::debug!(error = %rejection, "Unreadable form");
            Ok(FormFields::default())
        }
    }
}

fn respond(state: &ChatState, peer: SocketAddr, reply: Reply) -> Response {
    match reply {
        Reply::Response(response) => response,
        Reply::Stream(subscription) => stream_chat(subscription, state.shutdown.clone(), peer),
    }
}

/// Session token from the request cookies
fn session_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value)
}

/// Spawn a delivery loop and return its open-ended chunked response
fn stream_chat(
    subscription: Subscription,
    shutdown: watch::Receiver<bool>,
    peer: SocketAddr,
) -> Response {
    let (tx, rx) = mpsc::channel::<Bytes>(STREAM_BUFFER);
    let cancel = disconnect(tx.clone(), shutdown);
    let delivery = DeliveryLoop::new(subscription, tx).with_preamble(page::CHAT_PAGE_PREAMBLE);

    tokio::spawn(async move {
        let outcome = delivery.run(cancel).await;
        tracing::debug!(
            peer = %peer,
            reason = ?outcome.reason,
            delivered = outcome.delivered,
            "Stream ended"
        );
    });

    let body = Body::from_stream(ReceiverStream::new(rx).map(Ok::<_, Infallible>));
    (
        [
            (header::CONTENT_TYPE, HTML_CONTENT_TYPE),
            (header::CACHE_CONTROL, "no-cache"),
        ],
        body,
    )
        .into_response()
}

/// Resolve once the response body is dropped or the server shuts down
async fn disconnect(body: mpsc::Sender<Bytes>, mut shutdown: watch::Receiver<bool>) -> CloseReason {
    tokio::select! {
        _ = body.closed() => CloseReason::PeerClosed,
        _ = shutdown_signal(&mut shutdown) => CloseReason::Shutdown,
    }
}

/// Resolve once shutdown is signalled or the server is gone
pub(super) async fn shutdown_signal(shutdown: &mut watch::Receiver<bool>) {
    while !*shutdown.borrow_and_update() {
        if shutdown.changed().await.is_err() {
            return;
        }
    }
}
