//! One-shot localhost listener that captures an OAuth redirect.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Html,
    routing::get,
    Router,
};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::AuthError;

/// Path the authorization server redirects to.
pub const CALLBACK_PATH: &str = "/callback";

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
const EPHEMERAL_BIND_ATTEMPTS: usize = 3;

/// What the single accepted redirect carried.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackResult {
    Code {
        code: String,
        state: Option<String>,
    },
    Error {
        error: String,
        description: Option<String>,
    },
}

impl CallbackResult {
    fn from_params(params: CallbackParams) -> Self {
        if let Some(error) = params.error {
            return Self::Error {
                error,
                description: params.error_description,
            };
        }
        match params.code {
            Some(code) if !code.is_empty() => Self::Code {
                code,
                state: params.state,
            },
            _ => Self::Error {
                error: "invalid_request".to_string(),
                description: Some("callback carried neither code nor error".to_string()),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct CallbackParams {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

struct ListenerState {
    result_tx: Mutex<Option<oneshot::Sender<CallbackResult>>>,
}

/// Local HTTP endpoint that accepts exactly one redirect.
///
/// The redirect URI names `localhost`, so the listener serves both `127.0.0.1`
/// and `::1` on the same port (IPv6 only when the host has it). The result
/// channel is created per listener, so captured state never leaks between
/// logins. Dropping the listener stops the server.
pub struct CallbackListener {
    port: u16,
    result_rx: Option<oneshot::Receiver<CallbackResult>>,
    shutdown_tx: watch::Sender<bool>,
    servers: Vec<JoinHandle<()>>,
}

impl CallbackListener {
    /// Bind and start serving. Port `0` picks a port free on every loopback address.
    pub async fn bind(port: u16) -> Result<Self, AuthError> {
        let (port, listeners) = bind_loopback(port).await?;

        let (result_tx, result_rx) = oneshot::channel();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let state = Arc::new(ListenerState {
            result_tx: Mutex::new(Some(result_tx)),
        });
        let app = Router::new()
            .route(CALLBACK_PATH, get(handle_callback))
            .with_state(state);

        let servers = listeners
            .into_iter()
            .map(|listener| {
                let mut shutdown_rx = shutdown_rx.clone();
                let server = axum::serve(listener, app.clone()).with_graceful_shutdown(async move {
                    let _ = shutdown_rx.changed().await;
                    debug!(port, "callback listener shutting down");
                });
                tokio::spawn(async move {
                    if let Err(err) = server.await {
                        warn!(port, error = %err, "callback listener failed");
                    }
                })
            })
            .collect::<Vec<_>>();

        info!(port, addresses = servers.len(), "callback listener started");
        Ok(Self {
            port,
            result_rx: Some(result_rx),
            shutdown_tx,
            servers,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Redirect URI to register with the authorization request.
    pub fn redirect_uri(&self) -> String {
        format!("http://localhost:{}{CALLBACK_PATH}", self.port)
    }

    /// Wait for the redirect. Can only be awaited successfully once.
    pub async fn wait(&mut self, timeout: Duration) -> Result<CallbackResult, AuthError> {
        let result_rx = self.result_rx.take().ok_or_else(|| {
            AuthError::AuthorizationFailed("callback result was already consumed".to_string())
        })?;
        match tokio::time::timeout(timeout, result_rx).await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(_)) => Err(AuthError::AuthorizationFailed(
                "callback listener stopped before a redirect arrived".to_string(),
            )),
            Err(_) => Err(AuthError::AuthorizationExpired(format!(
                "no authorization callback within {}s",
                timeout.as_secs()
            ))),
        }
    }

    /// Stop serving and wait briefly for the server task to finish.
    pub async fn shutdown(mut self) {
        let _ = self.shutdown_tx.send(true);
        for handle in std::mem::take(&mut self.servers) {
            if tokio::time::timeout(SHUTDOWN_GRACE, handle).await.is_err() {
                warn!(port = self.port, "callback listener did not stop in time");
            }
        }
    }
}

impl Drop for CallbackListener {
    fn drop(&mut self) {
        let _ = self.shutdown_tx.send(true);
    }
}

/// `127.0.0.1` is required; `::1` joins on the same port when the host supports it.
///
/// A fixed port taken on either address is [`AuthError::PortInUse`]. An ephemeral
/// port that happens to be taken on `::1` is retried with a fresh one.
async fn bind_loopback(port: u16) -> Result<(u16, Vec<TcpListener>), AuthError> {
    let attempts = if port == 0 { EPHEMERAL_BIND_ATTEMPTS } else { 1 };
    for _ in 0..attempts {
        let v4 = TcpListener::bind(SocketAddr::from((Ipv4Addr::LOCALHOST, port)))
            .await
            .map_err(|err| bind_error(port, err))?;
        let bound = v4
            .local_addr()
            .map_err(|err| AuthError::Network(format!("callback listener address: {err}")))?
            .port();

        match TcpListener::bind(SocketAddr::from((Ipv6Addr::LOCALHOST, bound))).await {
            Ok(v6) => return Ok((bound, vec![v4, v6])),
            Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
                if port != 0 {
                    return Err(AuthError::PortInUse { port });
                }
                debug!(port = bound, "ephemeral port taken on ::1; picking another");
            }
            Err(err) => {
                debug!(port = bound, error = %err, "IPv6 loopback unavailable; serving 127.0.0.1 only");
                return Ok((bound, vec![v4]));
            }
        }
    }
    Err(AuthError::Network(
        "no port was free on both 127.0.0.1 and ::1".to_string(),
    ))
}

fn bind_error(port: u16, err: std::io::Error) -> AuthError {
    match err.kind() {
        std::io::ErrorKind::AddrInUse => AuthError::PortInUse { port },
        _ => AuthError::Network(format!(
            "failed to bind callback listener on port {port}: {err}"
        )),
    }
}

async fn handle_callback(
    State(state): State<Arc<ListenerState>>,
    Query(params): Query<CallbackParams>,
) -> (StatusCode, Html<String>) {
    let result_tx = state
        .result_tx
        .lock()
        .ok()
        .and_then(|mut slot| slot.take());
    let Some(result_tx) = result_tx else {
        return (
            StatusCode::CONFLICT,
            Html(page(
                "Already handled",
                "This login already received its callback. You can close this window.",
            )),
        );
    };

    let result = CallbackResult::from_params(params);
    let response = match &result {
        CallbackResult::Code { .. } => (
            StatusCode::OK,
            Html(page(
                "Authorization complete",
                "You can close this window and return to the terminal.",
            )),
        ),
        CallbackResult::Error { error, description } => {
            let detail = match description {
                Some(description) => format!("{error}: {description}"),
                None => error.clone(),
            };
            (
                StatusCode::BAD_REQUEST,
                Html(page("Authorization failed", &detail)),
            )
        }
    };

    if result_tx.send(result).is_err() {
        debug!("callback arrived after the login stopped waiting");
    }
    response
}

fn page(title: &str, message: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html><head><meta charset=\"utf-8\"><title>{title}</title></head>\
         <body style=\"font-family: sans-serif; text-align: center; padding: 48px;\">\
         <h1>{title}</h1><p>{message}</p></body></html>",
        title = escape_html(title),
        message = escape_html(message),
    )
}

fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}
