//! Per-connection driver: parse one request, dispatch it, write at most one
//! response, close.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tracing::{debug, error, info, warn};

use crate::error::ServerError;
use crate::messages::MessageController;
use crate::request::{Method, Request};
use crate::response::{Response, Status};
use crate::static_files::StaticFiles;
use crate::store::SharedStore;

/// Path of the REST collection after target normalization.
pub const MESSAGES_PATH: &str = "messages";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    ListMessages,
    CreateMessage,
    UpdateMessage,
    DeleteMessage,
    StaticFile,
    AppendFile,
    /// Closed without a response.
    Unhandled,
}

pub fn route(method: &Method, path: &str) -> Route {
    match (method, path == MESSAGES_PATH) {
        (Method::Get, true) => Route::ListMessages,
        (Method::Put, true) => Route::UpdateMessage,
        (Method::Delete, true) => Route::DeleteMessage,
        (Method::Post, true) => Route::CreateMessage,
        (Method::Get, false) => Route::StaticFile,
        (Method::Post, false) => Route::AppendFile,
        _ => Route::Unhandled,
    }
}

pub struct Router {
    files: StaticFiles,
    messages: MessageController,
    max_body_bytes: usize,
}

impl Router {
    pub fn new(files: StaticFiles, store: SharedStore, max_body_bytes: usize) -> Self {
        Self {
            files,
            messages: MessageController::new(store),
            max_body_bytes,
        }
    }

    /// Handles exactly one request on `stream`.
    ///
    /// Returns `Ok(false)` when the request was understood but no response
    /// is defined for it.
    pub async fn handle<S>(&self, stream: S) -> Result<bool, ServerError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let mut reader = BufReader::new(stream);
        let request = Request::parse(&mut reader).await?;
        debug!(method = ?request.method, path = %request.path, "request");

        let Some(response) = self.dispatch(&request, &mut reader).await else {
            debug!(method = ?request.method, path = %request.path, "no route, closing");
            return Ok(false);
        };
        response.write_to(reader.get_mut()).await?;
        Ok(true)
    }

    async fn dispatch<S>(&self, request: &Request, reader: &mut BufReader<S>) -> Option<Response>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let response = match route(&request.method, &request.path) {
            Route::ListMessages => self.rest(|messages| messages.list()).await,
            Route::CreateMessage => match self.body(request, reader).await {
                Ok(body) => self.rest(move |messages| messages.create(&body)).await,
                Err(err) => rest_response(Err(err)),
            },
            Route::UpdateMessage => match self.body(request, reader).await {
                Ok(body) => self.rest(move |messages| messages.update(&body)).await,
                Err(err) => rest_response(Err(err)),
            },
            Route::DeleteMessage => match self.body(request, reader).await {
                Ok(body) => self.rest(move |messages| messages.delete(&body)).await,
                Err(err) => rest_response(Err(err)),
            },
            Route::StaticFile => self.files.serve(&request.path).await,
            Route::AppendFile => match self.append(request, reader).await {
                Ok(contents) => Response::html(Status::Ok, contents),
                Err(err @ (ServerError::Forbidden | ServerError::NotFound)) => {
                    self.files.error_page(&err).await
                }
                Err(err) => {
                    if matches!(err, ServerError::Io(_)) {
                        error!(error = %err, "append failed");
                    }
                    Response::empty(err.status().unwrap_or(Status::InternalServerError))
                }
            },
            Route::Unhandled => return None,
        };
        Some(response)
    }

    /// Runs a controller operation on the blocking pool. Store calls block on
    /// the store lock and on SQLite, so they stay off the async workers.
    async fn rest<F>(&self, op: F) -> Response
    where
        F: FnOnce(&MessageController) -> Result<Response, ServerError> + Send + 'static,
    {
        let messages = self.messages.clone();
        let result = tokio::task::spawn_blocking(move || op(&messages))
            .await
            .unwrap_or_else(|err| Err(ServerError::Task(err)));
        rest_response(result)
    }

    async fn body<S>(&self, request: &Request, reader: &mut BufReader<S>) -> Result<Vec<u8>, ServerError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        request.read_body(reader, self.max_body_bytes).await
    }

    async fn append<S>(&self, request: &Request, reader: &mut BufReader<S>) -> Result<Vec<u8>, ServerError>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        // Target is checked before the body is touched.
        self.files.check_append(&request.path)?;
        let body = self.body(request, reader).await?;
        let text = form_text(&body)?;
        self.files.append(&request.path, &text).await
    }
}

/// Value of the `text` field of an `application/x-www-form-urlencoded` body.
pub fn form_text(body: &[u8]) -> Result<String, ServerError> {
    url::form_urlencoded::parse(body)
        .find(|(key, _)| key == "text")
        .map(|(_, value)| value.into_owned())
        .ok_or(ServerError::MissingField("text"))
}

fn rest_response(result: Result<Response, ServerError>) -> Response {
    match result {
        Ok(response) => response,
        Err(err) => {
            if matches!(err, ServerError::Store(_) | ServerError::Task(_)) {
                error!(error = %err, "store operation failed");
            } else {
                debug!(error = %err, "rest request rejected");
            }
            Response::empty(err.status().unwrap_or(Status::BadRequest))
        }
    }
}

/// Drives one accepted connection under `limit`. A timed-out connection is
/// dropped without a response.
pub async fn handle_connection<S>(router: Arc<Router>, stream: S, limit: Duration)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match timeout(limit, router.handle(stream)).await {
        Ok(Ok(_)) => {}
        Ok(Err(err)) => warn!(error = %err, "connection dropped"),
        Err(_) => warn!(?limit, "connection timed out"),
    }
}

/// Accepts connections until `shutdown` resolves, one task per connection.
pub async fn serve<F>(listener: TcpListener, router: Arc<Router>, limit: Duration, shutdown: F)
where
    F: Future<Output = ()>,
{
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, peer)) => {
                        let _ = stream.set_nodelay(true);
                        debug!(%peer, "accepted");
                        tokio::spawn(handle_connection(router.clone(), stream, limit));
                    }
                    Err(err) => {
                        warn!(error = %err, "accept failed");
                        continue;
                    }
                }
            }
            _ = &mut shutdown => {
                info!("shutdown signal received, stopping server");
                break;
            }
        }
    }
}
