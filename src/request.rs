//! Request parsing straight off the socket.
//!
//! Only the request line and headers are consumed up front. The body stays in
//! the reader until a handler that wants it calls [`Request::read_body`].

use rustc_hash::FxHashMap;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::error::ServerError;

/// Upper bound for a single request or header line.
pub const MAX_LINE_BYTES: usize = 8192;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
    Other(String),
}

impl Method {
    fn from_token(token: &str) -> Self {
        match token {
            "GET" => Method::Get,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            other => Method::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Target relative to the document root; never starts with the `/` the client sent.
    pub path: String,
    /// Keys exactly as tokenized, so `Content-Length:` keeps its colon.
    pub headers: FxHashMap<String, String>,
}

impl Request {
    pub async fn parse<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Self, ServerError> {
        let line = read_line(reader)
            .await?
            .ok_or_else(|| ServerError::MalformedRequest("connection closed before request line".into()))?;

        let mut tokens = line.split_whitespace();
        let (method, target) = match (tokens.next(), tokens.next()) {
            (Some(method), Some(target)) => (method, target),
            _ => return Err(ServerError::MalformedRequest(line.trim_end().to_string())),
        };

        let mut headers = FxHashMap::default();
        while let Some(line) = read_line(reader).await? {
            let mut tokens = line.split_whitespace();
            let Some(key) = tokens.next() else {
                break;
            };
            // Anything past the second token is dropped.
            let value = tokens.next().unwrap_or_default();
            headers.insert(key.to_string(), value.to_string());
        }

        Ok(Self {
            method: Method::from_token(method),
            path: normalize_target(target),
            headers,
        })
    }

    /// Looks a header up by name, accepting the key with or without the
    /// trailing colon left over from tokenization.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&format!("{name}:"))
            .or_else(|| self.headers.get(name))
            .map(String::as_str)
    }

    pub fn content_length(&self) -> Result<usize, ServerError> {
        let raw = self.header("Content-Length").ok_or(ServerError::MissingLength)?;
        raw.parse()
            .map_err(|_| ServerError::BadBody(format!("invalid Content-Length {raw:?}")))
    }

    /// Reads exactly `Content-Length` bytes of body from `reader`.
    pub async fn read_body<R: AsyncBufRead + Unpin>(
        &self,
        reader: &mut R,
        max_bytes: usize,
    ) -> Result<Vec<u8>, ServerError> {
        let len = self.content_length()?;
        if len > max_bytes {
            return Err(ServerError::BadBody(format!(
                "body of {len} bytes exceeds limit of {max_bytes}"
            )));
        }
        let mut body = vec![0; len];
        reader
            .read_exact(&mut body)
            .await
            .map_err(|e| ServerError::BadBody(e.to_string()))?;
        Ok(body)
    }
}

pub fn normalize_target(target: &str) -> String {
    if target == "/" {
        "index.html".to_string()
    } else {
        target.strip_prefix('/').unwrap_or(target).to_string()
    }
}

/// Returns `None` at end of stream.
async fn read_line<R: AsyncBufRead + Unpin>(reader: &mut R) -> Result<Option<String>, ServerError> {
    let mut buf = Vec::new();
    let read = (&mut *reader)
        .take(MAX_LINE_BYTES as u64 + 1)
        .read_until(b'\n', &mut buf)
        .await?;
    if read == 0 {
        return Ok(None);
    }
    if buf.len() > MAX_LINE_BYTES {
        return Err(ServerError::MalformedRequest(format!(
            "line exceeds {MAX_LINE_BYTES} bytes"
        )));
    }
    Ok(Some(String::from_utf8_lossy(&buf).into_owned()))
}
