use tokio::io::{AsyncWrite, AsyncWriteExt};

pub const TEXT_HTML: &str = "text/html";
pub const APPLICATION_JSON: &str = "application/json";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Ok,
    Created,
    BadRequest,
    Forbidden,
    NotFound,
    InternalServerError,
}

impl Status {
    pub fn code(self) -> u16 {
        match self {
            Status::Ok => 200,
            Status::Created => 201,
            Status::BadRequest => 400,
            Status::Forbidden => 403,
            Status::NotFound => 404,
            Status::InternalServerError => 500,
        }
    }

    pub fn reason(self) -> &'static str {
        match self {
            Status::Ok => "OK",
            Status::Created => "Created",
            Status::BadRequest => "Bad Request",
            Status::Forbidden => "Forbidden",
            Status::NotFound => "Not Found",
            Status::InternalServerError => "Internal Server Error",
        }
    }
}

/// A response body together with its media type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Body {
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    pub status: Status,
    pub body: Option<Body>,
}

impl Response {
    /// Status line and `Content-Length: 0`, nothing else.
    pub fn empty(status: Status) -> Self {
        Self { status, body: None }
    }

    pub fn html(status: Status, bytes: Vec<u8>) -> Self {
        Self {
            status,
            body: Some(Body {
                content_type: TEXT_HTML,
                bytes,
            }),
        }
    }

    pub fn json(status: Status, bytes: Vec<u8>) -> Self {
        Self {
            status,
            body: Some(Body {
                content_type: APPLICATION_JSON,
                bytes,
            }),
        }
    }

    /// Serialize to wire format: status line, `Content-Length`, `Content-Type`
    /// when there is a body, blank line, body.
    pub fn to_bytes(&self) -> Vec<u8> {
        let body_len = self.body.as_ref().map_or(0, |b| b.bytes.len());
        let mut head = format!(
            "HTTP/1.1 {} {}\r\nContent-Length: {}\r\n",
            self.status.code(),
            self.status.reason(),
            body_len
        );
        if let Some(body) = &self.body {
            head.push_str("Content-Type: ");
            head.push_str(body.content_type);
            head.push_str("\r\n");
        }
        head.push_str("\r\n");

        let mut out = head.into_bytes();
        out.reserve(body_len);
        if let Some(body) = &self.body {
            out.extend_from_slice(&body.bytes);
        }
        out
    }

    pub async fn write_to<W: AsyncWrite + Unpin>(&self, writer: &mut W) -> std::io::Result<()> {
        writer.write_all(&self.to_bytes()).await?;
        writer.flush().await
    }
}
