use courier::*;
use rustc_hash::FxHashSet;
use std::fs;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

struct TestServer {
    addr: SocketAddr,
    root: TempDir,
    stop: Option<oneshot::Sender<()>>,
    task: tokio::task::JoinHandle<()>,
}

impl TestServer {
    async fn start() -> Self {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("index.html"), b"<h1>home</h1>").unwrap();
        fs::write(root.path().join("about.html"), b"<h1>about</h1>").unwrap();
        fs::create_dir(root.path().join("assets")).unwrap();
        fs::write(root.path().join("assets/logo.svg"), b"<svg/>").unwrap();

        let deny: FxHashSet<String> = ["messages.db".to_string()].into_iter().collect();
        let store = shared(SqliteStore::open(root.path().join("messages.db")).unwrap());
        let router = Arc::new(Router::new(StaticFiles::new(root.path(), deny), store, 64 * 1024));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (stop, stopped) = oneshot::channel::<()>();
        let task = tokio::spawn(serve(listener, router, Duration::from_secs(5), async move {
            let _ = stopped.await;
        }));

        Self {
            addr,
            root,
            stop: Some(stop),
            task,
        }
    }

    async fn send(&self, raw: &str) -> String {
        let mut stream = TcpStream::connect(self.addr).await.unwrap();
        stream.write_all(raw.as_bytes()).await.unwrap();

        let mut response = Vec::new();
        stream.read_to_end(&mut response).await.unwrap();
        String::from_utf8_lossy(&response).into_owned()
    }

    async fn get(&self, path: &str) -> String {
        self.send(&format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n")).await
    }

    async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        self.task.await.unwrap();
    }
}

fn body_of(response: &str) -> &str {
    response.split_once("\r\n\r\n").map(|(_, body)| body).unwrap_or("")
}

#[cfg(test)]
mod static_file_tests {
    use super::*;

    #[tokio::test]
    async fn test_root_serves_index() {
        let server = TestServer::start().await;

        let response = server.get("/").await;
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.contains("Content-Length: 13\r\n"));
        assert!(response.contains("Content-Type: text/html\r\n"));
        assert_eq!(body_of(&response), "<h1>home</h1>");

        assert_eq!(server.get("/index.html").await, response);
        server.stop().await;
    }

    #[tokio::test]
    async fn test_nested_file_is_always_text_html() {
        let server = TestServer::start().await;

        let response = server.get("/assets/logo.svg").await;
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.contains("Content-Type: text/html"));
        assert_eq!(body_of(&response), "<svg/>");
        server.stop().await;
    }

    #[tokio::test]
    async fn test_missing_file_is_404() {
        let server = TestServer::start().await;

        let response = server.get("/nope.html").await;
        assert!(response.starts_with("HTTP/1.1 404 Not Found"));
        server.stop().await;
    }

    #[tokio::test]
    async fn test_directory_is_404() {
        let server = TestServer::start().await;

        let response = server.get("/assets").await;
        assert!(response.starts_with("HTTP/1.1 404 Not Found"));
        server.stop().await;
    }

    #[tokio::test]
    async fn test_traversal_and_denylist_are_403() {
        let server = TestServer::start().await;

        assert!(server.get("/../Cargo.toml").await.starts_with("HTTP/1.1 403 Forbidden"));
        assert!(server.get("/messages.db").await.starts_with("HTTP/1.1 403 Forbidden"));
        server.stop().await;
    }

    #[tokio::test]
    async fn test_custom_error_pages() {
        let server = TestServer::start().await;
        fs::write(server.root.path().join("notFound.html"), b"<p>lost</p>").unwrap();
        fs::write(server.root.path().join("forbidden.html"), b"<p>nope</p>").unwrap();

        assert_eq!(body_of(&server.get("/missing").await), "<p>lost</p>");
        assert_eq!(body_of(&server.get("/../x").await), "<p>nope</p>");
        server.stop().await;
    }
}

#[cfg(test)]
mod append_tests {
    use super::*;

    fn post(path: &str, body: &str) -> String {
        format!(
            "POST /{path} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        )
    }

    #[tokio::test]
    async fn test_post_appends_and_echoes_file() {
        let server = TestServer::start().await;

        let first = server.send(&post("test.txt", "text=hello+there")).await;
        assert!(first.starts_with("HTTP/1.1 200 OK"));
        assert!(first.contains("Content-Type: text/html"));
        assert_eq!(body_of(&first), "hello there");

        let second = server.send(&post("test.txt", "text=%21%21")).await;
        assert_eq!(body_of(&second), "hello there!!");
        assert_eq!(
            fs::read_to_string(server.root.path().join("test.txt")).unwrap(),
            "hello there!!"
        );
        server.stop().await;
    }

    #[tokio::test]
    async fn test_post_other_target_is_403() {
        let server = TestServer::start().await;

        let response = server.send(&post("index.html", "text=overwrite")).await;
        assert!(response.starts_with("HTTP/1.1 403 Forbidden"));
        assert_eq!(
            fs::read_to_string(server.root.path().join("index.html")).unwrap(),
            "<h1>home</h1>"
        );
        server.stop().await;
    }

    #[tokio::test]
    async fn test_post_without_length_is_400() {
        let server = TestServer::start().await;

        let response = server.send("POST /test.txt HTTP/1.1\r\nHost: localhost\r\n\r\n").await;
        assert!(response.starts_with("HTTP/1.1 400 Bad Request"));
        assert!(!server.root.path().join("test.txt").exists());
        server.stop().await;
    }
}

#[cfg(test)]
mod end_to_end_tests {
    use super::*;

    fn json_request(method: &str, body: &str) -> String {
        format!(
            "{method} /messages HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        )
    }

    #[tokio::test]
    async fn test_message_lifecycle_over_tcp() {
        let server = TestServer::start().await;

        let created = server.send(&json_request("POST", r#"{"text":"hello"}"#)).await;
        assert!(created.starts_with("HTTP/1.1 201 Created"));
        assert_eq!(body_of(&created), r#"{"id":1,"text":"hello"}"#);

        let updated = server.send(&json_request("PUT", r#"{"id":1,"text":"bye"}"#)).await;
        assert!(updated.starts_with("HTTP/1.1 200 OK"));
        assert_eq!(body_of(&updated), "");

        let listed = server.get("/messages").await;
        assert_eq!(body_of(&listed), r#"[{"id":1,"text":"bye"}]"#);

        let deleted = server.send(&json_request("DELETE", r#"{"id":1}"#)).await;
        assert!(deleted.starts_with("HTTP/1.1 200 OK"));
        let again = server.send(&json_request("DELETE", r#"{"id":1}"#)).await;
        assert!(again.starts_with("HTTP/1.1 404 Not Found"));

        server.stop().await;
    }

    #[tokio::test]
    async fn test_unhandled_method_closes_without_response() {
        let server = TestServer::start().await;

        assert_eq!(server.send("DELETE /index.html HTTP/1.1\r\n\r\n").await, "");
        assert_eq!(server.send("HEAD / HTTP/1.1\r\n\r\n").await, "");
        server.stop().await;
    }
}
