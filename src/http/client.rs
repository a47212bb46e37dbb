use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde_json::Value;

use super::{ApiRequest, ApiResponse, Transport};
use crate::error::ClientError;

/// HTTP transport over reqwest.
///
/// The cookie store keeps the server's session cookie and sends it back on
/// every later request made through this transport.
pub struct ReqwestTransport {
    base_url: String,
    http: Client,
}

impl ReqwestTransport {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut builder = Client::builder().cookie_store(true).default_headers(headers);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| ClientError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let url = self.url(&request.path);
        let mut builder = self.http.request(request.method.clone(), &url);
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| ClientError::Transport(format!("{} {} failed: {}", request.method, url, e)))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| ClientError::Transport(format!("Failed to read response: {}", e)))?;

        Ok(ApiResponse::new(status.as_u16(), parse_body(&text)))
    }
}

fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::Method;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    async fn read_request(stream: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = stream.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&buf[..end]).to_lowercase();
                let len = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + len {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).to_lowercase()
    }

    fn reply(extra_headers: &str, body: &str) -> String {
        format!(
            "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\n{}content-length: {}\r\nconnection: close\r\n\r\n{}",
            extra_headers,
            body.len(),
            body
        )
    }

    #[test]
    fn joins_base_and_path_with_one_slash() {
        let t = ReqwestTransport::new("http://127.0.0.1:8000/api/", None).unwrap();
        assert_eq!(t.base_url(), "http://127.0.0.1:8000/api");
        assert_eq!(t.url("/GetLists"), "http://127.0.0.1:8000/api/GetLists");
        assert_eq!(t.url("EditList/3"), "http://127.0.0.1:8000/api/EditList/3");
    }

    #[test]
    fn bodies_fall_back_to_text() {
        assert_eq!(parse_body(""), Value::Null);
        assert_eq!(parse_body(r#"{"message":"ok"}"#), json!({"message": "ok"}));
        assert_eq!(
            parse_body("<h1>Unauthorized</h1>"),
            Value::String("<h1>Unauthorized</h1>".into())
        );
    }

    #[tokio::test]
    async fn session_cookie_and_json_header_are_sent() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let replies = [
                reply(
                    "set-cookie: session=abc; Path=/\r\n",
                    r#"{"message":"Logged in successfully!","username":"alice"}"#,
                ),
                reply("", r#"{"lists":[]}"#),
            ];
            let mut seen = Vec::new();
            for response in replies {
                let (mut stream, _) = listener.accept().await.unwrap();
                seen.push(read_request(&mut stream).await);
                stream.write_all(response.as_bytes()).await.unwrap();
                let _ = stream.shutdown().await;
            }
            seen
        });

        let transport =
            ReqwestTransport::new(&format!("http://{}/api", addr), Some(Duration::from_secs(5))).unwrap();
        let login = transport
            .send(ApiRequest::new(
                Method::POST,
                "/login",
                Some(json!({"login": "alice", "password": "secret"})),
            ))
            .await
            .unwrap();
        assert_eq!(login.status, 200);
        assert_eq!(login.body["username"], "alice");

        let lists = transport
            .send(ApiRequest::new(Method::GET, "/GetLists", None))
            .await
            .unwrap();
        assert_eq!(lists.body, json!({"lists": []}));

        let seen = server.await.unwrap();
        assert!(seen[0].starts_with("post /api/login "));
        assert!(seen[0].contains("content-type: application/json"));
        assert!(seen[1].starts_with("get /api/getlists "));
        assert!(seen[1].contains("content-type: application/json"));
        assert!(seen[1].contains("cookie: session=abc"));
    }
}
