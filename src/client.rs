use std::future::Future;

use log::{debug, info};
use reqwest::{Client, Response, StatusCode};
use thiserror::Error;

use crate::message::Message;
use crate::stream::{ingest, StreamUpdate};

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("chat backend returned HTTP {0}")]
    Status(StatusCode),
    #[error("request to chat backend failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("chat backend sent no response body")]
    MissingBody,
}

/// Progress of a single streamed reply
#[derive(Debug)]
pub enum ReplyEvent {
    /// The backend accepted the request and the body is about to stream.
    Started,
    Update(StreamUpdate),
    Finished,
    Failed(ChatError),
}

#[derive(Clone)]
pub struct ChatClient {
    client: Client,
    base_url: String,
}

impl ChatClient {
    pub fn new(base_url: &str) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat", self.base_url.trim_end_matches('/'))
    }

    /// Posts the full history and returns the accepted response, body unread.
    pub async fn send(&self, history: &[Message]) -> Result<Response, ChatError> {
        let url = self.endpoint();
        debug!("POST {} with {} messages", url, history.len());

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .json(history)
            .send()
            .await?;

        let status = response.status();
        info!("Chat backend answered {}", status);

        if !status.is_success() {
            return Err(ChatError::Status(status));
        }
        if status == StatusCode::NO_CONTENT {
            return Err(ChatError::MissingBody);
        }

        Ok(response)
    }

    /// Sends `history` and streams the reply into `emit`.
    ///
    /// Emits `Started` once the response is accepted, then any number of
    /// `Update`s, then exactly one of `Finished` or `Failed`.
    pub fn stream_reply<F>(&self, history: Vec<Message>, mut emit: F) -> impl Future<Output = ()>
    where
        F: FnMut(ReplyEvent) + Send + 'static,
    {
        let client = self.clone();
        async move {
            let result = async {
                let response = client.send(&history).await?;
                emit(ReplyEvent::Started);
                let text = ingest(response.bytes_stream(), |update| {
                    emit(ReplyEvent::Update(update));
                })
                .await?;
                Ok::<_, ChatError>(text)
            }
            .await;

            match result {
                Ok(text) => {
                    info!("Reply finished ({} chars)", text.chars().count());
                    emit(ReplyEvent::Finished);
                }
                Err(e) => emit(ReplyEvent::Failed(e)),
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::oneshot;

    /// Serves one canned HTTP/1.1 response and hands back the raw request.
    pub(crate) async fn serve_once(status: &'static str, chunks: Vec<&'static str>) -> (String, oneshot::Receiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut tmp = [0u8; 4096];
            loop {
                let n = socket.read(&mut tmp).await.unwrap();
                if n == 0 {
                    break;
                }
                buf.extend_from_slice(&tmp[..n]);
                let text = String::from_utf8_lossy(&buf).to_string();
                if let Some(end) = text.find("\r\n\r\n") {
                    let content_length = text[..end]
                        .lines()
                        .filter_map(|l| l.split_once(':'))
                        .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
                        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if buf.len() >= end + 4 + content_length {
                        break;
                    }
                }
            }
            let _ = tx.send(String::from_utf8_lossy(&buf).to_string());

            let head = format!(
                "HTTP/1.1 {}\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n",
                status
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            for chunk in chunks {
                socket.write_all(chunk.as_bytes()).await.unwrap();
                socket.flush().await.unwrap();
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
            let _ = socket.shutdown().await;
        });

        (format!("http://{}", addr), rx)
    }

    pub(crate) fn test_client(base_url: &str) -> ChatClient {
        let client = Client::builder().no_proxy().build().unwrap();
        ChatClient::with_client(client, base_url)
    }

    async fn collect(client: &ChatClient, history: Vec<Message>) -> Vec<ReplyEvent> {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        client
            .stream_reply(history, move |e| sink.lock().unwrap().push(e))
            .await;
        let taken = std::mem::take(&mut *events.lock().unwrap());
        taken
    }

    #[test]
    fn test_endpoint_tolerates_trailing_slash() {
        assert_eq!(ChatClient::new("http://api.local").endpoint(), "http://api.local/chat");
        assert_eq!(ChatClient::new("http://api.local/").endpoint(), "http://api.local/chat");
    }

    #[tokio::test]
    async fn test_posts_history_and_streams_reply() {
        let (base, request_rx) = serve_once(
            "200 OK",
            vec![
                "data: {\"type\":\"message\",\"content\":\"Hel\"}\n",
                "data: {\"type\":\"url\",\"content\":\"https://x/venus\"}\n",
                "data: {\"type\":\"message\",\"content\":\"lo\"}\n",
            ],
        )
        .await;
        let client = test_client(&base);
        let history = vec![Message::greeting(), Message::human("Olá")];

        let events = collect(&client, history).await;

        let request = request_rx.await.unwrap();
        assert!(request.starts_with("POST /chat HTTP/1.1"));
        assert!(request.to_lowercase().contains("content-type: application/json"));
        let body = &request[request.find("\r\n\r\n").unwrap() + 4..];
        let sent: Vec<Message> = serde_json::from_str(body).unwrap();
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1], Message::human("Olá"));

        assert!(matches!(events.first(), Some(ReplyEvent::Started)));
        assert!(matches!(events.last(), Some(ReplyEvent::Finished)));
        let mut reply = Message::streaming();
        for event in &events {
            if let ReplyEvent::Update(update) = event {
                update.apply(&mut reply);
            }
        }
        assert_eq!(reply.content, "Hello");
        assert_eq!(reply.resource_url.as_deref(), Some("https://x/venus"));
    }

    #[tokio::test]
    async fn test_error_status_fails_without_starting() {
        let (base, _request_rx) = serve_once("500 Internal Server Error", vec![]).await;
        let client = test_client(&base);

        let events = collect(&client, vec![Message::human("oi")]).await;

        assert_eq!(events.len(), 1);
        match &events[0] {
            ReplyEvent::Failed(ChatError::Status(status)) => assert_eq!(status.as_u16(), 500),
            other => panic!("unexpected event: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_backend_fails() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client = test_client(&format!("http://{}", addr));

        let events = collect(&client, vec![Message::human("oi")]).await;

        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], ReplyEvent::Failed(ChatError::Transport(_))));
    }

    #[tokio::test]
    async fn test_missing_base_url_fails_through_error_path() {
        let client = test_client("");
        let events = collect(&client, vec![Message::human("oi")]).await;
        assert!(matches!(events.as_slice(), [ReplyEvent::Failed(ChatError::Transport(_))]));
    }

    #[tokio::test]
    async fn test_no_content_fails_with_missing_body() {
        let (base, _request_rx) = serve_once("204 No Content", vec![]).await;
        let client = test_client(&base);

        let events = collect(&client, vec![Message::human("oi")]).await;

        assert!(matches!(events.as_slice(), [ReplyEvent::Failed(ChatError::MissingBody)]));
    }
}
