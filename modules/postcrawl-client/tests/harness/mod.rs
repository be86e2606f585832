// Scripted transport for driving PostCrawlClient without a network.
//
// Each call to `send` pops the next scripted step; once the script runs out
// the fallback step (if any) repeats, otherwise the call fails to connect.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use postcrawl_client::{
    HttpRequest, PostCrawlClient, RawResponse, Transport, TransportError,
};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;

pub const API_KEY: &str = "sk_test_1234567890abcdef";

#[derive(Debug, Clone)]
pub enum Step {
    Respond {
        status: u16,
        headers: Vec<(String, String)>,
        body: String,
        delay: Duration,
    },
    Timeout,
    Disconnect,
}

impl Step {
    pub fn json(status: u16, body: Value) -> Self {
        Step::Respond {
            status,
            headers: Vec::new(),
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn text(status: u16, body: &str) -> Self {
        Step::Respond {
            status,
            headers: Vec::new(),
            body: body.to_string(),
            delay: Duration::ZERO,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        if let Step::Respond { headers, .. } = &mut self {
            headers.push((name.to_string(), value.to_string()));
        }
        self
    }

    pub fn delayed(mut self, by: Duration) -> Self {
        if let Step::Respond { delay, .. } = &mut self {
            *delay = by;
        }
        self
    }
}

#[derive(Default)]
pub struct MockTransport {
    steps: Mutex<VecDeque<Step>>,
    fallback: Option<Step>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn then(self, step: Step) -> Self {
        self.steps.lock().unwrap().push_back(step);
        self
    }

    pub fn always(mut self, step: Step) -> Self {
        self.fallback = Some(step);
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_body(&self) -> Value {
        let requests = self.requests.lock().unwrap();
        let last = requests.last().expect("no request was sent");
        serde_json::from_slice(&last.body).expect("request body is JSON")
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<RawResponse, TransportError> {
        let step = {
            let mut steps = self.steps.lock().unwrap();
            steps.pop_front().or_else(|| self.fallback.clone())
        };
        self.requests.lock().unwrap().push(request);

        match step {
            Some(Step::Respond {
                status,
                headers,
                body,
                delay,
            }) => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                let mut map = HeaderMap::new();
                for (name, value) in headers {
                    map.insert(
                        HeaderName::from_bytes(name.as_bytes()).unwrap(),
                        HeaderValue::from_str(&value).unwrap(),
                    );
                }
                Ok(RawResponse {
                    status,
                    headers: map,
                    body,
                })
            }
            Some(Step::Timeout) => Err(TransportError::Timeout("operation timed out".into())),
            Some(Step::Disconnect) | None => {
                Err(TransportError::Connection("Connection failed".into()))
            }
        }
    }
}

/// Start a local HTTP/1.1 server that answers every request with `body` and
/// keeps connections open. Returns its base URL.
pub fn spawn_keep_alive_server(body: &'static str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    std::thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            std::thread::spawn(move || serve_connection(stream, body));
        }
    });
    format!("http://{addr}")
}

fn serve_connection(stream: TcpStream, body: &str) {
    let mut writer = match stream.try_clone() {
        Ok(writer) => writer,
        Err(_) => return,
    };
    let mut reader = BufReader::new(stream);
    loop {
        let mut content_length = 0usize;
        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line) {
                Ok(0) | Err(_) => return,
                Ok(_) => {}
            }
            let header = line.trim_end();
            if header.is_empty() {
                break;
            }
            if let Some((name, value)) = header.split_once(':') {
                if name.eq_ignore_ascii_case("content-length") {
                    content_length = value.trim().parse().unwrap_or(0);
                }
            }
        }
        let mut request_body = vec![0u8; content_length];
        if reader.read_exact(&mut request_body).is_err() {
            return;
        }
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: keep-alive\r\n\r\n{}",
            body.len(),
            body
        );
        if writer.write_all(response.as_bytes()).is_err() {
            return;
        }
    }
}

/// Client wired to `transport` with a short retry delay.
pub fn client_with(transport: &Arc<MockTransport>) -> PostCrawlClient {
    PostCrawlClient::builder(API_KEY)
        .retry_delay(Duration::from_millis(1))
        .transport(transport.clone())
        .build()
        .unwrap()
}

pub fn search_results() -> Value {
    serde_json::json!([
        {
            "title": "Understanding Machine Learning Basics",
            "url": "https://www.reddit.com/r/MachineLearning/comments/abc123/understanding_ml_basics/",
            "snippet": "A comprehensive guide to machine learning fundamentals including supervised and unsupervised learning...",
            "date": "Dec 28, 2024",
            "imageUrl": "https://preview.redd.it/ml-basics.jpg"
        },
        {
            "title": "AI Revolution in 2024",
            "url": "https://www.reddit.com/r/artificial/comments/def456/ai_revolution_2024/",
            "snippet": "The rapid advancement of AI technology in 2024 has brought significant changes...",
            "date": "Dec 27, 2024",
            "imageUrl": ""
        }
    ])
}

pub fn reddit_raw() -> Value {
    serde_json::json!({
        "id": "1ab2c3d",
        "name": "t3_1ab2c3d",
        "title": "Test Post Title",
        "url": "https://www.reddit.com/r/Python/comments/1ab2c3d/test_post/",
        "description": "This is the post content.",
        "subredditName": "Python",
        "upvotes": 42.0,
        "downvotes": 2.0,
        "score": 40.0,
        "createdAt": "2023-12-28T00:00:00Z",
        "comments": [
            {
                "id": "comment1",
                "text": "Great post!",
                "score": 5.0,
                "upvotes": 5.0,
                "downvotes": 0.0,
                "createdAt": "2023-12-28T00:06:40Z",
                "parentId": "1ab2c3d",
                "permalink": "/r/Python/comments/1ab2c3d/test_post/comment1",
                "replies": []
            }
        ]
    })
}

pub fn tiktok_raw() -> Value {
    serde_json::json!({
        "id": "7123456789012345678",
        "username": "pythontutor",
        "url": "https://www.tiktok.com/@pythontutor/video/7123456789012345678",
        "description": "Check out this amazing Python tutorial!",
        "createdAt": "2023-12-28T00:00:00Z",
        "comments": [],
        "hashtags": ["python", "tutorial"],
        "likes": "1500",
        "totalComments": 50.0
    })
}

pub fn extract_response() -> Value {
    serde_json::json!([
        {
            "url": "https://www.reddit.com/r/Python/comments/1ab2c3d/test_post/",
            "source": "reddit",
            "raw": reddit_raw(),
            "markdown": null,
            "error": null
        },
        {
            "url": "https://www.tiktok.com/@pythontutor/video/7123456789012345678",
            "source": "tiktok",
            "raw": tiktok_raw(),
            "markdown": null,
            "error": null
        },
        {
            "url": "https://invalid.url/post",
            "source": "reddit",
            "raw": null,
            "markdown": null,
            "error": "Failed to extract content: Invalid URL"
        }
    ])
}
