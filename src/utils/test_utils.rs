//! Throwaway HTTP/1.1 server for exercising the client end to end.

use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

pub struct CapturedRequest {
    pub request_line: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).expect("request body should be JSON")
    }
}

pub enum MockResponse {
    Fixed {
        status: u16,
        content_type: String,
        body: String,
    },
    /// Chunked transfer encoding, one HTTP chunk per part.
    Chunked { status: u16, parts: Vec<String> },
    /// Chunked parts followed by an abrupt close with no terminating chunk.
    Truncated { parts: Vec<String> },
    /// Read the request, then hold the connection open without answering.
    Stall,
}

impl MockResponse {
    pub fn fixed(status: u16, content_type: &str, body: &str) -> Self {
        MockResponse::Fixed {
            status,
            content_type: content_type.to_string(),
            body: body.to_string(),
        }
    }

    pub fn chunked(status: u16, parts: &[&str]) -> Self {
        MockResponse::Chunked {
            status,
            parts: parts.iter().map(|p| p.to_string()).collect(),
        }
    }

    pub fn truncated(parts: &[&str]) -> Self {
        MockResponse::Truncated {
            parts: parts.iter().map(|p| p.to_string()).collect(),
        }
    }
}

pub struct MockServer {
    addr: SocketAddr,
    task: JoinHandle<Result<Vec<CapturedRequest>, String>>,
}

impl MockServer {
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url(), path)
    }

    /// Wait for every scripted response to be served.
    pub async fn requests(self) -> Vec<CapturedRequest> {
        self.task
            .await
            .expect("mock server task should not panic")
            .unwrap_or_else(|err| panic!("mock server failed: {err}"))
    }

    pub async fn request(self) -> CapturedRequest {
        self.requests()
            .await
            .into_iter()
            .next()
            .expect("mock server should have captured a request")
    }
}

pub async fn serve_once(response: MockResponse) -> MockServer {
    serve(vec![response]).await
}

/// Answer one connection per scripted response, in order.
pub async fn serve(responses: Vec<MockResponse>) -> MockServer {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let addr = listener.local_addr().expect("local addr should resolve");

    let task = tokio::spawn(async move {
        let mut captured = Vec::new();
        for response in responses {
            let (mut stream, _) = listener.accept().await.map_err(|err| err.to_string())?;
            captured.push(read_http_request(&mut stream).await?);
            write_response(&mut stream, response)
                .await
                .map_err(|err| err.to_string())?;
        }
        Ok(captured)
    });

    MockServer { addr, task }
}

/// A URL nobody is listening on.
pub async fn unused_local_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("listener should bind");
    let addr = listener.local_addr().expect("local addr should resolve");
    drop(listener);
    format!("http://{addr}/api/chat")
}

fn reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        400 => "Bad Request",
        500 => "Internal Server Error",
        502 => "Bad Gateway",
        _ => "Unknown",
    }
}

async fn write_response(stream: &mut TcpStream, response: MockResponse) -> std::io::Result<()> {
    match response {
        MockResponse::Fixed {
            status,
            content_type,
            body,
        } => {
            let head = format!(
                "HTTP/1.1 {status} {}\r\ncontent-type: {content_type}\r\ncontent-length: {}\r\nconnection: close\r\n\r\n",
                reason(status),
                body.len()
            );
            stream.write_all(head.as_bytes()).await?;
            stream.write_all(body.as_bytes()).await?;
        }
        MockResponse::Chunked { status, parts } => {
            write_chunked_head(stream, status).await?;
            for part in parts {
                write_chunk(stream, &part).await?;
            }
            stream.write_all(b"0\r\n\r\n").await?;
        }
        MockResponse::Truncated { parts } => {
            write_chunked_head(stream, 200).await?;
            for part in parts {
                write_chunk(stream, &part).await?;
            }
        }
        MockResponse::Stall => std::future::pending::<()>().await,
    }
    stream.flush().await?;
    stream.shutdown().await
}

async fn write_chunked_head(stream: &mut TcpStream, status: u16) -> std::io::Result<()> {
    let head = format!(
        "HTTP/1.1 {status} {}\r\ncontent-type: text/event-stream\r\ntransfer-encoding: chunked\r\nconnection: close\r\n\r\n",
        reason(status)
    );
    stream.write_all(head.as_bytes()).await
}

async fn write_chunk(stream: &mut TcpStream, part: &str) -> std::io::Result<()> {
    stream
        .write_all(format!("{:x}\r\n", part.len()).as_bytes())
        .await?;
    stream.write_all(part.as_bytes()).await?;
    stream.write_all(b"\r\n").await?;
    stream.flush().await
}

async fn read_http_request(stream: &mut TcpStream) -> Result<CapturedRequest, String> {
    let mut buffer = Vec::new();
    let mut header_end = None;
    while header_end.is_none() {
        let mut chunk = [0_u8; 1024];
        let read = stream
            .read(&mut chunk)
            .await
            .map_err(|err| err.to_string())?;
        if read == 0 {
            return Err("Unexpected EOF while reading HTTP headers".to_string());
        }
        buffer.extend_from_slice(&chunk[..read]);
        header_end = buffer
            .windows(4)
            .position(|window| window == b"\r\n\r\n")
            .map(|index| index + 4);
    }

    let header_end = header_end.expect("header end should exist");
    let header_text =
        std::str::from_utf8(&buffer[..header_end]).map_err(|err| err.to_string())?;
    let mut lines = header_text.split("\r\n").filter(|line| !line.is_empty());
    let request_line = lines
        .next()
        .ok_or_else(|| "Missing HTTP request line".to_string())?
        .to_string();

    let mut headers = Vec::new();
    let mut content_length = 0_usize;
    for line in lines {
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim().to_string();
        if name.eq_ignore_ascii_case("content-length") {
            content_length = value.parse::<usize>().map_err(|err| err.to_string())?;
        }
        headers.push((name.to_string(), value));
    }

    let mut body = buffer[header_end..].to_vec();
    while body.len() < content_length {
        let mut chunk = vec![0_u8; content_length - body.len()];
        let read = stream
            .read(&mut chunk)
            .await
            .map_err(|err| err.to_string())?;
        if read == 0 {
            return Err("Unexpected EOF while reading HTTP body".to_string());
        }
        body.extend_from_slice(&chunk[..read]);
    }
    body.truncate(content_length);

    Ok(CapturedRequest {
        request_line,
        headers,
        body,
    })
}
