use crate::config::Config;
use crate::discovery::random::QuantumByteSource;
use crate::error::ByteSourceError;
use std::io::{self, Read};
use std::time::{Duration, Instant};
use ureq::{Agent, AgentBuilder};

/// HTTP client for the OccyByte quantum random byte API
pub struct OccyByteClient {
    agent: Agent,
    base_url: String,
    api_key: String,
    timeout: Duration,
    max_retries: u32,
    block_size: usize,
    backoff: Duration,
}

impl OccyByteClient {
    /// Create a new client with configuration from environment
    pub fn new(config: &Config) -> Self {
        let agent = AgentBuilder::new().timeout(config.timeout).build();

        OccyByteClient {
            agent,
            base_url: config.api_link.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            timeout: config.timeout,
            max_retries: config.max_retries,
            block_size: config.block_size.max(1),
            backoff: config.backoff,
        }
    }

    fn raw_url(&self, size: usize) -> String {
        format!("{}/api/eris/raw?size={}", self.base_url, size)
    }

    /// Time allowed for the next round trip: the configured timeout, cut
    /// short by the caller's deadline
    fn call_timeout(&self, deadline: Option<Instant>) -> Result<Duration, ByteSourceError> {
        let Some(deadline) = deadline else {
            return Ok(self.timeout);
        };
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            return Err(ByteSourceError::Timeout);
        }
        Ok(remaining.min(self.timeout))
    }

    /// One round trip, no retries
    fn fetch_block(&self, size: usize, timeout: Duration) -> Result<Vec<u8>, ByteSourceError> {
        let response = self
            .agent
            .get(&self.raw_url(size))
            .timeout(timeout)
            .set("X-API-Key", &self.api_key)
            .set("Accept", "application/octet-stream")
            .call()
            .map_err(classify_error)?;

        let content_type = response
            .header("Content-Type")
            .unwrap_or_default()
            .to_ascii_lowercase();
        if content_type.starts_with("application/json") || content_type.starts_with("text/") {
            let body = response.into_string().unwrap_or_default();
            return Err(ByteSourceError::Malformed(format!(
                "expected raw bytes, got {content_type}: {}",
                body.chars().take(120).collect::<String>()
            )));
        }

        let mut bytes = Vec::with_capacity(size);
        response
            .into_reader()
            .take(size as u64)
            .read_to_end(&mut bytes)
            .map_err(|e| classify_io(&e))?;
        if bytes.is_empty() {
            return Err(ByteSourceError::Malformed("empty body".to_string()));
        }
        Ok(bytes)
    }
}

impl QuantumByteSource for OccyByteClient {
    /// Requests at most one provider block; the caller asks again for any
    /// remainder. Retries stop once the next attempt could not start before
    /// the deadline.
    fn request_bytes(
        &self,
        count: usize,
        deadline: Option<Instant>,
    ) -> Result<Vec<u8>, ByteSourceError> {
        let size = count.clamp(1, self.block_size);
        let mut attempt = 0;
        loop {
            let timeout = self.call_timeout(deadline)?;
            match self.fetch_block(size, timeout) {
                Ok(bytes) => {
                    log::debug!("Fetched {} quantum bytes (asked for {})", bytes.len(), size);
                    return Ok(bytes);
                }
                Err(e) if e.is_transient() && attempt < self.max_retries => {
                    attempt += 1;
                    let delay = self.backoff * attempt;
                    if deadline.is_some_and(|deadline| Instant::now() + delay >= deadline) {
                        log::warn!("Quantum byte request failed ({e}), no time left to retry");
                        return Err(e);
                    }
                    log::warn!(
                        "Quantum byte request failed ({e}), retry {attempt} of {}",
                        self.max_retries
                    );
                    std::thread::sleep(delay);
                }
                Err(e) => return Err(e),
            }
        }
    }
}

fn classify_error(error: ureq::Error) -> ByteSourceError {
    match error {
        ureq::Error::Status(status, _) => match status {
            401 | 403 => ByteSourceError::Authentication { status },
            402 | 429 => ByteSourceError::RateLimited,
            _ => ByteSourceError::Http { status },
        },
        ureq::Error::Transport(transport) => {
            let timed_out = std::error::Error::source(&transport)
                .and_then(|source| source.downcast_ref::<io::Error>())
                .is_some_and(|e| is_timeout(e.kind()));
            if timed_out {
                ByteSourceError::Timeout
            } else {
                ByteSourceError::Network(transport.to_string())
            }
        }
    }
}

fn classify_io(error: &io::Error) -> ByteSourceError {
    if is_timeout(error.kind()) {
        ByteSourceError::Timeout
    } else {
        ByteSourceError::Network(error.to_string())
    }
}

fn is_timeout(kind: io::ErrorKind) -> bool {
    matches!(kind, io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread::JoinHandle;

    /// Serves one canned response per connection and returns the request
    /// heads it saw
    fn serve(responses: Vec<Vec<u8>>) -> (String, JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let link = format!("http://{}/", listener.local_addr().unwrap());
        let handle = std::thread::spawn(move || {
            let mut seen = Vec::new();
            for response in responses {
                let (mut stream, _) = listener.accept().unwrap();
                let mut reader = BufReader::new(stream.try_clone().unwrap());
                let mut head = String::new();
                loop {
                    let mut line = String::new();
                    reader.read_line(&mut line).unwrap();
                    if line == "\r\n" || line.is_empty() {
                        break;
                    }
                    head.push_str(&line);
                }
                seen.push(head);
                stream.write_all(&response).unwrap();
            }
            seen
        });
        (link, handle)
    }

    fn http(status: &str, content_type: &str, body: &[u8]) -> Vec<u8> {
        let mut response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\n\
             Content-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        )
        .into_bytes();
        response.extend_from_slice(body);
        response
    }

    fn client(link: &str, max_retries: u32, block_size: usize) -> OccyByteClient {
        let config = Config {
            api_key: "test-key".to_string(),
            api_link: link.to_string(),
            timeout: Duration::from_secs(5),
            max_retries,
            block_size,
            backoff: Duration::ZERO,
        };
        OccyByteClient::new(&config)
    }

    #[test]
    fn test_status_classification() {
        let status = |code: u16| {
            let response = ureq::Response::new(code, "status", "").unwrap();
            classify_error(ureq::Error::Status(code, response))
        };
        assert_eq!(status(401), ByteSourceError::Authentication { status: 401 });
        assert_eq!(status(403), ByteSourceError::Authentication { status: 403 });
        assert_eq!(status(429), ByteSourceError::RateLimited);
        assert_eq!(status(503), ByteSourceError::Http { status: 503 });
        assert!(status(503).is_transient());
        assert!(!status(404).is_transient());
    }

    #[test]
    fn test_url_drops_trailing_slash() {
        let client = client("https://qrng.example.com///", 0, 512);
        assert_eq!(
            client.raw_url(32),
            "https://qrng.example.com/api/eris/raw?size=32"
        );
    }

    #[test]
    fn test_fetches_raw_bytes_with_headers() {
        let (link, server) =
            serve(vec![http("200 OK", "application/octet-stream", &[9, 8, 7])]);
        let bytes = client(&link, 0, 512).request_bytes(3, None).unwrap();
        assert_eq!(bytes, vec![9, 8, 7]);

        let heads = server.join().unwrap();
        let head = heads[0].to_ascii_lowercase();
        assert!(head.starts_with("get /api/eris/raw?size=3 "));
        assert!(head.contains("x-api-key: test-key"));
        assert!(head.contains("accept: application/octet-stream"));
    }

    #[test]
    fn test_request_is_capped_at_block_size() {
        let (link, server) = serve(vec![http("200 OK", "application/octet-stream", &[1; 4])]);
        let bytes = client(&link, 0, 4).request_bytes(100, None).unwrap();
        assert_eq!(bytes.len(), 4);
        assert!(server.join().unwrap()[0].contains("size=4 "));
    }

    #[test]
    fn test_transient_failure_is_retried() {
        let (link, server) = serve(vec![
            http("503 Service Unavailable", "text/plain", b"busy"),
            http("200 OK", "application/octet-stream", &[42]),
        ]);
        let bytes = client(&link, 2, 512).request_bytes(1, None).unwrap();
        assert_eq!(bytes, vec![42]);
        assert_eq!(server.join().unwrap().len(), 2);
    }

    #[test]
    fn test_authentication_failure_is_not_retried() {
        let (link, server) = serve(vec![http("401 Unauthorized", "text/plain", b"no")]);
        let err = client(&link, 3, 512).request_bytes(1, None).unwrap_err();
        assert_eq!(err, ByteSourceError::Authentication { status: 401 });
        assert_eq!(server.join().unwrap().len(), 1);
    }

    #[test]
    fn test_json_or_empty_body_is_malformed() {
        let (link, server) = serve(vec![
            http("200 OK", "application/json", b"{\"error\":\"nope\"}"),
            http("200 OK", "application/octet-stream", b""),
        ]);
        let client = client(&link, 0, 512);
        for _ in 0..2 {
            assert!(matches!(
                client.request_bytes(8, None),
                Err(ByteSourceError::Malformed(_))
            ));
        }
        server.join().unwrap();
    }

    #[test]
    fn test_unreachable_host_is_network_error() {
        // bind then drop to get a port nobody listens on
        let port = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap()
            .port();
        let err = client(&format!("http://127.0.0.1:{port}"), 0, 512)
            .request_bytes(1, None)
            .unwrap_err();
        assert!(matches!(err, ByteSourceError::Network(_)));
    }

    #[test]
    fn test_expired_deadline_skips_the_call() {
        let (link, server) = serve(vec![]);
        let past = Instant::now() - Duration::from_millis(1);
        let err = client(&link, 2, 512).request_bytes(1, Some(past)).unwrap_err();
        assert_eq!(err, ByteSourceError::Timeout);
        assert!(server.join().unwrap().is_empty());
    }

    #[test]
    fn test_no_retry_when_backoff_would_pass_deadline() {
        let (link, server) = serve(vec![http("503 Service Unavailable", "text/plain", b"busy")]);
        let config = Config {
            api_key: "test-key".to_string(),
            api_link: link,
            timeout: Duration::from_secs(5),
            max_retries: 3,
            block_size: 512,
            backoff: Duration::from_secs(2),
        };
        let started = Instant::now();
        let deadline = started + Duration::from_millis(500);
        let err = OccyByteClient::new(&config)
            .request_bytes(1, Some(deadline))
            .unwrap_err();
        assert_eq!(err, ByteSourceError::Http { status: 503 });
        assert!(started.elapsed() < Duration::from_secs(2));
        assert_eq!(server.join().unwrap().len(), 1);
    }

    #[test]
    fn test_call_timeout_is_capped_by_deadline() {
        let client = client("http://127.0.0.1:1", 0, 512);
        assert_eq!(client.call_timeout(None).unwrap(), Duration::from_secs(5));
        let soon = Instant::now() + Duration::from_millis(200);
        assert!(client.call_timeout(Some(soon)).unwrap() <= Duration::from_millis(200));
    }
}
