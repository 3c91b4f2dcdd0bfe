//! HTTP plumbing shared by the key provider and the uploader.

use std::time::Duration;
use ureq::Agent;

/// Blocking agent with a global timeout.
///
/// Non-2xx statuses are returned as responses rather than errors:
/// the perf service reports failures in the body.
#[must_use]
pub fn agent(timeout: Duration) -> Agent {
    let config = Agent::config_builder()
        .timeout_global(Some(timeout))
        .http_status_as_error(false)
        .build();
    Agent::new_with_config(config)
}

/// One-shot HTTP responder on a loopback port.
#[cfg(test)]
pub(crate) mod test_server {
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::thread::JoinHandle;

    pub(crate) struct Served {
        pub head: String,
        pub body: Vec<u8>,
    }

    impl Served {
        pub(crate) fn body_text(&self) -> String {
            String::from_utf8_lossy(&self.body).into_owned()
        }
    }

    /// Serves exactly one request with `status` and `body`,
    /// returning the base URL and a handle yielding what was received.
    pub(crate) fn serve_once(status: u16, body: &'static str) -> (String, JoinHandle<Served>) {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
        let url = format!("http://{}/", listener.local_addr().expect("local addr"));
        let handle = std::thread::spawn(move || {
            let (stream, _) = listener.accept().expect("accept");
            let mut reader = BufReader::new(stream);
            let mut head = String::new();
            let mut content_length = 0usize;
            let mut chunked = false;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).expect("read header");
                if line == "\r\n" || line.is_empty() {
                    break;
                }
                if let Some((k, v)) = line.split_once(':') {
                    if k.eq_ignore_ascii_case("content-length") {
                        content_length = v.trim().parse().expect("content-length");
                    }
                    if k.eq_ignore_ascii_case("transfer-encoding") {
                        chunked = v.trim().eq_ignore_ascii_case("chunked");
                    }
                }
                head.push_str(&line);
            }
            let request_body = if chunked {
                read_chunked(&mut reader)
            } else {
                let mut request_body = vec![0; content_length];
                reader.read_exact(&mut request_body).expect("read body");
                request_body
            };

            let mut stream = reader.into_inner();
            write!(
                stream,
                "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            )
            .expect("write response");
            stream.flush().expect("flush");
            Served {
                head,
                body: request_body,
            }
        });
        (url, handle)
    }

    fn read_chunked(reader: &mut impl BufRead) -> Vec<u8> {
        let mut body = Vec::new();
        loop {
            let mut size = String::new();
            reader.read_line(&mut size).expect("chunk size");
            let size = size.trim().split(';').next().unwrap_or_default();
            let size = usize::from_str_radix(size, 16).expect("hex chunk size");
            let mut chunk = vec![0; size + 2];
            reader.read_exact(&mut chunk).expect("chunk");
            if size == 0 {
                return body;
            }
            body.extend_from_slice(&chunk[..size]);
        }
    }

    /// A URL nothing listens on.
    pub(crate) fn dead_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind loopback");
        let addr = listener.local_addr().expect("local addr");
        drop(listener);
        format!("http://{addr}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_status_is_a_response() {
        let (url, server) = test_server::serve_once(502, r#"{"errmsg":"bad gateway"}"#);
        let mut response = agent(Duration::from_secs(5))
            .get(&url)
            .call()
            .expect("response despite 502");
        assert_eq!(response.status().as_u16(), 502);
        assert_eq!(
            response.body_mut().read_to_string().expect("body"),
            r#"{"errmsg":"bad gateway"}"#
        );
        server.join().expect("server thread");
    }
}
