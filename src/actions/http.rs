use reqwest::blocking::Client;
use std::time::Duration;

use super::DispatchError;

/// A remote switch toggled with `PUT` (on) and `DELETE` (off) on one URL.
pub struct HttpSwitch {
    client: Client,
    url: String,
}

impl HttpSwitch {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn set(&self, on: bool) -> Result<(), DispatchError> {
        let (method, request) = if on {
            ("PUT", self.client.put(&self.url))
        } else {
            ("DELETE", self.client.delete(&self.url))
        };
        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(DispatchError::HttpStatus {
                method,
                url: self.url.clone(),
                status,
            });
        }
        log::debug!("{} {} -> {}", method, self.url, status);
        Ok(())
    }
}

/// Shared client for every switch.
pub fn build_client(user_agent: &str, timeout: Duration) -> Result<Client, DispatchError> {
    Ok(Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader, Write};
    use std::net::TcpListener;
    use std::thread;

    /// Answers one request with `status` and returns its request line.
    fn one_shot_server(status: &'static str) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut request_line = String::new();
            reader.read_line(&mut request_line).unwrap();
            let mut headers = Vec::new();
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if line == "\r\n" || line.is_empty() {
                    break;
                }
                headers.push(line.to_ascii_lowercase());
            }
            assert!(headers.iter().any(|h| h.starts_with("user-agent: whistle-test")));
            let mut stream = stream;
            write!(stream, "HTTP/1.1 {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n", status)
                .unwrap();
            request_line.trim_end().to_string()
        });
        (format!("http://{}/switch/0", addr), handle)
    }

    fn client() -> Client {
        build_client("whistle-test", Duration::from_secs(5)).unwrap()
    }

    #[test]
    fn on_is_put_off_is_delete() {
        let (url, server) = one_shot_server("200 OK");
        HttpSwitch::new(client(), url).set(true).unwrap();
        assert_eq!(server.join().unwrap(), "PUT /switch/0 HTTP/1.1");

        let (url, server) = one_shot_server("204 No Content");
        HttpSwitch::new(client(), url).set(false).unwrap();
        assert_eq!(server.join().unwrap(), "DELETE /switch/0 HTTP/1.1");
    }

    #[test]
    fn error_status_is_a_failure() {
        let (url, server) = one_shot_server("500 Internal Server Error");
        let err = HttpSwitch::new(client(), url).set(true).unwrap_err();
        server.join().unwrap();
        assert!(matches!(err, DispatchError::HttpStatus { method: "PUT", .. }));
    }

    #[test]
    fn unreachable_host_is_a_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let err = HttpSwitch::new(client(), format!("http://{}/switch", addr))
            .set(false)
            .unwrap_err();
        assert!(matches!(err, DispatchError::Http(_)));
    }
}
