//! Minimal MPD client: one connection per command over the text protocol.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

use super::DispatchError;

#[derive(Clone, Debug)]
pub struct MpdClient {
    host: String,
    port: u16,
    password: Option<String>,
    timeout: Duration,
}

impl MpdClient {
    pub fn new(
        host: impl Into<String>,
        port: u16,
        password: Option<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            password,
            timeout,
        }
    }

    pub fn play(&self) -> Result<(), DispatchError> {
        self.run("play")
    }

    pub fn stop(&self) -> Result<(), DispatchError> {
        self.run("stop")
    }

    fn run(&self, command: &str) -> Result<(), DispatchError> {
        let addr = (self.host.as_str(), self.port)
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| DispatchError::MpdProtocol(format!("cannot resolve {}", self.host)))?;
        let stream = TcpStream::connect_timeout(&addr, self.timeout)?;
        stream.set_read_timeout(Some(self.timeout))?;
        stream.set_write_timeout(Some(self.timeout))?;

        let mut reader = BufReader::new(stream.try_clone()?);
        let mut writer = stream;

        let greeting = read_line(&mut reader)?;
        if !greeting.starts_with("OK MPD") {
            return Err(DispatchError::MpdProtocol(format!("unexpected greeting '{}'", greeting)));
        }

        if let Some(password) = &self.password {
            send(&mut writer, &mut reader, &format!("password {}", quote(password)))?;
        }
        send(&mut writer, &mut reader, command)?;

        // Best effort; the server drops the connection anyway.
        let _ = writer.write_all(b"close\n");
        log::debug!("mpd {}:{} <- {}", self.host, self.port, command);
        Ok(())
    }
}

fn send(
    writer: &mut TcpStream,
    reader: &mut BufReader<TcpStream>,
    command: &str,
) -> Result<(), DispatchError> {
    writer.write_all(command.as_bytes())?;
    writer.write_all(b"\n")?;
    writer.flush()?;

    loop {
        let line = read_line(reader)?;
        if line == "OK" {
            return Ok(());
        }
        if let Some(ack) = line.strip_prefix("ACK ") {
            return Err(DispatchError::MpdAck(ack.to_string()));
        }
    }
}

fn read_line(reader: &mut BufReader<TcpStream>) -> Result<String, DispatchError> {
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Err(DispatchError::MpdProtocol("connection closed".into()));
    }
    Ok(line.trim_end().to_string())
}

fn quote(arg: &str) -> String {
    format!("\"{}\"", arg.replace('\\', "\\\\").replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    /// Fake server: greets, then answers each line via `reply` until `close`.
    fn fake_mpd(reply: fn(&str) -> &'static str) -> (u16, thread::JoinHandle<Vec<String>>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut writer = stream;
            writer.write_all(b"OK MPD 0.23.5\n").unwrap();
            let mut received = Vec::new();
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line).unwrap_or(0) == 0 {
                    break;
                }
                let line = line.trim_end().to_string();
                if line == "close" {
                    break;
                }
                writer.write_all(reply(&line).as_bytes()).unwrap();
                received.push(line);
            }
            received
        });
        (port, handle)
    }

    fn client(port: u16, password: Option<&str>) -> MpdClient {
        MpdClient::new("127.0.0.1", port, password.map(String::from), Duration::from_secs(5))
    }

    #[test]
    fn play_with_password() {
        let (port, server) = fake_mpd(|_| "OK\n");
        client(port, Some("derkuchen")).play().unwrap();
        assert_eq!(server.join().unwrap(), vec!["password \"derkuchen\"", "play"]);
    }

    #[test]
    fn stop_without_password() {
        let (port, server) = fake_mpd(|_| "OK\n");
        client(port, None).stop().unwrap();
        assert_eq!(server.join().unwrap(), vec!["stop"]);
    }

    #[test]
    fn ack_is_reported() {
        let (port, server) = fake_mpd(|line| {
            if line.starts_with("password") {
                "ACK [3@0] {password} incorrect password\n"
            } else {
                "OK\n"
            }
        });
        let err = client(port, Some("wrong")).play().unwrap_err();
        assert_eq!(server.join().unwrap(), vec!["password \"wrong\""]);
        assert!(matches!(
            err,
            DispatchError::MpdAck(ref msg) if msg.contains("incorrect password")
        ));
    }

    #[test]
    fn quotes_arguments() {
        assert_eq!(quote(r#"a"b\c"#), r#""a\"b\\c""#);
    }
}
