//! Shared helpers for integration tests
//!
//! Provides a minimal HTTP/1.1 stub server standing in for the Strava API and
//! a helper to run the built binary with a clean environment.

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::process::{Command, Output};
use std::sync::{Arc, Mutex};
use std::thread;

/// Handler mapping `(method, path_and_query)` to `(status, body)`
pub type Handler = dyn Fn(&str, &str) -> (u16, String) + Send + Sync;

/// A stub HTTP server running on a background thread
pub struct StubServer {
    pub base_url: String,
    requests: Arc<Mutex<Vec<String>>>,
}

impl StubServer {
    /// Starts a server that answers every request with `handler`
    pub fn start<F>(handler: F) -> Self
    where
        F: Fn(&str, &str) -> (u16, String) + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind stub server");
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let handler: Arc<Handler> = Arc::new(handler);

        let log = Arc::clone(&requests);
        thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(stream) = stream else { break };
                let _ = serve(stream, handler.as_ref(), &log);
            }
        });

        Self { base_url, requests }
    }

    /// API base URL to pass as `--api-base`
    pub fn api_base(&self) -> String {
        format!("{}/api/v3", self.base_url)
    }

    /// Token URL to pass as `--token-url`
    pub fn token_url(&self) -> String {
        format!("{}/oauth/token", self.base_url)
    }

    /// Request lines received so far, as `"METHOD path"`
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

fn serve(stream: TcpStream, handler: &Handler, log: &Mutex<Vec<String>>) -> std::io::Result<()> {
    let mut reader = BufReader::new(stream.try_clone()?);

    let mut request_line = String::new();
    reader.read_line(&mut request_line)?;
    let mut parts = request_line.split_whitespace();
    let method = parts.next().unwrap_or_default().to_string();
    let path = parts.next().unwrap_or_default().to_string();

    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line)? == 0 || line == "\r\n" {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.eq_ignore_ascii_case("content-length") {
                content_length = value.trim().parse().unwrap_or(0);
            }
        }
    }
    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body)?;

    log.lock().unwrap().push(format!("{} {}", method, path));
    let (status, body) = handler(&method, &path);

    let reason = match status {
        200 => "OK",
        401 => "Unauthorized",
        404 => "Not Found",
        429 => "Too Many Requests",
        _ => "Error",
    };
    let mut stream = stream;
    write!(
        stream,
        "HTTP/1.1 {} {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        reason,
        body.len(),
        body
    )?;
    stream.flush()
}

/// Runs the routecache binary with the given args and no inherited config
pub fn run_cli(args: &[&str], cwd: &Path) -> Output {
    Command::new(env!("CARGO_BIN_EXE_routecache"))
        .args(args)
        .current_dir(cwd)
        .env_remove("STRAVA_CLIENT_ID")
        .env_remove("STRAVA_CLIENT_SECRET")
        .env_remove("STRAVA_REFRESH_TOKEN")
        .env_remove("STRAVA_API_BASE")
        .env_remove("STRAVA_TOKEN_URL")
        .env_remove("ROUTES_DIR")
        .env_remove("INDEX_PATH")
        .env_remove("RUST_LOG")
        .env_remove("HTTP_PROXY")
        .env_remove("http_proxy")
        .env_remove("ALL_PROXY")
        .env_remove("all_proxy")
        .env("NO_PROXY", "127.0.0.1,localhost")
        .output()
        .expect("Failed to execute routecache")
}
