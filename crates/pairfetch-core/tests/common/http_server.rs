//! Minimal HTTP/1.1 server for integration tests.
//!
//! Serves a fixed table of routes, one thread per connection, and records how
//! many requests were in flight at once so tests can check pool bounds.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum Route {
    /// 200 with the full body.
    Ok(Vec<u8>),
    /// Arbitrary status with a body.
    Status(u16, Vec<u8>),
    /// 302 to another path on this server.
    Redirect(String),
    /// 200 after sleeping for `delay`.
    Slow { body: Vec<u8>, delay: Duration },
    /// Sends headers and `sent` bytes of a longer body, then goes silent for `hold`.
    Stall { sent: Vec<u8>, declared_len: usize, hold: Duration },
    /// Sends headers and `sent` bytes of a longer body, then closes the connection.
    Truncated { sent: Vec<u8>, declared_len: usize },
}

#[derive(Debug, Default)]
pub struct Stats {
    requests: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

pub struct TestServer {
    base: String,
    stats: Arc<Stats>,
}

impl TestServer {
    /// Absolute URL for `path` (which must start with `/`).
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base, path)
    }

    pub fn requests(&self) -> usize {
        self.stats.requests.load(Ordering::SeqCst)
    }

    pub fn max_in_flight(&self) -> usize {
        self.stats.max_in_flight.load(Ordering::SeqCst)
    }
}

/// Starts a server in a background thread. Unknown paths get 404.
/// The server runs until the process exits.
pub fn start(routes: Vec<(&str, Route)>) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let base = format!("http://127.0.0.1:{}", port);
    let routes: Arc<HashMap<String, Route>> = Arc::new(
        routes
            .into_iter()
            .map(|(p, r)| {
                let r = match r {
                    Route::Redirect(to) => Route::Redirect(format!("{}{}", base, to)),
                    other => other,
                };
                (p.to_string(), r)
            })
            .collect(),
    );
    let stats = Arc::new(Stats::default());
    let thread_stats = Arc::clone(&stats);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let routes = Arc::clone(&routes);
            let stats = Arc::clone(&thread_stats);
            thread::spawn(move || handle(stream, &routes, &stats));
        }
    });
    TestServer { base, stats }
}

/// Port with nothing listening on it.
pub fn closed_port_url(path: &str) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}{}", port, path)
}

fn handle(mut stream: TcpStream, routes: &HashMap<String, Route>, stats: &Stats) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(5)));
    let Some(path) = read_request_path(&mut stream) else {
        return;
    };
    stats.requests.fetch_add(1, Ordering::SeqCst);
    let now = stats.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    stats.max_in_flight.fetch_max(now, Ordering::SeqCst);

    match routes.get(&path) {
        Some(Route::Ok(body)) => respond(&mut stream, "200 OK", body, &[]),
        Some(Route::Status(code, body)) => {
            respond(&mut stream, &format!("{} Test", code), body, &[])
        }
        Some(Route::Redirect(to)) => {
            respond(&mut stream, "302 Found", b"", &[format!("Location: {}", to)])
        }
        Some(Route::Slow { body, delay }) => {
            thread::sleep(*delay);
            respond(&mut stream, "200 OK", body, &[]);
        }
        Some(Route::Stall {
            sent,
            declared_len,
            hold,
        }) => {
            write_head(&mut stream, "200 OK", *declared_len, &[]);
            let _ = stream.write_all(sent);
            let _ = stream.flush();
            thread::sleep(*hold);
        }
        Some(Route::Truncated { sent, declared_len }) => {
            write_head(&mut stream, "200 OK", *declared_len, &[]);
            let _ = stream.write_all(sent);
            let _ = stream.flush();
        }
        None => respond(&mut stream, "404 Not Found", b"not found", &[]),
    }

    stats.in_flight.fetch_sub(1, Ordering::SeqCst);
}

fn read_request_path(stream: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut chunk).ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }
    let request = String::from_utf8_lossy(&buf);
    let first = request.lines().next()?;
    let mut parts = first.split_whitespace();
    let _method = parts.next()?;
    parts.next().map(str::to_string)
}

fn write_head(stream: &mut TcpStream, status: &str, len: usize, extra: &[String]) {
    let mut head = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n",
        status, len
    );
    for h in extra {
        head.push_str(h);
        head.push_str("\r\n");
    }
    head.push_str("\r\n");
    let _ = stream.write_all(head.as_bytes());
}

fn respond(stream: &mut TcpStream, status: &str, body: &[u8], extra: &[String]) {
    write_head(stream, status, body.len(), extra);
    let _ = stream.write_all(body);
    let _ = stream.flush();
}
