//! Minimal HTTP/1.1 server that supports HEAD and Range GET for integration tests.
//!
//! Serves a single static body. Responds to HEAD with Content-Length and
//! Accept-Ranges: bytes; responds to GET with a single Range with 206
//! Partial Content, and to GET with a comma-separated multi-range with
//! 206 multipart/byteranges, since `SegmentedHttpReader`'s worker issues
//! one GET per group covering several pieces at once.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::Arc;
use std::thread;

#[derive(Debug, Clone, Copy)]
pub struct RangeServerOptions {
    /// If false, HEAD returns 405 (simulates servers that block HEAD).
    pub head_allowed: bool,
    /// If false, GET ignores Range and always returns 200 with the full body.
    pub support_ranges: bool,
    /// If false, omit `Accept-Ranges: bytes` header even if ranges work.
    pub advertise_ranges: bool,
}

impl Default for RangeServerOptions {
    fn default() -> Self {
        Self {
            head_allowed: true,
            support_ranges: true,
            advertise_ranges: true,
        }
    }
}

/// Starts a server in a background thread serving `body`. Returns the base URL
/// (e.g. "http://127.0.0.1:12345/"). The server runs until the process exits.
pub fn start(body: Vec<u8>) -> String {
    start_with_options(body, RangeServerOptions::default())
}

/// Like `start` but allows customizing server behavior (HEAD blocked, ranges missing, etc.).
pub fn start_with_options(body: Vec<u8>, opts: RangeServerOptions) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let body = Arc::clone(&body);
            thread::spawn(move || handle(stream, &body, opts));
        }
    });
    format!("http://127.0.0.1:{}/", port)
}

fn handle(mut stream: std::net::TcpStream, body: &[u8], opts: RangeServerOptions) {
    let _ = stream.set_read_timeout(Some(std::time::Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(std::time::Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) => return,
        Ok(n) => n,
        Err(_) => return,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let (method, ranges) = parse_request(request);
    let total = body.len() as u64;
    if method.eq_ignore_ascii_case("HEAD") {
        if !opts.head_allowed {
            let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\n\r\n");
            return;
        }
        let accept_ranges = if opts.advertise_ranges && opts.support_ranges {
            "Accept-Ranges: bytes\r\n"
        } else {
            ""
        };
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n{}\
\r\n",
            total, accept_ranges
        );
        let _ = stream.write_all(response.as_bytes());
        return;
    }
    if method.eq_ignore_ascii_case("GET") {
        if !opts.support_ranges || ranges.is_empty() {
            let accept_ranges = if opts.advertise_ranges && opts.support_ranges {
                "Accept-Ranges: bytes\r\n"
            } else {
                ""
            };
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n{}\r\n",
                total, accept_ranges
            );
            let _ = stream.write_all(response.as_bytes());
            let _ = stream.write_all(body);
            return;
        }

        if ranges.len() == 1 {
            let (start, end_incl) = ranges[0];
            let start = start.min(total);
            let end_incl = end_incl.min(total.saturating_sub(1));
            if start > end_incl {
                let response = format!(
                    "HTTP/1.1 416 Range Not Satisfiable\r\nContent-Length: 0\r\nContent-Range: bytes */{}\r\n\r\n",
                    total
                );
                let _ = stream.write_all(response.as_bytes());
                return;
            }
            let start_usize = start as usize;
            let end_excl = (end_incl + 1).min(total) as usize;
            let slice = body.get(start_usize..end_excl).unwrap_or(&body[0..0]);
            let response = format!(
                "HTTP/1.1 206 Partial Content\r\nContent-Length: {}\r\nContent-Range: bytes {}-{}/{}\r\n\r\n",
                slice.len(),
                start_usize,
                end_excl.saturating_sub(1),
                total
            );
            let _ = stream.write_all(response.as_bytes());
            let _ = stream.write_all(slice);
            return;
        }

        // Multi-range request: respond multipart/byteranges, one part per
        // range in request order, each with its own Content-Range header.
        const BOUNDARY: &str = "vault-range-boundary";
        let mut payload = Vec::new();
        for (start, end_incl) in &ranges {
            let start = (*start).min(total) as usize;
            let end_excl = ((*end_incl).saturating_add(1)).min(total) as usize;
            let slice = body.get(start..end_excl).unwrap_or(&body[0..0]);
            payload.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
            payload.extend_from_slice(
                format!(
                    "Content-Range: bytes {}-{}/{}\r\n\r\n",
                    start,
                    end_excl.saturating_sub(1),
                    total
                )
                .as_bytes(),
            );
            payload.extend_from_slice(slice);
            payload.extend_from_slice(b"\r\n");
        }
        payload.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());

        let response = format!(
            "HTTP/1.1 206 Partial Content\r\nContent-Length: {}\r\nContent-Type: multipart/byteranges; boundary={}\r\n\r\n",
            payload.len(),
            BOUNDARY
        );
        let _ = stream.write_all(response.as_bytes());
        let _ = stream.write_all(&payload);
        return;
    }
    let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\n\r\n");
}

/// Returns (method, ranges) where `ranges` are the (start, end_inclusive)
/// pairs from a `Range: bytes=a-b,c-d,...` header, in request order.
fn parse_request(request: &str) -> (&str, Vec<(u64, u64)>) {
    let mut method = "";
    let mut ranges = Vec::new();
    for line in request.lines() {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if method.is_empty() {
            method = line.split_whitespace().next().unwrap_or("");
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("range") {
                let value = value.trim();
                if value.to_lowercase().starts_with("bytes=") {
                    let spec = value[6..].trim();
                    for part in spec.split(',') {
                        let part = part.trim();
                        if let Some((a, b)) = part.split_once('-') {
                            let start = a.trim().parse::<u64>().unwrap_or(0);
                            let end = b.trim();
                            let end_incl = if end.is_empty() {
                                u64::MAX
                            } else {
                                end.parse::<u64>().unwrap_or(0)
                            };
                            ranges.push((start, end_incl));
                        }
                    }
                }
            }
        }
    }
    (method, ranges)
}
