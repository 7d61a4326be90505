#![allow(dead_code)]

use std::collections::HashMap;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;

pub const LISTING_PATH: &str = "/fr/registres-publics/liste";

#[derive(Clone)]
pub struct Route {
    pub status: u16,
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

impl Route {
    pub fn ok(content_type: &'static str, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            content_type,
            body: body.into(),
        }
    }
}

/// Minimal HTTP/1.1 server: one request per connection, unknown paths get 404.
pub struct FixtureServer {
    pub base_url: String,
    hits: Arc<Mutex<Vec<String>>>,
}

impl FixtureServer {
    pub fn start(routes: HashMap<String, Route>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind fixture server");
        let base_url = format!("http://{}", listener.local_addr().expect("local addr"));
        let hits = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&hits);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                handle(stream, &routes, &seen);
            }
        });
        Self { base_url, hits }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    pub fn hits_for(&self, prefix: &str) -> usize {
        self.hits
            .lock()
            .expect("hits lock")
            .iter()
            .filter(|path| path.starts_with(prefix))
            .count()
    }
}

fn handle(stream: TcpStream, routes: &HashMap<String, Route>, hits: &Mutex<Vec<String>>) {
    let mut reader = BufReader::new(stream);
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).is_err() {
        return;
    }
    let path = request_line
        .split_whitespace()
        .nth(1)
        .unwrap_or("/")
        .to_string();

    let mut content_length = 0usize;
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap_or(0) == 0 || line == "\r\n" {
            break;
        }
        if let Some((name, value)) = line.split_once(':')
            && name.eq_ignore_ascii_case("content-length")
        {
            content_length = value.trim().parse().unwrap_or(0);
        }
    }
    let mut body = vec![0u8; content_length];
    if reader.read_exact(&mut body).is_err() {
        return;
    }
    hits.lock().expect("hits lock").push(path.clone());

    let route = routes.get(&path).cloned().unwrap_or(Route {
        status: 404,
        content_type: "text/plain",
        body: b"not found".to_vec(),
    });
    let reason = if route.status == 200 { "OK" } else { "Not Found" };
    let head = format!(
        "HTTP/1.1 {} {reason}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        route.status,
        route.content_type,
        route.body.len()
    );
    let mut stream = reader.into_inner();
    let _ = stream.write_all(head.as_bytes());
    let _ = stream.write_all(&route.body);
    let _ = stream.flush();
}

pub fn listing_html(people: &[(&str, Vec<(&str, &str)>)]) -> String {
    let mut items = String::new();
    for (name, docs) in people {
        let links: String = docs
            .iter()
            .map(|(id, label)| {
                format!(r#"<li><a href="/docs/{id}.pdf" data-id-document="{id}">{label}</a></li>"#)
            })
            .collect();
        items.push_str(&format!("<li>{name}<ul>{links}</ul></li>"));
    }
    format!(
        r#"<html><body><div class="texte_contenuStructure"><div><ul><li>A<ul>{items}</ul></li></ul></div></div></body></html>"#
    )
}

pub fn pdf_bytes(id: &str) -> Vec<u8> {
    format!("%PDF-1.4\n% fixture {id}\n%%EOF\n").into_bytes()
}

/// Environment shared by every CLI invocation: isolated home, no delays, no real credentials.
pub fn crawler_cmd(root: &Path, page_url: &str) -> assert_cmd::Command {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("ced-crawler");
    cmd.current_dir(root)
        .env("CED_HOME", root.join("home"))
        .env("CED_CONFIG_PATH", root.join("config.toml"))
        .env("CED_OUTPUT_DIR", root.join("out"))
        .env("CED_PAGE_URL", page_url)
        .env("CED_DELAY_MIN_MS", "0")
        .env("CED_DELAY_MAX_MS", "0")
        .env("CED_FETCH_BACKOFF_MS", "1")
        .env("CED_ANALYSIS_BACKOFF_MS", "1")
        .env_remove("GEMINI_API_KEY")
        .env_remove("GOOGLE_API_KEY")
        .env_remove("CED_RESULTS_FILE")
        .env_remove("CED_LOG");
    for proxy in ["HTTP_PROXY", "http_proxy", "HTTPS_PROXY", "https_proxy", "ALL_PROXY", "all_proxy"] {
        cmd.env_remove(proxy);
    }
    cmd
}
