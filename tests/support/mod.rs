//! Shared harness for the integration suites
//!
//! Spawns a real server on a loopback port with a seeded in-memory store
//! and drives it over TCP, the same way a newsreader would.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use nntpd_rs::{
    CapabilitySet, Config, MemoryStore, PostOutcome, PostSource, Server, ServerHandle, Store,
};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Per-read deadline so a misbehaving server fails the test fast
const READ_TIMEOUT: Duration = Duration::from_secs(5);

pub struct TestServer {
    pub addr: SocketAddr,
    pub handle: ServerHandle,
    pub store: Arc<MemoryStore>,
}

/// Start a server on `127.0.0.1:0` with the standard seed data
pub async fn start_default() -> TestServer {
    start(|config| config).await
}

/// Start a server with a config tweak applied on top of the defaults
pub async fn start(adjust: impl FnOnce(Config) -> Config) -> TestServer {
    let store = Arc::new(MemoryStore::new());
    seed(&store);

    let config = adjust(
        Config::new("news.test").with_cleartext_endpoint("127.0.0.1:0".parse().unwrap()),
    );
    let server_store: Arc<dyn Store> = store.clone();
    let server = Server::bind(config, server_store)
        .await
        .expect("bind test server");
    let addr = server.local_addrs()[0];
    let handle = server.handle();
    tokio::spawn(server.run());

    TestServer {
        addr,
        handle,
        store,
    }
}

/// Standard fixture: four groups, three articles in freenews.misc, a reader
/// identity and a feeder identity with transfer rights
fn seed(store: &MemoryStore) {
    assert!(store.create_catalog("freenews.misc", "General discussion", "admin"));
    assert!(store.create_catalog("comp.lang.rs", "Rust programming", "admin"));
    assert!(store.create_catalog("comp.lang.go", "Go programming", "admin"));
    assert!(store.create_catalog("rec.food", "Cooking", "admin"));

    store.create_identity("alice", "s3cret").expect("seed alice");
    let feeder_caps = CapabilitySet {
        inject: true,
        ..CapabilitySet::default()
    };
    store
        .create_identity_with("feeder", "transit", feeder_caps, false)
        .expect("seed feeder");

    for (i, body) in ["hello", "second body", "third body"].iter().enumerate() {
        seed_article(
            store,
            "freenews.misc",
            &format!("<seed{}@x.invalid>", i + 1),
            body,
        );
    }
}

/// Post an article straight into the store; returns its number in the
/// first target group
pub fn seed_article(store: &MemoryStore, groups: &str, message_id: &str, body: &str) -> u64 {
    let raw = format!(
        "From: u@x\r\nNewsgroups: {groups}\r\nSubject: seeded\r\nMessage-ID: {message_id}\r\n\r\n{body}\r\n"
    );
    let article = nntpd_rs::parse_article(raw.as_bytes(), "news.test", Utc::now())
        .expect("seed article parses");
    match store.post(None, article, PostSource::Local).expect("store up") {
        PostOutcome::Stored(receipt) => receipt.placements[0].1,
        PostOutcome::Rejected(rejection) => panic!("seed rejected: {rejection:?}"),
    }
}

/// A minimal line-oriented NNTP client
pub struct TestClient {
    stream: BufReader<TcpStream>,
}

impl TestClient {
    /// Connect without consuming the greeting
    pub async fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).await.expect("connect");
        Self {
            stream: BufReader::new(stream),
        }
    }

    /// Connect and consume the greeting, returning it
    pub async fn connect_and_greet(addr: SocketAddr) -> (Self, String) {
        let mut client = Self::connect(addr).await;
        let greeting = client.line().await;
        (client, greeting)
    }

    /// Read one CRLF-terminated line, stripped
    pub async fn line(&mut self) -> String {
        let mut line = String::new();
        let n = timeout(READ_TIMEOUT, self.stream.read_line(&mut line))
            .await
            .expect("read timed out")
            .expect("read failed");
        assert!(n > 0, "connection closed while expecting a line");
        line.trim_end().to_string()
    }

    /// Read until EOF; `true` when the peer closed the connection
    pub async fn at_eof(&mut self) -> bool {
        let mut buf = [0u8; 1];
        matches!(
            timeout(READ_TIMEOUT, self.stream.read(&mut buf)).await,
            Ok(Ok(0))
        )
    }

    /// Send one command line
    pub async fn send(&mut self, command: &str) {
        let stream = self.stream.get_mut();
        stream
            .write_all(format!("{command}\r\n").as_bytes())
            .await
            .expect("write failed");
        stream.flush().await.expect("flush failed");
    }

    /// Send raw bytes without any framing added
    pub async fn send_raw(&mut self, bytes: &[u8]) {
        let stream = self.stream.get_mut();
        stream.write_all(bytes).await.expect("write failed");
        stream.flush().await.expect("flush failed");
    }

    /// Send a command and read the single-line reply
    pub async fn cmd(&mut self, command: &str) -> String {
        self.send(command).await;
        self.line().await
    }

    /// Read the dot-terminated payload of a multi-line reply, unstuffed
    pub async fn multiline_body(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        loop {
            let line = self.line().await;
            if line == "." {
                return lines;
            }
            let line = line.strip_prefix('.').map_or(line.as_str(), |rest| rest);
            lines.push(line.to_string());
        }
    }

    /// Send a command, read status plus the multi-line payload
    pub async fn cmd_multiline(&mut self, command: &str) -> (String, Vec<String>) {
        self.send(command).await;
        let status = self.line().await;
        if code(&status) >= 400 {
            return (status, Vec::new());
        }
        (status, self.multiline_body().await)
    }

    /// AUTHINFO USER/PASS handshake, asserting success
    pub async fn authenticate(&mut self, username: &str, password: &str) {
        let reply = self.cmd(&format!("AUTHINFO USER {username}")).await;
        assert_eq!(code(&reply), 381, "unexpected USER reply: {reply}");
        let reply = self.cmd(&format!("AUTHINFO PASS {password}")).await;
        assert_eq!(code(&reply), 281, "unexpected PASS reply: {reply}");
    }

    /// Take the underlying TCP stream, e.g. for a client-side TLS upgrade
    pub fn into_stream(self) -> TcpStream {
        self.stream.into_inner()
    }

    /// Read raw bytes until the buffer ends with an uncompressed `.CRLF`
    pub async fn read_raw_until_dot(&mut self) -> Vec<u8> {
        let mut data = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = timeout(READ_TIMEOUT, self.stream.read(&mut chunk))
                .await
                .expect("read timed out")
                .expect("read failed");
            assert!(n > 0, "connection closed mid-block");
            data.extend_from_slice(&chunk[..n]);
            if data.ends_with(b".\r\n") {
                data.truncate(data.len() - 3);
                return data;
            }
        }
    }

    /// Read some raw bytes (at least one)
    pub async fn read_raw_some(&mut self) -> Vec<u8> {
        let mut chunk = [0u8; 4096];
        let n = timeout(READ_TIMEOUT, self.stream.read(&mut chunk))
            .await
            .expect("read timed out")
            .expect("read failed");
        assert!(n > 0, "connection closed");
        chunk[..n].to_vec()
    }
}

/// Reply code of a response line
pub fn code(line: &str) -> u16 {
    line.get(..3)
        .and_then(|digits| digits.parse().ok())
        .unwrap_or_else(|| panic!("no reply code in: {line}"))
}
