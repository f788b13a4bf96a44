//! Test server management.
//!
//! Spawns and manages roomcastd instances for integration testing. Each
//! server gets its own scratch directory, SQLite database and a pair of ports:
//! `port` for WebSocket clients and `port + 1` for the HTTP API.

use jsonwebtoken::{EncodingKey, Header, encode};
use serde::Serialize;
use sqlx::sqlite::SqlitePoolOptions;
use std::path::PathBuf;
use std::process::{Child, Command};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::sleep;

/// Signing secret written into every test config.
pub const JWT_SECRET: &str = "integration-test-secret-0123456789";

#[derive(Serialize)]
struct Claims<'a> {
    id: &'a str,
    exp: u64,
}

/// Mint a token for `user_id` that expires `ttl_secs` from now.
pub fn mint_token(user_id: &str, ttl_secs: i64) -> String {
    let now = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock before epoch")
        .as_secs() as i64;
    let claims = Claims {
        id: user_id,
        exp: (now + ttl_secs).max(0) as u64,
    };
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(JWT_SECRET.as_bytes()),
    )
    .expect("token encodes")
}

/// A test server instance.
pub struct TestServer {
    child: Child,
    port: u16,
    db_path: PathBuf,
    _data_dir: TempDir,
}

impl TestServer {
    /// Spawn a server with default room settings.
    pub async fn spawn(port: u16) -> anyhow::Result<Self> {
        Self::spawn_with(port, "").await
    }

    /// Spawn a server, appending `extra` to the generated TOML config.
    pub async fn spawn_with(port: u16, extra: &str) -> anyhow::Result<Self> {
        let data_dir = tempfile::tempdir()?;
        let db_path = data_dir.path().join("roomcast.db");
        let config_path = data_dir.path().join("config.toml");

        let config_content = format!(
            r#"
[server]
name = "test.server"

[server.idle_timeouts]
handshake = 2
ping = 30
timeout = 60

[listen]
address = "127.0.0.1:{port}"

[http]
address = "127.0.0.1:{http_port}"

[auth]
jwt_secret = "{JWT_SECRET}"

[database]
path = "{db}"

[security.rate_limits]
message_rate_per_second = 1000
connection_burst_per_ip = 1000
join_burst_per_client = 1000
{extra}
"#,
            http_port = port + 1,
            db = db_path.display(),
        );
        std::fs::write(&config_path, config_content)?;

        let child = Command::new(env!("CARGO_BIN_EXE_roomcastd"))
            .arg(&config_path)
            .env("RUST_LOG", "roomcastd=debug,warn")
            .spawn()?;

        let server = Self {
            child,
            port,
            db_path,
            _data_dir: data_dir,
        };
        server.wait_until_ready().await?;
        Ok(server)
    }

    /// Wait until both listeners accept connections.
    async fn wait_until_ready(&self) -> anyhow::Result<()> {
        for _ in 0..50 {
            let ws = TcpStream::connect(("127.0.0.1", self.port)).await.is_ok();
            let http = TcpStream::connect(("127.0.0.1", self.port + 1)).await.is_ok();
            if ws && http {
                return Ok(());
            }
            sleep(Duration::from_millis(100)).await;
        }
        anyhow::bail!("Server failed to start within 5 seconds")
    }

    /// WebSocket address of the server.
    pub fn address(&self) -> String {
        format!("127.0.0.1:{}", self.port)
    }

    /// Insert users straight into the server's database.
    pub async fn seed_users(&self, users: &[(&str, &str)]) -> anyhow::Result<()> {
        let url = format!("sqlite://{}", self.db_path.display());
        let pool = SqlitePoolOptions::new().max_connections(1).connect(&url).await?;
        for (id, username) in users {
            sqlx::query("INSERT INTO users (id, username) VALUES (?, ?)")
                .bind(id)
                .bind(username)
                .execute(&pool)
                .await?;
        }
        pool.close().await;
        Ok(())
    }

    /// Connect as `user_id` and wait for `ready`.
    pub async fn connect(&self, user_id: &str) -> anyhow::Result<super::client::TestClient> {
        let mut client =
            super::client::TestClient::connect(&self.address(), Some(&mint_token(user_id, 300)))
                .await?;
        client.expect_ready().await?;
        Ok(client)
    }

    /// Issue an HTTP request against the API listener.
    ///
    /// Returns the status code and the parsed JSON body (`Null` when empty).
    pub async fn http(
        &self,
        method: &str,
        path: &str,
        token: Option<&str>,
        body: Option<serde_json::Value>,
    ) -> anyhow::Result<(u16, serde_json::Value)> {
        let mut stream = TcpStream::connect(("127.0.0.1", self.port + 1)).await?;
        let body = body.map(|b| b.to_string()).unwrap_or_default();

        let mut request = format!(
            "{method} {path} HTTP/1.1\r\nHost: 127.0.0.1\r\nConnection: close\r\nContent-Length: {}\r\n",
            body.len()
        );
        if !body.is_empty() {
            request.push_str("Content-Type: application/json\r\n");
        }
        if let Some(token) = token {
            request.push_str(&format!("Authorization: Bearer {token}\r\n"));
        }
        request.push_str("\r\n");
        request.push_str(&body);
        stream.write_all(request.as_bytes()).await?;

        let mut raw = Vec::new();
        tokio::time::timeout(Duration::from_secs(5), stream.read_to_end(&mut raw)).await??;
        let raw = String::from_utf8(raw)?;

        let (head, payload) = raw
            .split_once("\r\n\r\n")
            .ok_or_else(|| anyhow::anyhow!("malformed response: {raw:?}"))?;
        let status: u16 = head
            .split_whitespace()
            .nth(1)
            .ok_or_else(|| anyhow::anyhow!("missing status line"))?
            .parse()?;
        let json = if payload.trim().is_empty() {
            serde_json::Value::Null
        } else {
            serde_json::from_str(payload.trim())?
        };
        Ok((status, json))
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        // Kill the server process; the scratch directory goes with the TempDir.
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}
