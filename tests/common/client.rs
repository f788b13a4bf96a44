//! Test WebSocket client.
//!
//! Provides a client for integration testing that can send client events and
//! assert on received server events.

use futures_util::{SinkExt, StreamExt};
use roomcast_proto::{ClientEvent, RoomId, SendMessage, ServerEvent};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

type Ws = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// A test client.
pub struct TestClient {
    ws: Ws,
}

pub fn room(id: &str) -> RoomId {
    RoomId::parse(id).expect("valid room id")
}

impl TestClient {
    /// Open a WebSocket, presenting `token` as a bearer header when given.
    pub async fn connect(address: &str, token: Option<&str>) -> anyhow::Result<Self> {
        let mut request = format!("ws://{address}/").into_client_request()?;
        if let Some(token) = token {
            request
                .headers_mut()
                .insert("Authorization", format!("Bearer {token}").parse()?);
        }
        let (ws, _) = connect_async(request).await?;
        Ok(Self { ws })
    }

    /// Open a WebSocket presenting the token as a `token` query parameter.
    pub async fn connect_with_query(address: &str, token: &str) -> anyhow::Result<Self> {
        let (ws, _) = connect_async(format!("ws://{address}/?token={token}")).await?;
        Ok(Self { ws })
    }

    /// Send a raw text frame.
    pub async fn send_raw(&mut self, text: &str) -> anyhow::Result<()> {
        self.ws.send(Message::Text(text.to_string())).await?;
        Ok(())
    }

    /// Send a client event.
    pub async fn send(&mut self, event: ClientEvent) -> anyhow::Result<()> {
        let json = event.to_json()?;
        self.send_raw(&json).await
    }

    pub async fn join(&mut self, room_id: &str) -> anyhow::Result<()> {
        self.send(ClientEvent::JoinRoom(room(room_id))).await
    }

    pub async fn say(&mut self, room_id: &str, content: &str) -> anyhow::Result<()> {
        self.send(ClientEvent::SendMessage(SendMessage {
            room_id: room(room_id),
            content: content.to_string(),
        }))
        .await
    }

    /// Receive a single event from the server.
    pub async fn recv(&mut self) -> anyhow::Result<ServerEvent> {
        self.recv_timeout(Duration::from_secs(5)).await
    }

    /// Receive an event with a timeout. Control frames are skipped.
    pub async fn recv_timeout(&mut self, dur: Duration) -> anyhow::Result<ServerEvent> {
        let deadline = tokio::time::Instant::now() + dur;
        loop {
            let frame = tokio::time::timeout_at(deadline, self.ws.next())
                .await?
                .ok_or_else(|| anyhow::anyhow!("connection closed"))??;
            match frame {
                Message::Text(text) => return Ok(ServerEvent::from_json(&text)?),
                Message::Close(frame) => anyhow::bail!("server closed connection: {frame:?}"),
                _ => continue,
            }
        }
    }

    /// Receive events until the predicate matches; returns everything seen.
    pub async fn recv_until<F>(&mut self, mut predicate: F) -> anyhow::Result<Vec<ServerEvent>>
    where
        F: FnMut(&ServerEvent) -> bool,
    {
        let mut events = Vec::new();
        loop {
            let event = self.recv().await?;
            let done = predicate(&event);
            events.push(event);
            if done {
                return Ok(events);
            }
        }
    }

    /// Wait for the `ready` event that completes the handshake.
    pub async fn expect_ready(&mut self) -> anyhow::Result<()> {
        match self.recv().await? {
            ServerEvent::Ready(_) => Ok(()),
            other => anyhow::bail!("expected ready, got {other:?}"),
        }
    }

    /// Assert that no event arrives within `dur`.
    pub async fn expect_silence(&mut self, dur: Duration) -> anyhow::Result<()> {
        match self.recv_timeout(dur).await {
            Ok(event) => anyhow::bail!("unexpected event: {event:?}"),
            Err(_) => Ok(()),
        }
    }

    /// Wait until the server closes the connection.
    ///
    /// Returns any events received before the close.
    pub async fn expect_closed(&mut self) -> anyhow::Result<Vec<ServerEvent>> {
        let mut events = Vec::new();
        loop {
            match timeout(Duration::from_secs(5), self.ws.next()).await? {
                None | Some(Ok(Message::Close(_))) | Some(Err(_)) => return Ok(events),
                Some(Ok(Message::Text(text))) => events.push(ServerEvent::from_json(&text)?),
                Some(Ok(_)) => {}
            }
        }
    }

    /// Close the connection from the client side.
    pub async fn close(mut self) -> anyhow::Result<()> {
        self.ws.close(None).await?;
        Ok(())
    }
}
