//! Browser refresh channel.
//!
//! A WebSocket endpoint on localhost. The child learns its address through
//! the environment and relays it to the pages it serves; pages then receive
//! `browser-refresh-asked` frames after each restart.

use crate::dev::state::{ChannelMessage, RefreshHub, UnknownMessage};
use crate::error::{CliError, Result};
use axum::{
    Router,
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use std::net::Ipv4Addr;
use std::ops::Range;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Ports probed in ascending order when none is forced.
pub const PORT_RANGE: Range<u16> = 5100..5400;

/// A bound but not yet serving notification channel.
pub struct NotificationServer {
    listener: TcpListener,
    port: u16,
}

impl NotificationServer {
    /// Bind the channel.
    ///
    /// A forced port must bind or the call fails. Without one, the first free
    /// port of [`PORT_RANGE`] is used, and `None` means the whole range is
    /// taken.
    pub async fn bind(forced_port: Option<u16>) -> Result<Option<Self>> {
        match forced_port {
            Some(port) => {
                let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, port))
                    .await
                    .map_err(|source| CliError::ChannelBind { port, source })?;
                Ok(Some(Self { listener, port }))
            }
            None => Ok(Self::bind_in_range(PORT_RANGE).await),
        }
    }

    /// Try each port of `range` in turn; the first successful bind wins.
    pub async fn bind_in_range(range: Range<u16>) -> Option<Self> {
        for port in range {
            match TcpListener::bind((Ipv4Addr::LOCALHOST, port)).await {
                Ok(listener) => return Some(Self { listener, port }),
                Err(e) => tracing::debug!("port {} unavailable: {}", port, e),
            }
        }
        None
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Address handed to the child.
    pub fn url(&self) -> String {
        format!("ws://{}:{}", Ipv4Addr::LOCALHOST, self.port)
    }

    /// Accept sessions until the task is dropped.
    pub async fn serve(self, hub: Arc<RefreshHub>) -> Result<()> {
        axum::serve(self.listener, router(hub))
            .await
            .map_err(|e| CliError::Channel(format!("Server error: {}", e)))
    }
}

/// Every path upgrades to a session.
fn router(hub: Arc<RefreshHub>) -> Router {
    Router::new().fallback(handle_upgrade).with_state(hub)
}

async fn handle_upgrade(ws: WebSocketUpgrade, State(hub): State<Arc<RefreshHub>>) -> Response {
    ws.on_upgrade(move |socket| run_session(socket, hub))
}

async fn run_session(mut socket: WebSocket, hub: Arc<RefreshHub>) {
    let (id, mut outbound) = hub.register();

    loop {
        tokio::select! {
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Text(text))) => match text.as_str().parse::<ChannelMessage>() {
                    Ok(message) => hub.handle_message(id, message),
                    Err(UnknownMessage(frame)) => {
                        tracing::debug!("ignoring frame {:?} from session {}", frame, id);
                    }
                },
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            Some(frame) = outbound.recv() => {
                if socket.send(Message::Text(frame.into())).await.is_err() {
                    break;
                }
            }
        }
    }

    hub.unregister(id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dev::state::REFRESH_FRAME;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    async fn wait_for(condition: impl Fn() -> bool) {
        for _ in 0..200 {
            if condition() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("condition not reached");
    }

    /// Open a raw WebSocket connection and consume the handshake response.
    async fn connect(port: u16) -> TcpStream {
        let mut stream = TcpStream::connect((Ipv4Addr::LOCALHOST, port)).await.unwrap();
        let request = format!(
            "GET /any/path HTTP/1.1\r\n\
             Host: 127.0.0.1:{}\r\n\
             Upgrade: websocket\r\n\
             Connection: Upgrade\r\n\
             Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
             Sec-WebSocket-Version: 13\r\n\r\n",
            port
        );
        stream.write_all(request.as_bytes()).await.unwrap();

        let mut response = Vec::new();
        let mut byte = [0u8; 1];
        while !response.ends_with(b"\r\n\r\n") {
            stream.read_exact(&mut byte).await.unwrap();
            response.push(byte[0]);
        }
        let response = String::from_utf8(response).unwrap();
        assert!(response.starts_with("HTTP/1.1 101"), "{}", response);

        stream
    }

    /// Client frames must be masked; an all-zero mask keeps the payload as is.
    fn client_text_frame(text: &str) -> Vec<u8> {
        let mut frame = vec![0x81, 0x80 | text.len() as u8, 0, 0, 0, 0];
        frame.extend_from_slice(text.as_bytes());
        frame
    }

    #[tokio::test]
    async fn test_forced_port_in_use_is_fatal() {
        let taken = std::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = taken.local_addr().unwrap().port();

        match NotificationServer::bind(Some(port)).await {
            Err(CliError::ChannelBind { port: reported, .. }) => assert_eq!(reported, port),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("forced port should not bind"),
        }
    }

    #[tokio::test]
    async fn test_forced_port_binds() {
        let port = {
            let probe = std::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
            probe.local_addr().unwrap().port()
        };

        let server = NotificationServer::bind(Some(port)).await.unwrap().unwrap();
        assert_eq!(server.port(), port);
        assert_eq!(server.url(), format!("ws://127.0.0.1:{}", port));
    }

    #[tokio::test]
    async fn test_exhausted_range() {
        let taken = std::net::TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).unwrap();
        let port = taken.local_addr().unwrap().port();

        assert!(NotificationServer::bind_in_range(port..port + 1).await.is_none());
    }

    #[tokio::test]
    async fn test_session_receives_refresh_and_sets_flag() {
        let server = NotificationServer::bind_in_range(PORT_RANGE).await.unwrap();
        let port = server.port();
        let hub = Arc::new(RefreshHub::new());
        let serve = tokio::spawn(server.serve(Arc::clone(&hub)));

        let mut stream = connect(port).await;
        wait_for(|| hub.session_count() == 1).await;

        hub.broadcast_refresh();
        let mut header = [0u8; 2];
        stream.read_exact(&mut header).await.unwrap();
        assert_eq!(header, [0x81, REFRESH_FRAME.len() as u8]);
        let mut payload = vec![0u8; REFRESH_FRAME.len()];
        stream.read_exact(&mut payload).await.unwrap();
        assert_eq!(payload, REFRESH_FRAME.as_bytes());

        stream
            .write_all(&client_text_frame("mustWaitServerReady"))
            .await
            .unwrap();
        wait_for(|| hub.must_wait_ready()).await;

        drop(stream);
        wait_for(|| hub.session_count() == 0).await;
        assert!(!hub.must_wait_ready());

        serve.abort();
    }
}
