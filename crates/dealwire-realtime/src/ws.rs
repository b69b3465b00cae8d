//! WebSocket transport over `tokio-tungstenite`.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, trace};

use dealwire_core::defaults::ORGANIZATION_HEADER;
use dealwire_core::logging::SUBSYSTEM_REALTIME;
use dealwire_core::{ClientMessage, Error, Result, ServerMessage};

use crate::transport::{Connection, Connector, SessionAuth};

fn transport_error(err: tungstenite::Error) -> Error {
    Error::Transport(err.to_string())
}

fn header_value(value: &str, name: &str) -> Result<HeaderValue> {
    HeaderValue::from_str(value)
        .map_err(|_| Error::InvalidInput(format!("{} is not a valid header value", name)))
}

/// Connects to the notification server with bearer and organization headers.
#[derive(Debug, Clone)]
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, auth: &SessionAuth) -> Result<Box<dyn Connection>> {
        let mut request = self
            .url
            .as_str()
            .into_client_request()
            .map_err(|e| Error::Config(format!("invalid realtime url {}: {}", self.url, e)))?;

        let headers = request.headers_mut();
        headers.insert(
            AUTHORIZATION,
            header_value(&format!("Bearer {}", auth.credential()), "credential")?,
        );
        headers.insert(
            HeaderName::from_static(ORGANIZATION_HEADER),
            header_value(auth.scope(), "organization scope")?,
        );

        let (stream, response) = connect_async(request).await.map_err(transport_error)?;
        debug!(
            subsystem = SUBSYSTEM_REALTIME,
            url = %self.url,
            status = %response.status(),
            "WebSocket handshake complete"
        );

        Ok(Box::new(WsConnection { stream }))
    }
}

/// One live WebSocket.
pub struct WsConnection {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Connection for WsConnection {
    async fn send(&mut self, message: &ClientMessage) -> Result<()> {
        let frame = message.to_frame()?;
        self.stream
            .send(Message::Text(frame))
            .await
            .map_err(transport_error)
    }

    async fn recv(&mut self) -> Option<Result<ServerMessage>> {
        loop {
            let message = match self.stream.next().await? {
                Ok(message) => message,
                Err(err) => return Some(Err(transport_error(err))),
            };

            match message {
                Message::Text(text) => {
                    trace!(subsystem = SUBSYSTEM_REALTIME, frame = %text, "Received frame");
                    return Some(ServerMessage::from_frame(&text));
                }
                Message::Binary(bytes) => {
                    return Some(match String::from_utf8(bytes) {
                        Ok(text) => ServerMessage::from_frame(&text),
                        Err(_) => Err(Error::Protocol("binary frame is not UTF-8".to_string())),
                    });
                }
                Message::Close(frame) => {
                    debug!(subsystem = SUBSYSTEM_REALTIME, ?frame, "Server closed the connection");
                    return None;
                }
                // Pongs to server pings are queued by tungstenite and flushed on the next read.
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
            }
        }
    }

    async fn ping(&mut self) -> Result<()> {
        self.stream
            .send(Message::Ping(Vec::new()))
            .await
            .map_err(transport_error)
    }

    async fn close(&mut self) {
        if let Err(err) = self.stream.close(None).await {
            debug!(subsystem = SUBSYSTEM_REALTIME, error = %err, "Error while closing WebSocket");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_url_is_config_error() {
        let connector = WsConnector::new("not a url");
        let err = match connector.connect(&SessionAuth::new("t", "org")).await {
            Ok(_) => panic!("expected an error"),
            Err(err) => err,
        };
        assert!(matches!(err, Error::Config(_)));
    }

    #[tokio::test]
    async fn test_credential_with_newline_is_rejected() {
        let connector = WsConnector::new("ws://127.0.0.1:9/realtime");
        let err = match connector
            .connect(&SessionAuth::new("bad\ntoken", "org"))
            .await
        {
            Ok(_) => panic!("expected an error"),
            Err(err) => err,
        };
        assert!(matches!(err, Error::InvalidInput(_)));
    }
}
