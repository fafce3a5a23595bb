//! Transport seam: how a connection to the service is opened.

use std::pin::Pin;

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::{Sink, SinkExt, StreamExt};
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use ezpass_protocols::SyncError;

/// Outbound half of a connection: accepts text frames.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = SyncError> + Send>>;

/// Inbound half of a connection. Ends (or yields [`SyncError::Closed`]) when
/// the peer closes; any other error means the connection errored.
pub type FrameStream = BoxStream<'static, Result<String, SyncError>>;

/// An established duplex connection.
pub struct Connection {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

/// Opens connections to the credential service.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn connect(&self, endpoint: &str) -> Result<Connection, SyncError>;
}

/// WebSocket connector (text frames).
#[derive(Debug, Default, Clone, Copy)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, endpoint: &str) -> Result<Connection, SyncError> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(endpoint)
            .await
            .map_err(|e| SyncError::ConnectionFailed(format!("WebSocket: {}", e)))?;
        debug!("WebSocket connected to {}", endpoint);

        let (ws_sink, ws_source) = ws_stream.split();

        let sink = ws_sink
            .sink_map_err(|e| SyncError::SendFailed(e.to_string()))
            .with(|text: String| futures::future::ok::<_, SyncError>(Message::Text(text.into())));

        let stream = ws_source.filter_map(|msg| {
            futures::future::ready(match msg {
                Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
                Ok(Message::Close(_)) => Some(Err(SyncError::Closed)),
                Ok(_) => None,
                Err(e) => Some(Err(SyncError::ConnectionFailed(e.to_string()))),
            })
        });

        Ok(Connection {
            sink: Box::pin(sink),
            stream: stream.boxed(),
        })
    }
}
