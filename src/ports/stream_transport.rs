//! Stream Transport Port - Persistent Feed Connection
//!
//! Separates the connection manager's state machine from the WebSocket
//! library so reconnect behaviour can be driven by fakes in tests.

use async_trait::async_trait;

/// One open connection to the position-report feed.
#[async_trait]
pub trait StreamTransport: Send {
  /// Send a text frame (used for the subscription).
  async fn send_text(&mut self, text: String) -> anyhow::Result<()>;

  /// Wait for the next data frame.
  ///
  /// Returns `None` once the peer has closed the connection. Control
  /// frames are handled by the implementation and never surfaced.
  async fn next_frame(&mut self) -> Option<anyhow::Result<String>>;
}

/// Opens new transports; invoked once per connection attempt.
#[async_trait]
pub trait TransportFactory: Send + Sync + 'static {
  async fn connect(&self) -> anyhow::Result<Box<dyn StreamTransport>>;
}
