//! Duplex ports and the privileged-context runtime seen from the page.

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use super::{PageRequest, Reply};
use crate::error::ChannelError;

/// The privileged context as the page sees it.
#[async_trait]
pub trait Runtime: Send + Sync {
    /// Open a fresh duplex port.
    fn connect(&self, name: &str) -> Result<Port, ChannelError>;

    /// One-shot request/response without a port.
    async fn send_message(&self, request: PageRequest) -> Result<Reply, ChannelError>;
}

/// Page end of a port. Dropping it disconnects.
pub struct Port {
    name: String,
    tx: mpsc::UnboundedSender<PageRequest>,
    rx: mpsc::UnboundedReceiver<Reply>,
}

/// Privileged end of a port.
pub struct PortPeer {
    name: String,
    rx: mpsc::UnboundedReceiver<PageRequest>,
    tx: mpsc::UnboundedSender<Reply>,
}

impl Port {
    pub fn pair(name: &str) -> (Port, PortPeer) {
        let (req_tx, req_rx) = mpsc::unbounded_channel();
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        (
            Port {
                name: name.to_string(),
                tx: req_tx,
                rx: reply_rx,
            },
            PortPeer {
                name: name.to_string(),
                rx: req_rx,
                tx: reply_tx,
            },
        )
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn post(&self, request: PageRequest) -> Result<(), ChannelError> {
        self.tx.send(request).map_err(|_| ChannelError::Closed)
    }

    /// Next reply, `None` once the peer is gone.
    pub async fn recv(&mut self) -> Option<Reply> {
        self.rx.recv().await
    }

    pub fn disconnect(self) {
        debug!(port = %self.name, "port disconnected");
    }
}

impl PortPeer {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub async fn recv(&mut self) -> Option<PageRequest> {
        self.rx.recv().await
    }

    /// Reply to the page. A page that already disconnected is not an error:
    /// the reply is dropped and `false` returned.
    pub fn reply(&self, reply: Reply) -> bool {
        match self.tx.send(reply) {
            Ok(()) => true,
            Err(_) => {
                debug!(port = %self.name, "port closed before reply, dropping");
                false
            }
        }
    }
}
