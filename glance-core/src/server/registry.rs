//! The ordered set of authenticated viewers and the fan-out write.

use std::io;

use tokio::io::{AsyncWrite, AsyncWriteExt};

/// Server-assigned connection identifier.
pub type ClientId = u64;

/// Authenticated clients in the order they joined.
///
/// Generic over the writer so the fan-out can be exercised without
/// sockets.
#[derive(Debug)]
pub struct ClientSet<W> {
    clients: Vec<(ClientId, W)>,
}

impl<W> Default for ClientSet<W> {
    fn default() -> Self {
        Self {
            clients: Vec::new(),
        }
    }
}

impl<W: AsyncWrite + Unpin> ClientSet<W> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn contains(&self, id: ClientId) -> bool {
        self.clients.iter().any(|(cid, _)| *cid == id)
    }

    pub fn ids(&self) -> Vec<ClientId> {
        self.clients.iter().map(|(id, _)| *id).collect()
    }

    /// Append a client; an existing entry with the same id is replaced.
    pub fn insert(&mut self, id: ClientId, writer: W) {
        self.remove(id);
        self.clients.push((id, writer));
    }

    pub fn remove(&mut self, id: ClientId) -> Option<W> {
        let pos = self.clients.iter().position(|(cid, _)| *cid == id)?;
        Some(self.clients.remove(pos).1)
    }

    pub fn drain(&mut self) -> Vec<(ClientId, W)> {
        std::mem::take(&mut self.clients)
    }

    /// Write `bytes` to one client.
    pub async fn send_to(&mut self, id: ClientId, bytes: &[u8]) -> io::Result<()> {
        let Some((_, writer)) = self.clients.iter_mut().find(|(cid, _)| *cid == id) else {
            return Err(io::Error::new(io::ErrorKind::NotFound, "unknown client"));
        };
        writer.write_all(bytes).await?;
        writer.flush().await
    }

    /// Write the same bytes to every client, in set order.
    ///
    /// A failing client is removed and reported; the rest still receive
    /// the full message.
    pub async fn broadcast(&mut self, bytes: &[u8]) -> Vec<(ClientId, io::Error)> {
        let mut failed = Vec::new();
        for (id, writer) in self.clients.iter_mut() {
            let result = match writer.write_all(bytes).await {
                Ok(()) => writer.flush().await,
                Err(e) => Err(e),
            };
            if let Err(e) = result {
                failed.push((*id, e));
            }
        }
        if !failed.is_empty() {
            self.clients
                .retain(|(id, _)| !failed.iter().any(|(bad, _)| bad == id));
        }
        failed
    }
}

// ── Tests ────────────────────────────────────────────────────────
