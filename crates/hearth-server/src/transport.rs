//! TCP transport: newline-delimited JSON over per-connection tasks.
//!
//! One spawned task per accepted socket. The reader half decodes one
//! request per line, stamps the peer address, and runs the synchronous
//! dispatcher; a paired writer task drains an unbounded channel so that
//! correlated responses and unsolicited pushes share a single ordered
//! outbound stream. Once a request for an identity has been accepted, the
//! channel's sender is registered with the notifier under that identity,
//! which is how committed room mutations reach subscribers on other
//! sockets.

use std::{
    collections::HashSet,
    net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr},
    sync::Arc,
};

use hearth_proto::{Request, Response, ResponseEnvelope};
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter},
    net::{TcpListener, TcpStream, tcp::OwnedWriteHalf},
    sync::mpsc::{self, UnboundedReceiver, UnboundedSender},
};

use crate::{context::ServerContext, error::ServerError};

/// The running TCP front end.
pub struct Server {
    context: Arc<ServerContext>,
    listener: TcpListener,
}

impl Server {
    /// Bind the listener at the context's configured address.
    pub async fn bind(context: Arc<ServerContext>) -> Result<Self, ServerError> {
        let bind_address = context.config().bind_address;
        let listener = TcpListener::bind(&bind_address).await.map_err(|e| {
            ServerError::Transport(format!("bind {bind_address}: {e}"))
        })?;

        Ok(Self { context, listener })
    }

    /// Local address the listener is bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener
            .local_addr()
            .map_err(|e| ServerError::Transport(format!("local address: {e}")))
    }

    /// Accept connections until the process stops.
    pub async fn run(self) -> Result<(), ServerError> {
        loop {
            match self.listener.accept().await {
                Ok((stream, peer)) => {
                    let context = Arc::clone(&self.context);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, peer, context).await {
                            tracing::debug!(%peer, error = %e, "connection ended with error");
                        }
                    });
                },
                Err(e) => {
                    tracing::error!(error = %e, "accept failed");
                },
            }
        }
    }
}

fn split_peer_ip(peer: SocketAddr) -> (Option<Ipv4Addr>, Option<Ipv6Addr>) {
    match peer.ip() {
        IpAddr::V4(addr) => (Some(addr), None),
        IpAddr::V6(addr) => match addr.to_ipv4_mapped() {
            Some(mapped) => (Some(mapped), None),
            None => (None, Some(addr)),
        },
    }
}

async fn write_responses(
    write_half: OwnedWriteHalf,
    mut outbound: UnboundedReceiver<ResponseEnvelope>,
) -> std::io::Result<()> {
    let mut writer = BufWriter::new(write_half);

    while let Some(envelope) = outbound.recv().await {
        let mut line = serde_json::to_vec(&envelope)?;
        line.push(b'\n');
        writer.write_all(&line).await?;
        writer.flush().await?;
    }

    writer.shutdown().await
}

async fn read_requests(
    read_half: tokio::net::tcp::OwnedReadHalf,
    peer: SocketAddr,
    context: &ServerContext,
    outbound_tx: &UnboundedSender<ResponseEnvelope>,
    bound_ids: &mut HashSet<String>,
) -> Result<(), ServerError> {
    let (source_ipv4, source_ipv6) = split_peer_ip(peer);
    let mut lines = BufReader::new(read_half).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| ServerError::Transport(format!("read from {peer}: {e}")))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request: Request = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(e) => {
                tracing::debug!(%peer, error = %e, "undecodable request line");
                let envelope = ResponseEnvelope::new(
                    None,
                    Response::bad_request(format!("malformed request: {e}")),
                );
                if outbound_tx.send(envelope).is_err() {
                    break;
                }
                continue;
            },
        };

        let response = context.dispatch(&request, source_ipv4, source_ipv6);

        // Bind the push sender only once the dispatcher has accepted a
        // request for the claimed identity. The claim is unverified
        // client input until then; binding earlier would let a rejected
        // request move another connection's push stream to this socket.
        if !response.is_error()
            && let Some(connection_id) = &request.connection_id
            && bound_ids.insert(connection_id.clone())
        {
            context.notifier().register_sender(connection_id, outbound_tx.clone());
        }

        if let Response::ConnectionIdAssigned { connection_id, .. } = &response
            && bound_ids.insert(connection_id.clone())
        {
            context.notifier().register_sender(connection_id, outbound_tx.clone());
        }

        let envelope = ResponseEnvelope::new(request.request_id.clone(), response);
        if outbound_tx.send(envelope).is_err() {
            break;
        }
    }

    Ok(())
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    context: Arc<ServerContext>,
) -> Result<(), ServerError> {
    tracing::debug!(%peer, "connection accepted");

    let (read_half, write_half) = stream.into_split();
    let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();

    let writer = tokio::spawn(async move {
        if let Err(e) = write_responses(write_half, outbound_rx).await {
            tracing::debug!(error = %e, "writer task ended");
        }
    });

    // Connection ids this socket has spoken for; the push sender is
    // unbound for all of them even when the read loop fails.
    let mut bound_ids: HashSet<String> = HashSet::new();
    let result =
        read_requests(read_half, peer, &context, &outbound_tx, &mut bound_ids).await;

    for connection_id in &bound_ids {
        context.notifier().unregister_sender(connection_id, &outbound_tx);
    }
    drop(outbound_tx);
    let _ = writer.await;

    tracing::debug!(%peer, "connection closed");
    result
}
