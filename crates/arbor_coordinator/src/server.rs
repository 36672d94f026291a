//! TCP front end of the coordinator.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Mutex;
use tokio_util::codec::{Framed, LinesCodec};
use tracing::{debug, error, info, warn};

use crate::constants::MAX_LINE_LENGTH;
use crate::state::CoordinatorState;
use crate::{CoordinatorConfig, CoordinatorError};

pub type SharedState = Arc<Mutex<CoordinatorState<StdRng>>>;

pub struct CoordinatorServer {
    listener: TcpListener,
    state: SharedState,
    connections: Arc<AtomicUsize>,
}

impl CoordinatorServer {
    pub async fn bind(config: CoordinatorConfig) -> Result<Self, CoordinatorError> {
        let addr = config.bind_addr;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| CoordinatorError::Bind { addr, source })?;
        let state = CoordinatorState::new(config.cluster, StdRng::from_entropy());

        Ok(Self {
            listener,
            state: Arc::new(Mutex::new(state)),
            connections: Arc::new(AtomicUsize::new(0)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, CoordinatorError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn state(&self) -> SharedState {
        self.state.clone()
    }

    /// Number of currently open client connections.
    pub fn connections(&self) -> Arc<AtomicUsize> {
        self.connections.clone()
    }

    /// Accept connections forever, one task per connection.
    pub async fn run(self) -> Result<(), CoordinatorError> {
        info!("Coordinator listening on tcp://{}", self.local_addr()?);

        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) => {
                    warn!("Failed to accept connection: {err}");
                    continue;
                }
            };

            let state = self.state.clone();
            let connections = self.connections.clone();
            tokio::spawn(async move {
                let open = connections.fetch_add(1, Ordering::SeqCst) + 1;
                info!("Client {peer} connected ({open} open)");

                if let Err(err) = handle_connection(stream, state).await {
                    error!("Connection with {peer} failed: {err}");
                }

                let open = connections.fetch_sub(1, Ordering::SeqCst) - 1;
                info!("Client {peer} disconnected ({open} open)");
            });
        }
    }
}

async fn handle_connection(stream: TcpStream, state: SharedState) -> Result<(), CoordinatorError> {
    let mut lines = Framed::new(stream, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));

    while let Some(line) = lines.next().await {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        debug!("Received: {line}");

        let response = state.lock().await.handle_line(&line);
        lines.send(response.to_string()).await?;
    }

    Ok(())
}
