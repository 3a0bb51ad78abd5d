use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context as _;
use bytes::Bytes;
use framekv_proto::{
    encode_message, Frame, Message, MessageHeader, ProtoError, Response, HEADER_SIZE,
};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::watch;

use crate::config::Config;
use crate::executor;
use crate::metrics::MetricsRegistry;
use crate::store::KvStore;
use crate::worker::WorkerPool;

/// Shared server state handed to every connection task.
pub struct ServerContext {
    pub store: Arc<KvStore>,
    pub metrics: Arc<MetricsRegistry>,
    pub pool: WorkerPool,
    pub cfg: Config,
    shutdown: watch::Sender<bool>,
}

impl ServerContext {
    fn new(cfg: Config) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            store: Arc::new(KvStore::new()),
            metrics: Arc::new(MetricsRegistry::new()),
            pool: WorkerPool::new(cfg.worker_count),
            cfg,
            shutdown,
        }
    }

    /// Flips the termination flag; connection loops observe it between
    /// commands and the accept loop stops taking new connections.
    pub fn terminate(&self) {
        self.shutdown.send_replace(true);
    }

    fn subscribe(&self) -> watch::Receiver<bool> {
        self.shutdown.subscribe()
    }
}

pub struct Server {
    listener: TcpListener,
    ctx: Arc<ServerContext>,
}

impl Server {
    pub async fn bind(cfg: Config) -> anyhow::Result<Self> {
        let listener = TcpListener::bind((cfg.host.as_str(), cfg.port))
            .await
            .with_context(|| format!("failed to bind {}:{}", cfg.host, cfg.port))?;
        Ok(Self {
            listener,
            ctx: Arc::new(ServerContext::new(cfg)),
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn context(&self) -> Arc<ServerContext> {
        Arc::clone(&self.ctx)
    }

    pub async fn serve(self) -> anyhow::Result<()> {
        let mut shutdown = self.ctx.subscribe();
        if let Ok(addr) = self.listener.local_addr() {
            tracing::info!(%addr, workers = self.ctx.cfg.worker_count, "listening");
        }
        loop {
            // Catches a termination requested before this task first polled.
            if *shutdown.borrow() {
                tracing::info!("termination requested, stopping accept loop");
                return Ok(());
            }
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        tracing::debug!(%peer, "accepted connection");
                        let ctx = Arc::clone(&self.ctx);
                        tokio::spawn(async move {
                            if let Err(err) = handle_conn(stream, ctx).await {
                                tracing::warn!(%peer, error = %err, "connection closed");
                            }
                        });
                    }
                    // The listener survives individual accept failures.
                    Err(err) => tracing::error!(error = %err, "accept failed"),
                },
                _ = shutdown.changed() => {
                    tracing::info!("termination requested, stopping accept loop");
                    return Ok(());
                }
            }
        }
    }
}

/// Binds, installs a ctrl-c trigger for the termination flag, and serves
/// until told to stop.
pub async fn run(cfg: Config) -> anyhow::Result<()> {
    let server = Server::bind(cfg).await?;
    let ctx = server.context();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctx.terminate();
        }
    });
    server.serve().await
}

/// Read, execute, write loop for one connection. Commands on a connection
/// are handled strictly in order; the next header is read only after the
/// previous response has been flushed.
async fn handle_conn(stream: TcpStream, ctx: Arc<ServerContext>) -> anyhow::Result<()> {
    let mut shutdown = ctx.subscribe();
    let (mut reader, writer) = stream.into_split();
    let mut writer = BufWriter::new(writer);

    loop {
        if *shutdown.borrow() {
            return Ok(());
        }

        let mut header_bytes = [0u8; HEADER_SIZE];
        tokio::select! {
            read = reader.read_exact(&mut header_bytes) => match read {
                Ok(_) => {}
                // EOF at a message boundary is a normal disconnect.
                Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(()),
                Err(err) => return Err(err.into()),
            },
            _ = shutdown.changed() => return Ok(()),
        }

        let header = MessageHeader::decode(&header_bytes)?;
        let size = header.message_size as usize;
        if size > ctx.cfg.max_message_bytes {
            anyhow::bail!(
                "message of {size} bytes exceeds the {} byte limit",
                ctx.cfg.max_message_bytes
            );
        }
        let mut payload = vec![0u8; size];
        // EOF inside a message body is an abnormal close.
        reader.read_exact(&mut payload).await?;
        let frame = Frame {
            header,
            payload: Bytes::from(payload),
        };

        let store = Arc::clone(&ctx.store);
        let metrics = Arc::clone(&ctx.metrics);
        let outcome = ctx
            .pool
            .submit(move || -> Result<Response, ProtoError> {
                let msg = frame.decode()?;
                Ok(executor::execute(&store, &metrics, msg))
            })
            .await;

        let response = match outcome {
            Ok(Ok(response)) => response,
            // Undecodable payloads are wire errors: drop the connection.
            Ok(Err(err)) => return Err(err.into()),
            // A panicked job answers with an error; the connection lives on.
            Err(err) => Response::error(format!("internal error: {err}")),
        };

        let (header_bytes, body) = encode_message(&Message::Response(response));
        writer.write_all(&header_bytes).await?;
        writer.write_all(&body).await?;
        writer.flush().await?;
    }
}
