//! Per-session driver task.
//!
//! Each connection is driven by exactly one task: inbound frames and
//! orchestrator commands are serialized through a single `select!` loop,
//! which is what makes the unsynchronized `Connection` sound. The
//! [`SessionHandle`] is the cloneable mailbox the orchestrator talks
//! through; fallible lifecycle operations answer over oneshot channels.
//!
//! The loop exits when the transport goes inactive, firing the
//! connection's disconnect listeners on its way out.

use crate::connection::{Connection, SessionHandler};
use crate::core::batch::PacketBatch;
use crate::core::packet::GamePacket;
use crate::error::{PipelineError, Result};
use crate::pipeline::codec::{CodecHelper, PacketCodec};
use crate::utils::compression::CompressionAlgorithm;
use crate::utils::crypto::SecretKey;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Commands accepted by a session driver
pub enum SessionCommand {
    SendBatch(PacketBatch),
    SendPacket(GamePacket),
    SetHandler(SessionHandler),
    EnableCompression(CompressionAlgorithm, oneshot::Sender<Result<()>>),
    EnableEncryption(SecretKey, oneshot::Sender<Result<()>>),
    SetCodec(
        Arc<dyn PacketCodec>,
        CodecHelper,
        oneshot::Sender<Result<()>>,
    ),
    AddDisconnectListener(Box<dyn FnOnce() + Send>),
    Disconnect,
}

/// Mailbox for one running session
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
}

impl SessionHandle {
    fn command(&self, command: SessionCommand) {
        let _ = self.commands.send(command);
    }

    async fn request(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<()>>) -> SessionCommand,
    ) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(build(reply_tx))
            .map_err(|_| PipelineError::ConnectionClosed)?;
        reply_rx.await.map_err(|_| PipelineError::ConnectionClosed)?
    }

    pub fn send_batch(&self, batch: PacketBatch) {
        self.command(SessionCommand::SendBatch(batch));
    }

    pub fn send_packet(&self, packet: GamePacket) {
        self.command(SessionCommand::SendPacket(packet));
    }

    pub fn set_handler(&self, handler: SessionHandler) {
        self.command(SessionCommand::SetHandler(handler));
    }

    pub async fn enable_compression(&self, algorithm: CompressionAlgorithm) -> Result<()> {
        self.request(|reply| SessionCommand::EnableCompression(algorithm, reply))
            .await
    }

    pub async fn enable_encryption(&self, secret: SecretKey) -> Result<()> {
        self.request(|reply| SessionCommand::EnableEncryption(secret, reply))
            .await
    }

    pub async fn set_codec(&self, codec: Arc<dyn PacketCodec>, helper: CodecHelper) -> Result<()> {
        self.request(|reply| SessionCommand::SetCodec(codec, helper, reply))
            .await
    }

    pub fn add_disconnect_listener(&self, listener: impl FnOnce() + Send + 'static) {
        self.command(SessionCommand::AddDisconnectListener(Box::new(listener)));
    }

    pub fn disconnect(&self) {
        self.command(SessionCommand::Disconnect);
    }

    /// Whether the driver has exited
    pub fn is_closed(&self) -> bool {
        self.commands.is_closed()
    }
}

/// Spawn the driver task for `connection`. Must be called within a tokio
/// runtime.
pub fn spawn(connection: Connection) -> (SessionHandle, JoinHandle<()>) {
    let (commands_tx, commands_rx) = mpsc::unbounded_channel();
    let handle = SessionHandle {
        commands: commands_tx,
    };
    let join = tokio::spawn(run(connection, commands_rx));
    (handle, join)
}

async fn run(mut connection: Connection, mut commands: mpsc::UnboundedReceiver<SessionCommand>) {
    let remote = connection.remote_address();
    debug!(remote = %remote, "session driver started");

    let mut commands_open = true;
    loop {
        tokio::select! {
            maybe_frame = connection.channel_mut().recv() => match maybe_frame {
                Some(frame) => connection.handle_frame(frame),
                None => {
                    info!(remote = %remote, "transport inactive");
                    connection.on_inactive();
                    break;
                }
            },
            maybe_command = commands.recv(), if commands_open => match maybe_command {
                Some(command) => apply(&mut connection, command),
                // All handles dropped; keep driving traffic until the
                // transport goes inactive.
                None => commands_open = false,
            },
        }
    }

    debug!(remote = %remote, "session driver stopped");
}

fn apply(connection: &mut Connection, command: SessionCommand) {
    match command {
        SessionCommand::SendBatch(batch) => connection.send_batch(batch),
        SessionCommand::SendPacket(packet) => connection.send_packet(packet),
        SessionCommand::SetHandler(handler) => connection.set_handler(handler),
        SessionCommand::EnableCompression(algorithm, reply) => {
            let _ = reply.send(connection.enable_compression(algorithm));
        }
        SessionCommand::EnableEncryption(secret, reply) => {
            let _ = reply.send(connection.enable_encryption(&secret));
        }
        SessionCommand::SetCodec(codec, helper, reply) => {
            let _ = reply.send(connection.set_codec(codec, helper));
        }
        SessionCommand::AddDisconnectListener(listener) => {
            connection.add_disconnect_listener(listener);
        }
        SessionCommand::Disconnect => connection.disconnect(),
    }
}
