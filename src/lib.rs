//! # proxy-pipeline
//!
//! Per-connection transport pipeline core for game-protocol proxies.
//!
//! A proxy holds one [`Connection`](connection::Connection) per player
//! session. Inbound bytes flow transport → stage chain → decoded batch →
//! dispatch router → handler; outbound batches take the reverse path. The
//! handshake orchestrator mutates the chain through the connection's
//! one-shot lifecycle operations (compression, encryption, codec swaps)
//! while traffic is live.
//!
//! ## Modules
//! - [`core`]: packets and batches, the values moving through a pipeline
//! - [`pipeline`]: the named stage chain and its stages
//! - [`connection`]: session state, lifecycle controller, dispatch router
//! - [`transport`]: the stream and reliable-datagram links behind one seam
//! - [`service`]: the per-session driver task and command mailbox
//! - [`config`], [`error`], [`utils`]: ambient concerns
//!
//! ## Example
//! ```no_run
//! use proxy_pipeline::config::TransportConfig;
//! use proxy_pipeline::connection::{Connection, SessionHandler};
//! use proxy_pipeline::core::packet::GamePacket;
//! use proxy_pipeline::pipeline::session_chain;
//! use proxy_pipeline::transport::{Channel, Link, StreamLink};
//! use proxy_pipeline::error::Result;
//! use tracing::info;
//!
//! async fn accept(stream: tokio::net::TcpStream) -> Result<()> {
//!     let config = TransportConfig::default();
//!     let link = Link::Stream(StreamLink::spawn(stream)?);
//!     let chain = session_chain(600, 11, false, &config)?;
//!     let mut connection = Connection::new(Channel::new(link, chain, 11, &config), 600, false);
//!
//!     connection.set_handler(SessionHandler::packet(|packet: GamePacket| {
//!         info!(id = packet.id(), "packet received");
//!     }));
//!     let (_handle, driver) = proxy_pipeline::service::spawn(connection);
//!     driver.await.ok();
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod connection;
pub mod core;
pub mod error;
pub mod pipeline;
pub mod service;
pub mod transport;
pub mod utils;

pub use error::{PipelineError, Result};
