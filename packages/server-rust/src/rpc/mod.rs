//! Binary request/response RPC over TCP.
//!
//! Frames are length-delimited (4-byte big-endian prefix, at most
//! `MAX_FRAME_LENGTH` bytes) and carry `MsgPack`-encoded `RpcRequest` /
//! `RpcResponse` values from `relay_core::rpc`.

pub mod client;
pub mod server;

use relay_core::rpc::MAX_FRAME_LENGTH;
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, LengthDelimitedCodec};

pub use client::RpcClient;
pub use server::{LogInfoMethod, RpcMethod, RpcServer};

/// A TCP stream speaking the RPC framing.
pub type RpcFramed = Framed<TcpStream, LengthDelimitedCodec>;

pub(crate) fn framed(stream: TcpStream) -> RpcFramed {
    LengthDelimitedCodec::builder()
        .length_field_length(4)
        .big_endian()
        .max_frame_length(MAX_FRAME_LENGTH)
        .new_framed(stream)
}

/// RPC failures seen by the caller.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("failed to dial {addr}: {source}")]
    Dial {
        addr: String,
        #[source]
        source: std::io::Error,
    },
    #[error("rpc connection failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode rpc frame: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("failed to decode rpc frame: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
    #[error("connection closed before a reply arrived")]
    Closed,
    #[error("reply sequence {got} does not match request {expected}")]
    SequenceMismatch { expected: u64, got: u64 },
    /// The callee ran the method and reported an error.
    #[error("{0}")]
    Remote(String),
}
