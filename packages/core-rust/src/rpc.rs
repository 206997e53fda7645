//! Binary RPC frame types.
//!
//! Each frame on the wire is a 4-byte big-endian length followed by a
//! `MsgPack` body produced with `rmp_serde::to_vec_named()`. Parameters and
//! results are themselves `MsgPack`-encoded and carried as opaque bytes, so
//! the envelope stays independent of the method being called.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::action::LogPayload;

/// Method name of the log service's RPC entry point.
pub const LOG_INFO_METHOD: &str = "RPCServer.LogInfo";

/// Largest frame either side accepts (1 MiB).
pub const MAX_FRAME_LENGTH: usize = 1024 * 1024;

/// Parameters of `RPCServer.LogInfo`.
///
/// Field names and order are part of the contract between caller and callee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcLogPayload {
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "Data")]
    pub data: String,
}

impl From<LogPayload> for RpcLogPayload {
    fn from(payload: LogPayload) -> Self {
        Self {
            name: payload.name,
            data: payload.data,
        }
    }
}

impl From<RpcLogPayload> for LogPayload {
    fn from(payload: RpcLogPayload) -> Self {
        Self {
            name: payload.name,
            data: payload.data,
        }
    }
}

/// A call frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcRequest {
    pub seq: u64,
    pub method: String,
    #[serde(with = "serde_bytes")]
    pub params: Vec<u8>,
}

/// A reply frame. `error` is set when the call failed on the callee side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub seq: u64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    #[serde(with = "serde_bytes", default)]
    pub result: Vec<u8>,
}

/// Encodes a value with named `MsgPack` maps.
///
/// # Errors
///
/// Returns the serializer error if the value cannot be encoded.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, rmp_serde::encode::Error> {
    rmp_serde::to_vec_named(value)
}

/// Decodes a `MsgPack` value.
///
/// # Errors
///
/// Returns the deserializer error if the bytes do not match `T`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, rmp_serde::decode::Error> {
    rmp_serde::from_slice(bytes)
}
