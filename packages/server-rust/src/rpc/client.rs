//! RPC client: dial a server, make calls over framed MessagePack, close.

use bytes::Bytes;
use futures_util::{SinkExt, StreamExt};
use relay_core::rpc::{self, RpcRequest, RpcResponse};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::net::TcpStream;
use tracing::debug;

use super::{framed, RpcError, RpcFramed};

/// One RPC connection. Calls on it are strictly sequential.
pub struct RpcClient {
    frames: RpcFramed,
    seq: u64,
}

impl RpcClient {
    /// Open a TCP connection to `addr` (`host:port`).
    ///
    /// # Errors
    ///
    /// `RpcError::Dial` if the connection cannot be established.
    pub async fn dial(addr: &str) -> Result<Self, RpcError> {
        let stream = TcpStream::connect(addr)
            .await
            .map_err(|source| RpcError::Dial {
                addr: addr.to_string(),
                source,
            })?;
        if let Err(err) = stream.set_nodelay(true) {
            debug!(addr, error = %err, "failed to disable nagle");
        }
        Ok(Self {
            frames: framed(stream),
            seq: 0,
        })
    }

    /// Invoke `method` with `params` and decode its result.
    ///
    /// # Errors
    ///
    /// I/O and codec failures, a closed connection, a mismatched reply, or
    /// `RpcError::Remote` when the callee reports an error.
    pub async fn call<P, R>(&mut self, method: &str, params: &P) -> Result<R, RpcError>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        self.seq += 1;
        let request = RpcRequest {
            seq: self.seq,
            method: method.to_string(),
            params: rpc::encode(params)?,
        };
        self.frames.send(Bytes::from(rpc::encode(&request)?)).await?;

        let frame = self.frames.next().await.ok_or(RpcError::Closed)??;
        let response: RpcResponse = rpc::decode(&frame)?;
        if response.seq != request.seq {
            return Err(RpcError::SequenceMismatch {
                expected: request.seq,
                got: response.seq,
            });
        }
        if let Some(message) = response.error {
            return Err(RpcError::Remote(message));
        }
        Ok(rpc::decode(&response.result)?)
    }

    /// Flush and shut down the connection.
    ///
    /// # Errors
    ///
    /// Returns the I/O error if the shutdown fails.
    pub async fn close(mut self) -> Result<(), RpcError> {
        SinkExt::<Bytes>::close(&mut self.frames).await?;
        Ok(())
    }
}
