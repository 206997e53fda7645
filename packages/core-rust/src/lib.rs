//! Relay core: action envelopes, dispatch outcomes, and the broker and RPC
//! wire contracts shared by the gateway, the listener, and the log RPC service.

pub mod action;
pub mod broker;
pub mod outcome;
pub mod rpc;

pub use action::{
    ActionEnvelope, ActionKind, ActionRequest, AuthPayload, EnvelopeError, LogPayload,
    MailPayload,
};
pub use broker::{Severity, LOGS_EXCHANGE};
pub use outcome::{FailureKind, JsonResponse, Outcome};
pub use rpc::{RpcLogPayload, RpcRequest, RpcResponse, LOG_INFO_METHOD};
