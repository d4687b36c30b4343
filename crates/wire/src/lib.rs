// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker protocol for bridge communication.
//!
//! Wire format: newline-delimited JSON-RPC 2.0 over stdio, UTF-8.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod method;
mod params;
mod record;
mod rpc;

pub use method::Method;
pub use params::{HealthResult, IngestMode, IngestParams, IngestOutcome, RetrieveParams};
pub use record::{
    ConfidenceLabel, DateValue, RecordStatus, RetrievalRecord, RetrieveResponse,
};
pub use rpc::{decode_line, encode_line, ProtocolError, RequestId, RpcError, RpcRequest, RpcResponse};
