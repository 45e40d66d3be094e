//! Binary frames for the method channel.
//!
//! Frames are `MsgPack` maps (`rmp_serde::to_vec_named()`). A call frame is
//! `{method, arguments}`; a result frame is internally tagged on `status`:
//! `{status: "success", result}` or
//! `{status: "error", code, message, details}`.

use bytes::Bytes;
use rmpv::Value;
use serde::{Deserialize, Serialize};

use super::handler::{ChannelError, MethodCall, MethodResult};

/// Errors from encoding or decoding a frame.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("frame encoding failed: {0}")]
    Encode(#[from] rmp_serde::encode::Error),
    #[error("frame decoding failed: {0}")]
    Decode(#[from] rmp_serde::decode::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum ResultFrame {
    Success {
        result: Value,
    },
    Error {
        code: String,
        message: String,
        #[serde(default)]
        details: Option<Value>,
    },
}

impl From<&MethodResult> for ResultFrame {
    fn from(result: &MethodResult) -> Self {
        match result {
            Ok(value) => Self::Success {
                result: value.clone(),
            },
            Err(err) => Self::Error {
                code: err.code.clone(),
                message: err.message.clone(),
                details: err.details.clone(),
            },
        }
    }
}

impl From<ResultFrame> for MethodResult {
    fn from(frame: ResultFrame) -> Self {
        match frame {
            ResultFrame::Success { result } => Ok(result),
            ResultFrame::Error {
                code,
                message,
                details,
            } => Err(ChannelError {
                code,
                message,
                details,
            }),
        }
    }
}

/// # Errors
///
/// Returns `CodecError::Encode` if serialization fails.
pub fn encode_call(call: &MethodCall) -> Result<Bytes, CodecError> {
    Ok(Bytes::from(rmp_serde::to_vec_named(call)?))
}

/// # Errors
///
/// Returns `CodecError::Decode` if the bytes are not a call frame.
pub fn decode_call(bytes: &[u8]) -> Result<MethodCall, CodecError> {
    Ok(rmp_serde::from_slice(bytes)?)
}

/// # Errors
///
/// Returns `CodecError::Encode` if serialization fails.
pub fn encode_result(result: &MethodResult) -> Result<Bytes, CodecError> {
    Ok(Bytes::from(rmp_serde::to_vec_named(&ResultFrame::from(result))?))
}

/// # Errors
///
/// Returns `CodecError::Decode` if the bytes are not a result frame.
pub fn decode_result(bytes: &[u8]) -> Result<MethodResult, CodecError> {
    let frame: ResultFrame = rmp_serde::from_slice(bytes)?;
    Ok(frame.into())
}
