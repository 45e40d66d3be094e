//! The `service_table` method channel: call/result types, the handler, and
//! the binary frame codec.

pub mod codec;
pub mod handler;

pub use codec::{decode_call, decode_result, encode_call, encode_result, CodecError};
pub use handler::{ChannelError, MethodCall, MethodResult, ServiceTableChannel};
