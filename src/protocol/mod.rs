//! Bolt wire protocol: message types, PackStream codec, chunked framing

pub mod chunk;
pub mod constants;
pub mod decode;
pub mod encode;
pub mod message;

pub use chunk::{try_read_message, write_chunked};
pub use decode::{decode_request, decode_response, decode_value};
pub use encode::{encode_request, encode_response, encode_value};
pub use message::{Request, Response, ServerError};
