//! Bolt protocol constants

/// Handshake preamble sent before version proposals
pub const HANDSHAKE_MAGIC: [u8; 4] = [0x60, 0x60, 0xB0, 0x17];

/// Protocol versions proposed during the handshake, most preferred first.
/// Each is encoded on the wire as `[0, 0, minor, major]`.
pub const PROPOSED_VERSIONS: [(u8, u8); 4] = [(4, 4), (4, 3), (4, 2), (4, 1)];

/// Maximum payload of a single transfer chunk (u16 length header)
pub const MAX_CHUNK_SIZE: usize = 0xFFFF;

/// Maximum decoded collection size accepted before allocation, to reject
/// crafted length headers without exhausting memory
pub const MAX_COLLECTION_SIZE: usize = 16 * 1024 * 1024;

/// Request message structure tags
pub mod request {
    /// HELLO: authenticate and identify the client
    pub const HELLO: u8 = 0x01;

    /// GOODBYE: orderly connection shutdown
    pub const GOODBYE: u8 = 0x02;

    /// RESET: return the server side to a clean state
    pub const RESET: u8 = 0x0F;

    /// RUN: submit a query with parameters
    pub const RUN: u8 = 0x10;

    /// BEGIN: open an explicit transaction
    pub const BEGIN: u8 = 0x11;

    /// COMMIT: commit the open transaction
    pub const COMMIT: u8 = 0x12;

    /// ROLLBACK: roll back the open transaction
    pub const ROLLBACK: u8 = 0x13;

    /// DISCARD: drop remaining records of the current result
    pub const DISCARD: u8 = 0x2F;

    /// PULL: request a batch of records from the current result
    pub const PULL: u8 = 0x3F;
}

/// Response message structure tags
pub mod response {
    /// SUCCESS: request accepted, with metadata
    pub const SUCCESS: u8 = 0x70;

    /// RECORD: one row of query output
    pub const RECORD: u8 = 0x71;

    /// IGNORED: request skipped because the server is in a failed state
    pub const IGNORED: u8 = 0x7E;

    /// FAILURE: request rejected, with code and message
    pub const FAILURE: u8 = 0x7F;
}

/// PackStream value markers
pub mod marker {
    /// Null
    pub const NULL: u8 = 0xC0;
    /// 64-bit float, big-endian payload
    pub const FLOAT: u8 = 0xC1;
    /// Boolean false
    pub const FALSE: u8 = 0xC2;
    /// Boolean true
    pub const TRUE: u8 = 0xC3;

    /// Integer with 8-bit payload
    pub const INT_8: u8 = 0xC8;
    /// Integer with 16-bit payload
    pub const INT_16: u8 = 0xC9;
    /// Integer with 32-bit payload
    pub const INT_32: u8 = 0xCA;
    /// Integer with 64-bit payload
    pub const INT_64: u8 = 0xCB;

    /// Byte array with 8-bit length
    pub const BYTES_8: u8 = 0xCC;
    /// Byte array with 16-bit length
    pub const BYTES_16: u8 = 0xCD;
    /// Byte array with 32-bit length
    pub const BYTES_32: u8 = 0xCE;

    /// String of up to 15 bytes, length in the low nibble
    pub const TINY_STRING: u8 = 0x80;
    /// String with 8-bit length
    pub const STRING_8: u8 = 0xD0;
    /// String with 16-bit length
    pub const STRING_16: u8 = 0xD1;
    /// String with 32-bit length
    pub const STRING_32: u8 = 0xD2;

    /// List of up to 15 items, length in the low nibble
    pub const TINY_LIST: u8 = 0x90;
    /// List with 8-bit length
    pub const LIST_8: u8 = 0xD4;
    /// List with 16-bit length
    pub const LIST_16: u8 = 0xD5;
    /// List with 32-bit length
    pub const LIST_32: u8 = 0xD6;

    /// Map of up to 15 entries, length in the low nibble
    pub const TINY_MAP: u8 = 0xA0;
    /// Map with 8-bit length
    pub const MAP_8: u8 = 0xD8;
    /// Map with 16-bit length
    pub const MAP_16: u8 = 0xD9;
    /// Map with 32-bit length
    pub const MAP_32: u8 = 0xDA;

    /// Structure of up to 15 fields, length in the low nibble, tag follows
    pub const TINY_STRUCT: u8 = 0xB0;
}
