//! Chunked transfer framing
//!
//! A message body is split into chunks, each preceded by a u16 big-endian
//! payload size, and terminated by a zero-size chunk (`0x00 0x00`).

use super::constants::MAX_CHUNK_SIZE;
use bytes::{Buf, BufMut, BytesMut};

/// Append a message body to `out` in chunked form.
pub fn write_chunked(out: &mut BytesMut, body: &[u8]) {
    for chunk in body.chunks(MAX_CHUNK_SIZE) {
        out.put_u16(chunk.len() as u16);
        out.put_slice(chunk);
    }
    out.put_u16(0);
}

/// Try to extract one complete dechunked message body from `buf`.
///
/// Returns `None` when the buffer does not yet hold a full message; the
/// caller reads more from the transport and retries. On success the consumed
/// bytes are advanced out of `buf`.
pub fn try_read_message(buf: &mut BytesMut) -> Option<BytesMut> {
    // First pass: verify a full message is buffered without consuming
    let mut offset = 0;
    let mut body_len = 0;
    loop {
        if buf.len() < offset + 2 {
            return None;
        }
        let size = u16::from_be_bytes([buf[offset], buf[offset + 1]]) as usize;
        offset += 2;
        if size == 0 {
            break;
        }
        if buf.len() < offset + size {
            return None;
        }
        offset += size;
        body_len += size;
    }

    // Second pass: consume
    let mut body = BytesMut::with_capacity(body_len);
    loop {
        let size = u16::from_be_bytes([buf[0], buf[1]]) as usize;
        buf.advance(2);
        if size == 0 {
            return Some(body);
        }
        body.put_slice(&buf[..size]);
        buf.advance(size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_message_single_chunk() {
        let mut out = BytesMut::new();
        write_chunked(&mut out, &[0xB0, 0x12]);
        assert_eq!(&out[..], &[0x00, 0x02, 0xB0, 0x12, 0x00, 0x00]);
    }

    #[test]
    fn test_round_trip() {
        let body: Vec<u8> = (0..100u8).collect();
        let mut wire = BytesMut::new();
        write_chunked(&mut wire, &body);
        let got = try_read_message(&mut wire).unwrap();
        assert_eq!(&got[..], &body[..]);
        assert!(wire.is_empty());
    }

    #[test]
    fn test_large_message_spans_chunks() {
        let body = vec![0xAB; MAX_CHUNK_SIZE + 10];
        let mut wire = BytesMut::new();
        write_chunked(&mut wire, &body);
        // header + max chunk + header + remainder + terminator
        assert_eq!(wire.len(), 2 + MAX_CHUNK_SIZE + 2 + 10 + 2);
        let got = try_read_message(&mut wire).unwrap();
        assert_eq!(got.len(), body.len());
    }

    #[test]
    fn test_partial_message_returns_none() {
        let mut wire = BytesMut::new();
        write_chunked(&mut wire, &[1, 2, 3, 4]);

        // Withhold the final byte of the terminator
        let total = wire.len();
        let mut partial = BytesMut::from(&wire[..total - 1]);
        assert!(try_read_message(&mut partial).is_none());
        // Buffer is untouched on incomplete input
        assert_eq!(partial.len(), total - 1);

        // Full buffer decodes
        assert!(try_read_message(&mut wire).is_some());
    }

    #[test]
    fn test_two_messages_back_to_back() {
        let mut wire = BytesMut::new();
        write_chunked(&mut wire, &[0x01]);
        write_chunked(&mut wire, &[0x02, 0x03]);

        assert_eq!(&try_read_message(&mut wire).unwrap()[..], &[0x01]);
        assert_eq!(&try_read_message(&mut wire).unwrap()[..], &[0x02, 0x03]);
        assert!(try_read_message(&mut wire).is_none());
    }
}
