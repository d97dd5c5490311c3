//! PackStream encoding

use super::constants::marker;
use super::message::{Request, Response};
use crate::value::Value;
use bytes::{BufMut, BytesMut};
use std::collections::HashMap;

/// Encode a request message into an unchunked message body.
///
/// A message is a PackStream structure: marker byte with the field count in
/// the low nibble, a tag byte, then the fields.
pub fn encode_request(msg: &Request) -> BytesMut {
    use super::constants::request as tag;

    let mut buf = BytesMut::new();
    match msg {
        Request::Hello {
            user_agent,
            scheme,
            principal,
            credentials,
            realm,
        } => {
            put_struct_header(&mut buf, 1, tag::HELLO);
            let mut extra: Vec<(&str, Value)> = vec![
                ("user_agent", Value::String(user_agent.clone())),
                ("scheme", Value::String(scheme.clone())),
            ];
            if let Some(p) = principal {
                extra.push(("principal", Value::String(p.clone())));
            }
            if let Some(c) = credentials {
                extra.push(("credentials", Value::String(c.clone())));
            }
            if let Some(r) = realm {
                extra.push(("realm", Value::String(r.clone())));
            }
            put_map_header(&mut buf, extra.len());
            for (key, value) in extra {
                encode_string(&mut buf, key);
                encode_value(&mut buf, &value);
            }
        }
        Request::Goodbye => put_struct_header(&mut buf, 0, tag::GOODBYE),
        Request::Reset => put_struct_header(&mut buf, 0, tag::RESET),
        Request::Begin {
            database,
            bookmarks,
        } => {
            put_struct_header(&mut buf, 1, tag::BEGIN);
            let mut extra: Vec<(&str, Value)> = Vec::new();
            if let Some(db) = database {
                extra.push(("db", Value::String(db.clone())));
            }
            if !bookmarks.is_empty() {
                extra.push((
                    "bookmarks",
                    Value::List(bookmarks.iter().cloned().map(Value::String).collect()),
                ));
            }
            put_map_header(&mut buf, extra.len());
            for (key, value) in extra {
                encode_string(&mut buf, key);
                encode_value(&mut buf, &value);
            }
        }
        Request::Run {
            query,
            parameters,
            extra,
        } => {
            put_struct_header(&mut buf, 3, tag::RUN);
            encode_string(&mut buf, query);
            put_map_header(&mut buf, parameters.len());
            for (key, value) in parameters {
                encode_string(&mut buf, key);
                encode_value(&mut buf, value);
            }
            put_map_header(&mut buf, extra.len());
            for (key, value) in extra {
                encode_string(&mut buf, key);
                encode_value(&mut buf, value);
            }
        }
        Request::Pull { n } => {
            put_struct_header(&mut buf, 1, tag::PULL);
            put_map_header(&mut buf, 1);
            encode_string(&mut buf, "n");
            encode_integer(&mut buf, *n);
        }
        Request::Discard { n } => {
            put_struct_header(&mut buf, 1, tag::DISCARD);
            put_map_header(&mut buf, 1);
            encode_string(&mut buf, "n");
            encode_integer(&mut buf, *n);
        }
        Request::Commit => put_struct_header(&mut buf, 0, tag::COMMIT),
        Request::Rollback => put_struct_header(&mut buf, 0, tag::ROLLBACK),
    }
    buf
}

/// Encode a response message into an unchunked message body.
///
/// Used by in-process test servers; the driver itself only decodes responses.
pub fn encode_response(msg: &Response) -> BytesMut {
    use super::constants::response as tag;

    let mut buf = BytesMut::new();
    match msg {
        Response::Success(meta) => {
            put_struct_header(&mut buf, 1, tag::SUCCESS);
            encode_map(&mut buf, meta);
        }
        Response::Record(values) => {
            put_struct_header(&mut buf, 1, tag::RECORD);
            put_list_header(&mut buf, values.len());
            for value in values {
                encode_value(&mut buf, value);
            }
        }
        Response::Ignored => {
            put_struct_header(&mut buf, 1, tag::IGNORED);
            put_map_header(&mut buf, 0);
        }
        Response::Failure(err) => {
            put_struct_header(&mut buf, 1, tag::FAILURE);
            put_map_header(&mut buf, 2);
            encode_string(&mut buf, "code");
            encode_string(&mut buf, &err.code);
            encode_string(&mut buf, "message");
            encode_string(&mut buf, &err.message);
        }
    }
    buf
}

/// Encode a single value
pub fn encode_value(buf: &mut BytesMut, value: &Value) {
    match value {
        Value::Null => buf.put_u8(marker::NULL),
        Value::Bool(false) => buf.put_u8(marker::FALSE),
        Value::Bool(true) => buf.put_u8(marker::TRUE),
        Value::Integer(i) => encode_integer(buf, *i),
        Value::Float(f) => {
            buf.put_u8(marker::FLOAT);
            buf.put_f64(*f);
        }
        Value::String(s) => encode_string(buf, s),
        Value::Bytes(b) => encode_bytes(buf, b),
        Value::List(items) => {
            put_list_header(buf, items.len());
            for item in items {
                encode_value(buf, item);
            }
        }
        Value::Map(entries) => encode_map(buf, entries),
    }
}

fn encode_map(buf: &mut BytesMut, entries: &HashMap<String, Value>) {
    put_map_header(buf, entries.len());
    for (key, value) in entries {
        encode_string(buf, key);
        encode_value(buf, value);
    }
}

fn encode_integer(buf: &mut BytesMut, i: i64) {
    match i {
        -16..=127 => buf.put_i8(i as i8),
        -128..=-17 => {
            buf.put_u8(marker::INT_8);
            buf.put_i8(i as i8);
        }
        -32_768..=32_767 => {
            buf.put_u8(marker::INT_16);
            buf.put_i16(i as i16);
        }
        -2_147_483_648..=2_147_483_647 => {
            buf.put_u8(marker::INT_32);
            buf.put_i32(i as i32);
        }
        _ => {
            buf.put_u8(marker::INT_64);
            buf.put_i64(i);
        }
    }
}

fn encode_string(buf: &mut BytesMut, s: &str) {
    let bytes = s.as_bytes();
    match bytes.len() {
        0..=15 => buf.put_u8(marker::TINY_STRING | bytes.len() as u8),
        16..=255 => {
            buf.put_u8(marker::STRING_8);
            buf.put_u8(bytes.len() as u8);
        }
        256..=65_535 => {
            buf.put_u8(marker::STRING_16);
            buf.put_u16(bytes.len() as u16);
        }
        _ => {
            buf.put_u8(marker::STRING_32);
            buf.put_u32(bytes.len() as u32);
        }
    }
    buf.put_slice(bytes);
}

fn encode_bytes(buf: &mut BytesMut, b: &[u8]) {
    match b.len() {
        0..=255 => {
            buf.put_u8(marker::BYTES_8);
            buf.put_u8(b.len() as u8);
        }
        256..=65_535 => {
            buf.put_u8(marker::BYTES_16);
            buf.put_u16(b.len() as u16);
        }
        _ => {
            buf.put_u8(marker::BYTES_32);
            buf.put_u32(b.len() as u32);
        }
    }
    buf.put_slice(b);
}

fn put_list_header(buf: &mut BytesMut, len: usize) {
    match len {
        0..=15 => buf.put_u8(marker::TINY_LIST | len as u8),
        16..=255 => {
            buf.put_u8(marker::LIST_8);
            buf.put_u8(len as u8);
        }
        256..=65_535 => {
            buf.put_u8(marker::LIST_16);
            buf.put_u16(len as u16);
        }
        _ => {
            buf.put_u8(marker::LIST_32);
            buf.put_u32(len as u32);
        }
    }
}

fn put_map_header(buf: &mut BytesMut, len: usize) {
    match len {
        0..=15 => buf.put_u8(marker::TINY_MAP | len as u8),
        16..=255 => {
            buf.put_u8(marker::MAP_8);
            buf.put_u8(len as u8);
        }
        256..=65_535 => {
            buf.put_u8(marker::MAP_16);
            buf.put_u16(len as u16);
        }
        _ => {
            buf.put_u8(marker::MAP_32);
            buf.put_u32(len as u32);
        }
    }
}

fn put_struct_header(buf: &mut BytesMut, n_fields: u8, tag: u8) {
    buf.put_u8(marker::TINY_STRUCT | n_fields);
    buf.put_u8(tag);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_tiny_int() {
        let mut buf = BytesMut::new();
        encode_integer(&mut buf, 10);
        assert_eq!(&buf[..], &[0x0A]);

        let mut buf = BytesMut::new();
        encode_integer(&mut buf, -1);
        assert_eq!(&buf[..], &[0xFF]);
    }

    #[test]
    fn test_encode_sized_ints() {
        let mut buf = BytesMut::new();
        encode_integer(&mut buf, 69);
        assert_eq!(&buf[..], &[0x45]);

        let mut buf = BytesMut::new();
        encode_integer(&mut buf, -69);
        assert_eq!(&buf[..], &[0xC8, 0xBB]);

        let mut buf = BytesMut::new();
        encode_integer(&mut buf, -1337);
        assert_eq!(&buf[..], &[0xC9, 0xFA, 0xC7]);

        let mut buf = BytesMut::new();
        encode_integer(&mut buf, 1_800_123_456);
        assert_eq!(&buf[..], &[0xCA, 0x6B, 0x4B, 0xB4, 0x40]);

        let mut buf = BytesMut::new();
        encode_integer(&mut buf, 99_999_999_999_999);
        assert_eq!(
            &buf[..],
            &[0xCB, 0x00, 0x00, 0x5A, 0xF3, 0x10, 0x7A, 0x3F, 0xFF]
        );
    }

    #[test]
    fn test_encode_tiny_string() {
        let mut buf = BytesMut::new();
        encode_string(&mut buf, "address");
        assert_eq!(buf[0], 0x87);
        assert_eq!(&buf[1..], b"address");
    }

    #[test]
    fn test_encode_empty_map_value() {
        let mut buf = BytesMut::new();
        encode_value(&mut buf, &Value::Map(Default::default()));
        assert_eq!(&buf[..], &[0xA0]);
    }

    #[test]
    fn test_encode_commit_is_bare_struct() {
        let buf = encode_request(&Request::Commit);
        assert_eq!(&buf[..], &[0xB0, 0x12]);
    }

    #[test]
    fn test_encode_run_shape() {
        let buf = encode_request(&Request::Run {
            query: "return 1".into(),
            parameters: Default::default(),
            extra: Default::default(),
        });
        // struct(3) RUN, tiny string of 8, "return 1", empty map, empty map
        assert_eq!(buf[0], 0xB3);
        assert_eq!(buf[1], 0x10);
        assert_eq!(buf[2], 0x88);
        assert_eq!(&buf[3..11], b"return 1");
        assert_eq!(buf[11], 0xA0);
        assert_eq!(buf[12], 0xA0);
    }
}
