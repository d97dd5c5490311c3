//! PackStream decoding

use super::constants::{marker, request, response, MAX_COLLECTION_SIZE};
use super::message::{Request, Response, ServerError};
use crate::value::Value;
use crate::{Error, Result};
use std::collections::HashMap;

/// Decode a response message from a complete (dechunked) message body.
pub fn decode_response(body: &[u8]) -> Result<Response> {
    let (tag, fields) = decode_struct(body)?;
    match tag {
        response::SUCCESS => Ok(Response::Success(expect_map(fields, "SUCCESS")?)),
        response::RECORD => match fields.into_iter().next() {
            Some(Value::List(values)) => Ok(Response::Record(values)),
            other => Err(Error::Protocol(format!(
                "RECORD field must be a list, got {:?}",
                other.map(|v| v.kind().to_string())
            ))),
        },
        response::IGNORED => Ok(Response::Ignored),
        response::FAILURE => {
            let meta = expect_map(fields, "FAILURE")?;
            Ok(Response::Failure(ServerError::from_metadata(meta)))
        }
        other => Err(Error::Protocol(format!(
            "unknown response tag: 0x{:02X}",
            other
        ))),
    }
}

/// Decode a request message from a complete message body.
///
/// The driver never receives requests; this exists for in-process test
/// servers that need to interpret what the driver sent.
pub fn decode_request(body: &[u8]) -> Result<Request> {
    let (tag, mut fields) = decode_struct(body)?;
    match tag {
        request::HELLO => {
            let mut extra = expect_map(fields, "HELLO")?;
            let take = |m: &mut HashMap<String, Value>, k: &str| match m.remove(k) {
                Some(Value::String(s)) => Some(s),
                _ => None,
            };
            Ok(Request::Hello {
                user_agent: take(&mut extra, "user_agent").unwrap_or_default(),
                scheme: take(&mut extra, "scheme").unwrap_or_default(),
                principal: take(&mut extra, "principal"),
                credentials: take(&mut extra, "credentials"),
                realm: take(&mut extra, "realm"),
            })
        }
        request::GOODBYE => Ok(Request::Goodbye),
        request::RESET => Ok(Request::Reset),
        request::BEGIN => {
            let mut extra = expect_map(fields, "BEGIN")?;
            let database = match extra.remove("db") {
                Some(Value::String(s)) => Some(s),
                _ => None,
            };
            let bookmarks = match extra.remove("bookmarks") {
                Some(Value::List(items)) => items
                    .into_iter()
                    .filter_map(|v| match v {
                        Value::String(s) => Some(s),
                        _ => None,
                    })
                    .collect(),
                _ => Vec::new(),
            };
            Ok(Request::Begin {
                database,
                bookmarks,
            })
        }
        request::RUN => {
            if fields.len() != 3 {
                return Err(Error::Protocol(format!(
                    "RUN expects 3 fields, got {}",
                    fields.len()
                )));
            }
            let extra = match fields.pop() {
                Some(Value::Map(m)) => m,
                _ => return Err(Error::Protocol("RUN extra must be a map".into())),
            };
            let parameters = match fields.pop() {
                Some(Value::Map(m)) => m,
                _ => return Err(Error::Protocol("RUN parameters must be a map".into())),
            };
            let query = match fields.pop() {
                Some(Value::String(s)) => s,
                _ => return Err(Error::Protocol("RUN query must be a string".into())),
            };
            Ok(Request::Run {
                query,
                parameters,
                extra,
            })
        }
        request::PULL => Ok(Request::Pull {
            n: expect_n(fields, "PULL")?,
        }),
        request::DISCARD => Ok(Request::Discard {
            n: expect_n(fields, "DISCARD")?,
        }),
        request::COMMIT => Ok(Request::Commit),
        request::ROLLBACK => Ok(Request::Rollback),
        other => Err(Error::Protocol(format!(
            "unknown request tag: 0x{:02X}",
            other
        ))),
    }
}

fn expect_map(fields: Vec<Value>, context: &str) -> Result<HashMap<String, Value>> {
    match fields.into_iter().next() {
        Some(Value::Map(m)) => Ok(m),
        None => Ok(HashMap::new()),
        Some(other) => Err(Error::Protocol(format!(
            "{} field must be a map, got {}",
            context,
            other.kind()
        ))),
    }
}

fn expect_n(fields: Vec<Value>, context: &str) -> Result<i64> {
    let mut meta = expect_map(fields, context)?;
    match meta.remove("n") {
        Some(Value::Integer(n)) => Ok(n),
        _ => Err(Error::Protocol(format!("{} requires integer 'n'", context))),
    }
}

/// Decode a structure header + fields, requiring the body to be fully
/// consumed.
fn decode_struct(body: &[u8]) -> Result<(u8, Vec<Value>)> {
    if body.len() < 2 {
        return Err(Error::Protocol("message body too short".into()));
    }
    let header = body[0];
    if header & 0xF0 != marker::TINY_STRUCT {
        return Err(Error::Protocol(format!(
            "expected structure marker, got 0x{:02X}",
            header
        )));
    }
    let n_fields = (header & 0x0F) as usize;
    let tag = body[1];

    let mut fields = Vec::with_capacity(n_fields);
    let mut offset = 2;
    for _ in 0..n_fields {
        let (value, consumed) = decode_value(&body[offset..])?;
        fields.push(value);
        offset += consumed;
    }
    if offset != body.len() {
        return Err(Error::Protocol(format!(
            "{} trailing bytes after message",
            body.len() - offset
        )));
    }
    Ok((tag, fields))
}

/// Decode a single value, returning it and the number of bytes consumed.
pub fn decode_value(data: &[u8]) -> Result<(Value, usize)> {
    let m = *data
        .first()
        .ok_or_else(|| Error::Protocol("empty value".into()))?;

    // Tiny types carry their size in the marker byte
    match m {
        0x00..=0x7F => return Ok((Value::Integer(m as i64), 1)),
        0xF0..=0xFF => return Ok((Value::Integer(m as i8 as i64), 1)),
        _ => {}
    }
    match m & 0xF0 {
        marker::TINY_STRING => return decode_string_payload(data, 1, (m & 0x0F) as usize),
        marker::TINY_LIST => return decode_list_items(data, 1, (m & 0x0F) as usize),
        marker::TINY_MAP => return decode_map_entries(data, 1, (m & 0x0F) as usize),
        _ => {}
    }

    match m {
        marker::NULL => Ok((Value::Null, 1)),
        marker::FALSE => Ok((Value::Bool(false), 1)),
        marker::TRUE => Ok((Value::Bool(true), 1)),
        marker::FLOAT => {
            let raw = take(data, 1, 8)?;
            let bits = u64::from_be_bytes(raw.try_into().expect("8-byte slice"));
            Ok((Value::Float(f64::from_bits(bits)), 9))
        }
        marker::INT_8 => {
            let raw = take(data, 1, 1)?;
            Ok((Value::Integer(raw[0] as i8 as i64), 2))
        }
        marker::INT_16 => {
            let raw = take(data, 1, 2)?;
            Ok((
                Value::Integer(i16::from_be_bytes([raw[0], raw[1]]) as i64),
                3,
            ))
        }
        marker::INT_32 => {
            let raw = take(data, 1, 4)?;
            Ok((
                Value::Integer(i32::from_be_bytes([raw[0], raw[1], raw[2], raw[3]]) as i64),
                5,
            ))
        }
        marker::INT_64 => {
            let raw = take(data, 1, 8)?;
            Ok((
                Value::Integer(i64::from_be_bytes(raw.try_into().expect("8-byte slice"))),
                9,
            ))
        }
        marker::STRING_8 => {
            let len = take(data, 1, 1)?[0] as usize;
            decode_string_payload(data, 2, len)
        }
        marker::STRING_16 => {
            let raw = take(data, 1, 2)?;
            decode_string_payload(data, 3, u16::from_be_bytes([raw[0], raw[1]]) as usize)
        }
        marker::STRING_32 => {
            let len = checked_len(take(data, 1, 4)?)?;
            decode_string_payload(data, 5, len)
        }
        marker::BYTES_8 => {
            let len = take(data, 1, 1)?[0] as usize;
            decode_bytes_payload(data, 2, len)
        }
        marker::BYTES_16 => {
            let raw = take(data, 1, 2)?;
            decode_bytes_payload(data, 3, u16::from_be_bytes([raw[0], raw[1]]) as usize)
        }
        marker::BYTES_32 => {
            let len = checked_len(take(data, 1, 4)?)?;
            decode_bytes_payload(data, 5, len)
        }
        marker::LIST_8 => {
            let len = take(data, 1, 1)?[0] as usize;
            decode_list_items(data, 2, len)
        }
        marker::LIST_16 => {
            let raw = take(data, 1, 2)?;
            decode_list_items(data, 3, u16::from_be_bytes([raw[0], raw[1]]) as usize)
        }
        marker::LIST_32 => {
            let len = checked_len(take(data, 1, 4)?)?;
            decode_list_items(data, 5, len)
        }
        marker::MAP_8 => {
            let len = take(data, 1, 1)?[0] as usize;
            decode_map_entries(data, 2, len)
        }
        marker::MAP_16 => {
            let raw = take(data, 1, 2)?;
            decode_map_entries(data, 3, u16::from_be_bytes([raw[0], raw[1]]) as usize)
        }
        marker::MAP_32 => {
            let len = checked_len(take(data, 1, 4)?)?;
            decode_map_entries(data, 5, len)
        }
        other => Err(Error::Protocol(format!(
            "unsupported value marker: 0x{:02X}",
            other
        ))),
    }
}

fn take(data: &[u8], offset: usize, len: usize) -> Result<&[u8]> {
    data.get(offset..offset + len)
        .ok_or_else(|| Error::Protocol("truncated value".into()))
}

/// Reject length headers too large to be a legitimate payload before
/// allocating for them.
fn checked_len(raw: &[u8]) -> Result<usize> {
    let len = u32::from_be_bytes(raw.try_into().expect("4-byte slice")) as usize;
    if len > MAX_COLLECTION_SIZE {
        return Err(Error::Protocol(format!(
            "declared size {} exceeds maximum {}",
            len, MAX_COLLECTION_SIZE
        )));
    }
    Ok(len)
}

fn decode_string_payload(data: &[u8], offset: usize, len: usize) -> Result<(Value, usize)> {
    let raw = take(data, offset, len)?;
    let s = std::str::from_utf8(raw)
        .map_err(|e| Error::Protocol(format!("invalid UTF-8 in string: {}", e)))?;
    Ok((Value::String(s.to_string()), offset + len))
}

fn decode_bytes_payload(data: &[u8], offset: usize, len: usize) -> Result<(Value, usize)> {
    let raw = take(data, offset, len)?;
    Ok((Value::Bytes(raw.to_vec()), offset + len))
}

fn decode_list_items(data: &[u8], offset: usize, len: usize) -> Result<(Value, usize)> {
    let mut items = Vec::with_capacity(len.min(1024));
    let mut pos = offset;
    for _ in 0..len {
        let (value, consumed) = decode_value(&data[pos..])?;
        items.push(value);
        pos += consumed;
    }
    Ok((Value::List(items), pos))
}

fn decode_map_entries(data: &[u8], offset: usize, len: usize) -> Result<(Value, usize)> {
    let mut entries = HashMap::with_capacity(len.min(1024));
    let mut pos = offset;
    for _ in 0..len {
        let (key, consumed) = decode_value(&data[pos..])?;
        pos += consumed;
        let Value::String(key) = key else {
            return Err(Error::Protocol(format!(
                "map key must be a string, got {}",
                key.kind()
            )));
        };
        let (value, consumed) = decode_value(&data[pos..])?;
        pos += consumed;
        entries.insert(key, value);
    }
    Ok((Value::Map(entries), pos))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::encode::{encode_request, encode_response, encode_value};
    use bytes::BytesMut;

    #[test]
    fn test_decode_empty_tiny_map() {
        let (value, consumed) = decode_value(&[0xA0]).unwrap();
        assert_eq!(value, Value::Map(HashMap::new()));
        assert_eq!(consumed, 1);
    }

    #[test]
    fn test_decode_tiny_int() {
        let (value, consumed) = decode_value(&[0x0A]).unwrap();
        assert_eq!(value, Value::Integer(10));
        assert_eq!(consumed, 1);

        let (value, _) = decode_value(&[0x69]).unwrap();
        assert_eq!(value, Value::Integer(105));

        // 0x81 is a tiny string marker, not an int
        let (value, _) = decode_value(&[0x81, b'x']).unwrap();
        assert_eq!(value, Value::String("x".into()));
    }

    #[test]
    fn test_decode_sized_ints() {
        let cases: &[(&[u8], i64, usize)] = &[
            (&[0xC8, 0x45], 69, 2),
            (&[0xC8, 0xBB], -69, 2),
            (&[0xC9, 0xFA, 0xC7], -1337, 3),
            (&[0xC9, 0x14, 0x08], 5128, 3),
            (&[0xCA, 0x6B, 0x4B, 0xB4, 0x40], 1_800_123_456, 5),
            (&[0xCA, 0xFF, 0xFE, 0x1D, 0xC0], -123_456, 5),
            (
                &[0xCB, 0xFF, 0xFF, 0xA5, 0x0C, 0xEF, 0x85, 0xC0, 0x01],
                -99_999_999_999_999,
                9,
            ),
            (
                &[0xCB, 0x00, 0x00, 0x5A, 0xF3, 0x10, 0x7A, 0x3F, 0xFF],
                99_999_999_999_999,
                9,
            ),
        ];
        for (buf, expected, size) in cases {
            let (value, consumed) = decode_value(buf).unwrap();
            assert_eq!(value, Value::Integer(*expected));
            assert_eq!(consumed, *size);
        }
    }

    #[test]
    fn test_decode_tiny_string_with_trailing_noise() {
        let buf = [0x87, b'a', b'd', b'd', b'r', b'e', b's', b's', 0xFF, 0xFF];
        let (value, consumed) = decode_value(&buf).unwrap();
        assert_eq!(value, Value::String("address".into()));
        assert_eq!(consumed, "address".len() + 1);

        let (value, consumed) = decode_value(&[0x80]).unwrap();
        assert_eq!(value, Value::String(String::new()));
        assert_eq!(consumed, 1);
    }

    #[test]
    fn test_decode_truncated_value_fails() {
        assert!(decode_value(&[0xC9, 0x00]).is_err());
        assert!(decode_value(&[0x87, b'a']).is_err());
        assert!(decode_value(&[]).is_err());
    }

    #[test]
    fn test_decode_rejects_oversized_declared_length() {
        let mut buf = vec![marker::STRING_32];
        buf.extend_from_slice(&(u32::MAX).to_be_bytes());
        let err = decode_value(&buf).unwrap_err();
        assert!(err.to_string().contains("exceeds maximum"));
    }

    #[test]
    fn test_value_round_trips_through_encoder() {
        let mut map = HashMap::new();
        map.insert("list".to_string(), Value::List(vec![Value::Bool(true)]));
        map.insert("pi".to_string(), Value::Float(3.5));
        let original = Value::Map(map);

        let mut buf = BytesMut::new();
        encode_value(&mut buf, &original);
        let (decoded, consumed) = decode_value(&buf).unwrap();
        assert_eq!(decoded, original);
        assert_eq!(consumed, buf.len());
    }

    #[test]
    fn test_request_round_trip() {
        let msg = Request::Run {
            query: "return $n".into(),
            parameters: [("n".to_string(), Value::Integer(1))].into(),
            extra: [("db".to_string(), Value::String("graph".into()))].into(),
        };
        let buf = encode_request(&msg);
        let decoded = decode_request(&buf).unwrap();
        let Request::Run {
            query, parameters, ..
        } = decoded
        else {
            panic!("expected RUN");
        };
        assert_eq!(query, "return $n");
        assert_eq!(parameters["n"], Value::Integer(1));
    }

    #[test]
    fn test_failure_response_round_trip() {
        let msg = Response::Failure(ServerError {
            code: "Neo.ClientError.Statement.SyntaxError".into(),
            message: "bad input".into(),
        });
        let buf = encode_response(&msg);
        let Response::Failure(err) = decode_response(&buf).unwrap() else {
            panic!("expected FAILURE");
        };
        assert_eq!(err.code, "Neo.ClientError.Statement.SyntaxError");
        assert_eq!(err.message, "bad input");
    }

    #[test]
    fn test_trailing_bytes_after_message_rejected() {
        let mut buf = encode_request(&Request::Commit).to_vec();
        buf.push(0x00);
        assert!(decode_request(&buf).is_err());
    }
}
