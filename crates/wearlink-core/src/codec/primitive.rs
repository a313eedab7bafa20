// ── Fixed-width primitive encodings ──
//
// Status scalars skip JSON to keep payloads small on the wireless link.
// Integers are big-endian. A payload of the wrong width decodes to `None`.

use bytes::{Buf, BufMut, Bytes, BytesMut};

pub fn encode_bool(value: bool) -> Bytes {
    Bytes::copy_from_slice(&[u8::from(value)])
}

pub fn decode_bool(bytes: &[u8]) -> Option<bool> {
    match bytes {
        [0] => Some(false),
        [1] => Some(true),
        _ => None,
    }
}

pub fn encode_i32(value: i32) -> Bytes {
    let mut buf = BytesMut::with_capacity(4);
    buf.put_i32(value);
    buf.freeze()
}

pub fn decode_i32(mut bytes: &[u8]) -> Option<i32> {
    (bytes.len() == 4).then(|| bytes.get_i32())
}

pub fn encode_i64(value: i64) -> Bytes {
    let mut buf = BytesMut::with_capacity(8);
    buf.put_i64(value);
    buf.freeze()
}

pub fn decode_i64(mut bytes: &[u8]) -> Option<i64> {
    (bytes.len() == 8).then(|| bytes.get_i64())
}

pub fn encode_string(value: &str) -> Bytes {
    Bytes::copy_from_slice(value.as_bytes())
}

pub fn decode_string(bytes: &[u8]) -> Option<String> {
    std::str::from_utf8(bytes).ok().map(str::to_owned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_are_big_endian() {
        assert_eq!(encode_i32(1).as_ref(), &[0, 0, 0, 1]);
        assert_eq!(encode_i64(-1).as_ref(), &[0xff; 8]);
    }

    #[test]
    fn primitives_round_trip_at_the_edges() {
        for v in [i32::MIN, -1, 0, 1, i32::MAX] {
            assert_eq!(decode_i32(&encode_i32(v)), Some(v));
        }
        for v in [i64::MIN, -1, 0, 1, i64::MAX] {
            assert_eq!(decode_i64(&encode_i64(v)), Some(v));
        }
        assert_eq!(decode_bool(&encode_bool(true)), Some(true));
        assert_eq!(decode_bool(&encode_bool(false)), Some(false));
        assert_eq!(decode_string(&encode_string("Pixel 8")).as_deref(), Some("Pixel 8"));
    }

    #[test]
    fn wrong_width_is_rejected() {
        assert_eq!(decode_i32(&[0, 1]), None);
        assert_eq!(decode_i64(&encode_i32(7)), None);
        assert_eq!(decode_bool(&[]), None);
        assert_eq!(decode_bool(&[2]), None);
        assert_eq!(decode_string(&[0xff, 0xfe]), None);
    }
}
