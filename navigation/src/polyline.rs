use crate::models::Coordinate;

const PRECISION: f64 = 1e5;
const CHAR_OFFSET: u8 = 63;
const CONTINUATION_BIT: u32 = 0x20;
const GROUP_MASK: u32 = 0x1f;
/// Seven 5-bit groups cover the 32-bit range of an encoded delta.
const MAX_SHIFT: u32 = 30;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    #[error("polyline ends inside a chunk at byte {0}")]
    Truncated(usize),
    #[error("byte {byte:#04x} at position {position} is outside the polyline alphabet")]
    InvalidCharacter { position: usize, byte: u8 },
    #[error("chunk starting at byte {0} does not fit in 32 bits")]
    Overflow(usize),
}

/// Decode a Google encoded polyline (1e-5 degree precision, zig-zag deltas
/// packed into 5-bit groups offset by 63) into coordinates, in encoding order.
///
/// Fails rather than returning the points decoded so far: a truncated
/// string means the whole geometry is unusable.
pub fn decode(encoded: &str) -> Result<Vec<Coordinate>, DecodeError> {
    let bytes = encoded.as_bytes();
    let mut coords = Vec::with_capacity(bytes.len() / 4);
    let mut index = 0;
    let mut lat: i64 = 0;
    let mut lon: i64 = 0;

    while index < bytes.len() {
        let (dlat, next) = decode_chunk(bytes, index)?;
        if next >= bytes.len() {
            // Latitude without its longitude.
            return Err(DecodeError::Truncated(next));
        }
        let (dlon, next) = decode_chunk(bytes, next)?;
        index = next;

        lat += dlat;
        lon += dlon;
        coords.push(Coordinate {
            lat: lat as f64 / PRECISION,
            lon: lon as f64 / PRECISION,
        });
    }

    Ok(coords)
}

pub fn encode(coords: &[Coordinate]) -> String {
    let mut out = String::with_capacity(coords.len() * 8);
    let mut prev_lat: i64 = 0;
    let mut prev_lon: i64 = 0;

    for coord in coords {
        let lat = (coord.lat * PRECISION).round() as i64;
        let lon = (coord.lon * PRECISION).round() as i64;
        encode_value(lat - prev_lat, &mut out);
        encode_value(lon - prev_lon, &mut out);
        prev_lat = lat;
        prev_lon = lon;
    }

    out
}

fn decode_chunk(bytes: &[u8], start: usize) -> Result<(i64, usize), DecodeError> {
    let mut result: u64 = 0;
    let mut shift: u32 = 0;
    let mut index = start;

    loop {
        let Some(&byte) = bytes.get(index) else {
            return Err(DecodeError::Truncated(index));
        };
        if !(CHAR_OFFSET..=126).contains(&byte) {
            return Err(DecodeError::InvalidCharacter {
                position: index,
                byte,
            });
        }
        if shift > MAX_SHIFT {
            return Err(DecodeError::Overflow(start));
        }

        let group = u32::from(byte - CHAR_OFFSET);
        result |= u64::from(group & GROUP_MASK) << shift;
        if result > u64::from(u32::MAX) {
            return Err(DecodeError::Overflow(start));
        }
        shift += 5;
        index += 1;

        if group & CONTINUATION_BIT == 0 {
            break;
        }
    }

    let result = result as u32;
    let value = if result & 1 != 0 {
        !(result >> 1) as i32
    } else {
        (result >> 1) as i32
    };
    Ok((i64::from(value), index))
}

fn encode_value(delta: i64, out: &mut String) {
    let mut value = if delta < 0 {
        !(delta << 1) as u64
    } else {
        (delta << 1) as u64
    };

    while value >= u64::from(CONTINUATION_BIT) {
        let group = (u64::from(CONTINUATION_BIT) | (value & u64::from(GROUP_MASK))) as u8;
        out.push(char::from(group + CHAR_OFFSET));
        value >>= 5;
    }
    out.push(char::from(value as u8 + CHAR_OFFSET));
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANONICAL: &str = "_p~iF~ps|U_ulLnnqC_mqNvxq`@";

    fn assert_close(actual: Coordinate, lat: f64, lon: f64) {
        assert!(
            (actual.lat - lat).abs() < 1e-9 && (actual.lon - lon).abs() < 1e-9,
            "expected ({lat}, {lon}), got {actual:?}"
        );
    }

    #[test]
    fn decodes_canonical_vector() {
        let coords = decode(CANONICAL).unwrap();
        assert_eq!(coords.len(), 3);
        assert_close(coords[0], 38.5, -120.2);
        assert_close(coords[1], 40.7, -120.95);
        assert_close(coords[2], 43.252, -126.453);
    }

    #[test]
    fn encodes_canonical_vector() {
        let coords = [
            Coordinate::new(38.5, -120.2),
            Coordinate::new(40.7, -120.95),
            Coordinate::new(43.252, -126.453),
        ];
        assert_eq!(encode(&coords), CANONICAL);
    }

    #[test]
    fn empty_input_decodes_to_nothing() {
        assert_eq!(decode("").unwrap(), Vec::new());
        assert_eq!(encode(&[]), "");
    }

    #[test]
    fn truncated_chunk_is_rejected() {
        // "_p~iF" is a full latitude chunk; drop the tail of the longitude chunk.
        let err = decode("_p~iF~ps").unwrap_err();
        assert_eq!(err, DecodeError::Truncated(8));
    }

    #[test]
    fn latitude_without_longitude_is_rejected() {
        let err = decode("_p~iF").unwrap_err();
        assert_eq!(err, DecodeError::Truncated(5));
    }

    #[test]
    fn characters_below_offset_are_rejected() {
        let err = decode("_p~iF ps|U").unwrap_err();
        assert_eq!(
            err,
            DecodeError::InvalidCharacter {
                position: 5,
                byte: b' '
            }
        );
    }

    #[test]
    fn endless_continuation_is_rejected() {
        // '~' carries the continuation bit forever.
        let err = decode("~~~~~~~~~~").unwrap_err();
        assert_eq!(err, DecodeError::Overflow(0));
    }

    #[test]
    fn seventh_group_beyond_32_bits_is_rejected() {
        // Six full groups fill 30 bits; the last group may only add two more.
        let err = decode("~~~~~~^?").unwrap_err();
        assert_eq!(err, DecodeError::Overflow(0));
    }

    #[test]
    fn seventh_group_within_32_bits_decodes() {
        // 0xFFFF_FFFE zig-zags to i32::MAX.
        let coords = decode("}~~~~~B?").unwrap();
        assert_eq!(coords.len(), 1);
        assert_close(coords[0], f64::from(i32::MAX) / 1e5, 0.0);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn valid_coord() -> impl Strategy<Value = Coordinate> {
            (-90.0..=90.0, -180.0..=180.0).prop_map(|(lat, lon)| Coordinate { lat, lon })
        }

        proptest! {
            #[test]
            fn prop_round_trip_within_precision(
                coords in prop::collection::vec(valid_coord(), 0..32)
            ) {
                let decoded = decode(&encode(&coords)).unwrap();
                prop_assert_eq!(decoded.len(), coords.len());
                for (original, back) in coords.iter().zip(&decoded) {
                    prop_assert!((original.lat - back.lat).abs() <= 0.5e-5 + 1e-9);
                    prop_assert!((original.lon - back.lon).abs() <= 0.5e-5 + 1e-9);
                }
            }

            #[test]
            fn prop_prefix_decodes_only_on_point_boundaries(
                coords in prop::collection::vec(valid_coord(), 1..8),
                cut in 0usize..96
            ) {
                let encoded = encode(&coords);
                let cut = cut.min(encoded.len());
                // Deltas are relative, so encoding the first k points yields
                // exactly the first bytes of the full string.
                let boundary = (0..=coords.len()).find(|&k| encode(&coords[..k]).len() == cut);

                match (boundary, decode(&encoded[..cut])) {
                    (Some(k), Ok(points)) => {
                        prop_assert_eq!(points.len(), k);
                        prop_assert_eq!(points, decode(&encode(&coords[..k])).unwrap());
                    }
                    (None, Err(DecodeError::Truncated(at))) => prop_assert_eq!(at, cut),
                    (boundary, result) => {
                        prop_assert!(false, "cut {} (boundary {:?}) gave {:?}", cut, boundary, result);
                    }
                }
            }
        }
    }
}
