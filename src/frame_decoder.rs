//! Decoding (and, for test and simulation purposes, encoding) of the
//! headset's wire format.
//!
//! A datagram is a flat run of records, optionally prefixed once by the
//! literal marker `#bundle:`. Each record starts with a four-byte header:
//!
//! | offset | size | field |
//! |---|---|---|
//! | 0 | 1 | kind: 1 = raw, 2 = alpha, 3 = valence |
//! | 1 | 1 | channel index (0–7), unused for valence |
//! | 2 | 2 | payload element count, little-endian |
//!
//! A raw payload is `count` signed 32-bit little-endian integers, one per
//! electrode reading. Alpha and valence payloads are always two such
//! integers (value, long-term average); their header count field is ignored,
//! matching the stream as actually produced by the headset application.
//! Every integer on the wire is the measurement times 100 000.

use nom::{
    error::Error,
    multi::count,
    number::complete::{le_i32, le_u16, u8},
    sequence::tuple,
    IResult,
};

use std::fmt;

/// Marker the headset application prepends to some datagrams. Stripped once
/// if present.
pub const BUNDLE_MARKER: &[u8] = b"#bundle:";

/// Bytes in a record header.
pub const HEADER_LEN: usize = 4;

/// Divisor applied to every integer on the wire.
const SCALE: f64 = 100_000.0;

const KIND_RAW: u8 = 1;
const KIND_ALPHA: u8 = 2;
const KIND_VALENCE: u8 = 3;

/// One decoded record, ready to be routed to a channel.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    /// A run of raw electrode readings for one channel.
    Raw {
        /// Electrode index as it appeared on the wire (validated by the
        /// session, not here).
        channel: u8,
        /// The scaled readings, in wire order.
        readings: Vec<f64>,
    },
    /// One alpha-wave measurement for one channel.
    Alpha {
        /// Electrode index as it appeared on the wire.
        channel: u8,
        /// The scaled alpha value.
        value: f64,
        /// The scaled long-term average supplied by the headset.
        long_term_average: f64,
    },
    /// One valence measurement. The wire carries a channel byte for this
    /// kind too, but there is only one valence channel, so it is dropped.
    Valence {
        /// The scaled valence value.
        value: f64,
        /// The scaled long-term average supplied by the headset.
        long_term_average: f64,
    },
}

/// Why decoding a datagram had to stop. Offsets after a bad record cannot
/// be trusted, so the iterator yields the error once and then ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    /// A record header promised more payload bytes than the datagram holds.
    Truncated {
        /// Bytes the record needed, header included.
        needed: usize,
        /// Bytes actually left in the datagram.
        remaining: usize,
    },
    /// The kind byte was none of raw/alpha/valence.
    UnknownKind(u8),
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DecodeError::Truncated { needed, remaining } => write!(
                f,
                "truncated record: needs {} bytes, {} remain",
                needed, remaining
            ),
            DecodeError::UnknownKind(kind) => write!(f, "unknown record kind {}", kind),
        }
    }
}

impl std::error::Error for DecodeError {}

fn header(input: &[u8]) -> IResult<&[u8], (u8, u8, u16)> {
    tuple((u8, u8, le_u16))(input)
}

fn scaled(raw: i32) -> f64 {
    f64::from(raw) / SCALE
}

fn parse_record(input: &[u8]) -> Result<(&[u8], Record), DecodeError> {
    let (rest, (kind, channel, length)) = header(input).map_err(|_| DecodeError::Truncated {
        needed: HEADER_LEN,
        remaining: input.len(),
    })?;
    match kind {
        KIND_RAW => {
            let truncated = DecodeError::Truncated {
                needed: HEADER_LEN + 4 * length as usize,
                remaining: input.len(),
            };
            let (rest, ints) =
                count(le_i32::<_, Error<_>>, length as usize)(rest).map_err(|_| truncated)?;
            Ok((
                rest,
                Record::Raw {
                    channel,
                    readings: ints.into_iter().map(scaled).collect(),
                },
            ))
        }
        KIND_ALPHA | KIND_VALENCE => {
            // The count field is not consulted for these kinds; the record
            // is always header + two integers, as the headset emits it.
            let truncated = DecodeError::Truncated {
                needed: HEADER_LEN + 8,
                remaining: input.len(),
            };
            let (rest, (value, lta)) =
                tuple((le_i32::<_, Error<_>>, le_i32))(rest).map_err(|_| truncated)?;
            let record = if kind == KIND_ALPHA {
                Record::Alpha {
                    channel,
                    value: scaled(value),
                    long_term_average: scaled(lta),
                }
            } else {
                Record::Valence {
                    value: scaled(value),
                    long_term_average: scaled(lta),
                }
            };
            Ok((rest, record))
        }
        other => Err(DecodeError::UnknownKind(other)),
    }
}

/// A single-pass iterator over the records of one datagram.
///
/// Yields `Ok(Record)` for each well-formed record, left to right. On the
/// first malformed record it yields the error once and then terminates;
/// earlier records are unaffected.
#[derive(Debug)]
pub struct Frames<'a> {
    input: &'a [u8],
    failed: bool,
}

/// Starts decoding one datagram, stripping the [`BUNDLE_MARKER`] prefix if
/// present.
pub fn frames(data: &[u8]) -> Frames<'_> {
    let input = data.strip_prefix(BUNDLE_MARKER).unwrap_or(data);
    Frames {
        input,
        failed: false,
    }
}

impl<'a> Iterator for Frames<'a> {
    type Item = Result<Record, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.input.is_empty() {
            return None;
        }
        match parse_record(self.input) {
            Ok((rest, record)) => {
                self.input = rest;
                Some(Ok(record))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

fn wire_int(v: f64) -> [u8; 4] {
    ((v * SCALE).round() as i32).to_le_bytes()
}

/// Encodes one raw record for the given electrode.
pub fn encode_raw(channel: u8, readings: &[f64]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + 4 * readings.len());
    out.push(KIND_RAW);
    out.push(channel);
    out.extend_from_slice(&(readings.len() as u16).to_le_bytes());
    for &r in readings {
        out.extend_from_slice(&wire_int(r));
    }
    out
}

fn encode_pair(kind: u8, channel: u8, value: f64, long_term_average: f64) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + 8);
    out.push(kind);
    out.push(channel);
    out.extend_from_slice(&2u16.to_le_bytes());
    out.extend_from_slice(&wire_int(value));
    out.extend_from_slice(&wire_int(long_term_average));
    out
}

/// Encodes one alpha record for the given electrode.
pub fn encode_alpha(channel: u8, value: f64, long_term_average: f64) -> Vec<u8> {
    encode_pair(KIND_ALPHA, channel, value, long_term_average)
}

/// Encodes one valence record. The channel byte is emitted as zero, which
/// the decoder in turn ignores.
pub fn encode_valence(value: f64, long_term_average: f64) -> Vec<u8> {
    encode_pair(KIND_VALENCE, 0, value, long_term_average)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn collect(data: &[u8]) -> Vec<Result<Record, DecodeError>> {
        frames(data).collect()
    }

    #[test]
    fn test_raw_record() {
        // kind=1, channel=0, count=2, readings 500000 and -300000.
        let mut data = vec![0x01, 0x00, 0x02, 0x00];
        data.extend_from_slice(&500_000i32.to_le_bytes());
        data.extend_from_slice(&(-300_000i32).to_le_bytes());

        let records = collect(&data);
        assert_eq!(
            records,
            vec![Ok(Record::Raw {
                channel: 0,
                readings: vec![5.0, -3.0],
            })]
        );
    }

    #[test]
    fn test_valence_ignores_channel_byte() {
        // kind=3 with a nonsense channel byte still decodes as valence.
        let mut data = vec![0x03, 0x05, 0x02, 0x00];
        data.extend_from_slice(&100_000i32.to_le_bytes());
        data.extend_from_slice(&50_000i32.to_le_bytes());

        let records = collect(&data);
        assert_eq!(
            records,
            vec![Ok(Record::Valence {
                value: 1.0,
                long_term_average: 0.5,
            })]
        );
    }

    #[test]
    fn test_alpha_record() {
        let data = encode_alpha(3, 0.25, 0.125);
        let records = collect(&data);
        assert_eq!(
            records,
            vec![Ok(Record::Alpha {
                channel: 3,
                value: 0.25,
                long_term_average: 0.125,
            })]
        );
    }

    #[test]
    fn test_bundle_marker_stripped_once() {
        let mut data = BUNDLE_MARKER.to_vec();
        data.extend_from_slice(&encode_raw(1, &[1.0]));
        let records = collect(&data);
        assert_eq!(
            records,
            vec![Ok(Record::Raw {
                channel: 1,
                readings: vec![1.0],
            })]
        );
    }

    #[test]
    fn test_multiple_records_in_order() {
        let mut data = encode_raw(0, &[5.0, -3.0]);
        data.extend_from_slice(&encode_alpha(2, 0.5, 0.4));
        data.extend_from_slice(&encode_valence(-0.1, 0.2));

        let records = collect(&data);
        assert_eq!(records.len(), 3);
        assert_eq!(
            records[0],
            Ok(Record::Raw {
                channel: 0,
                readings: vec![5.0, -3.0],
            })
        );
        assert_eq!(
            records[1],
            Ok(Record::Alpha {
                channel: 2,
                value: 0.5,
                long_term_average: 0.4,
            })
        );
        assert_eq!(
            records[2],
            Ok(Record::Valence {
                value: -0.1,
                long_term_average: 0.2,
            })
        );
    }

    #[test]
    fn test_empty_datagram_yields_nothing() {
        assert_eq!(collect(&[]), vec![]);
        assert_eq!(collect(BUNDLE_MARKER), vec![]);
    }

    #[test]
    fn test_truncated_raw_record_fails() {
        // Header claims 10 readings, only one follows.
        let mut data = vec![0x01, 0x00, 0x0A, 0x00];
        data.extend_from_slice(&100i32.to_le_bytes());

        let records = collect(&data);
        assert_eq!(
            records,
            vec![Err(DecodeError::Truncated {
                needed: 44,
                remaining: 8,
            })]
        );
    }

    #[test]
    fn test_unknown_kind_stops_decoding() {
        let mut data = encode_raw(0, &[1.0]);
        data.extend_from_slice(&[0x07, 0x00, 0x00, 0x00]);
        data.extend_from_slice(&encode_raw(1, &[2.0]));

        let records = collect(&data);
        // The valid leading record decodes; the bad kind ends the datagram.
        assert_eq!(records.len(), 2);
        assert!(records[0].is_ok());
        assert_eq!(records[1], Err(DecodeError::UnknownKind(7)));
    }

    #[test]
    fn test_truncated_header_fails() {
        let records = collect(&[0x01, 0x00]);
        assert_eq!(
            records,
            vec![Err(DecodeError::Truncated {
                needed: HEADER_LEN,
                remaining: 2,
            })]
        );
    }

    #[test]
    fn test_round_trip() {
        let mut data = Vec::new();
        let raw = [0.12345, -7.0, 0.0];
        for ch in 0..8u8 {
            data.extend_from_slice(&encode_raw(ch, &raw));
            data.extend_from_slice(&encode_alpha(ch, 0.5 + f64::from(ch), 0.25));
        }
        data.extend_from_slice(&encode_valence(0.75, -0.5));

        let records: Vec<Record> = frames(&data).map(|r| r.unwrap()).collect();
        assert_eq!(records.len(), 17);
        for ch in 0..8usize {
            assert_eq!(
                records[2 * ch],
                Record::Raw {
                    channel: ch as u8,
                    readings: raw.to_vec(),
                }
            );
            assert_eq!(
                records[2 * ch + 1],
                Record::Alpha {
                    channel: ch as u8,
                    value: 0.5 + ch as f64,
                    long_term_average: 0.25,
                }
            );
        }
        assert_eq!(
            records[16],
            Record::Valence {
                value: 0.75,
                long_term_average: -0.5,
            }
        );
    }
}
