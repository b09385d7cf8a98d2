//! Segment parsing of corrected data codewords
use crate::models::Version;

pub const ALPHANUMERIC_CHARSET: &[u8; 45] = b"0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ $%*+-./:";

/// Segment mode indicators
pub mod mode {
    pub const TERMINATOR: u8 = 0b0000;
    pub const NUMERIC: u8 = 0b0001;
    pub const ALPHANUMERIC: u8 = 0b0010;
    pub const STRUCTURED_APPEND: u8 = 0b0011;
    pub const BYTE: u8 = 0b0100;
    pub const FNC1_FIRST: u8 = 0b0101;
    pub const ECI: u8 = 0b0111;
    pub const KANJI: u8 = 0b1000;
    pub const FNC1_SECOND: u8 = 0b1001;
}

/// ECI designators that select a byte interpretation
const ECI_LATIN1: &[u32] = &[1, 3];
const ECI_UTF8: u32 = 26;

/// Position of this symbol within a structured-append sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StructuredAppend {
    pub index: u8,
    pub total: u8,
    pub parity: u8,
}

/// FNC1 marker present in the stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fnc1 {
    /// GS1 formatted data
    First,
    /// Industry application with its indicator byte
    Second(u8),
}

/// Decoded payload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload {
    /// Concatenated segment bytes (Kanji as Shift JIS pairs)
    pub bytes: Vec<u8>,
    /// Text interpretation of `bytes`
    pub text: String,
    pub eci: Option<u32>,
    pub structured_append: Option<StructuredAppend>,
    pub fnc1: Option<Fnc1>,
}

/// Why the stream could not be parsed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadError {
    /// A segment ran past the end of the data codewords
    Truncated,
    /// Reserved mode indicator
    UnknownMode(u8),
    /// Digit or character value out of range for its mode
    InvalidValue,
}

/// Character count indicator width for a mode at a version
pub fn char_count_bits(mode_bits: u8, version: Version) -> usize {
    let class = match version.number() {
        1..=9 => 0,
        10..=26 => 1,
        _ => 2,
    };
    let widths = match mode_bits {
        mode::NUMERIC => [10, 12, 14],
        mode::ALPHANUMERIC => [9, 11, 13],
        mode::BYTE => [8, 16, 16],
        mode::KANJI => [8, 10, 12],
        _ => [0, 0, 0],
    };
    widths[class]
}

/// Read-only MSB-first cursor over codewords
pub struct BitReader<'a> {
    bytes: &'a [u8],
    position: usize,
}

impl<'a> BitReader<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, position: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.bytes.len() * 8 - self.position
    }

    pub fn read(&mut self, count: usize) -> Result<u32, PayloadError> {
        if count > self.remaining() {
            return Err(PayloadError::Truncated);
        }
        let mut value = 0u32;
        for _ in 0..count {
            let byte = self.bytes[self.position / 8];
            let bit = (byte >> (7 - self.position % 8)) & 1;
            value = (value << 1) | bit as u32;
            self.position += 1;
        }
        Ok(value)
    }
}

/// Parse all segments up to the terminator (or the end of data)
pub fn decode_payload(data: &[u8], version: Version) -> Result<Payload, PayloadError> {
    let mut reader = BitReader::new(data);
    let mut payload = Payload::default();

    while reader.remaining() >= 4 {
        let mode_bits = reader.read(4)? as u8;
        match mode_bits {
            mode::TERMINATOR => break,
            mode::NUMERIC => {
                let count = reader.read(char_count_bits(mode_bits, version))? as usize;
                decode_numeric(&mut reader, count, &mut payload.bytes)?;
            }
            mode::ALPHANUMERIC => {
                let count = reader.read(char_count_bits(mode_bits, version))? as usize;
                let start = payload.bytes.len();
                decode_alphanumeric(&mut reader, count, &mut payload.bytes)?;
                if payload.fnc1.is_some() {
                    apply_fnc1_escapes(&mut payload.bytes, start);
                }
            }
            mode::BYTE => {
                let count = reader.read(char_count_bits(mode_bits, version))? as usize;
                for _ in 0..count {
                    payload.bytes.push(reader.read(8)? as u8);
                }
            }
            mode::KANJI => {
                let count = reader.read(char_count_bits(mode_bits, version))? as usize;
                decode_kanji(&mut reader, count, &mut payload.bytes)?;
            }
            mode::ECI => payload.eci = Some(read_eci(&mut reader)?),
            mode::STRUCTURED_APPEND => {
                let index = reader.read(4)? as u8;
                let total = reader.read(4)? as u8 + 1;
                let parity = reader.read(8)? as u8;
                payload.structured_append = Some(StructuredAppend {
                    index,
                    total,
                    parity,
                });
            }
            mode::FNC1_FIRST => payload.fnc1 = Some(Fnc1::First),
            mode::FNC1_SECOND => payload.fnc1 = Some(Fnc1::Second(reader.read(8)? as u8)),
            other => return Err(PayloadError::UnknownMode(other)),
        }
    }

    payload.text = bytes_to_text(&payload.bytes, payload.eci);
    Ok(payload)
}

/// UTF-8 when valid (or declared), otherwise ISO-8859-1
fn bytes_to_text(bytes: &[u8], eci: Option<u32>) -> String {
    let latin1 = || bytes.iter().map(|&b| b as char).collect();
    match eci {
        Some(designator) if ECI_LATIN1.contains(&designator) => latin1(),
        Some(ECI_UTF8) => String::from_utf8_lossy(bytes).into_owned(),
        _ => match std::str::from_utf8(bytes) {
            Ok(text) => text.to_string(),
            Err(_) => latin1(),
        },
    }
}

fn read_eci(reader: &mut BitReader<'_>) -> Result<u32, PayloadError> {
    let first = reader.read(8)?;
    if first & 0x80 == 0 {
        Ok(first)
    } else if first & 0xC0 == 0x80 {
        Ok(((first & 0x3F) << 8) | reader.read(8)?)
    } else if first & 0xE0 == 0xC0 {
        Ok(((first & 0x1F) << 16) | reader.read(16)?)
    } else {
        Err(PayloadError::InvalidValue)
    }
}

fn decode_numeric(
    reader: &mut BitReader<'_>,
    mut count: usize,
    out: &mut Vec<u8>,
) -> Result<(), PayloadError> {
    while count > 0 {
        let (bits, digits) = match count {
            1 => (4, 1),
            2 => (7, 2),
            _ => (10, 3),
        };
        let value = reader.read(bits)?;
        if value >= 10u32.pow(digits as u32) {
            return Err(PayloadError::InvalidValue);
        }
        let text = format!("{:0width$}", value, width = digits);
        out.extend_from_slice(text.as_bytes());
        count -= digits;
    }
    Ok(())
}

fn decode_alphanumeric(
    reader: &mut BitReader<'_>,
    mut count: usize,
    out: &mut Vec<u8>,
) -> Result<(), PayloadError> {
    let lookup = |value: u32| {
        ALPHANUMERIC_CHARSET
            .get(value as usize)
            .copied()
            .ok_or(PayloadError::InvalidValue)
    };
    while count >= 2 {
        let value = reader.read(11)?;
        out.push(lookup(value / 45)?);
        out.push(lookup(value % 45)?);
        count -= 2;
    }
    if count == 1 {
        out.push(lookup(reader.read(6)?)?);
    }
    Ok(())
}

/// Under FNC1, `%` encodes GS and `%%` a literal percent
fn apply_fnc1_escapes(bytes: &mut Vec<u8>, start: usize) {
    let segment = bytes.split_off(start);
    let mut iter = segment.into_iter().peekable();
    while let Some(b) = iter.next() {
        if b == b'%' {
            if iter.peek() == Some(&b'%') {
                iter.next();
                bytes.push(b'%');
            } else {
                bytes.push(0x1D);
            }
        } else {
            bytes.push(b);
        }
    }
}

fn decode_kanji(
    reader: &mut BitReader<'_>,
    count: usize,
    out: &mut Vec<u8>,
) -> Result<(), PayloadError> {
    for _ in 0..count {
        let value = reader.read(13)?;
        let mut code = ((value / 0xC0) << 8) | (value % 0xC0);
        code += if code < 0x1F00 { 0x8140 } else { 0xC140 };
        out.push((code >> 8) as u8);
        out.push((code & 0xFF) as u8);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// MSB-first bit packer for building test streams
    struct Bits(Vec<bool>);

    impl Bits {
        fn new() -> Self {
            Self(Vec::new())
        }

        fn push(mut self, value: u32, count: usize) -> Self {
            for i in (0..count).rev() {
                self.0.push((value >> i) & 1 == 1);
            }
            self
        }

        fn bytes(&self) -> Vec<u8> {
            self.0
                .chunks(8)
                .map(|chunk| {
                    chunk
                        .iter()
                        .enumerate()
                        .fold(0u8, |acc, (i, &b)| acc | ((b as u8) << (7 - i)))
                })
                .collect()
        }
    }

    fn v1() -> Version {
        Version::MIN
    }

    #[test]
    fn test_numeric_segment() {
        // "01234567": 012 345 67
        let bits = Bits::new()
            .push(0b0001, 4)
            .push(8, 10)
            .push(12, 10)
            .push(345, 10)
            .push(67, 7)
            .push(0, 4);
        let payload = decode_payload(&bits.bytes(), v1()).unwrap();
        assert_eq!(payload.text, "01234567");
    }

    #[test]
    fn test_alphanumeric_segment() {
        // "AC-42": (10,12) (41,4) (2)
        let bits = Bits::new()
            .push(0b0010, 4)
            .push(5, 9)
            .push(10 * 45 + 12, 11)
            .push(41 * 45 + 4, 11)
            .push(2, 6)
            .push(0, 4);
        let payload = decode_payload(&bits.bytes(), v1()).unwrap();
        assert_eq!(payload.text, "AC-42");
    }

    #[test]
    fn test_byte_segment_utf8_and_latin1() {
        let mut bits = Bits::new().push(0b0100, 4).push(2, 8);
        for b in "é".as_bytes() {
            bits = bits.push(*b as u32, 8);
        }
        let payload = decode_payload(&bits.push(0, 4).bytes(), v1()).unwrap();
        assert_eq!(payload.text, "é");

        // A lone 0xE9 is not UTF-8 and falls back to Latin-1
        let bits = Bits::new().push(0b0100, 4).push(1, 8).push(0xE9, 8).push(0, 4);
        let payload = decode_payload(&bits.bytes(), v1()).unwrap();
        assert_eq!(payload.text, "é");
        assert_eq!(payload.bytes, vec![0xE9]);
    }

    #[test]
    fn test_mixed_segments_with_eci() {
        let bits = Bits::new()
            .push(0b0111, 4)
            .push(26, 8)
            .push(0b0001, 4)
            .push(3, 10)
            .push(123, 10)
            .push(0b0100, 4)
            .push(1, 8)
            .push(b'x' as u32, 8)
            .push(0, 4);
        let payload = decode_payload(&bits.bytes(), v1()).unwrap();
        assert_eq!(payload.eci, Some(26));
        assert_eq!(payload.text, "123x");
    }

    #[test]
    fn test_kanji_to_shift_jis() {
        // 0x935F encodes as 0xD9F: (0x935F - 0x8140) -> 0x121F -> 0x12 * 0xC0 + 0x1F
        let bits = Bits::new()
            .push(0b1000, 4)
            .push(1, 8)
            .push(0x12 * 0xC0 + 0x1F, 13)
            .push(0, 4);
        let payload = decode_payload(&bits.bytes(), v1()).unwrap();
        assert_eq!(payload.bytes, vec![0x93, 0x5F]);
    }

    #[test]
    fn test_structured_append_and_fnc1() {
        let bits = Bits::new()
            .push(0b0011, 4)
            .push(1, 4)
            .push(2, 4)
            .push(0xAB, 8)
            .push(0b0101, 4)
            .push(0b0010, 4)
            .push(3, 9)
            .push(45 + 38, 11)
            .push(2, 6)
            .push(0, 4);
        let payload = decode_payload(&bits.bytes(), v1()).unwrap();
        assert_eq!(
            payload.structured_append,
            Some(StructuredAppend {
                index: 1,
                total: 3,
                parity: 0xAB
            })
        );
        assert_eq!(payload.fnc1, Some(Fnc1::First));
        assert_eq!(payload.bytes, vec![b'1', 0x1D, b'2']);
    }

    #[test]
    fn test_truncated_and_unknown_modes() {
        let bits = Bits::new().push(0b0100, 4).push(5, 8).push(b'a' as u32, 8);
        assert_eq!(
            decode_payload(&bits.bytes(), v1()),
            Err(PayloadError::Truncated)
        );

        let bits = Bits::new().push(0b0110, 4).push(0, 4);
        assert_eq!(
            decode_payload(&bits.bytes(), v1()),
            Err(PayloadError::UnknownMode(0b0110))
        );
    }

    #[test]
    fn test_count_bits_by_version_class() {
        let v = |n| Version::new(n).unwrap();
        assert_eq!(char_count_bits(mode::BYTE, v(9)), 8);
        assert_eq!(char_count_bits(mode::BYTE, v(10)), 16);
        assert_eq!(char_count_bits(mode::NUMERIC, v(27)), 14);
        assert_eq!(char_count_bits(mode::KANJI, v(26)), 10);
    }
}
