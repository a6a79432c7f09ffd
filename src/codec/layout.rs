//! Compiled bit layouts and the pack/unpack engine.
//!
//! A layout level is compiled into two formats over the same frame:
//! - the *big-endian* format walks the frame as one big-endian integer
//!   (network bit order) and holds the big-endian signals;
//! - the *little-endian* format walks the byte-reversed frame the same
//!   way and holds the little-endian signals.
//!
//! Both read fields MSB first, so a single bit walker serves both; the
//! packed halves are OR-ed together.

use crate::codec::bits::sawtooth_to_network_bitnum;
use crate::types::{
    signal::{ByteOrder, Signal},
    value::SignalValue,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Unsigned,
    Signed,
    Float,
}

/// One element of the concatenated format view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token {
    Field { kind: FieldKind, bits: u32 },
    Padding { bits: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Field {
    /// Index of the signal in the owning message.
    pub(crate) signal: usize,
    pub(crate) kind: FieldKind,
    /// First bit in the format's integer view (0 = MSB).
    pub(crate) offset: u32,
    pub(crate) bits: u32,
}

/// Fields of one byte order, sorted by offset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompiledFormat {
    pub(crate) fields: Vec<Field>,
    total_bits: u32,
}

impl CompiledFormat {
    /// The format as a concatenation of field and padding tokens whose
    /// lengths add up to the frame size.
    pub fn tokens(&self) -> Vec<Token> {
        let mut tokens: Vec<Token> = Vec::with_capacity(self.fields.len() * 2 + 1);
        let mut end: u32 = 0;
        for field in &self.fields {
            if field.offset > end {
                tokens.push(Token::Padding {
                    bits: field.offset - end,
                });
            }
            tokens.push(Token::Field {
                kind: field.kind,
                bits: field.bits,
            });
            end = end.max(field.offset + field.bits);
        }
        if self.total_bits > end {
            tokens.push(Token::Padding {
                bits: self.total_bits - end,
            });
        }
        tokens
    }

    fn unpack(&self, view: &[u8], out: &mut Vec<(usize, SignalValue)>) {
        for field in &self.fields {
            let mut raw: u64 = 0;
            for i in 0..field.bits {
                raw = (raw << 1) | read_bit(view, field.offset + i) as u64;
            }
            out.push((field.signal, promote(raw, field.kind, field.bits)));
        }
    }

    fn pack<'a>(&self, view: &mut [u8], mut raw_of: impl FnMut(usize) -> Option<&'a SignalValue>) {
        for field in &self.fields {
            let Some(value) = raw_of(field.signal) else {
                continue;
            };
            let raw = demote(value, field.kind, field.bits);
            for i in 0..field.bits {
                let bit = (raw >> (field.bits - 1 - i)) & 1;
                if bit == 1 {
                    write_bit(view, field.offset + i);
                }
            }
        }
    }

    fn mark(&self, view: &mut [u8]) {
        for field in &self.fields {
            for i in 0..field.bits {
                write_bit(view, field.offset + i);
            }
        }
    }
}

/// Both compiled formats of one layout level plus its padding mask.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Formats {
    pub big_endian: CompiledFormat,
    pub little_endian: CompiledFormat,
    /// Bits covered by no signal of this level.
    pub padding_mask: Vec<u8>,
    length: usize,
}

impl Formats {
    /// Compiles the signals at `indices` of `signals` for a frame of
    /// `length` bytes.
    pub(crate) fn build(signals: &[Signal], indices: &[usize], length: usize) -> Formats {
        let total_bits = length
            .checked_mul(8)
            .and_then(|bits| u32::try_from(bits).ok())
            .unwrap_or(u32::MAX);

        let mut big: Vec<Field> = Vec::new();
        let mut little: Vec<Field> = Vec::new();
        for &idx in indices {
            let Some(signal) = signals.get(idx) else {
                continue;
            };
            let kind = if signal.is_float {
                FieldKind::Float
            } else if signal.is_signed {
                FieldKind::Signed
            } else {
                FieldKind::Unsigned
            };
            match signal.byte_order {
                ByteOrder::BigEndian => big.push(Field {
                    signal: idx,
                    kind,
                    offset: sawtooth_to_network_bitnum(signal.start),
                    bits: signal.length,
                }),
                ByteOrder::LittleEndian => {
                    // walked from the end of the frame
                    let end = signal.start.saturating_add(signal.length);
                    little.push(Field {
                        signal: idx,
                        kind,
                        offset: total_bits.saturating_sub(end),
                        bits: signal.length,
                    });
                }
            }
        }
        big.sort_by_key(|f| f.offset);
        little.sort_by_key(|f| f.offset);

        let big_endian = CompiledFormat {
            fields: big,
            total_bits,
        };
        let little_endian = CompiledFormat {
            fields: little,
            total_bits,
        };

        let mut used: Vec<u8> = vec![0; length];
        big_endian.mark(&mut used);
        let mut used_le: Vec<u8> = vec![0; length];
        little_endian.mark(&mut used_le);
        used_le.reverse();
        let padding_mask: Vec<u8> = used
            .iter()
            .zip(&used_le)
            .map(|(b, l)| !(b | l))
            .collect();

        Formats {
            big_endian,
            little_endian,
            padding_mask,
            length,
        }
    }

    pub fn length(&self) -> usize {
        self.length
    }

    /// Packs raw values into a frame. Fields whose signal has no value are
    /// left zero.
    pub(crate) fn pack<'a>(
        &self,
        raw_of: impl Fn(usize) -> Option<&'a SignalValue>,
        padding: Option<u8>,
    ) -> Vec<u8> {
        let mut big: Vec<u8> = vec![0; self.length];
        self.big_endian.pack(&mut big, &raw_of);
        let mut little: Vec<u8> = vec![0; self.length];
        self.little_endian.pack(&mut little, &raw_of);
        little.reverse();

        big.iter_mut()
            .zip(&little)
            .zip(&self.padding_mask)
            .for_each(|((b, l), mask)| {
                *b |= *l;
                if let Some(pattern) = padding {
                    *b |= mask & pattern;
                }
            });
        big
    }

    /// Unpacks every field of this level as raw values.
    ///
    /// `data` must be exactly as long as the frame.
    pub(crate) fn unpack(&self, data: &[u8]) -> Result<Vec<(usize, SignalValue)>, String> {
        if data.len() != self.length {
            return Err(format!(
                "format expects {} bytes, got {}",
                self.length,
                data.len()
            ));
        }
        let mut out: Vec<(usize, SignalValue)> =
            Vec::with_capacity(self.big_endian.fields.len() + self.little_endian.fields.len());
        self.big_endian.unpack(data, &mut out);
        let reversed: Vec<u8> = data.iter().rev().copied().collect();
        self.little_endian.unpack(&reversed, &mut out);
        Ok(out)
    }
}

fn read_bit(view: &[u8], pos: u32) -> u8 {
    let byte = (pos / 8) as usize;
    match view.get(byte) {
        Some(b) => (b >> (7 - pos % 8)) & 1,
        None => 0,
    }
}

fn write_bit(view: &mut [u8], pos: u32) {
    let byte = (pos / 8) as usize;
    if let Some(b) = view.get_mut(byte) {
        *b |= 1 << (7 - pos % 8);
    }
}

fn mask(bits: u32) -> u64 {
    if bits >= 64 { u64::MAX } else { (1u64 << bits) - 1 }
}

/// Raw field bits → typed raw value.
fn promote(raw: u64, kind: FieldKind, bits: u32) -> SignalValue {
    match kind {
        FieldKind::Unsigned => SignalValue::Int(raw as i128),
        FieldKind::Signed => {
            if bits < 64 && raw & (1u64 << (bits - 1)) != 0 {
                SignalValue::Int((raw | !mask(bits)) as i64 as i128)
            } else {
                SignalValue::Int(raw as i64 as i128)
            }
        }
        FieldKind::Float if bits == 32 => SignalValue::Float(f32::from_bits(raw as u32) as f64),
        FieldKind::Float => SignalValue::Float(f64::from_bits(raw)),
    }
}

/// Typed raw value → field bits, truncated to the field width.
fn demote(value: &SignalValue, kind: FieldKind, bits: u32) -> u64 {
    let raw: u64 = match (kind, value) {
        (FieldKind::Float, v) if bits == 32 => (v.as_f64() as f32).to_bits() as u64,
        (FieldKind::Float, v) => v.as_f64().to_bits(),
        (_, SignalValue::Int(v)) => *v as u64,
        (_, SignalValue::Float(v)) => (v.round() as i128) as u64,
        (_, SignalValue::Named(n)) => n.value as u64,
    };
    raw & mask(bits)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn be(name: &str, start: u32, length: u32) -> Signal {
        let mut sig = Signal::new(name, start, length);
        sig.byte_order = ByteOrder::BigEndian;
        sig
    }

    #[test]
    fn test_tokens_cover_the_frame() {
        let signals = vec![
            Signal::new("Bar", 0, 8),
            Signal::new("Fum", 16, 16),
            be("Motor", 47, 4),
        ];
        let formats = Formats::build(&signals, &[0, 1, 2], 8);
        for format in [&formats.big_endian, &formats.little_endian] {
            let total: u32 = format
                .tokens()
                .iter()
                .map(|t| match t {
                    Token::Field { bits, .. } | Token::Padding { bits } => *bits,
                })
                .sum();
            assert_eq!(total, 64);
        }
        assert_eq!(
            formats.big_endian.tokens(),
            vec![
                Token::Padding { bits: 40 },
                Token::Field {
                    kind: FieldKind::Unsigned,
                    bits: 4
                },
                Token::Padding { bits: 20 },
            ]
        );
        // little-endian fields walked from the end of the frame
        assert_eq!(
            formats.little_endian.tokens(),
            vec![
                Token::Padding { bits: 32 },
                Token::Field {
                    kind: FieldKind::Unsigned,
                    bits: 16
                },
                Token::Padding { bits: 8 },
                Token::Field {
                    kind: FieldKind::Unsigned,
                    bits: 8
                },
            ]
        );
    }

    #[test]
    fn test_pack_unpack_mixed_orders() {
        let signals = vec![Signal::new("Bar", 0, 8), be("Baz", 15, 12)];
        let formats = Formats::build(&signals, &[0, 1], 3);
        let values = [SignalValue::Int(0x12), SignalValue::Int(0xABC)];
        let data = formats.pack(|i| values.get(i), None);
        assert_eq!(data, vec![0x12, 0xAB, 0xC0]);

        let unpacked = formats.unpack(&data).unwrap();
        assert!(unpacked.contains(&(0, SignalValue::Int(0x12))));
        assert!(unpacked.contains(&(1, SignalValue::Int(0xABC))));
    }

    #[test]
    fn test_signed_and_float_fields() {
        let mut t = be("T", 7, 12);
        t.is_signed = true;
        let mut f = Signal::new("F", 16, 32);
        f.is_float = true;
        let signals = vec![t, f];
        let formats = Formats::build(&signals, &[0, 1], 6);
        let values = [SignalValue::Int(-800), SignalValue::Float(1.5)];
        let data = formats.pack(|i| values.get(i), None);
        assert_eq!(&data[..2], &[0xCE, 0x00]);
        assert_eq!(&data[2..], &1.5f32.to_le_bytes());

        let unpacked = formats.unpack(&data).unwrap();
        assert!(unpacked.contains(&(0, SignalValue::Int(-800))));
        assert!(unpacked.contains(&(1, SignalValue::Float(1.5))));
    }

    #[test]
    fn test_padding_fills_unused_bits() {
        let signals = vec![Signal::new("Nibble", 0, 4)];
        let formats = Formats::build(&signals, &[0], 2);
        assert_eq!(formats.padding_mask, vec![0xF0, 0xFF]);
        let values = [SignalValue::Int(0x3)];
        assert_eq!(formats.pack(|i| values.get(i), Some(0xFF)), vec![0xF3, 0xFF]);
        assert_eq!(formats.pack(|i| values.get(i), None), vec![0x03, 0x00]);
    }

    #[test]
    fn test_unpack_rejects_wrong_length() {
        let signals = vec![Signal::new("Bar", 0, 8)];
        let formats = Formats::build(&signals, &[0], 2);
        assert!(formats.unpack(&[0x00]).is_err());
    }

    #[test]
    fn test_full_width_signed_field() {
        let mut s = Signal::new("Wide", 0, 64);
        s.is_signed = true;
        let signals = vec![s];
        let formats = Formats::build(&signals, &[0], 8);
        let values = [SignalValue::Int(i64::MIN as i128)];
        let data = formats.pack(|i| values.get(i), None);
        assert_eq!(data, (i64::MIN).to_le_bytes().to_vec());
        assert_eq!(
            formats.unpack(&data).unwrap(),
            vec![(0, SignalValue::Int(i64::MIN as i128))]
        );
    }
}
