use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::types::{
    attributes::AttributeValue,
    conversion::{Choices, Conversion},
    errors::{ModelError, NoSuchChoice},
    value::SignalValue,
};

/// Bits of the largest (CAN FD) payload.
pub(crate) const MAX_FRAME_BITS: u32 = 512;

/// Bit order of a signal inside the frame.
#[derive(Default, Copy, Clone, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum ByteOrder {
    /// Intel: `start` is the sawtooth index of the LSB.
    #[default]
    LittleEndian,
    /// Motorola: `start` is the sawtooth index of the MSB.
    BigEndian,
}

impl fmt::Display for ByteOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ByteOrder::LittleEndian => f.write_str("little_endian"),
            ByteOrder::BigEndian => f.write_str("big_endian"),
        }
    }
}

/// Role a signal plays in multiplexing.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum MuxRole {
    /// Not multiplexed (always present).
    #[default]
    None,
    /// This signal is the multiplexer switch (marked as `M` in DBC).
    Multiplexor,
    /// This signal is gated by a multiplexer value (marked as `mX`).
    Multiplexed,
    /// Gated by one switch while switching others (marked as `mXM`).
    MultiplexedMultiplexor,
}

impl fmt::Display for MuxRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MuxRole::None => f.write_str("None"),
            MuxRole::Multiplexor => f.write_str("Multiplexor"),
            MuxRole::Multiplexed => f.write_str("Multiplexed"),
            MuxRole::MultiplexedMultiplexor => f.write_str("MultiplexedMultiplexor"),
        }
    }
}

/// Order in which signals of a message are stored or emitted.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SignalSort {
    /// Keep the order signals were defined in.
    AsIs,
    /// Ascending DBC start bit.
    #[default]
    StartBit,
    /// Descending DBC start bit (the DBC convention for emission).
    StartBitReversed,
    /// Alphabetical.
    Name,
}

impl SignalSort {
    /// Returns references to `signals` in this order.
    pub fn sorted<'a>(&self, signals: &'a [Signal]) -> Vec<&'a Signal> {
        let mut out: Vec<&Signal> = signals.iter().collect();
        match self {
            SignalSort::AsIs => {}
            SignalSort::StartBit => out.sort_by_key(|s| s.start),
            SignalSort::StartBitReversed => out.sort_by_key(|s| std::cmp::Reverse(s.start)),
            SignalSort::Name => out.sort_by(|a, b| a.name.cmp(&b.name)),
        }
        out
    }
}

/// A named bit field of a CAN frame.
///
/// Describes position/bit-length, byte order, sign, scaling (scale/offset),
/// valid range, unit, value table, receivers and multiplexing wiring.
///
/// `scale`, `offset`, `choices` and `is_float` feed the cached
/// [`Conversion`]; call [`Signal::refresh`] (or refresh the owning message)
/// after changing them.
#[derive(Clone, PartialEq, Debug)]
pub struct Signal {
    /// Signal name.
    pub name: String,
    /// Start bit (sawtooth index of the LSB or MSB depending on `byte_order`).
    pub start: u32,
    /// Bit length (1..=64).
    pub length: u32,
    pub byte_order: ByteOrder,
    pub is_signed: bool,
    /// IEEE-754 raw value; `length` must then be 32 or 64.
    pub is_float: bool,
    pub scale: f64,
    pub offset: f64,
    /// Raw-to-label value table.
    pub choices: Option<Choices>,
    /// Minimum physical value.
    pub minimum: Option<f64>,
    /// Maximum physical value.
    pub maximum: Option<f64>,
    pub unit: Option<String>,
    pub comment: Option<String>,
    /// Receiver node names.
    pub receivers: Vec<String>,
    /// Whether this signal selects other signals.
    pub is_multiplexer: bool,
    /// Selector values this signal is present for.
    pub multiplexer_ids: Option<Vec<i64>>,
    /// Name of the selector gating this signal.
    pub multiplexer_signal: Option<String>,
    /// Raw value sent before the first real value is known.
    pub raw_initial: Option<SignalValue>,
    /// Raw value marking the signal as invalid.
    pub raw_invalid: Option<SignalValue>,
    /// J1939 suspect parameter number.
    pub spn: Option<u32>,
    // --- Signal Attribute Entry ---
    pub attributes: BTreeMap<String, AttributeValue>,
    conversion: Conversion,
}

impl Signal {
    /// Creates an unsigned little-endian signal with identity scaling.
    pub fn new(name: impl Into<String>, start: u32, length: u32) -> Self {
        Signal {
            name: name.into(),
            start,
            length,
            byte_order: ByteOrder::LittleEndian,
            is_signed: false,
            is_float: false,
            scale: 1.0,
            offset: 0.0,
            choices: None,
            minimum: None,
            maximum: None,
            unit: None,
            comment: None,
            receivers: Vec::new(),
            is_multiplexer: false,
            multiplexer_ids: None,
            multiplexer_signal: None,
            raw_initial: None,
            raw_invalid: None,
            spn: None,
            attributes: BTreeMap::new(),
            conversion: Conversion::default(),
        }
    }

    /// Validates the bit geometry and rebuilds the conversion.
    pub fn refresh(&mut self) -> Result<(), ModelError> {
        self.conversion = Conversion::factory(
            self.scale,
            self.offset,
            self.choices.clone(),
            self.is_float,
        );

        if self.length == 0 {
            return Err(ModelError::ZeroLength {
                signal: self.name.clone(),
            });
        }
        if self.length > 64 {
            return Err(ModelError::SignalTooLong {
                signal: self.name.clone(),
                length: self.length,
            });
        }
        // 64-byte CAN FD frame; little-endian fields also end inside it
        let in_frame = match self.byte_order {
            ByteOrder::BigEndian => self.start < MAX_FRAME_BITS,
            ByteOrder::LittleEndian => self
                .start
                .checked_add(self.length)
                .is_some_and(|end| end <= MAX_FRAME_BITS),
        };
        if !in_frame {
            return Err(ModelError::StartBitOutOfRange {
                signal: self.name.clone(),
                start: self.start,
            });
        }
        if self.is_float && self.length != 32 && self.length != 64 {
            return Err(ModelError::BadFloatLength {
                signal: self.name.clone(),
                length: self.length,
            });
        }
        Ok(())
    }

    pub fn conversion(&self) -> &Conversion {
        &self.conversion
    }

    pub fn mux_role(&self) -> MuxRole {
        match (self.is_multiplexer, self.multiplexer_ids.is_some()) {
            (false, false) => MuxRole::None,
            (true, false) => MuxRole::Multiplexor,
            (false, true) => MuxRole::Multiplexed,
            (true, true) => MuxRole::MultiplexedMultiplexor,
        }
    }

    /// Physical view of `raw_initial`.
    pub fn initial(&self) -> Option<SignalValue> {
        self.raw_initial
            .as_ref()
            .map(|raw| self.conversion.raw_to_scaled(raw, true))
    }

    /// Physical view of `raw_invalid`.
    pub fn invalid(&self) -> Option<SignalValue> {
        self.raw_invalid
            .as_ref()
            .map(|raw| self.conversion.raw_to_scaled(raw, true))
    }

    pub fn choice_to_number(&self, label: &str) -> Result<i64, NoSuchChoice> {
        self.conversion.choice_to_number(label)
    }

    /// Smallest and largest raw integer the bit field holds.
    pub fn raw_bounds(&self) -> (i128, i128) {
        let bits = self.length.clamp(1, 64);
        if self.is_signed {
            (-(1i128 << (bits - 1)), (1i128 << (bits - 1)) - 1)
        } else {
            (0, (1i128 << bits) - 1)
        }
    }

    /// Sawtooth indices of every bit the signal occupies.
    pub fn sawtooth_bits(&self) -> Vec<u32> {
        match self.byte_order {
            ByteOrder::LittleEndian => (self.start..self.start.saturating_add(self.length)).collect(),
            ByteOrder::BigEndian => {
                let msb = crate::codec::bits::sawtooth_to_network_bitnum(self.start);
                (msb..msb.saturating_add(self.length))
                    .map(crate::codec::bits::network_to_sawtooth_bitnum)
                    .collect()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build_test_signal() -> Signal {
        let mut sig = Signal::new("Speed", 0, 16);
        sig.scale = 0.5;
        sig.offset = -10.0;
        sig.minimum = Some(-10.0);
        sig.maximum = Some(250.0);
        sig.unit = Some("km/h".into());
        sig.receivers = vec!["Gateway".to_string(), "Motor".to_string()];
        sig.raw_initial = Some(SignalValue::Int(20));
        sig.refresh().unwrap();
        sig
    }

    #[test]
    fn test_refresh_builds_conversion() {
        let sig = build_test_signal();
        assert!(matches!(sig.conversion(), Conversion::LinearFloat { .. }));
        assert_eq!(sig.initial(), Some(SignalValue::Float(0.0)));
        assert_eq!(sig.mux_role(), MuxRole::None);
    }

    #[test]
    fn test_refresh_rejects_bad_geometry() {
        let mut sig = Signal::new("F", 0, 16);
        sig.is_float = true;
        assert_eq!(
            sig.refresh(),
            Err(ModelError::BadFloatLength {
                signal: "F".into(),
                length: 16
            })
        );
        let mut sig = Signal::new("Z", 0, 0);
        assert!(matches!(sig.refresh(), Err(ModelError::ZeroLength { .. })));
        let mut sig = Signal::new("W", 0, 65);
        assert!(matches!(sig.refresh(), Err(ModelError::SignalTooLong { .. })));
    }

    #[test]
    fn test_refresh_rejects_start_outside_frame() {
        let mut sig = Signal::new("S", u32::MAX, 8);
        assert_eq!(
            sig.refresh(),
            Err(ModelError::StartBitOutOfRange {
                signal: "S".into(),
                start: u32::MAX
            })
        );
        assert!(sig.sawtooth_bits().is_empty());
        sig.byte_order = ByteOrder::BigEndian;
        assert!(matches!(sig.refresh(), Err(ModelError::StartBitOutOfRange { .. })));

        // last byte of a 64 byte frame
        let mut sig = Signal::new("Last", 504, 8);
        assert!(sig.refresh().is_ok());
        let mut sig = Signal::new("Motorola", 511, 8);
        sig.byte_order = ByteOrder::BigEndian;
        assert!(sig.refresh().is_ok());
        let mut sig = Signal::new("Past", 505, 8);
        assert!(sig.refresh().is_err());
    }

    #[test]
    fn test_raw_bounds() {
        let mut sig = Signal::new("S", 0, 12);
        assert_eq!(sig.raw_bounds(), (0, 4095));
        sig.is_signed = true;
        assert_eq!(sig.raw_bounds(), (-2048, 2047));
        let wide = Signal::new("U64", 0, 64);
        assert_eq!(wide.raw_bounds(), (0, u64::MAX as i128));
    }

    #[test]
    fn test_sawtooth_bits_big_endian() {
        let mut sig = Signal::new("T", 7, 12);
        sig.byte_order = ByteOrder::BigEndian;
        let bits = sig.sawtooth_bits();
        assert_eq!(&bits[..8], &[7, 6, 5, 4, 3, 2, 1, 0]);
        assert_eq!(&bits[8..], &[15, 14, 13, 12]);
    }

    #[test]
    fn test_sort_orders() {
        let signals = vec![
            Signal::new("b", 8, 8),
            Signal::new("a", 16, 8),
            Signal::new("c", 0, 8),
        ];
        let names = |sort: SignalSort| -> Vec<String> {
            sort.sorted(&signals).iter().map(|s| s.name.clone()).collect()
        };
        assert_eq!(names(SignalSort::StartBit), ["c", "b", "a"]);
        assert_eq!(names(SignalSort::StartBitReversed), ["a", "b", "c"]);
        assert_eq!(names(SignalSort::Name), ["a", "b", "c"]);
        assert_eq!(names(SignalSort::AsIs), ["b", "a", "c"]);
    }
}
