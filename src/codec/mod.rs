//! Frame codec: signal maps ↔ payload bytes.
//!
//! - [`bits`]: sawtooth/network bit numbering.
//! - [`layout`]: compiled big-/little-endian formats and the bit engine.
//! - [`multiplex`]: the multiplexing tree of a message.
//! - [`container`]: header-framed contained PDUs.

pub mod bits;
pub mod container;
pub mod layout;
pub mod multiplex;

use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};

use crate::codec::{bits::required_bytes, multiplex::Codec};
use crate::types::{
    errors::{DecodeError, EncodeError},
    signal::Signal,
    value::{NamedValue, SignalMap, SignalValue},
};

/// Knobs of [`Message::encode`](crate::Message::encode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EncodeOptions {
    /// Input values are physical (scaled) values.
    pub scaling: bool,
    /// Fill bits no signal covers with the message's unused-bit pattern.
    pub padding: bool,
    /// Check ranges and label validity before encoding.
    pub strict: bool,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        EncodeOptions {
            scaling: true,
            padding: false,
            strict: true,
        }
    }
}

/// Knobs of [`Message::decode`](crate::Message::decode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DecodeOptions {
    /// Return labels for raw values found in a value table.
    pub decode_choices: bool,
    /// Return physical (scaled) values.
    pub scaling: bool,
    /// Decode container messages into their contained frames.
    pub decode_containers: bool,
    /// Accept frames shorter than the message, dropping incomplete signals.
    pub allow_truncated: bool,
    /// Accept frames longer than the message, ignoring the excess.
    pub allow_excess: bool,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        DecodeOptions {
            decode_choices: true,
            scaling: true,
            decode_containers: false,
            allow_truncated: false,
            allow_excess: true,
        }
    }
}

/// Signals decoded from one frame.
///
/// `truncated` is set when the frame was shorter than the message and
/// some signals were left out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DecodedSignals {
    pub signals: SignalMap,
    pub truncated: bool,
}

impl Deref for DecodedSignals {
    type Target = SignalMap;

    fn deref(&self) -> &SignalMap {
        &self.signals
    }
}

impl DerefMut for DecodedSignals {
    fn deref_mut(&mut self) -> &mut SignalMap {
        &mut self.signals
    }
}

/// Result of decoding a frame: plain signals or contained frames.
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedMessage {
    Signals(DecodedSignals),
    Container(Vec<container::ContainedFrame>),
}

impl DecodedMessage {
    pub fn signals(&self) -> Option<&DecodedSignals> {
        match self {
            DecodedMessage::Signals(s) => Some(s),
            DecodedMessage::Container(_) => None,
        }
    }

    pub fn contained(&self) -> Option<&[container::ContainedFrame]> {
        match self {
            DecodedMessage::Signals(_) => None,
            DecodedMessage::Container(frames) => Some(frames),
        }
    }
}

/// Raw value of one input entry, honoring the `scaling` switch.
fn to_raw(signal: &Signal, value: &SignalValue, scaling: bool) -> Result<SignalValue, EncodeError> {
    if scaling {
        return Ok(signal.conversion().scaled_to_raw(value)?);
    }
    match value {
        SignalValue::Named(n) => Ok(SignalValue::Int(signal.choice_to_number(&n.name)? as i128)),
        SignalValue::Float(v) if !signal.is_float => Ok(SignalValue::Int(v.round() as i128)),
        other => Ok(other.clone()),
    }
}

fn raw_selector(value: &SignalValue, name: &str) -> Result<i64, EncodeError> {
    let raw = value.as_i128().ok_or_else(|| EncodeError::NotNumeric {
        signal: name.to_string(),
    })?;
    i64::try_from(raw).map_err(|_| EncodeError::BadSelector {
        name: name.to_string(),
        value: raw,
    })
}

/// Picks the input entries reachable through the selectors' current values.
pub(crate) fn gather_signals(
    message: &str,
    signals: &[Signal],
    codec: &Codec,
    input: &SignalMap,
    scaling: bool,
) -> Result<SignalMap, EncodeError> {
    let mut out = SignalMap::new();
    gather_level(message, signals, codec, input, scaling, &mut out)?;
    Ok(out)
}

fn gather_level(
    message: &str,
    signals: &[Signal],
    node: &Codec,
    input: &SignalMap,
    scaling: bool,
    out: &mut SignalMap,
) -> Result<(), EncodeError> {
    for &idx in &node.signals {
        let sig = &signals[idx];
        let value = input
            .get(&sig.name)
            .ok_or_else(|| EncodeError::MissingSignal {
                message: message.to_string(),
                signal: sig.name.clone(),
            })?;
        out.insert(sig.name.clone(), value.clone());
    }
    for (selector, children) in &node.multiplexers {
        let Some(sig) = signals.iter().find(|s| &s.name == selector) else {
            continue;
        };
        let Some(value) = out.get(selector) else {
            continue;
        };
        let raw = raw_selector(&to_raw(sig, value, scaling)?, selector)?;
        let child = children.get(&raw).ok_or_else(|| EncodeError::BadSelector {
            name: selector.clone(),
            value: raw as i128,
        })?;
        gather_level(message, signals, child, input, scaling, out)?;
    }
    Ok(())
}

/// Range and label checks on the gathered entries.
pub(crate) fn check_encodable(
    signals: &[Signal],
    gathered: &SignalMap,
    scaling: bool,
) -> Result<(), EncodeError> {
    for sig in signals {
        let Some(value) = gathered.get(&sig.name) else {
            continue;
        };
        let raw = to_raw(sig, value, scaling)?;

        if scaling && !value.is_named() {
            let physical = value.as_f64();
            let tolerance = sig.scale.abs() * 1e-6;
            let minimum = sig.minimum.unwrap_or(f64::NEG_INFINITY);
            let maximum = sig.maximum.unwrap_or(f64::INFINITY);
            if physical < minimum - tolerance || physical > maximum + tolerance {
                return Err(EncodeError::OutOfRange {
                    signal: sig.name.clone(),
                    value: physical,
                    minimum,
                    maximum,
                });
            }
        }

        if !sig.is_float
            && let Some(r) = raw.as_i128()
        {
            let (lo, hi) = sig.raw_bounds();
            if r < lo || r > hi {
                return Err(EncodeError::RawOutOfRange {
                    signal: sig.name.clone(),
                    raw: r,
                    length: sig.length,
                });
            }
        }
    }
    Ok(())
}

/// Encodes one frame; returns the payload and the mask of bits written.
pub(crate) fn encode_signals(
    message: &str,
    signals: &[Signal],
    codec: &Codec,
    input: &SignalMap,
    scaling: bool,
) -> Result<(Vec<u8>, Vec<u8>), EncodeError> {
    let length = codec.formats.length();
    let mut data: Vec<u8> = vec![0; length];
    let mut used: Vec<u8> = vec![0; length];
    let mut raws: Vec<Option<SignalValue>> = vec![None; signals.len()];
    encode_level(
        message, signals, codec, input, scaling, &mut raws, &mut data, &mut used,
    )?;
    Ok((data, used))
}

#[allow(clippy::too_many_arguments)]
fn encode_level(
    message: &str,
    signals: &[Signal],
    node: &Codec,
    input: &SignalMap,
    scaling: bool,
    raws: &mut [Option<SignalValue>],
    data: &mut [u8],
    used: &mut [u8],
) -> Result<(), EncodeError> {
    for &idx in &node.signals {
        let sig = &signals[idx];
        let value = input
            .get(&sig.name)
            .ok_or_else(|| EncodeError::MissingSignal {
                message: message.to_string(),
                signal: sig.name.clone(),
            })?;
        raws[idx] = Some(to_raw(sig, value, scaling)?);
    }

    let current: &[Option<SignalValue>] = raws;
    let packed = node.formats.pack(|i| current.get(i).and_then(Option::as_ref), None);
    for ((d, p), (u, m)) in data
        .iter_mut()
        .zip(&packed)
        .zip(used.iter_mut().zip(&node.formats.padding_mask))
    {
        *d |= p;
        *u |= !m;
    }

    for (selector, children) in &node.multiplexers {
        let Some(raw) = signals
            .iter()
            .position(|s| &s.name == selector)
            .and_then(|i| raws[i].clone())
        else {
            continue;
        };
        let id = raw_selector(&raw, selector)?;
        let child = children.get(&id).ok_or_else(|| EncodeError::BadSelector {
            name: selector.clone(),
            value: id as i128,
        })?;
        encode_level(message, signals, child, input, scaling, raws, data, used)?;
    }
    Ok(())
}

/// Decodes a frame of exactly the message length.
///
/// `received` is the number of bytes actually on the wire when the frame
/// was padded up from a truncated one; signals needing more are skipped.
pub(crate) fn decode_signals(
    message: &str,
    signals: &[Signal],
    codec: &Codec,
    data: &[u8],
    received: Option<usize>,
    options: &DecodeOptions,
) -> Result<SignalMap, DecodeError> {
    let mut out = SignalMap::new();
    decode_level(message, signals, codec, data, received, options, &mut out)?;
    Ok(out)
}

fn decode_level(
    message: &str,
    signals: &[Signal],
    node: &Codec,
    data: &[u8],
    received: Option<usize>,
    options: &DecodeOptions,
    out: &mut SignalMap,
) -> Result<(), DecodeError> {
    let raws = node
        .formats
        .unpack(data)
        .map_err(|reason| DecodeError::UnpackFailed {
            message: message.to_string(),
            reason,
        })?;

    let mut selectors: Vec<(usize, SignalValue)> = Vec::new();
    for (idx, raw) in raws {
        let sig = &signals[idx];
        if received.is_some_and(|n| required_bytes(sig) > n) {
            continue;
        }
        let value = if options.scaling {
            sig.conversion().raw_to_scaled(&raw, options.decode_choices)
        } else {
            match (options.decode_choices, &sig.choices, raw.as_i128()) {
                (true, Some(choices), Some(r)) => i64::try_from(r)
                    .ok()
                    .and_then(|k| choices.get(&k).map(|label| (k, label)))
                    .map(|(k, label)| SignalValue::Named(NamedValue::new(k, label.clone())))
                    .unwrap_or(raw.clone()),
                _ => raw.clone(),
            }
        };
        if sig.is_multiplexer {
            selectors.push((idx, raw));
        }
        out.insert(sig.name.clone(), value);
    }

    for (selector, children) in &node.multiplexers {
        // a selector dropped by truncation takes its branches with it
        let Some((_, raw)) = selectors.iter().find(|(i, _)| &signals[*i].name == selector) else {
            continue;
        };
        let value = raw.as_i128().unwrap_or_default();
        let child = i64::try_from(value)
            .ok()
            .and_then(|id| children.get(&id))
            .ok_or_else(|| DecodeError::BadSelector {
                name: selector.clone(),
                value,
            })?;
        decode_level(message, signals, child, data, received, options, out)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mux_signals() -> Vec<Signal> {
        let mut m = Signal::new("Mux", 0, 8);
        m.is_multiplexer = true;
        let mut a = Signal::new("A", 8, 8);
        a.multiplexer_signal = Some("Mux".into());
        a.multiplexer_ids = Some(vec![1]);
        let mut b = Signal::new("B", 8, 16);
        b.multiplexer_signal = Some("Mux".into());
        b.multiplexer_ids = Some(vec![2]);
        let mut signals = vec![m, a, b];
        for s in &mut signals {
            s.refresh().unwrap();
        }
        signals
    }

    fn input(pairs: &[(&str, SignalValue)]) -> SignalMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_encode_picks_selected_branch() {
        let signals = mux_signals();
        let codec = Codec::build(&signals, 3);
        let data = input(&[
            ("Mux", 2.into()),
            ("A", 0x11.into()),
            ("B", 0x3344.into()),
        ]);
        let (bytes, used) = encode_signals("M", &signals, &codec, &data, true).unwrap();
        assert_eq!(bytes, vec![0x02, 0x44, 0x33]);
        assert_eq!(used, vec![0xFF, 0xFF, 0xFF]);

        let gathered = gather_signals("M", &signals, &codec, &data, true).unwrap();
        assert!(!gathered.contains_key("A"));
        assert!(gathered.contains_key("B"));
    }

    #[test]
    fn test_encode_rejects_unknown_selector_value() {
        let signals = mux_signals();
        let codec = Codec::build(&signals, 3);
        let data = input(&[("Mux", 9.into())]);
        assert_eq!(
            encode_signals("M", &signals, &codec, &data, true).unwrap_err(),
            EncodeError::BadSelector {
                name: "Mux".into(),
                value: 9
            }
        );
    }

    #[test]
    fn test_decode_follows_selector() {
        let signals = mux_signals();
        let codec = Codec::build(&signals, 3);
        let decoded = decode_signals(
            "M",
            &signals,
            &codec,
            &[0x01, 0x55, 0x00],
            None,
            &DecodeOptions::default(),
        )
        .unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded["A"], SignalValue::Int(0x55));

        let err = decode_signals(
            "M",
            &signals,
            &codec,
            &[0x07, 0x00, 0x00],
            None,
            &DecodeOptions::default(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            DecodeError::BadSelector {
                name: "Mux".into(),
                value: 7
            }
        );
    }

    #[test]
    fn test_check_encodable_tolerance() {
        let mut sig = Signal::new("Temp", 0, 8);
        sig.scale = 0.5;
        sig.minimum = Some(0.0);
        sig.maximum = Some(100.0);
        sig.refresh().unwrap();
        let signals = vec![sig];

        let ok = input(&[("Temp", 100.0000001.into())]);
        assert!(check_encodable(&signals, &ok, true).is_ok());

        let high = input(&[("Temp", 100.5.into())]);
        assert!(matches!(
            check_encodable(&signals, &high, true),
            Err(EncodeError::OutOfRange { .. })
        ));

        // 200 raw fits 8 bits, 300 does not
        let raw = input(&[("Temp", 300.into())]);
        assert!(matches!(
            check_encodable(&signals, &raw, false),
            Err(EncodeError::RawOutOfRange { raw: 300, .. })
        ));
    }
}
