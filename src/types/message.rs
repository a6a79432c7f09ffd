//! CAN message: identity, payload layout and the codec entry points.

use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::codec::{
    self, DecodeOptions, DecodedMessage, DecodedSignals, EncodeOptions,
    container::{self, ContainedFrame, ContainerEntry},
    multiplex::{Codec, SignalTree},
};
use crate::types::{
    attributes::AttributeValue,
    errors::{DecodeError, EncodeError, ModelError},
    signal::{ByteOrder, Signal},
    value::SignalMap,
};

/// Payload lengths a CAN-FD frame can carry.
pub const CANFD_LENGTHS: [usize; 16] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 12, 16, 20, 24, 32, 48, 64];

/// Largest payload of any frame (CAN FD).
const MAX_LENGTH: usize = 64;

const STANDARD_ID_MAX: u32 = 0x7FF;
const EXTENDED_ID_MAX: u32 = 0x1FFF_FFFF;

/// Named group of signals of one message (`SIG_GROUP_`).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignalGroup {
    pub name: String,
    pub repetitions: u32,
    pub signal_names: Vec<String>,
}

/// A CAN message (frame definition).
///
/// Signal layout and length are private: changing them goes through
/// setters that re-validate and rebuild the codec. Plain metadata is
/// public.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub frame_id: u32,
    pub is_extended_frame: bool,
    pub name: String,
    pub is_fd: bool,
    /// Transmission period in milliseconds.
    pub cycle_time: Option<u32>,
    /// Transmitting node names.
    pub senders: Vec<String>,
    pub send_type: Option<String>,
    pub comment: Option<String>,
    pub bus_name: Option<String>,
    /// Header id of a message carried inside a container.
    pub header_id: Option<u32>,
    /// Byte order of the container block headers (for container messages).
    pub header_byte_order: ByteOrder,
    /// Fill pattern for bits no signal covers.
    pub unused_bit_pattern: u8,
    pub signal_groups: Vec<SignalGroup>,
    // --- Message Attribute Entry ---
    pub attributes: BTreeMap<String, AttributeValue>,

    length: usize,
    signals: Vec<Signal>,
    contained_messages: Option<Vec<Message>>,
    strict: bool,
    codec: Codec,
    signal_index: HashMap<String, usize>,
}

impl Message {
    /// Creates and strictly validates a message.
    pub fn new(
        frame_id: u32,
        is_extended_frame: bool,
        name: impl Into<String>,
        length: usize,
        signals: Vec<Signal>,
    ) -> Result<Self, ModelError> {
        Self::with_strict(frame_id, is_extended_frame, name, length, signals, true)
    }

    /// Like [`Message::new`]; with `strict == false` layout violations are
    /// only logged.
    pub fn with_strict(
        frame_id: u32,
        is_extended_frame: bool,
        name: impl Into<String>,
        length: usize,
        signals: Vec<Signal>,
        strict: bool,
    ) -> Result<Self, ModelError> {
        let mut message = Message {
            frame_id,
            is_extended_frame,
            name: name.into(),
            is_fd: false,
            cycle_time: None,
            senders: Vec::new(),
            send_type: None,
            comment: None,
            bus_name: None,
            header_id: None,
            header_byte_order: ByteOrder::BigEndian,
            unused_bit_pattern: 0x00,
            signal_groups: Vec::new(),
            attributes: BTreeMap::new(),
            length,
            signals,
            contained_messages: None,
            strict,
            codec: Codec::build(&[], 0),
            signal_index: HashMap::new(),
        };
        message.refresh()?;
        Ok(message)
    }

    /// Re-validates the message and rebuilds its codec.
    ///
    /// Signal geometry errors and payloads above 64 bytes always fail.
    /// Layout violations fail in strict mode and are logged otherwise.
    pub fn refresh(&mut self) -> Result<(), ModelError> {
        for sig in &mut self.signals {
            sig.refresh()?;
        }
        // must hold before the codec is built
        if self.length > MAX_LENGTH {
            return Err(ModelError::InvalidLength {
                message: self.name.clone(),
                length: self.length,
            });
        }
        if let Some(signal) = self.duplicate_signal() {
            let err = ModelError::DuplicateSignal {
                message: self.name.clone(),
                signal: signal.to_string(),
            };
            if self.strict {
                return Err(err);
            }
            log::warn!("{err}");
        }

        self.signal_index = self
            .signals
            .iter()
            .enumerate()
            .map(|(idx, s)| (s.name.clone(), idx))
            .collect();
        self.codec = Codec::build(&self.signals, self.length);

        for violation in self.violations() {
            if self.strict {
                return Err(violation);
            }
            log::warn!("{violation}");
        }

        if let Some(contained) = &mut self.contained_messages {
            for message in contained.iter_mut() {
                message.refresh()?;
            }
        }
        Ok(())
    }

    fn violations(&self) -> Vec<ModelError> {
        let mut found: Vec<ModelError> = Vec::new();

        let (max_id, bits) = if self.is_extended_frame {
            (EXTENDED_ID_MAX, 29)
        } else {
            (STANDARD_ID_MAX, 11)
        };
        if self.frame_id > max_id {
            found.push(ModelError::FrameIdTooWide {
                message: self.name.clone(),
                frame_id: self.frame_id,
                bits,
            });
        }

        if self.is_fd && !CANFD_LENGTHS.contains(&self.length) {
            found.push(ModelError::InvalidLength {
                message: self.name.clone(),
                length: self.length,
            });
        }

        for sig in &self.signals {
            let Some(selector) = &sig.multiplexer_signal else {
                continue;
            };
            let wired = self
                .get_signal_by_name(selector)
                .is_some_and(|s| s.is_multiplexer && s.name != sig.name);
            if !wired {
                found.push(ModelError::BadSelectorWiring {
                    signal: sig.name.clone(),
                    multiplexer: selector.clone(),
                });
            }
        }

        if let Some((sig, overflow)) = self.codec.find_collision(&self.signals, self.length) {
            found.push(if overflow {
                ModelError::Oversize {
                    message: self.name.clone(),
                    signal: sig.name.clone(),
                    length: self.length,
                }
            } else {
                ModelError::Overlap {
                    message: self.name.clone(),
                    signal: sig.name.clone(),
                }
            });
        }

        if let Some(contained) = &self.contained_messages {
            for message in contained {
                match message.header_id {
                    None => found.push(ModelError::MissingHeaderId {
                        container: self.name.clone(),
                        message: message.name.clone(),
                    }),
                    Some(header_id) if header_id > container::MAX_HEADER_ID => {
                        found.push(ModelError::HeaderIdTooWide {
                            container: self.name.clone(),
                            message: message.name.clone(),
                            header_id,
                        })
                    }
                    Some(_) => {}
                }
            }
        }
        found
    }

    fn duplicate_signal(&self) -> Option<&str> {
        let mut seen: HashSet<&str> = HashSet::new();
        self.signals
            .iter()
            .map(|s| s.name.as_str())
            .find(|name| !seen.insert(*name))
    }

    // ------------- Accessors ------------

    /// Payload length in bytes.
    pub fn length(&self) -> usize {
        self.length
    }

    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    /// Takes effect on the next [`Message::refresh`].
    pub fn set_strict(&mut self, strict: bool) {
        self.strict = strict;
    }

    pub fn contained_messages(&self) -> Option<&[Message]> {
        self.contained_messages.as_deref()
    }

    pub fn is_container(&self) -> bool {
        self.contained_messages.is_some()
    }

    pub fn is_multiplexed(&self) -> bool {
        self.signals.iter().any(|s| s.is_multiplexer)
    }

    pub fn get_signal_by_name(&self, name: &str) -> Option<&Signal> {
        self.signal_index
            .get(name)
            .and_then(|&idx| self.signals.get(idx))
    }

    pub fn get_contained_message_by_header_id(&self, header_id: u32) -> Option<&Message> {
        self.contained_messages
            .as_ref()?
            .iter()
            .find(|m| m.header_id == Some(header_id))
    }

    pub fn get_contained_message_by_name(&self, name: &str) -> Option<&Message> {
        self.contained_messages
            .as_ref()?
            .iter()
            .find(|m| m.name == name)
    }

    /// Multiplexing structure of the signals.
    pub fn signal_tree(&self) -> Vec<SignalTree> {
        self.codec.tree(&self.signals)
    }

    // ------------- Mutators ------------

    // Each setter validates a modified copy, so a rejected change leaves
    // the message untouched.
    fn apply(&mut self, change: impl FnOnce(&mut Message)) -> Result<(), ModelError> {
        let mut candidate = self.clone();
        change(&mut candidate);
        candidate.refresh()?;
        *self = candidate;
        Ok(())
    }

    pub fn set_length(&mut self, length: usize) -> Result<(), ModelError> {
        self.apply(|m| m.length = length)
    }

    pub fn set_signals(&mut self, signals: Vec<Signal>) -> Result<(), ModelError> {
        self.apply(|m| m.signals = signals)
    }

    pub fn add_signal(&mut self, signal: Signal) -> Result<(), ModelError> {
        self.apply(|m| m.signals.push(signal))
    }

    pub fn remove_signal(&mut self, name: &str) -> Result<Option<Signal>, ModelError> {
        let Some(idx) = self.signals.iter().position(|s| s.name == name) else {
            return Ok(None);
        };
        let mut removed = None;
        self.apply(|m| removed = Some(m.signals.remove(idx)))?;
        Ok(removed)
    }

    pub fn set_contained_messages(&mut self, contained: Option<Vec<Message>>) -> Result<(), ModelError> {
        self.apply(|m| m.contained_messages = contained)
    }

    // ------------- Encoding ------------

    /// Entries of `data` the current selector values make relevant.
    pub fn gather_signals(&self, data: &SignalMap) -> Result<SignalMap, EncodeError> {
        codec::gather_signals(&self.name, &self.signals, &self.codec, data, true)
    }

    /// Checks that `data` holds every needed signal, within range.
    ///
    /// Physical bounds are widened by `|scale| * 1e-6` to absorb rounding.
    pub fn assert_signals_encodable(&self, data: &SignalMap, scaling: bool) -> Result<(), EncodeError> {
        let gathered = codec::gather_signals(&self.name, &self.signals, &self.codec, data, scaling)?;
        codec::check_encodable(&self.signals, &gathered, scaling)
    }

    /// Encodes a signal map into a payload of exactly `length()` bytes.
    pub fn encode(&self, data: &SignalMap, options: &EncodeOptions) -> Result<Vec<u8>, EncodeError> {
        if self.is_container() {
            return Err(EncodeError::ExpectedContainerEntries {
                message: self.name.clone(),
            });
        }
        if options.strict {
            self.assert_signals_encodable(data, options.scaling)?;
        }
        let (mut bytes, used) =
            codec::encode_signals(&self.name, &self.signals, &self.codec, data, options.scaling)?;
        if options.padding {
            for (b, u) in bytes.iter_mut().zip(&used) {
                *b |= !u & self.unused_bit_pattern;
            }
        }
        Ok(bytes)
    }

    /// Packs contained messages (or raw blocks) into a container payload.
    pub fn encode_container(
        &self,
        entries: &[ContainerEntry],
        options: &EncodeOptions,
    ) -> Result<Vec<u8>, EncodeError> {
        if !self.is_container() {
            return Err(EncodeError::ExpectedSignalMap {
                message: self.name.clone(),
            });
        }
        container::encode_container(self, entries, options)
    }

    // ------------- Decoding ------------

    /// Decodes a payload; containers need `decode_containers`.
    pub fn decode(&self, data: &[u8], options: &DecodeOptions) -> Result<DecodedMessage, DecodeError> {
        if self.is_container() {
            if !options.decode_containers {
                return Err(DecodeError::ContainerNotDecoded {
                    message: self.name.clone(),
                });
            }
            return self
                .decode_container(data, options)
                .map(DecodedMessage::Container);
        }
        self.decode_simple(data, options)
            .map(DecodedMessage::Signals)
    }

    /// Decodes the signals of a non-container payload.
    pub fn decode_simple(&self, data: &[u8], options: &DecodeOptions) -> Result<DecodedSignals, DecodeError> {
        let expected = self.length;
        let (frame, received): (Cow<'_, [u8]>, Option<usize>) = match data.len().cmp(&expected) {
            Ordering::Equal => (Cow::Borrowed(data), None),
            Ordering::Greater if options.allow_excess => (Cow::Borrowed(&data[..expected]), None),
            Ordering::Less if options.allow_truncated => {
                let mut padded = data.to_vec();
                padded.resize(expected, 0xFF);
                (Cow::Owned(padded), Some(data.len()))
            }
            _ => {
                return Err(DecodeError::WrongSize {
                    message: self.name.clone(),
                    expected,
                    actual: data.len(),
                });
            }
        };

        let signals =
            codec::decode_signals(&self.name, &self.signals, &self.codec, &frame, received, options)?;
        Ok(DecodedSignals {
            signals,
            truncated: received.is_some(),
        })
    }

    /// Splits a container payload into its contained frames.
    pub fn decode_container(
        &self,
        data: &[u8],
        options: &DecodeOptions,
    ) -> Result<Vec<ContainedFrame>, DecodeError> {
        if !self.is_container() {
            return Err(DecodeError::NotAContainer {
                message: self.name.clone(),
            });
        }
        container::decode_container(self, data, options)
    }
}
