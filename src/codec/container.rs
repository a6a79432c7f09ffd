//! Container messages: a payload made of header-framed contained frames.
//!
//! Each block is a 3-byte header id (in the container's header byte
//! order), a 1-byte payload length and the payload. Blocks are packed
//! back to back without padding.

use crate::codec::{DecodeOptions, DecodedSignals, EncodeOptions};
use crate::types::{
    errors::{DecodeError, EncodeError},
    message::Message,
    signal::ByteOrder,
    value::SignalMap,
};

const HEADER_LEN: usize = 4;
const MAX_BLOCK_LEN: usize = 255;
/// Header ids are three bytes wide.
pub(crate) const MAX_HEADER_ID: u32 = 0xFF_FFFF;

/// One entry to pack into a container.
#[derive(Debug, Clone, PartialEq)]
pub enum ContainerEntry {
    /// A contained message, by name, with its signals.
    Message { name: String, signals: SignalMap },
    /// A pre-encoded payload under a header id.
    Raw { header_id: u32, data: Vec<u8> },
}

impl ContainerEntry {
    pub fn message(name: impl Into<String>, signals: SignalMap) -> Self {
        ContainerEntry::Message {
            name: name.into(),
            signals,
        }
    }
}

/// One block found in a container payload.
#[derive(Debug, Clone, PartialEq)]
pub enum ContainedFrame {
    /// Block whose header id matched a contained message.
    Decoded {
        name: String,
        header_id: u32,
        signals: DecodedSignals,
    },
    /// Block with an unknown header id, kept as raw bytes.
    Unknown { header_id: u32, data: Vec<u8> },
}

impl ContainedFrame {
    pub fn header_id(&self) -> u32 {
        match self {
            ContainedFrame::Decoded { header_id, .. } | ContainedFrame::Unknown { header_id, .. } => {
                *header_id
            }
        }
    }
}

fn write_header(out: &mut Vec<u8>, header_id: u32, order: ByteOrder) {
    let bytes = [(header_id >> 16) as u8, (header_id >> 8) as u8, header_id as u8];
    match order {
        ByteOrder::BigEndian => out.extend_from_slice(&bytes),
        ByteOrder::LittleEndian => out.extend(bytes.iter().rev()),
    }
}

fn read_header(bytes: &[u8], order: ByteOrder) -> u32 {
    let fold = |acc: u32, b: &u8| (acc << 8) | *b as u32;
    match order {
        ByteOrder::BigEndian => bytes.iter().fold(0, fold),
        ByteOrder::LittleEndian => bytes.iter().rev().fold(0, fold),
    }
}

pub(crate) fn encode_container(
    container: &Message,
    entries: &[ContainerEntry],
    options: &EncodeOptions,
) -> Result<Vec<u8>, EncodeError> {
    let mut out: Vec<u8> = Vec::new();
    for entry in entries {
        let (header_id, payload) = match entry {
            ContainerEntry::Message { name, signals } => {
                let contained = container
                    .get_contained_message_by_name(name)
                    .ok_or_else(|| EncodeError::UnknownContainedMessage {
                        container: container.name.clone(),
                        key: name.clone(),
                    })?;
                let header_id = contained
                    .header_id
                    .ok_or_else(|| EncodeError::MissingHeaderId {
                        message: name.clone(),
                    })?;
                (header_id, contained.encode(signals, options)?)
            }
            ContainerEntry::Raw { header_id, data } => (*header_id, data.clone()),
        };
        if header_id > MAX_HEADER_ID {
            return Err(EncodeError::HeaderIdTooWide { header_id });
        }
        if payload.len() > MAX_BLOCK_LEN {
            return Err(EncodeError::BlockTooLong {
                length: payload.len(),
            });
        }
        write_header(&mut out, header_id, container.header_byte_order);
        out.push(payload.len() as u8);
        out.extend_from_slice(&payload);
    }

    if out.len() > container.length() {
        return Err(EncodeError::ContainerOverflow {
            container: container.name.clone(),
            needed: out.len(),
            length: container.length(),
        });
    }
    Ok(out)
}

pub(crate) fn decode_container(
    container: &Message,
    data: &[u8],
    options: &DecodeOptions,
) -> Result<Vec<ContainedFrame>, DecodeError> {
    let mut frames: Vec<ContainedFrame> = Vec::new();
    let mut pos: usize = 0;

    while pos + HEADER_LEN <= data.len() {
        let header_id = read_header(&data[pos..pos + 3], container.header_byte_order);
        let len = data[pos + 3] as usize;
        pos += HEADER_LEN;

        let end = pos + len;
        let body = if end > data.len() {
            if !options.allow_truncated {
                return Err(DecodeError::MalformedContainer {
                    message: container.name.clone(),
                    reason: format!(
                        "block 0x{header_id:06X} announces {len} bytes, only {} left",
                        data.len() - pos
                    ),
                });
            }
            &data[pos..]
        } else {
            &data[pos..end]
        };
        pos = end.min(data.len());

        match container.get_contained_message_by_header_id(header_id) {
            Some(contained) => {
                let signals = contained.decode_simple(body, options)?;
                frames.push(ContainedFrame::Decoded {
                    name: contained.name.clone(),
                    header_id,
                    signals,
                });
            }
            None => {
                log::debug!(
                    "container '{}': unknown header id 0x{header_id:06X}",
                    container.name
                );
                frames.push(ContainedFrame::Unknown {
                    header_id,
                    data: body.to_vec(),
                });
            }
        }
    }

    if pos < data.len() {
        log::info!(
            "container '{}': ignoring {} trailing bytes",
            container.name,
            data.len() - pos
        );
    }
    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{signal::Signal, value::SignalValue};

    fn build_container() -> Message {
        let mut inner = Message::new(0x100, false, "Inner", 2, vec![Signal::new("Word", 0, 16)])
            .unwrap();
        inner.header_id = Some(0x456);
        let mut container = Message::new(0x200, false, "Box", 64, Vec::new()).unwrap();
        container.is_fd = true;
        container.set_contained_messages(Some(vec![inner])).unwrap();
        container
    }

    #[test]
    fn test_encode_blocks() {
        let container = build_container();
        let entries = vec![
            ContainerEntry::message("Inner", SignalMap::from([("Word".into(), 0x0201.into())])),
            ContainerEntry::Raw {
                header_id: 0x123,
                data: vec![0xAA],
            },
        ];
        let data = encode_container(&container, &entries, &EncodeOptions::default()).unwrap();
        assert_eq!(
            data,
            vec![0x00, 0x04, 0x56, 0x02, 0x01, 0x02, 0x00, 0x01, 0x23, 0x01, 0xAA]
        );
    }

    #[test]
    fn test_encode_unknown_entry() {
        let container = build_container();
        let entries = vec![ContainerEntry::message("Nope", SignalMap::new())];
        assert!(matches!(
            encode_container(&container, &entries, &EncodeOptions::default()),
            Err(EncodeError::UnknownContainedMessage { .. })
        ));
    }

    #[test]
    fn test_encode_raw_header_id_too_wide() {
        let container = build_container();
        let entries = vec![ContainerEntry::Raw {
            header_id: 0x0100_0456,
            data: vec![0x07],
        }];
        assert_eq!(
            encode_container(&container, &entries, &EncodeOptions::default()),
            Err(EncodeError::HeaderIdTooWide {
                header_id: 0x0100_0456
            })
        );
    }

    #[test]
    fn test_decode_known_and_unknown_blocks() {
        let container = build_container();
        let data = [0x00, 0x04, 0x56, 0x02, 0x01, 0x02, 0x00, 0x09, 0x99, 0x01, 0x7F];
        let frames = decode_container(&container, &data, &DecodeOptions::default()).unwrap();
        assert_eq!(frames.len(), 2);
        let ContainedFrame::Decoded { name, signals, .. } = &frames[0] else {
            panic!("expected decoded block");
        };
        assert_eq!(name, "Inner");
        assert_eq!(signals["Word"], SignalValue::Int(0x0201));
        assert_eq!(
            frames[1],
            ContainedFrame::Unknown {
                header_id: 0x999,
                data: vec![0x7F]
            }
        );
    }

    #[test]
    fn test_decode_overlong_block() {
        let container = build_container();
        let data = [0x00, 0x04, 0x56, 0x05, 0x01];
        assert!(matches!(
            decode_container(&container, &data, &DecodeOptions::default()),
            Err(DecodeError::MalformedContainer { .. })
        ));

        let options = DecodeOptions {
            allow_truncated: true,
            ..Default::default()
        };
        let frames = decode_container(&container, &data, &options).unwrap();
        let ContainedFrame::Decoded { signals, .. } = &frames[0] else {
            panic!("expected decoded block");
        };
        assert!(signals.truncated);
        assert!(signals.is_empty());
    }

    #[test]
    fn test_little_endian_header() {
        let mut out = Vec::new();
        write_header(&mut out, 0x123456, ByteOrder::LittleEndian);
        assert_eq!(out, vec![0x56, 0x34, 0x12]);
        assert_eq!(read_header(&out, ByteOrder::LittleEndian), 0x123456);
    }
}
