//! Database model (SlotMap-backed).
//!
//! Messages live in a SlotMap arena with stable [`MessageKey`]s. Public
//! iteration follows the `messages_order` vector (definition order).
//!
//! **Lookups** are O(1): by name, and by masked frame id. The frame-id
//! index folds the extended flag into the key so that a standard and an
//! extended frame with the same number do not collide.

use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};
use std::collections::HashMap;
use std::fmt;

use crate::codec::{
    DecodeOptions, DecodedMessage, EncodeOptions, container::ContainerEntry,
};
use crate::types::{
    attributes::DbcSpecifics,
    bus::Bus,
    errors::{DecodeError, EncodeError, ModelError},
    message::Message,
    node::Node,
    signal::SignalSort,
    value::SignalMap,
};

// --- Stable keys (SlotMap) ---
new_key_type! { pub struct MessageKey; }

/// Knobs applied while loading a database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct LoadOptions {
    /// Fail on layout violations and duplicate frame ids instead of
    /// logging them.
    pub strict: bool,
    /// Mask applied to frame ids before indexing and lookup.
    pub frame_id_mask: Option<u32>,
    /// Order signals are stored in.
    pub sort_signals: SignalSort,
}

impl Default for LoadOptions {
    fn default() -> Self {
        LoadOptions {
            strict: true,
            frame_id_mask: None,
            sort_signals: SignalSort::StartBit,
        }
    }
}

/// Message selector accepted by the database codec entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageRef<'a> {
    Name(&'a str),
    /// `is_extended == None` tries the standard frame first.
    FrameId {
        frame_id: u32,
        is_extended: Option<bool>,
    },
}

impl<'a> From<&'a str> for MessageRef<'a> {
    fn from(name: &'a str) -> Self {
        MessageRef::Name(name)
    }
}

impl From<u32> for MessageRef<'_> {
    fn from(frame_id: u32) -> Self {
        MessageRef::FrameId {
            frame_id,
            is_extended: None,
        }
    }
}

impl From<(u32, bool)> for MessageRef<'_> {
    fn from((frame_id, is_extended): (u32, bool)) -> Self {
        MessageRef::FrameId {
            frame_id,
            is_extended: Some(is_extended),
        }
    }
}

impl fmt::Display for MessageRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRef::Name(name) => write!(f, "name '{name}'"),
            MessageRef::FrameId { frame_id, .. } => write!(f, "frame id 0x{frame_id:X}"),
        }
    }
}

/// In-memory representation of a CAN database.
#[derive(Clone, Debug)]
pub struct Database {
    // --- General information ---
    pub version: Option<String>,
    pub comment: Option<String>,
    pub nodes: Vec<Node>,
    pub buses: Vec<Bus>,
    /// DBC-only records (attribute definitions, value tables, ...).
    pub dbc: DbcSpecifics,

    // --- Main storage (stable-key map) ---
    messages: SlotMap<MessageKey, Message>,
    // --- Order "view" ---
    messages_order: Vec<MessageKey>,

    frame_id_mask: u32,
    strict: bool,

    // --- Lookups ---
    msg_key_by_name: HashMap<String, MessageKey>,
    msg_key_by_frame_id: HashMap<u64, MessageKey>, // (extended << 32) | masked id
}

impl Default for Database {
    fn default() -> Self {
        Database::with_options(&LoadOptions::default())
    }
}

impl Database {
    pub fn new() -> Self {
        Database::default()
    }

    pub fn with_options(options: &LoadOptions) -> Self {
        Database {
            version: None,
            comment: None,
            nodes: Vec::new(),
            buses: Vec::new(),
            dbc: DbcSpecifics::default(),
            messages: SlotMap::with_key(),
            messages_order: Vec::new(),
            frame_id_mask: options.frame_id_mask.unwrap_or(u32::MAX),
            strict: options.strict,
            msg_key_by_name: HashMap::new(),
            msg_key_by_frame_id: HashMap::new(),
        }
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }

    pub fn frame_id_mask(&self) -> u32 {
        self.frame_id_mask
    }

    fn frame_key(&self, frame_id: u32, is_extended: bool) -> u64 {
        ((is_extended as u64) << 32) | (frame_id & self.frame_id_mask) as u64
    }

    // ------------- Messages ------------

    /// Messages in definition order.
    pub fn iter_messages(&self) -> impl Iterator<Item = &Message> + '_ {
        self.messages_order
            .iter()
            .filter_map(|k| self.messages.get(*k))
    }

    pub fn message_count(&self) -> usize {
        self.messages_order.len()
    }

    /// Adds a message and indexes it.
    ///
    /// A frame id already taken is an error in strict mode; otherwise the
    /// newer message wins the index and a warning is logged.
    pub fn add_message(&mut self, message: Message) -> Result<MessageKey, ModelError> {
        let frame_key = self.frame_key(message.frame_id, message.is_extended_frame);
        if let Some(existing) = self
            .msg_key_by_frame_id
            .get(&frame_key)
            .and_then(|k| self.messages.get(*k))
        {
            let err = ModelError::DuplicateFrameId {
                frame_id: message.frame_id,
                first: existing.name.clone(),
                second: message.name.clone(),
            };
            if self.strict {
                return Err(err);
            }
            log::warn!("{err}");
        }
        if self.msg_key_by_name.contains_key(&message.name) {
            log::warn!("message name '{}' is defined twice", message.name);
        }

        let name = message.name.clone();
        let key: MessageKey = self.messages.insert(message);
        self.messages_order.push(key);
        self.msg_key_by_name.insert(name, key);
        self.msg_key_by_frame_id.insert(frame_key, key);
        Ok(key)
    }

    /// Removes a message by name.
    pub fn remove_message(&mut self, name: &str) -> Option<Message> {
        let key = self.msg_key_by_name.get(name).copied()?;
        let removed = self.messages.remove(key)?;
        self.messages_order.retain(|k| *k != key);
        self.rebuild_indexes();
        Some(removed)
    }

    fn rebuild_indexes(&mut self) {
        let mut by_name: HashMap<String, MessageKey> = HashMap::new();
        let mut by_frame_id: HashMap<u64, MessageKey> = HashMap::new();
        for &key in &self.messages_order {
            if let Some(msg) = self.messages.get(key) {
                by_name.insert(msg.name.clone(), key);
                by_frame_id.insert(self.frame_key(msg.frame_id, msg.is_extended_frame), key);
            }
        }
        self.msg_key_by_name = by_name;
        self.msg_key_by_frame_id = by_frame_id;
    }

    /// Re-validates every message and rebuilds the lookup indexes.
    ///
    /// Call after mutating messages through the `_mut` accessors.
    pub fn refresh(&mut self) -> Result<(), ModelError> {
        let strict = self.strict;
        for msg in self.messages.values_mut() {
            msg.set_strict(strict);
            msg.refresh()?;
        }

        let mut seen: HashMap<u64, &str> = HashMap::new();
        for msg in self.iter_messages() {
            let key = self.frame_key(msg.frame_id, msg.is_extended_frame);
            if let Some(first) = seen.insert(key, &msg.name) {
                let err = ModelError::DuplicateFrameId {
                    frame_id: msg.frame_id,
                    first: first.to_string(),
                    second: msg.name.clone(),
                };
                if strict {
                    return Err(err);
                }
                log::warn!("{err}");
            }
        }
        self.rebuild_indexes();
        Ok(())
    }

    pub fn get_message_by_key(&self, key: MessageKey) -> Option<&Message> {
        self.messages.get(key)
    }

    pub fn get_message_by_key_mut(&mut self, key: MessageKey) -> Option<&mut Message> {
        self.messages.get_mut(key)
    }

    pub fn get_message_by_name(&self, name: &str) -> Option<&Message> {
        let key: MessageKey = *self.msg_key_by_name.get(name)?;
        self.get_message_by_key(key)
    }

    /// Mutable access; call [`Database::refresh`] after renaming or
    /// renumbering.
    pub fn get_message_by_name_mut(&mut self, name: &str) -> Option<&mut Message> {
        let key: MessageKey = *self.msg_key_by_name.get(name)?;
        self.get_message_by_key_mut(key)
    }

    /// Looks a message up by frame id, after masking.
    ///
    /// With `is_extended == None` a standard frame is preferred over an
    /// extended one with the same number.
    pub fn get_message_by_frame_id(&self, frame_id: u32, is_extended: Option<bool>) -> Option<&Message> {
        let lookup = |ext: bool| {
            self.msg_key_by_frame_id
                .get(&self.frame_key(frame_id, ext))
                .and_then(|k| self.messages.get(*k))
        };
        match is_extended {
            Some(ext) => lookup(ext),
            None => lookup(false).or_else(|| lookup(true)),
        }
    }

    pub fn get_message<'a>(&self, key: impl Into<MessageRef<'a>>) -> Option<&Message> {
        match key.into() {
            MessageRef::Name(name) => self.get_message_by_name(name),
            MessageRef::FrameId {
                frame_id,
                is_extended,
            } => self.get_message_by_frame_id(frame_id, is_extended),
        }
    }

    // --------- Nodes & buses --------

    pub fn get_node_by_name(&self, name: &str) -> Option<&Node> {
        self.nodes.iter().find(|n| n.name == name)
    }

    pub fn get_bus_by_name(&self, name: &str) -> Option<&Bus> {
        self.buses.iter().find(|b| b.name == name)
    }

    // ------------- Codec ------------

    pub fn encode_message<'a>(
        &self,
        key: impl Into<MessageRef<'a>>,
        data: &SignalMap,
        options: &EncodeOptions,
    ) -> Result<Vec<u8>, EncodeError> {
        let key = key.into();
        self.get_message(key)
            .ok_or_else(|| EncodeError::NoSuchMessage {
                key: key.to_string(),
            })?
            .encode(data, options)
    }

    pub fn encode_container_message<'a>(
        &self,
        key: impl Into<MessageRef<'a>>,
        entries: &[ContainerEntry],
        options: &EncodeOptions,
    ) -> Result<Vec<u8>, EncodeError> {
        let key = key.into();
        self.get_message(key)
            .ok_or_else(|| EncodeError::NoSuchMessage {
                key: key.to_string(),
            })?
            .encode_container(entries, options)
    }

    pub fn decode_message<'a>(
        &self,
        key: impl Into<MessageRef<'a>>,
        data: &[u8],
        options: &DecodeOptions,
    ) -> Result<DecodedMessage, DecodeError> {
        let key = key.into();
        self.get_message(key)
            .ok_or_else(|| DecodeError::NoSuchMessage {
                key: key.to_string(),
            })?
            .decode(data, options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{signal::Signal, value::SignalValue};

    fn build_test_database() -> Database {
        let mut db = Database::new();
        db.add_message(Message::new(0x123, false, "Std", 1, vec![Signal::new("A", 0, 8)]).unwrap())
            .unwrap();
        db.add_message(Message::new(0x123, true, "Ext", 1, vec![Signal::new("B", 0, 8)]).unwrap())
            .unwrap();
        db
    }

    #[test]
    fn test_lookup_by_frame_id_and_name() {
        let db = build_test_database();
        assert_eq!(db.message_count(), 2);
        assert_eq!(db.get_message_by_frame_id(0x123, None).unwrap().name, "Std");
        assert_eq!(db.get_message_by_frame_id(0x123, Some(true)).unwrap().name, "Ext");
        assert_eq!(db.get_message("Ext").unwrap().frame_id, 0x123);
        assert!(db.get_message(0x124).is_none());
        let names: Vec<&str> = db.iter_messages().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["Std", "Ext"]);
    }

    #[test]
    fn test_duplicate_frame_id() {
        let mut db = build_test_database();
        let dup = Message::new(0x123, false, "Dup", 1, Vec::new()).unwrap();
        assert!(matches!(
            db.add_message(dup.clone()),
            Err(ModelError::DuplicateFrameId { .. })
        ));

        let mut lenient = Database::with_options(&LoadOptions {
            strict: false,
            ..Default::default()
        });
        lenient.add_message(dup.clone()).unwrap();
        let mut second = dup;
        second.name = "Dup2".into();
        lenient.add_message(second).unwrap();
        assert_eq!(lenient.get_message(0x123).unwrap().name, "Dup2");
    }

    #[test]
    fn test_frame_id_mask() {
        let mut db = Database::with_options(&LoadOptions {
            frame_id_mask: Some(0xFF),
            ..Default::default()
        });
        db.add_message(Message::new(0x1F0, false, "Masked", 1, Vec::new()).unwrap())
            .unwrap();
        assert_eq!(db.get_message(0x2F0).unwrap().name, "Masked");
    }

    #[test]
    fn test_codec_by_reference() {
        let db = build_test_database();
        let data = SignalMap::from([("B".to_string(), SignalValue::Int(9))]);
        let bytes = db
            .encode_message((0x123, true), &data, &EncodeOptions::default())
            .unwrap();
        assert_eq!(bytes, vec![9]);
        let decoded = db
            .decode_message("Ext", &bytes, &DecodeOptions::default())
            .unwrap();
        assert_eq!(decoded.signals().unwrap()["B"], SignalValue::Int(9));
        assert!(matches!(
            db.decode_message("Missing", &bytes, &DecodeOptions::default()),
            Err(DecodeError::NoSuchMessage { .. })
        ));
    }

    #[test]
    fn test_remove_and_refresh() {
        let mut db = build_test_database();
        assert!(db.remove_message("Std").is_some());
        assert_eq!(db.get_message(0x123).unwrap().name, "Ext");
        db.get_message_by_name_mut("Ext").unwrap().name = "Renamed".into();
        db.refresh().unwrap();
        assert!(db.get_message_by_name("Renamed").is_some());
        assert!(db.get_message_by_name("Ext").is_none());
    }
}
