//! # can_database
//!
//! Rust library for **CAN bus databases**: load a network description,
//! then encode and decode frames with it.
//!
//! ## Highlights
//! - **DBC parser/writer**: read `.dbc` text or CP1252 files into a [`Database`], write them back with CRLF line endings.
//! - **Frame codec**: [`Message::encode`] / [`Message::decode`] for big- and little-endian signals of any width up to 64 bits.
//! - **Multiplexing**: nested selector trees, including extended (`SG_MUL_VAL_`) multiplexing.
//! - **Containers**: header-framed contained PDUs via [`Message::encode_container`].
//! - **Strictness**: overlapping or oversized layouts fail at load time unless [`LoadOptions::strict`] is off.
//! - **Format plug-ins**: [`format::DatabaseFormat`] and a parser cache for repeated loads.
//!
//! ## Example
//! ```
//! use can_database::{DecodeOptions, LoadOptions, SignalValue};
//!
//! let text = "BU_: ECU\nBO_ 10 Speed: 2 ECU\n SG_ Kph : 0|16@1+ (0.1,0) [0|6553.5] \"km/h\" Vector__XXX\n";
//! let db = can_database::load_string(text, &LoadOptions::default()).unwrap();
//! let decoded = db
//!     .decode_message("Speed", &[0xE8, 0x03], &DecodeOptions::default())
//!     .unwrap();
//! let signals = &decoded.signals().unwrap().signals;
//! assert_eq!(signals["Kph"], SignalValue::Float(100.0));
//! ```

pub mod codec;
#[cfg(feature = "dbc")]
pub mod dbc;
pub mod format;
pub mod types;

#[doc(inline)]
pub use crate::codec::{
    DecodeOptions, DecodedMessage, DecodedSignals, EncodeOptions,
    container::{ContainedFrame, ContainerEntry},
    multiplex::SignalTree,
};
#[doc(inline)]
pub use crate::types::{
    attributes::{AttributeDefinition, AttributeValue, EnvironmentVariable},
    bus::Bus,
    conversion::{Choices, Conversion},
    database::{Database, LoadOptions, MessageKey, MessageRef},
    errors::{DecodeError, EncodeError, Error, ModelError, NoSuchChoice, ParseError},
    message::{Message, SignalGroup},
    node::Node,
    signal::{ByteOrder, MuxRole, Signal, SignalSort},
    value::{NamedValue, SignalMap, SignalValue},
};

#[cfg(feature = "dbc")]
pub use crate::dbc::DumpOptions;
pub use crate::format::{load_file, load_string};
