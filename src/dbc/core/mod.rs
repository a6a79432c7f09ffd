//! Per-keyword DBC record decoders.
//!
//! Each keyword module exposes `pub(crate) fn decode(stream, file)`; it is
//! called with the stream positioned right after the keyword and consumes
//! the whole record. Decoders only collect records into [`DbcFile`]; the
//! database is assembled afterwards by `dbc::build`.

pub(crate) mod ba_;
pub(crate) mod ba_def_;
pub(crate) mod ba_def_def_;
pub(crate) mod bo_;
pub(crate) mod bo_tx_bu_;
pub(crate) mod bs_;
pub(crate) mod bu_;
pub(crate) mod cm_;
pub(crate) mod ev_;
pub(crate) mod ns_;
pub(crate) mod sg_mul_val_;
pub(crate) mod sig_group_;
pub(crate) mod sig_valtype_;
pub(crate) mod stream;
pub(crate) mod val_;
pub(crate) mod val_table_;
pub(crate) mod version;

use crate::types::{
    attributes::{AttributeDefinition, EnvironmentVariable, RawAttributeValue},
    conversion::Choices,
    message::SignalGroup,
    signal::ByteOrder,
};

/// Every keyword the parser recognizes at record level.
pub(crate) const KEYWORDS: &[&str] = &[
    "VERSION",
    "NS_",
    "BS_",
    "BU_",
    "VAL_TABLE_",
    "BO_",
    "SG_",
    "BO_TX_BU_",
    "EV_",
    "ENVVAR_DATA_",
    "SGTYPE_",
    "CM_",
    "BA_DEF_",
    "BA_DEF_REL_",
    "BA_DEF_SGTYPE_",
    "BA_DEF_DEF_",
    "BA_DEF_DEF_REL_",
    "BA_",
    "BA_REL_",
    "BA_SGTYPE_",
    "VAL_",
    "SIG_VALTYPE_",
    "SIG_GROUP_",
    "SIG_TYPE_REF_",
    "SG_MUL_VAL_",
    "CAT_DEF_",
    "CAT_",
    "FILTER",
    "EV_DATA_",
    "SGTYPE_VAL_",
    "BU_SG_REL_",
    "BU_EV_REL_",
    "BU_BO_REL_",
];

pub(crate) fn is_keyword(word: &str) -> bool {
    KEYWORDS.contains(&word)
}

/// Multiplexing tag of an `SG_` line (`M`, `m3`, `m3M`).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(crate) struct MuxTag {
    pub(crate) is_multiplexer: bool,
    pub(crate) selector_value: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct SignalRecord {
    pub(crate) name: String,
    pub(crate) mux: MuxTag,
    pub(crate) start: u32,
    pub(crate) length: u32,
    pub(crate) byte_order: ByteOrder,
    pub(crate) is_signed: bool,
    pub(crate) scale: f64,
    pub(crate) offset: f64,
    pub(crate) minimum: f64,
    pub(crate) maximum: f64,
    pub(crate) unit: String,
    pub(crate) receivers: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct MessageRecord {
    /// Frame id as written, bit 31 flagging an extended frame.
    pub(crate) raw_id: u32,
    pub(crate) name: String,
    pub(crate) length: usize,
    pub(crate) sender: String,
    pub(crate) signals: Vec<SignalRecord>,
}

/// Object a `CM_` or `BA_` record is attached to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Target {
    Database,
    Node(String),
    Message(u32),
    Signal(u32, String),
    EnvironmentVariable(String),
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AttributeRecord {
    pub(crate) name: String,
    pub(crate) target: Target,
    pub(crate) value: RawAttributeValue,
}

/// Target of a `BA_REL_` record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum RelationRecordTarget {
    NodeSignal { node: String, raw_id: u32, signal: String },
    NodeMessage { node: String, raw_id: u32 },
    NodeEnvironmentVariable { node: String, variable: String },
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RelationRecord {
    pub(crate) name: String,
    pub(crate) target: RelationRecordTarget,
    pub(crate) value: RawAttributeValue,
}

/// `SG_MUL_VAL_`: extended multiplexing of one signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct MuxRangeRecord {
    pub(crate) raw_id: u32,
    pub(crate) signal: String,
    pub(crate) multiplexer: String,
    pub(crate) ranges: Vec<(i64, i64)>,
}

/// Records of one DBC text, in file order per kind.
#[derive(Debug, Default)]
pub(crate) struct DbcFile {
    pub(crate) version: Option<String>,
    pub(crate) new_symbols: Vec<String>,
    pub(crate) nodes: Vec<String>,
    pub(crate) value_tables: Vec<(String, Choices)>,
    pub(crate) messages: Vec<MessageRecord>,
    pub(crate) senders: Vec<(u32, Vec<String>)>,
    pub(crate) environment_variables: Vec<EnvironmentVariable>,
    pub(crate) comments: Vec<(Target, String)>,
    pub(crate) definitions: Vec<AttributeDefinition>,
    pub(crate) defaults: Vec<(String, RawAttributeValue)>,
    pub(crate) attributes: Vec<AttributeRecord>,
    pub(crate) relation_attributes: Vec<RelationRecord>,
    /// `VAL_` on signals.
    pub(crate) value_descriptions: Vec<(u32, String, Choices)>,
    /// `VAL_` on environment variables.
    pub(crate) env_value_descriptions: Vec<(String, Choices)>,
    pub(crate) signal_types: Vec<(u32, String, u8)>,
    pub(crate) mux_ranges: Vec<MuxRangeRecord>,
    pub(crate) signal_groups: Vec<(u32, SignalGroup)>,
}

/// Stream positioned just after the leading keyword of `text`.
#[cfg(test)]
pub(crate) fn record_stream(text: &str) -> stream::TokenStream<'_> {
    let tokens = crate::dbc::lexer::tokenize(text).expect("test input tokenizes");
    let mut stream = stream::TokenStream::new(text, tokens);
    stream.advance();
    stream
}
