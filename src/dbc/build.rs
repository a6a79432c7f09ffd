//! Assembles a [`Database`] from the records of one DBC text.
//!
//! Tail records (`CM_`, `BA_`, `VAL_`, ...) are indexed by the DBC frame id
//! as written and consumed while the messages are built. Whatever is left
//! over referenced a message or signal that does not exist and is logged.

use std::collections::{BTreeMap, HashMap};

use crate::dbc::core::{
    AttributeRecord, DbcFile, MessageRecord, MuxRangeRecord, RelationRecord, RelationRecordTarget,
    SignalRecord, Target,
};
use crate::types::{
    attributes::{
        AttributeValue, DbcSpecifics, RawAttributeValue, RelationAttribute, RelationTarget,
    },
    bus::Bus,
    conversion::Choices,
    database::{Database, LoadOptions},
    errors::Error,
    message::{Message, SignalGroup},
    node::Node,
    signal::Signal,
    value::SignalValue,
};

/// Frame id bit marking an extended frame in `BO_` lines.
pub(crate) const EXTENDED_FLAG: u32 = 0x8000_0000;
/// Placeholder node of the DBC format.
pub(crate) const NO_NODE: &str = "Vector__XXX";

pub(crate) const ATTR_CYCLE_TIME: &str = "GenMsgCycleTime";
pub(crate) const ATTR_SEND_TYPE: &str = "GenMsgSendType";
pub(crate) const ATTR_START_VALUE: &str = "GenSigStartValue";
pub(crate) const ATTR_FRAME_FORMAT: &str = "VFrameFormat";
pub(crate) const ATTR_NODE_LONG_NAME: &str = "SystemNodeLongSymbol";
pub(crate) const ATTR_MESSAGE_LONG_NAME: &str = "SystemMessageLongSymbol";
pub(crate) const ATTR_SIGNAL_LONG_NAME: &str = "SystemSignalLongSymbol";
pub(crate) const ATTR_BUS_NAME: &str = "DBName";
pub(crate) const ATTR_BAUDRATE: &str = "Baudrate";
pub(crate) const ATTR_FD_BAUDRATE: &str = "BaudrateCANFD";
pub(crate) const ATTR_BUS_TYPE: &str = "BusType";

/// Mux ranges wider than this are not expanded.
const MAX_MUX_RANGE: i64 = 0xFFFF;

type SignalKey = (u32, String);
type Attributes = BTreeMap<String, AttributeValue>;

/// Tail records indexed by their target.
#[derive(Default)]
struct TailIndex {
    message_comments: HashMap<u32, String>,
    signal_comments: HashMap<SignalKey, String>,
    message_attributes: HashMap<u32, Attributes>,
    signal_attributes: HashMap<SignalKey, Attributes>,
    choices: HashMap<SignalKey, Choices>,
    value_types: HashMap<SignalKey, u8>,
    mux_ranges: HashMap<SignalKey, MuxRangeRecord>,
    senders: HashMap<u32, Vec<String>>,
    signal_groups: HashMap<u32, Vec<SignalGroup>>,
}

/// Adds everything `file` describes to `db`.
pub(crate) fn build(file: DbcFile, db: &mut Database, options: &LoadOptions) -> Result<(), Error> {
    let DbcFile {
        version,
        new_symbols: _,
        nodes,
        value_tables,
        messages,
        senders,
        environment_variables,
        comments,
        definitions,
        defaults,
        attributes,
        relation_attributes,
        value_descriptions,
        env_value_descriptions,
        signal_types,
        mux_ranges,
        signal_groups,
    } = file;

    if version.is_some() {
        db.version = version;
    }
    db.dbc.value_tables.extend(value_tables);

    for definition in definitions {
        let target = if definition.object.is_relation() {
            &mut db.dbc.relation_definitions
        } else {
            &mut db.dbc.attribute_definitions
        };
        target.insert(definition.name.clone(), definition);
    }
    apply_defaults(&mut db.dbc, defaults);

    for variable in environment_variables {
        db.dbc
            .environment_variables
            .insert(variable.name.clone(), variable);
    }
    for (name, choices) in env_value_descriptions {
        match db.dbc.environment_variables.get_mut(&name) {
            Some(variable) => variable.choices = Some(choices),
            None => log::warn!("VAL_ refers to unknown environment variable '{name}'"),
        }
    }

    let mut index = TailIndex::default();
    let mut node_comments: HashMap<String, String> = HashMap::new();
    let mut node_attributes: HashMap<String, Attributes> = HashMap::new();

    for (target, text) in comments {
        match target {
            Target::Database => db.comment = Some(text),
            Target::Node(name) => {
                node_comments.insert(name, text);
            }
            Target::Message(raw_id) => {
                index.message_comments.insert(raw_id, text);
            }
            Target::Signal(raw_id, signal) => {
                index.signal_comments.insert((raw_id, signal), text);
            }
            Target::EnvironmentVariable(name) => {
                match db.dbc.environment_variables.get_mut(&name) {
                    Some(variable) => variable.comment = Some(text),
                    None => log::warn!("CM_ refers to unknown environment variable '{name}'"),
                }
            }
        }
    }

    for AttributeRecord {
        name,
        target,
        value,
    } in attributes
    {
        let value = typed(&db.dbc, &name, &value);
        match target {
            Target::Database => {
                db.dbc.attributes.insert(name, value);
            }
            Target::Node(node) => {
                node_attributes.entry(node).or_default().insert(name, value);
            }
            Target::Message(raw_id) => {
                index
                    .message_attributes
                    .entry(raw_id)
                    .or_default()
                    .insert(name, value);
            }
            Target::Signal(raw_id, signal) => {
                index
                    .signal_attributes
                    .entry((raw_id, signal))
                    .or_default()
                    .insert(name, value);
            }
            Target::EnvironmentVariable(variable) => {
                match db.dbc.environment_variables.get_mut(&variable) {
                    Some(ev) => {
                        ev.attributes.insert(name, value);
                    }
                    None => log::warn!("BA_ refers to unknown environment variable '{variable}'"),
                }
            }
        }
    }

    for (raw_id, signal, choices) in value_descriptions {
        index.choices.insert((raw_id, signal), choices);
    }
    for (raw_id, signal, value_type) in signal_types {
        index.value_types.insert((raw_id, signal), value_type);
    }
    for record in mux_ranges {
        index
            .mux_ranges
            .insert((record.raw_id, record.signal.clone()), record);
    }
    for (raw_id, names) in senders {
        index.senders.entry(raw_id).or_default().extend(names);
    }
    for (raw_id, group) in signal_groups {
        index.signal_groups.entry(raw_id).or_default().push(group);
    }

    // --- Nodes ---
    let mut node_names: HashMap<String, String> = HashMap::new();
    for name in nodes {
        let mut node = Node::new(name.clone());
        node.comment = node_comments.remove(&name);
        node.attributes = node_attributes.remove(&name).unwrap_or_default();
        if let Some(long) = take_long_name(&mut node.attributes, ATTR_NODE_LONG_NAME) {
            log::debug!("node '{name}' renamed to its long name '{long}'");
            node.name = long.clone();
            node_names.insert(name, long);
        }
        if db.get_node_by_name(&node.name).is_none() {
            db.nodes.push(node);
        }
    }
    for name in node_comments.keys().chain(node_attributes.keys()) {
        log::warn!("CM_/BA_ refers to unknown node '{name}'");
    }

    let bus_name = build_bus(db);

    // --- Messages ---
    let mut signal_names: HashMap<SignalKey, String> = HashMap::new();
    for record in messages {
        let message = build_message(
            record,
            &mut index,
            &node_names,
            &mut signal_names,
            db,
            bus_name.as_deref(),
            options,
        )?;
        db.add_message(message)?;
    }

    for raw_id in index.message_comments.keys() {
        log::warn!("CM_ refers to unknown message {raw_id}");
    }
    for raw_id in index.message_attributes.keys() {
        log::warn!("BA_ refers to unknown message {raw_id}");
    }
    for (raw_id, signal) in index
        .signal_comments
        .keys()
        .chain(index.signal_attributes.keys())
        .chain(index.choices.keys())
        .chain(index.value_types.keys())
        .chain(index.mux_ranges.keys())
    {
        log::warn!("record refers to unknown signal '{signal}' of message {raw_id}");
    }

    for record in relation_attributes {
        let attribute = build_relation(record, &db.dbc, &node_names, &signal_names);
        db.dbc.relation_attributes.push(attribute);
    }

    Ok(())
}

fn apply_defaults(dbc: &mut DbcSpecifics, defaults: Vec<(String, RawAttributeValue)>) {
    for (name, raw) in defaults {
        let definition = match dbc.attribute_definitions.get_mut(&name) {
            Some(def) => Some(def),
            None => dbc.relation_definitions.get_mut(&name),
        };
        match definition {
            Some(def) => def.default = Some(def.typed_value(&raw)),
            None => log::warn!("BA_DEF_DEF_ for undefined attribute '{name}'"),
        }
    }
}

fn typed(dbc: &DbcSpecifics, name: &str, raw: &RawAttributeValue) -> AttributeValue {
    match dbc.definition(name) {
        Some(def) => def.typed_value(raw),
        None => {
            log::debug!("attribute '{name}' has no definition");
            raw.untyped()
        }
    }
}

fn take_long_name(attributes: &mut Attributes, key: &str) -> Option<String> {
    attributes
        .remove(key)
        .map(|v| v.to_string())
        .filter(|s| !s.is_empty())
}

/// Derives the bus from the database attributes, returning its name.
fn build_bus(db: &mut Database) -> Option<String> {
    let attributes = &db.dbc.attributes;
    let name = attributes.get(ATTR_BUS_NAME)?.to_string();
    let mut bus = Bus::new(name.clone());
    bus.baudrate = attributes
        .get(ATTR_BAUDRATE)
        .and_then(AttributeValue::as_f64)
        .map(|v| v as u32);
    bus.fd_baudrate = attributes
        .get(ATTR_FD_BAUDRATE)
        .and_then(AttributeValue::as_f64)
        .map(|v| v as u32);
    bus.is_fd = is_fd_bus(&db.dbc);
    match db.buses.iter_mut().find(|b| b.name == name) {
        Some(existing) => *existing = bus,
        None => db.buses.push(bus),
    }
    Some(name)
}

fn is_fd_bus(dbc: &DbcSpecifics) -> bool {
    dbc.attributes
        .get(ATTR_BUS_TYPE)
        .and_then(AttributeValue::as_str)
        .is_some_and(|t| t == "CAN FD")
}

/// `(is_extended, is_fd)` from a `VFrameFormat` value.
fn frame_format(value: &AttributeValue) -> Option<(bool, bool)> {
    match value {
        AttributeValue::Enum(label) | AttributeValue::Str(label) => Some((
            label.starts_with("Extended") || label.starts_with("J1939"),
            label.ends_with("_FD"),
        )),
        AttributeValue::Int(index) => match index {
            0 => Some((false, false)),
            1 => Some((true, false)),
            14 => Some((false, true)),
            15 => Some((true, true)),
            _ => None,
        },
        _ => None,
    }
}

fn rename_nodes(names: Vec<String>, node_names: &HashMap<String, String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(names.len());
    for name in names {
        if name == NO_NODE {
            continue;
        }
        let name = node_names.get(&name).cloned().unwrap_or(name);
        if !out.contains(&name) {
            out.push(name);
        }
    }
    out
}

fn build_message(
    record: MessageRecord,
    index: &mut TailIndex,
    node_names: &HashMap<String, String>,
    signal_names: &mut HashMap<SignalKey, String>,
    db: &Database,
    bus_name: Option<&str>,
    options: &LoadOptions,
) -> Result<Message, Error> {
    let MessageRecord {
        raw_id,
        name,
        length,
        sender,
        signals: signal_records,
    } = record;

    let mut attributes = index.message_attributes.remove(&raw_id).unwrap_or_default();
    let mut is_extended = raw_id & EXTENDED_FLAG != 0;
    let mut is_fd = false;
    if let Some(format) = attributes.remove(ATTR_FRAME_FORMAT) {
        match frame_format(&format) {
            Some((ext, fd)) => {
                is_extended |= ext;
                is_fd = fd;
            }
            None => log::warn!("message '{name}' has unknown frame format '{format}'"),
        }
    }
    if is_fd_bus(&db.dbc) && length > 8 {
        is_fd = true;
    }

    let name = match take_long_name(&mut attributes, ATTR_MESSAGE_LONG_NAME) {
        Some(long) => {
            log::debug!("message '{name}' renamed to its long name '{long}'");
            long
        }
        None => name,
    };

    // short name (as referenced by tail records) -> model name
    let mut renamed: HashMap<String, String> = HashMap::new();
    let mut signals: Vec<Signal> = Vec::with_capacity(signal_records.len());
    for rec in &signal_records {
        let signal = build_signal(rec, raw_id, index, node_names);
        renamed.insert(rec.name.clone(), signal.name.clone());
        signals.push(signal);
    }

    // plain `M` selector of the message
    let selector = signal_records
        .iter()
        .find(|r| r.mux.is_multiplexer && r.mux.selector_value.is_none())
        .or_else(|| signal_records.iter().find(|r| r.mux.is_multiplexer))
        .and_then(|r| renamed.get(&r.name).cloned());
    for (rec, signal) in signal_records.iter().zip(signals.iter_mut()) {
        if rec.mux.selector_value.is_some() {
            signal.multiplexer_signal = selector.clone().filter(|s| *s != signal.name);
        }
        if let Some(ranges) = index.mux_ranges.remove(&(raw_id, rec.name.clone())) {
            let multiplexer = renamed
                .get(&ranges.multiplexer)
                .cloned()
                .unwrap_or(ranges.multiplexer);
            signal.multiplexer_signal = Some(multiplexer);
            signal.multiplexer_ids = Some(expand_ranges(&ranges.ranges, &signal.name));
        }
    }

    for (short, long) in &renamed {
        signal_names.insert((raw_id, short.clone()), long.clone());
    }

    let signals: Vec<Signal> = options
        .sort_signals
        .sorted(&signals)
        .into_iter()
        .cloned()
        .collect();

    let mut message = Message::with_strict(
        raw_id & !EXTENDED_FLAG,
        is_extended,
        name,
        length,
        signals,
        options.strict,
    )?;

    let mut senders = vec![sender];
    senders.extend(index.senders.remove(&raw_id).unwrap_or_default());
    message.senders = rename_nodes(senders, node_names);
    message.comment = index.message_comments.remove(&raw_id);
    message.is_fd = is_fd;
    message.bus_name = bus_name.map(str::to_string);
    message.cycle_time = attributes
        .remove(ATTR_CYCLE_TIME)
        .and_then(|v| v.as_f64())
        .map(|v| v as u32);
    message.send_type = attributes.remove(ATTR_SEND_TYPE).map(|v| v.to_string());
    message.signal_groups = index
        .signal_groups
        .remove(&raw_id)
        .unwrap_or_default()
        .into_iter()
        .map(|mut group| {
            for signal in group.signal_names.iter_mut() {
                if let Some(long) = renamed.get(signal) {
                    *signal = long.clone();
                }
            }
            group
        })
        .collect();
    message.attributes = attributes;
    if is_fd {
        message.refresh()?;
    }
    Ok(message)
}

fn build_signal(
    rec: &SignalRecord,
    raw_id: u32,
    index: &mut TailIndex,
    node_names: &HashMap<String, String>,
) -> Signal {
    let key: SignalKey = (raw_id, rec.name.clone());
    let mut signal = Signal::new(rec.name.clone(), rec.start, rec.length);
    signal.byte_order = rec.byte_order;
    signal.is_signed = rec.is_signed;
    signal.scale = rec.scale;
    signal.offset = rec.offset;
    // [0|0] means "no range given"
    if rec.minimum != 0.0 || rec.maximum != 0.0 {
        signal.minimum = Some(rec.minimum);
        signal.maximum = Some(rec.maximum);
    }
    signal.unit = Some(rec.unit.clone()).filter(|u| !u.is_empty());
    signal.receivers = rename_nodes(rec.receivers.clone(), node_names);
    signal.is_multiplexer = rec.mux.is_multiplexer;
    signal.multiplexer_ids = rec.mux.selector_value.map(|v| vec![v]);
    signal.is_float = matches!(index.value_types.remove(&key), Some(1 | 2));
    signal.choices = index.choices.remove(&key);
    signal.comment = index.signal_comments.remove(&key);

    let mut attributes = index.signal_attributes.remove(&key).unwrap_or_default();
    if let Some(start) = attributes.remove(ATTR_START_VALUE).and_then(|v| v.as_f64()) {
        signal.raw_initial = Some(if start.fract() == 0.0 && !signal.is_float {
            SignalValue::Int(start as i128)
        } else {
            SignalValue::Float(start)
        });
    }
    if let Some(long) = take_long_name(&mut attributes, ATTR_SIGNAL_LONG_NAME) {
        log::debug!("signal '{}' renamed to its long name '{long}'", rec.name);
        signal.name = long;
    }
    signal.attributes = attributes;
    signal
}

fn expand_ranges(ranges: &[(i64, i64)], signal: &str) -> Vec<i64> {
    let mut ids: Vec<i64> = Vec::new();
    for &(lo, hi) in ranges {
        if hi.saturating_sub(lo) > MAX_MUX_RANGE {
            log::warn!("multiplexer range {lo}-{hi} of signal '{signal}' is too wide, ignored");
            continue;
        }
        ids.extend(lo..=hi);
    }
    ids.sort_unstable();
    ids.dedup();
    ids
}

fn build_relation(
    record: RelationRecord,
    dbc: &DbcSpecifics,
    node_names: &HashMap<String, String>,
    signal_names: &HashMap<SignalKey, String>,
) -> RelationAttribute {
    let RelationRecord {
        name,
        target,
        value,
    } = record;
    let node_name = |n: String| node_names.get(&n).cloned().unwrap_or(n);
    let target = match target {
        RelationRecordTarget::NodeMessage { node, raw_id } => RelationTarget::NodeMessage {
            node: node_name(node),
            frame_id: raw_id,
        },
        RelationRecordTarget::NodeSignal {
            node,
            raw_id,
            signal,
        } => RelationTarget::NodeSignal {
            node: node_name(node),
            frame_id: raw_id,
            signal: signal_names
                .get(&(raw_id, signal.clone()))
                .cloned()
                .unwrap_or(signal),
        },
        RelationRecordTarget::NodeEnvironmentVariable { node, variable } => {
            RelationTarget::NodeEnvironmentVariable {
                node: node_name(node),
                variable,
            }
        }
    };
    RelationAttribute {
        value: typed(dbc, &name, &value),
        name,
        target,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_format_values() {
        assert_eq!(
            frame_format(&AttributeValue::Enum("ExtendedCAN_FD".into())),
            Some((true, true))
        );
        assert_eq!(
            frame_format(&AttributeValue::Enum("StandardCAN".into())),
            Some((false, false))
        );
        assert_eq!(frame_format(&AttributeValue::Int(14)), Some((false, true)));
        assert_eq!(frame_format(&AttributeValue::Int(3)), None);
    }

    #[test]
    fn test_expand_ranges() {
        assert_eq!(expand_ranges(&[(3, 5), (1, 1), (4, 6)], "S"), vec![1, 3, 4, 5, 6]);
        assert!(expand_ranges(&[(0, i64::MAX)], "S").is_empty());
    }

    #[test]
    fn test_rename_nodes_drops_placeholder() {
        let renames = HashMap::from([("ECU".to_string(), "EngineControlUnit".to_string())]);
        assert_eq!(
            rename_nodes(
                vec!["Vector__XXX".into(), "ECU".into(), "Gateway".into(), "ECU".into()],
                &renames
            ),
            vec!["EngineControlUnit".to_string(), "Gateway".to_string()]
        );
    }
}
