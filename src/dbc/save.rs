use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt::{self, Write as FmtWrite};

use crate::dbc::build::{
    ATTR_BUS_TYPE, ATTR_CYCLE_TIME, ATTR_FRAME_FORMAT, ATTR_MESSAGE_LONG_NAME,
    ATTR_NODE_LONG_NAME, ATTR_SEND_TYPE, ATTR_SIGNAL_LONG_NAME, ATTR_START_VALUE, EXTENDED_FLAG,
    NO_NODE,
};
use crate::types::{
    attributes::{
        AttrObject, AttrValueType, AttributeDefinition, AttributeValue, DbcSpecifics,
        RelationTarget,
    },
    conversion::Choices,
    database::Database,
    errors::Error,
    message::Message,
    signal::{ByteOrder, Signal, SignalSort},
};

const NS_KEYWORDS: &[&str] = &[
    "NS_DESC_",
    "CM_",
    "BA_DEF_",
    "BA_",
    "VAL_",
    "CAT_DEF_",
    "CAT_",
    "FILTER",
    "BA_DEF_DEF_",
    "EV_DATA_",
    "ENVVAR_DATA_",
    "SGTYPE_",
    "SGTYPE_VAL_",
    "BA_DEF_SGTYPE_",
    "BA_SGTYPE_",
    "SIG_TYPE_REF_",
    "VAL_TABLE_",
    "SIG_GROUP_",
    "SIG_VALTYPE_",
    "SIGTYPE_VALTYPE_",
    "BO_TX_BU_",
    "BA_DEF_REL_",
    "BA_REL_",
    "BA_DEF_DEF_REL_",
    "BU_SG_REL_",
    "BU_EV_REL_",
    "BU_BO_REL_",
    "SG_MUL_VAL_",
];

/// Longest identifier written as is.
const MAX_NAME_LENGTH: usize = 32;
/// Characters kept from a shortened name, before `_NNNN`.
const SHORT_PREFIX_LENGTH: usize = 27;

const ATTR_CANFD_BRS: &str = "CANFD_BRS";

/// Knobs applied while writing DBC text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DumpOptions {
    /// Order signals are written in within each `BO_` block.
    pub sort_signals: SignalSort,
    /// Shorten identifiers longer than 32 characters and keep the full
    /// name in a `System*LongSymbol` attribute.
    pub shorten_long_names: bool,
}

impl Default for DumpOptions {
    fn default() -> Self {
        DumpOptions {
            sort_signals: SignalSort::StartBitReversed,
            shorten_long_names: true,
        }
    }
}

/// Identifier rewriting for one output: long names are cut down to 32
/// characters with a unique numeric suffix.
struct Shortener {
    enabled: bool,
    used: HashSet<String>,
    counter: usize,
}

impl Shortener {
    fn new(enabled: bool) -> Self {
        Shortener {
            enabled,
            used: HashSet::new(),
            counter: 0,
        }
    }

    /// Emitted form of `name`, unique among the names seen so far.
    fn shorten(&mut self, name: &str) -> String {
        let fits = !self.enabled || name.chars().count() <= MAX_NAME_LENGTH;
        if fits && self.used.insert(name.to_string()) {
            return name.to_string();
        }
        let prefix: String = if self.enabled {
            name.chars().take(SHORT_PREFIX_LENGTH).collect()
        } else {
            name.to_string()
        };
        loop {
            let candidate = format!("{prefix}_{:04}", self.counter);
            self.counter += 1;
            if self.used.insert(candidate.clone()) {
                log::debug!("name '{name}' written as '{candidate}'");
                return candidate;
            }
        }
    }
}

/// Signal identifier with non-word characters replaced.
fn sanitize_signal_name(name: &str) -> String {
    let mut out: String = name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    if out.is_empty() || out.starts_with(|c: char| c.is_ascii_digit()) {
        out.insert(0, '_');
    }
    out
}

/// Identifiers as written to the file, by model name.
struct EmitNames {
    nodes: HashMap<String, String>,
    messages: Vec<MessageNames>,
}

struct MessageNames {
    name: String,
    signals: HashMap<String, String>,
}

impl MessageNames {
    fn signal<'a>(&'a self, model: &'a str) -> &'a str {
        self.signals.get(model).map_or(model, String::as_str)
    }
}

impl EmitNames {
    fn new(db: &Database, options: &DumpOptions) -> Self {
        let mut shortener = Shortener::new(options.shorten_long_names);
        let nodes = db
            .nodes
            .iter()
            .map(|n| (n.name.clone(), shortener.shorten(&n.name)))
            .collect();

        let mut shortener = Shortener::new(options.shorten_long_names);
        let messages = db
            .iter_messages()
            .map(|message| {
                let name = shortener.shorten(&message.name);
                let mut signal_shortener = Shortener::new(options.shorten_long_names);
                let signals = message
                    .signals()
                    .iter()
                    .map(|s| {
                        let emitted = signal_shortener.shorten(&sanitize_signal_name(&s.name));
                        (s.name.clone(), emitted)
                    })
                    .collect();
                MessageNames { name, signals }
            })
            .collect();

        EmitNames { nodes, messages }
    }

    fn node<'a>(&'a self, model: &'a str) -> &'a str {
        self.nodes.get(model).map_or(model, String::as_str)
    }
}

/// Frame id as written in DBC records.
fn dbc_id(message: &Message) -> u32 {
    if message.is_extended_frame {
        message.frame_id | EXTENDED_FLAG
    } else {
        message.frame_id
    }
}

/// Serializes `db` as DBC text with CRLF line endings.
pub(crate) fn dump_string(db: &Database, options: &DumpOptions) -> Result<String, Error> {
    let names = EmitNames::new(db, options);
    let definitions = effective_definitions(db, &names);
    let mut out = String::new();

    line(
        &mut out,
        format_args!("VERSION \"{}\"", escape_dbc_string(db.version.as_deref().unwrap_or(""))),
    )?;
    out.push_str("\r\n");

    line(&mut out, format_args!("NS_ :"))?;
    for keyword in NS_KEYWORDS {
        line(&mut out, format_args!("\t{keyword}"))?;
    }
    out.push_str("\r\n");

    line(&mut out, format_args!("BS_:"))?;
    out.push_str("\r\n");

    let node_list: Vec<&str> = db.nodes.iter().map(|n| names.node(&n.name)).collect();
    line(&mut out, format_args!("BU_: {}", node_list.join(" ")))?;
    out.push_str("\r\n");

    write_value_tables(&db.dbc.value_tables, &mut out)?;
    write_messages(db, &names, options, &mut out)?;
    write_bo_tx_bu(db, &names, &mut out)?;
    write_environment_variables(db, &names, &mut out)?;
    write_comments(db, &names, &mut out)?;
    write_attribute_definitions(&definitions, &db.dbc, &mut out)?;
    write_attribute_assignments(db, &names, &definitions, &mut out)?;
    write_value_descriptions(db, &names, &mut out)?;
    write_sig_valtype(db, &names, &mut out)?;
    write_signal_groups(db, &names, &mut out)?;
    write_mux_ranges(db, &names, &mut out)?;

    Ok(out)
}

fn line(out: &mut String, args: fmt::Arguments<'_>) -> fmt::Result {
    out.write_fmt(args)?;
    out.push_str("\r\n");
    Ok(())
}

fn uses_fd(db: &Database) -> bool {
    db.iter_messages().any(|m| m.is_fd)
}

/// Declared attribute definitions plus the ones the model needs but the
/// source did not declare.
fn effective_definitions(db: &Database, names: &EmitNames) -> BTreeMap<String, AttributeDefinition> {
    let mut definitions = db.dbc.attribute_definitions.clone();
    let mut ensure = |definition: AttributeDefinition| {
        definitions
            .entry(definition.name.clone())
            .or_insert(definition);
    };

    let messages: Vec<&Message> = db.iter_messages().collect();
    if messages.iter().any(|m| m.cycle_time.is_some()) {
        let mut def = AttributeDefinition::new(ATTR_CYCLE_TIME, AttrObject::Message, AttrValueType::Int);
        def.minimum = Some(0.0);
        def.maximum = Some(65535.0);
        def.default = Some(AttributeValue::Int(0));
        ensure(def);
    }
    if messages.iter().any(|m| m.send_type.is_some()) {
        let mut def = AttributeDefinition::new(ATTR_SEND_TYPE, AttrObject::Message, AttrValueType::String);
        def.default = Some(AttributeValue::Str(String::new()));
        ensure(def);
    }
    if messages
        .iter()
        .any(|m| m.signals().iter().any(|s| s.raw_initial.is_some()))
    {
        let mut def = AttributeDefinition::new(ATTR_START_VALUE, AttrObject::Signal, AttrValueType::Float);
        def.minimum = Some(0.0);
        def.maximum = Some(100000000000.0);
        def.default = Some(AttributeValue::Float(0.0));
        ensure(def);
    }
    if uses_fd(db) {
        let mut labels: Vec<&str> = vec!["StandardCAN", "ExtendedCAN"];
        labels.extend(std::iter::repeat_n("reserved", 12));
        labels.extend(["StandardCAN_FD", "ExtendedCAN_FD"]);
        let mut def = AttributeDefinition::new_enum(ATTR_FRAME_FORMAT, AttrObject::Message, &labels);
        def.default = Some(AttributeValue::Enum("StandardCAN".into()));
        ensure(def);

        let mut def = AttributeDefinition::new_enum(ATTR_CANFD_BRS, AttrObject::Message, &["0", "1"]);
        def.default = Some(AttributeValue::Enum("1".into()));
        ensure(def);

        let mut def = AttributeDefinition::new(ATTR_BUS_TYPE, AttrObject::Database, AttrValueType::String);
        def.default = Some(AttributeValue::Str(String::new()));
        ensure(def);
    }

    let long_names = [
        (
            ATTR_NODE_LONG_NAME,
            AttrObject::Node,
            db.nodes.iter().any(|n| names.node(&n.name) != n.name),
        ),
        (
            ATTR_MESSAGE_LONG_NAME,
            AttrObject::Message,
            messages
                .iter()
                .zip(&names.messages)
                .any(|(m, n)| n.name != m.name),
        ),
        (
            ATTR_SIGNAL_LONG_NAME,
            AttrObject::Signal,
            messages.iter().zip(&names.messages).any(|(m, n)| {
                m.signals().iter().any(|s| n.signal(&s.name) != s.name)
            }),
        ),
    ];
    for (name, object, used) in long_names {
        if used {
            let mut def = AttributeDefinition::new(name, object, AttrValueType::String);
            def.default = Some(AttributeValue::Str(String::new()));
            ensure(def);
        }
    }
    definitions
}

fn write_value_tables(tables: &BTreeMap<String, Choices>, out: &mut String) -> fmt::Result {
    for (name, choices) in tables {
        write!(out, "VAL_TABLE_ {name}")?;
        write_choices(choices, out)?;
        line(out, format_args!(" ;"))?;
    }
    if !tables.is_empty() {
        out.push_str("\r\n");
    }
    Ok(())
}

fn write_choices(choices: &Choices, out: &mut String) -> fmt::Result {
    for (value, label) in choices.iter().rev() {
        write!(out, " {value} \"{}\"", escape_dbc_string(label))?;
    }
    Ok(())
}

/// Whether multiplexing of `message` needs `SG_MUL_VAL_` records.
fn needs_extended_mux(message: &Message) -> bool {
    let signals = message.signals();
    signals.iter().filter(|s| s.is_multiplexer).count() > 1
        || signals
            .iter()
            .any(|s| s.multiplexer_ids.as_ref().is_some_and(|ids| ids.len() != 1))
}

fn format_mux_tag(signal: &Signal) -> String {
    let selected = signal
        .multiplexer_ids
        .as_ref()
        .and_then(|ids| ids.first())
        .map(|id| format!("m{id}"));
    match (selected, signal.is_multiplexer) {
        (Some(tag), true) => format!(" {tag}M"),
        (Some(tag), false) => format!(" {tag}"),
        (None, true) => " M".to_string(),
        (None, false) => String::new(),
    }
}

fn write_messages(
    db: &Database,
    names: &EmitNames,
    options: &DumpOptions,
    out: &mut String,
) -> fmt::Result {
    for (message, msg_names) in db.iter_messages().zip(&names.messages) {
        let transmitter = message
            .senders
            .first()
            .map_or(NO_NODE, |s| names.node(s));
        line(
            out,
            format_args!(
                "BO_ {} {}: {} {}",
                dbc_id(message),
                msg_names.name,
                message.length(),
                transmitter
            ),
        )?;

        for signal in options.sort_signals.sorted(message.signals()) {
            let endian = match signal.byte_order {
                ByteOrder::LittleEndian => '1',
                ByteOrder::BigEndian => '0',
            };
            let sign_char = if signal.is_signed { '-' } else { '+' };
            let receivers: Vec<&str> = signal.receivers.iter().map(|r| names.node(r)).collect();
            let receivers_field = if receivers.is_empty() {
                NO_NODE.to_string()
            } else {
                receivers.join(",")
            };
            line(
                out,
                format_args!(
                    " SG_ {}{} : {}|{}@{}{} ({},{}) [{}|{}] \"{}\" {}",
                    msg_names.signal(&signal.name),
                    format_mux_tag(signal),
                    signal.start,
                    signal.length,
                    endian,
                    sign_char,
                    format_f64(signal.scale),
                    format_f64(signal.offset),
                    format_f64(signal.minimum.unwrap_or(0.0)),
                    format_f64(signal.maximum.unwrap_or(0.0)),
                    escape_dbc_string(signal.unit.as_deref().unwrap_or("")),
                    receivers_field
                ),
            )?;
        }
        out.push_str("\r\n");
    }
    Ok(())
}

fn write_bo_tx_bu(db: &Database, names: &EmitNames, out: &mut String) -> fmt::Result {
    let mut written = false;
    for message in db.iter_messages().filter(|m| m.senders.len() > 1) {
        let transmitters: Vec<&str> = message.senders.iter().map(|s| names.node(s)).collect();
        line(
            out,
            format_args!("BO_TX_BU_ {} : {};", dbc_id(message), transmitters.join(",")),
        )?;
        written = true;
    }
    if written {
        out.push_str("\r\n");
    }
    Ok(())
}

fn write_environment_variables(db: &Database, names: &EmitNames, out: &mut String) -> fmt::Result {
    let variables = &db.dbc.environment_variables;
    for ev in variables.values() {
        let nodes: Vec<&str> = ev.access_nodes.iter().map(|n| names.node(n)).collect();
        let nodes = if nodes.is_empty() {
            NO_NODE.to_string()
        } else {
            nodes.join(",")
        };
        line(
            out,
            format_args!(
                "EV_ {}: {} [{}|{}] \"{}\" {} {} {} {};",
                ev.name,
                ev.env_type,
                format_f64(ev.minimum),
                format_f64(ev.maximum),
                escape_dbc_string(&ev.unit),
                format_f64(ev.initial_value),
                ev.env_id,
                ev.access_type,
                nodes
            ),
        )?;
    }
    if !variables.is_empty() {
        out.push_str("\r\n");
    }
    Ok(())
}

fn write_comments(db: &Database, names: &EmitNames, out: &mut String) -> fmt::Result {
    if let Some(comment) = &db.comment {
        line(out, format_args!("CM_ \"{}\";", escape_dbc_string(comment)))?;
    }
    for node in &db.nodes {
        if let Some(comment) = &node.comment {
            line(
                out,
                format_args!("CM_ BU_ {} \"{}\";", names.node(&node.name), escape_dbc_string(comment)),
            )?;
        }
    }
    for message in db.iter_messages() {
        if let Some(comment) = &message.comment {
            line(
                out,
                format_args!("CM_ BO_ {} \"{}\";", dbc_id(message), escape_dbc_string(comment)),
            )?;
        }
    }
    for (message, msg_names) in db.iter_messages().zip(&names.messages) {
        for signal in message.signals() {
            if let Some(comment) = &signal.comment {
                line(
                    out,
                    format_args!(
                        "CM_ SG_ {} {} \"{}\";",
                        dbc_id(message),
                        msg_names.signal(&signal.name),
                        escape_dbc_string(comment)
                    ),
                )?;
            }
        }
    }
    for ev in db.dbc.environment_variables.values() {
        if let Some(comment) = &ev.comment {
            line(
                out,
                format_args!("CM_ EV_ {} \"{}\";", ev.name, escape_dbc_string(comment)),
            )?;
        }
    }
    Ok(())
}

fn format_attribute_def(def: &AttributeDefinition) -> String {
    let bounds = |as_int: bool| {
        let (min, max) = (def.minimum.unwrap_or(0.0), def.maximum.unwrap_or(0.0));
        if as_int {
            format!("{min:.0} {max:.0}")
        } else {
            format!("{} {}", format_f64(min), format_f64(max))
        }
    };
    match def.value_type {
        AttrValueType::String => "STRING".to_string(),
        AttrValueType::Int => format!("INT {}", bounds(true)),
        AttrValueType::Hex => format!("HEX {}", bounds(true)),
        AttrValueType::Float => format!("FLOAT {}", bounds(false)),
        AttrValueType::Enum => {
            let joined = def
                .enum_values
                .iter()
                .map(|value| format!("\"{}\"", escape_dbc_string(value)))
                .collect::<Vec<_>>()
                .join(",");
            format!("ENUM {joined}")
        }
    }
}

fn write_attribute_definitions(
    definitions: &BTreeMap<String, AttributeDefinition>,
    dbc: &DbcSpecifics,
    out: &mut String,
) -> fmt::Result {
    for (name, def) in definitions {
        let object = def.object.keyword();
        let separator = if object.is_empty() { "" } else { " " };
        line(
            out,
            format_args!("BA_DEF_ {object}{separator}\"{name}\" {};", format_attribute_def(def)),
        )?;
    }
    for (name, def) in &dbc.relation_definitions {
        line(
            out,
            format_args!(
                "BA_DEF_REL_ {} \"{name}\" {};",
                def.object.keyword(),
                format_attribute_def(def)
            ),
        )?;
    }
    for (name, def) in definitions {
        if let Some(default) = &def.default {
            line(
                out,
                format_args!("BA_DEF_DEF_ \"{name}\" {};", format_attribute_value(default, Some(def))),
            )?;
        }
    }
    for (name, def) in &dbc.relation_definitions {
        if let Some(default) = &def.default {
            line(
                out,
                format_args!("BA_DEF_DEF_REL_ \"{name}\" {};", format_attribute_value(default, Some(def))),
            )?;
        }
    }
    Ok(())
}

fn write_attribute_assignments(
    db: &Database,
    names: &EmitNames,
    definitions: &BTreeMap<String, AttributeDefinition>,
    out: &mut String,
) -> fmt::Result {
    let value_of = |name: &str, value: &AttributeValue| {
        format_attribute_value(value, definitions.get(name))
    };

    let mut db_attributes = db.dbc.attributes.clone();
    if uses_fd(db) && !db_attributes.contains_key(ATTR_BUS_TYPE) {
        db_attributes.insert(ATTR_BUS_TYPE.to_string(), AttributeValue::Str("CAN FD".into()));
    }
    for (name, value) in &db_attributes {
        line(out, format_args!("BA_ \"{name}\" {};", value_of(name, value)))?;
    }

    for node in &db.nodes {
        let emitted = names.node(&node.name);
        let mut attributes = node.attributes.clone();
        if emitted != node.name {
            attributes.insert(ATTR_NODE_LONG_NAME.into(), AttributeValue::Str(node.name.clone()));
        }
        for (name, value) in &attributes {
            line(
                out,
                format_args!("BA_ \"{name}\" BU_ {emitted} {};", value_of(name, value)),
            )?;
        }
    }

    let fd = uses_fd(db);
    for (message, msg_names) in db.iter_messages().zip(&names.messages) {
        let mut attributes = message.attributes.clone();
        if let Some(cycle_time) = message.cycle_time {
            attributes.insert(ATTR_CYCLE_TIME.into(), AttributeValue::Int(cycle_time as i64));
        }
        if let Some(send_type) = &message.send_type {
            attributes.insert(ATTR_SEND_TYPE.into(), AttributeValue::Str(send_type.clone()));
        }
        if fd {
            let label = match (message.is_fd, message.is_extended_frame) {
                (false, false) => "StandardCAN",
                (false, true) => "ExtendedCAN",
                (true, false) => "StandardCAN_FD",
                (true, true) => "ExtendedCAN_FD",
            };
            attributes.insert(ATTR_FRAME_FORMAT.into(), AttributeValue::Enum(label.into()));
        }
        if msg_names.name != message.name {
            attributes.insert(
                ATTR_MESSAGE_LONG_NAME.into(),
                AttributeValue::Str(message.name.clone()),
            );
        }
        for (name, value) in &attributes {
            line(
                out,
                format_args!("BA_ \"{name}\" BO_ {} {};", dbc_id(message), value_of(name, value)),
            )?;
        }
    }

    for (message, msg_names) in db.iter_messages().zip(&names.messages) {
        for signal in message.signals() {
            let emitted = msg_names.signal(&signal.name);
            let mut attributes = signal.attributes.clone();
            if let Some(initial) = &signal.raw_initial {
                attributes.insert(ATTR_START_VALUE.into(), AttributeValue::Float(initial.as_f64()));
            }
            if emitted != signal.name {
                attributes.insert(
                    ATTR_SIGNAL_LONG_NAME.into(),
                    AttributeValue::Str(signal.name.clone()),
                );
            }
            for (name, value) in &attributes {
                line(
                    out,
                    format_args!(
                        "BA_ \"{name}\" SG_ {} {emitted} {};",
                        dbc_id(message),
                        value_of(name, value)
                    ),
                )?;
            }
        }
    }

    for ev in db.dbc.environment_variables.values() {
        for (name, value) in &ev.attributes {
            line(
                out,
                format_args!("BA_ \"{name}\" EV_ {} {};", ev.name, value_of(name, value)),
            )?;
        }
    }

    write_relation_attributes(db, names, out)
}

fn write_relation_attributes(db: &Database, names: &EmitNames, out: &mut String) -> fmt::Result {
    // (dbc id, model signal name) -> emitted name
    let mut signal_names: HashMap<(u32, &str), &str> = HashMap::new();
    for (message, msg_names) in db.iter_messages().zip(&names.messages) {
        for signal in message.signals() {
            signal_names.insert((dbc_id(message), &signal.name), msg_names.signal(&signal.name));
        }
    }

    for attribute in &db.dbc.relation_attributes {
        let value = format_attribute_value(
            &attribute.value,
            db.dbc.relation_definitions.get(&attribute.name),
        );
        let name = &attribute.name;
        match &attribute.target {
            RelationTarget::NodeSignal {
                node,
                frame_id,
                signal,
            } => {
                let signal = signal_names
                    .get(&(*frame_id, signal.as_str()))
                    .copied()
                    .unwrap_or(signal.as_str());
                line(
                    out,
                    format_args!(
                        "BA_REL_ \"{name}\" BU_SG_REL_ {} SG_ {frame_id} {signal} {value};",
                        names.node(node)
                    ),
                )?;
            }
            RelationTarget::NodeMessage { node, frame_id } => line(
                out,
                format_args!(
                    "BA_REL_ \"{name}\" BU_BO_REL_ {} {frame_id} {value};",
                    names.node(node)
                ),
            )?,
            RelationTarget::NodeEnvironmentVariable { node, variable } => line(
                out,
                format_args!(
                    "BA_REL_ \"{name}\" BU_EV_REL_ {} {variable} {value};",
                    names.node(node)
                ),
            )?,
        }
    }
    Ok(())
}

fn write_value_descriptions(db: &Database, names: &EmitNames, out: &mut String) -> fmt::Result {
    for (message, msg_names) in db.iter_messages().zip(&names.messages) {
        for signal in message.signals() {
            if let Some(choices) = signal.choices.as_ref().filter(|c| !c.is_empty()) {
                write!(out, "VAL_ {} {}", dbc_id(message), msg_names.signal(&signal.name))?;
                write_choices(choices, out)?;
                line(out, format_args!(" ;"))?;
            }
        }
    }
    for ev in db.dbc.environment_variables.values() {
        if let Some(choices) = ev.choices.as_ref().filter(|c| !c.is_empty()) {
            write!(out, "VAL_ {}", ev.name)?;
            write_choices(choices, out)?;
            line(out, format_args!(" ;"))?;
        }
    }
    Ok(())
}

fn write_sig_valtype(db: &Database, names: &EmitNames, out: &mut String) -> fmt::Result {
    for (message, msg_names) in db.iter_messages().zip(&names.messages) {
        for signal in message.signals().iter().filter(|s| s.is_float) {
            let code = if signal.length == 64 { 2 } else { 1 };
            line(
                out,
                format_args!(
                    "SIG_VALTYPE_ {} {} : {code};",
                    dbc_id(message),
                    msg_names.signal(&signal.name)
                ),
            )?;
        }
    }
    Ok(())
}

fn write_signal_groups(db: &Database, names: &EmitNames, out: &mut String) -> fmt::Result {
    for (message, msg_names) in db.iter_messages().zip(&names.messages) {
        for group in &message.signal_groups {
            let members: Vec<&str> = group
                .signal_names
                .iter()
                .map(|s| msg_names.signal(s))
                .collect();
            line(
                out,
                format_args!(
                    "SIG_GROUP_ {} {} {} : {};",
                    dbc_id(message),
                    group.name,
                    group.repetitions,
                    members.join(" ")
                ),
            )?;
        }
    }
    Ok(())
}

/// Collapses sorted ids into inclusive ranges.
fn id_ranges(ids: &[i64]) -> Vec<(i64, i64)> {
    let mut sorted = ids.to_vec();
    sorted.sort_unstable();
    sorted.dedup();
    let mut ranges: Vec<(i64, i64)> = Vec::new();
    for id in sorted {
        match ranges.last_mut() {
            Some((_, hi)) if *hi + 1 == id => *hi = id,
            _ => ranges.push((id, id)),
        }
    }
    ranges
}

fn write_mux_ranges(db: &Database, names: &EmitNames, out: &mut String) -> fmt::Result {
    for (message, msg_names) in db.iter_messages().zip(&names.messages) {
        if !needs_extended_mux(message) {
            continue;
        }
        for signal in message.signals() {
            let (Some(ids), Some(multiplexer)) = (&signal.multiplexer_ids, &signal.multiplexer_signal)
            else {
                continue;
            };
            let ranges: Vec<String> = id_ranges(ids)
                .into_iter()
                .map(|(lo, hi)| format!("{lo}-{hi}"))
                .collect();
            line(
                out,
                format_args!(
                    "SG_MUL_VAL_ {} {} {} {};",
                    dbc_id(message),
                    msg_names.signal(&signal.name),
                    msg_names.signal(multiplexer),
                    ranges.join(", ")
                ),
            )?;
        }
    }
    Ok(())
}

fn format_attribute_value(value: &AttributeValue, def: Option<&AttributeDefinition>) -> String {
    match value {
        AttributeValue::Str(s) => format!("\"{}\"", escape_dbc_string(s)),
        AttributeValue::Int(v) => v.to_string(),
        AttributeValue::Hex(v) => v.to_string(),
        AttributeValue::Float(v) => format_f64(*v),
        AttributeValue::Enum(selected) => {
            if let Some(idx) = def
                .filter(|d| d.value_type == AttrValueType::Enum)
                .and_then(|d| d.enum_index(selected))
            {
                return idx.to_string();
            }
            format!("\"{}\"", escape_dbc_string(selected))
        }
    }
}

/// Shortest text that reads back as the same `f64`.
fn format_f64(value: f64) -> String {
    let abs = value.abs();
    if value.fract() == 0.0 && abs < 1e15 {
        format!("{value:.0}")
    } else if abs >= 1e15 || (abs != 0.0 && abs < 1e-6) {
        format!("{value:E}")
    } else {
        format!("{value}")
    }
}

fn escape_dbc_string(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for ch in input.chars() {
        match ch {
            '"' => escaped.push_str("\\\""),
            '\\' => escaped.push_str("\\\\"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_f64() {
        assert_eq!(format_f64(8.0), "8");
        assert_eq!(format_f64(-250.0), "-250");
        assert_eq!(format_f64(0.0625), "0.0625");
        assert_eq!(format_f64(3.4e38), "3.4E38");
        assert_eq!(format_f64(1e-9), "1E-9");
    }

    #[test]
    fn test_shortener_keeps_names_unique() {
        let mut shortener = Shortener::new(true);
        let long = "A".repeat(40);
        let first = shortener.shorten(&long);
        let second = shortener.shorten(&long);
        assert_eq!(first.len(), MAX_NAME_LENGTH);
        assert_eq!(first, format!("{}_0000", "A".repeat(27)));
        assert_ne!(first, second);
        assert_eq!(shortener.shorten("Short"), "Short");

        let mut disabled = Shortener::new(false);
        assert_eq!(disabled.shorten(&long), long);
    }

    #[test]
    fn test_shortener_separates_colliding_names() {
        let mut shortener = Shortener::new(true);
        assert_eq!(shortener.shorten(&sanitize_signal_name("A.B")), "A_B");
        assert_eq!(shortener.shorten(&sanitize_signal_name("A_B")), "A_B_0000");

        let mut disabled = Shortener::new(false);
        assert_eq!(disabled.shorten("A_B"), "A_B");
        assert_eq!(disabled.shorten("A_B"), "A_B_0000");
    }

    #[test]
    fn test_sanitize_signal_name() {
        assert_eq!(sanitize_signal_name("Speed"), "Speed");
        assert_eq!(sanitize_signal_name("Wheel.Speed FL"), "Wheel_Speed_FL");
        assert_eq!(sanitize_signal_name("4WD"), "_4WD");
    }

    #[test]
    fn test_id_ranges() {
        assert_eq!(id_ranges(&[7, 0, 1, 2, 5, 6]), vec![(0, 2), (5, 7)]);
        assert!(id_ranges(&[]).is_empty());
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape_dbc_string(r#"say "hi" \o/"#), r#"say \"hi\" \\o/"#);
    }
}
