use std::io;
use thiserror::Error;

/// Error produced while tokenizing or parsing DBC text.
///
/// `line` and `column` are 1-based and point at the offending token;
/// `snippet` is the source line it sits on.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at line {line}, column {column}: \"{snippet}\"")]
pub struct ParseError {
    pub line: usize,
    pub column: usize,
    pub snippet: String,
    pub message: String,
}

/// Violations of the message/database model invariants.
///
/// Raised by `refresh()` in strict mode; logged as warnings otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ModelError {
    #[error("signal '{signal}' has a length of zero bits")]
    ZeroLength { signal: String },
    #[error("float signal '{signal}' must be 32 or 64 bits long, not {length}")]
    BadFloatLength { signal: String, length: u32 },
    #[error("signal '{signal}' is {length} bits long, at most 64 bits are supported")]
    SignalTooLong { signal: String, length: u32 },
    #[error("signal '{signal}' starting at bit {start} lies outside the 64 byte frame limit")]
    StartBitOutOfRange { signal: String, start: u32 },
    #[error("signal '{signal}' does not fit in message '{message}' ({length} bytes)")]
    Oversize {
        message: String,
        signal: String,
        length: usize,
    },
    #[error("signal '{signal}' overlaps another signal in message '{message}'")]
    Overlap { message: String, signal: String },
    #[error("frame id 0x{frame_id:X} of '{message}' is wider than {bits} bits")]
    FrameIdTooWide {
        message: String,
        frame_id: u32,
        bits: u32,
    },
    #[error("'{message}' has an invalid payload length of {length} bytes")]
    InvalidLength { message: String, length: usize },
    #[error("frame id 0x{frame_id:X} is shared by '{first}' and '{second}'")]
    DuplicateFrameId {
        frame_id: u32,
        first: String,
        second: String,
    },
    #[error("signal '{signal}' refers to unknown multiplexer '{multiplexer}'")]
    BadSelectorWiring { signal: String, multiplexer: String },
    #[error("contained message '{message}' of container '{container}' has no header id")]
    MissingHeaderId { container: String, message: String },
    #[error("header id 0x{header_id:X} of '{message}' in container '{container}' is wider than 24 bits")]
    HeaderIdTooWide {
        container: String,
        message: String,
        header_id: u32,
    },
    #[error("message '{message}' defines signal '{signal}' more than once")]
    DuplicateSignal { message: String, signal: String },
}

/// Failure while turning a signal mapping into frame bytes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EncodeError {
    #[error("message '{message}' is missing signal '{signal}'")]
    MissingSignal { message: String, signal: String },
    #[error("value {value} of signal '{signal}' is outside [{minimum}, {maximum}]")]
    OutOfRange {
        signal: String,
        value: f64,
        minimum: f64,
        maximum: f64,
    },
    #[error("raw value {raw} of signal '{signal}' does not fit in {length} bits")]
    RawOutOfRange {
        signal: String,
        raw: i128,
        length: u32,
    },
    #[error(transparent)]
    UnknownLabel(#[from] NoSuchChoice),
    #[error("expected a numeric value for signal '{signal}'")]
    NotNumeric { signal: String },
    #[error("invalid multiplexer value {value} for selector '{name}'")]
    BadSelector { name: String, value: i128 },
    #[error("container message '{message}' must be encoded from a list of contained entries")]
    ExpectedContainerEntries { message: String },
    #[error("message '{message}' is not a container")]
    ExpectedSignalMap { message: String },
    #[error("container '{container}' has no contained message {key}")]
    UnknownContainedMessage { container: String, key: String },
    #[error("contained message '{message}' has no header id")]
    MissingHeaderId { message: String },
    #[error("contained payloads need {needed} bytes, container '{container}' holds {length}")]
    ContainerOverflow {
        container: String,
        needed: usize,
        length: usize,
    },
    #[error("header id 0x{header_id:X} is wider than 24 bits")]
    HeaderIdTooWide { header_id: u32 },
    #[error("contained payload of {length} bytes exceeds the 255 byte block limit")]
    BlockTooLong { length: usize },
    #[error("no message matches {key}")]
    NoSuchMessage { key: String },
}

/// Failure while turning frame bytes into a signal mapping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("'{message}' expects {expected} bytes, got {actual}")]
    WrongSize {
        message: String,
        expected: usize,
        actual: usize,
    },
    #[error("invalid multiplexer value {value} for selector '{name}'")]
    BadSelector { name: String, value: i128 },
    #[error("malformed container '{message}': {reason}")]
    MalformedContainer { message: String, reason: String },
    #[error("'{message}' is a container, decode it with `decode_containers` enabled")]
    ContainerNotDecoded { message: String },
    #[error("'{message}' is not a container message")]
    NotAContainer { message: String },
    #[error("failed to unpack '{message}': {reason}")]
    UnpackFailed { message: String, reason: String },
    #[error("no message matches {key}")]
    NoSuchMessage { key: String },
}

/// Label lookup on a conversion without a value table, or with an unknown label.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("no such choice '{choice}'")]
pub struct NoSuchChoice {
    pub choice: String,
}

/// Errors surfaced at the load/dump boundary.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Model(#[from] ModelError),
    #[error("Failed while reading '{path}'. \nError: {source}")]
    Read {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("Failed while writing '{path}'. \nError: {source}")]
    Write {
        path: String,
        #[source]
        source: io::Error,
    },
    #[error("Failed to format DBC output")]
    Format(#[from] std::fmt::Error),
    #[error("no registered database format accepts the input")]
    UnsupportedFormat,
}
