//! Central error type for the engine.
//!
//! Every fallible path in `core` converges on [`KvError`], which implements
//! `Display` in the exact shape the wire protocol expects for an error
//! reply (`<CODE> <message>`). `From` impls at the parse/IO boundaries mean
//! call sites use `?` instead of hand-mapping every failure.

use std::fmt;

#[derive(Debug, Clone, thiserror::Error)]
pub enum KvError {
    #[error("WRONGTYPE Operation against a key holding the wrong kind of value")]
    WrongType,

    #[error("ERR wrong number of arguments for '{0}' command")]
    WrongArity(String),

    #[error("ERR value is not an integer or out of range")]
    NotAnInteger,

    #[error("ERR value is not a valid float")]
    NotAFloat,

    #[error("ERR index out of range")]
    IndexOutOfRange,

    #[error("ERR syntax error")]
    Syntax,

    #[error("ERR The XGROUP subcommand requires the key to exist")]
    StreamKeyMissing,

    #[error("NOGROUP No such key '{key}' or consumer group '{group}'")]
    NoGroup { key: String, group: String },

    #[error("BUSYGROUP Consumer Group name already exists")]
    BusyGroup,

    #[error("ERR EXEC without MULTI")]
    ExecWithoutMulti,

    #[error("ERR DISCARD without MULTI")]
    DiscardWithoutMulti,

    #[error("ERR MULTI calls can not be nested")]
    NestedMulti,

    #[error("ERR WATCH inside MULTI is not allowed")]
    WatchInsideMulti,

    #[error("ERR {0} is not allowed in transactions")]
    NotAllowedInTransaction(String),

    #[error("ERR unknown command '{0}'")]
    UnknownCommand(String),

    #[error("ERR Can't execute '{0}' in this context")]
    NotAllowedInSubscribe(String),

    #[error("ERR {0}")]
    Other(String),

    #[error("ERR Protocol error: {0}")]
    Protocol(String),

    #[error("ERR {0}")]
    Io(String),
}

impl KvError {
    /// The id-ordering violation specific to XADD.
    pub fn xadd_id_not_increasing() -> Self {
        KvError::Other(
            "The ID specified in XADD is equal or smaller than the target stream top item"
                .to_string(),
        )
    }
}

impl From<std::io::Error> for KvError {
    fn from(e: std::io::Error) -> Self {
        KvError::Io(e.to_string())
    }
}

impl From<std::num::ParseIntError> for KvError {
    fn from(_: std::num::ParseIntError) -> Self {
        KvError::NotAnInteger
    }
}

impl From<std::num::ParseFloatError> for KvError {
    fn from(_: std::num::ParseFloatError) -> Self {
        KvError::NotAFloat
    }
}

impl From<std::str::Utf8Error> for KvError {
    fn from(e: std::str::Utf8Error) -> Self {
        KvError::Protocol(e.to_string())
    }
}

/// Implemented manually because `thiserror`'s derive doesn't give us
/// `PartialEq` for free and several call sites (transaction queueing,
/// tests) want to compare error variants by value.
impl PartialEq for KvError {
    fn eq(&self, other: &Self) -> bool {
        self.to_string() == other.to_string()
    }
}

/// Formats the same way `Display` does; kept as a distinct helper so call
/// sites that build a `RespValue::Error` can do so without importing
/// `std::fmt::Display` directly.
pub fn error_message(e: &KvError) -> String {
    format!("{e}")
}

pub type KvResult<T> = Result<T, KvError>;

/// Thin wrapper so `anyhow`-based bootstrap code (config loading, socket
/// bind) can report a human-readable chain without polluting `KvError`
/// with startup-only variants.
#[derive(Debug)]
pub struct StartupError(pub anyhow::Error);

impl fmt::Display for StartupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for StartupError {}
