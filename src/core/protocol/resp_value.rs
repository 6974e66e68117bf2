//! The value shapes the engine hands back to the dispatcher, before they
//! are lowered into wire frames by the codec.

use bytes::Bytes;

#[derive(Debug, Clone, PartialEq)]
pub enum RespValue {
    SimpleString(Bytes),
    Error(Bytes),
    Integer(i64),
    BulkString(Bytes),
    NullBulk,
    Array(Vec<RespValue>),
    NullArray,
}

impl RespValue {
    pub fn ok() -> Self {
        RespValue::SimpleString(Bytes::from_static(b"OK"))
    }

    pub fn simple(s: impl Into<Vec<u8>>) -> Self {
        RespValue::SimpleString(Bytes::from(s.into()))
    }

    pub fn error(s: impl Into<Vec<u8>>) -> Self {
        RespValue::Error(Bytes::from(s.into()))
    }

    pub fn bulk(b: impl Into<Bytes>) -> Self {
        RespValue::BulkString(b.into())
    }

    pub fn from_i64(n: i64) -> Self {
        RespValue::Integer(n)
    }

    pub fn array(items: Vec<RespValue>) -> Self {
        RespValue::Array(items)
    }
}

impl From<crate::core::errors::KvError> for RespValue {
    fn from(e: crate::core::errors::KvError) -> Self {
        RespValue::Error(Bytes::from(crate::core::errors::error_message(&e)))
    }
}
