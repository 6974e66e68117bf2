//! The tagged union every key is bound to, plus the per-key envelope
//! (expiration, mutation version) that wraps it inside a shard.

use std::collections::{HashSet, VecDeque};

use bytes::Bytes;
use indexmap::IndexMap;

use crate::core::errors::KvError;
use crate::core::storage::stream::Stream;
use crate::core::storage::zset::SortedSet;
use crate::core::types::{Millis, Version};

#[derive(Debug, Clone)]
pub enum DataValue {
    String(Bytes),
    Hash(IndexMap<Bytes, Bytes>),
    List(VecDeque<Bytes>),
    Set(HashSet<Bytes>),
    SortedSet(SortedSet),
    Stream(Stream),
}

impl DataValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            DataValue::String(_) => "string",
            DataValue::Hash(_) => "hash",
            DataValue::List(_) => "list",
            DataValue::Set(_) => "set",
            DataValue::SortedSet(_) => "zset",
            DataValue::Stream(_) => "stream",
        }
    }

    pub fn is_empty_container(&self) -> bool {
        match self {
            DataValue::String(_) => false,
            DataValue::Hash(m) => m.is_empty(),
            DataValue::List(l) => l.is_empty(),
            DataValue::Set(s) => s.is_empty(),
            DataValue::SortedSet(z) => z.is_empty(),
            DataValue::Stream(_) => false,
        }
    }

    pub fn as_string(&self) -> Result<&Bytes, KvError> {
        match self {
            DataValue::String(b) => Ok(b),
            _ => Err(KvError::WrongType),
        }
    }

    pub fn as_string_mut(&mut self) -> Result<&mut Bytes, KvError> {
        match self {
            DataValue::String(b) => Ok(b),
            _ => Err(KvError::WrongType),
        }
    }

    pub fn as_hash(&self) -> Result<&IndexMap<Bytes, Bytes>, KvError> {
        match self {
            DataValue::Hash(m) => Ok(m),
            _ => Err(KvError::WrongType),
        }
    }

    pub fn as_hash_mut(&mut self) -> Result<&mut IndexMap<Bytes, Bytes>, KvError> {
        match self {
            DataValue::Hash(m) => Ok(m),
            _ => Err(KvError::WrongType),
        }
    }

    pub fn as_list(&self) -> Result<&VecDeque<Bytes>, KvError> {
        match self {
            DataValue::List(l) => Ok(l),
            _ => Err(KvError::WrongType),
        }
    }

    pub fn as_list_mut(&mut self) -> Result<&mut VecDeque<Bytes>, KvError> {
        match self {
            DataValue::List(l) => Ok(l),
            _ => Err(KvError::WrongType),
        }
    }

    pub fn as_set(&self) -> Result<&HashSet<Bytes>, KvError> {
        match self {
            DataValue::Set(s) => Ok(s),
            _ => Err(KvError::WrongType),
        }
    }

    pub fn as_set_mut(&mut self) -> Result<&mut HashSet<Bytes>, KvError> {
        match self {
            DataValue::Set(s) => Ok(s),
            _ => Err(KvError::WrongType),
        }
    }

    pub fn as_zset(&self) -> Result<&SortedSet, KvError> {
        match self {
            DataValue::SortedSet(z) => Ok(z),
            _ => Err(KvError::WrongType),
        }
    }

    pub fn as_zset_mut(&mut self) -> Result<&mut SortedSet, KvError> {
        match self {
            DataValue::SortedSet(z) => Ok(z),
            _ => Err(KvError::WrongType),
        }
    }

    pub fn as_stream(&self) -> Result<&Stream, KvError> {
        match self {
            DataValue::Stream(s) => Ok(s),
            _ => Err(KvError::WrongType),
        }
    }

    pub fn as_stream_mut(&mut self) -> Result<&mut Stream, KvError> {
        match self {
            DataValue::Stream(s) => Ok(s),
            _ => Err(KvError::WrongType),
        }
    }
}

/// The envelope a shard actually stores per key: the typed value, an
/// optional absolute expiration, and the mutation version WATCH compares.
#[derive(Debug, Clone)]
pub struct StoredValue {
    pub data: DataValue,
    pub expires_at: Option<Millis>,
    pub version: Version,
}

impl StoredValue {
    pub fn new(data: DataValue) -> Self {
        StoredValue {
            data,
            expires_at: None,
            version: 0,
        }
    }

    pub fn is_expired(&self, now: Millis) -> bool {
        matches!(self.expires_at, Some(t) if t <= now)
    }

    pub fn bump_version(&mut self) {
        self.version = self.version.wrapping_add(1);
    }
}
