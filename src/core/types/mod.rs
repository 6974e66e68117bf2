//! Common type aliases shared across the engine.

use bytes::Bytes;

/// A key or value as seen by the store: an owned, cheaply-cloneable byte
/// buffer. Redis semantics treat keys and values as opaque byte strings,
/// never as UTF-8, so we never force a `String` conversion in the hot path.
pub type KeyBytes = Bytes;

/// Monotonically increasing per-key mutation counter, used by WATCH to
/// detect concurrent writes between the watch and the EXEC that checks it.
pub type Version = u64;

/// Milliseconds since the Unix epoch, used for stream ids and expirations.
pub type Millis = u64;
