pub mod data_types;
pub mod stream;
pub mod zset;

pub use data_types::{DataValue, StoredValue};
