//! Connection-state-mutating command handlers that live outside the
//! ordinary `Command`/`ExecutableCommand` path.

pub mod pubsub;
pub mod transaction;
