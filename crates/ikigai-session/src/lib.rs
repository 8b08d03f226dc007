//! SQLite implementation of [`ikigai_agent::DbSink`] (spec §6).

pub mod error;
pub mod store;

pub use error::{Result, SessionError};
pub use store::{CommandRecord, SqliteSink};
