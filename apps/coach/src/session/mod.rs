// Session persistence: the state record plus its three sinks.
// Sinks never call each other; `SessionStore` is the only place they meet.

pub mod kv;
pub mod record;
pub mod state;
pub mod store;
pub mod tabular;

pub use kv::{KvSessionStore, RedisBackend};
pub use record::RecordSink;
pub use state::{SessionField, SessionState, SessionStatus};
pub use store::{SaveReport, SessionStore};
pub use tabular::TabularLog;
