pub mod channel;
pub mod storage;

pub use channel::{channel_key, ChannelStore};
pub use storage::{JsonFileStore, MemoryStore};
