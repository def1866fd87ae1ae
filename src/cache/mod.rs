//! Redis-backed coordination

pub mod keys;
pub mod lock;

pub use keys::MessageLockKey;
pub use lock::{lock_message, unlock, Locker, RedisLocker, MESSAGE_LOCK_TTL};
