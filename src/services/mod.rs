pub mod redis;
pub mod users;

pub use redis::RedisService;
pub use users::{Profile, ProfileStore, User, UserStore};
