mod config;
mod key_render;
mod store;

pub use config::RedisConfig;
pub use store::RedisStateStore;
