//! HTTP request handlers.

pub mod chunks;
pub mod common;
pub mod files;
pub mod health;
pub mod settings;
pub mod storages;
pub mod users;

pub use chunks::*;
pub use files::*;
pub use health::*;
pub use settings::*;
pub use storages::*;
pub use users::*;
