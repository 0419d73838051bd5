//! Configuration loading and management

mod loader;

pub use loader::{CallwrapConfig, ConfigLoader};
