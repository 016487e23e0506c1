//! Persistence layer - Reading the launcher's app catalog

mod catalog;

pub use catalog::{find_app_config, load_app_configs};
