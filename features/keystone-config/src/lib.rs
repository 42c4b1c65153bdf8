//! Keystone Config provides a registry of typed configs that can be injected in the rest of the
//! application.
//!
//! Keystone Config is split into two major parts:
//! 1. ConfigProvider: Used to create the registry of all configs and bind it into a container
//! 2. Config<T>: A wrapper type to be able to resolve and retrieve configs
//!
//! # Examples
//!
//! ```rust
//! use keystone_config::ConfigProvider;
//! use keystone_di::Container;
//!
//! struct AppConfig {
//!     host: String,
//!     port: u16,
//! }
//!
//! let mut config_provider = ConfigProvider::new();
//! config_provider
//!     .add_config(AppConfig {
//!         host: "localhost".to_string(),
//!         port: 8080_u16,
//!     })
//!     .unwrap();
//!
//! let container = Container::new();
//! config_provider.bind(&container).unwrap();
//!
//! let retrieved_config = container.get::<AppConfig>().unwrap();
//! assert_eq!(retrieved_config.host, "localhost");
//! assert_eq!(retrieved_config.port, 8080);
//! ```

pub mod config;
pub mod errors;
pub mod provider;

pub use config::Config;
pub use errors::{GetConfigError, RegisterConfigError};
pub use provider::ConfigProvider;
