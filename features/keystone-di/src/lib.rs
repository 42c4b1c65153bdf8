//! Keystone DI is a runtime inversion of control container.
//!
//! Services are registered under a [Token] together with a [Provider] describing how an
//! instance is produced, and a [Scope] deciding how instances are shared.
//! Resolving a token constructs the whole dependency graph on demand:
//!
//! 1. Tokens already under construction are detected, a cycle fails with the full chain
//! 2. Singletons are cached at the container owning their registration
//! 3. Post-construct hooks run before an instance is handed to anyone
//! 4. Disposing a container runs the pre-destroy hooks of its singletons, children first
//!
//! Containers form a tree. A child falls back to its ancestors for tokens it does not
//! register itself, and shadows their registrations without ever mutating them.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use keystone_di::{Arguments, Component, Container, DynError, Metadata, Token};
//!
//! struct Database {
//!     url: Arc<String>,
//! }
//! impl Component for Database {
//!     fn metadata() -> Metadata<Self> {
//!         Metadata::<Self>::new().param::<Arc<String>>("url")
//!     }
//!
//!     fn construct(args: &mut Arguments) -> Result<Self, DynError> {
//!         Ok(Database { url: args.next()? })
//!     }
//! }
//!
//! let container = Container::new();
//! container.register_value("url", "postgres://localhost".to_string()).unwrap();
//! container.bind_type::<Database>().to_self().unwrap().in_singleton_scope().unwrap();
//!
//! let database = container.get::<Database>().unwrap();
//! assert_eq!(*database.url, "postgres://localhost");
//! assert!(Arc::ptr_eq(&database, &container.get::<Database>().unwrap()));
//! ```

pub mod builder;
pub mod container;
pub mod dependency_graph;
mod disposal;
mod engine;
pub mod errors;
pub mod lifecycle;
pub mod metadata;
pub mod provider;
pub mod registry;
pub mod resolver;
pub mod token;
pub mod types;

pub use builder::BindingBuilder;
pub use container::{Container, ContainerOptions, InstanceStats};
pub use dependency_graph::{DependencyGraph, DependencyGraphError, DependencyGraphErrors};
pub use errors::{
    ContainerError, DisposeError, DisposeErrors, InvalidProviderError, RegisterError, ResolveError,
};
pub use lifecycle::{LifecycleManager, PostConstruct, PreDestroy};
pub use metadata::{ClassDescriptor, Component, Dependency, Metadata};
pub use provider::{Provider, ProviderKind, RegisterOptions, Scope};
pub use resolver::{lazy::Lazy, Arguments, Resolver, Slot};
pub use token::{Symbol, Token};
pub use types::{DynError, Injectable, Instance, TypeInfo};
