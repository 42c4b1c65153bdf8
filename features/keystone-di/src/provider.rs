use std::{fmt, sync::Arc};

use crate::{
    metadata::Dependency,
    resolver::Arguments,
    token::Token,
    types::{DynError, Injectable, Instance, TypeInfo},
};

/// Instance sharing policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Scope {
    /// One instance per owning container, shared with all descendants
    Singleton,
    /// A new instance for every top-level resolution
    Prototype,
    /// A new instance for every top-level resolution
    #[default]
    Transient,
}
impl Scope {
    /// Only singletons are kept in the container's instance cache
    pub fn is_cached(self) -> bool {
        matches!(self, Scope::Singleton)
    }
}
impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Scope::Singleton => "singleton",
            Scope::Prototype => "prototype",
            Scope::Transient => "transient",
        })
    }
}

pub type FactoryFn = dyn Fn(&mut Arguments) -> Result<Instance, DynError> + Send + Sync;
pub type ActivationFn = dyn Fn(&Instance) -> Result<(), DynError> + Send + Sync;

/// Describes how an instance for a token is produced
#[derive(Clone)]
pub enum Provider {
    /// Construct a type described through [crate::metadata::Component]
    Class(TypeInfo),
    /// Hand out a precomputed instance
    Value(Instance),
    /// Call a function with the resolved dependencies as positional arguments
    Factory {
        dependencies: Vec<Dependency>,
        factory: Arc<FactoryFn>,
    },
    /// Redirect to another token
    Alias(Token),
}
impl Provider {
    pub fn class<T: 'static>() -> Self {
        Provider::Class(TypeInfo::of::<T>())
    }

    pub fn value<T: Injectable>(value: T) -> Self {
        Provider::Value(Instance::new(value))
    }

    pub fn factory<T, F>(dependencies: Vec<Dependency>, factory: F) -> Self
    where
        T: Injectable,
        F: Fn(&mut Arguments) -> Result<T, DynError> + Send + Sync + 'static,
    {
        Provider::Factory {
            dependencies,
            factory: Arc::new(move |args: &mut Arguments| factory(args).map(Instance::new)),
        }
    }

    pub fn alias(target: impl Into<Token>) -> Self {
        Provider::Alias(target.into())
    }

    pub fn kind(&self) -> ProviderKind {
        match self {
            Provider::Class(_) => ProviderKind::Class,
            Provider::Value(_) => ProviderKind::Value,
            Provider::Factory { .. } => ProviderKind::Factory,
            Provider::Alias(_) => ProviderKind::Alias,
        }
    }
}
impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Class(info) => f.debug_tuple("Class").field(&info.type_name).finish(),
            Provider::Value(instance) => f.debug_tuple("Value").field(instance).finish(),
            Provider::Factory { dependencies, .. } => f
                .debug_struct("Factory")
                .field("dependencies", dependencies)
                .finish_non_exhaustive(),
            Provider::Alias(target) => f.debug_tuple("Alias").field(target).finish(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Class,
    Value,
    Factory,
    Alias,
}

/// Per registration options
#[derive(Clone, Default)]
pub struct RegisterOptions {
    /// Falls back to the container's default scope
    pub scope: Option<Scope>,
    /// Called with every newly constructed instance before it is handed out
    pub on_activation: Option<Arc<ActivationFn>>,
}
impl RegisterOptions {
    pub fn scoped(scope: Scope) -> Self {
        Self {
            scope: Some(scope),
            on_activation: None,
        }
    }

    pub fn on_activation<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Instance) -> Result<(), DynError> + Send + Sync + 'static,
    {
        self.on_activation = Some(Arc::new(callback));
        self
    }
}
impl fmt::Debug for RegisterOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisterOptions")
            .field("scope", &self.scope)
            .field("on_activation", &self.on_activation.is_some())
            .finish()
    }
}
