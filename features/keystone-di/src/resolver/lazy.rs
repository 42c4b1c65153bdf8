use std::{
    any::type_name,
    fmt::Debug,
    sync::{Arc, OnceLock, Weak},
};

use crate::{
    container::{Container, ContainerInner},
    errors::{ContainerError, ResolveError},
    metadata::Dependency,
    resolver::{Resolver, Slot},
    token::Token,
    types::{Injectable, Instance},
};

/// Points back at the container which deferred a lazy dependency
pub struct LazyHandle {
    container: Weak<ContainerInner>,
    token: Token,
}
impl LazyHandle {
    pub(crate) fn new(container: &Container, token: Token) -> Self {
        Self {
            container: Arc::downgrade(&container.0),
            token,
        }
    }

    pub(crate) fn resolve(&self) -> Result<Instance, ResolveError> {
        let Some(inner) = self.container.upgrade() else {
            return Err(ContainerError::Disposed {
                container: "<dropped>".to_string(),
            }
            .into());
        };
        Container(inner).resolve(&self.token)
    }
}

/// Lazily resolved dependency
///
/// The token is not resolved while the dependent is constructed,
/// but on the first call to [Lazy::get]. Lazy edges do not take part in
/// cycle detection, so two services can refer to each other this way.
///
/// Note:
///
/// The handle only holds a weak reference to the container,
/// once the container is dropped or disposed `get` returns an error.
pub struct Lazy<T: Injectable>(Arc<LazyInner<T>>);
struct LazyInner<T: Injectable> {
    once: OnceLock<Arc<T>>,
    source: Option<LazyHandle>,
    token: Token,
}
impl<T: Injectable> Clone for Lazy<T> {
    fn clone(&self) -> Self {
        Lazy(self.0.clone())
    }
}
impl<T: Injectable + Debug> Debug for Lazy<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.once.get() {
            Some(value) => f.debug_tuple("Lazy").field(value).finish(),
            None => f.debug_tuple("Lazy").field(&self.0.token).finish(),
        }
    }
}
impl<T: Injectable> Resolver for Lazy<T> {
    fn dependency(token: Token) -> Dependency {
        Dependency {
            token,
            optional: false,
            lazy: true,
        }
    }

    fn from_slot(slot: Slot, token: &Token) -> Result<Self, ResolveError> {
        let inner = match slot {
            Slot::Lazy(handle) => LazyInner {
                once: OnceLock::new(),
                source: Some(handle),
                token: token.clone(),
            },
            Slot::Resolved(instance) => {
                let once = OnceLock::new();
                let _ = once.set(<Arc<T>>::from_slot(Slot::Resolved(instance), token)?);
                LazyInner {
                    once,
                    source: None,
                    token: token.clone(),
                }
            }
            Slot::Absent => return Err(ResolveError::ServiceNotFound(token.clone())),
        };

        Ok(Lazy(Arc::new(inner)))
    }
}
impl<T: Injectable> Lazy<T> {
    /// Resolves the dependency on first access, afterwards returns the cached value
    pub fn get(&self) -> Result<Arc<T>, ResolveError> {
        if let Some(value) = self.0.once.get() {
            return Ok(value.clone());
        }

        let Some(source) = &self.0.source else {
            return Err(ResolveError::ServiceNotFound(self.0.token.clone()));
        };

        let resolved = source
            .resolve()?
            .downcast::<T>()
            .map_err(|actual_type| ResolveError::DowncastFailed {
                required_type: type_name::<T>(),
                actual_type,
            })?;

        // Another thread might have won the race, keep whatever was set first
        Ok(self.0.once.get_or_init(|| resolved).clone())
    }

    /// Returns the value if it was already resolved
    pub fn try_get(&self) -> Option<&Arc<T>> {
        self.0.once.get()
    }

    pub fn token(&self) -> &Token {
        &self.0.token
    }
}
