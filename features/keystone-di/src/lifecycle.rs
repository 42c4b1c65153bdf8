use std::{
    any::{type_name, Any, TypeId},
    collections::HashMap,
    future::Future,
    sync::Arc,
};

use futures::{future::BoxFuture, FutureExt};
use parking_lot::RwLock;

use crate::{
    errors::{DisposeError, ResolveError},
    token::Token,
    types::{DynError, Injectable, Instance, TypeInfo},
};

/// Implemented by types which finish their initialization after injection
///
/// Enable it with [crate::metadata::Metadata::post_constructable].
pub trait PostConstruct {
    fn post_construct(&mut self) -> Result<(), DynError>;
}

/// Implemented by types which release resources when their container is disposed
///
/// Enable it with [crate::metadata::Metadata::disposable].
pub trait PreDestroy {
    fn pre_destroy(&self) -> Result<(), DynError>;
}

type PostConstructFn = dyn Fn(&mut (dyn Any + Send + Sync)) -> Result<(), DynError> + Send + Sync;
type PreDestroyFn = dyn Fn(Instance) -> BoxFuture<'static, Result<(), DynError>> + Send + Sync;

pub(crate) struct PostConstructHook {
    pub name: &'static str,
    pub run: Arc<PostConstructFn>,
}

pub(crate) struct PreDestroyHook {
    pub name: &'static str,
    pub run: Arc<PreDestroyFn>,
}
impl PreDestroyHook {
    pub(crate) fn new<T, Hook, Fut>(name: &'static str, hook: Hook) -> Self
    where
        T: Injectable,
        Hook: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DynError>> + Send + 'static,
    {
        let run = move |instance: Instance| match instance.downcast::<T>() {
            Ok(target) => hook(target).boxed(),
            Err(actual_type) => {
                let message = format!(
                    "pre-destroy target is a '{actual_type}', expected '{}'",
                    type_name::<T>()
                );
                futures::future::ready(Err::<(), DynError>(message.into())).boxed()
            }
        };
        Self {
            name,
            run: Arc::new(run),
        }
    }
}

/// Ordered hooks of a single type
#[derive(Default)]
pub struct LifecycleHooks {
    pub(crate) post_construct: Vec<PostConstructHook>,
    pub(crate) pre_destroy: Vec<PreDestroyHook>,
}
impl LifecycleHooks {
    pub fn post_construct_names(&self) -> Vec<&'static str> {
        self.post_construct.iter().map(|hook| hook.name).collect()
    }

    pub fn pre_destroy_names(&self) -> Vec<&'static str> {
        self.pre_destroy.iter().map(|hook| hook.name).collect()
    }
}

/// Knows, per type, which hooks to call on an instance and in which order
///
/// Hooks are recorded when a class provider is registered.
/// Types without recorded hooks are simply skipped.
#[derive(Default)]
pub struct LifecycleManager {
    hooks: RwLock<HashMap<TypeId, Arc<LifecycleHooks>>>,
}
impl LifecycleManager {
    pub(crate) fn record(&self, info: TypeInfo, hooks: Arc<LifecycleHooks>) {
        if hooks.post_construct.is_empty() && hooks.pre_destroy.is_empty() {
            return;
        }
        tracing::debug!(
            "Recording lifecycle hooks for {}: post-construct {:?}, pre-destroy {:?}",
            info.type_name,
            hooks.post_construct_names(),
            hooks.pre_destroy_names()
        );
        self.hooks.write().insert(info.type_id, hooks);
    }

    pub fn hooks_of(&self, info: TypeInfo) -> Option<Arc<LifecycleHooks>> {
        self.hooks.read().get(&info.type_id).cloned()
    }

    /// Runs all post-construct hooks of `info` on a freshly constructed instance
    ///
    /// Stops at the first failing hook.
    pub(crate) fn post_construct(
        &self,
        token: &Token,
        info: TypeInfo,
        target: &mut (dyn Any + Send + Sync),
    ) -> Result<(), ResolveError> {
        let Some(hooks) = self.hooks_of(info) else {
            return Ok(());
        };

        for hook in &hooks.post_construct {
            tracing::debug!("Running post-construct hook '{}' of {}", hook.name, token);
            (hook.run)(&mut *target).map_err(|error| ResolveError::LifecycleHookFailed {
                token: token.clone(),
                hook: hook.name,
                error: Arc::new(error),
            })?;
        }
        Ok(())
    }

    /// Runs all pre-destroy hooks of an instance
    ///
    /// A failing hook does not prevent the following ones from running.
    pub(crate) async fn pre_destroy(&self, token: &Token, instance: &Instance) -> Vec<DisposeError> {
        let Some(hooks) = self.hooks_of(instance.info) else {
            return Vec::new();
        };

        let mut errors = Vec::new();
        for hook in &hooks.pre_destroy {
            tracing::debug!("Running pre-destroy hook '{}' of {}", hook.name, token);
            if let Err(error) = (hook.run)(instance.clone()).await {
                tracing::warn!("Pre-destroy hook '{}' of {} failed: {}", hook.name, token, error);
                errors.push(DisposeError {
                    token: token.clone(),
                    hook: hook.name,
                    error: Arc::new(error),
                });
            }
        }
        errors
    }
}
