use std::cmp::Reverse;

use futures::{future::BoxFuture, FutureExt};

use crate::{
    container::{Container, ServiceInstance},
    errors::{DisposeError, DisposeErrors},
    token::Token,
};

impl Container {
    /// Disposes this container and all of its descendants
    ///
    /// Children are disposed first. Afterwards the pre-destroy hooks of every singleton
    /// owned by this container run, newest first, and all registrations are dropped.
    /// Every hook runs even if an earlier one failed, failures are collected into [DisposeErrors].
    /// The container counts as disposed either way, disposing it again is a no-op.
    pub fn dispose(&self) -> BoxFuture<'static, Result<(), DisposeErrors>> {
        let container = self.clone();
        async move {
            let errors = container.teardown().await;
            if errors.is_empty() {
                Ok(())
            } else {
                tracing::warn!(
                    "Container '{}' disposed with {} failed pre-destroy hook(s)",
                    container.name(),
                    errors.len()
                );
                Err(DisposeErrors { errors })
            }
        }
        .boxed()
    }

    fn teardown(&self) -> BoxFuture<'static, Vec<DisposeError>> {
        let container = self.clone();
        async move {
            {
                // Wait for in-flight resolutions and singleton constructions of this container
                let _gate = container.0.gate.write();
                let _guard = container.0.construction.lock();
                let mut state = container.0.state.lock();
                if state.disposed {
                    return Vec::new();
                }
                state.disposed = true;
            }
            tracing::debug!("Disposing container '{}'", container.name());

            let mut errors = Vec::new();
            for child in container.children() {
                errors.extend(child.teardown().await);
            }

            let mut doomed: Vec<(Token, ServiceInstance)> = {
                let mut state = container.0.state.lock();
                let mut doomed: Vec<_> = state.instances.drain().collect();
                doomed.append(&mut state.retired);
                state.registry.clear();
                doomed
            };
            doomed.sort_by_key(|(_, instance)| Reverse(instance.sequence));

            for (token, mut instance) in doomed {
                errors.extend(
                    container
                        .0
                        .shared
                        .lifecycle
                        .pre_destroy(&token, &instance.instance)
                        .await,
                );
                instance.disposed = true;
                container
                    .0
                    .state
                    .lock()
                    .destroyed
                    .insert(token, instance.stats());
            }

            if let Some(parent) = &container.0.parent {
                parent.0.children.lock().remove(&container.id());
            }
            container.0.children.lock().clear();

            errors
        }
        .boxed()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use futures::executor::block_on;

    use crate::{
        container::ContainerOptions,
        errors::{ContainerError, RegisterError, ResolveError},
        metadata::{Component, Metadata},
        provider::Scope,
        resolver::Arguments,
        types::DynError,
    };

    use super::*;

    static CLOSED: AtomicUsize = AtomicUsize::new(0);

    struct Connection;
    impl Component for Connection {
        fn metadata() -> Metadata<Self> {
            Metadata::<Self>::new().pre_destroy("close", |_| {
                CLOSED.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
        }

        fn construct(_: &mut Arguments) -> Result<Self, DynError> {
            Ok(Connection)
        }
    }

    #[test]
    fn disposed_container_rejects_work() {
        let container = Container::with_options(ContainerOptions::named("app"));
        container
            .bind_type::<Connection>()
            .to_self()
            .unwrap()
            .in_scope(Scope::Singleton)
            .unwrap();
        let _ = container.get::<Connection>().unwrap();

        let before = CLOSED.load(Ordering::SeqCst);
        block_on(container.dispose()).unwrap();
        assert_eq!(CLOSED.load(Ordering::SeqCst), before + 1);
        assert!(container.is_disposed());

        // Disposing twice does not run the hooks again
        block_on(container.dispose()).unwrap();
        assert_eq!(CLOSED.load(Ordering::SeqCst), before + 1);

        let stats = container.instance_stats(Token::of::<Connection>()).unwrap();
        assert!(stats.disposed);

        assert!(matches!(
            container.resolve(Token::of::<Connection>()),
            Err(ResolveError::Container(ContainerError::Disposed { .. }))
        ));
        assert!(matches!(
            container.register_value("late", 1_u8),
            Err(RegisterError::Container(ContainerError::Disposed { .. }))
        ));
        assert!(container
            .create_child(ContainerOptions::default())
            .is_err());
    }

    #[test]
    fn disposal_cascades_to_children() {
        let root = Container::new();
        let child = root.create_child(ContainerOptions::named("child")).unwrap();
        let grandchild = child.create_child(ContainerOptions::default()).unwrap();

        block_on(root.dispose()).unwrap();
        assert!(child.is_disposed());
        assert!(grandchild.is_disposed());
        assert!(root.children().is_empty());
    }

    #[test]
    fn child_disposal_leaves_parent_alive() {
        let root = Container::new();
        root.register_value("url", "db://".to_string()).unwrap();
        let child = root.create_child(ContainerOptions::default()).unwrap();

        block_on(child.dispose()).unwrap();
        assert!(!root.is_disposed());
        assert!(root.has("url"));
        assert!(root.children().is_empty());
    }
}
