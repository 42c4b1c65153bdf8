use std::{
    any::type_name,
    collections::{HashMap, HashSet},
    fmt::Debug,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Weak,
    },
    time::Instant,
};

use parking_lot::{Mutex, ReentrantMutex, RwLock};

use crate::{
    builder::BindingBuilder,
    dependency_graph::{DependencyGraph, DependencyGraphErrors},
    engine::{self, ResolutionContext},
    errors::{ContainerError, RegisterError, ResolveError},
    lifecycle::LifecycleManager,
    metadata::{ClassDescriptor, Component, DescriptorTable},
    provider::{Provider, RegisterOptions, Scope},
    registry::{ServiceRegistration, ServiceRegistry},
    token::Token,
    types::{Injectable, Instance},
};

static NEXT_CONTAINER_ID: AtomicU64 = AtomicU64::new(1);

/// Options of a container
///
/// Options left unset on a child container are inherited from its parent.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContainerOptions {
    /// Used in logs and errors
    pub name: Option<String>,
    /// Scope of registrations which do not choose one
    pub default_scope: Option<Scope>,
}
impl ContainerOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn with_default_scope(mut self, scope: Scope) -> Self {
        self.default_scope = Some(scope);
        self
    }

    fn inherit(self, parent: &ContainerOptions) -> Self {
        Self {
            name: self.name.or_else(|| parent.name.clone()),
            default_scope: self.default_scope.or(parent.default_scope),
        }
    }
}

/// Snapshot of the bookkeeping of a cached singleton
#[derive(Debug, Clone, Copy)]
pub struct InstanceStats {
    pub created_at: Instant,
    pub last_accessed_at: Instant,
    pub access_count: u64,
    pub disposed: bool,
}

/// A singleton owned by a container
pub(crate) struct ServiceInstance {
    pub instance: Instance,
    /// Creation order within the owning container
    pub sequence: u64,
    pub created_at: Instant,
    pub last_accessed_at: Instant,
    pub access_count: u64,
    pub disposed: bool,
}
impl ServiceInstance {
    pub(crate) fn stats(&self) -> InstanceStats {
        InstanceStats {
            created_at: self.created_at,
            last_accessed_at: self.last_accessed_at,
            access_count: self.access_count,
            disposed: self.disposed,
        }
    }
}

/// Descriptor table and lifecycle hooks, shared by a whole container tree
#[derive(Default)]
pub(crate) struct Shared {
    pub descriptors: DescriptorTable,
    pub lifecycle: LifecycleManager,
}

#[derive(Default)]
pub(crate) struct ContainerState {
    pub registry: ServiceRegistry,
    pub instances: HashMap<Token, ServiceInstance>,
    /// Singletons replaced by re-registration or unbind, destroyed with the container
    pub retired: Vec<(Token, ServiceInstance)>,
    /// Bookkeeping of singletons whose pre-destroy hooks already ran
    pub destroyed: HashMap<Token, InstanceStats>,
    pub disposed: bool,
    next_sequence: u64,
}
impl ContainerState {
    fn retire(&mut self, token: &Token) {
        if let Some(instance) = self.instances.remove(token) {
            tracing::debug!("Retiring cached instance of {}", token);
            self.retired.push((token.clone(), instance));
        }
    }
}

/// Dependency injection container
///
/// A cheap to clone handle. Containers form a tree through [Container::create_child],
/// lookups fall back from a child to its ancestors.
#[derive(Clone)]
pub struct Container(pub(crate) Arc<ContainerInner>);
pub(crate) struct ContainerInner {
    pub id: u64,
    pub name: String,
    /// Effective options, handed down to children
    pub options: ContainerOptions,
    pub default_scope: Scope,
    pub parent: Option<Container>,
    pub children: Mutex<HashMap<u64, Weak<ContainerInner>>>,
    pub state: Mutex<ContainerState>,
    /// Held while a singleton owned by this container is constructed
    pub construction: ReentrantMutex<()>,
    /// Shared by top-level resolutions, taken exclusively by disposal
    pub gate: RwLock<()>,
    pub shared: Arc<Shared>,
}

impl Debug for Container {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.0.state.lock();
        let mut map = f.debug_struct("Container");
        map.field("name", &self.0.name);
        if state.disposed {
            map.field("disposed", &true);
        }
        for registration in state.registry.registrations() {
            let val = if state.instances.contains_key(&registration.token) {
                "cached"
            } else {
                "registered"
            };
            map.field(&registration.token.to_string(), &val);
        }
        map.finish()
    }
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    pub fn new() -> Self {
        Self::with_options(ContainerOptions::default())
    }

    pub fn with_options(options: ContainerOptions) -> Self {
        Self::create(options, None, Arc::new(Shared::default()))
    }

    fn create(options: ContainerOptions, parent: Option<Container>, shared: Arc<Shared>) -> Self {
        let name = options.name.clone().unwrap_or_else(|| "root".to_string());
        let default_scope = options.default_scope.unwrap_or_default();
        let container = Container(Arc::new(ContainerInner {
            id: NEXT_CONTAINER_ID.fetch_add(1, Ordering::Relaxed),
            options: ContainerOptions {
                name: Some(name.clone()),
                default_scope: Some(default_scope),
            },
            name,
            default_scope,
            parent,
            children: Mutex::new(HashMap::new()),
            state: Mutex::new(ContainerState::default()),
            construction: ReentrantMutex::new(()),
            gate: RwLock::new(()),
            shared,
        }));
        tracing::debug!(
            "Created container '{}' (default scope {})",
            container.0.name,
            container.0.default_scope
        );
        container
    }

    pub fn id(&self) -> u64 {
        self.0.id
    }

    pub fn name(&self) -> &str {
        &self.0.name
    }

    pub fn options(&self) -> &ContainerOptions {
        &self.0.options
    }

    pub fn default_scope(&self) -> Scope {
        self.0.default_scope
    }

    pub fn is_disposed(&self) -> bool {
        self.0.state.lock().disposed
    }

    /// Lifecycle hooks recorded for registered types
    pub fn lifecycle(&self) -> &LifecycleManager {
        &self.0.shared.lifecycle
    }

    /// Descriptions of all types known to this container tree
    pub fn descriptors(&self) -> &DescriptorTable {
        &self.0.shared.descriptors
    }

    /// Records the description of `T`, so it can be registered as class provider
    pub fn describe<T: Component>(&self) -> Arc<ClassDescriptor> {
        self.0.shared.descriptors.describe::<T>()
    }

    pub(crate) fn ensure_live(&self) -> Result<(), ContainerError> {
        if self.0.state.lock().disposed {
            return Err(self.disposed_error());
        }
        Ok(())
    }

    pub(crate) fn disposed_error(&self) -> ContainerError {
        ContainerError::Disposed {
            container: self.0.name.clone(),
        }
    }
}

// Registration
impl Container {
    /// Registers a provider for `token` on this container level
    ///
    /// The provider is validated immediately. An existing local registration for the token is replaced,
    /// registrations of ancestors are never touched.
    pub fn register(
        &self,
        token: impl Into<Token>,
        provider: Provider,
        options: RegisterOptions,
    ) -> Result<(), RegisterError> {
        self.ensure_live()?;

        let token = token.into();
        let registration = ServiceRegistration::new(
            token.clone(),
            provider,
            options,
            self.0.default_scope,
            &self.0.shared.descriptors,
        )?;

        if let crate::registry::ResolvedProvider::Class(descriptor) = &registration.provider {
            self.0
                .shared
                .lifecycle
                .record(descriptor.info, descriptor.hooks.clone());
        }

        tracing::debug!(
            "Registering {:?} provider for {} as {} in '{}'",
            registration.kind(),
            token,
            registration.scope,
            self.0.name
        );

        let mut state = self.0.state.lock();
        if state.disposed {
            return Err(self.disposed_error().into());
        }
        if state.registry.insert(registration).is_some() {
            tracing::warn!("Overwriting registration of {} in '{}'", token, self.0.name);
            state.retire(&token);
        }
        Ok(())
    }

    /// Registers a precomputed value
    pub fn register_value<T: Injectable>(
        &self,
        token: impl Into<Token>,
        value: T,
    ) -> Result<(), RegisterError> {
        self.register(token, Provider::value(value), RegisterOptions::default())
    }

    /// Starts a fluent binding for `token`
    pub fn bind(&self, token: impl Into<Token>) -> BindingBuilder<'_, ()> {
        BindingBuilder::new(self, token.into())
    }

    /// Starts a fluent binding for the type token of `T`, with `T` already described
    pub fn bind_type<T: Component>(&self) -> BindingBuilder<'_, ()> {
        self.describe::<T>();
        BindingBuilder::new(self, Token::of::<T>())
    }

    /// Removes the local registration of `token`
    ///
    /// Returns false if nothing was registered locally.
    /// A cached singleton is retired and destroyed together with the container.
    pub fn unbind(&self, token: impl Into<Token>) -> Result<bool, ContainerError> {
        let token = token.into();
        let mut state = self.0.state.lock();
        if state.disposed {
            return Err(self.disposed_error());
        }
        let removed = state.registry.remove(&token).is_some();
        if removed {
            tracing::debug!("Unbound {} from '{}'", token, self.0.name);
            state.retire(&token);
        }
        Ok(removed)
    }
}

// Hierarchy
impl Container {
    /// Creates a child container, unset options are taken from this container
    pub fn create_child(&self, options: ContainerOptions) -> Result<Container, ContainerError> {
        self.ensure_live()?;

        let options = options.inherit(&self.0.options);
        let child = Self::create(options, Some(self.clone()), self.0.shared.clone());
        let mut children = self.0.children.lock();
        children.retain(|_, child| child.strong_count() > 0);
        children.insert(child.0.id, Arc::downgrade(&child.0));
        Ok(child)
    }

    pub fn parent(&self) -> Option<Container> {
        self.0.parent.clone()
    }

    /// Children which are still alive and not disposed
    pub fn children(&self) -> Vec<Container> {
        let mut children = self.0.children.lock();
        children.retain(|_, child| child.strong_count() > 0);
        children.values().filter_map(Weak::upgrade).map(Container).collect()
    }

    /// Finds the nearest registration of `token`, along with the container owning it
    pub(crate) fn lookup(&self, token: &Token) -> Option<(Container, Arc<ServiceRegistration>)> {
        let mut current = Some(self);
        while let Some(container) = current {
            if let Some(registration) = container.0.state.lock().registry.get(token) {
                return Some((container.clone(), registration.clone()));
            }
            current = container.0.parent.as_ref();
        }
        None
    }

    /// The nearest registration of `token`, locally or in an ancestor
    pub fn registration(&self, token: &Token) -> Option<Arc<ServiceRegistration>> {
        self.lookup(token).map(|(_, registration)| registration)
    }

    /// True if `token` is registered here or in any ancestor
    pub fn has(&self, token: impl Into<Token>) -> bool {
        self.lookup(&token.into()).is_some()
    }

    /// True if `token` is registered on this container level
    pub fn has_local(&self, token: impl Into<Token>) -> bool {
        self.0.state.lock().registry.contains(&token.into())
    }

    /// All tokens resolvable from this container
    pub fn services(&self) -> HashSet<Token> {
        let mut services = self.local_services();
        if let Some(parent) = &self.0.parent {
            services.extend(parent.services());
        }
        services
    }

    /// Tokens registered on this container level
    pub fn local_services(&self) -> HashSet<Token> {
        self.0.state.lock().registry.tokens().cloned().collect()
    }
}

// Singleton cache
impl Container {
    /// Returns the cached singleton, counting the access
    pub(crate) fn cached(&self, token: &Token) -> Option<Instance> {
        let mut state = self.0.state.lock();
        let cached = state.instances.get_mut(token)?;
        cached.access_count += 1;
        cached.last_accessed_at = Instant::now();
        Some(cached.instance.clone())
    }

    /// Stores a constructed singleton
    ///
    /// If another instance was committed in the meantime, that one wins and is returned.
    pub(crate) fn commit(&self, token: &Token, instance: Instance) -> Result<Instance, ResolveError> {
        let mut state = self.0.state.lock();
        if state.disposed {
            return Err(self.disposed_error().into());
        }

        if let Some(existing) = state.instances.get_mut(token) {
            existing.access_count += 1;
            existing.last_accessed_at = Instant::now();
            return Ok(existing.instance.clone());
        }

        let now = Instant::now();
        let sequence = state.next_sequence;
        state.next_sequence += 1;
        state.instances.insert(
            token.clone(),
            ServiceInstance {
                instance: instance.clone(),
                sequence,
                created_at: now,
                last_accessed_at: now,
                access_count: 1,
                disposed: false,
            },
        );
        tracing::debug!("Cached singleton {} in '{}'", token, self.0.name);
        Ok(instance)
    }

    /// Bookkeeping of the singleton cached for `token` on this container level
    pub fn instance_stats(&self, token: impl Into<Token>) -> Option<InstanceStats> {
        let token = token.into();
        let state = self.0.state.lock();
        state
            .instances
            .get(&token)
            .or_else(|| {
                state
                    .retired
                    .iter()
                    .rev()
                    .find(|(retired, _)| *retired == token)
                    .map(|(_, instance)| instance)
            })
            .map(ServiceInstance::stats)
            .or_else(|| state.destroyed.get(&token).copied())
    }
}

// Resolution
impl Container {
    /// Resolves `token`, constructing its dependency graph as needed
    pub fn resolve(&self, token: impl Into<Token>) -> Result<Instance, ResolveError> {
        let token = token.into();
        self.resolve_root(&token, false)?
            .ok_or(ResolveError::ServiceNotFound(token))
    }

    /// Like [Container::resolve], but a token that cannot be found yields `None`
    ///
    /// This covers the token itself and any missing dependency of it.
    /// Other failures, such as cycles or failing constructors, are still returned.
    pub fn try_resolve(&self, token: impl Into<Token>) -> Result<Option<Instance>, ResolveError> {
        match self.resolve_root(&token.into(), true) {
            Err(ResolveError::ServiceNotFound(missing)) => {
                tracing::trace!("try_resolve gave up, {} is not registered", missing);
                Ok(None)
            }
            result => result,
        }
    }

    /// Runs a top-level resolution, disposal waits until it is done
    fn resolve_root(&self, token: &Token, optional: bool) -> Result<Option<Instance>, ResolveError> {
        // Recursive, lazy handles may resolve again from inside a constructor
        let _gate = self.0.gate.read_recursive();
        let mut context = ResolutionContext::default();
        engine::resolve(self, token, optional, &mut context)
    }

    /// Resolves `token` and downcasts the instance to `T`
    pub fn resolve_as<T: Injectable>(&self, token: impl Into<Token>) -> Result<Arc<T>, ResolveError> {
        downcast(self.resolve(token)?)
    }

    pub fn try_resolve_as<T: Injectable>(
        &self,
        token: impl Into<Token>,
    ) -> Result<Option<Arc<T>>, ResolveError> {
        self.try_resolve(token)?.map(downcast).transpose()
    }

    /// Resolves the type token of `T`
    pub fn get<T: Injectable>(&self) -> Result<Arc<T>, ResolveError> {
        self.resolve_as(Token::of::<T>())
    }

    pub fn try_get<T: Injectable>(&self) -> Result<Option<Arc<T>>, ResolveError> {
        self.try_resolve_as(Token::of::<T>())
    }

    /// Checks all registrations visible from this container for missing and circular dependencies
    pub fn validate(&self) -> Result<(), DependencyGraphErrors> {
        DependencyGraph::new(self).check()
    }

    pub fn dependency_graph(&self) -> DependencyGraph {
        DependencyGraph::new(self)
    }
}

fn downcast<T: Injectable>(instance: Instance) -> Result<Arc<T>, ResolveError> {
    instance
        .downcast::<T>()
        .map_err(|actual_type| ResolveError::DowncastFailed {
            required_type: type_name::<T>(),
            actual_type,
        })
}
