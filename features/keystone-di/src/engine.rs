//! The recursive resolution algorithm
//!
//! Every top-level resolve starts with a fresh [ResolutionContext]. The context carries
//! the stack of tokens currently under construction, used for cycle detection, and a
//! per-call cache so a token reached twice through a diamond shaped graph is only built once.
//!
//! Aliases are followed before anything is pushed, the stack only ever holds real tokens.
//! Singletons are built from, and cached at, the container owning their registration.
//! Everything else is built from the container the request was made on.

use std::{collections::HashMap, sync::Arc};

use crate::{
    container::Container,
    errors::ResolveError,
    metadata::{ClassDescriptor, Dependency},
    provider::FactoryFn,
    registry::{ResolvedProvider, ServiceRegistration},
    resolver::{lazy::LazyHandle, Arguments, Slot},
    token::Token,
    types::{DynError, Instance},
};

#[derive(Default)]
pub(crate) struct ResolutionContext {
    stack: Vec<Token>,
    resolved: HashMap<(u64, Token), Instance>,
}
impl ResolutionContext {
    fn cycle(&self, token: &Token) -> ResolveError {
        let mut chain = self.stack.clone();
        chain.push(token.clone());
        ResolveError::CircularDependency { chain }
    }
}

/// What a real, non-alias registration turns into
enum Target {
    Value(Instance),
    Build(Recipe),
}

/// How a new instance is made
enum Recipe {
    Class(Arc<ClassDescriptor>),
    Factory(Arc<FactoryFn>),
}

/// Resolves `token` from `requester`
///
/// Returns `Ok(None)` only if `optional` is set and `token` itself is not registered.
pub(crate) fn resolve(
    requester: &Container,
    token: &Token,
    optional: bool,
    context: &mut ResolutionContext,
) -> Result<Option<Instance>, ResolveError> {
    requester.ensure_live()?;

    if context.stack.contains(token) {
        return Err(context.cycle(token));
    }

    let Some((token, owner, registration, target)) =
        follow_aliases(requester, token, optional, context)?
    else {
        return Ok(None);
    };

    let recipe = match target {
        Target::Value(instance) => return Ok(Some(instance)),
        Target::Build(recipe) => recipe,
    };

    if registration.caches_instances() {
        if let Some(instance) = owner.cached(&token) {
            tracing::trace!("Cache hit for {} in '{}'", token, owner.name());
            return Ok(Some(instance));
        }
    }

    let key = (
        if registration.caches_instances() {
            owner.id()
        } else {
            requester.id()
        },
        token.clone(),
    );
    if let Some(instance) = context.resolved.get(&key) {
        return Ok(Some(instance.clone()));
    }

    let instance = if registration.caches_instances() {
        let _guard = owner.0.construction.lock();
        // Another thread might have finished the same singleton while we waited
        if let Some(instance) = owner.cached(&token) {
            return Ok(Some(instance));
        }
        let instance = construct(&owner, &registration, &recipe, &token, context)?;
        owner.commit(&token, instance)?
    } else {
        construct(requester, &registration, &recipe, &token, context)?
    };

    context.resolved.insert(key, instance.clone());

    if let Some(on_activation) = &registration.on_activation {
        on_activation(&instance).map_err(|error| ResolveError::ActivationFailed {
            token: token.clone(),
            error: Arc::new(error),
        })?;
    }

    Ok(Some(instance))
}

/// Looks up `token` and follows alias registrations until a real provider is found
///
/// Returns the real token together with the container owning its registration.
#[allow(clippy::type_complexity)]
fn follow_aliases(
    requester: &Container,
    token: &Token,
    optional: bool,
    context: &ResolutionContext,
) -> Result<Option<(Token, Container, Arc<ServiceRegistration>, Target)>, ResolveError> {
    let mut current = token.clone();
    let mut hops: Vec<Token> = Vec::new();

    loop {
        let Some((owner, registration)) = requester.lookup(&current) else {
            if optional && hops.is_empty() {
                return Ok(None);
            }
            return Err(ResolveError::ServiceNotFound(current));
        };

        let target = match &registration.provider {
            ResolvedProvider::Alias(target) => {
                hops.push(current);
                if hops.contains(target) {
                    let mut chain = hops;
                    chain.push(target.clone());
                    return Err(ResolveError::CircularDependency { chain });
                }
                tracing::trace!("Following alias to {}", target);
                current = target.clone();
                continue;
            }
            ResolvedProvider::Value(instance) => Target::Value(instance.clone()),
            ResolvedProvider::Class(descriptor) => Target::Build(Recipe::Class(descriptor.clone())),
            ResolvedProvider::Factory(factory) => Target::Build(Recipe::Factory(factory.clone())),
        };

        if !hops.is_empty() && context.stack.contains(&current) {
            return Err(context.cycle(&current));
        }
        return Ok(Some((current, owner, registration, target)));
    }
}

/// Builds a new instance, with `token` on the stack while its dependencies are resolved
fn construct(
    container: &Container,
    registration: &ServiceRegistration,
    recipe: &Recipe,
    token: &Token,
    context: &mut ResolutionContext,
) -> Result<Instance, ResolveError> {
    tracing::debug!(
        "Constructing {} ({}) in '{}'",
        token,
        registration.scope,
        container.name()
    );

    context.stack.push(token.clone());
    let result = match recipe {
        Recipe::Class(descriptor) => construct_class(container, descriptor, token, context),
        Recipe::Factory(factory) => construct_factory(
            container,
            factory.as_ref(),
            &registration.dependencies,
            token,
            context,
        ),
    };
    context.stack.pop();
    result
}

fn construct_class(
    container: &Container,
    descriptor: &ClassDescriptor,
    token: &Token,
    context: &mut ResolutionContext,
) -> Result<Instance, ResolveError> {
    let slots = resolve_slots(container, &descriptor.parameters, context)?;
    let mut args = Arguments::new(token.clone(), slots);
    let mut built = descriptor
        .construct(&mut args)
        .map_err(|error| construction_error(token, error))?;

    for property in &descriptor.properties {
        let (dependency_token, slot) = resolve_slot(container, &property.dependency, context)?;
        tracing::trace!("Injecting property '{}' of {}", property.name, token);
        (property.inject)(built.as_mut(), slot, &dependency_token)?;
    }

    container
        .0
        .shared
        .lifecycle
        .post_construct(token, descriptor.info, built.as_mut())?;

    Ok(Instance::from_boxed(descriptor.info, built))
}

fn construct_factory(
    container: &Container,
    factory: &FactoryFn,
    dependencies: &[Dependency],
    token: &Token,
    context: &mut ResolutionContext,
) -> Result<Instance, ResolveError> {
    let slots = resolve_slots(container, dependencies, context)?;
    let mut args = Arguments::new(token.clone(), slots);
    factory(&mut args).map_err(|error| construction_error(token, error))
}

fn resolve_slots(
    container: &Container,
    dependencies: &[Dependency],
    context: &mut ResolutionContext,
) -> Result<Vec<(Token, Slot)>, ResolveError> {
    dependencies
        .iter()
        .map(|dependency| resolve_slot(container, dependency, context))
        .collect()
}

fn resolve_slot(
    container: &Container,
    dependency: &Dependency,
    context: &mut ResolutionContext,
) -> Result<(Token, Slot), ResolveError> {
    let token = dependency.token.clone();

    if dependency.lazy {
        if dependency.optional && !container.has(&token) {
            return Ok((token, Slot::Absent));
        }
        let handle = LazyHandle::new(container, token.clone());
        return Ok((token, Slot::Lazy(handle)));
    }

    let slot = match resolve(container, &token, dependency.optional, context)? {
        Some(instance) => Slot::Resolved(instance),
        None => Slot::Absent,
    };
    Ok((token, slot))
}

/// Errors raised while taking arguments are passed through unchanged
fn construction_error(token: &Token, error: DynError) -> ResolveError {
    match error.downcast::<ResolveError>() {
        Ok(error) => *error,
        Err(error) => ResolveError::construction(token, error),
    }
}
