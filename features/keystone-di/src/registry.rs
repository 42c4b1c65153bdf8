use std::{collections::HashMap, sync::Arc, time::Instant};

use crate::{
    errors::InvalidProviderError,
    metadata::{ClassDescriptor, Dependency, DescriptorTable},
    provider::{ActivationFn, FactoryFn, Provider, ProviderKind, RegisterOptions, Scope},
    token::Token,
    types::Instance,
};

/// A provider after validation, ready to be resolved
pub(crate) enum ResolvedProvider {
    Class(Arc<ClassDescriptor>),
    Value(Instance),
    Factory(Arc<FactoryFn>),
    Alias(Token),
}

/// A validated registration, owned by the container it was registered on
pub struct ServiceRegistration {
    pub token: Token,
    pub scope: Scope,
    /// All dependencies in resolution order
    pub dependencies: Vec<Dependency>,
    pub registered_at: Instant,
    pub(crate) provider: ResolvedProvider,
    pub(crate) on_activation: Option<Arc<ActivationFn>>,
}
impl ServiceRegistration {
    /// Validates the provider shape
    ///
    /// Fails immediately on malformed input, nothing is deferred to resolution.
    pub(crate) fn new(
        token: Token,
        provider: Provider,
        options: RegisterOptions,
        default_scope: Scope,
        descriptors: &DescriptorTable,
    ) -> Result<Self, InvalidProviderError> {
        check_token(&token, &token)?;

        let (provider, dependencies) = match provider {
            Provider::Class(info) => {
                let descriptor = descriptors.lookup(info).ok_or_else(|| {
                    InvalidProviderError::new(
                        &token,
                        format!("'{info}' is not a described component and cannot be constructed"),
                    )
                })?;
                let dependencies = descriptor.dependencies().cloned().collect();
                (ResolvedProvider::Class(descriptor), dependencies)
            }
            Provider::Value(instance) => (ResolvedProvider::Value(instance), Vec::new()),
            Provider::Factory {
                dependencies,
                factory,
            } => (ResolvedProvider::Factory(factory), dependencies),
            Provider::Alias(target) => {
                if target == token {
                    return Err(InvalidProviderError::new(&token, "an alias cannot target itself"));
                }
                let dependencies = vec![Dependency::required(target.clone())];
                (ResolvedProvider::Alias(target), dependencies)
            }
        };

        for dependency in &dependencies {
            check_token(&token, &dependency.token)?;
        }

        Ok(ServiceRegistration {
            token,
            scope: options.scope.unwrap_or(default_scope),
            dependencies,
            registered_at: Instant::now(),
            provider,
            on_activation: options.on_activation,
        })
    }

    pub fn kind(&self) -> ProviderKind {
        match self.provider {
            ResolvedProvider::Class(_) => ProviderKind::Class,
            ResolvedProvider::Value(_) => ProviderKind::Value,
            ResolvedProvider::Factory(_) => ProviderKind::Factory,
            ResolvedProvider::Alias(_) => ProviderKind::Alias,
        }
    }

    /// Only class and factory registrations produce instances the container owns
    pub(crate) fn caches_instances(&self) -> bool {
        self.scope.is_cached()
            && matches!(
                self.provider,
                ResolvedProvider::Class(_) | ResolvedProvider::Factory(_)
            )
    }
}
impl std::fmt::Debug for ServiceRegistration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceRegistration")
            .field("token", &self.token)
            .field("kind", &self.kind())
            .field("scope", &self.scope)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

fn check_token(owner: &Token, token: &Token) -> Result<(), InvalidProviderError> {
    match token {
        Token::Name(name) if name.trim().is_empty() => Err(InvalidProviderError::new(
            owner,
            "string tokens must not be empty",
        )),
        _ => Ok(()),
    }
}

/// Token to registration mapping of a single container level
#[derive(Default)]
pub struct ServiceRegistry {
    registrations: HashMap<Token, Arc<ServiceRegistration>>,
}
impl ServiceRegistry {
    /// Stores the registration, returning the one it replaced
    pub fn insert(&mut self, registration: ServiceRegistration) -> Option<Arc<ServiceRegistration>> {
        self.registrations
            .insert(registration.token.clone(), Arc::new(registration))
    }

    pub fn get(&self, token: &Token) -> Option<&Arc<ServiceRegistration>> {
        self.registrations.get(token)
    }

    pub fn contains(&self, token: &Token) -> bool {
        self.registrations.contains_key(token)
    }

    pub fn remove(&mut self, token: &Token) -> Option<Arc<ServiceRegistration>> {
        self.registrations.remove(token)
    }

    pub fn tokens(&self) -> impl Iterator<Item = &Token> {
        self.registrations.keys()
    }

    pub fn registrations(&self) -> impl Iterator<Item = &Arc<ServiceRegistration>> {
        self.registrations.values()
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    pub fn clear(&mut self) {
        self.registrations.clear();
    }
}
