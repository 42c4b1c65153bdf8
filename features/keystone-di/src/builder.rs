use crate::{
    container::Container,
    errors::{InvalidProviderError, RegisterError},
    metadata::{Component, Dependency},
    provider::{Provider, RegisterOptions, Scope},
    resolver::Arguments,
    token::Token,
    types::{DynError, Injectable, Instance},
};

/// Fluent registration of a single token
///
/// Start with [Container::bind], choose the provider with one of the `to_*` steps
/// and finish with a scope selection, which performs exactly one registration.
///
/// Example:
/// ```
/// use keystone_di::{Container, Scope};
///
/// let container = Container::new();
/// container.bind("greeting").to_value("hello".to_string()).in_scope(Scope::Singleton).unwrap();
/// assert_eq!(*container.resolve_as::<String>("greeting").unwrap(), "hello");
/// ```
#[must_use = "nothing is registered until a scope is selected"]
pub struct BindingBuilder<'c, ProviderState> {
    container: &'c Container,
    token: Token,
    options: RegisterOptions,
    provider: ProviderState,
}
// Initial state, no provider chosen yet
impl<'c> BindingBuilder<'c, ()> {
    pub(crate) fn new(container: &'c Container, token: Token) -> Self {
        BindingBuilder {
            container,
            token,
            options: RegisterOptions::default(),
            provider: (),
        }
    }

    /// Constructs `T` whenever the token is resolved
    pub fn to<T: Component>(self) -> BindingBuilder<'c, Provider> {
        self.container.describe::<T>();
        self.with_provider(Provider::class::<T>())
    }

    /// Constructs the type the token itself names
    ///
    /// Only type tokens of described components qualify, anything else is rejected right away.
    pub fn to_self(self) -> Result<BindingBuilder<'c, Provider>, InvalidProviderError> {
        let Some(info) = self.token.type_info() else {
            return Err(InvalidProviderError::new(
                &self.token,
                "to_self requires a type token",
            ));
        };
        if self.container.descriptors().lookup(info).is_none() {
            return Err(InvalidProviderError::new(
                &self.token,
                format!("'{info}' is not a described component, bind it with bind_type"),
            ));
        }
        Ok(self.with_provider(Provider::Class(info)))
    }

    /// Hands out the given value
    pub fn to_value<T: Injectable>(self, value: T) -> BindingBuilder<'c, Provider> {
        self.with_provider(Provider::value(value))
    }

    /// Hands out an already type erased value
    pub fn to_instance(self, instance: Instance) -> BindingBuilder<'c, Provider> {
        self.with_provider(Provider::Value(instance))
    }

    /// Calls `factory` with the resolved `dependencies` as positional arguments
    pub fn to_factory<T, F>(self, dependencies: Vec<Dependency>, factory: F) -> BindingBuilder<'c, Provider>
    where
        T: Injectable,
        F: Fn(&mut Arguments) -> Result<T, DynError> + Send + Sync + 'static,
    {
        self.with_provider(Provider::factory(dependencies, factory))
    }

    /// Resolves `target` whenever the token is resolved
    pub fn to_existing(self, target: impl Into<Token>) -> BindingBuilder<'c, Provider> {
        self.with_provider(Provider::alias(target))
    }

    fn with_provider(self, provider: Provider) -> BindingBuilder<'c, Provider> {
        BindingBuilder {
            container: self.container,
            token: self.token,
            options: self.options,
            provider,
        }
    }
}
// Options can be set in any state
impl<ProviderState> BindingBuilder<'_, ProviderState> {
    /// Called with every newly constructed instance of this binding
    pub fn on_activation<F>(mut self, callback: F) -> Self
    where
        F: Fn(&Instance) -> Result<(), DynError> + Send + Sync + 'static,
    {
        self.options = self.options.on_activation(callback);
        self
    }

    pub fn token(&self) -> &Token {
        &self.token
    }
}
// Only allow registering once a provider is chosen
impl BindingBuilder<'_, Provider> {
    pub fn in_singleton_scope(self) -> Result<(), RegisterError> {
        self.in_scope(Scope::Singleton)
    }

    pub fn in_prototype_scope(self) -> Result<(), RegisterError> {
        self.in_scope(Scope::Prototype)
    }

    pub fn in_transient_scope(self) -> Result<(), RegisterError> {
        self.in_scope(Scope::Transient)
    }

    /// Registers with the container's default scope
    pub fn register(self) -> Result<(), RegisterError> {
        self.container
            .register(self.token, self.provider, self.options)
    }

    pub fn in_scope(mut self, scope: Scope) -> Result<(), RegisterError> {
        self.options.scope = Some(scope);
        self.register()
    }
}
