use std::{ops::Deref, sync::Arc};

use keystone_di::{Dependency, Injectable, ResolveError, Resolver, Slot, Token};

/// A wrapper type to allow for config injections
///
/// Configs bound through [crate::provider::ConfigProvider::bind] live under their type token,
/// declare them with [Config::token].
///
/// # Example
/// ```rust
/// use keystone_config::{Config, ConfigProvider};
/// use keystone_di::{Arguments, Component, Container, DynError, Metadata};
///
/// struct MyModuleConfig {
///     enabled: bool,
/// }
///
/// struct MyModule {
///     config: Config<MyModuleConfig>,
/// }
/// impl Component for MyModule {
///     fn metadata() -> Metadata<Self> {
///         Metadata::<Self>::new().param::<Config<MyModuleConfig>>(Config::<MyModuleConfig>::token())
///     }
///
///     fn construct(args: &mut Arguments) -> Result<Self, DynError> {
///         Ok(MyModule { config: args.next()? })
///     }
/// }
///
/// let container = Container::new();
/// let mut configs = ConfigProvider::new();
/// configs.add_config(MyModuleConfig { enabled: true }).unwrap();
/// configs.bind(&container).unwrap();
///
/// container.bind_type::<MyModule>().to_self().unwrap().register().unwrap();
/// assert!(container.get::<MyModule>().unwrap().config.enabled);
/// ```
pub struct Config<T> {
    inner: Arc<T>,
}
impl<T> Deref for Config<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}
impl<T> Clone for Config<T> {
    fn clone(&self) -> Self {
        Config {
            inner: self.inner.clone(),
        }
    }
}
impl<T: 'static> Config<T> {
    /// The token configs of type `T` are bound under
    pub fn token() -> Token {
        Token::of::<T>()
    }
}
impl<T> Config<T> {
    pub fn inner(&self) -> Arc<T> {
        self.inner.clone()
    }

    pub fn into_inner(self) -> Arc<T> {
        self.inner
    }
}

impl<T: Injectable> Resolver for Config<T> {
    fn dependency(token: Token) -> Dependency {
        Dependency::required(token)
    }

    fn from_slot(slot: Slot, token: &Token) -> Result<Self, ResolveError> {
        let inner = <Arc<T>>::from_slot(slot, token)?;
        Ok(Config { inner })
    }
}
