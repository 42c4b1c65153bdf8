use std::{any::TypeId, collections::HashMap, sync::Arc};

use keystone_di::{Container, Injectable, Instance, Provider, RegisterOptions, Token, TypeInfo};

use crate::errors::{GetConfigError, RegisterConfigError};

/// A provider to register all configs.
///
/// Configs can be registered and retrieved based on type,
/// and bound into a [Container] as values under their type token.
#[derive(Default)]
pub struct ConfigProvider {
    configs: HashMap<TypeId, Instance>,
}

impl ConfigProvider {
    /// Initializes an empty Config Provider
    pub fn new() -> Self {
        Self::default()
    }

    /// Retrieve a config with specified type.
    pub fn get_config<T: Injectable>(&self) -> Option<Arc<T>> {
        self.configs
            .get(&TypeId::of::<T>())
            .and_then(|instance| instance.downcast().ok())
    }

    /// Retrieve a config which has to be present
    ///
    /// If the config type is not available, it will return a [`GetConfigError`]
    pub fn require_config<T: Injectable>(&self) -> Result<Arc<T>, GetConfigError> {
        self.get_config()
            .ok_or_else(|| GetConfigError::Missing(TypeInfo::of::<T>()))
    }

    /// Add a config to the registry.
    ///
    /// If the config type is already registered, it will return a
    /// [`RegisterConfigError`]
    pub fn add_config<T: Injectable>(&mut self, config: T) -> Result<&mut Self, RegisterConfigError> {
        let info = TypeInfo::of::<T>();

        if self.configs.contains_key(&info.type_id) {
            return Err(RegisterConfigError::AlreadyRegistered(info));
        }

        tracing::debug!("Adding config {}", info);
        self.configs.insert(info.type_id, Instance::new(config));
        Ok(self)
    }

    /// Can optionally add a config to the registry.
    ///
    /// If the config provided is `Some(T)`, it will be the same as calling [`ConfigProvider::add_config`]
    /// If the config provided is `None`, then the function just returns `Ok(self)` for chaining
    pub fn maybe_add_config<T: Injectable>(
        &mut self,
        config: Option<T>,
    ) -> Result<&mut Self, RegisterConfigError> {
        match config {
            Some(c) => self.add_config(c),
            None => Ok(self),
        }
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }

    /// Registers every config as value provider under its type token
    ///
    /// Registering on a child container overrides the configs of its ancestors for that subtree only.
    pub fn bind(&self, container: &Container) -> Result<(), RegisterConfigError> {
        for instance in self.configs.values() {
            tracing::debug!("Binding config {} into '{}'", instance.info, container.name());
            container.register(
                Token::Type(instance.info),
                Provider::Value(instance.clone()),
                RegisterOptions::default(),
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use keystone_di::{ContainerOptions, ResolveError};

    use super::*;

    #[derive(Debug, PartialEq)]
    struct HttpConfig {
        port: u16,
    }

    #[derive(Debug, PartialEq)]
    struct DatabaseConfig {
        url: String,
    }

    #[test]
    fn configs_are_unique_per_type() {
        let mut provider = ConfigProvider::new();
        provider.add_config(HttpConfig { port: 80 }).unwrap();

        let err = provider.add_config(HttpConfig { port: 81 }).err().unwrap();
        assert!(matches!(err, RegisterConfigError::AlreadyRegistered(_)));
        assert_eq!(provider.get_config::<HttpConfig>().unwrap().port, 80);
    }

    #[test]
    fn maybe_add_skips_none() {
        let mut provider = ConfigProvider::new();
        provider
            .maybe_add_config::<DatabaseConfig>(None)
            .unwrap()
            .maybe_add_config(Some(HttpConfig { port: 80 }))
            .unwrap();

        assert_eq!(provider.len(), 1);
        assert!(provider.get_config::<DatabaseConfig>().is_none());
        assert!(matches!(
            provider.require_config::<DatabaseConfig>(),
            Err(GetConfigError::Missing(_))
        ));
    }

    #[test]
    fn bind_registers_type_tokens() {
        let mut provider = ConfigProvider::new();
        provider
            .add_config(DatabaseConfig {
                url: "postgres://root".to_string(),
            })
            .unwrap();

        let root = Container::new();
        provider.bind(&root).unwrap();

        let child = root.create_child(ContainerOptions::named("tenant")).unwrap();
        let mut overrides = ConfigProvider::new();
        overrides
            .add_config(DatabaseConfig {
                url: "postgres://tenant".to_string(),
            })
            .unwrap();
        overrides.bind(&child).unwrap();

        assert_eq!(root.get::<DatabaseConfig>().unwrap().url, "postgres://root");
        assert_eq!(child.get::<DatabaseConfig>().unwrap().url, "postgres://tenant");
        assert!(matches!(
            root.get::<HttpConfig>(),
            Err(ResolveError::ServiceNotFound(_))
        ));
    }
}
