//! Dependency descriptors for constructible types
//!
//! Instead of discovering constructor parameters, injectable properties and hooks at runtime,
//! every constructible type implements [Component] and describes itself through [Metadata].
//! The described types are kept in a [DescriptorTable] keyed by type identity,
//! which the container consults when a class provider is registered.

use std::{
    any::{type_name, Any, TypeId},
    collections::HashMap,
    future::Future,
    marker::PhantomData,
    sync::Arc,
};

use parking_lot::RwLock;

use crate::{
    errors::ResolveError,
    lifecycle::{LifecycleHooks, PostConstruct, PostConstructHook, PreDestroy, PreDestroyHook},
    resolver::{Arguments, Resolver, Slot},
    token::Token,
    types::{DynError, Injectable, TypeInfo},
};

/// Information about a single dependency
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// The required token
    pub token: Token,
    /// If it is optional or required
    pub optional: bool,
    /// If the dependency is injected lazily
    pub lazy: bool,
}
impl Dependency {
    pub fn required(token: impl Into<Token>) -> Self {
        Self {
            token: token.into(),
            optional: false,
            lazy: false,
        }
    }

    pub fn optional(token: impl Into<Token>) -> Self {
        Self {
            optional: true,
            ..Self::required(token)
        }
    }

    pub fn lazy(token: impl Into<Token>) -> Self {
        Self {
            lazy: true,
            ..Self::required(token)
        }
    }
}

/// A type the container knows how to construct
pub trait Component: Injectable + Sized {
    /// Describes constructor parameters, injectable properties and lifecycle hooks
    fn metadata() -> Metadata<Self>;

    /// Constructs a new instance
    ///
    /// `args` holds the resolved constructor parameters in the order they were declared.
    fn construct(args: &mut Arguments) -> Result<Self, DynError>;
}

type ErasedProperty =
    dyn Fn(&mut (dyn Any + Send + Sync), Slot, &Token) -> Result<(), ResolveError> + Send + Sync;

/// A property filled in after construction
pub(crate) struct PropertyDescriptor {
    pub name: &'static str,
    pub dependency: Dependency,
    pub inject: Arc<ErasedProperty>,
}

/// Typed builder for the description of a [Component]
pub struct Metadata<T> {
    parameters: Vec<Dependency>,
    properties: Vec<PropertyDescriptor>,
    hooks: LifecycleHooks,
    _marker: PhantomData<fn() -> T>,
}
impl<T: Component> Default for Metadata<T> {
    fn default() -> Self {
        Self::new()
    }
}
impl<T: Component> Metadata<T> {
    pub fn new() -> Self {
        Metadata {
            parameters: Vec::new(),
            properties: Vec::new(),
            hooks: LifecycleHooks::default(),
            _marker: PhantomData,
        }
    }

    /// Declares the next constructor parameter
    ///
    /// `R` decides how the parameter is injected, e.g. `Arc<Logger>`, `Option<Arc<Logger>>` or `Lazy<Logger>`.
    pub fn param<R: Resolver>(mut self, token: impl Into<Token>) -> Self {
        self.parameters.push(R::dependency(token.into()));
        self
    }

    /// Declares a property which is injected right after construction
    ///
    /// Properties declared as `Option<_>` are skipped if their token is not registered.
    pub fn property<R, Set>(mut self, name: &'static str, token: impl Into<Token>, set: Set) -> Self
    where
        R: Resolver + 'static,
        Set: Fn(&mut T, R) + Send + Sync + 'static,
    {
        let inject = move |target: &mut (dyn Any + Send + Sync), slot: Slot, token: &Token| {
            let value = R::from_slot(slot, token)?;
            let target =
                target
                    .downcast_mut::<T>()
                    .ok_or_else(|| ResolveError::DowncastFailed {
                        required_type: type_name::<T>(),
                        actual_type: "<unknown>",
                    })?;
            set(target, value);
            Ok(())
        };

        self.properties.push(PropertyDescriptor {
            name,
            dependency: R::dependency(token.into()),
            inject: Arc::new(inject),
        });
        self
    }

    /// Adds a hook which runs after construction and property injection
    ///
    /// Hooks run in the order they were declared.
    pub fn post_construct<Hook>(mut self, name: &'static str, hook: Hook) -> Self
    where
        Hook: Fn(&mut T) -> Result<(), DynError> + Send + Sync + 'static,
    {
        let run = move |target: &mut (dyn Any + Send + Sync)| match target.downcast_mut::<T>() {
            Some(target) => hook(target),
            None => Err(format!("post-construct target is not a '{}'", type_name::<T>()).into()),
        };
        self.hooks.post_construct.push(PostConstructHook {
            name,
            run: Arc::new(run),
        });
        self
    }

    /// Adds a hook which runs once when the owning container is disposed
    pub fn pre_destroy<Hook>(mut self, name: &'static str, hook: Hook) -> Self
    where
        Hook: Fn(&T) -> Result<(), DynError> + Send + Sync + 'static,
    {
        let hook = Arc::new(hook);
        self.hooks.pre_destroy.push(PreDestroyHook::new::<T, _, _>(name, move |target| {
            let hook = hook.clone();
            async move { hook(&*target) }
        }));
        self
    }

    /// Adds an asynchronous pre-destroy hook
    pub fn pre_destroy_async<Hook, Fut>(mut self, name: &'static str, hook: Hook) -> Self
    where
        Hook: Fn(Arc<T>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), DynError>> + Send + 'static,
    {
        self.hooks
            .pre_destroy
            .push(PreDestroyHook::new::<T, _, _>(name, hook));
        self
    }

    /// Registers [PostConstruct::post_construct] as hook
    pub fn post_constructable(self) -> Self
    where
        T: PostConstruct,
    {
        self.post_construct("post_construct", T::post_construct)
    }

    /// Registers [PreDestroy::pre_destroy] as hook
    pub fn disposable(self) -> Self
    where
        T: PreDestroy,
    {
        self.pre_destroy("pre_destroy", T::pre_destroy)
    }
}

type ConstructFn = dyn Fn(&mut Arguments) -> Result<Box<dyn Any + Send + Sync>, DynError> + Send + Sync;

/// Type erased description of a [Component]
pub struct ClassDescriptor {
    pub info: TypeInfo,
    /// Constructor parameters in declaration order
    pub parameters: Vec<Dependency>,
    pub(crate) properties: Vec<PropertyDescriptor>,
    pub(crate) hooks: Arc<LifecycleHooks>,
    construct: Box<ConstructFn>,
}
impl ClassDescriptor {
    pub fn of<T: Component>() -> Self {
        let Metadata {
            parameters,
            properties,
            hooks,
            ..
        } = T::metadata();

        ClassDescriptor {
            info: TypeInfo::of::<T>(),
            parameters,
            properties,
            hooks: Arc::new(hooks),
            construct: Box::new(|args: &mut Arguments| {
                T::construct(args).map(|value| Box::new(value) as Box<dyn Any + Send + Sync>)
            }),
        }
    }

    /// Constructor parameters followed by injectable properties
    pub fn dependencies(&self) -> impl Iterator<Item = &Dependency> {
        self.parameters
            .iter()
            .chain(self.properties.iter().map(|property| &property.dependency))
    }

    /// Names of the injectable properties in declaration order
    pub fn property_names(&self) -> Vec<&'static str> {
        self.properties.iter().map(|property| property.name).collect()
    }

    pub(crate) fn construct(
        &self,
        args: &mut Arguments,
    ) -> Result<Box<dyn Any + Send + Sync>, DynError> {
        (self.construct)(args)
    }
}
impl std::fmt::Debug for ClassDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassDescriptor")
            .field("type", &self.info.type_name)
            .field("parameters", &self.parameters)
            .field("properties", &self.property_names())
            .finish()
    }
}

/// Side table of all described types, keyed by type identity
#[derive(Default)]
pub struct DescriptorTable {
    descriptors: RwLock<HashMap<TypeId, Arc<ClassDescriptor>>>,
}
impl DescriptorTable {
    /// Records the description of `T`, keeping an earlier one if present
    pub fn describe<T: Component>(&self) -> Arc<ClassDescriptor> {
        if let Some(existing) = self.descriptors.read().get(&TypeId::of::<T>()) {
            return existing.clone();
        }

        self.descriptors
            .write()
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Arc::new(ClassDescriptor::of::<T>()))
            .clone()
    }

    pub fn lookup(&self, info: TypeInfo) -> Option<Arc<ClassDescriptor>> {
        self.descriptors.read().get(&info.type_id).cloned()
    }

    pub fn len(&self) -> usize {
        self.descriptors.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Instance;

    struct Greeter {
        greeting: Arc<String>,
        suffix: Option<Arc<String>>,
        ready: bool,
    }
    impl Component for Greeter {
        fn metadata() -> Metadata<Self> {
            Metadata::<Self>::new()
                .param::<Arc<String>>("greeting")
                .property("suffix", "suffix", |this: &mut Self, value: Option<Arc<String>>| {
                    this.suffix = value
                })
                .post_construct("ready", |this| {
                    this.ready = true;
                    Ok(())
                })
        }

        fn construct(args: &mut Arguments) -> Result<Self, DynError> {
            Ok(Greeter {
                greeting: args.next()?,
                suffix: None,
                ready: false,
            })
        }
    }

    #[test]
    fn descriptor_lists_parameters_then_properties() {
        let descriptor = ClassDescriptor::of::<Greeter>();
        let tokens: Vec<_> = descriptor.dependencies().map(|d| d.token.clone()).collect();
        assert_eq!(tokens, vec![Token::name("greeting"), Token::name("suffix")]);
        assert!(descriptor.properties[0].dependency.optional);
        assert_eq!(descriptor.property_names(), vec!["suffix"]);
        assert_eq!(descriptor.hooks.post_construct.len(), 1);
    }

    #[test]
    fn construct_consumes_arguments_in_order() {
        let descriptor = ClassDescriptor::of::<Greeter>();
        let mut args = Arguments::new(
            Token::of::<Greeter>(),
            vec![(
                Token::name("greeting"),
                Slot::Resolved(Instance::new("hello".to_string())),
            )],
        );

        let mut built = descriptor.construct(&mut args).unwrap();
        let property = &descriptor.properties[0];
        (property.inject)(built.as_mut(), Slot::Absent, &Token::name("suffix")).unwrap();

        let greeter = built.downcast::<Greeter>().unwrap();
        assert_eq!(*greeter.greeting, "hello");
        assert!(greeter.suffix.is_none());
        assert!(!greeter.ready);
    }

    #[test]
    fn missing_argument_is_a_construction_error() {
        let descriptor = ClassDescriptor::of::<Greeter>();
        let mut args = Arguments::new(Token::of::<Greeter>(), vec![]);
        assert!(descriptor.construct(&mut args).is_err());
    }

    #[test]
    fn table_keeps_first_description() {
        let table = DescriptorTable::default();
        let first = table.describe::<Greeter>();
        let second = table.describe::<Greeter>();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(table.len(), 1);
        assert!(table.lookup(TypeInfo::of::<String>()).is_none());
    }
}
