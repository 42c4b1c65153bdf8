use std::{any::type_name, sync::Arc};

use crate::{
    errors::ResolveError,
    metadata::Dependency,
    resolver::{Resolver, Slot},
    token::Token,
    types::{Injectable, Instance},
};

impl<T: Injectable> Resolver for Arc<T> {
    fn dependency(token: Token) -> Dependency {
        Dependency {
            token,
            optional: false,
            lazy: false,
        }
    }

    fn from_slot(slot: Slot, token: &Token) -> Result<Self, ResolveError> {
        let instance = Instance::from_slot(slot, token)?;
        instance
            .downcast::<T>()
            .map_err(|actual_type| ResolveError::DowncastFailed {
                required_type: type_name::<T>(),
                actual_type,
            })
    }
}

impl Resolver for Instance {
    fn dependency(token: Token) -> Dependency {
        Dependency {
            token,
            optional: false,
            lazy: false,
        }
    }

    fn from_slot(slot: Slot, token: &Token) -> Result<Self, ResolveError> {
        match slot {
            Slot::Resolved(instance) => Ok(instance),
            Slot::Absent => Err(ResolveError::ServiceNotFound(token.clone())),
            Slot::Lazy(handle) => handle.resolve(),
        }
    }
}

impl<Resolvable: Resolver> Resolver for Option<Resolvable> {
    fn dependency(token: Token) -> Dependency {
        let original = Resolvable::dependency(token);
        Dependency {
            optional: true,
            ..original
        }
    }

    fn from_slot(slot: Slot, token: &Token) -> Result<Self, ResolveError> {
        match slot {
            // An unregistered optional dependency does not fail
            Slot::Absent => Ok(None),
            slot => Resolvable::from_slot(slot, token).map(Some),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn option_marks_dependency_optional() {
        let dependency = <Option<Arc<String>>>::dependency(Token::name("x"));
        assert!(dependency.optional);
        assert!(!dependency.lazy);
        assert!(!<Arc<String>>::dependency(Token::name("x")).optional);
    }

    #[test]
    fn absent_slot_is_none_only_when_optional() {
        let token = Token::name("missing");
        let none = <Option<Arc<String>>>::from_slot(Slot::Absent, &token).unwrap();
        assert!(none.is_none());

        let err = <Arc<String>>::from_slot(Slot::Absent, &token).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn wrong_type_reports_downcast() {
        let token = Token::name("number");
        let slot = Slot::Resolved(Instance::new(42_u32));
        let err = <Arc<String>>::from_slot(slot, &token).unwrap_err();
        assert!(matches!(
            err,
            ResolveError::DowncastFailed {
                actual_type: "u32",
                ..
            }
        ));
    }
}
