use std::collections::VecDeque;

use crate::{
    errors::ResolveError, metadata::Dependency, resolver::lazy::LazyHandle, token::Token,
    types::Instance,
};

pub mod arc;
pub mod lazy;

/// Outcome of resolving a single declared dependency
pub enum Slot {
    /// The dependency was resolved
    Resolved(Instance),
    /// An optional dependency was not registered
    Absent,
    /// A lazy dependency, resolved on first access
    Lazy(LazyHandle),
}

/// Allows custom behaviour on injection
///
/// Declares how a dependency is recorded in metadata
/// and how the resolved slot is turned into the value handed to constructors.
pub trait Resolver: Sized {
    fn dependency(token: Token) -> Dependency;

    fn from_slot(slot: Slot, token: &Token) -> Result<Self, ResolveError>;
}

/// Positional arguments for a constructor or factory
///
/// Holds the resolved dependencies in declaration order.
pub struct Arguments {
    owner: Token,
    slots: VecDeque<(Token, Slot)>,
}
impl Arguments {
    pub(crate) fn new(owner: Token, slots: Vec<(Token, Slot)>) -> Self {
        Self {
            owner,
            slots: slots.into(),
        }
    }

    /// Takes the next positional argument
    pub fn next<R: Resolver>(&mut self) -> Result<R, ResolveError> {
        let Some((token, slot)) = self.slots.pop_front() else {
            return Err(ResolveError::construction(
                &self.owner,
                format!("'{}' requested more arguments than it declared", self.owner).into(),
            ));
        };
        R::from_slot(slot, &token)
    }

    /// Number of arguments not taken yet
    pub fn remaining(&self) -> usize {
        self.slots.len()
    }
}
