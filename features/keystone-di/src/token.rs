use std::{
    fmt,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use crate::types::TypeInfo;

static NEXT_SYMBOL_ID: AtomicU64 = AtomicU64::new(1);

/// An opaque key, unique for the lifetime of the process
///
/// Two symbols with the same description are still different keys.
#[derive(Clone, Copy)]
pub struct Symbol {
    id: u64,
    description: &'static str,
}
impl Symbol {
    pub fn new(description: &'static str) -> Self {
        Symbol {
            id: NEXT_SYMBOL_ID.fetch_add(1, Ordering::Relaxed),
            description,
        }
    }

    pub fn description(&self) -> &'static str {
        self.description
    }
}
impl PartialEq for Symbol {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}
impl Eq for Symbol {}
impl std::hash::Hash for Symbol {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}
impl fmt::Debug for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Symbol({}#{})", self.description, self.id)
    }
}

/// Identifies a service inside a container
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Token {
    /// A Rust type, compared by its TypeId
    Type(TypeInfo),
    /// A string name
    Name(Arc<str>),
    /// An opaque symbol
    Symbol(Symbol),
}
impl Token {
    pub fn of<T: 'static + ?Sized>() -> Self {
        Token::Type(TypeInfo::of::<T>())
    }

    pub fn name(name: impl Into<Arc<str>>) -> Self {
        Token::Name(name.into())
    }

    pub fn symbol(description: &'static str) -> Self {
        Token::Symbol(Symbol::new(description))
    }

    /// The type identity, if this token is a type token
    pub fn type_info(&self) -> Option<TypeInfo> {
        match self {
            Token::Type(info) => Some(*info),
            _ => None,
        }
    }
}
impl From<&'static str> for Token {
    fn from(name: &'static str) -> Self {
        Token::Name(name.into())
    }
}
impl From<String> for Token {
    fn from(name: String) -> Self {
        Token::Name(name.into())
    }
}
impl From<Symbol> for Token {
    fn from(symbol: Symbol) -> Self {
        Token::Symbol(symbol)
    }
}
impl From<&Token> for Token {
    fn from(token: &Token) -> Self {
        token.clone()
    }
}
impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Type(info) => f.write_str(info.type_name),
            Token::Name(name) => write!(f, "\"{name}\""),
            Token::Symbol(symbol) => write!(f, "Symbol({})", symbol.description),
        }
    }
}
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}
