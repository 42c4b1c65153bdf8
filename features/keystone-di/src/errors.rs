use std::sync::Arc;

use thiserror::Error;

use crate::{token::Token, types::DynError};

/// Generic errors about the state of a container
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ContainerError {
    /// The container was disposed and accepts no further work
    #[error("Container '{container}' has been disposed")]
    Disposed { container: String },
}

/// A provider was rejected at registration time
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid provider for '{token}': {reason}")]
pub struct InvalidProviderError {
    pub token: Token,
    pub reason: String,
}
impl InvalidProviderError {
    pub(crate) fn new(token: &Token, reason: impl Into<String>) -> Self {
        Self {
            token: token.clone(),
            reason: reason.into(),
        }
    }
}

/// Errors while registering a provider
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegisterError {
    #[error(transparent)]
    InvalidProvider(#[from] InvalidProviderError),
    #[error(transparent)]
    Container(#[from] ContainerError),
}

/// Errors while resolving a token
#[derive(Error, Debug, Clone)]
pub enum ResolveError {
    /// Nothing is registered for the token in the container or its ancestors
    #[error("No provider is registered for '{0}'")]
    ServiceNotFound(Token),
    /// The token is already being constructed further up the chain
    #[error("Circular dependency detected: {}", format_chain(.chain))]
    CircularDependency { chain: Vec<Token> },
    /// A constructor or factory returned an error
    #[error("Constructing '{token}' failed - error: {error}")]
    ConstructionFailed { token: Token, error: Arc<DynError> },
    /// A post-construct hook returned an error
    #[error("Post-construct hook '{hook}' of '{token}' failed - error: {error}")]
    LifecycleHookFailed {
        token: Token,
        hook: &'static str,
        error: Arc<DynError>,
    },
    /// The activation callback rejected the instance
    #[error("Activation of '{token}' failed - error: {error}")]
    ActivationFailed { token: Token, error: Arc<DynError> },
    #[error("Failed to downcast, required: '{required_type}' actual: '{actual_type}'")]
    DowncastFailed {
        required_type: &'static str,
        actual_type: &'static str,
    },
    #[error(transparent)]
    Container(#[from] ContainerError),
}
impl ResolveError {
    pub(crate) fn construction(token: &Token, error: DynError) -> Self {
        Self::ConstructionFailed {
            token: token.clone(),
            error: Arc::new(error),
        }
    }

    /// True if the error only reports a missing token
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::ServiceNotFound(_))
    }
}

fn format_chain(chain: &[Token]) -> String {
    chain
        .iter()
        .map(Token::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}

/// A pre-destroy hook failed during disposal
#[derive(Error, Debug, Clone)]
#[error("Pre-destroy hook '{hook}' of '{token}' failed - error: {error}")]
pub struct DisposeError {
    pub token: Token,
    pub hook: &'static str,
    pub error: Arc<DynError>,
}

/// All pre-destroy failures collected while disposing a container tree
#[derive(Error, Debug, Clone, Default)]
pub struct DisposeErrors {
    pub errors: Vec<DisposeError>,
}
impl std::fmt::Display for DisposeErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut display = Vec::new();
        display.push("Disposal completed with one or more hook failures:".to_string());
        for error in &self.errors {
            display.push(format!("- {}", error));
        }
        f.write_str(&display.join("\n"))
    }
}
