use keystone_di::{types::TypeInfo, RegisterError};

/// Errors when trying to aquire a config
#[derive(thiserror::Error, Debug, Clone)]
pub enum GetConfigError {
    /// The required Config is not known
    #[error("The required Config type '{0}' is not known")]
    Missing(TypeInfo),
}

/// Errors when trying to register a config
#[derive(thiserror::Error, Debug, Clone)]
pub enum RegisterConfigError {
    /// The Config type is already registered
    #[error("The Config type '{0}' is already registered")]
    AlreadyRegistered(TypeInfo),
    /// The container refused the config
    #[error(transparent)]
    Container(#[from] RegisterError),
}
