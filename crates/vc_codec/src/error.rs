use alloc::string::{String, ToString};
use core::fmt;

use thiserror::Error;

use crate::context::{CodingPath, raise, raise_custom};
use crate::registry::StableId;

// -----------------------------------------------------------------------------
// RegistryError

/// An error raised by the [`TypeRegistry`](crate::registry::TypeRegistry).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum RegistryError {
    /// Two different types claim the same stable identifier.
    #[error("stable id `{id}` of `{incoming}` is already taken by `{existing}`")]
    IdentifierCollision {
        id: StableId,
        existing: &'static str,
        incoming: &'static str,
    },
    /// The type declares a stable identifier but is not registered, the
    /// registry is stale.
    #[error("`{type_name}` declares stable id `{id}` but is not registered")]
    FailedToResolveIdentifier {
        type_name: &'static str,
        id: StableId,
    },
    /// The type declares its own identifier and cannot be registered under another.
    #[error("`{type_name}` declares stable id `{declared}`, cannot register it as `{requested}`")]
    SelfIdentified {
        type_name: &'static str,
        declared: StableId,
        requested: StableId,
    },
    /// The type is already registered under another identifier.
    #[error("`{type_name}` is already registered as `{existing}`, cannot register it as `{requested}`")]
    AlreadyIdentified {
        type_name: &'static str,
        existing: StableId,
        requested: StableId,
    },
}

// -----------------------------------------------------------------------------
// CodecError

/// An error raised while encoding or decoding.
///
/// Every variant raised inside a call carries the [`CodingPath`] of the value
/// being processed.
#[derive(Debug, Error, Clone)]
#[non_exhaustive]
pub enum CodecError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    /// The concrete type of a polymorphic value is not registered.
    #[error("type `{type_name}` is not registered, at {path}")]
    UnresolvableType { type_name: String, path: CodingPath },
    /// A polymorphic slot names no registered type, or carries no
    /// discriminator at all.
    #[error("{}, at {path}", describe_discriminator(.discriminator.as_deref()))]
    UnresolvableDiscriminator {
        discriminator: Option<String>,
        path: CodingPath,
    },
    /// The payload does not fit the type the discriminator resolved to.
    #[error("payload does not fit `{expected}`: {message}, at {path}")]
    TypeMismatch {
        expected: String,
        message: String,
        path: CodingPath,
    },
    /// A required field is missing and no recovery applied.
    #[error("missing field `{key}`, at {path}")]
    KeyNotFound { key: String, path: CodingPath },
    #[error("decoding failed: {message}, at {path}")]
    DecodingFailed { message: String, path: CodingPath },
    #[error("encoding failed: {message}, at {path}")]
    EncodingFailed { message: String, path: CodingPath },
}

fn describe_discriminator(discriminator: Option<&str>) -> String {
    match discriminator {
        Some(discriminator) => alloc::format!("unknown type discriminator `{discriminator}`"),
        None => "missing type discriminator".to_string(),
    }
}

impl CodecError {
    /// The path of the value the error was raised at, `None` for registry errors.
    pub fn path(&self) -> Option<&CodingPath> {
        match self {
            Self::Registry(_) => None,
            Self::UnresolvableType { path, .. }
            | Self::UnresolvableDiscriminator { path, .. }
            | Self::TypeMismatch { path, .. }
            | Self::KeyNotFound { path, .. }
            | Self::DecodingFailed { path, .. }
            | Self::EncodingFailed { path, .. } => Some(path),
        }
    }

    #[inline]
    pub fn is_key_not_found(&self) -> bool {
        matches!(self, Self::KeyNotFound { .. })
    }
}

impl serde::ser::Error for CodecError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        raise_custom(msg.to_string(), |message, path| Self::EncodingFailed {
            message,
            path,
        })
    }
}

impl serde::de::Error for CodecError {
    fn custom<T: fmt::Display>(msg: T) -> Self {
        raise_custom(msg.to_string(), |message, path| Self::DecodingFailed {
            message,
            path,
        })
    }

    fn missing_field(field: &'static str) -> Self {
        raise(|path| Self::KeyNotFound {
            key: field.to_string(),
            path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{CodecError, RegistryError};
    use crate::context::CodingPath;

    #[test]
    fn messages_carry_the_path() {
        let error = CodecError::UnresolvableDiscriminator {
            discriminator: Some("ghost".into()),
            path: CodingPath::root(),
        };
        assert_eq!(error.to_string(), "unknown type discriminator `ghost`, at $");

        let error = CodecError::UnresolvableDiscriminator {
            discriminator: None,
            path: CodingPath::root(),
        };
        assert_eq!(error.to_string(), "missing type discriminator, at $");
    }

    #[test]
    fn registry_errors_convert() {
        let error: CodecError = RegistryError::IdentifierCollision {
            id: "foo".into(),
            existing: "a::Foo",
            incoming: "b::Foo",
        }
        .into();
        assert!(error.path().is_none());
        assert_eq!(
            error.to_string(),
            "stable id `foo` of `b::Foo` is already taken by `a::Foo`"
        );
    }

    #[test]
    fn serde_errors_outside_a_call_use_the_root() {
        let error = <CodecError as serde::de::Error>::missing_field("name");
        assert!(error.is_key_not_found());
        assert!(error.path().unwrap().is_root());
    }
}
