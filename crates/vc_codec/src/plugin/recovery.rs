use crate::context::CodingContext;
use crate::plugin::Plugin;

/// Substitutes a default for a field missing from the input.
///
/// The substitute is, in order:
///
/// 1. the default of the field's type, when that type is registered with
///    [`TypeTraitDefault`](crate::registry::TypeTraitDefault) under the
///    name `serde` reports for it;
/// 2. `None` for an optional field;
/// 3. the empty value of a scalar, string, tuple, sequence or map.
///
/// Any other field, such as a struct or enum registered without a default
/// or a self-describing slot, still fails with
/// [`CodecError::KeyNotFound`](crate::CodecError::KeyNotFound).
///
/// Recovery takes precedence over field-level `#[serde(default)]` handling.
pub trait KeyNotFoundRecovery: Send + Sync {
    /// Whether the missing `field` should be recovered.
    ///
    /// `ctx` is the context of the struct declaring the field.
    #[inline]
    fn should_recover(&self, field: &str, ctx: &CodingContext) -> bool {
        let _ = (field, ctx);
        true
    }
}

/// The built-in [`KeyNotFoundRecovery`], recovering every missing field.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyNotFoundRecoveryPlugin;

impl KeyNotFoundRecovery for KeyNotFoundRecoveryPlugin {}

impl Plugin for KeyNotFoundRecoveryPlugin {
    fn name(&self) -> &'static str {
        "key_not_found_recovery"
    }

    #[inline]
    fn as_key_not_found_recovery(&self) -> Option<&dyn KeyNotFoundRecovery> {
        Some(self)
    }
}
