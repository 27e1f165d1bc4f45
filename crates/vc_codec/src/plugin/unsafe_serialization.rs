use crate::plugin::Plugin;

/// Authorizes values with no native serialization to be encoded through the
/// type-erasure bridge.
///
/// Without this plugin, encoding such a value fails with
/// [`CodecError::EncodingFailed`](crate::CodecError::EncodingFailed), and
/// decoding a bridge payload fails with
/// [`CodecError::DecodingFailed`](crate::CodecError::DecodingFailed).
#[derive(Debug, Clone, Copy, Default)]
pub struct UnsafeSerializationPlugin;

impl Plugin for UnsafeSerializationPlugin {
    fn name(&self) -> &'static str {
        "unsafe_serialization"
    }

    #[inline]
    fn allows_unsafe_serialization(&self) -> bool {
        true
    }
}
