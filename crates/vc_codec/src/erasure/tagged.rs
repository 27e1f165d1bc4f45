use alloc::borrow::ToOwned;
use alloc::string::ToString;
use alloc::vec::Vec;
use core::fmt;

use serde::de::{self, MapAccess, SeqAccess, Visitor};
use serde::ser::{self, SerializeStruct};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::context::CodingContext;
use crate::pipeline::{Body, DecodeAs, meta_of};
use crate::registry::StableId;
use crate::{AnyValue, CodecError};

// -----------------------------------------------------------------------------
// TaggedElement

/// One element of an erased container, paired with the stable identifier of
/// its concrete type.
///
/// Written as `{ "tag": id, "payload": value }`; the tag always comes first
/// so the payload can be decoded as the type it names.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedElement {
    tag: StableId,
    value: AnyValue,
}

impl TaggedElement {
    #[inline]
    pub fn new(tag: StableId, value: AnyValue) -> Self {
        Self { tag, value }
    }

    /// Tags `value` with the identifier its concrete type is registered under.
    ///
    /// Fails with [`CodecError::UnresolvableType`] when the type is not
    /// registered or has no identifier: an untagged element could not be
    /// decoded again.
    pub fn from_value(value: &AnyValue, ctx: &CodingContext) -> Result<Self, CodecError> {
        let meta = meta_of(value.innermost(), ctx)?;
        match ctx.registry().resolve_stable_id(&meta)? {
            Some(tag) => Ok(Self::new(tag, value.clone())),
            None => Err(ctx.error(|path| CodecError::UnresolvableType {
                type_name: meta.type_name().to_owned(),
                path,
            })),
        }
    }

    #[inline]
    pub fn tag(&self) -> &StableId {
        &self.tag
    }

    #[inline]
    pub fn value(&self) -> &AnyValue {
        &self.value
    }

    #[inline]
    pub fn into_value(self) -> AnyValue {
        self.value
    }
}

struct Payload<'a>(&'a AnyValue);

impl Serialize for Payload<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let Some(ctx) = CodingContext::current() else {
            return Err(ser::Error::custom("erased containers can only be encoded by a modular encoder"));
        };
        let value = self.0.innermost();
        let meta = meta_of(value, &ctx).map_err(|error| ctx.smuggle_ser::<S::Error>(error))?;
        let body = Body::resolve(value, &meta, &ctx).map_err(|error| ctx.smuggle_ser::<S::Error>(error))?;
        body.serialize(serializer)
    }
}

impl Serialize for TaggedElement {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("TaggedElement", 2)?;
        state.serialize_field("tag", &self.tag)?;
        state.serialize_field("payload", &Payload(&self.value))?;
        state.end()
    }
}

#[derive(Deserialize)]
#[serde(field_identifier, rename_all = "lowercase")]
enum Field {
    Tag,
    Payload,
}

const FIELDS: &[&str] = &["tag", "payload"];

struct TaggedElementVisitor;

impl TaggedElementVisitor {
    fn resolve<E: de::Error>(tag: StableId) -> Result<(StableId, DecodeAs), E> {
        let Some(ctx) = CodingContext::current() else {
            return Err(E::custom("erased containers can only be decoded by a modular decoder"));
        };
        match ctx.registry().resolve_id(&tag) {
            Some(meta) => Ok((tag, DecodeAs::new(meta, None))),
            None => Err(ctx.smuggle_de(ctx.child("tag").error(|path| CodecError::UnresolvableType {
                type_name: tag.to_string(),
                path,
            }))),
        }
    }
}

impl<'de> Visitor<'de> for TaggedElementVisitor {
    type Value = TaggedElement;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a tagged element")
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<TaggedElement, A::Error> {
        let tag: StableId = seq
            .next_element()?
            .ok_or_else(|| <A::Error as de::Error>::invalid_length(0, &self))?;
        let (tag, seed) = Self::resolve::<A::Error>(tag)?;
        let value = seq
            .next_element_seed(seed)?
            .ok_or_else(|| <A::Error as de::Error>::invalid_length(1, &self))?;
        Ok(TaggedElement::new(tag, value))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<TaggedElement, A::Error> {
        match map.next_key::<Field>()? {
            Some(Field::Tag) => {}
            Some(Field::Payload) => return Err(de::Error::custom("`tag` must precede `payload`")),
            None => return Err(de::Error::missing_field("tag")),
        }
        let (tag, seed) = Self::resolve::<A::Error>(map.next_value()?)?;
        match map.next_key::<Field>()? {
            Some(Field::Payload) => {}
            Some(Field::Tag) => return Err(de::Error::duplicate_field("tag")),
            None => return Err(de::Error::missing_field("payload")),
        }
        let value = map.next_value_seed(seed)?;
        if let Some(field) = map.next_key::<Field>()? {
            let name = match field {
                Field::Tag => "tag",
                Field::Payload => "payload",
            };
            return Err(de::Error::duplicate_field(name));
        }
        Ok(TaggedElement::new(tag, value))
    }
}

impl<'de> Deserialize<'de> for TaggedElement {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_struct("TaggedElement", FIELDS, TaggedElementVisitor)
    }
}

// -----------------------------------------------------------------------------
// TaggedRepresentation

/// The wire shape of an erased container.
///
/// Externally tagged by container kind:
///
/// ```text
/// { "array": [ { "tag": "i32", "payload": 1 }, .. ] }
/// { "map": [ [ key, value ], .. ] }
/// { "optional": null }
/// { "result": { "err": { "tag": "string", "payload": "boom" } } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaggedRepresentation {
    Array(Vec<TaggedElement>),
    Set(Vec<TaggedElement>),
    Map(Vec<(TaggedElement, TaggedElement)>),
    Optional(Option<TaggedElement>),
    Result(TaggedBranch),
}

/// The branch of an erased result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaggedBranch {
    Ok(TaggedElement),
    Err(TaggedElement),
}

impl TaggedRepresentation {
    /// The container kind, as written on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Array(_) => "array",
            Self::Set(_) => "set",
            Self::Map(_) => "map",
            Self::Optional(_) => "optional",
            Self::Result(_) => "result",
        }
    }
}

// -----------------------------------------------------------------------------
// TypeErasure

/// A container whose elements are [`AnyValue`]s, converted to and from its
/// [`TaggedRepresentation`].
///
/// Registered through [`TypeTraitErasure`](crate::registry::TypeTraitErasure),
/// usually with `#[type_meta(erasure)]`. The pipeline only uses it when the
/// [unsafe serialization plugin](crate::plugin::UnsafeSerializationPlugin)
/// is active.
pub trait TypeErasure: Sized {
    fn to_tagged(&self, ctx: &CodingContext) -> Result<TaggedRepresentation, CodecError>;

    /// Fails with [`CodecError::TypeMismatch`] when `repr` is of another kind.
    fn from_tagged(repr: TaggedRepresentation, ctx: &CodingContext) -> Result<Self, CodecError>;
}
