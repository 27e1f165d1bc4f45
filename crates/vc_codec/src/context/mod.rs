//! The data threaded through every nested encode and decode call.
//!
//! - [`Configuration`]: the ordered plugin list, owned by an encoder or decoder.
//! - [`CodingContext`]: an immutable view of one nesting point: its path,
//!   its static type, the enclosing frames and the plugins suppressed at
//!   this level.
//!
//! A root context is created for every top-level call. Nested values get a
//! narrowed context from [`CodingContext::child`]; nothing is mutated in place.
//! While a value is being encoded or decoded its context is installed as the
//! thread's [current](CodingContext::current) context, which is how
//! polymorphic values such as [`AnyValue`](crate::AnyValue) find the registry
//! and the plugins.

// -----------------------------------------------------------------------------
// Modules

mod configuration;
mod path;

// -----------------------------------------------------------------------------
// Exports

pub use configuration::{Configuration, PluginSet};
pub use path::{CodingPath, PathSegment};

// -----------------------------------------------------------------------------
// CodingContext

use alloc::rc::Rc;
use alloc::string::{String, ToString};
use alloc::sync::Arc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt;

use crate::CodecError;
use crate::plugin::{KeyNotFoundRecovery, TypeDiscriminator};
use crate::registry::TypeRegistry;

/// State shared by every context of one top-level call.
struct Session {
    registry: Arc<TypeRegistry>,
    config: Configuration,
    canonical: bool,
    // The latest structured error, with its rendering. Transports only carry
    // messages, this is how an error crossing them is recognized again.
    last_error: RefCell<Option<(String, CodecError)>>,
    // The key most recently read by a map access of this call.
    captured_key: RefCell<Option<String>>,
}

struct Frame {
    parent: Option<Rc<Frame>>,
    segment: Option<PathSegment>,
    static_type: Option<&'static str>,
    suppressed: PluginSet,
    // Holds a container whose iteration order carries no meaning.
    unordered: bool,
}

/// An immutable view of one nesting point of an encode or decode call.
///
/// Cloning is cheap. Contexts are tied to the thread running the call.
#[derive(Clone)]
pub struct CodingContext {
    session: Rc<Session>,
    frame: Rc<Frame>,
}

std::thread_local! {
    static CURRENT: RefCell<Option<CodingContext>> = const { RefCell::new(None) };
}

// Restores the previously installed context, also when unwinding.
struct Restore(Option<CodingContext>);

impl Drop for Restore {
    fn drop(&mut self) {
        let previous = self.0.take();
        CURRENT.with(|current| *current.borrow_mut() = previous);
    }
}

impl CodingContext {
    pub(crate) fn root(
        registry: Arc<TypeRegistry>,
        config: Configuration,
        canonical: bool,
        static_type: Option<&'static str>,
    ) -> Self {
        Self {
            session: Rc::new(Session {
                registry,
                config,
                canonical,
                last_error: RefCell::new(None),
                captured_key: RefCell::new(None),
            }),
            frame: Rc::new(Frame {
                parent: None,
                segment: None,
                static_type,
                suppressed: PluginSet::empty(),
                unordered: false,
            }),
        }
    }

    /// The context installed by the innermost running encode or decode, if any.
    pub fn current() -> Option<Self> {
        CURRENT.with(|current| current.borrow().clone())
    }

    /// Runs `func` with `self` installed as the current context.
    pub(crate) fn enter<R>(&self, func: impl FnOnce() -> R) -> R {
        let previous = CURRENT.with(|current| current.replace(Some(self.clone())));
        let _restore = Restore(previous);
        func()
    }

    fn derive(&self, segment: Option<PathSegment>, static_type: Option<&'static str>, suppressed: PluginSet) -> Self {
        Self {
            session: self.session.clone(),
            frame: Rc::new(Frame {
                parent: Some(self.frame.clone()),
                segment,
                static_type,
                suppressed,
                unordered: false,
            }),
        }
    }

    /// The context of a nested value.
    ///
    /// Suppressed plugins are not inherited: suppression only covers the
    /// level it was applied to.
    #[inline]
    pub fn child(&self, segment: impl Into<PathSegment>) -> Self {
        self.derive(Some(segment.into()), None, PluginSet::empty())
    }

    /// The same nesting point, with its static type now known.
    #[inline]
    pub fn with_static_type(&self, static_type: &'static str) -> Self {
        self.derive(None, Some(static_type), self.frame.suppressed)
    }

    /// The content of the newtype struct `static_type` at this nesting point.
    ///
    /// A newtype is a value of its own, so suppression is not inherited.
    #[inline]
    pub fn newtype(&self, static_type: &'static str) -> Self {
        self.derive(None, Some(static_type), PluginSet::empty())
    }

    /// The same nesting point, with the plugin at `index` suppressed.
    #[inline]
    pub fn suppressing(&self, index: usize) -> Self {
        self.derive(None, self.frame.static_type, self.frame.suppressed.with(index))
    }

    /// The same nesting point, holding a container whose iteration order
    /// carries no meaning. Canonical encoding sorts its elements.
    pub(crate) fn unordered(&self) -> Self {
        Self {
            session: self.session.clone(),
            frame: Rc::new(Frame {
                parent: Some(self.frame.clone()),
                segment: None,
                static_type: self.frame.static_type,
                suppressed: self.frame.suppressed,
                unordered: true,
            }),
        }
    }

    #[inline]
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.session.registry
    }

    #[inline]
    pub fn configuration(&self) -> &Configuration {
        &self.session.config
    }

    /// Whether this call produces canonical output for hashing.
    #[inline]
    pub fn is_canonical(&self) -> bool {
        self.session.canonical
    }

    /// The statically declared type at this nesting point, when known.
    #[inline]
    pub fn static_type(&self) -> Option<&'static str> {
        self.frame.static_type
    }

    /// Whether the value at this nesting point is sorted before being written.
    #[inline]
    pub fn is_unordered(&self) -> bool {
        self.frame.unordered
    }

    #[inline]
    pub fn suppressed(&self) -> PluginSet {
        self.frame.suppressed
    }

    fn frames(&self) -> impl Iterator<Item = &Frame> {
        core::iter::successors(Some(&*self.frame), |&frame| frame.parent.as_deref())
    }

    /// The number of nesting steps from the root.
    pub fn depth(&self) -> usize {
        self.frames().filter(|frame| frame.segment.is_some()).count()
    }

    /// The static types of this and the enclosing values, outermost first.
    pub fn enclosing_types(&self) -> Vec<&'static str> {
        let mut types: Vec<_> = self.frames().filter_map(|frame| frame.static_type).collect();
        types.reverse();
        types.dedup();
        types
    }

    pub fn path(&self) -> CodingPath {
        let mut segments: Vec<_> = self
            .frames()
            .filter_map(|frame| frame.segment.clone())
            .collect();
        segments.reverse();
        CodingPath::from_parts(segments, self.enclosing_types())
    }

    /// The active type discriminator, unless suppressed at this level.
    pub fn type_discriminator(&self) -> Option<(usize, &dyn TypeDiscriminator)> {
        self.configuration()
            .type_discriminator()
            .filter(|(index, _)| !self.frame.suppressed.contains(*index))
    }

    /// The active key-not-found recovery, unless suppressed at this level.
    pub fn key_not_found_recovery(&self) -> Option<&dyn KeyNotFoundRecovery> {
        self.configuration()
            .key_not_found_recovery()
            .filter(|(index, _)| !self.frame.suppressed.contains(*index))
            .map(|(_, recovery)| recovery)
    }

    /// Whether the type-erasure bridge fallback is authorized at this level.
    pub fn allows_unsafe_serialization(&self) -> bool {
        self.configuration()
            .unsafe_serialization()
            .is_some_and(|index| !self.frame.suppressed.contains(index))
    }

    // -------------------------------------------------------------------------
    // Errors

    /// Builds an error located at this context and remembers it for the call.
    pub(crate) fn error(&self, make: impl FnOnce(CodingPath) -> CodecError) -> CodecError {
        let error = make(self.path());
        self.remember(&error);
        error
    }

    fn remember(&self, error: &CodecError) {
        *self.session.last_error.borrow_mut() = Some((error.to_string(), error.clone()));
    }

    /// The remembered error `message` was rendered from, if any.
    ///
    /// Transports may append their own position to a message, so a prefix
    /// match is enough.
    pub(crate) fn recall(&self, message: &str) -> Option<CodecError> {
        match &*self.session.last_error.borrow() {
            Some((rendered, error)) if message.starts_with(rendered.as_str()) => Some(error.clone()),
            _ => None,
        }
    }

    /// Converts an error coming out of the wrapped encoder.
    pub(crate) fn recover_ser(&self, error: impl fmt::Display) -> CodecError {
        let message = error.to_string();
        self.recall(&message)
            .unwrap_or_else(|| self.error(|path| CodecError::EncodingFailed { message, path }))
    }

    /// Converts an error coming out of the wrapped decoder.
    pub(crate) fn recover_de(&self, error: impl fmt::Display) -> CodecError {
        let message = error.to_string();
        self.recall(&message)
            .unwrap_or_else(|| self.error(|path| CodecError::DecodingFailed { message, path }))
    }

    /// Passes a structured error through an encoder with another error type.
    pub(crate) fn smuggle_ser<E: serde::ser::Error>(&self, error: CodecError) -> E {
        self.remember(&error);
        E::custom(error)
    }

    /// Passes a structured error through a decoder with another error type.
    pub(crate) fn smuggle_de<E: serde::de::Error>(&self, error: CodecError) -> E {
        self.remember(&error);
        E::custom(error)
    }

    // -------------------------------------------------------------------------
    // Map keys

    pub(crate) fn capture_key(&self, key: impl ToString) {
        *self.session.captured_key.borrow_mut() = Some(key.to_string());
    }

    pub(crate) fn take_captured_key(&self) -> Option<String> {
        self.session.captured_key.borrow_mut().take()
    }
}

impl fmt::Debug for CodingContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodingContext")
            .field("path", &self.path().to_string())
            .field("static_type", &self.static_type())
            .field("suppressed", &self.suppressed())
            .field("configuration", self.configuration())
            .finish()
    }
}

/// Builds an error at the current context, or at the root when no call is running.
pub(crate) fn raise(make: impl FnOnce(CodingPath) -> CodecError) -> CodecError {
    match CodingContext::current() {
        Some(ctx) => ctx.error(make),
        None => make(CodingPath::root()),
    }
}

/// `serde` custom errors raised inside a call: either a remembered
/// structured error coming back, or a new error built by `make`.
pub(crate) fn raise_custom(
    message: String,
    make: impl FnOnce(String, CodingPath) -> CodecError,
) -> CodecError {
    match CodingContext::current() {
        Some(ctx) => match ctx.recall(&message) {
            Some(error) => error,
            None => ctx.error(|path| make(message, path)),
        },
        None => make(message, CodingPath::root()),
    }
}

#[cfg(test)]
mod tests {
    use alloc::sync::Arc;

    use super::{CodingContext, Configuration, PathSegment};
    use crate::CodecError;
    use crate::registry::TypeRegistry;

    fn root() -> CodingContext {
        CodingContext::root(
            Arc::new(TypeRegistry::empty()),
            Configuration::new().with_type_discriminator(),
            false,
            Some("Root"),
        )
    }

    #[test]
    fn child_contexts_narrow_the_path() {
        let root = root();
        let child = root.child("items").child(3_usize).with_static_type("Item");

        assert_eq!(child.depth(), 2);
        assert_eq!(child.path().segments(), &[PathSegment::from("items"), PathSegment::Index(3)]);
        assert_eq!(child.enclosing_types(), vec!["Root", "Item"]);
        assert_eq!(child.static_type(), Some("Item"));
        // the parent is untouched
        assert_eq!(root.depth(), 0);
    }

    #[test]
    fn suppression_covers_one_level() {
        let root = root();
        assert!(root.type_discriminator().is_some());

        let guarded = root.suppressing(0);
        assert!(guarded.type_discriminator().is_none());
        assert!(guarded.with_static_type("Inner").type_discriminator().is_none());
        assert!(guarded.child("field").type_discriminator().is_some());
        assert!(guarded.newtype("Wrapper").type_discriminator().is_some());
        assert_eq!(guarded.newtype("Wrapper").depth(), guarded.depth());
    }

    #[test]
    fn current_is_scoped() {
        assert!(CodingContext::current().is_none());
        let root = root();
        root.enter(|| {
            let inner = root.child("a");
            inner.enter(|| {
                assert_eq!(CodingContext::current().unwrap().depth(), 1);
            });
            assert_eq!(CodingContext::current().unwrap().depth(), 0);
        });
        assert!(CodingContext::current().is_none());
    }

    #[test]
    fn remembered_errors_are_recalled_by_prefix() {
        let ctx = root().child("x");
        let error = ctx.error(|path| CodecError::KeyNotFound { key: "x".into(), path });
        let message = format!("{error} at line 1 column 4");

        let recalled = ctx.recover_de(message);
        assert!(matches!(recalled, CodecError::KeyNotFound { .. }));

        let other = ctx.recover_de("unexpected end of input");
        assert!(matches!(other, CodecError::DecodingFailed { .. }));
    }
}
