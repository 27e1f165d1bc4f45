use alloc::borrow::Cow;
use alloc::vec::Vec;
use core::fmt;

// -----------------------------------------------------------------------------
// PathSegment

/// One step from a value to one of its nested values.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PathSegment {
    /// A struct field or a map entry, named by its key.
    Key(Cow<'static, str>),
    /// A sequence or tuple element.
    Index(usize),
}

impl From<&'static str> for PathSegment {
    #[inline]
    fn from(key: &'static str) -> Self {
        Self::Key(Cow::Borrowed(key))
    }
}

impl From<usize> for PathSegment {
    #[inline]
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

// -----------------------------------------------------------------------------
// CodingPath

/// The nesting path of a value inside a top-level encode or decode call.
///
/// Rendered as `$` for the root, followed by `.key` and `[index]` steps,
/// e.g. `$.children[2].name`.
///
/// With the `debug` feature in debug builds the alternate rendering (`{:#}`)
/// also lists the enclosing static types.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CodingPath {
    segments: Vec<PathSegment>,
    types: Vec<&'static str>,
}

impl CodingPath {
    /// The path of a top-level value.
    #[inline]
    pub const fn root() -> Self {
        Self {
            segments: Vec::new(),
            types: Vec::new(),
        }
    }

    pub(crate) fn from_parts(segments: Vec<PathSegment>, types: Vec<&'static str>) -> Self {
        Self { segments, types }
    }

    #[inline]
    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }

    /// Static types of the enclosing values, outermost first.
    #[inline]
    pub fn enclosing_types(&self) -> &[&'static str] {
        &self.types
    }

    #[inline]
    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.segments.len()
    }
}

impl fmt::Display for CodingPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("$")?;
        for segment in &self.segments {
            match segment {
                PathSegment::Key(key) => write!(f, ".{key}")?,
                PathSegment::Index(index) => write!(f, "[{index}]")?,
            }
        }
        #[cfg(all(feature = "debug", debug_assertions))]
        if f.alternate() && !self.types.is_empty() {
            f.write_str(" (in ")?;
            for (index, ty) in self.types.iter().enumerate() {
                if index > 0 {
                    f.write_str(" > ")?;
                }
                f.write_str(ty)?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{CodingPath, PathSegment};

    #[test]
    fn render_segments() {
        let path = CodingPath::from_parts(
            vec![
                PathSegment::from("children"),
                PathSegment::Index(2),
                PathSegment::from("name"),
            ],
            vec![],
        );
        assert_eq!(path.to_string(), "$.children[2].name");
        assert_eq!(CodingPath::root().to_string(), "$");
        assert!(CodingPath::root().is_root());
    }
}
