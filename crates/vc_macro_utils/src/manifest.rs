use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::SystemTime;

use toml_edit::{Document, Item, Table};

/// Locate an accessible [`syn::Path`] for a workspace crate as seen from the
/// caller's Cargo.toml.
///
/// Generated code must name the runtime crate through a path that is valid
/// in the invoking crate, which may depend on `vc_codec` directly or only
/// on the `vc_modular` facade.
///
/// # Example
///
/// ```rust
/// # use vc_macro_utils::Manifest;
/// let p: syn::Path = Manifest::crate_path("vc_codec");
/// ```
///
/// # Resolution rules
///
/// 1. If the requested crate is listed in `dependencies`, return `::crate_name`.
/// 2. If requested crate name begins with `vc_`, and target crate depends on
///    the facade crate `vc_modular`, return `::vc_modular::short_name`
///    (e.g. `vc_codec` -> `::vc_modular::codec`).
/// 3. Repeat step 1-2 in `dev-dependencies`.
/// 4. Otherwise, fall back to the absolute path `::crate_name`.
///
/// ## Note
/// When a crate needs to reference itself, library code should use
/// `crate::...`, while doctests and other external code typically use the
/// absolute path `::crate_name`.
///
/// Adding `extern crate self as vc_codec;` in the crate root resolves the conflict.
#[derive(Debug)]
pub struct Manifest {
    document: Document<Box<str>>,
}

const FACADE_NAME: &str = "vc_modular";
const CRATE_PREFIX: &str = "vc_";

// Resolved paths, keyed by manifest location and requested crate.
// Entries are dropped when the manifest changes on disk.
type PathCache = BTreeMap<(PathBuf, String), (SystemTime, String)>;

static RESOLVED: Mutex<PathCache> = Mutex::new(BTreeMap::new());

impl Manifest {
    fn manifest_path() -> PathBuf {
        let dir = env::var_os("CARGO_MANIFEST_DIR")
            .expect("CARGO_MANIFEST_DIR should be auto-defined by cargo.");
        let path = PathBuf::from(dir).join("Cargo.toml");
        assert!(
            path.exists(),
            "Cargo manifest does not exist at path {}",
            path.display(),
        );
        path
    }

    fn load(path: &std::path::Path) -> Self {
        let text = std::fs::read_to_string(path)
            .unwrap_or_else(|_| panic!("Unable to read cargo manifest: {}", path.display()));
        let document = Document::parse(text.into_boxed_str())
            .unwrap_or_else(|_| panic!("Failed to parse cargo manifest: {}", path.display()));
        Self { document }
    }

    fn lookup(deps: &Table, name: &str) -> Option<String> {
        if deps.contains_key(name) {
            return Some(format!("::{name}"));
        }
        let module = name.strip_prefix(CRATE_PREFIX)?;
        deps.contains_key(FACADE_NAME)
            .then(|| format!("::{FACADE_NAME}::{module}"))
    }

    /// Resolve `name` against this manifest, see the type-level docs for the
    /// resolution order.
    pub fn resolve(&self, name: &str) -> String {
        ["dependencies", "dev-dependencies"]
            .into_iter()
            .filter_map(|table| match self.document.get(table) {
                Some(Item::Table(deps)) => Self::lookup(deps, name),
                _ => None,
            })
            .next()
            .unwrap_or_else(|| format!("::{name}"))
    }

    /// Resolve `name` for the crate currently being compiled.
    ///
    /// Results are cached per manifest, the file is only parsed again
    /// when its modified time changes.
    pub fn crate_path(name: &str) -> syn::Path {
        let path = Self::manifest_path();
        let modified = std::fs::metadata(&path)
            .and_then(|metadata| metadata.modified())
            .expect("The Cargo.toml should have a modified time.");

        let key = (path, name.to_owned());
        let mut cache = RESOLVED.lock().unwrap_or_else(PoisonError::into_inner);

        let resolved = match cache.get(&key) {
            Some((time, resolved)) if *time == modified => resolved.clone(),
            _ => {
                let resolved = Self::load(&key.0).resolve(name);
                cache.insert(key, (modified, resolved.clone()));
                resolved
            }
        };

        syn::parse_str(&resolved).expect("resolved crate path is a valid path")
    }
}

#[cfg(test)]
mod tests {
    use super::Manifest;
    use toml_edit::Document;

    fn manifest(text: &str) -> Manifest {
        Manifest {
            document: Document::parse(Box::<str>::from(text)).unwrap(),
        }
    }

    #[test]
    fn direct_dependency() {
        let m = manifest("[dependencies]\nvc_codec = \"0.0.1\"\n");
        assert_eq!(m.resolve("vc_codec"), "::vc_codec");
    }

    #[test]
    fn through_facade() {
        let m = manifest("[dev-dependencies]\nvc_modular = { path = \"..\" }\n");
        assert_eq!(m.resolve("vc_codec"), "::vc_modular::codec");
    }

    #[test]
    fn fallback() {
        let m = manifest("[package]\nname = \"app\"\n");
        assert_eq!(m.resolve("vc_codec"), "::vc_codec");
    }
}
