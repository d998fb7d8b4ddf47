//! Base + specific library composition

use std::sync::Arc;

use super::LibraryManager;
use crate::archive::ArchiveLibrary;
use crate::chart::{ChartFormat, ChartLibrary};
use crate::error::Result;

/// A library bundle that can describe the handles it exposes
pub trait Bundle: Send + Sync + 'static {
    /// Names of the handles exposed by this bundle
    fn handles(&self) -> Vec<String>;
}

impl Bundle for ArchiveLibrary {
    fn handles(&self) -> Vec<String> {
        vec!["unzip".to_string(), "zip".to_string()]
    }
}

impl Bundle for ChartLibrary {
    fn handles(&self) -> Vec<String> {
        let mut handles = Vec::new();
        for format in ChartFormat::ALL {
            if self.can_parse(format) {
                handles.push(format!("parse_from_{}", format));
            }
            if self.can_write(format) {
                handles.push(format!("write_to_{}", format));
            }
        }
        handles
    }
}

/// Which half of a [`Merged`] view serves a handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Base,
    Specific,
}

/// Union of a base and a specific bundle; the specific bundle wins on
/// handle name collisions
#[derive(Debug)]
pub struct Merged<B, S> {
    base: Arc<B>,
    specific: Arc<S>,
}

impl<B: Bundle, S: Bundle> Merged<B, S> {
    pub fn base(&self) -> &B {
        &self.base
    }

    pub fn specific(&self) -> &S {
        &self.specific
    }

    /// All handle names, specific ones first, without duplicates
    pub fn handles(&self) -> Vec<String> {
        let mut handles = self.specific.handles();
        for name in self.base.handles() {
            if !handles.contains(&name) {
                handles.push(name);
            }
        }
        handles
    }

    /// Bundle that provides `name`
    pub fn provider(&self, name: &str) -> Option<Provider> {
        if self.specific.handles().iter().any(|h| h == name) {
            Some(Provider::Specific)
        } else if self.base.handles().iter().any(|h| h == name) {
            Some(Provider::Base)
        } else {
            None
        }
    }
}

/// A shared base bundle initialized together with a caller-supplied one
#[derive(Debug)]
pub struct Libraries<B: Bundle, S: Bundle> {
    base: Arc<LibraryManager<B>>,
    specific: LibraryManager<S>,
}

/// The bundle pair the conversion pipelines run on
pub type ConverterLibraries = Libraries<ArchiveLibrary, ChartLibrary>;

impl<B: Bundle, S: Bundle> Libraries<B, S> {
    pub fn new(base: Arc<LibraryManager<B>>, specific: LibraryManager<S>) -> Self {
        Self { base, specific }
    }

    /// Initialize both bundles concurrently; resolves once both are ready
    pub async fn initialize(&self) -> Result<()> {
        futures::try_join!(self.base.initialize(), self.specific.initialize())?;
        Ok(())
    }

    pub fn base(&self) -> Result<Arc<B>> {
        self.base.get()
    }

    pub fn specific(&self) -> Result<Arc<S>> {
        self.specific.get()
    }

    /// Merged view of both bundles
    pub fn all(&self) -> Result<Merged<B, S>> {
        Ok(Merged {
            base: self.base.get()?,
            specific: self.specific.get()?,
        })
    }

    pub fn is_initialized(&self) -> bool {
        self.base.is_initialized() && self.specific.is_initialized()
    }

    /// Discard the specific bundle; the shared base stays loaded
    pub fn reset(&self) {
        self.specific.reset();
    }
}

/// Libraries backed by the built-in archive codec and chart codecs
pub fn builtin_libraries(compression_level: i64) -> ConverterLibraries {
    builtin_libraries_with(compression_level, ChartLibrary::builtin)
}

/// Libraries with the built-in archive codec and a custom chart library
pub fn builtin_libraries_with<F>(compression_level: i64, charts: F) -> ConverterLibraries
where
    F: Fn() -> ChartLibrary + Send + Sync + 'static,
{
    let base = Arc::new(LibraryManager::new("archive", move || async move {
        Ok(ArchiveLibrary::new(compression_level))
    }));
    let specific = LibraryManager::new("rgc-chart", move || {
        let library = charts();
        async move { Ok(library) }
    });
    Libraries::new(base, specific)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    struct Named(&'static [&'static str]);

    impl Bundle for Named {
        fn handles(&self) -> Vec<String> {
            self.0.iter().map(|s| s.to_string()).collect()
        }
    }

    fn named(name: &'static str, handles: &'static [&'static str]) -> LibraryManager<Named> {
        LibraryManager::new(name, move || async move { Ok(Named(handles)) })
    }

    #[tokio::test]
    async fn test_initialize_both() {
        let libs = Libraries::new(Arc::new(named("base", &["a", "b"])), named("spec", &["b", "c"]));
        assert!(!libs.is_initialized());
        assert!(matches!(libs.all(), Err(Error::UninitializedAccess)));

        libs.initialize().await.unwrap();
        assert!(libs.is_initialized());

        let merged = libs.all().unwrap();
        assert_eq!(merged.handles(), vec!["b", "c", "a"]);
        assert_eq!(merged.provider("b"), Some(Provider::Specific));
        assert_eq!(merged.provider("a"), Some(Provider::Base));
        assert_eq!(merged.provider("z"), None);
    }

    #[tokio::test]
    async fn test_failing_specific_fails_initialize() {
        let failing: LibraryManager<Named> = LibraryManager::new("broken", || async {
            Err(Error::Other("missing module".into()))
        });
        let libs = Libraries::new(Arc::new(named("base", &["a"])), failing);
        assert!(matches!(libs.initialize().await, Err(Error::LibraryLoad(_))));
        assert!(!libs.is_initialized());
    }

    #[tokio::test]
    async fn test_reset_keeps_base() {
        let libs = builtin_libraries(1);
        libs.initialize().await.unwrap();
        libs.reset();
        assert!(libs.base().is_ok());
        assert!(libs.specific().is_err());
    }

    #[tokio::test]
    async fn test_builtin_handles() {
        let libs = builtin_libraries(1);
        libs.initialize().await.unwrap();
        let merged = libs.all().unwrap();
        let handles = merged.handles();
        assert!(handles.contains(&"parse_from_sm".to_string()));
        assert!(handles.contains(&"write_to_qua".to_string()));
        assert_eq!(merged.provider("unzip"), Some(Provider::Base));
        assert!(merged.specific().can_write(ChartFormat::Fsc));
    }
}
