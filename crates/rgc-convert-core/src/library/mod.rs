//! Lazily initialized library bundles
//!
//! The conversion library and archive codecs are expensive to construct and
//! shared by every pipeline call. A [`LibraryManager`] loads one bundle at
//! most once; [`Libraries`] pairs a shared base bundle with a specific one.

mod libraries;
mod manager;

pub use libraries::{
    builtin_libraries, builtin_libraries_with, Bundle, ConverterLibraries, Libraries, Merged,
    Provider,
};
pub use manager::LibraryManager;
