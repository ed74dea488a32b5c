//! Everything around the patch step: getting the source, installing build
//! dependencies, running Wine's build and packing the result.

pub mod deps;
pub mod logfilter;
pub mod make;
pub mod package;
pub mod source;

pub use deps::PackageManager;
pub use make::BuildLayout;
