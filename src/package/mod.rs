pub mod copier;
pub mod source;

pub use copier::copy_package;
pub use source::{derive_output_path, SourcePackage, SUPPORTED_EXTENSIONS};
