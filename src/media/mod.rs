/// Media catalog and identifier resolution
///
/// Images are registered by URL. Documents carry an ordered list of image
/// ids; annotations are keyed by the image their target resolves to.

pub mod catalog;
pub mod resolver;

pub use catalog::{ImageCatalog, ImageLookup};
pub use resolver::{normalize_url, strip_size_variant, ImageResolver};
