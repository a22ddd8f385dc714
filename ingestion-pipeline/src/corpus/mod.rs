mod metadata;
mod vectors;

pub use metadata::{MetadataReader, MetadataRow};
pub use vectors::VectorFile;
