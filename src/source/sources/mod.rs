/// Source that reads an already-extracted local directory.
pub mod local_source;

#[cfg(feature = "kaggle")]
/// Kaggle API download-and-extract source.
pub mod kaggle;
