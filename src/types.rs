use std::fmt;

use serde::{Deserialize, Serialize};

/// Object storage bucket name.
/// Example: `bucketml-cbd0711c-1d5c-4227-bfef-e2c9e8c55bdc`
pub type BucketName = String;
/// Object key inside a bucket.
/// Example: `Dados_diabetes/diabetes_dados_2025-02-25.parquet`
pub type ObjectKey = String;
/// Column name as carried by a table or a result page.
/// Examples: `glucose`, `glicose`, `classe`
pub type ColumnName = String;
/// Analytical engine database name.
/// Example: `fiap_tech2_diabetes`
pub type DatabaseName = String;
/// External dataset identifier (`owner/slug`).
/// Example: `akshaydattatraykhare/diabetes-dataset`
pub type DatasetId = String;
/// Opaque pagination token handed back by the query engine.
pub type PageToken = String;
/// Raw cell text as returned by the query engine; `None` is SQL null.
pub type Cell = Option<String>;

/// Opaque execution identifier returned by the query engine at submission.
///
/// A handle is only meaningful for the single execution that produced it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryHandle(String);

impl QueryHandle {
    /// Wrap an engine-provided execution id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Engine execution id.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
