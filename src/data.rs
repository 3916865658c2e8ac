use std::fmt;

use serde::{Deserialize, Serialize};

use crate::constants::schema::{LABEL_DIABETIC, LABEL_NON_DIABETIC};
use crate::errors::PipelineError;
use crate::types::{Cell, ColumnName, ObjectKey, PageToken};

/// Remote execution state as reported by the query engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExecutionStatus {
    /// Queued or executing; the only non-terminal state.
    Running,
    Succeeded,
    /// Failed, with the engine's state-change reason when given.
    Failed(Option<String>),
    /// Cancelled, with the engine's state-change reason when given.
    Cancelled(Option<String>),
}

impl ExecutionStatus {
    /// Reason-free state tag.
    pub fn state(&self) -> ExecutionState {
        match self {
            Self::Running => ExecutionState::Running,
            Self::Succeeded => ExecutionState::Succeeded,
            Self::Failed(_) => ExecutionState::Failed,
            Self::Cancelled(_) => ExecutionState::Cancelled,
        }
    }

    /// State-change reason, if the engine supplied one.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Failed(reason) | Self::Cancelled(reason) => reason.as_deref(),
            _ => None,
        }
    }
}

/// Reason-free execution state tag.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExecutionState {
    Running,
    Succeeded,
    Failed,
    Cancelled,
}

impl fmt::Display for ExecutionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
            Self::Cancelled => "CANCELLED",
        })
    }
}

/// One batch of result rows as served by the query engine.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResultPage {
    /// Column labels from the page metadata, when the engine sent them.
    pub column_labels: Option<Vec<ColumnName>>,
    /// Rows in server order; each cell is its text value or null.
    pub rows: Vec<Vec<Cell>>,
    /// Continuation token for the next page; `None` on the last page.
    pub next_token: Option<PageToken>,
}

/// Rows and labels assembled across every result page, header row removed.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResultSet {
    /// Labels from the first page; `None` when no page carried metadata.
    pub columns: Option<Vec<ColumnName>>,
    pub rows: Vec<Vec<Cell>>,
}

impl ResultSet {
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Build a text-typed table, one column per label.
    pub fn into_table(self) -> Result<Table, PipelineError> {
        let columns = self.columns.unwrap_or_default();
        let width = columns.len();
        let mut values: Vec<Vec<Cell>> = vec![Vec::with_capacity(self.rows.len()); width];
        for (idx, row) in self.rows.into_iter().enumerate() {
            if row.len() != width {
                return Err(PipelineError::parse(
                    "query results",
                    format!(
                        "row {idx} has {} cells but {width} columns were reported",
                        row.len()
                    ),
                ));
            }
            for (slot, cell) in values.iter_mut().zip(row) {
                slot.push(cell);
            }
        }
        let columns = columns
            .into_iter()
            .zip(values)
            .map(|(name, cells)| Column::new(name, ColumnData::Text(cells)))
            .collect();
        Table::new(columns)
    }
}

/// Typed, nullable column storage.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ColumnData {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            Self::Numeric(values) => values.len(),
            Self::Text(values) => values.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Short type name for column summaries.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Numeric(_) => "float64",
            Self::Text(_) => "text",
        }
    }

    /// Cell rendered for previews; nulls render as `NaN` / `None`.
    pub fn display_at(&self, row: usize) -> String {
        match self {
            Self::Numeric(values) => match values.get(row).copied().flatten() {
                Some(value) => value.to_string(),
                None => "NaN".to_string(),
            },
            Self::Text(values) => match values.get(row).and_then(|value| value.as_deref()) {
                Some(value) => value.to_string(),
                None => "None".to_string(),
            },
        }
    }
}

/// Named column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: ColumnName,
    pub data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<ColumnName>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }
}

/// Ordered list of equally long typed columns.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    /// Build a table; all columns must share one length and have unique names.
    pub fn new(columns: Vec<Column>) -> Result<Self, PipelineError> {
        if let Some(first) = columns.first() {
            let rows = first.data.len();
            if let Some(bad) = columns.iter().find(|column| column.data.len() != rows) {
                return Err(PipelineError::Schema(format!(
                    "column '{}' has {} rows, expected {rows}",
                    bad.name,
                    bad.data.len()
                )));
            }
        }
        for (idx, column) in columns.iter().enumerate() {
            if columns[..idx].iter().any(|other| other.name == column.name) {
                return Err(PipelineError::Schema(format!(
                    "duplicate column '{}'",
                    column.name
                )));
            }
        }
        Ok(Self { columns })
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(|column| column.data.len()).unwrap_or(0)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|column| column.name.as_str()).collect()
    }

    /// Index of the column named `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name == name)
    }

    pub(crate) fn column_mut(&mut self, name: &str) -> Option<&mut Column> {
        self.columns.iter_mut().find(|column| column.name == name)
    }

    /// Numeric values of `name`, or `None` if absent or not numeric.
    pub fn numeric(&self, name: &str) -> Option<&[Option<f64>]> {
        match self.column(name).map(|column| &column.data) {
            Some(ColumnData::Numeric(values)) => Some(values),
            _ => None,
        }
    }

    /// Text values of `name`, or `None` if absent or not text.
    pub fn text(&self, name: &str) -> Option<&[Option<String>]> {
        match self.column(name).map(|column| &column.data) {
            Some(ColumnData::Text(values)) => Some(values),
            _ => None,
        }
    }

    /// Insert `column` at `index`, shifting later columns right.
    pub(crate) fn insert_column(&mut self, index: usize, column: Column) -> Result<(), PipelineError> {
        if !self.columns.is_empty() && column.data.len() != self.row_count() {
            return Err(PipelineError::Schema(format!(
                "column '{}' has {} rows, expected {}",
                column.name,
                column.data.len(),
                self.row_count()
            )));
        }
        if self.position(&column.name).is_some() {
            return Err(PipelineError::Schema(format!(
                "duplicate column '{}'",
                column.name
            )));
        }
        self.columns.insert(index.min(self.columns.len()), column);
        Ok(())
    }
}

/// Categorical outcome label.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Label {
    NonDiabetic,
    Diabetic,
}

impl Label {
    /// `1` maps to diabetic; any other value, null included, does not.
    pub fn from_outcome(outcome: Option<f64>) -> Self {
        match outcome {
            Some(value) if value == 1.0 => Self::Diabetic,
            _ => Self::NonDiabetic,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Diabetic => LABEL_DIABETIC,
            Self::NonDiabetic => LABEL_NON_DIABETIC,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            LABEL_DIABETIC => Some(Self::Diabetic),
            LABEL_NON_DIABETIC => Some(Self::NonDiabetic),
            _ => None,
        }
    }

    /// Class index used by the classifiers.
    pub fn class_index(self) -> usize {
        match self {
            Self::NonDiabetic => 0,
            Self::Diabetic => 1,
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A text cell that could not be read as a number and was nulled.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CoercionWarning {
    pub column: ColumnName,
    pub row: usize,
    pub value: String,
}

/// Table after renaming, numeric coercion, and label derivation.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedTable {
    pub(crate) table: Table,
    pub(crate) label_column: ColumnName,
    pub(crate) warnings: Vec<CoercionWarning>,
}

impl NormalizedTable {
    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn into_table(self) -> Table {
        self.table
    }

    pub fn row_count(&self) -> usize {
        self.table.row_count()
    }

    /// Non-fatal coercion failures recorded while normalizing.
    pub fn warnings(&self) -> &[CoercionWarning] {
        &self.warnings
    }

    /// Derived labels, one per row.
    pub fn labels(&self) -> Vec<Label> {
        self.table
            .text(&self.label_column)
            .map(|values| {
                values
                    .iter()
                    .map(|value| {
                        value
                            .as_deref()
                            .and_then(Label::parse)
                            .unwrap_or(Label::NonDiabetic)
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Render the first `rows` rows as aligned text lines, header first.
    pub fn preview(&self, rows: usize) -> Vec<String> {
        let columns = self.table.columns();
        let shown = rows.min(self.table.row_count());
        let mut cells: Vec<Vec<String>> = Vec::with_capacity(shown + 1);
        cells.push(columns.iter().map(|column| column.name.clone()).collect());
        for row in 0..shown {
            cells.push(columns.iter().map(|column| column.data.display_at(row)).collect());
        }
        let widths: Vec<usize> = (0..columns.len())
            .map(|col| cells.iter().map(|line| line[col].len()).max().unwrap_or(0))
            .collect();
        cells
            .into_iter()
            .map(|line| {
                line.iter()
                    .zip(&widths)
                    .map(|(cell, width)| format!("{cell:>w$}", w = *width))
                    .collect::<Vec<_>>()
                    .join("  ")
            })
            .collect()
    }
}

/// Uploaded columnar snapshot of the raw dataset for one partition day.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnarArtifact {
    /// Object key, `<prefix>/<stem>_<YYYY-MM-DD>.<ext>`.
    pub key: ObjectKey,
    pub row_count: usize,
    pub column_names: Vec<ColumnName>,
    pub size_bytes: u64,
}
