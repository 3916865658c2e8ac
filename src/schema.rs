//! Schema normalizer: canonical names, numeric coercion, derived label column.

use tracing::{info, warn};

use crate::config::SchemaConfig;
use crate::data::{CoercionWarning, Column, ColumnData, Label, NormalizedTable, Table};
use crate::errors::PipelineError;

/// Best-effort text -> number conversion; anything unreadable becomes `None`.
///
/// Returns `Err(())` only to tell the caller the value was non-empty and not a
/// number, so it can be reported. Empty cells and `NaN` are plain nulls.
fn coerce_cell(value: Option<&str>) -> Result<Option<f64>, ()> {
    let Some(raw) = value.map(str::trim) else {
        return Ok(None);
    };
    if raw.is_empty() {
        return Ok(None);
    }
    match raw.parse::<f64>() {
        Ok(number) if number.is_nan() => Ok(None),
        Ok(number) => Ok(Some(number)),
        Err(_) => Err(()),
    }
}

fn coerce_column(column: &mut Column, warnings: &mut Vec<CoercionWarning>) {
    let ColumnData::Text(values) = &column.data else {
        return;
    };
    let numbers = values
        .iter()
        .enumerate()
        .map(|(row, value)| {
            coerce_cell(value.as_deref()).unwrap_or_else(|()| {
                warnings.push(CoercionWarning {
                    column: column.name.clone(),
                    row,
                    value: value.clone().unwrap_or_default(),
                });
                None
            })
        })
        .collect();
    column.data = ColumnData::Numeric(numbers);
}

/// Rename, coerce, and label the materialized result table.
///
/// Renames are exact and case-sensitive. Every configured numeric column must
/// exist after renaming. The label column is inserted directly after the age
/// column; no other column moves.
pub fn normalize(table: Table, config: &SchemaConfig) -> Result<NormalizedTable, PipelineError> {
    let renamed: Vec<Column> = table
        .into_columns()
        .into_iter()
        .map(|mut column| {
            if let Some(canonical) = config.renames.get(&column.name) {
                column.name = canonical.clone();
            }
            column
        })
        .collect();
    let mut table = Table::new(renamed)?;

    let mut warnings = Vec::new();
    for name in &config.numeric_columns {
        let column = table
            .column_mut(name)
            .ok_or_else(|| PipelineError::Schema(format!("missing column '{name}'")))?;
        coerce_column(column, &mut warnings);
    }
    for warning in &warnings {
        warn!(
            "[diabetes-lake:schema] '{}' row {}: '{}' is not numeric, stored as null",
            warning.column, warning.row, warning.value
        );
    }

    let labels: Vec<Option<String>> = table
        .numeric(&config.target_column)
        .ok_or_else(|| {
            PipelineError::Schema(format!(
                "target column '{}' is missing or not numeric",
                config.target_column
            ))
        })?
        .iter()
        .map(|outcome| Some(Label::from_outcome(*outcome).as_str().to_string()))
        .collect();
    let age_index = table.position(&config.age_column).ok_or_else(|| {
        PipelineError::Schema(format!("missing column '{}'", config.age_column))
    })?;
    table.insert_column(
        age_index + 1,
        Column::new(config.label_column.clone(), ColumnData::Text(labels)),
    )?;

    info!(
        "[diabetes-lake:schema] normalized {} rows, {} columns ({} coercion warnings)",
        table.row_count(),
        table.column_count(),
        warnings.len()
    );
    Ok(NormalizedTable {
        table,
        label_column: config.label_column.clone(),
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text_column(name: &str, values: &[Option<&str>]) -> Column {
        Column::new(
            name,
            ColumnData::Text(values.iter().map(|v| v.map(str::to_string)).collect()),
        )
    }

    fn source_table(rows: &[[&str; 9]]) -> Table {
        let names = [
            "pregnancies",
            "glucose",
            "bloodpressure",
            "skinthickness",
            "insulin",
            "bmi",
            "diabetespedigreefunction",
            "age",
            "outcome",
        ];
        let columns = names
            .iter()
            .enumerate()
            .map(|(idx, name)| {
                let values: Vec<Option<&str>> = rows.iter().map(|row| Some(row[idx])).collect();
                text_column(name, &values)
            })
            .collect();
        Table::new(columns).unwrap()
    }

    #[test]
    fn coerce_cell_handles_blanks_nan_and_garbage() {
        assert_eq!(coerce_cell(Some(" 26.6 ")), Ok(Some(26.6)));
        assert_eq!(coerce_cell(Some("")), Ok(None));
        assert_eq!(coerce_cell(None), Ok(None));
        assert_eq!(coerce_cell(Some("NaN")), Ok(None));
        assert_eq!(coerce_cell(Some("abc")), Err(()));
    }

    #[test]
    fn label_column_follows_age() {
        let table = source_table(&[
            ["1", "85", "66", "29", "0", "26.6", "0.351", "31", "0"],
            ["8", "183", "64", "0", "0", "23.3", "0.672", "32", "1"],
        ]);
        let normalized = normalize(table, &SchemaConfig::default()).unwrap();
        assert_eq!(
            normalized.table().column_names(),
            vec![
                "qtd_gravidez",
                "glicose",
                "pressao_sanguinea",
                "gordura_subcutanea",
                "insulina",
                "imc",
                "tendencia_diabetes",
                "idade",
                "classe",
                "target",
            ]
        );
        assert_eq!(normalized.labels(), vec![Label::NonDiabetic, Label::Diabetic]);
        assert_eq!(normalized.table().numeric("imc").unwrap()[1], Some(23.3));
    }

    #[test]
    fn garbage_becomes_null_and_row_is_kept() {
        let table = source_table(&[
            ["1", "oops", "66", "29", "0", "26.6", "0.351", "31", "1"],
            ["1", "90", "66", "29", "0", "26.6", "0.351", "31", "yes"],
        ]);
        let normalized = normalize(table, &SchemaConfig::default()).unwrap();
        assert_eq!(normalized.row_count(), 2);
        assert_eq!(normalized.table().numeric("glicose").unwrap()[0], None);
        assert_eq!(normalized.table().numeric("target").unwrap()[1], None);
        assert_eq!(normalized.labels(), vec![Label::Diabetic, Label::NonDiabetic]);
        assert_eq!(normalized.warnings().len(), 2);
        assert_eq!(normalized.warnings()[0].column, "glicose");
        assert_eq!(normalized.warnings()[0].value, "oops");
    }

    #[test]
    fn unknown_columns_keep_their_place() {
        let mut columns = source_table(&[["1", "85", "66", "29", "0", "26.6", "0.351", "31", "0"]])
            .columns()
            .to_vec();
        columns.insert(0, text_column("row_id", &[Some("r1")]));
        let normalized = normalize(Table::new(columns).unwrap(), &SchemaConfig::default()).unwrap();
        let names = normalized.table().column_names();
        assert_eq!(names[0], "row_id");
        assert_eq!(names[9], "classe");
        assert_eq!(names.len(), 11);
        assert_eq!(normalized.table().text("row_id").unwrap()[0].as_deref(), Some("r1"));
    }

    #[test]
    fn renames_are_case_sensitive() {
        let mut columns = source_table(&[["1", "85", "66", "29", "0", "26.6", "0.351", "31", "0"]])
            .columns()
            .to_vec();
        columns[1].name = "Glucose".to_string();
        let err = normalize(Table::new(columns).unwrap(), &SchemaConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Schema(ref msg) if msg.contains("glicose")));
    }
}
