//! Model training and evaluation over the normalized table.
//!
//! Two consumers of the pipeline output:
//! - a bagged ensemble of decision trees fit on every row, used only for
//!   per-feature importance;
//! - a logistic regression fit on a seeded 70/30 split and scored on the
//!   held-out rows.

use linfa::metrics::ToConfusionMatrix;
use linfa::prelude::*;
use linfa_logistic::LogisticRegression;
use linfa_trees::{DecisionTree, SplitQuality};
use ndarray::{Array1, Array2, Axis, s};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::TrainingConfig;
use crate::data::NormalizedTable;
use crate::errors::PipelineError;
use crate::metrics::ClassificationMetrics;
use crate::types::ColumnName;

/// Importance of one feature in the tree ensemble; scores sum to 1.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: ColumnName,
    pub importance: f64,
}

/// Results of both model stages.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrainingReport {
    /// Sorted by importance, highest first.
    pub importances: Vec<FeatureImportance>,
    pub metrics: ClassificationMetrics,
    pub train_rows: usize,
    pub test_rows: usize,
    /// Rows excluded because a feature was null.
    pub skipped_rows: usize,
}

/// Feature matrix plus class indices extracted from a normalized table.
#[derive(Clone, Debug)]
pub struct FeatureMatrix {
    pub records: Array2<f64>,
    pub targets: Array1<usize>,
    pub feature_names: Vec<ColumnName>,
    pub skipped_rows: usize,
}

/// Train and test row counts for `rows` samples.
///
/// The held-out side is `ceil(test_ratio * rows)`, capped at `rows`.
pub fn split_sizes(rows: usize, test_ratio: f64) -> (usize, usize) {
    let test = ((rows as f64 * test_ratio).ceil() as usize).min(rows);
    (rows - test, test)
}

/// Fits the importance ensemble and the evaluated classifier.
pub struct ModelTrainer {
    config: TrainingConfig,
}

impl ModelTrainer {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    /// Collect the configured feature columns and class indices.
    ///
    /// Rows with any null feature are skipped.
    pub fn feature_matrix(&self, table: &NormalizedTable) -> Result<FeatureMatrix, PipelineError> {
        let columns = self
            .config
            .feature_columns
            .iter()
            .map(|name| {
                table.table().numeric(name).ok_or_else(|| {
                    PipelineError::Schema(format!("feature column '{name}' is missing or not numeric"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        let labels = table.labels();

        let mut values = Vec::with_capacity(labels.len() * columns.len());
        let mut targets = Vec::with_capacity(labels.len());
        let mut skipped_rows = 0usize;
        for (row, label) in labels.iter().enumerate() {
            let features: Option<Vec<f64>> = columns.iter().map(|column| column[row]).collect();
            match features {
                Some(features) => {
                    values.extend(features);
                    targets.push(label.class_index());
                }
                None => skipped_rows += 1,
            }
        }
        if skipped_rows > 0 {
            warn!("[diabetes-lake:train] skipped {skipped_rows} rows with null features");
        }
        let records = Array2::from_shape_vec((targets.len(), columns.len()), values)
            .map_err(|err| PipelineError::Training(err.to_string()))?;
        Ok(FeatureMatrix {
            records,
            targets: Array1::from(targets),
            feature_names: self.config.feature_columns.clone(),
            skipped_rows,
        })
    }

    /// Average per-feature importances over trees fit on bootstrap resamples
    /// of every row.
    ///
    /// Every tree sees every feature at each split, so this is a bagged tree
    /// ensemble rather than a random forest with per-split feature sampling.
    /// Correlated features do not share importance the way they do when only
    /// a random subset is considered per split, and scores are not directly
    /// comparable to such a forest's.
    pub fn feature_importance(
        &self,
        matrix: &FeatureMatrix,
    ) -> Result<Vec<FeatureImportance>, PipelineError> {
        let rows = matrix.records.nrows();
        if rows == 0 {
            return Err(PipelineError::Training("no complete rows to fit".to_string()));
        }
        let mut rng = StdRng::seed_from_u64(self.config.forest_seed);
        let mut totals = vec![0.0f64; matrix.feature_names.len()];
        for _ in 0..self.config.forest_trees {
            let sample: Vec<usize> = (0..rows).map(|_| rng.gen_range(0..rows)).collect();
            let bootstrap = Dataset::new(
                matrix.records.select(Axis(0), &sample),
                matrix.targets.select(Axis(0), &sample),
            );
            let tree = DecisionTree::params()
                .split_quality(SplitQuality::Gini)
                .fit(&bootstrap)
                .map_err(|err| PipelineError::Training(format!("decision tree: {err}")))?;
            for (total, score) in totals.iter_mut().zip(tree.feature_importance()) {
                *total += score;
            }
        }
        let sum: f64 = totals.iter().sum();
        let mut importances: Vec<FeatureImportance> = matrix
            .feature_names
            .iter()
            .zip(totals)
            .map(|(feature, total)| FeatureImportance {
                feature: feature.clone(),
                importance: if sum > 0.0 { total / sum } else { 0.0 },
            })
            .collect();
        importances.sort_by(|a, b| {
            b.importance
                .total_cmp(&a.importance)
                .then_with(|| a.feature.cmp(&b.feature))
        });
        Ok(importances)
    }

    /// Seeded shuffle, train/test split, logistic fit, micro-averaged scores.
    ///
    /// Returns the metrics with the train and test row counts.
    pub fn evaluate_logistic(
        &self,
        matrix: &FeatureMatrix,
    ) -> Result<(ClassificationMetrics, usize, usize), PipelineError> {
        let rows = matrix.records.nrows();
        let (train_rows, test_rows) = split_sizes(rows, self.config.test_ratio);
        if train_rows == 0 || test_rows == 0 {
            return Err(PipelineError::Training(format!(
                "split of {rows} rows left an empty partition"
            )));
        }

        let mut rng = StdRng::seed_from_u64(self.config.split_seed);
        let shuffled =
            Dataset::new(matrix.records.clone(), matrix.targets.clone()).shuffle(&mut rng);
        let train = Dataset::new(
            shuffled.records().slice(s![..train_rows, ..]).to_owned(),
            shuffled.targets().slice(s![..train_rows]).to_owned(),
        )
        .with_feature_names(matrix.feature_names.clone());
        let test = Dataset::new(
            shuffled.records().slice(s![train_rows.., ..]).to_owned(),
            shuffled.targets().slice(s![train_rows..]).to_owned(),
        )
        .with_feature_names(matrix.feature_names.clone());

        let model = LogisticRegression::default()
            .max_iterations(self.config.logistic_max_iterations)
            .fit(&train)
            .map_err(|err| PipelineError::Training(format!("logistic regression: {err}")))?;
        let predicted: Array1<usize> = model.predict(test.records());
        let confusion = predicted
            .confusion_matrix(&test)
            .map_err(|err| PipelineError::Training(format!("confusion matrix: {err}")))?;
        let metrics = ClassificationMetrics::micro_averaged(&confusion, test_rows);
        Ok((metrics, train_rows, test_rows))
    }

    /// Run both model stages and log their results.
    pub fn run(&self, table: &NormalizedTable) -> Result<TrainingReport, PipelineError> {
        let matrix = self.feature_matrix(table)?;
        let importances = self.feature_importance(&matrix)?;
        for entry in &importances {
            info!(
                "[diabetes-lake:train] importance {:<20} {:.4}",
                entry.feature, entry.importance
            );
        }
        let (metrics, train_rows, test_rows) = self.evaluate_logistic(&matrix)?;
        info!(
            "[diabetes-lake:train] logistic regression on {test_rows} held-out rows: accuracy={:.4} precision={:.4} recall={:.4} f1={:.4}",
            metrics.accuracy, metrics.precision, metrics.recall, metrics.f1
        );
        Ok(TrainingReport {
            importances,
            metrics,
            train_rows,
            test_rows,
            skipped_rows: matrix.skipped_rows,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SchemaConfig;
    use crate::constants::schema::COLUMN_RENAMES;
    use crate::data::{Column, ColumnData, Table};
    use crate::schema::normalize;

    /// Rows whose outcome is decided by glucose alone.
    fn separable_table(rows: usize) -> NormalizedTable {
        let mut cells: Vec<Vec<Option<String>>> = vec![Vec::new(); COLUMN_RENAMES.len()];
        for idx in 0..rows {
            let diabetic = idx % 2 == 0;
            let glucose = if diabetic { 160 + idx % 20 } else { 80 + idx % 20 };
            let row = [
                (idx % 5).to_string(),
                glucose.to_string(),
                (60 + idx % 15).to_string(),
                (20 + idx % 10).to_string(),
                (idx % 7 * 10).to_string(),
                format!("{}.5", 25 + idx % 8),
                format!("0.{}", 100 + idx % 50),
                (21 + idx % 30).to_string(),
                if diabetic { "1" } else { "0" }.to_string(),
            ];
            for (column, value) in cells.iter_mut().zip(row) {
                column.push(Some(value));
            }
        }
        let columns = COLUMN_RENAMES
            .iter()
            .zip(cells)
            .map(|((source, _), values)| Column::new(*source, ColumnData::Text(values)))
            .collect();
        normalize(Table::new(columns).unwrap(), &SchemaConfig::default()).unwrap()
    }

    fn small_config() -> TrainingConfig {
        TrainingConfig {
            forest_trees: 10,
            ..TrainingConfig::default()
        }
    }

    #[test]
    fn feature_matrix_skips_rows_with_null_features() {
        let table = separable_table(6);
        let mut columns = table.into_table().into_columns();
        if let ColumnData::Numeric(values) = &mut columns[1].data {
            values[2] = None;
        }
        let table = NormalizedTable {
            table: Table::new(columns).unwrap(),
            label_column: "classe".to_string(),
            warnings: Vec::new(),
        };
        let matrix = ModelTrainer::new(small_config()).feature_matrix(&table).unwrap();
        assert_eq!(matrix.records.dim(), (5, 8));
        assert_eq!(matrix.skipped_rows, 1);
        assert_eq!(matrix.targets.len(), 5);
    }

    #[test]
    fn importances_are_normalized_and_find_glucose() {
        let trainer = ModelTrainer::new(small_config());
        let matrix = trainer.feature_matrix(&separable_table(40)).unwrap();
        let importances = trainer.feature_importance(&matrix).unwrap();
        assert_eq!(importances.len(), 8);
        let total: f64 = importances.iter().map(|entry| entry.importance).sum();
        assert!((total - 1.0).abs() < 1e-9);
        assert_eq!(importances[0].feature, "glicose");
    }

    #[test]
    fn logistic_split_is_seeded_and_scores_separable_data() {
        let trainer = ModelTrainer::new(small_config());
        let matrix = trainer.feature_matrix(&separable_table(40)).unwrap();
        let (first, train_rows, test_rows) = trainer.evaluate_logistic(&matrix).unwrap();
        let (second, _, _) = trainer.evaluate_logistic(&matrix).unwrap();
        assert_eq!(train_rows + test_rows, 40);
        assert_eq!(train_rows, 28);
        assert_eq!(first, second);
        assert!(first.accuracy >= 0.75, "accuracy {}", first.accuracy);
        assert_eq!(first.precision, first.accuracy);
    }

    #[test]
    fn split_rounds_the_held_out_side_up() {
        assert_eq!(split_sizes(768, 0.3), (537, 231));
        assert_eq!(split_sizes(40, 0.3), (28, 12));
        assert_eq!(split_sizes(3, 0.3), (2, 1));
        assert_eq!(split_sizes(0, 0.3), (0, 0));
    }

    #[test]
    fn empty_matrix_is_a_training_error() {
        let trainer = ModelTrainer::new(small_config());
        let matrix = trainer.feature_matrix(&separable_table(0)).unwrap();
        assert!(matches!(
            trainer.feature_importance(&matrix),
            Err(PipelineError::Training(_))
        ));
    }
}
