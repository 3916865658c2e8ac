//! Result materializer: pages of a succeeded query -> one ordered row set.

use tracing::{debug, info};

use crate::data::ResultSet;
use crate::errors::PipelineError;
use crate::poller::SucceededQuery;
use crate::transport::QueryEngine;
use crate::types::{Cell, ColumnName};

/// Collect every result page of `query` in engine order.
///
/// Column labels come from the first page's metadata only. The engine repeats
/// the header as data row zero, so the first accumulated row is dropped.
pub fn materialize(
    engine: &dyn QueryEngine,
    query: &SucceededQuery,
) -> Result<ResultSet, PipelineError> {
    let handle = query.handle();
    let mut columns: Option<Vec<ColumnName>> = None;
    let mut rows: Vec<Vec<Cell>> = Vec::new();
    let mut token = None;
    let mut pages = 0usize;
    loop {
        let page = engine.results_page(handle, token.as_ref())?;
        pages += 1;
        if pages == 1 {
            columns = page.column_labels;
        }
        debug!(
            "[diabetes-lake:results] page {pages} of {handle}: {} rows",
            page.rows.len()
        );
        rows.extend(page.rows);
        match page.next_token {
            Some(next) if token.as_ref() == Some(&next) => {
                return Err(PipelineError::engine(
                    handle,
                    format!("pagination token '{next}' did not advance"),
                ));
            }
            Some(next) => token = Some(next),
            None => break,
        }
    }
    if !rows.is_empty() {
        rows.remove(0);
    }
    info!(
        "[diabetes-lake:results] {handle}: {} data rows across {pages} pages",
        rows.len()
    );
    Ok(ResultSet { columns, rows })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::config::{FailurePolicy, PollPolicy};
    use crate::data::ResultPage;
    use crate::poller::StatusPoller;
    use crate::transport::memory::ScriptedQueryEngine;

    fn succeeded(engine: &ScriptedQueryEngine) -> SucceededQuery {
        let policy = PollPolicy {
            interval: Duration::from_millis(1),
            max_attempts: Some(3),
            timeout: None,
            on_failure: FailurePolicy::Stop,
        };
        StatusPoller::new(policy)
            .wait(engine, engine.handle().clone())
            .unwrap()
    }

    fn row(values: &[&str]) -> Vec<Cell> {
        values.iter().map(|value| Some(value.to_string())).collect()
    }

    #[test]
    fn pages_are_concatenated_and_header_dropped() {
        let pages = vec![
            ResultPage {
                column_labels: Some(vec!["a".into(), "b".into()]),
                rows: vec![row(&["a", "b"]), row(&["1", "2"])],
                next_token: None,
            },
            ResultPage {
                column_labels: Some(vec!["ignored".into(), "labels".into()]),
                rows: vec![row(&["3", "4"]), vec![None, Some("6".into())]],
                next_token: None,
            },
            ResultPage {
                column_labels: None,
                rows: vec![row(&["7", "8"])],
                next_token: None,
            },
        ];
        let engine = ScriptedQueryEngine::new("q").with_pages(pages);
        let set = materialize(&engine, &succeeded(&engine)).unwrap();
        assert_eq!(set.columns, Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(set.row_count(), 5 - 1);
        assert_eq!(set.rows[0], row(&["1", "2"]));
        assert_eq!(set.rows[2], vec![None, Some("6".to_string())]);
        assert_eq!(engine.page_requests(), 3);
    }

    #[test]
    fn empty_result_leaves_columns_unset() {
        let engine = ScriptedQueryEngine::new("q");
        let set = materialize(&engine, &succeeded(&engine)).unwrap();
        assert_eq!(set.columns, None);
        assert!(set.rows.is_empty());
    }

    #[test]
    fn header_only_result_has_columns_and_no_rows() {
        let engine = ScriptedQueryEngine::new("q").with_table(&["a", "b"], Vec::new(), 10);
        let set = materialize(&engine, &succeeded(&engine)).unwrap();
        assert_eq!(set.columns.as_ref().map(Vec::len), Some(2));
        assert_eq!(set.row_count(), 0);
    }
}
