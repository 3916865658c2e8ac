use std::collections::{BTreeMap, VecDeque};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::data::{ExecutionStatus, ResultPage};
use crate::errors::PipelineError;
use crate::transport::{ObjectStorage, QueryEngine};
use crate::types::{BucketName, Cell, ColumnName, ObjectKey, PageToken, QueryHandle};

const PAGE_TOKEN_PREFIX: &str = "page-";

fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Object store kept in process memory.
///
/// Uploads copy the local file bytes, so callers may delete the file afterwards.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    objects: Mutex<BTreeMap<(BucketName, ObjectKey), Vec<u8>>>,
    uploaded_from: Mutex<Vec<PathBuf>>,
    fail_with: Option<String>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every upload fails with `reason`.
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            fail_with: Some(reason.into()),
            ..Self::default()
        }
    }

    /// Stored bytes for `bucket/key`.
    pub fn object(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        locked(&self.objects)
            .get(&(bucket.to_string(), key.to_string()))
            .cloned()
    }

    /// Every stored `(bucket, key)` pair, sorted.
    pub fn keys(&self) -> Vec<(BucketName, ObjectKey)> {
        locked(&self.objects).keys().cloned().collect()
    }

    /// Local paths passed to `upload`, in call order.
    pub fn uploaded_from(&self) -> Vec<PathBuf> {
        locked(&self.uploaded_from).clone()
    }
}

impl ObjectStorage for InMemoryStorage {
    fn upload(&self, local_path: &Path, bucket: &str, key: &str) -> Result<(), PipelineError> {
        locked(&self.uploaded_from).push(local_path.to_path_buf());
        if let Some(reason) = &self.fail_with {
            return Err(PipelineError::storage(key, reason));
        }
        let bytes = fs::read(local_path).map_err(|err| PipelineError::storage(key, err))?;
        locked(&self.objects).insert((bucket.to_string(), key.to_string()), bytes);
        Ok(())
    }
}

/// Query submitted to a [`ScriptedQueryEngine`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmittedQuery {
    pub query: String,
    pub database: String,
    pub output_location: String,
}

/// Query engine replaying a fixed status sequence and fixed result pages.
///
/// Once the status script is exhausted the last status repeats. Page tokens
/// are assigned by the engine, so scripted pages need not set `next_token`.
#[derive(Debug)]
pub struct ScriptedQueryEngine {
    handle: QueryHandle,
    statuses: Mutex<VecDeque<ExecutionStatus>>,
    last_status: Mutex<ExecutionStatus>,
    pages: Vec<ResultPage>,
    reject_with: Option<String>,
    submissions: Mutex<Vec<SubmittedQuery>>,
    status_checks: AtomicUsize,
    page_requests: AtomicUsize,
}

impl ScriptedQueryEngine {
    /// Engine that hands out `handle` and reports success on the first check.
    pub fn new(handle: impl Into<String>) -> Self {
        Self {
            handle: QueryHandle::new(handle),
            statuses: Mutex::new(VecDeque::new()),
            last_status: Mutex::new(ExecutionStatus::Succeeded),
            pages: Vec::new(),
            reject_with: None,
            submissions: Mutex::new(Vec::new()),
            status_checks: AtomicUsize::new(0),
            page_requests: AtomicUsize::new(0),
        }
    }

    /// Replace the status script.
    pub fn with_statuses(self, statuses: Vec<ExecutionStatus>) -> Self {
        let last = statuses.last().cloned().unwrap_or(ExecutionStatus::Succeeded);
        Self {
            statuses: Mutex::new(statuses.into()),
            last_status: Mutex::new(last),
            ..self
        }
    }

    /// Replace the result pages.
    pub fn with_pages(self, pages: Vec<ResultPage>) -> Self {
        Self { pages, ..self }
    }

    /// Serve `rows` the way Athena does: the header is repeated as the first
    /// data row, labels ride on the first page only, `page_size` rows per page.
    pub fn with_table(self, header: &[&str], rows: Vec<Vec<Cell>>, page_size: usize) -> Self {
        let labels: Vec<ColumnName> = header.iter().map(|name| name.to_string()).collect();
        let mut all_rows: Vec<Vec<Cell>> = Vec::with_capacity(rows.len() + 1);
        all_rows.push(labels.iter().cloned().map(Some).collect());
        all_rows.extend(rows);
        let pages = all_rows
            .chunks(page_size.max(1))
            .enumerate()
            .map(|(idx, chunk)| ResultPage {
                column_labels: (idx == 0).then(|| labels.clone()),
                rows: chunk.to_vec(),
                next_token: None,
            })
            .collect();
        self.with_pages(pages)
    }

    /// Reject every submission with `reason`.
    pub fn rejecting(self, reason: impl Into<String>) -> Self {
        Self {
            reject_with: Some(reason.into()),
            ..self
        }
    }

    pub fn handle(&self) -> &QueryHandle {
        &self.handle
    }

    pub fn submissions(&self) -> Vec<SubmittedQuery> {
        locked(&self.submissions).clone()
    }

    pub fn status_checks(&self) -> usize {
        self.status_checks.load(Ordering::SeqCst)
    }

    pub fn page_requests(&self) -> usize {
        self.page_requests.load(Ordering::SeqCst)
    }

    fn check_handle(&self, handle: &QueryHandle) -> Result<(), PipelineError> {
        if handle != &self.handle {
            return Err(PipelineError::engine(handle, "unknown query execution id"));
        }
        Ok(())
    }
}

impl QueryEngine for ScriptedQueryEngine {
    fn submit(
        &self,
        query: &str,
        database: &str,
        output_location: &str,
    ) -> Result<QueryHandle, PipelineError> {
        locked(&self.submissions).push(SubmittedQuery {
            query: query.to_string(),
            database: database.to_string(),
            output_location: output_location.to_string(),
        });
        if let Some(reason) = &self.reject_with {
            return Err(PipelineError::Submission(reason.clone()));
        }
        Ok(self.handle.clone())
    }

    fn status(&self, handle: &QueryHandle) -> Result<ExecutionStatus, PipelineError> {
        self.check_handle(handle)?;
        self.status_checks.fetch_add(1, Ordering::SeqCst);
        match locked(&self.statuses).pop_front() {
            Some(status) => Ok(status),
            None => Ok(locked(&self.last_status).clone()),
        }
    }

    fn results_page(
        &self,
        handle: &QueryHandle,
        token: Option<&PageToken>,
    ) -> Result<ResultPage, PipelineError> {
        self.check_handle(handle)?;
        self.page_requests.fetch_add(1, Ordering::SeqCst);
        let index = match token {
            None => 0,
            Some(token) => token
                .strip_prefix(PAGE_TOKEN_PREFIX)
                .and_then(|idx| idx.parse::<usize>().ok())
                .ok_or_else(|| {
                    PipelineError::engine(handle, format!("invalid page token '{token}'"))
                })?,
        };
        if self.pages.is_empty() && index == 0 {
            return Ok(ResultPage::default());
        }
        let page = self.pages.get(index).ok_or_else(|| {
            PipelineError::engine(handle, format!("page {index} is out of range"))
        })?;
        let next_token =
            (index + 1 < self.pages.len()).then(|| format!("{PAGE_TOKEN_PREFIX}{}", index + 1));
        Ok(ResultPage {
            next_token,
            ..page.clone()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scripted_engine_repeats_last_status() {
        let engine = ScriptedQueryEngine::new("q-1").with_statuses(vec![
            ExecutionStatus::Running,
            ExecutionStatus::Succeeded,
        ]);
        let handle = engine.handle().clone();
        assert_eq!(engine.status(&handle).unwrap(), ExecutionStatus::Running);
        assert_eq!(engine.status(&handle).unwrap(), ExecutionStatus::Succeeded);
        assert_eq!(engine.status(&handle).unwrap(), ExecutionStatus::Succeeded);
        assert_eq!(engine.status_checks(), 3);
    }

    #[test]
    fn scripted_engine_chains_page_tokens() {
        let engine = ScriptedQueryEngine::new("q-1").with_table(
            &["a"],
            vec![vec![Some("1".into())], vec![Some("2".into())]],
            2,
        );
        let handle = engine.handle().clone();
        let first = engine.results_page(&handle, None).unwrap();
        assert_eq!(first.column_labels, Some(vec!["a".to_string()]));
        assert_eq!(first.rows[0], vec![Some("a".to_string())]);
        let token = first.next_token.unwrap();
        let second = engine.results_page(&handle, Some(&token)).unwrap();
        assert_eq!(second.column_labels, None);
        assert_eq!(second.next_token, None);
        assert_eq!(second.rows, vec![vec![Some("2".to_string())]]);
    }

    #[test]
    fn scripted_engine_rejects_foreign_handles() {
        let engine = ScriptedQueryEngine::new("q-1");
        let err = engine.status(&QueryHandle::new("other")).unwrap_err();
        assert!(matches!(err, PipelineError::Engine { .. }));
    }

    #[test]
    fn failing_storage_records_the_attempt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.bin");
        fs::write(&path, b"abc").unwrap();
        let storage = InMemoryStorage::failing("denied");
        let err = storage.upload(&path, "bucket", "k").unwrap_err();
        assert!(matches!(err, PipelineError::Storage { ref key, .. } if key == "k"));
        assert_eq!(storage.uploaded_from(), vec![path]);
        assert!(storage.keys().is_empty());
    }
}
