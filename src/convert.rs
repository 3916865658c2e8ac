//! Columnar conversion stage: delimited source file -> Parquet -> object storage.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use chrono::NaiveDate;
use encoding_rs::Encoding;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::{EnabledStatistics, WriterProperties};
use tracing::{info, warn};

use crate::config::{DatasetConfig, StorageConfig};
use crate::constants::storage::PARTITION_DATE_FORMAT;
use crate::data::ColumnarArtifact;
use crate::errors::PipelineError;
use crate::transport::ObjectStorage;
use crate::types::ObjectKey;

/// Object key for the artifact of `date`: `<prefix>/<stem>_<YYYY-MM-DD>.<ext>`.
///
/// The key depends only on the configuration and the calendar day, so reruns
/// on the same day overwrite the same object.
pub fn partition_key(config: &StorageConfig, date: NaiveDate) -> ObjectKey {
    let day = date.format(PARTITION_DATE_FORMAT);
    let file_name = format!("{}_{day}.{}", config.stem, config.extension);
    if config.prefix.is_empty() {
        file_name
    } else {
        format!("{}/{file_name}", config.prefix.trim_end_matches('/'))
    }
}

/// Inferred physical type of one source column.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum InferredType {
    Int64,
    Float64,
    Utf8,
}

/// An all-empty column carries only nulls and is typed as floating point.
fn infer_type(values: &[String]) -> InferredType {
    let present = || values.iter().map(|value| value.trim()).filter(|value| !value.is_empty());
    if present().next().is_none() {
        InferredType::Float64
    } else if present().all(|value| value.parse::<i64>().is_ok()) {
        InferredType::Int64
    } else if present().all(|value| value.parse::<f64>().is_ok()) {
        InferredType::Float64
    } else {
        InferredType::Utf8
    }
}

fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

fn build_array(values: &[String], kind: InferredType) -> ArrayRef {
    match kind {
        InferredType::Int64 => Arc::new(Int64Array::from(
            values
                .iter()
                .map(|value| non_empty(value).and_then(|value| value.parse::<i64>().ok()))
                .collect::<Vec<_>>(),
        )),
        InferredType::Float64 => Arc::new(Float64Array::from(
            values
                .iter()
                .map(|value| non_empty(value).and_then(|value| value.parse::<f64>().ok()))
                .collect::<Vec<_>>(),
        )),
        InferredType::Utf8 => Arc::new(StringArray::from(
            values.iter().map(|value| non_empty(value)).collect::<Vec<_>>(),
        )),
    }
}

/// Read the delimited file at `path` into one typed record batch.
///
/// The file is decoded with the configured legacy encoding, the first record
/// is the header, and only the first `column_count` columns are kept.
pub fn read_delimited(path: &Path, config: &DatasetConfig) -> Result<RecordBatch, PipelineError> {
    let source_name = path.display().to_string();
    let encoding = Encoding::for_label(config.encoding.as_bytes()).ok_or_else(|| {
        PipelineError::Configuration(format!("unknown source encoding '{}'", config.encoding))
    })?;
    let bytes = fs::read(path).map_err(|err| PipelineError::parse(&source_name, err))?;
    let (text, _, _) = encoding.decode(&bytes);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(config.delimiter)
        .has_headers(true)
        .flexible(true)
        .from_reader(text.as_bytes());

    let width = config.column_count;
    let headers = reader
        .headers()
        .map_err(|err| PipelineError::parse(&source_name, err))?
        .clone();
    if headers.len() < width {
        return Err(PipelineError::parse(
            &source_name,
            format!("header has {} columns, expected at least {width}", headers.len()),
        ));
    }
    let names: Vec<String> = headers
        .iter()
        .take(width)
        .map(|name| name.trim().to_string())
        .collect();

    let mut columns: Vec<Vec<String>> = vec![Vec::new(); width];
    for record in reader.records() {
        let record = record.map_err(|err| PipelineError::parse(&source_name, err))?;
        if record.len() < width {
            let line = record.position().map(|pos| pos.line()).unwrap_or_default();
            return Err(PipelineError::parse(
                &source_name,
                format!("line {line} has {} fields, expected at least {width}", record.len()),
            ));
        }
        for (column, field) in columns.iter_mut().zip(record.iter()) {
            column.push(field.to_string());
        }
    }

    let kinds: Vec<InferredType> = columns.iter().map(|values| infer_type(values)).collect();
    let fields: Vec<Field> = names
        .iter()
        .zip(&kinds)
        .map(|(name, kind)| {
            let data_type = match kind {
                InferredType::Int64 => DataType::Int64,
                InferredType::Float64 => DataType::Float64,
                InferredType::Utf8 => DataType::Utf8,
            };
            Field::new(name, data_type, true)
        })
        .collect();
    let arrays: Vec<ArrayRef> = columns
        .iter()
        .zip(&kinds)
        .map(|(values, kind)| build_array(values, *kind))
        .collect();
    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays)
        .map_err(|err| PipelineError::parse(&source_name, err))
}

/// Write `batch` as Snappy-compressed Parquet into `writer`.
pub fn write_parquet<W>(batch: &RecordBatch, writer: W) -> Result<(), parquet::errors::ParquetError>
where
    W: std::io::Write + Send,
{
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .set_statistics_enabled(EnabledStatistics::Chunk)
        .build();
    let mut writer = ArrowWriter::try_new(writer, batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}

/// Converts the raw dataset file and uploads it as the day's artifact.
pub struct ColumnarConverter {
    dataset: DatasetConfig,
    storage: StorageConfig,
}

impl ColumnarConverter {
    pub fn new(dataset: DatasetConfig, storage: StorageConfig) -> Self {
        Self { dataset, storage }
    }

    /// Read `source`, serialize it to a scratch Parquet file, and upload it
    /// under the partition key for `date`.
    ///
    /// The scratch file is removed on every exit path, failed uploads included.
    pub fn convert_and_upload(
        &self,
        source: &Path,
        target: &dyn ObjectStorage,
        date: NaiveDate,
    ) -> Result<ColumnarArtifact, PipelineError> {
        let batch = read_delimited(source, &self.dataset)?;
        let key = partition_key(&self.storage, date);
        info!(
            "[diabetes-lake:convert] read {} rows x {} columns from {}",
            batch.num_rows(),
            batch.num_columns(),
            source.display()
        );

        let mut scratch = tempfile::Builder::new()
            .prefix(&format!("{}_", self.storage.stem))
            .suffix(&format!(".{}", self.storage.extension))
            .tempfile()?;
        write_parquet(&batch, scratch.as_file_mut())
            .map_err(|err| PipelineError::storage(key.as_str(), format!("parquet write: {err}")))?;
        let size_bytes = scratch.as_file().metadata()?.len();

        let uploaded = target.upload(scratch.path(), &self.storage.bucket, &key);
        let scratch_path = scratch.path().to_path_buf();
        if let Err(err) = scratch.close() {
            warn!(
                "[diabetes-lake:convert] failed to remove scratch file {}: {err}",
                scratch_path.display()
            );
        }
        uploaded?;

        info!(
            "[diabetes-lake:convert] uploaded {size_bytes} bytes to {}/{key}",
            self.storage.bucket
        );
        Ok(ColumnarArtifact {
            key,
            row_count: batch.num_rows(),
            column_names: batch
                .schema()
                .fields()
                .iter()
                .map(|field| field.name().clone())
                .collect(),
            size_bytes,
        })
    }
}
