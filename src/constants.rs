/// Constants describing the source dataset and its raw layout.
pub mod dataset {
    /// Kaggle dataset identifier for the Pima diabetes table.
    pub const DATASET_ID: &str = "akshaydattatraykhare/diabetes-dataset";
    /// CSV file expected inside the extracted dataset.
    pub const CSV_FILE_NAME: &str = "diabetes.csv";
    /// Local directory the dataset is extracted into.
    pub const DOWNLOAD_DIR: &str = "downloads";
    /// Number of leading columns kept from the source file.
    pub const SOURCE_COLUMN_COUNT: usize = 9;
    /// Field delimiter of the source file.
    pub const DELIMITER: u8 = b',';
    /// WHATWG label of the legacy single-byte source encoding.
    pub const SOURCE_ENCODING: &str = "latin1";
}

/// Constants used for the columnar artifact and its object key.
pub mod storage {
    /// Bucket receiving the daily artifact and the engine scratch output.
    pub const BUCKET: &str = "bucketml-cbd0711c-1d5c-4227-bfef-e2c9e8c55bdc";
    /// Logical folder holding the daily artifacts.
    pub const ARTIFACT_PREFIX: &str = "Dados_diabetes";
    /// File stem preceding the partition date.
    pub const ARTIFACT_STEM: &str = "diabetes_dados";
    /// Artifact file extension.
    pub const ARTIFACT_EXTENSION: &str = "parquet";
    /// Partition date format (`YYYY-MM-DD`).
    pub const PARTITION_DATE_FORMAT: &str = "%Y-%m-%d";
    /// Content type sent with artifact uploads.
    pub const ARTIFACT_CONTENT_TYPE: &str = "application/vnd.apache.parquet";
}

/// Constants used to reach the analytical query engine.
pub mod query {
    /// AWS region hosting the engine and the bucket.
    pub const REGION: &str = "us-east-1";
    /// Engine database holding the artifact table.
    pub const DATABASE: &str = "fiap_tech2_diabetes";
    /// Query executed against the artifact table.
    pub const QUERY: &str = "SELECT * FROM dados_analise_diabetes";
    /// Scratch location the engine writes results to.
    pub const OUTPUT_LOCATION: &str =
        "s3://bucketml-cbd0711c-1d5c-4227-bfef-e2c9e8c55bdc/Dados_diabetes_temp";
}

/// Constants used by the execution-status poller.
pub mod poller {
    /// Delay between two status checks, in milliseconds.
    pub const POLL_INTERVAL_MS: u64 = 2_000;
    /// Wall-clock budget for a single execution, in seconds.
    pub const POLL_TIMEOUT_SECS: u64 = 600;
}

/// Constants naming the canonical columns of the normalized table.
pub mod schema {
    /// Source-to-canonical column renames, in source order.
    pub const COLUMN_RENAMES: [(&str, &str); 9] = [
        ("pregnancies", "qtd_gravidez"),
        ("glucose", "glicose"),
        ("bloodpressure", "pressao_sanguinea"),
        ("skinthickness", "gordura_subcutanea"),
        ("insulin", "insulina"),
        ("bmi", "imc"),
        ("diabetespedigreefunction", "tendencia_diabetes"),
        ("age", "idade"),
        ("outcome", "target"),
    ];
    /// Canonical feature columns used for training, in order.
    pub const FEATURE_COLUMNS: [&str; 8] = [
        "qtd_gravidez",
        "glicose",
        "pressao_sanguinea",
        "gordura_subcutanea",
        "insulina",
        "imc",
        "tendencia_diabetes",
        "idade",
    ];
    /// Canonical age column; the label column is inserted right after it.
    pub const AGE_COLUMN: &str = "idade";
    /// Canonical binary outcome column.
    pub const TARGET_COLUMN: &str = "target";
    /// Derived categorical label column.
    pub const LABEL_COLUMN: &str = "classe";
    /// Label for an outcome of exactly `1`.
    pub const LABEL_DIABETIC: &str = "diabetico";
    /// Label for every other outcome, null included.
    pub const LABEL_NON_DIABETIC: &str = "nao_diabetico";
}

/// Constants used by model training and evaluation.
pub mod training {
    /// Seed for the train/test shuffle.
    pub const SPLIT_SEED: u64 = 23;
    /// Fraction of rows held out for evaluation; the held-out count rounds up.
    pub const TEST_RATIO: f64 = 0.3;
    /// Iteration cap for the logistic regression solver.
    pub const LOGISTIC_MAX_ITERATIONS: u64 = 3_000;
    /// Number of bootstrap trees in the importance ensemble.
    pub const FOREST_TREES: usize = 100;
    /// Seed for bootstrap resampling of the importance ensemble.
    pub const FOREST_SEED: u64 = 42;
}

/// Constants used by the Kaggle dataset source.
pub mod kaggle {
    /// Download endpoint; the dataset id is appended.
    pub const DOWNLOAD_URL: &str = "https://www.kaggle.com/api/v1/datasets/download";
    /// Credentials file name.
    pub const CREDENTIALS_FILE: &str = "kaggle.json";
    /// Directory under the home folder holding credentials.
    pub const CONFIG_DIR_NAME: &str = ".kaggle";
    /// Environment variable overriding the credentials directory.
    pub const CONFIG_DIR_ENV: &str = "KAGGLE_CONFIG_DIR";
    /// Environment variable carrying the account name.
    pub const USERNAME_ENV: &str = "KAGGLE_USERNAME";
    /// Environment variable carrying the API key.
    pub const KEY_ENV: &str = "KAGGLE_KEY";
}

/// Number of normalized rows echoed to the log after a run.
pub const PREVIEW_ROWS: usize = 5;
