use std::env;
use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use reqwest::blocking::Client;
use serde::Deserialize;
use tracing::{debug, info};
use zip::ZipArchive;

use crate::constants::kaggle::{
    CONFIG_DIR_ENV, CONFIG_DIR_NAME, CREDENTIALS_FILE, DOWNLOAD_URL, KEY_ENV, USERNAME_ENV,
};
use crate::errors::PipelineError;
use crate::source::DatasetSource;

/// Account name and API key for the Kaggle REST API.
#[derive(Clone, Deserialize)]
pub struct KaggleCredentials {
    pub username: String,
    pub key: String,
}

impl std::fmt::Debug for KaggleCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KaggleCredentials")
            .field("username", &self.username)
            .field("key", &"<redacted>")
            .finish()
    }
}

fn unavailable(reason: impl Into<String>) -> PipelineError {
    PipelineError::DatasetUnavailable {
        dataset: "kaggle credentials".to_string(),
        reason: reason.into(),
    }
}

impl KaggleCredentials {
    /// Build credentials from explicit values; both must be non-empty.
    pub fn from_values(username: Option<String>, key: Option<String>) -> Option<Self> {
        match (username, key) {
            (Some(username), Some(key)) if !username.is_empty() && !key.is_empty() => {
                Some(Self { username, key })
            }
            _ => None,
        }
    }

    /// Parse a `kaggle.json` file.
    pub fn from_file(path: &Path) -> Result<Self, PipelineError> {
        let raw = fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|err| unavailable(format!("{}: {err}", path.display())))
    }

    /// Directory searched for `kaggle.json`.
    ///
    /// `KAGGLE_CONFIG_DIR` wins over `~/.kaggle`.
    pub fn config_dir() -> Option<PathBuf> {
        env::var_os(CONFIG_DIR_ENV)
            .map(PathBuf::from)
            .or_else(|| dirs::home_dir().map(|home| home.join(CONFIG_DIR_NAME)))
    }

    /// Resolve credentials from the environment, then from the config
    /// directory. A `kaggle.json` in the working directory's parent is
    /// installed into the config directory when none is there yet.
    pub fn resolve() -> Result<Self, PipelineError> {
        if let Some(credentials) =
            Self::from_values(env::var(USERNAME_ENV).ok(), env::var(KEY_ENV).ok())
        {
            debug!("[diabetes-lake:kaggle] using credentials from environment");
            return Ok(credentials);
        }
        let config_dir =
            Self::config_dir().ok_or_else(|| unavailable("no home directory to search"))?;
        let installed = config_dir.join(CREDENTIALS_FILE);
        if !installed.is_file() {
            let fallback = env::current_dir()?
                .parent()
                .map(|parent| parent.join(CREDENTIALS_FILE));
            match fallback {
                Some(candidate) if candidate.is_file() => {
                    install_credentials(&candidate, &config_dir)?;
                }
                _ => {
                    return Err(unavailable(format!(
                        "set {USERNAME_ENV}/{KEY_ENV} or place {CREDENTIALS_FILE} in {}",
                        config_dir.display()
                    )));
                }
            }
        }
        Self::from_file(&installed)
    }
}

/// Copy a credentials file into `config_dir`, readable by the owner only.
pub fn install_credentials(from: &Path, config_dir: &Path) -> Result<PathBuf, PipelineError> {
    fs::create_dir_all(config_dir)?;
    let target = config_dir.join(CREDENTIALS_FILE);
    fs::copy(from, &target)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(&target, fs::Permissions::from_mode(0o600))?;
    }
    info!(
        "[diabetes-lake:kaggle] installed credentials from {} into {}",
        from.display(),
        config_dir.display()
    );
    Ok(target)
}

/// Unpack a zip archive held in memory into `dest_dir`.
pub fn extract_archive(bytes: Vec<u8>, dest_dir: &Path) -> Result<(), PipelineError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes)).map_err(|err| {
        PipelineError::DatasetUnavailable {
            dataset: dest_dir.display().to_string(),
            reason: format!("invalid archive: {err}"),
        }
    })?;
    fs::create_dir_all(dest_dir)?;
    archive
        .extract(dest_dir)
        .map_err(|err| PipelineError::DatasetUnavailable {
            dataset: dest_dir.display().to_string(),
            reason: format!("extract failed: {err}"),
        })
}

/// Downloads a dataset archive from Kaggle and unzips it locally.
pub struct KaggleSource {
    client: Client,
    credentials: KaggleCredentials,
    base_url: String,
}

impl KaggleSource {
    pub fn new(credentials: KaggleCredentials) -> Self {
        Self {
            client: Client::new(),
            credentials,
            base_url: DOWNLOAD_URL.to_string(),
        }
    }

    /// Resolve credentials the way the Kaggle CLI does and build a source.
    pub fn from_environment() -> Result<Self, PipelineError> {
        Ok(Self::new(KaggleCredentials::resolve()?))
    }

    /// Point downloads at a different endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn download_url(&self, dataset: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), dataset)
    }
}

impl DatasetSource for KaggleSource {
    fn id(&self) -> &str {
        "kaggle"
    }

    fn fetch(&self, dataset: &str, dest_dir: &Path) -> Result<PathBuf, PipelineError> {
        let url = self.download_url(dataset);
        let fail = |reason: String| PipelineError::DatasetUnavailable {
            dataset: dataset.to_string(),
            reason,
        };
        info!("[diabetes-lake:kaggle] downloading {dataset}");
        let response = self
            .client
            .get(&url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.key))
            .send()
            .and_then(|response| response.error_for_status())
            .map_err(|err| fail(err.to_string()))?;
        let bytes = response.bytes().map_err(|err| fail(err.to_string()))?;
        debug!(
            "[diabetes-lake:kaggle] received {} bytes for {dataset}",
            bytes.len()
        );
        extract_archive(bytes.to_vec(), dest_dir)?;
        info!(
            "[diabetes-lake:kaggle] extracted {dataset} into {}",
            dest_dir.display()
        );
        Ok(dest_dir.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;

    #[test]
    fn values_require_both_parts() {
        assert!(KaggleCredentials::from_values(Some("u".into()), None).is_none());
        assert!(KaggleCredentials::from_values(Some("u".into()), Some(String::new())).is_none());
        let creds = KaggleCredentials::from_values(Some("u".into()), Some("k".into())).unwrap();
        assert_eq!(creds.username, "u");
        assert!(format!("{creds:?}").contains("<redacted>"));
    }

    #[test]
    fn install_copies_file_with_owner_only_permissions() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("kaggle.json");
        fs::write(&source, r#"{"username":"ana","key":"secret"}"#).unwrap();
        let config_dir = dir.path().join("home").join(".kaggle");

        let target = install_credentials(&source, &config_dir).unwrap();
        let creds = KaggleCredentials::from_file(&target).unwrap();
        assert_eq!(creds.username, "ana");
        assert_eq!(creds.key, "secret");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&target).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn malformed_credentials_are_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("kaggle.json");
        fs::write(&path, "{}").unwrap();
        assert!(matches!(
            KaggleCredentials::from_file(&path),
            Err(PipelineError::DatasetUnavailable { .. })
        ));
    }

    #[test]
    fn archives_extract_nested_files() {
        let mut buf = Vec::new();
        {
            let mut writer = zip::ZipWriter::new(Cursor::new(&mut buf));
            writer
                .start_file("data/diabetes.csv", SimpleFileOptions::default())
                .unwrap();
            writer.write_all(b"a,b\n1,2\n").unwrap();
            writer.finish().unwrap();
        }
        let dir = tempfile::tempdir().unwrap();
        extract_archive(buf, dir.path()).unwrap();
        let found = crate::source::locate_file(dir.path(), "diabetes.csv").unwrap();
        assert_eq!(fs::read_to_string(found).unwrap(), "a,b\n1,2\n");
    }

    #[test]
    fn garbage_archive_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = extract_archive(b"not a zip".to_vec(), dir.path()).unwrap_err();
        assert!(matches!(err, PipelineError::DatasetUnavailable { .. }));
    }

    #[test]
    fn download_url_joins_dataset_id() {
        let creds = KaggleCredentials::from_values(Some("u".into()), Some("k".into())).unwrap();
        let source = KaggleSource::new(creds).with_base_url("http://localhost/api/");
        assert_eq!(
            source.download_url("owner/data"),
            "http://localhost/api/owner/data"
        );
    }
}
