//! Raw dataset sources

use crate::error::{PipelineError, Result};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

pub const TRAIN_FILE: &str = "train.csv";
pub const TEST_FILE: &str = "test.csv";

const KAGGLE_API: &str = "https://www.kaggle.com/api/v1";
const ZIP_MAGIC: &[u8] = b"PK\x03\x04";

/// Paths of the two raw files a source delivered
#[derive(Debug, Clone)]
pub struct FetchedFiles {
    pub train: PathBuf,
    pub test: PathBuf,
}

/// Something that can deliver `train.csv` and `test.csv` into a directory
pub trait DatasetSource: Send {
    /// Human-readable source description
    fn describe(&self) -> String;

    /// Place both raw files in `dest_dir`
    fn fetch(&self, dest_dir: &Path) -> Result<FetchedFiles>;
}

/// Copies raw files from a local directory
#[derive(Debug, Clone)]
pub struct LocalSource {
    dir: PathBuf,
}

impl LocalSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl DatasetSource for LocalSource {
    fn describe(&self) -> String {
        format!("local directory {}", self.dir.display())
    }

    fn fetch(&self, dest_dir: &Path) -> Result<FetchedFiles> {
        std::fs::create_dir_all(dest_dir)?;
        let mut copied = Vec::with_capacity(2);
        for name in [TRAIN_FILE, TEST_FILE] {
            let src = self.dir.join(name);
            if !src.is_file() {
                return Err(PipelineError::Ingestion(format!(
                    "source file missing: {}",
                    src.display()
                )));
            }
            let dest = dest_dir.join(name);
            if src != dest {
                std::fs::copy(&src, &dest)?;
            }
            info!(from = %src.display(), to = %dest.display(), "Copied raw file");
            copied.push(dest);
        }
        Ok(FetchedFiles {
            train: copied.remove(0),
            test: copied.remove(0),
        })
    }
}

/// Kaggle API credentials
#[derive(Clone)]
pub struct KaggleCredentials {
    pub username: String,
    pub key: String,
}

impl std::fmt::Debug for KaggleCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KaggleCredentials")
            .field("username", &self.username)
            .field("key", &"***")
            .finish()
    }
}

impl KaggleCredentials {
    /// Read `KAGGLE_USERNAME` and `KAGGLE_KEY`
    pub fn from_env() -> Result<Self> {
        let username = std::env::var("KAGGLE_USERNAME").map_err(|_| {
            PipelineError::Ingestion(
                "KAGGLE_USERNAME env var not set. Set KAGGLE_USERNAME and KAGGLE_KEY to download competition data."
                    .to_string(),
            )
        })?;
        let key = std::env::var("KAGGLE_KEY").map_err(|_| {
            PipelineError::Ingestion(
                "KAGGLE_KEY env var not set. Set KAGGLE_USERNAME and KAGGLE_KEY to download competition data."
                    .to_string(),
            )
        })?;
        Ok(Self { username, key })
    }
}

/// Downloads competition files from the Kaggle API
#[derive(Debug)]
pub struct KaggleSource {
    competition: String,
    credentials: KaggleCredentials,
    base_url: String,
    client: reqwest::blocking::Client,
}

impl KaggleSource {
    pub fn new(competition: impl Into<String>, credentials: KaggleCredentials) -> Result<Self> {
        let competition = competition.into();
        if competition.trim().is_empty() {
            return Err(PipelineError::Config("competition_name is empty".to_string()));
        }
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(300))
            .build()?;
        Ok(Self {
            competition,
            credentials,
            base_url: KAGGLE_API.to_string(),
            client,
        })
    }

    /// Point at a different API root
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    fn file_url(&self, file_name: &str) -> String {
        format!(
            "{}/competitions/data/download/{}/{}",
            self.base_url, self.competition, file_name
        )
    }

    fn download(&self, file_name: &str, dest: &Path) -> Result<()> {
        let url = self.file_url(file_name);
        info!(competition = %self.competition, file = file_name, "Downloading from Kaggle API");

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.credentials.username, Some(&self.credentials.key))
            .send()?;

        if !response.status().is_success() {
            return Err(PipelineError::Ingestion(format!(
                "Kaggle API error {}: check credentials and competition '{}'",
                response.status(),
                self.competition
            )));
        }

        let bytes = response.bytes()?;
        if bytes.starts_with(ZIP_MAGIC) {
            return Err(PipelineError::Ingestion(format!(
                "{} arrived zip-compressed; extract it into the source directory and use the local source",
                file_name
            )));
        }
        if bytes.is_empty() {
            return Err(PipelineError::Ingestion(format!("{} downloaded empty", file_name)));
        }

        std::fs::write(dest, &bytes)?;
        info!(file = file_name, bytes = bytes.len(), dest = %dest.display(), "Download complete");
        Ok(())
    }
}

impl DatasetSource for KaggleSource {
    fn describe(&self) -> String {
        format!("kaggle competition {}", self.competition)
    }

    fn fetch(&self, dest_dir: &Path) -> Result<FetchedFiles> {
        std::fs::create_dir_all(dest_dir)?;
        let train = dest_dir.join(TRAIN_FILE);
        let test = dest_dir.join(TEST_FILE);
        self.download(TRAIN_FILE, &train)?;
        self.download(TEST_FILE, &test)?;
        Ok(FetchedFiles { train, test })
    }
}
