//! Upload pipeline orchestration
//!
//! Linear state machine, no branching back:
//!
//! `Received → Validated → Parsed → Normalized → RosterFetched → Distributed →
//! Persisted → Cleaned`
//!
//! Any stage may fail instead. The staged upload file is released exactly
//! once whichever way the run ends. Roster fetch through persist runs under
//! the distribution write guard, so concurrent uploads are serialized.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use sqlx::SqlitePool;
use tempfile::NamedTempFile;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use super::batch_writer::replace_distribution;
use super::distributor::distribute;
use super::normalizer::normalize_rows;
use super::parser::{parse_rows, FileFormat};
use super::IngestError;
use crate::db::agents;

/// Where a pipeline run currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Received,
    Validated,
    Parsed,
    Normalized,
    RosterFetched,
    Distributed,
    Persisted,
    Cleaned,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PipelineStage::Received => "received",
            PipelineStage::Validated => "validated",
            PipelineStage::Parsed => "parsed",
            PipelineStage::Normalized => "normalized",
            PipelineStage::RosterFetched => "roster_fetched",
            PipelineStage::Distributed => "distributed",
            PipelineStage::Persisted => "persisted",
            PipelineStage::Cleaned => "cleaned",
        };
        f.write_str(name)
    }
}

/// Uploaded file staged on disk for the lifetime of one request
///
/// Removed by [`TempUpload::release`]; if the value is dropped instead (e.g.
/// on panic) the underlying temp file still removes itself.
#[derive(Debug)]
pub struct TempUpload {
    file: NamedTempFile,
    original_name: String,
}

impl TempUpload {
    /// Write the received bytes to a new file under `uploads_dir`
    pub fn stage(
        uploads_dir: &Path,
        original_name: &str,
        bytes: &[u8],
    ) -> Result<Self, IngestError> {
        use std::io::Write;

        std::fs::create_dir_all(uploads_dir)?;

        let suffix = FileFormat::extension_of(original_name);
        let mut file = tempfile::Builder::new()
            .prefix("upload-")
            .suffix(&suffix)
            .tempfile_in(uploads_dir)?;
        file.write_all(bytes)?;
        file.flush()?;

        debug!(
            upload = %original_name,
            path = %file.path().display(),
            bytes = bytes.len(),
            "Upload staged"
        );

        Ok(Self {
            file,
            original_name: original_name.to_string(),
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn original_name(&self) -> &str {
        &self.original_name
    }

    /// Lower-cased extension of the original file name, with leading dot
    pub fn extension(&self) -> String {
        FileFormat::extension_of(&self.original_name)
    }

    /// Delete the staged file
    pub fn release(self) {
        let path = self.file.path().to_path_buf();
        match self.file.close() {
            Ok(()) => debug!(path = %path.display(), "Staged upload removed"),
            Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove staged upload"),
        }
    }
}

/// Contacts assigned to one agent, as reported back to the uploader
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentItemCount {
    pub agent_name: String,
    pub item_count: usize,
}

/// Outcome of a successful run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadSummary {
    pub total_contacts: usize,
    pub total_agents: usize,
    pub distribution: Vec<AgentItemCount>,
}

/// Stage tracker for one run
struct PipelineRun<'a> {
    upload: &'a str,
    stage: PipelineStage,
}

impl<'a> PipelineRun<'a> {
    fn new(upload: &'a str) -> Self {
        Self {
            upload,
            stage: PipelineStage::Received,
        }
    }

    fn advance(&mut self, next: PipelineStage) {
        debug!(upload = %self.upload, from = %self.stage, to = %next, "Pipeline stage");
        self.stage = next;
    }
}

/// Runs uploads against one database
#[derive(Clone)]
pub struct ListPipeline {
    db: SqlitePool,
    write_guard: Arc<Mutex<()>>,
}

impl ListPipeline {
    /// `write_guard` must be shared by every pipeline writing to `db`
    pub fn new(db: SqlitePool, write_guard: Arc<Mutex<()>>) -> Self {
        Self { db, write_guard }
    }

    /// Process one staged upload end to end
    ///
    /// Consumes the upload; it is released before this returns.
    pub async fn run(&self, upload: TempUpload) -> Result<UploadSummary, IngestError> {
        let name = upload.original_name().to_string();
        let mut run = PipelineRun::new(&name);

        let result = self.run_stages(&mut run, &upload).await;
        let failed_at = run.stage;

        upload.release();

        match &result {
            Ok(summary) => {
                run.advance(PipelineStage::Cleaned);
                info!(
                    upload = %name,
                    contacts = summary.total_contacts,
                    agents = summary.total_agents,
                    "Upload distributed"
                );
            }
            Err(e) if e.is_client_error() => {
                warn!(
                    upload = %name,
                    after = %failed_at,
                    code = e.code(),
                    error = %e,
                    "Upload rejected"
                );
            }
            Err(e) => {
                error!(
                    upload = %name,
                    after = %failed_at,
                    code = e.code(),
                    error = %e,
                    "Upload failed"
                );
            }
        }

        result
    }

    async fn run_stages(
        &self,
        run: &mut PipelineRun<'_>,
        upload: &TempUpload,
    ) -> Result<UploadSummary, IngestError> {
        let format = FileFormat::from_extension(&upload.extension())?;
        run.advance(PipelineStage::Validated);

        let rows = read_and_parse(upload.path().to_path_buf(), format).await?;
        run.advance(PipelineStage::Parsed);

        let contacts = normalize_rows(&rows)?;
        run.advance(PipelineStage::Normalized);

        let _guard = self.write_guard.lock().await;

        let roster = agents::fetch_all_agents(&self.db)
            .await
            .map_err(|e| IngestError::Unexpected(format!("Agent roster unavailable: {}", e)))?;
        run.advance(PipelineStage::RosterFetched);

        let total_contacts = contacts.len();
        let total_agents = roster.len();
        let buckets = distribute(contacts, &roster)?;
        run.advance(PipelineStage::Distributed);

        let batches = replace_distribution(&self.db, buckets).await?;
        run.advance(PipelineStage::Persisted);

        Ok(UploadSummary {
            total_contacts,
            total_agents,
            distribution: batches
                .iter()
                .map(|batch| AgentItemCount {
                    agent_name: batch.agent_name.clone(),
                    item_count: batch.items.len(),
                })
                .collect(),
        })
    }
}

/// Read and parse the staged file off the async runtime, waiting for all rows
async fn read_and_parse(
    path: PathBuf,
    format: FileFormat,
) -> Result<Vec<super::RawRecord>, IngestError> {
    tokio::task::spawn_blocking(move || {
        let bytes = std::fs::read(&path)?;
        parse_rows(&bytes, format)
    })
    .await
    .map_err(|e| IngestError::Unexpected(format!("Parser task failed: {}", e)))?
}
