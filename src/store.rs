//! In-memory job store: the ordered batch, the active index, and every
//! state transition the editor performs on it.
//!
//! All mutation happens under one `Mutex` in `AppState`; the dispatcher
//! only ever sees cloned payload snapshots, and its outcomes are merged
//! back in a single `apply_outcomes` call.

use std::collections::HashMap;

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::dispatcher::JobPayload;
use crate::media;
use crate::models::{Job, JobOutcome, JobView, NewUpload, ProcessingStatus};

/// Upper bound on the batch in batch mode
pub const MAX_BATCH_SIZE: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadMode {
    #[default]
    Single,
    Batch,
}

#[derive(Debug, Default)]
pub struct JobStore {
    mode: UploadMode,
    jobs: Vec<Job>,
    active: usize,
}

impl JobStore {
    pub fn mode(&self) -> UploadMode {
        self.mode
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub fn active_index(&self) -> usize {
        self.active
    }

    pub fn active_job(&self) -> Option<&Job> {
        self.jobs.get(self.active)
    }

    pub fn job(&self, id: &str) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id == id)
    }

    pub fn views(&self) -> Vec<JobView> {
        self.jobs.iter().map(JobView::from).collect()
    }

    /// Switching modes always discards the batch.
    pub fn set_mode(&mut self, mode: UploadMode) {
        self.mode = mode;
        self.clear();
    }

    /// Turns uploads into idle jobs. Single mode replaces the batch with
    /// the first file; batch mode appends and truncates to the limit.
    /// Any file that does not probe as an image rejects the whole upload
    /// with a user-visible message and leaves the store untouched.
    pub fn add_uploads(&mut self, uploads: Vec<NewUpload>) -> Result<Vec<JobView>, String> {
        if uploads.is_empty() {
            return Ok(self.views());
        }

        let mut new_jobs = Vec::with_capacity(uploads.len());
        for upload in uploads {
            new_jobs.push(build_job(upload)?);
        }

        match self.mode {
            UploadMode::Single => {
                self.clear();
                if let Some(first) = new_jobs.into_iter().next() {
                    self.jobs.push(first);
                }
            }
            UploadMode::Batch => {
                self.jobs.append(&mut new_jobs);
                if self.jobs.len() > MAX_BATCH_SIZE {
                    let discarded = self.jobs.len() - MAX_BATCH_SIZE;
                    self.jobs.truncate(MAX_BATCH_SIZE);
                    info!(
                        "[store] batch limit reached, discarded {} file(s)",
                        discarded
                    );
                }
            }
        }

        Ok(self.views())
    }

    /// Deletes the job at the active index and re-clamps the index.
    pub fn remove_active(&mut self) {
        if self.jobs.is_empty() {
            return;
        }
        self.jobs.remove(self.active);
        if self.jobs.is_empty() {
            self.active = 0;
        } else if self.active >= self.jobs.len() {
            self.active = self.jobs.len() - 1;
        }
    }

    /// Moves the active index, clamped to the batch.
    pub fn select(&mut self, index: usize) {
        if self.jobs.is_empty() {
            self.active = 0;
        } else {
            self.active = index.min(self.jobs.len() - 1);
        }
    }

    /// Records or clears the annotated image for the active job only.
    /// Status is untouched.
    pub fn set_annotation(&mut self, data: Option<Vec<u8>>) {
        if let Some(job) = self.jobs.get_mut(self.active) {
            job.annotated = data;
        }
    }

    /// Marks every job processing and clears prior errors. Errors with a
    /// user-visible message when the batch is empty.
    pub fn begin_run(&mut self) -> Result<(), String> {
        if self.jobs.is_empty() {
            return Err("Add at least one image first.".to_string());
        }
        for job in &mut self.jobs {
            job.status = ProcessingStatus::Processing;
            job.error = None;
        }
        Ok(())
    }

    /// Snapshot of every job's effective input for the dispatcher.
    pub fn payloads(&self) -> Vec<JobPayload> {
        self.jobs.iter().map(JobPayload::from_job).collect()
    }

    /// Merges dispatcher outcomes back in, keyed by job id. Jobs without
    /// an outcome are left untouched; outcomes for ids no longer in the
    /// batch are discarded as orphans.
    pub fn apply_outcomes(&mut self, mut outcomes: HashMap<String, JobOutcome>) {
        for job in &mut self.jobs {
            match outcomes.remove(&job.id) {
                Some(JobOutcome::Success { data }) => {
                    job.status = ProcessingStatus::Completed;
                    job.result = Some(data);
                    job.error = None;
                }
                Some(JobOutcome::Failure { error }) => {
                    job.status = ProcessingStatus::Failed;
                    job.error = Some(error);
                }
                None => {}
            }
        }
        if !outcomes.is_empty() {
            debug!("[store] discarded {} orphaned outcome(s)", outcomes.len());
        }
    }

    /// Empties the batch, dropping every held image buffer.
    pub fn clear(&mut self) {
        self.jobs.clear();
        self.active = 0;
    }
}

fn build_job(upload: NewUpload) -> Result<Job, String> {
    let (width, height) = media::probe_dimensions(&upload.data)
        .map_err(|e| format!("{}: {}", upload.file_name, e))?;
    let mime_type = media::sniff_mime(&upload.file_name, &upload.data);

    Ok(Job {
        id: uuid::Uuid::new_v4().to_string(),
        file_name: upload.file_name,
        mime_type,
        original: upload.data,
        annotated: None,
        result: None,
        status: ProcessingStatus::Idle,
        error: None,
        width,
        height,
        created_at: chrono::Utc::now().to_rfc3339(),
    })
}
