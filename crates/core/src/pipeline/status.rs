//! Per-run status record persisted as `qc_status.json`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use super::error::RunnerError;
use super::layout::{is_present, RunLayout};
use super::types::{SampleType, StageId, StageState, Variant};

/// State of one stage in the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageRecord {
    pub stage: StageId,
    pub status: StageState,
}

/// Explicit completion record for a run directory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunStatus {
    /// Canonical path of the input the directory was created for.
    pub input: PathBuf,
    pub sample_type: SampleType,
    pub variant: Variant,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub tr_secs: Option<f64>,
    #[serde(default)]
    pub n_volumes: Option<usize>,
    /// Last scalar tSFNR summary.
    #[serde(default)]
    pub tsfnr: Option<f64>,
    pub stages: Vec<StageRecord>,
}

impl RunStatus {
    /// A fresh record with every stage pending.
    pub fn new(input: impl Into<PathBuf>, sample_type: SampleType, variant: Variant) -> Self {
        let now = Utc::now();
        Self {
            input: input.into(),
            sample_type,
            variant,
            created_at: now,
            updated_at: now,
            tr_secs: None,
            n_volumes: None,
            tsfnr: None,
            stages: StageId::ALL
                .iter()
                .map(|&stage| StageRecord {
                    stage,
                    status: StageState::Pending,
                })
                .collect(),
        }
    }

    /// Reads the record at `path`, or `None` when there is none yet.
    pub fn load(path: &Path) -> Result<Option<Self>, RunnerError> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let mut status: RunStatus =
            serde_json::from_str(&content).map_err(|e| RunnerError::Status {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;
        status.fill_missing_stages();
        Ok(Some(status))
    }

    /// Writes the record through a temporary file and a rename.
    pub fn save(&self, path: &Path) -> Result<(), RunnerError> {
        let json = serde_json::to_string_pretty(self).map_err(|e| RunnerError::Status {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        Ok(())
    }

    /// Records written by older builds may lack newer stages.
    fn fill_missing_stages(&mut self) {
        for stage in StageId::ALL {
            if !self.stages.iter().any(|r| r.stage == stage) {
                self.stages.push(StageRecord {
                    stage,
                    status: StageState::Pending,
                });
            }
        }
        self.stages.sort_by_key(|r| r.stage);
    }

    pub fn state(&self, stage: StageId) -> &StageState {
        self.stages
            .iter()
            .find(|r| r.stage == stage)
            .map(|r| &r.status)
            .unwrap_or(&StageState::Pending)
    }

    pub fn set(&mut self, stage: StageId, status: StageState) {
        self.updated_at = Utc::now();
        match self.stages.iter_mut().find(|r| r.stage == stage) {
            Some(record) => record.status = status,
            None => {
                self.stages.push(StageRecord { stage, status });
                self.stages.sort_by_key(|r| r.stage);
            }
        }
    }

    pub fn mark_done(&mut self, stage: StageId) {
        self.set(stage, StageState::Done { at: Utc::now() });
    }

    pub fn mark_failed(&mut self, stage: StageId, reason: impl Into<String>) {
        self.set(
            stage,
            StageState::Failed {
                at: Utc::now(),
                reason: reason.into(),
            },
        );
    }

    /// Brings the record in line with the files on disk.
    ///
    /// A done gated stage whose artifacts are gone reverts to pending; a
    /// gated stage whose artifacts are all present counts as done. Returns
    /// the stages whose state changed.
    pub fn reconcile(&mut self, layout: &RunLayout) -> Vec<StageId> {
        let mut changed = Vec::new();
        for stage in StageId::ALL.into_iter().filter(StageId::is_gated) {
            let present = layout.artifacts(stage).iter().all(|p| is_present(p));
            let done = self.state(stage).is_done();
            if done && !present {
                self.set(stage, StageState::Pending);
                changed.push(stage);
            } else if !done && present {
                self.mark_done(stage);
                changed.push(stage);
            }
        }
        changed
    }

    /// Stages currently recorded as done.
    pub fn done_stages(&self) -> Vec<StageId> {
        self.stages
            .iter()
            .filter(|r| r.status.is_done())
            .map(|r| r.stage)
            .collect()
    }
}
