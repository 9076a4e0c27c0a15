//! Auto-runner: walks the country table one run at a time.
//!
//! The runner record lives in the blob store under [`STATE_KEY`]. Mutations
//! within a process are serialized by a lock, and every write carries the
//! version it read, so a writer in another process that raced us is rejected
//! by the store instead of silently overwritten.

use crate::countries::{self, Country};
use crate::error::{PearlError, Result, RunnerError};
use crate::research::{Pipeline, RunReport};
use crate::store::BlobStore;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

pub const STATE_KEY: &str = "auto_runner_state.json";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunnerStatus {
    #[default]
    Idle,
    Running,
    Paused,
    Completed,
}

impl fmt::Display for RunnerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunnerStatus::Idle => "IDLE",
            RunnerStatus::Running => "RUNNING",
            RunnerStatus::Paused => "PAUSED",
            RunnerStatus::Completed => "COMPLETED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunFailure {
    pub code: String,
    pub error: String,
}

/// Persisted runner record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunnerState {
    pub status: RunnerStatus,
    /// Index into the country table of the next country to run.
    pub cursor_index: usize,
    #[serde(default)]
    pub completed_codes: Vec<String>,
    #[serde(default)]
    pub errors: Vec<RunFailure>,
    #[serde(default)]
    pub last_run_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NextCountry {
    pub code: String,
    pub name: String,
}

/// What `status` reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerReport {
    pub status: RunnerStatus,
    pub cursor: usize,
    pub total: usize,
    pub next_country: Option<NextCountry>,
    pub finished: bool,
}

/// Result of [`AutoRunner::step`].
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StepOutcome {
    pub country_code: String,
    pub cursor: usize,
    pub report: Option<RunReport>,
    pub error: Option<String>,
}

pub struct AutoRunner {
    blobs: Arc<dyn BlobStore>,
    lock: Mutex<()>,
    countries: &'static [Country],
}

impl AutoRunner {
    pub fn new(blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            blobs,
            lock: Mutex::new(()),
            countries: countries::all(),
        }
    }

    pub fn total(&self) -> usize {
        self.countries.len()
    }

    /// Current record and its version; a missing or unreadable record reads
    /// as the idle default.
    async fn load(&self) -> Result<(RunnerState, Option<u64>)> {
        let Some(stored) = self.blobs.read_versioned(STATE_KEY).await? else {
            return Ok((RunnerState::default(), None));
        };
        match serde_json::from_value(stored.value) {
            Ok(state) => Ok((state, Some(stored.version))),
            Err(e) => {
                warn!(error = %e, "Runner state unreadable; starting from defaults");
                Ok((RunnerState::default(), Some(stored.version)))
            }
        }
    }

    async fn save(&self, state: &RunnerState, expected: Option<u64>) -> Result<u64> {
        let value = serde_json::to_value(state)?;
        Ok(self.blobs.write_versioned(STATE_KEY, &value, expected).await?)
    }

    pub async fn state(&self) -> Result<RunnerState> {
        Ok(self.load().await?.0)
    }

    /// Report progress, marking the run COMPLETED when the cursor has passed
    /// the end while RUNNING.
    pub async fn status(&self) -> Result<RunnerReport> {
        let _guard = self.lock.lock().await;
        let (mut state, version) = self.load().await?;
        let finished = state.cursor_index >= self.total();
        if finished && state.status == RunnerStatus::Running {
            state.status = RunnerStatus::Completed;
            self.save(&state, version).await?;
            info!("Auto-runner completed");
        }
        let next_country = self.countries.get(state.cursor_index).map(|c| NextCountry {
            code: c.code.to_string(),
            name: c.name_es.to_string(),
        });
        Ok(RunnerReport {
            status: state.status,
            cursor: state.cursor_index,
            total: self.total(),
            next_country,
            finished,
        })
    }

    /// Set RUNNING; `reset` rewinds to the first country and clears history.
    pub async fn start(&self, reset: bool) -> Result<RunnerState> {
        let _guard = self.lock.lock().await;
        let (mut state, version) = self.load().await?;
        if reset {
            state.cursor_index = 0;
            state.completed_codes.clear();
            state.errors.clear();
        }
        state.status = RunnerStatus::Running;
        state.last_run_at = Utc::now().to_rfc3339();
        self.save(&state, version).await?;
        info!(cursor = state.cursor_index, reset, "Auto-runner started");
        Ok(state)
    }

    pub async fn stop(&self) -> Result<RunnerState> {
        let _guard = self.lock.lock().await;
        let (mut state, version) = self.load().await?;
        state.status = RunnerStatus::Paused;
        self.save(&state, version).await?;
        info!(cursor = state.cursor_index, "Auto-runner paused");
        Ok(state)
    }

    /// Record the outcome of the run at the cursor and move past it.
    ///
    /// Rejected unless RUNNING, and, when `expected_cursor` is given, unless
    /// the cursor still points there. Returns the new cursor.
    pub async fn advance(
        &self,
        success: bool,
        country_code: Option<&str>,
        expected_cursor: Option<usize>,
    ) -> Result<usize> {
        let _guard = self.lock.lock().await;
        let (mut state, version) = self.load().await?;
        if state.status != RunnerStatus::Running {
            return Err(RunnerError::NotRunning {
                status: state.status.to_string(),
            }
            .into());
        }
        if let Some(expected) = expected_cursor
            && expected != state.cursor_index
        {
            return Err(RunnerError::CursorMismatch {
                expected,
                found: state.cursor_index,
            }
            .into());
        }

        state.cursor_index += 1;
        if let Some(code) = country_code.map(str::trim).filter(|c| !c.is_empty()) {
            if success {
                state.completed_codes.push(code.to_string());
            } else {
                state.errors.push(RunFailure {
                    code: code.to_string(),
                    error: "Run failed".to_string(),
                });
            }
        }
        if state.cursor_index >= self.total() {
            state.status = RunnerStatus::Completed;
        }
        state.last_run_at = Utc::now().to_rfc3339();
        self.save(&state, version).await?;
        info!(
            cursor = state.cursor_index,
            success,
            country = country_code.unwrap_or(""),
            "Auto-runner advanced"
        );
        Ok(state.cursor_index)
    }

    /// Run the country at the cursor and advance past it.
    ///
    /// The lock is not held during the run; the advance is pinned to the
    /// cursor read up front, so a concurrent step is reported as a conflict.
    pub async fn step(&self, pipeline: &Pipeline) -> Result<StepOutcome> {
        let report = self.status().await?;
        if report.status != RunnerStatus::Running {
            return Err(RunnerError::NotRunning {
                status: report.status.to_string(),
            }
            .into());
        }
        let Some(next) = report.next_country else {
            return Err(PearlError::invalid_input("No country left to run"));
        };

        let (run, error) = match pipeline.run_country(&next.code, None).await {
            Ok(run) => (Some(run), None),
            Err(e) => {
                warn!(country = next.code.as_str(), error = %e, "Auto-run step failed");
                (None, Some(e.to_string()))
            }
        };
        let cursor = self
            .advance(run.is_some(), Some(&next.code), Some(report.cursor))
            .await?;
        Ok(StepOutcome {
            country_code: next.code,
            cursor,
            report: run,
            error,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn runner() -> (Arc<MemoryStore>, AutoRunner) {
        let store = Arc::new(MemoryStore::new());
        let runner = AutoRunner::new(store.clone());
        (store, runner)
    }

    #[tokio::test]
    async fn test_fresh_status_is_idle() {
        let (_store, runner) = runner();
        let report = runner.status().await.unwrap();
        assert_eq!(report.status, RunnerStatus::Idle);
        assert_eq!(report.cursor, 0);
        assert_eq!(report.total, 100);
        assert_eq!(report.next_country.unwrap().code, "GB");
        assert!(!report.finished);
    }

    #[tokio::test]
    async fn test_advance_requires_running() {
        let (_store, runner) = runner();
        let err = runner.advance(true, Some("GB"), None).await.unwrap_err();
        assert!(matches!(err, PearlError::Runner(RunnerError::NotRunning { .. })));
        runner.start(false).await.unwrap();
        runner.stop().await.unwrap();
        assert!(runner.advance(true, Some("GB"), None).await.is_err());
    }

    #[tokio::test]
    async fn test_advance_records_outcomes() {
        let (_store, runner) = runner();
        runner.start(false).await.unwrap();
        assert_eq!(runner.advance(true, Some("GB"), Some(0)).await.unwrap(), 1);
        assert_eq!(runner.advance(false, Some("US"), None).await.unwrap(), 2);

        let state = runner.state().await.unwrap();
        assert_eq!(state.completed_codes, vec!["GB".to_string()]);
        assert_eq!(
            state.errors,
            vec![RunFailure {
                code: "US".into(),
                error: "Run failed".into()
            }]
        );
    }

    #[tokio::test]
    async fn test_cursor_mismatch() {
        let (_store, runner) = runner();
        runner.start(false).await.unwrap();
        runner.advance(true, Some("GB"), Some(0)).await.unwrap();
        let err = runner.advance(true, Some("GB"), Some(0)).await.unwrap_err();
        assert!(matches!(
            err,
            PearlError::Runner(RunnerError::CursorMismatch { expected: 0, found: 1 })
        ));
    }

    #[tokio::test]
    async fn test_reset_and_resume() {
        let (_store, runner) = runner();
        runner.start(false).await.unwrap();
        runner.advance(true, Some("GB"), None).await.unwrap();
        runner.stop().await.unwrap();

        let resumed = runner.start(false).await.unwrap();
        assert_eq!(resumed.cursor_index, 1);
        assert_eq!(resumed.completed_codes.len(), 1);

        let reset = runner.start(true).await.unwrap();
        assert_eq!(reset.cursor_index, 0);
        assert!(reset.completed_codes.is_empty());
        assert_eq!(reset.status, RunnerStatus::Running);
    }

    #[tokio::test]
    async fn test_completes_at_end() {
        let (store, runner) = runner();
        let state = RunnerState {
            status: RunnerStatus::Running,
            cursor_index: 99,
            ..RunnerState::default()
        };
        store
            .write_json(STATE_KEY, &serde_json::to_value(&state).unwrap())
            .await
            .unwrap();
        assert_eq!(runner.advance(true, Some("XX"), None).await.unwrap(), 100);
        let report = runner.status().await.unwrap();
        assert_eq!(report.status, RunnerStatus::Completed);
        assert!(report.finished);
        assert!(report.next_country.is_none());
    }

    #[tokio::test]
    async fn test_status_marks_overrun_completed() {
        let (store, runner) = runner();
        store
            .write_json(
                STATE_KEY,
                &json!({"status": "RUNNING", "cursor_index": 120, "completed_codes": [], "errors": [], "last_run_at": ""}),
            )
            .await
            .unwrap();
        assert_eq!(runner.status().await.unwrap().status, RunnerStatus::Completed);
        assert_eq!(runner.state().await.unwrap().status, RunnerStatus::Completed);
    }

    #[tokio::test]
    async fn test_external_write_between_load_and_save_conflicts() {
        let (store, runner) = runner();
        runner.start(false).await.unwrap();
        let (state, version) = runner.load().await.unwrap();
        // Another process bumps the record.
        store
            .write_json(STATE_KEY, &serde_json::to_value(&state).unwrap())
            .await
            .unwrap();
        let err = runner.save(&state, version).await.unwrap_err();
        assert!(matches!(err, PearlError::Store(StoreError::VersionConflict { .. })));
    }

    #[tokio::test]
    async fn test_unreadable_state_reads_as_default() {
        let (store, runner) = runner();
        store.write_json(STATE_KEY, &json!("garbage")).await.unwrap();
        assert_eq!(runner.state().await.unwrap(), RunnerState::default());
        // The stored version is still honoured on the next write.
        runner.start(false).await.unwrap();
    }
}
