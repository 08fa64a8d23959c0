//! Per-workflow logging (spec.md §4.9, grounded in
//! `original_source/utils/workflow_logger.py`). Each active workflow gets
//! its own plain-text log file at `log_file_path`, opened once per
//! Execution Context and closed on retirement. This is additive to the
//! global `tracing` pipeline, not a replacement for it.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

use wf_core::Error;

pub struct WorkflowLogger {
    file: File,
    workflow_id: String,
}

impl WorkflowLogger {
    /// Opens (creating if needed) the log file at `log_file_path`, appending
    /// to it across process restarts so a resumed context picks up where the
    /// prior process left off.
    pub fn open(log_dir: &str, workflow_id: &str) -> Result<(Self, String), Error> {
        std::fs::create_dir_all(log_dir).map_err(|e| Error::Internal(format!("failed to create workflow log dir '{log_dir}': {e}")))?;
        let path = Path::new(log_dir).join(format!("{workflow_id}.log"));
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::Internal(format!("failed to open workflow log file '{}': {e}", path.display())))?;
        let log_file_path = path.to_string_lossy().into_owned();
        let mut logger = Self {
            file,
            workflow_id: workflow_id.to_string(),
        };
        logger.write_line("INFO", &format!("workflow logger initialized: {workflow_id}"));
        Ok((logger, log_file_path))
    }

    fn write_line(&mut self, level: &str, message: &str) {
        let now = chrono::Utc::now().format("%Y-%m-%d %H:%M:%S");
        let _ = writeln!(self.file, "{now} - {level} - {message}");
    }

    pub fn info(&mut self, message: &str) {
        self.write_line("INFO", message);
    }

    pub fn error(&mut self, message: &str) {
        self.write_line("ERROR", message);
    }

    pub fn workflow_started(&mut self, workflow_name: &str, total_steps: u32) {
        self.info(&format!("=== Workflow Execution Started: {workflow_name} ==="));
        self.info(&format!("Total steps: {total_steps}"));
    }

    pub fn workflow_completed(&mut self, workflow_name: &str, status: &str) {
        self.info(&format!("=== Workflow Execution Completed: {workflow_name} ==="));
        self.info(&format!("Final status: {status}"));
    }

    pub fn step_transition(&mut self, step_name: &str, old_status: &str, new_status: &str) {
        self.info(&format!("Step '{step_name}' transition: {old_status} -> {new_status}"));
    }

    pub fn step_submission(&mut self, step_name: &str, app: &str, task_id: &str) {
        self.info(&format!("Submitted step '{step_name}' to app '{app}' | task_id={task_id}"));
    }

    pub fn step_completion(&mut self, step_name: &str, elapsed_time: Option<f64>) {
        match elapsed_time {
            Some(t) => self.info(&format!("Step '{step_name}' completed successfully | elapsed_time={t}")),
            None => self.info(&format!("Step '{step_name}' completed successfully")),
        }
    }

    pub fn step_failure(&mut self, step_name: &str, error_message: &str) {
        self.error(&format!("Step '{step_name}' FAILED | error={error_message}"));
    }

    /// Closes the logger, matching `WorkflowLogger.close_logger` in the
    /// python original: flush and drop. `workflow_id` is retained only for
    /// the trace log line emitted here.
    pub fn close(mut self) {
        self.info("workflow logger closed");
        let _ = self.file.flush();
        tracing::debug!(workflow_id = %self.workflow_id, "closed workflow logger");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_creates_log_file_and_writes_header() {
        let dir = std::env::temp_dir().join(format!("wf-executor-test-{}", std::process::id()));
        let (mut logger, path) = WorkflowLogger::open(dir.to_str().unwrap(), "wf_1_aaaa").unwrap();
        logger.workflow_started("test-workflow", 3);
        logger.close();
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("workflow logger initialized"));
        assert!(contents.contains("Workflow Execution Started: test-workflow"));
        std::fs::remove_dir_all(&dir).ok();
    }
}
