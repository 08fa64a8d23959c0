//! Workspace Probe (spec.md §4.3). A single operation, `exists(path)`, used
//! only during Output Deconflict (spec.md §4.7.1). The probe is fail-open:
//! any error talking to the workspace file service is logged and treated as
//! "does not exist" so a spurious collision check never blocks submission.

use async_trait::async_trait;

/// Abstraction over the workspace file service so the compiler can be
/// tested without a live workspace backend.
#[async_trait]
pub trait WorkspaceProbe: Send + Sync {
    /// Returns `true` only if the probe positively confirmed the path (or
    /// its hidden-directory sibling `<dir>/.<name>`) exists. Any failure to
    /// reach the workspace returns `false` (fail-open), per spec.md §4.3.
    async fn exists(&self, dir: &str, name: &str) -> bool;
}

/// Splits a workspace path into `(dir, name)` for probing. `dir` is the
/// path with its final component removed; `name` is that final component.
fn split_path(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some((dir, name)) => (dir, name),
        None => ("", path),
    }
}

/// A `reqwest`-backed probe against the BV-BRC-style workspace file
/// service. Requests `<base_url>/<dir>/<name>` and `<base_url>/<dir>/.<name>`
/// with `Authorization: <token>`; any non-2xx, timeout, or connection error
/// is swallowed and logged as fail-open.
pub struct HttpWorkspaceProbe {
    client: reqwest::Client,
    base_url: String,
}

impl HttpWorkspaceProbe {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .expect("reqwest client");
        Self {
            client,
            base_url: base_url.into(),
        }
    }

    async fn head_ok(&self, url: &str, token: Option<&str>) -> bool {
        let mut req = self.client.head(url);
        if let Some(token) = token {
            req = req.header("Authorization", token);
        }
        match req.send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::warn!(error = %e, url, "workspace probe failed; treating as not-found (fail-open)");
                false
            }
        }
    }
}

#[async_trait]
impl WorkspaceProbe for HttpWorkspaceProbe {
    async fn exists(&self, dir: &str, name: &str) -> bool {
        let plain = format!("{}/{}/{}", self.base_url, dir.trim_matches('/'), name);
        let hidden = format!("{}/{}/.{}", self.base_url, dir.trim_matches('/'), name);
        self.head_ok(&plain, None).await || self.head_ok(&hidden, None).await
    }
}

/// An in-memory probe for tests and offline compile runs: the given set of
/// full `<dir>/<name>` paths are reported as existing, everything else is
/// reported as absent.
#[derive(Default)]
pub struct FakeWorkspaceProbe {
    pub existing: std::collections::HashSet<String>,
}

impl FakeWorkspaceProbe {
    pub fn new(existing: impl IntoIterator<Item = String>) -> Self {
        Self {
            existing: existing.into_iter().collect(),
        }
    }
}

#[async_trait]
impl WorkspaceProbe for FakeWorkspaceProbe {
    async fn exists(&self, dir: &str, name: &str) -> bool {
        let plain = format!("{dir}/{name}");
        let hidden = format!("{dir}/.{name}");
        self.existing.contains(&plain) || self.existing.contains(&hidden)
    }
}

pub fn split_output_path(path: &str) -> (&str, &str) {
    split_path(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_path_separates_dir_and_name() {
        assert_eq!(split_path("/home/user/out/report.txt"), ("/home/user/out", "report.txt"));
        assert_eq!(split_path("report.txt"), ("", "report.txt"));
    }

    #[tokio::test]
    async fn fake_probe_reports_hidden_sibling() {
        let probe = FakeWorkspaceProbe::new(["/out/.report".to_string()]);
        assert!(probe.exists("/out", "report").await);
        assert!(!probe.exists("/out", "other").await);
    }
}
