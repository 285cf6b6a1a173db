#[cfg(test)]
#[path = "topas_test.rs"]
mod tests;

use std::path;
use std::process::Stdio;
use std::time::Duration;

use tokio::fs;
use tokio::process::Command;
use tokio::time::timeout;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::RefinementStatus;
use crate::domain::models::RunRefinementResult;
use crate::domain::models::SaveInpResult;
use crate::domain::models::ToolError;
use crate::infrastructure::plotting::plot_refinement_multi_panel;

const LOG_TAIL_LINES: usize = 20;

#[derive(Debug, thiserror::Error)]
pub enum RefinementError {
    #[error("input file doesn't contain the correct output macro: {expected}. Please try again.")]
    MissingOutputMacro { expected: String },
    #[error("filename '{0}' has no base name. Please provide a name such as 'NaCoO2_run1.inp'.")]
    InvalidFilename(String),
    #[error("TOPAS perhaps returned an error. stdout: {stdout}, {stderr}")]
    ProcessFailed { stdout: String, stderr: String },
    #[error("Failed to start refinement program {executable}: {source}")]
    Spawn {
        executable: String,
        source: std::io::Error,
    },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<RefinementError> for ToolError {
    fn from(err: RefinementError) -> ToolError {
        match err {
            RefinementError::MissingOutputMacro { .. }
            | RefinementError::InvalidFilename(_)
            | RefinementError::ProcessFailed { .. } => return ToolError::Retry(err.to_string()),
            _ => return ToolError::Fatal(anyhow::Error::new(err)),
        }
    }
}

/// The export line every input file must carry so results can be plotted.
pub fn output_macro(base: &str) -> String {
    return format!("Out_X_Yobs_Ycalc(\"{base}_output.txt\")");
}

/// Replaces a trailing `.inp` with `suffix`, or appends it.
pub fn sibling_path(inp_path: &str, suffix: &str) -> String {
    let stem = inp_path.strip_suffix(".inp").unwrap_or(inp_path);
    return format!("{stem}{suffix}");
}

async fn is_file(path: &str) -> bool {
    return fs::metadata(path)
        .await
        .map(|m| return m.is_file())
        .unwrap_or(false);
}

async fn read_if_file(path: &str) -> Option<String> {
    if !is_file(path).await {
        return None;
    }

    match fs::read_to_string(path).await {
        Ok(text) => return Some(text),
        Err(err) => {
            tracing::warn!(path, err = ?err, "Failed to read refinement output");
            return None;
        }
    }
}

pub struct Topas {
    executable: String,
    run_dir: path::PathBuf,
    timeout: Duration,
}

impl Default for Topas {
    fn default() -> Topas {
        return Topas {
            executable: Config::get(ConfigKey::TopasExecutable),
            run_dir: path::PathBuf::from(Config::get(ConfigKey::RunDir)),
            timeout: Duration::from_secs(Config::get_u64(ConfigKey::RefinementTimeout)),
        };
    }
}

impl Topas {
    pub fn new(executable: &str, run_dir: &path::Path, timeout: Duration) -> Topas {
        return Topas {
            executable: executable.to_string(),
            run_dir: run_dir.to_path_buf(),
            timeout,
        };
    }

    pub fn default_timeout(&self) -> Duration {
        return self.timeout;
    }

    /// Writes an input file into the run directory after checking it exports
    /// the results table under the matching name.
    pub async fn save_input(&self, filename: &str, content: &str) -> Result<SaveInpResult, RefinementError> {
        let base = path::Path::new(filename.trim())
            .file_stem()
            .map(|stem| return stem.to_string_lossy().to_string())
            .unwrap_or_default();
        if base.is_empty() {
            return Err(RefinementError::InvalidFilename(filename.to_string()));
        }

        let expected = output_macro(&base);
        if !content.contains(&expected) {
            return Err(RefinementError::MissingOutputMacro { expected });
        }

        fs::create_dir_all(&self.run_dir).await?;
        let inp_path = self.run_dir.join(format!("{base}.inp"));
        fs::write(&inp_path, content).await?;

        let res = SaveInpResult {
            inp_path: inp_path.to_string_lossy().to_string(),
            line_count: content.lines().count(),
        };
        tracing::info!(inp_path = %res.inp_path, line_count = res.line_count, "Saved refinement input");

        return Ok(res);
    }

    // topas.log lives next to the executable.
    async fn logs_tail(&self) -> Option<String> {
        let log_path = path::Path::new(&self.executable)
            .parent()?
            .join("topas.log");
        let text = read_if_file(&log_path.to_string_lossy()).await?;
        let lines = text.lines().collect::<Vec<&str>>();
        let start = lines.len().saturating_sub(LOG_TAIL_LINES);

        return Some(lines[start..].join("\n"));
    }

    /// Runs the refinement program on an input file. A non-zero exit is an
    /// error carrying the captured output. A timeout kills the process and
    /// returns without looking for output files.
    pub async fn run(
        &self,
        inp_path: &str,
        timeout_override: Option<Duration>,
    ) -> Result<RunRefinementResult, RefinementError> {
        let limit = timeout_override.unwrap_or(self.timeout);
        tracing::info!(executable = %self.executable, inp_path, timeout_s = limit.as_secs(), "Running refinement");

        let child = Command::new(&self.executable)
            .arg(inp_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| {
                return RefinementError::Spawn {
                    executable: self.executable.to_string(),
                    source,
                };
            })?;

        let output = match timeout(limit, child.wait_with_output()).await {
            Ok(output) => output?,
            Err(_) => {
                tracing::warn!(inp_path, timeout_s = limit.as_secs(), "Refinement timed out");
                let mut res = RunRefinementResult::new(RefinementStatus::Timeout, "", "");
                res.logs_tail = self.logs_tail().await;
                return Ok(res);
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        if !output.status.success() {
            tracing::warn!(code = ?output.status.code(), "Refinement failed");
            return Err(RefinementError::ProcessFailed { stdout, stderr });
        }

        let mut res = RunRefinementResult::new(RefinementStatus::Success, &stdout, &stderr);

        let outfile_path = sibling_path(inp_path, ".out");
        if let Some(contents) = read_if_file(&outfile_path).await {
            res.outfile_path = Some(outfile_path);
            res.outfile_contents = Some(contents);
        }

        let result_path = sibling_path(inp_path, "_output.txt");
        if is_file(&result_path).await {
            res.refinement_result_path = Some(result_path);
        }

        let hkl_path = sibling_path(inp_path, "_hkl.txt");
        if is_file(&hkl_path).await {
            res.hkl_path = Some(hkl_path);
        }

        res.logs_tail = self.logs_tail().await;

        if let Some(result_path) = res.refinement_result_path.as_deref() {
            let save_path = sibling_path(inp_path, "_plot.png");
            match plot_refinement_multi_panel(result_path, &save_path, res.hkl_path.as_deref()).await {
                Ok(plot) => res.plot_results = Some(plot),
                Err(err) => tracing::warn!(err = ?err, "Failed to plot refinement results"),
            }
        }

        return Ok(res);
    }
}
