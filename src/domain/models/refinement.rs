use serde_derive::Deserialize;
use serde_derive::Serialize;

use super::BinaryContent;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveInpResult {
    pub inp_path: String,
    pub line_count: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum RefinementStatus {
    Success,
    Failure,
    Timeout,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlotResultsOutput {
    pub output_filepath: String,
    pub output_image: Option<BinaryContent>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRefinementResult {
    pub status: RefinementStatus,
    pub stdout: String,
    pub stderr: String,
    pub outfile_path: Option<String>,
    pub outfile_contents: Option<String>,
    pub refinement_result_path: Option<String>,
    pub hkl_path: Option<String>,
    pub logs_tail: Option<String>,
    pub plot_results: Option<PlotResultsOutput>,
}

impl RunRefinementResult {
    pub fn new(status: RefinementStatus, stdout: &str, stderr: &str) -> RunRefinementResult {
        return RunRefinementResult {
            status,
            stdout: stdout.to_string(),
            stderr: stderr.to_string(),
            outfile_path: None,
            outfile_contents: None,
            refinement_result_path: None,
            hkl_path: None,
            logs_tail: None,
            plot_results: None,
        };
    }
}
