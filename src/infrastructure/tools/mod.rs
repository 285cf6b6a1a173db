#[cfg(test)]
#[path = "tools_test.rs"]
mod tests;

use std::path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_derive::Deserialize;
use serde_json::json;
use serde_json::Value;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::BinaryContent;
use crate::domain::models::PlotResultsOutput;
use crate::domain::models::Tool;
use crate::domain::models::ToolError;
use crate::domain::models::ToolOutput;
use crate::domain::models::ToolRegistry;
use crate::domain::services::StructureQuery;
use crate::infrastructure::optimade::summary_table;
use crate::infrastructure::optimade::write_cifs;
use crate::infrastructure::optimade::Database;
use crate::infrastructure::optimade::OptimadeClient;
use crate::infrastructure::plotting::plot_refinement_multi_panel;
use crate::infrastructure::plotting::plot_refinement_results;
use crate::infrastructure::topas::Topas;

fn parse_args<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T, ToolError> {
    return serde_json::from_value::<T>(args)
        .map_err(|err| return ToolError::retry(format!("Invalid arguments for {tool}: {err}")));
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, ToolError> {
    return serde_json::to_value(value).map_err(|err| return ToolError::Fatal(err.into()));
}

// Images go to the model as inline data rather than base64 inside the JSON.
fn split_plot(plot: &mut Option<PlotResultsOutput>) -> Option<BinaryContent> {
    return plot.as_mut().and_then(|plot| return plot.output_image.take());
}

fn require_file(path: &str, what: &str) -> Result<(), ToolError> {
    if !path::Path::new(path).is_file() {
        return Err(ToolError::retry(format!(
            "{what} '{path}' does not exist. Check the path returned by the refinement run."
        )));
    }

    return Ok(());
}

pub struct SaveTopasInp {
    topas: Arc<Topas>,
}

#[derive(Deserialize)]
struct SaveTopasInpArgs {
    filename: String,
    inp_text: String,
}

#[async_trait]
impl Tool for SaveTopasInp {
    fn name(&self) -> &str {
        return "save_topas_inp";
    }

    fn description(&self) -> &str {
        return "Writes a TOPAS .inp file to the run directory and does some basic checks. \
The input file must include the export line Out_X_Yobs_Ycalc(\"<filename>_output.txt\") where \
<filename> is the input filename without \".inp\". Each str block should also have \
Out_CIF_STR(\"<filename>_<phase_name>.cif\"). Blocks are only defined by whitespace and do not \
need closing tags. The input pattern can be assumed to be in the same directory as the input file.";
    }

    fn parameters(&self) -> Value {
        return json!({
            "type": "object",
            "properties": {
                "filename": {
                    "type": "string",
                    "description": "Name of the input file, e.g. NaCoO2_run1.inp"
                },
                "inp_text": {
                    "type": "string",
                    "description": "Full text of the TOPAS input file"
                }
            },
            "required": ["filename", "inp_text"]
        });
    }

    async fn call(&self, args: Value) -> Result<ToolOutput, ToolError> {
        let args: SaveTopasInpArgs = parse_args(self.name(), args)?;
        let res = self.topas.save_input(&args.filename, &args.inp_text).await?;

        return Ok(ToolOutput::new(to_json(&res)?));
    }
}

pub struct RunTopasRefinement {
    topas: Arc<Topas>,
}

#[derive(Deserialize)]
struct RunTopasRefinementArgs {
    inp_path: String,
    #[serde(default)]
    timeout_s: Option<u64>,
}

#[async_trait]
impl Tool for RunTopasRefinement {
    fn name(&self) -> &str {
        return "run_topas_refinement";
    }

    fn description(&self) -> &str {
        return "Runs a TOPAS refinement on a saved .inp file. Returns the status (success, failure \
or timeout), the program output, the .out file contents and the paths of the results table and \
reflection list when they were written. When a results table exists a multi-panel plot of the \
fit is generated and shown to you.";
    }

    fn parameters(&self) -> Value {
        return json!({
            "type": "object",
            "properties": {
                "inp_path": {
                    "type": "string",
                    "description": "Path returned by save_topas_inp"
                },
                "timeout_s": {
                    "type": "integer",
                    "description": format!(
                        "Wall clock limit in seconds (default: {})",
                        self.topas.default_timeout().as_secs()
                    )
                }
            },
            "required": ["inp_path"]
        });
    }

    async fn call(&self, args: Value) -> Result<ToolOutput, ToolError> {
        let args: RunTopasRefinementArgs = parse_args(self.name(), args)?;
        require_file(&args.inp_path, "Input file")?;

        let mut res = self
            .topas
            .run(&args.inp_path, args.timeout_s.map(Duration::from_secs))
            .await?;
        let image = split_plot(&mut res.plot_results);

        return Ok(ToolOutput::new(to_json(&res)?).with_image(image));
    }
}

pub struct GetOptimadeCifs {
    cif_dir: path::PathBuf,
    endpoint_override: Option<String>,
}

#[derive(Deserialize)]
struct GetOptimadeCifsArgs {
    database: String,
    #[serde(flatten)]
    query: StructureQuery,
}

#[async_trait]
impl Tool for GetOptimadeCifs {
    fn name(&self) -> &str {
        return "get_optimade_cifs";
    }

    fn description(&self) -> &str {
        return "Searches an OPTIMADE database for crystal structures and saves them as CIF files. \
Provide exactly one of: filter (a raw OPTIMADE filter, takes precedence), elements (an exclusive \
list of element symbols, e.g. [\"Li\", \"C\", \"O\"]) or formula (e.g. \"NaCoO2\"). database must \
be one of \"cod\" (Crystallography Open Database), \"mp\" (Materials Project) or \"oqmd\" (Open \
Quantum Materials Database). Formula search is not available for cod.";
    }

    fn parameters(&self) -> Value {
        return json!({
            "type": "object",
            "properties": {
                "database": {
                    "type": "string",
                    "enum": ["cod", "mp", "oqmd"]
                },
                "elements": {
                    "type": "array",
                    "items": { "type": "string" }
                },
                "formula": { "type": "string" },
                "filter": { "type": "string" }
            },
            "required": ["database"]
        });
    }

    async fn call(&self, args: Value) -> Result<ToolOutput, ToolError> {
        let args: GetOptimadeCifsArgs = parse_args(self.name(), args)?;
        let database = Database::parse(&args.database)?;
        let client = match &self.endpoint_override {
            Some(url) => OptimadeClient::with_endpoint(database, url),
            None => OptimadeClient::new(database),
        };

        let structures = client.search(&args.query).await?;
        println!("{}", summary_table(&structures));

        let summaries = write_cifs(&structures, &self.cif_dir).await?;
        let cifs = summaries
            .iter()
            .filter_map(|summary| return summary.cif.clone())
            .collect::<Vec<String>>();

        return Ok(ToolOutput::new(json!({
            "structures": to_json(&summaries)?,
            "cifs": cifs,
        })));
    }
}

pub struct PlotRefinementResults {}

#[derive(Deserialize)]
struct PlotRefinementResultsArgs {
    output_file: String,
    save_path: String,
    #[serde(default)]
    hkl_file: Option<String>,
    #[serde(default)]
    x_range: Option<Vec<f64>>,
}

#[async_trait]
impl Tool for PlotRefinementResults {
    fn name(&self) -> &str {
        return "plot_refinement_results";
    }

    fn description(&self) -> &str {
        return "Plots the results of a TOPAS refinement from the refinement output file and saves \
an image. output_file is the results table (e.g. \"run_dir/NaCoO2_output.txt\"), save_path where \
the image is written (.png or .svg), hkl_file an optional reflection list for tick marks and \
x_range an optional [min, max] 2θ window to zoom in on.";
    }

    fn parameters(&self) -> Value {
        return json!({
            "type": "object",
            "properties": {
                "output_file": { "type": "string" },
                "save_path": { "type": "string" },
                "hkl_file": { "type": "string" },
                "x_range": {
                    "type": "array",
                    "items": { "type": "number" },
                    "minItems": 2,
                    "maxItems": 2
                }
            },
            "required": ["output_file", "save_path"]
        });
    }

    async fn call(&self, args: Value) -> Result<ToolOutput, ToolError> {
        let args: PlotRefinementResultsArgs = parse_args(self.name(), args)?;
        require_file(&args.output_file, "Output file")?;
        if let Some(hkl_file) = args.hkl_file.as_deref() {
            require_file(hkl_file, "Reflection file")?;
        }

        let x_range = match args.x_range.as_deref() {
            None => None,
            Some([lo, hi]) if lo < hi => Some((*lo, *hi)),
            Some(other) => {
                return Err(ToolError::retry(format!(
                    "x_range must be [min, max] with min < max, got {other:?}"
                )));
            }
        };

        let mut plot = Some(
            plot_refinement_results(
                &args.output_file,
                &args.save_path,
                args.hkl_file.as_deref(),
                x_range,
            )
            .await?,
        );
        let image = split_plot(&mut plot);

        return Ok(ToolOutput::new(to_json(&plot)?).with_image(image));
    }
}

pub struct PlotRefinementMultiPanel {}

#[derive(Deserialize)]
struct PlotRefinementMultiPanelArgs {
    output_file: String,
    save_path: String,
    #[serde(default)]
    hkl_file: Option<String>,
}

#[async_trait]
impl Tool for PlotRefinementMultiPanel {
    fn name(&self) -> &str {
        return "plot_refinement_multi_panel";
    }

    fn description(&self) -> &str {
        return "Plots a TOPAS refinement in four panels: the full range, a zoom on the strongest \
observed peak, a zoom on the largest residual and the high angle third of the pattern. Use it to \
inspect where a fit goes wrong.";
    }

    fn parameters(&self) -> Value {
        return json!({
            "type": "object",
            "properties": {
                "output_file": { "type": "string" },
                "save_path": { "type": "string" },
                "hkl_file": { "type": "string" }
            },
            "required": ["output_file", "save_path"]
        });
    }

    async fn call(&self, args: Value) -> Result<ToolOutput, ToolError> {
        let args: PlotRefinementMultiPanelArgs = parse_args(self.name(), args)?;
        require_file(&args.output_file, "Output file")?;
        if let Some(hkl_file) = args.hkl_file.as_deref() {
            require_file(hkl_file, "Reflection file")?;
        }

        let mut plot = Some(
            plot_refinement_multi_panel(&args.output_file, &args.save_path, args.hkl_file.as_deref())
                .await?,
        );
        let image = split_plot(&mut plot);

        return Ok(ToolOutput::new(to_json(&plot)?).with_image(image));
    }
}

pub fn build_registry(topas: Topas, cif_dir: &path::Path) -> ToolRegistry {
    let topas = Arc::new(topas);
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(SaveTopasInp {
        topas: Arc::clone(&topas),
    }));
    registry.register(Arc::new(RunTopasRefinement { topas }));
    registry.register(Arc::new(GetOptimadeCifs {
        cif_dir: cif_dir.to_path_buf(),
        endpoint_override: None,
    }));
    registry.register(Arc::new(PlotRefinementResults {}));
    registry.register(Arc::new(PlotRefinementMultiPanel {}));

    return registry;
}

/// Registry wired from the loaded configuration.
pub fn default_registry() -> ToolRegistry {
    return build_registry(
        Topas::default(),
        &path::PathBuf::from(Config::get(ConfigKey::CifDir)),
    );
}
