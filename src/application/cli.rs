#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;

use std::env;
use std::io;
use std::path;

use anyhow::bail;
use anyhow::Result;
use clap::builder::PossibleValuesParser;
use clap::value_parser;
use clap::Arg;
use clap::ArgAction;
use clap::ArgGroup;
use clap::ArgMatches;
use clap::Command;
use clap_complete::generate;
use clap_complete::Generator;
use clap_complete::Shell;
use owo_colors::OwoColorize;
use strum::VariantNames;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::services::StructureQuery;
use crate::infrastructure::optimade::summary_table;
use crate::infrastructure::optimade::write_cifs;
use crate::infrastructure::optimade::Database;
use crate::infrastructure::optimade::OptimadeClient;
use crate::infrastructure::plotting::plot_refinement_multi_panel;
use crate::infrastructure::plotting::plot_refinement_results;

fn print_completions<G: Generator>(gen: G, cmd: &mut Command) {
    generate(gen, cmd, cmd.get_name().to_string(), &mut io::stdout());
    std::process::exit(0);
}

pub fn log_dir() -> path::PathBuf {
    if let Ok(dir) = env::var("GUILLEMOT_LOG_DIR") {
        return path::PathBuf::from(dir);
    }

    return dirs::cache_dir()
        .unwrap_or_else(env::temp_dir)
        .join("guillemot");
}

async fn create_config_file() -> Result<()> {
    let config_file_path_str = Config::default(ConfigKey::ConfigFile);
    let config_file_path = path::PathBuf::from(&config_file_path_str);
    if config_file_path.exists() {
        bail!(format!(
            "Config file already exists at {config_file_path_str}"
        ));
    }

    if let Some(parent) = config_file_path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let mut file = fs::File::create(&config_file_path).await?;
    file.write_all(Config::serialize_default(build()).as_bytes())
        .await?;

    println!("Created default config file at {config_file_path_str}");
    return Ok(());
}

async fn run_optimade(matches: &ArgMatches) -> Result<()> {
    let database = match matches.get_one::<String>("database") {
        Some(name) => Database::parse(name)?,
        None => bail!("--database is required"),
    };
    let query = StructureQuery {
        filter: matches.get_one::<String>("filter").cloned(),
        elements: matches
            .get_many::<String>("elements")
            .map(|vals| return vals.map(|el| return el.trim().to_string()).collect()),
        formula: matches.get_one::<String>("formula").cloned(),
    };

    let structures = OptimadeClient::new(database).search(&query).await?;
    println!("{}", summary_table(&structures));

    let cif_dir = path::PathBuf::from(Config::get(ConfigKey::CifDir));
    let saved = write_cifs(&structures, &cif_dir)
        .await?
        .iter()
        .filter(|summary| return summary.cif_path.is_some())
        .count();
    println!(
        "\n{}",
        format!("Saved {saved} CIF files to {}", cif_dir.to_string_lossy()).green()
    );

    return Ok(());
}

async fn run_plot(matches: &ArgMatches) -> Result<()> {
    let (output_file, save_path) = match (
        matches.get_one::<String>("output-file"),
        matches.get_one::<String>("save-path"),
    ) {
        (Some(output_file), Some(save_path)) => (output_file, save_path),
        _ => bail!("--output-file and --save-path are required"),
    };
    let hkl_file = matches.get_one::<String>("hkl-file").map(|s| return s.as_str());

    let res = if matches.get_flag("multi-panel") {
        plot_refinement_multi_panel(output_file, save_path, hkl_file).await?
    } else {
        let x_range = match matches.get_many::<f64>("x-range") {
            Some(vals) => {
                let vals = vals.copied().collect::<Vec<f64>>();
                if vals.len() != 2 || vals[0] >= vals[1] {
                    bail!("--x-range expects two values min,max with min < max");
                }
                Some((vals[0], vals[1]))
            }
            None => None,
        };
        plot_refinement_results(output_file, save_path, hkl_file, x_range).await?
    };

    println!("{}", format!("Saved plot to {}", res.output_filepath).green());
    return Ok(());
}

fn subcommand_completions() -> Command {
    return Command::new("completions")
        .about("Generates shell completions.")
        .arg(
            clap::Arg::new("shell")
                .short('s')
                .long("shell")
                .help("Which shell to generate completions for.")
                .action(ArgAction::Set)
                .value_parser(value_parser!(Shell))
                .required(true),
        );
}

fn subcommand_config() -> Command {
    return Command::new("config")
        .about("Configuration file options.")
        .subcommand(
            Command::new("create").about("Saves the default config file to the configuration file path. This command will fail if the file exists already.")
        )
        .subcommand(
            Command::new("default").about("Outputs the default configuration file to stdout.")
        )
        .subcommand(
            Command::new("path").about("Returns the default path for the configuration file.")
        );
}

fn subcommand_debug() -> Command {
    return Command::new("debug")
        .about("Debug helpers for Guillemot")
        .hide(true)
        .subcommand(
            Command::new("log-path").about("Output path to debug log file generated when running Guillemot with environment variable RUST_LOG=guillemot")
        )
        .subcommand(
            Command::new("enum-config").about("List all config keys as strings.")
        );
}

fn subcommand_optimade() -> Command {
    return Command::new("optimade")
        .about("Searches an OPTIMADE database and saves the matching structures as CIF files.")
        .arg(
            Arg::new("database")
                .short('d')
                .long("database")
                .help("Database to query.")
                .num_args(1)
                .required(true)
                .value_parser(PossibleValuesParser::new(Database::VARIANTS)),
        )
        .arg(
            Arg::new("elements")
                .short('e')
                .long("elements")
                .help("Comma separated element symbols. Matches structures made of exactly these elements.")
                .num_args(1)
                .value_delimiter(','),
        )
        .arg(
            Arg::new("formula")
                .short('f')
                .long("formula")
                .help("Chemical formula, e.g. NaCoO2. Not supported by cod.")
                .num_args(1),
        )
        .arg(
            Arg::new("filter")
                .long("filter")
                .help("Raw OPTIMADE filter. Takes precedence over --elements and --formula.")
                .num_args(1),
        )
        .group(
            ArgGroup::new("query")
                .args(["elements", "formula", "filter"])
                .multiple(true)
                .required(true),
        );
}

fn subcommand_plot() -> Command {
    return Command::new("plot")
        .about("Plots a refinement results table.")
        .arg(
            Arg::new("output-file")
                .short('o')
                .long("output-file")
                .help("Results table with columns 2θ, observed and calculated.")
                .num_args(1)
                .required(true),
        )
        .arg(
            Arg::new("save-path")
                .short('s')
                .long("save-path")
                .help("Where to write the image. Paths ending in .svg produce SVG, anything else PNG.")
                .num_args(1)
                .required(true),
        )
        .arg(
            Arg::new("hkl-file")
                .long("hkl-file")
                .help("Reflection list used for tick marks.")
                .num_args(1),
        )
        .arg(
            Arg::new("x-range")
                .short('x')
                .long("x-range")
                .help("2θ window to zoom into, as min,max.")
                .num_args(1)
                .value_delimiter(',')
                .value_parser(value_parser!(f64))
                .conflicts_with("multi-panel"),
        )
        .arg(
            Arg::new("multi-panel")
                .long("multi-panel")
                .help("Plot the full range next to three automatically chosen zoom regions.")
                .action(ArgAction::SetTrue),
        );
}

fn arg_config(key: ConfigKey, env_name: &'static str, help: &str) -> Arg {
    let default = Config::default(key);
    let help = if default.is_empty() {
        help.to_string()
    } else {
        format!("{help} [default: {default}]")
    };

    return Arg::new(key.to_string())
        .long(key.to_string())
        .env(env_name)
        .num_args(1)
        .help(help)
        .global(true);
}

fn arg_secret(key: ConfigKey, env_name: &'static str, help: &str) -> Arg {
    return arg_config(key, env_name, help).hide_env_values(true);
}

fn subcommand_chat() -> Command {
    return Command::new("chat").about("Start a refinement chat session. This is the default.");
}

pub fn build() -> Command {
    let about = format!(
        "{}\n\nVersion: {}\nCommit: {}",
        env!("CARGO_PKG_DESCRIPTION"),
        env!("CARGO_PKG_VERSION"),
        env!("VERGEN_GIT_DESCRIBE")
    );

    return Command::new("guillemot")
        .about(about)
        .author(env!("CARGO_PKG_AUTHORS"))
        .version(env!("CARGO_PKG_VERSION"))
        .arg_required_else_help(false)
        .subcommand(subcommand_chat())
        .subcommand(subcommand_completions())
        .subcommand(subcommand_config())
        .subcommand(subcommand_debug())
        .subcommand(subcommand_optimade())
        .subcommand(subcommand_plot())
        .arg(
            arg_config(ConfigKey::Model, "GUILLEMOT_AI_MODEL", "Gemini model driving the agent.")
                .short('m'),
        )
        .arg(
            Arg::new(ConfigKey::ConfigFile.to_string())
                .short('c')
                .long(ConfigKey::ConfigFile.to_string())
                .env("GUILLEMOT_CONFIG_FILE")
                .num_args(1)
                .help(format!("Path to configuration file [default: {}]", Config::default(ConfigKey::ConfigFile)))
                .global(true)
        )
        .arg(arg_secret(
            ConfigKey::GeminiToken,
            "GEMINI_API_KEY",
            "Gemini API key.",
        ))
        .arg(arg_config(
            ConfigKey::GeminiURL,
            "GUILLEMOT_GEMINI_URL",
            "Gemini API URL. Can be swapped to a compatible proxy.",
        ))
        .arg(arg_secret(
            ConfigKey::TelemetryToken,
            "LOGFIRE_TOKEN",
            "Telemetry token. When set, structured traces are written to the debug log.",
        ))
        .arg(arg_config(
            ConfigKey::TopasExecutable,
            "GUILLEMOT_TOPAS_EXECUTABLE",
            "Path to the TOPAS command line executable.",
        ))
        .arg(arg_config(
            ConfigKey::RunDir,
            "GUILLEMOT_RUN_DIR",
            "Directory refinement input files are written to.",
        ))
        .arg(arg_config(
            ConfigKey::CifDir,
            "GUILLEMOT_CIF_DIR",
            "Directory CIF files from structure searches are written to.",
        ))
        .arg(arg_config(
            ConfigKey::RefinementTimeout,
            "GUILLEMOT_REFINEMENT_TIMEOUT",
            "Seconds a refinement may run before it is killed.",
        ))
        .arg(arg_config(
            ConfigKey::MaxRetries,
            "GUILLEMOT_MAX_RETRIES",
            "Times the model may retry a tool call that asked for corrections.",
        ))
        .arg(arg_config(
            ConfigKey::ExampleInput,
            "GUILLEMOT_EXAMPLE_INPUT",
            "Example refinement input included in the system prompt.",
        ));
}

/// Parses the command line and runs one-shot subcommands. Returns true when
/// the chat loop should start.
pub async fn parse() -> Result<bool> {
    let matches = build().get_matches();

    match matches.subcommand() {
        Some(("debug", debug_matches)) => {
            match debug_matches.subcommand() {
                Some(("log-path", _)) => {
                    println!("{}", log_dir().join("debug.log").to_string_lossy());
                }
                Some(("enum-config", _)) => {
                    println!("{}", ConfigKey::VARIANTS.join("\n"));
                }
                _ => {
                    subcommand_debug().print_long_help()?;
                }
            }

            return Ok(false);
        }
        Some(("chat", subcmd_matches)) => {
            Config::load(vec![&matches, subcmd_matches]).await?;
        }
        Some(("completions", subcmd_matches)) => {
            if let Some(completions) = subcmd_matches.get_one::<Shell>("shell").copied() {
                let mut app = build();
                print_completions(completions, &mut app);
            }
            return Ok(false);
        }
        Some(("config", subcmd_matches)) => match subcmd_matches.subcommand() {
            Some(("create", _)) => {
                create_config_file().await?;
                return Ok(false);
            }
            Some(("default", _)) => {
                println!("{}", Config::serialize_default(build()));
                return Ok(false);
            }
            Some(("path", _)) => {
                println!("{}", Config::default(ConfigKey::ConfigFile));
                return Ok(false);
            }
            _ => {
                subcommand_config().print_long_help()?;
                return Ok(false);
            }
        },
        Some(("optimade", subcmd_matches)) => {
            Config::load(vec![&matches, subcmd_matches]).await?;
            run_optimade(subcmd_matches).await?;
            return Ok(false);
        }
        Some(("plot", subcmd_matches)) => {
            Config::load(vec![&matches, subcmd_matches]).await?;
            run_plot(subcmd_matches).await?;
            return Ok(false);
        }
        _ => {
            Config::load(vec![&matches]).await?;
        }
    }

    return Ok(true);
}
