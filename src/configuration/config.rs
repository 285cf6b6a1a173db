#[cfg(test)]
#[path = "config_test.rs"]
mod tests;

use std::path;

use anyhow::bail;
use anyhow::Result;
use clap::ArgMatches;
use clap::Command;
use dashmap::DashMap;
use once_cell::sync::Lazy;
use strum::EnumIter;
use strum::EnumVariantNames;
use strum::IntoEnumIterator;
use tokio::fs;

static CONFIG: Lazy<DashMap<String, String>> = Lazy::new(DashMap::new);

#[derive(Clone, Copy, Debug, Eq, PartialEq, EnumIter, EnumVariantNames, strum::Display)]
#[strum(serialize_all = "kebab-case")]
pub enum ConfigKey {
    CifDir,
    ConfigFile,
    ExampleInput,
    GeminiToken,
    GeminiURL,
    MaxRetries,
    Model,
    RefinementTimeout,
    RunDir,
    TelemetryToken,
    TopasExecutable,
}

pub struct Config {}

impl Config {
    pub fn get(key: ConfigKey) -> String {
        if let Some(val) = CONFIG.get(&key.to_string()) {
            return val.to_string();
        }

        return "".to_string();
    }

    /// Reads a numeric key, falling back to its default when the configured
    /// value does not parse.
    pub fn get_u64(key: ConfigKey) -> u64 {
        if let Ok(val) = Config::get(key).parse::<u64>() {
            return val;
        }

        return Config::default(key).parse::<u64>().unwrap_or(0);
    }

    /// A telemetry token from any config source turns on structured logs.
    pub fn telemetry_enabled() -> bool {
        return !Config::get(ConfigKey::TelemetryToken).is_empty();
    }

    pub fn set(key: ConfigKey, value: &str) {
        CONFIG.insert(key.to_string(), value.to_string());
    }

    pub fn default(key: ConfigKey) -> String {
        let config_path = dirs::config_dir()
            .unwrap_or_else(|| return path::PathBuf::from("."))
            .join("guillemot/config.toml");

        let res = match key {
            ConfigKey::CifDir => "cifs",
            ConfigKey::ExampleInput => "examples/NaCoO2/example_refinement_NaCoO2.inp",
            ConfigKey::GeminiToken => "",
            ConfigKey::GeminiURL => "https://generativelanguage.googleapis.com",
            ConfigKey::MaxRetries => "5",
            ConfigKey::Model => "gemini-2.5-flash-lite",
            ConfigKey::RefinementTimeout => "60",
            ConfigKey::RunDir => "run_dir",
            ConfigKey::TelemetryToken => "",
            ConfigKey::TopasExecutable => r"\Science\Topas-7\tc.exe",

            // Special
            ConfigKey::ConfigFile => return config_path.to_string_lossy().to_string(),
        };

        return res.to_string();
    }

    pub async fn load(clap_arg_matches: Vec<&ArgMatches>) -> Result<()> {
        for key in ConfigKey::iter() {
            Config::set(key, &Config::default(key))
        }

        let mut config_file = Config::default(ConfigKey::ConfigFile);
        for matches in clap_arg_matches.as_slice() {
            if let Ok(Some(arg_config_file)) =
                matches.try_get_one::<String>(&ConfigKey::ConfigFile.to_string())
            {
                config_file = arg_config_file.to_string();
            }
        }

        let config_path = path::PathBuf::from(config_file);
        if config_path.exists() {
            let toml_str = fs::read_to_string(config_path).await?;
            let doc = toml_str.parse::<toml_edit::Document>()?;

            for key in ConfigKey::iter() {
                if let Some(val) = doc.get(&key.to_string()) {
                    if let Some(val_int) = val.as_integer() {
                        if val_int < 0 {
                            bail!(format!(
                                "config.toml has an invalid value for key '{key}': {val_int}"
                            ));
                        }
                        Config::set(key, &val_int.to_string());
                    } else if let Some(val_str) = val.as_str() {
                        if val_str.is_empty() {
                            continue;
                        }
                        Config::set(key, val_str);
                    } else {
                        bail!(format!(
                            "config.toml has an invalid value for key '{key}', expected a string or integer"
                        ));
                    }
                }
            }
        }

        for key in ConfigKey::iter() {
            for matches in clap_arg_matches.as_slice() {
                if let Ok(Some(val)) = matches.try_get_one::<String>(&key.to_string()) {
                    if val.is_empty() {
                        continue;
                    }
                    Config::set(key, val)
                }
            }
        }

        for key in [ConfigKey::MaxRetries, ConfigKey::RefinementTimeout] {
            if Config::get(key).parse::<u64>().is_err() {
                bail!(format!(
                    "{key} must be a positive integer, got '{}'",
                    Config::get(key)
                ));
            }
        }

        tracing::debug!(
            model = %Config::get(ConfigKey::Model),
            run_dir = %Config::get(ConfigKey::RunDir),
            cif_dir = %Config::get(ConfigKey::CifDir),
            topas_executable = %Config::get(ConfigKey::TopasExecutable),
            refinement_timeout = %Config::get(ConfigKey::RefinementTimeout),
            max_retries = %Config::get(ConfigKey::MaxRetries),
            "config"
        );

        return Ok(());
    }

    pub fn serialize_default(cmd: Command) -> String {
        let toml_str = ConfigKey::iter()
            .filter_map(|key| {
                if key == ConfigKey::ConfigFile {
                    return None;
                }

                let description = match cmd
                    .get_arguments()
                    .find(|e| return e.get_long() == Some(key.to_string().as_str()))
                    .and_then(|arg| return arg.get_help())
                {
                    Some(help) => help
                        .to_string()
                        .split("[default:")
                        .next()
                        .unwrap_or_default()
                        .trim()
                        .to_string(),
                    None => return None,
                };

                let mut val = Config::default(key);
                if val.is_empty() {
                    val = format!("# {key} = \"\"");
                } else if val.parse::<i32>().is_ok() {
                    val = format!("{key} = {val}");
                } else {
                    val = format!("{key} = {val:?}");
                }

                return Some(format!("# {description}\n{val}"));
            })
            .collect::<Vec<String>>()
            .join("\n\n");

        return toml_str;
    }
}
