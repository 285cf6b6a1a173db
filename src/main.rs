#![deny(clippy::implicit_return)]
#![allow(clippy::needless_return)]

mod application;
mod configuration;
mod domain;
mod infrastructure;

use std::env;
use std::process;

use anyhow::Error;
use anyhow::Result;
use owo_colors::OwoColorize;
use tracing_appender::non_blocking::NonBlocking;

use crate::application::cli;
use crate::application::repl::Repl;
use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::Backend;
use crate::domain::services::agent::load_example_input;
use crate::domain::services::agent::system_prompt;
use crate::domain::services::agent::Agent;
use crate::infrastructure::backends::gemini::Gemini;
use crate::infrastructure::tools::default_registry;

fn handle_error(err: Error) {
    eprintln!(
        "{}",
        format!(
            "Oh no! Guillemot has failed with the following app version and error.\n\nVersion: {}\nCommit: {}\nError: {:#}",
            env!("CARGO_PKG_VERSION"),
            env!("VERGEN_GIT_DESCRIBE"),
            err
        )
        .red()
    );

    let backtrace = err.backtrace();
    if backtrace.to_string() == "disabled backtrace" {
        let args = env::args().collect::<Vec<String>>().join(" ");
        eprintln!("\nPlease check your .env file and ensure GEMINI_API_KEY is set correctly.");
        eprintln!("\nOtherwise, running the following can help explain further what the issue is:");
        eprintln!("\nRUST_BACKTRACE=1 {args}");
    } else {
        eprintln!("\n{}", backtrace);
    }

    process::exit(1);
}

/// Structured logs are written when debugging is requested through
/// `RUST_LOG` or a telemetry token is present in the environment. A token
/// that only appears in the config file is picked up once config is loaded.
fn tracing_requested() -> bool {
    let rust_log = env::var("RUST_LOG").unwrap_or_default();
    let telemetry_token = env::var("LOGFIRE_TOKEN").unwrap_or_default();

    return rust_log.contains("guillemot") || !telemetry_token.is_empty();
}

fn init_tracing(writer: NonBlocking) {
    tracing_subscriber::fmt()
        .json()
        .with_max_level(tracing::Level::DEBUG)
        .with_writer(writer)
        .init();
}

async fn start_chat() -> Result<()> {
    let backend = Gemini::default();
    backend.health_check().await?;

    let example = load_example_input(&Config::get(ConfigKey::ExampleInput)).await;
    let agent = Agent::new(
        Box::new(backend),
        default_registry(),
        &system_prompt(example.as_deref()),
        Config::get_u64(ConfigKey::MaxRetries),
    );

    tracing::info!(model = %Config::get(ConfigKey::Model), "Chat session started");
    return Repl::new(agent).run_stdin().await;
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    std::panic::set_hook(Box::new(|panic_info| {
        better_panic::Settings::auto().create_panic_handler()(panic_info);
    }));

    let file_appender = tracing_appender::rolling::never(cli::log_dir(), "debug.log");
    let (writer, _guard) = tracing_appender::non_blocking(file_appender);
    let tracing_ready = tracing_requested();
    if tracing_ready {
        init_tracing(writer.clone());
    }

    match cli::parse().await {
        Ok(true) => {}
        Ok(false) => process::exit(0),
        Err(err) => {
            handle_error(err);
            return;
        }
    }

    if !tracing_ready && Config::telemetry_enabled() {
        init_tracing(writer);
    }

    if let Err(err) = start_chat().await {
        handle_error(err);
    }

    process::exit(0);
}
