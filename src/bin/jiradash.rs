use std::io::{BufRead, IsTerminal};
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

#[derive(Parser)]
#[command(
    name = "jiradash",
    about = "Get Jira filter counts, field sums and sprint velocity and add them to the dashboard DB"
)]
struct Cli {
    /// Authenticate with Jira using this user
    #[arg(short, long)]
    user: Option<String>,

    /// Print the collected values instead of writing them
    #[arg(long)]
    dry_run: bool,

    /// With --dry-run, print the values as JSON
    #[arg(long)]
    json: bool,

    /// Config file (default: ~/.jiradash/config.toml if present)
    #[arg(long, env = "JIRADASH_CONFIG")]
    config: Option<PathBuf>,

    /// Override the Jira base URL
    #[arg(long)]
    jira_url: Option<String>,

    /// Override the InfluxDB write URL
    #[arg(long)]
    influx_url: Option<String>,

    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

/// Prompt on the terminal, or read one line from stdin when it is not a terminal.
fn read_password() -> anyhow::Result<String> {
    if std::io::stdin().is_terminal() {
        let password = dialoguer::Password::new()
            .with_prompt("Password")
            .allow_empty_password(true)
            .interact()
            .context("failed to read password")?;
        return Ok(password);
    }

    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("failed to read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn load_config(cli: &Cli) -> anyhow::Result<jiradash::Config> {
    let mut config = jiradash::Config::load(cli.config.as_deref())?;
    if let Some(url) = &cli.jira_url {
        config.jira_url = url.clone();
    }
    if let Some(url) = &cli.influx_url {
        config.influx_write_url = url.clone();
    }
    config.validate()?;
    Ok(config)
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = load_config(&cli)?;

    let credentials = match &cli.user {
        Some(user) => Some(jiradash::Credentials::new(user, read_password()?)),
        None => None,
    };

    let client = jiradash::JiraClient::connect(&config.jira_url, credentials)
        .await?
        .with_page_size(config.page_size);
    let writer = jiradash::InfluxWriter::new(&config.influx_write_url)?;
    let dash = jiradash::JiraDash::new(config, Box::new(client));

    let report = dash.run(&writer, cli.dry_run).await?;
    if cli.dry_run {
        print_values(&report.values, cli.json)?;
    }
    Ok(())
}

fn print_values(values: &jiradash::MetricSet, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(values)?);
        return Ok(());
    }
    println!("---");
    println!("Retrieved the following values:");
    for (key, value) in values {
        println!("  {key} = {value}");
    }
    Ok(())
}

/// Exit status for a failed run: the crate error's code when there is one.
fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<jiradash::Error>()
        .map(jiradash::Error::exit_code)
        .unwrap_or(1)
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    if let Err(e) = run(cli).await {
        eprintln!("error: {e:#}");
        std::process::exit(exit_code(&e));
    }
}
