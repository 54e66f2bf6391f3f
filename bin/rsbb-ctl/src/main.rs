//! ---
//! rsbb_section: "05-networking-external-interfaces"
//! rsbb_subsection: "binary"
//! rsbb_type: "source"
//! rsbb_scope: "code"
//! rsbb_description: "Control CLI standing in for the referee box."
//! rsbb_version: "v0.1.0"
//! rsbb_owner: "tbd"
//! ---
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use rsbb_common::config::{AppConfig, ServiceConfig, TopicConfig};
use rsbb_common::logging::init_console;
use rsbb_common::version::VersionInfo;
use rsbb_msg::{BenchmarkSelector, MessagePayload, PhaseSignal};
use rsbb_net::{spawn_referee, RefereeStub};
use serde_json::Value;
use tokio::signal;
use tracing::info;

#[derive(Debug, Parser)]
#[command(
    author,
    disable_version_flag = true,
    about = "RSBB dummy robot control utility",
    long_about = None
)]
struct Cli {
    #[arg(
        short = 'V',
        long = "version",
        action = ArgAction::SetTrue,
        help = "Print extended version information and exit"
    )]
    version: bool,

    #[arg(
        long,
        env = "RSBB_BRIDGE",
        default_value = "http://127.0.0.1:7311",
        help = "Base URL of the robot's topic bridge"
    )]
    bridge: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    #[command(about = "Publish a benchmark selection (none, hgtkmh, hwv, hcfgac, hopf, hnf, hsuf)")]
    Select { selector: BenchmarkSelector },
    #[command(about = "Publish a benchmark phase (stop, prepare, execute)")]
    Phase { phase: PhaseSignal },
    #[command(about = "Show the robot's retained messages_saved announcement")]
    MessagesSaved,
    #[command(about = "Show the robot's health and active benchmark")]
    Status,
    #[command(about = "Serve end_prepare/end_execute until interrupted")]
    Referee {
        #[arg(long, default_value = "127.0.0.1:7400")]
        listen: SocketAddr,
        #[arg(
            long,
            value_name = "FILE",
            help = "Daemon configuration to take the service names from"
        )]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    init_console();
    let cli = Cli::parse();
    if cli.version {
        println!("{}", VersionInfo::current().extended());
        return Ok(());
    }
    let Some(command) = cli.command else {
        bail!("no command given; see --help");
    };

    let bridge = cli.bridge.trim_end_matches('/').to_owned();
    let topics = TopicConfig::default();
    let http = reqwest::Client::new();
    match command {
        Commands::Select { selector } => {
            publish(&http, &bridge, &topics.benchmark, MessagePayload::Benchmark(selector)).await?
        }
        Commands::Phase { phase } => {
            publish(
                &http,
                &bridge,
                &topics.benchmark_state,
                MessagePayload::BenchmarkState(phase),
            )
            .await?
        }
        Commands::MessagesSaved => {
            let url = format!("{bridge}/topics{}", topics.messages_saved);
            print_json(fetch(&http, &url).await?)?;
        }
        Commands::Status => {
            print_json(fetch(&http, &format!("{bridge}/healthz")).await?)?;
        }
        Commands::Referee { listen, config } => run_referee(listen, config.as_deref()).await?,
    }
    Ok(())
}

async fn publish(
    http: &reqwest::Client,
    bridge: &str,
    topic: &str,
    payload: MessagePayload,
) -> Result<()> {
    let url = format!("{bridge}/topics{topic}");
    let response = http
        .post(&url)
        .json(&payload)
        .send()
        .await
        .with_context(|| format!("failed to reach bridge at {url}"))?;
    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);
    if !status.is_success() {
        bail!("bridge rejected publish on {topic} ({status}): {body}");
    }
    info!(topic, "published");
    print_json(body)
}

async fn fetch(http: &reqwest::Client, url: &str) -> Result<Value> {
    let response = http
        .get(url)
        .send()
        .await
        .with_context(|| format!("failed to reach bridge at {url}"))?;
    let status = response.status();
    let body: Value = response.json().await.unwrap_or(Value::Null);
    if !status.is_success() {
        bail!("bridge returned {status} for {url}: {body}");
    }
    Ok(body)
}

fn print_json(value: Value) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(&value).context("failed to render response")?
    );
    Ok(())
}

fn referee_services(config: Option<&Path>) -> Result<ServiceConfig> {
    match config {
        Some(path) => Ok(AppConfig::from_path(path)?.services),
        None => Ok(ServiceConfig::default()),
    }
}

async fn run_referee(listen: SocketAddr, config: Option<&Path>) -> Result<()> {
    let services = referee_services(config)?;
    let server = spawn_referee(RefereeStub::accepting(&services), listen)?;
    info!(
        address = %server.addr(),
        end_prepare = %services.end_prepare,
        end_execute = %services.end_execute,
        "referee stub running; point services.referee_url here"
    );
    signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")?;
    server.shutdown().await
}
