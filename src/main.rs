//! gol-gateway CLI
//!
//! Entry point for the `gol-gateway` command-line tool.

use clap::{Args, Parser, Subcommand};
use gol_cluster::KubeClient;
use gol_gateway::config::{set_path, DEFAULT_CONFIG_PATH};
use gol_gateway::{
    shutdown, ConnectionHandler, EffectiveConfig, ElasticsearchSink, Listener, MetricsSink,
    NullSink, ShutdownState, SystemClock,
};
use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gol-gateway")]
#[command(about = "TCP gateway for Game of Life compute jobs on Kubernetes", version)]
struct Cli {
    /// Log level when RUST_LOG is unset
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gateway
    Serve {
        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Print the effective configuration as JSON
    Config {
        #[command(flatten)]
        config: ConfigArgs,
    },

    /// Send one request to a running gateway and print the replies
    Submit {
        /// Gateway address
        #[arg(long, default_value = "127.0.0.1:5000")]
        addr: String,

        /// Request line, e.g. "3,4" or "mpi,2,2"
        request: String,
    },
}

#[derive(Args)]
struct ConfigArgs {
    /// Config file (default: /etc/gol-gateway/gateway.toml when present)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Listen address
    #[arg(long)]
    bind: Option<String>,

    /// Seconds between job status reads
    #[arg(long)]
    poll_interval: Option<u64>,

    /// Seconds before a job is abandoned
    #[arg(long)]
    poll_deadline: Option<u64>,

    /// Kubernetes API server URL (default: in-cluster discovery)
    #[arg(long)]
    api_server: Option<String>,

    /// Elasticsearch URL for metrics
    #[arg(long)]
    metrics_url: Option<String>,

    /// Disable metrics
    #[arg(long)]
    no_metrics: bool,

    /// Engine for two-field requests (spark, mpi)
    #[arg(long)]
    default_engine: Option<String>,
}

impl ConfigArgs {
    fn overrides(&self) -> Option<Value> {
        let mut overrides = Value::Null;
        if let Some(bind) = &self.bind {
            set_path(&mut overrides, "server.bind", json!(bind));
        }
        if let Some(interval) = self.poll_interval {
            set_path(&mut overrides, "poll.interval_seconds", json!(interval));
        }
        if let Some(deadline) = self.poll_deadline {
            set_path(&mut overrides, "poll.deadline_seconds", json!(deadline));
        }
        if let Some(url) = &self.api_server {
            set_path(&mut overrides, "cluster.api_server", json!(url));
        }
        if let Some(url) = &self.metrics_url {
            set_path(&mut overrides, "metrics.elasticsearch_url", json!(url));
        }
        if self.no_metrics {
            set_path(&mut overrides, "metrics.enabled", json!(false));
        }
        if let Some(engine) = &self.default_engine {
            set_path(&mut overrides, "server.default_engine", json!(engine.to_lowercase()));
        }
        if overrides.is_null() {
            None
        } else {
            Some(overrides)
        }
    }

    fn load(&self) -> EffectiveConfig {
        let default_path = Path::new(DEFAULT_CONFIG_PATH);
        let file = match &self.config {
            Some(path) => Some(path.as_path()),
            None if default_path.exists() => Some(default_path),
            None => None,
        };

        match EffectiveConfig::build(file, self.overrides()) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Error loading config: {}", e);
                process::exit(1);
            }
        }
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_thread_names(true)
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    match cli.command {
        Commands::Serve { config } => run_serve(config.load()),
        Commands::Config { config } => run_config(config.load()),
        Commands::Submit { addr, request } => run_submit(&addr, &request),
    }
}

fn run_serve(effective: EffectiveConfig) {
    let config = effective.settings;

    let kube_config = match config.cluster.kube_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Cluster configuration error: {}", e);
            process::exit(1);
        }
    };
    let cluster = match KubeClient::new(kube_config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error creating cluster client: {}", e);
            process::exit(1);
        }
    };
    info!(api_server = %cluster.api_server(), "cluster client ready");

    let metrics: Arc<dyn MetricsSink> = if config.metrics.enabled {
        match ElasticsearchSink::new(
            &config.metrics.elasticsearch_url,
            &config.metrics.index,
            config.metrics.timeout(),
        ) {
            Ok(sink) => {
                // The gateway runs without the metrics backend; events are dropped.
                if let Err(e) = sink.ensure_index() {
                    warn!(error = %e, url = %config.metrics.elasticsearch_url, "metrics index check failed");
                }
                Arc::new(sink)
            }
            Err(e) => {
                warn!(error = %e, "metrics disabled: could not create sink");
                Arc::new(NullSink)
            }
        }
    } else {
        info!("metrics disabled");
        Arc::new(NullSink)
    };

    let handler = match ConnectionHandler::new(
        &config,
        Arc::new(cluster),
        metrics,
        Arc::new(SystemClock),
    ) {
        Ok(h) => Arc::new(h),
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            process::exit(1);
        }
    };

    let shutdown_state = Arc::new(ShutdownState::new());
    if let Err(e) = shutdown::install(Arc::clone(&shutdown_state)) {
        eprintln!("Error installing signal handler: {}", e);
        process::exit(1);
    }

    let listener = match Listener::bind(
        config.server.bind.as_str(),
        handler,
        shutdown_state,
        config.server.read_timeout(),
    ) {
        Ok(l) => l,
        Err(e) => {
            eprintln!("Error binding {}: {}", config.server.bind, e);
            process::exit(1);
        }
    };

    if let Err(e) = listener.run() {
        eprintln!("Listener error: {}", e);
        process::exit(1);
    }
}

fn run_config(effective: EffectiveConfig) {
    match effective.to_json() {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error serializing output: {}", e);
            process::exit(1);
        }
    }
}

fn run_submit(addr: &str, request: &str) {
    let mut stream = match TcpStream::connect(addr) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Error connecting to {}: {}", addr, e);
            process::exit(1);
        }
    };

    if let Err(e) = writeln!(stream, "{}", request.trim()).and_then(|_| stream.flush()) {
        eprintln!("Error sending request: {}", e);
        process::exit(1);
    }

    let mut failed = false;
    for line in BufReader::new(stream).lines() {
        match line {
            Ok(line) => {
                if line.starts_with("ERROR ") || line.contains(" failed with state ") {
                    failed = true;
                }
                println!("{}", line);
            }
            Err(e) => {
                eprintln!("Error reading reply: {}", e);
                process::exit(1);
            }
        }
    }

    if failed {
        process::exit(1);
    }
}
