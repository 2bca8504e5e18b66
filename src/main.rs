//! Command-line front end for the dispatcher.
//!
//! Sends every URL concurrently through one dispatcher and prints each event as a JSON
//! line on stdout. Exits with status 1 if any request failed, 2 on setup errors.

use std::collections::HashSet;
use std::error::Error;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, ValueEnum};
use serde_json::{json, Value};
use url::Url;

use outbound_dispatcher::config::{load_config, ProxyConfig, ProxyKind};
use outbound_dispatcher::observability::{logging, metrics};
use outbound_dispatcher::{
    CorrelationId, DispatchEvent, Dispatcher, DispatcherConfig, Method, RequestHeaders,
};

#[derive(Parser)]
#[command(name = "outbound-dispatcher")]
#[command(about = "Send HTTP(S) requests through a pooled, proxy-aware dispatcher", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Request method
    #[arg(short = 'X', long = "request", value_enum, default_value_t = MethodArg::Get)]
    method: MethodArg,

    /// Extra header, `Name: value` (repeatable)
    #[arg(short = 'H', long = "header")]
    headers: Vec<String>,

    /// Request body
    #[arg(short, long)]
    data: Option<String>,

    /// Server user name
    #[arg(long)]
    user: Option<String>,

    /// Server password
    #[arg(long, requires = "user")]
    password: Option<String>,

    /// Route through an HTTP proxy, `host:port` (repeatable, adds to the config file)
    #[arg(long = "proxy")]
    proxies: Vec<String>,

    /// Report certificate problems as warnings instead of failing
    #[arg(short = 'k', long)]
    insecure: bool,

    /// Target URLs
    #[arg(required = true)]
    urls: Vec<Url>,
}

#[derive(Clone, Copy, ValueEnum)]
enum MethodArg {
    Get,
    Post,
}

impl From<MethodArg> for Method {
    fn from(arg: MethodArg) -> Self {
        match arg {
            MethodArg::Get => Method::Get,
            MethodArg::Post => Method::Post,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(1),
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(2)
        }
    }
}

/// Returns whether every request succeeded.
async fn run(cli: Cli) -> Result<bool, Box<dyn Error>> {
    if let Some(url) = cli.urls.iter().find(|u| !matches!(u.scheme(), "http" | "https")) {
        return Err(format!("only http and https URLs are supported, got '{}'", url).into());
    }

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => DispatcherConfig::default(),
    };
    if cli.insecure {
        config.tls.accept_invalid_certs = true;
    }
    for proxy in &cli.proxies {
        config.proxies.push(parse_proxy(proxy)?);
    }

    logging::init_logging(&config.observability)?;
    if config.observability.metrics_enabled {
        let addr: SocketAddr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let (dispatcher, mut events) = Dispatcher::builder(config).build()?;
    if let Some(user) = cli.user {
        dispatcher.set_credentials(user, cli.password.unwrap_or_default());
    }

    let headers = parse_headers(&cli.headers)?;
    let body = cli.data.unwrap_or_default();
    let method = Method::from(cli.method);

    let mut pending: HashSet<CorrelationId> = HashSet::new();
    for url in cli.urls {
        pending.insert(dispatcher.send(url, method, headers.clone(), body.clone()));
    }

    let mut all_ok = true;
    while !pending.is_empty() {
        let Some(event) = events.recv().await else {
            break;
        };
        println!("{}", event_json(&event));
        if let Some(id) = event.id().filter(|_| event.is_terminal()) {
            pending.remove(&id);
        }
        if matches!(event, DispatchEvent::Failure { .. }) {
            all_ok = false;
        }
    }

    Ok(all_ok)
}

fn parse_headers(raw: &[String]) -> Result<RequestHeaders, String> {
    raw.iter()
        .map(|h| {
            h.split_once(':')
                .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
                .ok_or_else(|| format!("header must look like 'Name: value', got '{}'", h))
        })
        .collect::<Result<Vec<(String, String)>, _>>()
        .map(|pairs| pairs.into_iter().collect())
}

fn parse_proxy(raw: &str) -> Result<ProxyConfig, String> {
    let (host, port) = raw
        .rsplit_once(':')
        .ok_or_else(|| format!("proxy must look like 'host:port', got '{}'", raw))?;
    let port = port
        .parse()
        .map_err(|_| format!("invalid proxy port in '{}'", raw))?;
    Ok(ProxyConfig {
        host: host.to_string(),
        port,
        kind: ProxyKind::Http,
        username: None,
        password: None,
    })
}

fn event_json(event: &DispatchEvent) -> Value {
    match event {
        DispatchEvent::Success { id, body } => json!({
            "event": "success",
            "id": id.as_u64(),
            "body": String::from_utf8_lossy(body),
        }),
        DispatchEvent::Failure {
            id,
            kind,
            upstream_status,
            message,
        } => json!({
            "event": "failure",
            "id": id.as_u64(),
            "kind": kind.as_str(),
            "upstream_status": upstream_status,
            "message": message,
        }),
        DispatchEvent::Log { id, severity, message } => json!({
            "event": "log",
            "id": id.map(|i| i.as_u64()),
            "severity": severity.as_str(),
            "message": message,
        }),
    }
}
