//! DevTools demo: drives a simulated app and prints what the panels captured.

use anyhow::Result;
use clap::Parser;
use devtools::{DevTools, DevToolsConfig, NETWORK_PANEL};
use devtools_console::{interceptor as console, LogFilter, LogLevel};
use devtools_network::{
    OpenOptions, RequestBody, RequestRecord, ResponseKind, ScriptedResponse, SimulatedFactory, TransportFactory,
};
use devtools_runtime::EventLoop;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn, Level};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::FmtSubscriber;

/// In-app DevTools demo
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Number of GET requests the demo app issues
    #[arg(short, long, default_value = "5")]
    requests: usize,

    /// Simulated response latency in milliseconds
    #[arg(long, default_value = "60")]
    latency_ms: u64,

    /// How long to run the event loop, in milliseconds
    #[arg(long, default_value = "500")]
    run_ms: u64,

    /// Only list requests whose URL matches this pattern
    #[arg(long)]
    filter: Option<String>,

    /// Only list console entries at this level
    #[arg(long)]
    level: Option<LogLevel>,

    /// Print captured requests as JSON
    #[arg(long)]
    json: bool,

    /// Print a cURL command per request
    #[arg(long)]
    curl: bool,

    /// Disable console capture
    #[arg(long)]
    no_console: bool,

    /// Disable network capture
    #[arg(long)]
    no_network: bool,

    /// Clear the network panel before exiting
    #[arg(long)]
    clear: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn config(&self) -> DevToolsConfig {
        DevToolsConfig::new()
            .with_console_capture(!self.no_console)
            .with_network_capture(!self.no_network)
    }
}

fn respond(latency: Duration) -> impl Fn(&str, &str) -> ScriptedResponse + Send + Sync + 'static {
    move |method: &str, url: &str| {
        let response = if url.contains("/missing") {
            ScriptedResponse::text(404, "not found")
        } else if url.contains("/avatar") {
            ScriptedResponse::bytes(200, ResponseKind::Blob, vec![0x89, 0x50, 0x4e, 0x47])
        } else if method.eq_ignore_ascii_case("POST") {
            ScriptedResponse::json(201, json!({"created": true}))
        } else {
            ScriptedResponse::json(200, json!({"url": url, "ok": true})).with_header("X-Demo", "1")
        };
        response.with_latency(latency)
    }
}

fn issue(factory: &Arc<dyn TransportFactory>, method: &str, url: &str, body: Option<RequestBody>) -> Result<()> {
    let transport = factory.create();
    transport.open(method, url, OpenOptions::default())?;
    transport.set_request_header("Accept", "application/json")?;
    transport.send(body)?;
    Ok(())
}

fn print_request(record: &RequestRecord, curl: bool) {
    println!(
        "  #{:<3} {:<6} {:<4} {:>8}  {}",
        record.index,
        record.method,
        record.status.to_string(),
        record.cost_time_label(),
        record.url
    );
    if curl {
        println!("        {}", record.to_curl());
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut event_loop = EventLoop::new();
    let devtools = DevTools::new(event_loop.scheduler(), args.config());

    // Initialize logging
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish()
        .with(devtools.capture_layer());
    tracing::subscriber::set_global_default(subscriber)?;

    info!("DevTools demo v{}", devtools::VERSION);
    devtools.install()?;

    let latency = Duration::from_millis(args.latency_ms);
    let factory = devtools.transport_factory(SimulatedFactory::new(event_loop.scheduler(), respond(latency)));

    console::log(&[json!("demo app started"), json!({"requests": args.requests})]);
    for i in 0..args.requests {
        issue(&factory, "GET", &format!("https://api.example.com/items?page={}&tag=a%20b", i + 1), None)?;
    }
    issue(
        &factory,
        "post",
        "https://api.example.com/items",
        Some(RequestBody::Json(json!({"name": "widget"}))),
    )?;
    issue(&factory, "GET", "https://api.example.com/missing", None)?;
    issue(&factory, "GET", "https://cdn.example.com/avatar.png", None)?;

    let hidden = factory.create();
    hidden.open("GET", "https://api.example.com/health", OpenOptions::uncaptured())?;
    hidden.send(None)?;

    console::warn(&[json!("slow network"), json!(args.latency_ms)]);
    warn!(target: "demo_app", latency_ms = args.latency_ms, "simulated latency");

    event_loop.run_for(Duration::from_millis(args.run_ms)).await?;

    let requests = match &args.filter {
        Some(pattern) => devtools.requests().filter_by_url(pattern)?,
        None => devtools.requests().get_requests(),
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&requests)?);
    } else {
        println!("Network ({} captured):", requests.len());
        for record in &requests {
            print_request(record, args.curl);
        }
    }

    let filter = match args.level {
        Some(level) => LogFilter::all().level(level),
        None => LogFilter::all(),
    };
    let logs = devtools.logs().filter_logs(&filter);
    println!("Console ({} captured):", logs.len());
    for entry in &logs {
        println!("  #{:<3} {:<5} {}", entry.index, entry.level.as_str(), entry.message());
    }

    if args.clear {
        devtools.clear_panel(NETWORK_PANEL);
        println!("Network panel cleared, {} left", devtools.requests().len());
    }

    devtools.uninstall()?;
    event_loop.stop();
    Ok(())
}
