//! Subcommand implementations.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result, bail};
use clap::Args;
use vedavoice_core::impls::{FileStore, NetworkProbe, NetworkStatus, ProbeTarget, ReqwestTransport};
use vedavoice_core::ports::{Clock, HttpTransport, NetworkStatusProvider, SystemClock};
use vedavoice_core::{
    DrainWorker, NewRequest, Priority, QueueConfig, RequestId, RetryQueue, RetryQueueBuilder,
};

#[derive(Args, Debug)]
pub struct AddArgs {
    /// Target URL
    #[arg(long)]
    pub url: String,

    /// HTTP method
    #[arg(short = 'X', long, default_value = "POST")]
    pub method: String,

    /// Request body (sent as-is)
    #[arg(short, long)]
    pub body: Option<String>,

    /// Header as `Name: value`; repeatable
    #[arg(short = 'H', long = "header")]
    pub headers: Vec<String>,

    /// high | normal | low
    #[arg(short, long)]
    pub priority: Option<Priority>,

    /// Attempts before giving up (default from config)
    #[arg(long)]
    pub max_retries: Option<u32>,
}

/// Everything a subcommand needs: the loaded queue plus the pieces `run`
/// wires into background tasks.
pub struct Context {
    queue: RetryQueue,
    network: NetworkStatus,
    probe: Option<(ProbeTarget, Duration)>,
}

impl Context {
    /// Open the queue under `data_dir`. Holds the directory's writer lock
    /// until dropped, so a second process fails here instead of clobbering.
    pub fn open(config: &QueueConfig, data_dir: PathBuf) -> Result<Self> {
        let store = FileStore::open(data_dir.clone()).with_context(|| {
            format!(
                "failed to open data directory {} (is `vedavoice run` using it?)",
                data_dir.display()
            )
        })?;
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        // Assume reachable until a probe says otherwise.
        let network = NetworkStatus::online();

        let mut transport = ReqwestTransport::new().context("failed to build HTTP client")?;
        if config.probe.is_some() {
            // the probe brings it back online
            transport = transport.reporting_to(network.clone());
        }
        let transport: Arc<dyn HttpTransport> = Arc::new(transport);
        let probe = config
            .probe
            .as_ref()
            .zip(config.probe_interval())
            .map(|(probe, interval)| {
                (
                    ProbeTarget::new(transport.clone(), probe.url.clone(), clock.clone()),
                    interval,
                )
            });

        let queue = RetryQueueBuilder::from_config(config)
            .store(Arc::new(store))
            .transport(transport)
            .network(Arc::new(network.clone()))
            .clock(clock)
            .build()?;
        tracing::debug!(data_dir = %data_dir.display(), pending = queue.len(), "queue opened");

        Ok(Self {
            queue,
            network,
            probe,
        })
    }

    /// Probe once (when configured) so the first drain sees the real
    /// network state. Returns whether the network is considered up.
    async fn check_network(&self) -> bool {
        let Some((target, _)) = &self.probe else {
            return self.network.is_online();
        };
        let online = target.refresh(&self.network).await;
        if !online {
            tracing::warn!(url = %target.url(), "probe unreachable, treating network as offline");
        }
        online
    }
}

pub fn add(ctx: &Context, args: AddArgs) -> Result<()> {
    let mut request = NewRequest::new(args.method.to_uppercase(), args.url);
    if let Some(body) = args.body {
        request = request.with_body(body);
    }
    for raw in &args.headers {
        let (name, value) = parse_header(raw)?;
        request = request.with_header(name, value);
    }
    if let Some(priority) = args.priority {
        request = request.with_priority(priority);
    }
    if let Some(max_retries) = args.max_retries {
        request = request.with_max_retries(max_retries);
    }

    let id = ctx.queue.add(request);
    println!("{id}");
    Ok(())
}

pub fn list(ctx: &Context, json: bool) -> Result<()> {
    let items = ctx.queue.get_all();
    if json {
        println!("{}", serde_json::to_string_pretty(&items)?);
        return Ok(());
    }
    if items.is_empty() {
        println!("queue is empty");
        return Ok(());
    }
    for item in items {
        println!(
            "{}  {:<6}  {} {}  retries {}/{}  queued {}",
            item.id,
            item.priority,
            item.method,
            item.url,
            item.retry_count,
            item.max_retries,
            item.timestamp.format("%Y-%m-%d %H:%M:%S"),
        );
    }
    Ok(())
}

pub fn status(ctx: &Context, json: bool) -> Result<()> {
    let status = ctx.queue.status();
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("{}", status.summary());
        if let Some(oldest) = status.oldest {
            println!("oldest: {}", oldest.format("%Y-%m-%d %H:%M:%S UTC"));
        }
    }
    Ok(())
}

pub fn remove(ctx: &Context, raw_id: &str) -> Result<()> {
    let id: RequestId = raw_id.parse()?;
    if !ctx.queue.remove(id) {
        bail!("no pending request with id {id}");
    }
    println!("removed {id}");
    Ok(())
}

pub fn clear(ctx: &Context) -> Result<()> {
    let dropped = ctx.queue.len();
    ctx.queue.clear();
    println!("dropped {dropped} pending request(s)");
    Ok(())
}

pub async fn drain(ctx: &Context) -> Result<()> {
    ctx.check_network().await;
    let report = ctx.queue.process_queue().await;
    if report.paused {
        println!(
            "network unreachable after delivering {}; {} still pending",
            report.delivered,
            ctx.queue.len()
        );
        return Ok(());
    }
    println!(
        "delivered {}, failed {}, retried {}, {} still pending",
        report.delivered,
        report.failed,
        report.retried,
        ctx.queue.len()
    );
    Ok(())
}

pub async fn run(ctx: &Context) -> Result<()> {
    // before the worker's startup drain
    ctx.check_network().await;
    let probe = ctx.probe.as_ref().map(|(target, interval)| {
        tracing::info!(url = %target.url(), ?interval, "network probe enabled");
        NetworkProbe::spawn(target.clone(), ctx.network.clone(), *interval)
    });
    let worker = DrainWorker::spawn(ctx.queue.clone());
    tracing::info!(status = %ctx.queue.status().summary(), "running, Ctrl-C to stop");

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;
    tracing::info!("shutting down");

    worker.shutdown_and_join().await;
    if let Some(probe) = probe {
        probe.shutdown_and_join().await;
    }
    Ok(())
}

/// `Name: value` -> (`Name`, `value`).
fn parse_header(raw: &str) -> Result<(&str, &str)> {
    let Some((name, value)) = raw.split_once(':') else {
        bail!("header must look like `Name: value`, got {raw:?}");
    };
    let name = name.trim();
    if name.is_empty() {
        bail!("header name is empty in {raw:?}");
    }
    Ok((name, value.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_split_on_first_colon() {
        assert_eq!(
            parse_header("Authorization: Bearer a:b").unwrap(),
            ("Authorization", "Bearer a:b")
        );
        assert_eq!(
            parse_header("X-Empty:").unwrap(),
            ("X-Empty", "")
        );
    }

    #[test]
    fn malformed_header_is_rejected() {
        assert!(parse_header("no-colon").is_err());
        assert!(parse_header(": value").is_err());
    }

    /// A loopback port nobody listens on.
    fn closed_port() -> u16 {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    }

    #[tokio::test]
    async fn drain_with_unreachable_probe_keeps_request() {
        let dir = tempfile::tempdir().unwrap();
        let port = closed_port();
        let config = QueueConfig::from_toml_str(&format!(
            "[probe]\nurl = \"http://127.0.0.1:{port}/health\"\n"
        ))
        .unwrap();
        let ctx = Context::open(&config, dir.path().to_path_buf()).unwrap();
        let id = ctx
            .queue
            .add(NewRequest::post(format!("http://127.0.0.1:{port}/api/sadhana")));

        drain(&ctx).await.unwrap();

        assert!(!ctx.network.is_online());
        let item = ctx.queue.get(id).expect("request kept while offline");
        assert_eq!(item.retry_count, 0);
    }

    #[tokio::test]
    async fn drain_without_probe_pauses_on_refused_connection() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = Context::open(&QueueConfig::default(), dir.path().to_path_buf()).unwrap();
        let id = ctx.queue.add(NewRequest::post(format!(
            "http://127.0.0.1:{}/api/sadhana",
            closed_port()
        )));

        drain(&ctx).await.unwrap();

        let item = ctx.queue.get(id).expect("request kept while host unreachable");
        assert_eq!(item.retry_count, 0);
    }

    #[test]
    fn second_process_on_same_data_dir_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let running = Context::open(&QueueConfig::default(), dir.path().to_path_buf()).unwrap();
        running.queue.add(NewRequest::post("https://vedavoice.example/from-run"));

        let err = Context::open(&QueueConfig::default(), dir.path().to_path_buf())
            .err()
            .expect("data dir is locked");
        assert!(format!("{err:#}").contains("in use by another writer"), "got {err:#}");

        drop(running);
        let reopened = Context::open(&QueueConfig::default(), dir.path().to_path_buf()).unwrap();
        assert_eq!(reopened.queue.len(), 1);
    }
}
