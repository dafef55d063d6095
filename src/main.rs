use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, Mutex};
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use causeway_config::load_config;
use causeway_device::{HttpDiscovery, SimctlEnumerator};
use causeway_relay::AdapterCollection;

type Collection = AdapterCollection<HttpDiscovery, SimctlEnumerator>;

const USAGE: &str = "usage: causeway [--config <path>] [--port <port>]";

struct CliArgs {
    config: PathBuf,
    port: Option<u16>,
}

fn parse_args() -> Result<CliArgs> {
    let mut args = env::args().skip(1);
    let mut config = PathBuf::from("causeway.toml");
    let mut port = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--config" => {
                config = args
                    .next()
                    .map(PathBuf::from)
                    .context("--config requires a path")?;
            }
            "--port" => {
                let value = args.next().context("--port requires a port number")?;
                port = Some(
                    value
                        .parse()
                        .with_context(|| format!("invalid port: {value}"))?,
                );
            }
            "-h" | "--help" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            other => bail!("unknown argument: {other}\n{USAGE}"),
        }
    }

    Ok(CliArgs { config, port })
}

/// Locate the forwarding proxy on PATH. The proxy is required but never
/// spawned or managed here.
fn find_proxy_executable() -> Option<PathBuf> {
    let path = env::var_os("PATH")?;
    env::split_paths(&path)
        .map(|dir| dir.join("ios_webkit_debug_proxy"))
        .find(|candidate| candidate.is_file())
}

async fn run(args: CliArgs) -> Result<()> {
    let mut config = load_config(&args.config)
        .with_context(|| format!("failed to load config: {}", args.config.display()))?;
    if let Some(port) = args.port {
        config.listen_port = port;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(config.log_level.as_filter())),
        )
        .init();

    let proxy = find_proxy_executable().context(
        "ios_webkit_debug_proxy not found on PATH; install with: brew install ios-webkit-debug-proxy",
    )?;
    info!(proxy = %proxy.display(), "forwarding proxy present");

    let discovery = HttpDiscovery::new(&config.proxy_host, config.proxy_port);
    info!(endpoint = discovery.endpoint(), "polling discovery endpoint");
    let collection = Arc::new(Mutex::new(AdapterCollection::new(
        "default",
        discovery,
        SimctlEnumerator,
    )));

    // Discovery poll loop: refresh the target list and reap adapters whose
    // upstream socket closed.
    {
        let collection = collection.clone();
        let interval = Duration::from_millis(config.discovery_interval_ms);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                ticker.tick().await;
                let mut collection = collection.lock().await;
                collection.process_adapter_events().await;
                let targets = collection.get_targets().await;
                debug!(count = targets.len(), "discovery cycle complete");
            }
        });
    }

    let listener = TcpListener::bind(("0.0.0.0", config.listen_port))
        .await
        .with_context(|| format!("failed to bind listen port {}", config.listen_port))?;
    info!(port = config.listen_port, "listening for debugger clients");

    loop {
        let (stream, peer) = listener.accept().await?;
        let collection = collection.clone();
        tokio::spawn(async move {
            if let Err(err) = handle_client(stream, collection).await {
                warn!(%peer, %err, "client session ended with error");
            }
        });
    }
}

/// Serve one debugger client: resolve its request path to a target, bind a
/// session, then pump frames both ways until either side closes.
async fn handle_client(stream: TcpStream, collection: Arc<Mutex<Collection>>) -> Result<()> {
    let mut path = String::new();
    let ws = tokio_tungstenite::accept_hdr_async(stream, |req: &Request, resp: Response| {
        path = req.uri().path().to_string();
        Ok(resp)
    })
    .await
    .context("websocket handshake failed")?;
    let (mut ws_sink, mut ws_stream) = ws.split();

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
    let handle = {
        let mut collection = collection.lock().await;
        let url = collection
            .targets()
            .find(|target| path.len() > 1 && target.upstream_url().ends_with(&path))
            .map(|target| target.upstream_url().to_string());
        let Some(url) = url else {
            let _ = ws_sink.close().await;
            bail!("no target for path: {path}");
        };
        collection.connect_to(&url, outbound_tx).await?
    };
    info!(session = %handle.session, target = %handle.target, path, "client attached");
    if handle.needs_attach_handshake {
        debug!(target = %handle.target, "target dialect requires attach handshake");
    }

    loop {
        tokio::select! {
            outbound = outbound_rx.recv() => match outbound {
                Some(text) => {
                    if ws_sink.send(Message::Text(text)).await.is_err() {
                        break;
                    }
                }
                // The adapter was evicted; the session is gone.
                None => break,
            },
            incoming = ws_stream.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    let collection = collection.lock().await;
                    if let Err(err) = collection.relay_client_frame(&handle, &text).await {
                        warn!(session = %handle.session, %err, "relay failed");
                        break;
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Err(err)) => {
                    debug!(session = %handle.session, %err, "client socket error");
                    break;
                }
                Some(Ok(_)) => {}
            },
        }
    }

    collection.lock().await.disconnect(&handle).await;
    info!(session = %handle.session, "client detached");
    Ok(())
}

#[tokio::main]
async fn main() {
    let args = match parse_args() {
        Ok(args) => args,
        Err(err) => {
            eprintln!("causeway: {err:#}");
            std::process::exit(2);
        }
    };

    if let Err(err) = run(args).await {
        eprintln!("causeway: {err:#}");
        std::process::exit(1);
    }
}
