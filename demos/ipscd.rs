//! Demo binary: a small ping/echo daemon plus a one-shot client, showing
//! how to wire up [`ipsc::server::run_server`] and [`ipsc::client::call`].

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::{Value, json};
use std::sync::Arc;

use ipsc::client::{self, ClientOutcome, ClientRequest};
use ipsc::config::ServerSettings;
use ipsc::dispatch::{HandlerOutcome, MethodEntry, MethodTable, ParamsMode};
use ipsc::logging::{self, LogConfig};
use ipsc::server::{ServerConfig, ServerContext, run_server};

#[derive(Parser)]
#[command(name = "ipscd")]
#[command(about = "Demo JSON-RPC-over-Unix-socket daemon and client", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the demo server, registering `ping` and `echo`.
    Serve(ServeArgs),
    /// Issue a single request against a running server.
    Call(CallArgs),
}

#[derive(Args, serde::Serialize)]
struct ServeArgs {
    #[arg(long)]
    port: Option<u16>,
    #[arg(long)]
    #[serde(skip_serializing_if = "Option::is_none")]
    maxq: Option<i32>,
    #[arg(long)]
    #[serde(skip)]
    verbose: bool,
    #[arg(long)]
    #[serde(skip)]
    json_logs: bool,
}

#[derive(Args)]
struct CallArgs {
    #[arg(long, default_value_t = 9847)]
    port: u16,
    #[arg(long)]
    method: String,
    /// JSON-encoded params, e.g. '{"n":1}'. Omit for methods with no params.
    #[arg(long)]
    params: Option<String>,
    #[arg(long, default_value_t = 2_000)]
    timeout_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve(args) => run_serve(args).await,
        Commands::Call(args) => run_call(args).await,
    }
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    let settings = ServerSettings::load(Some(&args)).context("failed to load server settings")?;

    logging::init(LogConfig {
        json: args.json_logs || settings.log_json,
        verbose: args.verbose || settings.verbose,
    });

    let methods: MethodTable<()> = MethodTable::new()
        .register(MethodEntry::new(
            "ping",
            ParamsMode::None,
            vec![Arc::new(|_conn, _params, _id| {
                Box::pin(async move { HandlerOutcome::Result(json!("pong")) })
            })],
        ))
        .register(MethodEntry::new(
            "echo",
            ParamsMode::Required,
            vec![Arc::new(|_conn, params, _id| {
                Box::pin(async move {
                    HandlerOutcome::Result(params.unwrap_or(Value::Null))
                })
            })],
        ));

    let (shutdown_tx, shutdown_rx) = tokio::sync::broadcast::channel(1);

    let config = ServerConfig {
        port: settings.port,
        maxq: settings.maxq,
        recv_timeout_ms: settings.recv_timeout_ms,
        poll_interval: std::time::Duration::ZERO,
        strict: settings.strict,
        methods,
        on_listen: Some(Box::new(|path| {
            println!("listening on {}", path.display());
        })),
        context: Arc::new(ServerContext { state: () }),
    };

    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        let _ = shutdown_tx.send(());
    });

    run_server(config, shutdown_rx).await.context("server error")
}

async fn run_call(args: CallArgs) -> Result<()> {
    let params = match args.params {
        Some(raw) => Some(serde_json::from_str::<Value>(&raw).context("params must be valid JSON")?),
        None => None,
    };

    let mut request = ClientRequest::new(args.port, args.method, json!(1)).with_timeout_ms(args.timeout_ms);
    if let Some(params) = params {
        request = request.with_params(params);
    }

    match client::call(request).await.context("call failed")? {
        ClientOutcome::Success(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        ClientOutcome::RpcError(err) => {
            eprintln!("rpc error {}: {}", err.code, err.message);
            std::process::exit(1);
        }
    }

    Ok(())
}
