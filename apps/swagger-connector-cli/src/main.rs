mod config;
mod logging;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use serde_json::{Map, Value};
use swagger_connector::{
    ApiResponse, CallOptions, Connector, HookContext, HookEvent, MemoryStore, NamedStores,
    SwaggerClient, observer_fn,
};

use crate::config::{AppConfig, CliOverrides};

/// Call operations of an OpenAPI/Swagger described service
#[derive(Parser)]
#[command(name = "swagger-connector")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Specification URL or file path (overrides `connector.spec`)
    #[arg(long)]
    spec: Option<String>,

    /// Base URL override (overrides `connector.url`)
    #[arg(long)]
    url: Option<String>,

    /// Log verbosity level (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the operations exposed by the specification
    Operations,
    /// Load and validate the specification, then exit
    Check,
    /// Invoke one operation and print the response body
    Call {
        /// Method name or operationId
        operation: String,
        /// Parameters as a JSON object
        #[arg(short, long, default_value = "{}")]
        params: String,
        /// Request body as JSON
        #[arg(short, long)]
        body: Option<String>,
        /// Response content type to ask for
        #[arg(long)]
        accept: Option<String>,
        /// Extra request header, `name: value`
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
    },
    /// Print effective configuration (YAML) and exit
    PrintConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // defaults -> YAML -> env (SWAGGER__*) -> CLI flags
    let mut config = AppConfig::load(cli.config.as_deref())?;
    config.apply_cli_overrides(&CliOverrides {
        spec: cli.spec,
        url: cli.url,
        log_json: cli.log_json,
    });
    logging::init(&config.logging, cli.verbose)?;

    match cli.command {
        Commands::PrintConfig => {
            print!("{}", config.to_yaml()?);
            Ok(())
        }
        Commands::Operations => list_operations(&config).await,
        Commands::Check => check(config).await,
        Commands::Call {
            operation,
            params,
            body,
            accept,
            headers,
        } => {
            let params = parse_params(&params)?;
            let options = call_options(body.as_deref(), accept, &headers)?;
            call(&config, &operation, &params, &options).await
        }
    }
}

fn build_connector(config: &AppConfig) -> Result<Connector> {
    let settings = config.connector_settings()?;
    let stores = NamedStores::new().with_store(
        config.cache.name.clone(),
        Arc::new(MemoryStore::new(config.cache.max_entries)),
    );
    let connector = Connector::builder(settings)
        .transport_config(config.transport_config())
        .store_registry(Arc::new(stores))
        .build()?;

    connector.observe(
        HookEvent::BeforeExecute,
        observer_fn(|mut ctx| {
            if let Some(req) = ctx.request_mut() {
                tracing::debug!(method = %req.method, url = %req.url, "sending request");
            }
            Ok(())
        }),
    );
    connector.observe(
        HookEvent::AfterExecute,
        observer_fn(|ctx| {
            if let HookContext::AfterExecute(state) = ctx {
                match (&state.res, &state.err) {
                    (Some(res), _) => tracing::debug!(status = %res.status, url = %res.url, "received response"),
                    (None, Some(err)) => tracing::debug!(error = %err, "request failed"),
                    (None, None) => {}
                }
            }
            Ok(())
        }),
    );
    Ok(connector)
}

async fn connect(config: &AppConfig) -> Result<Arc<SwaggerClient>> {
    let connector = build_connector(config)?;
    connector
        .connect()
        .await
        .context("failed to load the specification")
}

async fn list_operations(config: &AppConfig) -> Result<()> {
    let client = connect(config).await?;
    for op in client.operations().iter() {
        let spec = op.spec();
        println!("{:<32} {:<7} {}", op.method_name(), spec.method, spec.path);
    }
    Ok(())
}

async fn check(mut config: AppConfig) -> Result<()> {
    config.connector.insert("validate".to_owned(), Value::Bool(true));
    let client = connect(&config).await?;
    let spec = client.spec();
    println!(
        "Specification is valid: {} ({}), {} operations",
        spec.title().unwrap_or("untitled"),
        spec.version,
        client.operations().len()
    );
    Ok(())
}

fn parse_params(raw: &str) -> Result<Map<String, Value>> {
    match serde_json::from_str(raw).context("`--params` is not valid JSON")? {
        Value::Object(map) => Ok(map),
        other => bail!("`--params` must be a JSON object, got {other}"),
    }
}

fn call_options(body: Option<&str>, accept: Option<String>, headers: &[String]) -> Result<CallOptions> {
    let mut options = CallOptions::default();
    if let Some(body) = body {
        options = options.with_body(serde_json::from_str(body).context("`--body` is not valid JSON")?);
    }
    if let Some(accept) = accept {
        options = options.with_response_content_type(accept);
    }
    for header in headers {
        let Some((name, value)) = header.split_once(':') else {
            bail!("invalid header `{header}`, expected `name: value`");
        };
        options = options.with_header(name.trim(), value.trim());
    }
    Ok(options)
}

fn render(response: &ApiResponse) -> String {
    match response.obj() {
        Some(json) => serde_json::to_string_pretty(&json).unwrap_or_else(|_| response.text()),
        None => response.text(),
    }
}

async fn call(
    config: &AppConfig,
    operation: &str,
    params: &Map<String, Value>,
    options: &CallOptions,
) -> Result<()> {
    let client = connect(config).await?;
    match client.execute(operation, params, options).await {
        Ok(response) => {
            eprintln!("HTTP {}", response.status);
            println!("{}", render(&response));
            Ok(())
        }
        Err(err) => {
            if let Some(response) = err.response() {
                println!("{}", render(response));
            }
            Err(err).with_context(|| format!("operation `{operation}` failed"))
        }
    }
}
