//! Main entry point for CLI command to start server.

use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use anyhow::Result;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use crate::Endpoint;
use crate::configuration::Configuration;
use crate::services::Executor;
use crate::services::HttpExecutor;
use crate::spec;

/// Options for the endpoint
#[derive(Parser, Debug)]
#[command(
    name = "graphql-endpoint",
    about = "Serve a GraphQL schema over HTTP, forwarding operations upstream"
)]
pub(crate) struct Opt {
    /// Log level (off|error|warn|info|debug|trace). `RUST_LOG` takes precedence.
    #[arg(long = "log", default_value = "info", env = "GRAPHQL_ENDPOINT_LOG")]
    log_level: String,

    /// Configuration file location.
    #[arg(short, long = "config", env = "GRAPHQL_ENDPOINT_CONFIG_PATH")]
    config_path: Option<PathBuf>,

    /// Schema definition (SDL) location.
    #[arg(short, long = "schema", env = "GRAPHQL_ENDPOINT_SCHEMA_PATH")]
    schema_path: PathBuf,

    /// Upstream GraphQL endpoint; overrides `executor.url`.
    #[arg(long, env = "GRAPHQL_ENDPOINT_UPSTREAM")]
    upstream: Option<String>,
}

/// Parse the command line, then serve until Ctrl-C.
pub fn main() -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(run(Opt::parse()))
}

async fn run(opt: Opt) -> Result<()> {
    let env_filter = std::env::var("RUST_LOG").unwrap_or_else(|_| opt.log_level.clone());
    let builder = tracing_subscriber::fmt::fmt().with_env_filter(
        EnvFilter::try_new(&env_filter).context("could not parse log configuration")?,
    );
    if std::io::stdout().is_terminal() {
        builder.init();
    } else {
        builder.json().init();
    }

    let (configuration, schema, executor) = load(&opt)?;
    let listener = tokio::net::TcpListener::bind(configuration.server.listen)
        .await
        .with_context(|| format!("could not listen on {}", configuration.server.listen))?;

    Endpoint::builder()
        .schema(schema)
        .executor(executor)
        .configuration(configuration)
        .build()
        .serve(listener, async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("received Ctrl-C, shutting down");
        })
        .await?;
    Ok(())
}

fn load(opt: &Opt) -> Result<(Configuration, spec::Schema, Arc<dyn Executor>)> {
    let mut configuration = match &opt.config_path {
        Some(path) => Configuration::from_file(path)?,
        None => Configuration::default(),
    };
    if let Some(upstream) = &opt.upstream {
        configuration.executor.url = Some(upstream.clone());
        configuration = configuration.validate()?;
    }

    let sdl = std::fs::read_to_string(&opt.schema_path).with_context(|| {
        format!("could not read schema from {}", opt.schema_path.display())
    })?;
    let schema = spec::parse_schema(&sdl, &opt.schema_path.display().to_string())
        .with_context(|| format!("invalid schema {}", opt.schema_path.display()))?;

    let url = configuration
        .executor
        .url
        .as_deref()
        .context("an upstream is required: pass --upstream or set executor.url")?;
    let executor = HttpExecutor::new(url, &configuration.executor)
        .map_err(|error| anyhow::anyhow!(error))
        .context("could not create the upstream client")?;

    Ok((configuration, schema, Arc::new(executor)))
}
