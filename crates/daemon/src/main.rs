/// meshecho - echo RPC over an identity-authenticated overlay
///
/// - `client` sends one greeting to a service and prints the reply
/// - `server` hosts any number of echo services until terminated
/// - `enroll` creates an identity and enrolls it in a service directory

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, Level};

use meshecho_common::IdentityConfig;
use meshecho_core::{
    Identity, IdentityRecord, NetworkContext, OverlayContext, RpcClient, ServiceDirectory,
};
use meshecho_daemon::cli::{Cli, Command};
use meshecho_daemon::shutdown::{forward_signals, TERMINATED_EXIT_CODE};
use meshecho_daemon::{
    dial_service, wait_for_termination, ClientConfig, GreeterClient, HelloRequest, RpcServe,
    ServerConfig, ServiceHost,
};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // stdout carries the client's reply
    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_writer(std::io::stderr)
        .init();

    let config = cli.config.as_deref();
    let service = cli.service.as_deref();

    let result = match &cli.command {
        Command::Client {
            echo_string,
            server_identity,
        } => run_client(config, service, echo_string, server_identity.as_deref()).await,
        Command::Server {
            hosted_services,
            address_by_identity,
        } => run_server(config, service, hosted_services, *address_by_identity).await,
        Command::Enroll {
            name,
            directory,
            bind_host,
            out,
        } => run_enroll(name, directory, *bind_host, out.as_deref().or(config)).await,
    };

    match result {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    }
}

fn load_context(identity_file: &Path) -> Result<OverlayContext> {
    OverlayContext::load(identity_file)
        .with_context(|| format!("loading identity {}", identity_file.display()))
}

/// Dial once, call once, print the reply
async fn run_client(
    config: Option<&Path>,
    service: Option<&str>,
    echo_string: &str,
    server_identity: Option<&str>,
) -> Result<i32> {
    let config = ClientConfig::new(config, service, echo_string, server_identity)?;

    let context = load_context(&config.identity_file)?;
    context.authenticate().await.context("authenticating")?;

    let connection = dial_service(&context, &config.service, &config.dial_strategy())
        .await
        .with_context(|| format!("dialing {}", config.service))?;

    let client = GreeterClient::new(RpcClient::new(connection));
    let reply = client
        .say_hello(
            &HelloRequest {
                name: config.greeting.clone(),
            },
            config.call_timeout,
        )
        .await
        .with_context(|| format!("calling {}", config.service));
    client.close();

    println!("{}", reply?.message);
    Ok(0)
}

/// Host every configured service and park until terminated
async fn run_server(
    config: Option<&Path>,
    service: Option<&str>,
    hosted_services: &[String],
    address_by_identity: bool,
) -> Result<i32> {
    // before anything is hosted: SIGHUP kills the process by default
    let mut signals = forward_signals().context("registering signal handlers")?;

    let config = ServerConfig::new(config, service, hosted_services, address_by_identity)?;
    for rejected in &config.rejected {
        error!("Skipping {}", rejected);
    }

    let context = Arc::new(load_context(&config.identity_file)?);
    let identity = context.authenticate().await.context("authenticating")?;

    let host = ServiceHost::new(context, RpcServe)?;
    let running = host.start(&config.descriptors).await;

    if running.is_empty() {
        bail!(
            "no service could be started ({} failed)",
            running.failures.len()
        );
    }

    info!("{} hosting {}", identity.name(), running.names().join(", "));

    let signal = wait_for_termination(&mut signals)
        .await
        .context("waiting for termination signals")?;
    info!("Exiting on {}", signal);

    Ok(TERMINATED_EXIT_CODE)
}

/// Create an identity file and enroll the identity
async fn run_enroll(
    name: &str,
    directory: &Path,
    bind_host: IpAddr,
    out: Option<&Path>,
) -> Result<i32> {
    let path = match out {
        Some(path) => path.to_path_buf(),
        None => IdentityConfig::default_path()?,
    };
    if path.exists() {
        bail!("identity file {} already exists", path.display());
    }

    let config = IdentityConfig::generate(name, directory).with_bind_host(bind_host);
    let identity = Identity::from_config(&config)?;

    ServiceDirectory::new(directory)
        .enroll(&IdentityRecord::from_identity(&identity))
        .await
        .with_context(|| format!("enrolling {} in {}", name, directory.display()))?;

    config
        .to_file(&path)
        .with_context(|| format!("writing {}", path.display()))?;

    info!(
        "Enrolled {} ({}), identity written to {}",
        name,
        identity.node_id(),
        path.display()
    );
    Ok(0)
}
