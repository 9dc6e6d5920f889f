//! recap-hook - invoked by the shell once per interactive command
//!
//! ```bash
//! # From the shell's post-command hook:
//! recap-hook --use-socket --preexec-data "$___RECAP_DATA" --return-code "$?"
//!
//! # Inspect what the environment policy would capture:
//! recap-hook --test
//!
//! # Write a starter policy file:
//! recap-hook --generate-config
//! ```
//!
//! Delivery failures are silent (debug logging opt-in with `--debug`) and
//! the exit code is always zero for them: nothing here may slow down or
//! break the interactive shell.

mod gather;
mod send;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::debug;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use recap_envfilter::EnvPolicy;
use recap_identity::TlsIdentity;

use send::{Delivery, TlsOptions};

/// Ship one shell command event to the recap proxy
#[derive(Parser, Debug)]
#[command(name = "recap-hook")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Base64-encoded JSON from the pre-exec hook
    #[arg(long)]
    preexec_data: Option<String>,

    /// Exit status of the command
    #[arg(long, default_value_t = 0)]
    return_code: i32,

    /// End timestamp (defaults to now)
    #[arg(long)]
    end_timestamp: Option<String>,

    /// Log-ingestion host for the direct path
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Log-ingestion port for the direct path
    #[arg(long, default_value_t = 5170)]
    port: u16,

    /// Environment policy file
    #[arg(long)]
    env_config: Option<PathBuf>,

    /// Write the default policy file and exit
    #[arg(long)]
    generate_config: bool,

    /// Print the variables the policy would capture and exit
    #[arg(long)]
    test: bool,

    /// Deliver through the local proxy socket, with direct fallback
    #[arg(long)]
    use_socket: bool,

    /// Proxy socket path
    #[arg(long, default_value = "/tmp/recap-proxy.sock")]
    socket_path: PathBuf,

    /// Connect/write deadline in seconds
    #[arg(long, default_value_t = 3)]
    timeout: u64,

    /// Authenticate the direct path with mutual TLS
    #[arg(long)]
    tls: bool,

    /// CA certificate file
    #[arg(long, default_value = "certs/ca.crt")]
    tls_ca_file: PathBuf,

    /// Client certificate file
    #[arg(long, default_value = "certs/client.crt")]
    tls_cert_file: PathBuf,

    /// Client key file
    #[arg(long, default_value = "certs/client.key")]
    tls_key_file: PathBuf,

    /// TLS name the log-ingestion certificate is validated against
    #[arg(long, default_value = "ingest")]
    tls_server_name: String,

    /// Enable debug logging to stderr
    #[arg(long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.debug {
        init_logging()?;
    }

    if cli.generate_config {
        return generate_config(cli.env_config);
    }
    if cli.test {
        return test_policy(cli.env_config.as_deref());
    }

    // From here on, failures are not the shell's problem.
    let policy = match EnvPolicy::load(cli.env_config.as_deref()) {
        Ok(policy) => policy,
        Err(e) => {
            debug!(error = %e, "policy load failed, dropping event");
            return Ok(());
        }
    };

    let Some(encoded) = cli.preexec_data.as_deref() else {
        debug!("no preexec data, nothing to send");
        return Ok(());
    };

    let line = match assemble_line(encoded, &cli, &policy) {
        Ok(line) => line,
        Err(e) => {
            debug!(error = %e, "could not assemble event, dropping");
            return Ok(());
        }
    };

    let delivery = Delivery {
        use_socket: cli.use_socket,
        socket_path: cli.socket_path.clone(),
        target: format!("{}:{}", cli.host, cli.port),
        tls: cli.tls.then(|| TlsOptions {
            identity: TlsIdentity::new(&cli.tls_ca_file, &cli.tls_cert_file, &cli.tls_key_file),
            server_name: cli.tls_server_name.clone(),
        }),
        deadline: Duration::from_secs(cli.timeout),
    };

    send::deliver(line.as_bytes(), &delivery).await;
    Ok(())
}

/// Decode, filter, and serialize one event line
fn assemble_line(encoded: &str, cli: &Cli, policy: &EnvPolicy) -> Result<String> {
    let payload = gather::decode_payload(encoded)?;
    let event = gather::build_event(
        &payload,
        cli.return_code,
        cli.end_timestamp.as_deref(),
        policy,
    )?;
    Ok(event.encode_line()?)
}

/// `--generate-config`: write the starter policy and say where
fn generate_config(path: Option<PathBuf>) -> Result<()> {
    let path = match path {
        Some(path) => path,
        None => {
            let home = std::env::var_os("HOME").context("HOME is not set")?;
            PathBuf::from(home).join(".recap").join("env-policy.json")
        }
    };
    EnvPolicy::write_default(&path)?;
    println!("wrote default environment policy to {}", path.display());
    println!("edit it to customize which variables are captured");
    Ok(())
}

/// `--test`: show what the policy would capture from this environment
fn test_policy(path: Option<&std::path::Path>) -> Result<()> {
    let policy = EnvPolicy::load(path)?;
    let captured = policy.filter(gather::current_environment());

    if captured.is_empty() {
        println!("(no environment variables would be captured)");
    } else {
        for (key, value) in &captured {
            println!("{key}={value}");
        }
    }
    println!();
    println!(
        "would capture {} of {} environment variables",
        captured.len(),
        gather::current_environment().len()
    );
    Ok(())
}

/// Initialize debug logging on stderr
fn init_logging() -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("debug"))
        .map_err(|e| anyhow::anyhow!("invalid log filter: {}", e))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .with(filter)
        .init();

    Ok(())
}
