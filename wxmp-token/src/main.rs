//! Operator tool for WeChat Official Account credentials
//!
//! Loads an account configuration, then fetches, inspects or signs with its credentials.

use anyhow::{anyhow, bail, Context};
use directories::ProjectDirs;
use std::env;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::{fmt, EnvFilter};
use wxmp_client::{CredentialKey, WxMpService};
use wxmp_credentials::{LoggingConfig, WxMpConfig};

const USAGE: &str = "\
usage: wxmp-token [--config PATH] <command>

commands:
  --init [PATH]                               write a default configuration file
  obtain <access-token|jsapi|sdk|wx-card> [--force]
                                              print the current credential
  sign <url>                                  print a JS-SDK signature for <url>
  check-signature <timestamp> <nonce> <signature>
                                              verify a callback signature";

#[derive(Debug, PartialEq, Eq)]
enum Command {
    Init { path: PathBuf },
    Obtain { key: CredentialKey, force: bool },
    Sign { url: String },
    CheckSignature {
        timestamp: String,
        nonce: String,
        signature: String,
    },
}

#[derive(Debug, PartialEq, Eq)]
struct Invocation {
    config_path: PathBuf,
    command: Command,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let invocation = match parse_args(&args) {
        Ok(invocation) => invocation,
        Err(e) => {
            eprintln!("Error: {e}");
            eprintln!();
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    };

    if let Command::Init { path } = &invocation.command {
        return init_config(path);
    }

    let config_path = invocation.config_path.to_string_lossy().into_owned();
    let config = WxMpConfig::load_or_default(Some(&config_path))
        .with_context(|| format!("failed to load configuration from {config_path}"))?;

    init_logging(&config.logging)?;
    info!(config = %config_path, "configuration loaded");

    let service = WxMpService::new(config)?;

    match run(&service, invocation.command).await {
        Ok(true) => Ok(()),
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("command failed: {e}");
            Err(e)
        }
    }
}

/// Execute one command; `Ok(false)` means the command ran but the check failed
async fn run(service: &WxMpService, command: Command) -> anyhow::Result<bool> {
    match command {
        Command::Init { .. } => bail!("--init does not take a configured account"),
        Command::Obtain { key, force } => {
            let value = service.obtain(key, force).await?;
            println!("{value}");
            Ok(true)
        }
        Command::Sign { url } => {
            let signature = service.create_jsapi_signature(&url).await?;
            println!("{}", serde_json::to_string_pretty(&signature)?);
            Ok(true)
        }
        Command::CheckSignature {
            timestamp,
            nonce,
            signature,
        } => {
            let valid = service.check_signature(&timestamp, &nonce, &signature);
            println!("{}", if valid { "valid" } else { "invalid" });
            Ok(valid)
        }
    }
}

fn parse_args(args: &[String]) -> anyhow::Result<Invocation> {
    let mut config_path = None;
    let mut rest = Vec::new();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        if arg == "--config" {
            let path = iter.next().ok_or_else(|| anyhow!("--config needs a path"))?;
            config_path = Some(PathBuf::from(path));
        } else {
            rest.push(arg.as_str());
        }
    }

    let config_path = match config_path {
        Some(path) => path,
        None => default_config_path(),
    };

    let command = match rest.as_slice() {
        ["--init"] => Command::Init {
            path: config_path.clone(),
        },
        ["--init", path] => Command::Init {
            path: PathBuf::from(path),
        },
        ["obtain", key] => Command::Obtain {
            key: key.parse()?,
            force: false,
        },
        ["obtain", key, "--force"] | ["obtain", "--force", key] => Command::Obtain {
            key: key.parse()?,
            force: true,
        },
        ["sign", url] => Command::Sign {
            url: url.to_string(),
        },
        ["check-signature", timestamp, nonce, signature] => Command::CheckSignature {
            timestamp: timestamp.to_string(),
            nonce: nonce.to_string(),
            signature: signature.to_string(),
        },
        [] => bail!("no command given"),
        other => bail!("unrecognized arguments: {}", other.join(" ")),
    };

    Ok(Invocation {
        config_path,
        command,
    })
}

fn default_config_path() -> PathBuf {
    ProjectDirs::from("com", "kunzite", "wxmp-token")
        .map(|dirs| dirs.config_dir().join("config.json"))
        .unwrap_or_else(|| PathBuf::from("config.json"))
}

fn init_logging(config: &LoggingConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level.as_str()));

    let builder = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(true);

    if config.format.eq_ignore_ascii_case("json") {
        tracing::subscriber::set_global_default(builder.json().finish())?;
    } else {
        tracing::subscriber::set_global_default(builder.finish())?;
    }
    Ok(())
}

fn init_config(path: &Path) -> anyhow::Result<()> {
    if path.exists() {
        eprintln!("Configuration file '{}' already exists.", path.display());
        eprintln!("Remove it first if you want to create a new one.");
        std::process::exit(1);
    }
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let config = WxMpConfig::new("your-app-id", "your-app-secret");
    config.save(&path.to_string_lossy())?;

    println!("✅ Configuration file '{}' created successfully!", path.display());
    println!();
    println!("Fill in app_id and secret, then run:");
    println!("  wxmp-token --config {} obtain access-token", path.display());
    Ok(())
}
