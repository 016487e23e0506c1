//! tvlauncher - Launch and supervise TV launcher apps from the command line

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tvlauncher::core::settings::default_settings_file;
use tvlauncher::persistence::{find_app_config, load_app_configs};
use tvlauncher::{ConfigId, ExitInfo, Supervisor, SupervisorSettings, APP_NAME, APP_VERSION};

#[derive(Parser)]
#[command(name = "tvlauncher", version, about = "Launch and supervise TV launcher apps")]
struct Cli {
    /// Settings file (defaults to the user config directory)
    #[arg(long, global = true)]
    settings: Option<PathBuf>,

    /// App catalog file, overriding the settings
    #[arg(long, global = true)]
    apps: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the apps in the catalog
    List,
    /// Launch an app and wait for it to exit; Ctrl-C kills it
    Run {
        /// Id of the app config to launch
        config_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let settings_path = cli.settings.clone().unwrap_or_else(default_settings_file);
    let mut settings = SupervisorSettings::load(&settings_path)?;
    if let Some(apps) = cli.apps.clone() {
        settings.apps_file = Some(apps);
    }

    init_logging(settings.debug_logging);
    info!("{} v{} starting...", APP_NAME, APP_VERSION);

    let apps_file = settings.get_apps_file();
    let configs = load_app_configs(&apps_file)?;

    match cli.command {
        Commands::List => {
            if configs.is_empty() {
                println!("No apps configured in {}", apps_file.display());
            }
            for config in &configs {
                println!("{}\t{}\t{}", config.id, config.name, config.launch_command);
            }
            Ok(())
        }
        Commands::Run { config_id } => {
            let config_id = ConfigId::new(config_id);
            let config = find_app_config(&configs, &config_id)
                .with_context(|| format!("App '{}' not found in {}", config_id, apps_file.display()))?;
            let code = run_app(&settings, config).await?;
            info!("{} shutting down", APP_NAME);
            std::process::exit(code);
        }
    }
}

/// Launch one app and block until its instance exits
async fn run_app(settings: &SupervisorSettings, config: &tvlauncher::AppConfig) -> Result<i32> {
    let supervisor = Supervisor::new(settings);

    let (tx, mut rx) = mpsc::unbounded_channel();
    let subscription = supervisor.on_instance_update(move |update| {
        let _ = tx.send(update);
    });

    let launched = supervisor
        .launch(config)
        .await
        .with_context(|| format!("Failed to launch '{}'", config.name))?;
    let instance_id = launched.launch_instance_id;

    let exit = loop {
        tokio::select! {
            update = rx.recv() => {
                let Some(update) = update else {
                    anyhow::bail!("Update channel closed before '{}' exited", config.name);
                };
                if update.launch_instance_id != instance_id {
                    continue;
                }
                match update.exit_result {
                    None => println!("{} running (PID {})", config.name, update.pid),
                    Some(exit) => {
                        println!("{} {}", config.name, exit);
                        break exit;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, killing '{}'", config.name);
                if let Err(e) = supervisor.kill(&instance_id) {
                    if e.is_process_gone() {
                        warn!("Process already gone: {}", e);
                    } else {
                        error!("{}", e);
                    }
                }
            }
        }
    };

    subscription.unsubscribe();

    Ok(match exit {
        ExitInfo::Success => 0,
        ExitInfo::ExitCode { code } => code,
        ExitInfo::Signal { .. } | ExitInfo::Unknown => 1,
    })
}

/// Initialize the logging system
fn init_logging(debug: bool) {
    let default_filter = if debug { "tvlauncher=debug" } else { "tvlauncher=info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
