// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! agorad: the autotuning server binary.

use agora_daemon::remote::mqtt::{MqttHandler, RemoteConfiguration};
use agora_daemon::{ApplicationManager, LauncherConfiguration, RemoteHandler as _, WorkerPool};
use agora_storage::{FsConfiguration, StorageKind};
use anyhow::{bail, Context};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Parser)]
#[command(
    name = "agorad",
    about = "Remote autotuning server: learns application models from a fleet of clients"
)]
struct Options {
    /// Where the application stores logs and temporary files.
    #[arg(long, value_name = "PATH")]
    workspace_directory: PathBuf,

    /// The directory with all the available plugins that compute the application model.
    #[arg(long, value_name = "PATH")]
    plugin_directory: PathBuf,

    /// The directory that will store all the fitted models produced during evaluation.
    #[arg(long, value_name = "PATH")]
    models_directory: PathBuf,

    /// The name of the storage used by agora [csv].
    #[arg(long, default_value = "csv")]
    storage_implementation: String,

    /// A reference to the storage, depending on its actual implementation.
    #[arg(long, default_value = "")]
    storage_address: String,

    /// The name of the actual MQTT client used by agora [paho].
    #[arg(long, default_value = "paho")]
    mqtt_implementation: String,

    /// The url of the MQTT broker.
    #[arg(long, default_value = "127.0.0.1:1883")]
    broker_url: String,

    /// The username for authentication purposes, if any.
    #[arg(long, default_value = "")]
    broker_username: String,

    /// The password for authentication purposes, if any.
    #[arg(long, default_value = "")]
    broker_password: String,

    /// The path to the broker certificate (e.g. broker.crt), if any.
    #[arg(long, default_value = "")]
    broker_ca: String,

    /// The path to the client certificate (e.g. client.crt), if any.
    #[arg(long, default_value = "")]
    client_ca: String,

    /// The path to the client private key (e.g. client.key), if any.
    #[arg(long, default_value = "")]
    client_private_key: String,

    /// The MQTT quality of service level [0,2].
    #[arg(long, default_value_t = 2)]
    qos: u8,

    /// The minimum level of logging [disabled, warning, info, pedantic, debug].
    #[arg(long, default_value = "info")]
    min_log_level: String,

    /// Enables the logging to be happening on file.
    #[arg(long)]
    log_to_file: bool,

    /// The log file path.
    #[arg(long, default_value = "./margot_agora.log")]
    log_file: PathBuf,

    /// The number of workers to process messages [default: 3, bounded by the
    /// hardware concurrency].
    /// NOTE: it is recommended to have at least one worker for each managed application.
    #[arg(long)]
    num_threads: Option<usize>,
}

fn resolve_log_filter(level: &str) -> anyhow::Result<&'static str> {
    Ok(match level {
        "disabled" => "off",
        "warning" => "warn",
        "info" => "info",
        "pedantic" => "trace",
        "debug" => "debug",
        other => bail!(
            "invalid log level '{other}', should be one of [disabled, warning, info, pedantic, debug]"
        ),
    })
}

fn optional_path(value: &str) -> Option<PathBuf> {
    if value.is_empty() {
        None
    } else {
        Some(PathBuf::from(value))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let options = Options::parse();

    if options.qos > 2 {
        bail!("invalid MQTT quality of service {}, should be [0,2]", options.qos);
    }
    // the hardware hint bounds the default only; an explicit override wins
    let num_threads = options.num_threads.unwrap_or_else(|| {
        let hardware = std::thread::available_parallelism().map(|n| n.get()).unwrap_or(3);
        3.min(hardware)
    });
    if num_threads == 0 {
        bail!("invalid number of threads {num_threads}, must be positive");
    }
    if options.mqtt_implementation != "paho" {
        bail!(
            "invalid MQTT implementation '{}', should be one of [paho]",
            options.mqtt_implementation
        );
    }
    let storage_kind: StorageKind =
        options.storage_implementation.parse().map_err(|e: String| anyhow::anyhow!(e))?;

    // logging before anything noisy
    let filter = resolve_log_filter(&options.min_log_level)?;
    let _appender_guard = if options.log_to_file {
        let directory = options.log_file.parent().unwrap_or(std::path::Path::new("."));
        let file_name =
            options.log_file.file_name().unwrap_or(std::ffi::OsStr::new("margot_agora.log"));
        let (writer, guard) =
            tracing_appender::non_blocking(tracing_appender::rolling::never(directory, file_name));
        tracing_subscriber::fmt().with_env_filter(filter).with_writer(writer).init();
        Some(guard)
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        None
    };

    // bootstrap step 1: establish a connection with the broker
    info!("agora main: bootstrap step 1: establish a connection with the broker");
    let mut remote_configuration =
        RemoteConfiguration::new("agora", options.broker_url.clone(), options.qos);
    remote_configuration.username = options.broker_username.clone();
    remote_configuration.password = options.broker_password.clone();
    remote_configuration.broker_ca = optional_path(&options.broker_ca);
    remote_configuration.client_certificate = optional_path(&options.client_ca);
    remote_configuration.client_key = optional_path(&options.client_private_key);

    let remote = MqttHandler::connect(&remote_configuration)
        .with_context(|| format!("unable to reach the broker at {}", options.broker_url))?;

    remote.subscribe("margot/+/welcome/#").await?; // to welcome new applications
    remote.subscribe("margot/+/info/#").await?; // to receive information about the application
    remote.subscribe("margot/+/observation/#").await?; // to receive the observations from the clients
    remote.subscribe("margot/+/kia/#").await?; // to receive kill/bye commands from a client
    remote.subscribe("margot/system/#").await?; // to receive external commands

    // announce the server presence to running clients
    remote.send_message(agora_core::Message::new("margot/welcome", "")).await?;

    // bootstrap step 2: initialize the virtual file system
    info!("agora main: bootstrap step 2: initializing the virtual file system");
    let storage_root = optional_path(&options.storage_address)
        .unwrap_or_else(|| options.workspace_directory.join("storage"));
    let mut fs_configuration = FsConfiguration::new(storage_root, options.models_directory.clone());
    fs_configuration.kind = storage_kind;

    // bootstrap step 3: initialize the plugin launcher
    info!("agora main: bootstrap step 3: initializing the model builder plugins");
    std::fs::create_dir_all(&options.workspace_directory)
        .with_context(|| "unable to create the workspace directory")?;
    let launcher_configuration = LauncherConfiguration::new(
        options.plugin_directory.clone(),
        options.workspace_directory.clone(),
    );

    let manager =
        ApplicationManager::new(remote.clone(), fs_configuration, launcher_configuration);

    // bootstrap step 4: hire the workers
    info!("agora main: bootstrap step 4: hiring {num_threads} workers");
    let pool = WorkerPool::start(manager, num_threads);

    info!("agora main: bootstrap complete, waiting for workers to finish");
    pool.wait().await;

    info!("agora main: all the workers have joined me, farewell my friend");
    Ok(())
}
