use anyhow::Result;
use clap::Parser;
use radiobox::app::BoxContext;
use radiobox::cli::{Args, Command};
use radiobox::config::BoxConfig;
use radiobox::input::device::{list_devices, EvdevKeySource, EvdevTagReader};
use radiobox::lock::InstanceLock;
use radiobox::player::{AlsaAudio, MpdConnector};
use radiobox::shortcuts::{ShortcutResolver, TargetKind};
use radiobox::telemetry;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    human_panic::setup_panic!();

    let args = Args::parse();
    let config_path = args.config.clone().unwrap_or_else(BoxConfig::get_config_path);

    match args.command() {
        Command::ListDevices => print_devices(),
        Command::Shortcuts { broken, duplicates } => {
            telemetry::init_stderr_logging();
            let config = BoxConfig::load(&config_path)?;
            print_shortcuts(&config, broken, duplicates);
            Ok(())
        }
        Command::Run => run(config_path, args.foreground).await,
    }
}

async fn run(config_path: PathBuf, foreground: bool) -> Result<()> {
    let config = BoxConfig::load(&config_path)?;

    let guard = match telemetry::init_logging(&config.log_file, foreground) {
        Ok(guard) => Some(guard),
        Err(e) => {
            telemetry::init_stderr_logging();
            warn!("{:#}", e);
            None
        }
    };
    info!("config: {}", config_path.display());

    let lock = InstanceLock::acquire(&InstanceLock::default_path())?;

    let connector = MpdConnector::new(config.host.clone(), config.port, config.pwd.clone());
    let local = AlsaAudio::new(config.alsa_audio_device.clone());
    let ctx = Arc::new(BoxContext::new(
        config,
        Box::new(connector),
        Box::new(local),
        Handle::current(),
    ));

    // 1. Reset the player before the first event
    let prepare = Arc::clone(&ctx);
    if let Err(e) = tokio::task::spawn_blocking(move || prepare.prepare()).await? {
        error!("startup reset failed: {:#}", e);
    }

    // 2. One worker per reader, at most one for the remote
    let running = Arc::new(AtomicBool::new(true));
    let mut workers = Vec::new();

    for name in &ctx.config().rfid_reader_names {
        info!("starting tag reader {}", name);
        let reader = EvdevTagReader::new(name);
        workers.push(ctx.spawn_tag_worker(Box::new(reader), Arc::clone(&running)));
    }

    if ctx.config().lirc {
        match ctx.config().lirc_device.as_deref() {
            Some(name) => {
                let remote = EvdevKeySource::new(name);
                if remote.is_present() {
                    info!("found IR device: {}", name);
                    workers.push(ctx.spawn_remote_worker(Box::new(remote), Arc::clone(&running)));
                } else {
                    error!("IR device not found: {}", name);
                }
            }
            None => error!("lirc is enabled but no lircdevice is configured"),
        }
    }

    if workers.is_empty() {
        warn!("no input workers running");
    }

    // 3. Startup folder or sound
    let startup = Arc::clone(&ctx);
    if let Err(e) = tokio::task::spawn_blocking(move || startup.play_startup()).await? {
        error!("startup playback failed: {:#}", e);
    }

    shutdown_signal().await;
    info!("shutting down");
    running.store(false, Ordering::SeqCst);

    // workers block on device reads and cannot be joined
    drop(lock);
    drop(guard);
    std::process::exit(0);
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = term.recv() => {}
                }
            }
            Err(e) => {
                warn!("cannot listen for SIGTERM: {}", e);
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

fn print_devices() -> Result<()> {
    let devices = list_devices();
    if devices.is_empty() {
        println!(
            "No input devices found. Please connect a device and try again. \
             Reading input devices usually requires membership in the \"input\" group."
        );
        std::process::exit(1);
    }

    println!("Available input devices:");
    for device in devices {
        println!("{}\t{}\t{}", device.name, device.path.display(), device.phys);
    }
    Ok(())
}

fn print_shortcuts(config: &BoxConfig, broken: bool, duplicates: bool) {
    let resolver = ShortcutResolver::new(&config.layout(), config.scan_match);

    if broken {
        for (id, target) in resolver.broken() {
            println!("{}\t{}", id, target.unwrap_or_else(|| "<unreadable>".to_string()));
        }
    }

    if duplicates {
        for (folder, ids) in resolver.duplicates() {
            println!("{}\t{}", folder, ids.join(", "));
        }
    }

    if !broken && !duplicates {
        for (id, shortcut) in resolver.entries() {
            match shortcut {
                Some(s) => {
                    let kind = match s.kind {
                        TargetKind::Folder => "folder",
                        TargetKind::InlineCommand => "cmd",
                        TargetKind::ExternalCommand => "extcmd",
                    };
                    println!("{}\t{}\t{}", id, kind, s.target);
                }
                None => println!("{}\t-\t<unreadable>", id),
            }
        }
    }
}
