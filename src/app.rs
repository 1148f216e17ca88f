//! The process context: one pool, one player and one dispatcher shared by
//! every input worker.

use crate::config::BoxConfig;
use crate::dispatch::Dispatcher;
use crate::input::remote::RemoteSettings;
use crate::input::rfid::TagSettings;
use crate::input::{KeySource, RemoteProcessor, TagProcessor, TagSource};
use crate::player::{Connector, ConnectionPool, LocalAudio, MusicPlayer, PlayerSettings};
use crate::shortcuts::ShortcutResolver;
use anyhow::Result;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::info;

pub struct BoxContext {
    config: BoxConfig,
    player: Arc<MusicPlayer>,
    dispatcher: Arc<Dispatcher>,
    runtime: Handle,
}

impl BoxContext {
    pub fn new(
        config: BoxConfig,
        connector: Box<dyn Connector>,
        local: Box<dyn LocalAudio>,
        runtime: Handle,
    ) -> Self {
        let layout = config.layout();
        info!("base dir: {}", layout.base_dir.display());

        let pool = Arc::new(ConnectionPool::new(
            connector,
            config.close_after(),
            runtime.clone(),
        ));
        let player = Arc::new(MusicPlayer::new(
            PlayerSettings::from_config(&config),
            layout.clone(),
            pool,
            local,
            runtime.clone(),
        ));
        let resolver = ShortcutResolver::new(&layout, config.scan_match);
        let dispatcher = Arc::new(Dispatcher::new(Arc::clone(&player), resolver));

        Self {
            config,
            player,
            dispatcher,
            runtime,
        }
    }

    pub fn config(&self) -> &BoxConfig {
        &self.config
    }

    pub fn player(&self) -> &Arc<MusicPlayer> {
        &self.player
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Empty queue, initial volume and a library update before any input is read
    pub fn prepare(&self) -> Result<()> {
        let initial_volume = self.config.initial_volume;
        self.player.pool().with_connection(|client| {
            client.clear()?;
            if let Some(volume) = initial_volume {
                client.set_volume(volume)?;
            }
            client.update(None)
        })
    }

    /// Play the startup folder, or the startup sound if there is none
    pub fn play_startup(&self) -> Result<()> {
        let player = &self.player;
        let startup_folder = self.config.startup_folder.as_deref();

        player.pool().with_connection(|client| {
            if let Some(folder) = startup_folder {
                player.play_folder(client, folder)
            } else if let Some(sound) = player.sound_effect("startup") {
                player.play_single_file(client, sound, false, false)
            } else {
                Ok(())
            }
        })
    }

    pub fn tag_processor(&self) -> TagProcessor {
        TagProcessor::new(self.dispatcher.clone(), TagSettings::from_config(&self.config))
    }

    pub fn remote_processor(&self) -> RemoteProcessor {
        RemoteProcessor::new(self.dispatcher.clone(), RemoteSettings::from_config(&self.config))
    }

    /// Run a tag worker on the blocking pool
    pub fn spawn_tag_worker(
        &self,
        mut source: Box<dyn TagSource>,
        running: Arc<AtomicBool>,
    ) -> JoinHandle<()> {
        let mut processor = self.tag_processor();
        self.runtime.spawn_blocking(move || processor.run(source.as_mut(), &running))
    }

    /// Run the remote worker on the blocking pool
    pub fn spawn_remote_worker(
        &self,
        mut source: Box<dyn KeySource>,
        running: Arc<AtomicBool>,
    ) -> JoinHandle<()> {
        let mut processor = self.remote_processor();
        self.runtime.spawn_blocking(move || processor.run(source.as_mut(), &running))
    }
}
