//! MPD backend for the remote player seam 🎵
//!
//! Implements [`RemotePlayer`] and [`Connector`] on top of the `mpd` crate.

use super::traits::{Connector, PauseMode, PlayState, PlayerStatus, RemotePlayer};
use anyhow::{Context, Result};
use mpd::{Client, Query, Song, State, Term};
use std::net::TcpStream;
use tracing::debug;

/// Opens authenticated sessions to an MPD server
pub struct MpdConnector {
    host: String,
    port: u16,
    password: Option<String>,
}

impl MpdConnector {
    pub fn new(host: String, port: u16, password: Option<String>) -> Self {
        Self {
            host,
            port,
            password,
        }
    }
}

impl Default for MpdConnector {
    fn default() -> Self {
        Self::new("localhost".to_string(), 6600, None)
    }
}

impl Connector for MpdConnector {
    fn connect(&self) -> Result<Box<dyn RemotePlayer>> {
        let addr = format!("{}:{}", self.host, self.port);
        let mut client = Client::connect(&addr)
            .with_context(|| format!("Failed to connect to MPD at {}", addr))?;

        if let Some(pwd) = &self.password {
            client.login(pwd).context("MPD rejected the password")?;
        }

        debug!("connected to MPD at {}", addr);
        Ok(Box::new(MpdSession { client }))
    }

    fn describe(&self) -> String {
        format!("mpd://{}:{}", self.host, self.port)
    }
}

/// One live MPD connection
pub struct MpdSession {
    client: Client<TcpStream>,
}

impl RemotePlayer for MpdSession {
    fn status(&mut self) -> Result<PlayerStatus> {
        let status = self.client.status()?;

        Ok(PlayerStatus {
            state: match status.state {
                State::Play => PlayState::Playing,
                State::Pause => PlayState::Paused,
                State::Stop => PlayState::Stopped,
            },
            song: status.song.map(|place| place.pos),
            elapsed: status.elapsed.map(|t| t.as_secs_f64()),
            // MPD reports -1 when no mixer is configured
            volume: u8::try_from(status.volume).ok(),
            updating_db: status.updating_db.is_some(),
        })
    }

    fn clear(&mut self) -> Result<()> {
        self.client.clear().context("Failed to clear the queue")
    }

    fn add(&mut self, uri: &str) -> Result<()> {
        let song = Song {
            file: uri.to_string(),
            ..Default::default()
        };
        self.client
            .push(&song)
            .with_context(|| format!("Failed to add {} to the queue", uri))?;
        Ok(())
    }

    fn add_dir(&mut self, dir: &str) -> Result<()> {
        // addid does not recurse; findadd on the base does
        self.client
            .findadd(Query::new().and(Term::Base, dir))
            .with_context(|| format!("Failed to add directory {} to the queue", dir))
    }

    fn load_playlist(&mut self, name: &str) -> Result<()> {
        self.client
            .load(name, ..)
            .with_context(|| format!("Failed to load playlist {}", name))
    }

    fn play(&mut self) -> Result<()> {
        self.client.play().context("Failed to start playback")
    }

    fn play_pos(&mut self, pos: u32) -> Result<()> {
        self.client
            .switch(pos)
            .context("Failed to switch to position")
    }

    fn pause(&mut self, mode: PauseMode) -> Result<()> {
        match mode {
            PauseMode::Pause => self.client.pause(true)?,
            PauseMode::Resume => self.client.pause(false)?,
            PauseMode::Toggle => {
                let status = self.client.status()?;
                match status.state {
                    State::Play => self.client.pause(true)?,
                    State::Pause | State::Stop => self.client.play()?,
                }
            }
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        self.client.stop().context("Failed to stop playback")
    }

    fn next(&mut self) -> Result<()> {
        self.client.next().context("Failed to skip to next track")
    }

    fn previous(&mut self) -> Result<()> {
        self.client
            .prev()
            .context("Failed to skip to previous track")
    }

    fn shuffle(&mut self) -> Result<()> {
        self.client.shuffle(..).context("Failed to shuffle the queue")
    }

    fn seek(&mut self, pos: u32, elapsed: f64) -> Result<()> {
        self.client.seek(pos, elapsed).context("Failed to seek")
    }

    fn seek_relative(&mut self, secs: f64) -> Result<()> {
        let status = self.client.status()?;
        let place = status.song.context("No song playing")?;
        let elapsed = status.elapsed.map(|t| t.as_secs_f64()).unwrap_or(0.0);
        let target = (elapsed + secs).max(0.0);
        self.client
            .seek(place.id, target)
            .context("Failed to seek")
    }

    fn set_volume(&mut self, volume: u8) -> Result<()> {
        self.client
            .volume(volume.min(100) as i8)
            .context("Failed to set volume")
    }

    fn change_volume(&mut self, delta: i32) -> Result<()> {
        let status = self.client.status()?;
        if status.volume < 0 {
            debug!("MPD has no mixer, ignoring volume change");
            return Ok(());
        }
        let new_vol = (status.volume as i32 + delta).clamp(0, 100);
        self.client
            .volume(new_vol as i8)
            .context("Failed to set volume")
    }

    fn set_single(&mut self, enable: bool) -> Result<()> {
        self.client.single(enable).context("Failed to set single mode")
    }

    fn set_repeat(&mut self, enable: bool) -> Result<()> {
        self.client.repeat(enable).context("Failed to set repeat mode")
    }

    fn update(&mut self, path: Option<&str>) -> Result<()> {
        // the client library only exposes a full update
        if let Some(path) = path {
            debug!("updating whole library (requested {})", path);
        }
        self.client.update().context("Failed to start library update")?;
        Ok(())
    }
}
