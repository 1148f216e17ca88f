//! Audio that bypasses the player daemon: sound effects and recordings go
//! straight to the ALSA device through `aplay`/`arecord`.

use anyhow::{Context, Result};
use std::path::Path;
use std::process::{Child, Command, ExitStatus, Stdio};
use tracing::{debug, info, warn};

/// Local playback and recording processes owned by the player.
pub trait LocalAudio: Send {
    /// Start playing `file` in the background
    fn play(&mut self, file: &Path) -> Result<()>;
    /// Start recording `duration_secs` seconds into `file` in the background
    fn record(&mut self, file: &Path, duration_secs: u32) -> Result<()>;
    fn is_recording(&mut self) -> bool;
    /// Kill a running recording; true if there was one
    fn stop_recording(&mut self) -> bool;
    /// Kill recording and playback
    fn stop_all(&mut self);
}

/// `aplay`/`arecord` against one ALSA device
pub struct AlsaAudio {
    device: String,
    player: Option<Child>,
    recorder: Option<Child>,
}

impl AlsaAudio {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            player: None,
            recorder: None,
        }
    }
}

fn is_running(child: &mut Option<Child>) -> bool {
    match child {
        Some(c) => matches!(c.try_wait(), Ok(None)),
        None => false,
    }
}

fn kill(child: &mut Option<Child>, what: &str) -> bool {
    if !is_running(child) {
        *child = None;
        return false;
    }
    if let Some(mut c) = child.take() {
        if let Err(e) = c.kill() {
            warn!("failed to stop {}: {}", what, e);
        }
        // reap
        let _ = c.wait();
    }
    true
}

impl LocalAudio for AlsaAudio {
    fn play(&mut self, file: &Path) -> Result<()> {
        let child = Command::new("/usr/bin/aplay")
            .arg("-D")
            .arg(&self.device)
            .arg(file)
            .stdin(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to start aplay for {}", file.display()))?;
        debug!("aplay {} (pid {})", file.display(), child.id());
        self.player = Some(child);
        Ok(())
    }

    fn record(&mut self, file: &Path, duration_secs: u32) -> Result<()> {
        let child = Command::new("/usr/bin/arecord")
            .arg("-D")
            .arg(&self.device)
            .arg(format!("--duration={}", duration_secs))
            .args(["-f", "cd", "-vv"])
            .arg(file)
            .stdin(Stdio::null())
            .spawn()
            .with_context(|| format!("Failed to start arecord for {}", file.display()))?;
        info!("recording {}s into {}", duration_secs, file.display());
        self.recorder = Some(child);
        Ok(())
    }

    fn is_recording(&mut self) -> bool {
        is_running(&mut self.recorder)
    }

    fn stop_recording(&mut self) -> bool {
        kill(&mut self.recorder, "arecord")
    }

    fn stop_all(&mut self) {
        self.stop_recording();
        kill(&mut self.player, "aplay");
    }
}

/// Run `command` through `sh -c` inside `cwd` and wait for it.
pub fn run_shell(command: &str, cwd: &Path) -> Result<ExitStatus> {
    debug!("sh -c {:?}", command);
    let status = Command::new("sh")
        .arg("-c")
        .arg(command)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .status()
        .with_context(|| format!("Failed to execute {:?}", command))?;

    if !status.success() {
        warn!("{:?} exited with {}", command, status);
    }
    Ok(status)
}
