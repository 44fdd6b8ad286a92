use log::debug;
use std::io::Write;

/// Audible acknowledgment for a successful check-in.
pub trait CuePlayer {
    fn play(&self) -> anyhow::Result<()>;
}

/// Rings the terminal bell on stderr. stdout carries protocol traffic only.
pub struct TerminalBell;

impl CuePlayer for TerminalBell {
    fn play(&self) -> anyhow::Result<()> {
        let mut stderr = std::io::stderr();
        stderr.write_all(b"\x07")?;
        stderr.flush()?;
        Ok(())
    }
}

/// Plays the cue and swallows any failure.
pub fn play_best_effort(player: &dyn CuePlayer) {
    if let Err(e) = player.play() {
        debug!("event=cue_play module=cue status=error error={}", e);
    }
}
