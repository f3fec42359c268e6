//! Real-time playback of the simulator's virtual timeline.
//!
//! The simulator never sleeps; it only knows its next deadline. This module
//! waits for that deadline on the Tokio clock (scaled by `simulator.speed`),
//! advances the session to it, and hands each newly emitted line to the
//! caller as it appears.

use guidepath_core::config::Config;
use guidepath_core::session::{LearningSession, SessionEvent};
use guidepath_core::simulator::TerminalLine;
use std::time::Duration;

#[derive(Clone, Copy)]
pub struct Pacing<'a> {
    config: &'a Config,
    instant: bool,
}

impl<'a> Pacing<'a> {
    pub fn new(config: &'a Config, instant: bool) -> Self {
        Self { config, instant }
    }

    /// Wall-clock wait for `virtual_ms` of simulated time.
    pub fn wait(&self, virtual_ms: u64) -> Duration {
        if self.instant {
            Duration::ZERO
        } else {
            Duration::from_millis(self.config.scaled_delay_ms(virtual_ms))
        }
    }
}

#[derive(Debug, Default)]
pub struct Played {
    pub lines: Vec<TerminalLine>,
    pub events: Vec<SessionEvent>,
}

/// Play the running command until its output has finished.
///
/// Background timers scheduled by the command (a service coming up, say)
/// are left pending.
pub async fn play_foreground<F>(
    session: &mut LearningSession,
    pacing: Pacing<'_>,
    mut on_line: F,
) -> Played
where
    F: FnMut(&TerminalLine),
{
    let mut played = Played::default();
    flush(session, &mut played, &mut on_line);

    loop {
        let Some(sim) = session.simulator() else {
            break;
        };
        if !sim.is_busy() {
            break;
        }
        let Some(deadline) = sim.next_deadline() else {
            break;
        };
        let wait = pacing.wait(deadline.saturating_sub(sim.now_ms()));
        if !wait.is_zero() {
            tokio::time::sleep(wait).await;
        }
        played.events.extend(session.advance_to(deadline));
        flush(session, &mut played, &mut on_line);
    }
    played
}

/// Jump to the next pending timer and fire it.
pub fn fire_background(session: &mut LearningSession) -> Vec<SessionEvent> {
    match session.simulator().and_then(|s| s.next_deadline()) {
        Some(deadline) => session.advance_to(deadline),
        None => Vec::new(),
    }
}

/// Wall-clock wait until the next background timer, if any.
pub fn until_next_timer(session: &LearningSession, pacing: Pacing<'_>) -> Option<Duration> {
    let sim = session.simulator()?;
    let deadline = sim.next_deadline()?;
    Some(pacing.wait(deadline.saturating_sub(sim.now_ms())))
}

fn flush<F>(session: &mut LearningSession, played: &mut Played, on_line: &mut F)
where
    F: FnMut(&TerminalLine),
{
    let Some(sim) = session.simulator_mut() else {
        return;
    };
    for line in sim.drain_new_lines() {
        on_line(&line);
        played.lines.push(line);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use guidepath_core::catalog::Catalog;
    use guidepath_core::gate::{FreemiumGate, MemoryLedger, PlanTier};
    use guidepath_core::progress::MemoryProgressStore;
    use std::sync::Arc;

    fn session(category: &str, module: &str) -> LearningSession {
        let gate = FreemiumGate::new(Arc::new(MemoryLedger::new()), PlanTier::Free, 3, "t");
        let mut s = LearningSession::start(
            Arc::new(Catalog::builtin()),
            Arc::new(MemoryProgressStore::new()),
            gate,
            category,
            module,
        )
        .unwrap();
        s.open_simulator().unwrap();
        s
    }

    #[tokio::test]
    async fn instant_playback_completes_step() {
        let config = Config::new("t");
        let mut s = session("containers", "docker-compose-basics");
        s.submit("docker --version").unwrap();

        let mut seen = 0;
        let played = play_foreground(&mut s, Pacing::new(&config, true), |_| seen += 1).await;

        assert_eq!(seen, played.lines.len());
        assert_eq!(played.lines[0].text, "docker --version");
        assert!(played.lines.len() > 1);
        assert!(played
            .events
            .contains(&SessionEvent::Advanced { index: 1 }));
        assert!(!s.simulator().unwrap().is_busy());
    }

    #[tokio::test]
    async fn real_time_playback_reaches_the_same_end() {
        let mut config = Config::new("t");
        config.simulator.speed = 0.01;
        let mut s = session("version-control", "git-first-commit");
        s.submit("git status").unwrap();

        let played = play_foreground(&mut s, Pacing::new(&config, false), |_| {}).await;
        assert!(played.lines.len() > 1);
        assert!(played.events.is_empty());
        assert!(!s.simulator().unwrap().is_busy());
    }

    #[test]
    fn instant_pacing_never_waits() {
        let config = Config::new("t");
        assert_eq!(Pacing::new(&config, true).wait(900), Duration::ZERO);
        assert_eq!(
            Pacing::new(&config, false).wait(900),
            Duration::from_millis(900)
        );
    }

    #[tokio::test]
    async fn background_timers_fire_after_foreground() {
        let config = Config::new("t");
        let mut s = session("containers", "docker-compose-basics");
        s.submit("docker-compose up -d").unwrap();
        play_foreground(&mut s, Pacing::new(&config, true), |_| {}).await;

        while until_next_timer(&s, Pacing::new(&config, true)).is_some() {
            fire_background(&mut s);
        }
        assert!(s.simulator().unwrap().next_deadline().is_none());
    }
}
