//! Fixed-rate frame loop around `Session::tick`.

use tokio::time::{interval, Duration, Instant, MissedTickBehavior};
use tracing::debug;

use super::{Session, SessionState};
use crate::input::InputCapture;

/// Tick `session` at `tick_hz` until it leaves `Running`. Before every tick
/// `script` gets the keyboard and the number of ticks run so far, so it can
/// press and release keys. Returns the total tick count.
pub async fn run<F>(session: &mut Session, tick_hz: u32, mut script: F) -> u64
where
    F: FnMut(&InputCapture, u64),
{
    session.start();

    let period = Duration::from_secs_f64(1.0 / f64::from(tick_hz.max(1)));
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last = Instant::now();

    while session.state() == SessionState::Running {
        ticker.tick().await;
        let now = Instant::now();
        let elapsed = now.duration_since(last).as_secs_f32();
        last = now;

        script(session.input(), session.ticks());
        session.tick(elapsed);
    }

    debug!(ticks = session.ticks(), "frame loop stopped");
    session.ticks()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{SessionConfig, SessionParts};

    #[tokio::test]
    async fn loop_runs_until_exit_key() {
        let mut session = Session::new(SessionConfig::solo(), SessionParts::default()).unwrap();

        let ticks = run(&mut session, 500, |keys, tick| {
            keys.key_down("w");
            if tick == 4 {
                keys.key_down("Escape");
            }
        })
        .await;

        assert_eq!(ticks, 5);
        assert_eq!(session.state(), SessionState::Exited);
    }

    #[tokio::test]
    async fn exited_session_is_not_restarted() {
        let mut session = Session::new(SessionConfig::solo(), SessionParts::default()).unwrap();
        session.start();
        session.exit();
        let ticks = run(&mut session, 500, |_, _| {}).await;
        assert_eq!(ticks, 0);
    }
}
