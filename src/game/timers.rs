//! Per-session timer tasks
//!
//! Each session owns up to three timers: the post-formation auto-start
//! delay, the fixed-rate tick interval and the absolute session timeout.
//! Timers never touch session state themselves; they only post a
//! [`SessionEvent`] back to the lobby actor, which re-checks the session
//! before acting on it.

use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};

use crate::lobby::LobbyEvent;

use super::GameId;

/// Timer callbacks delivered to the lobby
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    AutoStart,
    Tick,
    Timeout,
}

/// Cancellable timer handles for one session
#[derive(Debug)]
pub struct SessionTimers {
    game_id: GameId,
    events: mpsc::Sender<LobbyEvent>,
    auto_start: Option<JoinHandle<()>>,
    ticker: Option<JoinHandle<()>>,
    timeout: Option<JoinHandle<()>>,
}

impl SessionTimers {
    pub fn new(game_id: GameId, events: mpsc::Sender<LobbyEvent>) -> Self {
        Self {
            game_id,
            events,
            auto_start: None,
            ticker: None,
            timeout: None,
        }
    }

    /// Fire `AutoStart` once after `delay`
    pub fn schedule_auto_start(&mut self, delay: Duration) {
        cancel(&mut self.auto_start);
        self.auto_start = Some(self.spawn_once(delay, SessionEvent::AutoStart));
    }

    /// Fire `Tick` every `period`, first tick one period from now
    pub fn start_ticking(&mut self, period: Duration) {
        cancel(&mut self.ticker);

        let events = self.events.clone();
        let game_id = self.game_id;
        self.ticker = Some(tokio::spawn(async move {
            let mut ticks = interval_at(Instant::now() + period, period);
            ticks.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                ticks.tick().await;
                let event = LobbyEvent::Session {
                    game_id,
                    event: SessionEvent::Tick,
                };
                if events.send(event).await.is_err() {
                    break;
                }
            }
        }));
    }

    /// Fire `Timeout` once after `after`
    pub fn schedule_timeout(&mut self, after: Duration) {
        cancel(&mut self.timeout);
        self.timeout = Some(self.spawn_once(after, SessionEvent::Timeout));
    }

    pub fn cancel_auto_start(&mut self) {
        cancel(&mut self.auto_start);
    }

    /// Abort every pending timer
    pub fn cancel_all(&mut self) {
        cancel(&mut self.auto_start);
        cancel(&mut self.ticker);
        cancel(&mut self.timeout);
    }

    /// True when no timer is pending
    #[cfg(test)]
    pub fn is_idle(&self) -> bool {
        self.auto_start.is_none() && self.ticker.is_none() && self.timeout.is_none()
    }

    #[cfg(test)]
    pub fn is_ticking(&self) -> bool {
        self.ticker.is_some()
    }

    fn spawn_once(&self, delay: Duration, event: SessionEvent) -> JoinHandle<()> {
        let events = self.events.clone();
        let game_id = self.game_id;
        tokio::spawn(async move {
            sleep(delay).await;
            let _ = events.send(LobbyEvent::Session { game_id, event }).await;
        })
    }
}

impl Drop for SessionTimers {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

fn cancel(handle: &mut Option<JoinHandle<()>>) {
    if let Some(handle) = handle.take() {
        handle.abort();
    }
}
