//! Cancellable timers backing countdowns and every delayed quiz event.
//!
//! Callbacks run on a spawned tokio task between await points, so a cancel
//! can never interrupt one halfway. Cancelling is idempotent and has no
//! effect once the timer already fired.

use std::collections::HashMap;
use std::future::Future;
use std::time::Duration;
use tokio::task::AbortHandle;
use tokio::time::sleep;

use crate::models::player::PlayerId;
use crate::models::turn::TurnId;

#[derive(Debug)]
pub struct TimerHandle {
    abort: AbortHandle,
}

impl TimerHandle {
    fn spawn<F>(future: F) -> Self
    where
        F: Future<Output = ()> + Send + 'static,
    {
        Self {
            abort: tokio::spawn(future).abort_handle(),
        }
    }

    pub fn cancel(&self) {
        self.abort.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.abort.is_finished()
    }
}

/// Runs `callback` once after `delay`.
pub fn schedule_once<F>(delay: Duration, callback: F) -> TimerHandle
where
    F: FnOnce() + Send + 'static,
{
    TimerHandle::spawn(async move {
        sleep(delay).await;
        callback();
    })
}

/// Counts `seconds` down, calling `on_tick` with the remaining value after
/// every `tick`. When zero is reached `on_timeout` runs exactly once and the
/// countdown stops.
pub fn start_countdown<T, E>(seconds: u32, tick: Duration, mut on_tick: T, on_timeout: E) -> TimerHandle
where
    T: FnMut(u32) + Send + 'static,
    E: FnOnce() + Send + 'static,
{
    TimerHandle::spawn(async move {
        let mut remaining = seconds;
        while remaining > 0 {
            sleep(tick).await;
            remaining -= 1;
            on_tick(remaining);
        }
        on_timeout();
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TimerSlot {
    Countdown,
    Opponent(PlayerId),
    GainDisplay(PlayerId),
    Advance,
    GuestAutoStart,
    HostJoin,
}

/// Timers are keyed by the turn that armed them (none for lobby timers) and
/// their slot, so re-arming a slot replaces the previous timer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerKey {
    pub turn: Option<TurnId>,
    pub slot: TimerSlot,
}

impl TimerKey {
    pub fn turn(turn: TurnId, slot: TimerSlot) -> Self {
        Self {
            turn: Some(turn),
            slot,
        }
    }

    pub fn lobby(slot: TimerSlot) -> Self {
        Self { turn: None, slot }
    }
}

/// Owns every live timer of a session. Dropping the registry cancels them all.
#[derive(Debug, Default)]
pub struct TimerRegistry {
    timers: HashMap<TimerKey, TimerHandle>,
}

impl TimerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: TimerKey, handle: TimerHandle) {
        self.timers.retain(|_, timer| !timer.is_finished());
        if let Some(previous) = self.timers.insert(key, handle) {
            previous.cancel();
        }
    }

    pub fn cancel(&mut self, key: &TimerKey) -> bool {
        match self.timers.remove(key) {
            Some(timer) => {
                timer.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancels every timer armed for `turn`. Returns how many were removed.
    pub fn cancel_turn(&mut self, turn: TurnId) -> usize {
        let keys: Vec<TimerKey> = self
            .timers
            .keys()
            .filter(|key| key.turn == Some(turn))
            .copied()
            .collect();
        for key in &keys {
            self.cancel(key);
        }
        keys.len()
    }

    pub fn cancel_all(&mut self) {
        for (_, timer) in self.timers.drain() {
            timer.cancel();
        }
    }

    pub fn len(&self) -> usize {
        self.timers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timers.is_empty()
    }
}

impl Drop for TimerRegistry {
    fn drop(&mut self) {
        self.cancel_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn recorder() -> (Arc<Mutex<Vec<u32>>>, Arc<AtomicUsize>) {
        (Arc::new(Mutex::new(Vec::new())), Arc::new(AtomicUsize::new(0)))
    }

    fn countdown(
        seconds: u32,
        ticks: &Arc<Mutex<Vec<u32>>>,
        timeouts: &Arc<AtomicUsize>,
    ) -> TimerHandle {
        let ticks = ticks.clone();
        let timeouts = timeouts.clone();
        start_countdown(
            seconds,
            Duration::from_secs(1),
            move |remaining| ticks.lock().unwrap().push(remaining),
            move || {
                timeouts.fetch_add(1, Ordering::SeqCst);
            },
        )
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_ticks_down_then_times_out_once() {
        let (ticks, timeouts) = recorder();
        let handle = countdown(3, &ticks, &timeouts);

        sleep(Duration::from_secs(10)).await;

        assert_eq!(*ticks.lock().unwrap(), vec![2, 1, 0]);
        assert_eq!(timeouts.load(Ordering::SeqCst), 1);
        assert!(handle.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_countdown_never_fires_again() {
        let (ticks, timeouts) = recorder();
        let handle = countdown(5, &ticks, &timeouts);

        sleep(Duration::from_millis(1500)).await;
        handle.cancel();
        handle.cancel();
        sleep(Duration::from_secs(10)).await;

        assert_eq!(*ticks.lock().unwrap(), vec![4]);
        assert_eq!(timeouts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_after_fire_has_no_effect() {
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = fired.clone();
        let handle = schedule_once(Duration::from_millis(800), move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        sleep(Duration::from_secs(1)).await;
        handle.cancel();
        handle.cancel();
        sleep(Duration::from_secs(1)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_second_countdown_times_out_immediately() {
        let (ticks, timeouts) = recorder();
        countdown(0, &ticks, &timeouts);

        sleep(Duration::from_millis(10)).await;

        assert!(ticks.lock().unwrap().is_empty());
        assert_eq!(timeouts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_turn_only_touches_that_turn() {
        let fired = Arc::new(Mutex::new(Vec::new()));
        let mut registry = TimerRegistry::new();

        for (turn, player) in [(1u64, 1u32), (1, 2), (2, 1)] {
            let fired = fired.clone();
            registry.insert(
                TimerKey::turn(TurnId(turn), TimerSlot::Opponent(PlayerId(player))),
                schedule_once(Duration::from_secs(1), move || {
                    fired.lock().unwrap().push((turn, player));
                }),
            );
        }

        assert_eq!(registry.cancel_turn(TurnId(1)), 2);
        sleep(Duration::from_secs(2)).await;

        assert_eq!(*fired.lock().unwrap(), vec![(2, 1)]);
    }

    #[tokio::test(start_paused = true)]
    async fn rearming_a_slot_replaces_the_previous_timer() {
        let fired = Arc::new(AtomicUsize::new(0));
        let mut registry = TimerRegistry::new();
        let key = TimerKey::lobby(TimerSlot::GuestAutoStart);

        for _ in 0..2 {
            let fired = fired.clone();
            registry.insert(
                key,
                schedule_once(Duration::from_secs(5), move || {
                    fired.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }
        sleep(Duration::from_secs(6)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn dropping_registry_cancels_everything() {
        let fired = Arc::new(AtomicUsize::new(0));
        {
            let mut registry = TimerRegistry::new();
            let counter = fired.clone();
            registry.insert(
                TimerKey::lobby(TimerSlot::HostJoin),
                schedule_once(Duration::from_secs(1), move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                }),
            );
        }
        sleep(Duration::from_secs(2)).await;

        assert_eq!(fired.load(Ordering::SeqCst), 0);
    }
}
