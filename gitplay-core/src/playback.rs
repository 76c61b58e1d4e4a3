//! Playback cursor and the per-tick stepping rules.
//!
//! The timer itself lives in [`Session`](crate::Session); this module decides
//! what one tick does so the rules can be tested without a clock.

use std::time::Duration;

/// The single current-commit cursor of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionCursor {
    pub current_index: usize,
    pub is_playing: bool,
    /// Commits per second.
    pub speed: u32,
}

impl SessionCursor {
    pub fn new(speed: u32) -> Self {
        Self {
            current_index: 0,
            is_playing: false,
            speed: speed.max(1),
        }
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(1000 / u64::from(self.speed.max(1)))
    }
}

/// Next speed in the 1, 2, 4, ... `max_speed`, 1 cycle.
pub fn next_speed(speed: u32, max_speed: u32) -> u32 {
    if speed < max_speed {
        speed.saturating_mul(2).min(max_speed)
    } else {
        1
    }
}

/// What a playback tick did to the cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Playback was cancelled (paused, seeked or not ready); stop quietly.
    Halted,
    /// The cursor sits on the last commit; playback is over.
    Finished,
    /// The cursor moved to `index`. `prefetch_from` is set when the next batch
    /// should be requested.
    Advanced {
        index: usize,
        prefetch_from: Option<usize>,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct PlaybackController {
    batch_size: usize,
    lookahead: usize,
    max_speed: u32,
}

impl PlaybackController {
    pub fn new(batch_size: usize, lookahead: usize, max_speed: u32) -> Self {
        Self {
            batch_size: batch_size.max(1),
            lookahead,
            max_speed,
        }
    }

    pub fn max_speed(&self) -> u32 {
        self.max_speed
    }

    /// Applies one tick to `cursor`. `is_fetched` reports whether a batch index
    /// is already cached.
    pub fn step(
        &self,
        cursor: &mut SessionCursor,
        ready: bool,
        commits_count: usize,
        is_fetched: impl Fn(usize) -> bool,
    ) -> Step {
        if !ready || !cursor.is_playing {
            return Step::Halted;
        }
        if cursor.current_index + 1 >= commits_count {
            cursor.is_playing = false;
            return Step::Finished;
        }

        cursor.current_index += 1;
        let index = cursor.current_index;
        Step::Advanced {
            index,
            prefetch_from: self.prefetch_from(index, commits_count, is_fetched),
        }
    }

    /// Start of the next batch once `index` is within `lookahead` of the end of
    /// its batch, unless that batch is cached or past the end of history.
    pub fn prefetch_from(
        &self,
        index: usize,
        commits_count: usize,
        is_fetched: impl Fn(usize) -> bool,
    ) -> Option<usize> {
        let next_batch = index / self.batch_size + 1;
        let upper_bound = next_batch * self.batch_size;
        if upper_bound - index > self.lookahead || upper_bound >= commits_count {
            return None;
        }
        if is_fetched(next_batch) {
            return None;
        }
        Some(upper_bound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn playing_at(index: usize) -> SessionCursor {
        SessionCursor {
            current_index: index,
            is_playing: true,
            speed: 4,
        }
    }

    #[test]
    fn test_speed_cycle_wraps_after_ceiling() {
        let mut speed = 1;
        let mut seen = vec![speed];
        for _ in 0..6 {
            speed = next_speed(speed, 32);
            seen.push(speed);
        }
        assert_eq!(seen, vec![1, 2, 4, 8, 16, 32, 1]);
    }

    #[test]
    fn test_tick_interval_follows_speed() {
        assert_eq!(SessionCursor::new(1).tick_interval(), Duration::from_millis(1000));
        assert_eq!(SessionCursor::new(4).tick_interval(), Duration::from_millis(250));
        assert_eq!(SessionCursor::new(32).tick_interval(), Duration::from_millis(31));
        assert_eq!(SessionCursor::new(0).speed, 1);
    }

    #[test]
    fn test_step_halts_when_not_playing_or_not_ready() {
        let controller = PlaybackController::new(100, 25, 32);
        let mut cursor = SessionCursor::new(4);
        assert_eq!(controller.step(&mut cursor, true, 10, |_| true), Step::Halted);

        let mut cursor = playing_at(0);
        assert_eq!(controller.step(&mut cursor, false, 10, |_| true), Step::Halted);
        assert_eq!(cursor.current_index, 0);
    }

    #[test]
    fn test_step_finishes_at_last_commit() {
        let controller = PlaybackController::new(100, 25, 32);
        let mut cursor = playing_at(8);

        assert!(matches!(
            controller.step(&mut cursor, true, 10, |_| true),
            Step::Advanced { index: 9, .. }
        ));
        assert_eq!(controller.step(&mut cursor, true, 10, |_| true), Step::Finished);
        assert_eq!(cursor.current_index, 9);
        assert!(!cursor.is_playing);
    }

    #[test]
    fn test_prefetch_at_lookahead_threshold() {
        let controller = PlaybackController::new(100, 25, 32);
        let mut cursor = playing_at(73);

        assert_eq!(
            controller.step(&mut cursor, true, 250, |_| false),
            Step::Advanced {
                index: 74,
                prefetch_from: None
            }
        );
        assert_eq!(
            controller.step(&mut cursor, true, 250, |_| false),
            Step::Advanced {
                index: 75,
                prefetch_from: Some(100)
            }
        );
    }

    #[test]
    fn test_no_prefetch_when_cached_or_past_end() {
        let controller = PlaybackController::new(100, 25, 32);
        assert_eq!(controller.prefetch_from(80, 250, |batch| batch == 1), None);
        assert_eq!(controller.prefetch_from(180, 250, |_| false), Some(200));
        assert_eq!(controller.prefetch_from(230, 250, |_| false), None);
        assert_eq!(controller.prefetch_from(80, 100, |_| false), None);
    }
}
