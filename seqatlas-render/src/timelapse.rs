//! Year-by-year time-lapse over the geo map
//!
//! Playing steps the current year by one on a fixed interval from `time_min`
//! to `time_max` inclusive, pushing a [`TimeFrame`] to the target on every
//! step, and stops by itself at `time_max`. `pause` and `reset_time` cancel
//! the pending step.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use tokio::task::JoinHandle;

pub const DEFAULT_SPEED: Duration = Duration::from_millis(1000);

#[derive(Debug, Clone, PartialEq, Error)]
pub enum TimeLapseError {
    #[error("year {year} outside time range [{min}, {max}]")]
    YearOutOfRange { year: i32, min: i32, max: i32 },
    #[error("invalid time range: {min} > {max}")]
    InvalidRange { min: i32, max: i32 },
    #[error("similarity threshold {0} outside [0, 100]")]
    SimilarityOutOfRange(f64),
    #[error("step interval must be positive")]
    InvalidSpeed,
    #[error("time-lapse needs a running tokio runtime")]
    NoRuntime,
}

/// What the target should draw
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeFrame {
    /// Active year filter; `None` shows every year
    pub year: Option<i32>,
    /// Minimum similarity, as a fraction in `[0, 1]`
    pub similarity_threshold: f64,
}

impl Default for TimeFrame {
    fn default() -> Self {
        Self {
            year: None,
            similarity_threshold: 0.0,
        }
    }
}

/// Receives a frame on every state change
pub trait TimeLapseTarget: Send + 'static {
    fn apply_frame(&mut self, frame: &TimeFrame);
}

#[derive(Debug)]
struct State {
    year: Option<i32>,
    time_min: i32,
    time_max: i32,
    threshold: f64,
    speed: Duration,
    playing: bool,
    /// Bumped on every play so a stale task exits on its next step
    generation: u64,
}

impl State {
    fn frame(&self) -> TimeFrame {
        TimeFrame {
            year: self.year,
            similarity_threshold: self.threshold,
        }
    }
}

pub struct TimeLapseController<T: TimeLapseTarget> {
    target: Arc<Mutex<T>>,
    state: Arc<Mutex<State>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl<T: TimeLapseTarget> TimeLapseController<T> {
    pub fn new(target: Arc<Mutex<T>>, time_min: i32, time_max: i32) -> Result<Self, TimeLapseError> {
        if time_min > time_max {
            return Err(TimeLapseError::InvalidRange {
                min: time_min,
                max: time_max,
            });
        }
        Ok(Self {
            target,
            state: Arc::new(Mutex::new(State {
                year: None,
                time_min,
                time_max,
                threshold: 0.0,
                speed: DEFAULT_SPEED,
                playing: false,
                generation: 0,
            })),
            task: Mutex::new(None),
        })
    }

    pub fn target(&self) -> &Arc<Mutex<T>> {
        &self.target
    }

    pub fn is_playing(&self) -> bool {
        self.state.lock().playing
    }

    pub fn current_year(&self) -> Option<i32> {
        self.state.lock().year
    }

    pub fn time_range(&self) -> (i32, i32) {
        let s = self.state.lock();
        (s.time_min, s.time_max)
    }

    pub fn speed(&self) -> Duration {
        self.state.lock().speed
    }

    pub fn frame(&self) -> TimeFrame {
        self.state.lock().frame()
    }

    // state lock is always released before the target is touched
    fn redraw(&self, frame: TimeFrame) {
        self.target.lock().apply_frame(&frame);
    }

    /// Start stepping. A no-op when already playing; when the current year
    /// is already at `time_max` playback stops immediately.
    pub fn play(&self) -> Result<(), TimeLapseError> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| TimeLapseError::NoRuntime)?;

        let (start_frame, generation, at_end) = {
            let mut s = self.state.lock();
            if s.playing {
                return Ok(());
            }
            let mut start_frame = None;
            if s.year.is_none() {
                s.year = Some(s.time_min);
                start_frame = Some(s.frame());
            }
            let at_end = s.year.map_or(false, |y| y >= s.time_max);
            if !at_end {
                s.playing = true;
                s.generation += 1;
            }
            (start_frame, s.generation, at_end)
        };

        if let Some(frame) = start_frame {
            self.redraw(frame);
        }
        if at_end {
            log::debug!("Time-lapse already at the end of its range; not starting");
            return Ok(());
        }

        log::info!("Time-lapse playing");
        let state = Arc::clone(&self.state);
        let target = Arc::clone(&self.target);
        let task = handle.spawn(async move {
            loop {
                let speed = state.lock().speed;
                tokio::time::sleep(speed).await;

                let (frame, finished) = {
                    let mut s = state.lock();
                    if !s.playing || s.generation != generation {
                        return;
                    }
                    let next = s.year.map_or(s.time_min, |y| y + 1).min(s.time_max);
                    s.year = Some(next);
                    if next >= s.time_max {
                        s.playing = false;
                    }
                    (s.frame(), !s.playing)
                };
                target.lock().apply_frame(&frame);
                if finished {
                    log::info!("Time-lapse reached {:?}; stopped", frame.year);
                    return;
                }
            }
        });

        if let Some(previous) = self.task.lock().replace(task) {
            previous.abort();
        }
        Ok(())
    }

    /// Stop stepping; the current year stays
    pub fn pause(&self) {
        let was_playing = {
            let mut s = self.state.lock();
            std::mem::replace(&mut s.playing, false)
        };
        if let Some(task) = self.task.lock().take() {
            task.abort();
        }
        if was_playing {
            log::info!("Time-lapse paused at {:?}", self.current_year());
        }
    }

    /// Stop and clear the year filter
    pub fn reset_time(&self) {
        self.pause();
        let frame = {
            let mut s = self.state.lock();
            s.year = None;
            s.frame()
        };
        self.redraw(frame);
    }

    /// Jump to `year`; out-of-range years leave the state untouched
    pub fn set_year(&self, year: i32) -> Result<(), TimeLapseError> {
        let frame = {
            let mut s = self.state.lock();
            if year < s.time_min || year > s.time_max {
                return Err(TimeLapseError::YearOutOfRange {
                    year,
                    min: s.time_min,
                    max: s.time_max,
                });
            }
            s.year = Some(year);
            s.frame()
        };
        self.redraw(frame);
        Ok(())
    }

    /// Similarity threshold in percent
    pub fn set_similarity(&self, percent: f64) -> Result<(), TimeLapseError> {
        if !(0.0..=100.0).contains(&percent) {
            return Err(TimeLapseError::SimilarityOutOfRange(percent));
        }
        let frame = {
            let mut s = self.state.lock();
            s.threshold = percent / 100.0;
            s.frame()
        };
        self.redraw(frame);
        Ok(())
    }

    /// Replace the year range; the current year is clamped into it
    pub fn set_time_range(&self, min: i32, max: i32) -> Result<(), TimeLapseError> {
        if min > max {
            return Err(TimeLapseError::InvalidRange { min, max });
        }
        let frame = {
            let mut s = self.state.lock();
            s.time_min = min;
            s.time_max = max;
            s.year = s.year.map(|y| y.clamp(min, max));
            s.frame()
        };
        self.redraw(frame);
        Ok(())
    }

    pub fn set_speed(&self, speed: Duration) -> Result<(), TimeLapseError> {
        if speed.is_zero() {
            return Err(TimeLapseError::InvalidSpeed);
        }
        self.state.lock().speed = speed;
        Ok(())
    }
}

impl<T: TimeLapseTarget> Drop for TimeLapseController<T> {
    fn drop(&mut self) {
        if let Some(task) = self.task.get_mut().take() {
            task.abort();
        }
    }
}
