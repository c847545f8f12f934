//! Replay controller: the explore / replay state machine
//!
//! A non-zero reward switches the network from sensory-driven exploration to
//! a replay episode in which the recurrent term is active and the place cue
//! captured at onset is re-injected only inside fixed windows of episode time.
//! An episode ends either by completion (elapsed time past the episode
//! duration) or by abort (reward back to zero).

use crate::error::*;
use core::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Tolerance for comparing episode time against window edges
const TIME_EPSILON: f64 = 1e-9;

/// Half-open interval `(start, end]` of episode time (s)
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct CueWindow {
    /// Exclusive start (s)
    pub start: f64,
    /// Inclusive end (s)
    pub end: f64,
}

impl CueWindow {
    /// Create a window
    pub const fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Whether `elapsed` falls in `(start, end]`
    pub fn contains(&self, elapsed: f64) -> bool {
        elapsed > self.start + TIME_EPSILON && elapsed <= self.end + TIME_EPSILON
    }
}

/// Replay schedule parameters
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReplayParams {
    /// Episode length (s); the episode completes once elapsed time exceeds it
    pub duration: f64,
    /// Cue re-injection windows
    pub cue_windows: Vec<CueWindow>,
}

impl Default for ReplayParams {
    fn default() -> Self {
        Self {
            duration: 9.0,
            cue_windows: vec![
                CueWindow::new(1.0, 1.1),
                CueWindow::new(3.0, 3.1),
                CueWindow::new(5.0, 5.1),
                CueWindow::new(7.0, 7.1),
            ],
        }
    }
}

impl ReplayParams {
    /// Validate parameters
    pub fn validate(&self) -> Result<()> {
        require_positive("replay.duration", self.duration)?;
        for (i, w) in self.cue_windows.iter().enumerate() {
            if !(w.start >= 0.0 && w.end > w.start && w.end.is_finite()) {
                return Err(RuntimeError::invalid_parameter(
                    format!("replay.cue_windows[{}]", i),
                    format!("({}, {}]", w.start, w.end),
                    "0 <= start < end",
                ));
            }
        }
        Ok(())
    }

    /// Whether the cue is injected at `elapsed` seconds into an episode
    pub fn cue_active(&self, elapsed: f64) -> bool {
        self.cue_windows.iter().any(|w| w.contains(elapsed))
    }
}

/// Network operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Mode {
    /// Sensory-driven, no recurrent term
    Explore,
    /// Recurrent dynamics with scheduled cue pulses
    Replay,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Explore => f.write_str("explore"),
            Mode::Replay => f.write_str("replay"),
        }
    }
}

/// Progress of the current replay episode
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReplayEpisode {
    /// Whether an episode is running
    pub active: bool,
    /// Episode time (s)
    pub elapsed: f64,
}

/// Controller transitions reported to the caller
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ReplayEvent {
    /// Reward arrived; replay begins this tick
    Started,
    /// Reward withdrawn before the episode finished
    Aborted {
        /// Episode time reached (s)
        elapsed: f64,
    },
    /// Episode ran to completion; gains are reset
    Completed {
        /// Episode time reached (s)
        elapsed: f64,
    },
}

/// What the network must do this tick
#[derive(Debug, Clone, PartialEq)]
pub struct TickPlan {
    /// Dynamics to run
    pub mode: Mode,
    /// Whether the frozen cue is injected (replay only)
    pub cue_active: bool,
    /// Episode state after this tick's increment
    pub episode: ReplayEpisode,
    /// Transitions taken this tick
    pub events: Vec<ReplayEvent>,
}

impl TickPlan {
    fn explore(events: Vec<ReplayEvent>) -> Self {
        Self {
            mode: Mode::Explore,
            cue_active: false,
            episode: ReplayEpisode::default(),
            events,
        }
    }

    /// Whether the episode completed on this tick
    pub fn completed(&self) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e, ReplayEvent::Completed { .. }))
    }

    /// Whether an episode started on this tick
    pub fn started(&self) -> bool {
        self.events.iter().any(|e| matches!(e, ReplayEvent::Started))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
enum Phase {
    /// `armed` is false after a completed episode until the reward clears
    Explore { armed: bool },
    Replay { ticks: u64 },
}

/// Two-state replay controller
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ReplayController {
    phase: Phase,
}

impl Default for ReplayController {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplayController {
    /// Controller in explore mode, ready to replay
    pub const fn new() -> Self {
        Self {
            phase: Phase::Explore { armed: true },
        }
    }

    /// Current mode
    pub fn mode(&self) -> Mode {
        match self.phase {
            Phase::Explore { .. } => Mode::Explore,
            Phase::Replay { .. } => Mode::Replay,
        }
    }

    /// Current episode record
    pub fn episode(&self, dt: f64) -> ReplayEpisode {
        match self.phase {
            Phase::Explore { .. } => ReplayEpisode::default(),
            Phase::Replay { ticks } => ReplayEpisode {
                active: true,
                elapsed: ticks as f64 * dt,
            },
        }
    }

    /// Whether a reward will start a new episode
    pub fn is_armed(&self) -> bool {
        matches!(self.phase, Phase::Explore { armed: true })
    }

    /// Read the reward, take any transition, and plan this tick
    pub fn advance(&mut self, reward: u8, params: &ReplayParams, dt: f64) -> TickPlan {
        let mut events = Vec::new();
        let ticks = match self.phase {
            Phase::Explore { armed } => {
                if reward == 0 {
                    self.phase = Phase::Explore { armed: true };
                    return TickPlan::explore(events);
                }
                if !armed {
                    return TickPlan::explore(events);
                }
                events.push(ReplayEvent::Started);
                0
            }
            Phase::Replay { ticks } => {
                if reward == 0 {
                    self.phase = Phase::Explore { armed: true };
                    events.push(ReplayEvent::Aborted {
                        elapsed: ticks as f64 * dt,
                    });
                    return TickPlan::explore(events);
                }
                ticks
            }
        };

        let ticks = ticks + 1;
        let elapsed = ticks as f64 * dt;
        let cue_active = params.cue_active(elapsed);

        if elapsed > params.duration + TIME_EPSILON {
            self.phase = Phase::Explore { armed: false };
            events.push(ReplayEvent::Completed { elapsed });
        } else {
            self.phase = Phase::Replay { ticks };
        }

        TickPlan {
            mode: Mode::Replay,
            cue_active,
            episode: ReplayEpisode {
                active: true,
                elapsed,
            },
            events,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f64 = 0.01;

    #[test]
    fn test_default_schedule() {
        let params = ReplayParams::default();
        assert!(params.validate().is_ok());
        for t in [0.5, 1.0, 2.0, 3.0, 4.5, 8.0, 8.99] {
            assert!(!params.cue_active(t), "cue should be off at {}", t);
        }
        for t in [1.01, 1.05, 1.1, 3.05, 5.1, 7.02] {
            assert!(params.cue_active(t), "cue should be on at {}", t);
        }
    }

    #[test]
    fn test_invalid_params() {
        let params = ReplayParams {
            duration: 0.0,
            ..Default::default()
        };
        assert!(params.validate().is_err());

        let params = ReplayParams {
            cue_windows: vec![CueWindow::new(2.0, 1.0)],
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_stays_in_explore_without_reward() {
        let params = ReplayParams::default();
        let mut ctl = ReplayController::new();
        for _ in 0..10 {
            let plan = ctl.advance(0, &params, DT);
            assert_eq!(plan.mode, Mode::Explore);
            assert!(plan.events.is_empty());
            assert!(!plan.episode.active);
        }
    }

    #[test]
    fn test_reward_starts_replay_same_tick() {
        let params = ReplayParams::default();
        let mut ctl = ReplayController::new();
        let plan = ctl.advance(1, &params, DT);
        assert_eq!(plan.mode, Mode::Replay);
        assert!(plan.started());
        assert!((plan.episode.elapsed - DT).abs() < 1e-12);
        assert_eq!(ctl.mode(), Mode::Replay);
    }

    #[test]
    fn test_abort_on_reward_withdrawal() {
        let params = ReplayParams::default();
        let mut ctl = ReplayController::new();
        for _ in 0..50 {
            ctl.advance(1, &params, DT);
        }
        let plan = ctl.advance(0, &params, DT);
        assert_eq!(plan.mode, Mode::Explore);
        match plan.events.as_slice() {
            [ReplayEvent::Aborted { elapsed }] => assert!((elapsed - 0.5).abs() < 1e-9),
            other => panic!("unexpected events {:?}", other),
        }
        // re-armed immediately
        assert!(ctl.is_armed());
        assert!(ctl.advance(1, &params, DT).started());
    }

    #[test]
    fn test_cue_pulses_follow_elapsed_time() {
        let params = ReplayParams::default();
        let mut ctl = ReplayController::new();
        let mut on_ticks = Vec::new();
        for _ in 0..900 {
            let plan = ctl.advance(1, &params, DT);
            if plan.cue_active {
                on_ticks.push((plan.episode.elapsed * 100.0).round() as u64);
            }
        }
        // ten ticks per window: 101..=110, 301..=310, ...
        assert_eq!(on_ticks.len(), 40);
        assert_eq!(on_ticks.first(), Some(&101));
        assert!(on_ticks.contains(&110));
        assert!(!on_ticks.contains(&100));
        assert!(!on_ticks.contains(&111));
        assert_eq!(on_ticks.last(), Some(&710));
    }

    #[test]
    fn test_completion_and_rearm() {
        let params = ReplayParams::default();
        let mut ctl = ReplayController::new();
        let mut completed_at = None;
        for tick in 1..=1000u64 {
            let plan = ctl.advance(1, &params, DT);
            if plan.completed() {
                completed_at = Some(tick);
                assert_eq!(plan.mode, Mode::Replay);
                break;
            }
        }
        // 9.01s is the first elapsed time past 9s
        assert_eq!(completed_at, Some(901));
        assert_eq!(ctl.mode(), Mode::Explore);

        // reward still latched: no new episode
        let plan = ctl.advance(1, &params, DT);
        assert_eq!(plan.mode, Mode::Explore);
        assert!(plan.events.is_empty());
        assert!(!ctl.is_armed());

        // clearing the reward re-arms
        ctl.advance(0, &params, DT);
        assert!(ctl.is_armed());
        assert!(ctl.advance(2, &params, DT).started());
    }

    #[test]
    fn test_episode_record() {
        let params = ReplayParams::default();
        let mut ctl = ReplayController::new();
        assert_eq!(ctl.episode(DT), ReplayEpisode::default());
        for _ in 0..25 {
            ctl.advance(1, &params, DT);
        }
        let ep = ctl.episode(DT);
        assert!(ep.active);
        assert!((ep.elapsed - 0.25).abs() < 1e-12);
    }
}
