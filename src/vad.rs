//! Energy-gated voice activity detection (SPEC_FULL.md §4.3).
//!
//! A stateful, frame-at-a-time processor driven by a plain energy threshold
//! rather than a neural detector (no bundled model, per SPEC_FULL.md's
//! Non-goals). Speech offsets get a redemption-time hangover, modeled below
//! as the `TRAILING` state, so a brief dip below threshold mid-utterance
//! doesn't immediately cut a segment short.

use crate::config::VadConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VadState {
    Silence,
    Candidate,
    Active,
    Trailing,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VadFrameResult {
    pub state: VadState,
    /// True for frames the state machine currently classifies as speech
    /// (`CANDIDATE`/`ACTIVE`/`TRAILING`). Frames preceding a confirmed onset
    /// are reported unvoiced here; retroactively flagging them active is the
    /// caller's job once a `CANDIDATE` run is confirmed (see
    /// [`Self::pre_buffer_cap`] and `Session`'s replay/backfill path).
    pub is_voiced: bool,
}

/// Frame-at-a-time energy state machine:
/// `SILENCE -> CANDIDATE -> ACTIVE -> TRAILING -> SILENCE`.
///
/// A `CANDIDATE` run must persist for `min_sound_duration_s` before being
/// promoted to `ACTIVE`; once active, energy dropping below threshold starts
/// a `TRAILING` countdown of `post_buffer_s` before falling back to silence.
pub struct Vad {
    config: VadConfig,
    frame_duration_s: f32,
    state: VadState,
    candidate_frames: usize,
    trailing_frames_left: usize,
    pre_buffer_cap: usize,
}

impl Vad {
    pub fn new(config: VadConfig, frame_duration_s: f32) -> Self {
        let pre_buffer_cap = ((config.pre_buffer_s / frame_duration_s).ceil() as usize).max(1);
        Self {
            config,
            frame_duration_s,
            state: VadState::Silence,
            candidate_frames: 0,
            trailing_frames_left: 0,
            pre_buffer_cap,
        }
    }

    pub fn reset(&mut self) {
        self.state = VadState::Silence;
        self.candidate_frames = 0;
        self.trailing_frames_left = 0;
    }

    /// How many frames of `pre_buffer_s` history a caller should retain so
    /// it can retroactively commit them once a `CANDIDATE` run is confirmed.
    pub fn pre_buffer_cap(&self) -> usize {
        self.pre_buffer_cap
    }

    /// Feeds one frame's RMS energy through the state machine. When VAD is
    /// disabled in config every frame is reported voiced unconditionally.
    pub fn process_energy(&mut self, rms_energy: f32) -> VadFrameResult {
        if !self.config.enabled {
            return VadFrameResult {
                state: VadState::Active,
                is_voiced: true,
            };
        }

        let above = rms_energy >= self.config.energy_threshold;
        let min_frames =
            ((self.config.min_sound_duration_s / self.frame_duration_s).ceil() as usize).max(1);
        let post_frames =
            ((self.config.post_buffer_s / self.frame_duration_s).ceil() as usize).max(1);

        match self.state {
            VadState::Silence => {
                if above {
                    self.state = VadState::Candidate;
                    self.candidate_frames = 1;
                }
            }
            VadState::Candidate => {
                if above {
                    self.candidate_frames += 1;
                    if self.candidate_frames >= min_frames {
                        self.state = VadState::Active;
                    }
                } else {
                    self.state = VadState::Silence;
                    self.candidate_frames = 0;
                }
            }
            VadState::Active => {
                if !above {
                    self.state = VadState::Trailing;
                    self.trailing_frames_left = post_frames;
                }
            }
            VadState::Trailing => {
                if above {
                    self.state = VadState::Active;
                } else {
                    self.trailing_frames_left = self.trailing_frames_left.saturating_sub(1);
                    if self.trailing_frames_left == 0 {
                        self.state = VadState::Silence;
                    }
                }
            }
        }

        let is_voiced = matches!(
            self.state,
            VadState::Candidate | VadState::Active | VadState::Trailing
        );
        VadFrameResult {
            state: self.state,
            is_voiced,
        }
    }

    pub fn state(&self) -> VadState {
        self.state
    }
}
