use glam::{Quat, Vec3};
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationInterpolation {
    Step,
    Linear,
}

#[derive(Debug, Clone)]
pub enum AnimationOutput {
    Vec3(Vec<Vec3>),
    Quat(Vec<Quat>),
}

#[derive(Debug, Clone)]
pub struct AnimationSampler {
    pub times: Vec<f32>,
    pub output: AnimationOutput,
    pub interpolation: AnimationInterpolation,
}

impl AnimationSampler {
    pub fn end_time(&self) -> f32 {
        self.times.last().copied().unwrap_or(0.0)
    }

    fn sample_indices(&self, time: f32) -> Option<(usize, usize, f32)> {
        if self.times.is_empty() {
            return None;
        }

        if self.times.len() == 1 {
            return Some((0, 0, 0.0));
        }

        let first = self.times[0];
        if time <= first {
            return Some((0, 0, 0.0));
        }

        let last_index = self.times.len() - 1;
        let last = self.times[last_index];
        if time >= last {
            return Some((last_index, last_index, 0.0));
        }

        match self
            .times
            .binary_search_by(|probe| probe.partial_cmp(&time).unwrap())
        {
            Ok(index) => Some((index, index, 0.0)),
            Err(upper) => {
                if upper == 0 || upper >= self.times.len() {
                    return None;
                }
                let lower = upper - 1;
                let start = self.times[lower];
                let end = self.times[upper];
                let span = end - start;
                let factor = if span.abs() < f32::EPSILON {
                    0.0
                } else {
                    ((time - start) / span).clamp(0.0, 1.0)
                };
                Some((lower, upper, factor))
            }
        }
    }

    pub fn sample_vec3(&self, time: f32) -> Option<Vec3> {
        let values = match &self.output {
            AnimationOutput::Vec3(values) => values,
            _ => return None,
        };

        let (lower, upper, factor) = self.sample_indices(time)?;

        if lower == upper || matches!(self.interpolation, AnimationInterpolation::Step) {
            return Some(values[lower]);
        }

        Some(values[lower].lerp(values[upper], factor))
    }

    pub fn sample_quat(&self, time: f32) -> Option<Quat> {
        let values = match &self.output {
            AnimationOutput::Quat(values) => values,
            _ => return None,
        };

        let (lower, upper, factor) = self.sample_indices(time)?;

        if lower == upper || matches!(self.interpolation, AnimationInterpolation::Step) {
            return Some(values[lower]);
        }

        let a = values[lower].normalize();
        let b = values[upper].normalize();
        Some(a.slerp(b, factor).normalize())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransformProperty {
    Translation,
    Rotation,
    Scale,
}

#[derive(Debug, Clone)]
pub struct AnimationChannel {
    pub sampler: AnimationSampler,
    pub entity: hecs::Entity,
    pub property: TransformProperty,
}

#[derive(Debug, Clone)]
pub struct AnimationClip {
    pub name: String,
    pub duration: f32,
    pub channels: Vec<AnimationChannel>,
}

impl AnimationClip {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            duration: 0.0,
            channels: Vec::new(),
        }
    }

    pub fn add_channel(&mut self, channel: AnimationChannel) {
        self.duration = self.duration.max(channel.sampler.end_time());
        self.channels.push(channel);
    }

    pub fn sample(&self, time: f32, updates: &mut HashMap<hecs::Entity, TransformUpdate>) {
        for channel in &self.channels {
            let entry = updates.entry(channel.entity).or_default();
            match channel.property {
                TransformProperty::Translation => {
                    if let Some(value) = channel.sampler.sample_vec3(time) {
                        entry.translation = Some(value);
                    }
                }
                TransformProperty::Rotation => {
                    if let Some(value) = channel.sampler.sample_quat(time) {
                        entry.rotation = Some(value);
                    }
                }
                TransformProperty::Scale => {
                    if let Some(value) = channel.sampler.sample_vec3(time) {
                        entry.scale = Some(value);
                    }
                }
            }
        }
    }
}

#[derive(Debug, Default, Clone)]
pub struct TransformUpdate {
    pub translation: Option<Vec3>,
    pub rotation: Option<Quat>,
    pub scale: Option<Vec3>,
}

/// Playback constrained to a sub-range of the clip, optionally looping only
/// within that sub-range.
#[derive(Debug, Clone, Copy)]
pub struct PlaybackWindow {
    pub start: f32,
    pub end: f32,
    pub looping: bool,
}

impl PlaybackWindow {
    fn span(&self) -> f32 {
        (self.end - self.start).max(0.0)
    }
}

/// Playback cursor for one clip.
///
/// With no window configured the cursor follows the whole clip, looping or
/// clamping at the end. With a window configured there are two independent
/// stop mechanisms: the per-advance boundary check (rewind for a looping
/// window, pause pinned at the end for a one-shot) and a wall-clock deadline
/// sized to the window span that forces the same outcome if the boundary
/// check is ever missed. Reconfiguring playback replaces the previous window
/// and its deadline, so stop mechanisms never accumulate across clicks.
#[derive(Debug, Clone)]
pub struct ActionState {
    pub time: f32,
    pub speed: f32,
    pub playing: bool,
    pub looping: bool,
    window: Option<PlaybackWindow>,
    deadline: Option<Instant>,
}

impl ActionState {
    pub fn new() -> Self {
        Self {
            time: 0.0,
            speed: 1.0,
            playing: true,
            looping: true,
            window: None,
            deadline: None,
        }
    }

    pub fn stopped() -> Self {
        Self {
            playing: false,
            ..Self::new()
        }
    }

    pub fn is_running(&self) -> bool {
        self.playing
    }

    pub fn window(&self) -> Option<PlaybackWindow> {
        self.window
    }

    /// Stop and rewind. The configured window, if any, is kept so a later
    /// restart replays the same range.
    pub fn stop(&mut self) {
        self.playing = false;
        self.time = self.window.map(|w| w.start).unwrap_or(0.0);
        self.deadline = None;
    }

    /// Whole-clip playback from the beginning.
    pub fn play_from_start(&mut self) {
        self.window = None;
        self.deadline = None;
        self.time = 0.0;
        self.playing = true;
    }

    /// Windowed playback: cursor to `window.start`, then play. Replaces any
    /// previously configured window.
    pub fn play_window(&mut self, window: PlaybackWindow, now: Instant) {
        self.time = window.start;
        self.playing = true;
        self.deadline = Some(now + Duration::from_secs_f32(window.span().max(0.001)));
        self.window = Some(window);
    }

    /// Advance the cursor by `dt * speed` seconds. Returns true when a
    /// one-shot playback finished during this call.
    pub fn advance(&mut self, dt: f32, clip_duration: f32, now: Instant) -> bool {
        if !self.playing {
            return false;
        }

        // Fallback stop: the deadline fires even if the boundary check below
        // never observes the crossing.
        if let (Some(window), Some(deadline)) = (self.window, self.deadline) {
            if now >= deadline {
                if window.looping {
                    self.time = window.start;
                    self.deadline = Some(now + Duration::from_secs_f32(window.span().max(0.001)));
                } else {
                    self.time = window.end;
                    self.playing = false;
                    self.deadline = None;
                    return true;
                }
            }
        }

        self.time += dt * self.speed;

        if let Some(window) = self.window {
            if self.time >= window.end {
                if window.looping {
                    self.time = window.start;
                    // Keep the backup aligned with the rewound iteration.
                    self.deadline = Some(now + Duration::from_secs_f32(window.span().max(0.001)));
                } else {
                    self.time = window.end;
                    self.playing = false;
                    self.deadline = None;
                    return true;
                }
            }
            return false;
        }

        let duration = clip_duration.max(0.0);
        if duration > 0.0 {
            if self.looping {
                self.time = self.time.rem_euclid(duration);
            } else if self.time >= duration {
                self.time = duration;
                self.playing = false;
                return true;
            }
        }
        false
    }
}

impl Default for ActionState {
    fn default() -> Self {
        Self::new()
    }
}
