use log::debug;

use crate::config::{Edge, TriggerMode};

/// Outcome of feeding one sample to the trigger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerDecision {
    /// Window not complete yet, keep consuming samples.
    Capturing,
    /// Post-roll finished: the window is safe to read and acquisition should pause.
    Complete,
}

impl TriggerDecision {
    pub fn buffer_ready(self) -> bool {
        matches!(self, TriggerDecision::Complete)
    }

    pub fn continue_work(self) -> bool {
        matches!(self, TriggerDecision::Capturing)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TriggerPhase {
    LeadIn,
    PreRoll,
    Armed,
    PostRoll,
    Done,
}

/// Edge/level trigger with hysteresis, auto-leveling and pre/post windowing.
///
/// The trigger only decides; it never sees buffer memory. A window is
/// `buffer_size` samples long: `trigger_position` of them precede the
/// trigger sample, the rest (trigger sample included) follow it.
#[derive(Clone, Debug)]
pub struct Trigger {
    mode: TriggerMode,
    seed: u16,
    threshold: u16,
    hysteresis: u16,
    fired: bool,
    ready_to_trigger: bool,
    first_sample: bool,
    prev_sample: u16,
    pre_count: usize,
    post_count: usize,
    buffer_size: usize,
    trigger_position: usize,
    auto_level: f32,
    auto_speed: f32,
}

impl Trigger {
    pub fn new(buffer_size: usize, trigger_position: usize) -> Self {
        let buffer_size = buffer_size.max(2);
        let mut trigger = Self {
            mode: TriggerMode::Free,
            seed: 2048,
            threshold: 2048,
            hysteresis: 2048 / 40,
            fired: false,
            ready_to_trigger: false,
            first_sample: true,
            prev_sample: 2048,
            pre_count: 0,
            post_count: 0,
            buffer_size,
            trigger_position: trigger_position.clamp(1, buffer_size - 1),
            auto_level: 2048.0,
            auto_speed: 0.002,
        };
        trigger.reset();
        trigger
    }

    /// Configure for a new run. Hysteresis is fixed here at 2.5% of the seed
    /// threshold and is not recomputed when the auto-level drifts.
    pub fn start(&mut self, mode: TriggerMode, threshold: u16, auto_speed: f32) {
        self.mode = mode;
        self.seed = threshold;
        self.hysteresis = threshold / 40;
        self.auto_speed = auto_speed;
        self.reset_level();
    }

    /// Clear flags and counters; mode and auto-level survive.
    pub fn reset(&mut self) {
        self.fired = false;
        self.ready_to_trigger = false;
        self.pre_count = 0;
        self.post_count = 0;
        self.prev_sample = self.threshold;
    }

    /// Like `reset`, and also return the auto-level to the seed and go back to lead-in.
    pub fn reset_level(&mut self) {
        self.first_sample = true;
        self.threshold = self.seed;
        self.auto_level = f32::from(self.seed);
        self.reset();
    }

    pub fn evaluate(&mut self, sample: u16) -> TriggerDecision {
        if self.first_sample {
            // Lead-in: remember the sample, it is the first of the pre-roll.
            self.first_sample = false;
            self.prev_sample = sample;
            self.pre_count = 1;
            return TriggerDecision::Capturing;
        }

        self.update_auto_level(sample);

        if self.fired {
            self.post_count = self.post_count.saturating_add(1);
            return self.post_roll_decision();
        }

        if self.pre_count < self.trigger_position {
            self.pre_count += 1;
            self.prev_sample = sample;
            return TriggerDecision::Capturing;
        }

        let condition = match self.mode.edge() {
            None => true,
            Some(edge) => self.detect_edge(edge, sample),
        };
        self.prev_sample = sample;

        if condition {
            self.fired = true;
            self.post_count = 1;
            debug!(
                "trigger fired ({:?}) at sample {} threshold {} hysteresis {}",
                self.mode, sample, self.threshold, self.hysteresis
            );
            return self.post_roll_decision();
        }
        TriggerDecision::Capturing
    }

    fn post_roll_decision(&self) -> TriggerDecision {
        if self.post_count >= self.post_roll_len() {
            TriggerDecision::Complete
        } else {
            TriggerDecision::Capturing
        }
    }

    // Two-step Schmitt detector: the signal has to visit the far side of the
    // band before a crossing of the near side counts.
    fn detect_edge(&mut self, edge: Edge, sample: u16) -> bool {
        let low = i32::from(self.threshold) - i32::from(self.hysteresis);
        let high = i32::from(self.threshold) + i32::from(self.hysteresis);
        let prev = i32::from(self.prev_sample);
        let current = i32::from(sample);

        let (arms, fires) = match edge {
            Edge::Rising => (current <= low, prev < high && current >= high),
            Edge::Falling => (current >= high, prev > low && current <= low),
        };

        if !self.ready_to_trigger && arms {
            self.ready_to_trigger = true;
            return false;
        }
        if self.ready_to_trigger && fires {
            self.ready_to_trigger = false;
            return true;
        }
        false
    }

    fn update_auto_level(&mut self, sample: u16) {
        let speed = self.auto_speed.clamp(0.0, 1.0);
        self.auto_level = f32::from(sample) * speed + self.auto_level * (1.0 - speed);
        if self.mode.follows_auto_level() {
            self.threshold = self.auto_level as u16;
        }
    }

    fn post_roll_len(&self) -> usize {
        self.buffer_size - self.trigger_position
    }

    pub fn phase(&self) -> TriggerPhase {
        if self.first_sample {
            TriggerPhase::LeadIn
        } else if self.fired && self.post_count >= self.post_roll_len() {
            TriggerPhase::Done
        } else if self.fired {
            TriggerPhase::PostRoll
        } else if self.pre_count < self.trigger_position {
            TriggerPhase::PreRoll
        } else {
            TriggerPhase::Armed
        }
    }

    pub fn mode(&self) -> TriggerMode {
        self.mode
    }

    pub fn is_fired(&self) -> bool {
        self.fired
    }

    pub fn threshold(&self) -> u16 {
        self.threshold
    }

    pub fn hysteresis(&self) -> u16 {
        self.hysteresis
    }

    pub fn auto_level(&self) -> f32 {
        self.auto_level
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn trigger_position(&self) -> usize {
        self.trigger_position
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BUFFER_SIZE, TRIGGER_POSITION};
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn trigger(mode: TriggerMode, level: u16, speed: f32) -> Trigger {
        let mut t = Trigger::new(BUFFER_SIZE, TRIGGER_POSITION);
        t.start(mode, level, speed);
        t
    }

    #[test]
    fn free_run_completes_after_one_window() {
        let mut t = trigger(TriggerMode::Free, 2048, 0.002);
        assert_eq!(t.phase(), TriggerPhase::LeadIn);
        for n in 1..BUFFER_SIZE {
            assert_eq!(t.evaluate(1000), TriggerDecision::Capturing, "sample {n}");
            assert_eq!(t.is_fired(), n > TRIGGER_POSITION, "sample {n}");
        }
        let last = t.evaluate(1000);
        assert!(last.buffer_ready());
        assert!(!last.continue_work());
        assert_eq!(t.phase(), TriggerPhase::Done);
    }

    #[test]
    fn phases_follow_capture_lifecycle() {
        let mut t = trigger(TriggerMode::FIXED_RISE, 2000, 0.002);
        t.evaluate(1000);
        assert_eq!(t.phase(), TriggerPhase::PreRoll);
        for _ in 1..TRIGGER_POSITION {
            t.evaluate(1000);
        }
        assert_eq!(t.phase(), TriggerPhase::Armed);
        t.evaluate(1000);
        t.evaluate(3000);
        assert_eq!(t.phase(), TriggerPhase::PostRoll);
    }

    #[test]
    fn rising_ramp_fires_once() {
        let mut t = trigger(TriggerMode::FIXED_RISE, 2000, 0.002);
        assert_eq!(t.hysteresis(), 50);
        for _ in 0..TRIGGER_POSITION {
            t.evaluate(1000);
        }
        let mut fired_at = Vec::new();
        let mut complete_at = None;
        for (i, v) in (1000u16..=3000).step_by(10).enumerate() {
            let was_fired = t.is_fired();
            let decision = t.evaluate(v);
            if t.is_fired() && !was_fired {
                fired_at.push(v);
            }
            if decision.buffer_ready() && complete_at.is_none() {
                complete_at = Some(i);
            }
        }
        assert_eq!(fired_at, vec![2050]);
        // Trigger sample counts as the first of 64 post-roll samples.
        let fire_index = (2050 - 1000) / 10;
        assert_eq!(complete_at, Some(fire_index + BUFFER_SIZE - TRIGGER_POSITION - 1));
    }

    #[test]
    fn falling_edge_is_mirror_image() {
        let mut t = trigger(TriggerMode::FIXED_FALL, 2000, 0.002);
        for _ in 0..TRIGGER_POSITION {
            t.evaluate(3000);
        }
        let mut fired_at = None;
        for v in (1000u16..=3000).rev().step_by(10) {
            t.evaluate(v);
            if t.is_fired() {
                fired_at = Some(v);
                break;
            }
        }
        assert_eq!(fired_at, Some(1950));
    }

    #[test]
    fn noise_inside_band_never_fires() {
        let mut rng = StdRng::seed_from_u64(7);
        for mode in [TriggerMode::FIXED_RISE, TriggerMode::FIXED_FALL] {
            let mut t = trigger(mode, 2000, 0.002);
            for _ in 0..10_000 {
                t.evaluate(rng.gen_range(1951..2050));
            }
            assert!(!t.is_fired(), "{mode:?}");
            assert_eq!(t.phase(), TriggerPhase::Armed);
        }
    }

    #[test]
    fn needs_arming_before_firing() {
        let mut t = trigger(TriggerMode::FIXED_RISE, 2000, 0.002);
        for _ in 0..TRIGGER_POSITION {
            t.evaluate(2000);
        }
        // Jumping above the band without first visiting below it does nothing.
        t.evaluate(2100);
        t.evaluate(2000);
        t.evaluate(2100);
        assert!(!t.is_fired());
        t.evaluate(1900);
        t.evaluate(2100);
        assert!(t.is_fired());
    }

    #[test]
    fn auto_level_converges() {
        let speed = 0.05f32;
        let target = 3000u16;
        let mut t = trigger(TriggerMode::AUTO_RISE, 2048, speed);
        let n = (0.01f32.ln() / (1.0 - speed).ln()).ceil() as usize;
        // The lead-in sample does not update the level.
        for _ in 0..=n {
            t.evaluate(target);
        }
        let err = (t.auto_level() - f32::from(target)).abs();
        assert!(err <= 0.01 * f32::from(target), "error {err}");
        assert_eq!(t.threshold(), t.auto_level() as u16);
        assert_eq!(t.hysteresis(), 2048 / 40);
    }

    #[test]
    fn fixed_modes_keep_configured_threshold() {
        let mut t = trigger(TriggerMode::FIXED_RISE, 1500, 0.5);
        for _ in 0..200 {
            t.evaluate(4000);
        }
        assert_eq!(t.threshold(), 1500);
        assert!(t.auto_level() > 3900.0);
    }

    #[test]
    fn free_mode_keeps_seed_threshold() {
        let mut t = trigger(TriggerMode::Free, 1500, 0.5);
        for _ in 0..20 {
            t.evaluate(4000);
        }
        assert_eq!(t.threshold(), 1500);
    }

    #[test]
    fn reset_keeps_level_and_reset_level_restores_seed() {
        let mut t = trigger(TriggerMode::AUTO_FALL, 2000, 1.0);
        t.evaluate(100);
        t.evaluate(3000);
        assert_eq!(t.threshold(), 3000);

        t.reset();
        assert!(!t.is_fired());
        assert_eq!(t.threshold(), 3000);
        assert_eq!(t.phase(), TriggerPhase::PreRoll);

        t.reset_level();
        assert_eq!(t.threshold(), 2000);
        assert_eq!(t.auto_level(), 2000.0);
        assert_eq!(t.phase(), TriggerPhase::LeadIn);
    }

    #[test]
    fn re_arms_after_reset() {
        let mut t = trigger(TriggerMode::FIXED_RISE, 2000, 0.002);
        let mut fires = 0;
        for _ in 0..3 {
            for _ in 0..TRIGGER_POSITION {
                t.evaluate(1000);
            }
            let mut done = false;
            let mut v = 1000u16;
            while !done {
                let was = t.is_fired();
                done = t.evaluate(v).buffer_ready();
                if t.is_fired() && !was {
                    fires += 1;
                }
                v = (v + 50).min(3000);
            }
            t.reset();
        }
        assert_eq!(fires, 3);
    }
}
