//! Linear to logarithmic volume mapping.

/// Number of doublings below full scale at linear volume 0, i.e. a 48dB floor.
const VOLUME_OCTAVES: f32 = 8.0;

/// A user-facing linear volume and the gain actually sent to the backend.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VolumeLevel {
    linear: f32,
    gain: f32,
}

impl VolumeLevel {
    /// Clamps `v` into `[0, 1]` and derives `gain = 2^(-8(1-v))`, or 0 when silent.
    pub fn from_linear(v: f32) -> Self {
        let linear = if v.is_nan() { 0.0 } else { v.clamp(0.0, 1.0) };
        let gain = if linear > 0.0 {
            (-VOLUME_OCTAVES * (1.0 - linear)).exp2()
        } else {
            0.0
        };
        Self { linear, gain }
    }

    pub fn linear(&self) -> f32 {
        self.linear
    }

    pub fn gain(&self) -> f32 {
        self.gain
    }
}

impl Default for VolumeLevel {
    fn default() -> Self {
        Self::from_linear(1.0)
    }
}

/// Global sound volume and speed state shared by voices and groups.
#[derive(Debug, Clone, Copy)]
pub(crate) struct MixLevels {
    pub sound: VolumeLevel,
    /// Extra attenuation while the compression ambience is audible
    pub speed_gain: f32,
    pub speed: f32,
    pub max_speed: f32,
}

impl MixLevels {
    pub fn new(sound_volume: f32) -> Self {
        Self {
            sound: VolumeLevel::from_linear(sound_volume),
            speed_gain: 1.0,
            speed: 1.0,
            max_speed: 0.0,
        }
    }

    /// Gain for a general-purpose voice.
    pub fn voice_gain(&self) -> f32 {
        self.sound.gain() * self.speed_gain
    }

    /// Gain for a group slot with the group's own multiplier.
    pub fn group_gain(&self, group_volume: f32, speed_affected: bool) -> f32 {
        let gain = self.sound.gain() * group_volume;
        if speed_affected {
            gain * self.speed_gain
        } else {
            gain
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_linear() {
        for i in 0..=20 {
            let v = i as f32 / 20.0;
            assert_eq!(VolumeLevel::from_linear(v).linear(), v);
        }
    }

    #[test]
    fn test_gain_monotonic_and_zero_only_at_zero() {
        let mut last = -1.0;
        for i in 0..=100 {
            let level = VolumeLevel::from_linear(i as f32 / 100.0);
            assert!(level.gain() >= last);
            assert_eq!(level.gain() == 0.0, i == 0);
            last = level.gain();
        }
        assert_eq!(VolumeLevel::from_linear(1.0).gain(), 1.0);
        assert!((VolumeLevel::from_linear(0.5).gain() - 1.0 / 16.0).abs() < 1e-6);
    }

    #[test]
    fn test_clamping() {
        assert_eq!(VolumeLevel::from_linear(1.7).linear(), 1.0);
        assert_eq!(VolumeLevel::from_linear(-0.3).linear(), 0.0);
        assert_eq!(VolumeLevel::from_linear(f32::NAN).gain(), 0.0);
    }

    #[test]
    fn test_group_gain_respects_speed_flag() {
        let mut levels = MixLevels::new(1.0);
        levels.speed_gain = 0.5;
        assert_eq!(levels.group_gain(0.8, true), 0.4);
        assert_eq!(levels.group_gain(0.8, false), 0.8);
        assert_eq!(levels.voice_gain(), 0.5);
    }
}
