//! Global acoustic environment.

use crate::backend::{AudioBackend, SourceHandle, check_backend};
use crate::config::ReverbParams;

/// Highest meaningful nebula density.
pub const NEBULA_DENSITY_MAX: f32 = 1000.0;

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum SoundEnvironment {
    #[default]
    Normal,
    /// Nebula of the given density in `0..=1000`; slows sound and adds reverb
    Nebula(f32),
}

/// Backend parameters derived from an environment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct EnvironmentParams {
    pub speed_of_sound: f32,
    pub reverb: Option<ReverbParams>,
    pub air_absorption: f32,
}

impl SoundEnvironment {
    pub(crate) fn params(&self, speed_of_sound: f32, reverb: ReverbParams) -> EnvironmentParams {
        match *self {
            Self::Normal => EnvironmentParams {
                speed_of_sound,
                reverb: None,
                air_absorption: 0.0,
            },
            Self::Nebula(density) => {
                let f = density.clamp(0.0, NEBULA_DENSITY_MAX) / NEBULA_DENSITY_MAX;
                EnvironmentParams {
                    speed_of_sound: speed_of_sound / (1.0 + 2.0 * f),
                    reverb: Some(reverb),
                    air_absorption: 3.0 * f,
                }
            }
        }
    }
}

/// Push `params` to the listener, the effect slot and every general source.
///
/// Reverb and air absorption are only touched when effects are in use.
pub(crate) fn apply_environment(
    params: &EnvironmentParams,
    effects: bool,
    sources: &[SourceHandle],
    backend: &mut dyn AudioBackend,
) {
    backend.set_speed_of_sound(params.speed_of_sound);
    if effects {
        backend.set_reverb(params.reverb);
        for source in sources {
            backend.set_air_absorption(*source, params.air_absorption);
        }
    }
    check_backend(backend, "environment");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SoftwareBackend;

    #[test]
    fn test_nebula_params() {
        let reverb = ReverbParams::default();
        let params = SoundEnvironment::Nebula(500.0).params(3433.0, reverb);
        assert!((params.speed_of_sound - 3433.0 / 2.0).abs() < 1e-3);
        assert!((params.air_absorption - 1.5).abs() < 1e-6);
        assert_eq!(params.reverb, Some(reverb));

        let dense = SoundEnvironment::Nebula(5000.0).params(3433.0, reverb);
        assert!((dense.speed_of_sound - 3433.0 / 3.0).abs() < 1e-3);
    }

    #[test]
    fn test_normal_resets() {
        let mut backend = SoftwareBackend::new(48000, 2);
        let source = backend.create_source().unwrap();
        let reverb = ReverbParams::default();

        let nebula = SoundEnvironment::Nebula(1000.0).params(3433.0, reverb);
        apply_environment(&nebula, true, &[source], &mut backend);
        assert_eq!(backend.source_air_absorption(source), Some(3.0));
        assert!(backend.reverb().is_some());

        let normal = SoundEnvironment::Normal.params(3433.0, reverb);
        apply_environment(&normal, true, &[source], &mut backend);
        assert_eq!(backend.speed_of_sound(), 3433.0);
        assert_eq!(backend.source_air_absorption(source), Some(0.0));
        assert!(backend.reverb().is_none());
    }

    #[test]
    fn test_without_effects_only_speed_changes() {
        let mut backend = SoftwareBackend::new(48000, 2);
        let source = backend.create_source().unwrap();
        let params = SoundEnvironment::Nebula(1000.0).params(3433.0, ReverbParams::default());
        apply_environment(&params, false, &[source], &mut backend);
        assert!((backend.speed_of_sound() - 3433.0 / 3.0).abs() < 1e-3);
        assert_eq!(backend.source_air_absorption(source), Some(0.0));
        assert!(backend.reverb().is_none());
    }
}
