use std::fmt;

/// State of the music worker.
///
/// `Loading`, `Stopping`, `Pausing` and `Resuming` are only ever held inside a
/// single worker iteration and are never published as settled states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MusicState {
    Dead,
    Startup,
    Idle,
    FadeIn,
    FadeOut,
    Playing,
    Paused,
    Loading,
    Stopping,
    Pausing,
    Resuming,
}

impl MusicState {
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Loading | Self::Stopping | Self::Pausing | Self::Resuming
        )
    }

    /// A track is loaded into the source, paused or not.
    pub fn is_playing(&self) -> bool {
        matches!(
            self,
            Self::Playing
                | Self::Loading
                | Self::Resuming
                | Self::FadeIn
                | Self::FadeOut
                | Self::Paused
        )
    }
}

impl fmt::Display for MusicState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MusicCommand {
    None,
    Kill,
    Stop,
    Play,
    Pause,
    FadeIn,
    FadeOut,
}

/// How the worker's fade clock changes alongside a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FadeMark {
    Keep,
    /// Load with gain 0 and ramp up from now
    StartFadeIn,
    /// Load at full gain
    NoFade,
    StartFadeOut,
    /// Jump to the end of the current fade-in
    CompleteFadeIn,
    /// Reverse a fade-out into a fade-in at the same gain
    FadeInFromOut,
    /// Reverse a fade-in into a fade-out at the same gain
    FadeOutFromIn,
}

/// The worker's command transition table.
///
/// Settled states only: the worker resolves transient states before it takes
/// the next command.
pub(crate) fn transition(state: MusicState, command: MusicCommand) -> (MusicState, FadeMark) {
    use MusicCommand as C;
    use MusicState as S;

    let keep = (state, FadeMark::Keep);
    if matches!(state, S::Dead) {
        return keep;
    }

    match command {
        C::None => keep,
        C::Kill => match state {
            S::Idle | S::Startup => (S::Dead, FadeMark::Keep),
            _ => (S::Stopping, FadeMark::Keep),
        },
        C::Stop => match state {
            S::Idle | S::Startup => keep,
            _ => (S::Stopping, FadeMark::Keep),
        },
        C::Play => match state {
            S::Paused | S::Pausing | S::FadeOut => (S::Resuming, FadeMark::Keep),
            S::FadeIn => (S::FadeIn, FadeMark::CompleteFadeIn),
            S::Idle => (S::Loading, FadeMark::NoFade),
            _ => keep,
        },
        C::FadeIn => match state {
            S::Paused => (S::Resuming, FadeMark::Keep),
            S::FadeOut => (S::FadeIn, FadeMark::FadeInFromOut),
            S::Idle => (S::Loading, FadeMark::StartFadeIn),
            _ => keep,
        },
        C::FadeOut => match state {
            S::Playing => (S::FadeOut, FadeMark::StartFadeOut),
            S::FadeIn => (S::FadeOut, FadeMark::FadeOutFromIn),
            S::Paused => (S::Stopping, FadeMark::Keep),
            _ => keep,
        },
        C::Pause => match state {
            S::Playing | S::FadeIn | S::FadeOut => (S::Pausing, FadeMark::Keep),
            _ => keep,
        },
    }
}
