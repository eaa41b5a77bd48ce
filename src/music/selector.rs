use std::collections::HashMap;

/// Picks the next track for a situation tag such as `"idle"` or `"combat"`.
pub trait TrackSelector: Send {
    /// Name of the track to load, or `None` to leave the music as it is.
    fn choose(&mut self, situation: &str) -> Option<String>;
}

impl<F> TrackSelector for F
where
    F: FnMut(&str) -> Option<String> + Send,
{
    fn choose(&mut self, situation: &str) -> Option<String> {
        self(situation)
    }
}

/// Round-robin playlists keyed by situation, with a fallback list.
#[derive(Debug, Clone, Default)]
pub struct Playlist {
    lists: HashMap<String, Vec<String>>,
    fallback: Vec<String>,
    cursors: HashMap<String, usize>,
}

impl Playlist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_situation<I, S>(mut self, situation: &str, tracks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.lists.insert(
            situation.to_string(),
            tracks.into_iter().map(Into::into).collect(),
        );
        self
    }

    /// Tracks used for situations without their own list.
    pub fn with_fallback<I, S>(mut self, tracks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fallback = tracks.into_iter().map(Into::into).collect();
        self
    }
}

impl TrackSelector for Playlist {
    fn choose(&mut self, situation: &str) -> Option<String> {
        let (key, tracks) = match self.lists.get(situation) {
            Some(tracks) if !tracks.is_empty() => (situation, tracks),
            _ => ("", &self.fallback),
        };
        if tracks.is_empty() {
            return None;
        }
        let cursor = self.cursors.entry(key.to_string()).or_insert(0);
        let track = tracks[*cursor % tracks.len()].clone();
        *cursor = (*cursor + 1) % tracks.len();
        Some(track)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_robin_per_situation() {
        let mut playlist = Playlist::new()
            .with_situation("combat", ["battle1", "battle2"])
            .with_fallback(["ambient"]);
        assert_eq!(playlist.choose("combat").as_deref(), Some("battle1"));
        assert_eq!(playlist.choose("combat").as_deref(), Some("battle2"));
        assert_eq!(playlist.choose("combat").as_deref(), Some("battle1"));
        assert_eq!(playlist.choose("idle").as_deref(), Some("ambient"));
    }

    #[test]
    fn test_empty_playlist_chooses_nothing() {
        let mut playlist = Playlist::new();
        assert!(playlist.choose("idle").is_none());
    }

    #[test]
    fn test_closure_selector() {
        let mut calls = Vec::new();
        let mut selector = |situation: &str| {
            calls.push(situation.to_string());
            Some(format!("{}-theme", situation))
        };
        assert_eq!(
            TrackSelector::choose(&mut selector, "land").as_deref(),
            Some("land-theme")
        );
        drop(selector);
        assert_eq!(calls, vec!["land"]);
    }
}
