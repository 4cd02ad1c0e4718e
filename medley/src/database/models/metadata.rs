//! Media kinds and the kind-tagged metadata union.

use serde::{Deserialize, Serialize};

/// Kind of media a job downloads.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Movie,
    TvEpisode,
    MusicTrack,
    Commercial,
}

impl MediaKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Movie => "movie",
            Self::TvEpisode => "tv_episode",
            Self::MusicTrack => "music_track",
            Self::Commercial => "commercial",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "movie" => Some(Self::Movie),
            "tv_episode" => Some(Self::TvEpisode),
            "music_track" => Some(Self::MusicTrack),
            "commercial" => Some(Self::Commercial),
            _ => None,
        }
    }
}

/// Kind-tagged download metadata.
///
/// Persisted as JSON with an explicit `kind` discriminant; decoding dispatches
/// on the discriminant, never on which fields happen to be present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MediaMetadata {
    Movie {
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        year: Option<i32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    TvEpisode {
        show: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        year: Option<i32>,
        season: u32,
        episode: u32,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        episode_title: Option<String>,
    },
    MusicTrack {
        artist: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        album: Option<String>,
        track: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        track_number: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        release_year: Option<i32>,
    },
    Commercial {
        title: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        year: Option<i32>,
    },
}

impl MediaMetadata {
    /// The media kind this payload belongs to.
    pub fn kind(&self) -> MediaKind {
        match self {
            Self::Movie { .. } => MediaKind::Movie,
            Self::TvEpisode { .. } => MediaKind::TvEpisode,
            Self::MusicTrack { .. } => MediaKind::MusicTrack,
            Self::Commercial { .. } => MediaKind::Commercial,
        }
    }

    /// Display title used in logs and queue listings.
    pub fn display_title(&self) -> &str {
        match self {
            Self::Movie { title, .. } | Self::Commercial { title, .. } => title,
            Self::TvEpisode { show, .. } => show,
            Self::MusicTrack { track, .. } => track,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_round_trips_by_discriminant() {
        let metadata = MediaMetadata::MusicTrack {
            artist: "A".to_string(),
            album: Some("Album".to_string()),
            track: "T".to_string(),
            track_number: Some(3),
            release_year: None,
        };

        let json = serde_json::to_string(&metadata).unwrap();
        assert!(json.contains(r#""kind":"music_track""#));

        let back: MediaMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(back, metadata);
        assert_eq!(back.kind(), MediaKind::MusicTrack);
    }

    #[test]
    fn movie_and_commercial_share_fields_but_not_kind() {
        let movie = serde_json::json!({"kind": "movie", "title": "X", "year": 1999});
        let commercial = serde_json::json!({"kind": "commercial", "title": "X", "year": 1999});

        let movie: MediaMetadata = serde_json::from_value(movie).unwrap();
        let commercial: MediaMetadata = serde_json::from_value(commercial).unwrap();

        assert_eq!(movie.kind(), MediaKind::Movie);
        assert_eq!(commercial.kind(), MediaKind::Commercial);
    }

    #[test]
    fn media_kind_string_forms() {
        assert_eq!(MediaKind::TvEpisode.as_str(), "tv_episode");
        assert_eq!(MediaKind::parse("music_track"), Some(MediaKind::MusicTrack));
        assert_eq!(MediaKind::parse("unknown"), None);
    }
}
