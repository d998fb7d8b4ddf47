//! Common chart representation and the built-in conversion library
//!
//! Every supported source format is parsed into a [`Chart`], and every
//! supported target format is written from one. The per-format functions are
//! registered in a [`ChartLibrary`], looked up by [`ChartFormat`] tag.

mod fsc;
mod library;
mod osu;
mod qua;
mod sm;

pub use library::{ChartLibrary, ParseFn, WriteFn, CONVERTIBLE_FORMATS};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{ChartError, Error};

/// Chart file formats the library can read and write
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartFormat {
    /// osu!mania `.osu`
    Osu,
    /// Quaver `.qua`
    Qua,
    /// fluXis `.fsc`
    Fsc,
    /// StepMania `.sm`
    Sm,
}

impl ChartFormat {
    pub const ALL: [ChartFormat; 4] = [
        ChartFormat::Osu,
        ChartFormat::Qua,
        ChartFormat::Fsc,
        ChartFormat::Sm,
    ];

    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            ChartFormat::Osu => "osu",
            ChartFormat::Qua => "qua",
            ChartFormat::Fsc => "fsc",
            ChartFormat::Sm => "sm",
        }
    }

    /// Look up a format by (case-insensitive) extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "osu" => Some(ChartFormat::Osu),
            "qua" => Some(ChartFormat::Qua),
            "fsc" => Some(ChartFormat::Fsc),
            "sm" => Some(ChartFormat::Sm),
            _ => None,
        }
    }

    /// Extension of the game's mapset container for this format
    pub fn mapset_extension(&self) -> &'static str {
        match self {
            ChartFormat::Osu => MapsetFormat::Osz.extension(),
            ChartFormat::Qua => MapsetFormat::Qp.extension(),
            ChartFormat::Fsc => MapsetFormat::Fms.extension(),
            // StepMania has no package format of its own
            ChartFormat::Sm => "zip",
        }
    }

    /// Human readable game name
    pub fn game_name(&self) -> &'static str {
        match self {
            ChartFormat::Osu => "osu!mania",
            ChartFormat::Qua => "Quaver",
            ChartFormat::Fsc => "fluXis",
            ChartFormat::Sm => "StepMania",
        }
    }
}

impl fmt::Display for ChartFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for ChartFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_extension(s.trim().trim_start_matches('.'))
            .ok_or_else(|| Error::UnknownFormat(s.to_string()))
    }
}

/// Game-specific mapset package formats (zip containers)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapsetFormat {
    /// osu! beatmap set
    Osz,
    /// Quaver mapset
    Qp,
    /// fluXis mapset
    Fms,
}

impl MapsetFormat {
    pub const ALL: [MapsetFormat; 3] = [MapsetFormat::Osz, MapsetFormat::Qp, MapsetFormat::Fms];

    pub fn extension(&self) -> &'static str {
        match self {
            MapsetFormat::Osz => "osz",
            MapsetFormat::Qp => "qp",
            MapsetFormat::Fms => "fms",
        }
    }

    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "osz" => Some(MapsetFormat::Osz),
            "qp" => Some(MapsetFormat::Qp),
            "fms" => Some(MapsetFormat::Fms),
            _ => None,
        }
    }
}

/// Chart metadata shared by all formats
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChartMetadata {
    pub title: String,
    pub title_unicode: Option<String>,
    pub artist: String,
    pub artist_unicode: Option<String>,
    pub creator: String,
    /// Difficulty name
    pub version: String,
    pub source: Option<String>,
    pub tags: Vec<String>,
}

/// A BPM change
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimingPoint {
    pub time_ms: f64,
    pub bpm: f64,
    /// Beats per measure
    pub meter: u8,
}

impl TimingPoint {
    pub fn new(time_ms: f64, bpm: f64) -> Self {
        Self {
            time_ms,
            bpm,
            meter: 4,
        }
    }

    /// Length of one beat in milliseconds
    pub fn beat_len(&self) -> f64 {
        60_000.0 / self.bpm
    }
}

/// A single note; holds carry an end time
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub time_ms: f64,
    /// Zero-based column
    pub column: u8,
    pub end_time_ms: Option<f64>,
}

impl Note {
    pub fn tap(time_ms: f64, column: u8) -> Self {
        Self {
            time_ms,
            column,
            end_time_ms: None,
        }
    }

    pub fn hold(time_ms: f64, column: u8, end_time_ms: f64) -> Self {
        Self {
            time_ms,
            column,
            end_time_ms: Some(end_time_ms),
        }
    }

    pub fn is_hold(&self) -> bool {
        self.end_time_ms.is_some()
    }
}

/// Format-independent chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chart {
    pub metadata: ChartMetadata,
    pub key_count: u8,
    pub audio_file: String,
    pub background_file: Option<String>,
    pub preview_time_ms: Option<i64>,
    pub hp_drain: f32,
    pub overall_difficulty: f32,
    pub timing_points: Vec<TimingPoint>,
    pub notes: Vec<Note>,
}

impl Default for Chart {
    fn default() -> Self {
        Self {
            metadata: ChartMetadata::default(),
            key_count: 4,
            audio_file: String::new(),
            background_file: None,
            preview_time_ms: None,
            hp_drain: 8.0,
            overall_difficulty: 8.0,
            timing_points: Vec::new(),
            notes: Vec::new(),
        }
    }
}

impl Chart {
    /// Sort notes and timing points by time
    pub fn normalize(&mut self) {
        self.timing_points
            .sort_by(|a, b| a.time_ms.total_cmp(&b.time_ms));
        self.notes.sort_by(|a, b| {
            a.time_ms
                .total_cmp(&b.time_ms)
                .then(a.column.cmp(&b.column))
        });
    }

    /// Reject notes outside `0..key_count`
    pub fn check_columns(&self) -> Result<(), ChartError> {
        match self.notes.iter().find(|n| n.column >= self.key_count) {
            Some(note) => Err(ChartError::invalid("column", note.column.to_string())),
            None => Ok(()),
        }
    }
}

/// Split a space separated tag string
pub(crate) fn split_tags(tags: &str) -> Vec<String> {
    tags.split_whitespace().map(String::from).collect()
}

/// `None` for empty strings
pub(crate) fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    /// A small 4K chart with a BPM change and a hold
    pub fn sample_chart() -> Chart {
        Chart {
            metadata: ChartMetadata {
                title: "Sample".into(),
                title_unicode: None,
                artist: "Artist".into(),
                artist_unicode: None,
                creator: "Mapper".into(),
                version: "Hard".into(),
                source: None,
                tags: vec!["test".into(), "mania".into()],
            },
            key_count: 4,
            audio_file: "audio.mp3".into(),
            background_file: Some("bg.jpg".into()),
            preview_time_ms: Some(1000),
            hp_drain: 8.0,
            overall_difficulty: 8.0,
            timing_points: vec![TimingPoint::new(0.0, 120.0), TimingPoint::new(2000.0, 150.0)],
            notes: vec![
                Note::tap(500.0, 0),
                Note::tap(1000.0, 1),
                Note::hold(1500.0, 2, 2000.0),
                Note::tap(2400.0, 3),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_lookup() {
        assert_eq!(ChartFormat::from_extension("OSU"), Some(ChartFormat::Osu));
        assert_eq!(ChartFormat::from_extension("mp3"), None);
        assert_eq!(".qua".parse::<ChartFormat>().unwrap(), ChartFormat::Qua);
        assert!("ssc".parse::<ChartFormat>().is_err());
        assert_eq!(ChartFormat::Qua.mapset_extension(), "qp");
        assert_eq!(ChartFormat::Sm.mapset_extension(), "zip");
        assert_eq!(MapsetFormat::from_extension("Osz"), Some(MapsetFormat::Osz));
    }

    #[test]
    fn test_normalize() {
        let mut chart = fixtures::sample_chart();
        chart.notes.reverse();
        chart.normalize();
        assert_eq!(chart.notes[0].time_ms, 500.0);
        assert_eq!(chart.notes.last().map(|n| n.time_ms), Some(2400.0));
    }

    #[test]
    fn test_check_columns() {
        let mut chart = fixtures::sample_chart();
        assert!(chart.check_columns().is_ok());

        chart.notes.push(Note::tap(3000.0, u8::MAX));
        assert_eq!(
            chart.check_columns(),
            Err(ChartError::invalid("column", "255"))
        );
    }
}
