//! fluXis `.fsc` codec (JSON)

use serde::{Deserialize, Serialize};

use super::{non_empty, split_tags, Chart, ChartMetadata, Note, TimingPoint};
use crate::error::ChartError;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct FscFile {
    audio_file: String,
    background_file: String,
    metadata: FscMetadata,
    hit_objects: Vec<FscHitObject>,
    timing_points: Vec<FscTimingPoint>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct FscMetadata {
    title: String,
    title_romanized: Option<String>,
    artist: String,
    artist_romanized: Option<String>,
    mapper: String,
    difficulty: String,
    source: String,
    tags: String,
    preview_time: i64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(default)]
struct FscHitObject {
    time: f64,
    /// One-based lane
    lane: u8,
    #[serde(skip_serializing_if = "is_zero")]
    holdtime: f64,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
struct FscTimingPoint {
    time: f64,
    bpm: f64,
    signature: u8,
}

impl Default for FscTimingPoint {
    fn default() -> Self {
        Self {
            time: 0.0,
            bpm: 120.0,
            signature: 4,
        }
    }
}

fn is_zero(v: &f64) -> bool {
    *v == 0.0
}

/// Parse a fluXis chart.
///
/// The key count is the highest lane used.
pub fn parse(text: &str) -> Result<Chart, ChartError> {
    let fsc: FscFile =
        serde_json::from_str(text).map_err(|e| ChartError::Malformed(e.to_string()))?;

    let mut key_count = 0u8;
    let mut notes = Vec::with_capacity(fsc.hit_objects.len());
    for obj in &fsc.hit_objects {
        if obj.lane == 0 {
            return Err(ChartError::invalid("lane", "0"));
        }
        key_count = key_count.max(obj.lane);
        notes.push(if obj.holdtime > 0.0 {
            Note::hold(obj.time, obj.lane - 1, obj.time + obj.holdtime)
        } else {
            Note::tap(obj.time, obj.lane - 1)
        });
    }
    if key_count == 0 {
        return Err(ChartError::MissingSection("HitObjects"));
    }

    let meta = fsc.metadata;
    // fluXis stores the original-script title in Title and the romanized one separately
    let (title, title_unicode) = match meta.title_romanized.as_deref().and_then(non_empty) {
        Some(romanized) if romanized != meta.title => (romanized, Some(meta.title.clone())),
        _ => (meta.title.clone(), None),
    };
    let (artist, artist_unicode) = match meta.artist_romanized.as_deref().and_then(non_empty) {
        Some(romanized) if romanized != meta.artist => (romanized, Some(meta.artist.clone())),
        _ => (meta.artist.clone(), None),
    };

    let mut chart = Chart {
        metadata: ChartMetadata {
            title,
            title_unicode,
            artist,
            artist_unicode,
            creator: meta.mapper,
            version: meta.difficulty,
            source: non_empty(&meta.source),
            tags: split_tags(&meta.tags),
        },
        key_count,
        audio_file: fsc.audio_file,
        background_file: non_empty(&fsc.background_file),
        preview_time_ms: Some(meta.preview_time),
        timing_points: fsc
            .timing_points
            .iter()
            .filter(|tp| tp.bpm > 0.0)
            .map(|tp| TimingPoint {
                time_ms: tp.time,
                bpm: tp.bpm,
                meter: tp.signature.max(1),
            })
            .collect(),
        notes,
        ..Chart::default()
    };
    chart.normalize();
    Ok(chart)
}

/// Write a chart as a fluXis file
pub fn write(chart: &Chart) -> Result<String, ChartError> {
    if chart.key_count == 0 {
        return Err(ChartError::UnsupportedKeyCount(0));
    }
    chart.check_columns()?;
    let meta = &chart.metadata;
    let fsc = FscFile {
        audio_file: chart.audio_file.clone(),
        background_file: chart.background_file.clone().unwrap_or_default(),
        metadata: FscMetadata {
            title: meta.title_unicode.clone().unwrap_or_else(|| meta.title.clone()),
            title_romanized: Some(meta.title.clone()),
            artist: meta.artist_unicode.clone().unwrap_or_else(|| meta.artist.clone()),
            artist_romanized: Some(meta.artist.clone()),
            mapper: meta.creator.clone(),
            difficulty: meta.version.clone(),
            source: meta.source.clone().unwrap_or_default(),
            tags: meta.tags.join(" "),
            preview_time: chart.preview_time_ms.unwrap_or(0),
        },
        hit_objects: chart
            .notes
            .iter()
            .map(|n| FscHitObject {
                time: n.time_ms,
                lane: n.column + 1,
                holdtime: n.end_time_ms.map(|end| end - n.time_ms).unwrap_or(0.0),
            })
            .collect(),
        timing_points: chart
            .timing_points
            .iter()
            .map(|tp| FscTimingPoint {
                time: tp.time_ms,
                bpm: tp.bpm,
                signature: tp.meter,
            })
            .collect(),
    };

    serde_json::to_string_pretty(&fsc).map_err(|e| ChartError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::fixtures::sample_chart;

    #[test]
    fn test_round_trip() {
        let mut chart = sample_chart();
        chart.metadata.title_unicode = Some("サンプル".into());
        let parsed = parse(&write(&chart).unwrap()).unwrap();
        assert_eq!(parsed.notes, chart.notes);
        assert_eq!(parsed.timing_points, chart.timing_points);
        assert_eq!(parsed.metadata, chart.metadata);
        assert_eq!(parsed.key_count, 4);
    }

    #[test]
    fn test_parse_minimal() {
        let text = r#"{"AudioFile":"a.ogg","HitObjects":[{"time":10.5,"lane":2},{"time":20,"lane":5,"holdtime":100}],"TimingPoints":[{"time":0,"bpm":200}]}"#;
        let chart = parse(text).unwrap();
        assert_eq!(chart.key_count, 5);
        assert_eq!(chart.notes[0], Note::tap(10.5, 1));
        assert_eq!(chart.notes[1], Note::hold(20.0, 4, 120.0));
        assert_eq!(chart.timing_points[0].meter, 4);
    }

    #[test]
    fn test_rejects_empty_and_invalid() {
        assert!(matches!(
            parse(r#"{"HitObjects":[]}"#),
            Err(ChartError::MissingSection(_))
        ));
        assert!(parse("{not json").is_err());
    }

    #[test]
    fn test_write_rejects_out_of_range_column() {
        let mut chart = sample_chart();
        chart.notes.push(Note::hold(3000.0, 4, 3500.0));
        assert!(matches!(
            write(&chart),
            Err(ChartError::InvalidValue { field: "column", .. })
        ));
    }
}
