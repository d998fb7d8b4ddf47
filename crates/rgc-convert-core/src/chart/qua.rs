//! Quaver `.qua` codec (YAML)

use serde::{Deserialize, Serialize};

use super::{non_empty, split_tags, Chart, ChartMetadata, Note, TimingPoint};
use crate::error::ChartError;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct QuaFile {
    audio_file: String,
    song_preview_time: i64,
    background_file: String,
    map_id: i64,
    map_set_id: i64,
    mode: String,
    title: String,
    artist: String,
    source: String,
    tags: String,
    creator: String,
    difficulty_name: String,
    description: String,
    timing_points: Vec<QuaTimingPoint>,
    slider_velocities: Vec<QuaSliderVelocity>,
    hit_objects: Vec<QuaHitObject>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct QuaTimingPoint {
    start_time: f64,
    bpm: f64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct QuaSliderVelocity {
    start_time: f64,
    multiplier: f64,
}

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct QuaHitObject {
    start_time: i64,
    /// One-based lane
    lane: u8,
    #[serde(skip_serializing_if = "is_zero")]
    end_time: i64,
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

fn parse_mode(mode: &str) -> Result<u8, ChartError> {
    mode.strip_prefix("Keys")
        .and_then(|n| n.parse::<u8>().ok())
        .filter(|n| *n > 0)
        .ok_or_else(|| ChartError::UnsupportedMode(mode.to_string()))
}

/// Parse a Quaver chart
pub fn parse(text: &str) -> Result<Chart, ChartError> {
    let qua: QuaFile =
        serde_yaml::from_str(text).map_err(|e| ChartError::Malformed(e.to_string()))?;
    let key_count = parse_mode(&qua.mode)?;

    let mut notes = Vec::with_capacity(qua.hit_objects.len());
    for obj in &qua.hit_objects {
        if obj.lane == 0 || obj.lane > key_count {
            return Err(ChartError::invalid("Lane", obj.lane.to_string()));
        }
        let time = obj.start_time as f64;
        notes.push(if obj.end_time > obj.start_time {
            Note::hold(time, obj.lane - 1, obj.end_time as f64)
        } else {
            Note::tap(time, obj.lane - 1)
        });
    }

    let mut chart = Chart {
        metadata: ChartMetadata {
            title: qua.title,
            title_unicode: None,
            artist: qua.artist,
            artist_unicode: None,
            creator: qua.creator,
            version: qua.difficulty_name,
            source: non_empty(&qua.source),
            tags: split_tags(&qua.tags),
        },
        key_count,
        audio_file: qua.audio_file,
        background_file: non_empty(&qua.background_file),
        preview_time_ms: Some(qua.song_preview_time),
        timing_points: qua
            .timing_points
            .iter()
            .filter(|tp| tp.bpm > 0.0)
            .map(|tp| TimingPoint::new(tp.start_time, tp.bpm))
            .collect(),
        notes,
        ..Chart::default()
    };
    chart.normalize();
    Ok(chart)
}

/// Write a chart as a Quaver file
pub fn write(chart: &Chart) -> Result<String, ChartError> {
    if chart.key_count == 0 {
        return Err(ChartError::UnsupportedKeyCount(0));
    }
    chart.check_columns()?;
    let meta = &chart.metadata;
    let qua = QuaFile {
        audio_file: chart.audio_file.clone(),
        song_preview_time: chart.preview_time_ms.unwrap_or(0),
        background_file: chart.background_file.clone().unwrap_or_default(),
        map_id: -1,
        map_set_id: -1,
        mode: format!("Keys{}", chart.key_count),
        title: meta.title.clone(),
        artist: meta.artist.clone(),
        source: meta.source.clone().unwrap_or_default(),
        tags: meta.tags.join(" "),
        creator: meta.creator.clone(),
        difficulty_name: meta.version.clone(),
        description: String::new(),
        timing_points: chart
            .timing_points
            .iter()
            .map(|tp| QuaTimingPoint {
                start_time: tp.time_ms,
                bpm: tp.bpm,
            })
            .collect(),
        slider_velocities: Vec::new(),
        hit_objects: chart
            .notes
            .iter()
            .map(|n| QuaHitObject {
                start_time: n.time_ms.round() as i64,
                lane: n.column + 1,
                end_time: n.end_time_ms.map(|t| t.round() as i64).unwrap_or(0),
            })
            .collect(),
    };

    serde_yaml::to_string(&qua).map_err(|e| ChartError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::fixtures::sample_chart;

    const QUA: &str = "\
AudioFile: audio.mp3
BackgroundFile: bg.png
Mode: Keys7
Title: Song
Artist: Someone
Creator: Mapper
DifficultyName: Easy
TimingPoints:
- Bpm: 180
HitObjects:
- StartTime: 100
  Lane: 1
- StartTime: 200
  Lane: 7
  EndTime: 400
";

    #[test]
    fn test_parse_defaults_missing_start_time() {
        let chart = parse(QUA).unwrap();
        assert_eq!(chart.key_count, 7);
        assert_eq!(chart.timing_points[0].time_ms, 0.0);
        assert_eq!(chart.timing_points[0].bpm, 180.0);
        assert_eq!(chart.notes[0], Note::tap(100.0, 0));
        assert_eq!(chart.notes[1], Note::hold(200.0, 6, 400.0));
        assert_eq!(chart.metadata.version, "Easy");
    }

    #[test]
    fn test_round_trip() {
        let chart = sample_chart();
        let parsed = parse(&write(&chart).unwrap()).unwrap();
        assert_eq!(parsed.notes, chart.notes);
        assert_eq!(parsed.timing_points, chart.timing_points);
        assert_eq!(parsed.metadata, chart.metadata);
        assert_eq!(parsed.background_file, chart.background_file);
    }

    #[test]
    fn test_rejects_bad_lane_and_mode() {
        let bad_lane = QUA.replace("Lane: 7", "Lane: 9");
        assert!(matches!(parse(&bad_lane), Err(ChartError::InvalidValue { .. })));
        let bad_mode = QUA.replace("Keys7", "Drums");
        assert!(matches!(parse(&bad_mode), Err(ChartError::UnsupportedMode(_))));
        assert!(parse(":::not yaml").is_err());
    }

    #[test]
    fn test_write_rejects_out_of_range_column() {
        let mut chart = sample_chart();
        chart.notes.push(Note::tap(3000.0, u8::MAX));
        assert!(matches!(
            write(&chart),
            Err(ChartError::InvalidValue { field: "column", .. })
        ));
    }
}
