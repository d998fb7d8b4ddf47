//! osu!mania `.osu` codec
//!
//! Parsing goes through rosu-map; writing emits a v14 file with only the
//! sections osu! needs to load a mania chart.

use std::fmt::Write as _;

use rosu_map::section::hit_objects::HitObjectKind;
use rosu_map::Beatmap;

use super::{non_empty, split_tags, Chart, ChartMetadata, Note, TimingPoint};
use crate::error::ChartError;

/// Playfield width in osu! pixels
const PLAYFIELD_WIDTH: f32 = 512.0;

const MANIA_MODE: u8 = 3;

/// Parse an osu!mania chart
pub fn parse(text: &str) -> Result<Chart, ChartError> {
    let beatmap: Beatmap =
        rosu_map::from_str(text).map_err(|e| ChartError::Malformed(e.to_string()))?;

    let mode = beatmap.mode as u8;
    if mode != MANIA_MODE {
        return Err(ChartError::UnsupportedMode(format!("osu! mode {}", mode)));
    }

    let key_count = beatmap.circle_size.round();
    if !(1.0..=18.0).contains(&key_count) {
        return Err(ChartError::invalid("CircleSize", beatmap.circle_size.to_string()));
    }
    let key_count = key_count as u8;

    let metadata = ChartMetadata {
        title: beatmap.title.clone(),
        title_unicode: non_empty(&beatmap.title_unicode),
        artist: beatmap.artist.clone(),
        artist_unicode: non_empty(&beatmap.artist_unicode),
        creator: beatmap.creator.clone(),
        version: beatmap.version.clone(),
        source: non_empty(&beatmap.source),
        tags: split_tags(&beatmap.tags),
    };

    let timing_points = beatmap
        .control_points
        .timing_points
        .iter()
        .filter(|tp| tp.beat_len > 0.0)
        .map(|tp| TimingPoint::new(tp.time, 60_000.0 / tp.beat_len))
        .collect();

    let mut notes = Vec::with_capacity(beatmap.hit_objects.len());
    for hit_object in &beatmap.hit_objects {
        let (x, end_time) = match &hit_object.kind {
            HitObjectKind::Circle(circle) => (circle.pos.x, None),
            HitObjectKind::Hold(hold) => (hold.pos_x, Some(hit_object.start_time + hold.duration)),
            _ => continue,
        };
        notes.push(Note {
            time_ms: hit_object.start_time,
            column: x_to_column(x, key_count),
            end_time_ms: end_time,
        });
    }

    let mut chart = Chart {
        metadata,
        key_count,
        audio_file: beatmap.audio_file.clone(),
        background_file: non_empty(&beatmap.background_file),
        preview_time_ms: (beatmap.preview_time >= 0).then_some(i64::from(beatmap.preview_time)),
        hp_drain: beatmap.hp_drain_rate,
        overall_difficulty: beatmap.overall_difficulty,
        timing_points,
        notes,
    };
    chart.normalize();
    Ok(chart)
}

/// Write a chart as an osu!mania v14 file
pub fn write(chart: &Chart) -> Result<String, ChartError> {
    if chart.key_count == 0 || chart.key_count > 18 {
        return Err(ChartError::UnsupportedKeyCount(chart.key_count));
    }
    let meta = &chart.metadata;
    let mut out = String::with_capacity(256 + chart.notes.len() * 24);

    // Writing into a String cannot fail
    let _ = write!(
        out,
        "osu file format v14\n\n\
         [General]\n\
         AudioFilename: {audio}\n\
         AudioLeadIn: 0\n\
         PreviewTime: {preview}\n\
         Countdown: 0\n\
         SampleSet: Soft\n\
         StackLeniency: 0.7\n\
         Mode: 3\n\
         LetterboxInBreaks: 0\n\
         SpecialStyle: 0\n\
         WidescreenStoryboard: 0\n\n\
         [Editor]\n\
         DistanceSpacing: 1\n\
         BeatDivisor: 4\n\
         GridSize: 4\n\
         TimelineZoom: 1\n\n\
         [Metadata]\n\
         Title:{title}\n\
         TitleUnicode:{title_unicode}\n\
         Artist:{artist}\n\
         ArtistUnicode:{artist_unicode}\n\
         Creator:{creator}\n\
         Version:{version}\n\
         Source:{source}\n\
         Tags:{tags}\n\
         BeatmapID:0\n\
         BeatmapSetID:-1\n\n\
         [Difficulty]\n\
         HPDrainRate:{hp}\n\
         CircleSize:{keys}\n\
         OverallDifficulty:{od}\n\
         ApproachRate:5\n\
         SliderMultiplier:1.4\n\
         SliderTickRate:1\n\n\
         [Events]\n\
         //Background and Video events\n",
        audio = chart.audio_file,
        preview = chart.preview_time_ms.unwrap_or(-1),
        title = meta.title,
        title_unicode = meta.title_unicode.as_deref().unwrap_or(&meta.title),
        artist = meta.artist,
        artist_unicode = meta.artist_unicode.as_deref().unwrap_or(&meta.artist),
        creator = meta.creator,
        version = meta.version,
        source = meta.source.as_deref().unwrap_or(""),
        tags = meta.tags.join(" "),
        hp = chart.hp_drain,
        keys = chart.key_count,
        od = chart.overall_difficulty,
    );

    if let Some(bg) = &chart.background_file {
        let _ = writeln!(out, "0,0,\"{}\",0,0", bg);
    }

    out.push_str("\n[TimingPoints]\n");
    for tp in &chart.timing_points {
        let _ = writeln!(
            out,
            "{},{},{},1,0,100,1,0",
            format_time(tp.time_ms),
            tp.beat_len(),
            tp.meter.max(1)
        );
    }

    out.push_str("\n\n[HitObjects]\n");
    for note in &chart.notes {
        let x = column_to_x(note.column, chart.key_count);
        let time = format_time(note.time_ms);
        match note.end_time_ms {
            Some(end) => {
                let _ = writeln!(out, "{},192,{},128,0,{}:0:0:0:0:", x, time, format_time(end));
            }
            None => {
                let _ = writeln!(out, "{},192,{},1,0,0:0:0:0:", x, time);
            }
        }
    }

    Ok(out)
}

fn format_time(ms: f64) -> i64 {
    ms.round() as i64
}

fn x_to_column(x: f32, key_count: u8) -> u8 {
    let column = (x * f32::from(key_count) / PLAYFIELD_WIDTH).floor();
    column.clamp(0.0, f32::from(key_count - 1)) as u8
}

fn column_to_x(column: u8, key_count: u8) -> i32 {
    let keys = i32::from(key_count);
    (i32::from(column) * 512 + 256) / keys
}
