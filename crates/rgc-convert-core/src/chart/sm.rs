//! StepMania `.sm` codec
//!
//! Notes are stored on a beat grid, so both directions go through a
//! [`TempoMap`] built from `#BPMS`. Only the first `#NOTES` block of a file
//! is read. Written notes are quantized to 192nds of a measure.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use super::{non_empty, Chart, ChartMetadata, Note, TimingPoint};
use crate::error::ChartError;

const BEATS_PER_MEASURE: f64 = 4.0;
const ROWS_PER_MEASURE: u64 = 192;
const ROWS_PER_BEAT: f64 = ROWS_PER_MEASURE as f64 / BEATS_PER_MEASURE;
const QUANTIZATIONS: [u64; 10] = [4, 8, 12, 16, 24, 32, 48, 64, 96, 192];

fn style_key_count(style: &str) -> Option<u8> {
    match style {
        "dance-single" => Some(4),
        "pump-single" => Some(5),
        "dance-solo" => Some(6),
        "kb7-single" => Some(7),
        "dance-double" => Some(8),
        "pump-double" => Some(10),
        _ => None,
    }
}

fn key_count_style(keys: u8) -> Option<&'static str> {
    match keys {
        4 => Some("dance-single"),
        5 => Some("pump-single"),
        6 => Some("dance-solo"),
        7 => Some("kb7-single"),
        8 => Some("dance-double"),
        10 => Some("pump-double"),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy)]
struct BpmSegment {
    beat: f64,
    bpm: f64,
    /// Milliseconds from beat zero to the start of this segment
    time_ms: f64,
}

/// Piecewise-linear mapping between beats and milliseconds
#[derive(Debug)]
struct TempoMap {
    segments: Vec<BpmSegment>,
}

impl TempoMap {
    fn new(mut changes: Vec<(f64, f64)>) -> Result<Self, ChartError> {
        changes.retain(|(_, bpm)| *bpm > 0.0);
        changes.sort_by(|a, b| a.0.total_cmp(&b.0));
        if changes.is_empty() {
            return Err(ChartError::MissingSection("BPMS"));
        }

        let mut segments: Vec<BpmSegment> = Vec::with_capacity(changes.len());
        for (beat, bpm) in changes {
            let time_ms = match segments.last() {
                Some(prev) => prev.time_ms + (beat - prev.beat) * 60_000.0 / prev.bpm,
                None => beat * 60_000.0 / bpm,
            };
            segments.push(BpmSegment { beat, bpm, time_ms });
        }
        Ok(Self { segments })
    }

    fn segment_at_beat(&self, beat: f64) -> &BpmSegment {
        self.segments
            .iter()
            .rev()
            .find(|s| s.beat <= beat)
            .unwrap_or(&self.segments[0])
    }

    fn segment_at_ms(&self, ms: f64) -> &BpmSegment {
        self.segments
            .iter()
            .rev()
            .find(|s| s.time_ms <= ms)
            .unwrap_or(&self.segments[0])
    }

    fn beat_to_ms(&self, beat: f64) -> f64 {
        let seg = self.segment_at_beat(beat);
        seg.time_ms + (beat - seg.beat) * 60_000.0 / seg.bpm
    }

    fn ms_to_beat(&self, ms: f64) -> f64 {
        let seg = self.segment_at_ms(ms);
        seg.beat + (ms - seg.time_ms) * seg.bpm / 60_000.0
    }
}

/// `#KEY:VALUE;` pairs in file order, keys uppercased
fn read_tags(text: &str) -> Vec<(String, String)> {
    let stripped: String = text
        .lines()
        .map(|line| match line.find("//") {
            Some(idx) => &line[..idx],
            None => line,
        })
        .collect::<Vec<_>>()
        .join("\n");

    stripped
        .split(';')
        .filter_map(|piece| {
            let start = piece.find('#')?;
            let (key, value) = piece[start + 1..].split_once(':')?;
            Some((key.trim().to_ascii_uppercase(), value.trim().to_string()))
        })
        .collect()
}

fn parse_bpms(value: &str) -> Result<Vec<(f64, f64)>, ChartError> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|pair| {
            let (beat, bpm) = pair
                .split_once('=')
                .ok_or_else(|| ChartError::invalid("BPMS", pair))?;
            let beat = beat.trim().parse::<f64>();
            let bpm = bpm.trim().parse::<f64>();
            match (beat, bpm) {
                (Ok(beat), Ok(bpm)) => Ok((beat, bpm)),
                _ => Err(ChartError::invalid("BPMS", pair)),
            }
        })
        .collect()
}

fn parse_seconds(field: &'static str, value: &str) -> Result<f64, ChartError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| ChartError::invalid(field, value))
}

/// Parse the first chart of a StepMania file
pub fn parse(text: &str) -> Result<Chart, ChartError> {
    let tags = read_tags(text);
    let tag = |name: &str| {
        tags.iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    };

    let tempo = TempoMap::new(parse_bpms(
        tag("BPMS").ok_or(ChartError::MissingSection("BPMS"))?,
    )?)?;
    let offset_ms = match tag("OFFSET").filter(|v| !v.is_empty()) {
        Some(v) => parse_seconds("OFFSET", v)? * 1000.0,
        None => 0.0,
    };
    let to_ms = |beat: f64| tempo.beat_to_ms(beat) - offset_ms;

    let notes_value = tag("NOTES").ok_or(ChartError::MissingSection("NOTES"))?;
    let fields: Vec<&str> = notes_value.splitn(6, ':').map(str::trim).collect();
    if fields.len() < 6 {
        return Err(ChartError::Malformed("incomplete #NOTES header".into()));
    }
    let key_count =
        style_key_count(fields[0]).ok_or_else(|| ChartError::UnsupportedMode(fields[0].into()))?;
    let keys = usize::from(key_count);

    let mut notes = Vec::new();
    let mut open_holds: Vec<Option<f64>> = vec![None; keys];

    for (measure_idx, measure) in fields[5].split(',').enumerate() {
        let rows: Vec<&str> = measure
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        let row_count = rows.len();

        for (row_idx, row) in rows.iter().enumerate() {
            if row.len() < keys {
                return Err(ChartError::invalid("NOTES row", *row));
            }
            let beat = measure_idx as f64 * BEATS_PER_MEASURE
                + BEATS_PER_MEASURE * row_idx as f64 / row_count as f64;
            let time = to_ms(beat);

            for (column, ch) in row.chars().take(keys).enumerate() {
                match ch {
                    '1' => notes.push(Note::tap(time, column as u8)),
                    '2' | '4' => open_holds[column] = Some(time),
                    '3' => {
                        if let Some(start) = open_holds[column].take() {
                            notes.push(Note::hold(start, column as u8, time));
                        }
                    }
                    _ => {}
                }
            }
        }
    }

    // A hold head without a tail degrades to a tap
    for (column, start) in open_holds.into_iter().enumerate() {
        if let Some(start) = start {
            notes.push(Note::tap(start, column as u8));
        }
    }

    let title = tag("TITLE").unwrap_or_default().to_string();
    let artist = tag("ARTIST").unwrap_or_default().to_string();
    let (title, title_unicode) = match tag("TITLETRANSLIT").and_then(non_empty) {
        Some(translit) if translit != title => (translit, Some(title)),
        _ => (title, None),
    };
    let (artist, artist_unicode) = match tag("ARTISTTRANSLIT").and_then(non_empty) {
        Some(translit) if translit != artist => (translit, Some(artist)),
        _ => (artist, None),
    };
    let version = if fields[1].is_empty() { fields[2] } else { fields[1] };

    let preview_time_ms = match tag("SAMPLESTART").filter(|v| !v.is_empty()) {
        Some(v) => Some((parse_seconds("SAMPLESTART", v)? * 1000.0).round() as i64),
        None => None,
    };

    let mut chart = Chart {
        metadata: ChartMetadata {
            title,
            title_unicode,
            artist,
            artist_unicode,
            creator: tag("CREDIT").unwrap_or_default().to_string(),
            version: version.to_string(),
            source: None,
            tags: Vec::new(),
        },
        key_count,
        audio_file: tag("MUSIC").unwrap_or_default().to_string(),
        background_file: tag("BACKGROUND").and_then(non_empty),
        preview_time_ms,
        timing_points: tempo
            .segments
            .iter()
            .map(|s| TimingPoint::new(s.time_ms - offset_ms, s.bpm))
            .collect(),
        notes,
        ..Chart::default()
    };
    chart.normalize();
    Ok(chart)
}

/// Write a chart as a single-chart StepMania file
pub fn write(chart: &Chart) -> Result<String, ChartError> {
    let style =
        key_count_style(chart.key_count).ok_or(ChartError::UnsupportedKeyCount(chart.key_count))?;
    let keys = usize::from(chart.key_count);

    let mut timing = chart.timing_points.clone();
    timing.sort_by(|a, b| a.time_ms.total_cmp(&b.time_ms));
    if timing.is_empty() {
        timing.push(TimingPoint::new(0.0, 120.0));
    }
    let first = timing[0];

    // Beat zero sits on the first timing point, moved back by whole measures
    // so that no note lands on a negative beat
    let earliest = chart
        .notes
        .iter()
        .map(|n| n.time_ms)
        .fold(first.time_ms, f64::min);
    let measure_ms = BEATS_PER_MEASURE * first.beat_len();
    let shift = ((first.time_ms - earliest) / measure_ms).ceil().max(0.0);
    let origin = first.time_ms - shift * measure_ms;

    let mut bpms = vec![(0.0, first.bpm)];
    let mut prev = (shift * BEATS_PER_MEASURE, first.time_ms, first.bpm);
    for tp in timing.iter().skip(1) {
        let beat = prev.0 + (tp.time_ms - prev.1) * prev.2 / 60_000.0;
        bpms.push((beat, tp.bpm));
        prev = (beat, tp.time_ms, tp.bpm);
    }
    let tempo = TempoMap::new(bpms.clone())?;

    let to_row = |ms: f64| -> u64 {
        let beat = tempo.ms_to_beat(ms - origin);
        (beat * ROWS_PER_BEAT).round().max(0.0) as u64
    };

    let mut grid: BTreeMap<u64, Vec<u8>> = BTreeMap::new();
    let mut place = |row: u64, column: u8, ch: u8| {
        if usize::from(column) < keys {
            grid.entry(row).or_insert_with(|| vec![b'0'; keys])[usize::from(column)] = ch;
        }
    };
    for note in &chart.notes {
        let start = to_row(note.time_ms);
        match note.end_time_ms {
            Some(end) => {
                let end = to_row(end).max(start + 1);
                place(start, note.column, b'2');
                place(end, note.column, b'3');
            }
            None => place(start, note.column, b'1'),
        }
    }

    let meta = &chart.metadata;
    let mut out = String::new();
    match &meta.title_unicode {
        Some(unicode) => {
            let _ = writeln!(out, "#TITLE:{};", unicode);
            let _ = writeln!(out, "#TITLETRANSLIT:{};", meta.title);
        }
        None => {
            let _ = writeln!(out, "#TITLE:{};", meta.title);
        }
    }
    match &meta.artist_unicode {
        Some(unicode) => {
            let _ = writeln!(out, "#ARTIST:{};", unicode);
            let _ = writeln!(out, "#ARTISTTRANSLIT:{};", meta.artist);
        }
        None => {
            let _ = writeln!(out, "#ARTIST:{};", meta.artist);
        }
    }
    let _ = writeln!(out, "#CREDIT:{};", meta.creator);
    let _ = writeln!(out, "#MUSIC:{};", chart.audio_file);
    let _ = writeln!(
        out,
        "#BACKGROUND:{};",
        chart.background_file.as_deref().unwrap_or("")
    );
    let _ = writeln!(out, "#OFFSET:{:.3};", -origin / 1000.0);
    if let Some(preview) = chart.preview_time_ms {
        let _ = writeln!(out, "#SAMPLESTART:{:.3};", preview as f64 / 1000.0);
        out.push_str("#SAMPLELENGTH:10.000;\n");
    }
    out.push_str("#SELECTABLE:YES;\n");
    let bpm_list: Vec<String> = bpms
        .iter()
        .map(|(beat, bpm)| format!("{:.3}={:.3}", beat, bpm))
        .collect();
    let _ = writeln!(out, "#BPMS:{};", bpm_list.join(","));
    out.push_str("#STOPS:;\n\n");

    let _ = writeln!(out, "//---------------{} - {}----------------", style, meta.version);
    out.push_str("#NOTES:\n");
    let _ = writeln!(out, "     {}:", style);
    let _ = writeln!(out, "     {}:", meta.version.replace(':', " "));
    out.push_str("     Edit:\n     1:\n     0,0,0,0,0:\n");

    let last_row = grid.keys().next_back().copied().unwrap_or(0);
    let measures = last_row / ROWS_PER_MEASURE + 1;
    let empty_row = "0".repeat(keys);

    for measure in 0..measures {
        let base = measure * ROWS_PER_MEASURE;
        let rows: Vec<(u64, &Vec<u8>)> = grid
            .range(base..base + ROWS_PER_MEASURE)
            .map(|(row, cells)| (row - base, cells))
            .collect();

        let quantization = QUANTIZATIONS
            .iter()
            .copied()
            .find(|q| {
                let step = ROWS_PER_MEASURE / q;
                rows.iter().all(|(row, _)| row % step == 0)
            })
            .unwrap_or(ROWS_PER_MEASURE);
        let step = ROWS_PER_MEASURE / quantization;

        let mut row_iter = rows.iter().peekable();
        for line in 0..quantization {
            let offset = line * step;
            match row_iter.peek() {
                Some((row, cells)) if *row == offset => {
                    out.push_str(&String::from_utf8_lossy(cells));
                    row_iter.next();
                }
                _ => out.push_str(&empty_row),
            }
            out.push('\n');
        }
        out.push_str(if measure + 1 == measures { ";\n" } else { ",\n" });
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::fixtures::sample_chart;

    const SM: &str = "\
#TITLE:Song;
#ARTIST:Band;
#CREDIT:Stepper;
#MUSIC:song.ogg;
#OFFSET:-0.100;
#BPMS:0.000=120.000,4.000=240.000;
// a comment line
#NOTES:
     dance-single:
     :
     Hard:
     10:
     0,0,0,0,0:
1000
0100
0020
0000
,
0030
1001
;
";

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_tempo_map() {
        let tempo = TempoMap::new(vec![(0.0, 120.0), (4.0, 240.0)]).unwrap();
        assert!(approx(tempo.beat_to_ms(4.0), 2000.0));
        assert!(approx(tempo.beat_to_ms(6.0), 2500.0));
        assert!(approx(tempo.ms_to_beat(2500.0), 6.0));
        assert!(approx(tempo.ms_to_beat(1000.0), 2.0));
    }

    #[test]
    fn test_parse() {
        let chart = parse(SM).unwrap();
        assert_eq!(chart.key_count, 4);
        assert_eq!(chart.metadata.title, "Song");
        assert_eq!(chart.metadata.creator, "Stepper");
        assert_eq!(chart.metadata.version, "Hard");
        assert_eq!(chart.audio_file, "song.ogg");

        // Offset -0.1s shifts everything 100ms later
        let times: Vec<(f64, u8)> = chart.notes.iter().map(|n| (n.time_ms, n.column)).collect();
        assert_eq!(times.len(), 5);
        assert!(approx(times[0].0, 100.0) && times[0].1 == 0);
        assert!(approx(times[1].0, 600.0) && times[1].1 == 1);

        let hold = chart.notes.iter().find(|n| n.is_hold()).unwrap();
        assert_eq!(hold.column, 2);
        assert!(approx(hold.time_ms, 1100.0));
        assert!(approx(hold.end_time_ms.unwrap(), 2100.0));

        // Second measure, second of two rows: beat 6 at 240 BPM
        let last = chart.notes.last().unwrap();
        assert!(approx(last.time_ms, 2600.0));
        assert_eq!(chart.timing_points.len(), 2);
        assert!(approx(chart.timing_points[1].time_ms, 2100.0));
    }

    #[test]
    fn test_round_trip() {
        let chart = sample_chart();
        let text = write(&chart).unwrap();
        assert!(text.contains("#BPMS:0.000=120.000,4.000=150.000;"));

        let parsed = parse(&text).unwrap();
        assert_eq!(parsed.notes.len(), chart.notes.len());
        for (a, b) in parsed.notes.iter().zip(&chart.notes) {
            assert_eq!(a.column, b.column);
            assert!(approx(a.time_ms, b.time_ms), "{} != {}", a.time_ms, b.time_ms);
            assert_eq!(a.is_hold(), b.is_hold());
        }
        assert_eq!(parsed.preview_time_ms, Some(1000));
        assert_eq!(parsed.metadata.version, "Hard");
    }

    #[test]
    fn test_notes_before_first_timing_point() {
        let mut chart = sample_chart();
        chart.timing_points = vec![TimingPoint::new(1000.0, 120.0)];
        chart.notes = vec![Note::tap(250.0, 0), Note::tap(1000.0, 1)];

        let parsed = parse(&write(&chart).unwrap()).unwrap();
        assert!(approx(parsed.notes[0].time_ms, 250.0));
        assert!(approx(parsed.notes[1].time_ms, 1000.0));
    }

    #[test]
    fn test_unsupported_key_count() {
        let mut chart = sample_chart();
        chart.key_count = 9;
        assert_eq!(write(&chart), Err(ChartError::UnsupportedKeyCount(9)));
    }

    #[test]
    fn test_missing_sections() {
        assert_eq!(
            parse("#TITLE:x;").unwrap_err(),
            ChartError::MissingSection("BPMS")
        );
        assert_eq!(
            parse("#BPMS:0=120;").unwrap_err(),
            ChartError::MissingSection("NOTES")
        );
    }
}
