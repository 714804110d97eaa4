//! Measure walker over MusicXML-style score markup.
//!
//! The walker keeps a running tick cursor in the document's native
//! resolution and rescales onto the canonical grid at emit time, so the
//! rest of the engine never sees the source resolution. Divisions updates
//! mid-document start a fresh rescale segment anchored at the current
//! canonical position.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::config::{clamp_tempo, PlaybackConfig};
use crate::error::{EngineError, Result};
use crate::pitch::Step;
use crate::timeline::model::{NoteEvent, Pitch, ScoreTimeline, TempoChange};

/// One `<note>` block as read from the document, before normalization.
#[derive(Debug, Default)]
struct ParsedNote {
    is_rest: bool,
    is_chord: bool,
    is_grace: bool,
    step: Option<Step>,
    alter: f64,
    octave: i32,
    duration: Option<u64>,
    voice: u8,
    staff: u8,
    dynamics: Option<f64>,
}

/// Running cursor state while walking one part.
struct Walk {
    /// Native ticks per quarter for the current segment.
    divisions: u64,
    /// Native tick cursor relative to the current segment start.
    cursor: i64,
    /// Canonical tick of the current segment start.
    canonical_base: u64,
    /// Native duration of the previous non-continuation note, for `<chord/>`.
    prev_advance: u64,
}

impl Walk {
    fn new() -> Self {
        Self {
            divisions: 1,
            cursor: 0,
            canonical_base: 0,
            prev_advance: 0,
        }
    }

    /// Canonical tick at a native position within the current segment.
    fn canonical(&self, native: i64, ticks_per_quarter: u32) -> u64 {
        let native = native.max(0) as f64;
        self.canonical_base
            + (native * ticks_per_quarter as f64 / self.divisions as f64).round() as u64
    }

    /// Canonical duration for a native duration, at least 1 when nonzero.
    fn canonical_duration(&self, native: u64, ticks_per_quarter: u32) -> u64 {
        if native == 0 {
            return 0;
        }
        let scaled =
            (native as f64 * ticks_per_quarter as f64 / self.divisions as f64).round() as u64;
        scaled.max(1)
    }

    /// Re-anchors the rescale segment at the current position with new
    /// divisions.
    fn set_divisions(&mut self, divisions: u64, ticks_per_quarter: u32) {
        self.canonical_base = self.canonical(self.cursor, ticks_per_quarter);
        self.cursor = 0;
        self.divisions = divisions.max(1);
    }

    /// Rewinds the cursor, saturating at the segment start.
    fn rewind(&mut self, native: u64) {
        self.cursor -= native as i64;
        if self.cursor < 0 {
            log::warn!("backup rewound past segment start; clamping cursor to 0");
            self.cursor = 0;
        }
    }
}

/// Parses score markup into a [`ScoreTimeline`].
pub(super) fn parse_document(text: &str, config: &PlaybackConfig) -> Result<ScoreTimeline> {
    let tpq = config.ticks_per_quarter;
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut walk = Walk::new();
    let mut events: Vec<NoteEvent> = Vec::new();
    let mut base_tempo: Option<f64> = None;
    let mut tempo_changes: Vec<TempoChange> = Vec::new();
    let mut saw_score_content = false;

    let mut current_field: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_event_into(&mut buf)? {
            Event::Start(e) => {
                let name = local_name(&e);
                match name.as_str() {
                    "score-partwise" | "score-timewise" | "measure" => {
                        saw_score_content = true;
                        current_field = None;
                    }
                    "part" => {
                        saw_score_content = true;
                        // parts run in parallel; each starts at tick 0
                        walk.cursor = 0;
                        walk.canonical_base = 0;
                        walk.prev_advance = 0;
                        current_field = None;
                    }
                    "note" => {
                        let dynamics = float_attr(&e, b"dynamics");
                        let note = parse_note_block(&mut reader, &mut buf, dynamics)?;
                        emit_note(&mut walk, &mut events, note, config);
                        current_field = None;
                    }
                    "backup" => {
                        let amount = parse_duration_block(&mut reader, &mut buf, "backup")?;
                        walk.rewind(amount);
                        walk.prev_advance = 0;
                        current_field = None;
                    }
                    "forward" => {
                        let amount = parse_duration_block(&mut reader, &mut buf, "forward")?;
                        walk.cursor += amount as i64;
                        walk.prev_advance = 0;
                        current_field = None;
                    }
                    "sound" => {
                        record_tempo(&e, &walk, tpq, &mut base_tempo, &mut tempo_changes);
                        current_field = None;
                    }
                    _ => current_field = Some(name),
                }
            }

            Event::Empty(e) => {
                if local_name(&e) == "sound" {
                    record_tempo(&e, &walk, tpq, &mut base_tempo, &mut tempo_changes);
                }
            }

            Event::Text(e) => {
                if current_field.as_deref() == Some("divisions") {
                    let text = e.unescape()?;
                    let divisions: u64 = text.trim().parse()?;
                    walk.set_divisions(divisions, tpq);
                }
            }

            Event::End(_) => current_field = None,

            Event::Eof => break,
            _ => {}
        }
    }

    if !saw_score_content {
        return Err(EngineError::MalformedDocument(
            "no score content found".to_string(),
        ));
    }
    if events.iter().all(NoteEvent::is_rest) {
        return Err(EngineError::EmptyTimeline);
    }

    // ascending by tick, rests before notes at equal tick
    events.sort_by_key(|event| (event.tick, !event.is_rest() as u8));

    let mut onset_ticks: Vec<u64> = events.iter().map(|event| event.tick).collect();
    onset_ticks.sort_unstable();
    onset_ticks.dedup();

    tempo_changes.sort_by_key(|change| change.tick);

    Ok(ScoreTimeline {
        ticks_per_quarter: tpq,
        base_tempo_bpm: base_tempo.unwrap_or(config.default_tempo_bpm),
        events,
        onset_ticks,
        tempo_changes,
    })
}

/// Converts one parsed note into a timeline event and advances the cursor.
fn emit_note(walk: &mut Walk, events: &mut Vec<NoteEvent>, note: ParsedNote, config: &PlaybackConfig) {
    if note.is_grace {
        log::debug!("skipping grace note without duration");
        return;
    }
    let Some(native_duration) = note.duration else {
        log::debug!("skipping note without duration");
        return;
    };

    let tpq = config.ticks_per_quarter;
    let onset_native = if note.is_chord {
        // chord continuation shares the previous note's onset
        walk.cursor - walk.prev_advance as i64
    } else {
        walk.cursor
    };

    let pitch = if note.is_rest {
        None
    } else {
        match note.step {
            Some(step) => Some(Pitch {
                step,
                alter: note.alter.round() as i32,
                octave: note.octave,
            }),
            None => {
                log::warn!("note without pitch or rest marker; treating as rest");
                None
            }
        }
    };

    let velocity = note
        .dynamics
        .map(|d| ((d / 100.0) * 0.9).clamp(0.0, 1.0) as f32)
        .unwrap_or(config.default_velocity);

    events.push(NoteEvent {
        tick: walk.canonical(onset_native, tpq),
        duration_ticks: walk.canonical_duration(native_duration, tpq),
        pitch,
        voice: note.voice,
        staff: note.staff,
        velocity,
    });

    if !note.is_chord {
        walk.cursor += native_duration as i64;
        walk.prev_advance = native_duration;
    }
}

/// Reads one `<note>` block up to its closing tag.
fn parse_note_block<R: std::io::BufRead>(
    reader: &mut Reader<R>,
    buf: &mut Vec<u8>,
    dynamics: Option<f64>,
) -> Result<ParsedNote> {
    let mut note = ParsedNote {
        dynamics,
        ..ParsedNote::default()
    };
    let mut field: Option<String> = None;

    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => {
                let name = local_name(&e);
                match name.as_str() {
                    "rest" => note.is_rest = true,
                    "chord" => note.is_chord = true,
                    "grace" => note.is_grace = true,
                    _ => field = Some(name),
                }
            }
            Event::Empty(e) => match local_name(&e).as_str() {
                "rest" => note.is_rest = true,
                "chord" => note.is_chord = true,
                "grace" => note.is_grace = true,
                _ => {}
            },
            Event::Text(e) => {
                if let Some(name) = field.as_deref() {
                    let text = e.unescape()?;
                    let text = text.trim();
                    match name {
                        "step" => {
                            note.step = Some(Step::from_name(text).ok_or_else(|| {
                                EngineError::InvalidValue {
                                    field: "step".to_string(),
                                    value: text.to_string(),
                                    expected: "one of C D E F G A B".to_string(),
                                }
                            })?)
                        }
                        "alter" => note.alter = text.parse()?,
                        "octave" => note.octave = text.parse()?,
                        "duration" => note.duration = Some(text.parse()?),
                        "voice" => note.voice = text.parse().unwrap_or(0),
                        "staff" => note.staff = text.parse().unwrap_or(0),
                        _ => {}
                    }
                }
            }
            Event::End(e) => {
                if e.name().local_name().as_ref() == b"note" {
                    return Ok(note);
                }
                field = None;
            }
            Event::Eof => {
                return Err(EngineError::MalformedDocument(
                    "unexpected end of document inside <note>".to_string(),
                ))
            }
            _ => {}
        }
    }
}

/// Reads the `<duration>` out of a `<backup>` or `<forward>` block.
fn parse_duration_block<R: std::io::BufRead>(
    reader: &mut Reader<R>,
    buf: &mut Vec<u8>,
    block: &str,
) -> Result<u64> {
    let mut in_duration = false;
    let mut duration: Option<u64> = None;

    loop {
        buf.clear();
        match reader.read_event_into(buf)? {
            Event::Start(e) => in_duration = local_name(&e) == "duration",
            Event::Text(e) => {
                if in_duration {
                    duration = Some(e.unescape()?.trim().parse()?);
                }
            }
            Event::End(e) => {
                if e.name().local_name().as_ref() == block.as_bytes() {
                    return duration.ok_or_else(|| {
                        EngineError::MalformedDocument(format!("<{block}> without <duration>"))
                    });
                }
                in_duration = false;
            }
            Event::Eof => {
                return Err(EngineError::MalformedDocument(format!(
                    "unexpected end of document inside <{block}>"
                )))
            }
            _ => {}
        }
    }
}

/// Records a tempo marker from a `<sound tempo="..">` element.
fn record_tempo(
    e: &BytesStart<'_>,
    walk: &Walk,
    tpq: u32,
    base_tempo: &mut Option<f64>,
    tempo_changes: &mut Vec<TempoChange>,
) {
    let Some(tempo) = float_attr(e, b"tempo") else {
        return;
    };
    let bpm = clamp_tempo(tempo);
    if base_tempo.is_none() {
        *base_tempo = Some(bpm);
    } else {
        tempo_changes.push(TempoChange {
            tick: walk.canonical(walk.cursor, tpq),
            bpm,
        });
    }
}

/// Local element name of a start/empty tag as an owned string.
fn local_name(e: &BytesStart<'_>) -> String {
    String::from_utf8_lossy(e.name().local_name().as_ref()).into_owned()
}

/// Reads a float attribute off a tag, ignoring malformed values.
fn float_attr(e: &BytesStart<'_>, name: &[u8]) -> Option<f64> {
    e.attributes()
        .flatten()
        .find(|attr| attr.key.local_name().as_ref() == name)
        .and_then(|attr| attr.unescape_value().ok())
        .and_then(|value| value.trim().parse().ok())
}
