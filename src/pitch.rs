//! Pitch math: diatonic steps, equal-temperament frequencies and the
//! 12-tone tonic cycle used by the chord-control bridge.
//!
//! Accidentals are whole-semitone shifts. Fractional `alter` encodings are
//! rounded to the nearest integer at parse time; nothing here is microtonal.

use crate::config::A4_FREQUENCY_HZ;

/// The seven diatonic note letters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Step {
    /// C
    C,
    /// D
    D,
    /// E
    E,
    /// F
    F,
    /// G
    G,
    /// A
    A,
    /// B
    B,
}

impl Step {
    /// Parses a step letter as found in a `<step>` element.
    pub fn from_name(name: &str) -> Option<Step> {
        match name.trim() {
            "C" => Some(Step::C),
            "D" => Some(Step::D),
            "E" => Some(Step::E),
            "F" => Some(Step::F),
            "G" => Some(Step::G),
            "A" => Some(Step::A),
            "B" => Some(Step::B),
            _ => None,
        }
    }

    /// Semitone offset of this step from C within one octave.
    pub fn semitone(self) -> i32 {
        match self {
            Step::C => 0,
            Step::D => 2,
            Step::E => 4,
            Step::F => 5,
            Step::G => 7,
            Step::A => 9,
            Step::B => 11,
        }
    }
}

/// Signed semitone distance of a pitch from A4 after applying the accidental
/// and the uniform transpose offset.
///
/// Octave numbering follows the MIDI convention where C4 sits an octave plus
/// a major sixth below A4.
pub fn semitone_from_a4(step: Step, alter: i32, octave: i32, transpose: i32) -> i32 {
    step.semitone() + 12 * (octave + 1) - 69 + transpose + alter
}

/// Equal-temperament frequency of a pitch in Hz, A4 = 440.
pub fn frequency_hz(step: Step, alter: i32, octave: i32, transpose: i32) -> f64 {
    let semis = semitone_from_a4(step, alter, octave, transpose);
    A4_FREQUENCY_HZ * 2f64.powf(semis as f64 / 12.0)
}

/// Canonical sharp-preferring names for the 12 pitch classes.
const PITCH_CLASS_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// A named tonic as declared by the chord-tonic control: a pitch class plus
/// a major/minor sign.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tonic {
    /// Pitch class, 0 = C .. 11 = B.
    pub pitch_class: u8,
    /// True for the minor-equivalent sign.
    pub minor: bool,
}

impl Tonic {
    /// Builds a tonic from a pitch class, wrapping into 0..12.
    pub fn from_pitch_class(pitch_class: i32, minor: bool) -> Tonic {
        Tonic {
            pitch_class: pitch_class.rem_euclid(12) as u8,
            minor,
        }
    }

    /// Parses a tonic name such as `C`, `F#`, `Bb` or `Am`.
    pub fn parse(name: &str) -> Option<Tonic> {
        let name = name.trim();
        let (body, minor) = match name.strip_suffix('m') {
            // "Em" is minor but a bare "m" is not a tonic
            Some(rest) if !rest.is_empty() => (rest, true),
            _ => (name, false),
        };

        let mut chars = body.chars();
        let step = match chars.next()?.to_ascii_uppercase() {
            'C' => Step::C,
            'D' => Step::D,
            'E' => Step::E,
            'F' => Step::F,
            'G' => Step::G,
            'A' => Step::A,
            'B' => Step::B,
            _ => return None,
        };
        let alter: i32 = match chars.as_str() {
            "" => 0,
            "#" => 1,
            "b" => -1,
            "##" | "x" => 2,
            "bb" => -2,
            _ => return None,
        };

        Some(Tonic::from_pitch_class(step.semitone() + alter, minor))
    }

    /// Sharp-preferring display name, e.g. `F#` or `F#m`.
    pub fn name(&self) -> String {
        let base = PITCH_CLASS_NAMES[self.pitch_class as usize];
        if self.minor {
            format!("{base}m")
        } else {
            base.to_string()
        }
    }

    /// The tonic `semitones` above (or below, if negative) this one,
    /// preserving the mode sign.
    pub fn shifted(&self, semitones: i32) -> Tonic {
        Tonic::from_pitch_class(self.pitch_class as i32 + semitones, self.minor)
    }
}

/// Signed semitone distance from `base` to `target` along the shortest path
/// in the 12-tone cycle.
///
/// The result is in −5..=+6; the 6-semitone tie resolves to +6. Mode signs
/// are ignored, only pitch classes matter.
pub fn tonic_distance(base: Tonic, target: Tonic) -> i32 {
    let raw = (target.pitch_class as i32 - base.pitch_class as i32).rem_euclid(12);
    if raw > 6 { raw - 12 } else { raw }
}
