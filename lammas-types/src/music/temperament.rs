use serde::{Deserialize, Serialize};

use super::scale::Scale;

/// Plain 12-tone intervals, named to avoid magic numbers when mapping into
/// other temperaments.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Semitones {
    PerfectUnison = 0,
    MinorSecond = 1,
    MajorSecond = 2,
    MinorThird = 3,
    MajorThird = 4,
    PerfectFourth = 5,
    Tritone = 6,
    PerfectFifth = 7,
    MinorSixth = 8,
    MajorSixth = 9,
    MinorSeventh = 10,
    MajorSeventh = 11,
    PerfectOctave = 12,
}

/// A tuning system: the ordered note names of one period, the period's
/// frequency ratio, plus two helper scales. `highlighting` drives the
/// keyboard visual cue; `chromatic_map` tells which steps play the role of
/// the twelve 12-EDO semitones. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "TemperamentWire", into = "TemperamentWire")]
pub struct Temperament {
    id: String,
    name: String,
    period: Vec<String>,
    period_range: f64,
    highlighting: Scale,
    chromatic_map: Scale,
    middle_c: i32,
    keys_total: i32,
}

/// Middle C sits at the start of the 6th period, so 12-EDO lands on key 60.
pub const PERIOD_NUM_FOR_MIDDLE_C: i32 = 5;

/// Keyboard height in periods, the same for every temperament.
pub const NUM_DISPLAYED_PERIODS: i32 = 8;

const DISPLAYED_PERIOD_NUM_FOR_MIDDLE_C: i32 = 4;

impl Temperament {
    /// Panics if the period holds fewer than 5 note names.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        period: Vec<String>,
        period_range: f64,
        highlighting: Scale,
        chromatic_map: Scale,
    ) -> Self {
        assert!(period.len() >= 5, "temperament period too short");
        let period_size = period.len() as i32;
        Self {
            id: id.into(),
            name: name.into(),
            period,
            period_range,
            highlighting,
            chromatic_map,
            middle_c: period_size * PERIOD_NUM_FOR_MIDDLE_C,
            keys_total: period_size * NUM_DISPLAYED_PERIODS,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn period(&self) -> &[String] {
        &self.period
    }

    pub fn period_size(&self) -> i32 {
        self.period.len() as i32
    }

    pub fn period_range(&self) -> f64 {
        self.period_range
    }

    pub fn num_keys(&self) -> i32 {
        self.keys_total
    }

    pub fn middle_c(&self) -> i32 {
        self.middle_c
    }

    pub fn highlighting(&self) -> &Scale {
        &self.highlighting
    }

    pub fn chromatic_map(&self) -> &Scale {
        &self.chromatic_map
    }

    pub fn is_default(&self) -> bool {
        self.id == Self::twelve_tone_equal_temperament().id
    }

    /// Maps a 12-tone interval onto this temperament's steps through the
    /// chromatic map; the identity for 12-EDO.
    pub fn equivalent_of_twelve_tone_interval(&self, interval: Semitones) -> i32 {
        self.chromatic_map.chromatic_key(interval as i32, 0, false)
    }

    /// Note name for a key, e.g. "A#" or "A#3" with the period number.
    pub fn midi_note_name(&self, key: i32, include_period: bool) -> String {
        let size = self.period_size();
        let name = &self.period[key.rem_euclid(size) as usize];
        if include_period {
            let period = key.div_euclid(size)
                - (PERIOD_NUM_FOR_MIDDLE_C - DISPLAYED_PERIOD_NUM_FOR_MIDDLE_C);
            format!("{}{}", name, period)
        } else {
            name.clone()
        }
    }

    //===------------------------------------------------------------===//
    // Hard-coded defaults
    //===------------------------------------------------------------===//

    pub fn twelve_tone_equal_temperament() -> Self {
        Self::new(
            "12edo",
            "12 equal temperament",
            ["C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            2.0,
            Scale::natural_major(),
            Scale::chromatic(),
        )
    }

    pub fn nineteen_tone_equal_temperament() -> Self {
        Self::new(
            "19edo",
            "19 equal temperament",
            [
                "C", "C#", "Db", "D", "D#", "Eb", "E", "E#", "F", "F#", "Gb", "G", "G#", "Ab",
                "A", "A#", "Bb", "B", "B#",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            2.0,
            Scale::from_intervals("Major", "3 3 2 3 3 3 2"),
            Scale::from_intervals("Chromatic map", "2 1 2 2 1 2 1 2 2 1 2 1"),
        )
    }

    pub fn built_in() -> Vec<Self> {
        vec![
            Self::twelve_tone_equal_temperament(),
            Self::nineteen_tone_equal_temperament(),
        ]
    }
}

impl Default for Temperament {
    fn default() -> Self {
        Self::twelve_tone_equal_temperament()
    }
}

#[derive(Serialize, Deserialize)]
struct TemperamentWire {
    id: String,
    name: String,
    period: Vec<String>,
    #[serde(default = "octave_range")]
    period_range: f64,
    highlighting: Scale,
    chromatic_map: Scale,
}

fn octave_range() -> f64 {
    2.0
}

impl From<TemperamentWire> for Temperament {
    fn from(wire: TemperamentWire) -> Self {
        Self::new(
            wire.id,
            wire.name,
            wire.period,
            wire.period_range,
            wire.highlighting,
            wire.chromatic_map,
        )
    }
}

impl From<Temperament> for TemperamentWire {
    fn from(t: Temperament) -> Self {
        Self {
            id: t.id,
            name: t.name,
            period: t.period,
            period_range: t.period_range,
            highlighting: t.highlighting,
            chromatic_map: t.chromatic_map,
        }
    }
}
