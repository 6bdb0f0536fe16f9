use serde::{Deserialize, Serialize};

use super::chord::Chord;

/// How `Scale::nearest_scale_key` resolves an out-of-scale chromatic key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScaleKeyAlignment {
    #[default]
    Round,
    Ceil,
    Floor,
}

/// An ordered set of step indices within one period.
///
/// `keys` holds chromatic indices accessed by in-scale position, e.g. for
/// the major scale: keys[0] = 0, keys[1] = 2, keys[2] = 4, and so on.
/// Immutable after construction; the `with_*` methods build new instances.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "ScaleWire", into = "ScaleWire")]
pub struct Scale {
    name: String,
    keys: Vec<i32>,
    base_period: i32,
}

pub(crate) const TWELVE_TONE_PERIOD: i32 = 12;

impl Scale {
    /// Builds a scale from raw chromatic keys, wrapping them into the
    /// period, sorting and deduplicating, and making sure the tonic (0) is
    /// present.
    pub fn new(name: impl Into<String>, keys: &[i32], base_period: i32) -> Self {
        let base_period = base_period.max(2);
        let mut sanitized: Vec<i32> = keys.iter().map(|k| k.rem_euclid(base_period)).collect();
        sanitized.push(0);
        sanitized.sort_unstable();
        sanitized.dedup();
        Self {
            name: name.into(),
            keys: sanitized,
            base_period,
        }
    }

    /// Builds a scale from a space-separated interval string, e.g. the
    /// major scale is "2 2 1 2 2 2 1". The period is the interval sum.
    pub fn from_intervals(name: impl Into<String>, intervals: &str) -> Self {
        let steps: Vec<i32> = intervals
            .split_whitespace()
            .filter_map(|t| t.parse::<i32>().ok())
            .collect();
        let period: i32 = steps.iter().sum();
        let mut keys = Vec::with_capacity(steps.len());
        let mut at = 0;
        for step in &steps {
            keys.push(at);
            at += step;
        }
        Self::new(name, &keys, period.max(2))
    }

    pub fn with_name(&self, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..self.clone()
        }
    }

    pub fn with_keys(&self, keys: &[i32]) -> Self {
        Self::new(self.name.clone(), keys, self.base_period)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn keys(&self) -> &[i32] {
        &self.keys
    }

    /// Number of in-scale steps per period.
    pub fn size(&self) -> usize {
        self.keys.len()
    }

    /// Base octave size, like the 12-tone chromatic octave for diatonic
    /// scales.
    pub fn base_period(&self) -> i32 {
        self.base_period
    }

    pub fn is_valid(&self) -> bool {
        self.keys.len() > 1 && self.base_period > 1
    }

    /// The interval representation, e.g. "2 2 1 2 2 2 1" for the major
    /// scale; inverse of `from_intervals`.
    pub fn intervals(&self) -> String {
        let mut out = Vec::with_capacity(self.keys.len());
        for (i, key) in self.keys.iter().enumerate() {
            let next = self
                .keys
                .get(i + 1)
                .copied()
                .unwrap_or(self.base_period);
            out.push((next - key).to_string());
        }
        out.join(" ")
    }

    /// True if the chromatic key (wrapped into the period) is in the scale.
    pub fn has_key(&self, chromatic_key: i32) -> bool {
        let wrapped = chromatic_key.rem_euclid(self.base_period);
        self.keys.binary_search(&wrapped).is_ok()
    }

    /// Chromatic to in-scale key, if present. The chromatic key is wrapped
    /// into the period first.
    pub fn scale_key(&self, chromatic_key: i32) -> Option<usize> {
        let wrapped = chromatic_key.rem_euclid(self.base_period);
        self.keys.binary_search(&wrapped).ok()
    }

    /// The closest in-scale key for a chromatic one. With `Ceil` or `Floor`
    /// the result can fall outside `[0, size)`; pair it with
    /// `chromatic_key`, which adjusts the period accordingly.
    pub fn nearest_scale_key(&self, chromatic_key: i32, alignment: ScaleKeyAlignment) -> i32 {
        let wrapped = chromatic_key.rem_euclid(self.base_period);
        match alignment {
            ScaleKeyAlignment::Round => {
                let mut best = 0usize;
                let mut best_distance = i32::MAX;
                for (i, key) in self.keys.iter().enumerate() {
                    let distance = (key - wrapped).abs();
                    if distance < best_distance {
                        best = i;
                        best_distance = distance;
                    }
                }
                // the next period's tonic may be closer than any in-scale key
                if self.base_period - wrapped < best_distance {
                    self.keys.len() as i32
                } else {
                    best as i32
                }
            }
            ScaleKeyAlignment::Ceil => match self.keys.binary_search(&wrapped) {
                Ok(i) => i as i32,
                Err(i) => i as i32, // may equal size: tonic of the next period
            },
            ScaleKeyAlignment::Floor => match self.keys.binary_search(&wrapped) {
                Ok(i) => i as i32,
                Err(i) => i as i32 - 1,
            },
        }
    }

    /// In-scale key (any period, can be negative) back to chromatic.
    /// With `restrict_to_one_octave` the period offset is discarded.
    pub fn chromatic_key(
        &self,
        in_scale_key: i32,
        extra_chromatic_offset: i32,
        restrict_to_one_octave: bool,
    ) -> i32 {
        let size = self.keys.len() as i32;
        let key = self.keys[in_scale_key.rem_euclid(size) as usize];
        if restrict_to_one_octave {
            key + extra_chromatic_offset
        } else {
            let period = in_scale_key.div_euclid(size);
            key + period * self.base_period + extra_chromatic_offset
        }
    }

    /// Renders a chord into chromatic keys with the given in-scale root.
    pub fn chord_keys(&self, chord: &Chord, in_scale_root: i32, one_octave: bool) -> Vec<i32> {
        chord
            .scale_steps()
            .iter()
            .map(|step| self.chromatic_key(in_scale_root + step, 0, one_octave))
            .collect()
    }

    /// In-scale keys going up one period, tonic to tonic inclusive.
    pub fn up_scale(&self) -> Vec<i32> {
        let mut keys = self.keys.clone();
        keys.push(self.base_period);
        keys
    }

    pub fn down_scale(&self) -> Vec<i32> {
        let mut keys = self.up_scale();
        keys.reverse();
        keys
    }

    /// A flat third reads as "minor"-ish (Aeolian, Phrygian, Locrian...).
    pub fn seems_minor(&self) -> bool {
        self.keys.len() > 2 && self.chromatic_key(2, 0, true) == 3
    }

    /// Scales are equivalent when they select the same steps of the same
    /// period; names are ignored (Phrygian is called Zokuso in Japan and
    /// Ousak in Greece).
    pub fn is_equivalent_to(&self, other: &Scale) -> bool {
        self.base_period == other.base_period && self.keys == other.keys
    }

    /// Similarity measure: the sum of absolute per-step differences. The
    /// larger the value, the bigger the difference.
    pub fn difference_from(&self, other: &Scale) -> i32 {
        let common = self.keys.len().min(other.keys.len());
        let mut sum = 0;
        for i in 0..common {
            sum += (self.keys[i] - other.keys[i]).abs();
        }
        sum
    }

    //===------------------------------------------------------------===//
    // Hard-coded defaults
    //===------------------------------------------------------------===//

    pub fn chromatic() -> Self {
        Self::from_intervals("Chromatic", "1 1 1 1 1 1 1 1 1 1 1 1")
    }

    pub fn natural_major() -> Self {
        Self::from_intervals("Natural major", "2 2 1 2 2 2 1")
    }

    pub fn natural_minor() -> Self {
        Self::from_intervals("Natural minor", "2 1 2 2 1 2 2")
    }

    /// The stock scale library offered by pickers and key signatures.
    pub fn built_in() -> Vec<Self> {
        vec![
            Self::chromatic(),
            Self::natural_major(),
            Self::natural_minor(),
            Self::from_intervals("Dorian", "2 1 2 2 2 1 2"),
            Self::from_intervals("Phrygian", "1 2 2 2 1 2 2"),
            Self::from_intervals("Lydian", "2 2 2 1 2 2 1"),
            Self::from_intervals("Mixolydian", "2 2 1 2 2 1 2"),
            Self::from_intervals("Locrian", "1 2 2 1 2 2 2"),
            Self::from_intervals("Major pentatonic", "2 2 3 2 3"),
            Self::from_intervals("Blues", "3 2 1 1 3 2"),
        ]
    }
}

impl Default for Scale {
    fn default() -> Self {
        Self::natural_major()
    }
}

#[derive(Serialize, Deserialize)]
struct ScaleWire {
    name: String,
    intervals: String,
    #[serde(default = "twelve", skip_serializing_if = "is_twelve")]
    period: i32,
}

fn twelve() -> i32 {
    TWELVE_TONE_PERIOD
}

fn is_twelve(period: &i32) -> bool {
    *period == TWELVE_TONE_PERIOD
}

impl From<ScaleWire> for Scale {
    fn from(wire: ScaleWire) -> Self {
        let scale = Scale::from_intervals(wire.name, &wire.intervals);
        debug_assert_eq!(scale.base_period, wire.period);
        scale
    }
}

impl From<Scale> for ScaleWire {
    fn from(scale: Scale) -> Self {
        Self {
            intervals: scale.intervals(),
            period: scale.base_period,
            name: scale.name,
        }
    }
}
