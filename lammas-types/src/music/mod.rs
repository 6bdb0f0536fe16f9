//! Musical reference models: tuning systems, scales, chords and the
//! keyboard remapping table applied at export time.

mod chord;
mod keyboard_mapping;
mod scale;
mod temperament;

pub use chord::Chord;
pub use keyboard_mapping::{KeyChannel, KeyboardMapping};
pub use scale::{Scale, ScaleKeyAlignment};
pub use temperament::{Semitones, Temperament};
