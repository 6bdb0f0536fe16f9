use serde::{Deserialize, Serialize};

/// A chord as a set of in-scale degree offsets from its root; rendering to
/// chromatic keys goes through a [`super::Scale`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chord {
    name: String,
    scale_steps: Vec<i32>,
}

impl Chord {
    pub fn new(name: impl Into<String>, scale_steps: &[i32]) -> Self {
        Self {
            name: name.into(),
            scale_steps: scale_steps.to_vec(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scale_steps(&self) -> &[i32] {
        &self.scale_steps
    }

    pub fn size(&self) -> usize {
        self.scale_steps.len()
    }

    //===------------------------------------------------------------===//
    // Hard-coded defaults
    //===------------------------------------------------------------===//

    pub fn triad() -> Self {
        Self::new("Triad", &[0, 2, 4])
    }

    pub fn seventh() -> Self {
        Self::new("Seventh chord", &[0, 2, 4, 6])
    }

    pub fn ninth() -> Self {
        Self::new("Ninth chord", &[0, 2, 4, 6, 8])
    }

    pub fn sus2() -> Self {
        Self::new("Suspended 2nd", &[0, 1, 4])
    }

    pub fn sus4() -> Self {
        Self::new("Suspended 4th", &[0, 3, 4])
    }

    pub fn built_in() -> Vec<Self> {
        vec![
            Self::triad(),
            Self::seventh(),
            Self::ninth(),
            Self::sus2(),
            Self::sus4(),
        ]
    }
}
