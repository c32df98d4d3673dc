use std::collections::VecDeque;

use crate::dice::DieRoller;

/// A die roller that replays a scripted sequence of faces. Panics when the
/// script runs dry, so a test that rolls more dice than it scripted fails
/// loudly instead of silently.
pub struct FixedRoller {
    faces: VecDeque<u32>,
}

impl FixedRoller {
    pub fn new(faces: impl IntoIterator<Item = u32>) -> Self {
        Self {
            faces: faces.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.faces.len()
    }
}

impl DieRoller for FixedRoller {
    fn roll_die(&mut self, size: u32) -> u32 {
        let face = self
            .faces
            .pop_front()
            .expect("FixedRoller ran out of scripted faces");
        assert!(
            face >= 1 && face <= size,
            "scripted face {} does not fit a d{}",
            face,
            size
        );
        face
    }
}

/// A roller that always lands the same face, for tests that do not care
/// about individual dice.
pub struct ConstantRoller(pub u32);

impl DieRoller for ConstantRoller {
    fn roll_die(&mut self, size: u32) -> u32 {
        self.0.min(size)
    }
}
