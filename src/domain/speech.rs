// ============================================================
// Layer 3 — Speech Domain Types
// ============================================================
// A labelled speech excerpt and the three speaker classes the
// classifier distinguishes. The numeric label is the class index
// used by the cross-entropy loss, so the mapping must stay fixed:
//
//   0 → Barack Obama
//   1 → George W. Bush
//   2 → George H. W. Bush

use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the three speakers in the classification corpus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Speaker {
    Obama,
    WBush,
    HBush,
}

impl Speaker {
    pub const ALL: [Speaker; 3] = [Speaker::Obama, Speaker::WBush, Speaker::HBush];

    /// Class index fed to the loss.
    pub fn label(&self) -> usize {
        match self {
            Speaker::Obama => 0,
            Speaker::WBush => 1,
            Speaker::HBush => 2,
        }
    }

    pub fn from_label(label: usize) -> Option<Self> {
        Self::ALL.get(label).copied()
    }
}

impl fmt::Display for Speaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Speaker::Obama => "Barack Obama",
            Speaker::WBush => "George W. Bush",
            Speaker::HBush => "George H. W. Bush",
        };
        f.write_str(name)
    }
}

/// A speech excerpt with its known speaker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledSpeech {
    pub speaker: Speaker,
    pub text:    String,
}

impl LabeledSpeech {
    pub fn new(speaker: Speaker, text: impl Into<String>) -> Self {
        Self { speaker, text: text.into() }
    }

    pub fn label(&self) -> usize {
        self.speaker.label()
    }
}
