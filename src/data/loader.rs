// ============================================================
// Layer 4 — Speech Corpus Loader
// ============================================================
// Reads the speeches dataset directory:
//
//   speechesdataset/
//     train_CLS.tsv          label<TAB>text, one speech per line
//     test_CLS.tsv
//     train_LM.txt           running text for language modeling
//     test_LM_hbush.txt      held-out text per speaker
//     test_LM_obama.txt
//     test_LM_wbush.txt
//
// Tokenizer vocabularies are built from every file whose name
// does not contain "test", so held-out text never leaks into
// the vocabulary.

use anyhow::{bail, Context, Result};
use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::domain::speech::{LabeledSpeech, Speaker};

/// Held-out language-modeling corpora, in reporting order.
pub const HELD_OUT_CORPORA: [&str; 3] = ["hbush", "obama", "wbush"];

/// Paths of the well-known files inside a dataset directory.
#[derive(Debug, Clone)]
pub struct SpeechCorpus {
    root: PathBuf,
}

impl SpeechCorpus {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn train_classification(&self) -> PathBuf {
        self.root.join("train_CLS.tsv")
    }

    pub fn test_classification(&self) -> PathBuf {
        self.root.join("test_CLS.tsv")
    }

    pub fn train_language_model(&self) -> PathBuf {
        self.root.join("train_LM.txt")
    }

    /// Held-out language-modeling corpora as (name, path), in reporting order.
    pub fn test_language_model(&self) -> Vec<(&'static str, PathBuf)> {
        HELD_OUT_CORPORA
            .into_iter()
            .map(|name| (name, self.root.join(format!("test_LM_{name}.txt"))))
            .collect()
    }

    /// Texts used to build the tokenizer vocabulary.
    pub fn vocabulary_texts(&self) -> Result<Vec<String>> {
        load_texts(&self.root)
    }
}

/// Read every regular file in `dir` whose name does not contain "test",
/// in file-name order.
pub fn load_texts(dir: impl AsRef<Path>) -> Result<Vec<String>> {
    let dir = dir.as_ref();
    let mut paths: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Cannot read directory '{}'", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map_or(false, |name| !name.contains("test"))
        })
        .collect();
    paths.sort();

    let mut texts = Vec::with_capacity(paths.len());
    for path in paths {
        let text = load_text(&path)?;
        tracing::debug!("Loaded: {} ({} chars)", path.display(), text.len());
        texts.push(text);
    }

    if texts.is_empty() {
        tracing::warn!("No vocabulary texts found in '{}'", dir.display());
    }
    Ok(texts)
}

pub fn load_text(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    fs::read_to_string(path).with_context(|| format!("Cannot read '{}'", path.display()))
}

/// Parse a `label<TAB>text` file into labelled speeches.
/// Blank lines are skipped; anything else malformed is an error.
pub fn load_labeled_speeches(path: impl AsRef<Path>) -> Result<Vec<LabeledSpeech>> {
    let path = path.as_ref();
    let content = load_text(path)?;
    let speeches = parse_labeled_speeches(&content)
        .with_context(|| format!("Malformed classification file '{}'", path.display()))?;
    tracing::info!("Loaded {} labelled speeches from '{}'", speeches.len(), path.display());
    Ok(speeches)
}

fn parse_labeled_speeches(content: &str) -> Result<Vec<LabeledSpeech>> {
    let mut speeches = Vec::new();
    for (idx, line) in content.lines().enumerate() {
        let line_no = idx + 1;
        if line.trim().is_empty() {
            continue;
        }
        let Some((label, text)) = line.split_once('\t') else {
            bail!("line {line_no}: expected 'label<TAB>text'");
        };
        let label: usize = label
            .trim()
            .parse()
            .with_context(|| format!("line {line_no}: label '{label}' is not a number"))?;
        let Some(speaker) = Speaker::from_label(label) else {
            bail!("line {line_no}: label {label} is not one of 0, 1, 2");
        };
        speeches.push(LabeledSpeech::new(speaker, text.trim()));
    }
    Ok(speeches)
}
