use std::path::Path;

use anyhow::{Context, Result};

/// Class-id to description table.
///
/// Loaded from a text file with one label per line. Lines in the ImageNet
/// synset layout (`n01440764 tench, Tinca tinca`) drop the leading synset id.
#[derive(Clone, Debug, Default)]
pub struct Labels {
    entries: Vec<String>,
}

impl Labels {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read labels file {}", path.display()))?;
        Ok(Self::parse(&raw))
    }

    pub fn parse(raw: &str) -> Self {
        let entries = raw
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(strip_synset)
            .map(str::to_string)
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn describe(&self, class_id: i32) -> String {
        usize::try_from(class_id)
            .ok()
            .and_then(|idx| self.entries.get(idx))
            .cloned()
            .unwrap_or_else(|| format!("class #{}", class_id))
    }
}

fn strip_synset(line: &str) -> &str {
    match line.split_once(' ') {
        Some((head, rest))
            if head.len() == 9
                && head.starts_with('n')
                && head[1..].chars().all(|c| c.is_ascii_digit()) =>
        {
            rest.trim()
        }
        _ => line,
    }
}
