//! Sample pools and decoded buffers, filled by an external loader.
//!
//! The engine only ever asks "is this buffer here yet"; a miss is a silent no-op
//! and the next frame tries again.

use crate::error::ParseError;
use crate::mixer::BusName;
use fnv::{FnvHashMap, FnvHashSet};
use std::str::FromStr;

/// Sample families, each with its own pool and mixer bus.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SampleGroup {
    Kick,
    Snare,
    Hihat,
    Sfx,
}

impl SampleGroup {
    pub const ALL: [SampleGroup; 4] = [
        SampleGroup::Kick,
        SampleGroup::Snare,
        SampleGroup::Hihat,
        SampleGroup::Sfx,
    ];

    pub fn name(self) -> &'static str {
        match self {
            SampleGroup::Kick => "kick",
            SampleGroup::Snare => "snare",
            SampleGroup::Hihat => "hihat",
            SampleGroup::Sfx => "sfx",
        }
    }

    pub fn bus(self) -> BusName {
        match self {
            SampleGroup::Kick => BusName::Kick,
            SampleGroup::Snare => BusName::Snare,
            SampleGroup::Hihat => BusName::Hihat,
            SampleGroup::Sfx => BusName::Sfx,
        }
    }

    pub fn default_dir(self) -> &'static str {
        match self {
            SampleGroup::Kick => "../Kicks",
            SampleGroup::Snare => "../Snares",
            SampleGroup::Hihat => "../Hats",
            SampleGroup::Sfx => "../SFX",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl FromStr for SampleGroup {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SampleGroup::ALL
            .into_iter()
            .find(|g| g.name() == s)
            .ok_or_else(|| ParseError::Group(s.to_string()))
    }
}

/// Resolve a manifest entry against its directory. URLs, rooted paths and
/// explicitly relative paths are taken as-is.
pub fn normalize_sample_path(dir: &str, entry: &str) -> Option<String> {
    let entry = entry.trim();
    if entry.is_empty() {
        return None;
    }
    let lower = entry.to_ascii_lowercase();
    if lower.starts_with("http:")
        || lower.starts_with("https:")
        || entry.starts_with('/')
        || entry.starts_with("./")
        || entry.starts_with("../")
    {
        return Some(entry.to_string());
    }
    Some(format!("{}/{}", dir.trim_end_matches('/'), entry))
}

#[derive(Debug)]
pub struct SampleLibrary<Buf> {
    pools: [Vec<String>; 4],
    buffers: FnvHashMap<String, Buf>,
    failed: FnvHashSet<String>,
}

impl<Buf> Default for SampleLibrary<Buf> {
    fn default() -> Self {
        Self {
            pools: Default::default(),
            buffers: FnvHashMap::default(),
            failed: FnvHashSet::default(),
        }
    }
}

impl<Buf> SampleLibrary<Buf> {
    /// Append paths to a group's pool, skipping ones already present.
    pub fn register_pool<I, S>(&mut self, group: SampleGroup, paths: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let pool = &mut self.pools[group.index()];
        for path in paths {
            let path = path.into();
            if !pool.contains(&path) {
                pool.push(path);
            }
        }
    }

    pub fn pool(&self, group: SampleGroup) -> &[String] {
        &self.pools[group.index()]
    }

    /// Every distinct path across all pools, in first-seen order.
    pub fn unique_paths(&self) -> Vec<String> {
        let mut seen = FnvHashSet::default();
        self.pools
            .iter()
            .flatten()
            .filter(|p| seen.insert(p.as_str()))
            .cloned()
            .collect()
    }

    pub fn get_buffer(&self, path: &str) -> Option<&Buf> {
        self.buffers.get(path)
    }

    pub fn has_buffer(&self, path: &str) -> bool {
        self.buffers.contains_key(path)
    }

    pub fn insert_buffer(&mut self, path: impl Into<String>, buffer: Buf) {
        let path = path.into();
        self.failed.remove(&path);
        self.buffers.insert(path, buffer);
    }

    pub fn mark_failed(&mut self, path: impl Into<String>, reason: &str) {
        let path = path.into();
        log::error!("[audio] failed to load audio file {}: {}", path, reason);
        self.failed.insert(path);
    }

    pub fn is_failed(&self, path: &str) -> bool {
        self.failed.contains(path)
    }

    pub fn loaded_count(&self) -> usize {
        self.buffers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_relative_entries_only() {
        assert_eq!(
            normalize_sample_path("../Kicks/", "808.wav").as_deref(),
            Some("../Kicks/808.wav")
        );
        assert_eq!(
            normalize_sample_path("../Kicks", "https://cdn/x.wav").as_deref(),
            Some("https://cdn/x.wav")
        );
        assert_eq!(
            normalize_sample_path("../Kicks", "./local.mp3").as_deref(),
            Some("./local.mp3")
        );
        assert_eq!(normalize_sample_path("../Kicks", "  "), None);
    }

    #[test]
    fn pools_deduplicate_and_unique_paths_span_groups() {
        let mut lib = SampleLibrary::<()>::default();
        lib.register_pool(SampleGroup::Kick, ["a.wav", "b.wav", "a.wav"]);
        lib.register_pool(SampleGroup::Sfx, ["b.wav", "c.wav"]);
        assert_eq!(lib.pool(SampleGroup::Kick).len(), 2);
        assert_eq!(lib.unique_paths(), vec!["a.wav", "b.wav", "c.wav"]);
    }

    #[test]
    fn late_success_clears_failure() {
        let mut lib = SampleLibrary::<u8>::default();
        lib.mark_failed("x.wav", "404");
        assert!(lib.is_failed("x.wav"));
        lib.insert_buffer("x.wav", 1);
        assert!(!lib.is_failed("x.wav"));
        assert_eq!(lib.get_buffer("x.wav"), Some(&1));
    }

    #[test]
    fn group_names_parse() {
        assert_eq!("hihat".parse::<SampleGroup>(), Ok(SampleGroup::Hihat));
        assert!("tom".parse::<SampleGroup>().is_err());
    }
}
