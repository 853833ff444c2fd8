//! Disk cache for coarsened grammars, keyed by a digest of the source grammar's path and level.
//!
//! A missing cache entry and a malformed one are treated identically: both simply mean "nothing
//! usable here, recompute." Writes go to a sibling `.tmp` path and are renamed into place so a
//! crash mid-write never leaves a half-written file where the reader expects a whole one.

use std::path::{Path, PathBuf};

use log::warn;
use sha2::{Digest, Sha256};

use crate::error::{ParseError, Result};
use crate::grammar::GrammarRecord;

pub struct GrammarCache {
    dir: PathBuf,
    digest: String,
}

impl GrammarCache {
    pub fn new(dir: PathBuf, grammar_path: &Path) -> GrammarCache {
        GrammarCache {
            dir,
            digest: digest_of_path(grammar_path),
        }
    }

    fn path_for(&self, level: usize) -> PathBuf {
        self.dir.join(format!("{}_{}.pcfg", self.digest, level))
    }

    /// Returns `None` if the entry is missing or unreadable; callers should recompute in that
    /// case rather than treat it as fatal.
    pub fn load(&self, level: usize) -> Option<Vec<GrammarRecord>> {
        let path = self.path_for(level);
        let text = std::fs::read_to_string(&path).ok()?;
        let mut records = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match GrammarRecord::parse(line, idx + 1) {
                Ok(record) => records.push(record),
                Err(err) => {
                    let unusable = ParseError::CacheUnusable {
                        path: path.to_string_lossy().into_owned(),
                        reason: err.to_string(),
                    };
                    warn!("{unusable}, recomputing");
                    return None;
                }
            }
        }
        Some(records)
    }

    pub fn store(&self, level: usize, records: &[GrammarRecord]) -> Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let final_path = self.path_for(level);
        let tmp_path = self.dir.join(format!("{}_{}.pcfg.tmp", self.digest, level));
        let mut contents = String::new();
        for record in records {
            contents.push_str(&record.to_json_line());
            contents.push('\n');
        }
        std::fs::write(&tmp_path, contents)?;
        std::fs::rename(&tmp_path, &final_path)?;
        Ok(())
    }
}

fn digest_of_path(path: &Path) -> String {
    let mut hasher = Sha256::new();
    hasher.update(path.to_string_lossy().as_bytes());
    let result = hasher.finalize();
    result.iter().take(8).map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::GrammarRecord;

    #[test]
    fn store_then_load_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let cache = GrammarCache::new(dir.path().to_owned(), Path::new("/grammars/toy.pcfg"));
        let records = vec![
            GrammarRecord::Terminal { lhs: "N".into(), terminal: "squirrel".into(), prob: 1.0 },
            GrammarRecord::Words(vec!["squirrel".into()]),
        ];
        cache.store(2, &records).unwrap();
        let loaded = cache.load(2).unwrap();
        assert_eq!(loaded, records);
    }

    #[test]
    fn missing_entry_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        let cache = GrammarCache::new(dir.path().to_owned(), Path::new("/grammars/toy.pcfg"));
        assert!(cache.load(0).is_none());
    }

    #[test]
    fn malformed_entry_is_treated_as_missing() {
        let dir = tempfile::tempdir().unwrap();
        let cache = GrammarCache::new(dir.path().to_owned(), Path::new("/grammars/toy.pcfg"));
        let path = dir.path().join(format!("{}_0.pcfg", digest_of_path(Path::new("/grammars/toy.pcfg"))));
        std::fs::write(&path, "not json\n").unwrap();
        assert!(cache.load(0).is_none());
    }
}
