//! Duplicate-name and fuzzy-name detection for planned files
//!
//! Existing files under the root whose names end in one of the configured
//! extensions are indexed by file name. Each planned file is then checked
//! for exact name collisions elsewhere in the tree and, when enabled, for
//! names within the similarity threshold using the Ratcliff–Obershelp ratio.

use std::collections::{BTreeMap, VecDeque};
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use crate::core::plan::{Plan, SimilarMatch};
use crate::infra::config::AnalysisConfig;
use crate::infra::paths::normalize_path;
use crate::infra::walk::FileWalker;

/// Lower-case and/or strip everything but ASCII letters and digits.
pub fn normalize_name(name: &str, config: &AnalysisConfig) -> String {
    let lowered;
    let mut n = name;
    if config.normalize_lower {
        lowered = n.to_lowercase();
        n = &lowered;
    }
    if config.normalize_remove_nonalnum {
        n.chars().filter(char::is_ascii_alphanumeric).collect()
    } else {
        n.to_string()
    }
}

/// Does `name` end with one of the configured extensions (case-insensitive)?
pub fn is_interesting(name: &str, config: &AnalysisConfig) -> bool {
    let name = name.to_lowercase();
    config
        .scan_include_extensions
        .iter()
        .any(|ext| name.ends_with(&ext.to_lowercase()))
}

/// Longest common run in `a[alo..ahi]` / `b[blo..bhi]` as `(i, j, len)`.
/// Ties go to the run starting earliest in `a`, then earliest in `b`.
fn longest_match(
    a: &[char],
    b: &[char],
    (alo, ahi): (usize, usize),
    (blo, bhi): (usize, usize),
) -> (usize, usize, usize) {
    let mut best = (alo, blo, 0);
    // run[j - blo + 1] = length of the run ending at a[i-1], b[j]
    let mut prev = vec![0usize; bhi - blo + 1];
    let mut cur = vec![0usize; bhi - blo + 1];

    for i in alo..ahi {
        for j in blo..bhi {
            let slot = j - blo + 1;
            if a[i] == b[j] {
                let k = prev[slot - 1] + 1;
                cur[slot] = k;
                if k > best.2 {
                    best = (i + 1 - k, j + 1 - k, k);
                }
            } else {
                cur[slot] = 0;
            }
        }
        std::mem::swap(&mut prev, &mut cur);
    }

    best
}

/// Total length of all matching blocks between `a` and `b`.
fn matched_len(a: &[char], b: &[char]) -> usize {
    let mut total = 0;
    let mut queue = VecDeque::from([((0, a.len()), (0, b.len()))]);

    while let Some(((alo, ahi), (blo, bhi))) = queue.pop_front() {
        let (i, j, k) = longest_match(a, b, (alo, ahi), (blo, bhi));
        if k == 0 {
            continue;
        }
        total += k;
        if alo < i && blo < j {
            queue.push_back(((alo, i), (blo, j)));
        }
        if i + k < ahi && j + k < bhi {
            queue.push_back(((i + k, ahi), (j + k, bhi)));
        }
    }

    total
}

fn ratio_of(matches: usize, len: usize) -> f64 {
    if len == 0 {
        1.0
    } else {
        2.0 * matches as f64 / len as f64
    }
}

/// Upper bound from lengths alone.
pub fn real_quick_ratio(a: &str, b: &str) -> f64 {
    let (la, lb) = (a.chars().count(), b.chars().count());
    ratio_of(la.min(lb), la + lb)
}

/// Upper bound from the shared character multiset.
pub fn quick_ratio(a: &str, b: &str) -> f64 {
    let mut avail: BTreeMap<char, isize> = BTreeMap::new();
    for c in b.chars() {
        *avail.entry(c).or_default() += 1;
    }
    let mut matches = 0;
    for c in a.chars() {
        let n = avail.entry(c).or_default();
        if *n > 0 {
            matches += 1;
        }
        *n -= 1;
    }
    ratio_of(matches, a.chars().count() + b.chars().count())
}

/// Ratcliff–Obershelp similarity `2*M / (len(a) + len(b))`.
///
/// The block search is order-sensitive on ties, so the pair is put in a
/// fixed order first; the result is symmetric in its arguments.
pub fn ratio(a: &str, b: &str) -> f64 {
    let (a, b) = if a <= b { (a, b) } else { (b, a) };
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    ratio_of(matched_len(&a, &b), a.len() + b.len())
}

/// Existing files of interest under a root, keyed by file name.
#[derive(Debug, Clone, Default)]
pub struct ExistingIndex {
    /// name -> (normalized name, paths)
    entries: BTreeMap<String, (String, Vec<PathBuf>)>,
}

impl ExistingIndex {
    /// Walk `root` and index every interesting file.
    #[instrument(skip_all, fields(root = %root.display()))]
    pub fn scan(root: &Path, config: &AnalysisConfig) -> Result<Self, globset::Error> {
        let walker =
            FileWalker::new(&config.scan_ignore_patterns)?.with_gitignore(config.scan_respect_gitignore);
        let files = walker.walk_with_filter(root, |p| {
            p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| is_interesting(n, config))
        });
        debug!(files = files.len(), "indexed existing files");
        Ok(Self::from_paths(files, config))
    }

    /// Index an explicit list of paths.
    pub fn from_paths<I>(paths: I, config: &AnalysisConfig) -> Self
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut entries: BTreeMap<String, (String, Vec<PathBuf>)> = BTreeMap::new();
        for path in paths {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            entries
                .entry(name.to_string())
                .or_insert_with(|| (normalize_name(name, config), Vec::new()))
                .1
                .push(path);
        }
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Existing paths with exactly this file name.
    pub fn paths_named(&self, name: &str) -> &[PathBuf] {
        self.entries
            .get(name)
            .map(|(_, paths)| paths.as_slice())
            .unwrap_or(&[])
    }

    /// Names scoring at or above the threshold, best first.
    pub fn find_similar(&self, target_name: &str, config: &AnalysisConfig) -> Vec<SimilarMatch> {
        if !config.enable_similarity_scan {
            return Vec::new();
        }
        let target = normalize_name(target_name, config);
        if target.is_empty() {
            return Vec::new();
        }

        let threshold = config.similarity_ratio_threshold;
        let mut out: Vec<SimilarMatch> = self
            .entries
            .iter()
            .filter(|(_, (norm, _))| !norm.is_empty())
            .filter(|(_, (norm, _))| real_quick_ratio(&target, norm) >= threshold)
            .filter(|(_, (norm, _))| quick_ratio(&target, norm) >= threshold)
            .filter_map(|(name, (norm, paths))| {
                let r = ratio(&target, norm);
                (r >= threshold).then(|| SimilarMatch {
                    existing_name: name.clone(),
                    ratio: r,
                    paths: paths.clone(),
                })
            })
            .collect();

        out.sort_by(|x, y| y.ratio.total_cmp(&x.ratio));
        out
    }
}

fn other_locations(paths: &[PathBuf], target: &Path) -> Vec<PathBuf> {
    let target = normalize_path(target);
    paths
        .iter()
        .filter(|p| normalize_path(p) != target)
        .cloned()
        .collect()
}

/// Fill `plan.duplicate_warnings` and `plan.similarity_warnings`.
#[instrument(skip_all, fields(root = %plan.root_path.display()))]
pub fn analyze_similarity(plan: &mut Plan, config: &AnalysisConfig) -> Result<(), globset::Error> {
    if plan.planned_files.is_empty() {
        return Ok(());
    }
    let index = ExistingIndex::scan(&plan.root_path, config)?;
    apply_index(plan, &index, config);
    Ok(())
}

/// Check every planned file against a prepared index.
pub fn apply_index(plan: &mut Plan, index: &ExistingIndex, config: &AnalysisConfig) {
    for target in &plan.planned_files {
        let Some(name) = target.file_name().and_then(|n| n.to_str()) else {
            continue;
        };

        let dups = other_locations(index.paths_named(name), target);
        if !dups.is_empty() {
            plan.duplicate_warnings.insert(target.clone(), dups);
        }

        let similar: Vec<SimilarMatch> = index
            .find_similar(name, config)
            .into_iter()
            .filter_map(|mut m| {
                if m.existing_name == name {
                    m.paths = other_locations(&m.paths, target);
                    if m.paths.is_empty() {
                        return None;
                    }
                }
                Some(m)
            })
            .collect();
        if !similar.is_empty() {
            plan.similarity_warnings.insert(target.clone(), similar);
        }
    }

    debug!(
        duplicates = plan.duplicate_warnings.len(),
        similar = plan.similarity_warnings.len(),
        "similarity analysis done"
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::fs;
    use tempfile::TempDir;

    fn cfg() -> AnalysisConfig {
        AnalysisConfig::default()
    }

    #[test]
    fn test_ratio_known_values() {
        // difflib: SequenceMatcher(None, "abcd", "bcde").ratio() == 0.75
        assert_eq!(ratio("abcd", "bcde"), 0.75);
        assert_eq!(ratio("", ""), 1.0);
        assert_eq!(ratio("abc", ""), 0.0);
        assert_eq!(ratio("same", "same"), 1.0);
    }

    #[test]
    fn test_ratio_symmetric_on_tie_breaks() {
        let pairs = [("tide", "diet"), ("abxcd", "abcd"), ("qabxcd", "abycdf")];
        for (a, b) in pairs {
            assert_eq!(ratio(a, b), ratio(b, a), "{a} vs {b}");
        }
    }

    #[test]
    fn test_quick_bounds_dominate_ratio() {
        let pairs = [("playercontroller", "playercontrolercpp"), ("ab", "ba"), ("x", "yyy")];
        for (a, b) in pairs {
            let r = ratio(a, b);
            assert!(quick_ratio(a, b) >= r);
            assert!(real_quick_ratio(a, b) >= quick_ratio(a, b));
        }
    }

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("My_Actor.Build.cs", &cfg()), "myactorbuildcs");
        let keep_case = cfg().with_normalization(false, false);
        assert_eq!(normalize_name("My_Actor.h", &keep_case), "My_Actor.h");
        let lower_only = cfg().with_normalization(true, false);
        assert_eq!(normalize_name("My_Actor.h", &lower_only), "my_actor.h");
    }

    #[test]
    fn test_interesting_extensions() {
        assert!(is_interesting("Game.Build.cs", &cfg()));
        assert!(is_interesting("GAME.CPP", &cfg()));
        assert!(is_interesting("a.uplugin", &cfg()));
        assert!(!is_interesting("notes.txt", &cfg()));
        assert!(!is_interesting("cpp", &cfg()));
    }

    #[test]
    fn test_player_controller_typo_is_flagged() {
        let index = ExistingIndex::from_paths(
            [PathBuf::from("/r/Source/PlayerController.cpp")],
            &cfg(),
        );
        let hits = index.find_similar("PlayerControler.cpp", &cfg());
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].existing_name, "PlayerController.cpp");
        assert!(hits[0].ratio >= 0.86);
    }

    #[test]
    fn test_disabled_scan_finds_nothing() {
        let index = ExistingIndex::from_paths([PathBuf::from("/r/A.h")], &cfg());
        assert!(
            index
                .find_similar("A.h", &cfg().with_similarity_scan(false))
                .is_empty()
        );
    }

    #[test]
    fn test_results_sorted_best_first() {
        let index = ExistingIndex::from_paths(
            [
                PathBuf::from("/r/Characterx.h"),
                PathBuf::from("/r/Character.h"),
            ],
            &cfg().with_threshold(0.5),
        );
        let hits = index.find_similar("Character.h", &cfg().with_threshold(0.5));
        assert_eq!(hits[0].existing_name, "Character.h");
        assert!(hits[0].ratio > hits[1].ratio);
    }

    #[test]
    fn test_self_match_is_not_a_duplicate() {
        let tmp = TempDir::new().unwrap();
        let root = dunce::canonicalize(tmp.path()).unwrap();
        fs::create_dir_all(root.join("A")).unwrap();
        fs::create_dir_all(root.join("B")).unwrap();
        fs::write(root.join("A/Thing.h"), "").unwrap();

        let mut plan = Plan::new(root.clone());
        plan.planned_files = BTreeSet::from([root.join("A/Thing.h"), root.join("B/Thing.h")]);
        analyze_similarity(&mut plan, &cfg()).unwrap();

        assert!(!plan.duplicate_warnings.contains_key(&root.join("A/Thing.h")));
        assert!(!plan.similarity_warnings.contains_key(&root.join("A/Thing.h")));
        assert_eq!(
            plan.duplicate_warnings.get(&root.join("B/Thing.h")),
            Some(&vec![root.join("A/Thing.h")])
        );
        let sim = &plan.similarity_warnings[&root.join("B/Thing.h")];
        assert_eq!(sim[0].paths, vec![root.join("A/Thing.h")]);
    }

    #[test]
    fn test_scan_respects_ignore_patterns() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join(".git")).unwrap();
        fs::create_dir_all(root.join("Source")).unwrap();
        fs::write(root.join(".git/x.h"), "").unwrap();
        fs::write(root.join("Source/x.h"), "").unwrap();
        fs::write(root.join("Source/readme.md"), "").unwrap();

        let index = ExistingIndex::scan(root, &cfg()).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.paths_named("x.h"), &[root.join("Source/x.h")]);
    }

    #[test]
    fn test_scan_honors_configured_ignores() {
        let tmp = TempDir::new().unwrap();
        let root = dunce::canonicalize(tmp.path()).unwrap();
        fs::create_dir_all(root.join("ThirdParty")).unwrap();
        fs::create_dir_all(root.join("Source")).unwrap();
        fs::write(root.join("ThirdParty/lib.h"), "").unwrap();
        fs::write(root.join("Source/game.h"), "").unwrap();

        let config = cfg().with_ignore_patterns(vec!["ThirdParty/**".to_string()]);
        let index = ExistingIndex::scan(&root, &config).unwrap();
        assert!(index.paths_named("lib.h").is_empty());
        assert_eq!(index.paths_named("game.h"), &[root.join("Source/game.h")]);
    }
}
