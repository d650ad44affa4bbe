//! Property-based testing for dirmerkle
//!
//! Uses proptest to verify tree and diff invariants across randomly
//! generated directory layouts.

use ::dirmerkle::*;
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Folders files may live in; names never collide with file names
const DIRS: &[&str] = &["", "alpha", "alpha/inner", "beta", "gamma/deep/er"];

/// Strategy for a directory layout: relative file path -> content
fn layout_strategy() -> impl Strategy<Value = BTreeMap<String, Vec<u8>>> {
    let path = (prop::sample::select(DIRS), "f[0-9]{1,2}\\.(txt|rs|md)").prop_map(|(dir, name)| {
        if dir.is_empty() {
            name
        } else {
            format!("{}/{}", dir, name)
        }
    });
    prop::collection::btree_map(path, prop::collection::vec(any::<u8>(), 0..256), 1..24)
}

/// Write `layout` below `root`
pub fn materialize(root: &Path, layout: &BTreeMap<String, Vec<u8>>) {
    for (path, content) in layout {
        let full = root.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(full, content).unwrap();
    }
}

fn build(root: &Path, workers: usize) -> Tree {
    TreeBuilder::new(root)
        .with_path_style(PathStyle::Relative)
        .with_parallel_workers(workers)
        .build()
        .unwrap()
        .tree
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_build_is_deterministic(layout in layout_strategy()) {
        let temp_dir = TempDir::new().unwrap();
        materialize(temp_dir.path(), &layout);

        let sequential = build(temp_dir.path(), 1);
        let parallel = build(temp_dir.path(), 4);
        prop_assert_eq!(&sequential, &parallel);
        prop_assert_eq!(sequential.file_count(), layout.len());
        prop_assert!(diff::diff_trees(&sequential, &parallel).unwrap().is_empty());
    }

    #[test]
    fn prop_single_edit_is_the_only_change(
        layout in layout_strategy(),
        pick in any::<prop::sample::Index>(),
    ) {
        let temp_dir = TempDir::new().unwrap();
        materialize(temp_dir.path(), &layout);
        let before = build(temp_dir.path(), 2);

        let target = pick.get(&layout.keys().collect::<Vec<_>>()).to_string();
        let mut edited = layout[&target].clone();
        edited.push(0xFF);
        fs::write(temp_dir.path().join(&target), &edited).unwrap();
        let after = build(temp_dir.path(), 2);

        prop_assert!(!before.is_same(&after));
        let changes = diff::diff_trees(&before, &after).unwrap();
        prop_assert_eq!(changes, vec![Change::Changed(target)]);
    }

    #[test]
    fn prop_removed_file_is_reported(
        layout in layout_strategy(),
        pick in any::<prop::sample::Index>(),
    ) {
        let temp_dir = TempDir::new().unwrap();
        materialize(temp_dir.path(), &layout);
        let before = build(temp_dir.path(), 2);

        let target = pick.get(&layout.keys().collect::<Vec<_>>()).to_string();
        fs::remove_file(temp_dir.path().join(&target)).unwrap();
        let after = build(temp_dir.path(), 2);

        // An emptied folder stays on disk, so the file itself is reported
        let changes = diff::diff_trees(&before, &after).unwrap();
        prop_assert_eq!(changes, vec![Change::Removed(target)]);
    }

    #[test]
    fn prop_snapshot_round_trip_preserves_hashes(layout in layout_strategy()) {
        let temp_dir = TempDir::new().unwrap();
        materialize(temp_dir.path(), &layout);
        let tree = build(temp_dir.path(), 2);

        let decoded = snapshot::decode(&snapshot::encode(&tree).unwrap(), tree.algorithm()).unwrap();
        prop_assert!(decoded.is_same(&tree));
        prop_assert!(TreeVerifier::new(tree.algorithm()).verify_aggregates(&decoded).is_valid());
    }

    #[test]
    fn prop_diff_is_symmetric_in_kind(layout in layout_strategy(), extra in layout_strategy()) {
        let first = TempDir::new().unwrap();
        let second = TempDir::new().unwrap();
        materialize(first.path(), &layout);
        materialize(second.path(), &extra);

        let a = build(first.path(), 2);
        let b = build(second.path(), 2);
        let forward = diff::summarize(&diff::diff_trees(&a, &b).unwrap());
        let backward = diff::summarize(&diff::diff_trees(&b, &a).unwrap());

        prop_assert_eq!(forward.files_added, backward.files_removed);
        prop_assert_eq!(forward.files_removed, backward.files_added);
        prop_assert_eq!(forward.files_changed, backward.files_changed);
        prop_assert_eq!(forward.folders_added, backward.folders_removed);
        prop_assert_eq!(forward.folders_removed, backward.folders_added);
        prop_assert_eq!(a.is_same(&b), forward.is_empty());
    }
}
