//! Main test module for dirmerkle
//!
//! This module includes all test suites:
//! - Integration tests for end-to-end scenarios
//! - Chaos tests for corrupted input and failing filesystems
//! - Property-based tests for invariants

pub mod chaos;
pub mod property;

#[cfg(test)]
mod edge_cases {
    use ::dirmerkle::*;
    use std::fs;
    use tempfile::TempDir;

    fn relative(root: &std::path::Path) -> Tree {
        TreeBuilder::new(root)
            .with_path_style(PathStyle::Relative)
            .build()
            .unwrap()
            .tree
    }

    #[test]
    fn test_empty_directory() {
        let temp_dir = TempDir::new().unwrap();
        let tree = relative(temp_dir.path());

        assert_eq!(tree.file_count(), 0);
        assert_eq!(tree.folder_count(), 1);
        let hasher = ContentHasher::new(HashAlgorithm::Sha256);
        assert_eq!(tree.root_hash(), hasher.hash_path("."));
    }

    #[test]
    fn test_empty_files_with_different_paths_differ() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("a"), "").unwrap();
        fs::write(temp_dir.path().join("b"), "").unwrap();

        let tree = relative(temp_dir.path());
        assert_ne!(tree.find("a").unwrap().hash(), tree.find("b").unwrap().hash());
    }

    #[test]
    fn test_empty_subfolder_is_a_node() {
        let temp_dir = TempDir::new().unwrap();
        let before = relative(temp_dir.path());
        fs::create_dir(temp_dir.path().join("empty")).unwrap();
        let after = relative(temp_dir.path());

        assert!(!before.is_same(&after));
        assert_eq!(
            diff::diff_trees(&before, &after).unwrap(),
            vec![Change::AddedFolder("empty".to_string())]
        );
    }

    #[test]
    fn test_unicode_and_special_names() {
        let temp_dir = TempDir::new().unwrap();
        let names = ["héllo wörld.txt", "日本語.md", "with space", "-dash", ".hidden"];
        for name in names {
            fs::write(temp_dir.path().join(name), name).unwrap();
        }

        let tree = relative(temp_dir.path());
        assert_eq!(tree.file_count(), names.len());

        // Children follow byte-wise name order
        let paths: Vec<&str> = tree.root().children().iter().map(Node::path).collect();
        let mut sorted = paths.clone();
        sorted.sort();
        assert_eq!(paths, sorted);

        let json = snapshot::encode(&tree).unwrap();
        let decoded = snapshot::decode(&json, HashAlgorithm::Sha256).unwrap();
        assert!(decoded.is_same(&tree));
        assert!(decoded.find("日本語.md").is_some());
    }

    #[test]
    fn test_large_file_streams() {
        let temp_dir = TempDir::new().unwrap();
        let content = vec![0xA5u8; 3 * 1024 * 1024 + 17];
        fs::write(temp_dir.path().join("big.bin"), &content).unwrap();

        let report = TreeBuilder::new(temp_dir.path())
            .with_path_style(PathStyle::Relative)
            .build()
            .unwrap();
        assert_eq!(report.bytes_hashed, content.len() as u64);

        let hasher = ContentHasher::new(HashAlgorithm::Sha256);
        assert_eq!(
            report.tree.find("big.bin").unwrap().hash(),
            hasher.hash_file("big.bin", &content[..]).unwrap()
        );
    }

    #[test]
    fn test_deep_nesting() {
        let temp_dir = TempDir::new().unwrap();
        let mut dir = temp_dir.path().to_path_buf();
        for i in 0..40 {
            dir = dir.join(format!("level{}", i));
        }
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("leaf.txt"), "leaf").unwrap();

        let before = relative(temp_dir.path());
        assert_eq!(before.folder_count(), 41);

        fs::write(dir.join("leaf.txt"), "leaf!").unwrap();
        let after = relative(temp_dir.path());

        let changes = diff::diff_trees(&before, &after).unwrap();
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind(), ChangeKind::Changed);
        assert!(changes[0].path().ends_with("level39/leaf.txt"));
    }

    #[test]
    fn test_swapping_contents_is_detected() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("x"), "one").unwrap();
        fs::write(temp_dir.path().join("y"), "two").unwrap();
        let before = relative(temp_dir.path());

        fs::write(temp_dir.path().join("x"), "two").unwrap();
        fs::write(temp_dir.path().join("y"), "one").unwrap();
        let after = relative(temp_dir.path());

        // Path is mixed into every file hash, so swapped contents still differ
        assert_eq!(
            diff::diff_trees(&before, &after).unwrap(),
            vec![
                Change::Changed("x".to_string()),
                Change::Changed("y".to_string()),
            ]
        );
    }

    #[test]
    fn test_file_becomes_directory() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("node"), "file").unwrap();
        let before = relative(temp_dir.path());

        fs::remove_file(temp_dir.path().join("node")).unwrap();
        fs::create_dir(temp_dir.path().join("node")).unwrap();
        fs::write(temp_dir.path().join("node/inner"), "file").unwrap();
        let after = relative(temp_dir.path());

        assert_eq!(
            diff::diff_trees(&before, &after).unwrap(),
            vec![
                Change::Removed("node".to_string()),
                Change::AddedFolder("node".to_string()),
            ]
        );
    }
}
