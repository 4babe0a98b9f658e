//! End-to-end build + query over a real walked directory tree, covering
//! the fallback enumerator's skip rules: hidden-only files are indexed,
//! the fixed directory skip list is honored, and reparse-analog
//! directories are pruned.

use std::sync::atomic::AtomicBool;

use velterm_search::{query_index, DiskIndex, IndexBuilder, WalkVolumeProvider};

fn no_progress() -> impl FnMut(f32, &str) {
    |_fraction, _status| {}
}

fn build_over(root: std::path::PathBuf, index_path: &std::path::Path) -> DiskIndex {
    let provider = WalkVolumeProvider::single_root(root);
    let cancel = AtomicBool::new(false);
    IndexBuilder::new()
        .build(&provider, index_path, &cancel, &mut no_progress())
        .expect("walk build succeeds");
    DiskIndex::open(index_path).expect("index opens")
}

fn result_names(index: &DiskIndex, query: &str) -> Vec<String> {
    query_index(index, query, &mut || false)
        .unwrap()
        .into_iter()
        .map(|r| r.display_name)
        .collect()
}

#[test]
fn walked_tree_round_trips_with_skip_rules() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("tree");
    let sub = root.join("sub");
    let skipped = root.join("node_modules");
    std::fs::create_dir_all(&sub).unwrap();
    std::fs::create_dir_all(&skipped).unwrap();
    std::fs::write(root.join("alpha.txt"), b"a").unwrap();
    std::fs::write(sub.join("beta.rs"), b"b").unwrap();
    std::fs::write(root.join(".dotfile.cfg"), b"c").unwrap();
    std::fs::write(skipped.join("skipme.js"), b"d").unwrap();

    let index_path = tmp.path().join("search.idx");
    let index = build_over(root, &index_path);

    let alpha = query_index(&index, "alpha", &mut || false).unwrap();
    assert_eq!(alpha.len(), 1);
    assert_eq!(alpha[0].full_path, "C:\\alpha.txt");

    let beta = query_index(&index, "beta", &mut || false).unwrap();
    assert_eq!(beta.len(), 1);
    assert_eq!(beta[0].full_path, "C:\\sub\\beta.rs");

    // Hidden-only (dotfile) entries are indexed; only hidden+system hosts
    // exclude them.
    assert_eq!(result_names(&index, "dotfile"), vec![".dotfile.cfg"]);

    // The fixed skip list prunes the directory and its contents.
    assert!(result_names(&index, "skipme").is_empty());
    assert!(result_names(&index, "node_modules").is_empty());
}

#[cfg(unix)]
#[test]
fn symlinked_directories_do_not_reach_the_index() {
    let tmp = tempfile::tempdir().unwrap();
    let root = tmp.path().join("tree");
    let real = root.join("real");
    std::fs::create_dir_all(&real).unwrap();
    std::fs::write(real.join("inner.txt"), b"x").unwrap();
    std::os::unix::fs::symlink(&real, root.join("linkdir")).unwrap();

    let index_path = tmp.path().join("search.idx");
    let index = build_over(root, &index_path);

    assert!(result_names(&index, "linkdir").is_empty());
    let inner = query_index(&index, "inner", &mut || false).unwrap();
    assert_eq!(inner.len(), 1);
    assert_eq!(inner[0].full_path, "C:\\real\\inner.txt");
}
