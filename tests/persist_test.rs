use std::fs;

use overlap::persist::AlphaStore;
use overlap::OverlapError;

#[test]
fn test_save_then_load() {
    let dir = tempfile::tempdir().unwrap();
    let store = AlphaStore::new(dir.path().join("refpref.txt"));
    store.save(0.123456789012345).unwrap();
    assert_eq!(store.load(), Some(0.123456789012345));
    assert_eq!(fs::read_to_string(store.path()).unwrap(), "0.123456789012345\n");

    // no temporary file left behind
    let names: Vec<_> = fs::read_dir(dir.path()).unwrap().map(|e| e.unwrap().file_name()).collect();
    assert_eq!(names.len(), 1);
}

#[test]
fn test_missing_file_means_search() {
    let dir = tempfile::tempdir().unwrap();
    let store = AlphaStore::new(dir.path().join("absent.txt"));
    assert_eq!(store.load(), None);
}

#[test]
fn test_unusable_contents_are_ignored() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("refpref.txt");
    let store = AlphaStore::new(&path);
    for content in ["", "abc\n", "-2.5\n", "0\n", "NaN\n", "inf\n"] {
        fs::write(&path, content).unwrap();
        assert_eq!(store.load(), None, "content {content:?}");
    }
    fs::write(&path, "  7.5  \nextra line\n").unwrap();
    assert_eq!(store.load(), Some(7.5));
}

#[test]
fn test_unwritable_location_reports_path() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("missing").join("refpref.txt");
    let err = AlphaStore::new(&path).save(1.0).unwrap_err();
    match &err {
        OverlapError::Persist { path: p, .. } => assert_eq!(p, &path),
        other => panic!("unexpected error {other:?}"),
    }
    assert!(err.to_string().contains("refpref.txt"));
}
