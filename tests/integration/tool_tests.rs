//! The supporting subcommands: condense, index, prune and hashset.

use super::common::{arg, files_below, write, Workspace};
use std::fs;
use tombraider::dedupe::Index;
use tombraider::error::ExitCode;

#[test]
fn test_condense_flattens_in_place() {
    let ws = Workspace::new();
    let root = ws.path("tree");
    write(&root.join("Pictures/2019/summer trip.jpg"), b"jpeg-ish");
    write(&root.join("Pictures/2019/notes.txt"), b"notes");
    write(&root.join("readme.txt"), b"top level");

    let code = ws.run(&["condense", arg(&root)]).unwrap();

    assert_eq!(code, ExitCode::Success);
    assert_eq!(
        files_below(&root),
        vec![
            "Pictures|2019|notes.txt",
            "Pictures|2019|summer_trip.jpg",
            "readme.txt",
        ]
    );
    assert!(!root.join("Pictures").exists());
}

#[test]
fn test_index_leaves_tree_untouched() {
    let ws = Workspace::new();
    let root = ws.path("tree");
    write(&root.join("a.txt"), b"alpha");
    write(&root.join("nested/b.txt"), b"beta");
    write(&root.join("nested/copy.txt"), b"alpha");
    let output = ws.path("tree.index");

    let code = ws
        .run(&["index", arg(&root), "--output", arg(&output)])
        .unwrap();

    assert_eq!(code, ExitCode::Success);
    assert_eq!(files_below(&root).len(), 3);
    let index = Index::read(&output).unwrap();
    assert_eq!(index.len(), 2);
    let root = std::path::absolute(&root).unwrap();
    assert!(index.iter().any(|(_, p)| p == root.join("a.txt")));
    assert!(index.iter().any(|(_, p)| p == root.join("nested/b.txt")));
}

#[test]
fn test_index_then_prune_with_known_set() {
    let ws = Workspace::new();
    let clean = ws.path("clean");
    write(&clean.join("os/driver.sys"), b"vendor driver");
    let known = ws.path("known.txt");
    ws.run(&["hashset", arg(&clean), "--output", arg(&known)])
        .unwrap();

    let root = ws.path("tree");
    write(&root.join("driver.sys"), b"vendor driver");
    write(&root.join("thesis.txt"), b"my own work");
    let index_path = ws.path("tree.index");
    ws.run(&["index", arg(&root), "-o", arg(&index_path)])
        .unwrap();

    let code = ws
        .run(&["prune", arg(&index_path), "--known", arg(&known)])
        .unwrap();

    assert_eq!(code, ExitCode::Success);
    assert_eq!(files_below(&root), vec!["thesis.txt"]);
    let index = Index::read(&index_path).unwrap();
    assert_eq!(index.len(), 1);
}

#[test]
fn test_prune_malformed_index_fails() {
    let ws = Workspace::new();
    let index_path = ws.path("broken.index");
    fs::write(&index_path, "no separator on this line\n").unwrap();

    assert!(ws.run(&["prune", arg(&index_path)]).is_err());
    assert_eq!(
        fs::read_to_string(&index_path).unwrap(),
        "no separator on this line\n"
    );
}

#[test]
fn test_hashset_over_several_roots() {
    let ws = Workspace::new();
    let a = ws.path("a");
    let b = ws.path("b");
    write(&a.join("one"), b"shared");
    write(&b.join("two"), b"shared");
    write(&b.join("three"), b"only in b");
    write(&b.join("empty"), b"");
    let output = ws.path("set.txt");

    let code = ws
        .run(&["hashset", arg(&a), arg(&b), "--output", arg(&output)])
        .unwrap();

    assert_eq!(code, ExitCode::Success);
    let text = fs::read_to_string(&output).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines.iter().all(|l| l.len() == 64));
}

#[test]
fn test_hashset_missing_root_fails() {
    let ws = Workspace::new();
    let result = ws.run(&[
        "hashset",
        arg(&ws.path("missing")),
        "--output",
        arg(&ws.path("set.txt")),
    ]);
    assert!(result.is_err());
    assert!(!ws.path("set.txt").exists());
}

#[test]
fn test_invalid_config_is_fatal() {
    let ws = Workspace::new();
    ws.set_config("chunk_size = 0\n");
    let root = ws.path("tree");
    write(&root.join("a.txt"), b"alpha");

    assert!(ws.run(&["condense", arg(&root)]).is_err());
    assert!(root.join("a.txt").exists());
}

#[test]
fn test_unknown_blacklist_label_is_fatal() {
    let ws = Workspace::new();
    let src = ws.path("src");
    write(&src.join("a.txt"), b"alpha");
    let blacklist = ws.path("bl.txt");
    fs::write(&blacklist, "Documents\nJunk\n").unwrap();

    let result = ws.run(&[
        "process",
        arg(&src),
        "--dest",
        arg(&ws.path("out")),
        "--blacklist",
        arg(&blacklist),
    ]);

    assert!(result.is_err());
    assert!(src.join("a.txt").exists());
}

#[test]
fn test_missing_known_set_is_fatal() {
    let ws = Workspace::new();
    let index_path = ws.path("x.index");
    fs::write(&index_path, "").unwrap();

    let result = ws.run(&["prune", arg(&index_path), "--known", arg(&ws.path("nope.txt"))]);
    assert!(result.is_err());
}

#[test]
fn test_md5_known_set_is_fatal() {
    let ws = Workspace::new();
    let src = ws.path("src");
    write(&src.join("a.txt"), b"alpha\n");
    let known = ws.path("known.md5s");
    fs::write(&known, "9e107d9d372bb6826bd81d3542a419d6\n").unwrap();

    let result = ws.run(&[
        "process",
        arg(&src),
        "--dest",
        arg(&ws.path("out")),
        "--known",
        arg(&known),
    ]);

    let err = result.unwrap_err();
    assert!(format!("{err:#}").contains("64 hex digits"));
    assert!(src.join("a.txt").exists());
}
