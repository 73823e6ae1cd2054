//! Merging two consolidated trees.

use super::common::{arg, files_below, write, Workspace};
use std::fs;
use tombraider::dedupe::Index;
use tombraider::error::ExitCode;

/// Process `files` into a fresh destination and return its path.
fn consolidated(ws: &Workspace, name: &str, files: &[(&str, &[u8])]) -> std::path::PathBuf {
    let src = ws.path(&format!("{name}_src"));
    for (path, content) in files {
        write(&src.join(path), content);
    }
    let out = ws.path(name);
    let code = ws
        .run(&["process", arg(&src), "--dest", arg(&out)])
        .unwrap();
    assert_eq!(code, ExitCode::Success);
    out
}

#[test]
fn test_merge_drops_secondary_duplicates_and_keeps_collisions() {
    let ws = Workspace::new();
    let primary = consolidated(
        &ws,
        "primary",
        &[("a.txt", b"alpha\n"), ("shared.txt", b"shared\n")],
    );
    let secondary = consolidated(
        &ws,
        "secondary",
        &[
            ("a.txt", b"another alpha\n"),
            ("b.txt", b"beta\n"),
            ("same.txt", b"shared\n"),
        ],
    );
    let merged = ws.path("merged");

    let code = ws
        .run(&[
            "merge",
            arg(&primary),
            arg(&primary.join("filesystem.index")),
            arg(&secondary),
            arg(&secondary.join("filesystem.index")),
            "--dest",
            arg(&merged),
        ])
        .unwrap();

    assert_eq!(code, ExitCode::Success);
    assert_eq!(
        files_below(&merged),
        vec![
            "Documents/a.txt",
            "Documents/a.txt.1",
            "Documents/b.txt",
            "Documents/shared.txt",
            "filesystem.index",
        ]
    );
    assert_eq!(
        fs::read_to_string(merged.join("Documents/a.txt")).unwrap(),
        "alpha\n"
    );
    assert_eq!(Index::read(&merged.join("filesystem.index")).unwrap().len(), 4);

    // The old indexes stay; everything else has moved or been removed.
    assert_eq!(files_below(&primary), vec!["filesystem.index"]);
    assert_eq!(files_below(&secondary), vec!["filesystem.index"]);
}

#[test]
fn test_merge_tolerates_vanished_files() {
    let ws = Workspace::new();
    let primary = consolidated(&ws, "primary", &[("a.txt", b"alpha\n")]);
    let secondary = consolidated(&ws, "secondary", &[("b.txt", b"beta\n")]);
    fs::remove_file(secondary.join("Documents/b.txt")).unwrap();
    let merged = ws.path("merged");

    let code = ws
        .run(&[
            "merge",
            arg(&primary),
            arg(&primary.join("filesystem.index")),
            arg(&secondary),
            arg(&secondary.join("filesystem.index")),
            "--dest",
            arg(&merged),
        ])
        .unwrap();

    assert_eq!(code, ExitCode::Success);
    assert_eq!(
        files_below(&merged),
        vec!["Documents/a.txt", "filesystem.index"]
    );
}

#[test]
fn test_merge_into_a_source_is_rejected() {
    let ws = Workspace::new();
    let primary = consolidated(&ws, "primary", &[("a.txt", b"alpha\n")]);
    let secondary = consolidated(&ws, "secondary", &[("b.txt", b"beta\n")]);

    let result = ws.run(&[
        "merge",
        arg(&primary),
        arg(&primary.join("filesystem.index")),
        arg(&secondary),
        arg(&secondary.join("filesystem.index")),
        "--dest",
        arg(&ws.path("")),
    ]);

    assert!(result.is_err());
    assert!(primary.join("Documents/a.txt").exists());
}
