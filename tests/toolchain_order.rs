#![cfg(unix)]

use porosim::outcome::JobError;
use porosim::toolchain::{build_from_source, locate_prebuilt, stage_prebuilt, ToolchainCandidate};
use porosim::workspace::WorkspaceManager;
use std::path::PathBuf;

fn temp_root(tag: &str) -> PathBuf {
    let root = std::env::temp_dir().join(format!("porosim-test-{tag}-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&root).unwrap();
    root
}

fn sh(script: &str) -> ToolchainCandidate {
    ToolchainCandidate {
        program: "sh".to_string(),
        args: vec!["-c".to_string(), script.to_string()],
    }
}

#[test]
fn first_succeeding_candidate_wins_and_later_ones_never_run() {
    let root = temp_root("order");
    let mgr = WorkspaceManager::new(root.to_str().unwrap());
    let ws = mgr.acquire("build").unwrap();

    let candidates = vec![
        sh("exit 1"),
        sh("exit 2"),
        sh("touch built_by_third; exit 0"),
        sh("touch built_by_fourth; exit 0"),
    ];

    let program = build_from_source(&ws, &candidates, "solver").expect("resolution");
    assert_eq!(program.path, ws.join("solver"));
    assert!(ws.join("built_by_third").exists());
    assert!(!ws.join("built_by_fourth").exists());

    mgr.release(ws);
    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn exhausted_candidates_surface_last_stderr() {
    let root = temp_root("exhaust");
    let mgr = WorkspaceManager::new(root.to_str().unwrap());
    let ws = mgr.acquire("build").unwrap();

    let candidates = vec![
        sh("echo first failure >&2; exit 1"),
        sh("echo final failure >&2; exit 1"),
    ];

    let err = build_from_source(&ws, &candidates, "solver").unwrap_err();
    match err {
        JobError::Compilation { stderr } => assert!(stderr.contains("final failure")),
        other => panic!("expected Compilation, got {other:?}"),
    }

    mgr.release(ws);
    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn unlaunchable_candidate_is_skipped() {
    let root = temp_root("launch");
    let mgr = WorkspaceManager::new(root.to_str().unwrap());
    let ws = mgr.acquire("build").unwrap();

    let candidates = vec![
        ToolchainCandidate {
            program: "/nonexistent/compiler".to_string(),
            args: vec![],
        },
        sh("exit 0"),
    ];

    assert!(build_from_source(&ws, &candidates, "solver").is_ok());

    mgr.release(ws);
    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn locate_searches_bin_first() {
    let root = temp_root("locate");
    std::fs::create_dir_all(root.join("bin")).unwrap();
    std::fs::write(root.join("bin/fluid_sim"), b"#!/bin/sh\n").unwrap();
    std::fs::write(root.join("fluid_sim"), b"#!/bin/sh\n").unwrap();

    let found = locate_prebuilt(&root, "fluid_sim").expect("locate");
    assert_eq!(found, root.join("bin/fluid_sim"));

    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn locate_failure_enumerates_every_location() {
    let root = temp_root("missing");
    let err = locate_prebuilt(&root, "fluid_sim").unwrap_err();
    match err {
        JobError::ToolchainUnavailable { searched } => {
            assert_eq!(searched.len(), 4);
            assert!(searched.iter().any(|p| p.contains("bin")));
            assert!(searched.iter().any(|p| p.contains("public")));
        }
        other => panic!("expected ToolchainUnavailable, got {other:?}"),
    }
    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn staged_binary_is_executable() {
    use std::os::unix::fs::PermissionsExt;

    let root = temp_root("stage");
    std::fs::write(root.join("fluid_sim"), b"#!/bin/sh\nexit 0\n").unwrap();

    let mgr = WorkspaceManager::new(root.to_str().unwrap());
    let ws = mgr.acquire("job").unwrap();
    let program = stage_prebuilt(&ws, &root.join("fluid_sim"), "fluid_sim").expect("stage");

    let mode = std::fs::metadata(&program.path).unwrap().permissions().mode();
    assert_ne!(mode & 0o111, 0);

    mgr.release(ws);
    let _ = std::fs::remove_dir_all(root);
}
