use porosim::workspace::WorkspaceManager;
use std::path::PathBuf;

fn temp_root(tag: &str) -> PathBuf {
    let root = std::env::temp_dir().join(format!("porosim-ws-{tag}-{}", uuid::Uuid::new_v4()));
    std::fs::create_dir_all(&root).unwrap();
    root
}

#[test]
fn acquire_creates_unique_directories() {
    let root = temp_root("unique");
    let mgr = WorkspaceManager::new(root.to_str().unwrap());

    let a = mgr.acquire("job").unwrap();
    let b = mgr.acquire("job").unwrap();
    assert_ne!(a.path(), b.path());
    assert!(a.path().is_dir());
    assert!(b.path().is_dir());

    mgr.release(a);
    mgr.release(b);
    assert_eq!(std::fs::read_dir(&root).unwrap().count(), 0);
    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn concurrent_workspaces_do_not_observe_each_other() {
    let root = temp_root("isolated");
    let mgr = WorkspaceManager::new(root.to_str().unwrap());

    let a = mgr.acquire("fluid-sim").unwrap();
    let b = mgr.acquire("fluid-sim").unwrap();
    std::fs::write(a.join("input_image.png"), b"aaaa").unwrap();
    std::fs::write(b.join("input_image.png"), b"bb").unwrap();

    assert_eq!(std::fs::read(a.join("input_image.png")).unwrap(), b"aaaa");
    assert_eq!(std::fs::read(b.join("input_image.png")).unwrap(), b"bb");

    mgr.release(a);
    assert!(b.join("input_image.png").exists());
    mgr.release(b);
    let _ = std::fs::remove_dir_all(root);
}

#[test]
fn release_tolerates_an_already_removed_workspace() {
    let root = temp_root("gone");
    let mgr = WorkspaceManager::new(root.to_str().unwrap());

    let ws = mgr.acquire("job").unwrap();
    std::fs::remove_dir_all(ws.path()).unwrap();
    // Must not panic or error: the job outcome is already decided.
    mgr.release(ws);
    let _ = std::fs::remove_dir_all(root);
}
