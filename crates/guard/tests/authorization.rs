use clawhands_guard::{
    resolve_path, AuthorizationDecision, AuthorizationGuard, AuthorizationRequest, GrantStore,
};
use proptest::prelude::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

fn setup_sandbox() -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let root = dir.path().canonicalize().unwrap();
    std::fs::create_dir_all(root.join("project/src")).unwrap();
    std::fs::write(root.join("project/src/file.swift"), "let x = 1").unwrap();
    (dir, root.join("project"))
}

fn guard() -> AuthorizationGuard {
    AuthorizationGuard::new(Arc::new(GrantStore::new()))
}

#[test]
fn test_relative_path_inside_sandbox_is_allowed() {
    let (_dir, project) = setup_sandbox();
    let guard = guard();
    let request = AuthorizationRequest::new("file_operations.read_file")
        .session("s1")
        .working_directory(&project);

    let resolved = resolve_path("./src/file.swift", project.to_str());
    assert_eq!(resolved, project.join("src/file.swift"));
    assert!(guard.check_path("./src/file.swift", &request).is_allowed());
}

#[test]
fn test_scenario_project_path_resolution() {
    let resolved = resolve_path("./src/file.swift", Some("/nonexistent-root/Users/t/project"));
    assert_eq!(
        resolved,
        PathBuf::from("/nonexistent-root/Users/t/project/src/file.swift")
    );

    let guard = guard();
    let wd = Path::new("/nonexistent-root/Users/t/project");
    let request = AuthorizationRequest::new("file_operations.read_file")
        .session("s1")
        .working_directory(wd);
    assert!(guard.check_path("./src/file.swift", &request).is_allowed());
}

#[test]
fn test_tilde_working_directory_is_expanded() {
    let guard = guard();
    let wd = Path::new("~/clawhands-tilde-project");
    let request = AuthorizationRequest::new("file_operations.read_file")
        .session("s1")
        .working_directory(wd);

    assert!(guard.check_path("src/a.rs", &request).is_allowed());
    assert!(guard
        .check_path("~/clawhands-tilde-project/src/a.rs", &request)
        .is_allowed());
    assert!(!guard.check_path("../elsewhere/a.rs", &request).is_allowed());
}

#[test]
fn test_working_directory_itself_and_new_subdirs_are_allowed() {
    let (_dir, project) = setup_sandbox();
    let guard = guard();
    let request = AuthorizationRequest::new("file_operations.create_directory")
        .session("s1")
        .working_directory(&project);

    assert!(guard.check_path(".", &request).is_allowed());
    assert!(guard.check_path("not/yet/created", &request).is_allowed());
    assert!(guard
        .check_path(project.to_str().unwrap(), &request)
        .is_allowed());
}

#[test]
fn test_sibling_with_shared_prefix_escalates() {
    let dir = TempDir::new().unwrap();
    let root = dir.path().canonicalize().unwrap();
    std::fs::create_dir_all(root.join("conv-1")).unwrap();
    std::fs::create_dir_all(root.join("conv-12")).unwrap();

    let guard = guard();
    let wd = root.join("conv-1");
    let request = AuthorizationRequest::new("file_operations.read_file")
        .session("s1")
        .working_directory(&wd);

    let target = root.join("conv-12/data.txt");
    assert!(matches!(
        guard.check_path(target.to_str().unwrap(), &request),
        AuthorizationDecision::RequiresEscalation(_)
    ));
}

#[cfg(unix)]
#[test]
fn test_symlink_escape_is_caught() {
    let (dir, project) = setup_sandbox();
    let outside = dir.path().canonicalize().unwrap().join("outside");
    std::fs::create_dir_all(&outside).unwrap();
    std::os::unix::fs::symlink(&outside, project.join("escape")).unwrap();

    let guard = guard();
    let request = AuthorizationRequest::new("file_operations.read_file")
        .session("s1")
        .working_directory(&project);

    assert!(matches!(
        guard.check_path("escape/secret.txt", &request),
        AuthorizationDecision::RequiresEscalation(_)
    ));
}

#[test]
fn test_grant_allows_any_path_for_same_key() {
    let (_dir, project) = setup_sandbox();
    let grants = Arc::new(GrantStore::new());
    let guard = AuthorizationGuard::new(grants.clone());
    let request = AuthorizationRequest::new("file_operations.read_file")
        .session("s1")
        .working_directory(&project);

    assert!(matches!(
        guard.check_path("/nonexistent-root/etc/hosts", &request),
        AuthorizationDecision::RequiresEscalation(_)
    ));

    grants.grant("s1", "file_operations.read_file");
    assert!(guard
        .check_path("/nonexistent-root/etc/hosts", &request)
        .is_allowed());
    assert!(guard
        .check_path("/nonexistent-root/var/other", &request)
        .is_allowed());

    let other_key = AuthorizationRequest::new("file_operations.create_file")
        .session("s1")
        .working_directory(&project);
    assert!(!guard
        .check_path("/nonexistent-root/etc/hosts", &other_key)
        .is_allowed());

    let other_session = AuthorizationRequest::new("file_operations.read_file")
        .session("s2")
        .working_directory(&project);
    assert!(!guard
        .check_path("/nonexistent-root/etc/hosts", &other_session)
        .is_allowed());
}

#[test]
fn test_teardown_revokes_grants() {
    let (_dir, project) = setup_sandbox();
    let grants = Arc::new(GrantStore::new());
    let guard = AuthorizationGuard::new(grants.clone());
    let request = AuthorizationRequest::new("file_operations.read_file")
        .session("s1")
        .working_directory(&project);

    grants.grant("s1", "file_operations.read_file");
    assert!(guard.check_path("/nonexistent-root/x", &request).is_allowed());

    grants.clear_session("s1");
    assert!(!guard.check_path("/nonexistent-root/x", &request).is_allowed());
}

#[test]
fn test_grant_visible_across_threads() {
    let (_dir, project) = setup_sandbox();
    let grants = Arc::new(GrantStore::new());
    let guard = Arc::new(AuthorizationGuard::new(grants.clone()));

    let writer = {
        let grants = grants.clone();
        std::thread::spawn(move || grants.grant("s1", "file_operations.read_file"))
    };
    writer.join().unwrap();

    let reader = {
        let guard = guard.clone();
        let project = project.clone();
        std::thread::spawn(move || {
            let request = AuthorizationRequest::new("file_operations.read_file")
                .session("s1")
                .working_directory(&project);
            guard.check_path("/nonexistent-root/y", &request)
        })
    };
    assert!(reader.join().unwrap().is_allowed());
}

fn segment() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-z]{1,8}",
        Just(".".to_string()),
        Just("..".to_string()),
    ]
}

proptest! {
    #[test]
    fn prop_resolve_is_idempotent(
        segments in prop::collection::vec(segment(), 0..8),
        absolute in any::<bool>(),
    ) {
        let joined = segments.join("/");
        let raw = if absolute { format!("/{}", joined) } else { joined };
        let base = "/nonexistent-root/ws/session";

        let once = resolve_path(&raw, Some(base));
        let twice = resolve_path(once.to_str().unwrap(), Some(base));
        prop_assert_eq!(once, twice);
    }

    #[test]
    fn prop_paths_below_working_directory_are_allowed(
        suffix in prop::collection::vec("[a-z]{1,8}", 1..6),
    ) {
        let guard = guard();
        let wd = Path::new("/nonexistent-root/ws/a");
        let request = AuthorizationRequest::new("file_operations.read_file")
            .session("s1")
            .working_directory(wd);
        let path = format!("/nonexistent-root/ws/a/{}", suffix.join("/"));
        prop_assert!(guard.check_path(&path, &request).is_allowed());
    }

    #[test]
    fn prop_prefix_sharing_siblings_are_not_contained(
        extra in "[a-z0-9]{1,6}",
        rest in "[a-z]{1,8}",
    ) {
        let guard = guard();
        let wd = Path::new("/nonexistent-root/ws/a");
        let request = AuthorizationRequest::new("file_operations.read_file")
            .session("s1")
            .working_directory(wd);
        let path = format!("/nonexistent-root/ws/a{}/{}", extra, rest);
        prop_assert!(!guard.check_path(&path, &request).is_allowed());
    }

    #[test]
    fn prop_user_initiated_is_always_allowed(
        path in "[ -~]{0,40}",
        has_wd in any::<bool>(),
        has_session in any::<bool>(),
    ) {
        let guard = guard();
        let wd = Path::new("/nonexistent-root/ws/a");
        let mut request =
            AuthorizationRequest::new("file_operations.read_file").user_initiated(true);
        if has_wd {
            request = request.working_directory(wd);
        }
        if has_session {
            request = request.session("s1");
        }
        prop_assert!(guard.check_path(&path, &request).is_allowed());
    }

    #[test]
    fn prop_no_working_directory_always_escalates(
        path in "[ -~]{0,40}",
        granted in any::<bool>(),
    ) {
        let guard = guard();
        if granted {
            guard.grants().grant("s1", "file_operations.read_file");
        }
        let request = AuthorizationRequest::new("file_operations.read_file").session("s1");
        let is_escalation = matches!(
            guard.check_path(&path, &request),
            AuthorizationDecision::RequiresEscalation(_)
        );
        prop_assert!(is_escalation);
    }
}
