mod common;

use std::collections::BTreeMap;

use gitclient::types::{CheckoutStrategy, CloneConfig, CommitOptions, PushConfig};
use gitclient::CommitOutcome;

#[test]
fn clone_branch_checks_out_requested_branch() {
    let dir = tempfile::tempdir().unwrap();
    let (_origin_repo, url) = common::origin_with_files(dir.path(), "main", &[("hello.txt", b"hi")]);

    let client = common::client(dir.path(), "work");
    let cfg = CloneConfig {
        checkout_strategy: Some(CheckoutStrategy::Branch("main".into())),
        ..Default::default()
    };
    let commit = client.clone(&url, &cfg).unwrap().unwrap();
    assert_eq!(commit.reference, "refs/heads/main");
    assert_eq!(client.head().unwrap(), commit.hash.to_string());
    assert_eq!(common::read_worktree_file(client.path(), "hello.txt"), b"hi");
}

#[test]
fn clone_short_circuits_when_last_observed_commit_matches() {
    let dir = tempfile::tempdir().unwrap();
    let (_origin_repo, url) = common::origin_with_files(dir.path(), "main", &[("hello.txt", b"hi")]);

    let client = common::client(dir.path(), "work");
    let cfg = CloneConfig {
        checkout_strategy: Some(CheckoutStrategy::Branch("main".into())),
        ..Default::default()
    };
    let first = client.clone(&url, &cfg).unwrap().unwrap();

    let cfg2 = CloneConfig {
        checkout_strategy: Some(CheckoutStrategy::Branch("main".into())),
        last_observed_commit: format!("main@sha1:{}", first.hash),
        ..Default::default()
    };
    let second = client.clone(&url, &cfg2).unwrap().unwrap();
    assert!(second.is_partial());
    assert_eq!(second.hash.to_string(), first.hash.to_string());
}

#[test]
fn commit_then_push_updates_only_the_checked_out_branch() {
    let dir = tempfile::tempdir().unwrap();
    let (origin_repo, url) = common::origin_with_files(dir.path(), "main", &[("hello.txt", b"hi")]);

    let client = common::client(dir.path(), "work");
    let cfg = CloneConfig { checkout_strategy: Some(CheckoutStrategy::Branch("main".into())), ..Default::default() };
    client.clone(&url, &cfg).unwrap();

    let mut files = BTreeMap::new();
    files.insert("new.txt".to_string(), b"new content".to_vec());
    let outcome = client.commit("add new.txt", &CommitOptions { files, ..Default::default() }).unwrap();
    assert!(matches!(outcome, CommitOutcome::Committed(_)));

    client.push(&url, &PushConfig::default()).unwrap();

    let updated = origin_repo
        .find_reference("refs/heads/main")
        .unwrap()
        .peel_to_commit()
        .unwrap();
    assert_eq!(updated.id().to_string(), outcome.hash());
}

#[test]
fn switch_branch_prefers_local_over_remote_tracking() {
    let dir = tempfile::tempdir().unwrap();
    let (_origin_repo, url) = common::origin_with_files(dir.path(), "main", &[("hello.txt", b"hi")]);

    let client = common::client(dir.path(), "work");
    let cfg = CloneConfig { checkout_strategy: Some(CheckoutStrategy::Branch("main".into())), ..Default::default() };
    client.clone(&url, &cfg).unwrap();

    client.switch_branch("feature").unwrap();
    let mut files = BTreeMap::new();
    files.insert("feature.txt".to_string(), b"on feature".to_vec());
    client.commit("feature work", &CommitOptions { files, ..Default::default() }).unwrap();

    client.switch_branch("main").unwrap();
    assert!(!client.path().join("feature.txt").exists());

    client.switch_branch("feature").unwrap();
    assert!(client.path().join("feature.txt").exists());
}

#[test]
fn init_sets_symbolic_head_to_requested_branch() {
    let dir = tempfile::tempdir().unwrap();
    let client = common::client(dir.path(), "work");
    client.init("https://example.invalid/placeholder.git", "develop").unwrap();

    let mut files = BTreeMap::new();
    files.insert("a.txt".to_string(), b"a".to_vec());
    client.commit("first", &CommitOptions { files, ..Default::default() }).unwrap();

    // HEAD was symbolic to refs/heads/develop before the first commit landed there.
    let repo = git2::Repository::open(client.path()).unwrap();
    let head_ref = repo.find_reference("HEAD").unwrap();
    assert_eq!(head_ref.symbolic_target(), Some("refs/heads/develop"));
}
