mod common;

use gitclient::types::{CheckoutStrategy, CloneConfig};

#[test]
fn tag_strategy_distinguishes_annotated_from_lightweight() {
    let dir = tempfile::tempdir().unwrap();
    let (origin_repo, url) = common::origin_with_files(dir.path(), "main", &[("a.txt", b"a")]);
    common::tag_commit(&origin_repo, "v0.1.0", true);

    let client = common::client(dir.path(), "work");
    let cfg = CloneConfig { checkout_strategy: Some(CheckoutStrategy::Tag("v0.1.0".into())), ..Default::default() };
    let commit = client.clone(&url, &cfg).unwrap().unwrap();
    assert!(commit.referencing_tag.is_some());
    assert!(commit.referencing_tag.unwrap().message.starts_with("Annotated tag for:"));
}

#[test]
fn tag_strategy_lightweight_tag_has_no_referencing_tag() {
    let dir = tempfile::tempdir().unwrap();
    let (origin_repo, url) = common::origin_with_files(dir.path(), "main", &[("a.txt", b"a")]);
    common::tag_commit(&origin_repo, "v0.2.0", false);

    let client = common::client(dir.path(), "work");
    let cfg = CloneConfig { checkout_strategy: Some(CheckoutStrategy::Tag("v0.2.0".into())), ..Default::default() };
    let commit = client.clone(&url, &cfg).unwrap().unwrap();
    assert!(commit.referencing_tag.is_none());
}

#[test]
fn commit_strategy_checks_out_exact_hash() {
    let dir = tempfile::tempdir().unwrap();
    let (origin_repo, url) = common::origin_with_files(dir.path(), "main", &[("a.txt", b"a")]);
    let hash = origin_repo.head().unwrap().peel_to_commit().unwrap().id().to_string();

    let client = common::client(dir.path(), "work");
    let cfg = CloneConfig {
        checkout_strategy: Some(CheckoutStrategy::Commit { hash: hash.clone(), branch: None }),
        ..Default::default()
    };
    let commit = client.clone(&url, &cfg).unwrap().unwrap();
    assert_eq!(commit.hash.to_string(), hash);
}

#[test]
fn refname_strategy_resolves_annotated_tag_to_its_commit() {
    let dir = tempfile::tempdir().unwrap();
    let (origin_repo, url) = common::origin_with_files(dir.path(), "main", &[("a.txt", b"a")]);
    let target_oid = origin_repo.head().unwrap().peel_to_commit().unwrap().id();
    common::tag_commit(&origin_repo, "v0.1.0", true);

    let client = common::client(dir.path(), "work");
    let cfg = CloneConfig {
        checkout_strategy: Some(CheckoutStrategy::RefName("refs/tags/v0.1.0".into())),
        ..Default::default()
    };
    let commit = client.clone(&url, &cfg).unwrap().unwrap();
    assert_eq!(commit.hash.to_string(), target_oid.to_string());
}

#[test]
fn semver_strategy_selects_highest_satisfying_tag() {
    let dir = tempfile::tempdir().unwrap();
    let (origin_repo, url) = common::origin_with_files(dir.path(), "main", &[("a.txt", b"a")]);
    common::tag_commit(&origin_repo, "v0.1.0", false);
    common::tag_commit(&origin_repo, "v0.2.0", true);

    let client = common::client(dir.path(), "work");
    let cfg = CloneConfig {
        checkout_strategy: Some(CheckoutStrategy::SemVer(">0.1.0".into())),
        ..Default::default()
    };
    let commit = client.clone(&url, &cfg).unwrap().unwrap();
    assert!(commit.referencing_tag.is_some());
}
