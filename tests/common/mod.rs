use std::path::{Path, PathBuf};

use gitclient::auth::{AuthOptions, Transport};
use gitclient::{ClientOptions, RepositoryClient};

/// Creates a bare "origin" repository on disk with a single commit on
/// `branch`, writing `files` at the repo root. Returns the repo's `file://`
/// URL, usable directly by `RepositoryClient::clone`.
pub fn origin_with_files(dir: &Path, branch: &str, files: &[(&str, &[u8])]) -> (git2::Repository, String) {
    let origin_path = dir.join("origin.git");
    let repo = git2::Repository::init_bare(&origin_path).unwrap();

    let mut builder = repo.treebuilder(None).unwrap();
    for (name, contents) in files {
        let oid = repo.blob(contents).unwrap();
        builder.insert(*name, oid, 0o100644).unwrap();
    }
    let tree_oid = builder.write().unwrap();
    let tree = repo.find_tree(tree_oid).unwrap();

    let sig = git2::Signature::now("origin", "origin@example.com").unwrap();
    let refname = format!("refs/heads/{branch}");
    repo.commit(Some(&refname), &sig, &sig, "initial commit", &tree, &[]).unwrap();
    repo.set_head(&refname).unwrap();

    let url = format!("file://{}", origin_path.display());
    (repo, url)
}

/// Builds a client bound to a fresh working directory under `dir`. Local
/// `file://` origins need no real credentials, but `AuthOptions` still
/// requires a transport to be named, so tests declare `Https` even though
/// the origin URL scheme is `file`.
pub fn client(dir: &Path, name: &str) -> RepositoryClient {
    let auth = AuthOptions { transport: Some(Transport::Https), ..Default::default() };
    RepositoryClient::new(dir.join(name), auth, ClientOptions::default()).unwrap()
}

pub fn read_worktree_file(workdir: &Path, name: &str) -> Vec<u8> {
    std::fs::read(workdir.join(name)).unwrap()
}

#[allow(dead_code)]
pub fn tag_commit(repo: &git2::Repository, name: &str, annotated: bool) -> git2::Oid {
    let head = repo.head().unwrap().peel_to_commit().unwrap();
    if annotated {
        let sig = git2::Signature::now("origin", "origin@example.com").unwrap();
        repo.tag(name, head.as_object(), &sig, &format!("Annotated tag for: {name}"), false)
            .unwrap()
    } else {
        repo.reference(&format!("refs/tags/{name}"), head.id(), false, "lightweight tag").unwrap();
        head.id()
    }
}

#[allow(dead_code)]
pub fn tmp(prefix: &str) -> PathBuf {
    tempfile::Builder::new().prefix(prefix).tempdir().unwrap().into_path()
}
