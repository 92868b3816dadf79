use std::fs;
use std::path::{Path, PathBuf};

use git2::{Repository, RepositoryInitOptions, Signature};
use tempfile::TempDir;

pub const A_TS: &str =
    "line 1\nline 2\nline 3\nline 4\nline 5\nline 6\nline 7\nline 8\nline 9\nline 10\n";

fn commit(repo: &Repository, files: &[(&str, Option<&str>)], message: &str) {
    let root = repo.workdir().unwrap().to_path_buf();
    let mut index = repo.index().unwrap();
    for (path, content) in files {
        let full = root.join(path);
        match content {
            Some(text) => {
                fs::create_dir_all(full.parent().unwrap()).unwrap();
                fs::write(&full, text).unwrap();
                index.add_path(Path::new(path)).unwrap();
            }
            None => {
                fs::remove_file(&full).unwrap();
                index.remove_path(Path::new(path)).unwrap();
            }
        }
    }
    index.write().unwrap();
    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let sig = Signature::now("Test", "test@example.com").unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();
    repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
        .unwrap();
}

fn switch_branch(repo: &Repository, name: &str) {
    if repo.find_branch(name, git2::BranchType::Local).is_err() {
        let head = repo.head().unwrap().peel_to_commit().unwrap();
        repo.branch(name, &head, false).unwrap();
    }
    repo.set_head(&format!("refs/heads/{name}")).unwrap();
    repo.checkout_head(Some(git2::build::CheckoutBuilder::new().force()))
        .unwrap();
}

/// A clone of an upstream repository whose `feature` branch deletes line 4
/// of `src/a.ts`, appends a tenth line, adds `src/new.ts`, removes
/// `src/removed.ts` and touches `Cargo.lock`.
pub struct Fixture {
    _dir: TempDir,
    pub work: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let upstream_path = dir.path().join("upstream");
        let mut opts = RepositoryInitOptions::new();
        opts.initial_head("main");
        let upstream = Repository::init_opts(&upstream_path, &opts).unwrap();

        commit(
            &upstream,
            &[
                ("src/a.ts", Some(A_TS)),
                ("src/removed.ts", Some("gone\n")),
                ("Cargo.lock", Some("# lock\n")),
            ],
            "initial",
        );
        switch_branch(&upstream, "feature");
        let modified = A_TS.replace("line 4\n", "") + "line 11\n";
        commit(
            &upstream,
            &[
                ("src/a.ts", Some(&modified)),
                ("src/new.ts", Some("1\n2\n3\n")),
                ("src/removed.ts", None),
                ("Cargo.lock", Some("# lock\n# updated\n")),
            ],
            "feature work",
        );
        switch_branch(&upstream, "main");

        let work = dir.path().join("work");
        Repository::clone(upstream_path.to_str().unwrap(), &work).unwrap();

        Self { _dir: dir, work }
    }
}
