//! Scratch repositories for unit tests.

use std::cell::Cell;
use std::path::Path;

use git2::{Index, IndexEntry, IndexTime, Oid, Repository, Signature, Time};
use tempfile::TempDir;

pub struct TestRepo {
    dir: TempDir,
    repo: Repository,
    clock: Cell<i64>,
}

impl TestRepo {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let repo = Repository::init(dir.path()).unwrap();
        Self { dir, repo, clock: Cell::new(1_700_000_000) }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Commit a full snapshot of `files` on top of `parents`. Each commit is
    /// one minute younger than the previous one.
    pub fn commit(&self, files: &[(&str, &str)], parents: &[Oid]) -> Oid {
        let mut index = Index::new().unwrap();
        for (path, content) in files {
            let id = self.repo.blob(content.as_bytes()).unwrap();
            index.add(&entry(path, id, content.len())).unwrap();
        }
        let tree_id = index.write_tree_to(&self.repo).unwrap();
        let tree = self.repo.find_tree(tree_id).unwrap();

        let when = self.clock.get() + 60;
        self.clock.set(when);
        let sig = Signature::new("Test", "test@test.com", &Time::new(when, 0)).unwrap();

        let parents: Vec<git2::Commit> =
            parents.iter().map(|p| self.repo.find_commit(*p).unwrap()).collect();
        let parent_refs: Vec<&git2::Commit> = parents.iter().collect();
        self.repo.commit(None, &sig, &sig, "test commit", &tree, &parent_refs).unwrap()
    }

    /// Point `refs/heads/<name>` at `oid` and make it `HEAD`.
    pub fn set_branch(&self, name: &str, oid: Oid) {
        let refname = format!("refs/heads/{}", name);
        self.repo.reference(&refname, oid, true, "test").unwrap();
        self.repo.set_head(&refname).unwrap();
    }
}

fn entry(path: &str, id: Oid, size: usize) -> IndexEntry {
    IndexEntry {
        ctime: IndexTime::new(0, 0),
        mtime: IndexTime::new(0, 0),
        dev: 0,
        ino: 0,
        mode: 0o100644,
        uid: 0,
        gid: 0,
        file_size: size as u32,
        id,
        flags: 0,
        flags_extended: 0,
        path: path.as_bytes().to_vec(),
    }
}
