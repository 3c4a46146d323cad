//! Read-only repository access via `git2`.
//!
//! [`GitRepo`] is the narrow facade the mining pipeline needs: history
//! traversal, parent lookup, merge-base computation, in-memory three-way
//! staging of two trees, and blob retrieval. Nothing here touches a working
//! tree or the repository index.

use std::path::{Path, PathBuf};

use git2::{BranchType, ErrorCode, FetchOptions, Oid, Repository, Sort, Tree};
use tracing::{debug, info, instrument, warn};

use crate::errors::GitError;

/// High-level read-only client wrapping a `git2::Repository`.
pub struct GitRepo {
    repo: Repository,
    repo_path: PathBuf,
}

/// One path the backend's tree merge could not resolve on its own.
///
/// Each side holds the blob id recorded at that stage (1 = base, 2 = ours,
/// 3 = theirs); `None` means the file did not exist on that side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedEntry {
    pub path: String,
    pub base: Option<Oid>,
    pub ours: Option<Oid>,
    pub theirs: Option<Oid>,
}

impl GitRepo {
    /// Open an existing Git repository at `repo_path`.
    pub fn open<P: AsRef<Path>>(repo_path: P) -> Result<Self, GitError> {
        let path = repo_path.as_ref();
        info!(path = %path.display(), "opening git repository");
        let repo = Repository::open(path)
            .map_err(|_| GitError::RepositoryNotFound(path.display().to_string()))?;
        Ok(Self { repo, repo_path: path.to_path_buf() })
    }

    /// Clone a remote repository to `path`.
    #[instrument(skip_all, fields(url = %url, path = %path.display()))]
    pub fn clone_repo(url: &str, path: &Path) -> Result<Self, GitError> {
        info!("cloning git repository");
        let mut builder = git2::build::RepoBuilder::new();
        builder.fetch_options(FetchOptions::new());
        let repo = builder.clone(url, path).map_err(|e| GitError::CloneFailed {
            url: url.to_string(),
            detail: e.message().to_string(),
        })?;
        info!("clone completed");
        Ok(Self { repo, repo_path: path.to_path_buf() })
    }

    /// Open the repository at `path`, cloning it from `url` first when the
    /// path does not exist yet.
    pub fn open_or_clone(path: &Path, url: Option<&str>) -> Result<Self, GitError> {
        match url {
            Some(url) if !path.exists() => Self::clone_repo(url, path),
            _ => Self::open(path),
        }
    }

    pub fn repo_path(&self) -> &Path {
        &self.repo_path
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    /// Resolve any revision expression (full or abbreviated SHA, ref name)
    /// to the commit it names.
    pub fn resolve_commit(&self, spec: &str) -> Result<Oid, GitError> {
        self.repo
            .revparse_single(spec)
            .and_then(|obj| obj.peel_to_commit())
            .map(|commit| commit.id())
            .map_err(|_| GitError::RefNotFound(spec.to_string()))
    }

    /// Resolve the tip of `branch`.
    ///
    /// Tries the local branch, then `origin/<branch>`. When `branch` is unset
    /// or names neither, falls back to whatever `HEAD` points at.
    #[instrument(skip(self))]
    pub fn resolve_branch(&self, branch: Option<&str>) -> Result<Oid, GitError> {
        if let Some(name) = branch {
            let candidates = [
                (name.to_string(), BranchType::Local),
                (format!("origin/{}", name), BranchType::Remote),
            ];
            for (candidate, kind) in candidates {
                if let Ok(found) = self.repo.find_branch(&candidate, kind) {
                    let tip = found.get().peel_to_commit()?.id();
                    debug!(branch = %candidate, %tip, "resolved branch");
                    return Ok(tip);
                }
            }
            warn!(branch = name, "branch not found, falling back to HEAD");
        }
        let head = self
            .repo
            .head()
            .map_err(|_| GitError::RefNotFound("HEAD".into()))?;
        Ok(head.peel_to_commit()?.id())
    }

    /// Lazily walk every commit reachable from `tip`, newest first.
    ///
    /// Each call starts a fresh walk. Nothing is filtered out; callers pick
    /// merge commits by parent count.
    pub fn walk_history(
        &self,
        tip: Oid,
    ) -> Result<impl Iterator<Item = Result<Oid, GitError>> + '_, GitError> {
        let mut revwalk = self.repo.revwalk()?;
        revwalk.push(tip)?;
        revwalk.set_sorting(Sort::TIME)?;
        Ok(revwalk.map(|oid| oid.map_err(GitError::from)))
    }

    /// Parent ids of `commit`, in recorded order.
    pub fn parents(&self, commit: Oid) -> Result<Vec<Oid>, GitError> {
        let commit = self.repo.find_commit(commit)?;
        Ok(commit.parent_ids().collect())
    }

    /// Nearest common ancestor of `a` and `b`; `None` for unrelated histories.
    pub fn merge_base(&self, a: Oid, b: Oid) -> Result<Option<Oid>, GitError> {
        match self.repo.merge_base(a, b) {
            Ok(oid) => Ok(Some(oid)),
            Err(e) if e.code() == ErrorCode::NotFound => {
                debug!(%a, %b, "no merge base");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Merge the trees of `ours` and `theirs` against `base` in memory and
    /// return the paths left unmerged, sorted by path.
    ///
    /// A missing `base` merges against the empty tree.
    #[instrument(skip(self))]
    pub fn staged_triples(
        &self,
        base: Option<Oid>,
        ours: Oid,
        theirs: Oid,
    ) -> Result<Vec<StagedEntry>, GitError> {
        let base_tree = match base {
            Some(oid) => self.repo.find_commit(oid)?.tree()?,
            None => self.empty_tree()?,
        };
        let ours_tree = self.repo.find_commit(ours)?.tree()?;
        let theirs_tree = self.repo.find_commit(theirs)?.tree()?;

        let index = self.repo.merge_trees(&base_tree, &ours_tree, &theirs_tree, None)?;
        let mut entries = Vec::new();
        if !index.has_conflicts() {
            return Ok(entries);
        }

        for conflict in index.conflicts()? {
            let conflict = conflict?;
            // Renames can record different paths per stage; the ours path is
            // the one the merge commit most likely kept.
            let path = conflict
                .our
                .as_ref()
                .or(conflict.their.as_ref())
                .or(conflict.ancestor.as_ref())
                .map(|entry| String::from_utf8_lossy(&entry.path).into_owned());
            let Some(path) = path else { continue };
            entries.push(StagedEntry {
                path,
                base: conflict.ancestor.map(|e| e.id),
                ours: conflict.our.map(|e| e.id),
                theirs: conflict.their.map(|e| e.id),
            });
        }
        entries.sort_by(|a, b| a.path.cmp(&b.path));
        debug!(count = entries.len(), "collected unmerged paths");
        Ok(entries)
    }

    /// Content of the blob `oid`, or `None` if it cannot be read.
    pub fn blob_content(&self, oid: Oid) -> Option<Vec<u8>> {
        match self.repo.find_blob(oid) {
            Ok(blob) => Some(blob.content().to_vec()),
            Err(e) => {
                debug!(%oid, error = %e, "blob not retrievable");
                None
            }
        }
    }

    /// Content of `path` as committed in `commit`, or `None` if the file did
    /// not exist there or could not be read.
    pub fn content_at(&self, commit: Oid, path: &str) -> Option<Vec<u8>> {
        let lookup = || -> Result<Vec<u8>, git2::Error> {
            let tree = self.repo.find_commit(commit)?.tree()?;
            let entry = tree.get_path(Path::new(path))?;
            let blob = entry.to_object(&self.repo)?.peel_to_blob()?;
            Ok(blob.content().to_vec())
        };
        match lookup() {
            Ok(content) => Some(content),
            Err(e) => {
                debug!(%commit, path, error = %e, "content not found at commit");
                None
            }
        }
    }

    fn empty_tree(&self) -> Result<Tree<'_>, GitError> {
        let oid = self.repo.treebuilder(None)?.write()?;
        Ok(self.repo.find_tree(oid)?)
    }
}
