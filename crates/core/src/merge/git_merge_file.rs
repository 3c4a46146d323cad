//! Three-way merge through the external `git merge-file` tool.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tempfile::TempDir;
use tracing::{debug, warn};
use uuid::Uuid;

use super::{MergeEngine, MergeOutcome};
use crate::errors::MergeError;

/// `git merge-file` truncates the conflict count to this value; larger exit
/// codes are errors (git exits with 255 for a negative status).
const MAX_REPORTED_CONFLICTS: i32 = 127;

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Returns `true` if a `git` binary is available on `$PATH`.
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Private scratch directory owned by one merge invoker.
///
/// The directory name carries a random per-instance id, and every call gets
/// its own numbered subdirectory, so invokers in the same or different
/// processes never share files. Everything is removed on drop.
#[derive(Debug)]
pub struct ScratchSpace {
    dir: TempDir,
    calls: AtomicU64,
}

impl ScratchSpace {
    /// Create a scratch space under the system temporary directory.
    pub fn new() -> Result<Self, MergeError> {
        Self::new_in(std::env::temp_dir())
    }

    /// Create a scratch space under `root`.
    pub fn new_in<P: AsRef<Path>>(root: P) -> Result<Self, MergeError> {
        let prefix = format!("mergemine-{}-", Uuid::new_v4().simple());
        let dir = tempfile::Builder::new().prefix(&prefix).tempdir_in(root)?;
        debug!(path = %dir.path().display(), "created merge scratch space");
        Ok(Self { dir, calls: AtomicU64::new(0) })
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    fn begin_call(&self) -> Result<ScratchCall, MergeError> {
        let n = self.calls.fetch_add(1, Ordering::Relaxed);
        let dir = self.dir.path().join(format!("call-{}", n));
        std::fs::create_dir(&dir)?;
        Ok(ScratchCall { dir })
    }
}

/// Files of a single merge call; the directory is removed on drop.
struct ScratchCall {
    dir: PathBuf,
}

impl ScratchCall {
    fn write(&self, name: &str, content: Option<&[u8]>) -> Result<PathBuf, MergeError> {
        let path = self.dir.join(name);
        std::fs::write(&path, content.unwrap_or_default())?;
        Ok(path)
    }
}

impl Drop for ScratchCall {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_dir_all(&self.dir) {
            warn!(path = %self.dir.display(), error = %e, "failed to remove merge scratch files");
        }
    }
}

/// Merge engine running `git merge-file --diff3`.
///
/// Conflict markers are labelled `ours`, `base` and `theirs`. The process
/// exit code is the conflict-block count.
#[derive(Debug)]
pub struct GitMergeFile {
    scratch: ScratchSpace,
    program: String,
    timeout: Option<Duration>,
}

impl GitMergeFile {
    /// Create an engine with a fresh scratch space under the system temp dir.
    pub fn new(timeout: Option<Duration>) -> Result<Self, MergeError> {
        Ok(Self::with_scratch(ScratchSpace::new()?, timeout))
    }

    pub fn with_scratch(scratch: ScratchSpace, timeout: Option<Duration>) -> Self {
        Self { scratch, program: "git".into(), timeout }
    }

    /// Use a different `git` executable.
    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    pub fn scratch(&self) -> &ScratchSpace {
        &self.scratch
    }

    fn run(&self, mut cmd: Command) -> Result<ExitStatus, MergeError> {
        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MergeError::ToolNotFound(self.program.clone())
            } else {
                MergeError::Io(e)
            }
        })?;

        let Some(limit) = self.timeout else {
            return Ok(child.wait()?);
        };
        let deadline = Instant::now() + limit;
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                warn!(timeout_secs = limit.as_secs(), "git merge-file timed out");
                return Err(MergeError::Timeout(limit.as_secs()));
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }
}

impl MergeEngine for GitMergeFile {
    fn name(&self) -> &'static str {
        "git merge-file"
    }

    fn merge(
        &self,
        base: Option<&[u8]>,
        ours: Option<&[u8]>,
        theirs: Option<&[u8]>,
    ) -> Result<MergeOutcome, MergeError> {
        let call = self.scratch.begin_call()?;
        let base_path = call.write("base", base)?;
        let ours_path = call.write("ours", ours)?;
        let theirs_path = call.write("theirs", theirs)?;
        // Stderr goes to a file so a chatty tool never blocks on a full pipe.
        let stderr_path = call.dir.join("stderr");
        let stderr_file = File::create(&stderr_path)?;

        let mut cmd = Command::new(&self.program);
        cmd.args(["merge-file", "--diff3", "-L", "ours", "-L", "base", "-L", "theirs"])
            .arg(&ours_path)
            .arg(&base_path)
            .arg(&theirs_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(stderr_file);

        let status = self.run(cmd)?;
        let conflict_blocks = match status.code() {
            Some(code) if (0..=MAX_REPORTED_CONFLICTS).contains(&code) => code as u32,
            Some(code) => {
                let stderr = String::from_utf8_lossy(&std::fs::read(&stderr_path)?).into_owned();
                warn!(exit_code = code, %stderr, "git merge-file failed");
                return Err(MergeError::ToolFailed { exit_code: code, stderr });
            }
            None => return Err(MergeError::Terminated),
        };

        let merged = std::fs::read(&ours_path)?;
        debug!(conflicts = conflict_blocks, "git merge-file finished");
        Ok(MergeOutcome { merged, conflict_blocks })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::merge::count_conflict_blocks;

    fn engine(root: &Path) -> GitMergeFile {
        GitMergeFile::with_scratch(ScratchSpace::new_in(root).unwrap(), None)
    }

    #[test]
    fn test_scratch_spaces_are_isolated_and_cleaned() {
        let root = tempfile::tempdir().unwrap();
        let a = ScratchSpace::new_in(root.path()).unwrap();
        let b = ScratchSpace::new_in(root.path()).unwrap();
        assert_ne!(a.path(), b.path());

        let call = a.begin_call().unwrap();
        let written = call.write("base", None).unwrap();
        assert_eq!(std::fs::read(&written).unwrap(), b"");
        let call_dir = call.dir.clone();
        drop(call);
        assert!(!call_dir.exists());

        let kept = a.path().to_path_buf();
        drop(a);
        assert!(!kept.exists());
    }

    #[test]
    fn test_clean_merge() {
        if !git_available() {
            eprintln!("SKIP: git not installed");
            return;
        }
        let root = tempfile::tempdir().unwrap();
        let base = b"aaa\nbbb\nccc\nddd\neee\n";
        let ours = b"AAA\nbbb\nccc\nddd\neee\n";
        let theirs = b"aaa\nbbb\nccc\nddd\nEEE\n";
        let outcome = engine(root.path()).merge(Some(base), Some(ours), Some(theirs)).unwrap();
        assert_eq!(outcome.conflict_blocks, 0);
        assert_eq!(outcome.merged, b"AAA\nbbb\nccc\nddd\nEEE\n");
    }

    #[test]
    fn test_conflict_count_comes_from_exit_code() {
        if !git_available() {
            eprintln!("SKIP: git not installed");
            return;
        }
        let root = tempfile::tempdir().unwrap();
        let base = b"a\nbase1\nb\nc\nd\ne\nf\nbase2\ng\n";
        let ours = b"a\nours1\nb\nc\nd\ne\nf\nours2\ng\n";
        let theirs = b"a\ntheirs1\nb\nc\nd\ne\nf\ntheirs2\ng\n";
        let outcome = engine(root.path()).merge(Some(base), Some(ours), Some(theirs)).unwrap();
        assert_eq!(outcome.conflict_blocks, 2);
        assert_eq!(count_conflict_blocks(&outcome.merged), 2);
        let text = String::from_utf8(outcome.merged).unwrap();
        assert!(text.contains("<<<<<<< ours\nours1\n||||||| base\nbase1\n=======\ntheirs1\n>>>>>>> theirs\n"));
    }

    #[test]
    fn test_missing_binary_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        let engine = engine(root.path()).with_program("mergemine-no-such-git-binary");
        let err = engine.merge(Some(b"a\n"), Some(b"b\n"), Some(b"c\n")).unwrap_err();
        assert!(matches!(err, MergeError::ToolNotFound(_)));
    }

    /// Write an executable shell script standing in for `git`.
    #[cfg(unix)]
    fn fake_tool(dir: &Path, body: &str) -> String {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join("fake-git");
        std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path.display().to_string()
    }

    #[cfg(unix)]
    #[test]
    fn test_verbose_stderr_does_not_stall_timed_runs() {
        let root = tempfile::tempdir().unwrap();
        // Far more than a pipe buffer of stderr, then a clean exit.
        let tool = fake_tool(root.path(), "yes 'warning: noise' | head -n 100000 >&2\nexit 0");
        let engine = GitMergeFile::with_scratch(
            ScratchSpace::new_in(root.path()).unwrap(),
            Some(Duration::from_secs(30)),
        )
        .with_program(tool);

        let outcome = engine.merge(Some(b"a\n"), Some(b"ours\n"), Some(b"c\n")).unwrap();
        assert_eq!(outcome.conflict_blocks, 0);
        assert_eq!(outcome.merged, b"ours\n");
    }

    #[cfg(unix)]
    #[test]
    fn test_tool_failure_reports_stderr() {
        let root = tempfile::tempdir().unwrap();
        let tool = fake_tool(root.path(), "echo 'fatal: boom' >&2\nexit 200");
        let engine = engine(root.path()).with_program(tool);

        let err = engine.merge(Some(b"a\n"), Some(b"b\n"), Some(b"c\n")).unwrap_err();
        match err {
            MergeError::ToolFailed { exit_code, stderr } => {
                assert_eq!(exit_code, 200);
                assert!(stderr.contains("fatal: boom"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
