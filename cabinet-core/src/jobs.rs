// SPDX-License-Identifier: LGPL-3.0-only
//! File operation launcher.
//!
//! A thin coordination layer over the actual file operations: each job
//! kind is a tagged variant submitted through one uniform entry point.
//! After an operation completes, affected cached records are reloaded (or
//! destroyed when gone) and the handle reports the created locations so
//! listings can be fed through their normal member-added path.
//!
//! The launcher also tracks the number of open top-level containers, which
//! drives the application lifecycle.

use crate::error::{LoadError, RenameError};
use crate::filesystem::cache::FileCache;
use crate::filesystem::location::Location;
use crate::observer::{ObserverId, ObserverList};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    Copy,
    Move,
    Link,
    Delete,
    Trash,
    Mkdir,
    CreateFile,
    Rename,
}

/// The result of a completed job.
#[derive(Debug, Clone)]
pub struct JobHandle {
    pub id: u64,
    pub kind: JobKind,
    /// Locations the job brought into existence, for `members_added`.
    pub created: Vec<Location>,
}

#[derive(Error, Debug)]
pub enum JobError {
    #[error("job requires {expected} for {kind:?}")]
    Arity { kind: JobKind, expected: &'static str },

    #[error("{kind:?} cannot operate on remote location {location}")]
    NotLocal { kind: JobKind, location: Location },

    #[error("{op} failed for {path:?}: {source}")]
    Io {
        op: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error(transparent)]
    Rename(#[from] RenameError),
}

/// Submits file operations and keeps the record cache in step with them.
pub struct JobLauncher {
    cache: FileCache,
    next_id: AtomicU64,
    open_containers: AtomicUsize,
    completed: ObserverList<JobHandle>,
}

impl JobLauncher {
    pub fn new(cache: FileCache) -> Self {
        JobLauncher {
            cache,
            next_id: AtomicU64::new(1),
            open_containers: AtomicUsize::new(0),
            completed: ObserverList::new(),
        }
    }

    pub fn cache(&self) -> &FileCache {
        &self.cache
    }

    /// Subscribe to job completions.
    pub fn on_completed<F>(&self, callback: F) -> ObserverId
    where
        F: Fn(&JobHandle) + Send + Sync + 'static,
    {
        self.completed.subscribe(callback)
    }

    pub fn unsubscribe_completed(&self, id: ObserverId) -> bool {
        self.completed.unsubscribe(id)
    }

    // --- container lifecycle -----------------------------------------------

    pub fn register_container(&self) -> usize {
        self.open_containers.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn unregister_container(&self) -> usize {
        let previous = self.open_containers.fetch_sub(1, Ordering::SeqCst);
        if previous == 0 {
            log::error!("unbalanced unregister_container");
            self.open_containers.store(0, Ordering::SeqCst);
            return 0;
        }
        previous - 1
    }

    pub fn open_container_count(&self) -> usize {
        self.open_containers.load(Ordering::SeqCst)
    }

    // --- submission ----------------------------------------------------------

    /// Run a job and return its handle.
    ///
    /// `sources` and `targets` are interpreted per kind: pairwise for
    /// copy/move/link, sources-only for delete/trash, targets-only for
    /// mkdir/create, and a single source-target pair for rename (where the
    /// target's basename is the new name).
    pub fn submit(
        &self,
        kind: JobKind,
        sources: &[Location],
        targets: &[Location],
    ) -> Result<JobHandle, JobError> {
        let created = match kind {
            JobKind::Copy => self.run_pairwise(kind, sources, targets, copy_entry)?,
            JobKind::Move => self.run_pairwise(kind, sources, targets, move_entry)?,
            JobKind::Link => self.run_pairwise(kind, sources, targets, link_entry)?,
            JobKind::Delete => {
                self.run_sources(kind, sources, delete_entry)?;
                Vec::new()
            }
            JobKind::Trash => {
                self.run_sources(kind, sources, trash_entry)?;
                Vec::new()
            }
            JobKind::Mkdir => self.run_targets(kind, targets, |path| {
                std::fs::create_dir_all(path).map_err(|source| JobError::Io {
                    op: "mkdir",
                    path: path.to_path_buf(),
                    source,
                })
            })?,
            JobKind::CreateFile => self.run_targets(kind, targets, |path| {
                std::fs::OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .open(path)
                    .map(|_| ())
                    .map_err(|source| JobError::Io {
                        op: "create",
                        path: path.to_path_buf(),
                        source,
                    })
            })?,
            JobKind::Rename => {
                let (source, target) = match (sources.first(), targets.first()) {
                    (Some(source), Some(target)) => (source, target),
                    _ => {
                        return Err(JobError::Arity {
                            kind,
                            expected: "one source and one target",
                        })
                    }
                };
                let record = self.cache.get_or_create(source, None)?;
                record.rename(&target.basename())?;
                vec![record.location()]
            }
        };

        self.refresh_after(kind, sources, &created);

        let handle = JobHandle {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            kind,
            created,
        };
        self.completed.emit(&handle);
        Ok(handle)
    }

    fn run_pairwise(
        &self,
        kind: JobKind,
        sources: &[Location],
        targets: &[Location],
        op: fn(&Path, &Path) -> Result<(), JobError>,
    ) -> Result<Vec<Location>, JobError> {
        if sources.len() != targets.len() || sources.is_empty() {
            return Err(JobError::Arity {
                kind,
                expected: "matching source and target lists",
            });
        }
        let mut created = Vec::with_capacity(targets.len());
        for (source, target) in sources.iter().zip(targets) {
            let source_path = local_path(kind, source)?;
            let target_path = local_path(kind, target)?;
            op(source_path, target_path)?;
            created.push(target.clone());
        }
        Ok(created)
    }

    fn run_sources(
        &self,
        kind: JobKind,
        sources: &[Location],
        op: fn(&Path) -> Result<(), JobError>,
    ) -> Result<(), JobError> {
        if sources.is_empty() {
            return Err(JobError::Arity {
                kind,
                expected: "at least one source",
            });
        }
        for source in sources {
            op(local_path(kind, source)?)?;
        }
        Ok(())
    }

    fn run_targets(
        &self,
        kind: JobKind,
        targets: &[Location],
        op: impl Fn(&Path) -> Result<(), JobError>,
    ) -> Result<Vec<Location>, JobError> {
        if targets.is_empty() {
            return Err(JobError::Arity {
                kind,
                expected: "at least one target",
            });
        }
        for target in targets {
            op(local_path(kind, target)?)?;
        }
        Ok(targets.to_vec())
    }

    /// Bring cached records back in line with what the job did: sources of
    /// destructive jobs fail their reload and get destroyed, everything
    /// else (sources, created entries, their directories) is reloaded.
    fn refresh_after(&self, kind: JobKind, sources: &[Location], created: &[Location]) {
        // Many sources share a parent directory; reload each location once.
        let mut touched: HashSet<Location> = HashSet::new();
        for location in sources.iter().chain(created) {
            touched.insert(location.clone());
            if let Some(parent) = location.parent() {
                touched.insert(parent);
            }
        }

        for location in touched {
            if let Some(record) = self.cache.lookup(&location) {
                if let Err(err) = record.reload(None) {
                    log::debug!("record gone after {:?} job: {}", kind, err);
                    record.destroy();
                }
            }
        }
    }
}

fn local_path<'a>(kind: JobKind, location: &'a Location) -> Result<&'a Path, JobError> {
    location.as_path().ok_or_else(|| JobError::NotLocal {
        kind,
        location: location.clone(),
    })
}

fn io_err(op: &'static str, path: &Path, source: std::io::Error) -> JobError {
    JobError::Io {
        op,
        path: path.to_path_buf(),
        source,
    }
}

fn copy_entry(source: &Path, target: &Path) -> Result<(), JobError> {
    if source.is_dir() {
        std::fs::create_dir_all(target).map_err(|e| io_err("copy", target, e))?;
        let entries = std::fs::read_dir(source).map_err(|e| io_err("copy", source, e))?;
        for entry in entries {
            let entry = entry.map_err(|e| io_err("copy", source, e))?;
            copy_entry(&entry.path(), &target.join(entry.file_name()))?;
        }
        Ok(())
    } else {
        std::fs::copy(source, target)
            .map(|_| ())
            .map_err(|e| io_err("copy", target, e))
    }
}

fn move_entry(source: &Path, target: &Path) -> Result<(), JobError> {
    std::fs::rename(source, target).map_err(|e| io_err("move", source, e))
}

fn link_entry(source: &Path, target: &Path) -> Result<(), JobError> {
    std::os::unix::fs::symlink(source, target).map_err(|e| io_err("link", target, e))
}

fn delete_entry(path: &Path) -> Result<(), JobError> {
    let result = if path.is_dir() && !path.is_symlink() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };
    result.map_err(|e| io_err("delete", path, e))
}

/// Move an entry into the XDG trash, recording its origin so the record
/// loader can expose it again.
fn trash_entry(path: &Path) -> Result<(), JobError> {
    let io = |op: &'static str, source: std::io::Error| JobError::Io {
        op,
        path: path.to_path_buf(),
        source,
    };

    let data_dir = dirs::data_dir().ok_or_else(|| {
        io(
            "trash",
            std::io::Error::new(std::io::ErrorKind::NotFound, "no data directory"),
        )
    })?;
    let files_dir = data_dir.join("Trash").join("files");
    let info_dir = data_dir.join("Trash").join("info");
    std::fs::create_dir_all(&files_dir).map_err(|e| io("trash", e))?;
    std::fs::create_dir_all(&info_dir).map_err(|e| io("trash", e))?;

    let base_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("unnamed")
        .to_string();

    // Pick a non-colliding name in the trash.
    let mut trash_name = base_name.clone();
    let mut counter = 1;
    while files_dir.join(&trash_name).symlink_metadata().is_ok() {
        trash_name = format!("{}.{}", base_name, counter);
        counter += 1;
    }

    let encoded_origin =
        urlencoding::encode(&path.to_string_lossy()).replace("%2F", "/");
    let info = format!(
        "[Trash Info]\nPath={}\nDeletionDate={}\n",
        encoded_origin,
        iso8601_now()
    );
    std::fs::write(info_dir.join(format!("{}.trashinfo", trash_name)), info)
        .map_err(|e| io("trash", e))?;
    std::fs::rename(path, files_dir.join(&trash_name)).map_err(|e| io("trash", e))
}

/// Current UTC time in the `YYYY-MM-DDThh:mm:ss` form trashinfo files use.
fn iso8601_now() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string()
}
