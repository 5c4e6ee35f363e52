//! Filesystem-backed file state machine.
//!
//! A file's state is its name and location. `claim`, `release` and `archive`
//! are each a single rename (or a copy when the archive is on another
//! device), so two scanners racing for the same file cannot both win.

use chrono::{DateTime, Local};
use regex_lite::Regex;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use tokio::fs;
use tracing::{debug, error, info, warn};

use super::config::FilesConfig;
use super::error::FileStateError;
use super::state::{ArchiveOutcome, FileState, FileStats, LockedFile};

/// Owns the source and archive directories.
#[derive(Debug, Clone)]
pub struct FileStateManager {
    config: FilesConfig,
    pattern: Regex,
}

impl FileStateManager {
    pub fn new(config: FilesConfig) -> Result<Self, FileStateError> {
        let pattern =
            Regex::new(&config.file_pattern).map_err(|e| FileStateError::InvalidPattern {
                pattern: config.file_pattern.clone(),
                reason: e.to_string(),
            })?;
        Ok(Self { config, pattern })
    }

    pub fn config(&self) -> &FilesConfig {
        &self.config
    }

    /// Creates the source directory and this month's archive directory.
    pub async fn ensure_layout(&self) -> Result<(), FileStateError> {
        let month_dir = self.archive_month_dir(Local::now());
        for dir in [&self.config.source_dir, &month_dir] {
            fs::create_dir_all(dir)
                .await
                .map_err(|e| FileStateError::DirectoryCreationFailed {
                    path: dir.clone(),
                    source: e,
                })?;
        }
        info!(
            source = %self.config.source_dir.display(),
            archive = %month_dir.display(),
            "Directories ensured"
        );
        Ok(())
    }

    /// Derives a path's state from where it is and what it is called.
    pub fn state_of(&self, path: &Path) -> Option<FileState> {
        if path.starts_with(&self.config.archive_dir) {
            return Some(FileState::Archived);
        }
        if path.parent() != Some(self.config.source_dir.as_path()) {
            return None;
        }
        let name = path.file_name()?.to_str()?;
        if name.starts_with('.') {
            None
        } else if name.ends_with(&self.config.locked_suffix) {
            Some(FileState::Locked)
        } else if self.pattern.is_match(name) {
            Some(FileState::Available)
        } else {
            None
        }
    }

    /// Lists available files that pass the readiness test, oldest name first.
    pub async fn list_eligible(&self) -> Result<Vec<PathBuf>, FileStateError> {
        let mut entries = match fs::read_dir(&self.config.source_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(
                    dir = %self.config.source_dir.display(),
                    "Source directory does not exist"
                );
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let now = SystemTime::now();
        let mut candidates = 0usize;
        let mut ready = Vec::new();

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if self.state_of(&path) != Some(FileState::Available) {
                continue;
            }
            let metadata = match entry.metadata().await {
                Ok(m) if m.is_file() => m,
                Ok(_) => continue,
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "Error checking file readiness");
                    continue;
                }
            };
            candidates += 1;

            let modified = metadata.modified().unwrap_or(now);
            if self.is_ready(metadata.len(), modified, now) {
                ready.push(path);
            } else {
                debug!(file = %path.display(), size = metadata.len(), "File not ready for processing");
            }
        }

        ready.sort();
        info!(
            found = candidates,
            ready = ready.len(),
            "Scanned source directory"
        );
        Ok(ready)
    }

    /// Readiness predicate: large enough and quiet for the stability window.
    pub fn is_ready(&self, len: u64, modified: SystemTime, now: SystemTime) -> bool {
        if len < self.config.min_file_size_bytes {
            return false;
        }
        let age = now.duration_since(modified).unwrap_or(Duration::ZERO);
        age >= self.config.stability_window()
    }

    /// Claims a file by appending the locked suffix.
    pub async fn claim(&self, path: &Path) -> Result<LockedFile, FileStateError> {
        let locked = self.locked_path(path);

        if fs::try_exists(&locked).await.unwrap_or(false) {
            return Err(FileStateError::ClaimFailed {
                path: path.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "a locked copy with this name already exists",
                ),
            });
        }

        fs::rename(path, &locked)
            .await
            .map_err(|e| FileStateError::ClaimFailed {
                path: path.to_path_buf(),
                source: e,
            })?;

        info!(file = %path.display(), "File locked for processing");
        Ok(LockedFile::new(path.to_path_buf(), locked))
    }

    /// Returns a locked file to its original name.
    ///
    /// Refuses when something already occupies that name; the file then
    /// stays locked.
    pub async fn release(&self, file: &LockedFile) -> Result<PathBuf, FileStateError> {
        self.release_path(file.path()).await
    }

    /// Moves a locked file into `archive_dir/YYYY/MM/`.
    ///
    /// Never overwrites: a name collision gets a time-based suffix. If the
    /// move fails the file is released instead, and only a failed release is
    /// reported as an error.
    pub async fn archive(
        &self,
        file: &LockedFile,
        record_count: usize,
    ) -> Result<ArchiveOutcome, FileStateError> {
        match self.move_to_archive(file).await {
            Ok(target) => {
                info!(
                    file = %file.name(),
                    records = record_count,
                    target = %target.display(),
                    "File archived"
                );
                Ok(ArchiveOutcome::Archived(target))
            }
            Err(e) => {
                error!(file = %file.name(), error = %e, "Failed to archive file, releasing");
                let restored = self.release(file).await?;
                Ok(ArchiveOutcome::Released(restored))
            }
        }
    }

    /// Counts pending, locked and archived files.
    pub async fn stats(&self) -> FileStats {
        let mut stats = FileStats {
            source_dir: self.config.source_dir.clone(),
            archive_dir: self.config.archive_dir.clone(),
            ..Default::default()
        };

        match fs::read_dir(&self.config.source_dir).await {
            Ok(mut entries) => loop {
                match entries.next_entry().await {
                    Ok(Some(entry)) => {
                        let is_file = entry.file_type().await.map(|t| t.is_file()).unwrap_or(false);
                        if !is_file {
                            continue;
                        }
                        match self.state_of(&entry.path()) {
                            Some(FileState::Available) => stats.pending += 1,
                            Some(FileState::Locked) => stats.locked += 1,
                            _ => {}
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(error = %e, "Error reading source directory for stats");
                        break;
                    }
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(error = %e, "Error reading source directory for stats"),
        }

        stats.archived = count_files(&self.config.archive_dir).await;
        stats
    }

    fn locked_path(&self, path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(&self.config.locked_suffix);
        PathBuf::from(name)
    }

    async fn release_path(&self, locked: &Path) -> Result<PathBuf, FileStateError> {
        let original = self
            .original_path(locked)
            .ok_or_else(|| FileStateError::NotLocked {
                path: locked.to_path_buf(),
            })?;

        if fs::try_exists(&original).await? {
            error!(
                file = %original.display(),
                "Cannot release file, original name is taken"
            );
            return Err(FileStateError::ReleaseConflict { path: original });
        }

        fs::rename(locked, &original)
            .await
            .map_err(|e| FileStateError::move_failed(locked.to_path_buf(), original.clone(), e))?;

        warn!(file = %original.display(), "File released");
        Ok(original)
    }

    fn original_path(&self, locked: &Path) -> Option<PathBuf> {
        let name = locked.file_name()?.to_str()?;
        let stem = name.strip_suffix(&self.config.locked_suffix)?;
        if stem.is_empty() {
            return None;
        }
        Some(locked.with_file_name(stem))
    }

    fn archive_month_dir(&self, now: DateTime<Local>) -> PathBuf {
        self.config
            .archive_dir
            .join(now.format("%Y").to_string())
            .join(now.format("%m").to_string())
    }

    async fn move_to_archive(&self, file: &LockedFile) -> Result<PathBuf, FileStateError> {
        let now = Local::now();
        let dir = self.archive_month_dir(now);
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| FileStateError::DirectoryCreationFailed {
                path: dir.clone(),
                source: e,
            })?;

        let source = file.path();
        let name = file.name();
        let mut attempt = 0u32;
        let target = loop {
            let candidate = archive_candidate(&dir, &name, now, attempt);
            match place_new(source, &candidate).await {
                Ok(()) => break candidate,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    debug!(candidate = %candidate.display(), "Archive name taken");
                    attempt += 1;
                }
                Err(e) => {
                    return Err(FileStateError::move_failed(
                        source.to_path_buf(),
                        candidate,
                        e,
                    ))
                }
            }
        };

        if let Err(e) = fs::remove_file(source).await {
            let _ = fs::remove_file(&target).await;
            return Err(FileStateError::move_failed(source.to_path_buf(), target, e));
        }
        Ok(target)
    }
}

/// Creates `target` with the contents of `source`, failing with
/// `AlreadyExists` instead of replacing an existing file. Hard links are
/// used where possible, a copy otherwise.
async fn place_new(source: &Path, target: &Path) -> std::io::Result<()> {
    match fs::hard_link(source, target).await {
        Err(e) if is_cross_device(&e) || e.kind() == std::io::ErrorKind::Unsupported => {
            copy_new(source, target).await
        }
        other => other,
    }
}

fn is_cross_device(e: &std::io::Error) -> bool {
    // EXDEV is 18 on Linux
    e.kind() == std::io::ErrorKind::CrossesDevices || e.raw_os_error() == Some(18)
}

async fn copy_new(source: &Path, target: &Path) -> std::io::Result<()> {
    let mut dest = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(target)
        .await?;
    let copied = async {
        let mut src = fs::File::open(source).await?;
        tokio::io::copy(&mut src, &mut dest).await?;
        dest.sync_all().await
    }
    .await;
    if copied.is_err() {
        let _ = fs::remove_file(target).await;
    }
    copied
}

/// Archive name for the given attempt: `name`, then `name_HHMMSS`, then
/// `name_HHMMSS_N`.
fn archive_candidate(dir: &Path, file_name: &str, now: DateTime<Local>, attempt: u32) -> PathBuf {
    if attempt == 0 {
        return dir.join(file_name);
    }

    let path = Path::new(file_name);
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| file_name.to_string());
    let ext = path
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();
    let stamp = now.format("%H%M%S");

    if attempt == 1 {
        dir.join(format!("{stem}_{stamp}{ext}"))
    } else {
        dir.join(format!("{stem}_{stamp}_{}{ext}", attempt - 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::fixtures::{write_fresh_file, write_stale_file};
    use tempfile::TempDir;

    const BODY: &str = "cdrRecordType,pkid,duration\n1,00000000-0000-0000-0000-000000000001,60\n1,00000000-0000-0000-0000-000000000002,30\n";

    fn manager(temp: &TempDir) -> FileStateManager {
        FileStateManager::new(FilesConfig::with_dirs(
            temp.path().join("in"),
            temp.path().join("archive"),
        ))
        .unwrap()
    }

    async fn layout(temp: &TempDir) -> FileStateManager {
        let m = manager(temp);
        m.ensure_layout().await.unwrap();
        m
    }

    async fn listing(dir: &Path) -> Vec<String> {
        let mut names = Vec::new();
        let mut entries = fs::read_dir(dir).await.unwrap();
        while let Some(e) = entries.next_entry().await.unwrap() {
            names.push(e.file_name().to_string_lossy().into_owned());
        }
        names.sort();
        names
    }

    #[test]
    fn test_invalid_pattern() {
        let config = FilesConfig {
            file_pattern: "(".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            FileStateManager::new(config),
            Err(FileStateError::InvalidPattern { .. })
        ));
    }

    #[tokio::test]
    async fn test_ensure_layout_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let m = manager(&temp);
        m.ensure_layout().await.unwrap();
        m.ensure_layout().await.unwrap();

        let now = Local::now();
        assert!(temp.path().join("in").is_dir());
        assert!(m.archive_month_dir(now).is_dir());
    }

    #[tokio::test]
    async fn test_state_of() {
        let temp = TempDir::new().unwrap();
        let m = manager(&temp);
        let src = temp.path().join("in");

        assert_eq!(m.state_of(&src.join("cdr_1")), Some(FileState::Available));
        assert_eq!(
            m.state_of(&src.join("cdr_1.processing")),
            Some(FileState::Locked)
        );
        assert_eq!(
            m.state_of(&temp.path().join("archive/2024/01/cdr_1")),
            Some(FileState::Archived)
        );
        assert_eq!(m.state_of(&src.join(".cdr_1")), None);
        assert_eq!(m.state_of(&src.join("cmr_1")), None);
        assert_eq!(m.state_of(&temp.path().join("cdr_1")), None);
    }

    #[tokio::test]
    async fn test_list_eligible_filters() {
        let temp = TempDir::new().unwrap();
        let m = layout(&temp).await;
        let src = temp.path().join("in");

        write_stale_file(&src.join("cdr_ready"), BODY);
        write_stale_file(&src.join("cdr_small"), "pkid\n1\n");
        write_fresh_file(&src.join("cdr_fresh"), BODY);
        write_stale_file(&src.join("cdr_taken.processing"), BODY);
        write_stale_file(&src.join(".cdr_hidden"), BODY);
        write_stale_file(&src.join("cmr_other"), BODY);
        std::fs::create_dir(src.join("cdr_dir")).unwrap();

        let eligible = m.list_eligible().await.unwrap();
        assert_eq!(eligible, vec![src.join("cdr_ready")]);
    }

    #[tokio::test]
    async fn test_list_eligible_missing_source_dir() {
        let temp = TempDir::new().unwrap();
        let m = manager(&temp);
        assert!(m.list_eligible().await.unwrap().is_empty());
    }

    #[test]
    fn test_is_ready_boundaries() {
        let temp = TempDir::new().unwrap();
        let m = manager(&temp);
        let now = SystemTime::now();

        assert!(m.is_ready(100, now - Duration::from_secs(60), now));
        assert!(!m.is_ready(99, now - Duration::from_secs(600), now));
        assert!(!m.is_ready(100, now - Duration::from_secs(59), now));
        // A modification time in the future is not stable.
        assert!(!m.is_ready(1000, now + Duration::from_secs(30), now));
    }

    #[tokio::test]
    async fn test_claim_then_release_restores_directory() {
        let temp = TempDir::new().unwrap();
        let m = layout(&temp).await;
        let src = temp.path().join("in");
        write_stale_file(&src.join("cdr_a"), BODY);
        write_stale_file(&src.join("cdr_b"), BODY);

        let before = listing(&src).await;
        let locked = m.claim(&src.join("cdr_a")).await.unwrap();
        assert_eq!(locked.path(), src.join("cdr_a.processing"));
        assert_eq!(m.state_of(locked.path()), Some(FileState::Locked));
        assert_eq!(m.list_eligible().await.unwrap(), vec![src.join("cdr_b")]);

        let restored = m.release(&locked).await.unwrap();
        assert_eq!(restored, src.join("cdr_a"));
        assert_eq!(listing(&src).await, before);
    }

    #[tokio::test]
    async fn test_second_claim_loses_race() {
        let temp = TempDir::new().unwrap();
        let m = layout(&temp).await;
        let path = temp.path().join("in/cdr_a");
        write_stale_file(&path, BODY);

        let other = m.clone();
        let (first, second) = tokio::join!(m.claim(&path), other.claim(&path));
        let results = [first, second];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        let err = results.into_iter().find_map(|r| r.err()).unwrap();
        assert!(matches!(err, FileStateError::ClaimFailed { .. }));
    }

    #[tokio::test]
    async fn test_claim_missing_file_is_lost_race() {
        let temp = TempDir::new().unwrap();
        let m = layout(&temp).await;
        let err = m.claim(&temp.path().join("in/cdr_gone")).await.unwrap_err();
        assert!(err.is_lost_race());
    }

    #[tokio::test]
    async fn test_release_conflict_keeps_lock() {
        let temp = TempDir::new().unwrap();
        let m = layout(&temp).await;
        let path = temp.path().join("in/cdr_a");
        write_stale_file(&path, BODY);

        let locked = m.claim(&path).await.unwrap();
        write_stale_file(&path, "replacement content that arrived meanwhile");

        let err = m.release(&locked).await.unwrap_err();
        assert!(matches!(err, FileStateError::ReleaseConflict { .. }));
        assert!(locked.path().exists());
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "replacement content that arrived meanwhile"
        );
    }

    #[tokio::test]
    async fn test_archive_moves_into_month_dir() {
        let temp = TempDir::new().unwrap();
        let m = layout(&temp).await;
        let path = temp.path().join("in/cdr_a");
        write_stale_file(&path, BODY);

        let locked = m.claim(&path).await.unwrap();
        let outcome = m.archive(&locked, 2).await.unwrap();

        let expected = m.archive_month_dir(Local::now()).join("cdr_a");
        assert_eq!(outcome, ArchiveOutcome::Archived(expected.clone()));
        assert_eq!(std::fs::read_to_string(expected).unwrap(), BODY);
        assert!(!locked.path().exists());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_archive_never_overwrites() {
        let temp = TempDir::new().unwrap();
        let m = layout(&temp).await;
        let path = temp.path().join("in/cdr_a");
        let month = m.archive_month_dir(Local::now());

        let mut archived = Vec::new();
        for body in ["first run", "second run", "third run"] {
            write_stale_file(&path, body);
            let locked = m.claim(&path).await.unwrap();
            match m.archive(&locked, 1).await.unwrap() {
                ArchiveOutcome::Archived(p) => archived.push(p),
                other => panic!("unexpected outcome {:?}", other),
            }
        }

        assert_eq!(archived[0], month.join("cdr_a"));
        assert_ne!(archived[1], archived[0]);
        assert_ne!(archived[2], archived[1]);
        assert_eq!(std::fs::read_to_string(&archived[0]).unwrap(), "first run");
        assert_eq!(std::fs::read_to_string(&archived[1]).unwrap(), "second run");
        assert_eq!(std::fs::read_to_string(&archived[2]).unwrap(), "third run");
    }

    #[tokio::test]
    async fn test_archive_failure_releases_file() {
        let temp = TempDir::new().unwrap();
        let m = layout(&temp).await;
        let path = temp.path().join("in/cdr_a");
        write_stale_file(&path, BODY);

        let locked = m.claim(&path).await.unwrap();
        // A plain file where the year directory belongs breaks the move.
        let archive_root = temp.path().join("archive");
        std::fs::remove_dir_all(&archive_root).unwrap();
        std::fs::write(&archive_root, "not a directory").unwrap();

        let outcome = m.archive(&locked, 2).await.unwrap();
        assert_eq!(outcome, ArchiveOutcome::Released(path.clone()));
        assert!(path.exists());
        assert!(!locked.path().exists());
    }

    #[test]
    fn test_archive_candidate_names() {
        let dir = Path::new("/archive/2026/10");
        let now = Local::now();
        let stamp = now.format("%H%M%S").to_string();

        assert_eq!(archive_candidate(dir, "cdr_a.csv", now, 0), dir.join("cdr_a.csv"));
        assert_eq!(
            archive_candidate(dir, "cdr_a.csv", now, 1),
            dir.join(format!("cdr_a_{stamp}.csv"))
        );
        assert_eq!(
            archive_candidate(dir, "cdr_a.csv", now, 2),
            dir.join(format!("cdr_a_{stamp}_1.csv"))
        );
        assert_eq!(
            archive_candidate(dir, "cdr_b", now, 3),
            dir.join(format!("cdr_b_{stamp}_2"))
        );
    }

    #[tokio::test]
    async fn test_place_new_never_replaces_existing_target() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("cdr_a.processing");
        let target = temp.path().join("cdr_a");
        std::fs::write(&source, "incoming").unwrap();
        std::fs::write(&target, "already archived").unwrap();

        let err = place_new(&source, &target).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::AlreadyExists);
        let err = copy_new(&source, &target).await.unwrap_err();
        assert_eq!(err.kind(), std::io::ErrorKind::AlreadyExists);

        assert_eq!(std::fs::read_to_string(&target).unwrap(), "already archived");
        assert_eq!(std::fs::read_to_string(&source).unwrap(), "incoming");
    }

    #[tokio::test]
    async fn test_copy_new_creates_target() {
        let temp = TempDir::new().unwrap();
        let source = temp.path().join("cdr_a.processing");
        let target = temp.path().join("cdr_a");
        std::fs::write(&source, "incoming").unwrap();

        copy_new(&source, &target).await.unwrap();
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "incoming");
        assert!(source.exists());
    }

    #[tokio::test]
    async fn test_stats_counts_each_state() {
        let temp = TempDir::new().unwrap();
        let m = layout(&temp).await;
        let src = temp.path().join("in");

        write_stale_file(&src.join("cdr_a"), BODY);
        write_stale_file(&src.join("cdr_b"), BODY);
        write_stale_file(&src.join("cdr_c"), BODY);
        write_stale_file(&src.join(".hidden"), BODY);
        m.claim(&src.join("cdr_b")).await.unwrap();
        let locked = m.claim(&src.join("cdr_c")).await.unwrap();
        m.archive(&locked, 1).await.unwrap();
        std::fs::create_dir_all(temp.path().join("archive/2020/01")).unwrap();
        std::fs::write(temp.path().join("archive/2020/01/cdr_old"), BODY).unwrap();

        let stats = m.stats().await;
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.locked, 1);
        assert_eq!(stats.archived, 2);
        assert_eq!(stats.source_dir, src);
    }
}
