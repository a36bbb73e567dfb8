//! In-memory directory from normalized Git location to Crucible repository
//! name.
//!
//! Readers always see one complete snapshot. A refresh builds the next
//! snapshot off to the side and installs it with a single pointer swap, so a
//! lookup never observes a half-built map and never waits on the network.

use crate::crucible::{RawRepository, RepositoryLister};
use crate::error::RefreshResult;
use crate::fetcher::fetch_all;
use crate::normalize::normalize;
use crate::telemetry::DirectoryTelemetry;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Summary of one successful refresh cycle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshReport {
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub pages_fetched: u32,
    pub repositories_fetched: usize,
    pub entries_installed: usize,
    pub skipped_without_location: usize,
    pub duplicate_locations: usize,
    pub generation: u64
}

/// One repository keyed by its normalized Git location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    pub identifier: String,
    pub normalized_location: String
}

impl DirectoryEntry {
    /// `None` for repositories without a Git location or whose location
    /// normalizes to nothing.
    pub fn from_repository<S: AsRef<str>>(repository: &RawRepository, host_aliases: &[S]) -> Option<Self> {
        let normalized_location = normalize(repository.git_location()?, host_aliases);
        if normalized_location.is_empty() {
            return None;
        }
        Some(Self {
            identifier: repository.name.clone(),
            normalized_location
        })
    }
}

/// Immutable view of the directory as of one refresh.
#[derive(Debug, Clone)]
pub struct Snapshot {
    entries: HashMap<String, String>,
    generation: u64,
    built_at: DateTime<Utc>,
    duplicate_locations: usize,
    skipped_without_location: usize
}

impl Snapshot {
    fn build<S: AsRef<str>>(repositories: &[RawRepository], host_aliases: &[S], generation: u64) -> Self {
        let mut snapshot = Self {
            entries: HashMap::with_capacity(repositories.len()),
            generation,
            built_at: Utc::now(),
            duplicate_locations: 0,
            skipped_without_location: 0
        };

        for repository in repositories {
            let Some(entry) = DirectoryEntry::from_repository(repository, host_aliases) else {
                snapshot.skipped_without_location += 1;
                continue;
            };

            if let Some(previous) = snapshot
                .entries
                .insert(entry.normalized_location.clone(), entry.identifier.clone())
            {
                snapshot.duplicate_locations += 1;
                warn!(
                    location = %entry.normalized_location,
                    previous = %previous,
                    replacement = %entry.identifier,
                    "Duplicate repository location, keeping the later entry"
                );
            }
        }

        snapshot
    }

    pub fn get(&self, location: &str) -> Option<&str> {
        self.entries.get(location).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn built_at(&self) -> DateTime<Utc> {
        self.built_at
    }

    pub fn duplicate_locations(&self) -> usize {
        self.duplicate_locations
    }
}

/// Cached mapping from normalized Git location to repository name.
pub struct RepositoryDirectory {
    lister: Arc<dyn RepositoryLister>,
    page_size: u32,
    host_aliases: Vec<String>,
    current: RwLock<Option<Arc<Snapshot>>>,
    refresh_lock: Mutex<()>
}

impl RepositoryDirectory {
    pub fn new(lister: Arc<dyn RepositoryLister>, page_size: u32, host_aliases: Vec<String>) -> Self {
        Self {
            lister,
            page_size: page_size.max(1),
            host_aliases,
            current: RwLock::new(None),
            refresh_lock: Mutex::new(())
        }
    }

    pub fn host_aliases(&self) -> &[String] {
        &self.host_aliases
    }

    /// Re-reads the full repository listing and swaps in a fresh snapshot.
    ///
    /// Concurrent calls are serialized: a second caller waits for the running
    /// refresh and then performs its own. On failure the previous snapshot
    /// stays installed untouched.
    pub async fn refresh(&self) -> RefreshResult<RefreshReport> {
        let _guard = self.refresh_lock.lock().await;

        let started_at = Utc::now();
        let timer = Instant::now();
        info!(page_size = self.page_size, "Refreshing repository directory");

        let fetched = match fetch_all(self.lister.as_ref(), self.page_size).await {
            Ok(fetched) => fetched,
            Err(e) => {
                DirectoryTelemetry::record_refresh_failure(timer.elapsed().as_secs_f64());
                error!(
                    error = %e,
                    url = %e.url(),
                    retryable = e.is_retryable(),
                    "Repository directory refresh failed, keeping previous snapshot"
                );
                return Err(e.into());
            }
        };

        let generation = self.generation() + 1;
        let snapshot = Arc::new(Snapshot::build(
            &fetched.repositories,
            self.host_aliases.as_slice(),
            generation
        ));

        let report = RefreshReport {
            started_at,
            completed_at: snapshot.built_at,
            pages_fetched: fetched.pages,
            repositories_fetched: fetched.repositories.len(),
            entries_installed: snapshot.len(),
            skipped_without_location: snapshot.skipped_without_location,
            duplicate_locations: snapshot.duplicate_locations,
            generation
        };

        *self.current.write() = Some(snapshot);

        DirectoryTelemetry::record_refresh_success(report.entries_installed, timer.elapsed().as_secs_f64());
        info!(
            generation = report.generation,
            pages = report.pages_fetched,
            entries = report.entries_installed,
            skipped = report.skipped_without_location,
            duplicates = report.duplicate_locations,
            "Repository directory refreshed"
        );

        Ok(report)
    }

    /// Returns the repository name registered for an already-normalized
    /// location.
    pub fn lookup(&self, normalized_location: &str) -> Option<String> {
        let name = self
            .snapshot()
            .and_then(|snapshot| snapshot.get(normalized_location).map(str::to_string));
        DirectoryTelemetry::record_lookup(name.is_some());
        name
    }

    /// Normalizes `raw_url` with this directory's host aliases, then looks it up.
    pub fn resolve(&self, raw_url: &str) -> Option<String> {
        self.lookup(&normalize(raw_url, self.host_aliases.as_slice()))
    }

    /// True once any refresh has succeeded, even one that installed zero
    /// entries.
    pub fn is_populated(&self) -> bool {
        self.current.read().is_some()
    }

    pub fn snapshot(&self) -> Option<Arc<Snapshot>> {
        self.current.read().clone()
    }

    pub fn len(&self) -> usize {
        self.current.read().as_ref().map_or(0, |snapshot| snapshot.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Generation of the installed snapshot, 0 before the first refresh.
    pub fn generation(&self) -> u64 {
        self.current.read().as_ref().map_or(0, |snapshot| snapshot.generation)
    }

    pub fn last_refreshed_at(&self) -> Option<DateTime<Utc>> {
        self.current.read().as_ref().map(|snapshot| snapshot.built_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crucible::{GitInformation, RepositoryPage};
    use crate::error::{FetchResult, RefreshError};
    use crate::test_support::{ScriptedLister, page, repo, server_error};
    use async_trait::async_trait;
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::Notify;

    fn directory(lister: Arc<ScriptedLister>) -> RepositoryDirectory {
        RepositoryDirectory::new(lister, 50, Vec::new())
    }

    #[tokio::test]
    async fn test_refresh_installs_normalized_entries() {
        let lister = Arc::new(ScriptedLister::new(vec![page(
            0,
            vec![
                repo("EXAMPLE", "git@example.com:jsmith/example.git"),
                repo("OTHER", "https://example.com/team/other"),
            ],
            true
        )]));
        let dir = directory(lister);

        let report = dir.refresh().await.unwrap();

        assert_eq!(report.entries_installed, 2);
        assert_eq!(report.generation, 1);
        assert_eq!(dir.lookup("example.com/jsmith/example").as_deref(), Some("EXAMPLE"));
        assert_eq!(dir.lookup("example.com/team/other").as_deref(), Some("OTHER"));
        assert_eq!(dir.lookup("example.com/nobody/else"), None);
    }

    #[tokio::test]
    async fn test_duplicate_locations_last_one_wins() {
        let lister = Arc::new(ScriptedLister::new(vec![
            page(
                0,
                vec![
                    repo("FIRST", "git@example.com:jsmith/example.git"),
                    repo("UNRELATED", "git@example.com:jsmith/unrelated.git"),
                ],
                false
            ),
            page(2, vec![repo("SECOND", "https://example.com/jsmith/example")], true),
        ]));
        let dir = directory(lister);

        let report = dir.refresh().await.unwrap();

        assert_eq!(report.duplicate_locations, 1);
        assert_eq!(report.entries_installed, 2);
        assert_eq!(dir.lookup("example.com/jsmith/example").as_deref(), Some("SECOND"));
    }

    #[tokio::test]
    async fn test_repositories_without_location_are_skipped() {
        let lister = Arc::new(ScriptedLister::new(vec![page(
            0,
            vec![
                RawRepository {
                    name: "SVN".to_string(),
                    git: None
                },
                RawRepository {
                    name: "BLANK".to_string(),
                    git: Some(GitInformation {
                        location: String::new()
                    })
                },
                repo("PREFIX-ONLY", "git@"),
                repo("REAL", "git@example.com:jsmith/real.git"),
            ],
            true
        )]));
        let dir = directory(lister);

        let report = dir.refresh().await.unwrap();

        assert_eq!(report.repositories_fetched, 4);
        assert_eq!(report.skipped_without_location, 3);
        assert_eq!(dir.len(), 1);
        assert_eq!(dir.lookup(""), None);
    }

    #[tokio::test]
    async fn test_lookup_before_refresh_is_absent() {
        let dir = directory(Arc::new(ScriptedLister::default()));

        assert!(!dir.is_populated());
        assert_eq!(dir.lookup("example.com/jsmith/example"), None);
        assert_eq!(dir.generation(), 0);
        assert!(dir.last_refreshed_at().is_none());
    }

    #[tokio::test]
    async fn test_empty_listing_still_populates() {
        let lister = Arc::new(ScriptedLister::new(vec![page(0, Vec::new(), true)]));
        let dir = directory(lister);

        dir.refresh().await.unwrap();

        assert!(dir.is_populated());
        assert!(dir.is_empty());
        assert!(dir.last_refreshed_at().is_some());
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let lister = Arc::new(ScriptedLister::new(vec![page(
            0,
            vec![repo("EXAMPLE", "git@example.com:jsmith/example.git")],
            true
        )]));
        let dir = directory(lister.clone());
        dir.refresh().await.unwrap();
        let before = dir.snapshot().unwrap();

        lister.push(vec![
            page(0, vec![repo("NEW", "git@example.com:jsmith/new.git")], false),
            server_error(1),
        ]);
        let err = dir.refresh().await.unwrap_err();

        assert!(matches!(err, RefreshError::Fetch(_)));
        assert!(dir.is_populated());
        assert!(Arc::ptr_eq(&before, &dir.snapshot().unwrap()));
        assert_eq!(dir.lookup("example.com/jsmith/example").as_deref(), Some("EXAMPLE"));
        assert_eq!(dir.lookup("example.com/jsmith/new"), None);
    }

    #[tokio::test]
    async fn test_failed_first_refresh_leaves_directory_unpopulated() {
        let lister = Arc::new(ScriptedLister::new(vec![server_error(0)]));
        let dir = directory(lister);

        assert!(dir.refresh().await.is_err());
        assert!(!dir.is_populated());
    }

    #[tokio::test]
    async fn test_refresh_replaces_rather_than_merges() {
        let lister = Arc::new(ScriptedLister::new(vec![page(
            0,
            vec![repo("OLD", "git@example.com:jsmith/old.git")],
            true
        )]));
        let dir = directory(lister.clone());
        dir.refresh().await.unwrap();

        lister.push(vec![page(0, vec![repo("NEW", "git@example.com:jsmith/new.git")], true)]);
        let report = dir.refresh().await.unwrap();

        assert_eq!(report.generation, 2);
        assert_eq!(dir.lookup("example.com/jsmith/old"), None);
        assert_eq!(dir.lookup("example.com/jsmith/new").as_deref(), Some("NEW"));
    }

    #[tokio::test]
    async fn test_resolve_applies_host_aliases() {
        let lister = Arc::new(ScriptedLister::new(vec![page(
            0,
            vec![repo("EXAMPLE", "ssh://git@altssh.example.com:443/jsmith/example")],
            true
        )]));
        let dir = RepositoryDirectory::new(
            lister,
            50,
            vec!["example.com".to_string(), "altssh.example.com:443".to_string()]
        );
        dir.refresh().await.unwrap();

        assert_eq!(
            dir.resolve("https://example.com/jsmith/example").as_deref(),
            Some("EXAMPLE")
        );
    }

    /// Blocks inside the fetch until released, counting overlapping fetches.
    struct GatedLister {
        release: Notify,
        entered: Notify,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        name: parking_lot::Mutex<&'static str>
    }

    impl GatedLister {
        fn new(name: &'static str) -> Self {
            Self {
                release: Notify::new(),
                entered: Notify::new(),
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                name: parking_lot::Mutex::new(name)
            }
        }
    }

    #[async_trait]
    impl RepositoryLister for GatedLister {
        async fn list_page(&self, start: u32, _limit: u32) -> FetchResult<RepositoryPage> {
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);
            self.entered.notify_one();
            self.release.notified().await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let name = *self.name.lock();
            page(start, vec![repo(name, "git@example.com:jsmith/example.git")], true)
        }

        fn page_url(&self, start: u32, limit: u32) -> String {
            format!("mock://gated?start={start}&limit={limit}")
        }
    }

    #[tokio::test]
    async fn test_lookups_are_served_while_refresh_is_in_flight() {
        let lister = Arc::new(GatedLister::new("OLD"));
        let dir = Arc::new(RepositoryDirectory::new(lister.clone(), 10, Vec::new()));

        let first = tokio::spawn({
            let dir = dir.clone();
            async move { dir.refresh().await }
        });
        lister.entered.notified().await;
        lister.release.notify_one();
        first.await.unwrap().unwrap();

        *lister.name.lock() = "NEW";
        let second = tokio::spawn({
            let dir = dir.clone();
            async move { dir.refresh().await }
        });
        lister.entered.notified().await;

        assert_eq!(dir.lookup("example.com/jsmith/example").as_deref(), Some("OLD"));

        lister.release.notify_one();
        second.await.unwrap().unwrap();
        assert_eq!(dir.lookup("example.com/jsmith/example").as_deref(), Some("NEW"));
    }

    #[tokio::test]
    async fn test_concurrent_refreshes_do_not_overlap() {
        let lister = Arc::new(GatedLister::new("EXAMPLE"));
        let dir = Arc::new(RepositoryDirectory::new(lister.clone(), 10, Vec::new()));

        let a = tokio::spawn({
            let dir = dir.clone();
            async move { dir.refresh().await }
        });
        let b = tokio::spawn({
            let dir = dir.clone();
            async move { dir.refresh().await }
        });

        for _ in 0..2 {
            lister.entered.notified().await;
            tokio::time::sleep(Duration::from_millis(20)).await;
            lister.release.notify_one();
        }

        let a = a.await.unwrap().unwrap();
        let b = b.await.unwrap().unwrap();

        assert_eq!(lister.max_in_flight.load(Ordering::SeqCst), 1);
        let generations: HashSet<u64> = [a.generation, b.generation].into_iter().collect();
        assert_eq!(generations, HashSet::from([1, 2]));
        assert_eq!(dir.generation(), 2);
    }

    /// Alternates between two complete listings that map the same keys to
    /// different names.
    struct AlternatingLister {
        flip: AtomicBool
    }

    const KEY_COUNT: usize = 64;

    #[async_trait]
    impl RepositoryLister for AlternatingLister {
        async fn list_page(&self, start: u32, _limit: u32) -> FetchResult<RepositoryPage> {
            let name = if self.flip.fetch_xor(true, Ordering::SeqCst) { "A" } else { "B" };
            let values = (0..KEY_COUNT)
                .map(|i| repo(name, &format!("git@example.com:group/repo-{i}.git")))
                .collect();
            tokio::task::yield_now().await;
            page(start, values, true)
        }

        fn page_url(&self, start: u32, limit: u32) -> String {
            format!("mock://alternating?start={start}&limit={limit}")
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_readers_never_observe_a_mixed_snapshot() {
        let lister = Arc::new(AlternatingLister {
            flip: AtomicBool::new(false)
        });
        let dir = Arc::new(RepositoryDirectory::new(lister, 100, Vec::new()));
        dir.refresh().await.unwrap();

        let writer = tokio::spawn({
            let dir = dir.clone();
            async move {
                for _ in 0..50 {
                    dir.refresh().await.unwrap();
                }
            }
        });

        let readers: Vec<_> = (0..4)
            .map(|_| {
                let dir = dir.clone();
                tokio::spawn(async move {
                    for _ in 0..200 {
                        let snapshot = dir.snapshot().unwrap();
                        let names: HashSet<&str> = (0..KEY_COUNT)
                            .map(|i| snapshot.get(&format!("example.com/group/repo-{i}")).unwrap())
                            .collect();
                        assert_eq!(names.len(), 1, "snapshot mixes generations");
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();

        writer.await.unwrap();
        for reader in readers {
            reader.await.unwrap();
        }
        assert_eq!(dir.generation(), 51);
    }
}
