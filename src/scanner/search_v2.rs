use std::sync::Arc;

use chrono::{DateTime, Days, Local, TimeZone, Utc};
use tokio_util::sync::CancellationToken;

use super::ScanSink;
use crate::filesystem::{DriveSearchParams, FileCategory, FileSystem, LocalSearchParams};
use crate::{Entry, Result, ScanConfig, ScanError};

/// Where a search looks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SearchLocation {
    /// Local files and Drive.
    #[default]
    Everywhere,
    /// Local files only.
    ThisChromebook,
    /// The current folder, on whichever backend it lives.
    ThisFolder,
}

/// How recently a result must have been modified.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SearchRecency {
    #[default]
    Anytime,
    Today,
    Yesterday,
    LastWeek,
    LastMonth,
    LastYear,
}

/// The earliest modification time accepted for `recency`, anchored at local
/// midnight of `now`'s day. `None` means no cutoff.
///
/// # Examples
///
/// ```
/// use chrono::{FixedOffset, TimeZone};
/// use dircontents::scanner::{earliest_timestamp, SearchRecency};
///
/// let tz = FixedOffset::east_opt(0).unwrap();
/// let now = tz.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap();
/// let cutoff = earliest_timestamp(SearchRecency::LastWeek, &now).unwrap();
/// assert_eq!(cutoff, tz.with_ymd_and_hms(2024, 1, 9, 0, 0, 0).unwrap());
/// ```
pub fn earliest_timestamp<Tz: TimeZone>(recency: SearchRecency, now: &DateTime<Tz>) -> Option<DateTime<Tz>> {
    let days_back = match recency {
        SearchRecency::Anytime => return None,
        SearchRecency::Today => 0,
        SearchRecency::Yesterday => 1,
        SearchRecency::LastWeek => 6,
        SearchRecency::LastMonth => 30,
        SearchRecency::LastYear => 365,
    };
    now.date_naive()
        .checked_sub_days(Days::new(days_back))?
        .and_hms_opt(0, 0, 0)?
        .and_local_timezone(now.timezone())
        .earliest()
}

/// Aggregated search over local files and Drive.
///
/// The backends to query follow from the location and the root type of the
/// current directory. Both queries run concurrently and are settled together:
/// every successful result is forwarded, every failure is reported, and the
/// scan then succeeds once.
pub struct SearchV2ContentScanner<F: FileSystem> {
    filesystem: Arc<F>,
    directory: Entry,
    local_root: Entry,
    query: String,
    location: SearchLocation,
    recency: SearchRecency,
    category: FileCategory,
    local_max_results: usize,
    drive_max_results: usize,
    pub(crate) token: CancellationToken,
}

impl<F: FileSystem> SearchV2ContentScanner<F> {
    /// Create a search for `query` from `directory`. `local_root` is the root
    /// searched when the whole device is in scope.
    pub fn new(
        filesystem: Arc<F>,
        directory: Entry,
        local_root: Entry,
        query: impl Into<String>,
        token: CancellationToken,
    ) -> Self {
        let config = ScanConfig::default();
        Self {
            filesystem,
            directory,
            local_root,
            query: query.into(),
            location: SearchLocation::default(),
            recency: SearchRecency::default(),
            category: FileCategory::default(),
            local_max_results: config.local_search_max_results,
            drive_max_results: config.drive_max_results,
            token,
        }
    }

    /// Apply the result caps from `config`.
    #[must_use]
    pub fn with_config(mut self, config: &ScanConfig) -> Self {
        self.local_max_results = config.local_search_max_results;
        self.drive_max_results = config.drive_max_results;
        self
    }

    #[must_use]
    pub fn location(mut self, location: SearchLocation) -> Self {
        self.location = location;
        self
    }

    #[must_use]
    pub fn recency(mut self, recency: SearchRecency) -> Self {
        self.recency = recency;
        self
    }

    #[must_use]
    pub fn category(mut self, category: FileCategory) -> Self {
        self.category = category;
        self
    }

    /// Returns `true` when the current directory is the root of its volume,
    /// in which case Drive results are not narrowed to the folder.
    #[must_use]
    pub fn is_searching_root(&self) -> bool {
        self.directory.is_root()
    }

    /// The local root to search, and whether Drive is searched.
    fn plan(&self) -> (Option<&Entry>, bool) {
        let in_drive = self.directory.root_type().is_some_and(|root| root.is_drive());
        match self.location {
            SearchLocation::Everywhere => (Some(&self.local_root), true),
            SearchLocation::ThisChromebook => (Some(&self.local_root), false),
            SearchLocation::ThisFolder if in_drive => (None, true),
            SearchLocation::ThisFolder => (Some(&self.directory), false),
        }
    }

    pub(crate) async fn scan(&self, sink: &ScanSink) {
        let modified_after = earliest_timestamp(self.recency, &Local::now()).map(|cutoff| cutoff.with_timezone(&Utc));
        let (local_root, search_drive) = self.plan();
        tracing::debug!(
            query = %self.query,
            location = ?self.location,
            local = local_root.is_some(),
            drive = search_drive,
            "starting search"
        );

        let local = async {
            match local_root {
                Some(root) => Some(self.search_local(root, modified_after).await),
                None => None,
            }
        };
        let drive = async {
            if search_drive {
                Some(self.search_drive(modified_after).await)
            } else {
                None
            }
        };

        let settled = tokio::select! {
            biased;
            () = self.token.cancelled() => None,
            settled = async { tokio::join!(local, drive) } => Some(settled),
        };
        let Some((local, drive)) = settled.filter(|_| !self.token.is_cancelled()) else {
            sink.error(ScanError::Abort);
            return;
        };

        // Entries first: the first rejection settles the scan downstream.
        let (fulfilled, rejected): (Vec<_>, Vec<_>) = [local, drive].into_iter().flatten().partition(Result::is_ok);
        for entries in fulfilled.into_iter().flatten() {
            sink.entries(entries);
        }
        for error in rejected.into_iter().filter_map(Result::err) {
            tracing::warn!("search backend failed: {}", error);
            sink.error(error);
        }
        sink.success();
    }

    async fn search_local(&self, root: &Entry, modified_after: Option<DateTime<Utc>>) -> Result<Vec<Entry>> {
        let mut entries = self
            .filesystem
            .search_files(LocalSearchParams {
                root: root.clone(),
                query: self.query.clone(),
                category: self.category,
                modified_after,
                max_results: self.local_max_results,
            })
            .await?;
        entries.truncate(self.local_max_results);
        Ok(entries)
    }

    async fn search_drive(&self, modified_after: Option<DateTime<Utc>>) -> Result<Vec<Entry>> {
        let page = self
            .filesystem
            .search_drive(DriveSearchParams {
                query: self.query.clone(),
                category: self.category,
                cursor: None,
                modified_after,
            })
            .await?;

        let scoped = self.location == SearchLocation::ThisFolder && !self.is_searching_root();
        let prefix = format!("{}/", self.directory.full_path().trim_end_matches('/'));
        Ok(page
            .entries
            .into_iter()
            .filter(|entry| !scoped || entry.full_path().starts_with(&prefix))
            .take(self.drive_max_results)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::{collect, ScanMessage};
    use crate::{MemoryFileSystem, RootType};
    use chrono::{FixedOffset, NaiveDate};

    fn at(tz: FixedOffset, y: i32, m: u32, d: u32, h: u32) -> DateTime<FixedOffset> {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, 0, 0)
            .unwrap()
            .and_local_timezone(tz)
            .unwrap()
    }

    #[test]
    fn recency_cutoffs_start_at_local_midnight() {
        let tz = FixedOffset::east_opt(-5 * 3600).unwrap();
        let now = at(tz, 2024, 1, 15, 9);

        assert_eq!(earliest_timestamp(SearchRecency::Today, &now), Some(at(tz, 2024, 1, 15, 0)));
        assert_eq!(earliest_timestamp(SearchRecency::Yesterday, &now), Some(at(tz, 2024, 1, 14, 0)));
        assert_eq!(earliest_timestamp(SearchRecency::LastWeek, &now), Some(at(tz, 2024, 1, 9, 0)));
        assert_eq!(earliest_timestamp(SearchRecency::LastMonth, &now), Some(at(tz, 2023, 12, 16, 0)));
        assert_eq!(earliest_timestamp(SearchRecency::LastYear, &now), Some(at(tz, 2023, 1, 15, 0)));
        assert_eq!(earliest_timestamp(SearchRecency::Anytime, &now), None);
    }

    fn my_files() -> Entry {
        Entry::directory("filesystem:myfiles", "/").with_volume("myfiles", RootType::MyFiles)
    }

    fn drive_folder(path: &str) -> Entry {
        Entry::directory("filesystem:drive", path).with_volume("drive", RootType::Drive)
    }

    #[tokio::test]
    async fn settles_all_backends_before_succeeding() {
        let fs = Arc::new(MemoryFileSystem::new());
        let root = my_files();
        fs.set_local_search_results(Ok(vec![root.child("a.txt", false), root.child("b.txt", false)]));
        fs.set_drive_results(Err(ScanError::NotReadable("drive offline".to_owned())));

        let scanner = SearchV2ContentScanner::new(fs, root.clone(), root, "txt", CancellationToken::new());
        let (sink, rx) = ScanSink::channel();
        scanner.scan(&sink).await;
        drop(sink);
        let messages = collect(rx).await;

        assert_eq!(messages.len(), 3);
        assert!(matches!(&messages[0], ScanMessage::Entries(entries) if entries.len() == 2));
        assert!(matches!(&messages[1], ScanMessage::Error(ScanError::NotReadable(_))));
        assert!(matches!(messages[2], ScanMessage::Success));
    }

    #[tokio::test]
    async fn this_folder_in_drive_only_queries_drive_within_folder() {
        let fs = Arc::new(MemoryFileSystem::new());
        let folder = drive_folder("/root/Work");
        fs.set_drive_results(Ok(vec![
            Entry::file("filesystem:drive", "/root/Work/plan.doc"),
            Entry::file("filesystem:drive", "/root/Home/plan.doc"),
        ]));

        let scanner = SearchV2ContentScanner::new(fs.clone(), folder, my_files(), "plan", CancellationToken::new())
            .location(SearchLocation::ThisFolder)
            .recency(SearchRecency::Today);
        assert!(!scanner.is_searching_root());

        let (sink, rx) = ScanSink::channel();
        scanner.scan(&sink).await;
        drop(sink);
        let messages = collect(rx).await;

        assert!(fs.local_queries().is_empty());
        assert!(fs.drive_queries()[0].modified_after.is_some());
        assert!(matches!(&messages[0], ScanMessage::Entries(entries)
            if entries.len() == 1 && entries[0].full_path() == "/root/Work/plan.doc"));
        assert!(matches!(messages[1], ScanMessage::Success));
    }

    #[tokio::test]
    async fn this_chromebook_skips_drive() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.set_local_search_results(Ok(Vec::new()));

        let scanner = SearchV2ContentScanner::new(fs.clone(), drive_folder("/root"), my_files(), "x", CancellationToken::new())
            .location(SearchLocation::ThisChromebook)
            .category(FileCategory::Image);
        let (sink, rx) = ScanSink::channel();
        scanner.scan(&sink).await;
        drop(sink);

        assert!(fs.drive_queries().is_empty());
        assert_eq!(fs.local_queries()[0].root, my_files());
        assert_eq!(fs.local_queries()[0].category, FileCategory::Image);
        let messages = collect(rx).await;
        assert_eq!(messages.len(), 1);
        assert!(matches!(messages[0], ScanMessage::Success));
    }

    #[tokio::test]
    async fn result_caps_come_from_the_config() {
        let fs = Arc::new(MemoryFileSystem::new());
        let root = my_files();
        fs.set_local_search_results(Ok((0..5).map(|i| root.child(&format!("l{i}"), false)).collect()));
        fs.set_drive_results(Ok((0..5).map(|i| Entry::file("filesystem:drive", &format!("/root/d{i}"))).collect()));
        let config = ScanConfig {
            local_search_max_results: 2,
            drive_max_results: 3,
            ..ScanConfig::default()
        };

        let scanner = SearchV2ContentScanner::new(fs.clone(), root.clone(), root, "", CancellationToken::new())
            .with_config(&config);
        let (sink, rx) = ScanSink::channel();
        scanner.scan(&sink).await;
        drop(sink);
        let messages = collect(rx).await;

        assert_eq!(fs.local_queries()[0].max_results, 2);
        assert!(matches!(&messages[0], ScanMessage::Entries(entries) if entries.len() == 2));
        assert!(matches!(&messages[1], ScanMessage::Entries(entries) if entries.len() == 3));
        assert!(matches!(messages[2], ScanMessage::Success));
    }

    #[tokio::test]
    async fn cancelled_search_only_reports_abort() {
        let fs = Arc::new(MemoryFileSystem::new());
        fs.set_local_search_results(Ok(vec![my_files().child("a", false)]));
        fs.set_drive_results(Ok(Vec::new()));
        let token = CancellationToken::new();
        token.cancel();

        let scanner = SearchV2ContentScanner::new(fs, my_files(), my_files(), "a", token);
        let (sink, rx) = ScanSink::channel();
        scanner.scan(&sink).await;
        drop(sink);
        let messages = collect(rx).await;

        assert_eq!(messages.len(), 1);
        assert!(matches!(messages[0], ScanMessage::Error(ScanError::Abort)));
    }
}
