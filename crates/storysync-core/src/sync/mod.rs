//! Offline-first synchronization coordinator.
//!
//! A sync pass runs three phases strictly in order and never in parallel:
//!
//! 1. **Push** every pending local record (`synced = false`, `deleted = false`)
//!    to the remote service, one at a time. A failing record is left as-is and
//!    the loop moves on; the next pass retries it.
//! 2. **Pull** the remote canonical list.
//! 3. **Merge** remote records with pending local records into the visible
//!    set, dropping every tombstoned id, and write the pulled records through
//!    to the local store. Synced local copies the pulled list no longer
//!    contains are dropped, so the local view converges on the merged set.

use std::collections::HashSet;

use crate::db::StoryStore;
use crate::error::Result;
use crate::media::{prepare_upload_photo, PhotoPreparation, ResizeOptions, UPLOAD_SIZE_THRESHOLD};
use crate::models::{Story, StoryDraft, StoryId};
use crate::remote::{Credential, StoryService, StoryUpload};

/// What happens to tombstones once the remote no longer lists their id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum TombstonePolicy {
    /// Keep every tombstone forever.
    #[default]
    Retain,
    /// Physically remove a tombstone during merge when the pulled list no
    /// longer contains its id.
    PurgeConfirmed,
}

/// Tuning knobs for the coordinator.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SyncOptions {
    /// Photos larger than this are resized before upload.
    pub upload_threshold: usize,
    pub resize: ResizeOptions,
    pub tombstones: TombstonePolicy,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            upload_threshold: UPLOAD_SIZE_THRESHOLD,
            resize: ResizeOptions::default(),
            tombstones: TombstonePolicy::Retain,
        }
    }
}

/// A pending record the push phase could not transmit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushFailure {
    pub id: StoryId,
    pub error: String,
    pub auth_rejected: bool,
}

/// Result of a complete sync pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SyncReport {
    /// Tombstone-filtered, de-duplicated records to display.
    pub visible: Vec<Story>,
    /// Records whose push succeeded during this pass.
    pub pushed: Vec<StoryId>,
    /// Records that stay pending.
    pub failed: Vec<PushFailure>,
    /// Records submitted without their photo because preprocessing failed.
    pub dropped_photos: Vec<StoryId>,
    /// Tombstones removed under [`TombstonePolicy::PurgeConfirmed`].
    pub purged: Vec<StoryId>,
    /// Synced local copies removed because the remote no longer lists them,
    /// e.g. a pushed story still stored under its client id.
    pub superseded: Vec<StoryId>,
    /// The remote rejected the credential at least once while pushing.
    pub needs_reauth: bool,
}

/// How [`SyncCoordinator::submit_story`] handled a new story.
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Accepted by the remote service; nothing was queued.
    Published { photo_dropped: bool },
    /// Remote submission failed; the story waits in the local queue.
    Queued {
        story: Story,
        reason: String,
        visible: Vec<Story>,
    },
}

/// Reconciles the local record store with the remote story service.
pub struct SyncCoordinator<S, R> {
    store: S,
    remote: R,
    options: SyncOptions,
}

impl<S: StoryStore, R: StoryService> SyncCoordinator<S, R> {
    pub fn new(store: S, remote: R) -> Self {
        Self::with_options(store, remote, SyncOptions::default())
    }

    pub const fn with_options(store: S, remote: R, options: SyncOptions) -> Self {
        Self {
            store,
            remote,
            options,
        }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn remote(&self) -> &R {
        &self.remote
    }

    /// Visible set computed from the local store alone.
    pub async fn local_view(&self) -> Result<Vec<Story>> {
        Ok(self
            .store
            .get_all()
            .await?
            .into_iter()
            .filter(Story::is_visible)
            .collect())
    }

    /// Run push, pull and merge in order.
    ///
    /// Push failures are isolated per record and reported; a pull or merge
    /// failure aborts the pass with a single error.
    pub async fn sync(&self, credential: &Credential) -> Result<SyncReport> {
        let mut report = SyncReport::default();

        self.push_pending(credential, &mut report).await?;

        tracing::debug!("Pulling remote stories");
        let remote = self.remote.list_stories(credential).await?;

        // Re-read so pushes persisted above are observed by the merge.
        let local = self.store.get_all().await?;
        report.visible = merge_visible(&remote, &local);
        self.write_through(&remote, &local).await?;
        report.superseded = self.drop_superseded(&remote, &local).await?;

        if self.options.tombstones == TombstonePolicy::PurgeConfirmed {
            report.purged = self.purge_confirmed(&remote, &local).await?;
        }

        tracing::info!(
            "Sync finished: {} visible, {} pushed, {} failed",
            report.visible.len(),
            report.pushed.len(),
            report.failed.len()
        );
        Ok(report)
    }

    async fn push_pending(&self, credential: &Credential, report: &mut SyncReport) -> Result<()> {
        let pending = self
            .store
            .get_all()
            .await?
            .into_iter()
            .filter(Story::is_pending)
            .collect::<Vec<_>>();
        tracing::debug!("Pushing {} pending stories", pending.len());

        for mut story in pending {
            let (upload, photo_dropped) = self.build_upload(&story);
            if let Err(error) = self.remote.create_story(credential, &upload).await {
                tracing::warn!("Failed to push story {}: {}", story.id, error);
                report.needs_reauth |= error.is_auth();
                report.failed.push(PushFailure {
                    id: story.id,
                    auth_rejected: error.is_auth(),
                    error: error.to_string(),
                });
                continue;
            }

            if photo_dropped {
                report.dropped_photos.push(story.id.clone());
            }

            story.synced = true;
            if let Err(error) = self.store.put(&story).await {
                tracing::warn!("Pushed story {} but failed to persist it: {}", story.id, error);
                report.failed.push(PushFailure {
                    id: story.id,
                    auth_rejected: false,
                    error: error.to_string(),
                });
                continue;
            }
            report.pushed.push(story.id);
        }

        Ok(())
    }

    fn build_upload(&self, story: &Story) -> (StoryUpload, bool) {
        let preparation = prepare_upload_photo(
            story.photo.as_ref(),
            self.options.upload_threshold,
            self.options.resize,
        );
        let (photo, dropped) = match preparation {
            PhotoPreparation::Skip => (None, false),
            PhotoPreparation::Attach { photo, resized } => {
                if resized {
                    tracing::debug!("Resized photo for story {}", story.id);
                }
                (Some(photo), false)
            }
            PhotoPreparation::Dropped { reason } => {
                // Submitting without the photo keeps description and location syncing.
                tracing::warn!("Submitting story {} without photo: {}", story.id, reason);
                (None, true)
            }
        };

        let upload = StoryUpload {
            description: story.description_or_empty().to_string(),
            location: story.location,
            photo,
        };
        (upload, dropped)
    }

    async fn write_through(&self, remote: &[Story], local: &[Story]) -> Result<()> {
        let protected = local
            .iter()
            .filter(|story| story.deleted || story.is_pending())
            .map(|story| &story.id)
            .collect::<HashSet<_>>();

        for story in remote.iter().filter(|story| !protected.contains(&story.id)) {
            self.store.put(story).await?;
        }
        Ok(())
    }

    /// Remove synced, non-tombstoned records absent from the pulled list.
    ///
    /// The server assigns its own id on create, so after a push the client-id
    /// copy is only a stale duplicate of the pulled server copy.
    async fn drop_superseded(&self, remote: &[Story], local: &[Story]) -> Result<Vec<StoryId>> {
        let remote_ids = remote.iter().map(|story| &story.id).collect::<HashSet<_>>();
        let mut superseded = Vec::new();

        for stale in local
            .iter()
            .filter(|story| story.synced && !story.deleted && !remote_ids.contains(&story.id))
        {
            if self.store.remove_local(&stale.id).await? {
                tracing::debug!("Dropped superseded local copy {}", stale.id);
                superseded.push(stale.id.clone());
            }
        }
        Ok(superseded)
    }

    async fn purge_confirmed(&self, remote: &[Story], local: &[Story]) -> Result<Vec<StoryId>> {
        let remote_ids = remote.iter().map(|story| &story.id).collect::<HashSet<_>>();
        let mut purged = Vec::new();

        for tombstone in local
            .iter()
            .filter(|story| story.deleted && !remote_ids.contains(&story.id))
        {
            if self.store.remove_local(&tombstone.id).await? {
                tracing::debug!("Purged tombstone {}", tombstone.id);
                purged.push(tombstone.id.clone());
            }
        }
        Ok(purged)
    }

    /// Queue a new story locally (`synced = false`) and return the local view.
    pub async fn add_story(&self, draft: StoryDraft) -> Result<(Story, Vec<Story>)> {
        let story = Story::from_draft(draft);
        self.store.put(&story).await?;
        tracing::debug!("Queued story {} for the next sync", story.id);
        let visible = self.local_view().await?;
        Ok((story, visible))
    }

    /// Try to publish a new story right away, queueing it locally on failure.
    pub async fn submit_story(
        &self,
        credential: &Credential,
        draft: StoryDraft,
    ) -> Result<SubmitOutcome> {
        let pending = Story::from_draft(draft);
        let (upload, photo_dropped) = self.build_upload(&pending);

        match self.remote.create_story(credential, &upload).await {
            Ok(()) => Ok(SubmitOutcome::Published { photo_dropped }),
            Err(error) => {
                tracing::warn!("Remote submission failed, saving locally: {}", error);
                self.store.put(&pending).await?;
                let visible = self.local_view().await?;
                Ok(SubmitOutcome::Queued {
                    story: pending,
                    reason: error.to_string(),
                    visible,
                })
            }
        }
    }

    /// Tombstone a story, attempt the remote delete, and return the local view.
    ///
    /// The remote delete is best-effort: its failure is logged and ignored.
    pub async fn delete_story(&self, credential: &Credential, id: &StoryId) -> Result<Vec<Story>> {
        let tombstone = match self.store.get_by_id(id).await? {
            Some(mut story) => {
                story.deleted = true;
                story
            }
            None => Story::tombstone(id.clone()),
        };
        self.store.put(&tombstone).await?;

        if let Err(error) = self.remote.delete_story(credential, id).await {
            tracing::warn!("Failed to delete story {} remotely: {}", id, error);
        }

        self.local_view().await
    }
}

/// Merge pulled records with local state into the visible set.
///
/// Remote order is kept; a pending local record with the same id replaces the
/// remote entry in place. Remaining pending records are appended.
pub fn merge_visible(remote: &[Story], local: &[Story]) -> Vec<Story> {
    let tombstoned = local
        .iter()
        .filter(|story| story.deleted)
        .map(|story| &story.id)
        .collect::<HashSet<_>>();
    let pending = local.iter().filter(|story| story.is_pending()).collect::<Vec<_>>();

    let mut seen = HashSet::new();
    let mut visible = Vec::with_capacity(remote.len() + pending.len());

    for story in remote {
        if tombstoned.contains(&story.id) || !seen.insert(story.id.clone()) {
            continue;
        }
        let chosen = pending
            .iter()
            .find(|local| local.id == story.id)
            .map_or(story, |local| *local);
        visible.push(chosen.clone());
    }

    for story in pending {
        if seen.insert(story.id.clone()) {
            visible.push(story.clone());
        }
    }

    visible
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Database, LibSqlStoryRepository, MemoryStoryStore};
    use crate::error::Error;
    use crate::models::Photo;
    use pretty_assertions::assert_eq;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct FakeRemote {
        stories: Mutex<Vec<Story>>,
        uploads: Mutex<Vec<StoryUpload>>,
        deletes: Mutex<Vec<StoryId>>,
        create_offline: AtomicBool,
        list_offline: AtomicBool,
        delete_offline: AtomicBool,
        reject_credential: AtomicBool,
        fail_description: Mutex<Option<String>>,
        next_id: AtomicU32,
    }

    impl FakeRemote {
        fn with_stories(stories: Vec<Story>) -> Self {
            Self {
                stories: Mutex::new(stories),
                ..Self::default()
            }
        }
    }

    impl StoryService for FakeRemote {
        async fn list_stories(&self, _credential: &Credential) -> Result<Vec<Story>> {
            if self.list_offline.load(Ordering::SeqCst) {
                return Err(Error::Network("connection refused".into()));
            }
            Ok(self.stories.lock().unwrap().clone())
        }

        async fn create_story(&self, _credential: &Credential, upload: &StoryUpload) -> Result<()> {
            if self.create_offline.load(Ordering::SeqCst) {
                return Err(Error::Network("connection refused".into()));
            }
            if self.reject_credential.load(Ordering::SeqCst) {
                return Err(Error::Auth("token expired (401)".into()));
            }
            if self.fail_description.lock().unwrap().as_deref() == Some(upload.description.as_str())
            {
                return Err(Error::Server {
                    status: 400,
                    body: "rejected (400)".into(),
                });
            }

            let n = self.next_id.fetch_add(1, Ordering::SeqCst);
            self.uploads.lock().unwrap().push(upload.clone());
            self.stories.lock().unwrap().push(Story {
                id: format!("server-{n}").into(),
                description: Some(upload.description.clone()),
                location: upload.location,
                photo: upload.photo.as_ref().map(|_| Photo::Remote {
                    url: format!("https://cdn.example.com/{n}.jpg"),
                }),
                created_at: 1_000 + i64::from(n),
                synced: true,
                deleted: false,
            });
            Ok(())
        }

        async fn delete_story(&self, _credential: &Credential, id: &StoryId) -> Result<()> {
            if self.delete_offline.load(Ordering::SeqCst) {
                return Err(Error::Network("connection refused".into()));
            }
            self.deletes.lock().unwrap().push(id.clone());
            self.stories.lock().unwrap().retain(|story| &story.id != id);
            Ok(())
        }
    }

    /// Store whose writes fail (every id, or only `only`); reads pass through.
    struct FailingStore {
        inner: MemoryStoryStore,
        only: Option<StoryId>,
    }

    impl FailingStore {
        fn failing() -> Self {
            Self {
                inner: MemoryStoryStore::new(),
                only: None,
            }
        }

        fn failing_for(id: &str) -> Self {
            Self {
                only: Some(id.into()),
                ..Self::failing()
            }
        }
    }

    impl StoryStore for FailingStore {
        async fn put(&self, story: &Story) -> Result<()> {
            if self.only.as_ref().is_none_or(|id| *id == story.id) {
                return Err(Error::Database("disk I/O error".into()));
            }
            self.inner.put(story).await
        }

        async fn get_all(&self) -> Result<Vec<Story>> {
            self.inner.get_all().await
        }

        async fn get_by_id(&self, id: &StoryId) -> Result<Option<Story>> {
            self.inner.get_by_id(id).await
        }

        async fn remove_local(&self, id: &StoryId) -> Result<bool> {
            self.inner.remove_local(id).await
        }
    }

    fn credential() -> Credential {
        Credential::new("token").unwrap()
    }

    fn pending(id: &str, description: &str) -> Story {
        Story {
            id: id.into(),
            description: Some(description.into()),
            location: None,
            photo: None,
            created_at: 10,
            synced: false,
            deleted: false,
        }
    }

    fn remote_story(id: &str, description: &str) -> Story {
        Story {
            synced: true,
            ..pending(id, description)
        }
    }

    fn ids(stories: &[Story]) -> Vec<&str> {
        stories.iter().map(|story| story.id.as_str()).collect()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pending_story_is_pushed_and_visible_once() {
        let store = MemoryStoryStore::with_stories([pending("T1", "test")]);
        let coordinator = SyncCoordinator::new(store, FakeRemote::default());

        let report = coordinator.sync(&credential()).await.unwrap();

        assert_eq!(report.pushed, vec![StoryId::from("T1")]);
        assert!(report.failed.is_empty());
        assert_eq!(report.visible.len(), 1);
        assert_eq!(report.visible[0].description.as_deref(), Some("test"));
        assert_eq!(report.superseded, vec![StoryId::from("T1")]);
        assert!(coordinator.store().get_by_id(&"T1".into()).await.unwrap().is_none());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_push_transition_is_persisted_in_libsql_store() {
        let db = Database::open_in_memory().await.unwrap();
        let repo = LibSqlStoryRepository::new(db.connection());
        repo.put(&pending("T1", "test")).await.unwrap();

        let remote = FakeRemote::default();
        remote.list_offline.store(true, Ordering::SeqCst);
        let coordinator = SyncCoordinator::new(repo, remote);
        coordinator.sync(&credential()).await.unwrap_err();

        // Pushed before the pull failed, so the transition is already stored.
        let stored = coordinator.store().get_by_id(&"T1".into()).await.unwrap().unwrap();
        assert!(stored.synced);
        assert_eq!(ids(&coordinator.local_view().await.unwrap()), vec!["T1"]);

        coordinator.remote().list_offline.store(false, Ordering::SeqCst);
        let report = coordinator.sync(&credential()).await.unwrap();
        assert!(report.pushed.is_empty());
        assert_eq!(report.superseded, vec![StoryId::from("T1")]);
        assert_eq!(coordinator.remote().uploads.lock().unwrap().len(), 1);
        // The pulled server copy replaces the client copy.
        assert!(coordinator
            .store()
            .get_by_id(&"server-0".into())
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_unreachable_push_keeps_record_pending_and_visible() {
        let store = MemoryStoryStore::with_stories([pending("T1", "test")]);
        let remote = FakeRemote::with_stories(vec![remote_story("r1", "from server")]);
        remote.create_offline.store(true, Ordering::SeqCst);
        let coordinator = SyncCoordinator::new(store, remote);

        let report = coordinator.sync(&credential()).await.unwrap();

        assert!(report.pushed.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert!(!report.needs_reauth);
        assert_eq!(ids(&report.visible), vec!["r1", "T1"]);

        let local = coordinator.store().get_by_id(&"T1".into()).await.unwrap().unwrap();
        assert!(!local.synced);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_pull_failure_aborts_pass_but_local_view_survives() {
        let store = MemoryStoryStore::with_stories([pending("T1", "test")]);
        let remote = FakeRemote::default();
        remote.create_offline.store(true, Ordering::SeqCst);
        remote.list_offline.store(true, Ordering::SeqCst);
        let coordinator = SyncCoordinator::new(store, remote);

        let err = coordinator.sync(&credential()).await.unwrap_err();
        assert!(matches!(err, Error::Network(_)));

        let view = coordinator.local_view().await.unwrap();
        assert_eq!(ids(&view), vec!["T1"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_deleting_remote_only_story_hides_it_from_every_later_merge() {
        let remote = FakeRemote::with_stories(vec![
            remote_story("r1", "keep"),
            remote_story("r2", "delete me"),
        ]);
        remote.delete_offline.store(true, Ordering::SeqCst);
        let coordinator = SyncCoordinator::new(MemoryStoryStore::new(), remote);

        let view = coordinator.delete_story(&credential(), &"r2".into()).await.unwrap();
        assert!(view.is_empty());

        let tombstone = coordinator.store().get_by_id(&"r2".into()).await.unwrap().unwrap();
        assert!(tombstone.deleted);

        for _ in 0..2 {
            let report = coordinator.sync(&credential()).await.unwrap();
            assert_eq!(ids(&report.visible), vec!["r1"]);
        }

        // Write-through must not resurrect the tombstone.
        let tombstone = coordinator.store().get_by_id(&"r2".into()).await.unwrap().unwrap();
        assert!(tombstone.deleted);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_marks_local_record_and_calls_remote() {
        let store = MemoryStoryStore::with_stories([remote_story("r1", "a"), pending("p1", "b")]);
        let coordinator =
            SyncCoordinator::new(store, FakeRemote::with_stories(vec![remote_story("r1", "a")]));

        let view = coordinator.delete_story(&credential(), &"r1".into()).await.unwrap();

        assert_eq!(ids(&view), vec!["p1"]);
        assert_eq!(
            *coordinator.remote().deletes.lock().unwrap(),
            vec![StoryId::from("r1")]
        );
        // Tombstones are never physically removed by the delete flow.
        assert_eq!(coordinator.store().get_all().await.unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_sync_is_idempotent_without_remote_changes() {
        let store = MemoryStoryStore::with_stories([pending("T1", "one"), pending("T2", "two")]);
        let remote = FakeRemote::with_stories(vec![remote_story("r1", "existing")]);
        let coordinator = SyncCoordinator::new(store, remote);

        let first = coordinator.sync(&credential()).await.unwrap();
        let second = coordinator.sync(&credential()).await.unwrap();

        assert_eq!(first.visible, second.visible);
        assert!(second.pushed.is_empty());
        assert_eq!(coordinator.remote().uploads.lock().unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_failing_record_does_not_block_the_others() {
        let store = MemoryStoryStore::with_stories([pending("a", "bad"), pending("b", "good")]);
        let remote = FakeRemote::default();
        *remote.fail_description.lock().unwrap() = Some("bad".into());
        let coordinator = SyncCoordinator::new(store, remote);

        let report = coordinator.sync(&credential()).await.unwrap();

        assert_eq!(report.pushed, vec![StoryId::from("b")]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].id.as_str(), "a");
        assert!(report.failed[0].error.contains("400"));
        assert!(report
            .visible
            .iter()
            .any(|story| story.id.as_str() == "a" && !story.synced));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_rejected_credential_requests_reauthentication() {
        let store = MemoryStoryStore::with_stories([pending("T1", "test")]);
        let remote = FakeRemote::default();
        remote.reject_credential.store(true, Ordering::SeqCst);
        let coordinator = SyncCoordinator::new(store, remote);

        let report = coordinator.sync(&credential()).await.unwrap();

        assert!(report.needs_reauth);
        assert!(report.failed[0].auth_rejected);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_oversized_undecodable_photo_is_dropped_but_story_syncs() {
        let mut story = pending("T1", "with photo");
        story.photo = Some(Photo::pending("image/jpeg", vec![0; 128]).unwrap());
        let store = MemoryStoryStore::with_stories([story]);
        let options = SyncOptions {
            upload_threshold: 64,
            ..SyncOptions::default()
        };
        let coordinator = SyncCoordinator::with_options(store, FakeRemote::default(), options);

        let report = coordinator.sync(&credential()).await.unwrap();

        assert_eq!(report.pushed, vec![StoryId::from("T1")]);
        assert_eq!(report.dropped_photos, vec![StoryId::from("T1")]);
        let uploads = coordinator.remote().uploads.lock().unwrap();
        assert!(uploads[0].photo.is_none());
        assert_eq!(uploads[0].description, "with photo");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_purge_policy_removes_confirmed_tombstones_only() {
        let mut gone = remote_story("gone", "deleted everywhere");
        gone.deleted = true;
        let mut lingering = remote_story("lingering", "still listed remotely");
        lingering.deleted = true;
        let store = MemoryStoryStore::with_stories([gone, lingering]);
        let remote = FakeRemote::with_stories(vec![remote_story("lingering", "still listed")]);
        let options = SyncOptions {
            tombstones: TombstonePolicy::PurgeConfirmed,
            ..SyncOptions::default()
        };
        let coordinator = SyncCoordinator::with_options(store, remote, options);

        let report = coordinator.sync(&credential()).await.unwrap();

        assert_eq!(report.purged, vec![StoryId::from("gone")]);
        assert!(report.visible.is_empty());
        assert!(coordinator.store().get_by_id(&"gone".into()).await.unwrap().is_none());
        assert!(coordinator
            .store()
            .get_by_id(&"lingering".into())
            .await
            .unwrap()
            .is_some_and(|story| story.deleted));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_add_story_queues_locally_and_hides_tombstones() {
        let mut tomb = remote_story("old", "gone");
        tomb.deleted = true;
        let coordinator =
            SyncCoordinator::new(MemoryStoryStore::with_stories([tomb]), FakeRemote::default());

        let (story, visible) = coordinator
            .add_story(StoryDraft {
                description: Some("offline".into()),
                ..StoryDraft::default()
            })
            .await
            .unwrap();

        assert!(story.is_pending());
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].id, story.id);
        assert!(coordinator.remote().uploads.lock().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_submit_story_publishes_or_falls_back_to_queue() {
        let coordinator = SyncCoordinator::new(MemoryStoryStore::new(), FakeRemote::default());
        let draft = StoryDraft {
            description: Some("online".into()),
            ..StoryDraft::default()
        };

        let outcome = coordinator.submit_story(&credential(), draft).await.unwrap();
        assert_eq!(outcome, SubmitOutcome::Published { photo_dropped: false });
        assert!(coordinator.store().get_all().await.unwrap().is_empty());

        coordinator.remote().create_offline.store(true, Ordering::SeqCst);
        let draft = StoryDraft {
            description: Some("offline".into()),
            ..StoryDraft::default()
        };
        match coordinator.submit_story(&credential(), draft).await.unwrap() {
            SubmitOutcome::Queued { story, visible, .. } => {
                assert!(story.is_pending());
                assert_eq!(ids(&visible), vec![story.id.as_str()]);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_local_view_matches_visible_set_after_push() {
        let store = MemoryStoryStore::with_stories([pending("T1", "test")]);
        let coordinator = SyncCoordinator::new(store, FakeRemote::default());

        let report = coordinator.sync(&credential()).await.unwrap();
        let view = coordinator.local_view().await.unwrap();
        assert_eq!(ids(&report.visible), vec!["server-0"]);
        assert_eq!(ids(&view), vec!["server-0"]);

        let (added, visible) = coordinator
            .add_story(StoryDraft {
                description: Some("x".into()),
                ..StoryDraft::default()
            })
            .await
            .unwrap();
        assert_eq!(ids(&visible), vec!["server-0", added.id.as_str()]);

        let view = coordinator
            .delete_story(&credential(), &"server-0".into())
            .await
            .unwrap();
        assert_eq!(ids(&view), vec![added.id.as_str()]);
        assert_eq!(
            *coordinator.remote().deletes.lock().unwrap(),
            vec![StoryId::from("server-0")]
        );

        coordinator.remote().create_offline.store(true, Ordering::SeqCst);
        let report = coordinator.sync(&credential()).await.unwrap();
        assert_eq!(ids(&report.visible), vec![added.id.as_str()]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_remote_removal_drops_synced_local_copy() {
        let store = MemoryStoryStore::with_stories([remote_story("r1", "a"), remote_story("r2", "b")]);
        let remote = FakeRemote::with_stories(vec![remote_story("r1", "a")]);
        let coordinator = SyncCoordinator::new(store, remote);

        let report = coordinator.sync(&credential()).await.unwrap();

        assert_eq!(report.superseded, vec![StoryId::from("r2")]);
        assert_eq!(ids(&coordinator.local_view().await.unwrap()), vec!["r1"]);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_add_story_surfaces_store_failure() {
        let coordinator = SyncCoordinator::new(FailingStore::failing(), FakeRemote::default());

        let err = coordinator
            .add_story(StoryDraft {
                description: Some("offline".into()),
                ..StoryDraft::default()
            })
            .await
            .unwrap_err();

        assert!(err.is_storage());
        assert!(coordinator.store().inner.get_all().await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_delete_story_store_failure_skips_remote_delete() {
        let store = FailingStore::failing();
        store.inner.put(&remote_story("r1", "a")).await.unwrap();
        let remote = FakeRemote::with_stories(vec![remote_story("r1", "a")]);
        let coordinator = SyncCoordinator::new(store, remote);

        let err = coordinator
            .delete_story(&credential(), &"r1".into())
            .await
            .unwrap_err();

        assert!(err.is_storage());
        assert!(coordinator.remote().deletes.lock().unwrap().is_empty());
        let local = coordinator.store().inner.get_by_id(&"r1".into()).await.unwrap().unwrap();
        assert!(!local.deleted);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_store_failure_after_push_keeps_record_pending() {
        let store = FailingStore::failing_for("T1");
        store.inner.put(&pending("T1", "test")).await.unwrap();
        let coordinator = SyncCoordinator::new(store, FakeRemote::default());

        let report = coordinator.sync(&credential()).await.unwrap();

        assert!(report.pushed.is_empty());
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].id.as_str(), "T1");
        assert!(!report.failed[0].auth_rejected);
        assert!(report.failed[0].error.contains("Database error"));
        // The remote accepted it; locally it stays pending and visible.
        assert_eq!(coordinator.remote().uploads.lock().unwrap().len(), 1);
        assert!(report.visible.iter().any(|story| story.id.as_str() == "T1"));
        let local = coordinator.store().inner.get_by_id(&"T1".into()).await.unwrap().unwrap();
        assert!(local.is_pending());
    }

    #[test]
    fn test_merge_prefers_pending_local_copy_and_dedupes() {
        let remote = vec![
            remote_story("a", "remote a"),
            remote_story("b", "remote b"),
            remote_story("a", "duplicate a"),
        ];
        let mut tomb = remote_story("b", "");
        tomb.deleted = true;
        let local = vec![pending("a", "local edit"), tomb, pending("c", "new")];

        let visible = merge_visible(&remote, &local);

        assert_eq!(ids(&visible), vec!["a", "c"]);
        assert_eq!(visible[0].description.as_deref(), Some("local edit"));
        assert!(!visible[0].synced);
    }

    #[test]
    fn test_merge_ignores_synced_local_copies() {
        let local = vec![remote_story("T1", "already pushed")];
        let remote = vec![remote_story("server-1", "already pushed")];
        assert_eq!(ids(&merge_visible(&remote, &local)), vec!["server-1"]);
    }
}
