use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

use crate::models::{Bookmark, PROVISIONAL_PREFIX};

// Process-wide counter so provisional ids never collide across stores
static NEXT_PROVISIONAL: AtomicU64 = AtomicU64::new(1);

/// Correlates an optimistic insert to the pending gateway create.
#[derive(Debug)]
pub struct ProvisionalHandle {
    provisional_id: String,
}

impl ProvisionalHandle {
    pub fn id(&self) -> &str {
        &self.provisional_id
    }
}

/// Remembers a removed bookmark so a failed delete can be rolled back.
#[derive(Debug)]
pub struct RemovalHandle {
    item: Bookmark,
    index: usize,
}

/// Authoritative change pushed by the backend, validated at the feed
/// boundary before it reaches the store.
#[derive(Debug, Clone)]
pub enum FeedEvent {
    Insert(Bookmark),
    Update(Bookmark),
    Delete { id: String },
}

/// In-memory bookmark collection merging optimistic local edits with
/// asynchronous authoritative events.
///
/// The gateway and the feed are independent, racing sources of truth, so
/// every "not found" case below is a deliberate no-op rather than an error.
/// All mutations must happen on a single task; the store itself does no I/O.
#[derive(Debug, Default)]
pub struct BookmarkStore {
    items: Vec<Bookmark>,
}

impl BookmarkStore {
    pub fn new() -> Self {
        Self { items: Vec::new() }
    }

    /// Replaces the whole collection with an authoritative snapshot.
    /// An empty snapshot is a valid state, not an error.
    pub fn load(&mut self, items: Vec<Bookmark>) {
        self.items = items;
    }

    pub fn items(&self) -> &[Bookmark] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Inserts a provisional bookmark at the front, before any network
    /// round trip begins. Caller is responsible for non-empty title/url.
    pub fn add_optimistic(&mut self, title: &str, url: &str) -> ProvisionalHandle {
        let n = NEXT_PROVISIONAL.fetch_add(1, Ordering::Relaxed);
        let id = format!("{}{}", PROVISIONAL_PREFIX, n);
        let now = Utc::now();
        self.items.insert(
            0,
            Bookmark {
                id: id.clone(),
                user_id: None,
                title: title.to_string(),
                url: url.to_string(),
                created_at: now,
                updated_at: now,
            },
        );
        ProvisionalHandle { provisional_id: id }
    }

    /// Promotes the provisional item to the durable record the gateway
    /// returned, in place. No-op when a correlating feed insert already
    /// superseded it.
    pub fn confirm_add(&mut self, handle: ProvisionalHandle, result: Bookmark) {
        let Some(pos) = self.position(&handle.provisional_id) else {
            return;
        };
        // The feed may have delivered the durable row first without
        // correlating; keep that copy instead of introducing a duplicate.
        if self.items.iter().any(|b| b.id == result.id) {
            self.items.remove(pos);
            return;
        }
        self.items[pos] = result;
    }

    /// Rolls back the optimistic insert after a failed create.
    pub fn reject_add(&mut self, handle: ProvisionalHandle) {
        self.items.retain(|b| b.id != handle.provisional_id);
    }

    /// Removes the bookmark synchronously, remembering enough to restore
    /// it if the delete fails. `None` when the id is not present.
    pub fn remove_optimistic(&mut self, id: &str) -> Option<RemovalHandle> {
        let index = self.position(id)?;
        let item = self.items.remove(index);
        Some(RemovalHandle { item, index })
    }

    /// Removal is already applied; kept for symmetry with `confirm_add`.
    pub fn confirm_remove(&mut self, _handle: RemovalHandle) {}

    /// Restores the removed bookmark after a failed delete. Position is
    /// best-effort; the item reappearing is what matters.
    pub fn reject_remove(&mut self, handle: RemovalHandle) {
        let index = handle.index.min(self.items.len());
        self.items.insert(index, handle.item);
    }

    /// Applies one authoritative change from the feed.
    pub fn apply_feed_event(&mut self, event: FeedEvent) {
        match event {
            FeedEvent::Insert(item) => {
                if let Some(pos) = self.position(&item.id) {
                    // Redelivery of a known row, replace idempotently
                    self.items[pos] = item;
                } else if let Some(pos) = self
                    .items
                    .iter()
                    .position(|b| b.is_provisional() && b.title == item.title)
                {
                    // Heuristic correlation: the feed carries no client
                    // token, so a provisional row with the same title is
                    // taken to be this insert's optimistic twin.
                    self.items[pos] = item;
                } else {
                    self.items.insert(0, item);
                }
            }
            FeedEvent::Update(item) => {
                // May arrive before the insert is locally known
                if let Some(pos) = self.position(&item.id) {
                    self.items[pos] = item;
                }
            }
            FeedEvent::Delete { id } => {
                self.items.retain(|b| b.id != id);
            }
        }
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.items.iter().position(|b| b.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn durable(id: &str, title: &str, url: &str) -> Bookmark {
        let now = Utc::now();
        Bookmark {
            id: id.to_string(),
            user_id: Some("u1".to_string()),
            title: title.to_string(),
            url: url.to_string(),
            created_at: now,
            updated_at: now,
        }
    }

    fn ids(store: &BookmarkStore) -> Vec<&str> {
        store.items().iter().map(|b| b.id.as_str()).collect()
    }

    #[test]
    fn load_replaces_collection_and_tolerates_empty() {
        let mut store = BookmarkStore::new();
        store.load(vec![durable("d1", "A", "u1"), durable("d2", "B", "u2")]);
        assert_eq!(store.len(), 2);

        store.load(vec![]);
        assert!(store.is_empty());
    }

    #[test]
    fn add_then_confirm_promotes_in_place() {
        let mut store = BookmarkStore::new();
        store.load(vec![]);

        let handle = store.add_optimistic("Paper", "https://x.org");
        assert_eq!(store.len(), 1);
        assert!(store.items()[0].is_provisional());
        assert_eq!(store.items()[0].title, "Paper");

        store.confirm_add(handle, durable("d1", "Paper", "https://x.org"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.items()[0].id, "d1");
        assert!(!store.items()[0].is_provisional());
    }

    #[test]
    fn confirm_keeps_position_among_existing_items() {
        let mut store = BookmarkStore::new();
        store.load(vec![durable("d1", "Old", "u1")]);

        let handle = store.add_optimistic("New", "u2");
        store.confirm_add(handle, durable("d2", "New", "u2"));

        assert_eq!(ids(&store), vec!["d2", "d1"]);
    }

    #[test]
    fn reject_add_restores_prior_state() {
        let mut store = BookmarkStore::new();
        store.load(vec![durable("d1", "Keep", "u1")]);

        let handle = store.add_optimistic("A", "u1");
        store.reject_add(handle);

        assert_eq!(ids(&store), vec!["d1"]);
    }

    #[test]
    fn reject_add_on_empty_store_leaves_it_empty() {
        let mut store = BookmarkStore::new();
        let handle = store.add_optimistic("A", "u1");
        store.reject_add(handle);
        assert!(store.is_empty());
    }

    #[test]
    fn remove_then_reject_restores_original_position() {
        let mut store = BookmarkStore::new();
        store.load(vec![
            durable("d1", "A", "u1"),
            durable("d2", "B", "u2"),
            durable("d3", "C", "u3"),
        ]);

        let handle = store.remove_optimistic("d2").unwrap();
        assert_eq!(ids(&store), vec!["d1", "d3"]);

        store.reject_remove(handle);
        assert_eq!(ids(&store), vec!["d1", "d2", "d3"]);
    }

    #[test]
    fn remove_of_unknown_id_is_a_noop() {
        let mut store = BookmarkStore::new();
        store.load(vec![durable("d1", "A", "u1")]);
        assert!(store.remove_optimistic("d9").is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn confirm_remove_changes_nothing() {
        let mut store = BookmarkStore::new();
        store.load(vec![durable("d1", "A", "u1"), durable("d2", "B", "u2")]);

        let handle = store.remove_optimistic("d1").unwrap();
        store.confirm_remove(handle);
        assert_eq!(ids(&store), vec!["d2"]);
    }

    #[test]
    fn feed_delete_is_idempotent() {
        let mut store = BookmarkStore::new();
        store.load(vec![durable("d1", "A", "u1")]);

        store.apply_feed_event(FeedEvent::Delete { id: "d1".to_string() });
        assert!(store.is_empty());

        // Same event again, still empty, no error
        store.apply_feed_event(FeedEvent::Delete { id: "d1".to_string() });
        assert!(store.is_empty());
    }

    #[test]
    fn feed_update_replaces_fields_but_preserves_position() {
        let mut store = BookmarkStore::new();
        store.load(vec![
            durable("d1", "A", "u1"),
            durable("d2", "B", "u2"),
            durable("d3", "C", "u3"),
        ]);

        store.apply_feed_event(FeedEvent::Update(durable("d2", "B renamed", "u2b")));

        assert_eq!(ids(&store), vec!["d1", "d2", "d3"]);
        assert_eq!(store.items()[1].title, "B renamed");
        assert_eq!(store.items()[1].url, "u2b");
    }

    #[test]
    fn feed_update_for_unknown_id_is_a_noop() {
        let mut store = BookmarkStore::new();
        store.load(vec![durable("d1", "A", "u1")]);

        store.apply_feed_event(FeedEvent::Update(durable("d9", "X", "u9")));
        assert_eq!(ids(&store), vec!["d1"]);
    }

    #[test]
    fn feed_insert_for_known_id_replaces_idempotently() {
        let mut store = BookmarkStore::new();
        store.load(vec![durable("d1", "A", "u1")]);

        store.apply_feed_event(FeedEvent::Insert(durable("d1", "A again", "u1")));
        assert_eq!(store.len(), 1);
        assert_eq!(store.items()[0].title, "A again");
    }

    #[test]
    fn feed_insert_correlates_with_provisional_by_title() {
        let mut store = BookmarkStore::new();
        store.load(vec![durable("d1", "Other", "u0")]);

        let handle = store.add_optimistic("Dup", "u1");

        // Feed insert for the same logical add arrives before the
        // gateway response
        store.apply_feed_event(FeedEvent::Insert(durable("d2", "Dup", "u1")));
        assert_eq!(ids(&store), vec!["d2", "d1"]);
        assert!(store.items().iter().all(|b| !b.is_provisional()));

        // Late confirmation is a no-op: the provisional item is gone
        store.confirm_add(handle, durable("d2", "Dup", "u1"));
        assert_eq!(ids(&store), vec!["d2", "d1"]);
    }

    #[test]
    fn feed_insert_without_correlation_lands_at_front() {
        let mut store = BookmarkStore::new();
        store.load(vec![durable("d1", "A", "u1")]);

        store.apply_feed_event(FeedEvent::Insert(durable("d2", "B", "u2")));
        assert_eq!(ids(&store), vec!["d2", "d1"]);
    }

    #[test]
    fn confirm_after_uncorrelated_feed_insert_drops_provisional() {
        let mut store = BookmarkStore::new();

        // Titles differ (edited server-side), so the heuristic cannot
        // correlate and the durable row lands at the front on its own.
        let handle = store.add_optimistic("Draft", "u1");
        store.apply_feed_event(FeedEvent::Insert(durable("d1", "Final", "u1")));
        assert_eq!(store.len(), 2);

        // Confirmation must not duplicate d1; the provisional row goes away
        store.confirm_add(handle, durable("d1", "Final", "u1"));
        assert_eq!(ids(&store), vec!["d1"]);
    }

    #[test]
    fn provisional_ids_are_unique() {
        let mut store = BookmarkStore::new();
        let a = store.add_optimistic("A", "u1");
        let b = store.add_optimistic("A", "u1");
        assert_ne!(a.id(), b.id());
    }

    // P1 as a property: no interleaving of loads, feed inserts, and
    // optimistic add/confirm cycles ever produces two items sharing a
    // durable id.
    #[derive(Debug, Clone)]
    enum Op {
        Load(Vec<u8>),
        Insert(u8, u8),
        AddOptimistic(u8),
        ConfirmPending(u8),
    }

    fn arb_op() -> impl Strategy<Value = Op> {
        prop_oneof![
            proptest::collection::vec(0u8..6, 0..4).prop_map(Op::Load),
            (0u8..6, 0u8..4).prop_map(|(i, t)| Op::Insert(i, t)),
            (0u8..4).prop_map(Op::AddOptimistic),
            (0u8..6).prop_map(Op::ConfirmPending),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn no_duplicate_durable_ids(ops in proptest::collection::vec(arb_op(), 1..32)) {
            let mut store = BookmarkStore::new();
            let mut pending: Vec<ProvisionalHandle> = Vec::new();

            for op in ops {
                match op {
                    Op::Load(idxs) => {
                        let mut seen = std::collections::HashSet::new();
                        let snapshot = idxs
                            .into_iter()
                            .filter(|i| seen.insert(*i))
                            .map(|i| durable(&format!("d{i}"), &format!("t{}", i % 4), "u"))
                            .collect();
                        pending.clear();
                        store.load(snapshot);
                    }
                    Op::Insert(i, t) => {
                        store.apply_feed_event(FeedEvent::Insert(durable(
                            &format!("d{i}"),
                            &format!("t{t}"),
                            "u",
                        )));
                    }
                    Op::AddOptimistic(t) => {
                        pending.push(store.add_optimistic(&format!("t{t}"), "u"));
                    }
                    Op::ConfirmPending(i) => {
                        if let Some(handle) = pending.pop() {
                            store.confirm_add(handle, durable(&format!("d{i}"), "t0", "u"));
                        }
                    }
                }

                let durable_ids: Vec<&str> = store
                    .items()
                    .iter()
                    .filter(|b| !b.is_provisional())
                    .map(|b| b.id.as_str())
                    .collect();
                let unique: std::collections::HashSet<&str> =
                    durable_ids.iter().copied().collect();
                prop_assert_eq!(durable_ids.len(), unique.len());
            }
        }
    }
}
