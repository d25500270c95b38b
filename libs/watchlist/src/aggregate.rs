//! # Aggregate View - Refcounted Union of Consumer Views
//!
//! ## Purpose
//!
//! Many consumers of one stream each request a view; the provider should be
//! asked for exactly the union. The aggregate tracks each element with a
//! reference count and a committed flag, so view churn is a pair of cheap
//! map passes and the provider-facing union only changes when `commit`
//! observes a real difference.
//!
//! ## Lifecycle
//!
//! ```text
//!  add ──▶ New ──merge──▶ Merged ──commit──▶ Committed
//!           │               │  ▲                 │
//!        remove          unmerge│              remove
//!           ▼               ▼   │                 ▼
//!         (gone)      refcounts drop      refcount drops, element
//!                     zeros purged        retained until commit
//! ```
//!
//! `merge` reports whether the union the provider would see has changed;
//! callers re-encode and re-request only on `true`.
//!
//! Misuse of handles or stage transitions is a programming error and is
//! asserted, not surfaced as a result code.

use std::collections::BTreeMap;

use rwf_codec::{encode_ascii_array, encode_field_id_array, CodecResult, EncodeIterator};
use rwf_types::FieldId;

use crate::view::{ViewElements, ViewKind, WlView};

/// Where a registered view sits in the merge lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewStage {
    /// Registered but not yet folded into the refcount map.
    New,
    /// Folded in; elements hold its refcounts.
    Merged,
    /// Folded in and acknowledged by the last commit.
    Committed,
}

/// Opaque handle to a view registered with an aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ViewHandle(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ElemState {
    refcount: u32,
    committed: bool,
}

/// Refcount map over one element domain.
#[derive(Debug, Clone, Default)]
struct ElemMap<K: Ord> {
    map: BTreeMap<K, ElemState>,
}

impl<K: Ord + Clone> ElemMap<K> {
    /// Fold a view's elements in. Returns true if any element was new to
    /// the map.
    fn merge_keys(&mut self, keys: &[K]) -> bool {
        let mut inserted = false;
        for key in keys {
            match self.map.get_mut(key) {
                Some(state) => state.refcount += 1,
                None => {
                    self.map.insert(
                        key.clone(),
                        ElemState {
                            refcount: 1,
                            committed: false,
                        },
                    );
                    inserted = true;
                }
            }
        }
        inserted
    }

    /// Drop one reference per key. With `purge_zero`, elements reaching
    /// refcount zero leave the map immediately; otherwise they linger until
    /// the next commit so the committed union still reflects them.
    fn decrement(&mut self, keys: &[K], purge_zero: bool) {
        for key in keys {
            let state = self
                .map
                .get_mut(key)
                .unwrap_or_else(|| panic!("refcount underflow: element missing from aggregate"));
            assert!(state.refcount > 0, "refcount underflow");
            state.refcount -= 1;
            if purge_zero && state.refcount == 0 {
                self.map.remove(key);
            }
        }
    }

    /// Whether the committed union differs from the current refcounted one.
    fn committed_union_stale(&self) -> bool {
        self.map.values().any(|state| {
            (state.refcount == 0 && state.committed)
                || (state.refcount > 0 && !state.committed)
        })
    }

    /// Purge dead elements and mark the survivors committed.
    fn commit(&mut self) {
        self.map.retain(|_, state| state.refcount > 0);
        for state in self.map.values_mut() {
            state.committed = true;
        }
    }

    fn contains_all_committed(&self, keys: &[K]) -> bool {
        keys.iter().all(|key| {
            self.map
                .get(key)
                .map(|state| state.committed)
                .unwrap_or(false)
        })
    }

    fn active_keys(&self) -> Vec<K> {
        self.map
            .iter()
            .filter(|(_, state)| state.refcount > 0)
            .map(|(key, _)| key.clone())
            .collect()
    }
}

#[derive(Debug, Clone)]
enum Combined {
    FieldIds(ElemMap<FieldId>),
    ElementNames(ElemMap<Vec<u8>>),
}

#[derive(Debug, Clone)]
struct ViewSlot {
    view: WlView,
    stage: ViewStage,
}

/// The union of all registered views for one stream.
#[derive(Debug, Clone, Default)]
pub struct WlAggregateView {
    kind: Option<ViewKind>,
    combined: Option<Combined>,
    slots: Vec<Option<ViewSlot>>,
}

impl WlAggregateView {
    pub fn new() -> Self {
        Self::default()
    }

    /// Domain of the registered views, fixed by the first `add`.
    pub fn kind(&self) -> Option<ViewKind> {
        self.kind
    }

    /// Number of registered views in any stage.
    pub fn view_count(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Stage of a registered view.
    pub fn stage(&self, handle: ViewHandle) -> ViewStage {
        self.slot(handle).stage
    }

    fn slot(&self, handle: ViewHandle) -> &ViewSlot {
        self.slots
            .get(handle.0)
            .and_then(|slot| slot.as_ref())
            .unwrap_or_else(|| panic!("stale view handle {}", handle.0))
    }

    /// Register a view. All views of one aggregate share a domain; mixing
    /// field-ID and element-name views is a programming error.
    pub fn add(&mut self, view: WlView) -> ViewHandle {
        match self.kind {
            None => self.kind = Some(view.kind()),
            Some(kind) => assert_eq!(
                kind,
                view.kind(),
                "view domain does not match the aggregate"
            ),
        }
        let slot = ViewSlot {
            view,
            stage: ViewStage::New,
        };
        for (index, entry) in self.slots.iter_mut().enumerate() {
            if entry.is_none() {
                *entry = Some(slot);
                return ViewHandle(index);
            }
        }
        self.slots.push(Some(slot));
        ViewHandle(self.slots.len() - 1)
    }

    fn combined_mut(&mut self) -> &mut Combined {
        let kind = self.kind.unwrap_or(ViewKind::FieldIds);
        self.combined.get_or_insert_with(|| match kind {
            ViewKind::FieldIds => Combined::FieldIds(ElemMap::default()),
            ViewKind::ElementNames => Combined::ElementNames(ElemMap::default()),
        })
    }

    /// Fold all `New` views into the refcount map.
    ///
    /// Returns true when the provider-visible union differs from the last
    /// committed one - because an element appeared for the first time, or
    /// because earlier merges and removes left the committed union stale.
    pub fn merge(&mut self) -> bool {
        let mut inserted = false;
        for index in 0..self.slots.len() {
            let Some(slot) = &self.slots[index] else {
                continue;
            };
            if slot.stage != ViewStage::New {
                continue;
            }
            let elements = slot.view.elements().clone();
            inserted |= match (self.combined_mut(), &elements) {
                (Combined::FieldIds(map), ViewElements::FieldIds(ids)) => map.merge_keys(ids),
                (Combined::ElementNames(map), ViewElements::ElementNames(names)) => {
                    map.merge_keys(names)
                }
                _ => unreachable!("aggregate domain fixed at add"),
            };
            if let Some(slot) = &mut self.slots[index] {
                slot.stage = ViewStage::Merged;
            }
        }

        let stale = match &self.combined {
            Some(Combined::FieldIds(map)) => map.committed_union_stale(),
            Some(Combined::ElementNames(map)) => map.committed_union_stale(),
            None => false,
        };
        let updated = inserted || stale;
        tracing::debug!(inserted, stale, "aggregate view merge");
        updated
    }

    fn decrement_view(&mut self, view: &WlView, purge_zero: bool) {
        let combined = self
            .combined
            .as_mut()
            .unwrap_or_else(|| panic!("merged view without a combined map"));
        match (combined, view.elements()) {
            (Combined::FieldIds(map), ViewElements::FieldIds(ids)) => {
                map.decrement(ids, purge_zero)
            }
            (Combined::ElementNames(map), ViewElements::ElementNames(names)) => {
                map.decrement(names, purge_zero)
            }
            _ => unreachable!("aggregate domain fixed at add"),
        }
    }

    /// Unregister a view. A `New` view simply disappears. A `Merged` view's
    /// refcounts are dropped and dead elements purged at once - the provider
    /// never saw them. A `Committed` view's dead elements are retained until
    /// the next commit so the committed union stays truthful.
    pub fn remove(&mut self, handle: ViewHandle) {
        let slot = self.slots[handle.0]
            .take()
            .unwrap_or_else(|| panic!("stale view handle {}", handle.0));
        match slot.stage {
            ViewStage::New => {}
            ViewStage::Merged => self.decrement_view(&slot.view, true),
            ViewStage::Committed => self.decrement_view(&slot.view, false),
        }
    }

    /// Pull every merged-but-uncommitted view back to `New`, dropping its
    /// refcounts and purging dead elements. Used when the whole aggregate
    /// must be recomputed, e.g. after a downstream schema change.
    pub fn unmerge(&mut self) {
        for index in 0..self.slots.len() {
            let Some(slot) = &self.slots[index] else {
                continue;
            };
            if slot.stage != ViewStage::Merged {
                continue;
            }
            let view = slot.view.clone();
            self.decrement_view(&view, true);
            if let Some(slot) = &mut self.slots[index] {
                slot.stage = ViewStage::New;
            }
        }
    }

    /// Acknowledge the current union: purge dead elements, mark the rest
    /// committed, and move every `Merged` view to `Committed`. With no views
    /// left the map itself is released.
    pub fn commit(&mut self) {
        for slot in self.slots.iter_mut().flatten() {
            if slot.stage == ViewStage::Merged {
                slot.stage = ViewStage::Committed;
            }
        }
        let committed_views = self
            .slots
            .iter()
            .flatten()
            .filter(|slot| slot.stage == ViewStage::Committed)
            .count();
        if committed_views == 0 {
            self.combined = None;
        } else {
            match self.combined.as_mut() {
                Some(Combined::FieldIds(map)) => map.commit(),
                Some(Combined::ElementNames(map)) => map.commit(),
                None => {}
            }
        }
        tracing::debug!(committed_views, "aggregate view commit");
    }

    /// Whether every element of `view` is present and committed. An empty
    /// view asks for nothing and is always contained.
    pub fn contains(&self, view: &WlView) -> bool {
        if view.is_empty() {
            return true;
        }
        if let Some(kind) = self.kind {
            assert_eq!(kind, view.kind(), "view domain does not match the aggregate");
        }
        match (&self.combined, view.elements()) {
            (Some(Combined::FieldIds(map)), ViewElements::FieldIds(ids)) => {
                map.contains_all_committed(ids)
            }
            (Some(Combined::ElementNames(map)), ViewElements::ElementNames(names)) => {
                map.contains_all_committed(names)
            }
            _ => false,
        }
    }

    /// The union the provider should currently serve: every element with a
    /// live reference, in sorted order.
    pub fn active_elements(&self) -> ViewElements {
        match (&self.combined, self.kind) {
            (Some(Combined::FieldIds(map)), _) => ViewElements::FieldIds(map.active_keys()),
            (Some(Combined::ElementNames(map)), _) => {
                ViewElements::ElementNames(map.active_keys())
            }
            (None, Some(ViewKind::ElementNames)) => ViewElements::ElementNames(Vec::new()),
            (None, _) => ViewElements::FieldIds(Vec::new()),
        }
    }

    /// Encode the active union as a wire array for the provider request.
    pub fn encode_array(&self, iter: &mut EncodeIterator) -> CodecResult<()> {
        match self.active_elements() {
            ViewElements::FieldIds(ids) => encode_field_id_array(iter, &ids),
            ViewElements::ElementNames(names) => encode_ascii_array(iter, &names),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(view: &WlAggregateView) -> Vec<FieldId> {
        match view.active_elements() {
            ViewElements::FieldIds(ids) => ids,
            other => panic!("expected field IDs, got {other:?}"),
        }
    }

    #[test]
    fn overlapping_views_merge_and_remove() {
        let mut agg = WlAggregateView::new();
        let first = agg.add(WlView::from_field_ids(vec![22, 25]));
        let _second = agg.add(WlView::from_field_ids(vec![25, 30]));

        assert!(agg.merge());
        assert_eq!(ids(&agg), vec![22, 25, 30]);
        agg.commit();

        // Dropping the first view releases 22; 25 survives on the second
        // view's reference.
        agg.remove(first);
        assert_eq!(ids(&agg), vec![25, 30]);
        assert!(agg.merge(), "committed union went stale");
        agg.commit();
        assert!(agg.contains(&WlView::from_field_ids(vec![25, 30])));
        assert!(!agg.contains(&WlView::from_field_ids(vec![22])));
    }

    #[test]
    fn merge_is_false_when_union_is_covered() {
        let mut agg = WlAggregateView::new();
        agg.add(WlView::from_field_ids(vec![22, 25, 30]));
        assert!(agg.merge());
        agg.commit();

        // A subset view adds refcounts but no new elements.
        agg.add(WlView::from_field_ids(vec![22, 30]));
        assert!(!agg.merge());
    }

    #[test]
    fn removed_new_view_never_touches_the_map() {
        let mut agg = WlAggregateView::new();
        let keep = agg.add(WlView::from_field_ids(vec![22]));
        let discarded = agg.add(WlView::from_field_ids(vec![99]));
        agg.remove(discarded);
        assert!(agg.merge());
        assert_eq!(ids(&agg), vec![22]);
        agg.commit();
        assert!(agg.contains(&WlView::from_field_ids(vec![22])));
        assert!(!agg.contains(&WlView::from_field_ids(vec![99])));
        agg.remove(keep);
    }

    #[test]
    fn remove_from_merged_purges_immediately() {
        let mut agg = WlAggregateView::new();
        agg.add(WlView::from_field_ids(vec![22]));
        let second = agg.add(WlView::from_field_ids(vec![22, 25]));
        assert!(agg.merge());

        // 25 was never committed; removing its only holder erases it now.
        agg.remove(second);
        assert_eq!(ids(&agg), vec![22]);
    }

    #[test]
    fn remove_from_committed_retains_until_commit() {
        let mut agg = WlAggregateView::new();
        let only = agg.add(WlView::from_field_ids(vec![22, 25]));
        let _other = agg.add(WlView::from_field_ids(vec![25]));
        assert!(agg.merge());
        agg.commit();

        agg.remove(only);
        // 22 is dead but still committed; contains() keeps honoring it
        // until the next commit acknowledges the shrink.
        assert!(agg.contains(&WlView::from_field_ids(vec![22])));
        assert_eq!(ids(&agg), vec![25]);
        assert!(agg.merge());
        agg.commit();
        assert!(!agg.contains(&WlView::from_field_ids(vec![22])));
    }

    #[test]
    fn unmerge_returns_merged_views_to_new() {
        let mut agg = WlAggregateView::new();
        let committed = agg.add(WlView::from_field_ids(vec![22]));
        assert!(agg.merge());
        agg.commit();
        let pending = agg.add(WlView::from_field_ids(vec![25, 30]));
        assert!(agg.merge());
        assert_eq!(agg.stage(pending), ViewStage::Merged);

        // Only the merged view backs out; the committed one is untouched.
        agg.unmerge();
        assert_eq!(agg.stage(pending), ViewStage::New);
        assert_eq!(agg.stage(committed), ViewStage::Committed);
        assert_eq!(ids(&agg), vec![22]);

        // The view folds back in on the next merge.
        assert!(agg.merge());
        assert_eq!(ids(&agg), vec![22, 25, 30]);
    }

    #[test]
    fn commit_with_no_views_releases_the_map() {
        let mut agg = WlAggregateView::new();
        let handle = agg.add(WlView::from_field_ids(vec![22]));
        assert!(agg.merge());
        agg.commit();
        agg.remove(handle);
        agg.commit();
        assert_eq!(agg.view_count(), 0);
        assert!(ids(&agg).is_empty());
        assert!(!agg.contains(&WlView::from_field_ids(vec![22])));
    }

    #[test]
    fn element_name_domain_works_end_to_end() {
        let mut agg = WlAggregateView::new();
        agg.add(WlView::from_element_names(vec![
            b"BID".to_vec(),
            b"ASK".to_vec(),
        ]));
        let second = agg.add(WlView::from_element_names(vec![b"TRDPRC_1".to_vec()]));
        assert!(agg.merge());
        agg.commit();
        assert!(agg.contains(&WlView::from_element_names(vec![b"ASK".to_vec()])));

        agg.remove(second);
        match agg.active_elements() {
            ViewElements::ElementNames(names) => {
                assert_eq!(names, vec![b"ASK".to_vec(), b"BID".to_vec()]);
            }
            other => panic!("expected names, got {other:?}"),
        }
    }

    #[test]
    fn empty_view_is_always_contained() {
        let agg = WlAggregateView::new();
        assert!(agg.contains(&WlView::from_field_ids(vec![])));
    }

    #[test]
    #[should_panic(expected = "view domain does not match")]
    fn mixing_domains_panics() {
        let mut agg = WlAggregateView::new();
        agg.add(WlView::from_field_ids(vec![22]));
        agg.add(WlView::from_element_names(vec![b"BID".to_vec()]));
    }

    #[test]
    #[should_panic(expected = "stale view handle")]
    fn double_remove_panics() {
        let mut agg = WlAggregateView::new();
        let handle = agg.add(WlView::from_field_ids(vec![22]));
        agg.remove(handle);
        agg.remove(handle);
    }

    #[test]
    fn handles_are_reused_after_removal() {
        let mut agg = WlAggregateView::new();
        let first = agg.add(WlView::from_field_ids(vec![22]));
        agg.remove(first);
        let second = agg.add(WlView::from_field_ids(vec![25]));
        assert_eq!(first, second);
    }
}
