//! Property tests: under arbitrary add/remove/merge/commit churn, the
//! aggregate's active union always equals the union of its merged views,
//! and a commit makes exactly the active union containable.

use std::collections::BTreeSet;

use proptest::prelude::*;
use rwf_watchlist::{ViewElements, ViewHandle, ViewStage, WlAggregateView, WlView};

#[derive(Debug, Clone)]
enum Op {
    Add(Vec<i16>),
    Remove(usize),
    Merge,
    Unmerge,
    Commit,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => proptest::collection::vec(1i16..40, 0..6).prop_map(Op::Add),
        2 => any::<usize>().prop_map(Op::Remove),
        2 => Just(Op::Merge),
        1 => Just(Op::Unmerge),
        1 => Just(Op::Commit),
    ]
}

fn active_ids(agg: &WlAggregateView) -> Vec<i16> {
    match agg.active_elements() {
        ViewElements::FieldIds(ids) => ids,
        other => panic!("expected field IDs, got {other:?}"),
    }
}

/// Union of every view the aggregate has folded in (merged or committed).
fn expected_union(agg: &WlAggregateView, live: &[(ViewHandle, Vec<i16>)]) -> Vec<i16> {
    let union: BTreeSet<i16> = live
        .iter()
        .filter(|(handle, _)| agg.stage(*handle) != ViewStage::New)
        .flat_map(|(_, ids)| ids.iter().copied())
        .collect();
    union.into_iter().collect()
}

proptest! {
    #[test]
    fn active_union_matches_merged_views(ops in proptest::collection::vec(op(), 1..60)) {
        let mut agg = WlAggregateView::new();
        let mut live: Vec<(ViewHandle, Vec<i16>)> = Vec::new();

        for op in ops {
            match op {
                Op::Add(ids) => {
                    let view = WlView::from_field_ids(ids.clone());
                    let normalized = view.field_ids().unwrap().to_vec();
                    let handle = agg.add(view);
                    live.push((handle, normalized));
                }
                Op::Remove(pick) => {
                    if live.is_empty() {
                        continue;
                    }
                    let (handle, _) = live.remove(pick % live.len());
                    agg.remove(handle);
                }
                Op::Merge => {
                    agg.merge();
                }
                Op::Unmerge => {
                    agg.unmerge();
                }
                Op::Commit => {
                    agg.commit();
                    // Right after a commit, the committed union is the
                    // active union: it is containable in full, and nothing
                    // outside it is.
                    let active = active_ids(&agg);
                    prop_assert!(agg.contains(&WlView::from_field_ids(active.clone())));
                    let outside: Vec<i16> = (1..40).filter(|id| !active.contains(id)).collect();
                    if let Some(first) = outside.first() {
                        prop_assert!(!agg.contains(&WlView::from_field_ids(vec![*first])));
                    }
                }
            }
            prop_assert_eq!(active_ids(&agg), expected_union(&agg, &live));
        }

        // Tear everything down; the aggregate must end empty.
        for (handle, _) in live.drain(..) {
            agg.remove(handle);
        }
        agg.merge();
        agg.commit();
        prop_assert!(active_ids(&agg).is_empty());
    }

    #[test]
    fn merge_reports_union_growth(first in proptest::collection::vec(1i16..40, 1..8),
                                  second in proptest::collection::vec(1i16..40, 1..8)) {
        let mut agg = WlAggregateView::new();
        agg.add(WlView::from_field_ids(first.clone()));
        prop_assert!(agg.merge());
        agg.commit();

        let first_set: BTreeSet<i16> = first.into_iter().collect();
        let second_set: BTreeSet<i16> = second.iter().copied().collect();
        let grows = !second_set.is_subset(&first_set);

        agg.add(WlView::from_field_ids(second));
        prop_assert_eq!(agg.merge(), grows);
    }
}
