//! Epoch reconciliation.
//!
//! Given the stored epochs and the incoming epochs of an entity, decide
//! the minimal set of edits that makes the stored history agree with the
//! incoming document while keeping every closed interval intact. The
//! engine is pure: it never touches a store and takes the clock as an
//! argument.
//!
//! Rules, applied per natural key:
//!
//! 1. Incoming epochs are sorted; adjacent or duplicate ones with identical
//!    payloads are merged. Incoming epochs that still overlap each other
//!    are a conflict.
//! 2. An incoming epoch identical to a stored one is unchanged.
//! 3. Same start and payload but a different end closes (shortens) or
//!    extends (lengthens or reopens) the stored epoch.
//! 4. An incoming epoch starting inside exactly one stored epoch with a
//!    different payload supersedes it when the stored epoch is open, or
//!    closed with the same end: the stored epoch is closed at the incoming
//!    start and the incoming one is inserted.
//! 5. An incoming epoch overlapping no stored epoch is inserted.
//! 6. Anything else is a [`ConflictError`].
//! 7. When no incoming epoch is open, stored epochs that are still open
//!    and matched nothing are closed at `now`.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

use aqms_common::{coalesce, Epoch, EpochRow, Timestamp};

use crate::error::ConflictError;

/// One change to stored history.
#[derive(Debug, Clone, PartialEq)]
pub enum Edit<R> {
    /// Store a new epoch.
    Insert(R),
    /// Set the end of the stored epoch `row` to `at`.
    Close { row: R, at: Timestamp },
    /// Move the end of the stored epoch `row` later (`None` reopens it).
    Extend { row: R, to: Option<Timestamp> },
    /// Stored epoch already matches.
    Unchanged(R),
}

impl<R: EpochRow> Edit<R> {
    /// The row this edit is about, with its stored epoch.
    pub fn row(&self) -> &R {
        match self {
            Edit::Insert(row)
            | Edit::Close { row, .. }
            | Edit::Extend { row, .. }
            | Edit::Unchanged(row) => row,
        }
    }

    pub fn is_write(&self) -> bool {
        !matches!(self, Edit::Unchanged(_))
    }
}

/// Number of edits of each kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EditCounts {
    pub inserted: usize,
    pub closed: usize,
    pub extended: usize,
    pub unchanged: usize,
}

impl EditCounts {
    pub fn add(&mut self, other: EditCounts) {
        self.inserted += other.inserted;
        self.closed += other.closed;
        self.extended += other.extended;
        self.unchanged += other.unchanged;
    }

    /// Total number of writes.
    pub fn writes(&self) -> usize {
        self.inserted + self.closed + self.extended
    }
}

impl fmt::Display for EditCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} inserted, {} closed, {} extended, {} unchanged",
            self.inserted, self.closed, self.extended, self.unchanged
        )
    }
}

/// Edits for a set of keys, in application order.
#[derive(Debug, Clone, PartialEq)]
pub struct Plan<R> {
    pub edits: Vec<Edit<R>>,
    /// Stored history after the edits are applied.
    pub resulting: Vec<R>,
}

impl<R: EpochRow> Plan<R> {
    pub fn counts(&self) -> EditCounts {
        let mut counts = EditCounts::default();
        for edit in &self.edits {
            match edit {
                Edit::Insert(_) => counts.inserted += 1,
                Edit::Close { .. } => counts.closed += 1,
                Edit::Extend { .. } => counts.extended += 1,
                Edit::Unchanged(_) => counts.unchanged += 1,
            }
        }
        counts
    }

    /// True if applying the plan writes nothing.
    pub fn is_noop(&self) -> bool {
        self.edits.iter().all(|e| !e.is_write())
    }
}

/// Reconcile stored rows against incoming rows.
///
/// Both slices may mix natural keys; each key is reconciled on its own and
/// edits come out ordered by key. Keys that appear only in `old` are
/// reconciled against an empty incoming set, which retires their open
/// epochs.
pub fn reconcile<R: EpochRow>(
    old: &[R],
    new: &[R],
    now: Timestamp,
) -> Result<Plan<R>, ConflictError> {
    let mut groups: BTreeMap<R::Key, (Vec<R>, Vec<R>)> = BTreeMap::new();
    for row in old {
        groups.entry(row.key()).or_default().0.push(row.clone());
    }
    for row in new {
        groups.entry(row.key()).or_default().1.push(row.clone());
    }

    let mut plan = Plan {
        edits: Vec::new(),
        resulting: Vec::new(),
    };
    for (key, (old, new)) in groups {
        let keyed = reconcile_key(&key, old, new, now)?;
        plan.edits.extend(keyed.edits);
        plan.resulting.extend(keyed.resulting);
    }
    Ok(plan)
}

struct Working<R> {
    row: R,
    /// Matched by an incoming epoch, or inserted by this plan.
    touched: bool,
}

fn reconcile_key<R: EpochRow>(
    key: &R::Key,
    mut old: Vec<R>,
    new: Vec<R>,
    now: Timestamp,
) -> Result<Plan<R>, ConflictError> {
    old.sort_by_key(|r| r.epoch());
    let stored: Vec<Epoch> = old.iter().map(|r| r.epoch()).collect();
    let conflict = |incoming: &Epoch, detail: &str| ConflictError {
        kind: R::KIND,
        key: key.to_string(),
        detail: detail.to_string(),
        incoming: incoming.to_string(),
        stored: stored.clone(),
    };

    let new = normalize_incoming(new).map_err(|(epoch, detail)| conflict(&epoch, detail))?;
    let any_new_open = new.iter().any(|r| r.epoch().is_open());

    let mut working: Vec<Working<R>> = old
        .into_iter()
        .map(|row| Working {
            row,
            touched: false,
        })
        .collect();
    let mut edits = Vec::new();

    for incoming in new {
        let epoch = incoming.epoch();

        if let Some(w) = working.iter_mut().find(|w| w.row == incoming) {
            w.touched = true;
            edits.push(Edit::Unchanged(w.row.clone()));
            continue;
        }

        if let Some(index) = working
            .iter()
            .position(|w| w.row.epoch().start() == epoch.start())
        {
            if !working[index].row.same_payload(&incoming) {
                return Err(conflict(
                    &epoch,
                    "stored epoch with the same start has a different payload",
                ));
            }
            let blocked = working
                .iter()
                .enumerate()
                .any(|(i, w)| i != index && w.row.epoch().overlaps(&epoch));
            if blocked {
                return Err(conflict(&epoch, "new end would overlap a later stored epoch"));
            }

            let w = &mut working[index];
            let current = w.row.epoch();
            match (Epoch::cmp_end(epoch.end(), current.end()), epoch.end()) {
                (Ordering::Less, Some(at)) => edits.push(Edit::Close {
                    row: w.row.clone(),
                    at,
                }),
                _ => edits.push(Edit::Extend {
                    row: w.row.clone(),
                    to: epoch.end(),
                }),
            }
            w.row = incoming;
            w.touched = true;
            continue;
        }

        let overlapping: Vec<usize> = working
            .iter()
            .enumerate()
            .filter(|(_, w)| w.row.epoch().overlaps(&epoch))
            .map(|(i, _)| i)
            .collect();

        match overlapping.as_slice() {
            [] => {}
            [index] => {
                let current = working[*index].row.epoch();
                if current.start() > epoch.start() {
                    return Err(conflict(
                        &epoch,
                        "incoming epoch starts before a stored epoch it overlaps",
                    ));
                }
                if Epoch::cmp_end(current.end(), epoch.end()) == Ordering::Greater {
                    return Err(conflict(&epoch, "incoming epoch lies inside a stored epoch"));
                }
                // Closed history is only cut when the incoming epoch ends with it.
                if !current.is_open() && current.end() != epoch.end() {
                    return Err(conflict(
                        &epoch,
                        "incoming epoch partially overlaps a closed stored epoch",
                    ));
                }
                let w = &mut working[*index];
                let closed = current
                    .with_end(Some(epoch.start()))
                    .map_err(|e| conflict(&epoch, &e.to_string()))?;
                edits.push(Edit::Close {
                    row: w.row.clone(),
                    at: epoch.start(),
                });
                w.row = w.row.with_epoch(closed);
                w.touched = true;
            }
            _ => {
                return Err(conflict(
                    &epoch,
                    "incoming epoch overlaps more than one stored epoch",
                ));
            }
        }

        edits.push(Edit::Insert(incoming.clone()));
        working.push(Working {
            row: incoming,
            touched: true,
        });
    }

    if !any_new_open {
        for w in working.iter_mut().filter(|w| !w.touched && w.row.epoch().is_open()) {
            let current = w.row.epoch();
            if now <= current.start() {
                return Err(conflict(
                    &current,
                    "cannot retire an epoch that has not started yet",
                ));
            }
            let closed = current
                .with_end(Some(now))
                .map_err(|e| conflict(&current, &e.to_string()))?;
            edits.push(Edit::Close {
                row: w.row.clone(),
                at: now,
            });
            w.row = w.row.with_epoch(closed);
        }
    }

    let mut resulting: Vec<R> = working.into_iter().map(|w| w.row).collect();
    resulting.sort_by_key(|r| r.epoch());
    for pair in resulting.windows(2) {
        if pair[0].epoch().overlaps(&pair[1].epoch()) {
            return Err(conflict(&pair[1].epoch(), "resulting history would overlap"));
        }
    }

    Ok(Plan { edits, resulting })
}

/// Sort, merge adjacent identical epochs, and reject self-overlap.
fn normalize_incoming<R: EpochRow>(mut new: Vec<R>) -> Result<Vec<R>, (Epoch, &'static str)> {
    new.sort_by_key(|r| r.epoch());
    let mut out: Vec<R> = Vec::with_capacity(new.len());
    for row in new {
        if let Some(last) = out.last_mut() {
            if let Some(merged) = coalesce(last, &row) {
                *last = merged;
                continue;
            }
            if last.epoch().overlaps(&row.epoch()) {
                return Err((row.epoch(), "incoming epochs overlap each other"));
            }
        }
        out.push(row);
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aqms_common::{parse_timestamp, StationRow};

    fn ts(s: &str) -> Timestamp {
        parse_timestamp(s).unwrap()
    }

    fn epoch(start: &str, end: Option<&str>) -> Epoch {
        Epoch::new(ts(start), end.map(ts)).unwrap()
    }

    fn station(lat: f64, start: &str, end: Option<&str>) -> StationRow {
        StationRow {
            net: "UW".into(),
            sta: "RATT".into(),
            epoch: epoch(start, end),
            lat,
            lon: -119.5,
            elev: 1000.0,
            staname: None,
        }
    }

    fn now() -> Timestamp {
        ts("2024-01-01")
    }

    #[test]
    fn test_empty_store_inserts_everything() {
        let new = vec![station(46.0, "2010-01-01", None)];
        let plan = reconcile(&[], &new, now()).unwrap();
        assert_eq!(plan.edits, vec![Edit::Insert(new[0].clone())]);
        assert_eq!(plan.resulting, new);
    }

    #[test]
    fn test_identical_epoch_is_unchanged() {
        let rows = vec![station(46.0, "2010-01-01", None)];
        let plan = reconcile(&rows, &rows, now()).unwrap();
        assert!(plan.is_noop());
        assert_eq!(plan.counts().unchanged, 1);
    }

    #[test]
    fn test_supersession_closes_old_and_inserts_new() {
        let old = vec![station(46.0, "2010-01-01", None)];
        let new = vec![station(46.5, "2020-06-01", None)];
        let plan = reconcile(&old, &new, now()).unwrap();

        assert_eq!(
            plan.edits,
            vec![
                Edit::Close {
                    row: old[0].clone(),
                    at: ts("2020-06-01")
                },
                Edit::Insert(new[0].clone()),
            ]
        );
        assert_eq!(plan.resulting[0].epoch, epoch("2010-01-01", Some("2020-06-01")));
        assert_eq!(plan.resulting[1], new[0]);
    }

    #[test]
    fn test_full_history_reload_is_unchanged() {
        let history = vec![
            station(46.0, "2010-01-01", Some("2020-06-01")),
            station(46.5, "2020-06-01", None),
        ];
        let plan = reconcile(&history, &history, now()).unwrap();
        assert!(plan.is_noop());
        assert_eq!(plan.counts().unchanged, 2);
    }

    #[test]
    fn test_same_start_shorter_end_closes() {
        let old = vec![station(46.0, "2010-01-01", None)];
        let new = vec![station(46.0, "2010-01-01", Some("2015-01-01"))];
        let plan = reconcile(&old, &new, now()).unwrap();
        assert_eq!(
            plan.edits,
            vec![Edit::Close {
                row: old[0].clone(),
                at: ts("2015-01-01")
            }]
        );
    }

    #[test]
    fn test_same_start_reopen_extends() {
        let old = vec![station(46.0, "2010-01-01", Some("2015-01-01"))];
        let new = vec![station(46.0, "2010-01-01", None)];
        let plan = reconcile(&old, &new, now()).unwrap();
        assert_eq!(
            plan.edits,
            vec![Edit::Extend {
                row: old[0].clone(),
                to: None
            }]
        );
        assert_eq!(plan.resulting, new);
    }

    #[test]
    fn test_extend_into_later_epoch_conflicts() {
        let old = vec![
            station(46.0, "2010-01-01", Some("2015-01-01")),
            station(46.5, "2015-01-01", None),
        ];
        let new = vec![station(46.0, "2010-01-01", Some("2016-01-01"))];
        assert!(reconcile(&old, &new, now()).is_err());
    }

    #[test]
    fn test_same_start_different_payload_conflicts() {
        let old = vec![station(46.0, "2010-01-01", None)];
        let new = vec![station(47.0, "2010-01-01", None)];
        let err = reconcile(&old, &new, now()).unwrap_err();
        assert_eq!(err.key, "UW.RATT");
        assert_eq!(err.stored, vec![old[0].epoch]);
    }

    #[test]
    fn test_starting_before_stored_conflicts() {
        let old = vec![station(46.0, "2010-01-01", None)];
        let new = vec![station(47.0, "2005-01-01", None)];
        let err = reconcile(&old, &new, now()).unwrap_err();
        assert!(err.detail.contains("starts before"));
    }

    #[test]
    fn test_strict_subset_conflicts() {
        let old = vec![station(46.0, "2010-01-01", Some("2020-01-01"))];
        let new = vec![station(47.0, "2012-01-01", Some("2014-01-01"))];
        let err = reconcile(&old, &new, now()).unwrap_err();
        assert!(err.detail.contains("inside"));
    }

    #[test]
    fn test_partial_overlap_with_closed_epoch_conflicts() {
        let old = vec![station(46.0, "2010-01-01", Some("2015-01-01"))];
        let new = vec![station(47.0, "2012-01-01", Some("2016-01-01"))];
        let err = reconcile(&old, &new, now()).unwrap_err();
        assert!(err.detail.contains("partially overlaps a closed"));
        assert_eq!(err.stored, vec![old[0].epoch]);

        let new = vec![station(47.0, "2012-01-01", None)];
        assert!(reconcile(&old, &new, now()).is_err());
    }

    #[test]
    fn test_suffix_of_closed_epoch_supersedes() {
        let old = vec![station(46.0, "2010-01-01", Some("2015-01-01"))];
        let new = vec![station(47.0, "2012-01-01", Some("2015-01-01"))];
        let plan = reconcile(&old, &new, now()).unwrap();
        assert_eq!(
            plan.edits,
            vec![
                Edit::Close {
                    row: old[0].clone(),
                    at: ts("2012-01-01")
                },
                Edit::Insert(new[0].clone()),
            ]
        );
    }

    #[test]
    fn test_spanning_two_stored_epochs_conflicts() {
        let old = vec![
            station(46.0, "2010-01-01", Some("2015-01-01")),
            station(46.5, "2015-01-01", Some("2018-01-01")),
        ];
        let new = vec![station(47.0, "2012-01-01", None)];
        let err = reconcile(&old, &new, now()).unwrap_err();
        assert!(err.detail.contains("more than one"));
    }

    #[test]
    fn test_incoming_self_overlap_conflicts() {
        let new = vec![
            station(46.0, "2010-01-01", Some("2016-01-01")),
            station(46.5, "2015-01-01", None),
        ];
        let err = reconcile(&[], &new, now()).unwrap_err();
        assert!(err.detail.contains("each other"));
    }

    #[test]
    fn test_adjacent_identical_incoming_are_merged() {
        let new = vec![
            station(46.0, "2015-01-01", None),
            station(46.0, "2010-01-01", Some("2015-01-01")),
        ];
        let plan = reconcile(&[], &new, now()).unwrap();
        assert_eq!(
            plan.edits,
            vec![Edit::Insert(station(46.0, "2010-01-01", None))]
        );
    }

    #[test]
    fn test_missing_open_epoch_is_retired_at_now() {
        let old = vec![station(46.0, "2010-01-01", None)];
        let plan = reconcile(&old, &[], now()).unwrap();
        assert_eq!(
            plan.edits,
            vec![Edit::Close {
                row: old[0].clone(),
                at: now()
            }]
        );
    }

    #[test]
    fn test_closed_epochs_are_never_retired_again() {
        let old = vec![station(46.0, "2010-01-01", Some("2012-01-01"))];
        let plan = reconcile(&old, &[], now()).unwrap();
        assert!(plan.edits.is_empty());
    }

    #[test]
    fn test_future_open_epoch_cannot_be_retired() {
        let old = vec![station(46.0, "2030-01-01", None)];
        assert!(reconcile(&old, &[], now()).is_err());
    }

    #[test]
    fn test_open_incoming_suppresses_retirement() {
        let old = vec![
            station(46.0, "2010-01-01", Some("2015-01-01")),
            station(46.5, "2015-01-01", None),
        ];
        let new = vec![station(46.0, "2010-01-01", Some("2015-01-01"))];
        let plan = reconcile(&old, &new, now()).unwrap();
        assert_eq!(plan.counts().closed, 1);

        let new = vec![station(46.5, "2015-01-01", None)];
        let plan = reconcile(&old, &new, now()).unwrap();
        assert!(plan.is_noop());
    }

    #[test]
    fn test_keys_are_reconciled_independently() {
        let mut other = station(40.0, "2010-01-01", None);
        other.sta = "LON".into();
        let old = vec![station(46.0, "2010-01-01", None), other.clone()];
        let new = vec![station(46.0, "2010-01-01", None)];
        let plan = reconcile(&old, &new, now()).unwrap();
        let counts = plan.counts();
        assert_eq!(counts.unchanged, 1);
        assert_eq!(counts.closed, 1);
        assert_eq!(plan.edits[0].row().sta, "LON");
    }
}
