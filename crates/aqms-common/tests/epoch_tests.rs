//! Tests for Epoch interval comparisons.

use aqms_common::{parse_timestamp, Epoch, EpochError, Timestamp};

fn ts(s: &str) -> Timestamp {
    parse_timestamp(s).unwrap()
}

fn closed(a: &str, b: &str) -> Epoch {
    Epoch::closed(ts(a), ts(b)).unwrap()
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn test_open_epoch() {
    let e = Epoch::open(ts("2010-01-01"));
    assert!(e.is_open());
    assert_eq!(e.end(), None);
}

#[test]
fn test_with_end_rejects_zero_length() {
    let e = Epoch::open(ts("2010-01-01"));
    assert!(matches!(
        e.with_end(Some(ts("2010-01-01"))),
        Err(EpochError::ZeroLength(_))
    ));
    assert!(e.with_end(Some(ts("2010-01-02"))).is_ok());
}

// ============================================================================
// Overlap
// ============================================================================

#[test]
fn test_partial_overlap() {
    let a = closed("2010-01-01", "2015-01-01");
    let b = closed("2014-01-01", "2016-01-01");
    assert!(a.overlaps(&b));
    assert!(b.overlaps(&a));
}

#[test]
fn test_containment_overlaps() {
    let outer = Epoch::open(ts("2000-01-01"));
    let inner = closed("2010-01-01", "2011-01-01");
    assert!(outer.overlaps(&inner));
    assert!(inner.overlaps(&outer));
}

#[test]
fn test_disjoint_with_gap() {
    let a = closed("2010-01-01", "2011-01-01");
    let b = closed("2012-01-01", "2013-01-01");
    assert!(!a.overlaps(&b));
    assert!(!a.is_adjacent_to(&b));
    assert!(a.precedes(&b));
    assert!(!b.precedes(&a));
}

#[test]
fn test_two_open_epochs_overlap() {
    let a = Epoch::open(ts("2010-01-01"));
    let b = Epoch::open(ts("2020-01-01"));
    assert!(a.overlaps(&b));
}

#[test]
fn test_overlap_is_symmetric_over_samples() {
    let samples = [
        closed("2010-01-01", "2012-01-01"),
        closed("2012-01-01", "2014-01-01"),
        closed("2011-01-01", "2013-01-01"),
        Epoch::open(ts("2013-06-01")),
        Epoch::open(ts("2009-01-01")),
    ];
    for a in &samples {
        for b in &samples {
            assert_eq!(a.overlaps(b), b.overlaps(a), "{} vs {}", a, b);
        }
    }
}
