//! Seeded generators for epoch histories.
//!
//! Property-style tests draw many epoch sets from a fixed seed so a
//! failing case can be replayed.

use aqms_common::{Epoch, StationRow, Timestamp};
use chrono::{Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Generator for a property test. Same seed, same histories.
pub fn seeded(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Day `n` after 2000-01-01.
pub fn day(n: i64) -> Timestamp {
    Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0).unwrap() + Duration::days(n)
}

/// A valid, non-overlapping history of `len` epochs separated by random
/// gaps (often zero). The last one is open with probability `open`.
pub fn epoch_history<R: Rng>(rng: &mut R, len: usize, open: f64) -> Vec<Epoch> {
    let mut epochs = Vec::with_capacity(len);
    let mut cursor: i64 = rng.gen_range(0..30);
    for i in 0..len {
        let start = cursor;
        let end = start + rng.gen_range(1..=400);
        if i + 1 == len && rng.gen_bool(open) {
            epochs.push(Epoch::open(day(start)));
        } else {
            epochs.push(Epoch::closed(day(start), day(end)).expect("Generated epoch is valid"));
        }
        cursor = if rng.gen_bool(0.4) {
            end
        } else {
            end + rng.gen_range(1..120)
        };
    }
    epochs
}

/// Station rows for UW.RATT over `epochs`. Latitude comes from a small
/// set so neighbors sometimes share a payload.
pub fn station_history<R: Rng>(rng: &mut R, epochs: &[Epoch]) -> Vec<StationRow> {
    epochs
        .iter()
        .map(|epoch| StationRow {
            net: "UW".into(),
            sta: "RATT".into(),
            epoch: *epoch,
            lat: 46.0 + f64::from(rng.gen_range(0u8..3)) * 0.1,
            lon: -119.5,
            elev: 1050.0,
            staname: None,
        })
        .collect()
}

/// A random valid UW.RATT station history of 1 to `max_len` epochs.
pub fn random_station_history<R: Rng>(rng: &mut R, max_len: usize) -> Vec<StationRow> {
    let len = rng.gen_range(1..=max_len.max(1));
    let epochs = epoch_history(rng, len, 0.6);
    station_history(rng, &epochs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_history() {
        let a = random_station_history(&mut seeded(7), 5);
        let b = random_station_history(&mut seeded(7), 5);
        assert_eq!(a, b);
    }

    #[test]
    fn test_histories_never_overlap() {
        let mut rng = seeded(42);
        for _ in 0..200 {
            let epochs = epoch_history(&mut rng, 6, 0.5);
            for pair in epochs.windows(2) {
                assert!(!pair[0].overlaps(&pair[1]));
                assert!(pair[0].start() < pair[1].start());
            }
        }
    }

    #[test]
    fn test_only_last_epoch_may_be_open() {
        let mut rng = seeded(3);
        for _ in 0..100 {
            let epochs = epoch_history(&mut rng, 4, 1.0);
            assert!(epochs[..3].iter().all(|e| !e.is_open()));
            assert!(epochs[3].is_open());
        }
    }

    #[test]
    fn test_history_length_bounds() {
        let mut rng = seeded(11);
        for _ in 0..100 {
            let rows = random_station_history(&mut rng, 3);
            assert!((1..=3).contains(&rows.len()));
        }
    }
}
