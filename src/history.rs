//! synthetic hourly history
//!
//! purely random readings, most recent first. nothing here touches the
//! store or the mock state.

use chrono::{DateTime, Duration, Local};
use rand::Rng;

use crate::domain::{iso_timestamp, SensorReading};

/// `hours` readings spaced one hour apart, starting at `now`
pub fn generate(hours: u32, now: DateTime<Local>) -> Vec<SensorReading> {
    let mut rng = rand::rng();
    (0..hours)
        .map(|i| SensorReading {
            timestamp: iso_timestamp(now - Duration::hours(i64::from(i))),
            water_level: rng.random_range(5.0..=7.0),
            temperature: rng.random_range(70..=90),
            humidity: rng.random_range(40..=80),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descending_hourly_within_ranges() {
        let now = Local::now();
        let records = generate(3, now);
        assert_eq!(records.len(), 3);

        let stamps: Vec<_> = records
            .iter()
            .map(|r| DateTime::parse_from_rfc3339(&r.timestamp).unwrap())
            .collect();
        assert_eq!(stamps[0] - stamps[1], Duration::hours(1));
        assert_eq!(stamps[1] - stamps[2], Duration::hours(1));

        for r in &records {
            assert!((5.0..=7.0).contains(&r.water_level));
            assert!((70..=90).contains(&r.temperature));
            assert!((40..=80).contains(&r.humidity));
        }
    }

    #[test]
    fn zero_hours_is_empty() {
        assert!(generate(0, Local::now()).is_empty());
    }

    #[test]
    fn values_vary_between_calls() {
        let now = Local::now();
        let a = generate(5, now);
        let b = generate(5, now);
        // same timestamps, random values: 5 float draws colliding is effectively impossible
        assert_ne!(a, b);
    }
}
