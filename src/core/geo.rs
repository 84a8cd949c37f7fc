use crate::domain::model::Coordinate;
use rand::Rng;

/// Dokuz Eylul Tinaztepe campus, the fixed reference point check-ins are
/// submitted from.
pub const CAMPUS_ANCHOR: Coordinate = Coordinate {
    latitude: 38.36715,
    longitude: 27.203146,
};

/// Offset magnitude bounds in degrees. 0.000009 degrees is roughly one
/// meter, so each submission lands 1-2 meters away from the anchor and the
/// exact anchor is never sent.
const MIN_OFFSET_DEG: f64 = 0.000009;
const MAX_OFFSET_DEG: f64 = 0.000018;

/// Produces a slightly different coordinate near a fixed anchor on every
/// call, so the portal never sees the same location twice in a row.
#[derive(Debug, Clone)]
pub struct GeolocationJitter {
    anchor: Coordinate,
    last: Option<Coordinate>,
}

impl GeolocationJitter {
    pub fn new(anchor: Coordinate) -> Self {
        Self { anchor, last: None }
    }

    pub fn campus() -> Self {
        Self::new(CAMPUS_ANCHOR)
    }

    pub fn anchor(&self) -> Coordinate {
        self.anchor
    }

    /// One jittered coordinate: each axis gets an independent offset in
    /// [MIN_OFFSET_DEG, MAX_OFFSET_DEG] with an independent random sign,
    /// rounded to the portal's 8-decimal precision. Re-rolls if the result
    /// happens to collide with the previous call.
    pub fn next_coordinate(&mut self) -> Coordinate {
        loop {
            let coord = self.roll();
            if self.last != Some(coord) {
                self.last = Some(coord);
                return coord;
            }
        }
    }

    fn roll(&self) -> Coordinate {
        let mut rng = rand::thread_rng();

        let lat_offset = rng.gen_range(MIN_OFFSET_DEG..=MAX_OFFSET_DEG);
        let lon_offset = rng.gen_range(MIN_OFFSET_DEG..=MAX_OFFSET_DEG);
        let lat_sign = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };
        let lon_sign = if rng.gen_bool(0.5) { 1.0 } else { -1.0 };

        Coordinate {
            latitude: round8(self.anchor.latitude + lat_offset * lat_sign),
            longitude: round8(self.anchor.longitude + lon_offset * lon_sign),
        }
    }
}

fn round8(value: f64) -> f64 {
    (value * 1e8).round() / 1e8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jitter_stays_within_radius() {
        let mut jitter = GeolocationJitter::campus();
        // Max offset is ~2m per axis, so anything under 3m diagonal is fine.
        for _ in 0..10_000 {
            let coord = jitter.next_coordinate();
            let distance = coord.distance_meters(&CAMPUS_ANCHOR);
            assert!(distance < 3.0, "coordinate {} drifted {}m", coord, distance);
        }
    }

    #[test]
    fn test_jitter_never_returns_the_anchor() {
        let mut jitter = GeolocationJitter::campus();
        for _ in 0..10_000 {
            let coord = jitter.next_coordinate();
            assert!(
                coord.distance_meters(&CAMPUS_ANCHOR) > 0.5,
                "coordinate {} is the anchor itself",
                coord
            );
        }
    }

    #[test]
    fn test_consecutive_coordinates_differ() {
        let mut jitter = GeolocationJitter::campus();
        let mut previous = jitter.next_coordinate();
        for _ in 0..10_000 {
            let next = jitter.next_coordinate();
            assert_ne!(previous.to_string(), next.to_string());
            previous = next;
        }
    }

    #[test]
    fn test_jitter_respects_custom_anchor() {
        let anchor = Coordinate::new(40.0, 29.0);
        let mut jitter = GeolocationJitter::new(anchor);
        let coord = jitter.next_coordinate();
        assert!(coord.distance_meters(&anchor) < 3.0);
    }
}
