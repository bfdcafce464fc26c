/// Number of compass directions a heading is classified into.
pub const DIRECTION_COUNT: u8 = 4;

/// Angular width of one direction bucket (degrees).
pub const BUCKET_WIDTH_DEG: f64 = 90.0;

/// Wraps a heading into `[0, 360)`.
pub fn normalize_degrees(heading: f64) -> f64 {
    let h = heading.rem_euclid(360.0);
    // rem_euclid can round up to exactly 360 for tiny negative inputs.
    if h >= 360.0 { 0.0 } else { h }
}

/// Classifies a heading into one of four compass buckets.
///
/// Buckets are 1-based and ordered north, east, south, west:
/// `((round(heading / 90) mod 4) + 1)`. Exact ties (odd multiples of 45°)
/// round toward the lower bucket, so 45° is north and 135° is east.
pub fn direction_bucket(heading: f64) -> u8 {
    let quadrant = (heading / BUCKET_WIDTH_DEG - 0.5).ceil() as i64;
    quadrant.rem_euclid(DIRECTION_COUNT as i64) as u8 + 1
}

/// Heading (degrees) at the center of a 1-based direction bucket.
pub fn bucket_heading(bucket: u8) -> f64 {
    f64::from(bucket.saturating_sub(1) % DIRECTION_COUNT) * BUCKET_WIDTH_DEG
}

#[cfg(test)]
mod tests {
    use super::{bucket_heading, direction_bucket, normalize_degrees};

    #[test]
    fn buckets_match_nearest_quadrant() {
        assert_eq!(direction_bucket(0.0), 1);
        assert_eq!(direction_bucket(44.0), 1);
        assert_eq!(direction_bucket(46.0), 2);
        assert_eq!(direction_bucket(90.0), 2);
        assert_eq!(direction_bucket(180.0), 3);
        assert_eq!(direction_bucket(270.0), 4);
        assert_eq!(direction_bucket(359.0), 1);
        assert_eq!(direction_bucket(360.0), 1);
    }

    #[test]
    fn ties_round_toward_lower_bucket() {
        assert_eq!(direction_bucket(45.0), 1);
        assert_eq!(direction_bucket(135.0), 2);
        assert_eq!(direction_bucket(225.0), 3);
        assert_eq!(direction_bucket(315.0), 4);
    }

    #[test]
    fn bucket_is_invariant_under_full_turns() {
        let mut h = 0.0;
        while h < 360.0 {
            assert_eq!(direction_bucket(h), direction_bucket(h + 360.0), "heading {h}");
            assert_eq!(direction_bucket(h), direction_bucket(h - 360.0), "heading {h}");
            h += 0.5;
        }
    }

    #[test]
    fn normalize_wraps_into_range() {
        assert_eq!(normalize_degrees(370.0), 10.0);
        assert_eq!(normalize_degrees(-90.0), 270.0);
        assert_eq!(normalize_degrees(360.0), 0.0);
    }

    #[test]
    fn bucket_heading_is_center_of_bucket() {
        assert_eq!(bucket_heading(1), 0.0);
        assert_eq!(bucket_heading(2), 90.0);
        assert_eq!(bucket_heading(4), 270.0);
        for b in 1..=4 {
            assert_eq!(direction_bucket(bucket_heading(b)), b);
        }
    }
}
