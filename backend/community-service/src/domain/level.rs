/// Gamification level derivation.
///
/// The derivation is shared with leaderboards in other services and must
/// stay byte-for-byte reproducible:
///   level(points)      = floor(sqrt(points) / 10) + 1
///   points_for_level(L) = ((L - 1) * 10)^2
///   progress            = percentage of the current level's point band,
///                         reset to 0 on level-up
use super::models::MembershipLevel;

/// Level implied by a points total
pub fn level_for_points(points: i64) -> i32 {
    ((points.max(0) as f64).sqrt() / 10.0).floor() as i32 + 1
}

/// Points at which `level` begins
pub fn points_for_level(level: i32) -> i64 {
    let base = (level.max(1) as i64 - 1) * 10;
    base * base
}

/// Apply a non-negative point delta and rederive level and progress.
pub fn apply_points(current: &MembershipLevel, delta: i64) -> MembershipLevel {
    let points = current.points + delta;
    let new_level = level_for_points(points);

    if new_level > current.current_level {
        return MembershipLevel {
            points,
            current_level: new_level,
            progress: 0,
        };
    }

    let lower = points_for_level(current.current_level);
    let upper = points_for_level(current.current_level + 1);
    let band = (upper - lower).max(1);
    let progress = (((points - lower) * 100) / band).clamp(0, 100) as i32;

    MembershipLevel {
        points,
        current_level: current.current_level,
        progress,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_thresholds() {
        assert_eq!(level_for_points(0), 1);
        assert_eq!(level_for_points(99), 1);
        assert_eq!(level_for_points(100), 2);
        assert_eq!(level_for_points(399), 2);
        assert_eq!(level_for_points(400), 3);
        assert_eq!(points_for_level(1), 0);
        assert_eq!(points_for_level(2), 100);
        assert_eq!(points_for_level(3), 400);
    }

    #[test]
    fn zero_delta_is_a_fixed_point() {
        let level = MembershipLevel {
            points: 57,
            current_level: 1,
            progress: 57,
        };
        assert_eq!(apply_points(&level, 0), level);
    }

    #[test]
    fn progress_is_the_percentage_of_the_current_band() {
        let start = MembershipLevel::default();
        let halfway = apply_points(&start, 50);
        assert_eq!(halfway.current_level, 1);
        assert_eq!(halfway.progress, 50);

        // level 2 band is [100, 400): 175 points = 25% through
        let l2 = MembershipLevel {
            points: 150,
            current_level: 2,
            progress: 16,
        };
        let moved = apply_points(&l2, 25);
        assert_eq!(moved.current_level, 2);
        assert_eq!(moved.progress, 25);
    }

    #[test]
    fn level_up_resets_progress() {
        let start = MembershipLevel {
            points: 90,
            current_level: 1,
            progress: 90,
        };
        let leveled = apply_points(&start, 20);
        assert_eq!(leveled.points, 110);
        assert_eq!(leveled.current_level, 2);
        assert_eq!(leveled.progress, 0);
    }

    #[test]
    fn derivation_is_deterministic() {
        let mut a = MembershipLevel::default();
        let mut b = MembershipLevel::default();
        for delta in [10, 25, 0, 90, 300, 5] {
            a = apply_points(&a, delta);
            b = apply_points(&b, delta);
        }
        assert_eq!(a, b);
        assert_eq!(a.points, 430);
        assert_eq!(a.current_level, level_for_points(430));
    }

    #[test]
    fn progress_never_leaves_its_bounds() {
        let mut level = MembershipLevel::default();
        for _ in 0..200 {
            level = apply_points(&level, 7);
            assert!((0..=100).contains(&level.progress));
            assert!(level.current_level >= 1);
        }
    }
}
