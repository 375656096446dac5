//! Owner ids and team colours.

/// Player/faction identifier carried by every [`Unit`](crate::components::Unit).
pub type OwnerId = i32;

/// Reserved owner id for unowned (neutral) units and buildings.
pub const NEUTRAL_OWNER_ID: OwnerId = -1;

/// Whether `owner` is the neutral sentinel.
#[inline]
pub fn is_neutral(owner: OwnerId) -> bool {
    owner == NEUTRAL_OWNER_ID
}

/// Colour used for owners without a dedicated team colour.
pub const DEFAULT_TEAM_COLOR: [f32; 3] = [0.8, 0.9, 1.0];

/// RGB team colour for an owner. Total: unknown ids get [`DEFAULT_TEAM_COLOR`].
pub fn team_color(owner: OwnerId) -> [f32; 3] {
    match owner {
        1 => [0.20, 0.55, 1.00],
        2 => [1.00, 0.30, 0.30],
        3 => [0.20, 0.80, 0.40],
        4 => [1.00, 0.80, 0.20],
        _ => DEFAULT_TEAM_COLOR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_owners_have_distinct_colors() {
        let colors: Vec<[f32; 3]> = (1..=4).map(team_color).collect();
        for (i, a) in colors.iter().enumerate() {
            for b in &colors[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn unknown_and_neutral_fall_back() {
        assert_eq!(team_color(NEUTRAL_OWNER_ID), DEFAULT_TEAM_COLOR);
        assert_eq!(team_color(99), DEFAULT_TEAM_COLOR);
        assert!(is_neutral(-1));
        assert!(!is_neutral(0));
    }
}
