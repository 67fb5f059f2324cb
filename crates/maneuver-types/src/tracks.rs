//! Body tracks an action can claim exclusively.

use serde::{Deserialize, Serialize};

/// A single exclusive-use motion resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Track {
    /// Head tilt.
    Head,
    /// Lift arm.
    Lift,
    /// Wheels / body rotation.
    Body,
}

impl Track {
    /// Every track, in bit order.
    pub const ALL: [Self; 3] = [Self::Head, Self::Lift, Self::Body];

    const fn bit(self) -> u8 {
        match self {
            Self::Head => 0b001,
            Self::Lift => 0b010,
            Self::Body => 0b100,
        }
    }
}

/// Set of [`Track`]s, stored as a bit mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct TrackSet(u8);

impl TrackSet {
    /// No tracks.
    pub const EMPTY: Self = Self(0);
    /// Head only.
    pub const HEAD: Self = Self(Track::Head.bit());
    /// Lift only.
    pub const LIFT: Self = Self(Track::Lift.bit());
    /// Body only.
    pub const BODY: Self = Self(Track::Body.bit());
    /// Head, lift and body.
    pub const ALL: Self = Self(0b111);

    /// Union of two sets.
    #[must_use]
    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    /// Tracks in `self` that are not in `other`.
    #[must_use]
    pub const fn without(self, other: Self) -> Self {
        Self(self.0 & !other.0)
    }

    /// Whether the set contains `track`.
    pub const fn contains(self, track: Track) -> bool {
        self.0 & track.bit() != 0
    }

    /// Whether the two sets share any track.
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    /// Whether the set is empty.
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterate over the tracks in the set.
    pub fn iter(self) -> impl Iterator<Item = Track> {
        Track::ALL.into_iter().filter(move |t| self.contains(*t))
    }
}

impl From<Track> for TrackSet {
    fn from(track: Track) -> Self {
        Self(track.bit())
    }
}

impl core::fmt::Display for TrackSet {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let names: Vec<&str> = self
            .iter()
            .map(|t| match t {
                Track::Head => "head",
                Track::Lift => "lift",
                Track::Body => "body",
            })
            .collect();
        if names.is_empty() {
            write!(f, "none")
        } else {
            write!(f, "{}", names.join("|"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn union_and_without() {
        let set = TrackSet::HEAD.union(TrackSet::LIFT);
        assert!(set.contains(Track::Head));
        assert!(set.contains(Track::Lift));
        assert!(!set.contains(Track::Body));
        assert_eq!(TrackSet::ALL.without(TrackSet::BODY), set);
    }

    #[test]
    fn intersection_detects_overlap() {
        assert!(TrackSet::ALL.intersects(TrackSet::LIFT));
        assert!(!TrackSet::HEAD.intersects(TrackSet::BODY));
        assert!(!TrackSet::EMPTY.intersects(TrackSet::ALL));
    }

    #[test]
    fn display_lists_tracks() {
        assert_eq!(TrackSet::ALL.to_string(), "head|lift|body");
        assert_eq!(TrackSet::EMPTY.to_string(), "none");
    }
}
