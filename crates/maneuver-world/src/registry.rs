//! Track-lock and action-tag registries.
//!
//! Both live on the robot rather than in statics: whoever owns the robot
//! owns its locks and its tag space.

use std::collections::{BTreeMap, BTreeSet};

use maneuver_types::{ActionTag, Track, TrackSet};
use tracing::debug;

use crate::error::WorldError;

// ---------------------------------------------------------------------------
// Track locks
// ---------------------------------------------------------------------------

/// Per-track owner sets for animation locks and ignored movement.
///
/// A track is locked while at least one owner holds it. Locks are
/// reference-style: every `lock` must be paired with an `unlock` by the
/// same tag.
#[derive(Debug, Clone, Default)]
pub struct TrackLocks {
    locked: BTreeMap<Track, BTreeSet<ActionTag>>,
    ignored: BTreeMap<Track, BTreeSet<ActionTag>>,
}

impl TrackLocks {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Lock `tracks` on behalf of `owner`.
    pub fn lock(&mut self, tracks: TrackSet, owner: ActionTag) {
        for track in tracks.iter() {
            self.locked.entry(track).or_default().insert(owner);
        }
        if !tracks.is_empty() {
            debug!(%tracks, %owner, "Tracks locked");
        }
    }

    /// Release the locks `owner` holds on `tracks`.
    pub fn unlock(&mut self, tracks: TrackSet, owner: ActionTag) {
        release(&mut self.locked, tracks, owner);
        if !tracks.is_empty() {
            debug!(%tracks, %owner, "Tracks unlocked");
        }
    }

    /// Ignore movement on `tracks` on behalf of `owner`.
    pub fn ignore_movement(&mut self, tracks: TrackSet, owner: ActionTag) {
        for track in tracks.iter() {
            self.ignored.entry(track).or_default().insert(owner);
        }
    }

    /// Stop ignoring movement on `tracks` on behalf of `owner`.
    pub fn unignore_movement(&mut self, tracks: TrackSet, owner: ActionTag) {
        release(&mut self.ignored, tracks, owner);
    }

    /// Whether any owner holds `track`.
    pub fn is_locked(&self, track: Track) -> bool {
        self.locked.get(&track).is_some_and(|owners| !owners.is_empty())
    }

    /// Whether movement on `track` is currently ignored.
    pub fn is_movement_ignored(&self, track: Track) -> bool {
        self.ignored.get(&track).is_some_and(|owners| !owners.is_empty())
    }

    /// The set of currently locked tracks.
    pub fn locked_tracks(&self) -> TrackSet {
        Track::ALL
            .into_iter()
            .filter(|t| self.is_locked(*t))
            .fold(TrackSet::EMPTY, |set, t| set.union(t.into()))
    }

    /// Owners of a track's lock.
    pub fn owners(&self, track: Track) -> Vec<ActionTag> {
        self.locked
            .get(&track)
            .map(|owners| owners.iter().copied().collect())
            .unwrap_or_default()
    }
}

fn release(map: &mut BTreeMap<Track, BTreeSet<ActionTag>>, tracks: TrackSet, owner: ActionTag) {
    for track in tracks.iter() {
        if let Some(owners) = map.get_mut(&track) {
            owners.remove(&owner);
            if owners.is_empty() {
                map.remove(&track);
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Action tags
// ---------------------------------------------------------------------------

/// Hands out unique action tags.
///
/// Automatic tags count upwards and skip any tag already in use, including
/// tags claimed explicitly by callers.
#[derive(Debug, Clone)]
pub struct TagRegistry {
    next: u32,
    in_use: BTreeSet<ActionTag>,
}

impl Default for TagRegistry {
    fn default() -> Self {
        Self {
            next: 1,
            in_use: BTreeSet::new(),
        }
    }
}

impl TagRegistry {
    /// Create a registry whose first automatic tag is 1.
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next free automatic tag.
    pub fn next_tag(&mut self) -> Result<ActionTag, WorldError> {
        for _ in 0..=u32::MAX {
            let candidate = ActionTag(self.next);
            self.next = self.next.checked_add(1).unwrap_or(1);
            if candidate.is_valid() && self.in_use.insert(candidate) {
                return Ok(candidate);
            }
        }
        Err(WorldError::TagsExhausted)
    }

    /// Claim a specific tag.
    pub fn claim(&mut self, tag: ActionTag) -> Result<(), WorldError> {
        if !tag.is_valid() || !self.in_use.insert(tag) {
            return Err(WorldError::TagInUse(tag));
        }
        Ok(())
    }

    /// Return a tag to the pool.
    pub fn release(&mut self, tag: ActionTag) {
        self.in_use.remove(&tag);
    }

    /// Whether the tag is currently in use.
    pub fn is_in_use(&self, tag: ActionTag) -> bool {
        self.in_use.contains(&tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn locks_are_per_owner() {
        let mut locks = TrackLocks::new();
        locks.lock(TrackSet::HEAD.union(TrackSet::LIFT), ActionTag(1));
        locks.lock(TrackSet::LIFT, ActionTag(2));
        locks.unlock(TrackSet::HEAD.union(TrackSet::LIFT), ActionTag(1));
        assert!(!locks.is_locked(Track::Head));
        assert!(locks.is_locked(Track::Lift));
        assert_eq!(locks.owners(Track::Lift), vec![ActionTag(2)]);
        locks.unlock(TrackSet::LIFT, ActionTag(2));
        assert_eq!(locks.locked_tracks(), TrackSet::EMPTY);
    }

    #[test]
    fn ignored_movement_tracks_release() {
        let mut locks = TrackLocks::new();
        locks.ignore_movement(TrackSet::BODY, ActionTag(3));
        assert!(locks.is_movement_ignored(Track::Body));
        locks.unignore_movement(TrackSet::BODY, ActionTag(3));
        assert!(!locks.is_movement_ignored(Track::Body));
    }

    #[test]
    fn automatic_tags_skip_claimed_ones() {
        let mut tags = TagRegistry::new();
        assert!(tags.claim(ActionTag(2)).is_ok());
        assert_eq!(tags.next_tag().ok(), Some(ActionTag(1)));
        assert_eq!(tags.next_tag().ok(), Some(ActionTag(3)));
    }

    #[test]
    fn claiming_a_used_tag_fails() {
        let mut tags = TagRegistry::new();
        let first = tags.next_tag().ok();
        assert_eq!(first, Some(ActionTag(1)));
        assert_eq!(tags.claim(ActionTag(1)), Err(WorldError::TagInUse(ActionTag(1))));
        tags.release(ActionTag(1));
        assert!(tags.claim(ActionTag(1)).is_ok());
    }

    #[test]
    fn invalid_tag_cannot_be_claimed() {
        let mut tags = TagRegistry::new();
        assert!(tags.claim(ActionTag::INVALID).is_err());
    }
}
