//! Type-safe identifier wrappers.
//!
//! Objects in the world model are identified by UUID v7 (time-ordered)
//! newtypes so that they can never be confused with other identifiers.
//! Action tags, marker codes, and face-layer tags are small integer
//! newtypes because they are allocated by the robot process itself.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generates a newtype wrapper around [`Uuid`] with standard derives.
macro_rules! define_id {
    (
        $(#[$meta:meta])*
        $name:ident
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Create a new identifier using UUID v7 (time-ordered).
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Return the inner [`Uuid`] value.
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id! {
    /// Unique identifier for an object known to the world model.
    ObjectId
}

// ---------------------------------------------------------------------------
// Action tags
// ---------------------------------------------------------------------------

/// Correlation tag of an action.
///
/// Tags are opaque integers used to match asynchronous completion events
/// to the action that produced them. They are handed out by the tag
/// registry of the robot that runs the action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActionTag(pub u32);

impl ActionTag {
    /// Sentinel meaning "no tag assigned".
    pub const INVALID: Self = Self(0);

    /// Return the raw tag value.
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Whether this tag is a real, assigned tag.
    pub const fn is_valid(self) -> bool {
        self.0 != Self::INVALID.0
    }
}

impl core::fmt::Display for ActionTag {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Markers
// ---------------------------------------------------------------------------

/// Code of a fiducial marker printed on an object face.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MarkerCode(pub u16);

impl MarkerCode {
    /// Wildcard code that matches any marker.
    pub const ANY: Self = Self(u16::MAX);

    /// Whether `other` satisfies this code used as a filter.
    ///
    /// [`MarkerCode::ANY`] on either side matches everything.
    pub const fn matches(self, other: Self) -> bool {
        self.0 == Self::ANY.0 || other.0 == Self::ANY.0 || self.0 == other.0
    }

    /// Whether this is the wildcard code.
    pub const fn is_any(self) -> bool {
        self.0 == Self::ANY.0
    }
}

impl core::fmt::Display for MarkerCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        if self.is_any() {
            write!(f, "ANY")
        } else {
            write!(f, "M{}", self.0)
        }
    }
}

/// Handle of a persistent face overlay layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct FaceLayerTag(pub u32);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_ids_are_unique() {
        let a = ObjectId::new();
        let b = ObjectId::new();
        assert_ne!(a, b);
        assert_ne!(a.into_inner(), Uuid::nil());
    }

    #[test]
    fn object_id_display_matches_uuid() {
        let id = ObjectId::new();
        assert_eq!(id.to_string(), id.into_inner().to_string());
    }

    #[test]
    fn any_marker_matches_everything() {
        assert!(MarkerCode::ANY.matches(MarkerCode(3)));
        assert!(MarkerCode(3).matches(MarkerCode::ANY));
        assert!(MarkerCode(3).matches(MarkerCode(3)));
        assert!(!MarkerCode(3).matches(MarkerCode(4)));
    }

    #[test]
    fn invalid_tag_is_not_valid() {
        assert!(!ActionTag::INVALID.is_valid());
        assert!(ActionTag(7).is_valid());
    }
}
