//! Stock object records for the simulated world.
//!
//! Each builder produces an [`ObjectRecord`] with the marker layout and
//! approach types of the physical object.

use core::f32::consts::{FRAC_PI_2, PI};

use maneuver_types::{
    MarkerCode, ObjectId, ObjectMarker, ObjectRecord, ObjectType, Pose3d, PreActionType,
};
use nalgebra::Vector3;

/// Edge length of a light cube (mm).
pub const CUBE_SIZE_MM: f32 = 44.0;

/// Heading offsets under which a cube looks the same.
pub const CUBE_AMBIGUITIES: [f32; 4] = [0.0, FRAC_PI_2, PI, -FRAC_PI_2];

/// First marker code of a cube type. Sides use `base..base + 4`, top
/// `base + 4`, bottom `base + 5`.
const fn cube_marker_base(object_type: ObjectType) -> u16 {
    match object_type {
        ObjectType::LightCube2 => 20,
        ObjectType::LightCube3 => 30,
        _ => 10,
    }
}

/// Marker on the underside of a freshly placed cube.
pub const fn cube_bottom_marker(object_type: ObjectType) -> MarkerCode {
    MarkerCode(cube_marker_base(object_type).saturating_add(5))
}

fn face(code: u16, x: f32, y: f32, z: f32, heading: f32, types: &[PreActionType]) -> ObjectMarker {
    ObjectMarker {
        code: MarkerCode(code),
        face: Pose3d::new(x, y, z, heading),
        pre_action_types: types.to_vec(),
    }
}

fn record(object_type: ObjectType, pose: Pose3d, size: Vector3<f32>) -> ObjectRecord {
    ObjectRecord {
        id: ObjectId::new(),
        object_type,
        pose,
        size,
        markers: Vec::new(),
        top_marker: None,
        rotation_ambiguities: Vec::new(),
        times_observed: 0,
        last_observed: None,
    }
}

/// A light cube resting on the ground at `(x, y)`.
pub fn cube_record(object_type: ObjectType, x: f32, y: f32, heading: f32) -> ObjectRecord {
    let half = CUBE_SIZE_MM / 2.0;
    let base = cube_marker_base(object_type);
    let side_types = [PreActionType::Docking, PreActionType::Rolling, PreActionType::PlaceRelative];
    let mut cube = record(
        object_type,
        Pose3d::new(x, y, half, heading),
        Vector3::new(CUBE_SIZE_MM, CUBE_SIZE_MM, CUBE_SIZE_MM),
    );
    cube.markers = vec![
        face(base, half, 0.0, 0.0, 0.0, &side_types),
        face(base.saturating_add(1), 0.0, half, 0.0, FRAC_PI_2, &side_types),
        face(base.saturating_add(2), -half, 0.0, 0.0, PI, &side_types),
        face(base.saturating_add(3), 0.0, -half, 0.0, -FRAC_PI_2, &side_types),
    ];
    cube.top_marker = Some(MarkerCode(base.saturating_add(4)));
    cube.rotation_ambiguities = CUBE_AMBIGUITIES.to_vec();
    cube
}

/// A charger whose contact marker faces backwards along `heading`.
pub fn charger_record(x: f32, y: f32, heading: f32) -> ObjectRecord {
    let mut charger = record(
        ObjectType::Charger,
        Pose3d::new(x, y, 0.0, heading),
        Vector3::new(100.0, 90.0, 10.0),
    );
    charger.markers = vec![face(40, -50.0, 0.0, 20.0, PI, &[PreActionType::Entry])];
    charger
}

/// A ramp whose slope rises along `heading`.
pub fn ramp_record(x: f32, y: f32, heading: f32) -> ObjectRecord {
    let mut ramp = record(
        ObjectType::Ramp,
        Pose3d::new(x, y, 0.0, heading),
        Vector3::new(140.0, 75.0, 44.0),
    );
    ramp.markers = vec![
        face(50, -70.0, 0.0, 5.0, PI, &[PreActionType::Entry]),
        face(51, 70.0, 0.0, 44.0, 0.0, &[PreActionType::Entry]),
    ];
    ramp
}

/// A bridge spanning along `heading`.
pub fn bridge_record(object_type: ObjectType, x: f32, y: f32, heading: f32) -> ObjectRecord {
    let (length, codes) = match object_type {
        ObjectType::BridgeLong => (300.0, (62, 63)),
        _ => (200.0, (60, 61)),
    };
    let half = length / 2.0;
    let mut bridge = record(object_type, Pose3d::new(x, y, 0.0, heading), Vector3::new(length, 70.0, 20.0));
    bridge.markers = vec![
        face(codes.0, -half, 0.0, 10.0, PI, &[PreActionType::Entry]),
        face(codes.1, half, 0.0, 10.0, 0.0, &[PreActionType::Entry]),
    ];
    bridge
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_rests_on_ground() {
        let cube = cube_record(ObjectType::LightCube1, 100.0, 0.0, 0.0);
        assert!((cube.pose.z() - CUBE_SIZE_MM / 2.0).abs() < f32::EPSILON);
        assert_eq!(cube.markers.len(), 4);
        assert_eq!(cube.top_marker, Some(MarkerCode(14)));
    }

    #[test]
    fn cube_types_have_distinct_markers() {
        let a = cube_record(ObjectType::LightCube1, 0.0, 0.0, 0.0);
        let b = cube_record(ObjectType::LightCube2, 0.0, 0.0, 0.0);
        assert!(a.markers.iter().all(|m| b.marker(m.code).is_none()));
        assert_eq!(cube_bottom_marker(ObjectType::LightCube3), MarkerCode(35));
    }

    #[test]
    fn bridge_has_two_entry_markers() {
        let bridge = bridge_record(ObjectType::BridgeShort, 0.0, 0.0, 0.0);
        assert_eq!(bridge.markers.len(), 2);
        assert!(bridge.markers.iter().all(|m| m.offers(PreActionType::Entry)));
    }
}
