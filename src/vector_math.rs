//! Basic vector math helpers for block placement.
//! Small helpers for orientation axes, side tests and snapping.
use glam::{Quat, Vec3};

/// Returns the unit vector in the direction of `vector`.
///
/// The function checks that all components are finite and the vector is
/// non-zero before normalising. If the input is invalid or the zero vector,
/// it returns [`Vec3::ZERO`].
///
/// # Examples
///
/// ```
/// use glam::Vec3;
/// use blocksynth::vec_normalize;
/// let n = vec_normalize(Vec3::new(3.0, 0.0, 4.0));
/// assert!((n.x - 0.6).abs() < 1e-6);
/// assert!((n.z - 0.8).abs() < 1e-6);
///
/// assert_eq!(vec_normalize(Vec3::ZERO), Vec3::ZERO);
/// ```
#[must_use]
pub fn vec_normalize(vector: Vec3) -> Vec3 {
    if !vector.is_finite() {
        return Vec3::ZERO;
    }
    vector.try_normalize().unwrap_or(Vec3::ZERO)
}

/// Returns the local "right" axis (unit +X) of an orientation.
///
/// # Examples
///
/// ```
/// use glam::{Quat, Vec3};
/// use blocksynth::vector_math::right_axis;
/// let turned = right_axis(Quat::from_rotation_y(std::f32::consts::PI));
/// assert!((turned - Vec3::NEG_X).length() < 1e-6);
/// ```
#[must_use]
pub fn right_axis(orientation: Quat) -> Vec3 {
    vec_normalize(orientation * Vec3::X)
}

/// Reports whether `other` lies on the right-hand side of an anchor.
///
/// The side is the sign of the dot product between the anchor's right axis
/// and the normalised anchor-to-other direction. Coincident points (zero
/// direction) count as the left-hand side.
#[must_use]
pub fn is_right_of(anchor: Vec3, anchor_orientation: Quat, other: Vec3) -> bool {
    right_axis(anchor_orientation).dot(vec_normalize(other - anchor)) > 0.0
}

/// Position `offset` world units along the local +X axis of a left block.
#[must_use]
pub fn snap_position(left: Vec3, left_orientation: Quat, offset: f32) -> Vec3 {
    left + right_axis(left_orientation) * offset
}
