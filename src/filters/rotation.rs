use super::{smoothing_factor, Smoother};
use crate::constants::EPSILON;
use crate::types::TransformMatrix;
use nalgebra::{Matrix3, Matrix4, Rotation3, UnitQuaternion, Vector3};
use std::time::Duration;

/// Iteration cap when projecting a noisy basis onto the nearest rotation
const MAX_ORTHONORMALIZE_ITERATIONS: usize = 64;

/// Extract the unit rotation from a column-major 4x4 transform.
///
/// Translation is ignored and per-axis scale is divided out of the basis
/// columns. Returns `None` for non-finite, degenerate or mirrored matrices.
#[must_use]
pub fn rotation_from_matrix(matrix: &TransformMatrix) -> Option<UnitQuaternion<f32>> {
    if !matrix.iter().all(|v| v.is_finite()) {
        return None;
    }

    let full = Matrix4::from_column_slice(matrix);
    let mut basis: Matrix3<f32> = full.fixed_view::<3, 3>(0, 0).into_owned();
    for mut column in basis.column_iter_mut() {
        let norm = column.norm();
        if norm < EPSILON {
            return None;
        }
        column /= norm;
    }

    // Reflections and collapsed bases have no nearest proper rotation to converge to
    if basis.determinant() <= EPSILON {
        return None;
    }

    let rotation = Rotation3::from_matrix_eps(
        &basis,
        EPSILON,
        MAX_ORTHONORMALIZE_ITERATIONS,
        Rotation3::identity(),
    );
    Some(UnitQuaternion::from_rotation_matrix(&rotation))
}

/// Conjugate a rotation by the left-right mirror `M = diag(-1, 1, 1)`.
///
/// `M R M` is the rotation seen in a horizontally mirrored view. Negating a
/// single Euler angle is not equivalent once rotations are combined.
#[must_use]
pub fn mirror_rotation(rotation: &UnitQuaternion<f32>) -> UnitQuaternion<f32> {
    let mirror = Matrix3::from_diagonal(&Vector3::new(-1.0, 1.0, 1.0));
    let conjugated = mirror * rotation.to_rotation_matrix().into_inner() * mirror;
    UnitQuaternion::from_rotation_matrix(&Rotation3::from_matrix_unchecked(conjugated))
}

/// Slerp smoothing of the head orientation
#[derive(Debug, Clone)]
pub struct RotationSmoother {
    rate: f32,
    mirror: bool,
    value: Option<UnitQuaternion<f32>>,
}

impl RotationSmoother {
    /// Create a new rotation smoother
    ///
    /// # Panics
    ///
    /// Panics if rate is not a positive finite number
    #[must_use]
    pub fn new(rate: f32, mirror: bool) -> Self {
        assert!(rate.is_finite() && rate > 0.0, "Rate must be positive");
        Self {
            rate,
            mirror,
            value: None,
        }
    }

    /// Toggle mirroring; the held orientation is re-expressed in the new view
    pub fn set_mirror(&mut self, mirror: bool) {
        if mirror != self.mirror {
            self.value = self.value.as_ref().map(mirror_rotation);
            self.mirror = mirror;
        }
    }

    #[must_use]
    pub fn mirror(&self) -> bool {
        self.mirror
    }

    /// Smooth toward the orientation of a raw transform matrix.
    ///
    /// A matrix that is non-finite, degenerate or mirrored is ignored for this
    /// frame and the prior orientation is kept.
    pub fn apply_matrix(&mut self, matrix: &TransformMatrix, dt: Duration) -> Option<UnitQuaternion<f32>> {
        match rotation_from_matrix(matrix) {
            Some(target) => Some(self.apply(target, dt)),
            None => self.value,
        }
    }
}

impl Smoother for RotationSmoother {
    type Value = UnitQuaternion<f32>;

    fn apply(&mut self, target: UnitQuaternion<f32>, dt: Duration) -> UnitQuaternion<f32> {
        let target = if self.mirror { mirror_rotation(&target) } else { target };

        let next = match self.value {
            // try_slerp declines for opposite orientations; take the target then
            Some(last) => last
                .try_slerp(&target, smoothing_factor(self.rate, dt), EPSILON)
                .unwrap_or(target),
            None => target,
        };
        self.value = Some(next);
        next
    }

    fn current(&self) -> Option<UnitQuaternion<f32>> {
        self.value
    }

    fn reset(&mut self) {
        self.value = None;
    }

    fn name(&self) -> &str {
        "RotationSmoother"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nalgebra::Translation3;
    use std::f32::consts::FRAC_PI_4;

    const FRAME: Duration = Duration::from_millis(16);

    fn matrix_of(rotation: &UnitQuaternion<f32>, scale: f32, translation: Vector3<f32>) -> TransformMatrix {
        let m = Translation3::from(translation).to_homogeneous()
            * rotation.to_homogeneous()
            * Matrix4::new_nonuniform_scaling(&Vector3::repeat(scale));
        let mut out = [0.0; 16];
        out.copy_from_slice(m.as_slice());
        out
    }

    #[test]
    fn test_extract_ignores_translation_and_scale() {
        let q = UnitQuaternion::from_euler_angles(0.2, -0.4, 0.1);
        let m = matrix_of(&q, 3.5, Vector3::new(10.0, -4.0, 50.0));
        let extracted = rotation_from_matrix(&m).unwrap();
        assert!(extracted.angle_to(&q) < 1e-4);
    }

    #[test]
    fn test_extract_rejects_non_finite() {
        let mut m = matrix_of(&UnitQuaternion::identity(), 1.0, Vector3::zeros());
        m[3] = f32::INFINITY;
        assert!(rotation_from_matrix(&m).is_none());
    }

    #[test]
    fn test_extract_rejects_point_reflection() {
        let mut m = [0.0; 16];
        m[0] = -1.0;
        m[5] = -1.0;
        m[10] = -1.0;
        m[15] = 1.0;
        assert!(rotation_from_matrix(&m).is_none());
    }

    #[test]
    fn test_extract_rejects_single_axis_flip() {
        let mut m = matrix_of(&UnitQuaternion::from_euler_angles(0.1, 0.3, 0.0), 1.0, Vector3::zeros());
        for v in &mut m[8..11] {
            *v = -*v;
        }
        assert!(rotation_from_matrix(&m).is_none());
    }

    #[test]
    fn test_mirror_matches_quaternion_reflection() {
        let q = UnitQuaternion::from_euler_angles(0.3, 0.5, -0.2);
        let mirrored = mirror_rotation(&q);
        let expected = UnitQuaternion::from_quaternion(nalgebra::Quaternion::new(q.w, q.i, -q.j, -q.k));
        assert!(mirrored.angle_to(&expected) < 1e-4);
        // Mirroring twice is the identity operation
        assert!(mirror_rotation(&mirrored).angle_to(&q) < 1e-4);
    }

    #[test]
    fn test_mirror_flips_yaw() {
        let yaw = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), FRAC_PI_4);
        let (_, mirrored_yaw, _) = mirror_rotation(&yaw).euler_angles();
        assert!((mirrored_yaw + FRAC_PI_4).abs() < 1e-4);
    }

    #[test]
    fn test_first_frame_snaps() {
        let mut smoother = RotationSmoother::new(12.0, false);
        let q = UnitQuaternion::from_euler_angles(0.1, 0.2, 0.3);
        assert!(smoother.apply(q, FRAME).angle_to(&q) < 1e-6);
    }

    #[test]
    fn test_non_finite_matrix_keeps_prior() {
        let mut smoother = RotationSmoother::new(12.0, false);
        let q = UnitQuaternion::from_euler_angles(0.0, 0.5, 0.0);
        smoother.apply(q, FRAME);
        let bad = [f32::NAN; 16];
        let kept = smoother.apply_matrix(&bad, FRAME).unwrap();
        assert!(kept.angle_to(&q) < 1e-6);
    }

    #[test]
    fn test_reflected_matrix_keeps_prior() {
        let mut smoother = RotationSmoother::new(12.0, false);
        let q = UnitQuaternion::from_euler_angles(0.2, 0.0, -0.1);
        smoother.apply(q, FRAME);
        let mut flipped = [0.0; 16];
        flipped[0] = -1.0;
        flipped[5] = -1.0;
        flipped[10] = -1.0;
        flipped[15] = 1.0;
        let kept = smoother.apply_matrix(&flipped, FRAME).unwrap();
        assert!(kept.angle_to(&q) < 1e-6);
    }

    #[test]
    fn test_set_mirror_reexpresses_held_value() {
        let mut smoother = RotationSmoother::new(12.0, false);
        let q = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 0.5);
        smoother.apply(q, FRAME);
        smoother.set_mirror(true);
        let held = smoother.current().unwrap();
        assert!(held.angle_to(&mirror_rotation(&q)) < 1e-5);
    }
}
