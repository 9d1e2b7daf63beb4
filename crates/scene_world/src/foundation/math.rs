//! Math utilities and types
//!
//! Thin aliases over nalgebra plus the TRS transform used by the
//! transform component and the scene graph.

pub use nalgebra::{Matrix3, Matrix4, Quaternion, Unit, Vector3, Vector4};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type
pub type Mat3 = Matrix3<f32>;

/// 4x4 matrix type
pub type Mat4 = Matrix4<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = Unit<Quaternion<f32>>;

/// Scale factors below this magnitude are treated as degenerate when
/// decomposing a matrix.
const DEGENERATE_SCALE: f32 = 1e-8;

/// Transform representing position, rotation, and scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Position in 3D space
    pub position: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,

    /// Scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform with only position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Convert to a transformation matrix (scale, then rotate, then translate)
    pub fn to_matrix(&self) -> Mat4 {
        Mat4::new_translation(&self.position)
            * self.rotation.to_homogeneous()
            * Mat4::new_nonuniform_scaling(&self.scale)
    }

    /// Decompose an affine matrix into translation, rotation and scale.
    ///
    /// Shear is discarded. A zero scale axis yields an identity rotation
    /// for that axis rather than NaNs.
    pub fn from_matrix(matrix: &Mat4) -> Self {
        let position = Vec3::new(matrix.m14, matrix.m24, matrix.m34);

        let column = |c: usize| Vec3::new(matrix[(0, c)], matrix[(1, c)], matrix[(2, c)]);
        let (x_axis, y_axis, z_axis) = (column(0), column(1), column(2));

        let mut scale = Vec3::new(x_axis.magnitude(), y_axis.magnitude(), z_axis.magnitude());

        // A negative determinant means one axis is mirrored; fold it into x.
        if x_axis.cross(&y_axis).dot(&z_axis) < 0.0 {
            scale.x = -scale.x;
        }

        let safe = |axis: Vec3, s: f32| {
            if s.abs() > DEGENERATE_SCALE {
                axis / s
            } else {
                Vec3::zeros()
            }
        };
        let rotation_matrix = Mat3::from_columns(&[
            safe(x_axis, scale.x),
            safe(y_axis, scale.y),
            safe(z_axis, scale.z),
        ]);
        let rotation = Quat::from_matrix(&rotation_matrix);

        Self {
            position,
            rotation,
            scale,
        }
    }

    /// Apply this transform to a point
    pub fn transform_point(&self, point: Point3) -> Point3 {
        self.to_matrix().transform_point(&point)
    }
}

/// Invert an affine matrix, falling back to identity for singular input.
pub fn inverse_or_identity(matrix: &Mat4) -> Mat4 {
    matrix.try_inverse().unwrap_or_else(Mat4::identity)
}
