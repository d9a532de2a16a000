use glam::{EulerRot, Mat4, Quat, Vec3};

#[derive(Clone, Copy, Debug)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Self = Self {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
        scale: Vec3::ONE,
    };

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }

    pub fn from_trs(t: Vec3, r: Quat, s: Vec3) -> Self {
        Self {
            translation: t,
            rotation: r,
            scale: s,
        }
    }

    /// Build from descriptor fields: position, intrinsic XYZ euler rotation
    /// in radians, and a per-axis scale.
    pub fn from_descriptor(position: [f32; 3], rotation: [f32; 3], scale: Vec3) -> Self {
        Self {
            translation: Vec3::from(position),
            rotation: Quat::from_euler(EulerRot::XYZ, rotation[0], rotation[1], rotation[2]),
            scale,
        }
    }
}
