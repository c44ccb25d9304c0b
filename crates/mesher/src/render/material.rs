//! Phong-style material colors resolved from a material descriptor

use crate::foundation::math::{Vec3, Vec4};

/// Ambient, diffuse and specular colors of a surface
///
/// The alpha channel of every color carries the material opacity. Materials
/// are resolved once per id and shared read-only by every fragment using them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    /// Ambient color, alpha = opacity
    pub ambient: Vec4,
    /// Diffuse color, alpha = opacity
    pub diffuse: Vec4,
    /// Specular color, alpha = opacity
    pub specular: Vec4,
}

impl Material {
    /// All-zero material (black and fully transparent)
    pub fn empty() -> Self {
        Self {
            ambient: Vec4::zeros(),
            diffuse: Vec4::zeros(),
            specular: Vec4::zeros(),
        }
    }

    /// Build a material from RGB triples and a shared opacity
    pub fn from_rgb(ambient: Vec3, diffuse: Vec3, specular: Vec3, opacity: f32) -> Self {
        Self {
            ambient: ambient.push(opacity),
            diffuse: diffuse.push(opacity),
            specular: specular.push(opacity),
        }
    }

    /// Opacity shared by all three colors
    pub fn opacity(&self) -> f32 {
        self.diffuse.w
    }

    /// Whether the material lets anything through
    pub fn is_transparent(&self) -> bool {
        self.opacity() < 1.0
    }
}

impl Default for Material {
    fn default() -> Self {
        Self::empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_rgb_shares_opacity() {
        let m = Material::from_rgb(
            Vec3::new(0.1, 0.1, 0.1),
            Vec3::new(0.4, 0.5, 0.6),
            Vec3::new(1.0, 1.0, 1.0),
            0.25,
        );
        assert_eq!(m.ambient.w, 0.25);
        assert_eq!(m.diffuse, Vec4::new(0.4, 0.5, 0.6, 0.25));
        assert_eq!(m.specular.w, 0.25);
        assert!(m.is_transparent());
    }

    #[test]
    fn test_empty() {
        assert_eq!(Material::default(), Material::empty());
        assert_eq!(Material::empty().opacity(), 0.0);
    }
}
