//! JSON material descriptor parser
//!
//! Parses the per-material JSON documents exported alongside a scene into a
//! [`Material`]. Only the Phong color channels and the transparency scalar
//! are read; every other property (integers, booleans, textures) is ignored.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;
use thiserror::Error;

use crate::foundation::math::Vec3;
use crate::render::Material;

/// Material decode and resolution errors
#[derive(Debug, Error)]
pub enum MaterialError {
    /// The document is not valid JSON or does not match the descriptor layout
    #[error("Malformed material descriptor: {0}")]
    Json(#[from] serde_json::Error),

    /// The document carries an empty `materials` table
    #[error("Material descriptor contains no definitions")]
    NoDefinitions,

    /// The material job for this id failed
    #[error("Material {id} is unavailable: {reason}")]
    Unavailable {
        /// Material id
        id: String,
        /// Failure reported by the material job
        reason: String,
    },

    /// No material job was ever scheduled for this id
    #[error("Material {0} was never scheduled")]
    NotReserved(String),
}

#[derive(Debug, Deserialize)]
struct MaterialDocument {
    #[serde(default)]
    userassets: Vec<String>,
    #[serde(default)]
    materials: BTreeMap<String, MaterialDefinition>,
}

#[derive(Debug, Default, Deserialize)]
struct MaterialDefinition {
    #[serde(default)]
    properties: Properties,
}

#[derive(Debug, Default, Deserialize)]
struct Properties {
    #[serde(default)]
    colors: HashMap<String, ColorProperty>,
    #[serde(default)]
    scalars: HashMap<String, ScalarProperty>,
}

#[derive(Debug, Deserialize)]
struct ColorProperty {
    #[serde(default)]
    values: Vec<Rgb>,
}

#[derive(Debug, Clone, Copy, Deserialize)]
struct Rgb {
    r: f32,
    g: f32,
    b: f32,
}

#[derive(Debug, Deserialize)]
struct ScalarProperty {
    #[serde(default)]
    values: Vec<f32>,
}

impl Properties {
    fn color(&self, name: &str) -> Option<Vec3> {
        self.colors
            .get(name)
            .and_then(|c| c.values.first())
            .map(|c| Vec3::new(c.r, c.g, c.b))
    }

    fn scalar(&self, name: &str) -> Option<f32> {
        self.scalars.get(name).and_then(|s| s.values.first()).copied()
    }
}

/// Material descriptor parser
pub struct MaterialParser;

impl MaterialParser {
    /// Parse a material descriptor into a [`Material`]
    ///
    /// The definition named by `userassets[0]` is used when it exists,
    /// otherwise the first definition in key order. Opacity is
    /// `1 - generic_transparency` and is stored in the alpha channel of all
    /// three colors. A missing diffuse color falls back to the ambient color.
    ///
    /// # Arguments
    /// * `contents` - Raw bytes of the JSON document
    pub fn parse(contents: &[u8]) -> Result<Material, MaterialError> {
        let document: MaterialDocument = serde_json::from_slice(contents)?;

        let definition = document
            .userassets
            .first()
            .and_then(|name| {
                let found = document.materials.get(name);
                if found.is_none() {
                    log::debug!("User asset {} has no definition, using first entry", name);
                }
                found
            })
            .or_else(|| document.materials.values().next())
            .ok_or(MaterialError::NoDefinitions)?;

        let properties = &definition.properties;
        let ambient = properties.color("generic_ambient");
        let diffuse = properties.color("generic_diffuse").or(ambient);
        let specular = properties.color("generic_specular");
        let transparency = properties.scalar("generic_transparency").unwrap_or(0.0);

        Ok(Material::from_rgb(
            ambient.unwrap_or_else(Vec3::zeros),
            diffuse.unwrap_or_else(Vec3::zeros),
            specular.unwrap_or_else(Vec3::zeros),
            1.0 - transparency,
        ))
    }

    /// Parse a material descriptor held in a string
    pub fn parse_str(contents: &str) -> Result<Material, MaterialError> {
        Self::parse(contents.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::Vec4;
    use approx::assert_relative_eq;

    const SIMPLE_PHONG: &str = r#"{
        "version": 2,
        "userassets": ["0"],
        "materials": {
            "0": {
                "tag": "",
                "definition": "SimplePhong",
                "properties": {
                    "integers": { "mode": 4 },
                    "booleans": { "generic_is_metal": false },
                    "scalars": {
                        "generic_transparency": { "units": "", "values": [0.25] }
                    },
                    "colors": {
                        "generic_diffuse": {
                            "values": [{ "r": 0.4, "g": 0.5, "b": 0.6, "a": 1 }]
                        },
                        "generic_specular": {
                            "values": [{ "r": 1.0, "g": 1.0, "b": 1.0, "a": 1 }]
                        }
                    }
                },
                "transparent": false,
                "textures": {}
            }
        }
    }"#;

    #[test]
    fn test_parse_simple_phong() {
        let material = MaterialParser::parse_str(SIMPLE_PHONG).unwrap();

        assert_relative_eq!(material.diffuse, Vec4::new(0.4, 0.5, 0.6, 0.75));
        assert_relative_eq!(material.specular, Vec4::new(1.0, 1.0, 1.0, 0.75));
        // Missing ambient is black but still carries opacity
        assert_relative_eq!(material.ambient, Vec4::new(0.0, 0.0, 0.0, 0.75));
        assert!(material.is_transparent());
    }

    #[test]
    fn test_ambient_substitutes_for_missing_diffuse() {
        let json = r#"{
            "materials": {
                "a": { "properties": { "colors": {
                    "generic_ambient": { "values": [{ "r": 0.2, "g": 0.3, "b": 0.4 }] }
                } } }
            }
        }"#;
        let material = MaterialParser::parse_str(json).unwrap();

        assert_relative_eq!(material.diffuse, Vec4::new(0.2, 0.3, 0.4, 1.0));
        assert_relative_eq!(material.opacity(), 1.0);
        assert!(!material.is_transparent());
    }

    #[test]
    fn test_user_asset_selects_definition() {
        let json = r#"{
            "userassets": ["b"],
            "materials": {
                "a": { "properties": { "colors": {
                    "generic_diffuse": { "values": [{ "r": 1.0, "g": 0.0, "b": 0.0 }] }
                } } },
                "b": { "properties": { "colors": {
                    "generic_diffuse": { "values": [{ "r": 0.0, "g": 0.0, "b": 1.0 }] }
                } } }
            }
        }"#;
        let material = MaterialParser::parse_str(json).unwrap();
        assert_relative_eq!(material.diffuse, Vec4::new(0.0, 0.0, 1.0, 1.0));
    }

    #[test]
    fn test_first_definition_without_user_assets() {
        let json = r#"{
            "userassets": ["missing"],
            "materials": {
                "z": { "properties": {} },
                "m": { "properties": { "colors": {
                    "generic_diffuse": { "values": [{ "r": 0.5, "g": 0.5, "b": 0.5 }] }
                } } }
            }
        }"#;
        let material = MaterialParser::parse_str(json).unwrap();
        // "m" sorts before "z"
        assert_relative_eq!(material.diffuse, Vec4::new(0.5, 0.5, 0.5, 1.0));
    }

    #[test]
    fn test_errors() {
        assert!(matches!(
            MaterialParser::parse_str(r#"{ "materials": {} }"#),
            Err(MaterialError::NoDefinitions)
        ));
        assert!(matches!(
            MaterialParser::parse_str("{ not json"),
            Err(MaterialError::Json(_))
        ));
    }
}
