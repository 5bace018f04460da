//! Parsing and representation of stencil parameters.

use serde::{Deserialize, Serialize};

/// Represents a point in the sky.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// ICRS ra in degrees
    pub ra: f64,

    /// ICRS dec in degrees
    pub dec: f64,
}

/// Represents a range of values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Range {
    pub min: f64,
    pub max: f64,
}

/// A cutout stencil.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Stencil {
    /// A circular stencil
    Circle { center: Point, radius: f64 },

    /// A polygon stencil.
    ///
    /// Polygon winding must be counter-clockwise when viewed from the
    /// origin towards the sky.
    Polygon {
        #[serde(deserialize_with = "at_least_three")]
        vertices: Vec<Point>,
    },

    /// A range of ra and dec values
    Range { ra: Range, dec: Range },
}

fn at_least_three<'de, D>(deserializer: D) -> Result<Vec<Point>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let vertices = Vec::<Point>::deserialize(deserializer)?;
    if vertices.len() < 3 {
        return Err(serde::de::Error::custom(
            "Polygon must have at least three vertices",
        ));
    }
    Ok(vertices)
}
