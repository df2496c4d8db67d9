//! Intermediate mesh representation used internally by the geometry
//! kernel before being converted to the output [`tile3d_common::Geometry`]
//! tree. Plain `glam` vectors, no renderer-specific type.

use std::collections::HashMap;

use glam::{Vec3, Vec4};

use tile3d_common::Geometry;

#[derive(Debug, Clone, Default)]
pub struct Mesh {
    pub positions: Vec<Vec3>,
    pub indices: Vec<u32>,
    pub normals: Vec<Vec3>,
    /// RGBA, one per vertex; optional — omitted entirely when unset.
    pub colors: Vec<Vec4>,
}

impl Mesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    /// Append `other`'s vertices/indices onto `self`, offsetting indices.
    pub fn append(&mut self, other: &Mesh) {
        let base = self.positions.len() as u32;
        self.positions.extend_from_slice(&other.positions);
        self.normals.extend_from_slice(&other.normals);
        self.colors.extend_from_slice(&other.colors);
        self.indices.extend(other.indices.iter().map(|i| i + base));
    }

    pub fn into_geometry(self, user_data: HashMap<String, serde_json::Value>) -> Geometry {
        let positions: Vec<f32> = self.positions.iter().flat_map(|v| [v.x, v.y, v.z]).collect();
        let indices = if self.indices.is_empty() { None } else { Some(self.indices) };
        let normals = if self.normals.is_empty() {
            None
        } else {
            Some(self.normals.iter().flat_map(|v| [v.x, v.y, v.z]).collect())
        };
        let colors = if self.colors.is_empty() {
            None
        } else {
            Some(self.colors.iter().flat_map(|c| [c.x, c.y, c.z]).collect())
        };
        Geometry::Leaf { positions, indices, normals, colors, user_data }
    }
}
