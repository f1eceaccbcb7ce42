use bevy::math::bounding::Aabb3d;
use bevy::prelude::*;
use bevy::render::mesh::{Indices, PrimitiveTopology};
use bevy::render::render_asset::RenderAssetUsages;

use super::tiles::MeshChunk;

fn empty_mesh() -> Mesh {
    Mesh::new(
        PrimitiveTopology::TriangleList,
        RenderAssetUsages::MAIN_WORLD | RenderAssetUsages::RENDER_WORLD,
    )
}

impl MeshChunk {
    /// Renderable ground mesh, positions relative to `offset`.
    pub fn to_mesh(&self) -> Mesh {
        let mut mesh = empty_mesh();
        mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, self.positions.clone());
        mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, self.normals.clone());
        mesh.insert_attribute(Mesh::ATTRIBUTE_UV_0, self.uvs.clone());
        mesh.insert_indices(Indices::U16(self.indices.clone()));
        mesh
    }
}

// build a closed box from a model's local bounds, z up
pub fn box_mesh(bounds: &Aabb3d) -> Mesh {
    let min = Vec3::from(bounds.min);
    let max = Vec3::from(bounds.max);
    if max.x <= min.x || max.y <= min.y || max.z <= min.z {
        return empty_mesh();
    }

    let mut positions = Vec::new();
    let mut normals = Vec::new();
    let mut uvs = Vec::new();
    let mut indices: Vec<u32> = Vec::new();

    // footprint, counter-clockwise seen from above
    let outline = [
        Vec2::new(min.x, min.y),
        Vec2::new(max.x, min.y),
        Vec2::new(max.x, max.y),
        Vec2::new(min.x, max.y),
    ];
    let height = max.z - min.z;

    // walls
    for i in 0..outline.len() {
        let v1 = outline[i];
        let v2 = outline[(i + 1) % outline.len()];
        let edge = v2 - v1;
        let normal = Vec2::new(edge.y, -edge.x).normalize();
        let base = positions.len() as u32;

        positions.extend([
            [v1.x, v1.y, min.z],
            [v2.x, v2.y, min.z],
            [v1.x, v1.y, max.z],
            [v2.x, v2.y, max.z],
        ]);
        normals.extend([[normal.x, normal.y, 0.0]; 4]);

        let length = edge.length();
        uvs.extend([[0.0, 0.0], [length, 0.0], [0.0, height], [length, height]]);

        indices.extend([base, base + 1, base + 2]);
        indices.extend([base + 1, base + 3, base + 2]);
    }

    // roof
    let base = positions.len() as u32;
    for v in outline {
        positions.push([v.x, v.y, max.z]);
        normals.push([0.0, 0.0, 1.0]);
        uvs.push([v.x - min.x, v.y - min.y]);
    }
    indices.extend([base, base + 1, base + 2, base, base + 2, base + 3]);

    let mut mesh = empty_mesh();
    mesh.insert_attribute(Mesh::ATTRIBUTE_POSITION, positions);
    mesh.insert_attribute(Mesh::ATTRIBUTE_NORMAL, normals);
    mesh.insert_attribute(Mesh::ATTRIBUTE_UV_0, uvs);
    mesh.insert_indices(Indices::U32(indices));
    mesh
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::city::procgen::tiles::{chunk_meshes, Tile, TileGrid};
    use crate::systems::city::procgen::utils::aabb_from_corners;

    #[test]
    fn chunk_mesh_keeps_u16_indices() {
        let tiles = TileGrid::new(4, 3, Tile::Curb).unwrap();
        let chunk = &chunk_meshes(&tiles, 32)[0];
        let mesh = chunk.to_mesh();
        assert_eq!(mesh.count_vertices(), 4 * 3 * 4);
        assert!(matches!(mesh.indices(), Some(Indices::U16(i)) if i.len() == 4 * 3 * 6));
    }

    #[test]
    fn box_has_walls_and_roof() {
        let mesh = box_mesh(&aabb_from_corners(Vec3::ZERO, Vec3::new(2.0, 1.0, 3.0)));
        assert_eq!(mesh.count_vertices(), 4 * 4 + 4);
        assert_eq!(mesh.indices().map(|i| i.len()), Some(5 * 6));

        let flat = box_mesh(&aabb_from_corners(Vec3::ZERO, Vec3::new(2.0, 1.0, 0.0)));
        assert_eq!(flat.count_vertices(), 0);
    }
}
