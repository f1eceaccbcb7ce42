use bevy::prelude::*;

use super::cells::CellGrid;
use super::road::{Intersection, RoadNetwork};
use super::utils::Dir;
use crate::config::{ATLAS_COLUMNS, ATLAS_ROWS, MAX_CHUNK_SIZE, TILE_ATLAS};

/// Ground tile types. The discriminant indexes the texture atlas table.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default, Hash)]
pub enum Tile {
    #[default]
    Empty = 0,
    Lot = 1,
    Intersection = 2,
    RoadVertical = 3,
    RoadHorizontal = 4,
    Curb = 5,
}

impl Tile {
    pub fn ascii(self) -> char {
        match self {
            Tile::Empty => ' ',
            Tile::Lot => '#',
            Tile::Intersection => '+',
            Tile::RoadVertical => '|',
            Tile::RoadHorizontal => '-',
            Tile::Curb => '.',
        }
    }

    /// Corner UVs in the shared atlas texture.
    pub fn uvs(self) -> [[f32; 2]; 4] {
        TILE_ATLAS[self as usize].map(|[u, v]| [u / ATLAS_COLUMNS, v / ATLAS_ROWS])
    }

    pub fn is_road(self) -> bool {
        !matches!(self, Tile::Empty | Tile::Lot)
    }
}

pub type TileGrid = CellGrid<Tile>;

/// A square piece of the ground mesh.
#[derive(Clone, Debug, PartialEq)]
pub struct MeshChunk {
    /// world position of the chunk's first cell
    pub offset: Vec3,
    pub indices: Vec<u16>,
    /// chunk-local positions
    pub positions: Vec<[f32; 3]>,
    pub uvs: Vec<[f32; 2]>,
    pub normals: Vec<[f32; 3]>,
}

impl MeshChunk {
    pub fn quad_count(&self) -> usize {
        self.indices.len() / 6
    }
}

// road between a node and its +x / +y neighbour, with the given half width
fn fill_link(
    tiles: &mut TileGrid,
    network: &RoadNetwork,
    node: &Intersection,
    dir: Dir,
    size: i32,
    tile: Tile,
) {
    if size <= 0 {
        return;
    }
    let Some(other) = node.link(dir) else {
        return;
    };
    let end = network.node(other).pos;
    let p = node.pos;
    match dir {
        Dir::PosX => tiles.fill_rect(p.x + 1, p.y + 1 - size, end.x, p.y + size, tile),
        _ => tiles.fill_rect(p.x + 1 - size, p.y + 1, p.x + size, end.y, tile),
    }
}

// half sizes of the square where the roads through a node cross
fn node_extent(node: &Intersection) -> (i32, i32) {
    let sx = node.size(Dir::PosY).max(node.size(Dir::NegY));
    let sy = node.size(Dir::PosX).max(node.size(Dir::NegX));
    (sx, sy)
}

/// Tile types derived from the road graph, roads first and lots last.
pub fn tile_grid(network: &RoadNetwork) -> TileGrid {
    let mut tiles = TileGrid::filled(network.width, network.height, Tile::Empty);

    // full width as curb, including every crossing square
    for (_, node) in network.intersections() {
        for dir in [Dir::PosX, Dir::PosY] {
            fill_link(&mut tiles, network, node, dir, node.size(dir), Tile::Curb);
        }
        let (sx, sy) = node_extent(node);
        if sx > 0 || sy > 0 {
            let (sx, sy) = (sx.max(1), sy.max(1));
            let p = node.pos;
            tiles.fill_rect(p.x + 1 - sx, p.y + 1 - sy, p.x + sx, p.y + sy, Tile::Curb);
        }
    }

    // road surface one cell in from the curb
    for (_, node) in network.intersections() {
        let (across, along) = (node.size(Dir::PosX) - 1, node.size(Dir::PosY) - 1);
        fill_link(&mut tiles, network, node, Dir::PosX, across, Tile::RoadHorizontal);
        fill_link(&mut tiles, network, node, Dir::PosY, along, Tile::RoadVertical);
    }

    for (_, node) in network.intersections() {
        let (sx, sy) = node_extent(node);
        let p = node.pos;
        let (ix, iy) = (sx - 1, sy - 1);
        if ix > 0 && iy > 0 {
            tiles.fill_rect(p.x + 1 - ix, p.y + 1 - iy, p.x + ix, p.y + iy, Tile::Intersection);
        } else if iy > 0 {
            // a narrow road meets a wide one, keep the wide surface continuous
            let hx = sx.max(1);
            tiles.fill_rect(p.x + 1 - hx, p.y + 1 - iy, p.x + hx, p.y + iy, Tile::RoadHorizontal);
        } else if ix > 0 {
            let hy = sy.max(1);
            tiles.fill_rect(p.x + 1 - ix, p.y + 1 - hy, p.x + ix, p.y + hy, Tile::RoadVertical);
        }
    }

    for block in network.blocks() {
        tiles.fill_rect(block.x0, block.y0, block.x1, block.y1, Tile::Lot);
    }

    tiles
}

/// Split the grid into square chunks and emit one quad per cell.
pub fn chunk_meshes(tiles: &TileGrid, chunk_size: i32) -> Vec<MeshChunk> {
    let chunk_size = chunk_size.clamp(1, MAX_CHUNK_SIZE);
    let mut chunks = Vec::new();

    for cx in (0..tiles.width()).step_by(chunk_size as usize) {
        for cy in (0..tiles.height()).step_by(chunk_size as usize) {
            let w = chunk_size.min(tiles.width() - cx);
            let h = chunk_size.min(tiles.height() - cy);
            let quads = (w * h) as usize;

            let mut chunk = MeshChunk {
                offset: Vec3::new(cx as f32, cy as f32, 0.0),
                indices: Vec::with_capacity(quads * 6),
                positions: Vec::with_capacity(quads * 4),
                uvs: Vec::with_capacity(quads * 4),
                normals: vec![[0.0, 0.0, 1.0]; quads * 4],
            };

            for x in 0..w {
                for y in 0..h {
                    let tile = tiles.get(cx + x, cy + y).unwrap_or_default();
                    let base = chunk.positions.len() as u16;
                    let (x0, y0) = (x as f32, y as f32);
                    chunk.positions.extend([
                        [x0, y0, 0.0],
                        [x0 + 1.0, y0, 0.0],
                        [x0 + 1.0, y0 + 1.0, 0.0],
                        [x0, y0 + 1.0, 0.0],
                    ]);
                    chunk.uvs.extend(tile.uvs());
                    // counter-clockwise seen from +z
                    chunk.indices.extend([base, base + 1, base + 2, base, base + 2, base + 3]);
                }
            }

            chunks.push(chunk);
        }
    }

    chunks
}

pub fn rasterize(network: &RoadNetwork, chunk_size: i32) -> (TileGrid, Vec<MeshChunk>) {
    let tiles = tile_grid(network);
    let chunks = chunk_meshes(&tiles, chunk_size);
    (tiles, chunks)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::city::procgen::road::RoadConfig;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn network(seed: u64, w: i32, h: i32) -> RoadNetwork {
        let config =
            RoadConfig::from_table(&crate::config::ROAD_TIERS, crate::config::NARROW_CHANCE);
        RoadNetwork::build(w, h, &config, &mut StdRng::seed_from_u64(seed)).unwrap()
    }

    #[test]
    fn every_cell_gets_a_tile() {
        for seed in 0..8 {
            let tiles = tile_grid(&network(seed, 96, 80));
            assert_eq!(tiles.count(Tile::Empty), 0, "seed {}", seed);
        }
    }

    #[test]
    fn lots_match_block_area() {
        let network = network(3, 100, 100);
        let tiles = tile_grid(&network);
        let lot_area: i32 = network.blocks().iter().map(|b| b.area()).sum();
        assert_eq!(tiles.count(Tile::Lot) as i32, lot_area);
        let roads = tiles.iter().filter(|(_, t)| t.is_road()).count() as i32;
        assert_eq!(lot_area + roads, 100 * 100);
    }

    #[test]
    fn chunks_cover_grid_without_overflow() {
        let tiles = tile_grid(&network(5, 70, 40));
        let chunks = chunk_meshes(&tiles, 32);
        // 3 columns x 2 rows of chunks
        assert_eq!(chunks.len(), 6);
        let quads: usize = chunks.iter().map(|c| c.quad_count()).sum();
        assert_eq!(quads, 70 * 40);
        for chunk in &chunks {
            assert_eq!(chunk.positions.len(), chunk.quad_count() * 4);
            assert_eq!(chunk.uvs.len(), chunk.positions.len());
            assert!(chunk.normals.iter().all(|n| *n == [0.0, 0.0, 1.0]));
            assert!(chunk.indices.iter().all(|&i| (i as usize) < chunk.positions.len()));
        }
        assert_eq!(chunks.last().unwrap().offset, Vec3::new(64.0, 32.0, 0.0));
    }

    #[test]
    fn oversized_chunks_are_capped() {
        let tiles = TileGrid::new(200, 10, Tile::Lot).unwrap();
        let chunks = chunk_meshes(&tiles, 1000);
        assert_eq!(chunks.len(), 2);
        assert!(chunks.iter().all(|c| c.positions.len() <= u16::MAX as usize + 1));
    }

    #[test]
    fn atlas_uvs_are_normalized() {
        for tile in [
            Tile::Empty,
            Tile::Lot,
            Tile::Intersection,
            Tile::RoadVertical,
            Tile::RoadHorizontal,
            Tile::Curb,
        ] {
            for [u, v] in tile.uvs() {
                assert!((0.0..=1.0).contains(&u) && (0.0..=1.0).contains(&v));
            }
        }
    }
}
