use bevy::math::bounding::{Aabb3d, BoundingSphere, BoundingVolume, IntersectsVolume};
use bevy::prelude::*;
use rand::Rng;
use rand::rngs::StdRng;
use std::cmp::Ordering;

use super::catalog::BuildingCatalog;
use super::cells::CellGrid;
use super::error::CityGenError;
use super::road::Block;
use super::utils::{aabb_from_corners, aabb_half_diagonal, merge_aabb, Dir};

/// A block-local cell on the edge of a block and the side it faces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PerimeterCell {
    pub pos: IVec2,
    pub dir: Dir,
}

/// One building standing in a block.
#[derive(Clone, Debug, PartialEq)]
pub struct PlacedBuilding {
    pub block: usize,
    pub name: String,
    /// lower-left occupied cell, block-local
    pub cell: IVec2,
    /// occupied cells, already rotated onto the grid
    pub size: IVec2,
    pub size_index: usize,
    pub variant: usize,
    pub mirrored: bool,
    /// facing after mirroring
    pub orientation: Dir,
    /// model space to block space
    pub transform: Transform,
    pub bbox: Aabb3d,
    pub destroyed: bool,
}

/// All buildings of one block plus the cells they cover.
#[derive(Clone, Debug, PartialEq)]
pub struct BuildingGroup {
    pub block: usize,
    /// world position of the block's lower-left cell
    pub origin: IVec2,
    occupancy: CellGrid<bool>,
    buildings: Vec<PlacedBuilding>,
    live: Vec<usize>,
    bbox: Option<Aabb3d>,
}

impl BuildingGroup {
    pub fn buildings(&self) -> &[PlacedBuilding] {
        &self.buildings
    }

    /// Indices of the buildings still standing.
    pub fn live(&self) -> &[usize] {
        &self.live
    }

    /// Union of the building boxes, `None` for an empty block.
    pub fn bbox(&self) -> Option<Aabb3d> {
        self.bbox
    }

    pub fn occupancy(&self) -> &CellGrid<bool> {
        &self.occupancy
    }

    /// Model space to world space for one building.
    pub fn world_transform(&self, building: &PlacedBuilding) -> Transform {
        let mut transform = building.transform;
        transform.translation += Vec3::new(self.origin.x as f32, self.origin.y as f32, 0.0);
        transform
    }

    /// Flag every live building touched by the sphere and drop it from the live list.
    /// Returns the indices destroyed by this call.
    pub(crate) fn destroy_within(&mut self, sphere: &BoundingSphere) -> Vec<usize> {
        let center = Vec3::from(sphere.center);
        let radius = sphere.radius();

        let hits: Vec<usize> = self
            .live
            .iter()
            .copied()
            .filter(|&i| {
                let bbox = &self.buildings[i].bbox;
                // coarse distance check before the exact one
                center.distance(Vec3::from(bbox.center())) <= radius + aabb_half_diagonal(bbox)
                    && bbox.intersects(sphere)
            })
            .collect();

        for &i in &hits {
            self.buildings[i].destroyed = true;
        }
        let buildings = &self.buildings;
        self.live.retain(|&i| !buildings[i].destroyed);
        hits
    }
}

// walk `sz` cells outward from a random split point
fn single_line(sz: i32, rng: &mut StdRng, mut visit: impl FnMut(i32, &mut StdRng)) {
    if sz <= 0 {
        return;
    }
    let mut up = rng.random_range(0..=sz);
    let mut down = up - 1;
    for _ in 0..sz {
        let forward = if down >= 0 && up < sz {
            rng.random_bool(0.5)
        } else {
            up < sz
        };
        if forward {
            visit(up, rng);
            up += 1;
        } else {
            visit(down, rng);
            down -= 1;
        }
    }
}

// two parallel lines of `sz` cells, four cursors drawn at random
fn double_line(sz: i32, rng: &mut StdRng, mut visit: impl FnMut(i32, usize)) {
    if sz <= 0 {
        return;
    }
    let up0 = rng.random_range(0..=sz);
    let up1 = rng.random_range(0..=sz);
    // down0, up0, down1, up1
    let mut cursors = [up0 - 1, up0, up1 - 1, up1];

    for _ in 0..sz * 2 {
        loop {
            let pick = rng.random_range(0..4);
            let line = pick / 2;
            let cursor = cursors[pick];
            if pick % 2 == 0 && cursor >= 0 {
                visit(cursor, line);
                cursors[pick] -= 1;
                break;
            }
            if pick % 2 == 1 && cursor < sz {
                visit(cursor, line);
                cursors[pick] += 1;
                break;
            }
        }
    }
}

/// Every edge cell of a `w x h` block once, in randomized order.
pub fn perimeter_walk(w: i32, h: i32, rng: &mut StdRng) -> Vec<PerimeterCell> {
    let mut cells = Vec::new();
    let mut push = |x: i32, y: i32, dir: Dir| {
        cells.push(PerimeterCell {
            pos: IVec2::new(x, y),
            dir,
        })
    };

    if w > 1 && h > 1 {
        let x_first = match w.cmp(&h) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => rng.random_bool(0.5),
        };
        let row = |line: usize| if line == 1 { (h - 1, Dir::PosY) } else { (0, Dir::NegY) };
        let column = |line: usize| if line == 1 { (w - 1, Dir::PosX) } else { (0, Dir::NegX) };

        if x_first {
            double_line(w, rng, |x, line| {
                let (y, dir) = row(line);
                push(x, y, dir);
            });
            double_line(h - 2, rng, |y, line| {
                let (x, dir) = column(line);
                push(x, y + 1, dir);
            });
        } else {
            double_line(h, rng, |y, line| {
                let (x, dir) = column(line);
                push(x, y, dir);
            });
            double_line(w - 2, rng, |x, line| {
                let (y, dir) = row(line);
                push(x + 1, y, dir);
            });
        }
    } else if w == 1 && h == 1 {
        let dir = Dir::from_index(rng.random_range(0..4));
        push(0, 0, dir);
    } else if w == 1 {
        single_line(h, rng, |y, rng| {
            let dir = if rng.random_bool(0.5) { Dir::PosX } else { Dir::NegX };
            push(0, y, dir);
        });
    } else if h == 1 {
        single_line(w, rng, |x, rng| {
            let dir = if rng.random_bool(0.5) { Dir::PosY } else { Dir::NegY };
            push(x, 0, dir);
        });
    }

    cells
}

// a footprint size that fits somewhere along the edge through a cell
struct Candidate {
    size_index: usize,
    first: IVec2,
    last: IVec2,
    cumulative: f64,
}

// the footprint's occupied rectangle and the slide range along the edge
fn candidates(
    occupancy: &CellGrid<bool>,
    catalog: &BuildingCatalog,
    cell: PerimeterCell,
) -> Vec<Candidate> {
    let (w, h) = (occupancy.width(), occupancy.height());
    let along_x = cell.dir.is_y();
    let step = if along_x { IVec2::X } else { IVec2::Y };
    let along = |p: IVec2| if along_x { p.x } else { p.y };

    let mut total = 0.0;
    let mut out = Vec::new();

    for (size_index, class) in catalog.sizes().iter().enumerate() {
        let (sx, sy) = (class.size.x, class.size.y);
        let (mut first, mut last, rect) = if along_x {
            let y = if cell.dir == Dir::PosY { h - sx } else { 0 };
            (IVec2::new(cell.pos.x + 1 - sy, y), IVec2::new(cell.pos.x, y), IVec2::new(sy, sx))
        } else {
            let x = if cell.dir == Dir::PosX { w - sx } else { 0 };
            (IVec2::new(x, cell.pos.y + 1 - sy), IVec2::new(x, cell.pos.y), IVec2::new(sx, sy))
        };
        let fits = |p: IVec2| occupancy.rect_is(p.x, p.y, rect.x, rect.y, false);

        while along(first) <= along(last) && !fits(first) {
            first += step;
        }
        while along(first) <= along(last) && !fits(last) {
            last -= step;
        }
        if along(first) > along(last) {
            continue;
        }

        total += (sy as f64).sqrt() * sx as f64 * class.variants.len() as f64;
        out.push(Candidate {
            size_index,
            first,
            last,
            cumulative: total,
        });
    }

    out
}

// where the model origin lands so its footprint covers the cells at `cell`
fn model_origin(cell: IVec2, offset: IVec2, size: IVec2, dir: Dir) -> IVec2 {
    let (bx, by) = (cell.x, cell.y);
    let (ox, oy) = (offset.x, offset.y);
    let (sx, sy) = (size.x, size.y);
    match dir {
        Dir::PosX => IVec2::new(bx - ox, by - oy),
        Dir::PosY => IVec2::new(bx + oy + sy, by - ox),
        Dir::NegX => IVec2::new(bx + ox + sx, by + oy + sy),
        Dir::NegY => IVec2::new(bx - oy, by + ox + sx),
    }
}

/// Fill one block with buildings along its perimeter.
///
/// Random draws per placed building: candidate (when more than one fits),
/// variant (when the size has several), mirror flag, then the x and y offsets
/// (each only when its range is wider than one cell).
pub fn place_buildings(
    block_index: usize,
    block: &Block,
    catalog: &BuildingCatalog,
    rng: &mut StdRng,
) -> Result<BuildingGroup, CityGenError> {
    let (w, h) = (block.width(), block.height());
    let mut group = BuildingGroup {
        block: block_index,
        origin: IVec2::new(block.x0, block.y0),
        occupancy: CellGrid::new(w, h, false)?,
        buildings: Vec::new(),
        live: Vec::new(),
        bbox: None,
    };

    for cell in perimeter_walk(w, h, rng) {
        if !group.occupancy.rect_is(cell.pos.x, cell.pos.y, 1, 1, false) {
            continue;
        }

        let candidates = candidates(&group.occupancy, catalog, cell);
        let Some(total) = candidates.last().map(|c| c.cumulative) else {
            error!(
                "could not place a building at ({}, {}) in block {}",
                block.x0 + cell.pos.x,
                block.y0 + cell.pos.y,
                block_index
            );
            continue;
        };

        let mut index = 0;
        if candidates.len() > 1 {
            let r = rng.random::<f64>() * total;
            while index < candidates.len() - 1 && candidates[index].cumulative < r {
                index += 1;
            }
        }
        let chosen = &candidates[index];
        let class = &catalog.sizes()[chosen.size_index];

        let variant = if class.variants.len() > 1 {
            rng.random_range(0..class.variants.len())
        } else {
            0
        };
        let mirrored = rng.random_bool(0.5);
        let mut pos = chosen.first;
        if chosen.last.x != chosen.first.x {
            pos.x += rng.random_range(0..=chosen.last.x - chosen.first.x);
        }
        if chosen.last.y != chosen.first.y {
            pos.y += rng.random_range(0..=chosen.last.y - chosen.first.y);
        }

        let footprint = &class.variants[variant];
        let size = if cell.dir.is_y() {
            IVec2::new(footprint.size.y, footprint.size.x)
        } else {
            footprint.size
        };
        group.occupancy.fill_rect(pos.x, pos.y, pos.x + size.x, pos.y + size.y, true);

        let (offset, orientation) = if mirrored {
            (
                IVec2::new(-footprint.offset.x - footprint.size.x, footprint.offset.y),
                cell.dir.opposite(),
            )
        } else {
            (footprint.offset, cell.dir)
        };
        let origin = model_origin(pos, offset, footprint.size, orientation);
        let transform = Transform::from_xyz(origin.x as f32, origin.y as f32, 0.0)
            .with_rotation(Quat::from_rotation_z(orientation.angle()))
            .with_scale(if mirrored { Vec3::new(-1.0, 1.0, 1.0) } else { Vec3::ONE });

        let world = group.origin + pos;
        let far = world + size;
        let bbox = aabb_from_corners(
            Vec3::new(world.x as f32, world.y as f32, 0.0),
            Vec3::new(far.x as f32, far.y as f32, footprint.roof_height()),
        );
        group.bbox = merge_aabb(group.bbox, &bbox);

        group.live.push(group.buildings.len());
        group.buildings.push(PlacedBuilding {
            block: block_index,
            name: footprint.name.clone(),
            cell: pos,
            size,
            size_index: chosen.size_index,
            variant,
            mirrored,
            orientation,
            transform,
            bbox,
            destroyed: false,
        });
    }

    Ok(group)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::city::procgen::catalog::CatalogEntry;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn catalog(models: &[(&str, [f32; 3], [f32; 3])]) -> BuildingCatalog {
        let entries: Vec<CatalogEntry> = models
            .iter()
            .map(|&(name, min, max)| CatalogEntry::new(name, Vec3::from(min), Vec3::from(max)))
            .collect();
        BuildingCatalog::new(&entries).unwrap()
    }

    fn default_catalog() -> BuildingCatalog {
        catalog(&crate::config::BUILDING_MODELS)
    }

    #[test]
    fn perimeter_visits_each_edge_cell_once() {
        let mut rng = StdRng::seed_from_u64(11);
        for (w, h) in [(1, 1), (1, 6), (5, 1), (2, 2), (7, 3), (3, 9), (6, 6)] {
            let cells = perimeter_walk(w, h, &mut rng);
            let expected = if w > 1 && h > 1 { 2 * (w + h) - 4 } else { w * h };
            assert_eq!(cells.len() as i32, expected, "{}x{}", w, h);

            let unique: HashSet<IVec2> = cells.iter().map(|c| c.pos).collect();
            assert_eq!(unique.len(), cells.len());

            for cell in &cells {
                let IVec2 { x, y } = cell.pos;
                assert!(x == 0 || y == 0 || x == w - 1 || y == h - 1);
                if w > 1 && h > 1 {
                    // the facing matches the side the cell lies on
                    match cell.dir {
                        Dir::PosX => assert_eq!(x, w - 1),
                        Dir::NegX => assert_eq!(x, 0),
                        Dir::PosY => assert_eq!(y, h - 1),
                        Dir::NegY => assert_eq!(y, 0),
                    }
                }
            }
        }
    }

    #[test]
    fn thin_blocks_face_their_long_sides() {
        let mut rng = StdRng::seed_from_u64(2);
        assert!(perimeter_walk(1, 9, &mut rng).iter().all(|c| !c.dir.is_y()));
        assert!(perimeter_walk(9, 1, &mut rng).iter().all(|c| c.dir.is_y()));
    }

    #[test]
    fn unit_footprints_fill_a_small_block() {
        let catalog = catalog(&[("bld_1", [0.0, 0.0, 0.0], [1.0, 1.0, 2.0])]);
        let mut rng = StdRng::seed_from_u64(5);
        let group = place_buildings(0, &Block::new(10, 20, 12, 22), &catalog, &mut rng).unwrap();

        assert_eq!(group.buildings().len(), 4);
        assert_eq!(group.live(), &[0, 1, 2, 3]);
        assert_eq!(group.occupancy().count(false), 0);

        let bbox = group.bbox().unwrap();
        assert_eq!(Vec3::from(bbox.min), Vec3::new(10.0, 20.0, 0.0));
        assert_eq!(Vec3::from(bbox.max), Vec3::new(12.0, 22.0, 2.0));
    }

    #[test]
    fn buildings_stay_inside_and_never_overlap() {
        let catalog = default_catalog();
        let mut rng = StdRng::seed_from_u64(99);
        for (i, block) in [
            Block::new(0, 0, 12, 9),
            Block::new(3, 4, 4, 11),
            Block::new(-2, 5, 20, 7),
            Block::new(0, 0, 5, 5),
        ]
        .iter()
        .enumerate()
        {
            let group = place_buildings(i, block, &catalog, &mut rng).unwrap();
            let mut covered = HashSet::new();
            for building in group.buildings() {
                assert_eq!(building.block, i);
                assert!(building.cell.x >= 0 && building.cell.y >= 0);
                assert!(building.cell.x + building.size.x <= block.width());
                assert!(building.cell.y + building.size.y <= block.height());
                for x in 0..building.size.x {
                    for y in 0..building.size.y {
                        let cell = building.cell + IVec2::new(x, y);
                        assert!(covered.insert(cell), "overlap in block {}", i);
                    }
                }
            }
            assert_eq!(covered.len(), group.occupancy().count(true));
        }
    }

    #[test]
    fn transform_puts_the_model_on_its_cells() {
        let catalog = default_catalog();
        let mut rng = StdRng::seed_from_u64(3);
        let group = place_buildings(0, &Block::new(0, 0, 14, 11), &catalog, &mut rng).unwrap();
        assert!(!group.buildings().is_empty());

        for building in group.buildings() {
            let footprint = catalog.footprint(&building.name).unwrap();
            let (lo, hi) = (footprint.offset, footprint.offset + footprint.size);
            for corner in [
                Vec3::new(lo.x as f32, lo.y as f32, 0.0),
                Vec3::new(hi.x as f32, hi.y as f32, 0.0),
            ] {
                let p = building.transform.transform_point(corner);
                let min = building.cell.as_vec2();
                let max = (building.cell + building.size).as_vec2();
                assert!(p.x > min.x - 1e-4 && p.x < max.x + 1e-4, "{:?} outside {:?}", p, building);
                assert!(p.y > min.y - 1e-4 && p.y < max.y + 1e-4, "{:?} outside {:?}", p, building);
            }
        }
    }

    #[test]
    fn same_seed_same_buildings() {
        let catalog = default_catalog();
        let block = Block::new(0, 0, 16, 10);
        let a = place_buildings(0, &block, &catalog, &mut StdRng::seed_from_u64(8)).unwrap();
        let b = place_buildings(0, &block, &catalog, &mut StdRng::seed_from_u64(8)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn oversized_catalog_leaves_block_empty() {
        let catalog = catalog(&[("bld_1", [0.0, 0.0, 0.0], [3.0, 3.0, 1.0])]);
        let mut rng = StdRng::seed_from_u64(1);
        let group = place_buildings(0, &Block::new(0, 0, 2, 2), &catalog, &mut rng).unwrap();
        assert!(group.buildings().is_empty());
        assert_eq!(group.bbox(), None);
    }

    #[test]
    fn empty_block_is_rejected() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(
            place_buildings(0, &Block::new(4, 4, 4, 8), &default_catalog(), &mut rng),
            Err(CityGenError::InvalidDimensions { width: 0, height: 4 })
        );
    }

    #[test]
    fn sphere_destroys_touching_buildings_once() {
        let catalog = catalog(&[("bld_1", [0.0, 0.0, 0.0], [1.0, 1.0, 2.0])]);
        let mut rng = StdRng::seed_from_u64(5);
        let mut group = place_buildings(0, &Block::new(0, 0, 2, 2), &catalog, &mut rng).unwrap();

        let sphere = BoundingSphere::new(Vec3::new(0.5, 0.5, 1.0), 0.2);
        let hits = group.destroy_within(&sphere);
        assert_eq!(hits.len(), 1);
        assert!(group.buildings()[hits[0]].destroyed);
        assert_eq!(group.live().len(), 3);
        assert!(group.destroy_within(&sphere).is_empty());
    }
}
