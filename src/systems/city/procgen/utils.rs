// UTILS

use bevy::math::bounding::{Aabb3d, BoundingVolume};
use bevy::prelude::*;

/// Compass direction on the grid, also used as the side of a block.
/// The discriminants are the link slots of an intersection.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub enum Dir {
    PosX = 0,
    PosY = 1,
    NegX = 2,
    NegY = 3,
}

impl Dir {
    pub const ALL: [Dir; 4] = [Dir::PosX, Dir::PosY, Dir::NegX, Dir::NegY];

    pub fn from_index(index: usize) -> Dir {
        Dir::ALL[index & 3]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn opposite(self) -> Dir {
        Dir::from_index(self.index() + 2)
    }

    /// true for the +y / -y sides, whose edges run along the x axis
    pub fn is_y(self) -> bool {
        self.index() & 1 == 1
    }

    /// rotation about +z taking the +x side onto this one
    pub fn angle(self) -> f32 {
        self.index() as f32 * std::f32::consts::FRAC_PI_2
    }
}

/// Box from two corners, in any order.
pub fn aabb_from_corners(a: Vec3, b: Vec3) -> Aabb3d {
    Aabb3d {
        min: a.min(b).into(),
        max: a.max(b).into(),
    }
}

pub fn aabb_volume(aabb: &Aabb3d) -> f32 {
    let size = aabb.max - aabb.min;
    size.x * size.y * size.z
}

pub fn aabb_half_diagonal(aabb: &Aabb3d) -> f32 {
    aabb.half_size().length()
}

/// Union of an optional box with another.
pub fn merge_aabb(acc: Option<Aabb3d>, aabb: &Aabb3d) -> Option<Aabb3d> {
    Some(match acc {
        Some(acc) => acc.merge(aabb),
        None => *aabb,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opposite_directions_pair_up() {
        for dir in Dir::ALL {
            assert_ne!(dir, dir.opposite());
            assert_eq!(dir, dir.opposite().opposite());
            assert_eq!(dir.is_y(), dir.opposite().is_y());
        }
    }

    #[test]
    fn box_measures() {
        let aabb = aabb_from_corners(Vec3::new(2.0, 3.0, 4.0), Vec3::ZERO);
        assert_eq!(aabb_volume(&aabb), 24.0);
        assert!((aabb_half_diagonal(&aabb) - 7.25_f32.sqrt()).abs() < 1e-5);
        let corner = aabb_from_corners(Vec3::splat(-1.0), Vec3::ZERO);
        let merged = merge_aabb(Some(aabb), &corner).unwrap();
        assert_eq!(Vec3::from(merged.min), Vec3::splat(-1.0));
        assert_eq!(Vec3::from(merged.max), Vec3::new(2.0, 3.0, 4.0));
    }
}
