use bevy::math::bounding::{Aabb3d, BoundingSphere, IntersectsVolume, RayCast3d};
use bevy::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Triangular};

use super::CityParams;
use super::procgen::catalog::BuildingCatalog;
use super::procgen::error::CityGenError;
use super::procgen::placement::{place_buildings, BuildingGroup, PlacedBuilding};
use super::procgen::road::RoadNetwork;
use super::procgen::tiles::{rasterize, MeshChunk, TileGrid};
use super::procgen::utils::aabb_volume;
use crate::config::{DAMAGE_EXPONENT, MAX_CHUNK_SIZE};

/// Address of a building: group (= block) index and index inside the group.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
pub struct BuildingRef {
    pub group: usize,
    pub index: usize,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum HitKind {
    None,
    Ground,
    Building(BuildingRef),
}

#[derive(Clone, Copy, PartialEq, Debug)]
pub struct RayHit {
    pub kind: HitKind,
    /// where the ray stopped, the ray origin when nothing was hit
    pub point: Vec3,
}

/// A building just destroyed, waiting for its effect to be spawned.
#[derive(Clone, Copy, PartialEq, Debug)]
pub struct Explosion {
    pub building: BuildingRef,
    pub bbox: Aabb3d,
    pub amount: f32,
}

/// One generated city, in z-up grid space.
#[derive(Resource)]
pub struct City {
    network: RoadNetwork,
    groups: Vec<BuildingGroup>,
    tiles: TileGrid,
    chunks: Vec<MeshChunk>,
    /// edge length the ground was actually cut with
    chunk_size: i32,
    explosions: Vec<Explosion>,
    property_damage: f64,
    damage_scale: f64,
    damage_value: Triangular<f64>,
    rng: StdRng,
}

impl City {
    /// Roads, then buildings block by block, then the ground mesh.
    /// The last draw seeds the city's own damage rng.
    pub fn generate(
        params: &CityParams,
        catalog: &BuildingCatalog,
        rng: &mut StdRng,
    ) -> Result<Self, CityGenError> {
        let damage_value = Triangular::new(params.damage_min, params.damage_max, params.damage_mode)
            .map_err(|e| CityGenError::InvalidConfig(format!("damage spread: {}", e)))?;

        let network = RoadNetwork::build(params.width, params.height, &params.roads, rng)?;
        let groups = network
            .blocks()
            .iter()
            .enumerate()
            .map(|(i, block)| place_buildings(i, block, catalog, rng))
            .collect::<Result<Vec<_>, _>>()?;
        let chunk_size = params.chunk_size.clamp(1, MAX_CHUNK_SIZE);
        let (tiles, chunks) = rasterize(&network, chunk_size);
        let damage_seed: u64 = rng.random();

        let city = Self {
            network,
            groups,
            tiles,
            chunks,
            chunk_size,
            explosions: Vec::new(),
            property_damage: 0.0,
            damage_scale: params.damage_scale,
            damage_value,
            rng: StdRng::seed_from_u64(damage_seed),
        };
        info!(
            "city generated: {} buildings in {} blocks, {} ground chunks ({} quads)",
            city.live_count(),
            city.groups.len(),
            city.chunks.len(),
            city.chunks.iter().map(|c| c.quad_count()).sum::<usize>()
        );
        Ok(city)
    }

    pub fn network(&self) -> &RoadNetwork {
        &self.network
    }

    pub fn groups(&self) -> &[BuildingGroup] {
        &self.groups
    }

    pub fn tiles(&self) -> &TileGrid {
        &self.tiles
    }

    pub fn chunks(&self) -> &[MeshChunk] {
        &self.chunks
    }

    pub fn chunk_size(&self) -> i32 {
        self.chunk_size
    }

    pub fn property_damage(&self) -> f64 {
        self.property_damage
    }

    pub fn building(&self, building: BuildingRef) -> Option<&PlacedBuilding> {
        self.groups.get(building.group)?.buildings().get(building.index)
    }

    pub fn building_count(&self) -> usize {
        self.groups.iter().map(|g| g.buildings().len()).sum()
    }

    /// Buildings still standing.
    pub fn live_count(&self) -> usize {
        self.groups.iter().map(|g| g.live().len()).sum()
    }

    /// Closest standing building along the ray, else the ground plane z = 0.
    pub fn raycast(&self, ray: Ray3d) -> RayHit {
        let ground = ray.intersect_plane(Vec3::ZERO, InfinitePlane3d::new(Vec3::Z));
        // nothing past the ground counts
        let cast = RayCast3d::from_ray(ray, ground.unwrap_or(f32::MAX));

        let mut best: Option<(f32, BuildingRef)> = None;
        for (g, group) in self.groups.iter().enumerate() {
            let Some(bbox) = group.bbox() else {
                continue;
            };
            if cast.aabb_intersection_at(&bbox).is_none() {
                continue;
            }
            for &index in group.live() {
                let Some(t) = cast.aabb_intersection_at(&group.buildings()[index].bbox) else {
                    continue;
                };
                if best.is_none_or(|(closest, _)| t < closest) {
                    best = Some((t, BuildingRef { group: g, index }));
                }
            }
        }

        match (best, ground) {
            (Some((t, building)), _) => RayHit {
                kind: HitKind::Building(building),
                point: ray.get_point(t),
            },
            (None, Some(t)) => RayHit {
                kind: HitKind::Ground,
                point: ray.get_point(t),
            },
            (None, None) => RayHit {
                kind: HitKind::None,
                point: ray.origin,
            },
        }
    }

    /// Destroy every standing building touched by the sphere.
    /// Returns how many fell; each is queued as an explosion and adds to the property damage.
    pub fn damage(&mut self, center: Vec3, radius: f32, amount: f32) -> usize {
        let sphere = BoundingSphere::new(center, radius.max(0.0));
        let mut destroyed = 0;

        for (g, group) in self.groups.iter_mut().enumerate() {
            let Some(bbox) = group.bbox() else {
                continue;
            };
            if !bbox.intersects(&sphere) {
                continue;
            }
            for index in group.destroy_within(&sphere) {
                let bbox = group.buildings()[index].bbox;
                let factor = self.damage_value.sample(&mut self.rng);
                let volume = aabb_volume(&bbox) as f64;
                self.property_damage += volume.powf(DAMAGE_EXPONENT) * factor * self.damage_scale;
                self.explosions.push(Explosion {
                    building: BuildingRef { group: g, index },
                    bbox,
                    amount,
                });
                destroyed += 1;
            }
        }

        if destroyed > 0 {
            info!(
                "{} buildings destroyed, property damage now {:.0}",
                destroyed, self.property_damage
            );
        }
        destroyed
    }

    /// Hand over the explosions queued since the last call.
    pub fn drain_explosions(&mut self) -> Vec<Explosion> {
        std::mem::take(&mut self.explosions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::city::default_catalog;
    use bevy::math::bounding::BoundingVolume;

    fn params() -> CityParams {
        CityParams {
            width: 64,
            height: 48,
            ..default()
        }
    }

    fn city(seed: u64) -> City {
        let catalog = default_catalog().unwrap();
        City::generate(&params(), &catalog, &mut StdRng::seed_from_u64(seed)).unwrap()
    }

    fn first_building(city: &City) -> BuildingRef {
        let group = city.groups().iter().position(|g| !g.live().is_empty()).unwrap();
        BuildingRef {
            group,
            index: city.groups()[group].live()[0],
        }
    }

    #[test]
    fn blast_on_a_road_hits_nothing() {
        let mut city = city(4);
        let (cell, _) = city.tiles().iter().find(|(_, t)| t.is_road()).unwrap();
        let center = Vec3::new(cell.x as f32 + 0.5, cell.y as f32 + 0.5, 0.0);

        assert_eq!(city.damage(center, 0.0, 1.0), 0);
        assert_eq!(city.property_damage(), 0.0);
        assert!(city.drain_explosions().is_empty());
    }

    #[test]
    fn blast_at_centroid_destroys_once() {
        let mut city = city(4);
        let target = first_building(&city);
        let bbox = city.building(target).unwrap().bbox;
        let center = Vec3::from(bbox.center());
        let radius = bbox.half_size().length();
        let before = city.live_count();

        let destroyed = city.damage(center, radius, 2.0);
        assert!(destroyed >= 1);
        assert!(city.building(target).unwrap().destroyed);
        assert_eq!(city.live_count(), before - destroyed);
        assert!(city.property_damage() > 0.0);

        let explosions = city.drain_explosions();
        assert_eq!(explosions.len(), destroyed);
        assert!(
            explosions
                .iter()
                .any(|e| e.building == target && e.bbox == bbox && e.amount == 2.0)
        );

        // the same blast again changes nothing
        let total = city.property_damage();
        assert_eq!(city.damage(center, radius, 2.0), 0);
        assert_eq!(city.property_damage(), total);
        assert!(city.drain_explosions().is_empty());
    }

    #[test]
    fn ray_from_above_hits_the_roof() {
        let mut city = city(9);
        let target = first_building(&city);
        let bbox = city.building(target).unwrap().bbox;
        let center = Vec3::from(bbox.center());

        let ray = Ray3d::new(Vec3::new(center.x, center.y, 100.0), Dir3::NEG_Z);
        let hit = city.raycast(ray);
        assert_eq!(hit.kind, HitKind::Building(target));
        assert!((hit.point.z - bbox.max.z).abs() < 1e-4);

        // once it is gone the ray reaches the ground
        city.damage(center, 0.0, 1.0);
        let hit = city.raycast(ray);
        assert_eq!(hit.kind, HitKind::Ground);
        assert!(hit.point.z.abs() < 1e-4);
    }

    #[test]
    fn ray_leaving_the_city_lands_on_ground() {
        let city = city(1);
        let away = Dir3::new(Vec3::new(-1.0, -1.0, -1.0)).unwrap();
        let ray = Ray3d::new(Vec3::new(-50.0, -50.0, 10.0), away);
        let hit = city.raycast(ray);
        assert_eq!(hit.kind, HitKind::Ground);
        assert!(hit.point.z.abs() < 1e-4);
        assert!(hit.point.x < -50.0 && hit.point.y < -50.0);
    }

    #[test]
    fn ray_into_the_sky_hits_nothing() {
        let city = city(1);
        let ray = Ray3d::new(Vec3::new(10.0, 10.0, 5.0), Dir3::Z);
        assert_eq!(city.raycast(ray).kind, HitKind::None);
    }

    #[test]
    fn city_keeps_the_chunk_size_it_was_cut_with() {
        let catalog = default_catalog().unwrap();
        let coarse = CityParams {
            chunk_size: 500,
            ..params()
        };
        let city = City::generate(&coarse, &catalog, &mut StdRng::seed_from_u64(2)).unwrap();
        assert_eq!(city.chunk_size(), MAX_CHUNK_SIZE);
        assert_eq!(city.chunks().len(), 1);

        let fine = CityParams {
            chunk_size: 20,
            ..params()
        };
        let city = City::generate(&fine, &catalog, &mut StdRng::seed_from_u64(2)).unwrap();
        assert_eq!(city.chunk_size(), 20);
        // 64x48 cut into 20s
        assert_eq!(city.chunks().len(), 4 * 3);
        for chunk in city.chunks() {
            assert_eq!(chunk.offset.x as i32 % 20, 0);
            assert_eq!(chunk.offset.y as i32 % 20, 0);
        }
    }

    #[test]
    fn bad_damage_spread_is_rejected() {
        let catalog = default_catalog().unwrap();
        let params = CityParams {
            damage_min: 2.0,
            damage_max: 1.0,
            ..params()
        };
        let result = City::generate(&params, &catalog, &mut StdRng::seed_from_u64(1));
        assert!(matches!(result, Err(CityGenError::InvalidConfig(_))));
    }
}
