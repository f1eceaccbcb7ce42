// entry point for the city generation plugin
use bevy::prelude::*;
use std::f32::consts::FRAC_PI_2;

use crate::config::*;

pub mod procgen;
pub mod spawn;
pub mod world;

use procgen::catalog::{BuildingCatalog, CatalogEntry};
use procgen::error::CityGenError;
use procgen::road::RoadConfig;

// resources
#[derive(Resource)]
pub struct Seed(pub u64);

/// Model catalog shared by generation, spawning and export.
#[derive(Resource)]
pub struct Catalog(pub BuildingCatalog);

// Event for regeneration
#[derive(Event)]
pub struct RegenerateEvent {
    pub seed: u64,
}

// city generation parameters
#[derive(Resource, Clone, Debug)]
pub struct CityParams {
    pub width: i32,
    pub height: i32,
    pub roads: RoadConfig,
    pub chunk_size: i32,
    pub damage_scale: f64,
    pub damage_min: f64,
    pub damage_max: f64,
    pub damage_mode: f64,
}

impl Default for CityParams {
    fn default() -> Self {
        Self {
            width: CITY_WIDTH,
            height: CITY_HEIGHT,
            roads: RoadConfig::from_table(&ROAD_TIERS, NARROW_CHANCE),
            chunk_size: CHUNK_SIZE,
            damage_scale: DAMAGE_SCALE,
            damage_min: DAMAGE_VALUE_MIN,
            damage_max: DAMAGE_VALUE_MAX,
            damage_mode: DAMAGE_VALUE_MODE,
        }
    }
}

/// Catalog of the models shipped with the viewer.
pub fn default_catalog() -> Result<BuildingCatalog, CityGenError> {
    let entries: Vec<CatalogEntry> = BUILDING_MODELS
        .iter()
        .map(|&(name, min, max)| CatalogEntry::new(name, Vec3::from(min), Vec3::from(max)))
        .collect();
    BuildingCatalog::new(&entries)
}

// the generator works z-up, the scene is y-up
pub fn root_rotation() -> Quat {
    Quat::from_rotation_x(-FRAC_PI_2)
}

pub fn city_to_world(point: Vec3) -> Vec3 {
    root_rotation() * point
}

pub fn world_to_city(point: Vec3) -> Vec3 {
    root_rotation().inverse() * point
}

// main plugin for generation
pub struct CityGenerationPlugin;

impl Plugin for CityGenerationPlugin {
    fn build(&self, app: &mut App) {
        let catalog = match default_catalog() {
            Ok(catalog) => catalog,
            Err(e) => {
                error!("city generation disabled: {}", e);
                return;
            }
        };

        app.insert_resource(Seed(INITIAL_SEED))
            .insert_resource(CityParams::default())
            .insert_resource(Catalog(catalog))
            .add_event::<RegenerateEvent>()
            .add_event::<crate::systems::export::ExportEvent>()
            .add_systems(Startup, spawn::setup_city)
            .add_systems(
                Update,
                (
                    spawn::handle_regeneration,
                    spawn::sync_destroyed,
                    spawn::spawn_explosions,
                    spawn::animate_explosions,
                    crate::systems::export::handle_export,
                ),
            );
    }
}
