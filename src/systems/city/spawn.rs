use bevy::image::ImageSampler;
use bevy::math::bounding::BoundingVolume;
use bevy::prelude::*;
use bevy::render::render_asset::RenderAssetUsages;
use bevy::render::render_resource::{Extent3d, TextureDimension, TextureFormat};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashMap;

use super::procgen::catalog::BuildingCatalog;
use super::procgen::error::CityGenError;
use super::procgen::mesh_gen::box_mesh;
use super::world::{BuildingRef, City};
use super::*;

// entity hierarchy components
#[derive(Component)]
pub struct CityRoot {
    pub seed: u64,
}

#[derive(Component)]
pub struct GroundChunk;

#[derive(Component)]
pub struct BuildingMesh(pub BuildingRef);

#[derive(Component)]
pub struct Landmark;

#[derive(Component)]
pub struct ExplosionEffect {
    pub timer: Timer,
    pub size: f32,
}

const ATLAS_CELL_PX: u32 = 16;
const EXPLOSION_SECONDS: f32 = 0.6;

// atlas texture drawn in code, one flat cell per tile kind
fn atlas_image() -> Image {
    let width = ATLAS_COLUMNS as u32 * ATLAS_CELL_PX;
    let height = ATLAS_ROWS as u32 * ATLAS_CELL_PX;
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    let mid = ATLAS_CELL_PX / 2;

    for y in 0..height {
        for x in 0..width {
            let (lx, ly) = (x % ATLAS_CELL_PX, y % ATLAS_CELL_PX);
            let rgba: [u8; 4] = match (x / ATLAS_CELL_PX, y / ATLAS_CELL_PX) {
                (0, 0) => [0, 0, 0, 255],
                (1, 0) => [92, 104, 84, 255],
                (0, 1) => [58, 58, 62, 255],
                // dashed centre line, runs along u
                (1, 1) if (ly == mid || ly + 1 == mid) && lx % 8 < 4 => [220, 200, 90, 255],
                (1, 1) => [64, 64, 68, 255],
                (0, 2) => [150, 150, 145, 255],
                _ => [255, 0, 255, 255],
            };
            data.extend_from_slice(&rgba);
        }
    }

    let mut image = Image::new(
        Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        TextureDimension::D2,
        data,
        TextureFormat::Rgba8UnormSrgb,
        RenderAssetUsages::RENDER_WORLD,
    );
    image.sampler = ImageSampler::nearest();
    image
}

pub fn spawn_city(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
    images: &mut Assets<Image>,
    city: &City,
    catalog: &BuildingCatalog,
    seed: u64,
) -> Result<Entity, CityGenError> {
    // resolve every model before spawning anything
    let mut models: HashMap<&str, Handle<Mesh>> = HashMap::new();
    for building in city.groups().iter().flat_map(|g| g.buildings()) {
        if !models.contains_key(building.name.as_str()) {
            let footprint = catalog.footprint(&building.name)?;
            models.insert(building.name.as_str(), meshes.add(box_mesh(&footprint.bounds)));
        }
    }
    let landmark = catalog.footprint(LANDMARK_MODEL)?;

    let root = commands
        .spawn((CityRoot { seed }, Transform::from_rotation(root_rotation()), Visibility::Visible))
        .id();
    let mut children = Vec::new();

    let ground = materials.add(StandardMaterial {
        base_color_texture: Some(images.add(atlas_image())),
        perceptual_roughness: 0.95,
        ..default()
    });
    for chunk in city.chunks() {
        children.push(
            commands
                .spawn((
                    GroundChunk,
                    Mesh3d(meshes.add(chunk.to_mesh())),
                    MeshMaterial3d(ground.clone()),
                    Transform::from_translation(chunk.offset),
                ))
                .id(),
        );
    }

    // color variations, mirrored models need both faces
    let mut rng = StdRng::seed_from_u64(seed);
    let palette: Vec<Handle<StandardMaterial>> = (0..4)
        .map(|_| {
            let shade = rng.random_range(0.65_f32..0.9);
            materials.add(StandardMaterial {
                base_color: Color::srgb(shade, shade, (shade + 0.05).min(1.0)),
                cull_mode: None,
                double_sided: true,
                ..default()
            })
        })
        .collect();

    for (g, group) in city.groups().iter().enumerate() {
        for &index in group.live() {
            let building = &group.buildings()[index];
            let Some(model) = models.get(building.name.as_str()) else {
                continue;
            };
            children.push(
                commands
                    .spawn((
                        BuildingMesh(BuildingRef { group: g, index }),
                        Mesh3d(model.clone()),
                        MeshMaterial3d(palette[rng.random_range(0..palette.len())].clone()),
                        group.world_transform(building),
                    ))
                    .id(),
            );
        }
    }

    // landmark stands just outside the south edge, centred
    let min = Vec3::from(landmark.bounds.min);
    let target = Vec3::new(
        (city.network().width - landmark.size.x) as f32 * 0.5,
        -(landmark.size.y as f32) - 2.0,
        0.0,
    );
    children.push(
        commands
            .spawn((
                Landmark,
                Mesh3d(meshes.add(box_mesh(&landmark.bounds))),
                MeshMaterial3d(materials.add(StandardMaterial {
                    base_color: Color::srgb(0.55, 0.35, 0.3),
                    ..default()
                })),
                Transform::from_translation(target - Vec3::new(min.x, min.y, 0.0)),
            ))
            .id(),
    );

    commands.entity(root).add_children(&children);
    Ok(root)
}

fn generate_and_spawn(
    commands: &mut Commands,
    meshes: &mut Assets<Mesh>,
    materials: &mut Assets<StandardMaterial>,
    images: &mut Assets<Image>,
    params: &CityParams,
    catalog: &BuildingCatalog,
    seed: u64,
) -> Result<City, CityGenError> {
    let city = City::generate(params, catalog, &mut StdRng::seed_from_u64(seed))?;
    spawn_city(commands, meshes, materials, images, &city, catalog, seed)?;
    Ok(city)
}

pub fn setup_city(
    mut commands: Commands,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut images: ResMut<Assets<Image>>,
    seed: Res<Seed>,
    params: Res<CityParams>,
    catalog: Res<Catalog>,
) {
    match generate_and_spawn(
        &mut commands,
        &mut meshes,
        &mut materials,
        &mut images,
        &params,
        &catalog.0,
        seed.0,
    ) {
        Ok(city) => commands.insert_resource(city),
        Err(e) => error!("city generation with seed {} failed: {}", seed.0, e),
    }
}

pub fn handle_regeneration(
    mut commands: Commands,
    mut events: EventReader<RegenerateEvent>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
    mut images: ResMut<Assets<Image>>,
    mut seed: ResMut<Seed>,
    params: Res<CityParams>,
    catalog: Res<Catalog>,
    query: Query<Entity, With<CityRoot>>,
) {
    // only the latest request matters
    let Some(event) = events.read().last() else {
        return;
    };

    match generate_and_spawn(
        &mut commands,
        &mut meshes,
        &mut materials,
        &mut images,
        &params,
        &catalog.0,
        event.seed,
    ) {
        Ok(city) => {
            // children are also handled automatically
            for entity in query.iter() {
                commands.entity(entity).try_despawn();
            }
            seed.0 = event.seed;
            commands.insert_resource(city);
        }
        Err(e) => error!(
            "regeneration with seed {} failed, keeping the previous city: {}",
            event.seed, e
        ),
    }
}

// drop the meshes of buildings the city has destroyed
pub fn sync_destroyed(
    mut commands: Commands,
    city: Option<Res<City>>,
    query: Query<(Entity, &BuildingMesh)>,
) {
    let Some(city) = city else {
        return;
    };
    if !city.is_changed() {
        return;
    }
    for (entity, building) in &query {
        if city.building(building.0).is_none_or(|b| b.destroyed) {
            commands.entity(entity).try_despawn();
        }
    }
}

pub fn spawn_explosions(
    mut commands: Commands,
    city: Option<ResMut<City>>,
    mut meshes: ResMut<Assets<Mesh>>,
    mut materials: ResMut<Assets<StandardMaterial>>,
) {
    let Some(mut city) = city else {
        return;
    };
    if !city.is_changed() {
        return;
    }
    let explosions = city.bypass_change_detection().drain_explosions();
    if explosions.is_empty() {
        return;
    }

    let mesh = meshes.add(Sphere::new(0.5));
    let material = materials.add(StandardMaterial {
        base_color: Color::srgba(1.0, 0.55, 0.1, 0.7),
        emissive: LinearRgba::rgb(8.0, 3.0, 0.5),
        alpha_mode: AlphaMode::Blend,
        unlit: true,
        ..default()
    });

    for explosion in explosions {
        let center = city_to_world(Vec3::from(explosion.bbox.center()));
        let extent = explosion.bbox.half_size().max_element() * 2.0;
        let size = extent * (1.0 + explosion.amount.max(0.0));
        commands.spawn((
            ExplosionEffect {
                timer: Timer::from_seconds(EXPLOSION_SECONDS, TimerMode::Once),
                size,
            },
            Mesh3d(mesh.clone()),
            MeshMaterial3d(material.clone()),
            Transform::from_translation(center).with_scale(Vec3::splat(0.01)),
        ));
    }
}

pub fn animate_explosions(
    mut commands: Commands,
    time: Res<Time>,
    mut query: Query<(Entity, &mut ExplosionEffect, &mut Transform)>,
) {
    for (entity, mut effect, mut transform) in &mut query {
        effect.timer.tick(time.delta());
        if effect.timer.finished() {
            commands.entity(entity).try_despawn();
            continue;
        }
        transform.scale = Vec3::splat(effect.size * effect.timer.fraction());
    }
}
