use bevy::gizmos::config::{GizmoConfigGroup, GizmoConfigStore};
use bevy::prelude::*;

use crate::systems::city::procgen::utils::Dir;
use crate::systems::city::world::City;
use crate::systems::city::city_to_world;
use crate::systems::ui::GizmosVisible;

// debug overlay over the city: chunk borders always, road graph and blocks on demand
pub struct GridPlugin;

#[derive(Default, Reflect, GizmoConfigGroup)]
pub struct GridGizmoGroup;

impl Plugin for GridPlugin {
    fn build(&self, app: &mut App) {
        app.insert_resource(GridConfig::default())
            .init_gizmo_group::<GridGizmoGroup>()
            .add_systems(Startup, setup_gizmos)
            .add_systems(Update, (draw_chunk_grid, draw_road_graph));
    }
}

// setting these parameters as a resource allows for runtime modifications
#[derive(Resource)]
pub struct GridConfig {
    pub chunk_color: Color,
    pub block_color: Color,
    pub road_color: Color,
    pub node_color: Color,
    pub enabled: bool,
}

impl Default for GridConfig {
    fn default() -> Self {
        Self {
            chunk_color: Color::srgba(0.5, 0.5, 0.5, 0.15),
            block_color: Color::srgba(0.24, 0.55, 0.31, 0.8),
            road_color: Color::srgba(0.71, 0.24, 0.24, 0.9),
            node_color: Color::srgba(1.0, 1.0, 0.0, 0.8),
            enabled: true,
        }
    }
}

fn setup_gizmos(mut config_store: ResMut<GizmoConfigStore>) {
    let (config, _) = config_store.config_mut::<GridGizmoGroup>();
    config.depth_bias = -0.5; // stay visible over the ground
}

// grid point at a small height, in scene space
fn lift(x: f32, y: f32, height: f32) -> Vec3 {
    city_to_world(Vec3::new(x, y, height))
}

fn draw_chunk_grid(
    mut gizmos: Gizmos<GridGizmoGroup>,
    config: Res<GridConfig>,
    city: Option<Res<City>>,
) {
    if !config.enabled {
        return;
    }
    let Some(city) = city else {
        return;
    };

    let (w, h) = (city.tiles().width() as f32, city.tiles().height() as f32);
    // the size the shown ground was cut with, not the one in the panel
    let step = city.chunk_size() as f32;

    let mut x = 0.0;
    while x <= w {
        gizmos.line(lift(x, 0.0, 0.02), lift(x, h, 0.02), config.chunk_color);
        x += step;
    }
    let mut y = 0.0;
    while y <= h {
        gizmos.line(lift(0.0, y, 0.02), lift(w, y, 0.02), config.chunk_color);
        y += step;
    }
    // far edges when the size is not a multiple of the chunk
    gizmos.line(lift(w, 0.0, 0.02), lift(w, h, 0.02), config.chunk_color);
    gizmos.line(lift(0.0, h, 0.02), lift(w, h, 0.02), config.chunk_color);
}

fn draw_road_graph(
    mut gizmos: Gizmos<GridGizmoGroup>,
    config: Res<GridConfig>,
    visible: Res<GizmosVisible>,
    city: Option<Res<City>>,
) {
    if !visible.0 {
        return;
    }
    let Some(city) = city else {
        return;
    };
    let network = city.network();

    for block in network.blocks() {
        let (x0, y0, x1, y1) = (block.x0 as f32, block.y0 as f32, block.x1 as f32, block.y1 as f32);
        let corners = [
            lift(x0, y0, 0.05),
            lift(x1, y0, 0.05),
            lift(x1, y1, 0.05),
            lift(x0, y1, 0.05),
        ];
        for i in 0..corners.len() {
            gizmos.line(corners[i], corners[(i + 1) % corners.len()], config.block_color);
        }
    }

    // road centerlines, each link drawn once from its -x / -y end
    for (_, node) in network.intersections() {
        let from = lift(node.pos.x as f32 + 0.5, node.pos.y as f32 + 0.5, 0.1);
        for dir in [Dir::PosX, Dir::PosY] {
            if let Some(other) = node.link(dir) {
                let end = network.node(other).pos;
                let to = lift(end.x as f32 + 0.5, end.y as f32 + 0.5, 0.1);
                gizmos.line(from, to, config.road_color);
            }
        }
        let tier = node.sizes.iter().copied().max().unwrap_or(0).max(1);
        gizmos.sphere(from, 0.25 * tier as f32, config.node_color);
    }
}
