use bevy::diagnostic::FrameTimeDiagnosticsPlugin;
use bevy::gizmos::config::{DefaultGizmoConfigGroup, GizmoConfigStore};
use bevy::math::bounding::Aabb2d;
use bevy::pbr::wireframe::{WireframeConfig, WireframePlugin};
use bevy::prelude::*;
use bevy::window::{PrimaryWindow, WindowPlugin};
use bevy_egui::EguiPlugin;
use bevy_rts_camera::*;

pub mod config;
pub mod systems;


// import modules here
use systems::city::CityGenerationPlugin;
use systems::grid::GridPlugin;

use crate::config::{CITY_HEIGHT, CITY_WIDTH};
use crate::systems::interaction;
use crate::systems::ui::UIPlugin;

fn main() -> bevy::app::AppExit {
    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "City Generator".to_string(),
                mode: bevy::window::WindowMode::Windowed,
                resolution: bevy::window::WindowResolution::new(1920.0, 1080.0),
                ..default()
            }),
            ..default()
        }))
        .add_plugins(EguiPlugin::default())
        .add_plugins(FrameTimeDiagnosticsPlugin::default())
        .add_plugins(WireframePlugin::default())
        .add_plugins(RtsCameraPlugin)
        // my custom plugins
        .add_plugins(CityGenerationPlugin)
        .add_plugins(GridPlugin)
        .add_plugins(UIPlugin)
        .insert_resource(WireframeConfig {
            global: false,
            default_color: Color::BLACK,
        })
        .insert_resource(interaction::HoveredHit::default())
        .insert_resource(ClearColor(Color::srgb(0.05, 0.05, 0.08))) // world color
        .add_systems(Startup, (start, setup_gizmos, maximize_window))
        .add_systems(Update, (handle_exit, interaction::handle_mouse_interaction))
        .run()
}

fn setup_gizmos(mut config_store: ResMut<GizmoConfigStore>) {
    let (config, _) = config_store.config_mut::<DefaultGizmoConfigGroup>();
    config.depth_bias = -1.0; // render on top of everything else
}

fn maximize_window(mut windows: Query<&mut Window, With<PrimaryWindow>>) {
    for mut window in windows.iter_mut() {
        window.set_maximized(true);
    }
}

// application entry point here
fn start(mut commands: Commands) {
    // the city spans x in [0, w] and z in [-h, 0] once stood up
    let half = Vec2::new(CITY_WIDTH as f32, CITY_HEIGHT as f32) * 0.5;
    commands.spawn((
        RtsCamera {
            bounds: Aabb2d::new(Vec2::new(half.x, -half.y), half + Vec2::splat(32.0)),
            min_angle: 0.66,
            height_max: 260.0,
            ..default()
        },
        RtsCameraControls {
            key_up: KeyCode::KeyW,
            key_down: KeyCode::KeyS,
            key_left: KeyCode::KeyA,
            key_right: KeyCode::KeyD,
            key_rotate_left: KeyCode::KeyQ,
            key_rotate_right: KeyCode::KeyE,
            pan_speed: 40.0,
            zoom_sensitivity: 0.15,
            edge_pan_width: 0.0,
            ..default()
        },
    ));

    // spawn light source
    commands.spawn((
        DirectionalLight {
            illuminance: 3_000.,
            shadows_enabled: true,
            ..default()
        },
        Transform::from_xyz(50000.0, 80000.0, 30000.0).looking_at(Vec3::ZERO, Vec3::Y),
    ));
}

// application exit
fn handle_exit(keys: Res<ButtonInput<KeyCode>>, mut exit: EventWriter<AppExit>) {
    if keys.just_pressed(KeyCode::Escape) {
        exit.write(AppExit::Success);
    }
}
