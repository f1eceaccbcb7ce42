use bevy::prelude::*;
use bevy::window::{PrimaryWindow, Window};
use bevy_egui::EguiContexts;
use bevy_rts_camera::RtsCamera;

use crate::config::{BLAST_AMOUNT, BLAST_RADIUS};
use crate::systems::city::world::{City, HitKind, RayHit};
use crate::systems::city::world_to_city;
use crate::systems::ui::indicator::DamageEvent;

// what the cursor currently points at, for the panel
#[derive(Resource, Default)]
pub struct HoveredHit(pub Option<RayHit>);

// screen ray into z-up city space
fn screen_to_city_ray(
    screen_pos: Vec2,
    camera: &Camera,
    camera_transform: &GlobalTransform,
) -> Option<Ray3d> {
    // Bevy handles the viewport conversion
    let ray = camera.viewport_to_world(camera_transform, screen_pos).ok()?;
    let direction = Dir3::new(world_to_city(*ray.direction)).ok()?;
    Some(Ray3d::new(world_to_city(ray.origin), direction))
}

// left click blows up whatever is under the cursor
pub fn handle_mouse_interaction(
    mut contexts: EguiContexts,
    city: Option<ResMut<City>>,
    mut hovered: ResMut<HoveredHit>,
    mut damage_events: EventWriter<DamageEvent>,
    windows: Query<&Window, With<PrimaryWindow>>,
    camera_query: Query<(&Camera, &GlobalTransform), With<RtsCamera>>,
    mouse_button: Res<ButtonInput<MouseButton>>,
) {
    hovered.0 = None;
    let Some(mut city) = city else { return };

    // the side panel takes its own clicks
    if let Ok(ctx) = contexts.ctx_mut() {
        if ctx.is_pointer_over_area() {
            return;
        }
    }

    let Ok(window) = windows.single() else { return };
    let Ok((camera, camera_transform)) = camera_query.single() else { return };
    let Some(cursor_pos) = window.cursor_position() else { return };
    let Some(ray) = screen_to_city_ray(cursor_pos, camera, camera_transform) else { return };

    let hit = city.raycast(ray);
    hovered.0 = Some(hit);

    if hit.kind == HitKind::None || !mouse_button.just_pressed(MouseButton::Left) {
        return;
    }

    let before = city.property_damage();
    let destroyed = city.damage(hit.point, BLAST_RADIUS, BLAST_AMOUNT);
    if destroyed > 0 {
        damage_events.write(DamageEvent {
            destroyed,
            value: city.property_damage() - before,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::systems::city::city_to_world;

    #[test]
    fn looking_down_in_the_scene_is_looking_down_in_the_city() {
        let down = world_to_city(Vec3::NEG_Y);
        assert!(down.abs_diff_eq(Vec3::NEG_Z, 1e-6));
        let eye = city_to_world(Vec3::new(10.0, 20.0, 30.0));
        assert!(eye.abs_diff_eq(Vec3::new(10.0, 30.0, -20.0), 1e-4));
    }
}
