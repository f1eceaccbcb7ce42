use bevy::diagnostic::{DiagnosticsStore, FrameTimeDiagnosticsPlugin}; // fps
use bevy::pbr::wireframe::WireframeConfig;
use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts, EguiPlugin, EguiPrimaryContextPass};

use crate::systems::city::world::{City, HitKind};
use crate::systems::city::{Catalog, CityParams, RegenerateEvent, Seed};
use crate::systems::export::{ExportEvent, ExportFormat};
use crate::systems::grid::GridConfig;
use crate::systems::interaction::HoveredHit;

pub mod indicator;

// re-export the main items that other modules need
pub use indicator::{render_damage_indicator, update_damage_indicator, DamageEvent, DamageIndicator};

#[derive(Resource)]
pub struct GizmosVisible(pub bool);

const ALERT: egui::Color32 = egui::Color32::from_rgb(178, 34, 34);

pub struct UIPlugin;

impl Plugin for UIPlugin {
    fn build(&self, app: &mut App) {
        assert!(app.is_plugin_added::<EguiPlugin>());
        app.insert_resource(GizmosVisible(false))
            .insert_resource(DamageIndicator::default())
            .add_event::<DamageEvent>()
            .add_systems(Update, (key_input, update_damage_indicator))
            // UI rendering here
            .add_systems(EguiPrimaryContextPass, (ui_main, fps, render_damage_indicator));
    }
}

fn key_input(keyboard_input: Res<ButtonInput<KeyCode>>, mut gizmos_visible: ResMut<GizmosVisible>) {
    if keyboard_input.just_pressed(KeyCode::Tab) {
        gizmos_visible.0 = !gizmos_visible.0;
    }
}

fn export_name(extension: &str) -> String {
    let timestamp = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default();
    format!("city_export_{}.{}", timestamp, extension)
}

fn ui_main(
    mut contexts: EguiContexts,
    current_seed: Res<Seed>,
    mut params: ResMut<CityParams>,
    mut regen_events: EventWriter<RegenerateEvent>,
    mut export_events: EventWriter<ExportEvent>,
    mut gizmos_visible: ResMut<GizmosVisible>,
    mut grid: ResMut<GridConfig>,
    mut wireframe: ResMut<WireframeConfig>,
    city: Option<Res<City>>,
    catalog: Res<Catalog>,
    hovered: Res<HoveredHit>,
) {
    if let Ok(ctx) = contexts.ctx_mut() {
        egui::SidePanel::left("config_panel")
            .default_width(200.0)
            .min_width(250.0)
            .max_width(400.0)
            .resizable(true)
            .show(ctx, |ui| {
                let mut regenerate = false;

                // camera
                ui.label("Camera: ");
                ui.label("WASD - Move");
                ui.label("Scroll - Zoom");
                ui.label("MMB - Rotate");
                ui.label("LMB - Blast");

                ui.separator();

                // visibility controls
                ui.label("Layer Visibility:");
                ui.checkbox(&mut gizmos_visible.0, "Road graph (TAB)")
                    .on_hover_text("Draw blocks and intersections over the city");
                ui.checkbox(&mut grid.enabled, "Chunk grid");
                ui.checkbox(&mut wireframe.global, "Wireframe");

                ui.separator();
                ui.label("Generation Parameters:");

                // seed
                egui::CollapsingHeader::new("Seed")
                    .default_open(true)
                    .show(ui, |ui| {
                        ui.label(format!("Current: {}", current_seed.0));
                        ui.horizontal(|ui| {
                            if ui.button("Regenerate").clicked() {
                                let new_seed = rand::random();
                                regen_events.write(RegenerateEvent { seed: new_seed });
                            }
                            let rebuild = ui
                                .button("Rebuild")
                                .on_hover_text("Same seed, restores destroyed buildings");
                            regenerate |= rebuild.clicked();
                        });
                    });

                egui::CollapsingHeader::new("City")
                    .default_open(true)
                    .show(ui, |ui| {
                        let width = egui::Slider::new(&mut params.width, 16..=512);
                        regenerate |= ui.add(width.text("Width (cells)")).changed();
                        let height = egui::Slider::new(&mut params.height, 16..=512);
                        regenerate |= ui.add(height.text("Height (cells)")).changed();

                        let narrow = egui::Slider::new(&mut params.roads.narrow_chance, 0.0..=1.0);
                        regenerate |= ui
                            .add(narrow.text("Narrow Roads"))
                            .on_hover_text("Chance a road sits closer to the block edges.")
                            .changed();

                        let chunk = egui::Slider::new(
                            &mut params.chunk_size,
                            8..=crate::config::MAX_CHUNK_SIZE,
                        );
                        regenerate |= ui
                            .add(chunk.text("Chunk Size"))
                            .on_hover_text("Edge length of one ground mesh piece.")
                            .changed();
                    });

                egui::CollapsingHeader::new("Damage")
                    .default_open(false)
                    .show(ui, |ui| {
                        let scale = egui::Slider::new(&mut params.damage_scale, 1.0..=100.0);
                        regenerate |= ui.add(scale.text("Value Scale")).changed();
                    });

                ui.separator();

                if let Some(city) = city.as_deref() {
                    egui::Grid::new("city_stats").show(ui, |ui| {
                        ui.label("Blocks:");
                        ui.label(city.network().blocks().len().to_string());
                        ui.end_row();
                        ui.label("Intersections:");
                        ui.label(city.network().intersection_count().to_string());
                        ui.end_row();
                        ui.label("Models:");
                        ui.label(format!(
                            "{} in {} sizes",
                            catalog.0.variant_count(),
                            catalog.0.sizes().len()
                        ));
                        ui.end_row();
                        ui.label("Buildings:");
                        ui.label(format!("{} / {}", city.live_count(), city.building_count()));
                        ui.end_row();
                        ui.label("Property damage:");
                        ui.label(
                            egui::RichText::new(format!("${:.0}", city.property_damage()))
                                .color(ALERT),
                        );
                        ui.end_row();
                    });

                    let target = match hovered.0.map(|h| h.kind) {
                        Some(HitKind::Building(b)) => city.building(b).map_or_else(
                            || "-".to_string(),
                            |b| format!("{} ({:?})", b.name, b.orientation),
                        ),
                        Some(HitKind::Ground) => "ground".to_string(),
                        _ => "-".to_string(),
                    };
                    ui.label(format!("Target: {}", target));
                } else {
                    ui.label(egui::RichText::new("No city generated").color(ALERT));
                }

                ui.separator();

                // export section
                ui.horizontal(|ui| {
                    if ui
                        .button("Export OBJ")
                        .on_hover_text("Export ground and buildings as OBJ, current directory")
                        .clicked()
                    {
                        export_events.write(ExportEvent {
                            filename: export_name("obj"),
                            format: ExportFormat::Obj,
                        });
                    }
                    if ui
                        .button("Dump Tiles")
                        .on_hover_text("Write the tile map as text")
                        .clicked()
                    {
                        export_events.write(ExportEvent {
                            filename: export_name("txt"),
                            format: ExportFormat::Ascii,
                        });
                    }
                });

                ui.separator();
                ui.label("ESC - Exit");

                // trigger regeneration on any parameter change
                if regenerate {
                    regen_events.write(RegenerateEvent { seed: current_seed.0 });
                }
            });
    }
}

fn fps(mut contexts: EguiContexts, diagnostics: Res<DiagnosticsStore>) {
    if let Ok(ctx) = contexts.ctx_mut() {
        egui::Area::new(egui::Id::new("fps_counter"))
            .anchor(egui::Align2::RIGHT_TOP, egui::Vec2::new(-10.0, 10.0))
            .show(ctx, |ui| {
                ui.with_layout(egui::Layout::top_down(egui::Align::RIGHT), |ui| {
                    if let Some(fps) = diagnostics
                        .get(&FrameTimeDiagnosticsPlugin::FPS)
                        .and_then(|d| d.smoothed())
                    {
                        let text = egui::RichText::new(format!("{:.0}", fps))
                            .size(26.0)
                            .color(egui::Color32::WHITE);
                        ui.label(text);
                    }
                });
            });
    }
}
