use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts};

// damage popup after each blast
#[derive(Resource)]
pub struct DamageIndicator {
    pub destroyed: usize,
    pub value: f64,
    pub timer: f32,
    pub duration: f32,
}

impl Default for DamageIndicator {
    fn default() -> Self {
        Self {
            destroyed: 0,
            value: 0.0,
            timer: 0.0,
            duration: 2.0,
        }
    }
}

#[derive(Event)]
pub struct DamageEvent {
    pub destroyed: usize,
    pub value: f64,
}

impl DamageIndicator {
    // blasts landing while the popup is up add to it
    fn add(&mut self, event: &DamageEvent) {
        if self.timer <= 0.0 {
            self.destroyed = 0;
            self.value = 0.0;
        }
        self.destroyed += event.destroyed;
        self.value += event.value;
        self.timer = self.duration;
    }

    fn tick(&mut self, delta: f32) {
        self.timer = (self.timer - delta).max(0.0);
    }
}

pub fn update_damage_indicator(
    mut indicator: ResMut<DamageIndicator>,
    mut events: EventReader<DamageEvent>,
    time: Res<Time>,
) {
    for event in events.read() {
        indicator.add(event);
    }

    if indicator.timer > 0.0 {
        indicator.tick(time.delta_secs());
    }
}

pub fn render_damage_indicator(indicator: Res<DamageIndicator>, mut contexts: EguiContexts) {
    if indicator.timer <= 0.0 {
        return;
    }

    if let Ok(ctx) = contexts.ctx_mut() {
        let alpha = (indicator.timer / indicator.duration).clamp(0.0, 1.0);
        let bg_color = egui::Color32::from_rgb(180, 60, 60);

        egui::Area::new(egui::Id::new("damage_indicator"))
            .anchor(egui::Align2::CENTER_TOP, egui::vec2(0.0, 60.0))
            .show(ctx, |ui| {
                let frame = egui::Frame::new()
                    .fill(egui::Color32::from_rgba_unmultiplied(
                        bg_color.r(),
                        bg_color.g(),
                        bg_color.b(),
                        (200.0 * alpha) as u8,
                    ))
                    .stroke(egui::Stroke::new(
                        2.0,
                        egui::Color32::from_rgba_unmultiplied(255, 255, 255, (200.0 * alpha) as u8),
                    ))
                    .inner_margin(egui::Margin::symmetric(20, 10))
                    .corner_radius(egui::CornerRadius::same(8));

                frame.show(ui, |ui| {
                    let text = match indicator.destroyed {
                        1 => format!("1 BUILDING  +${:.0}", indicator.value),
                        n => format!("{} BUILDINGS  +${:.0}", n, indicator.value),
                    };
                    ui.label(
                        egui::RichText::new(text)
                            .size(18.0)
                            .color(egui::Color32::from_rgba_unmultiplied(
                                255,
                                255,
                                255,
                                (255.0 * alpha) as u8,
                            ))
                            .strong(),
                    );
                });
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn popup_accumulates_until_it_fades() {
        let mut indicator = DamageIndicator::default();
        indicator.add(&DamageEvent { destroyed: 2, value: 10.0 });
        indicator.tick(0.5);
        indicator.add(&DamageEvent { destroyed: 1, value: 5.0 });
        assert_eq!(indicator.destroyed, 3);
        assert_eq!(indicator.value, 15.0);
        assert_eq!(indicator.timer, indicator.duration);

        indicator.tick(10.0);
        assert_eq!(indicator.timer, 0.0);
        indicator.add(&DamageEvent { destroyed: 1, value: 1.0 });
        assert_eq!(indicator.destroyed, 1);
    }
}
