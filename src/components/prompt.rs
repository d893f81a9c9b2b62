use eframe::egui;
use egui::{Color32, RichText, Vec2};

use crate::assets::{PROMPT_PLACEHOLDER, SUGGESTIONS};

/// Prompt bar with the Create button and quick-pick suggestion chips.
#[derive(Default)]
pub struct PromptPanel {
    pub text: String,
}

impl PromptPanel {
    /// Returns the text to submit when the user pressed Enter or Create.
    /// Input is disabled while `busy`.
    pub fn show(&mut self, ui: &mut egui::Ui, busy: bool) -> Option<String> {
        let blue = Color32::from_rgb(0x3b, 0x82, 0xf6);
        let mut submit = false;

        ui.horizontal(|ui| {
            let edit = egui::TextEdit::singleline(&mut self.text)
                .hint_text(PROMPT_PLACEHOLDER)
                .font(egui::TextStyle::Heading)
                .desired_width(ui.available_width() - 170.0);
            let resp = ui.add_enabled(!busy, edit);
            if resp.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter)) {
                submit = true;
            }

            let label = if busy {
                RichText::new("🌀 Generating...")
            } else {
                RichText::new("Create ✨")
            };
            let button = egui::Button::new(label.strong().size(18.0).color(Color32::WHITE))
                .fill(blue)
                .min_size(Vec2::new(150.0, 40.0));
            if ui.add_enabled(!busy && !self.text.trim().is_empty(), button).clicked() {
                submit = true;
            }
        });

        ui.horizontal_wrapped(|ui| {
            for &suggestion in SUGGESTIONS {
                let chip = egui::Button::new(RichText::new(suggestion).color(blue)).fill(Color32::WHITE);
                if ui.add(chip).clicked() {
                    self.text = suggestion.to_string();
                }
            }
        });

        (submit && !busy && !self.text.trim().is_empty()).then(|| self.text.clone())
    }
}
