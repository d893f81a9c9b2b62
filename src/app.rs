use colormagic::assets::AppSettings;
use colormagic::canvas::Canvas;
use colormagic::components::colors::ColorPalette;
use colormagic::components::prompt::PromptPanel;
use colormagic::components::tools::ToolsPanel;
use colormagic::io::{self, BackgroundResult, ImageLoader, ImageRef, LoadError};
use colormagic::ops::ai::{self, GeminiGenerator, GenerationError, GenerationResult, ImageGenerator, Prompt};
use colormagic::project::{BackgroundRequest, Project};
use colormagic::{log_err, log_info, log_warn};
use eframe::egui;
use egui::{Color32, RichText, Vec2};
use std::sync::{Arc, mpsc};

/// Stand-in used when the HTTP client could not be built, so submissions
/// still end in the normal failure notice.
struct UnavailableGenerator(String);

impl ImageGenerator for UnavailableGenerator {
    fn generate(&self, _prompt: &Prompt) -> Result<ImageRef, GenerationError> {
        Err(GenerationError::new(self.0.clone()))
    }
}

pub struct ColorMagicApp {
    settings: AppSettings,
    project: Project,
    canvas: Canvas,
    prompt: PromptPanel,

    generator: Arc<dyn ImageGenerator>,
    loader: Option<Arc<ImageLoader>>,

    // Background jobs post here; polled every frame
    generation_sender: mpsc::Sender<GenerationResult>,
    generation_receiver: mpsc::Receiver<GenerationResult>,
    background_sender: mpsc::Sender<BackgroundResult>,
    background_receiver: mpsc::Receiver<BackgroundResult>,
}

impl ColorMagicApp {
    pub fn new(cc: &eframe::CreationContext<'_>, settings: AppSettings) -> Self {
        cc.egui_ctx.set_visuals(egui::Visuals::light());

        let generator: Arc<dyn ImageGenerator> = match GeminiGenerator::from_settings(&settings) {
            Ok(g) => Arc::new(g),
            Err(e) => {
                log_err!("Image generator unavailable: {}", e);
                Arc::new(UnavailableGenerator(e.detail))
            }
        };
        let loader = match ImageLoader::new(&settings) {
            Ok(l) => Some(Arc::new(l)),
            Err(e) => {
                log_err!("Image loader unavailable: {}", e);
                None
            }
        };
        if settings.resolved_api_key().is_none() {
            log_warn!("No API key configured; generation will fail until one is set");
        }

        let (generation_sender, generation_receiver) = mpsc::channel();
        let (background_sender, background_receiver) = mpsc::channel();

        let mut app = Self {
            project: Project::new(&settings),
            canvas: Canvas::new(),
            prompt: PromptPanel::default(),
            generator,
            loader,
            generation_sender,
            generation_receiver,
            background_sender,
            background_receiver,
            settings,
        };

        // Placeholder page until the first generation lands
        if !app.settings.placeholder_background.is_empty() {
            match ImageRef::parse(&app.settings.placeholder_background) {
                Ok(image_ref) => {
                    if let Some(req) = app.project.request_background(Some(image_ref)) {
                        app.start_background(req);
                    }
                }
                Err(e) => app.project.fail_background(e),
            }
        }
        log_info!("ColorMagic started");
        app
    }

    fn submit_prompt(&mut self, text: &str) {
        match self.project.begin_generation(text) {
            Ok((token, prompt)) => {
                ai::spawn_generation(self.generator.clone(), prompt, token, self.generation_sender.clone());
            }
            Err(e) => log_warn!("Submission ignored: {}", e),
        }
    }

    fn start_background(&mut self, req: BackgroundRequest) {
        match &self.loader {
            Some(loader) => {
                io::spawn_background_load(loader.clone(), req.image_ref, req.token, self.background_sender.clone());
            }
            None => {
                self.project.commit_background(
                    req.token,
                    Err(LoadError::Fetch("image loader unavailable".to_string())),
                );
            }
        }
    }

    fn save_page(&mut self) {
        // Report a non-exportable page before bothering the user with a dialog
        let image = match self.project.flatten() {
            Ok(image) => image,
            Err(e) => {
                self.project.fail_export(&e);
                return;
            }
        };
        if let Some(path) = io::pick_save_path(&self.settings.export_file_name) {
            let _ = self.project.save_flattened_to(&image, &path);
        }
    }

    fn poll_jobs(&mut self, ctx: &egui::Context) {
        while let Ok(result) = self.generation_receiver.try_recv() {
            if let Some(req) = self.project.finish_generation(result.token, &result.prompt, result.result) {
                self.prompt.text.clear();
                self.start_background(req);
            }
        }
        while let Ok(result) = self.background_receiver.try_recv() {
            log_info!("Background load finished for {}", result.image_ref);
            self.project.commit_background(result.token, result.result);
        }
        // Keep polling while a worker is out
        if self.project.is_generating() || self.project.is_loading_background() {
            ctx.request_repaint();
        }
    }

    fn notice_banner(&mut self, ui: &mut egui::Ui) {
        let Some(notice) = self.project.notice.clone() else { return };
        let (fill, text_color) = if notice.is_error() {
            (Color32::from_rgb(0xfe, 0xe2, 0xe2), Color32::from_rgb(0xb9, 0x1c, 0x1c))
        } else {
            (Color32::from_rgb(0xdc, 0xfc, 0xe7), Color32::from_rgb(0x15, 0x80, 0x3d))
        };
        egui::Frame::none()
            .fill(fill)
            .rounding(12.0)
            .inner_margin(egui::Margin::same(10.0))
            .show(ui, |ui| {
                ui.horizontal(|ui| {
                    ui.label(RichText::new(&notice.text).color(text_color).strong());
                    if notice.is_retryable_load() && ui.button("🔄 Try again").clicked() {
                        if let Some(req) = self.project.retry_background() {
                            self.start_background(req);
                        }
                    }
                    if ui.small_button("✖").clicked() {
                        self.project.notice = None;
                    }
                });
            });
        ui.add_space(8.0);
    }
}

impl eframe::App for ColorMagicApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.poll_jobs(ctx);

        // --- Header + prompt bar ---
        egui::TopBottomPanel::top("header").show(ctx, |ui| {
            ui.add_space(8.0);
            ui.horizontal(|ui| {
                ui.heading(
                    RichText::new("🪄 ColorMagic")
                        .size(30.0)
                        .strong()
                        .color(Color32::from_rgb(0xa8, 0x55, 0xf7)),
                );
                ui.label(RichText::new("Type an idea, get a coloring page, paint it!").color(Color32::GRAY));
            });
            ui.add_space(6.0);
            if let Some(text) = self.prompt.show(ui, self.project.is_generating()) {
                self.submit_prompt(&text);
            }
            ui.add_space(8.0);
        });

        // --- Tools ---
        egui::SidePanel::right("tools").resizable(false).min_width(280.0).show(ctx, |ui| {
            ui.add_space(8.0);
            ToolsPanel::show(ui, &mut self.project.brush);
            ui.add_space(16.0);
            ui.heading(RichText::new("🖍 Colors").strong());
            if let Some(color) = ColorPalette::show(ui, self.project.brush.color) {
                self.project.brush.color = color;
            }
            if let Some(page) = &self.project.page {
                ui.add_space(16.0);
                ui.label(RichText::new(format!("Page: {}", page.prompt)).italics().color(Color32::GRAY));
            }
        });

        // --- Canvas ---
        egui::CentralPanel::default().show(ctx, |ui| {
            self.notice_banner(ui);

            ui.horizontal(|ui| {
                let clear = egui::Button::new(RichText::new("🗑 Clear").strong()).min_size(Vec2::new(100.0, 34.0));
                if ui.add(clear).clicked() {
                    self.project.clear_drawing();
                }
                let save = egui::Button::new(RichText::new("💾 Save").strong().color(Color32::WHITE))
                    .fill(Color32::from_rgb(0x22, 0xc5, 0x5e))
                    .min_size(Vec2::new(100.0, 34.0));
                if ui.add(save).clicked() {
                    self.save_page();
                }
                if self.project.is_generating() {
                    ui.spinner();
                    ui.label("Drawing your page...");
                } else if self.project.is_loading_background() {
                    ui.spinner();
                }
            });
            ui.add_space(8.0);

            for input in self.canvas.show(ui, &self.project.canvas_state) {
                self.project.handle_input(input);
            }
        });
    }
}
