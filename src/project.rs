use std::path::Path;

use image::RgbaImage;
use thiserror::Error;
use uuid::Uuid;

use crate::assets::{AppSettings, MSG_BACKGROUND_FAILED, MSG_GENERATION_FAILED};
use crate::canvas::{CanvasInput, CanvasState};
use crate::components::tools::{BrushState, StrokeState};
use crate::io::{ImageRef, LoadError, LoadedImage};
use crate::ops::ai::{GenerationError, Prompt};
use crate::ops::canvas_ops::{self, ExportError};
use crate::{CANVAS_SIZE, log_err, log_info, log_warn};

/// The page currently behind the drawing layer.
#[derive(Clone, Debug)]
pub struct GeneratedPage {
    pub id: Uuid,
    pub image_ref: ImageRef,
    pub prompt: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoticeKind {
    GenerationFailed,
    BackgroundFailed,
    ExportFailed,
    Saved,
}

/// The single message slot shown above the canvas.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

impl Notice {
    pub fn is_error(&self) -> bool {
        self.kind != NoticeKind::Saved
    }

    /// Background failures can be retried by reloading the same reference.
    pub fn is_retryable_load(&self) -> bool {
        self.kind == NoticeKind::BackgroundFailed
    }
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum SubmitError {
    #[error("prompt is empty")]
    Empty,
    #[error("a page is already being generated")]
    Busy,
}

/// A load the caller must start: fetch `image_ref` and hand the result back
/// to [`Project::commit_background`] with the same `token`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BackgroundRequest {
    pub token: u64,
    pub image_ref: ImageRef,
}

/// One coloring session: both surfaces, the brush, the current page and the
/// bookkeeping that keeps out-of-order async results from clobbering newer ones.
///
/// Everything here is mutated from the UI thread only; worker threads just
/// produce results that are fed back in through `finish_generation` and
/// `commit_background`.
pub struct Project {
    pub canvas_state: CanvasState,
    pub brush: BrushState,
    pub stroke: StrokeState,
    pub page: Option<GeneratedPage>,
    pub notice: Option<Notice>,

    generating: bool,
    generation_token: u64,
    background_token: u64,
    /// Reference of the most recent background request, for retry.
    last_background: Option<ImageRef>,
    background_pending: bool,
}

impl Project {
    pub fn new(settings: &AppSettings) -> Self {
        Self::with_size(settings, CANVAS_SIZE, CANVAS_SIZE)
    }

    pub fn with_size(settings: &AppSettings, width: u32, height: u32) -> Self {
        Self {
            canvas_state: CanvasState::new(width, height),
            brush: BrushState::from_settings(settings),
            stroke: StrokeState::default(),
            page: None,
            notice: None,
            generating: false,
            generation_token: 0,
            background_token: 0,
            last_background: None,
            background_pending: false,
        }
    }

    pub fn is_generating(&self) -> bool {
        self.generating
    }

    pub fn is_loading_background(&self) -> bool {
        self.background_pending
    }

    // ------------------------------------------------------------------
    // Drawing
    // ------------------------------------------------------------------

    /// Feed one pointer sample through the stroke state machine.
    pub fn handle_input(&mut self, input: CanvasInput) {
        if self
            .stroke
            .handle(input, &self.brush, &mut self.canvas_state.drawing.pixels)
        {
            self.canvas_state.mark_drawing_dirty();
        }
    }

    pub fn clear_drawing(&mut self) {
        self.stroke = StrokeState::Idle;
        self.canvas_state.clear_drawing();
    }

    // ------------------------------------------------------------------
    // Prompt gateway bookkeeping
    // ------------------------------------------------------------------

    /// Validate and accept a submission. Returns the token the eventual
    /// result must carry.
    pub fn begin_generation(&mut self, text: &str) -> Result<(u64, Prompt), SubmitError> {
        if self.generating {
            return Err(SubmitError::Busy);
        }
        let prompt = Prompt::new(text).ok_or(SubmitError::Empty)?;
        self.generation_token = self.generation_token.wrapping_add(1);
        self.generating = true;
        self.notice = None;
        log_info!("Generating page #{} for \"{}\"", self.generation_token, prompt.as_str());
        Ok((self.generation_token, prompt))
    }

    /// Apply a generation result. On success the new page becomes current
    /// and a background load is requested. Stale results are dropped.
    pub fn finish_generation(
        &mut self,
        token: u64,
        prompt: &Prompt,
        result: Result<ImageRef, GenerationError>,
    ) -> Option<BackgroundRequest> {
        if token != self.generation_token {
            log_warn!("Dropping stale generation result #{} (current #{})", token, self.generation_token);
            return None;
        }
        self.generating = false;
        match result {
            Ok(image_ref) => {
                log_info!("Generation #{} produced {}", token, image_ref);
                self.page = Some(GeneratedPage {
                    id: Uuid::new_v4(),
                    image_ref: image_ref.clone(),
                    prompt: prompt.as_str().to_string(),
                });
                self.request_background(Some(image_ref))
            }
            Err(e) => {
                log_err!("Generation #{} failed: {}", token, e);
                self.notice = Some(Notice {
                    kind: NoticeKind::GenerationFailed,
                    text: MSG_GENERATION_FAILED.to_string(),
                });
                None
            }
        }
    }

    // ------------------------------------------------------------------
    // Background compositor bookkeeping
    // ------------------------------------------------------------------

    /// Start a new background. `None` clears the drawing instead of loading.
    /// Every call supersedes any load still in flight.
    pub fn request_background(&mut self, image_ref: Option<ImageRef>) -> Option<BackgroundRequest> {
        self.background_token = self.background_token.wrapping_add(1);
        let Some(image_ref) = image_ref else {
            self.background_pending = false;
            self.clear_drawing();
            return None;
        };
        self.background_pending = true;
        self.last_background = Some(image_ref.clone());
        Some(BackgroundRequest {
            token: self.background_token,
            image_ref,
        })
    }

    /// Re-request the last background after a failed load.
    pub fn retry_background(&mut self) -> Option<BackgroundRequest> {
        let image_ref = self.last_background.clone()?;
        self.notice = None;
        self.request_background(Some(image_ref))
    }

    /// Apply a finished load. Returns false when the result was stale and
    /// nothing changed.
    pub fn commit_background(&mut self, token: u64, result: Result<LoadedImage, LoadError>) -> bool {
        if token != self.background_token {
            log_warn!("Dropping stale background #{} (current #{})", token, self.background_token);
            return false;
        }
        self.background_pending = false;
        match result {
            Ok(loaded) => {
                canvas_ops::paint_background(&mut self.canvas_state.base, &loaded.pixels, loaded.access);
                self.canvas_state.mark_base_dirty();
                self.clear_drawing();
                if self.notice.as_ref().is_some_and(|n| n.kind == NoticeKind::BackgroundFailed) {
                    self.notice = None;
                }
                log_info!(
                    "Background #{} committed ({}×{}, {:?})",
                    token,
                    loaded.pixels.width(),
                    loaded.pixels.height(),
                    loaded.access
                );
                true
            }
            Err(e) => {
                self.fail_background(e);
                true
            }
        }
    }

    /// Record a background that could not be loaded, or not even requested
    /// (a malformed reference). The base keeps its previous contents.
    pub fn fail_background(&mut self, error: LoadError) {
        log_err!("Background #{} failed to load: {}", self.background_token, error);
        self.background_pending = false;
        self.notice = Some(Notice {
            kind: NoticeKind::BackgroundFailed,
            text: MSG_BACKGROUND_FAILED.to_string(),
        });
    }

    // ------------------------------------------------------------------
    // Export
    // ------------------------------------------------------------------

    /// Flatten both surfaces into one image.
    pub fn flatten(&self) -> Result<RgbaImage, ExportError> {
        canvas_ops::flatten(&self.canvas_state)
    }

    /// Flatten and encode as PNG.
    pub fn export_png(&self) -> Result<Vec<u8>, ExportError> {
        crate::io::encode_png(&self.flatten()?)
    }

    /// Flatten, write to `path`, and record the outcome as a notice.
    pub fn save_to(&mut self, path: &Path) -> Result<(), ExportError> {
        match self.flatten() {
            Ok(image) => self.save_flattened_to(&image, path),
            Err(e) => {
                self.fail_export(&e);
                Err(e)
            }
        }
    }

    /// Write an image already produced by [`Project::flatten`] and record
    /// the outcome as a notice.
    pub fn save_flattened_to(&mut self, image: &RgbaImage, path: &Path) -> Result<(), ExportError> {
        let result = crate::io::write_png(image, path);
        match &result {
            Ok(()) => {
                log_info!("Saved page to {}", path.display());
                self.notice = Some(Notice {
                    kind: NoticeKind::Saved,
                    text: format!("Saved to {}", path.display()),
                });
            }
            Err(e) => self.fail_export(e),
        }
        result
    }

    pub fn fail_export(&mut self, error: &ExportError) {
        log_err!("Export failed: {}", error);
        self.notice = Some(Notice {
            kind: NoticeKind::ExportFailed,
            text: export_failure_text(error),
        });
    }
}

/// User-facing wording for an export failure.
pub fn export_failure_text(e: &ExportError) -> String {
    match e {
        ExportError::Tainted => {
            "This picture can't be saved because the place it came from doesn't allow copying.".to_string()
        }
        other => format!("Saving didn't work: {}", other),
    }
}
