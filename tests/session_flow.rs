//! End-to-end session scenarios driven through the public library API with
//! an in-process generator. No network access.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, mpsc};
use std::time::Duration;

use colormagic::CANVAS_SIZE;
use colormagic::assets::AppSettings;
use colormagic::canvas::{CanvasInput, InputPhase};
use colormagic::components::tools::Tool;
use colormagic::io::{self, BackgroundResult, ImageLoader, ImageRef};
use colormagic::ops::ai::{self, GenerationError, GenerationResult, ImageGenerator, Prompt};
use colormagic::project::{NoticeKind, Project};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

const WAIT: Duration = Duration::from_secs(10);

fn png_bytes(img: &RgbaImage) -> Vec<u8> {
    io::encode_png(img).expect("encode")
}

/// A wide black-on-white "page": white with a black band through the middle.
fn wide_page() -> RgbaImage {
    RgbaImage::from_fn(200, 100, |_, y| {
        if (40..60).contains(&y) { Rgba([0, 0, 0, 255]) } else { Rgba([255, 255, 255, 255]) }
    })
}

/// Returns a fixed inline PNG for every prompt, counting calls.
struct FixedGenerator {
    page: Vec<u8>,
    calls: AtomicUsize,
}

impl ImageGenerator for FixedGenerator {
    fn generate(&self, _prompt: &Prompt) -> Result<ImageRef, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(ImageRef::Inline { mime_type: "image/png".to_string(), data: self.page.clone() })
    }
}

struct RefusingGenerator;

impl ImageGenerator for RefusingGenerator {
    fn generate(&self, _prompt: &Prompt) -> Result<ImageRef, GenerationError> {
        Err(GenerationError::new("safety filter"))
    }
}

fn settings() -> AppSettings {
    AppSettings { placeholder_background: String::new(), ..Default::default() }
}

fn submit(
    project: &mut Project,
    generator: Arc<dyn ImageGenerator>,
    text: &str,
) -> GenerationResult {
    let (tx, rx) = mpsc::channel();
    let (token, prompt) = project.begin_generation(text).expect("accepted");
    ai::spawn_generation(generator, prompt, token, tx);
    rx.recv_timeout(WAIT).expect("generation result")
}

#[test]
fn generated_page_is_aspect_fit_and_exported_with_strokes() {
    let settings = settings();
    let mut project = Project::new(&settings);
    let loader = Arc::new(ImageLoader::new(&settings).expect("loader"));
    let generator = Arc::new(FixedGenerator { page: png_bytes(&wide_page()), calls: AtomicUsize::new(0) });

    let result = submit(&mut project, generator.clone(), "A happy dinosaur");
    assert!(project.is_generating());
    let request = project
        .finish_generation(result.token, &result.prompt, result.result)
        .expect("background request");
    assert!(!project.is_generating());
    assert_eq!(project.page.as_ref().map(|p| p.prompt.as_str()), Some("A happy dinosaur"));

    let (tx, rx) = mpsc::channel::<BackgroundResult>();
    io::spawn_background_load(loader, request.image_ref, request.token, tx);
    let loaded = rx.recv_timeout(WAIT).expect("background result");
    assert!(project.commit_background(loaded.token, loaded.result));

    // 2:1 page on a square surface: full width, centered vertically
    let mut expected = RgbaImage::from_pixel(CANVAS_SIZE, CANVAS_SIZE, Rgba([0, 0, 0, 0]));
    let scaled = imageops::resize(&wide_page(), CANVAS_SIZE, CANVAS_SIZE / 2, FilterType::Triangle);
    imageops::replace(&mut expected, &scaled, 0, (CANVAS_SIZE / 4) as i64);
    assert_eq!(project.flatten().expect("flatten"), expected);

    // Paint a red stroke across the top letterbox and check it lands in the export
    project.handle_input(CanvasInput { phase: InputPhase::Start, pos: Some((100.0, 100.0)) });
    project.handle_input(CanvasInput { phase: InputPhase::Move, pos: Some((900.0, 100.0)) });
    project.handle_input(CanvasInput::end());
    let png = project.export_png().expect("export");
    let exported = image::load_from_memory(&png).expect("decode").into_rgba8();
    assert_eq!(exported.dimensions(), (CANVAS_SIZE, CANVAS_SIZE));
    assert_eq!(*exported.get_pixel(500, 100), Rgba([0xef, 0x44, 0x44, 255]));
    assert_eq!(*exported.get_pixel(500, 300), *expected.get_pixel(500, 300));

    // Eraser clears the stroke back to the base
    project.brush.tool = Tool::Eraser;
    project.brush.size = 40;
    project.handle_input(CanvasInput { phase: InputPhase::Start, pos: Some((80.0, 100.0)) });
    project.handle_input(CanvasInput { phase: InputPhase::Move, pos: Some((920.0, 100.0)) });
    project.handle_input(CanvasInput::end());
    assert!(project.canvas_state.drawing.is_blank());
    assert_eq!(generator.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn overlapping_background_loads_keep_the_newest() {
    let settings = settings();
    let mut project = Project::with_size(&settings, 64, 64);
    let loader = Arc::new(ImageLoader::new(&settings).expect("loader"));

    let red = ImageRef::Inline {
        mime_type: "image/png".to_string(),
        data: png_bytes(&RgbaImage::from_pixel(8, 8, Rgba([255, 0, 0, 255]))),
    };
    let blue = ImageRef::Inline {
        mime_type: "image/png".to_string(),
        data: png_bytes(&RgbaImage::from_pixel(8, 8, Rgba([0, 0, 255, 255]))),
    };
    let first = project.request_background(Some(red)).expect("first");
    let second = project.request_background(Some(blue)).expect("second");

    let (tx, rx) = mpsc::channel();
    io::spawn_background_load(loader.clone(), first.image_ref, first.token, tx.clone());
    io::spawn_background_load(loader, second.image_ref, second.token, tx);

    // Apply in whatever order they finish; only the second may stick
    let mut committed = 0;
    for _ in 0..2 {
        let r = rx.recv_timeout(WAIT).expect("result");
        if project.commit_background(r.token, r.result) {
            committed += 1;
        }
    }
    assert_eq!(committed, 1);
    assert_eq!(*project.canvas_state.base.pixels.get_pixel(32, 32), Rgba([0, 0, 255, 255]));
    assert!(!project.is_loading_background());
}

#[test]
fn refused_generation_leaves_one_notice_and_the_old_page() {
    let settings = settings();
    let mut project = Project::with_size(&settings, 32, 32);
    let req = project
        .request_background(Some(ImageRef::Inline {
            mime_type: "image/png".to_string(),
            data: png_bytes(&RgbaImage::from_pixel(4, 4, Rgba([7, 7, 7, 255]))),
        }))
        .expect("request");
    let loader = ImageLoader::new(&settings).expect("loader");
    project.commit_background(req.token, loader.load(&req.image_ref));
    let before = project.canvas_state.base.pixels.clone();

    let result = submit(&mut project, Arc::new(RefusingGenerator), "A space cat");
    assert_eq!(project.finish_generation(result.token, &result.prompt, result.result), None);

    assert!(!project.is_generating());
    let notice = project.notice.clone().expect("notice");
    assert_eq!(notice.kind, NoticeKind::GenerationFailed);
    assert_eq!(notice.text, colormagic::assets::MSG_GENERATION_FAILED);
    assert_eq!(project.canvas_state.base.pixels, before);

    // A new submission is accepted and clears the notice
    assert!(project.begin_generation("A space cat").is_ok());
    assert!(project.notice.is_none());
}
