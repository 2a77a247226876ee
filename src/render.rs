// Overlay rendering for the booth display

use image::imageops;
use image::{ImageBuffer, Pixel, Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use rusttype::{Font, Scale};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
pub const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

const SHADOW_OFFSET: i32 = 3;

/// Which screen edge a guide is anchored to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuideSide {
    Left,
    Right,
}

/// Where a guide goes: an empty strip of `area_height` x `area_width` along
/// one edge, with the guide centred at `relative` (y, x) inside that strip.
#[derive(Debug, Clone, Copy)]
pub struct GuidePlacement {
    pub area_height: u32,
    pub area_width: u32,
    pub relative: (f32, f32),
    pub mirror: bool,
    pub side: GuideSide,
}

impl GuidePlacement {
    pub fn centered(area_height: u32, area_width: u32, side: GuideSide) -> Self {
        GuidePlacement {
            area_height,
            area_width,
            relative: (0.5, 0.5),
            mirror: false,
            side,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct TextStyle {
    pub font_size: f32,
    pub color: Rgba<u8>,
    pub shadow: Rgba<u8>,
    /// Top edge of the text; `None` centres it vertically.
    pub y: Option<i32>,
}

impl TextStyle {
    pub fn new(font_size: f32) -> Self {
        TextStyle {
            font_size,
            color: WHITE,
            shadow: BLACK,
            y: None,
        }
    }

    pub fn color(mut self, color: Rgba<u8>) -> Self {
        self.color = color;
        self
    }

    pub fn shadow(mut self, shadow: Rgba<u8>) -> Self {
        self.shadow = shadow;
        self
    }

    pub fn at(mut self, y: i32) -> Self {
        self.y = Some(y);
        self
    }
}

/// Pure composition service: every call returns a new frame and leaves
/// `base` untouched.
pub trait Renderer: Send + Sync {
    fn compose(&self, base: &RgbaImage, text: &str, style: TextStyle) -> RgbaImage;
    fn compose_overlay_guide(
        &self,
        base: &RgbaImage,
        guide_path: &Path,
        placement: GuidePlacement,
    ) -> RgbaImage;
}

pub struct FontRenderer {
    font: Option<Font<'static>>,
    guides: Mutex<HashMap<PathBuf, RgbaImage>>,
}

impl FontRenderer {
    pub fn new(font_path: &Path) -> Self {
        let font = match std::fs::read(font_path) {
            Ok(data) => Font::try_from_vec(data).or_else(|| {
                warn!("Failed to parse font {}, text will be skipped", font_path.display());
                None
            }),
            Err(e) => {
                warn!("Font {} not found ({}), text will be skipped", font_path.display(), e);
                None
            }
        };

        FontRenderer {
            font,
            guides: Mutex::new(HashMap::new()),
        }
    }

    fn load_guide(&self, path: &Path) -> Option<RgbaImage> {
        let mut cache = self.guides.lock().ok()?;
        if let Some(guide) = cache.get(path) {
            return Some(guide.clone());
        }

        match image::open(path) {
            Ok(guide) => {
                let guide = guide.to_rgba8();
                cache.insert(path.to_path_buf(), guide.clone());
                Some(guide)
            }
            Err(e) => {
                warn!("Guide {} unavailable: {}", path.display(), e);
                None
            }
        }
    }
}

impl Renderer for FontRenderer {
    fn compose(&self, base: &RgbaImage, text: &str, style: TextStyle) -> RgbaImage {
        let mut frame = base.clone();
        let Some(font) = &self.font else {
            return frame;
        };

        let scale = Scale::uniform(style.font_size);
        let (text_width, text_height) = text_size(scale, font, text);
        let x = (frame.width() as i32 - text_width) / 2;
        let y = style
            .y
            .unwrap_or((frame.height() as i32 - text_height) / 2);

        draw_text_mut(
            &mut frame,
            style.shadow,
            x + SHADOW_OFFSET,
            y + SHADOW_OFFSET,
            scale,
            font,
            text,
        );
        draw_text_mut(&mut frame, style.color, x, y, scale, font, text);
        frame
    }

    fn compose_overlay_guide(
        &self,
        base: &RgbaImage,
        guide_path: &Path,
        placement: GuidePlacement,
    ) -> RgbaImage {
        let mut frame = base.clone();
        if let Some(guide) = self.load_guide(guide_path) {
            place_patch(&mut frame, &guide, placement);
        }
        frame
    }
}

/// Copies `patch` into the empty strip described by `placement`, overwriting
/// the pixels underneath. With `mirror` a horizontally flipped copy is also
/// placed at the mirrored position on the opposite edge.
pub fn place_patch<P>(
    image: &mut ImageBuffer<P, Vec<P::Subpixel>>,
    patch: &ImageBuffer<P, Vec<P::Subpixel>>,
    placement: GuidePlacement,
) where
    P: Pixel + 'static,
{
    let (patch_w, patch_h) = patch.dimensions();
    let (relative_y, relative_x) = placement.relative;
    let y = (placement.area_height as f32 * relative_y - patch_h as f32 / 2.0) as i64;
    let left_x = (placement.area_width as f32 * relative_x - patch_w as f32 / 2.0) as i64;

    let width = image.width() as i64;
    let x = match placement.side {
        GuideSide::Left => left_x,
        GuideSide::Right => width - left_x - patch_w as i64,
    };
    imageops::replace(image, patch, x, y);

    if placement.mirror {
        let flipped = imageops::flip_horizontal(patch);
        imageops::replace(image, &flipped, width - x - patch_w as i64, y);
    }
}

/// Blank overlay: opaque black side bars around a transparent centre square.
pub fn default_canvas(width: u32, height: u32, side_bar: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, _| {
        if x < side_bar || x >= width.saturating_sub(side_bar) {
            BLACK
        } else {
            Rgba([0, 0, 0, 0])
        }
    })
}

/// Paints the side bars of an already composed frame black, keeping alpha.
pub fn blacken_borders(frame: &mut RgbaImage, side_bar: u32) {
    let width = frame.width();
    for (x, _, pixel) in frame.enumerate_pixels_mut() {
        if x < side_bar || x >= width.saturating_sub(side_bar) {
            pixel.0[0] = 0;
            pixel.0[1] = 0;
            pixel.0[2] = 0;
        }
    }
}

/// Resizes a captured frame to the screen and makes it fully opaque.
pub fn fit_to_screen(frame: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    let mut fitted = if frame.dimensions() == (width, height) {
        frame.clone()
    } else {
        imageops::resize(frame, width, height, imageops::FilterType::Triangle)
    };
    for pixel in fitted.pixels_mut() {
        pixel.0[3] = 255;
    }
    fitted
}
