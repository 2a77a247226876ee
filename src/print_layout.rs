// Turns a captured frame into a print-ready postcard layout

use image::imageops;
use image::{Rgb, RgbImage};
use imageproc::filter::filter3x3;
use std::path::PathBuf;
use tracing::warn;

use crate::render::{place_patch, GuidePlacement, GuideSide};

const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
const CUT_LINE_GREY: Rgb<u8> = Rgb([100, 100, 100]);

const SHARPEN_KERNEL: [f32; 9] = [-1.0, -1.0, -1.0, -1.0, 9.0, -1.0, -1.0, -1.0, -1.0];

/// Paper width:height ratio of the postcard media.
pub const PAPER_RATIO: f32 = 1.48;

#[derive(Debug, Clone)]
pub struct PrintLayout {
    pub border_width: u32,
    /// Extra white space above and below the photo on top of the border.
    pub vertical_margin: u32,
    pub cut_line_width: u32,
    pub dash_length: u32,
    pub paper_ratio: f32,
    pub scissors_path: Option<PathBuf>,
}

impl Default for PrintLayout {
    fn default() -> Self {
        PrintLayout {
            border_width: 30,
            vertical_margin: 35,
            cut_line_width: 3,
            dash_length: 5,
            paper_ratio: PAPER_RATIO,
            scissors_path: None,
        }
    }
}

impl PrintLayout {
    pub fn with_scissors(mut self, path: PathBuf) -> Self {
        self.scissors_path = Some(path);
        self
    }

    pub fn apply(&self, photo: &RgbImage) -> RgbImage {
        let image = crop_to_square(photo);
        let image = sharpen(&image);
        let image = self.add_white_border(&image);
        let image = self.add_cutting_line(&image);
        let (mut image, padding) = self.normalize_to_paper(&image);

        if padding > 0 {
            if let Some(scissors) = self.load_scissors() {
                for relative_y in [0.2, 0.8] {
                    let placement = GuidePlacement {
                        area_height: image.height(),
                        area_width: padding,
                        relative: (relative_y, 0.5),
                        mirror: true,
                        side: GuideSide::Left,
                    };
                    place_patch(&mut image, &scissors, placement);
                }
            }
        }

        image
    }

    fn load_scissors(&self) -> Option<RgbImage> {
        let path = self.scissors_path.as_ref()?;
        match image::open(path) {
            Ok(patch) => Some(patch.to_rgb8()),
            Err(e) => {
                warn!("Scissors guide {} unavailable: {}", path.display(), e);
                None
            }
        }
    }

    fn add_white_border(&self, image: &RgbImage) -> RgbImage {
        let side = self.border_width;
        let top = self.border_width + self.vertical_margin;
        pad(image, side, top, WHITE)
    }

    /// Grey line down both sides, interrupted every other dash length.
    fn add_cutting_line(&self, image: &RgbImage) -> RgbImage {
        let line = self.cut_line_width;
        let mut lined = pad(image, line, 0, CUT_LINE_GREY);
        let (width, height) = lined.dimensions();
        let dash = self.dash_length.max(1);

        for y0 in (0..height).step_by((dash * 2) as usize).skip(1).step_by(2) {
            for y in y0..(y0 + dash).min(height) {
                for x in (0..line).chain(width - line..width) {
                    lined.put_pixel(x, y, WHITE);
                }
            }
        }
        lined
    }

    /// Pads left and right with white until width = height * ratio.
    /// Returns the padded image and the width of each padding strip.
    fn normalize_to_paper(&self, image: &RgbImage) -> (RgbImage, u32) {
        let (width, height) = image.dimensions();
        let desired_width = height as f32 * self.paper_ratio;
        let add_sides = ((desired_width - width as f32) / 2.0).max(0.0) as u32;
        (pad(image, add_sides, 0, WHITE), add_sides)
    }
}

/// Centre crop to the largest square.
pub fn crop_to_square(image: &RgbImage) -> RgbImage {
    let (width, height) = image.dimensions();
    let side = width.min(height);
    let x = (width - side) / 2;
    let y = (height - side) / 2;
    imageops::crop_imm(image, x, y, side, side).to_image()
}

/// Mild sharpening: 0.9 * original + 0.2 * kernel-sharpened + 1.
pub fn sharpen(image: &RgbImage) -> RgbImage {
    let sharpened: RgbImage = filter3x3::<_, f32, u8>(image, &SHARPEN_KERNEL);
    let mut mixed = image.clone();
    for (out, sharp) in mixed.pixels_mut().zip(sharpened.pixels()) {
        for c in 0..3 {
            let value = 0.9 * out.0[c] as f32 + 0.2 * sharp.0[c] as f32 + 1.0;
            out.0[c] = value.round().clamp(0.0, 255.0) as u8;
        }
    }
    mixed
}

fn pad(image: &RgbImage, horizontal: u32, vertical: u32, fill: Rgb<u8>) -> RgbImage {
    let (width, height) = image.dimensions();
    let mut padded = RgbImage::from_pixel(width + 2 * horizontal, height + 2 * vertical, fill);
    imageops::replace(&mut padded, image, horizontal as i64, vertical as i64);
    padded
}
