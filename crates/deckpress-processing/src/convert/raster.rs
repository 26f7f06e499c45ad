//! Raster output normalization.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::{imageops, Rgba, RgbaImage};

/// Sort page files by their trailing number, not lexicographically, so
/// `page-10` sorts after `page-2`. Files without a number sort last by name.
pub fn sort_numerically(paths: &mut [PathBuf]) {
    paths.sort_by(|a, b| match (trailing_number(a), trailing_number(b)) {
        (Some(na), Some(nb)) => na.cmp(&nb),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    });
}

fn trailing_number(path: &Path) -> Option<u64> {
    let stem = path.file_stem()?.to_str()?;
    let digits: String = stem
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<String>()
        .chars()
        .rev()
        .collect();
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// Fit the source page onto an exact `width`x`height` canvas: scaled to fit
/// with aspect preserved, centered, letterboxed in black.
pub fn letterbox_to(
    src: &Path,
    dst: &Path,
    width: u32,
    height: u32,
) -> Result<(), image::ImageError> {
    let page = image::open(src)?;
    let resized = page.resize(width, height, FilterType::Lanczos3);

    let mut canvas = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 255]));
    let x = (width.saturating_sub(resized.width())) / 2;
    let y = (height.saturating_sub(resized.height())) / 2;
    imageops::overlay(&mut canvas, &resized.to_rgba8(), x as i64, y as i64);

    canvas.save(dst)
}
