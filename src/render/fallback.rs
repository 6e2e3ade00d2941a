//! Plain-image pixelation, used when mosaic mode is off or the manifest is
//! unavailable.

use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};

/// Cover-fit `image` into `width` × `height`, then average every
/// `pixel_size` × `pixel_size` block into one colour.
pub fn pixelate(image: &RgbaImage, width: u32, height: u32, pixel_size: u32) -> RgbaImage {
    let (width, height) = (width.max(1), height.max(1));
    let fitted = cover_fit(image, width, height);
    let block = pixel_size.max(1);

    let mut out = RgbaImage::new(width, height);
    for by in (0..height).step_by(block as usize) {
        for bx in (0..width).step_by(block as usize) {
            let bw = block.min(width - bx);
            let bh = block.min(height - by);

            let mut sum = [0u64; 4];
            for y in by..by + bh {
                for x in bx..bx + bw {
                    let p = fitted.get_pixel(x, y);
                    for (acc, v) in sum.iter_mut().zip(p.0) {
                        *acc += v as u64;
                    }
                }
            }
            let n = (bw * bh) as u64;
            let color = Rgba(sum.map(|v| ((v + n / 2) / n) as u8));

            for y in by..by + bh {
                for x in bx..bx + bw {
                    out.put_pixel(x, y, color);
                }
            }
        }
    }
    out
}

/// Scale to cover the box, then crop centered.
fn cover_fit(image: &RgbaImage, width: u32, height: u32) -> RgbaImage {
    let (iw, ih) = (image.width().max(1) as f64, image.height().max(1) as f64);
    let scale = (width as f64 / iw).max(height as f64 / ih);
    let sw = ((iw * scale).ceil() as u32).max(width);
    let sh = ((ih * scale).ceil() as u32).max(height);

    let scaled = imageops::resize(image, sw, sh, FilterType::Triangle);
    imageops::crop_imm(&scaled, (sw - width) / 2, (sh - height) / 2, width, height).to_image()
}
