use crate::overlay::surface::OverlaySurface;
use crate::shared::constants::{OVERLAY_STROKE_RGBA, OVERLAY_STROKE_WIDTH};
use crate::shared::frame::Frame;
use crate::shared::region::Region;

/// Repaints the overlay from the latest detection regions.
///
/// Pure function of its inputs: the surface is fully cleared first, then one
/// rectangle outline is stroked per region, so boxes from earlier ticks never
/// linger.
pub fn draw_regions(surface: &mut OverlaySurface, regions: &[Region]) {
    surface.clear();
    for region in regions {
        stroke_rect(
            surface,
            &region.clamped(surface.width(), surface.height()),
            OVERLAY_STROKE_RGBA,
            OVERLAY_STROKE_WIDTH,
        );
    }
}

fn stroke_rect(surface: &mut OverlaySurface, region: &Region, rgba: [u8; 4], thickness: u32) {
    if region.width <= 0 || region.height <= 0 {
        return;
    }
    let x0 = region.x as u32;
    let y0 = region.y as u32;
    let x1 = (region.x + region.width) as u32;
    let y1 = (region.y + region.height) as u32;
    let t = thickness.min(region.width as u32).min(region.height as u32);

    for x in x0..x1 {
        for offset in 0..t {
            surface.set_pixel(x, y0 + offset, rgba);
            surface.set_pixel(x, y1 - 1 - offset, rgba);
        }
    }
    for y in y0..y1 {
        for offset in 0..t {
            surface.set_pixel(x0 + offset, y, rgba);
            surface.set_pixel(x1 - 1 - offset, y, rgba);
        }
    }
}

/// Composes the live frame and the overlay into one RGBA image at the
/// overlay's (display) size, alpha-blending the overlay on top. The frame is
/// resized when the display size differs from the camera-native size.
pub fn compose(frame: &Frame, overlay: &OverlaySurface) -> Vec<u8> {
    let dw = overlay.width();
    let dh = overlay.height();

    let rgb: Vec<u8> = if frame.size() == (dw, dh) {
        frame.data().to_vec()
    } else {
        // Frame's constructor guarantees the buffer matches its dimensions
        let img = image::RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
            .expect("Frame data length must match dimensions");
        image::imageops::resize(&img, dw, dh, image::imageops::FilterType::Triangle).into_raw()
    };

    let over = overlay.data();
    let mut out = Vec::with_capacity((dw as usize) * (dh as usize) * 4);
    for i in 0..(dw as usize) * (dh as usize) {
        let a = over[i * 4 + 3] as u32;
        for c in 0..3 {
            let under = rgb[i * 3 + c] as u32;
            let top = over[i * 4 + c] as u32;
            out.push(((top * a + under * (255 - a)) / 255) as u8);
        }
        out.push(255);
    }
    out
}
