/// IoU above which two detections are considered the same face.
pub const DEFAULT_NMS_IOU: f64 = 0.3;

/// An axis-aligned face bounding box with its detector confidence.
///
/// Coordinates are pixels in whichever space produced the region:
/// camera-native out of the detector, display space after `scaled`.
#[derive(Clone, Debug, PartialEq)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
    pub score: f32,
}

impl Region {
    pub fn new(x: i32, y: i32, width: i32, height: i32, score: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
            score,
        }
    }

    pub fn area(&self) -> i64 {
        self.width.max(0) as i64 * self.height.max(0) as i64
    }

    pub fn iou(&self, other: &Region) -> f64 {
        let ix1 = self.x.max(other.x);
        let iy1 = self.y.max(other.y);
        let ix2 = (self.x + self.width).min(other.x + other.width);
        let iy2 = (self.y + self.height).min(other.y + other.height);

        let inter = (ix2 - ix1).max(0) as f64 * (iy2 - iy1).max(0) as f64;
        if inter == 0.0 {
            return 0.0;
        }

        let area_a = self.width as f64 * self.height as f64;
        let area_b = other.width as f64 * other.height as f64;
        inter / (area_a + area_b - inter)
    }

    /// Score-ordered non-maximum suppression.
    ///
    /// Sorts by descending confidence and keeps a region only if its IoU
    /// with every previously-kept region is at or below the threshold.
    pub fn suppress(mut regions: Vec<Region>, iou_threshold: f64) -> Vec<Region> {
        if regions.len() <= 1 {
            return regions;
        }
        regions.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        let mut kept: Vec<Region> = Vec::with_capacity(regions.len());
        for r in regions {
            let dominated = kept.iter().any(|k| r.iou(k) > iou_threshold);
            if !dominated {
                kept.push(r);
            }
        }
        kept
    }

    /// Maps the region from one coordinate space into another, e.g. from
    /// camera-native pixels into the rendered display's pixels.
    pub fn scaled(&self, from: (u32, u32), to: (u32, u32)) -> Region {
        if from == to || from.0 == 0 || from.1 == 0 {
            return self.clone();
        }
        let sx = to.0 as f64 / from.0 as f64;
        let sy = to.1 as f64 / from.1 as f64;
        Region {
            x: (self.x as f64 * sx).round() as i32,
            y: (self.y as f64 * sy).round() as i32,
            width: (self.width as f64 * sx).round() as i32,
            height: (self.height as f64 * sy).round() as i32,
            score: self.score,
        }
    }

    /// Clamps the region to `width × height` bounds, shrinking it as needed.
    pub fn clamped(&self, width: u32, height: u32) -> Region {
        let x = self.x.clamp(0, width as i32);
        let y = self.y.clamp(0, height as i32);
        let w = (self.x + self.width).clamp(x, width as i32) - x;
        let h = (self.y + self.height).clamp(y, height as i32) - y;
        Region {
            x,
            y,
            width: w,
            height: h,
            score: self.score,
        }
    }
}
