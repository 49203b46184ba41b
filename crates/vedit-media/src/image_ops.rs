//! Pixel-level measurements on rgb frames.

use image::RgbImage;

/// Grayscale plane as f64 intensities in 0-255.
#[derive(Debug, Clone)]
pub struct GrayPlane {
    pub width: usize,
    pub height: usize,
    pub data: Vec<f64>,
}

impl GrayPlane {
    /// BT.601 luma.
    pub fn from_rgb(image: &RgbImage) -> Self {
        let data = image
            .pixels()
            .map(|p| 0.299 * p[0] as f64 + 0.587 * p[1] as f64 + 0.114 * p[2] as f64)
            .collect();
        Self {
            width: image.width() as usize,
            height: image.height() as usize,
            data,
        }
    }

    #[inline]
    fn at(&self, x: usize, y: usize) -> f64 {
        self.data[y * self.width + x]
    }

    pub fn min_max(&self) -> (f64, f64) {
        self.data
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(*v), hi.max(*v))
            })
    }

    /// Mean intensity of the rectangle `[x0, x1) x [y0, y1)`; 0 if empty.
    pub fn region_mean(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> f64 {
        let x1 = x1.min(self.width);
        let y1 = y1.min(self.height);
        if x0 >= x1 || y0 >= y1 {
            return 0.0;
        }
        let mut sum = 0.0;
        for y in y0..y1 {
            for x in x0..x1 {
                sum += self.at(x, y);
            }
        }
        sum / ((x1 - x0) * (y1 - y0)) as f64
    }

    /// Variance of the 4-neighbour Laplacian, with mirrored borders.
    pub fn laplacian_variance(&self) -> f64 {
        if self.width == 0 || self.height == 0 {
            return 0.0;
        }
        let mut responses = Vec::with_capacity(self.data.len());
        for y in 0..self.height {
            let up = reflect(y as isize - 1, self.height);
            let down = reflect(y as isize + 1, self.height);
            for x in 0..self.width {
                let left = reflect(x as isize - 1, self.width);
                let right = reflect(x as isize + 1, self.width);
                let lap = self.at(left, y) + self.at(right, y) + self.at(x, up) + self.at(x, down)
                    - 4.0 * self.at(x, y);
                responses.push(lap);
            }
        }
        crate::stats::variance(&responses)
    }

    /// Mean of the 256-bin intensity histogram, scaled to 0-1.
    pub fn histogram_exposure(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        let mut hist = [0u64; 256];
        for v in &self.data {
            hist[(v.round() as usize).min(255)] += 1;
        }
        let total = self.data.len() as f64;
        let weighted: f64 = hist
            .iter()
            .enumerate()
            .map(|(bin, count)| bin as f64 * *count as f64)
            .sum();
        weighted / total / 255.0
    }
}

/// Reflect-101 border handling (`-1 -> 1`, `n -> n-2`).
fn reflect(i: isize, n: usize) -> usize {
    let n = n as isize;
    if n == 1 {
        return 0;
    }
    let mut i = i;
    if i < 0 {
        i = -i;
    }
    if i >= n {
        i = 2 * n - 2 - i;
    }
    i.clamp(0, n - 1) as usize
}

/// Convert RGB to HSV.
///
/// # Arguments
/// * `r`, `g`, `b` - RGB values in [0, 1]
///
/// # Returns
/// (H, S, V) where H is in [0, 360), S and V are in [0, 1]
pub fn rgb_to_hsv(r: f64, g: f64, b: f64) -> (f64, f64, f64) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let delta = max - min;

    let v = max;
    let s = if max == 0.0 { 0.0 } else { delta / max };

    let h = if delta == 0.0 {
        0.0
    } else if max == r {
        60.0 * (((g - b) / delta) % 6.0)
    } else if max == g {
        60.0 * (((b - r) / delta) + 2.0)
    } else {
        60.0 * (((r - g) / delta) + 4.0)
    };
    let h = if h < 0.0 { h + 360.0 } else { h };

    (h, s, v)
}

/// Per-pixel hue and saturation in 8-bit image conventions
/// (hue 0-180, saturation 0-255).
pub fn hue_saturation(image: &RgbImage) -> (Vec<f64>, Vec<f64>) {
    image
        .pixels()
        .map(|p| {
            let (h, s, _) = rgb_to_hsv(
                p[0] as f64 / 255.0,
                p[1] as f64 / 255.0,
                p[2] as f64 / 255.0,
            );
            (h / 2.0, s * 255.0)
        })
        .unzip()
}
