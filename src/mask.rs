//! Synthetic metal-contact masks.
//!
//! Fingers run vertically (along rows) and are drawn with value
//! `FINGER_VALUE`; the two horizontal bus bars use `BUSBAR_VALUE`, which the
//! tile classifier reads as a bus connection.

use ndarray::{s, Array2};
use tracing::warn;

use crate::error::{PvError, Result};

pub const FINGER_VALUE: f64 = 124.0;
pub const BUSBAR_VALUE: f64 = 255.0;

/// Typical front grid: `finger_n` fingers and two bus bars.
pub fn default_mask(shape: (usize, usize), finger_n: usize) -> Result<Array2<f64>> {
    let mut image = Array2::zeros(shape);
    add_grid(&mut image, finger_n, 0.02, 0.02)?;
    add_busbar(&mut image, 0.1, 0.02, 0.02);
    Ok(image)
}

/// Draw `finger_n` evenly pitched vertical fingers.
///
/// `finger_width` is a fraction of the image width, `margin` the fraction of
/// the image height left clear at the top and bottom ends.
pub fn add_grid(image: &mut Array2<f64>, finger_n: usize, finger_width: f64, margin: f64) -> Result<()> {
    let (lr, lc) = image.dim();
    if finger_n == 0 || finger_n > lc {
        return Err(PvError::Config(format!(
            "cannot place {} fingers on an image {} pixels wide",
            finger_n, lc
        )));
    }

    let margin_p = (lc as f64 * margin) as usize + 1;
    let width_p = (finger_width * lc as f64) as usize;
    if width_p < 1 {
        warn!(finger_width, "finger width rounds to zero pixels");
    }

    let pitch = lc / finger_n;
    let remainder = lc % finger_n;
    let first = (pitch + remainder / 2) as f64;
    let last = lc.saturating_sub(pitch + remainder / 2) as f64;
    let r1 = lr.saturating_sub(margin_p);

    for k in 0..finger_n {
        let pos = if finger_n == 1 {
            first
        } else {
            first + (last - first) * k as f64 / (finger_n - 1) as f64
        } as usize;
        let c0 = pos.saturating_sub(width_p / 2);
        let c1 = (pos + width_p / 2).min(lc);
        if margin_p < r1 && c0 < c1 {
            image.slice_mut(s![margin_p..r1, c0..c1]).fill(FINGER_VALUE);
        }
    }
    Ok(())
}

/// Draw bus bars across the top and bottom of the image.
///
/// All arguments are fractions: `bus_width` of the height, `margin_r` of the
/// height, `margin_c` of the width.
pub fn add_busbar(image: &mut Array2<f64>, bus_width: f64, margin_r: f64, margin_c: f64) {
    let (lr, lc) = image.dim();
    let width_p = (lr as f64 * bus_width) as usize;
    let margin_r_p = (lr as f64 * margin_r) as usize;
    let margin_c_p = (lc as f64 * margin_c) as usize;
    if width_p == 0 || 2 * margin_c_p >= lc || margin_r_p + width_p > lr {
        return;
    }
    let cols = margin_c_p..lc - margin_c_p;
    image
        .slice_mut(s![margin_r_p..margin_r_p + width_p, cols.clone()])
        .fill(BUSBAR_VALUE);
    image
        .slice_mut(s![lr - margin_r_p - width_p..lr - margin_r_p, cols])
        .fill(BUSBAR_VALUE);
}
