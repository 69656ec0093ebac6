//! Band-limited (windowed-sinc) interpolation onto a new sample grid
//!
//! Lanczos kernel: `L(x) = sinc(x) * sinc(x / a)` for `|x| < a`, else 0,
//! where `a` is the kernel half-width in input samples. Samples outside the
//! input are treated as zero.

use std::f64::consts::PI;

/// Kernel half-width used when aligning streams
pub const LANCZOS_HALF_WIDTH: usize = 20;

/// Normalised sinc: sin(pi x) / (pi x)
fn sinc(x: f64) -> f64 {
    if x == 0.0 {
        1.0
    } else {
        let px = PI * x;
        px.sin() / px
    }
}

/// Lanczos kernel value at offset `x` (in input samples) for half-width `a`
pub fn lanczos_kernel(x: f64, a: usize) -> f64 {
    let a = a as f64;
    if x.abs() >= a {
        0.0
    } else {
        sinc(x) * sinc(x / a)
    }
}

/// Output grid relative to the input samples
#[derive(Debug, Clone, Copy)]
pub struct Grid {
    /// Input sample interval (s)
    pub input_delta: f64,
    /// Output sample interval (s)
    pub output_delta: f64,
    /// Output start minus input start (s)
    pub offset: f64,
    /// Number of output samples
    pub npts: usize,
}

/// Interpolate `data` onto `grid` with a Lanczos kernel of half-width `a`.
pub fn lanczos_interpolate(data: &[f64], grid: Grid, a: usize) -> Vec<f64> {
    let a_signed = a as i64;
    let len = data.len() as i64;

    (0..grid.npts)
        .map(|j| {
            // Fractional position in input samples
            let x = (grid.offset + j as f64 * grid.output_delta) / grid.input_delta;
            let base = x.floor() as i64;
            let lo = (base - a_signed + 1).max(0);
            let hi = (base + a_signed).min(len - 1);
            let mut acc = 0.0;
            let mut k = lo;
            while k <= hi {
                acc += data[k as usize] * lanczos_kernel(x - k as f64, a);
                k += 1;
            }
            acc
        })
        .collect()
}
