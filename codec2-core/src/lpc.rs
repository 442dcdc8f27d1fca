//! LPC analysis: autocorrelation, Levinson-Durbin, energy, bandwidth
//! expansion (part of C2), grounded on `quantise.c:738-739`'s
//! `autocorrelate`/`levinson_durbin` call site.

use crate::constants::LPC_ORD;

/// Order-`p` AR coefficients, `a[0] == 1.0` always.
#[derive(Debug, Clone, PartialEq)]
pub struct LpcCoeffs {
    pub a: [f64; LPC_ORD + 1],
}

impl LpcCoeffs {
    pub fn identity() -> Self {
        let mut a = [0.0; LPC_ORD + 1];
        a[0] = 1.0;
        Self { a }
    }
}

/// Hamming-window `buf` in place.
pub fn hamming_window(buf: &mut [f64]) {
    let n = buf.len();
    if n <= 1 {
        return;
    }
    for (i, s) in buf.iter_mut().enumerate() {
        let w = 0.54 - 0.46 * (std::f64::consts::TAU * i as f64 / (n as f64 - 1.0)).cos();
        *s *= w;
    }
}

/// Autocorrelation of `windowed` up to lag `order`, `r[0]` is energy.
pub fn autocorrelate(windowed: &[f64], order: usize) -> Vec<f64> {
    let n = windowed.len();
    (0..=order)
        .map(|lag| {
            let mut sum = 0.0;
            for i in 0..n - lag {
                sum += windowed[i] * windowed[i + lag];
            }
            sum
        })
        .collect()
}

/// Levinson-Durbin recursion. Returns LPC coefficients and the residual
/// energy `E = sum(a_i * R_i)`.
pub fn levinson_durbin(r: &[f64], order: usize) -> (LpcCoeffs, f64) {
    let mut a = vec![0.0f64; order + 1];
    a[0] = 1.0;
    let mut err = r[0].max(1e-9);

    for i in 1..=order {
        let mut acc = r[i];
        for j in 1..i {
            acc += a[j] * r[i - j];
        }
        let k = -acc / err;

        let mut new_a = a.clone();
        new_a[i] = k;
        for j in 1..i {
            new_a[j] = a[j] + k * a[i - j];
        }
        a = new_a;
        err *= 1.0 - k * k;
        err = err.max(1e-9);
    }

    let mut coeffs = [0.0; LPC_ORD + 1];
    for i in 0..=order.min(LPC_ORD) {
        coeffs[i] = a[i];
    }

    // Energy as defined in spec.md: E = sum_i a_i * R_i (a_0 == 1).
    let mut e = 0.0;
    for i in 0..=order {
        e += a[i] * r[i];
    }

    (LpcCoeffs { a: coeffs }, e)
}

/// 15 Hz bandwidth expansion applied before LSP conversion:
/// `a_i <- a_i * 0.994^i`, from `quantise.c`.
pub fn bandwidth_expand(lpc: &mut LpcCoeffs) {
    let mut factor = 1.0;
    for coeff in lpc.a.iter_mut() {
        *coeff *= factor;
        factor *= crate::constants::LPC_BW_EXPANSION_BASE;
    }
}
