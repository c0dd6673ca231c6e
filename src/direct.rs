//! Derivative-free scalar routines
use crate::error::{GlmError, Result};

/// Brent's Method for Bracketed Root Finding
///
/// Finds a zero of _f_ inside the bracket _a_, _b_, where `f(a)` and `f(b)`
/// must have opposite signs. Combines bisection, the secant method and
/// inverse quadratic interpolation, so it never does worse than bisection.
/// See [Wikipedia](https://en.wikipedia.org/wiki/Brent%27s_method)
/// for more info.
///
/// Parameters
/// ----------
/// - __f:__         continuous scalar function
/// - __a, b:__      bracket end points
/// - __xtol:__      absolute tolerance on the root
/// - __maxiter:__   maximum number of function evaluations after the end points
pub fn brentq(f: impl Fn(f64) -> f64, a: f64, b: f64, xtol: f64, maxiter: usize) -> Result<f64> {
    let mut a = a;
    let mut b = b;
    let mut fa = f(a);
    let mut fb = f(b);
    if fa == 0. {
        return Ok(a);
    }
    if fb == 0. {
        return Ok(b);
    }
    if !fa.is_finite() || !fb.is_finite() || (fa > 0.) == (fb > 0.) {
        return Err(GlmError::Numerical(format!(
            "[{}, {}] is not a bracket: f(a) = {}, f(b) = {}",
            a, b, fa, fb
        )));
    }

    let mut c = b;
    let mut fc = fb;
    let mut d = b - a;
    let mut e = d;

    for _iter in 0..maxiter {
        if (fb > 0.) == (fc > 0.) {
            // root lies between a and b, restart the contrapoint
            c = a;
            fc = fa;
            d = b - a;
            e = d;
        }
        if fc.abs() < fb.abs() {
            a = b;
            b = c;
            c = a;
            fa = fb;
            fb = fc;
            fc = fa;
        }

        let tol1 = 2. * f64::EPSILON * b.abs() + 0.5 * xtol;
        let xm = 0.5 * (c - b);
        if xm.abs() <= tol1 || fb == 0. {
            return Ok(b);
        }

        if e.abs() >= tol1 && fa.abs() > fb.abs() {
            // attempt interpolation
            let s = fb / fa;
            let (mut p, mut q) = if a == c {
                // secant
                (2. * xm * s, 1. - s)
            } else {
                // inverse quadratic
                let qa = fa / fc;
                let r = fb / fc;
                (
                    s * (2. * xm * qa * (qa - r) - (b - a) * (r - 1.)),
                    (qa - 1.) * (r - 1.) * (s - 1.),
                )
            };
            if p > 0. {
                q = -q;
            }
            p = p.abs();
            let min1 = 3. * xm * q - (tol1 * q).abs();
            let min2 = (e * q).abs();
            if 2. * p < min1.min(min2) {
                e = d;
                d = p / q;
            } else {
                // interpolation failed, bisect
                d = xm;
                e = d;
            }
        } else {
            d = xm;
            e = d;
        }

        a = b;
        fa = fb;
        if d.abs() > tol1 {
            b += d;
        } else {
            b += tol1.copysign(xm);
        }
        fb = f(b);
    }
    Err(GlmError::Numerical(format!(
        "brentq did not converge in {} iterations",
        maxiter
    )))
}

/// Median of a slice of finite values (mean of the middle pair for even lengths)
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|x, y| x.total_cmp(y));
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some(0.5 * (sorted[mid - 1] + sorted[mid]))
    } else {
        Some(sorted[mid])
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn brentq_polynomials() {
        let root = brentq(|x| x * x - 2., 0., 2., 1e-12, 100).unwrap();
        assert_abs_diff_eq!(root, 2f64.sqrt(), epsilon = 1e-10);

        // reversed bracket
        let root = brentq(|x| x.powi(3) - x - 1., 2., 1., 1e-12, 100).unwrap();
        assert_abs_diff_eq!(root, 1.324717957244746, epsilon = 1e-10);
    }

    #[test]
    fn brentq_flat_pieces() {
        // a clipped line, like a huber score
        let f = |x: f64| (x - 0.3).max(-1.).min(1.);
        let root = brentq(f, -10., 10., 1e-12, 200).unwrap();
        assert_abs_diff_eq!(root, 0.3, epsilon = 1e-10);
    }

    #[test]
    fn brentq_endpoint_root() {
        assert_eq!(brentq(|x| x, 0., 1., 1e-12, 10), Ok(0.));
    }

    #[test]
    fn brentq_not_a_bracket() {
        let err = brentq(|x| x * x + 1., -1., 1., 1e-12, 100);
        assert!(matches!(err, Err(GlmError::Numerical(_))));
    }

    #[test]
    fn median_even_odd() {
        assert_eq!(median(&[3., 1., 2.]), Some(2.));
        assert_eq!(median(&[4., 1., 3., 2.]), Some(2.5));
        assert_eq!(median(&[]), None);
    }
}
