//! Sorted-breakpoint solver for separable box-constrained quadratic programs.
//!
//! Solves
//!
//! ```text
//! minimize   Σ b_i (x_i - l_i) + a_i (x_i - l_i)²
//! subject to Σ x_i = E,  l_i <= x_i <= u_i
//! ```
//!
//! At optimum every term satisfies `x_i = clamp(l_i + (λ - b_i) / (2 a_i))` for
//! a shared multiplier λ. Each term contributes two breakpoints in λ: it leaves
//! its lower bound at `λ = b_i` and reaches its upper bound at
//! `λ = b_i + 2 a_i (u_i - l_i)`. Between consecutive breakpoints `Σ x_i(λ)` is
//! linear, so walking the sorted breakpoints finds the segment where the sum
//! crosses `E` and λ follows in closed form.
//!
//! ```
//! use gridhyp_dispatch::breakpoint::{solve_separable_qp, QpTerm, QpTolerances};
//!
//! let terms = [
//!     QpTerm::new(1.0, -100.0, 0.0, 40.0),
//!     QpTerm::new(1.0, 60.0, 0.0, 40.0),
//! ];
//! let x = solve_separable_qp(&terms, 20.0, &QpTolerances::default()).unwrap();
//! assert!((x[0] - 20.0).abs() < 1e-9);
//! assert!(x[1].abs() < 1e-9);
//! ```

use std::cmp::Ordering;

use thiserror::Error;

/// One separable term of the objective.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QpTerm {
    /// Curvature
    pub a: f64,
    /// Slope at the lower bound
    pub b: f64,
    pub lower: f64,
    pub upper: f64,
}

impl QpTerm {
    pub fn new(a: f64, b: f64, lower: f64, upper: f64) -> Self {
        Self { a, b, lower, upper }
    }

    fn at(&self, lambda: f64) -> f64 {
        (self.lower + (lambda - self.b) / (2.0 * self.a)).clamp(self.lower, self.upper)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QpTolerances {
    /// Minimum curvature accepted
    pub degeneracy_epsilon: f64,
    /// Maximum absolute residual on `Σ x = E` after correction
    pub residual: f64,
}

impl Default for QpTolerances {
    fn default() -> Self {
        Self {
            degeneracy_epsilon: 1e-5,
            residual: 0.1,
        }
    }
}

/// Why a problem was rejected or abandoned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QpFailure {
    #[error("term {index} is degenerate (a = {a}, bounds [{lower}, {upper}])")]
    DegenerateTerm {
        index: usize,
        a: f64,
        lower: f64,
        upper: f64,
    },

    #[error("equality {equilibrium} outside bounds sum [{lower_sum}, {upper_sum}]")]
    Unsatisfiable {
        equilibrium: f64,
        lower_sum: f64,
        upper_sum: f64,
    },

    #[error("doubtful precision: residual {residual} after correction")]
    DoubtfulPrecision { residual: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Side {
    // Lower before upper at equal λ so that zero-width boxes open and close
    // in the same step.
    Lower,
    Upper,
}

#[derive(Debug, Clone, Copy)]
struct Breakpoint {
    lambda: f64,
    side: Side,
    term: usize,
}

/// Solve the problem, returning one value per term.
pub fn solve_separable_qp(
    terms: &[QpTerm],
    equilibrium: f64,
    tol: &QpTolerances,
) -> Result<Vec<f64>, QpFailure> {
    for (index, t) in terms.iter().enumerate() {
        let finite = t.a.is_finite() && t.b.is_finite() && t.lower.is_finite() && t.upper.is_finite();
        if !finite || t.upper < t.lower || t.a <= tol.degeneracy_epsilon {
            return Err(QpFailure::DegenerateTerm {
                index,
                a: t.a,
                lower: t.lower,
                upper: t.upper,
            });
        }
    }

    let lower_sum: f64 = terms.iter().map(|t| t.lower).sum();
    let upper_sum: f64 = terms.iter().map(|t| t.upper).sum();
    if equilibrium < lower_sum || equilibrium > upper_sum {
        return Err(QpFailure::Unsatisfiable {
            equilibrium,
            lower_sum,
            upper_sum,
        });
    }

    let mut points: Vec<Breakpoint> = Vec::with_capacity(2 * terms.len());
    for (term, t) in terms.iter().enumerate() {
        points.push(Breakpoint {
            lambda: t.b,
            side: Side::Lower,
            term,
        });
        points.push(Breakpoint {
            lambda: t.b + 2.0 * t.a * (t.upper - t.lower),
            side: Side::Upper,
            term,
        });
    }
    points.sort_by(|p, q| {
        p.lambda
            .partial_cmp(&q.lambda)
            .unwrap_or(Ordering::Equal)
            .then(p.side.cmp(&q.side))
    });

    let mut lambda_star = None;
    if let Some(first) = points.first() {
        let mut total = lower_sum;
        let mut prev = first.lambda;
        let mut slope = 0.0;

        for point in &points {
            let candidate = total + slope * (point.lambda - prev);
            if candidate >= equilibrium {
                lambda_star = Some(if slope > 0.0 {
                    prev + (equilibrium - total) / slope
                } else {
                    point.lambda
                });
                break;
            }
            total = candidate;
            prev = point.lambda;
            let rate = 1.0 / (2.0 * terms[point.term].a);
            match point.side {
                Side::Lower => slope += rate,
                Side::Upper => slope -= rate,
            }
        }
    }

    let mut x: Vec<f64> = match lambda_star {
        Some(lambda) => terms.iter().map(|t| t.at(lambda)).collect(),
        // Never crossed: the equality sits on the upper bounds
        None => terms.iter().map(|t| t.upper).collect(),
    };

    // Spread the rounding residual over the free terms in proportion to 1/a
    let residual = equilibrium - x.iter().sum::<f64>();
    if residual != 0.0 {
        let free: Vec<usize> = (0..terms.len())
            .filter(|&i| x[i] > terms[i].lower && x[i] < terms[i].upper)
            .collect();
        let weight: f64 = free.iter().map(|&i| 1.0 / terms[i].a).sum();
        if weight > 0.0 {
            for &i in &free {
                x[i] = (x[i] + residual * (1.0 / terms[i].a) / weight)
                    .clamp(terms[i].lower, terms[i].upper);
            }
        }
    }

    let residual = equilibrium - x.iter().sum::<f64>();
    if residual.is_nan() || residual.abs() > tol.residual {
        return Err(QpFailure::DoubtfulPrecision { residual });
    }

    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tol() -> QpTolerances {
        QpTolerances::default()
    }

    #[test]
    fn test_import_export_pair() {
        // Balances -50 and +50 before adjustment
        let terms = [QpTerm::new(1.0, -100.0, 0.0, 40.0), QpTerm::new(1.0, 60.0, 0.0, 40.0)];
        let x = solve_separable_qp(&terms, 20.0, &tol()).unwrap();
        assert!((x[0] - 20.0).abs() < 1e-9);
        assert!(x[1].abs() < 1e-9);
    }

    #[test]
    fn test_interior_solution_equalizes() {
        let terms = [QpTerm::new(1.0, -100.0, 0.0, 60.0), QpTerm::new(1.0, -60.0, 0.0, 60.0)];
        let x = solve_separable_qp(&terms, 80.0, &tol()).unwrap();
        assert!((x[0] - 50.0).abs() < 1e-9);
        assert!((x[1] - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_equality_on_lower_bounds() {
        let terms = [QpTerm::new(1.0, 5.0, 10.0, 20.0), QpTerm::new(1.0, -5.0, 0.0, 20.0)];
        let x = solve_separable_qp(&terms, 10.0, &tol()).unwrap();
        assert_eq!(x, vec![10.0, 0.0]);
    }

    #[test]
    fn test_equality_on_upper_bounds() {
        let terms = [QpTerm::new(1.0, 0.0, 0.0, 10.0), QpTerm::new(2.0, 3.0, 0.0, 15.0)];
        let x = solve_separable_qp(&terms, 25.0, &tol()).unwrap();
        assert!((x[0] - 10.0).abs() < 1e-9);
        assert!((x[1] - 15.0).abs() < 1e-9);
    }

    #[test]
    fn test_curvature_weights_share() {
        // Same slope, curvature 1 vs 2: the flatter term takes twice as much
        let terms = [QpTerm::new(1.0, 0.0, 0.0, 100.0), QpTerm::new(2.0, 0.0, 0.0, 100.0)];
        let x = solve_separable_qp(&terms, 30.0, &tol()).unwrap();
        assert!((x[0] - 20.0).abs() < 1e-9);
        assert!((x[1] - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_zero_width_box() {
        let terms = [QpTerm::new(1.0, 0.0, 5.0, 5.0), QpTerm::new(1.0, 0.0, 0.0, 10.0)];
        let x = solve_separable_qp(&terms, 8.0, &tol()).unwrap();
        assert!((x[0] - 5.0).abs() < 1e-9);
        assert!((x[1] - 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_degenerate_curvature_rejected() {
        let terms = [QpTerm::new(1e-6, 0.0, 0.0, 10.0)];
        assert!(matches!(
            solve_separable_qp(&terms, 5.0, &tol()),
            Err(QpFailure::DegenerateTerm { index: 0, .. })
        ));
    }

    #[test]
    fn test_inverted_box_rejected() {
        let terms = [QpTerm::new(1.0, 0.0, 10.0, 0.0)];
        assert!(matches!(
            solve_separable_qp(&terms, 5.0, &tol()),
            Err(QpFailure::DegenerateTerm { .. })
        ));
    }

    #[test]
    fn test_non_finite_slope_rejected() {
        let terms = [QpTerm::new(1.0, f64::NAN, 0.0, 10.0)];
        assert!(matches!(
            solve_separable_qp(&terms, 5.0, &tol()),
            Err(QpFailure::DegenerateTerm { index: 0, .. })
        ));
    }

    #[test]
    fn test_ill_scaled_slope_gives_doubtful_precision() {
        // At λ = 1e20 the box width 2a(u - l) = 2 vanishes in rounding: both
        // breakpoints coincide, the walk never crosses E and no term is left
        // free to absorb the 0.5 MW residual.
        let terms = [QpTerm::new(1.0, 1e20, 0.0, 1.0)];
        let err = solve_separable_qp(&terms, 0.5, &tol()).unwrap_err();
        match &err {
            QpFailure::DoubtfulPrecision { residual } => assert!((residual + 0.5).abs() < 1e-9),
            other => panic!("unexpected failure {:?}", other),
        }
        assert!(err.to_string().starts_with("doubtful precision"));
    }

    #[test]
    fn test_unsatisfiable_equality() {
        let terms = [QpTerm::new(1.0, 0.0, 0.0, 10.0), QpTerm::new(1.0, 0.0, 0.0, 10.0)];
        let err = solve_separable_qp(&terms, 25.0, &tol()).unwrap_err();
        assert!(matches!(err, QpFailure::Unsatisfiable { .. }));
        assert!(err.to_string().contains("outside bounds"));
    }
}
