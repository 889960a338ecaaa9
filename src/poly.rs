//! Dense univariate polynomials in coefficient form (lowest degree first)

use ark_ff::{batch_inversion, One, Zero};

use crate::F;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Polynomial {
    coeffs: Vec<F>,
}

impl Polynomial {
    pub fn new(coeffs: Vec<F>) -> Self {
        Self { coeffs }
    }

    pub fn zero() -> Self {
        Self { coeffs: Vec::new() }
    }

    pub fn coeffs(&self) -> &[F] {
        &self.coeffs
    }

    pub fn into_coeffs(self) -> Vec<F> {
        self.coeffs
    }

    /// Number of stored coefficients (may include trailing zeros)
    pub fn len(&self) -> usize {
        self.coeffs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coeffs.is_empty()
    }

    /// Degree ignoring trailing zeros; `None` for the zero polynomial
    pub fn degree(&self) -> Option<usize> {
        self.coeffs.iter().rposition(|c| !c.is_zero())
    }

    /// Horner evaluation
    pub fn evaluate(&self, point: &F) -> F {
        self.coeffs
            .iter()
            .rev()
            .fold(F::zero(), |acc, c| acc * point + c)
    }

    /// Divide by `(X - point)`, returning the quotient and `P(point)`.
    ///
    /// The quotient has one coefficient fewer than `self`. An empty
    /// polynomial yields an empty quotient and a zero remainder.
    pub fn divide_by_linear(&self, point: &F) -> (Polynomial, F) {
        let Some((lead, rest)) = self.coeffs.split_last() else {
            return (Polynomial::zero(), F::zero());
        };
        let mut quotient = vec![F::zero(); rest.len()];
        let mut carry = *lead;
        for (i, c) in rest.iter().enumerate().rev() {
            quotient[i] = carry;
            carry = *c + carry * point;
        }
        (Polynomial::new(quotient), carry)
    }

    /// Lagrange interpolation through `(i, values[i])` for `i in 0..n`.
    ///
    /// Uses the master polynomial `M(X) = prod (X - j)` and the closed-form
    /// weights `prod_{j != i} (i - j) = i! (n-1-i)! (-1)^(n-1-i)`. Points
    /// with a zero value contribute nothing and are skipped. The result
    /// always carries exactly `n` coefficients.
    pub fn interpolate_range(values: &[F]) -> Polynomial {
        let n = values.len();
        if n == 0 {
            return Polynomial::zero();
        }

        let mut master = vec![F::zero(); n + 1];
        master[0] = F::one();
        for j in 0..n {
            let root = F::from(j as u64);
            for k in (1..=j + 1).rev() {
                master[k] = master[k - 1] - root * master[k];
            }
            master[0] = -root * master[0];
        }

        let mut factorial = Vec::with_capacity(n);
        factorial.push(F::one());
        for i in 1..n {
            let prev = factorial[i - 1];
            factorial.push(prev * F::from(i as u64));
        }
        let mut weights: Vec<F> = (0..n)
            .map(|i| {
                let w = factorial[i] * factorial[n - 1 - i];
                if (n - 1 - i) % 2 == 1 {
                    -w
                } else {
                    w
                }
            })
            .collect();
        batch_inversion(&mut weights);

        let mut acc = vec![F::zero(); n];
        for (i, (value, inv_weight)) in values.iter().zip(&weights).enumerate() {
            if value.is_zero() {
                continue;
            }
            let scale = *value * inv_weight;
            let root = F::from(i as u64);
            // M(X) / (X - i), streamed from the leading coefficient down
            let mut carry = master[n];
            for k in (0..n).rev() {
                acc[k] += scale * carry;
                carry = master[k] + root * carry;
            }
        }
        Polynomial::new(acc)
    }

    /// Polynomial with coefficients `seed_fn(0..=degree)`
    pub fn from_fn(degree: usize, seed_fn: impl FnMut(usize) -> F) -> Polynomial {
        Polynomial::new((0..=degree).map(seed_fn).collect())
    }
}
