/*
    efmdec
    https://github.com/dbalsom/efmdec

    Copyright 2024 Daniel Balsom

    Permission is hereby granted, free of charge, to any person obtaining a
    copy of this software and associated documentation files (the “Software”),
    to deal in the Software without restriction, including without limitation
    the rights to use, copy, modify, merge, publish, distribute, sublicense,
    and/or sell copies of the Software, and to permit persons to whom the
    Software is furnished to do so, subject to the following conditions:

    The above copyright notice and this permission notice shall be included in
    all copies or substantial portions of the Software.

    THE SOFTWARE IS PROVIDED “AS IS”, WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
    IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
    FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
    AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
    LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING
    FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
    DEALINGS IN THE SOFTWARE.

    --------------------------------------------------------------------------

    src/circ/rs.rs

    A Reed-Solomon errors-and-erasures decoder (and systematic encoder)
    over GF(2^8), parameterized on parity length so the same machinery
    serves the C1 (32,28), C2 (28,24) and sector-level Q (45,43) / P
    (26,24) codes. All codes are shortened from RS(255), first consecutive
    root α^0.

*/

//! Shortened Reed-Solomon codes with erasure support.
//!
//! The decoder runs syndrome computation, Berlekamp-Massey seeded with the
//! erasure locator, a Chien search and Forney's algorithm, then re-checks
//! the syndromes of the patched codeword. Erasure positions are indices
//! into the codeword slice (0 = first transmitted symbol). With 2t parity
//! symbols the code corrects e errors and f erasures while 2e + f <= 2t.

use crate::circ::gf256 as gf;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RsError {
    #[error("more errors than the code can correct")]
    TooManyErrors,
    #[error("error locator polynomial is inconsistent with the codeword")]
    Unsolvable,
}

/// A Reed-Solomon code with a fixed number of parity symbols.
#[derive(Copy, Clone, Debug)]
pub struct RsCode {
    parity: usize,
}

impl RsCode {
    pub const fn new(parity: usize) -> RsCode {
        RsCode { parity }
    }

    pub fn parity(&self) -> usize {
        self.parity
    }

    /// The generator polynomial Π (x + α^j) for j in 0..parity, as
    /// ascending coefficients (index = power of x).
    fn generator(&self) -> Vec<u8> {
        let mut g = vec![1u8];
        for j in 0..self.parity {
            let a = gf::alpha_pow(j);
            let mut next = vec![0u8; g.len() + 1];
            for (k, &coef) in g.iter().enumerate() {
                next[k] ^= gf::mul(coef, a);
                next[k + 1] ^= coef;
            }
            g = next;
        }
        g
    }

    /// Systematically encode `data`, returning the parity symbols to append
    /// after it (highest-degree remainder coefficient first).
    pub fn encode(&self, data: &[u8]) -> Vec<u8> {
        let gen = self.generator();
        let mut remainder = vec![0u8; self.parity];

        for &byte in data {
            let feedback = byte ^ remainder[0];
            remainder.rotate_left(1);
            remainder[self.parity - 1] = 0;
            if feedback != 0 {
                for (i, r) in remainder.iter_mut().enumerate() {
                    *r ^= gf::mul(feedback, gen[self.parity - 1 - i]);
                }
            }
        }
        remainder
    }

    /// Syndromes S_j = c(α^j) for j in 0..parity, treating the first byte
    /// of the codeword as the highest-degree coefficient.
    fn syndromes(&self, codeword: &[u8]) -> Vec<u8> {
        (0..self.parity)
            .map(|j| {
                let a = gf::alpha_pow(j);
                codeword.iter().fold(0u8, |acc, &b| gf::mul(acc, a) ^ b)
            })
            .collect()
    }

    /// Decode `codeword` in place, using `erasures` (codeword indices) as
    /// known-unreliable positions. Returns the number of symbols actually
    /// changed. On error the codeword contents are unspecified; decode a
    /// scratch copy if the original must survive failure.
    pub fn decode(&self, codeword: &mut [u8], erasures: &[usize]) -> Result<usize, RsError> {
        let n = codeword.len();
        debug_assert!(n <= 255 && n > self.parity);

        let synd = self.syndromes(codeword);
        if synd.iter().all(|&s| s == 0) {
            // Already a valid codeword; nothing to change
            return Ok(0);
        }

        let rho = erasures.len();
        if rho > self.parity {
            return Err(RsError::TooManyErrors);
        }

        // Erasure locator Γ(x) = Π (1 + X_e·x)
        let mut gamma = vec![1u8];
        for &e in erasures {
            debug_assert!(e < n);
            let x = gf::alpha_pow(n - 1 - e);
            let mut next = vec![0u8; gamma.len() + 1];
            for (k, &coef) in gamma.iter().enumerate() {
                next[k] ^= coef;
                next[k + 1] ^= gf::mul(coef, x);
            }
            gamma = next;
        }

        // Berlekamp-Massey, seeded with the erasure locator so known
        // positions don't consume error-correction capacity
        let mut lambda = gamma.clone();
        let mut prev = gamma;
        let mut reg_len = rho;
        let mut gap = 1usize;
        let mut last_delta = 1u8;

        for r in rho..self.parity {
            let mut delta = 0u8;
            for (i, &coef) in lambda.iter().enumerate() {
                if i <= r {
                    delta ^= gf::mul(coef, synd[r - i]);
                }
            }

            if delta == 0 {
                gap += 1;
            }
            else if 2 * reg_len <= r + rho {
                let saved = lambda.clone();
                let scale = gf::div(delta, last_delta);
                lambda = poly_add_scaled_shifted(&lambda, &prev, scale, gap);
                prev = saved;
                last_delta = delta;
                reg_len = r + 1 - reg_len + rho;
                gap = 1;
            }
            else {
                let scale = gf::div(delta, last_delta);
                lambda = poly_add_scaled_shifted(&lambda, &prev, scale, gap);
                gap += 1;
            }
        }

        let nu = poly_degree(&lambda);
        if nu < rho || 2 * (nu - rho) + rho > self.parity {
            return Err(RsError::TooManyErrors);
        }

        // Chien search: find codeword positions whose inverse locators are
        // roots of Λ
        let mut positions = Vec::with_capacity(nu);
        for p in 0..n {
            let x_inv = gf::alpha_pow(255 - (p % 255));
            if poly_eval(&lambda, x_inv) == 0 {
                positions.push(n - 1 - p);
            }
        }
        if positions.len() != nu {
            return Err(RsError::Unsolvable);
        }

        // Forney: Ω(x) = S(x)·Λ(x) mod x^2t, magnitude = X·Ω(X⁻¹)/Λ'(X⁻¹)
        let omega = poly_mul_truncated(&synd, &lambda, self.parity);

        let mut corrections = 0;
        for &idx in &positions {
            let p = n - 1 - idx;
            let x = gf::alpha_pow(p);
            let x_inv = gf::alpha_pow(255 - (p % 255));

            let mut denominator = 0u8;
            let mut k = 1;
            while k < lambda.len() {
                denominator ^= gf::mul(lambda[k], gf::pow(x_inv, k - 1));
                k += 2;
            }
            if denominator == 0 {
                return Err(RsError::Unsolvable);
            }

            let magnitude = gf::div(gf::mul(x, poly_eval(&omega, x_inv)), denominator);
            if magnitude != 0 {
                corrections += 1;
            }
            codeword[idx] ^= magnitude;
        }

        // A decode that leaves nonzero syndromes behind found a plausible
        // but wrong solution; report it as a failure rather than emitting
        // silently corrupt data
        if self.syndromes(codeword).iter().any(|&s| s != 0) {
            return Err(RsError::Unsolvable);
        }

        Ok(corrections)
    }
}

/// Evaluate an ascending-coefficient polynomial at `x`.
fn poly_eval(poly: &[u8], x: u8) -> u8 {
    let mut acc = 0u8;
    for &coef in poly.iter().rev() {
        acc = gf::mul(acc, x) ^ coef;
    }
    acc
}

/// Degree of an ascending-coefficient polynomial (0 for constants).
fn poly_degree(poly: &[u8]) -> usize {
    poly.iter().rposition(|&c| c != 0).unwrap_or(0)
}

/// a(x) + scale·x^shift·b(x)
fn poly_add_scaled_shifted(a: &[u8], b: &[u8], scale: u8, shift: usize) -> Vec<u8> {
    let len = a.len().max(b.len() + shift);
    let mut out = vec![0u8; len];
    out[..a.len()].copy_from_slice(a);
    for (k, &coef) in b.iter().enumerate() {
        out[k + shift] ^= gf::mul(coef, scale);
    }
    out
}

/// a(x)·b(x) mod x^limit
fn poly_mul_truncated(a: &[u8], b: &[u8], limit: usize) -> Vec<u8> {
    let mut out = vec![0u8; limit];
    for (i, &ca) in a.iter().enumerate() {
        if ca == 0 || i >= limit {
            continue;
        }
        for (j, &cb) in b.iter().enumerate() {
            if i + j < limit {
                out[i + j] ^= gf::mul(ca, cb);
            }
        }
    }
    out
}
