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

    src/circ/gf256.rs

    GF(2^8) arithmetic over the field generated by the primitive polynomial
    0x11D, shared by every Reed-Solomon code in the CD family (C1, C2 and
    the sector-level P/Q codes).

*/

use std::sync::OnceLock;

/// x^8 + x^4 + x^3 + x^2 + 1, the field polynomial used by ECMA-130.
pub const PRIMITIVE_POLY: u16 = 0x11D;

/// Precomputed log and antilog tables. The exp table is doubled so the sum
/// of two logs can index it without a modular reduction.
struct GfTables {
    exp: [u8; 512],
    log: [u8; 256],
}

fn build_tables() -> GfTables {
    let mut exp = [0u8; 512];
    let mut log = [0u8; 256];

    let mut x: u16 = 1;
    for i in 0..255 {
        exp[i] = x as u8;
        exp[i + 255] = x as u8;
        log[x as usize] = i as u8;
        x <<= 1;
        if x & 0x100 != 0 {
            x ^= PRIMITIVE_POLY;
        }
    }
    // log[0] is undefined; exp padding
    exp[510] = exp[0];
    exp[511] = exp[1];

    GfTables { exp, log }
}

fn tables() -> &'static GfTables {
    static TABLES: OnceLock<GfTables> = OnceLock::new();
    TABLES.get_or_init(build_tables)
}

/// α^power for any non-negative power.
#[inline]
pub fn alpha_pow(power: usize) -> u8 {
    tables().exp[power % 255]
}

/// Multiplication in GF(2^8).
#[inline]
pub fn mul(a: u8, b: u8) -> u8 {
    if a == 0 || b == 0 {
        return 0;
    }
    let t = tables();
    t.exp[t.log[a as usize] as usize + t.log[b as usize] as usize]
}

/// Division in GF(2^8). `b` must be nonzero.
#[inline]
pub fn div(a: u8, b: u8) -> u8 {
    debug_assert_ne!(b, 0, "division by zero in GF(2^8)");
    if a == 0 {
        return 0;
    }
    let t = tables();
    t.exp[t.log[a as usize] as usize + 255 - t.log[b as usize] as usize]
}

/// a^n in GF(2^8).
#[inline]
pub fn pow(a: u8, n: usize) -> u8 {
    if n == 0 {
        return 1;
    }
    if a == 0 {
        return 0;
    }
    let t = tables();
    t.exp[(t.log[a as usize] as usize * n) % 255]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_properties() {
        // α generates the full multiplicative group
        let mut seen = [false; 256];
        for p in 0..255 {
            seen[alpha_pow(p) as usize] = true;
        }
        assert_eq!(seen.iter().filter(|&&s| s).count(), 255);
        assert!(!seen[0]);
    }

    #[test]
    fn mul_div_inverse() {
        for a in 1..=255u8 {
            for b in 1..=255u8 {
                let product = mul(a, b);
                assert_eq!(div(product, b), a);
                assert_eq!(div(product, a), b);
            }
        }
    }

    #[test]
    fn pow_matches_repeated_mul() {
        let a = alpha_pow(5);
        let mut acc = 1u8;
        for n in 0..10 {
            assert_eq!(pow(a, n), acc);
            acc = mul(acc, a);
        }
    }
}
