/// Reed-Solomon coding over GF(256), primitive polynomial x^8 + x^4 + x^3 + x^2 + 1.
///
/// Codewords are stored highest-degree coefficient first. The generator has
/// roots alpha^0 .. alpha^(n-1).
pub struct Gf256;

const PRIMITIVE: u16 = 0x11D;

const fn build_tables() -> ([u8; 512], [u8; 256]) {
    let mut exp = [0u8; 512];
    let mut log = [0u8; 256];
    let mut x: u16 = 1;
    let mut i = 0;
    while i < 255 {
        exp[i] = x as u8;
        log[x as usize] = i as u8;
        x <<= 1;
        if x & 0x100 != 0 {
            x ^= PRIMITIVE;
        }
        i += 1;
    }
    // Doubled so products of two logs index without a modulo
    while i < 512 {
        exp[i] = exp[i - 255];
        i += 1;
    }
    (exp, log)
}

const TABLES: ([u8; 512], [u8; 256]) = build_tables();
static EXP_TABLE: [u8; 512] = TABLES.0;
static LOG_TABLE: [u8; 256] = TABLES.1;

impl Gf256 {
    #[inline]
    pub fn mul(a: u8, b: u8) -> u8 {
        if a == 0 || b == 0 {
            return 0;
        }
        EXP_TABLE[LOG_TABLE[a as usize] as usize + LOG_TABLE[b as usize] as usize]
    }

    /// `a / b`; `b` must be non-zero
    #[inline]
    pub fn div(a: u8, b: u8) -> u8 {
        debug_assert!(b != 0);
        if a == 0 {
            return 0;
        }
        EXP_TABLE[LOG_TABLE[a as usize] as usize + 255 - LOG_TABLE[b as usize] as usize]
    }

    /// alpha^power for any power, negative powers included
    #[inline]
    pub fn exp(power: isize) -> u8 {
        EXP_TABLE[power.rem_euclid(255) as usize]
    }

    /// Evaluate a polynomial stored lowest degree first
    fn eval_ascending(poly: &[u8], x: u8) -> u8 {
        poly.iter().rev().fold(0, |acc, &c| Self::mul(acc, x) ^ c)
    }
}

/// Why a block could not be corrected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RsError {
    /// More errors than the EC codewords can fix
    TooManyErrors,
    /// Locator roots disagree with its degree
    LocatorMismatch,
}

/// Generator polynomial of the given degree, leading 1 omitted, highest degree first
pub fn generator_poly(degree: usize) -> Vec<u8> {
    let mut result = vec![0u8; degree];
    if degree == 0 {
        return result;
    }
    result[degree - 1] = 1;
    let mut root = 1u8;
    for _ in 0..degree {
        for j in 0..degree {
            result[j] = Gf256::mul(result[j], root);
            if j + 1 < degree {
                result[j] ^= result[j + 1];
            }
        }
        root = Gf256::mul(root, 0x02);
    }
    result
}

/// EC codewords for one data block
pub fn compute_ecc(data: &[u8], generator: &[u8]) -> Vec<u8> {
    let mut remainder = vec![0u8; generator.len()];
    for &byte in data {
        let factor = byte ^ remainder[0];
        remainder.rotate_left(1);
        if let Some(last) = remainder.last_mut() {
            *last = 0;
        }
        for (r, &g) in remainder.iter_mut().zip(generator) {
            *r ^= Gf256::mul(g, factor);
        }
    }
    remainder
}

/// In-place decoder for one block (data followed by `num_ecc` EC codewords)
pub struct ReedSolomonDecoder {
    num_ecc_codewords: usize,
}

impl ReedSolomonDecoder {
    pub fn new(num_ecc_codewords: usize) -> Self {
        Self { num_ecc_codewords }
    }

    /// Correct `received` in place and return the number of fixed codewords
    pub fn decode(&self, received: &mut [u8]) -> Result<usize, RsError> {
        let syndromes = self.syndromes(received);
        if syndromes.iter().all(|&s| s == 0) {
            return Ok(0);
        }

        let sigma = berlekamp_massey(&syndromes)?;
        let num_errors = sigma.len() - 1;
        if num_errors * 2 > self.num_ecc_codewords {
            return Err(RsError::TooManyErrors);
        }

        let n = received.len();
        // Chien search: an error at index j has locator X = alpha^(n-1-j)
        let positions: Vec<usize> = (0..n)
            .filter(|&j| Gf256::eval_ascending(&sigma, Gf256::exp(-((n - 1 - j) as isize))) == 0)
            .collect();
        if positions.len() != num_errors {
            return Err(RsError::LocatorMismatch);
        }

        // Forney: e = X * omega(X^-1) / sigma'(X^-1)
        let mut omega = vec![0u8; self.num_ecc_codewords];
        for (i, &s) in syndromes.iter().enumerate() {
            for (k, &c) in sigma.iter().enumerate() {
                if i + k < omega.len() {
                    omega[i + k] ^= Gf256::mul(s, c);
                }
            }
        }
        let derivative: Vec<u8> = sigma
            .iter()
            .enumerate()
            .skip(1)
            .map(|(k, &c)| if k % 2 == 1 { c } else { 0 })
            .collect();

        for &j in &positions {
            let power = (n - 1 - j) as isize;
            let x = Gf256::exp(power);
            let x_inv = Gf256::exp(-power);
            let denominator = Gf256::eval_ascending(&derivative, x_inv);
            if denominator == 0 {
                return Err(RsError::LocatorMismatch);
            }
            let magnitude = Gf256::mul(x, Gf256::div(Gf256::eval_ascending(&omega, x_inv), denominator));
            received[j] ^= magnitude;
        }

        if self.syndromes(received).iter().any(|&s| s != 0) {
            return Err(RsError::TooManyErrors);
        }
        Ok(num_errors)
    }

    fn syndromes(&self, received: &[u8]) -> Vec<u8> {
        (0..self.num_ecc_codewords)
            .map(|i| {
                let x = Gf256::exp(i as isize);
                received.iter().fold(0u8, |acc, &c| Gf256::mul(acc, x) ^ c)
            })
            .collect()
    }
}

/// Error locator polynomial, lowest degree first, trailing zeros trimmed
fn berlekamp_massey(syndromes: &[u8]) -> Result<Vec<u8>, RsError> {
    let mut sigma = vec![1u8];
    let mut prev = vec![1u8];
    let mut len = 0usize;
    let mut shift = 1usize;
    let mut prev_discrepancy = 1u8;

    for n in 0..syndromes.len() {
        let mut discrepancy = syndromes[n];
        for i in 1..=len {
            let coeff = sigma.get(i).copied().unwrap_or(0);
            discrepancy ^= Gf256::mul(coeff, syndromes[n - i]);
        }

        if discrepancy == 0 {
            shift += 1;
            continue;
        }

        let scale = Gf256::div(discrepancy, prev_discrepancy);
        let snapshot = sigma.clone();
        if sigma.len() < prev.len() + shift {
            sigma.resize(prev.len() + shift, 0);
        }
        for (i, &p) in prev.iter().enumerate() {
            sigma[i + shift] ^= Gf256::mul(scale, p);
        }

        if 2 * len <= n {
            len = n + 1 - len;
            prev = snapshot;
            prev_discrepancy = discrepancy;
            shift = 1;
        } else {
            shift += 1;
        }
    }

    while sigma.len() > 1 && sigma.last() == Some(&0) {
        sigma.pop();
    }
    if sigma.len() - 1 != len {
        return Err(RsError::LocatorMismatch);
    }
    Ok(sigma)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_block(data: &[u8], num_ecc: usize) -> Vec<u8> {
        let mut block = data.to_vec();
        block.extend(compute_ecc(data, &generator_poly(num_ecc)));
        block
    }

    #[test]
    fn test_gf256_basic() {
        assert_eq!(Gf256::mul(0, 7), 0);
        assert_eq!(Gf256::mul(1, 7), 7);
        assert_eq!(Gf256::mul(2, 0x80), 0x1D);
        for a in 1..=255u8 {
            assert_eq!(Gf256::div(Gf256::mul(a, 0x53), 0x53), a);
        }
        assert_eq!(Gf256::exp(255), 1);
        assert_eq!(Gf256::exp(-1), Gf256::div(1, 2));
    }

    #[test]
    fn test_known_ecc_block() {
        // "HELLO WORLD" 1-M data codewords and their EC codewords
        let data = [
            0x20, 0x5B, 0x0B, 0x78, 0xD1, 0x72, 0xDC, 0x4D, 0x43, 0x40, 0xEC, 0x11, 0xEC, 0x11,
            0xEC, 0x11,
        ];
        let ecc = compute_ecc(&data, &generator_poly(10));
        assert_eq!(
            ecc,
            vec![0xC4, 0x23, 0x27, 0x77, 0xEB, 0xD7, 0xE7, 0xE2, 0x5D, 0x17]
        );
    }

    #[test]
    fn test_clean_block_untouched() {
        let mut block = encode_block(b"gate 7", 8);
        let original = block.clone();
        assert_eq!(ReedSolomonDecoder::new(8).decode(&mut block), Ok(0));
        assert_eq!(block, original);
    }

    #[test]
    fn test_corrects_up_to_half_the_ecc() {
        let data: Vec<u8> = (0..40).map(|i| (i * 37 + 11) as u8).collect();
        let original = encode_block(&data, 16);

        let mut damaged = original.clone();
        for (k, pos) in [0usize, 5, 13, 21, 30, 39, 44, 55].iter().enumerate() {
            damaged[*pos] ^= 0x5A + k as u8;
        }
        assert_eq!(ReedSolomonDecoder::new(16).decode(&mut damaged), Ok(8));
        assert_eq!(damaged, original);
    }

    #[test]
    fn test_error_in_last_codeword() {
        let original = encode_block(b"VISITOR-1700000000-abc123", 10);
        let mut damaged = original.clone();
        let last = damaged.len() - 1;
        damaged[last] ^= 0xFF;
        assert_eq!(ReedSolomonDecoder::new(10).decode(&mut damaged), Ok(1));
        assert_eq!(damaged, original);
    }

    #[test]
    fn test_too_many_errors_detected() {
        let original = encode_block(&[0x42; 20], 6);
        let mut damaged = original.clone();
        for pos in [1usize, 3, 5, 7, 9] {
            damaged[pos] ^= 0x33;
        }
        assert!(ReedSolomonDecoder::new(6).decode(&mut damaged).is_err() || damaged != original);
    }
}
