//! Orthogonal feedback mixing matrix.

// -------------------------------------------------------------------------------------------------

/// Number of delay lines in the network.
pub const LINES: usize = 8;

/// Normalization of the Sylvester-Hadamard matrix: 1/√N.
const NORMALIZATION: f32 = 0.353_553_38; // 1 / sqrt(8)

/// Mix the given line outputs in place with an 8x8 Sylvester-Hadamard matrix scaled by 1/√8.
///
/// Applied as a fast Walsh-Hadamard butterfly: 24 additions and 8 multiplications instead of 64
/// multiply-adds. The matrix is symmetric and orthogonal, so it preserves the signal's energy.
#[inline]
pub fn hadamard(values: &mut [f32; LINES]) {
    let mut span = 1;
    while span < LINES {
        let mut start = 0;
        while start < LINES {
            for i in start..start + span {
                let a = values[i];
                let b = values[i + span];
                values[i] = a + b;
                values[i + span] = a - b;
            }
            start += span * 2;
        }
        span *= 2;
    }
    for value in values.iter_mut() {
        *value *= NORMALIZATION;
    }
}

// -------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn explicit_matrix() -> [[f32; LINES]; LINES] {
        let mut matrix = [[0.0; LINES]; LINES];
        for (row, values) in matrix.iter_mut().enumerate() {
            for (col, value) in values.iter_mut().enumerate() {
                // Sylvester construction: sign is the parity of the bitwise AND
                let sign = if (row & col).count_ones() % 2 == 0 {
                    1.0
                } else {
                    -1.0
                };
                *value = sign * NORMALIZATION;
            }
        }
        matrix
    }

    #[test]
    fn matches_explicit_matrix() {
        let matrix = explicit_matrix();
        let input = [0.3, -0.1, 0.8, 0.0, -0.5, 0.25, 0.7, -0.9];
        let mut fast = input;
        hadamard(&mut fast);
        for row in 0..LINES {
            let expected: f32 = (0..LINES).map(|col| matrix[row][col] * input[col]).sum();
            assert!((fast[row] - expected).abs() < 1e-5);
        }
    }

    #[test]
    fn preserves_energy() {
        let input = [1.0, 0.5, -0.25, 0.125, 0.0, -1.0, 0.75, 0.3];
        let mut output = input;
        hadamard(&mut output);
        let energy_in: f32 = input.iter().map(|v| v * v).sum();
        let energy_out: f32 = output.iter().map(|v| v * v).sum();
        assert!((energy_in - energy_out).abs() < 1e-5);
    }

    #[test]
    fn is_involutory() {
        // H·H = I for the normalized, symmetric Hadamard matrix
        let input = [0.1, 0.2, 0.3, 0.4, -0.5, -0.6, -0.7, -0.8];
        let mut output = input;
        hadamard(&mut output);
        hadamard(&mut output);
        for (a, b) in input.iter().zip(output.iter()) {
            assert!((a - b).abs() < 1e-5);
        }
    }
}
