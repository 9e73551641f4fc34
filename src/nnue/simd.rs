//! Vector kernels for NNUE inference.
//!
//! AVX2 paths use 256-bit integer math (16 x i16 adds, pairwise
//! multiply-add for the i8 layer); every kernel has a scalar fallback for
//! non-SIMD targets. Runtime detection is used when the binary is not
//! compiled with AVX2 enabled.

/// Add a weight column into an accumulator half.
#[inline]
pub fn add_in_place(acc: &mut [i16], weights: &[i16]) {
    debug_assert_eq!(acc.len(), weights.len());
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") {
            unsafe { add_in_place_avx2(acc, weights) };
            return;
        }
    }
    add_in_place_scalar(acc, weights);
}

/// Subtract a weight column from an accumulator half.
#[inline]
pub fn sub_in_place(acc: &mut [i16], weights: &[i16]) {
    debug_assert_eq!(acc.len(), weights.len());
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") {
            unsafe { sub_in_place_avx2(acc, weights) };
            return;
        }
    }
    sub_in_place_scalar(acc, weights);
}

/// Clipped ReLU: clamp each accumulator value into `[0, limit]` and
/// narrow to u8.
#[inline]
pub fn clamp_to_u8(acc: &[i16], limit: i16, out: &mut [u8]) {
    debug_assert_eq!(acc.len(), out.len());
    for (value, slot) in acc.iter().zip(out.iter_mut()) {
        *slot = (*value).clamp(0, limit) as u8;
    }
}

/// Dot product of a clamped u8 input row with an i8 weight row,
/// accumulated in i32.
#[inline]
#[must_use]
pub fn dot_u8_i8(input: &[u8], weights: &[i8]) -> i32 {
    debug_assert_eq!(input.len(), weights.len());
    #[cfg(target_arch = "x86_64")]
    {
        if is_x86_feature_detected!("avx2") {
            return unsafe { dot_u8_i8_avx2(input, weights) };
        }
    }
    dot_u8_i8_scalar(input, weights)
}

fn add_in_place_scalar(acc: &mut [i16], weights: &[i16]) {
    for (value, weight) in acc.iter_mut().zip(weights.iter()) {
        *value = value.wrapping_add(*weight);
    }
}

fn sub_in_place_scalar(acc: &mut [i16], weights: &[i16]) {
    for (value, weight) in acc.iter_mut().zip(weights.iter()) {
        *value = value.wrapping_sub(*weight);
    }
}

fn dot_u8_i8_scalar(input: &[u8], weights: &[i8]) -> i32 {
    input
        .iter()
        .zip(weights.iter())
        .map(|(&a, &w)| i32::from(a) * i32::from(w))
        .sum()
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn add_in_place_avx2(acc: &mut [i16], weights: &[i16]) {
    use std::arch::x86_64::*;
    const LANES: usize = 16;
    let chunks = acc.len() / LANES;
    let acc_ptr = acc.as_mut_ptr();
    let w_ptr = weights.as_ptr();
    for i in 0..chunks {
        let a = _mm256_loadu_si256(acc_ptr.add(i * LANES).cast());
        let w = _mm256_loadu_si256(w_ptr.add(i * LANES).cast());
        _mm256_storeu_si256(acc_ptr.add(i * LANES).cast(), _mm256_add_epi16(a, w));
    }
    for i in chunks * LANES..acc.len() {
        *acc.get_unchecked_mut(i) = acc.get_unchecked(i).wrapping_add(*weights.get_unchecked(i));
    }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn sub_in_place_avx2(acc: &mut [i16], weights: &[i16]) {
    use std::arch::x86_64::*;
    const LANES: usize = 16;
    let chunks = acc.len() / LANES;
    let acc_ptr = acc.as_mut_ptr();
    let w_ptr = weights.as_ptr();
    for i in 0..chunks {
        let a = _mm256_loadu_si256(acc_ptr.add(i * LANES).cast());
        let w = _mm256_loadu_si256(w_ptr.add(i * LANES).cast());
        _mm256_storeu_si256(acc_ptr.add(i * LANES).cast(), _mm256_sub_epi16(a, w));
    }
    for i in chunks * LANES..acc.len() {
        *acc.get_unchecked_mut(i) = acc.get_unchecked(i).wrapping_sub(*weights.get_unchecked(i));
    }
}

#[cfg(target_arch = "x86_64")]
#[target_feature(enable = "avx2")]
unsafe fn dot_u8_i8_avx2(input: &[u8], weights: &[i8]) -> i32 {
    use std::arch::x86_64::*;
    const LANES: usize = 32;
    let chunks = input.len() / LANES;
    let in_ptr = input.as_ptr();
    let w_ptr = weights.as_ptr();
    let ones = _mm256_set1_epi16(1);
    let mut sum = _mm256_setzero_si256();
    for i in 0..chunks {
        let a = _mm256_loadu_si256(in_ptr.add(i * LANES).cast());
        let w = _mm256_loadu_si256(w_ptr.add(i * LANES).cast());
        // Pairwise u8*i8 -> i16, then widen the pair sums to i32.
        let products = _mm256_maddubs_epi16(a, w);
        sum = _mm256_add_epi32(sum, _mm256_madd_epi16(products, ones));
    }
    let mut lanes = [0i32; 8];
    _mm256_storeu_si256(lanes.as_mut_ptr().cast(), sum);
    let mut total: i32 = lanes.iter().sum();
    for i in chunks * LANES..input.len() {
        total += i32::from(*input.get_unchecked(i)) * i32::from(*weights.get_unchecked(i));
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_sub_roundtrip() {
        let mut acc = vec![0i16; 512];
        let weights: Vec<i16> = (0..512).map(|i| (i as i16) - 256).collect();
        add_in_place(&mut acc, &weights);
        assert_eq!(acc, weights);
        sub_in_place(&mut acc, &weights);
        assert!(acc.iter().all(|&v| v == 0));
    }

    #[test]
    fn clamp_narrows_and_clips() {
        let acc = [-5i16, 0, 50, 127, 300];
        let mut out = [0u8; 5];
        clamp_to_u8(&acc, 127, &mut out);
        assert_eq!(out, [0, 0, 50, 127, 127]);
    }

    #[test]
    fn dot_matches_scalar_reference() {
        let input: Vec<u8> = (0..512).map(|i| (i % 128) as u8).collect();
        let weights: Vec<i8> = (0..512).map(|i| ((i * 7) % 255) as i8).collect();
        let expected: i32 = input
            .iter()
            .zip(weights.iter())
            .map(|(&a, &w)| i32::from(a) * i32::from(w))
            .sum();
        assert_eq!(dot_u8_i8(&input, &weights), expected);
    }
}
