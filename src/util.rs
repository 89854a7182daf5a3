//! Numeric helpers for the clock generator and the MAX2837 baseband filter.

/// Baseband filter bandwidths the MAX2837 supports, in Hz, ascending.
pub const BASEBAND_FILTER_BANDWIDTHS: [u32; 16] = [
    1_750_000, 2_500_000, 3_500_000, 5_000_000, 5_500_000, 6_000_000, 7_000_000, 8_000_000,
    9_000_000, 10_000_000, 12_000_000, 14_000_000, 15_000_000, 20_000_000, 24_000_000,
    28_000_000,
];

/// Largest supported filter bandwidth not above `bandwidth_hz`.
///
/// Below the table the narrowest filter is returned, above it the widest.
pub fn compute_baseband_filter_bw(bandwidth_hz: u32) -> u32 {
    let table = &BASEBAND_FILTER_BANDWIDTHS;
    match table.iter().position(|&bw| bw >= bandwidth_hz) {
        Some(0) => table[0],
        Some(i) if table[i] > bandwidth_hz => table[i - 1],
        Some(i) => table[i],
        None => table[table.len() - 1],
    }
}

/// Largest supported filter bandwidth strictly below `bandwidth_hz`,
/// or the narrowest filter if none is.
pub fn compute_baseband_filter_bw_round_down_lt(bandwidth_hz: u32) -> u32 {
    let table = &BASEBAND_FILTER_BANDWIDTHS;
    match table.iter().position(|&bw| bw >= bandwidth_hz) {
        Some(0) => table[0],
        Some(i) => table[i - 1],
        None => table[table.len() - 1],
    }
}

const MAX_DIVIDER_SEARCH: u32 = 32;

/// Express a sample rate as `(freq_hz, divider)` for the clock generator.
///
/// Looks for the smallest divider `n < 32` such that `freq * n` is an
/// integer once the fractional part is truncated to the precision the
/// generator resolves (four bits below the integer part). Falls back to
/// divider 1 when none is found.
pub fn sample_rate_divider(freq: f64) -> (u32, u32) {
    let exponent = ((freq.to_bits() >> 52) & 0x7ff) as i64 - 1023;
    let mantissa_mask: u64 = (1 << 52) - 1;

    let divider = if (0..48).contains(&exponent) {
        let frac = (1.0 + freq - freq.trunc()).to_bits() & mantissa_mask;
        let mask = mantissa_mask & !((1u64 << (exponent + 4)) - 1);

        let mut acc: u64 = 0;
        (1..MAX_DIVIDER_SEARCH)
            .find(|_| {
                acc = acc.wrapping_add(frac);
                acc & mask == 0 || !acc & mask == 0
            })
            .unwrap_or(1)
    } else {
        1
    };

    ((freq * divider as f64 + 0.5) as u32, divider)
}
