//! HackRF sample format: interleaved signed 8-bit I/Q (Cs8).

use num_complex::Complex;

/// Bytes per complex sample.
pub const BYTES_PER_SAMPLE: usize = 2;

/// Convert a received buffer into complex samples scaled to `[-1, 1)`.
///
/// A trailing odd byte is ignored.
pub fn to_complex(buffer: &[u8]) -> Vec<Complex<f32>> {
    buffer
        .chunks_exact(BYTES_PER_SAMPLE)
        .map(|c| Complex::new((c[0] as i8) as f32 / 128.0, (c[1] as i8) as f32 / 128.0))
        .collect()
}

/// Fill a transmit buffer from complex samples, clamping to the Cs8 range.
///
/// Returns the number of samples written, limited by whichever side is
/// shorter.
pub fn from_complex(samples: &[Complex<f32>], buffer: &mut [u8]) -> usize {
    let mut written = 0;
    for (sample, out) in samples.iter().zip(buffer.chunks_exact_mut(BYTES_PER_SAMPLE)) {
        out[0] = quantize(sample.re) as u8;
        out[1] = quantize(sample.im) as u8;
        written += 1;
    }
    written
}

fn quantize(x: f32) -> i8 {
    (x * 128.0).round().clamp(-128.0, 127.0) as i8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_complex_sign() {
        let samples = to_complex(&[0x80, 0x7f, 0x00, 0xff, 0x01]);
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[0], Complex::new(-1.0, 127.0 / 128.0));
        assert_eq!(samples[1], Complex::new(0.0, -1.0 / 128.0));
    }

    #[test]
    fn test_from_complex_clamps() {
        let mut buffer = [0u8; 6];
        let written = from_complex(
            &[Complex::new(2.0, -2.0), Complex::new(0.5, -0.5)],
            &mut buffer,
        );
        assert_eq!(written, 2);
        assert_eq!(buffer[0] as i8, 127);
        assert_eq!(buffer[1] as i8, -128);
        assert_eq!(buffer[2] as i8, 64);
        assert_eq!(buffer[3] as i8, -64);
        assert_eq!(&buffer[4..], &[0, 0]);
    }
}
