//! Turning captured pulse counts into a measurement.
use crate::{ErrorKind, Measurement};

/// Number of data bits the sensor sends after its handshake.
pub const BITS: usize = 40;

const BITS_PER_BYTE: usize = 8;

/// The polling-cycle counts of one data bit: the leading low pulse and the
/// high pulse that encodes the value.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct Pulse {
    pub lo: u32,
    pub hi: u32,
}

/// Every bit of one acquisition, in the order the sensor sent them.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct RawFrame {
    pulses: [Pulse; BITS],
}

impl Pulse {
    pub const fn new(lo: u32, hi: u32) -> Self {
        Self { lo, hi }
    }

    /// The sensor delimits every bit with a ~50us low pulse, then holds the
    /// line high for ~27us for a 0 or ~70us for a 1. Rather than trying to
    /// convert counts into microseconds, use the low pulse as the yardstick:
    /// a high pulse longer than it is a 1, anything else is a 0.
    ///
    /// Equal counts are a 0. The sensor's timing shouldn't ever produce them,
    /// but if it does the answer is still deterministic.
    #[inline]
    pub const fn bit(self) -> bool {
        self.lo < self.hi
    }
}

impl RawFrame {
    pub(crate) const fn empty() -> Self {
        Self {
            pulses: [Pulse { lo: 0, hi: 0 }; BITS],
        }
    }

    pub const fn from_pulses(pulses: [Pulse; BITS]) -> Self {
        Self { pulses }
    }

    pub fn pulses(&self) -> &[Pulse; BITS] {
        &self.pulses
    }

    pub(crate) fn pulse_mut(&mut self, bit: usize) -> &mut Pulse {
        &mut self.pulses[bit]
    }

    /// Decodes the frame into the five bytes the sensor sent, most
    /// significant bit first: humidity integral, humidity decimal,
    /// temperature integral, temperature decimal, checksum.
    pub fn bytes(&self) -> [u8; 5] {
        let mut bytes = [0u8; 5];
        for (byte, pulses) in bytes.iter_mut().zip(self.pulses.chunks_exact(BITS_PER_BYTE)) {
            for pulse in pulses {
                *byte <<= 1;
                if pulse.bit() {
                    *byte |= 1;
                }
            }
        }
        bytes
    }

    /// Decodes the frame and checks it against the sensor's checksum.
    ///
    /// The last byte sent by the sensor is a checksum, which should be the
    /// low byte of the sum of the first four.
    pub fn decode<E>(&self) -> Result<Measurement, crate::Error<E>> {
        self.decode_kind::<E>().map_err(crate::Error)
    }

    pub(crate) fn decode_kind<E>(&self) -> Result<Measurement, ErrorKind<E>> {
        let [rh_integral, rh_decimal, t_integral, t_decimal, expected] = self.bytes();
        let actual = checksum(rh_integral, rh_decimal, t_integral, t_decimal);
        if actual != expected {
            return Err(ErrorKind::Checksum { expected, actual });
        }
        Ok(Measurement::new(rh_integral, rh_decimal, t_integral, t_decimal))
    }
}

#[inline]
pub(crate) const fn checksum(rh_integral: u8, rh_decimal: u8, t_integral: u8, t_decimal: u8) -> u8 {
    rh_integral
        .wrapping_add(rh_decimal)
        .wrapping_add(t_integral)
        .wrapping_add(t_decimal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim;
    use proptest::prelude::*;

    type Error = crate::Error<()>;

    #[test]
    fn decodes_a_good_frame() {
        // 50% RH, 24C.
        let frame = sim::frame_for([0x32, 0x00, 0x18, 0x00, 0x4A]);
        let m = frame.decode::<()>().unwrap();
        assert!(m.is_valid());
        assert_eq!(m.humidity_integral(), 50);
        assert_eq!(m.humidity_decimal(), 0);
        assert_eq!(m.temperature_integral(), 24);
        assert_eq!(m.temperature_decimal(), 0);
    }

    #[test]
    fn rejects_a_bad_checksum() {
        let frame = sim::frame_for([0x32, 0x00, 0x18, 0x00, 0x4B]);
        let err: Error = frame.decode().unwrap_err();
        assert!(err.is_checksum());
        assert_eq!(
            err,
            crate::Error(ErrorKind::Checksum {
                expected: 0x4B,
                actual: 0x4A
            })
        );
    }

    #[test]
    fn checksum_wraps() {
        let frame = sim::frame_for([0xF0, 0x20, 0x01, 0x02, 0x13]);
        assert!(frame.decode::<()>().is_ok());
    }

    #[test]
    fn msb_first() {
        let mut pulses = [Pulse::new(50, 27); BITS];
        pulses[0] = Pulse::new(50, 70);
        pulses[BITS - 1] = Pulse::new(50, 70);
        let frame = RawFrame::from_pulses(pulses);
        assert_eq!(frame.bytes(), [0x80, 0, 0, 0, 0x01]);
    }

    proptest! {
        #[test]
        fn bit_is_one_iff_low_is_shorter(lo in any::<u32>(), hi in any::<u32>()) {
            prop_assert_eq!(Pulse::new(lo, hi).bit(), lo < hi);
        }

        #[test]
        fn equal_counts_are_zero(n in any::<u32>()) {
            prop_assert!(!Pulse::new(n, n).bit());
        }

        #[test]
        fn valid_iff_checksum_matches(data in any::<[u8; 4]>(), sum in any::<u8>()) {
            let [h, hf, t, tf] = data;
            let frame = sim::frame_for([h, hf, t, tf, sum]);
            let expected = ((h as u32 + hf as u32 + t as u32 + tf as u32) % 256) as u8;
            let decoded = frame.decode::<()>();
            prop_assert_eq!(decoded.is_ok(), sum == expected);
            if let Ok(m) = decoded {
                prop_assert_eq!(m, Measurement::new(h, hf, t, tf));
            }
        }
    }
}
