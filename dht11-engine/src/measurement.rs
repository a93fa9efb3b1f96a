/// A DHT11 combined temperature and relative humidity reading.
///
/// `valid` is the only signal of whether the numbers are any good. When an
/// acquisition fails, the cache clears `valid` but leaves the numbers from
/// the last good reading in place, so an invalid measurement may well carry
/// plausible-looking (stale) data.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct Measurement {
    valid: bool,
    rh_integral: u8,
    rh_decimal: u8,
    t_integral: u8,
    t_decimal: u8,
}

impl Measurement {
    /// What the cache holds before the sensor has ever been read.
    pub const NONE: Self = Self {
        valid: false,
        rh_integral: 0,
        rh_decimal: 0,
        t_integral: 0,
        t_decimal: 0,
    };

    /// Size of the record produced by [`Measurement::to_record`].
    pub const RECORD_LEN: usize = 5;

    /// Returns a valid measurement with the given raw sensor bytes.
    pub const fn new(rh_integral: u8, rh_decimal: u8, t_integral: u8, t_decimal: u8) -> Self {
        Self {
            valid: true,
            rh_integral,
            rh_decimal,
            t_integral,
            t_decimal,
        }
    }

    /// Returns this measurement marked as not valid, keeping the data bytes.
    pub const fn invalidated(self) -> Self {
        Self {
            valid: false,
            ..self
        }
    }

    pub const fn is_valid(&self) -> bool {
        self.valid
    }

    pub const fn humidity_integral(&self) -> u8 {
        self.rh_integral
    }

    pub const fn humidity_decimal(&self) -> u8 {
        self.rh_decimal
    }

    pub const fn temperature_integral(&self) -> u8 {
        self.t_integral
    }

    pub const fn temperature_decimal(&self) -> u8 {
        self.t_decimal
    }

    /// Returns the relative humidity in percent.
    pub fn humidity_percent(&self) -> f32 {
        self.rh_integral as f32 + self.rh_decimal as f32 * 0.1
    }

    /// Returns the temperature in Celsius.
    ///
    /// Newer DHT11 revisions can report sub-zero temperatures, flagged by the
    /// high bit of the decimal byte.
    pub fn temp_celsius(&self) -> f32 {
        let mut temp = self.t_integral as f32;
        if self.t_decimal & 0x80 != 0 {
            temp = -1.0 - temp;
        }
        temp + (self.t_decimal & 0x0f) as f32 * 0.1
    }

    /// Returns the temperature in Fahrenheit.
    pub fn temp_fahrenheit(&self) -> f32 {
        celsius_to_fahrenheit(self.temp_celsius())
    }

    /// Returns the fixed-layout record handed to consumers: success flag,
    /// humidity integral and decimal, temperature integral and decimal.
    pub const fn to_record(&self) -> [u8; Self::RECORD_LEN] {
        [
            self.valid as u8,
            self.rh_integral,
            self.rh_decimal,
            self.t_integral,
            self.t_decimal,
        ]
    }

    /// Writes the record into the front of `buf`, returning the number of
    /// bytes written.
    ///
    /// A buffer too small for the whole record gets nothing at all, rather
    /// than a truncated record, and this returns 0.
    pub fn write_record(&self, buf: &mut [u8]) -> usize {
        match buf.get_mut(..Self::RECORD_LEN) {
            Some(dst) => {
                dst.copy_from_slice(&self.to_record());
                Self::RECORD_LEN
            }
            None => 0,
        }
    }
}

impl Default for Measurement {
    fn default() -> Self {
        Self::NONE
    }
}

fn celsius_to_fahrenheit(c: f32) -> f32 {
    c * 1.8 + 32.0
}
