//! BMP180 barometric pressure sensor over I2C, with the datasheet's integer
//! compensation.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::error::SensorFault;
use crate::logging::log_sensor_error;
use crate::models::BarometricReading;
use crate::sensors::{BAROMETRIC_SENSOR_NAME, BarometricSensor};

pub const I2C_ADDR: u8 = 0x77;
pub const CHIP_ID: u8 = 0x55;

const REG_CALIBRATION: u8 = 0xAA;
const REG_CHIP_ID: u8 = 0xD0;
const REG_CONTROL: u8 = 0xF4;
const REG_RESULT: u8 = 0xF6;

const CMD_TEMPERATURE: u8 = 0x2E;
const CMD_PRESSURE: u8 = 0x34;

const TEMPERATURE_CONVERSION_MS: u32 = 5;

/// Pressure oversampling setting (`oss`).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum Oversampling {
    UltraLowPower = 0,
    Standard = 1,
    HighResolution = 2,
    UltraHighResolution = 3,
}

impl Oversampling {
    fn oss(self) -> u8 {
        self as u8
    }

    fn conversion_ms(self) -> u32 {
        match self {
            Self::UltraLowPower => 5,
            Self::Standard => 8,
            Self::HighResolution => 14,
            Self::UltraHighResolution => 26,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Bmp180Error<E> {
    #[error("i2c error: {0:?}")]
    I2c(E),

    #[error("unexpected chip id {0:#04x}")]
    WrongChip(u8),

    #[error("calibration not loaded, call init() first")]
    NotInitialized,
}

/// Factory calibration coefficients from the sensor's EEPROM.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Calibration {
    pub ac1: i16,
    pub ac2: i16,
    pub ac3: i16,
    pub ac4: u16,
    pub ac5: u16,
    pub ac6: u16,
    pub b1: i16,
    pub b2: i16,
    pub mb: i16,
    pub mc: i16,
    pub md: i16,
}

impl Calibration {
    pub fn from_bytes(raw: &[u8; 22]) -> Self {
        let word = |i: usize| [raw[2 * i], raw[2 * i + 1]];
        Self {
            ac1: i16::from_be_bytes(word(0)),
            ac2: i16::from_be_bytes(word(1)),
            ac3: i16::from_be_bytes(word(2)),
            ac4: u16::from_be_bytes(word(3)),
            ac5: u16::from_be_bytes(word(4)),
            ac6: u16::from_be_bytes(word(5)),
            b1: i16::from_be_bytes(word(6)),
            b2: i16::from_be_bytes(word(7)),
            mb: i16::from_be_bytes(word(8)),
            mc: i16::from_be_bytes(word(9)),
            md: i16::from_be_bytes(word(10)),
        }
    }

    fn b5(&self, ut: i32) -> i32 {
        let x1 = ((ut - self.ac6 as i32) * self.ac5 as i32) >> 15;
        let x2 = ((self.mc as i32) << 11)
            .checked_div(x1 + self.md as i32)
            .unwrap_or(0);
        x1 + x2
    }

    /// True temperature in 0.1 °C.
    pub fn temperature(&self, ut: i32) -> i32 {
        (self.b5(ut) + 8) >> 4
    }

    /// True pressure in Pa.
    pub fn pressure(&self, ut: i32, up: i32, mode: Oversampling) -> i32 {
        let oss = mode.oss();
        let b6 = self.b5(ut) - 4000;

        let x1 = (self.b2 as i32 * ((b6 * b6) >> 12)) >> 11;
        let x2 = (self.ac2 as i32 * b6) >> 11;
        let x3 = x1 + x2;
        let b3 = (((self.ac1 as i32 * 4 + x3) << oss) + 2) / 4;

        let x1 = (self.ac3 as i32 * b6) >> 13;
        let x2 = (self.b1 as i32 * ((b6 * b6) >> 12)) >> 16;
        let x3 = ((x1 + x2) + 2) >> 2;
        let b4 = (self.ac4 as u32).wrapping_mul((x3 + 32768) as u32) >> 15;
        if b4 == 0 {
            // blank calibration EEPROM
            return 0;
        }
        let b7 = (up as u32)
            .wrapping_sub(b3 as u32)
            .wrapping_mul(50_000 >> oss);

        let mut p = if b7 < 0x8000_0000 {
            (b7 * 2) / b4
        } else {
            (b7 / b4) * 2
        } as i32;

        let x1 = (p >> 8) * (p >> 8);
        let x1 = (x1 * 3038) >> 16;
        let x2 = (-7357 * p) >> 16;
        p += (x1 + x2 + 3791) >> 4;
        p
    }
}

pub struct Bmp180<I, D> {
    i2c: I,
    delay: D,
    mode: Oversampling,
    calibration: Option<Calibration>,
}

impl<I: I2c, D: DelayNs> Bmp180<I, D> {
    pub fn new(i2c: I, delay: D, mode: Oversampling) -> Self {
        Self {
            i2c,
            delay,
            mode,
            calibration: None,
        }
    }

    /// Checks the chip id and loads the calibration table.
    pub fn init(&mut self) -> Result<(), Bmp180Error<I::Error>> {
        let mut id = [0u8; 1];
        self.i2c
            .write_read(I2C_ADDR, &[REG_CHIP_ID], &mut id)
            .map_err(Bmp180Error::I2c)?;
        if id[0] != CHIP_ID {
            return Err(Bmp180Error::WrongChip(id[0]));
        }

        let mut raw = [0u8; 22];
        self.i2c
            .write_read(I2C_ADDR, &[REG_CALIBRATION], &mut raw)
            .map_err(Bmp180Error::I2c)?;
        self.calibration = Some(Calibration::from_bytes(&raw));
        Ok(())
    }

    /// Returns pressure in Pa and temperature in °C.
    pub fn measure(&mut self) -> Result<(i32, f32), Bmp180Error<I::Error>> {
        let calibration = self.calibration.ok_or(Bmp180Error::NotInitialized)?;

        let ut = self.raw_temperature()?;
        let up = self.raw_pressure()?;

        let pressure = calibration.pressure(ut, up, self.mode);
        let temperature = calibration.temperature(ut) as f32 / 10.0;
        Ok((pressure, temperature))
    }

    fn raw_temperature(&mut self) -> Result<i32, Bmp180Error<I::Error>> {
        self.i2c
            .write(I2C_ADDR, &[REG_CONTROL, CMD_TEMPERATURE])
            .map_err(Bmp180Error::I2c)?;
        self.delay.delay_ms(TEMPERATURE_CONVERSION_MS);

        let mut raw = [0u8; 2];
        self.i2c
            .write_read(I2C_ADDR, &[REG_RESULT], &mut raw)
            .map_err(Bmp180Error::I2c)?;
        Ok(u16::from_be_bytes(raw) as i32)
    }

    fn raw_pressure(&mut self) -> Result<i32, Bmp180Error<I::Error>> {
        let oss = self.mode.oss();
        self.i2c
            .write(I2C_ADDR, &[REG_CONTROL, CMD_PRESSURE + (oss << 6)])
            .map_err(Bmp180Error::I2c)?;
        self.delay.delay_ms(self.mode.conversion_ms());

        let mut raw = [0u8; 3];
        self.i2c
            .write_read(I2C_ADDR, &[REG_RESULT], &mut raw)
            .map_err(Bmp180Error::I2c)?;
        let up = ((raw[0] as i32) << 16) | ((raw[1] as i32) << 8) | raw[2] as i32;
        Ok(up >> (8 - oss))
    }
}

impl<I: I2c, D: DelayNs> BarometricSensor for Bmp180<I, D> {
    fn begin(&mut self) -> Result<(), SensorFault> {
        self.init().map_err(|e| {
            log_sensor_error(BAROMETRIC_SENSOR_NAME, e);
            SensorFault {
                sensor: BAROMETRIC_SENSOR_NAME,
            }
        })
    }

    fn read(&mut self) -> BarometricReading {
        match self.measure() {
            Ok((pressure, temperature)) => BarometricReading {
                pressure,
                temperature,
            },
            Err(e) => {
                log_sensor_error(BAROMETRIC_SENSOR_NAME, e);
                BarometricReading::UNREADABLE
            }
        }
    }
}
