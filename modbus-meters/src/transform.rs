use crate::codec::{Decode, Encode, Quantity, Word};
use crate::error::Result;

/// How raw register words are interpreted before scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Decoder {
    /// One word, signed 16-bit integer.
    Int16,
    /// Two words, signed 32-bit integer sent low word first.
    Int32Swapped,
    /// Two words, IEEE-754 single precision in big-endian word order.
    Float32,
}

impl Decoder {
    /// Number of register words consumed.
    pub fn word_size(&self) -> Quantity {
        match self {
            Decoder::Int16 => 1,
            Decoder::Int32Swapped | Decoder::Float32 => 2,
        }
    }

    fn decode(&self, words: &[Word]) -> Result<f64> {
        let value = match self {
            Decoder::Int16 => i16::from_be_words(words)? as f64,
            Decoder::Int32Swapped => i32::from_le_words(words)? as f64,
            Decoder::Float32 => f32::from_be_words(words)? as f64,
        };
        Ok(value)
    }

    fn encode(&self, value: f64) -> Vec<Word> {
        match self {
            Decoder::Int16 => (value.round() as i16).to_be_words(),
            Decoder::Int32Swapped => (value.round() as i32).to_le_words(),
            Decoder::Float32 => (value as f32).to_be_words(),
        }
    }
}

/// Converts raw register words into a physical value.
///
/// A transform is a [`Decoder`] optionally followed by a division through a fixed
/// scale factor, e.g. `10.0` for a register holding tenths of a volt.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    decoder: Decoder,
    divisor: Option<f64>,
}

impl Transform {
    pub const INT16: Transform = Transform::new(Decoder::Int16);
    pub const INT32_SWAPPED: Transform = Transform::new(Decoder::Int32Swapped);
    pub const FLOAT32: Transform = Transform::new(Decoder::Float32);

    /// Unscaled transform.
    pub const fn new(decoder: Decoder) -> Self {
        Self {
            decoder,
            divisor: None,
        }
    }

    /// Same decoder, result divided by `divisor`.
    pub const fn scaled(self, divisor: f64) -> Self {
        Self {
            decoder: self.decoder,
            divisor: Some(divisor),
        }
    }

    pub fn decoder(&self) -> Decoder {
        self.decoder
    }

    pub fn divisor(&self) -> Option<f64> {
        self.divisor
    }

    pub fn word_size(&self) -> Quantity {
        self.decoder.word_size()
    }

    /// Decode `words` and apply the scale factor.
    ///
    /// Fails with [`crate::Error::WordCount`] unless exactly [`Self::word_size`] words are given.
    pub fn apply(&self, words: &[Word]) -> Result<f64> {
        let value = self.decoder.decode(words)?;
        Ok(match self.divisor {
            Some(divisor) => value / divisor,
            None => value,
        })
    }

    /// Inverse of [`Self::apply`], rounding to the register resolution.
    pub fn encode(&self, value: f64) -> Vec<Word> {
        let raw = match self.divisor {
            Some(divisor) => value * divisor,
            None => value,
        };
        self.decoder.encode(raw)
    }
}

impl From<Decoder> for Transform {
    fn from(decoder: Decoder) -> Self {
        Transform::new(decoder)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn test_int32_swapped_word_order() {
        // EM24: 230.5 V is stored as 2305 = 0x0901, low word first.
        let words = [0x0901, 0x0000];
        assert_eq!(Transform::INT32_SWAPPED.apply(&words).unwrap(), 2305.0);
        assert_eq!(
            Transform::INT32_SWAPPED.scaled(10.0).apply(&words).unwrap(),
            230.5
        );

        // [A, B] => A + (B << 16), independent of magnitude.
        let (a, b) = (0x1234u16, 0x0056u16);
        let expected = (a as i64 + ((b as i64) << 16)) as f64;
        assert_eq!(Transform::INT32_SWAPPED.apply(&[a, b]).unwrap(), expected);
    }

    #[test]
    fn test_int32_swapped_negative() {
        // -1500 W of exported power
        let words = (-1500i32).to_le_words();
        assert_eq!(words, vec![0xFA24, 0xFFFF]);
        assert_eq!(
            Transform::INT32_SWAPPED.scaled(10.0).apply(&words).unwrap(),
            -150.0
        );
    }

    #[test]
    fn test_scaling_law() {
        for (raw, divisor) in [(1000i32, 1000.0), (12345, 10.0), (-7, 100.0), (0, 1.0)] {
            let words = raw.to_le_words();
            let decoded = Transform::INT32_SWAPPED.apply(&words).unwrap();
            let scaled = Transform::INT32_SWAPPED.scaled(divisor).apply(&words).unwrap();
            assert_eq!(scaled, decoded / divisor);
            assert_eq!(scaled, raw as f64 / divisor);
        }
    }

    #[test]
    fn test_int16() {
        assert_eq!(Transform::INT16.scaled(1000.0).apply(&[985]).unwrap(), 0.985);
        assert_eq!(Transform::INT16.apply(&[0xFFFF]).unwrap(), -1.0);
        assert_eq!(Transform::INT16.word_size(), 1);
    }

    #[test]
    fn test_float32() {
        let transform = Transform::FLOAT32;
        let words = 229.75f32.to_be_words();
        assert_eq!(transform.apply(&words).unwrap(), 229.75);
        assert_eq!(transform.divisor(), None);
    }

    #[test]
    fn test_word_count_must_match() {
        let err = Transform::INT32_SWAPPED.apply(&[1]).unwrap_err();
        assert!(matches!(
            err,
            Error::WordCount {
                expected: 2,
                actual: 1
            }
        ));
        assert!(Transform::INT16.apply(&[1, 2]).is_err());
    }

    #[test]
    fn test_encode_inverts_apply() {
        let transform = Transform::INT32_SWAPPED.scaled(1000.0);
        let words = transform.encode(4.321);
        assert_eq!(transform.apply(&words).unwrap(), 4.321);
    }
}
