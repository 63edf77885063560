pub use tokio_modbus::{Address, Quantity};

/// 16-bit value stored in Modbus register.
pub type Word = u16;

/// The number of words handed to a decoder does not match the width of the target type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordsCountError {
    pub expected: usize,
    pub actual: usize,
}

/// Decode a value from Big or Little Endian-ordered `Word`s.
///
/// Little Endian word order means the least significant word comes first on the wire,
/// which is what meter datasheets usually call a "word swapped" value.
/// Bytes inside each word are always big-endian.
pub trait Decode: Sized {
    fn from_be_words(words: &[Word]) -> Result<Self, WordsCountError>;
    fn from_le_words(words: &[Word]) -> Result<Self, WordsCountError>;
}

macro_rules! impl_decode {
    ($num_type:ty) => {
        impl Decode for $num_type {
            fn from_be_words(words: &[Word]) -> Result<Self, WordsCountError> {
                let bytes = words
                    .iter()
                    .copied()
                    .flat_map(u16::to_be_bytes)
                    .collect::<Vec<u8>>();
                let array = bytes.try_into().or(Err(WordsCountError {
                    expected: std::mem::size_of::<$num_type>() / 2,
                    actual: words.len(),
                }))?;
                Ok(<$num_type>::from_be_bytes(array))
            }
            fn from_le_words(words: &[Word]) -> Result<Self, WordsCountError> {
                let reversed = words.iter().rev().copied().collect::<Vec<Word>>();
                Self::from_be_words(&reversed)
            }
        }
    };
}

impl_decode!(i16);
impl_decode!(i32);
impl_decode!(i64);
impl_decode!(u16);
impl_decode!(u32);
impl_decode!(u64);
impl_decode!(f32);
impl_decode!(f64);

/// Encode a value into Big or Little Endian-ordered `Word`s.
pub trait Encode {
    fn to_be_words(self) -> Vec<Word>;
    fn to_le_words(self) -> Vec<Word>;
}

macro_rules! impl_encode {
    ($num_type:ty) => {
        impl Encode for $num_type {
            fn to_be_words(self) -> Vec<Word> {
                self.to_be_bytes()
                    .chunks_exact(2)
                    .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
                    .collect()
            }
            fn to_le_words(self) -> Vec<Word> {
                let mut words = self.to_be_words();
                words.reverse();
                words
            }
        }
    };
}

impl_encode!(i16);
impl_encode!(i32);
impl_encode!(i64);
impl_encode!(u16);
impl_encode!(u32);
impl_encode!(u64);
impl_encode!(f32);
impl_encode!(f64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_be_words() {
        assert_eq!(u32::from_be_words(&[0x0001, 0x0002]).unwrap(), 0x0001_0002);
        assert_eq!(i16::from_be_words(&[0xFFFF]).unwrap(), -1);

        let value = f32::from_be_words(&[0x42F6, 0xE979]).unwrap();
        assert!((value - 123.456).abs() < 0.001);
    }

    #[test]
    fn test_le_words_swap_word_order() {
        assert_eq!(u32::from_le_words(&[0x0001, 0x0002]).unwrap(), 0x0002_0001);
        assert_eq!(i32::from_le_words(&[0xFFFE, 0xFFFF]).unwrap(), -2);
        assert_eq!(0x0002_0001u32.to_le_words(), vec![0x0001, 0x0002]);
    }

    #[test]
    fn test_wrong_word_count() {
        assert_eq!(
            i32::from_be_words(&[0x0001]),
            Err(WordsCountError {
                expected: 2,
                actual: 1
            })
        );
        assert!(i16::from_le_words(&[1, 2]).is_err());
    }
}
