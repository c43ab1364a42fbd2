//! Base62 positional codec between numeric ids and short codes.

use crate::error::CodecError;
use crate::shortcode::ShortCode;

/// Symbols in ascending digit order: digits, lowercase, uppercase.
pub const ALPHABET: &[u8; 62] = b"0123456789abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ";

const BASE: u64 = ALPHABET.len() as u64;

/// Longest encoding of a `u64` (`u64::MAX` is 11 base62 digits).
pub const MAX_ENCODED_LEN: usize = 11;

/// Encodes `id` as a base62 string. `encode(0)` is `"0"`.
pub fn encode(mut id: u64) -> String {
    if id == 0 {
        return char::from(ALPHABET[0]).to_string();
    }

    let mut digits = Vec::with_capacity(MAX_ENCODED_LEN);
    while id > 0 {
        digits.push(ALPHABET[(id % BASE) as usize]);
        id /= BASE;
    }
    digits.reverse();

    // Every byte comes from ALPHABET, which is ASCII.
    digits.into_iter().map(char::from).collect()
}

/// Decodes a base62 string produced by [`encode`].
pub fn decode(code: &str) -> Result<u64, CodecError> {
    if code.is_empty() {
        return Err(CodecError::Empty);
    }

    code.chars().try_fold(0u64, |acc, c| {
        let digit = digit_value(c).ok_or(CodecError::InvalidCharacter(c))?;
        acc.checked_mul(BASE)
            .and_then(|shifted| shifted.checked_add(digit))
            .ok_or(CodecError::Overflow)
    })
}

fn digit_value(c: char) -> Option<u64> {
    let value = match c {
        '0'..='9' => c as u64 - '0' as u64,
        'a'..='z' => c as u64 - 'a' as u64 + 10,
        'A'..='Z' => c as u64 - 'A' as u64 + 36,
        _ => return None,
    };
    Some(value)
}

/// Returns `true` if every character of `code` belongs to the alphabet.
pub fn is_alphabet(code: &str) -> bool {
    code.chars().all(|c| digit_value(c).is_some())
}

/// Constant added to store ids before encoding so that external codes never
/// reveal small sequence numbers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct IdOffset(u64);

impl IdOffset {
    pub const fn new(offset: u64) -> Self {
        Self(offset)
    }

    pub const fn get(self) -> u64 {
        self.0
    }

    /// Encodes `id + offset`.
    pub fn to_code(self, id: u64) -> Result<ShortCode, CodecError> {
        let shifted = id.checked_add(self.0).ok_or(CodecError::Overflow)?;
        Ok(ShortCode::from_encoded(encode(shifted)))
    }

    /// Decodes `code` and removes the offset.
    ///
    /// Returns `Ok(None)` when the decoded value lies below the offset, which
    /// no id produced by [`IdOffset::to_code`] can do.
    pub fn to_id(self, code: &ShortCode) -> Result<Option<u64>, CodecError> {
        let value = decode(code.as_str())?;
        Ok(value.checked_sub(self.0))
    }
}

impl From<u64> for IdOffset {
    fn from(offset: u64) -> Self {
        Self(offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_zero_is_first_symbol() {
        assert_eq!(encode(0), "0");
    }

    #[test]
    fn encode_known_values() {
        assert_eq!(encode(9), "9");
        assert_eq!(encode(10), "a");
        assert_eq!(encode(35), "z");
        assert_eq!(encode(36), "A");
        assert_eq!(encode(61), "Z");
        assert_eq!(encode(62), "10");
        assert_eq!(encode(1001), "g9");
        assert_eq!(encode(u64::MAX), "lYGhA16ahyf");
    }

    #[test]
    fn decode_inverts_encode() {
        let samples = [
            0,
            1,
            61,
            62,
            3843,
            3844,
            1_000_001,
            u64::from(u32::MAX),
            u64::MAX - 1,
            u64::MAX,
        ];
        for id in samples {
            assert_eq!(decode(&encode(id)).unwrap(), id, "id {id}");
        }

        // Walk the range with a large odd stride to cover every digit length.
        let mut id = 0u64;
        while let Some(next) = id.checked_add(0x0123_4567_89ab_cdef) {
            assert_eq!(decode(&encode(id)).unwrap(), id);
            id = next;
        }
    }

    #[test]
    fn encoded_length_is_bounded() {
        assert_eq!(encode(u64::MAX).len(), MAX_ENCODED_LEN);
    }

    #[test]
    fn decode_rejects_empty() {
        assert_eq!(decode(""), Err(CodecError::Empty));
    }

    #[test]
    fn decode_rejects_foreign_characters() {
        assert_eq!(decode("ab-c"), Err(CodecError::InvalidCharacter('-')));
        assert_eq!(decode("é"), Err(CodecError::InvalidCharacter('é')));
    }

    #[test]
    fn decode_rejects_overflow() {
        assert_eq!(decode("lYGhA16ahyg"), Err(CodecError::Overflow));
        assert_eq!(decode("ZZZZZZZZZZZZ"), Err(CodecError::Overflow));
    }

    #[test]
    fn offset_shifts_both_ways() {
        let offset = IdOffset::new(1000);
        let code = offset.to_code(1).unwrap();
        assert_eq!(code.as_str(), encode(1001));
        assert_eq!(offset.to_id(&code).unwrap(), Some(1));
    }

    #[test]
    fn offset_rejects_overflow() {
        let offset = IdOffset::new(u64::MAX);
        assert_eq!(offset.to_code(1), Err(CodecError::Overflow));
    }

    #[test]
    fn offset_treats_codes_below_offset_as_unknown() {
        let offset = IdOffset::new(1000);
        let code = ShortCode::new("g8").unwrap();
        assert_eq!(decode("g8").unwrap(), 1000);
        assert_eq!(offset.to_id(&code).unwrap(), Some(0));

        let small = ShortCode::new("a").unwrap();
        assert_eq!(offset.to_id(&small).unwrap(), None);
    }
}
