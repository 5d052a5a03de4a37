//! Internal code-point encoding untuk string dan text
//!
//! ```text
//! 0xxxxxxx                      < 0x80      (7 bit)
//! 10xxxxxx xxxxxxxx             < 0x4000    (14 bit)
//! 110xxxxx xxxxxxxx xxxxxxxx    <= 0x10FFFF (21 bit)
//! 111.....                      bukan code point (text reference)
//! ```

use crate::error::{JbError, Result};

/// Lead-in prefix untuk reference di dalam text
pub const TEXT_REF_PREFIX: u8 = 0b1110_0000;

#[inline(always)]
pub fn encoded_len(cp: u32) -> usize {
    if cp < 0x80 {
        1
    } else if cp < 0x4000 {
        2
    } else {
        3
    }
}

/// Tulis `cp` ke `out`, return jumlah byte. `out` minimal 3 byte.
#[inline(always)]
pub fn encode(cp: u32, out: &mut [u8]) -> usize {
    if cp < 0x80 {
        out[0] = cp as u8;
        1
    } else if cp < 0x4000 {
        out[0] = 0x80 | (cp >> 8) as u8;
        out[1] = cp as u8;
        2
    } else {
        out[0] = 0xC0 | ((cp >> 16) & 0x1F) as u8;
        out[1] = (cp >> 8) as u8;
        out[2] = cp as u8;
        3
    }
}

#[inline(always)]
pub fn is_text_ref(lead: u8) -> bool {
    lead & 0b1110_0000 == TEXT_REF_PREFIX
}

/// Decode satu code point di `pos`, bounds-check terhadap `end`.
/// Return `(char, byte_len)`.
pub fn decode(buf: &[u8], pos: usize, end: usize) -> Result<(char, usize)> {
    let lead = *buf.get(pos).filter(|_| pos < end).ok_or(JbError::UnexpectedEof {
        offset: pos,
        needed: 1,
        end,
    })?;
    let (cp, len) = if lead & 0x80 == 0 {
        (lead as u32, 1)
    } else if lead & 0xC0 == 0x80 {
        check(pos, 2, end)?;
        ((((lead & 0x3F) as u32) << 8) | buf[pos + 1] as u32, 2)
    } else if lead & 0xE0 == 0xC0 {
        check(pos, 3, end)?;
        (
            (((lead & 0x1F) as u32) << 16) | ((buf[pos + 1] as u32) << 8) | buf[pos + 2] as u32,
            3,
        )
    } else {
        return Err(JbError::malformed(pos, "reference inside string content"));
    };
    let c = char::from_u32(cp)
        .ok_or_else(|| JbError::malformed(pos, format!("invalid code point {cp:#x}")))?;
    Ok((c, len))
}

#[inline(always)]
fn check(pos: usize, needed: usize, end: usize) -> Result<()> {
    if pos + needed > end {
        return Err(JbError::UnexpectedEof {
            offset: pos,
            needed,
            end,
        });
    }
    Ok(())
}

/// Gabungkan surrogate pair UTF-16 menjadi `char`, error jika tidak berpasangan.
pub fn decode_utf16(units: &[u16]) -> Result<Vec<char>> {
    let mut chars = Vec::with_capacity(units.len());
    let mut position = 0;
    for c in char::decode_utf16(units.iter().copied()) {
        match c {
            Ok(c) => {
                position += c.len_utf16();
                chars.push(c);
            }
            Err(_) => return Err(JbError::InvalidSurrogate { position }),
        }
    }
    Ok(chars)
}

/// Karakter kata untuk text compression: huruf ASCII atau colon
#[inline(always)]
pub fn is_word_char(c: char) -> bool {
    c.is_ascii_alphabetic() || c == ':'
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_decode_boundaries() {
        let mut out = [0u8; 3];
        for cp in [0u32, 0x7F, 0x80, 0x3FFF, 0x4000, 0xFFFF, 0x1F600, 0x10FFFF] {
            let len = encode(cp, &mut out);
            assert_eq!(len, encoded_len(cp));
            let (c, decoded_len) = decode(&out, 0, len).unwrap();
            assert_eq!(c as u32, cp);
            assert_eq!(decoded_len, len);
        }
    }

    #[test]
    fn test_decode_truncated() {
        let mut out = [0u8; 3];
        let len = encode(0x1F600, &mut out);
        assert_eq!(len, 3);
        assert!(matches!(
            decode(&out, 0, 2),
            Err(JbError::UnexpectedEof { needed: 3, .. })
        ));
    }

    #[test]
    fn test_decode_rejects_surrogate_code_point() {
        let mut out = [0u8; 3];
        let len = encode(0xD800, &mut out);
        assert!(decode(&out, 0, len).unwrap_err().is_malformed());
    }

    #[test]
    fn test_decode_utf16() {
        let units: Vec<u16> = "a😀b".encode_utf16().collect();
        assert_eq!(decode_utf16(&units).unwrap(), vec!['a', '😀', 'b']);

        let broken = [0x61u16, 0xD83D, 0x62];
        assert_eq!(
            decode_utf16(&broken),
            Err(JbError::InvalidSurrogate { position: 1 })
        );
    }
}
