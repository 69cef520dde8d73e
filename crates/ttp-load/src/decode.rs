//! Text decoding with encoding detection.
//!
//! Documents may arrive as UTF-8 (with or without BOM), UTF-16 or UTF-32
//! in either byte order. A BOM decides when present; otherwise the
//! position of zero bytes among the first four bytes does, since a JSON
//! document starts with an ASCII character.

use crate::error::{LoadError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Encoding {
    Utf8,
    Utf16Le,
    Utf16Be,
    Utf32Le,
    Utf32Be,
}

impl Encoding {
    fn name(self) -> &'static str {
        match self {
            Encoding::Utf8 => "UTF-8",
            Encoding::Utf16Le => "UTF-16LE",
            Encoding::Utf16Be => "UTF-16BE",
            Encoding::Utf32Le => "UTF-32LE",
            Encoding::Utf32Be => "UTF-32BE",
        }
    }
}

/// Detect the encoding and the BOM length to skip.
fn detect(bytes: &[u8]) -> (Encoding, usize) {
    match bytes {
        [0xef, 0xbb, 0xbf, ..] => (Encoding::Utf8, 3),
        [0xff, 0xfe, 0x00, 0x00, ..] => (Encoding::Utf32Le, 4),
        [0x00, 0x00, 0xfe, 0xff, ..] => (Encoding::Utf32Be, 4),
        [0xff, 0xfe, ..] => (Encoding::Utf16Le, 2),
        [0xfe, 0xff, ..] => (Encoding::Utf16Be, 2),
        [0x00, 0x00, 0x00, _, ..] => (Encoding::Utf32Be, 0),
        [_, 0x00, 0x00, 0x00, ..] => (Encoding::Utf32Le, 0),
        [0x00, _, 0x00, _, ..] | [0x00, _] => (Encoding::Utf16Be, 0),
        [_, 0x00, _, 0x00, ..] | [_, 0x00] => (Encoding::Utf16Le, 0),
        _ => (Encoding::Utf8, 0),
    }
}

/// Decode document bytes to a string.
pub fn decode_text(bytes: &[u8]) -> Result<String> {
    let (encoding, bom) = detect(bytes);
    let body = &bytes[bom..];
    match encoding {
        Encoding::Utf8 => String::from_utf8(body.to_vec()).map_err(|e| LoadError::Decode {
            encoding: encoding.name(),
            detail: e.to_string(),
        }),
        Encoding::Utf16Le | Encoding::Utf16Be => {
            let units = code_units::<2>(body, encoding)?;
            let units: Vec<u16> = units
                .into_iter()
                .map(|b| match encoding {
                    Encoding::Utf16Le => u16::from_le_bytes(b),
                    _ => u16::from_be_bytes(b),
                })
                .collect();
            char::decode_utf16(units)
                .collect::<std::result::Result<String, _>>()
                .map_err(|e| LoadError::Decode {
                    encoding: encoding.name(),
                    detail: e.to_string(),
                })
        }
        Encoding::Utf32Le | Encoding::Utf32Be => {
            let units = code_units::<4>(body, encoding)?;
            units
                .into_iter()
                .map(|b| {
                    let scalar = match encoding {
                        Encoding::Utf32Le => u32::from_le_bytes(b),
                        _ => u32::from_be_bytes(b),
                    };
                    char::from_u32(scalar).ok_or_else(|| LoadError::Decode {
                        encoding: encoding.name(),
                        detail: format!("invalid scalar value {scalar:#x}"),
                    })
                })
                .collect()
        }
    }
}

fn code_units<const N: usize>(body: &[u8], encoding: Encoding) -> Result<Vec<[u8; N]>> {
    if body.len() % N != 0 {
        return Err(LoadError::Truncated {
            encoding: encoding.name(),
            len: body.len(),
            unit: N,
        });
    }
    Ok(body
        .chunks_exact(N)
        .map(|chunk| {
            let mut unit = [0u8; N];
            unit.copy_from_slice(chunk);
            unit
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = "{\"tables\": []}";

    fn utf16(text: &str, le: bool, bom: bool) -> Vec<u8> {
        let mut out = Vec::new();
        if bom {
            out.extend_from_slice(if le { &[0xffu8, 0xfe][..] } else { &[0xfeu8, 0xff][..] });
        }
        for unit in text.encode_utf16() {
            out.extend_from_slice(&if le { unit.to_le_bytes() } else { unit.to_be_bytes() });
        }
        out
    }

    fn utf32(text: &str, le: bool) -> Vec<u8> {
        text.chars()
            .flat_map(|c| {
                let v = c as u32;
                if le {
                    v.to_le_bytes()
                } else {
                    v.to_be_bytes()
                }
            })
            .collect()
    }

    #[test]
    fn plain_and_bom_utf8() {
        assert_eq!(decode_text(DOC.as_bytes()).unwrap(), DOC);
        let mut with_bom = vec![0xef, 0xbb, 0xbf];
        with_bom.extend_from_slice(DOC.as_bytes());
        assert_eq!(decode_text(&with_bom).unwrap(), DOC);
    }

    #[test]
    fn utf16_both_orders() {
        assert_eq!(decode_text(&utf16(DOC, true, true)).unwrap(), DOC);
        assert_eq!(decode_text(&utf16(DOC, false, true)).unwrap(), DOC);
        assert_eq!(decode_text(&utf16(DOC, true, false)).unwrap(), DOC);
        assert_eq!(decode_text(&utf16(DOC, false, false)).unwrap(), DOC);
    }

    #[test]
    fn utf32_by_zero_pattern() {
        assert_eq!(decode_text(&utf32(DOC, true)).unwrap(), DOC);
        assert_eq!(decode_text(&utf32(DOC, false)).unwrap(), DOC);
    }

    #[test]
    fn odd_utf16_is_truncated() {
        let mut bytes = utf16(DOC, true, true);
        bytes.push(0x20);
        assert!(matches!(
            decode_text(&bytes),
            Err(LoadError::Truncated { unit: 2, .. })
        ));
    }

    #[test]
    fn invalid_utf8_reported() {
        let err = decode_text(&[b'{', 0xc3, 0x28, b'}']).unwrap_err();
        assert!(err.to_string().starts_with("invalid UTF-8 text"));
    }
}
