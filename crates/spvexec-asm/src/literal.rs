//! Literal parsing and encoding shared by the assembler and the binary inspector.

/// Numeric type of a context-dependent literal (the result type of `OpConstant`, or the selector
/// type of `OpSwitch`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericType {
    Int { width: u32, signed: bool },
    Float { width: u32 },
}

impl NumericType {
    pub fn width(self) -> u32 {
        match self {
            Self::Int { width, .. } | Self::Float { width } => width,
        }
    }

    /// Number of literal words occupied by a value of this type.
    pub fn word_count(self) -> usize {
        if self.width() > 32 {
            2
        } else {
            1
        }
    }
}

/// Encodes a literal string: UTF-8 bytes, NUL terminated, zero padded to a word boundary, packed
/// little-endian (first byte in the lowest-order bits).
pub fn encode_string(s: &str) -> Vec<u32> {
    let bytes = s.as_bytes();
    let word_count = bytes.len() / 4 + 1;
    let mut words = vec![0u32; word_count];
    for (i, b) in bytes.iter().enumerate() {
        words[i / 4] |= u32::from(*b) << ((i % 4) * 8);
    }
    words
}

/// Decodes a literal string from the start of `words`, returning the string and the number of
/// words it occupied. Returns `None` if no NUL terminator is found or the bytes are not UTF-8.
pub fn decode_string(words: &[u32]) -> Option<(String, usize)> {
    let mut bytes = Vec::new();
    for (idx, word) in words.iter().enumerate() {
        for shift in [0u32, 8, 16, 24] {
            let b = ((word >> shift) & 0xff) as u8;
            if b == 0 {
                let s = String::from_utf8(bytes).ok()?;
                return Some((s, idx + 1));
            }
            bytes.push(b);
        }
    }
    None
}

fn split_sign(text: &str) -> (bool, &str) {
    if let Some(rest) = text.strip_prefix('-') {
        (true, rest)
    } else if let Some(rest) = text.strip_prefix('+') {
        (false, rest)
    } else {
        (false, text)
    }
}

fn hex_digits(text: &str) -> Option<&str> {
    text.strip_prefix("0x").or_else(|| text.strip_prefix("0X"))
}

/// Parses an unsigned 32-bit literal operand (decimal or `0x` hex).
pub fn parse_u32(text: &str) -> Result<u32, String> {
    let parsed = match hex_digits(text) {
        Some(digits) => u32::from_str_radix(digits, 16),
        None => text.parse::<u32>(),
    };
    parsed.map_err(|_| format!("expected an unsigned 32-bit integer literal, got {text:?}"))
}

fn parse_integer_magnitude(text: &str) -> Result<(u128, bool), String> {
    match hex_digits(text) {
        Some(digits) if !digits.is_empty() => u128::from_str_radix(digits, 16)
            .map(|v| (v, true))
            .map_err(|_| format!("invalid hex integer literal {text:?}")),
        Some(_) => Err(format!("invalid hex integer literal {text:?}")),
        None => text
            .parse::<u128>()
            .map(|v| (v, false))
            .map_err(|_| format!("invalid integer literal {text:?}")),
    }
}

/// Parses `text` as a value of `ty` and returns its literal words.
pub fn parse_typed_literal(text: &str, ty: NumericType) -> Result<Vec<u32>, String> {
    match ty {
        NumericType::Int { width, signed } => parse_int_literal(text, width, signed),
        NumericType::Float { width } => parse_float_literal(text, width),
    }
}

fn parse_int_literal(text: &str, width: u32, signed: bool) -> Result<Vec<u32>, String> {
    if !matches!(width, 8 | 16 | 32 | 64) {
        return Err(format!("unsupported integer width {width}"));
    }
    let (negative, digits) = split_sign(text);
    let (magnitude, is_hex) = parse_integer_magnitude(digits)?;
    let mask: u128 = (1u128 << width) - 1;

    let bits: u128 = if negative {
        if !signed {
            return Err(format!(
                "negative literal {text:?} for unsigned {width}-bit integer"
            ));
        }
        let limit = 1u128 << (width - 1);
        if magnitude > limit {
            return Err(format!("literal {text:?} out of range for i{width}"));
        }
        (magnitude.wrapping_neg()) & mask
    } else {
        // Hex literals spell a raw bit pattern and may use the full width even for signed types.
        let limit = if signed && !is_hex {
            (1u128 << (width - 1)) - 1
        } else {
            mask
        };
        if magnitude > limit {
            let kind = if signed { 'i' } else { 'u' };
            return Err(format!("literal {text:?} out of range for {kind}{width}"));
        }
        magnitude
    };

    Ok(match width {
        64 => vec![bits as u32, (bits >> 32) as u32],
        32 => vec![bits as u32],
        narrow => {
            let value = bits as u32;
            let sign_bit = 1u32 << (narrow - 1);
            if signed && value & sign_bit != 0 {
                // Narrow signed literals are sign-extended to fill the word.
                vec![value | !((1u32 << narrow) - 1)]
            } else {
                vec![value]
            }
        }
    })
}

/// Parses a C99-style hexadecimal float (`0x1.8p+3`), returning the exact value as `f64` when the
/// mantissa fits.
pub fn parse_hex_float(text: &str) -> Option<f64> {
    let (negative, rest) = split_sign(text);
    let body = hex_digits(rest)?;
    let (mantissa_text, exponent) = match body.find(['p', 'P']) {
        Some(idx) => (&body[..idx], body[idx + 1..].parse::<i32>().ok()?),
        None => (body, 0),
    };
    let (int_part, frac_part) = match mantissa_text.split_once('.') {
        Some((i, f)) => (i, f),
        None => (mantissa_text, ""),
    };
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }

    let mut mantissa: u64 = 0;
    let mut scale: i32 = 0;
    for c in int_part.chars() {
        let digit = c.to_digit(16)?;
        if mantissa >> 56 != 0 {
            // Drop precision beyond 64 bits by shifting the exponent instead.
            scale += 4;
            continue;
        }
        mantissa = (mantissa << 4) | u64::from(digit);
    }
    for c in frac_part.chars() {
        let digit = c.to_digit(16)?;
        if mantissa >> 56 != 0 {
            continue;
        }
        mantissa = (mantissa << 4) | u64::from(digit);
        scale -= 4;
    }

    let value = (mantissa as f64) * 2f64.powi(exponent + scale);
    Some(if negative { -value } else { value })
}

fn parse_f64(text: &str) -> Result<f64, String> {
    if let Some(value) = parse_hex_float(text) {
        return Ok(value);
    }
    text.parse::<f64>()
        .map_err(|_| format!("invalid floating-point literal {text:?}"))
}

fn parse_float_literal(text: &str, width: u32) -> Result<Vec<u32>, String> {
    match width {
        16 => {
            let value = parse_f64(text)?;
            Ok(vec![u32::from(half::f16::from_f64(value).to_bits())])
        }
        32 => {
            // Parse decimal text directly as f32 so the rounding is correct.
            let value = if hex_digits(split_sign(text).1).is_some() {
                parse_f64(text)? as f32
            } else {
                text.parse::<f32>()
                    .map_err(|_| format!("invalid floating-point literal {text:?}"))?
            };
            Ok(vec![value.to_bits()])
        }
        64 => {
            let bits = parse_f64(text)?.to_bits();
            Ok(vec![bits as u32, (bits >> 32) as u32])
        }
        other => Err(format!("unsupported float width {other}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const I32: NumericType = NumericType::Int {
        width: 32,
        signed: true,
    };
    const U8: NumericType = NumericType::Int {
        width: 8,
        signed: false,
    };
    const I16: NumericType = NumericType::Int {
        width: 16,
        signed: true,
    };

    #[test]
    fn strings_are_nul_terminated_and_padded() {
        assert_eq!(encode_string(""), vec![0]);
        assert_eq!(encode_string("abc"), vec![0x0063_6261]);
        assert_eq!(encode_string("abcd"), vec![0x6463_6261, 0]);
        let (decoded, used) = decode_string(&encode_string("GLSL.std.450")).unwrap();
        assert_eq!(decoded, "GLSL.std.450");
        assert_eq!(used, 4);
    }

    #[test]
    fn negative_narrow_ints_are_sign_extended() {
        assert_eq!(parse_typed_literal("-1", I16).unwrap(), vec![0xffff_ffff]);
        assert_eq!(parse_typed_literal("-2", I32).unwrap(), vec![0xffff_fffe]);
        assert_eq!(parse_typed_literal("255", U8).unwrap(), vec![0xff]);
        assert!(parse_typed_literal("256", U8).is_err());
        assert!(parse_typed_literal("-1", U8).is_err());
    }

    #[test]
    fn hex_bit_patterns_are_accepted_for_signed_types() {
        assert_eq!(parse_typed_literal("0x80000000", I32).unwrap(), vec![0x8000_0000]);
        assert!(parse_typed_literal("2147483648", I32).is_err());
    }

    #[test]
    fn sixty_four_bit_literals_use_two_words_low_first() {
        let ty = NumericType::Int {
            width: 64,
            signed: false,
        };
        assert_eq!(
            parse_typed_literal("0x1122334455667788", ty).unwrap(),
            vec![0x5566_7788, 0x1122_3344]
        );
    }

    #[test]
    fn floats_parse_decimal_and_hex() {
        let f32_ty = NumericType::Float { width: 32 };
        assert_eq!(
            parse_typed_literal("1.5", f32_ty).unwrap(),
            vec![1.5f32.to_bits()]
        );
        assert_eq!(
            parse_typed_literal("-0x1.8p+1", f32_ty).unwrap(),
            vec![(-3.0f32).to_bits()]
        );
        assert_eq!(
            parse_typed_literal("0x1p-149", f32_ty).unwrap(),
            vec![1]
        );
        let f16_ty = NumericType::Float { width: 16 };
        assert_eq!(parse_typed_literal("1.0", f16_ty).unwrap(), vec![0x3c00]);
    }
}
