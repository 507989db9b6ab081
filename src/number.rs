//! Parsing of JSON number literals into Rust number types
//!
//! The reader validates the shape of number literals itself while peeking;
//! the functions here convert already validated literal text. The integer
//! parsers accumulate in the negative range so that `i32::MIN` / `i64::MIN`,
//! whose absolute values are not representable, parse without overflow.

/// Reason why a number literal could not be converted
#[derive(PartialEq, Eq, Clone, Copy, Debug)]
pub(crate) enum NumberError {
    /// Value does not fit the requested integer type
    Overflow,
    /// Text is not a plain integer respectively not a valid double
    Malformed,
    /// Double value is NaN or infinite, which strict mode forbids
    NonFinite,
}

duplicate::duplicate! {
    [
        fn_name       int_type;
        [ parse_i32 ] [ i32 ];
        [ parse_i64 ] [ i64 ];
    ]
    /// Parses an optionally signed decimal integer literal
    pub(crate) fn fn_name(text: &str) -> Result<int_type, NumberError> {
        let bytes = text.as_bytes();
        let negative = bytes.first() == Some(&b'-');
        let digits = if negative { &bytes[1..] } else { bytes };
        if digits.is_empty() {
            return Err(NumberError::Malformed);
        }

        // `limit` is the most negative acceptable accumulator value;
        // for positive numbers the final negation must not reach `MIN`
        let limit: int_type = if negative { int_type::MIN } else { -int_type::MAX };
        let mut value: int_type = 0;
        for &byte in digits {
            if !byte.is_ascii_digit() {
                return Err(NumberError::Malformed);
            }
            let digit = (byte - b'0') as int_type;
            if value < int_type::MIN / 10 {
                // Multiplying would overflow
                return Err(NumberError::Overflow);
            }
            value *= 10;
            if value < limit + digit {
                return Err(NumberError::Overflow);
            }
            value -= digit;
        }
        Ok(if negative { value } else { -value })
    }
}

/// Parses a double literal; NaN and infinities are only permitted when
/// `allow_non_finite` is set
pub(crate) fn parse_f64(text: &str, allow_non_finite: bool) -> Result<f64, NumberError> {
    let value: f64 = text.parse().map_err(|_| NumberError::Malformed)?;
    if !allow_non_finite && !value.is_finite() {
        return Err(NumberError::NonFinite);
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_int() {
        assert_eq!(Ok(0), parse_i32("0"));
        assert_eq!(Ok(123), parse_i32("123"));
        assert_eq!(Ok(-123), parse_i32("-123"));
        assert_eq!(Ok(i32::MAX), parse_i32("2147483647"));
        assert_eq!(Ok(i32::MIN), parse_i32("-2147483648"));

        assert_eq!(Err(NumberError::Overflow), parse_i32("2147483648"));
        assert_eq!(Err(NumberError::Overflow), parse_i32("-2147483649"));
        assert_eq!(Err(NumberError::Overflow), parse_i32("99999999999"));
        assert_eq!(Err(NumberError::Malformed), parse_i32(""));
        assert_eq!(Err(NumberError::Malformed), parse_i32("-"));
        assert_eq!(Err(NumberError::Malformed), parse_i32("1.5"));
        assert_eq!(Err(NumberError::Malformed), parse_i32("1e2"));
    }

    #[test]
    fn parse_long() {
        assert_eq!(Ok(i64::MAX), parse_i64("9223372036854775807"));
        assert_eq!(Ok(i64::MIN), parse_i64("-9223372036854775808"));

        assert_eq!(Err(NumberError::Overflow), parse_i64("9223372036854775808"));
        assert_eq!(Err(NumberError::Overflow), parse_i64("-9223372036854775809"));
        assert_eq!(
            Err(NumberError::Overflow),
            parse_i64("123456789012345678901234567890")
        );
    }

    #[test]
    fn parse_double() {
        assert_eq!(Ok(123.4e+10), parse_f64("123.4e+10", false));
        assert_eq!(Ok(-0.5), parse_f64("-0.5", false));

        assert_eq!(Err(NumberError::NonFinite), parse_f64("NaN", false));
        assert_eq!(Err(NumberError::NonFinite), parse_f64("Infinity", false));
        assert_eq!(Err(NumberError::NonFinite), parse_f64("-Infinity", false));
        assert_eq!(true, parse_f64("NaN", true).is_ok_and(f64::is_nan));
        assert_eq!(Ok(f64::INFINITY), parse_f64("Infinity", true));

        assert_eq!(Err(NumberError::Malformed), parse_f64("true", false));
        assert_eq!(Err(NumberError::Malformed), parse_f64("", false));
    }
}
