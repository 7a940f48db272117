//! Coordinate input conversion.
//!
//! Coordinate setters accept anything that reads as a number. Values that do
//! not (free text, non-finite floats) convert to `None` and the setter leaves
//! the label alone.

/// Conversion into a finite coordinate value.
pub trait ToCoordinate {
    /// The coordinate, or `None` when the input is not numeric.
    fn to_coordinate(&self) -> Option<f64>;
}

macro_rules! lossless_coordinate {
    ($($ty:ty),*) => {
        $(
            impl ToCoordinate for $ty {
                fn to_coordinate(&self) -> Option<f64> {
                    Some(f64::from(*self))
                }
            }
        )*
    };
}

lossless_coordinate!(i8, i16, i32, u8, u16, u32, f32);

macro_rules! wide_coordinate {
    ($($ty:ty),*) => {
        $(
            impl ToCoordinate for $ty {
                fn to_coordinate(&self) -> Option<f64> {
                    Some(*self as f64)
                }
            }
        )*
    };
}

wide_coordinate!(i64, u64, isize, usize);

impl ToCoordinate for f64 {
    fn to_coordinate(&self) -> Option<f64> {
        self.is_finite().then_some(*self)
    }
}

impl ToCoordinate for str {
    fn to_coordinate(&self) -> Option<f64> {
        parse_numeric(self)
    }
}

impl ToCoordinate for String {
    fn to_coordinate(&self) -> Option<f64> {
        parse_numeric(self)
    }
}

impl<T: ToCoordinate + ?Sized> ToCoordinate for &T {
    fn to_coordinate(&self) -> Option<f64> {
        (**self).to_coordinate()
    }
}

impl<T: ToCoordinate> ToCoordinate for Option<T> {
    fn to_coordinate(&self) -> Option<f64> {
        self.as_ref().and_then(ToCoordinate::to_coordinate)
    }
}

/// Parse a decimal numeric string: `[ws][sign]digits[.digits][e[sign]digits][ws]`.
///
/// At least one mantissa digit is required. Words such as `inf` or `nan` and
/// hexadecimal forms are not numeric.
pub fn parse_numeric(input: &str) -> Option<f64> {
    let trimmed = input.trim();
    let bytes = trimmed.as_bytes();
    let mut i = 0;

    if matches!(bytes.first(), Some(b'+' | b'-')) {
        i += 1;
    }

    let int_start = i;
    while i < bytes.len() && bytes[i].is_ascii_digit() {
        i += 1;
    }
    let mut mantissa_digits = i - int_start;

    if i < bytes.len() && bytes[i] == b'.' {
        i += 1;
        let frac_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        mantissa_digits += i - frac_start;
    }

    if mantissa_digits == 0 {
        return None;
    }

    if i < bytes.len() && matches!(bytes[i], b'e' | b'E') {
        i += 1;
        if matches!(bytes.get(i), Some(b'+' | b'-')) {
            i += 1;
        }
        let exp_start = i;
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == exp_start {
            return None;
        }
    }

    if i != bytes.len() {
        return None;
    }

    trimmed
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
}
