use crate::foundation::error::{MediaError, MediaResult};

/// Exact rational number used for frame rates, time bases and aspect ratios.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Rational {
    /// Numerator.
    pub num: i32,
    /// Denominator.
    pub den: i32,
}

impl Rational {
    /// Build a rational without validation.
    pub const fn new(num: i32, den: i32) -> Self {
        Self { num, den }
    }

    /// Build a strictly positive rational, rejecting zero or negative parts.
    pub fn positive(num: i32, den: i32) -> MediaResult<Self> {
        if num <= 0 || den <= 0 {
            return Err(MediaError::validation(format!(
                "rational {num}/{den} must have positive numerator and denominator"
            )));
        }
        Ok(Self { num, den })
    }

    /// `true` when both parts are non-zero and share a sign.
    pub fn is_valid_positive(self) -> bool {
        self.num > 0 && self.den > 0
    }

    /// Multiplicative inverse (`den/num`).
    pub fn invert(self) -> Self {
        Self {
            num: self.den,
            den: self.num,
        }
    }

    /// Floating point value; `0.0` when the denominator is zero.
    pub fn as_f64(self) -> f64 {
        if self.den == 0 {
            return 0.0;
        }
        f64::from(self.num) / f64::from(self.den)
    }
}

impl Default for Rational {
    fn default() -> Self {
        Self { num: 1, den: 1 }
    }
}

impl std::fmt::Display for Rational {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.num, self.den)
    }
}

impl From<ffmpeg_next::Rational> for Rational {
    fn from(value: ffmpeg_next::Rational) -> Self {
        Self {
            num: value.numerator(),
            den: value.denominator(),
        }
    }
}

impl From<Rational> for ffmpeg_next::Rational {
    fn from(value: Rational) -> Self {
        ffmpeg_next::Rational::new(value.num, value.den)
    }
}

/// Compute `round(value * num / den)` in exact integer arithmetic.
///
/// Rounds half away from zero. `den` must be non-zero.
pub(crate) fn mul_div_round(value: i128, num: i128, den: i128) -> i128 {
    debug_assert!(den != 0);
    let (n, d) = if den < 0 {
        (value * -num, -den)
    } else {
        (value * num, den)
    };
    if n >= 0 {
        (n + d / 2) / d
    } else {
        -((-n + d / 2) / d)
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
