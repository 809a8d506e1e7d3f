//! Untyped per-hit scalar plus the type tag that travels with its container.
//!
//! Every hit in an event is one of `{u64, i64, f64}`. Rather than paying a
//! discriminant per hit, the scalar is a bare 64-bit pattern and the type tag
//! lives once on the owning container (a `Value` or an input buffer). This
//! keeps hit buffers flat `[u64]`-shaped memory, which matters because every
//! event copies thousands of them.

/// Type tag for a hit buffer. `None` marks a container that has not carried
/// data yet; it is invalid for arithmetic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum SigType {
    #[default]
    None,
    U64,
    I64,
    F64,
}

impl SigType {
    /// Integer types get exact-bin treatment in the axis fitter.
    #[inline]
    pub fn is_int(self) -> bool {
        matches!(self, SigType::U64 | SigType::I64)
    }
}

/// One hit: a 64-bit pattern interpreted through the container's `SigType`.
///
/// `Copy` and 8 bytes, so hit vectors are plain contiguous memory.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Scalar(u64);

impl Scalar {
    #[inline]
    pub fn from_u64(v: u64) -> Self {
        Scalar(v)
    }

    #[inline]
    pub fn from_i64(v: i64) -> Self {
        Scalar(v as u64)
    }

    #[inline]
    pub fn from_f64(v: f64) -> Self {
        Scalar(v.to_bits())
    }

    #[inline]
    pub fn u64(self) -> u64 {
        self.0
    }

    #[inline]
    pub fn i64(self) -> i64 {
        self.0 as i64
    }

    #[inline]
    pub fn f64(self) -> f64 {
        f64::from_bits(self.0)
    }

    /// Widens to `f64` under the given tag. Unsigned stays unsigned.
    #[inline]
    pub fn as_f64(self, ty: SigType) -> f64 {
        match ty {
            SigType::U64 => self.u64() as f64,
            SigType::I64 => self.i64() as f64,
            SigType::F64 => self.f64(),
            SigType::None => f64::NAN,
        }
    }

    /// Widens to `f64`, reinterpreting a U64 bit pattern as i64 first.
    ///
    /// Detector words are often raw register reads where "unsigned" is an
    /// accident of the transport; arithmetic nodes ask for the signed view.
    #[inline]
    pub fn as_f64_signed(self, ty: SigType) -> f64 {
        match ty {
            SigType::U64 => self.i64() as f64,
            SigType::I64 => self.i64() as f64,
            SigType::F64 => self.f64(),
            SigType::None => f64::NAN,
        }
    }

    /// NaN/Inf filter for float buffers; integers are always finite.
    #[inline]
    pub fn is_finite(self, ty: SigType) -> bool {
        match ty {
            SigType::F64 => self.f64().is_finite(),
            _ => true,
        }
    }
}
