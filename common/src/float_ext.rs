pub trait FloatExt {
    fn approximately_eq(self, other: Self) -> bool;

    /// Finite and not subnormal. Zero counts as normal here.
    fn is_usable(self) -> bool;
}

impl FloatExt for f32 {
    fn approximately_eq(self, other: Self) -> bool {
        (self - other).abs() < crate::EPSILON as f32
    }

    fn is_usable(self) -> bool {
        self == 0.0 || self.is_normal()
    }
}

impl FloatExt for f64 {
    fn approximately_eq(self, other: Self) -> bool {
        (self - other).abs() < crate::EPSILON
    }

    fn is_usable(self) -> bool {
        self == 0.0 || self.is_normal()
    }
}
