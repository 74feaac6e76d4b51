use glam::DVec3;

/// Clamp `x` to `[a, b]`. Assumes `a <= b`.
pub fn clamp(x: f64, a: f64, b: f64) -> f64 {
    if x < a {
        a
    } else if x > b {
        b
    } else {
        x
    }
}

/// Clamp `x` to `[-1, 1]`, e.g. before `acos`.
pub fn clamp_unit(x: f64) -> f64 {
    clamp(x, -1.0, 1.0)
}

/// In-place vector operations.
///
/// Each method mutates the receiver and returns it so calls chain. The
/// allocating forms are glam's own operators (`a + b`, `a - b`, `a * s`,
/// `a.dot(b)`, `a.cross(b)`) plus [`Vec3Ext::normalized_or_self`].
pub trait Vec3Ext {
    fn add_in_place(&mut self, b: DVec3) -> &mut Self;
    fn sub_in_place(&mut self, b: DVec3) -> &mut Self;
    fn scale_in_place(&mut self, s: f64) -> &mut Self;
    /// `self = self × b` (right-handed).
    fn cross_in_place(&mut self, b: DVec3) -> &mut Self;
    /// Normalize to unit length; a zero vector is left unchanged.
    fn normalize_in_place(&mut self) -> &mut Self;
    fn zero_in_place(&mut self) -> &mut Self;
    /// Allocating counterpart of [`Vec3Ext::normalize_in_place`].
    fn normalized_or_self(self) -> Self;
}

impl Vec3Ext for DVec3 {
    fn add_in_place(&mut self, b: DVec3) -> &mut Self {
        self.x += b.x;
        self.y += b.y;
        self.z += b.z;
        self
    }

    fn sub_in_place(&mut self, b: DVec3) -> &mut Self {
        self.x -= b.x;
        self.y -= b.y;
        self.z -= b.z;
        self
    }

    fn scale_in_place(&mut self, s: f64) -> &mut Self {
        self.x *= s;
        self.y *= s;
        self.z *= s;
        self
    }

    fn cross_in_place(&mut self, b: DVec3) -> &mut Self {
        *self = DVec3::new(
            self.y * b.z - self.z * b.y,
            self.z * b.x - self.x * b.z,
            self.x * b.y - self.y * b.x,
        );
        self
    }

    fn normalize_in_place(&mut self) -> &mut Self {
        let len = self.length();
        if len == 0.0 {
            return self;
        }
        self.scale_in_place(1.0 / len)
    }

    fn zero_in_place(&mut self) -> &mut Self {
        *self = DVec3::ZERO;
        self
    }

    fn normalized_or_self(mut self) -> Self {
        self.normalize_in_place();
        self
    }
}
