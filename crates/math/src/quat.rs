use glam::{DMat3, DQuat, DVec3};

/// Identity rotation, `[1, 0, 0, 0]`.
pub const QI: DQuat = DQuat::IDENTITY;

/// Squared-norm deviation beyond which matrix conversion re-normalizes first.
const DRIFT_TOLERANCE: f64 = 1e-6;

/// Build a quaternion from `[w, x, y, z]`.
pub fn quat_from_wxyz([w, x, y, z]: [f64; 4]) -> DQuat {
    DQuat::from_xyzw(x, y, z, w)
}

/// Rotation of `angle` radians about `axis`. The axis is normalized here;
/// a zero-length axis yields identity whatever the angle.
pub fn from_axis_angle(axis: DVec3, angle: f64) -> DQuat {
    let len = axis.length();
    if len == 0.0 || !len.is_finite() {
        return QI;
    }
    let n = axis / len;
    let (s, c) = (angle * 0.5).sin_cos();
    DQuat::from_xyzw(n.x * s, n.y * s, n.z * s, c)
}

/// Normalized linear interpolation along the shorter path, returned in the
/// canonical hemisphere.
pub fn nlerp(a: DQuat, b: DQuat, t: f64) -> DQuat {
    let b = if a.dot(b) < 0.0 { -b } else { b };
    let out = DQuat::from_xyzw(
        a.x + (b.x - a.x) * t,
        a.y + (b.y - a.y) * t,
        a.z + (b.z - a.z) * t,
        a.w + (b.w - a.w) * t,
    );
    out.canonicalized()
}

/// Angular distance between two unit quaternions, insensitive to sign.
pub fn angle_between(a: DQuat, b: DQuat) -> f64 {
    2.0 * a.dot(b).abs().min(1.0).acos()
}

/// Quaternion operations with the engine's edge-case rules.
///
/// `*_in_place` methods mutate the receiver and return it; the others take
/// `self` by value and return a new quaternion. The Hamilton product itself
/// is glam's `a * b`.
pub trait QuatExt {
    fn to_wxyz(self) -> [f64; 4];
    /// `self = self * b`.
    fn mul_in_place(&mut self, b: DQuat) -> &mut Self;
    fn conjugate_in_place(&mut self) -> &mut Self;
    /// Unit length; a zero quaternion becomes identity.
    fn normalize_in_place(&mut self) -> &mut Self;
    /// Unit length and `w >= 0`. `w == 0` is already canonical.
    fn canonicalize_in_place(&mut self) -> &mut Self;
    /// `conj(q) / |q|²`; a zero quaternion is left unchanged.
    fn invert_in_place(&mut self) -> &mut Self;
    fn conjugated(self) -> Self;
    fn normalized_or_identity(self) -> Self;
    fn canonicalized(self) -> Self;
    fn inverted(self) -> Self;
    fn is_canonical(self) -> bool;
    /// Rotate `v` with `v + 2w(u×v) + 2u×(u×v)`, `u = (x, y, z)`.
    fn rotate(self, v: DVec3) -> DVec3;
    /// Row-major rotation matrix. Re-normalizes first when the input has drifted.
    fn to_rotation_rows(self) -> [[f64; 3]; 3];
    fn to_mat3(self) -> DMat3;
}

impl QuatExt for DQuat {
    fn to_wxyz(self) -> [f64; 4] {
        [self.w, self.x, self.y, self.z]
    }

    fn mul_in_place(&mut self, b: DQuat) -> &mut Self {
        let (aw, ax, ay, az) = (self.w, self.x, self.y, self.z);
        self.w = aw * b.w - ax * b.x - ay * b.y - az * b.z;
        self.x = aw * b.x + ax * b.w + ay * b.z - az * b.y;
        self.y = aw * b.y - ax * b.z + ay * b.w + az * b.x;
        self.z = aw * b.z + ax * b.y - ay * b.x + az * b.w;
        self
    }

    fn conjugate_in_place(&mut self) -> &mut Self {
        self.x = -self.x;
        self.y = -self.y;
        self.z = -self.z;
        self
    }

    fn normalize_in_place(&mut self) -> &mut Self {
        let n2 = self.length_squared();
        if n2 == 0.0 {
            *self = QI;
            return self;
        }
        let inv = 1.0 / n2.sqrt();
        *self = DQuat::from_xyzw(self.x * inv, self.y * inv, self.z * inv, self.w * inv);
        self
    }

    fn canonicalize_in_place(&mut self) -> &mut Self {
        let n2 = self.length_squared();
        if n2 == 0.0 {
            *self = QI;
            return self;
        }
        let sign = if self.w >= 0.0 { 1.0 } else { -1.0 };
        let inv = sign / n2.sqrt();
        *self = DQuat::from_xyzw(self.x * inv, self.y * inv, self.z * inv, self.w * inv);
        self
    }

    fn invert_in_place(&mut self) -> &mut Self {
        let n2 = self.length_squared();
        if n2 == 0.0 {
            return self;
        }
        let inv = 1.0 / n2;
        *self = DQuat::from_xyzw(-self.x * inv, -self.y * inv, -self.z * inv, self.w * inv);
        self
    }

    fn conjugated(mut self) -> Self {
        self.conjugate_in_place();
        self
    }

    fn normalized_or_identity(mut self) -> Self {
        self.normalize_in_place();
        self
    }

    fn canonicalized(mut self) -> Self {
        self.canonicalize_in_place();
        self
    }

    fn inverted(mut self) -> Self {
        self.invert_in_place();
        self
    }

    fn is_canonical(self) -> bool {
        self.w >= 0.0
    }

    fn rotate(self, v: DVec3) -> DVec3 {
        let u = DVec3::new(self.x, self.y, self.z);
        let uv = u.cross(v);
        let uuv = u.cross(uv);
        v + uv * (2.0 * self.w) + uuv * 2.0
    }

    fn to_rotation_rows(self) -> [[f64; 3]; 3] {
        let q = if (self.length_squared() - 1.0).abs() > DRIFT_TOLERANCE {
            self.normalized_or_identity()
        } else {
            self
        };
        let (w, x, y, z) = (q.w, q.x, q.y, q.z);
        let (xx, yy, zz) = (x * x, y * y, z * z);
        let (wx, wy, wz) = (w * x, w * y, w * z);
        let (xy, xz, yz) = (x * y, x * z, y * z);
        [
            [1.0 - 2.0 * (yy + zz), 2.0 * (xy - wz), 2.0 * (xz + wy)],
            [2.0 * (xy + wz), 1.0 - 2.0 * (xx + zz), 2.0 * (yz - wx)],
            [2.0 * (xz - wy), 2.0 * (yz + wx), 1.0 - 2.0 * (xx + yy)],
        ]
    }

    fn to_mat3(self) -> DMat3 {
        // glam is column-major; the rows become columns after the transpose.
        DMat3::from_cols_array_2d(&self.to_rotation_rows()).transpose()
    }
}
