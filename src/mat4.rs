// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright © 2021 Adrian <adrian.eddy at gmail>

//! 4x4 homogeneous matrices in column-major order (same layout as GL uniforms).

pub const DEG_TO_RAD: f64 = std::f64::consts::PI / 180.0;

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct Mat4(pub [f32; 16]);

impl Mat4 {
    pub const IDENTITY: Mat4 = Mat4([
        1.0, 0.0, 0.0, 0.0,
        0.0, 1.0, 0.0, 0.0,
        0.0, 0.0, 1.0, 0.0,
        0.0, 0.0, 0.0, 1.0,
    ]);
    pub const ZERO: Mat4 = Mat4([0.0; 16]);

    pub fn as_array(&self) -> &[f32; 16] {
        &self.0
    }
    /// Element at `row`, `col`.
    pub fn at(&self, row: usize, col: usize) -> f32 {
        self.0[col * 4 + row]
    }
    pub fn is_zero(&self) -> bool {
        self.0.iter().all(|v| *v == 0.0)
    }
}

impl Default for Mat4 {
    fn default() -> Self { Self::IDENTITY }
}

impl std::ops::Mul for Mat4 {
    type Output = Mat4;
    fn mul(self, rhs: Mat4) -> Mat4 { mul(&self, &rhs) }
}

/// Rotation about the Y axis.
pub fn yaw(angle: f32) -> Mat4 {
    let (s, c) = angle.sin_cos();
    Mat4([
        c,   0.0, -s,  0.0,
        0.0, 1.0, 0.0, 0.0,
        s,   0.0, c,   0.0,
        0.0, 0.0, 0.0, 1.0,
    ])
}

/// Rotation about the X axis.
pub fn pitch(angle: f32) -> Mat4 {
    let (s, c) = angle.sin_cos();
    Mat4([
        1.0, 0.0, 0.0, 0.0,
        0.0, c,   s,   0.0,
        0.0, -s,  c,   0.0,
        0.0, 0.0, 0.0, 1.0,
    ])
}

/// Rotation about the Z axis.
pub fn roll(angle: f32) -> Mat4 {
    let (s, c) = angle.sin_cos();
    Mat4([
        c,   s,   0.0, 0.0,
        -s,  c,   0.0, 0.0,
        0.0, 0.0, 1.0, 0.0,
        0.0, 0.0, 0.0, 1.0,
    ])
}

/// `a * b`, so `b` is applied to a vector first.
pub fn mul(a: &Mat4, b: &Mat4) -> Mat4 {
    let (a, b) = (&a.0, &b.0);
    let mut out = [0f32; 16];
    for col in 0..4 {
        for row in 0..4 {
            out[col * 4 + row] = a[row]      * b[col * 4]
                               + a[4 + row]  * b[col * 4 + 1]
                               + a[8 + row]  * b[col * 4 + 2]
                               + a[12 + row] * b[col * 4 + 3];
        }
    }
    Mat4(out)
}

/// General inverse by cofactor expansion.
///
/// A singular matrix (determinant exactly 0) gives [`Mat4::ZERO`] instead of an error,
/// so callers have to check [`Mat4::is_zero`] if they care.
pub fn inv(m: &Mat4) -> Mat4 {
    let a = &m.0;
    let (a00, a10, a20, a30) = (a[0], a[4], a[8],  a[12]);
    let (a01, a11, a21, a31) = (a[1], a[5], a[9],  a[13]);
    let (a02, a12, a22, a32) = (a[2], a[6], a[10], a[14]);
    let (a03, a13, a23, a33) = (a[3], a[7], a[11], a[15]);

    let s0 = a00 * a11 - a10 * a01;
    let s1 = a00 * a12 - a10 * a02;
    let s2 = a00 * a13 - a10 * a03;
    let s3 = a01 * a12 - a11 * a02;
    let s4 = a01 * a13 - a11 * a03;
    let s5 = a02 * a13 - a12 * a03;

    let c5 = a22 * a33 - a32 * a23;
    let c4 = a21 * a33 - a31 * a23;
    let c3 = a21 * a32 - a31 * a22;
    let c2 = a20 * a33 - a30 * a23;
    let c1 = a20 * a32 - a30 * a22;
    let c0 = a20 * a31 - a30 * a21;

    let det = s0 * c5 - s1 * c4 + s2 * c3 + s3 * c2 - s4 * c1 + s5 * c0;
    if det == 0.0 {
        log::debug!("Singular matrix: {:?}", a);
        return Mat4::ZERO;
    }
    let d = 1.0 / det;

    Mat4([
        ( a11 * c5 - a12 * c4 + a13 * c3) * d,
        (-a01 * c5 + a02 * c4 - a03 * c3) * d,
        ( a31 * s5 - a32 * s4 + a33 * s3) * d,
        (-a21 * s5 + a22 * s4 - a23 * s3) * d,

        (-a10 * c5 + a12 * c2 - a13 * c1) * d,
        ( a00 * c5 - a02 * c2 + a03 * c1) * d,
        (-a30 * s5 + a32 * s2 - a33 * s1) * d,
        ( a20 * s5 - a22 * s2 + a23 * s1) * d,

        ( a10 * c4 - a11 * c2 + a13 * c0) * d,
        (-a00 * c4 + a01 * c2 - a03 * c0) * d,
        ( a30 * s4 - a31 * s2 + a33 * s0) * d,
        (-a20 * s4 + a21 * s2 - a23 * s0) * d,

        (-a10 * c3 + a11 * c1 - a12 * c0) * d,
        ( a00 * c3 - a01 * c1 + a02 * c0) * d,
        (-a30 * s3 + a31 * s1 - a32 * s0) * d,
        ( a20 * s3 - a21 * s1 + a22 * s0) * d,
    ])
}

/// Rotation from device orientation angles in radians (alpha about Z, beta about X, gamma about Y).
///
/// This is the closed form of the intrinsic Z-X'-Y'' rotation, not a product of
/// [`yaw`], [`pitch`] and [`roll`] (those use different axis conventions).
pub fn device_orientation(alpha: f32, beta: f32, gamma: f32) -> Mat4 {
    let (sx, cx) = beta.sin_cos();
    let (sy, cy) = gamma.sin_cos();
    let (sz, cz) = alpha.sin_cos();

    Mat4([
        cz * cy - sz * sx * sy,  cy * sz + cz * sx * sy,  -cx * sy, 0.0,
        -cx * sz,                cz * cx,                 sx,       0.0,
        cy * sz * sx + cz * sy,  sz * sy - cz * cy * sx,  cx * cy,  0.0,
        0.0,                     0.0,                     0.0,      1.0,
    ])
}

/// Copy of `m` with the translation column zeroed.
pub fn clear_translate(m: &Mat4) -> Mat4 {
    let mut out = *m;
    out.0[12] = 0.0;
    out.0[13] = 0.0;
    out.0[14] = 0.0;
    out
}

/// `m * v` for a homogeneous vector.
pub fn transform(m: &Mat4, v: [f32; 4]) -> [f32; 4] {
    let a = &m.0;
    let mut out = [0f32; 4];
    for (row, o) in out.iter_mut().enumerate() {
        *o = a[row] * v[0] + a[4 + row] * v[1] + a[8 + row] * v[2] + a[12 + row] * v[3];
    }
    out
}
