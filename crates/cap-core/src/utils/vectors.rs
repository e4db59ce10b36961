use std::{fmt::Display, iter::Sum};

use auto_ops::{impl_op_ex, impl_op_ex_commutative};
use serde::{Deserialize, Serialize};

/// Pseudorapidity assigned to vectors along the beam axis.
const BEAM_AXIS_ETA: f64 = 10e10;

/// A three-vector of `f64` components.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec3 {
    /// The $`x`$ component.
    pub x: f64,
    /// The $`y`$ component.
    pub y: f64,
    /// The $`z`$ component.
    pub z: f64,
}

impl Vec3 {
    /// Create a new three-vector.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
    /// Treat this vector as a three-momentum and attach the energy of a particle of the given
    /// mass.
    pub fn with_mass(&self, mass: f64) -> Vec4 {
        let e = (mass.powi(2) + self.mag2()).sqrt();
        Vec4::new(self.x, self.y, self.z, e)
    }
    /// Treat this vector as a three-momentum with the given energy.
    pub fn with_energy(&self, energy: f64) -> Vec4 {
        Vec4::new(self.x, self.y, self.z, energy)
    }
    pub fn dot(&self, other: &Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }
    pub fn cross(&self, other: &Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }
    pub fn mag2(&self) -> f64 {
        self.dot(self)
    }
    pub fn mag(&self) -> f64 {
        self.mag2().sqrt()
    }
    /// Magnitude of the transverse ($`xy`$) projection.
    pub fn perp(&self) -> f64 {
        self.x.hypot(self.y)
    }
    pub fn costheta(&self) -> f64 {
        self.z / self.mag()
    }
    pub fn theta(&self) -> f64 {
        self.costheta().acos()
    }
    /// Azimuthal angle in $`(-\pi, \pi]`$.
    pub fn phi(&self) -> f64 {
        self.y.atan2(self.x)
    }
    pub fn unit(&self) -> Self {
        let mag = self.mag();
        Self::new(self.x / mag, self.y / mag, self.z / mag)
    }
}

impl_op_ex!(+ |a: &Vec3, b: &Vec3| -> Vec3 { Vec3::new(a.x + b.x, a.y + b.y, a.z + b.z) });
impl_op_ex!(-|a: &Vec3, b: &Vec3| -> Vec3 { Vec3::new(a.x - b.x, a.y - b.y, a.z - b.z) });
impl_op_ex!(-|a: &Vec3| -> Vec3 { Vec3::new(-a.x, -a.y, -a.z) });
impl_op_ex_commutative!(*|a: &Vec3, b: &f64| -> Vec3 { Vec3::new(a.x * b, a.y * b, a.z * b) });
impl_op_ex!(/ |a: &Vec3, b: &f64| -> Vec3 { Vec3::new(a.x / b, a.y / b, a.z / b) });

/// A four-vector $`(p_x, p_y, p_z, E)`$, usually a four-momentum.
#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Vec4 {
    pub px: f64,
    pub py: f64,
    pub pz: f64,
    pub e: f64,
}

impl Vec4 {
    /// Create a new four-vector.
    pub const fn new(px: f64, py: f64, pz: f64, e: f64) -> Self {
        Self { px, py, pz, e }
    }
    /// The spatial part of the vector.
    pub fn vec3(&self) -> Vec3 {
        Vec3::new(self.px, self.py, self.pz)
    }
    pub fn beta(&self) -> Vec3 {
        self.vec3() / self.e
    }
    pub fn gamma(&self) -> f64 {
        self.e / self.mag()
    }
    pub fn mag2(&self) -> f64 {
        self.e * self.e - self.vec3().mag2()
    }
    pub fn mag(&self) -> f64 {
        self.mag2().sqrt()
    }
    /// Magnitude of the three-momentum.
    pub fn p(&self) -> f64 {
        self.vec3().mag()
    }
    /// Transverse momentum.
    pub fn pt(&self) -> f64 {
        self.px.hypot(self.py)
    }
    /// Azimuthal angle in $`(-\pi, \pi]`$.
    pub fn phi(&self) -> f64 {
        self.vec3().phi()
    }
    /// Pseudorapidity $`\eta = -\ln\tan(\theta/2)`$.
    ///
    /// # Notes
    ///
    /// Vectors along the beam axis return $`\pm 10^{11}`$ and a null vector returns zero.
    pub fn eta(&self) -> f64 {
        let p = self.p();
        let cos_theta = if p == 0.0 { 1.0 } else { self.pz / p };
        if cos_theta * cos_theta < 1.0 {
            -0.5 * ((1.0 - cos_theta) / (1.0 + cos_theta)).ln()
        } else if self.pz == 0.0 {
            0.0
        } else if self.pz > 0.0 {
            BEAM_AXIS_ETA
        } else {
            -BEAM_AXIS_ETA
        }
    }
    /// Rapidity $`y = \frac{1}{2}\ln\frac{E + p_z}{E - p_z}`$.
    pub fn rapidity(&self) -> f64 {
        0.5 * ((self.e + self.pz) / (self.e - self.pz)).ln()
    }
    /// Boost the vector by the velocity `beta`.
    pub fn boost(&self, beta: &Vec3) -> Self {
        let b2 = beta.mag2();
        if b2 == 0.0 {
            return *self;
        }
        let gamma = 1.0 / (1.0 - b2).sqrt();
        let bp = beta.dot(&self.vec3());
        let p3 = self.vec3() + beta * ((gamma - 1.0) * bp / b2 + gamma * self.e);
        p3.with_energy(gamma * (self.e + bp))
    }
    /// A compact human-readable form.
    pub fn to_p4_string(&self) -> String {
        format!(
            "[e = {:.5}; p = ({:.5}, {:.5}, {:.5}); m = {:.5}]",
            self.e,
            self.px,
            self.py,
            self.pz,
            self.mag()
        )
    }
}

impl Display for Vec4 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_p4_string())
    }
}

impl_op_ex!(+ |a: &Vec4, b: &Vec4| -> Vec4 { Vec4::new(a.px + b.px, a.py + b.py, a.pz + b.pz, a.e + b.e) });
impl_op_ex!(-|a: &Vec4, b: &Vec4| -> Vec4 { Vec4::new(a.px - b.px, a.py - b.py, a.pz - b.pz, a.e - b.e) });
impl_op_ex!(-|a: &Vec4| -> Vec4 { Vec4::new(-a.px, -a.py, -a.pz, -a.e) });

impl Sum for Vec4 {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Vec4::default(), |acc, p4| acc + p4)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn test_three_to_four_momentum_conversion() {
        let p3 = Vec3::new(1.0, 2.0, 3.0);
        let target_p4 = Vec4::new(1.0, 2.0, 3.0, 10.0);
        let p4_from_mass = p3.with_mass(target_p4.mag());
        assert_relative_eq!(target_p4.e, p4_from_mass.e);
        assert_relative_eq!(target_p4.px, p4_from_mass.px);
        assert_eq!(p3.with_energy(10.0), target_p4);
    }

    #[test]
    fn test_four_momentum_basics() {
        let p = Vec4::new(3.0, 4.0, 5.0, 10.0);
        assert_relative_eq!(p.pt(), 5.0);
        assert_relative_eq!(p.p(), 50.0_f64.sqrt());
        assert_relative_eq!(p.mag2(), 50.0);
        assert_relative_eq!(p.gamma(), 2.0_f64.sqrt());
        assert_relative_eq!(p.phi(), 4.0_f64.atan2(3.0));
        assert_relative_eq!(p.rapidity(), 0.5 * (15.0_f64 / 5.0).ln());
        let cos_theta = 5.0 / 50.0_f64.sqrt();
        assert_relative_eq!(p.eta(), -0.5 * ((1.0 - cos_theta) / (1.0 + cos_theta)).ln());
    }

    #[test]
    fn test_eta_along_beam() {
        assert_eq!(Vec4::new(0.0, 0.0, 2.0, 3.0).eta(), 10e10);
        assert_eq!(Vec4::new(0.0, 0.0, -2.0, 3.0).eta(), -10e10);
        assert_eq!(Vec4::default().eta(), 0.0);
    }

    #[test]
    fn test_boost_com() {
        let p = Vec4::new(3.0, 4.0, 5.0, 10.0);
        let zero = p.boost(&-p.beta()).vec3();
        assert_relative_eq!(zero.x, 0.0, epsilon = 1e-12);
        assert_relative_eq!(zero.y, 0.0, epsilon = 1e-12);
        assert_relative_eq!(zero.z, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_boost() {
        let pa = Vec4::new(3.0, 4.0, 5.0, 10.0);
        let pb = Vec4::new(3.4, 2.3, 1.2, 9.0);
        let boosted = pa.boost(&-pb.beta());
        assert_relative_eq!(boosted.e, 8.157632144622882, epsilon = 1e-12);
        assert_relative_eq!(boosted.px, -0.6489200627053444, epsilon = 1e-12);
        assert_relative_eq!(boosted.py, 1.5316128987581492, epsilon = 1e-12);
        assert_relative_eq!(boosted.pz, 3.712145860221643, epsilon = 1e-12);
    }

    #[test]
    fn test_vec_sums() {
        let total: Vec4 = [Vec4::new(1.0, 0.0, 0.0, 2.0), Vec4::new(0.0, 1.0, 0.0, 2.0)]
            .into_iter()
            .sum();
        assert_eq!(total, Vec4::new(1.0, 1.0, 0.0, 4.0));
        let a = Vec3::new(1.0, 2.0, 3.0);
        let b = Vec3::new(4.0, 5.0, 6.0);
        assert_eq!(a + b, Vec3::new(5.0, 7.0, 9.0));
        assert_eq!(a.cross(&b), Vec3::new(-3.0, 6.0, -3.0));
    }
}
