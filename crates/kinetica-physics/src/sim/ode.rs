//! ODE interface and the fixed-step Runge-Kutta integrator.

use crate::error::SimResult;

/// A system of first-order ordinary differential equations over an indexed
/// variable vector.
///
/// `evaluate` must write time derivatives into `change` and nothing else: it
/// may sync internal object state from `vars` for force computation, but the
/// authoritative variable values belong to the caller.
pub trait DiffEq {
    /// Number of state variables.
    fn num_vars(&self) -> usize;

    /// Current variable values, in index order.
    fn var_values(&self) -> &[f64];

    /// Overwrites the variable values as a continuous change.
    fn set_var_values(&mut self, values: &[f64]);

    /// Writes the time derivative of every variable into `change`.
    ///
    /// `dt` is the offset from the step start at which `vars` is being
    /// evaluated; fixed-step integrators pass their substep offsets.
    fn evaluate(&mut self, vars: &[f64], change: &mut [f64], dt: f64) -> SimResult<()>;
}

/// Classic fourth-order Runge-Kutta with fixed step size.
///
/// All work buffers are owned by the integrator and grown once; stepping
/// performs no allocation after the first call at a given size.
#[derive(Debug, Default)]
pub struct RungeKutta {
    y0: Vec<f64>,
    k1: Vec<f64>,
    k2: Vec<f64>,
    k3: Vec<f64>,
    k4: Vec<f64>,
    temp: Vec<f64>,
}

impl RungeKutta {
    /// Creates an integrator.
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_capacity(&mut self, n: usize) {
        for buf in [
            &mut self.y0,
            &mut self.k1,
            &mut self.k2,
            &mut self.k3,
            &mut self.k4,
            &mut self.temp,
        ] {
            buf.resize(n, 0.0);
        }
    }

    /// Advances the system by `dt`.
    pub fn step(&mut self, diffeq: &mut dyn DiffEq, dt: f64) -> SimResult<()> {
        let n = diffeq.num_vars();
        self.ensure_capacity(n);
        self.y0.copy_from_slice(diffeq.var_values());

        diffeq.evaluate(&self.y0, &mut self.k1, 0.0)?;
        for i in 0..n {
            self.temp[i] = self.y0[i] + 0.5 * dt * self.k1[i];
        }
        diffeq.evaluate(&self.temp, &mut self.k2, dt / 2.0)?;
        for i in 0..n {
            self.temp[i] = self.y0[i] + 0.5 * dt * self.k2[i];
        }
        diffeq.evaluate(&self.temp, &mut self.k3, dt / 2.0)?;
        for i in 0..n {
            self.temp[i] = self.y0[i] + dt * self.k3[i];
        }
        diffeq.evaluate(&self.temp, &mut self.k4, dt)?;

        for i in 0..n {
            self.temp[i] = self.y0[i]
                + dt / 6.0 * (self.k1[i] + 2.0 * self.k2[i] + 2.0 * self.k3[i] + self.k4[i]);
        }
        diffeq.set_var_values(&self.temp);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Harmonic oscillator: x'' = -x, energy-conserving test system.
    struct Oscillator {
        vars: Vec<f64>,
    }

    impl DiffEq for Oscillator {
        fn num_vars(&self) -> usize {
            2
        }
        fn var_values(&self) -> &[f64] {
            &self.vars
        }
        fn set_var_values(&mut self, values: &[f64]) {
            self.vars.copy_from_slice(values);
        }
        fn evaluate(&mut self, vars: &[f64], change: &mut [f64], _dt: f64) -> SimResult<()> {
            change[0] = vars[1];
            change[1] = -vars[0];
            Ok(())
        }
    }

    #[test]
    fn test_rk4_oscillator_accuracy() {
        let mut sys = Oscillator {
            vars: vec![1.0, 0.0],
        };
        let mut rk = RungeKutta::new();
        let dt = 0.01;
        let steps = (std::f64::consts::PI / dt) as usize;
        for _ in 0..steps {
            rk.step(&mut sys, dt).unwrap();
        }
        // After time ~pi the oscillator reaches x = -1, v = 0.
        let t = steps as f64 * dt;
        assert_relative_eq!(sys.vars[0], t.cos(), epsilon = 1e-8);
        assert_relative_eq!(sys.vars[1], -t.sin(), epsilon = 1e-8);
    }

    #[test]
    fn test_rk4_exact_for_constant_acceleration() {
        // Free fall: quadratic solutions are integrated exactly by RK4.
        struct Fall {
            vars: Vec<f64>,
        }
        impl DiffEq for Fall {
            fn num_vars(&self) -> usize {
                2
            }
            fn var_values(&self) -> &[f64] {
                &self.vars
            }
            fn set_var_values(&mut self, values: &[f64]) {
                self.vars.copy_from_slice(values);
            }
            fn evaluate(&mut self, vars: &[f64], change: &mut [f64], _dt: f64) -> SimResult<()> {
                change[0] = vars[1];
                change[1] = -10.0;
                Ok(())
            }
        }
        let mut sys = Fall {
            vars: vec![1.0, 0.0],
        };
        let mut rk = RungeKutta::new();
        for _ in 0..100 {
            rk.step(&mut sys, 0.01).unwrap();
        }
        // y = 1 - 5 t^2 at t = 1.
        assert_relative_eq!(sys.vars[0], -4.0, epsilon = 1e-10);
        assert_relative_eq!(sys.vars[1], -10.0, epsilon = 1e-10);
    }
}
