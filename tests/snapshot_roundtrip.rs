use approx::assert_relative_eq;

use hysim::{
    convergence::{NormDispIncr, Verdict},
    error::IntegratorError,
    integrator::{hybrid::HybridSimulation, Newmark},
    prelude::*,
    state::State,
    system::{EquationSystem, TangentCoeffs},
};

/// Single-DOF Duffing oscillator: m*a + k*u + k3*u^3 = 0.
struct Duffing {
    m: f64,
    k: f64,
    k3: f64,
}

impl EquationSystem for Duffing {
    fn num_active_dofs(&self) -> usize {
        1
    }
    fn form_tangent(&mut self, coeffs: &TangentCoeffs, state: &State) -> MatrixD {
        let kt = self.k + 3. * self.k3 * state.u[0] * state.u[0];
        MatrixD::from_element(1, 1, coeffs.c_m * self.m + coeffs.c_k * kt)
    }
    fn form_residual(&mut self, state: &State) -> VectorD {
        let u = state.u[0];
        VectorD::from_element(1, -(self.m * state.a[0] + self.k * u + self.k3 * u * u * u))
    }
    fn solve(&mut self, tangent: &MatrixD, residual: &VectorD) -> Result<VectorD, IntegratorError> {
        tangent
            .clone()
            .lu()
            .solve(residual)
            .ok_or(IntegratorError::SingularSystem)
    }
}

fn duffing() -> Duffing {
    Duffing {
        m: 1.,
        k: 100.,
        k3: 500.,
    }
}

fn prepared_solver(sys: &Duffing) -> HybridSimulation {
    let mut solver = HybridSimulation::new(
        0.5,
        0.25,
        Box::new(NormDispIncr { tol: 1e-12 }),
        0.75,
        20,
    )
    .unwrap();
    solver.initialize(sys);
    let u0 = 0.2;
    let a0 = -(sys.k * u0 + sys.k3 * u0 * u0 * u0) / sys.m;
    solver
        .set_initial_conditions(
            VectorD::from_element(1, u0),
            VectorD::zeros(1),
            VectorD::from_element(1, a0),
        )
        .unwrap();
    solver
}

#[test]
fn test_newmark_roundtrip_is_exact() {
    let mut sys = duffing();
    let mut newmark = Newmark::new(0.6, 0.3).unwrap();
    newmark.initialize(&sys);
    newmark
        .set_initial_conditions(
            VectorD::from_element(1, 0.31),
            VectorD::from_element(1, -0.017),
            VectorD::from_element(1, 2.4),
        )
        .unwrap();
    newmark.new_step(0.013, &sys).unwrap();
    newmark.update(&VectorD::from_element(1, 0.0071)).unwrap();
    let _ = newmark.form_residual(&mut sys);

    let bytes = newmark.serialize_state().unwrap();

    let mut restored = Newmark::new(0.5, 0.25).unwrap();
    restored.deserialize_state(&bytes).unwrap();

    assert_eq!(restored.parameters(), newmark.parameters());
    assert_eq!(restored.state(), newmark.state());
    assert_eq!(restored.trial(), newmark.trial());

    // Derived update coefficients are reconstructed from the parameters
    let c0 = newmark.tangent_coeffs();
    let c1 = restored.tangent_coeffs();
    assert_eq!((c0.c_k, c0.c_c, c0.c_m), (c1.c_k, c1.c_c, c1.c_m));
}

#[test]
fn test_hybrid_midstep_roundtrip_resumes_identically() {
    let mut sys = duffing();
    let mut solver = prepared_solver(&sys);

    solver.new_step(0.01, &sys).unwrap();
    let verdict = solver.iterate(&mut sys).unwrap();
    assert!(matches!(verdict, Verdict::NotConverged { .. }));

    let bytes = solver.serialize_state().unwrap();

    let mut restored = prepared_solver(&sys);
    restored.deserialize_state(&bytes).unwrap();

    assert_eq!(restored.state(), solver.state());
    assert_eq!(restored.trial(), solver.trial());
    assert_eq!(restored.context(), solver.context());

    // Both copies continue the interrupted iteration in lockstep
    loop {
        let v0 = solver.iterate(&mut sys).unwrap();
        let v1 = restored.iterate(&mut sys).unwrap();
        assert_eq!(v0, v1);
        assert_relative_eq!(
            solver.trial().unwrap().u[0],
            restored.trial().unwrap().u[0],
            epsilon = 1e-15
        );
        if v0.is_terminal() {
            break;
        }
    }
}

#[test]
fn test_malformed_snapshot_leaves_state_untouched() {
    let sys = duffing();
    let mut solver = prepared_solver(&sys);
    solver.new_step(0.01, &sys).unwrap();

    let state_before = solver.state().clone();
    let trial_before = solver.trial().cloned();

    let result = solver.deserialize_state(b"definitely not a snapshot");
    assert!(matches!(result, Err(IntegratorError::Format(_))));

    assert_eq!(solver.state(), &state_before);
    assert_eq!(solver.trial(), trial_before.as_ref());
}

#[test]
fn test_inconsistent_snapshot_is_rejected() {
    let sys = duffing();
    let mut newmark = Newmark::new(0.5, 0.25).unwrap();
    newmark.initialize(&sys);
    newmark.new_step(0.01, &sys).unwrap();

    let bytes = newmark.serialize_state().unwrap();
    let json = String::from_utf8(bytes).unwrap();

    // Out-of-range beta must be refused even though the JSON is well formed
    let tampered = json.replace("\"beta\":0.25", "\"beta\":0.9");
    assert_ne!(tampered, json);
    let result = newmark.deserialize_state(tampered.as_bytes());
    assert!(matches!(result, Err(IntegratorError::Format(_))));
    assert_relative_eq!(newmark.parameters().beta, 0.25);
}

#[test]
fn test_empty_snapshot_of_fresh_integrator_roundtrips() {
    let a = Newmark::new(0.5, 0.25).unwrap();
    let bytes = a.serialize_state().unwrap();
    let mut b = Newmark::new(1.0, 0.5).unwrap();
    b.deserialize_state(&bytes).unwrap();

    assert_eq!(b.parameters(), a.parameters());
    assert!(!b.is_initialized());

    // Restored uninitialized integrator still refuses to step
    let sys = duffing();
    assert!(matches!(
        b.new_step(0.01, &sys),
        Err(IntegratorError::DomainNotReady(_))
    ));
}
