use proptest::prelude::*;
use std::time::{Duration, Instant};
use tunebot_core::admission::{AdmissionGate, Decision, GateConfig};

fn gate(window_ms: u64, max_requests: u32) -> AdmissionGate<u8> {
    AdmissionGate::new(GateConfig {
        enabled: true,
        window: Duration::from_millis(window_ms),
        max_requests,
        idle_windows: 1,
    })
    .expect("generated config is valid")
}

/// Absolute offsets in milliseconds from non-negative steps.
fn offsets(steps: &[u64]) -> Vec<u64> {
    steps
        .iter()
        .scan(0_u64, |acc, step| {
            *acc += step;
            Some(*acc)
        })
        .collect()
}

proptest! {
    /// The gate agrees with a naive recount of admitted requests.
    #[test]
    fn matches_naive_model(
        window_ms in 1_u64..5_000,
        max_requests in 1_u32..10,
        steps in prop::collection::vec(0_u64..2_000, 1..200),
    ) {
        let gate = gate(window_ms, max_requests);
        let t0 = Instant::now();
        let mut admitted: Vec<u64> = Vec::new();

        for at in offsets(&steps) {
            let in_window = admitted.iter().filter(|a| at - **a < window_ms).count();
            let expected = in_window < max_requests as usize;

            let decision = gate.admit(0, t0 + Duration::from_millis(at));
            prop_assert_eq!(decision.is_allowed(), expected, "at {}ms", at);

            if expected {
                admitted.push(at);
            }
        }
    }

    /// No half-open interval of one window length ever holds more than
    /// `max_requests` admissions.
    #[test]
    fn never_exceeds_limit_in_any_window(
        window_ms in 1_u64..5_000,
        max_requests in 1_u32..10,
        steps in prop::collection::vec(0_u64..500, 1..300),
    ) {
        let gate = gate(window_ms, max_requests);
        let t0 = Instant::now();

        let admitted: Vec<u64> = offsets(&steps)
            .into_iter()
            .filter(|at| gate.admit(0, t0 + Duration::from_millis(*at)).is_allowed())
            .collect();

        for start in &admitted {
            let inside = admitted
                .iter()
                .filter(|a| **a >= *start && **a - *start < window_ms)
                .count();
            prop_assert!(inside <= max_requests as usize);
        }
    }

    /// A denial always names a wait that ends within one window and after
    /// which the user is admitted again.
    #[test]
    fn retry_after_is_honest(
        window_ms in 1_u64..5_000,
        max_requests in 1_u32..10,
        steps in prop::collection::vec(0_u64..200, 1..100),
    ) {
        let gate = gate(window_ms, max_requests);
        let t0 = Instant::now();

        for at in offsets(&steps) {
            let now = t0 + Duration::from_millis(at);
            if let Decision::Denied { retry_after } = gate.admit(0, now) {
                prop_assert!(retry_after > Duration::ZERO);
                prop_assert!(retry_after <= Duration::from_millis(window_ms));
                prop_assert!(gate.remaining(&0, now + retry_after) >= 1);
            }
        }
    }

    /// A disabled gate admits everything and records nothing.
    #[test]
    fn disabled_gate_is_transparent(
        users in prop::collection::vec(any::<u8>(), 1..100),
    ) {
        let gate = gate(1_000, 1);
        gate.set_enabled(false);
        let now = Instant::now();

        for user in users {
            prop_assert_eq!(gate.admit(user, now), Decision::Allowed);
        }
        prop_assert_eq!(gate.tracked_users(), 0);
    }
}
