//! Notification decision engine.
//!
//! Pure policy: given the stored decay state and a freshly observed commute
//! duration, decide whether to notify and what the new state is. The caller
//! persists the returned state whether or not it fired; the clear on an
//! above-threshold observation is itself a mutation.

/// Minimum improvement, in minutes, over the last notified duration before
/// a repeat notification fires within the same window occurrence.
pub const DECAY_MINUTES: u32 = 5;

/// Decay-relevant slice of a subscription's stored state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionState {
    pub threshold_minutes: u32,
    pub last_notified_minutes: Option<u32>,
}

/// Outcome of one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    /// Whether a notification event should be emitted.
    pub fire: bool,
    /// State to persist, regardless of `fire`.
    pub state: SubscriptionState,
}

/// Evaluate one observed duration against the stored state.
///
/// - Above threshold: never fires, and clears any suppression memory.
/// - At or below threshold with no prior notification: fires.
/// - At or below threshold with a prior notification: fires only on a step
///   improvement of at least [`DECAY_MINUTES`] over the last notified value.
pub fn decide(state: SubscriptionState, observed_minutes: u32) -> Decision {
    if observed_minutes > state.threshold_minutes {
        return Decision {
            fire: false,
            state: SubscriptionState {
                last_notified_minutes: None,
                ..state
            },
        };
    }

    let fire = match state.last_notified_minutes {
        None => true,
        Some(last) => observed_minutes + DECAY_MINUTES <= last,
    };

    let last_notified_minutes = if fire {
        Some(observed_minutes)
    } else {
        state.last_notified_minutes
    };

    Decision {
        fire,
        state: SubscriptionState {
            last_notified_minutes,
            ..state
        },
    }
}

/// Window-exit reset: the decay memory is scoped to one window occurrence
/// and must not leak into the next.
pub fn window_exit(state: SubscriptionState) -> SubscriptionState {
    SubscriptionState {
        last_notified_minutes: None,
        ..state
    }
}
