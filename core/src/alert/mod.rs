pub mod notifier;
pub mod state_machine;

pub use notifier::{AlertCue, LogNotifier, Notifier, VIBRATION_PATTERN_MS};
pub use state_machine::{
    AlertError, AlertPhase, AlertState, AlertStateMachine, AlertTrigger, Dispatch, PendingAlert,
    Transition,
};
