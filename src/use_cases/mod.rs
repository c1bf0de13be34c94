// Use cases layer: session orchestration on top of the domain rules.

pub mod registry;
pub mod session;
pub mod telemetry;
pub mod types;

pub use registry::{
    RegistryError, RegistrySettings, SessionHandle, SessionRegistry, SessionSummary,
};
pub use session::{SessionConfig, SessionRules};
pub use types::{
    AdmissionError, InputAction, JoinTicket, Outbound, Outbox, SessionKind, SessionPhase, SlotId,
    TelemetryMode,
};
