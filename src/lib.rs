pub mod conflict;
pub mod dates;
pub mod delivery;
pub mod generator;
pub mod holiday;
#[cfg(feature = "http_api")]
pub mod http_api;
pub mod persistence;
pub mod planner;
pub mod rule;

pub use conflict::{alternate_for, annotate_holidays, detect};
pub use delivery::{
    Conflict, ConflictKind, Delivery, DeliveryKey, DeliveryKind, DeliveryStatus,
    InvalidDeliveryKey,
};
pub use generator::{GenerateError, generate};
pub use holiday::{
    Holiday, HolidayCalendar, HolidayKind, HolidayProvider, HolidaySourceConfig, ProviderChain,
    ProviderError, easter_sunday, local_holidays,
};
pub use persistence::{
    DeliveryStore, EntregaPayload, EntregaRecord, HttpDeliveryStore, PersistenceError,
    PersistenceResult,
};
pub use planner::{
    DeliveryPlanner, GenerationTicket, MonthAssembly, MonthSummary, MonthView, PlannerError,
    ReconcileOutcome, StaleGeneration, reconcile,
};
pub use rule::{Agrupamento, MensalSelector, PeriodicityRule, QuinzenaSelector, Recurrence};
