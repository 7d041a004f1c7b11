pub mod application;
pub mod domain;
pub mod infrastructure;

pub use application::bootstrap::{BootstrapResult, bootstrap_workspace};
pub use application::commands::AppState;
pub use application::insights::{InsightsService, LogAnalysis};
pub use application::reflection_gate::WeeklyReflectionGate;
pub use domain::models::{
    ExistencePolicy, Goal, GoalStatus, ReflectionSchedule, SessionLog, StreakData,
    WeeklyReflection,
};
pub use domain::report::{ReportSections, SectionKey, split_report_sections};
pub use infrastructure::error::InfraError;
