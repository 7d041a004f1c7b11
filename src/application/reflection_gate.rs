use crate::domain::models::{
    ExistencePolicy, Goal, ReflectionSchedule, SessionLog, StreakData, WeeklyReflection,
};
use crate::infrastructure::backend_client::{GenerateReflectionRequest, InsightsBackendClient};
use crate::infrastructure::event_log::{ReflectionEvent, ReflectionEventSink};
use crate::infrastructure::reflection_repository::{ReflectionRepository, SlotReservation};
use chrono::{DateTime, Utc};
use std::sync::Arc;

type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Decides once per boundary window whether a weekly reflection should be
/// generated for a user, and if so generates, persists, and notifies.
///
/// The gate never surfaces an error: every precondition miss and every failure
/// degrades to `None` (or, for notification, to an event only), so a hosting
/// process cannot be taken down by a bad run.
pub struct WeeklyReflectionGate<B, R, E>
where
    B: InsightsBackendClient,
    R: ReflectionRepository,
    E: ReflectionEventSink,
{
    backend: Arc<B>,
    repository: Arc<R>,
    events: Arc<E>,
    schedule: ReflectionSchedule,
    existence_policy: ExistencePolicy,
    now_provider: NowProvider,
}

impl<B, R, E> WeeklyReflectionGate<B, R, E>
where
    B: InsightsBackendClient,
    R: ReflectionRepository,
    E: ReflectionEventSink,
{
    pub fn new(backend: Arc<B>, repository: Arc<R>, events: Arc<E>) -> Self {
        Self {
            backend,
            repository,
            events,
            schedule: ReflectionSchedule::default(),
            existence_policy: ExistencePolicy::FailOpen,
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_schedule(mut self, schedule: ReflectionSchedule) -> Self {
        self.schedule = schedule;
        self
    }

    pub fn with_existence_policy(mut self, existence_policy: ExistencePolicy) -> Self {
        self.existence_policy = existence_policy;
        self
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub async fn check_and_generate(
        &self,
        access_token: &str,
        user_id: &str,
        logs: &[SessionLog],
        goals: &[Goal],
        streak: &StreakData,
    ) -> Option<WeeklyReflection> {
        let now = (self.now_provider)();
        if !self.schedule.window_contains(now) {
            self.events.record(ReflectionEvent::WindowClosed {
                user_id: user_id.to_string(),
            });
            return None;
        }

        let date = self.schedule.local_date_string(now);
        match self.repository.reserve(user_id, &date) {
            Ok(SlotReservation::Reserved) => {}
            Ok(SlotReservation::AlreadyTaken) => {
                self.events.record(ReflectionEvent::SlotAlreadyTaken {
                    user_id: user_id.to_string(),
                    date,
                });
                return None;
            }
            Err(error) => {
                self.events.record(ReflectionEvent::ReserveFailed {
                    user_id: user_id.to_string(),
                    date: date.clone(),
                    policy: self.existence_policy.as_str().to_string(),
                    message: error.to_string(),
                });
                if self.existence_policy == ExistencePolicy::FailClosed {
                    return None;
                }
            }
        }

        let request = GenerateReflectionRequest {
            user_id: user_id.to_string(),
            date: date.clone(),
            logs: logs.to_vec(),
            goals: goals.to_vec(),
            streak: *streak,
        };
        let reflection = match self.backend.generate_reflection(access_token, &request).await {
            Ok(reflection) => reflection,
            Err(error) => {
                // Give the slot back so a later run in the window can retry.
                let _ = self.repository.release(user_id, &date);
                self.events.record(ReflectionEvent::GenerationFailed {
                    user_id: user_id.to_string(),
                    date,
                    message: error.to_string(),
                });
                return None;
            }
        };

        if let Err(error) = self.repository.save(&reflection) {
            let _ = self.repository.release(user_id, &date);
            self.events.record(ReflectionEvent::PersistFailed {
                user_id: user_id.to_string(),
                date,
                message: error.to_string(),
            });
            return None;
        }

        self.events.record(ReflectionEvent::Generated {
            user_id: user_id.to_string(),
            date,
        });

        self.notify_best_effort(access_token, user_id, &reflection)
            .await;
        Some(reflection)
    }

    async fn notify_best_effort(
        &self,
        access_token: &str,
        user_id: &str,
        reflection: &WeeklyReflection,
    ) {
        let email = match self.backend.current_user_email(access_token).await {
            Ok(Some(email)) => email,
            Ok(None) => {
                self.events.record(ReflectionEvent::NotificationSkipped {
                    user_id: user_id.to_string(),
                });
                return;
            }
            Err(error) => {
                self.events.record(ReflectionEvent::NotificationFailed {
                    user_id: user_id.to_string(),
                    message: error.to_string(),
                });
                return;
            }
        };

        match self
            .backend
            .send_reflection_email(access_token, reflection, &email)
            .await
        {
            Ok(()) => {
                self.events.record(ReflectionEvent::NotificationSent {
                    user_id: user_id.to_string(),
                    email,
                });
            }
            Err(error) => {
                self.events.record(ReflectionEvent::NotificationFailed {
                    user_id: user_id.to_string(),
                    message: error.to_string(),
                });
            }
        }
    }
}
