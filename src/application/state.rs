//! Process-wide application state and per-user sessions.

use crate::application::eventbus::SharedEventBus;
use crate::application::notice::NoticeBoard;
use crate::application::service::{GroupService, WorldEntry, WorldService};
use crate::application::subscription::WorldSubscription;
use crate::domain::error::DomainError;
use crate::domain::model::{Group, User};
use crate::domain::reconciler::{Clock, GroupScoreReconciler, SystemClock};
use crate::domain::repository::{Result, UserRepository, WorldNameRepository, WorldRepository};
use crate::infrastructure::config::AppConfig;
use std::sync::Arc;
use std::time::Duration;

/// Type aliases for dynamic repository types
pub type DynWorldRepository = Arc<dyn WorldRepository>;
pub type DynUserRepository = Arc<dyn UserRepository>;
pub type DynWorldNameRepository = Arc<dyn WorldNameRepository>;

pub type DynGroupService = GroupService<DynWorldRepository>;
pub type DynWorldService = WorldService<DynWorldRepository, DynUserRepository, DynWorldNameRepository>;

const GENERIC_FAILURE: &str = "Something went wrong";

pub struct AppState {
    pub group_service: Arc<DynGroupService>,
    pub world_service: DynWorldService,
    pub event_bus: SharedEventBus,
    notice_delay: Duration,
    sweep_interval: Duration,
}

impl AppState {
    pub fn new(
        worlds: DynWorldRepository,
        users: DynUserRepository,
        names: DynWorldNameRepository,
        event_bus: SharedEventBus,
        config: &AppConfig,
    ) -> Self {
        Self::with_clock(worlds, users, names, event_bus, config, Arc::new(SystemClock))
    }

    pub fn with_clock(
        worlds: DynWorldRepository,
        users: DynUserRepository,
        names: DynWorldNameRepository,
        event_bus: SharedEventBus,
        config: &AppConfig,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let max_attempts = config.writes.max_attempts;
        let group_service = GroupService::new(
            Arc::clone(&worlds),
            event_bus.clone(),
            GroupScoreReconciler::new(Arc::clone(&clock)),
            max_attempts,
        );
        let world_service = WorldService::new(worlds, users, names, event_bus.clone(), clock, max_attempts);

        Self {
            group_service: Arc::new(group_service),
            world_service,
            event_bus,
            notice_delay: config.notices.clear_after(),
            sweep_interval: config.sweep.interval(),
        }
    }

    pub fn sweep_interval(&self) -> Duration {
        self.sweep_interval
    }

    /// Opens a session for an already authenticated user.
    pub fn sign_in(self: &Arc<Self>, user_id: &str) -> Result<Session> {
        let user = self.world_service.user(&user_id.trim().to_lowercase())?;
        tracing::info!("{} signed in", user.id);
        Ok(Session::new(Arc::clone(self), user))
    }

    /// Registers the user on first sign-in, then opens the session.
    pub fn sign_up(self: &Arc<Self>, email: &str, name: &str) -> Result<Session> {
        let user = self.world_service.register_user(email, name)?;
        tracing::info!("{} signed up", user.id);
        Ok(Session::new(Arc::clone(self), user))
    }
}

/// A signed-in user together with their selected world and notice board.
pub struct Session {
    state: Arc<AppState>,
    user: User,
    notices: NoticeBoard,
}

impl Session {
    fn new(state: Arc<AppState>, user: User) -> Self {
        let notices = NoticeBoard::new(state.notice_delay);
        Self { state, user, notices }
    }

    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn current_world(&self) -> Option<&str> {
        self.user.current_world.as_deref()
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Reloads the user document, picking up memberships granted elsewhere.
    pub fn refresh(&mut self) -> Result<&User> {
        self.user = self.state.world_service.user(&self.user.id)?;
        Ok(&self.user)
    }

    pub fn select_world(&mut self, world_id: &str) -> Result<()> {
        self.user = self.state.world_service.select_world(&self.user.id, world_id)?;
        Ok(())
    }

    pub fn worlds(&self) -> Result<Vec<WorldEntry>> {
        self.state.world_service.worlds_of(&self.user.id)
    }

    pub fn subscribe_current_world(&self) -> Result<WorldSubscription> {
        let world_id = self.require_world()?;
        self.state.world_service.subscribe(world_id)
    }

    /// Groups of the selected world as they stand now, expired banks
    /// already committed.
    pub fn groups(&self) -> Result<Vec<Group>> {
        let world = self.state.world_service.world(self.require_world()?)?;
        let reconciler = self.state.group_service.reconciler();
        Ok(world
            .groups
            .iter()
            .map(|g| reconciler.evaluate(g).group)
            .collect())
    }

    /// Unwraps a service result, turning failures into a notice.
    ///
    /// Validation rejections show their own message; everything else shows
    /// a generic one and is logged. Must be called within a tokio runtime.
    pub fn report<T>(&self, result: Result<T>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(DomainError::Rejected(rejection)) if rejection.is_validation() => {
                tracing::debug!("{}: {}", self.user.id, rejection);
                self.notices.post(rejection.to_string());
                None
            }
            Err(e) => {
                tracing::warn!("Request of {} failed: {}", self.user.id, e);
                self.notices.post(GENERIC_FAILURE);
                None
            }
        }
    }

    pub fn notice(&self) -> Option<String> {
        self.notices.current()
    }

    pub fn dismiss_notice(&self) {
        self.notices.dismiss();
    }

    pub fn sign_out(self) {
        tracing::info!("{} signed out", self.user.id);
    }

    fn require_world(&self) -> Result<&str> {
        self.current_world()
            .ok_or_else(|| DomainError::Validation("No world selected".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::eventbus::create_event_bus;
    use crate::domain::error::Rejection;
    use crate::infrastructure::persistence::sqlite::{
        open_in_memory, SqliteUserRepository, SqliteWorldNameRepository, SqliteWorldRepository,
    };

    fn state() -> Arc<AppState> {
        let conn = open_in_memory().unwrap();
        Arc::new(AppState::new(
            Arc::new(SqliteWorldRepository::new(conn.clone())),
            Arc::new(SqliteUserRepository::new(conn.clone())),
            Arc::new(SqliteWorldNameRepository::new(conn)),
            create_event_bus(),
            &AppConfig::default(),
        ))
    }

    #[tokio::test]
    async fn test_report_posts_validation_notice() {
        let state = state();
        let session = state.sign_up("ann@example.com", "Ann").unwrap();

        let r: Option<()> = session.report(Err(Rejection::GroupNameTooShort.into()));
        assert_eq!(r, None);
        assert_eq!(session.notice().as_deref(), Some("Group name is too short"));

        session.report::<()>(Err(DomainError::Database("disk full".into())));
        assert_eq!(session.notice().as_deref(), Some(GENERIC_FAILURE));

        assert_eq!(session.report(Ok(3)), Some(3));
        session.dismiss_notice();
        assert_eq!(session.notice(), None);
    }

    #[tokio::test]
    async fn test_session_follows_selected_world() {
        let state = state();
        let mut session = state.sign_up("ann@example.com", "Ann").unwrap();
        assert!(session.groups().is_err());

        let entry = state
            .world_service
            .create_world("ann@example.com", "Club")
            .unwrap();
        session.refresh().unwrap();
        session.select_world(&entry.world_id).unwrap();
        assert_eq!(session.current_world(), Some(entry.world_id.as_str()));

        state
            .group_service
            .create_group("ann@example.com", &entry.world_id, "Reds")
            .unwrap();
        assert_eq!(session.groups().unwrap().len(), 1);

        let mut sub = session.subscribe_current_world().unwrap();
        assert_eq!(sub.latest().map(|w| w.groups.len()), Some(1));
        session.sign_out();
    }

    #[test]
    fn test_sign_in_unknown_user() {
        let state = state();
        assert!(matches!(state.sign_in("ghost@example.com"), Err(DomainError::NotFound(_))));
        state.sign_up("Ann@Example.com", "Ann").unwrap();
        assert!(state.sign_in("ANN@example.com").is_ok());
    }
}
