//! Toggle request validation tests

mod common;

#[cfg(test)]
mod tests {
    use super::common::*;
    use animated_structures::{
        engine::{Collaborators, Engine},
        geometry::Cuboid,
        memory::{InMemoryStore, InMemoryWorld},
        structure::{ActorId, OpenDirection, StructureAttribute, StructureKind},
        world::{PermissionAnswer, PermissionOracle},
        BlockPos, EngineConfig, StructureId, ToggleAction, ToggleCause, ToggleError,
    };
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::oneshot;
    use tokio_test::block_on;

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    #[derive(Clone, Copy)]
    enum Reply {
        Later(bool),
        Dropped,
        Never,
    }

    /// Answers every non-owner query asynchronously.
    struct PendingOracle {
        reply: Reply,
        held: Mutex<Vec<oneshot::Sender<bool>>>,
    }

    impl PendingOracle {
        fn answer(&self) -> PermissionAnswer {
            let (tx, rx) = oneshot::channel();
            match self.reply {
                Reply::Later(allowed) => {
                    tokio::spawn(async move {
                        tokio::time::sleep(Duration::from_millis(100)).await;
                        let _ = tx.send(allowed);
                    });
                }
                Reply::Dropped => drop(tx),
                Reply::Never => self.held.lock().expect("lock").push(tx),
            }
            PermissionAnswer::Pending(rx)
        }
    }

    impl PermissionOracle for PendingOracle {
        fn has_permission(&self, _: &ActorId, _: StructureId, _: StructureAttribute) -> PermissionAnswer {
            self.answer()
        }

        fn can_occupy(&self, _: &ActorId, _: &Cuboid) -> PermissionAnswer {
            PermissionAnswer::Granted
        }
    }

    fn make_pending_engine(reply: Reply) -> Engine {
        let world = Arc::new(InMemoryWorld::new(16));
        let store = Arc::new(InMemoryStore::new());
        store.insert(door());
        Engine::new(
            test_config(),
            Collaborators {
                store,
                surface: world.clone(),
                gate: world,
                permissions: Arc::new(PendingOracle {
                    reply,
                    held: Mutex::new(Vec::new()),
                }),
            },
        )
    }

    fn build(fx: &Fixture, id: u64, actor: Option<ActorId>, cause: ToggleCause, action: ToggleAction) -> Result<(), ToggleError> {
        block_on(
            fx.engine
                .request(StructureId(id))
                .actor(actor)
                .cause(cause)
                .action(action)
                .build(),
        )
        .map(|_| ())
    }

    // -----------------------------------------------------------------------
    // Accepted requests
    // -----------------------------------------------------------------------

    #[test]
    fn valid_request_carries_resolved_fields() {
        let fx = make_fixture(test_config());
        add_structure(&fx, door());
        let writes_before = fx.world.write_count();

        let request = block_on(
            fx.engine
                .request(StructureId(DOOR_ID))
                .actor(alice())
                .duration(Duration::from_secs(2))
                .skip_animation(true)
                .build(),
        )
        .expect("valid request");

        assert_eq!(request.structure_id(), StructureId(DOOR_ID));
        assert_eq!(request.cause(), ToggleCause::Actor);
        assert_eq!(request.action(), ToggleAction::Toggle);
        assert_eq!(request.actor(), Some(&alice()));
        assert_eq!(request.duration(), Some(Duration::from_secs(2)));
        assert!(request.skip_animation());
        assert_eq!(request.direction(), OpenDirection::Clockwise);
        assert!(!request.was_open());
        assert_eq!(
            request.new_cuboid(),
            Cuboid::new(BlockPos::new(-3, 0, 0), BlockPos::new(0, 2, 0))
        );

        // building is read-only
        assert_eq!(fx.world.write_count(), writes_before);
        assert_eq!(fx.store.commit_count(), 0);
        assert!(!fx.engine.is_animating(StructureId(DOOR_ID)));
    }

    #[test]
    fn requests_without_actor_skip_permission_checks() {
        let fx = make_fixture(test_config());
        add_structure(&fx, door());
        assert_eq!(build(&fx, DOOR_ID, None, ToggleCause::Automated, ToggleAction::Open), Ok(()));
    }

    // -----------------------------------------------------------------------
    // Validation order
    // -----------------------------------------------------------------------

    #[test]
    fn unknown_structure_is_not_found() {
        let fx = make_fixture(test_config());
        assert_eq!(
            build(&fx, 999, Some(alice()), ToggleCause::Actor, ToggleAction::Toggle),
            Err(ToggleError::NotFound(StructureId(999)))
        );
    }

    #[test]
    fn disabled_kind_is_checked_before_lock() {
        let mut config = test_config();
        config.disabled_kinds.insert(StructureKind::Door);
        let fx = make_fixture(config);
        let mut d = door();
        d.locked = true;
        add_structure(&fx, d);

        assert_eq!(
            build(&fx, DOOR_ID, Some(mallory()), ToggleCause::Actor, ToggleAction::Toggle),
            Err(ToggleError::TypeDisabled(StructureKind::Door))
        );
    }

    #[test]
    fn lock_is_checked_before_permission() {
        let fx = make_fixture(test_config());
        let mut d = door();
        d.locked = true;
        add_structure(&fx, d);

        assert_eq!(
            build(&fx, DOOR_ID, Some(mallory()), ToggleCause::Actor, ToggleAction::Toggle),
            Err(ToggleError::Locked)
        );
        assert_eq!(
            build(&fx, DOOR_ID, None, ToggleCause::Automated, ToggleAction::Toggle),
            Err(ToggleError::Locked)
        );
    }

    #[test]
    fn server_cause_overrides_lock() {
        let fx = make_fixture(test_config());
        let mut d = door();
        d.locked = true;
        add_structure(&fx, d);

        assert_eq!(build(&fx, DOOR_ID, None, ToggleCause::Server, ToggleAction::Toggle), Ok(()));
    }

    #[test]
    fn non_owner_needs_a_grant() {
        let fx = make_fixture(test_config());
        add_structure(&fx, door());

        assert_eq!(
            build(&fx, DOOR_ID, Some(mallory()), ToggleCause::Actor, ToggleAction::Toggle),
            Err(ToggleError::NoPermission)
        );

        fx.permissions.grant(mallory(), StructureAttribute::Toggle);
        assert_eq!(build(&fx, DOOR_ID, Some(mallory()), ToggleCause::Actor, ToggleAction::Toggle), Ok(()));
    }

    #[test]
    fn permission_is_checked_before_direction() {
        let fx = make_fixture(test_config());
        add_structure(&fx, door().with_direction(OpenDirection::North));

        assert_eq!(
            build(&fx, DOOR_ID, Some(mallory()), ToggleCause::Actor, ToggleAction::Toggle),
            Err(ToggleError::NoPermission)
        );
        assert_eq!(
            build(&fx, DOOR_ID, Some(alice()), ToggleCause::Actor, ToggleAction::Toggle),
            Err(ToggleError::NoDirection)
        );
    }

    #[test]
    fn direction_is_checked_before_state() {
        let fx = make_fixture(test_config());
        let mut d = door().with_direction(OpenDirection::None);
        d.is_open = true;
        add_structure(&fx, d);

        assert_eq!(
            build(&fx, DOOR_ID, Some(alice()), ToggleCause::Actor, ToggleAction::Open),
            Err(ToggleError::NoDirection)
        );
    }

    #[test]
    fn action_must_match_state() {
        let fx = make_fixture(test_config());
        add_structure(&fx, door());
        let mut p = portcullis();
        p.is_open = true;
        add_structure(&fx, p);

        assert_eq!(
            build(&fx, DOOR_ID, Some(alice()), ToggleCause::Actor, ToggleAction::Close),
            Err(ToggleError::AlreadyClosed)
        );
        assert_eq!(
            build(&fx, PORTCULLIS_ID, Some(alice()), ToggleCause::Actor, ToggleAction::Open),
            Err(ToggleError::AlreadyOpen)
        );
        assert_eq!(build(&fx, PORTCULLIS_ID, Some(alice()), ToggleCause::Actor, ToggleAction::Close), Ok(()));
    }

    #[test]
    fn validation_errors_are_classified() {
        assert!(ToggleError::Locked.is_validation());
        assert!(ToggleError::AlreadyOpen.is_validation());
        assert!(!ToggleError::Busy.is_validation());
        assert!(ToggleError::Busy.is_retryable());
        assert!(ToggleError::RegionNotReady.is_retryable());
        assert!(!ToggleError::Fatal("x".into()).is_retryable());
    }

    // -----------------------------------------------------------------------
    // Pending permission answers
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn pending_grant_is_awaited() {
        let engine = make_pending_engine(Reply::Later(true));
        let result = engine
            .request(StructureId(DOOR_ID))
            .actor(mallory())
            .build()
            .await;
        assert!(result.is_ok(), "{:?}", result);
    }

    #[tokio::test(start_paused = true)]
    async fn pending_denial_is_denied() {
        let engine = make_pending_engine(Reply::Later(false));
        let result = engine.request(StructureId(DOOR_ID)).actor(mallory()).build().await;
        assert_eq!(result.map(|_| ()), Err(ToggleError::NoPermission));
    }

    #[tokio::test(start_paused = true)]
    async fn dropped_answer_is_denied() {
        let engine = make_pending_engine(Reply::Dropped);
        let result = engine.request(StructureId(DOOR_ID)).actor(mallory()).build().await;
        assert_eq!(result.map(|_| ()), Err(ToggleError::NoPermission));
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_permission_times_out() {
        let engine = make_pending_engine(Reply::Never);
        let timeout = Duration::from_millis(EngineConfig::default().permission_timeout_ms);

        let started = tokio::time::Instant::now();
        let result = engine.request(StructureId(DOOR_ID)).actor(mallory()).build().await;
        assert_eq!(result.map(|_| ()), Err(ToggleError::NoPermission));
        assert!(started.elapsed() >= timeout);
    }

    #[tokio::test(start_paused = true)]
    async fn owners_never_consult_the_oracle() {
        let engine = make_pending_engine(Reply::Never);
        let started = tokio::time::Instant::now();
        let result = engine.request(StructureId(DOOR_ID)).actor(alice()).build().await;
        assert!(result.is_ok());
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
