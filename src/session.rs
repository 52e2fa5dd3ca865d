use rand::Rng;
use serde_json::{json, Value};
use std::sync::{mpsc::Sender, Mutex};
use tracing::{debug, info, warn};

use crate::audit::AuditSink;
use crate::auth::{Authorizer, SessionMemory};
use crate::bracket::{self, Bracket, Slot};
use crate::error::{TournamentError, TournamentResult};
use crate::participants::{parse_participants, sample_participants_text, validate_participant_count};
use crate::store::{LocalStore, RemoteStore, Subscription};
use crate::sync::{SyncAction, SyncEvent, SyncMachine, SyncState};
use crate::types::{Notice, RemoteAction, RemoteRecord, SessionSnapshot, StoredState, BYE_LABEL, DEFAULT_MAX_PARTICIPANTS};
use crate::view::{build_view, describe_match};

/// Everything one running board owns: the canonical bracket, the admin
/// login, and the handles to persistence. All user actions go through here.
pub struct TournamentSession {
    tournament_id: String,
    participants_text: String,
    bracket: Option<Bracket>,
    admin_code: Option<String>,
    sync: SyncMachine,
    remote: Option<Box<dyn RemoteStore>>,
    local: LocalStore,
    authorizer: Box<dyn Authorizer>,
    audit: Box<dyn AuditSink>,
    memory: Option<SessionMemory>,
    max_participants: usize,
    subscription: Option<Subscription>,
}

impl TournamentSession {
    pub fn new(
        tournament_id: impl Into<String>,
        local: LocalStore,
        authorizer: Box<dyn Authorizer>,
        audit: Box<dyn AuditSink>,
    ) -> Self {
        TournamentSession {
            tournament_id: tournament_id.into(),
            participants_text: String::new(),
            bracket: None,
            admin_code: None,
            sync: SyncMachine::new(),
            remote: None,
            local,
            authorizer,
            audit,
            memory: None,
            max_participants: DEFAULT_MAX_PARTICIPANTS,
            subscription: None,
        }
    }

    pub fn with_remote(mut self, remote: Box<dyn RemoteStore>) -> Self {
        self.remote = Some(remote);
        self
    }

    pub fn with_memory(mut self, memory: SessionMemory) -> Self {
        self.memory = Some(memory);
        self
    }

    pub fn with_max_participants(mut self, max: usize) -> Self {
        self.max_participants = max;
        self
    }

    pub fn tournament_id(&self) -> &str {
        &self.tournament_id
    }

    pub fn bracket(&self) -> Option<&Bracket> {
        self.bracket.as_ref()
    }

    pub fn participants_text(&self) -> &str {
        &self.participants_text
    }

    pub fn sync_state(&self) -> SyncState {
        self.sync.state()
    }

    pub fn is_admin(&self) -> bool {
        self.admin_code.is_some()
    }

    // ── Admin login ────────────────────────────────────────────────────

    pub fn login(&mut self, code: &str) -> TournamentResult<()> {
        let code = code.trim();
        if code.is_empty() {
            return Err(TournamentError::Validation("Please enter an admin code.".to_string()));
        }
        if !self.authorizer.authorize(code) {
            warn!("rejected admin login");
            return Err(TournamentError::Unauthorized(
                "Invalid admin code. Please try again.".to_string(),
            ));
        }
        self.admin_code = Some(code.to_string());
        if let Some(memory) = &self.memory {
            memory.remember(code);
        }
        info!("admin logged in");
        Ok(())
    }

    pub fn logout(&mut self) {
        self.admin_code = None;
        if let Some(memory) = &self.memory {
            memory.forget();
        }
        info!("admin logged out");
    }

    /// Re-verifies a remembered code, if any. Returns whether the session is
    /// now an admin session.
    pub fn restore_login(&mut self) -> bool {
        let Some(code) = self.memory.as_ref().and_then(|memory| memory.recall()) else {
            return false;
        };
        if self.authorizer.authorize(&code) {
            info!("restored admin login");
            self.admin_code = Some(code);
            true
        } else {
            if let Some(memory) = &self.memory {
                memory.forget();
            }
            false
        }
    }

    fn require_admin(&self, message: &str) -> TournamentResult<()> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(TournamentError::Unauthorized(message.to_string()))
        }
    }

    // ── Loading and remote changes ─────────────────────────────────────

    /// Remote first; the local blob when there is no remote or it fails.
    pub fn load(&mut self) {
        if let Some(remote) = &self.remote {
            match remote.get(&self.tournament_id) {
                Ok(Some(record)) => {
                    info!("loaded bracket {} from remote", record.record_id);
                    self.apply_state(record.state);
                    self.sync.apply(SyncEvent::ReloadFinished(Some(record.record_id)));
                    self.prefill_sample();
                    return;
                }
                Ok(None) => {
                    info!("no remote bracket for tournament {}", self.tournament_id);
                    self.prefill_sample();
                    return;
                }
                Err(e) => warn!("remote load failed: {e}; using local state"),
            }
        }
        match self.local.load() {
            Ok(Some(state)) => {
                info!("loaded bracket from {}", self.local.path().display());
                self.apply_state(state);
            }
            Ok(None) => {}
            Err(e) => warn!("{e}"),
        }
        self.prefill_sample();
    }

    fn prefill_sample(&mut self) {
        if self.bracket.is_none() && self.participants_text.trim().is_empty() && !self.is_admin() {
            self.participants_text = sample_participants_text();
        }
    }

    fn apply_state(&mut self, state: StoredState) {
        self.participants_text = state.participants_text;
        self.bracket = state.bracket.filter(|b| !b.is_empty()).map(|mut loaded| {
            // Snapshots written by older clients may lack receiving matches.
            bracket::pad_later_rounds(&mut loaded);
            loaded
        });
    }

    /// Forwards every remote notification for this tournament into `tx`.
    /// The receiving side must call [`handle_remote_change`] with the
    /// session lock held.
    ///
    /// [`handle_remote_change`]: TournamentSession::handle_remote_change
    pub fn subscribe(&mut self, tx: Sender<RemoteRecord>) -> TournamentResult<()> {
        let Some(remote) = &self.remote else {
            return Ok(());
        };
        let tx = Mutex::new(tx);
        let subscription = remote.subscribe(
            &self.tournament_id,
            Box::new(move |record| {
                let sender = tx.lock().unwrap_or_else(|e| e.into_inner());
                if sender.send(record).is_err() {
                    debug!("remote change dropped: receiver gone");
                }
            }),
        )?;
        self.subscription = Some(subscription);
        info!("subscribed to remote changes for {}", self.tournament_id);
        Ok(())
    }

    pub fn unsubscribe(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.cancel();
        }
    }

    /// Our own echo is ignored; anything else replaces local state with the
    /// newest remote record, unsaved edits included.
    pub fn handle_remote_change(&mut self, record: RemoteRecord) -> RemoteAction {
        if self.sync.apply(SyncEvent::RemoteChanged(record.record_id.clone())) != SyncAction::Reload {
            return RemoteAction::Ignored;
        }
        let fetched = match &self.remote {
            Some(remote) => remote.get(&self.tournament_id),
            None => Ok(None),
        };
        match fetched {
            Ok(Some(latest)) => {
                self.apply_state(latest.state);
                self.sync.apply(SyncEvent::ReloadFinished(Some(latest.record_id)));
            }
            Ok(None) => {
                self.apply_state(record.state);
                self.sync.apply(SyncEvent::ReloadFinished(Some(record.record_id)));
            }
            Err(e) => {
                warn!("reload after remote change failed: {e}; using notified record");
                self.apply_state(record.state);
                self.sync.apply(SyncEvent::ReloadFailed);
            }
        }
        info!("bracket reloaded after remote change");
        RemoteAction::Reloaded
    }

    // ── Admin actions ──────────────────────────────────────────────────

    pub fn generate(&mut self, participants_text: &str) -> TournamentResult<Vec<Notice>> {
        self.generate_with_rng(participants_text, &mut rand::thread_rng())
    }

    /// Builds a bracket from the text, or seats newcomers when one exists.
    pub fn generate_with_rng<R: Rng + ?Sized>(
        &mut self,
        participants_text: &str,
        rng: &mut R,
    ) -> TournamentResult<Vec<Notice>> {
        self.require_admin("Admin login required to generate or modify tournament.")?;
        let players = parse_participants(participants_text);
        let mut notices = Vec::new();
        notices.extend(validate_participant_count(players.len(), self.max_participants)?);

        match self.bracket.as_mut() {
            Some(existing) => match bracket::add_late_entrants_with_rng(existing, &players, rng) {
                Ok(added) => info!("added {added} late entrant(s)"),
                Err(TournamentError::NothingToAdd) => notices.push(Notice::NothingToAdd),
                Err(e) => return Err(e),
            },
            None => {
                let created = bracket::create_with_rng(&players, self.max_participants, rng)?;
                info!(
                    "generated bracket: {} players, {} rounds",
                    players.len(),
                    created.round_count()
                );
                self.bracket = Some(created);
            }
        }
        self.participants_text = participants_text.to_string();

        notices.extend(self.persist());
        self.record_audit("generate_bracket", json!({ "players_count": players.len() }));
        Ok(notices)
    }

    pub fn advance_winner(
        &mut self,
        round_index: usize,
        match_index: usize,
        slot_index: usize,
    ) -> TournamentResult<Vec<Notice>> {
        self.require_admin("Admin login required to advance winners.")?;
        let slot = Slot::from_index(slot_index)
            .ok_or_else(|| TournamentError::invalid_move(format!("Slot {slot_index} does not exist.")))?;
        let current = self
            .bracket
            .as_mut()
            .ok_or_else(|| TournamentError::invalid_move("No bracket has been generated."))?;
        let player = current
            .get(round_index, match_index)
            .ok_or_else(|| TournamentError::invalid_move("That match does not exist."))?
            .slot(slot)
            .map(|name| name.to_string())
            .filter(|name| name != BYE_LABEL)
            .ok_or_else(|| TournamentError::invalid_move("That slot has no player."))?;
        bracket::advance_winner(current, round_index, match_index, &player)?;
        info!("{player} wins round {} match {}", round_index + 1, match_index + 1);

        let notices = self.persist();
        self.record_audit(
            "advance_winner",
            json!({ "round": round_index, "match": match_index, "winner": player }),
        );
        Ok(notices)
    }

    pub fn clear(&mut self) -> TournamentResult<Vec<Notice>> {
        self.require_admin("Admin login required to clear the tournament.")?;
        self.bracket = None;
        self.participants_text.clear();
        info!("bracket cleared");
        let notices = self.persist();
        self.record_audit("clear_bracket", json!({}));
        Ok(notices)
    }

    /// "<round name> • Match <n>" for the confirmation prompt.
    pub fn describe(&self, round_index: usize, match_index: usize) -> Option<String> {
        describe_match(self.bracket.as_ref()?, round_index, match_index)
    }

    // ── Persistence ────────────────────────────────────────────────────

    fn stored_state(&self) -> StoredState {
        StoredState::new(self.participants_text.clone(), self.bracket.clone())
    }

    fn save_local(&self, state: &StoredState) {
        if let Err(e) = self.local.save(state) {
            warn!("{e}");
        }
    }

    /// Pushes to the remote when logged in, otherwise writes the local blob.
    /// A failed push keeps the in-memory state and falls back to the blob.
    fn persist(&mut self) -> Vec<Notice> {
        let state = self.stored_state();
        let (Some(remote), Some(code)) = (&self.remote, &self.admin_code) else {
            self.save_local(&state);
            return Vec::new();
        };
        if self.sync.apply(SyncEvent::LocalEdit) != SyncAction::Push {
            self.save_local(&state);
            return vec![Notice::SyncFailed];
        }
        self.sync.apply(SyncEvent::PushStarted);
        let known = self.sync.known_record().cloned();
        match remote.put(&self.tournament_id, known.as_ref(), &state, code) {
            Ok(record_id) => {
                debug!("pushed {record_id}");
                self.sync.apply(SyncEvent::PushSucceeded(record_id));
                self.record_audit(
                    "save_state",
                    json!({ "players_count": parse_participants(&state.participants_text).len() }),
                );
                Vec::new()
            }
            Err(e) => {
                warn!("remote save failed: {e}");
                self.sync.apply(SyncEvent::PushFailed);
                self.save_local(&state);
                vec![Notice::SyncFailed]
            }
        }
    }

    fn record_audit(&self, action: &str, details: Value) {
        self.audit
            .append(&self.tournament_id, action, self.admin_code.as_deref(), details);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            is_admin: self.is_admin(),
            tournament_id: self.tournament_id.clone(),
            participants_text: self.participants_text.clone(),
            sync_state: self.sync.state(),
            view: build_view(self.bracket.as_ref()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::testing::RecordingAudit;
    use crate::auth::StaticAuthorizer;
    use crate::store::MemoryRemote;
    use rand::{rngs::StdRng, SeedableRng};
    use std::sync::mpsc;
    use tempfile::TempDir;

    struct Fixture {
        _dir: TempDir,
        local: LocalStore,
        remote: MemoryRemote,
        audit: RecordingAudit,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let local = LocalStore::new(dir.path().join("local_state.json"));
        Fixture {
            _dir: dir,
            local,
            remote: MemoryRemote::new(),
            audit: RecordingAudit::default(),
        }
    }

    fn offline_session(fx: &Fixture) -> TournamentSession {
        TournamentSession::new(
            "t1",
            fx.local.clone(),
            Box::new(StaticAuthorizer::new(["alpha"])),
            Box::new(fx.audit.clone()),
        )
    }

    fn online_session(fx: &Fixture) -> TournamentSession {
        offline_session(fx).with_remote(Box::new(fx.remote.clone()))
    }

    fn names(n: usize) -> String {
        (1..=n).map(|i| format!("P{i}")).collect::<Vec<_>>().join("\n")
    }

    fn rng() -> StdRng {
        StdRng::seed_from_u64(11)
    }

    #[test]
    fn test_login_and_logout() {
        let fx = fixture();
        let mut session = offline_session(&fx);
        assert_eq!(
            session.login("  "),
            Err(TournamentError::Validation("Please enter an admin code.".to_string()))
        );
        assert!(matches!(session.login("wrong"), Err(TournamentError::Unauthorized(_))));
        assert!(!session.is_admin());
        session.login(" alpha ").unwrap();
        assert!(session.is_admin());
        session.logout();
        assert!(!session.is_admin());
    }

    #[test]
    fn test_restore_login_reverifies_remembered_code() {
        let fx = fixture();
        let memory = SessionMemory::new(fx._dir.path().join("session.json"), 12);
        let mut session = offline_session(&fx).with_memory(memory.clone());
        session.login("alpha").unwrap();

        let mut restarted = offline_session(&fx).with_memory(memory.clone());
        assert!(restarted.restore_login());
        assert!(restarted.is_admin());

        // A code that is no longer accepted is forgotten.
        let mut revoked = TournamentSession::new(
            "t1",
            fx.local.clone(),
            Box::new(StaticAuthorizer::new(["beta"])),
            Box::new(fx.audit.clone()),
        )
        .with_memory(memory.clone());
        assert!(!revoked.restore_login());
        assert_eq!(memory.recall(), None);
    }

    #[test]
    fn test_mutations_require_admin() {
        let fx = fixture();
        let mut session = offline_session(&fx);
        assert!(matches!(session.generate("A\nB"), Err(TournamentError::Unauthorized(_))));
        assert!(matches!(session.advance_winner(0, 0, 0), Err(TournamentError::Unauthorized(_))));
        assert!(matches!(session.clear(), Err(TournamentError::Unauthorized(_))));
        assert!(session.bracket().is_none());
        assert!(fx.audit.actions().is_empty());
    }

    #[test]
    fn test_generate_rejects_bad_counts_without_state_change() {
        let fx = fixture();
        let mut session = offline_session(&fx);
        session.login("alpha").unwrap();
        for text in [names(1), names(129)] {
            assert!(matches!(
                session.generate_with_rng(&text, &mut rng()),
                Err(TournamentError::Validation(_))
            ));
            assert!(session.bracket().is_none());
            assert_eq!(session.participants_text(), "");
        }
        assert_eq!(fx.local.load().unwrap(), None);
        assert!(fx.audit.actions().is_empty());
    }

    #[test]
    fn test_generate_offline_writes_local_blob() {
        let fx = fixture();
        let mut session = offline_session(&fx);
        session.login("alpha").unwrap();
        let notices = session.generate_with_rng(&names(5), &mut rng()).unwrap();
        assert_eq!(notices, vec![Notice::OddParticipantCount]);

        let bracket = session.bracket().unwrap();
        assert_eq!(bracket.round_count(), 3);
        assert_eq!(bracket.opening_players().len(), 5);

        let saved = fx.local.load().unwrap().unwrap();
        assert_eq!(saved.participants_text, names(5));
        assert_eq!(saved.bracket.as_ref(), session.bracket());
        assert_eq!(fx.audit.actions(), vec!["generate_bracket"]);
        assert_eq!(fx.audit.last().unwrap().details, json!({ "players_count": 5 }));
    }

    #[test]
    fn test_generate_with_existing_bracket_adds_late_entrants() {
        let fx = fixture();
        let mut session = offline_session(&fx);
        session.login("alpha").unwrap();
        session.generate_with_rng("A\nB\nC\nD", &mut rng()).unwrap();
        let before = session.bracket().unwrap().clone();

        session.generate_with_rng("A\nB\nC\nD\nE", &mut rng()).unwrap();
        let after = session.bracket().unwrap();
        assert_eq!(&after.rounds()[0][..2], &before.rounds()[0][..]);
        assert!(after.opening_players().contains(&"E"));

        let notices = session.generate_with_rng("A\nB\nC\nD\nE", &mut rng()).unwrap();
        assert_eq!(notices, vec![Notice::OddParticipantCount, Notice::NothingToAdd]);
    }

    #[test]
    fn test_advance_winner_by_slot() {
        let fx = fixture();
        let mut session = offline_session(&fx);
        session.login("alpha").unwrap();
        session.generate_with_rng("A\nB\nC\nD", &mut rng()).unwrap();
        let first = session.bracket().unwrap().get(0, 0).unwrap().clone();
        let winner = first.p2.clone().unwrap();

        session.advance_winner(0, 0, 1).unwrap();
        let bracket = session.bracket().unwrap();
        assert_eq!(bracket.get(0, 0).unwrap().winner.as_deref(), Some(winner.as_str()));
        assert_eq!(bracket.get(1, 0).unwrap().p1.as_deref(), Some(winner.as_str()));
        let entry = fx.audit.last().unwrap();
        assert_eq!(entry.action, "advance_winner");
        assert_eq!(entry.actor.as_deref(), Some("alpha"));
        assert_eq!(entry.details, json!({ "round": 0, "match": 0, "winner": winner }));
    }

    #[test]
    fn test_advance_winner_rejects_empty_slot_and_bad_index() {
        let fx = fixture();
        let mut session = offline_session(&fx);
        session.login("alpha").unwrap();
        assert!(matches!(session.advance_winner(0, 0, 0), Err(TournamentError::InvalidMove(_))));
        session.generate_with_rng("A\nB\nC", &mut rng()).unwrap();
        // Round 1 has not been reached yet.
        assert!(matches!(session.advance_winner(1, 0, 0), Err(TournamentError::InvalidMove(_))));
        assert!(matches!(session.advance_winner(0, 9, 0), Err(TournamentError::InvalidMove(_))));
        assert!(matches!(session.advance_winner(0, 0, 2), Err(TournamentError::InvalidMove(_))));
    }

    #[test]
    fn test_clear_resets_everything() {
        let fx = fixture();
        let mut session = offline_session(&fx);
        session.login("alpha").unwrap();
        session.generate_with_rng("A\nB", &mut rng()).unwrap();
        session.clear().unwrap();
        assert!(session.bracket().is_none());
        assert_eq!(session.participants_text(), "");
        assert_eq!(fx.local.load().unwrap(), Some(StoredState::default()));
        assert_eq!(fx.audit.actions(), vec!["generate_bracket", "clear_bracket"]);
    }

    #[test]
    fn test_load_prefers_remote_and_falls_back_to_local() {
        let fx = fixture();
        fx.local.save(&StoredState::new("Local", None)).unwrap();
        fx.remote
            .put("t1", None, &StoredState::new("Remote", None), "alpha")
            .unwrap();

        let mut session = online_session(&fx);
        session.load();
        assert_eq!(session.participants_text(), "Remote");

        fx.remote.set_offline(true);
        let mut fallback = online_session(&fx);
        fallback.load();
        assert_eq!(fallback.participants_text(), "Local");
    }

    #[test]
    fn test_load_prefills_sample_names_for_viewers() {
        let fx = fixture();
        let mut session = offline_session(&fx);
        session.load();
        assert_eq!(session.participants_text(), sample_participants_text());

        let mut admin = offline_session(&fx);
        admin.login("alpha").unwrap();
        admin.load();
        assert_eq!(admin.participants_text(), "");
    }

    #[test]
    fn test_online_push_audits_save_state_and_tracks_record() {
        let fx = fixture();
        let mut session = online_session(&fx);
        session.login("alpha").unwrap();
        session.generate_with_rng("A\nB", &mut rng()).unwrap();

        assert_eq!(session.sync_state(), SyncState::Clean);
        let stored = fx.remote.get("t1").unwrap().unwrap();
        assert_eq!(stored.state.bracket.as_ref(), session.bracket());
        assert_eq!(fx.audit.actions(), vec!["save_state", "generate_bracket"]);
        // Online writes do not touch the local blob.
        assert_eq!(fx.local.load().unwrap(), None);
    }

    #[test]
    fn test_failed_push_keeps_state_and_saves_locally() {
        let fx = fixture();
        let mut session = online_session(&fx);
        session.login("alpha").unwrap();
        fx.remote.set_offline(true);

        let notices = session.generate_with_rng("A\nB", &mut rng()).unwrap();
        assert_eq!(notices, vec![Notice::SyncFailed]);
        assert!(session.bracket().is_some());
        assert_eq!(session.sync_state(), SyncState::LocalDirty);
        assert_eq!(fx.local.load().unwrap().unwrap().bracket.as_ref(), session.bracket());
        assert_eq!(fx.audit.actions(), vec!["generate_bracket"]);

        // The next edit pushes again once the remote is back.
        fx.remote.set_offline(false);
        assert!(session.advance_winner(0, 0, 0).unwrap().is_empty());
        assert_eq!(session.sync_state(), SyncState::Clean);
        assert!(fx.remote.get("t1").unwrap().is_some());
    }

    #[test]
    fn test_own_echo_is_ignored_and_foreign_change_reloads() {
        let fx = fixture();
        let mut session = online_session(&fx);
        let (tx, rx) = mpsc::channel();
        session.subscribe(tx).unwrap();
        session.login("alpha").unwrap();
        session.generate_with_rng("A\nB", &mut rng()).unwrap();

        let echo = rx.try_recv().unwrap();
        assert_eq!(session.handle_remote_change(echo), RemoteAction::Ignored);

        // Another device overwrites the record.
        let known = fx.remote.get("t1").unwrap().unwrap().record_id;
        fx.remote
            .put("t1", Some(&known), &StoredState::new("X\nY", None), "beta")
            .unwrap();
        let foreign = rx.try_recv().unwrap();
        assert_eq!(session.handle_remote_change(foreign.clone()), RemoteAction::Reloaded);
        assert_eq!(session.participants_text(), "X\nY");
        assert!(session.bracket().is_none());
        assert_eq!(session.sync_state(), SyncState::Clean);

        // Seen once, the same record is now an echo.
        assert_eq!(session.handle_remote_change(foreign), RemoteAction::Ignored);
    }

    #[test]
    fn test_last_writer_wins_after_reload() {
        let fx = fixture();
        let mut ours = online_session(&fx);
        ours.login("alpha").unwrap();
        let mut theirs = online_session(&fx);
        theirs.login("alpha").unwrap();

        ours.generate_with_rng("A\nB", &mut rng()).unwrap();
        theirs.load();
        theirs.generate_with_rng("A\nB\nC\nD", &mut rng()).unwrap();

        let latest = fx.remote.get("t1").unwrap().unwrap();
        assert_eq!(ours.handle_remote_change(latest), RemoteAction::Reloaded);
        assert_eq!(ours.bracket(), theirs.bracket());
    }

    #[test]
    fn test_unsubscribe_stops_notifications() {
        let fx = fixture();
        let mut session = online_session(&fx);
        let (tx, _rx) = mpsc::channel();
        session.subscribe(tx).unwrap();
        assert_eq!(fx.remote.subscriber_count(), 1);
        session.unsubscribe();
        assert_eq!(fx.remote.subscriber_count(), 0);
    }

    #[test]
    fn test_snapshot_and_describe() {
        let fx = fixture();
        let mut session = offline_session(&fx);
        session.login("alpha").unwrap();
        session.generate_with_rng("A\nB\nC\nD", &mut rng()).unwrap();
        let snapshot = session.snapshot();
        assert!(snapshot.is_admin);
        assert_eq!(snapshot.tournament_id, "t1");
        assert_eq!(snapshot.view.rounds.len(), 2);
        assert_eq!(snapshot.view.rounds[1].title, "Final");
        assert_eq!(session.describe(0, 1).as_deref(), Some("Semi-finals • Match 2"));
        assert_eq!(session.describe(5, 0), None);
    }

    #[test]
    fn test_load_pads_snapshot_missing_receiving_matches() {
        let fx = fixture();
        let json = r#"[[{"p1":"A","p2":"B"},{"p1":"C","p2":"D"},{"p1":"E","p2":"F"}],[{}],[{}]]"#;
        let legacy: Bracket = serde_json::from_str(json).unwrap();
        fx.local.save(&StoredState::new("A\nB\nC\nD\nE\nF", Some(legacy))).unwrap();

        let mut session = offline_session(&fx);
        session.login("alpha").unwrap();
        session.load();
        let sizes: Vec<usize> = session.bracket().unwrap().rounds().iter().map(|r| r.len()).collect();
        assert_eq!(sizes, vec![3, 2, 1]);

        session.advance_winner(0, 2, 0).unwrap();
        let bracket = session.bracket().unwrap();
        assert_eq!(bracket.get(1, 1).unwrap().p1.as_deref(), Some("E"));
    }
}
