//! Group focus sessions shared synchronously by several participants.
//!
//! The replicated store owns the lifecycle; this adapter translates it
//! into the same local activation calls used by solo and scheduled
//! sessions. It holds no state beyond the last-fetched snapshot.

pub mod remote;

pub use remote::{GroupRemote, HttpGroupRemote};

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use uuid::Uuid;

use crate::error::GroupError;
use crate::session::{AppId, GroupMember, GroupSession, GroupStatus, MemberStatus};

/// Invite-code alphabet with the ambiguous characters (I, L, O, 0, 1)
/// removed.
pub const INVITE_CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";

pub const INVITE_CODE_LEN: usize = 6;

/// How many fresh codes to try before giving up on creation.
const MAX_CODE_ATTEMPTS: u32 = 5;

pub fn generate_invite_code<R: Rng>(rng: &mut R) -> String {
    (0..INVITE_CODE_LEN)
        .map(|_| {
            let idx = rng.gen_range(0..INVITE_CODE_ALPHABET.len());
            INVITE_CODE_ALPHABET[idx] as char
        })
        .collect()
}

/// A status transition observed on (or driven into) the replicated store,
/// for the lifecycle controller to act on.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupEvent {
    Activated(GroupSession),
    Ended(String),
    Cancelled(String),
}

pub struct GroupSyncAdapter<R: GroupRemote> {
    remote: R,
    user_id: String,
    snapshot: Option<GroupSession>,
}

impl<R: GroupRemote> GroupSyncAdapter<R> {
    pub fn new(remote: R, user_id: String) -> Self {
        Self {
            remote,
            user_id,
            snapshot: None,
        }
    }

    /// The last-fetched non-terminal session, if any.
    pub fn snapshot(&self) -> Option<&GroupSession> {
        self.snapshot.as_ref()
    }

    /// Create a session, retrying the invite code on collision up to a
    /// fixed bound. The creator joins as an accepted member.
    pub fn create(
        &mut self,
        start_time: DateTime<Utc>,
        duration_minutes: i64,
        blocked_apps: Vec<AppId>,
        strict: bool,
    ) -> Result<GroupSession, GroupError> {
        let end_time = start_time + Duration::minutes(duration_minutes);
        let mut rng = rand::thread_rng();

        for _ in 0..MAX_CODE_ATTEMPTS {
            let session = GroupSession {
                id: Uuid::new_v4().to_string(),
                invite_code: generate_invite_code(&mut rng),
                creator_id: self.user_id.clone(),
                start_time,
                end_time,
                duration_minutes,
                blocked_apps: blocked_apps.clone(),
                strict,
                status: GroupStatus::Scheduled,
                members: vec![GroupMember {
                    user_id: self.user_id.clone(),
                    status: MemberStatus::Accepted,
                }],
            };
            match self.remote.insert_session(&session) {
                Ok(()) => {
                    self.remote.add_member(&session.id, &self.user_id)?;
                    self.snapshot = Some(session.clone());
                    return Ok(session);
                }
                Err(GroupError::CodeCollision) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(GroupError::CodeCollision)
    }

    /// Join a session by invite code. Fails with [`GroupError::JoinInvalid`]
    /// when the code resolves to nothing joinable and with
    /// [`GroupError::JoinExpired`] when the window is already over.
    pub fn join_by_code(
        &mut self,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<GroupSession, GroupError> {
        let normalized = code.trim().to_uppercase();
        let session = self
            .remote
            .fetch_by_code(&normalized)?
            .ok_or(GroupError::JoinInvalid)?;
        if session.end_time <= now {
            return Err(GroupError::JoinExpired);
        }
        self.remote.add_member(&session.id, &self.user_id)?;
        self.snapshot = Some(session.clone());
        Ok(session)
    }

    /// Cancel a session (creator only, enforced by the remote store).
    pub fn cancel(&mut self, session_id: &str) -> Result<(), GroupError> {
        self.remote.set_status(session_id, GroupStatus::Cancelled)?;
        if self.snapshot.as_ref().map(|s| s.id.as_str()) == Some(session_id) {
            self.snapshot = None;
        }
        Ok(())
    }

    /// Leave a session without affecting the other members.
    pub fn leave(&mut self, session_id: &str) -> Result<(), GroupError> {
        self.remote.remove_member(session_id, &self.user_id)?;
        if self.snapshot.as_ref().map(|s| s.id.as_str()) == Some(session_id) {
            self.snapshot = None;
        }
        Ok(())
    }

    /// Fetch the current session, drive the time-based transitions the
    /// clients own (`scheduled -> active` at start, `-> ended` at end),
    /// and report every observed status change since the last snapshot.
    pub fn refresh(&mut self, now: DateTime<Utc>) -> Result<Vec<GroupEvent>, GroupError> {
        let fetched = self.remote.fetch_current(&self.user_id)?;

        let current = match fetched {
            Some(mut session) => {
                if session.status == GroupStatus::Scheduled
                    && now >= session.start_time
                    && now < session.end_time
                {
                    self.remote.set_status(&session.id, GroupStatus::Active)?;
                    session.status = GroupStatus::Active;
                } else if !session.status.is_terminal() && now >= session.end_time {
                    self.remote.set_status(&session.id, GroupStatus::Ended)?;
                    session.status = GroupStatus::Ended;
                }
                Some(session)
            }
            None => None,
        };

        let mut events = Vec::new();
        let previous = self
            .snapshot
            .as_ref()
            .map(|s| (s.id.clone(), s.status, s.end_time));

        match (&current, previous) {
            (Some(session), previous) => {
                let changed = previous
                    .map(|(pid, pstatus, _)| pid != session.id || pstatus != session.status)
                    .unwrap_or(true);
                if changed {
                    match session.status {
                        GroupStatus::Active => events.push(GroupEvent::Activated(session.clone())),
                        GroupStatus::Ended => events.push(GroupEvent::Ended(session.id.clone())),
                        GroupStatus::Cancelled => {
                            events.push(GroupEvent::Cancelled(session.id.clone()))
                        }
                        GroupStatus::Scheduled => {}
                    }
                }
            }
            (None, Some((pid, pstatus, pend))) => {
                // The session vanished from the non-terminal set. Past its
                // end it ran out; otherwise it was cancelled remotely.
                if !pstatus.is_terminal() {
                    if now >= pend {
                        events.push(GroupEvent::Ended(pid));
                    } else {
                        events.push(GroupEvent::Cancelled(pid));
                    }
                }
            }
            (None, None) => {}
        }

        self.snapshot = current.filter(|s| !s.status.is_terminal());
        Ok(events)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;

    #[derive(Default)]
    struct MockRemote {
        sessions: RefCell<HashMap<String, GroupSession>>,
        members: RefCell<Vec<(String, String)>>,
        collide_next: Cell<u32>,
        fail: Cell<bool>,
    }

    impl MockRemote {
        fn seed(&self, session: GroupSession) {
            self.sessions
                .borrow_mut()
                .insert(session.id.clone(), session);
        }
    }

    impl GroupRemote for &MockRemote {
        fn insert_session(&self, session: &GroupSession) -> Result<(), GroupError> {
            if self.fail.get() {
                return Err(GroupError::RemoteUnavailable("down".into()));
            }
            if self.collide_next.get() > 0 {
                self.collide_next.set(self.collide_next.get() - 1);
                return Err(GroupError::CodeCollision);
            }
            self.seed(session.clone());
            Ok(())
        }

        fn fetch_by_code(&self, code: &str) -> Result<Option<GroupSession>, GroupError> {
            Ok(self
                .sessions
                .borrow()
                .values()
                .find(|s| s.invite_code == code && !s.status.is_terminal())
                .cloned())
        }

        fn fetch_current(&self, user_id: &str) -> Result<Option<GroupSession>, GroupError> {
            let members = self.members.borrow();
            let mut found: Vec<GroupSession> = self
                .sessions
                .borrow()
                .values()
                .filter(|s| !s.status.is_terminal())
                .filter(|s| {
                    members
                        .iter()
                        .any(|(sid, uid)| sid == &s.id && uid == user_id)
                })
                .cloned()
                .collect();
            found.sort_by_key(|s| s.start_time);
            Ok(found.into_iter().next())
        }

        fn add_member(&self, session_id: &str, user_id: &str) -> Result<(), GroupError> {
            let mut members = self.members.borrow_mut();
            let entry = (session_id.to_string(), user_id.to_string());
            if !members.contains(&entry) {
                members.push(entry);
            }
            Ok(())
        }

        fn remove_member(&self, session_id: &str, user_id: &str) -> Result<(), GroupError> {
            self.members
                .borrow_mut()
                .retain(|(sid, uid)| !(sid == session_id && uid == user_id));
            Ok(())
        }

        fn set_status(&self, session_id: &str, status: GroupStatus) -> Result<(), GroupError> {
            let mut sessions = self.sessions.borrow_mut();
            let session = sessions
                .get_mut(session_id)
                .ok_or(GroupError::JoinInvalid)?;
            session.status = status;
            Ok(())
        }
    }

    fn scheduled_session(now: DateTime<Utc>, code: &str, offset_mins: i64) -> GroupSession {
        GroupSession {
            id: format!("g-{code}"),
            invite_code: code.to_string(),
            creator_id: "creator".into(),
            start_time: now + Duration::minutes(offset_mins),
            end_time: now + Duration::minutes(offset_mins + 60),
            duration_minutes: 60,
            blocked_apps: vec!["instagram".into()],
            strict: true,
            status: GroupStatus::Scheduled,
            members: vec![],
        }
    }

    #[test]
    fn invite_codes_use_the_unambiguous_alphabet() {
        let mut rng = rand::thread_rng();
        for _ in 0..50 {
            let code = generate_invite_code(&mut rng);
            assert_eq!(code.len(), INVITE_CODE_LEN);
            assert!(code.bytes().all(|b| INVITE_CODE_ALPHABET.contains(&b)));
        }
    }

    #[test]
    fn create_retries_on_collision() {
        let remote = MockRemote::default();
        remote.collide_next.set(2);
        let mut adapter = GroupSyncAdapter::new(&remote, "user-1".into());

        let session = adapter
            .create(Utc::now() + Duration::minutes(5), 60, vec!["a".into()], true)
            .unwrap();
        assert_eq!(session.creator_id, "user-1");
        assert_eq!(remote.sessions.borrow().len(), 1);
        // Creator is a member.
        assert!(remote
            .members
            .borrow()
            .iter()
            .any(|(sid, uid)| sid == &session.id && uid == "user-1"));
    }

    #[test]
    fn create_gives_up_after_bounded_retries() {
        let remote = MockRemote::default();
        remote.collide_next.set(10);
        let mut adapter = GroupSyncAdapter::new(&remote, "user-1".into());

        let err = adapter
            .create(Utc::now(), 60, vec!["a".into()], false)
            .unwrap_err();
        assert!(matches!(err, GroupError::CodeCollision));
    }

    #[test]
    fn join_unknown_code_is_invalid() {
        let remote = MockRemote::default();
        let mut adapter = GroupSyncAdapter::new(&remote, "user-2".into());
        let err = adapter.join_by_code("ZZZZZZ", Utc::now()).unwrap_err();
        assert!(matches!(err, GroupError::JoinInvalid));
    }

    #[test]
    fn join_after_end_time_is_expired_not_invalid() {
        let now = Utc::now();
        let remote = MockRemote::default();
        // Window entirely in the past, but status never flipped remotely.
        remote.seed(scheduled_session(now, "ABC234", -120));
        let mut adapter = GroupSyncAdapter::new(&remote, "user-2".into());

        let err = adapter.join_by_code("abc234", now).unwrap_err();
        assert!(matches!(err, GroupError::JoinExpired));
    }

    #[test]
    fn join_normalizes_code_case_and_whitespace() {
        let now = Utc::now();
        let remote = MockRemote::default();
        remote.seed(scheduled_session(now, "ABC234", 5));
        let mut adapter = GroupSyncAdapter::new(&remote, "user-2".into());

        let session = adapter.join_by_code("  abc234 ", now).unwrap();
        assert_eq!(session.invite_code, "ABC234");
        assert!(remote
            .members
            .borrow()
            .iter()
            .any(|(_, uid)| uid == "user-2"));
    }

    #[test]
    fn refresh_activates_when_window_opens() {
        let now = Utc::now();
        let remote = MockRemote::default();
        let session = scheduled_session(now, "ABC234", 5);
        remote.seed(session.clone());
        (&remote).add_member(&session.id, "user-2").unwrap();
        let mut adapter = GroupSyncAdapter::new(&remote, "user-2".into());

        // Before the window: nothing.
        assert!(adapter.refresh(now).unwrap().is_empty());

        // Window open: Activated, remote status updated.
        let events = adapter.refresh(now + Duration::minutes(5)).unwrap();
        assert!(matches!(&events[..], [GroupEvent::Activated(s)] if s.id == session.id));
        assert_eq!(
            remote.sessions.borrow()[&session.id].status,
            GroupStatus::Active
        );

        // No duplicate activation on the next poll.
        assert!(adapter.refresh(now + Duration::minutes(6)).unwrap().is_empty());

        // Window over: Ended.
        let events = adapter.refresh(now + Duration::minutes(66)).unwrap();
        assert!(matches!(&events[..], [GroupEvent::Ended(id)] if id == &session.id));
    }

    #[test]
    fn refresh_reports_remote_cancellation() {
        let now = Utc::now();
        let remote = MockRemote::default();
        let session = scheduled_session(now, "ABC234", 5);
        remote.seed(session.clone());
        (&remote).add_member(&session.id, "user-2").unwrap();
        let mut adapter = GroupSyncAdapter::new(&remote, "user-2".into());
        adapter.refresh(now).unwrap();
        assert!(adapter.snapshot().is_some());

        (&remote).set_status(&session.id, GroupStatus::Cancelled).unwrap();
        let events = adapter.refresh(now + Duration::minutes(1)).unwrap();
        assert!(matches!(&events[..], [GroupEvent::Cancelled(id)] if id == &session.id));
        assert!(adapter.snapshot().is_none());
    }

    #[test]
    fn remote_failure_leaves_local_state_untouched() {
        let now = Utc::now();
        let remote = MockRemote::default();
        let session = scheduled_session(now, "ABC234", 5);
        remote.seed(session.clone());
        (&remote).add_member(&session.id, "user-2").unwrap();
        let mut adapter = GroupSyncAdapter::new(&remote, "user-2".into());
        adapter.refresh(now).unwrap();

        remote.fail.set(true);
        let err = adapter
            .create(now, 60, vec!["a".into()], false)
            .unwrap_err();
        assert!(matches!(err, GroupError::RemoteUnavailable(_)));
        // Snapshot unchanged.
        assert_eq!(adapter.snapshot().map(|s| s.id.as_str()), Some(session.id.as_str()));
    }
}
