//! Remote replicated store access for group sessions.
//!
//! [`HttpGroupRemote`] speaks the PostgREST dialect of the hosted backend:
//! filter expressions in the query string, JSON rows in and out, and a
//! unique-violation on the invite-code column surfacing as HTTP 409.
//! Calls carry a short fixed timeout; anything that fails transport-wise
//! maps to [`GroupError::RemoteUnavailable`] and leaves local state alone.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use url::Url;

use crate::error::GroupError;
use crate::session::{GroupMember, GroupSession, GroupStatus, MemberStatus};

/// Fixed grace period for remote calls before they count as failed.
const REMOTE_TIMEOUT: std::time::Duration = std::time::Duration::from_secs(5);

/// Access to the replicated group-session store.
pub trait GroupRemote {
    /// Insert a new session. [`GroupError::CodeCollision`] when the
    /// invite code is already taken by a non-terminal session.
    fn insert_session(&self, session: &GroupSession) -> Result<(), GroupError>;

    /// Resolve an invite code against non-terminal sessions only.
    fn fetch_by_code(&self, code: &str) -> Result<Option<GroupSession>, GroupError>;

    /// The user's soonest non-terminal session, if any.
    fn fetch_current(&self, user_id: &str) -> Result<Option<GroupSession>, GroupError>;

    /// Add a member. Adding an existing member is a success.
    fn add_member(&self, session_id: &str, user_id: &str) -> Result<(), GroupError>;

    fn remove_member(&self, session_id: &str, user_id: &str) -> Result<(), GroupError>;

    fn set_status(&self, session_id: &str, status: GroupStatus) -> Result<(), GroupError>;
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionRow {
    id: String,
    invite_code: String,
    creator_id: String,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    duration_minutes: i64,
    blocked_apps: Vec<String>,
    strict_mode: bool,
    status: GroupStatus,
}

impl SessionRow {
    fn from_session(session: &GroupSession) -> Self {
        Self {
            id: session.id.clone(),
            invite_code: session.invite_code.clone(),
            creator_id: session.creator_id.clone(),
            start_time: session.start_time,
            end_time: session.end_time,
            duration_minutes: session.duration_minutes,
            blocked_apps: session.blocked_apps.clone(),
            strict_mode: session.strict,
            status: session.status,
        }
    }

    fn into_session(self, members: Vec<GroupMember>) -> GroupSession {
        GroupSession {
            id: self.id,
            invite_code: self.invite_code,
            creator_id: self.creator_id,
            start_time: self.start_time,
            end_time: self.end_time,
            duration_minutes: self.duration_minutes,
            blocked_apps: self.blocked_apps,
            strict: self.strict_mode,
            status: self.status,
            members,
        }
    }
}

#[derive(Debug, Deserialize)]
struct MemberRow {
    #[serde(default)]
    session_id: String,
    user_id: String,
    status: MemberStatus,
}

/// HTTP client for the replicated store.
pub struct HttpGroupRemote {
    base: Url,
    api_key: String,
    client: reqwest::Client,
    rt: tokio::runtime::Runtime,
}

impl HttpGroupRemote {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, GroupError> {
        let base = Url::parse(base_url)
            .map_err(|e| GroupError::RemoteUnavailable(format!("bad base url: {e}")))?;
        let client = reqwest::Client::builder()
            .timeout(REMOTE_TIMEOUT)
            .build()
            .map_err(|e| GroupError::RemoteUnavailable(e.to_string()))?;
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| GroupError::RemoteUnavailable(e.to_string()))?;
        Ok(Self {
            base,
            api_key: api_key.to_string(),
            client,
            rt,
        })
    }

    fn endpoint(&self, table: &str) -> Result<Url, GroupError> {
        self.base
            .join(table)
            .map_err(|e| GroupError::RemoteUnavailable(e.to_string()))
    }

    fn request(&self, method: reqwest::Method, url: Url) -> reqwest::RequestBuilder {
        self.client
            .request(method, url)
            .header("apikey", &self.api_key)
            .header("Authorization", format!("Bearer {}", self.api_key))
    }

    fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, GroupError> {
        self.rt
            .block_on(async move { req.send().await })
            .map_err(|e| GroupError::RemoteUnavailable(e.to_string()))
    }

    fn read_json<T: for<'de> Deserialize<'de>>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, GroupError> {
        self.rt
            .block_on(resp.json::<T>())
            .map_err(|e| GroupError::RemoteUnavailable(format!("bad response body: {e}")))
    }

    fn members_of(&self, session_id: &str) -> Result<Vec<GroupMember>, GroupError> {
        let mut url = self.endpoint("focus_group_members")?;
        url.query_pairs_mut()
            .append_pair("session_id", &format!("eq.{session_id}"))
            .append_pair("select", "session_id,user_id,status");
        let resp = self.send(self.request(reqwest::Method::GET, url))?;
        if !resp.status().is_success() {
            return Err(GroupError::RemoteUnavailable(format!(
                "members fetch: HTTP {}",
                resp.status()
            )));
        }
        let rows: Vec<MemberRow> = self.read_json(resp)?;
        Ok(rows
            .into_iter()
            .map(|r| GroupMember {
                user_id: r.user_id,
                status: r.status,
            })
            .collect())
    }

    fn first_session(&self, url: Url) -> Result<Option<GroupSession>, GroupError> {
        let resp = self.send(self.request(reqwest::Method::GET, url))?;
        if !resp.status().is_success() {
            return Err(GroupError::RemoteUnavailable(format!(
                "session fetch: HTTP {}",
                resp.status()
            )));
        }
        let rows: Vec<SessionRow> = self.read_json(resp)?;
        let Some(row) = rows.into_iter().next() else {
            return Ok(None);
        };
        let members = self.members_of(&row.id)?;
        Ok(Some(row.into_session(members)))
    }
}

impl GroupRemote for HttpGroupRemote {
    fn insert_session(&self, session: &GroupSession) -> Result<(), GroupError> {
        let url = self.endpoint("focus_group_sessions")?;
        let resp = self.send(
            self.request(reqwest::Method::POST, url).json(&SessionRow::from_session(session)),
        )?;
        match resp.status() {
            s if s.is_success() => Ok(()),
            reqwest::StatusCode::CONFLICT => Err(GroupError::CodeCollision),
            s => Err(GroupError::RemoteUnavailable(format!("insert: HTTP {s}"))),
        }
    }

    fn fetch_by_code(&self, code: &str) -> Result<Option<GroupSession>, GroupError> {
        let mut url = self.endpoint("focus_group_sessions")?;
        url.query_pairs_mut()
            .append_pair("invite_code", &format!("eq.{code}"))
            .append_pair("status", "in.(scheduled,active)")
            .append_pair("limit", "1");
        self.first_session(url)
    }

    fn fetch_current(&self, user_id: &str) -> Result<Option<GroupSession>, GroupError> {
        let mut url = self.endpoint("focus_group_members")?;
        url.query_pairs_mut()
            .append_pair("user_id", &format!("eq.{user_id}"))
            .append_pair("select", "session_id,user_id,status");
        let resp = self.send(self.request(reqwest::Method::GET, url))?;
        if !resp.status().is_success() {
            return Err(GroupError::RemoteUnavailable(format!(
                "membership fetch: HTTP {}",
                resp.status()
            )));
        }
        let rows: Vec<MemberRow> = self.read_json(resp)?;
        if rows.is_empty() {
            return Ok(None);
        }
        let ids: Vec<String> = rows.into_iter().map(|r| r.session_id).collect();

        let mut url = self.endpoint("focus_group_sessions")?;
        url.query_pairs_mut()
            .append_pair("id", &format!("in.({})", ids.join(",")))
            .append_pair("status", "in.(scheduled,active)")
            .append_pair("order", "start_time.asc")
            .append_pair("limit", "1");
        self.first_session(url)
    }

    fn add_member(&self, session_id: &str, user_id: &str) -> Result<(), GroupError> {
        let url = self.endpoint("focus_group_members")?;
        let resp = self.send(self.request(reqwest::Method::POST, url).json(&json!({
            "session_id": session_id,
            "user_id": user_id,
            "status": "accepted",
        })))?;
        match resp.status() {
            s if s.is_success() => Ok(()),
            // Already a member; treat as joined.
            reqwest::StatusCode::CONFLICT => Ok(()),
            s => Err(GroupError::RemoteUnavailable(format!("join: HTTP {s}"))),
        }
    }

    fn remove_member(&self, session_id: &str, user_id: &str) -> Result<(), GroupError> {
        let mut url = self.endpoint("focus_group_members")?;
        url.query_pairs_mut()
            .append_pair("session_id", &format!("eq.{session_id}"))
            .append_pair("user_id", &format!("eq.{user_id}"));
        let resp = self.send(self.request(reqwest::Method::DELETE, url))?;
        if !resp.status().is_success() {
            return Err(GroupError::RemoteUnavailable(format!(
                "leave: HTTP {}",
                resp.status()
            )));
        }
        Ok(())
    }

    fn set_status(&self, session_id: &str, status: GroupStatus) -> Result<(), GroupError> {
        let mut url = self.endpoint("focus_group_sessions")?;
        url.query_pairs_mut()
            .append_pair("id", &format!("eq.{session_id}"));
        let resp = self.send(
            self.request(reqwest::Method::PATCH, url)
                .json(&json!({ "status": status.as_str() })),
        )?;
        if !resp.status().is_success() {
            return Err(GroupError::RemoteUnavailable(format!(
                "status update: HTTP {}",
                resp.status()
            )));
        }
        Ok(())
    }
}
