use serde::Deserialize;
use serde_json::{json, Value};

/// Caller identity as asserted by the host framework. The engine does not authenticate;
/// it only evaluates the gate.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub can_update_course: bool,
}

impl Session {
    pub fn from_params(params: &Value) -> Self {
        params
            .get("session")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }

    pub fn may_update_course(&self) -> bool {
        self.user_id.is_some() && self.can_update_course
    }
}

/// Result of a gated mutation. `Denied` and `Unchanged` are both silent no-ops for the
/// legacy string surface but stay distinguishable here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Applied(T),
    Unchanged,
    Denied,
}

impl<T> Outcome<T> {
    pub fn status(&self) -> &'static str {
        match self {
            Outcome::Applied(_) => "applied",
            Outcome::Unchanged => "unchanged",
            Outcome::Denied => "denied",
        }
    }
}

impl<T: ToString> Outcome<T> {
    /// The legacy single-string body: the value when applied, `""` otherwise.
    pub fn legacy_value(&self) -> String {
        match self {
            Outcome::Applied(v) => v.to_string(),
            Outcome::Unchanged | Outcome::Denied => String::new(),
        }
    }

    pub fn to_json(&self) -> Value {
        json!({
            "status": self.status(),
            "value": self.legacy_value(),
        })
    }
}

/// Runs `f` only when the session may update the course.
pub fn gated<T, E>(
    session: &Session,
    f: impl FnOnce() -> Result<Outcome<T>, E>,
) -> Result<Outcome<T>, E> {
    if !session.may_update_course() {
        tracing::info!(user_id = ?session.user_id, "mutation denied by course-update gate");
        return Ok(Outcome::Denied);
    }
    f()
}
