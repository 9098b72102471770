//! Blocking HTTP client for the portal's substitution monitor endpoint.
//!
//! - Uses `ureq` (no async).
//! - One POST per calendar date; the response body is returned verbatim so it
//!   can be stored as the raw day payload.
//! - Transport failures and 5xx answers are retried with a jittered pause;
//!   anything else is reported to the caller, which skips the date.

use http::StatusCode;
use log::{debug, warn};
use rand::Rng;
use serde::Serialize;
use std::num::NonZeroU32;
use std::thread;
use std::time::Duration;

const RETRY_BASE_DELAY: Duration = Duration::from_millis(750);
const RETRY_JITTER_MS: u64 = 500;

#[derive(Debug)]
pub enum PortalClientError {
    Transport(String),
    Http { status: u16, message: String },
    Json(serde_json::Error),
}

impl core::fmt::Display for PortalClientError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            PortalClientError::Transport(s) => write!(f, "transport error: {}", s),
            PortalClientError::Http { status, message } => write!(f, "http {}: {}", status, message),
            PortalClientError::Json(e) => write!(f, "json error: {}", e),
        }
    }
}

impl std::error::Error for PortalClientError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PortalClientError::Json(e) => Some(e),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for PortalClientError {
    fn from(value: serde_json::Error) -> Self {
        PortalClientError::Json(value)
    }
}

impl From<ureq::Error> for PortalClientError {
    fn from(value: ureq::Error) -> Self {
        PortalClientError::Transport(value.to_string())
    }
}

impl PortalClientError {
    fn is_retryable(&self) -> bool {
        match self {
            PortalClientError::Transport(_) => true,
            PortalClientError::Http { status, .. } => *status >= 500,
            PortalClientError::Json(_) => false,
        }
    }
}

/// Display options of the monitor view the payloads are requested with.
///
/// These mirror what the portal's own monitor page sends; only `date`
/// changes between requests.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorRequest {
    pub format_name: String,
    pub school_name: String,
    pub date: i32,
    pub date_offset: i32,
    pub strikethrough: bool,
    pub merge_blocks: bool,
    pub show_only_future_sub: bool,
    pub show_break_supervisions: bool,
    pub show_teacher: bool,
    pub show_class: bool,
    pub show_hour: bool,
    pub show_info: bool,
    pub show_room: bool,
    pub show_subject: bool,
    pub group_by: i32,
    pub hide_absent: bool,
    pub department_ids: Vec<i64>,
    pub department_element_type: i32,
    pub hide_cancel_with_substitution: bool,
    pub hide_cancel_caused_by_event: bool,
    pub show_time: bool,
    pub show_subst_text: bool,
    pub show_absent_elements: Vec<i64>,
    pub show_affected_elements: Vec<i64>,
    pub show_unit_time: bool,
    pub show_messages: bool,
    pub show_studentgroup: bool,
    pub enable_substitution_from: bool,
    pub show_substitution_from: i32,
    pub show_teacher_on_event: bool,
    pub show_absent_teacher: bool,
    pub strikethrough_absent_teacher: bool,
    pub activity_type_ids: Vec<i64>,
    pub show_event: bool,
    pub show_cancel: bool,
    pub show_only_cancel: bool,
    pub show_subst_type_color: bool,
    pub show_exam_supervision: bool,
    pub show_unheralded_exams: bool,
}

impl MonitorRequest {
    pub fn for_date(format_name: &str, school_name: &str, date: i32) -> Self {
        MonitorRequest {
            format_name: format_name.to_string(),
            school_name: school_name.to_string(),
            date,
            date_offset: 0,
            strikethrough: true,
            merge_blocks: true,
            show_only_future_sub: true,
            show_break_supervisions: false,
            show_teacher: true,
            show_class: true,
            show_hour: true,
            show_info: true,
            show_room: true,
            show_subject: true,
            group_by: 1,
            hide_absent: false,
            department_ids: Vec::new(),
            department_element_type: -1,
            hide_cancel_with_substitution: true,
            hide_cancel_caused_by_event: false,
            show_time: true,
            show_subst_text: true,
            show_absent_elements: Vec::new(),
            show_affected_elements: vec![1],
            show_unit_time: false,
            show_messages: true,
            show_studentgroup: false,
            enable_substitution_from: false,
            show_substitution_from: 0,
            show_teacher_on_event: false,
            show_absent_teacher: true,
            strikethrough_absent_teacher: true,
            activity_type_ids: Vec::new(),
            show_event: true,
            show_cancel: true,
            show_only_cancel: false,
            show_subst_type_color: false,
            show_exam_supervision: false,
            show_unheralded_exams: false,
        }
    }
}

pub struct PortalClient {
    agent: ureq::Agent,
    url: String,
    school_name: String,
    format_name: String,
    max_attempts: NonZeroU32,
}

impl PortalClient {
    pub fn new(
        url: impl Into<String>,
        school_name: impl Into<String>,
        format_name: impl Into<String>,
        timeout: Duration,
        max_attempts: NonZeroU32,
    ) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();
        PortalClient {
            agent: ureq::Agent::new_with_config(config),
            url: url.into(),
            school_name: school_name.into(),
            format_name: format_name.into(),
            max_attempts,
        }
    }

    /// Fetch the monitor payload for `date_yyyymmdd` and return its body.
    ///
    /// The body is only returned when it parses as JSON.
    pub fn fetch_day(&self, date_yyyymmdd: i32) -> Result<String, PortalClientError> {
        let body = MonitorRequest::for_date(&self.format_name, &self.school_name, date_yyyymmdd);
        let attempts = self.max_attempts.get();
        let mut attempt = 1;
        loop {
            match self.post_once(&body) {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() && attempt < attempts => {
                    let pause = RETRY_BASE_DELAY * attempt
                        + Duration::from_millis(rand::rng().random_range(0..=RETRY_JITTER_MS));
                    warn!(
                        "Portal request for {} failed (attempt {}/{}): {}; retrying in {}ms",
                        date_yyyymmdd,
                        attempt,
                        attempts,
                        e,
                        pause.as_millis()
                    );
                    thread::sleep(pause);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn post_once(&self, body: &MonitorRequest) -> Result<String, PortalClientError> {
        let mut resp = self
            .agent
            .post(&self.url)
            .query("school", &self.school_name)
            .header("Accept", "application/json")
            .send_json(body)?;

        let status = resp.status();
        let text = resp.body_mut().read_to_string()?;
        if status != StatusCode::OK {
            return Err(PortalClientError::Http {
                status: status.as_u16(),
                message: text,
            });
        }

        // validate only; the raw text is what gets stored
        serde_json::from_str::<serde_json::Value>(&text)?;
        debug!("Portal answered {} bytes for date {}", text.len(), body.date);
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_body_uses_portal_field_names() {
        let body = serde_json::to_value(MonitorRequest::for_date("Web-Schüler-heute", "demo-school", 20251208)).unwrap();
        assert_eq!(body["date"], 20251208);
        assert_eq!(body["schoolName"], "demo-school");
        assert_eq!(body["formatName"], "Web-Schüler-heute");
        assert_eq!(body["showAffectedElements"], serde_json::json!([1]));
        assert_eq!(body["departmentElementType"], -1);
        assert_eq!(body["hideCancelWithSubstitution"], true);
    }

    #[test]
    fn only_transport_and_server_errors_are_retried() {
        assert!(PortalClientError::Transport("reset".into()).is_retryable());
        assert!(PortalClientError::Http { status: 503, message: String::new() }.is_retryable());
        assert!(!PortalClientError::Http { status: 404, message: String::new() }.is_retryable());
        let json_err = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert!(!PortalClientError::from(json_err).is_retryable());
    }
}
