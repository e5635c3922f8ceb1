//! HTTP bridges to the hosted backend.
//!
//! Tickets, staff profiles and the notification log live in the backend's
//! REST tables. Email, SMS and push go through the backend's relay functions,
//! which own the actual providers.

use crate::config::BackendConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use escalation_core::{
    AuditLog, CollaboratorError, EmailTransport, Metadata, NewTicket, NotifyChannel,
    PushTransport, SmsTransport, StaffDirectory, StaffMember, TicketStore,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;

const TICKETS_TABLE: &str = "rest/v1/support_tickets";
const PROFILES_TABLE: &str = "rest/v1/profiles";
const NOTIFICATION_LOG_TABLE: &str = "rest/v1/notification_log";
const SEND_EMAIL_FN: &str = "functions/v1/send-email";
const SEND_SMS_FN: &str = "functions/v1/send-sms";
const SEND_PUSH_FN: &str = "functions/v1/send-push";

/// Authenticated HTTP client for the backend.
#[derive(Clone)]
pub struct BackendClient {
    base_url: String,
    api_key: String,
    http: reqwest::Client,
}

impl BackendClient {
    pub fn new(config: &BackendConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to build backend HTTP client")?;
        Ok(Self {
            base_url: config.url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    async fn post(&self, path: &str, body: &Value) -> Result<reqwest::Response, CollaboratorError> {
        let response = self
            .http
            .post(self.url(path))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .header("Prefer", "return=representation")
            .json(body)
            .send()
            .await
            .map_err(|e| CollaboratorError::Unavailable(e.to_string()))?;
        check_status(response).await
    }

    fn get_request(&self, path: &str, query: &[(&str, String)]) -> reqwest::RequestBuilder {
        self.http
            .get(self.url(path))
            .query(query)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn get(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<reqwest::Response, CollaboratorError> {
        let response = self
            .get_request(path, query)
            .send()
            .await
            .map_err(|e| CollaboratorError::Unavailable(e.to_string()))?;
        check_status(response).await
    }
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, CollaboratorError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(CollaboratorError::Rejected(format!("backend error ({status}): {body}")))
}

async fn rows(response: reqwest::Response) -> Result<Vec<Value>, CollaboratorError> {
    response
        .json::<Vec<Value>>()
        .await
        .map_err(|e| CollaboratorError::Malformed(e.to_string()))
}

/// Filter selecting profiles holding any of `roles`.
fn staff_query(roles: &[&str]) -> Vec<(&'static str, String)> {
    vec![
        ("role", format!("in.({})", roles.join(","))),
        (
            "select",
            "id,full_name,role,email,phone,push_token".to_string(),
        ),
    ]
}

fn ticket_number_query(ticket_id: &str) -> Vec<(&'static str, String)> {
    vec![
        ("id", format!("eq.{ticket_id}")),
        ("select", "ticket_number".to_string()),
    ]
}

fn ticket_row(ticket: &NewTicket) -> Value {
    json!({
        "customer_id": ticket.customer_id,
        "session_id": ticket.session_id,
        "escalation_reason": ticket.reason,
        "priority": ticket.priority,
        "status": "open",
        "source": "chatbot",
        "metadata": ticket.metadata,
    })
}

/// Text form of a scalar column that may be stored as number or string.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[derive(Debug, Deserialize)]
struct ProfileRow {
    id: String,
    #[serde(default)]
    full_name: Option<String>,
    #[serde(default)]
    role: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default)]
    push_token: Option<String>,
}

impl From<ProfileRow> for StaffMember {
    fn from(row: ProfileRow) -> Self {
        StaffMember {
            id: row.id,
            name: row.full_name,
            role: row.role,
            email: row.email,
            phone: row.phone,
            push_token: row.push_token,
        }
    }
}

/// Ticket store, staff directory and audit log over the REST tables.
#[derive(Clone)]
pub struct RestBackend {
    client: BackendClient,
}

impl RestBackend {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TicketStore for RestBackend {
    async fn create_ticket(&self, ticket: NewTicket) -> Result<String, CollaboratorError> {
        let response = self.client.post(TICKETS_TABLE, &ticket_row(&ticket)).await?;
        let created = rows(response).await?;
        let id = created
            .first()
            .and_then(|row| scalar_text(&row["id"]))
            .ok_or_else(|| CollaboratorError::Malformed("insert returned no ticket id".into()))?;
        debug!(ticket_id = %id, "ticket row inserted");
        Ok(id)
    }

    async fn get_ticket_number(&self, ticket_id: &str) -> Result<String, CollaboratorError> {
        let response = self
            .client
            .get(TICKETS_TABLE, &ticket_number_query(ticket_id))
            .await?;
        rows(response)
            .await?
            .first()
            .and_then(|row| scalar_text(&row["ticket_number"]))
            .ok_or_else(|| CollaboratorError::NotFound(ticket_id.to_string()))
    }
}

#[async_trait]
impl StaffDirectory for RestBackend {
    async fn list_staff_by_roles(
        &self,
        roles: &[&str],
    ) -> Result<Vec<StaffMember>, CollaboratorError> {
        let response = self.client.get(PROFILES_TABLE, &staff_query(roles)).await?;
        let profiles: Vec<ProfileRow> = response
            .json()
            .await
            .map_err(|e| CollaboratorError::Malformed(e.to_string()))?;
        Ok(profiles.into_iter().map(StaffMember::from).collect())
    }
}

#[async_trait]
impl AuditLog for RestBackend {
    async fn append(
        &self,
        user_id: &str,
        ticket_id: &str,
        channel: NotifyChannel,
        metadata: Metadata,
    ) -> Result<(), CollaboratorError> {
        let body = json!({
            "user_id": user_id,
            "ticket_id": ticket_id,
            "channel": channel,
            "metadata": metadata,
        });
        self.client.post(NOTIFICATION_LOG_TABLE, &body).await?;
        Ok(())
    }
}

/// Email, SMS and push through the backend's relay functions.
#[derive(Clone)]
pub struct RelayTransport {
    client: BackendClient,
}

impl RelayTransport {
    pub fn new(client: BackendClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl EmailTransport for RelayTransport {
    async fn send_email(
        &self,
        to: &str,
        subject: &str,
        html_body: &str,
    ) -> Result<(), CollaboratorError> {
        let body = json!({ "to": to, "subject": subject, "html": html_body });
        self.client.post(SEND_EMAIL_FN, &body).await?;
        Ok(())
    }
}

#[async_trait]
impl SmsTransport for RelayTransport {
    async fn send_sms(&self, to: &str, body: &str) -> Result<(), CollaboratorError> {
        let payload = json!({ "to": to, "body": body });
        self.client.post(SEND_SMS_FN, &payload).await?;
        Ok(())
    }
}

#[async_trait]
impl PushTransport for RelayTransport {
    async fn send_push(
        &self,
        token: &str,
        title: &str,
        body: &str,
    ) -> Result<(), CollaboratorError> {
        let payload = json!({ "token": token, "title": title, "body": body });
        self.client.post(SEND_PUSH_FN, &payload).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use escalation_core::{EscalationPriority, ELIGIBLE_ROLES};

    fn client(url: &str) -> BackendClient {
        BackendClient::new(&BackendConfig {
            url: url.to_string(),
            api_key: "k".to_string(),
            request_timeout_secs: 5,
        })
        .unwrap()
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        let c = client("https://db.example.com/");
        assert_eq!(
            c.url(TICKETS_TABLE),
            "https://db.example.com/rest/v1/support_tickets"
        );
    }

    fn query_pairs(request: &reqwest::Request) -> Vec<(String, String)> {
        request
            .url()
            .query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn test_staff_query_lists_roles() {
        let request = client("https://db.example.com")
            .get_request(PROFILES_TABLE, &staff_query(&ELIGIBLE_ROLES))
            .build()
            .unwrap();
        assert_eq!(request.url().path(), "/rest/v1/profiles");
        assert_eq!(
            query_pairs(&request),
            vec![
                ("role".to_string(), "in.(admin,manager,dispatcher)".to_string()),
                (
                    "select".to_string(),
                    "id,full_name,role,email,phone,push_token".to_string()
                ),
            ]
        );
    }

    #[test]
    fn test_ticket_id_is_encoded_in_query() {
        let request = client("https://db.example.com")
            .get_request(TICKETS_TABLE, &ticket_number_query("a&select=*"))
            .build()
            .unwrap();
        let pairs = query_pairs(&request);
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0], ("id".to_string(), "eq.a&select=*".to_string()));
        assert_eq!(pairs[1], ("select".to_string(), "ticket_number".to_string()));
        assert!(!request.url().query().unwrap_or_default().contains("a&select"));
    }

    #[test]
    fn test_ticket_row_shape() {
        let mut metadata = Metadata::new();
        metadata.insert("keyword".into(), json!("refund"));
        let row = ticket_row(&NewTicket {
            customer_id: None,
            session_id: "s-1".into(),
            reason: "Complaint".into(),
            priority: EscalationPriority::High,
            metadata,
        });
        assert_eq!(row["priority"], json!("high"));
        assert_eq!(row["status"], json!("open"));
        assert_eq!(row["customer_id"], Value::Null);
        assert_eq!(row["metadata"]["keyword"], json!("refund"));
    }

    #[test]
    fn test_scalar_text_accepts_numbers_and_strings() {
        assert_eq!(scalar_text(&json!(1042)), Some("1042".to_string()));
        assert_eq!(scalar_text(&json!("TK-7")), Some("TK-7".to_string()));
        assert_eq!(scalar_text(&json!("")), None);
        assert_eq!(scalar_text(&Value::Null), None);
    }

    #[test]
    fn test_profile_row_maps_to_staff() {
        let row: ProfileRow = serde_json::from_value(json!({
            "id": "u-1",
            "full_name": "Dana",
            "role": "dispatcher",
            "email": "dana@example.com",
            "phone": null
        }))
        .unwrap();
        let staff = StaffMember::from(row);
        assert_eq!(staff.name.as_deref(), Some("Dana"));
        assert_eq!(staff.contact_for(NotifyChannel::Sms), None);
        assert_eq!(staff.contact_for(NotifyChannel::Email), Some("dana@example.com"));
    }
}
