//! HTTP client for the incident service.
//!
//! Endpoints, relative to the configured base URL:
//!
//! | call | request |
//! |---|---|
//! | register | `POST /tenants/{tenant}/incident-links` `{ticket, incident_ids}` → `{linked}` |
//! | unregister | `POST /tenants/{tenant}/incident-links/remove` `{ticket_id, incident_ids}` → `{removed}` |
//! | list | `POST /tenants/{tenant}/incident-links/tickets` `{incident_ids, page, size, sort}` → `Page<TicketSummary>` |
//!
//! `sort` travels as the same `field:dir,...` string callers type.
//!
//! `ureq` is blocking, so every call runs on the blocking pool.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::IncidentService;
use crate::error::{DeskError, Result};
use crate::model::TicketSummary;
use crate::query::{Page, Paging, SortKey};

const SERVICE: &str = "incident";

#[derive(Debug, Clone)]
pub struct HttpIncidentClient {
    agent: ureq::Agent,
    base_url: String,
}

#[derive(Serialize)]
struct RegisterBody<'a> {
    ticket: &'a TicketSummary,
    incident_ids: &'a [String],
}

#[derive(Serialize)]
struct UnregisterBody<'a> {
    ticket_id: &'a str,
    incident_ids: &'a [String],
}

#[derive(Deserialize)]
struct RegisterReply {
    linked: u64,
}

#[derive(Deserialize)]
struct UnregisterReply {
    removed: u64,
}

#[derive(Debug, Serialize)]
struct ConnectionsBody<'a> {
    incident_ids: &'a [String],
    page: i64,
    size: i64,
    sort: String,
}

impl<'a> ConnectionsBody<'a> {
    fn new(incident_ids: &'a [String], paging: Paging, sort: &[SortKey]) -> Self {
        Self {
            incident_ids,
            page: paging.page,
            size: paging.size,
            sort: sort.iter().map(ToString::to_string).collect::<Vec<_>>().join(","),
        }
    }
}

impl HttpIncidentClient {
    #[must_use]
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .user_agent("desk-core")
            .build();
        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, tenant: &str, path: &str) -> String {
        format!("{}/tenants/{tenant}/{path}", self.base_url)
    }

    async fn call<T>(&self, method: &'static str, url: String, body: Option<serde_json::Value>) -> Result<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let agent = self.agent.clone();
        debug!(method, url = %url, "incident service request");
        tokio::task::spawn_blocking(move || {
            let request = agent.request(method, &url).set("Accept", "application/json");
            let response = match body {
                Some(body) => request.send_json(body),
                None => request.call(),
            }
            .map_err(|err| DeskError::upstream(SERVICE, format!("{method} {url}: {err}")))?;
            response
                .into_json::<T>()
                .map_err(|err| DeskError::upstream(SERVICE, format!("decode {url}: {err}")))
        })
        .await
        .map_err(|err| DeskError::upstream(SERVICE, err))?
    }
}

fn to_json(value: &impl Serialize) -> Result<serde_json::Value> {
    Ok(serde_json::to_value(value)?)
}

#[async_trait]
impl IncidentService for HttpIncidentClient {
    async fn register_incident_link(
        &self,
        tenant: &str,
        ticket: &TicketSummary,
        incident_ids: &[String],
    ) -> Result<u64> {
        let body = to_json(&RegisterBody {
            ticket,
            incident_ids,
        })?;
        let reply: RegisterReply = self
            .call("POST", self.url(tenant, "incident-links"), Some(body))
            .await?;
        Ok(reply.linked)
    }

    async fn unregister_incident_link(
        &self,
        tenant: &str,
        ticket_id: &str,
        incident_ids: &[String],
    ) -> Result<u64> {
        let body = to_json(&UnregisterBody {
            ticket_id,
            incident_ids,
        })?;
        let reply: UnregisterReply = self
            .call("POST", self.url(tenant, "incident-links/remove"), Some(body))
            .await?;
        Ok(reply.removed)
    }

    async fn list_incident_connections(
        &self,
        tenant: &str,
        incident_ids: &[String],
        paging: Paging,
        sort: &[SortKey],
    ) -> Result<Page<TicketSummary>> {
        let body = to_json(&ConnectionsBody::new(incident_ids, paging, sort))?;
        self.call("POST", self.url(tenant, "incident-links/tickets"), Some(body))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Field;
    use crate::error::ErrorCode;
    use crate::query::Direction;

    #[test]
    fn urls_are_tenant_scoped() {
        let client = HttpIncidentClient::new("http://incidents.local/", Duration::from_secs(1));
        assert_eq!(
            client.url("acme", "incident-links"),
            "http://incidents.local/tenants/acme/incident-links"
        );
    }

    #[test]
    fn connection_listing_body_carries_paging_and_sort() {
        let ids = vec!["inc-1".to_string()];
        let sort = [
            SortKey::new(Field::CreatedTime, Direction::Desc),
            SortKey::tiebreak(),
        ];
        let body = to_json(&ConnectionsBody::new(&ids, Paging::new(2, 10), &sort)).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "incident_ids": ["inc-1"],
                "page": 2,
                "size": 10,
                "sort": "created_time:desc,number:desc",
            })
        );
    }

    #[tokio::test]
    async fn unreachable_service_is_an_upstream_error() {
        // Port 9 (discard) on localhost is closed in test environments.
        let client = HttpIncidentClient::new("http://127.0.0.1:9", Duration::from_millis(200));
        let err = client
            .list_incident_connections("acme", &["inc-1".to_string()], Paging::default(), &[])
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::UpstreamUnavailable);
    }
}
