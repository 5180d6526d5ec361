use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Days, NaiveDate, SecondsFormat, Utc};
use futures_util::stream;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::config::TrackerConfig;
use crate::error::{Result, TrackerError};
use crate::tree::{ServiceNode, ServiceOrder, ServiceTree};
use crate::types::*;

const UPLOAD_CHUNK: usize = 64 * 1024;

fn normalize(endpoint: String) -> String {
    endpoint.trim_end_matches('/').to_string()
}

fn iso_millis(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// The window searched for technician slots on `date`: the previous day at
/// 18:30:00 UTC through `date` at 18:29:59 UTC.
pub fn slot_window(date: NaiveDate) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
    let start = date
        .checked_sub_days(Days::new(1))
        .and_then(|prev| prev.and_hms_opt(18, 30, 0))
        .ok_or_else(|| TrackerError::InvalidRequest(format!("no slot window before {}", date)))?;
    let end = date
        .and_hms_opt(18, 29, 59)
        .ok_or_else(|| TrackerError::InvalidRequest(format!("no slot window on {}", date)))?;
    Ok((start.and_utc(), end.and_utc()))
}

#[derive(Deserialize)]
struct MessageResponse {
    #[serde(default)]
    message: String,
}

#[derive(Deserialize)]
struct CustomerSearchResponse {
    #[serde(default)]
    customers: Vec<String>,
}

#[derive(Deserialize)]
struct Slot(#[serde(with = "timestamp")] DateTime<Utc>);

#[derive(Deserialize)]
#[serde(untagged)]
enum OrderPayload {
    File(ServiceOrder),
    Nodes(Vec<ServiceNode>),
}

/// Async client for the device lifecycle backend.
///
/// Covers device discovery and upload, upgrade workflow tracking, technician
/// rescheduling, process diagrams, customers, and service orders. All
/// calls are plain request/response; see [`Poller`](crate::Poller) for
/// repeated fetching.
///
/// # Example
/// ```no_run
/// use fleet_tracker::LifecycleClient;
///
/// # async fn example() -> fleet_tracker::Result<()> {
/// let client = LifecycleClient::new("http://localhost:8080/api");
/// let status = client.discovery_status().await?;
/// println!("{}% discovered", status.progress().percent());
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct LifecycleClient {
    http: Client,
    endpoint: String,
    request_timeout: Duration,
    upload_timeout: Duration,
    search_limit: u32,
}

impl LifecycleClient {
    /// Create a client for the given base URL with default timeouts.
    pub fn new(endpoint: impl Into<String>) -> Self {
        let defaults = TrackerConfig::default();
        Self {
            http: Client::new(),
            endpoint: normalize(endpoint.into()),
            request_timeout: defaults.request_timeout,
            upload_timeout: defaults.upload_timeout,
            search_limit: defaults.search_limit,
        }
    }

    /// Create a client from a full configuration.
    pub fn from_config(config: &TrackerConfig) -> Self {
        Self {
            http: Client::new(),
            endpoint: normalize(config.endpoint.clone()),
            request_timeout: config.request_timeout,
            upload_timeout: config.upload_timeout,
            search_limit: config.search_limit,
        }
    }

    /// Use a custom `reqwest::Client` (for connection pooling, proxies, TLS).
    pub fn with_http_client(mut self, client: Client) -> Self {
        self.http = client;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Returns the configured endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    // ── Devices ─────────────────────────────────────────────────────

    /// Progress of the current discovery job.
    pub async fn discovery_status(&self) -> Result<DiscoveryStatus> {
        self.get_json(&["devices", "status"], &[]).await
    }

    /// Full device inventory.
    pub async fn devices(&self) -> Result<Vec<Device>> {
        self.get_json(&["devices", "all"], &[]).await
    }

    /// Upload a device list file as multipart field `file`.
    ///
    /// `progress` receives whole-number percentages as the body is streamed.
    pub async fn upload_devices<F>(&self, path: impl AsRef<Path>, progress: F) -> Result<UploadOutcome>
    where
        F: Fn(u8) + Send + Sync + 'static,
    {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await.map_err(|e| TrackerError::Io {
            context: format!("Failed to read {}", path.display()),
            source: e,
        })?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "devices.csv".to_string());
        self.upload_device_bytes(file_name, bytes, progress).await
    }

    /// Upload an in-memory device list.
    pub async fn upload_device_bytes<F>(
        &self,
        file_name: impl Into<String>,
        bytes: Vec<u8>,
        progress: F,
    ) -> Result<UploadOutcome>
    where
        F: Fn(u8) + Send + Sync + 'static,
    {
        let file_name = file_name.into();
        if file_name.trim().is_empty() {
            return Err(TrackerError::InvalidRequest("upload file name is empty".into()));
        }
        if bytes.is_empty() {
            return Err(TrackerError::InvalidRequest(format!("{} is empty", file_name)));
        }

        let form = Form::new().part("file", streamed_part(file_name, bytes, progress));
        let url = self.url(&["devices", "upload"])?;
        let request = self
            .http
            .post(url)
            .timeout(self.upload_timeout)
            .multipart(form);
        let resp = self.send(request, "devices/upload").await?;
        self.decode(resp, "devices/upload").await
    }

    // ── Workflows ───────────────────────────────────────────────────

    /// All workflow step events for a task.
    pub async fn task_workflows(&self, task_id: &str) -> Result<Vec<WorkflowExecutionEvent>> {
        require("task id", task_id)?;
        let body: TaskWorkflows = self.get_json(&["tasks", task_id], &[]).await?;
        Ok(body.workflows)
    }

    /// Step log for one flow, limited to `steps` plus the `flow-complete`
    /// marker.
    pub async fn flow_logs(&self, flow_id: &str, steps: &[Step]) -> Result<Vec<StepLogEntry>> {
        require("flow id", flow_id)?;
        let logs: Vec<StepLogEntry> = self
            .get_json(&["logs"], &[("flowId", flow_id.to_string())])
            .await?;
        Ok(logs
            .into_iter()
            .filter(|log| log.step == Step::FlowComplete || steps.contains(&log.step))
            .collect())
    }

    /// Page through workflow executions matching `filter`.
    pub async fn workflow_executions(
        &self,
        filter: &WorkflowExecutionFilter,
        page: u32,
        size: u32,
    ) -> Result<Page<WorkflowExecutionEvent>> {
        if size == 0 {
            return Err(TrackerError::InvalidRequest("page size must be positive".into()));
        }
        let url = self.url(&["workflow-executions"])?;
        let request = self
            .http
            .post(url)
            .timeout(self.request_timeout)
            .query(&[("page", page), ("size", size)])
            .json(filter);
        let resp = self.send(request, "workflow-executions").await?;
        self.decode(resp, "workflow-executions").await
    }

    /// BPMN diagram with executed and active activities for a flow.
    pub async fn process_diagram(&self, flow_instance_id: &str) -> Result<ProcessDiagram> {
        require("flow instance id", flow_instance_id)?;
        self.get_json(&["process-instance", flow_instance_id, "diagram"], &[])
            .await
    }

    // ── Scheduling ──────────────────────────────────────────────────

    /// Free technician slots between `start` and `end`.
    pub async fn available_slots(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        skill: Skill,
    ) -> Result<Vec<DateTime<Utc>>> {
        if end < start {
            return Err(TrackerError::InvalidRequest("slot window ends before it starts".into()));
        }
        let slots: Vec<Slot> = self
            .get_json(
                &["employees", "available-slots"],
                &[
                    ("startDate", iso_millis(&start)),
                    ("endDate", iso_millis(&end)),
                    ("skill", skill.as_str().to_string()),
                ],
            )
            .await?;
        Ok(slots.into_iter().map(|slot| slot.0).collect())
    }

    /// Free slots for the working day `date`, using [`slot_window`].
    pub async fn available_slots_on(&self, date: NaiveDate, skill: Skill) -> Result<Vec<DateTime<Utc>>> {
        let (start, end) = slot_window(date)?;
        self.available_slots(start, end, skill).await
    }

    /// Move a technician task to a new slot.
    pub async fn reschedule_task(&self, request: &RescheduleTaskRequest) -> Result<()> {
        require("task id", &request.task_id)?;
        let url = self.url(&["reschedule-task"])?;
        let builder = self
            .http
            .post(url)
            .timeout(self.request_timeout)
            .json(request);
        self.send(builder, "reschedule-task").await?;
        Ok(())
    }

    /// Move one device's upgrade to a new time.
    pub async fn reschedule_device(
        &self,
        flow_instance_id: &str,
        new_time: DateTime<Utc>,
    ) -> Result<RescheduleOutcome> {
        require("flow instance id", flow_instance_id)?;
        let url = self.url(&["devices", "reschedule", flow_instance_id])?;
        let body = serde_json::json!({ "newScheduledZoneDateTime": iso_millis(&new_time) });
        let request = self
            .http
            .post(url)
            .timeout(self.request_timeout)
            .json(&body);
        let resp = self.send(request, "devices/reschedule").await?;
        self.decode(resp, "devices/reschedule").await
    }

    // ── Customers and service orders ────────────────────────────────

    /// Customer names matching `query`. Blank queries return nothing
    /// without a request.
    pub async fn search_customers(&self, query: &str) -> Result<Vec<String>> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        let body: CustomerSearchResponse = self
            .get_json(
                &["customers", "search"],
                &[
                    ("search_name", query.to_string()),
                    ("limit", self.search_limit.to_string()),
                ],
            )
            .await?;
        Ok(body.customers)
    }

    /// Contacts on file for `customer`.
    pub async fn customer_contacts(&self, customer: &str) -> Result<Vec<Contact>> {
        require("customer name", customer)?;
        self.get_json(&["customers", customer, "contacts"], &[]).await
    }

    /// Sites registered for `customer`.
    pub async fn customer_sites(&self, customer: &str) -> Result<Vec<Site>> {
        require("customer name", customer)?;
        self.get_json(&["customers", customer, "sites"], &[]).await
    }

    /// Register a new customer together with its first site and contact.
    /// Returns the backend's response body as-is.
    pub async fn create_customer(&self, payload: &CreateCustomerPayload) -> Result<serde_json::Value> {
        require("customer name", &payload.customer_name)?;
        // The backend routes this path with a trailing slash.
        let url = self.url(&["customers", "add", ""])?;
        let request = self
            .http
            .post(url)
            .timeout(self.request_timeout)
            .json(payload);
        let resp = self.send(request, "customers/add").await?;
        self.decode(resp, "customers/add").await
    }

    /// Fetch a stored service order by file name.
    pub async fn service_order(&self, file_name: &str) -> Result<ServiceOrder> {
        require("file name", file_name)?;
        let payload: OrderPayload = self.get_json(&["orders", file_name], &[]).await?;
        Ok(match payload {
            OrderPayload::File(order) => order,
            OrderPayload::Nodes(nodes) => ServiceOrder {
                file_name: file_name.to_string(),
                nodes,
            },
        })
    }

    /// Upload an edited tree and clear its dirty flag. Returns the
    /// backend's message.
    pub async fn save_service_order(&self, tree: &mut ServiceTree) -> Result<String> {
        require("file name", tree.file_name())?;
        let part = Part::bytes(tree.to_json()?).file_name(tree.file_name().to_string());
        let url = self.url(&["orders", "upload"])?;
        let request = self
            .http
            .post(url)
            .timeout(self.upload_timeout)
            .multipart(Form::new().part("file", part));
        let resp = self.send(request, "orders/upload").await?;
        let body: MessageResponse = self.decode(resp, "orders/upload").await?;
        tree.mark_saved();
        Ok(body.message)
    }

    // ── Plumbing ────────────────────────────────────────────────────

    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = Url::parse(&self.endpoint)
            .map_err(|e| TrackerError::Config(format!("invalid endpoint {:?}: {}", self.endpoint, e)))?;
        url.path_segments_mut()
            .map_err(|_| TrackerError::Config(format!("endpoint {:?} cannot take a path", self.endpoint)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str], query: &[(&str, String)]) -> Result<T> {
        let url = self.url(segments)?;
        let label = segments.join("/");
        let request = self.http.get(url).timeout(self.request_timeout).query(query);
        let resp = self.send(request, &label).await?;
        self.decode(resp, &label).await
    }

    async fn send(&self, request: RequestBuilder, label: &str) -> Result<Response> {
        let resp = request.send().await.map_err(|e| TrackerError::Network {
            context: format!("Cannot reach backend at {} ({})", self.endpoint, label),
            source: e,
        })?;

        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            let body = resp.text().await.unwrap_or_default();
            debug!(endpoint = label, status, "Backend returned error status");
            return Err(TrackerError::Http { status, body });
        }
        Ok(resp)
    }

    async fn decode<T: DeserializeOwned>(&self, resp: Response, label: &str) -> Result<T> {
        let text = resp.text().await.map_err(|e| TrackerError::Network {
            context: format!("Failed to read response body from {}", label),
            source: e,
        })?;
        serde_json::from_str(&text).map_err(|source| TrackerError::Decode {
            endpoint: label.to_string(),
            source,
        })
    }
}

fn require(what: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(TrackerError::InvalidRequest(format!("{} must not be empty", what)));
    }
    Ok(())
}

/// A multipart part whose body reports percent sent as it is consumed.
fn streamed_part<F>(file_name: String, bytes: Vec<u8>, progress: F) -> Part
where
    F: Fn(u8) + Send + Sync + 'static,
{
    let total = bytes.len() as u64;
    let progress = Arc::new(progress);
    let chunks: Vec<Vec<u8>> = bytes.chunks(UPLOAD_CHUNK).map(<[u8]>::to_vec).collect();

    let mut sent = 0u64;
    let body = stream::iter(chunks.into_iter().map(move |chunk| {
        sent += chunk.len() as u64;
        progress(upload_percent(sent, total));
        Ok::<_, std::io::Error>(chunk)
    }));

    Part::stream_with_length(reqwest::Body::wrap_stream(body), total).file_name(file_name)
}

fn upload_percent(sent: u64, total: u64) -> u8 {
    if total == 0 {
        return 100;
    }
    (sent.min(total) * 100 / total) as u8
}
