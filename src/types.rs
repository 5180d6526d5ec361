use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

// ── Steps and statuses ─────────────────────────────────────────────

/// A named step in the device upgrade workflow.
///
/// Known steps are ordered as they run; anything the backend sends that is
/// not recognised is kept verbatim in [`Step::Other`] and sorts last.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Step {
    CheckDeviceCompatibility,
    PreUpgradeBackup,
    RebootDevice,
    MgmtPort,
    PostRebootCheck,
    DeviceActivation,
    VnfSpinupAndConfig,
    /// Terminal marker written once a flow has finished.
    FlowComplete,
    Other(String),
}

impl Step {
    /// The seven tracked upgrade steps, in execution order.
    pub fn upgrade_pipeline() -> Vec<Step> {
        vec![
            Step::CheckDeviceCompatibility,
            Step::PreUpgradeBackup,
            Step::RebootDevice,
            Step::MgmtPort,
            Step::PostRebootCheck,
            Step::DeviceActivation,
            Step::VnfSpinupAndConfig,
        ]
    }

    pub fn as_str(&self) -> &str {
        match self {
            Step::CheckDeviceCompatibility => "check-device-compatibility",
            Step::PreUpgradeBackup => "pre-upgrade-backup",
            Step::RebootDevice => "reboot-device",
            Step::MgmtPort => "mgmt-port",
            Step::PostRebootCheck => "post-reboot-check",
            Step::DeviceActivation => "device-activation",
            Step::VnfSpinupAndConfig => "vnf-spinup-and-config",
            Step::FlowComplete => "flow-complete",
            Step::Other(s) => s,
        }
    }

    /// Title-cased label, e.g. `"Reboot Device"`.
    pub fn label(&self) -> String {
        self.as_str()
            .split('-')
            .filter(|w| !w.is_empty())
            .map(|w| {
                let mut chars = w.chars();
                match chars.next() {
                    Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                    None => String::new(),
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl From<String> for Step {
    fn from(s: String) -> Self {
        match s.as_str() {
            "check-device-compatibility" => Step::CheckDeviceCompatibility,
            "pre-upgrade-backup" => Step::PreUpgradeBackup,
            "reboot-device" => Step::RebootDevice,
            "mgmt-port" => Step::MgmtPort,
            "post-reboot-check" => Step::PostRebootCheck,
            "device-activation" => Step::DeviceActivation,
            "vnf-spinup-and-config" => Step::VnfSpinupAndConfig,
            "flow-complete" => Step::FlowComplete,
            _ => Step::Other(s),
        }
    }
}

impl From<&str> for Step {
    fn from(s: &str) -> Self {
        Step::from(s.to_string())
    }
}

impl From<Step> for String {
    fn from(step: Step) -> Self {
        match step {
            Step::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of one workflow step transition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ExecutionStatus {
    Started,
    Pending,
    Success,
    Failed,
    Other(String),
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &str {
        match self {
            ExecutionStatus::Started => "STARTED",
            ExecutionStatus::Pending => "PENDING",
            ExecutionStatus::Success => "SUCCESS",
            ExecutionStatus::Failed => "FAILED",
            ExecutionStatus::Other(s) => s,
        }
    }
}

impl From<String> for ExecutionStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "STARTED" => ExecutionStatus::Started,
            "PENDING" => ExecutionStatus::Pending,
            "SUCCESS" => ExecutionStatus::Success,
            "FAILED" => ExecutionStatus::Failed,
            _ => ExecutionStatus::Other(s),
        }
    }
}

impl From<ExecutionStatus> for String {
    fn from(status: ExecutionStatus) -> Self {
        match status {
            ExecutionStatus::Other(s) => s,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inventory status of a discovered device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DeviceStatus {
    Success,
    Pending,
    Other(String),
}

impl DeviceStatus {
    /// Only successfully discovered or still-pending devices are shown.
    pub fn is_displayable(&self) -> bool {
        matches!(self, DeviceStatus::Success | DeviceStatus::Pending)
    }
}

impl From<String> for DeviceStatus {
    fn from(s: String) -> Self {
        match s.as_str() {
            "SUCCESS" => DeviceStatus::Success,
            "PENDING" => DeviceStatus::Pending,
            _ => DeviceStatus::Other(s),
        }
    }
}

impl From<DeviceStatus> for String {
    fn from(status: DeviceStatus) -> Self {
        match status {
            DeviceStatus::Success => "SUCCESS".to_string(),
            DeviceStatus::Pending => "PENDING".to_string(),
            DeviceStatus::Other(s) => s,
        }
    }
}

// ── Job progress ───────────────────────────────────────────────────

/// Processed/total counters for a batch job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
    pub processed_count: u64,
    pub total_count: u64,
}

impl JobProgress {
    pub fn new(processed_count: u64, total_count: u64) -> Self {
        Self {
            processed_count,
            total_count,
        }
    }

    /// A job with nothing to do is never complete.
    pub fn is_complete(&self) -> bool {
        self.total_count > 0 && self.processed_count >= self.total_count
    }

    /// Whole-number percentage, capped at 100. Zero when the total is zero.
    pub fn percent(&self) -> u8 {
        if self.total_count == 0 {
            return 0;
        }
        let pct = self.processed_count.saturating_mul(100) / self.total_count;
        pct.min(100) as u8
    }

    pub fn remaining(&self) -> u64 {
        self.total_count.saturating_sub(self.processed_count)
    }
}

/// Wire shape of `GET /devices/status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DiscoveryStatus {
    pub processed: u64,
    pub total: u64,
    #[serde(default)]
    pub success: u64,
    #[serde(default)]
    pub pending: u64,
    #[serde(default)]
    pub failed: u64,
}

impl DiscoveryStatus {
    pub fn progress(&self) -> JobProgress {
        JobProgress::new(self.processed, self.total)
    }
}

impl From<DiscoveryStatus> for JobProgress {
    fn from(status: DiscoveryStatus) -> Self {
        status.progress()
    }
}

// ── Devices ────────────────────────────────────────────────────────

/// A device in the inventory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    #[serde(default, deserialize_with = "nullable_string")]
    pub master_identifier: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub os_version: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub serial_number: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub description: String,
    pub status: DeviceStatus,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(default)]
    pub device_type: Option<String>,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub hardware_model: Option<String>,
}

/// Response of `POST /devices/upload`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadOutcome {
    pub message: String,
    pub total_devices: u64,
}

// ── Workflow events ────────────────────────────────────────────────

/// One entry in a device's workflow step-transition log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowExecutionEvent {
    pub device_id: String,
    pub flow_instance_id: String,
    pub step: Step,
    pub status: ExecutionStatus,
    #[serde(default, deserialize_with = "nullable_string")]
    pub message: String,
    #[serde(rename = "lastUpdated", alias = "lastUpdatedAt", with = "timestamp")]
    pub last_updated_at: DateTime<Utc>,
    #[serde(default)]
    pub completed: bool,
    #[serde(default, with = "timestamp::option")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp::option")]
    pub completed_time: Option<DateTime<Utc>>,
    #[serde(default, with = "timestamp::option")]
    pub scheduled_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub process_name: Option<String>,
    #[serde(default)]
    pub process_flow_id: Option<String>,
    #[serde(default)]
    pub assigned_dtac: Option<String>,
    #[serde(default)]
    pub issuer: Option<String>,
    #[serde(default)]
    pub re_schedule_count: u32,
}

/// Wire shape of `GET /tasks/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct TaskWorkflows {
    #[serde(default)]
    pub workflows: Vec<WorkflowExecutionEvent>,
}

/// One log line from `GET /logs?flowId=`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepLogEntry {
    #[serde(default, deserialize_with = "nullable_string")]
    pub id: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub flow_instance_id: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub device_id: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub stage: String,
    pub step: Step,
    pub status: ExecutionStatus,
    #[serde(default, deserialize_with = "nullable_string")]
    pub message: String,
    #[serde(default, deserialize_with = "nullable_string")]
    pub logger: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

// ── Paging and filters ─────────────────────────────────────────────

/// A page of results from a paginated endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub total_elements: u64,
    pub total_pages: u32,
    #[serde(default)]
    pub number: u32,
    #[serde(default)]
    pub size: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    #[default]
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionSort {
    pub created_at: SortDirection,
}

/// Filter body for `POST /workflow-executions`.
///
/// Unset filters are sent as empty strings/lists and `completed: null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowExecutionFilter {
    pub device_ids: Vec<String>,
    pub workflows: Vec<String>,
    pub completed: Option<bool>,
    pub email_contact: String,
    pub created_at_from: String,
    pub created_at_to: String,
    pub scheduled_time_from: String,
    pub scheduled_time_to: String,
    pub process_names: Vec<String>,
    pub process_flow_ids: Vec<String>,
    pub sort: ExecutionSort,
}

// ── Scheduling ─────────────────────────────────────────────────────

/// Technician skill used when looking up available slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Skill {
    #[default]
    Upgrade,
    NewInstall,
}

impl Skill {
    pub fn as_str(&self) -> &'static str {
        match self {
            Skill::Upgrade => "Upgrade",
            Skill::NewInstall => "newInstall",
        }
    }
}

/// Body of `POST /reschedule-task`: move a technician task to a new slot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleTaskRequest {
    pub task_id: String,
    #[serde(with = "timestamp")]
    pub new_start_time: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub new_end_time: DateTime<Utc>,
    pub employee_id: String,
    pub username: String,
}

/// Response of `POST /devices/reschedule/{flowInstanceId}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RescheduleOutcome {
    #[serde(default, deserialize_with = "nullable_string")]
    pub message: String,
    #[serde(default)]
    pub reschedule_count: Option<u32>,
    #[serde(default)]
    pub new_scheduled_time: Option<String>,
}

// ── Process diagrams ───────────────────────────────────────────────

/// BPMN diagram of a running process instance, with executed and active
/// activity ids for highlighting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessDiagram {
    pub bpmn_xml: String,
    #[serde(default)]
    pub executed_activities: Vec<String>,
    #[serde(default)]
    pub active_activities: Vec<String>,
    #[serde(default)]
    pub activity_details: HashMap<String, serde_json::Value>,
}

impl ProcessDiagram {
    pub fn is_active(&self, activity_id: &str) -> bool {
        self.active_activities.iter().any(|a| a == activity_id)
    }

    pub fn is_executed(&self, activity_id: &str) -> bool {
        self.executed_activities.iter().any(|a| a == activity_id)
    }
}

// ── Customers ──────────────────────────────────────────────────────

/// A contact person on file for a customer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(rename = "customer_contact_name", default, deserialize_with = "nullable_string")]
    pub name: String,
    #[serde(rename = "customer_contact_phone", default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(rename = "customer_contact_email", default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// A customer site. Every field may be missing on the wire, and when
/// creating a customer only the known fields are sent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Site {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gps_site_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site_name: Option<String>,
    #[serde(rename = "ucpe_host_name", skip_serializing_if = "Option::is_none")]
    pub ucpe_hostname: Option<String>,
    #[serde(rename = "jump_server_host_name", skip_serializing_if = "Option::is_none")]
    pub jump_server_hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_line: Option<String>,
    #[serde(rename = "service_location_country", skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(rename = "service_location_state", skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(rename = "service_location_city", skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
    #[serde(rename = "service_location_address", skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(rename = "service_location_zip", skip_serializing_if = "Option::is_none")]
    pub zip: Option<String>,
    #[serde(rename = "lcon_name", skip_serializing_if = "Option::is_none")]
    pub local_contact_name: Option<String>,
    #[serde(rename = "lcon_phone", skip_serializing_if = "Option::is_none")]
    pub local_contact_phone: Option<String>,
    #[serde(rename = "lcon_email", skip_serializing_if = "Option::is_none")]
    pub local_contact_email: Option<String>,
}

/// Body of `POST /customers/add/`: a new customer with its first site and
/// contact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateCustomerPayload {
    pub customer_name: String,
    pub site: Site,
    pub contact: Contact,
}

// ── Serde helpers ──────────────────────────────────────────────────

fn nullable_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Timestamps as the backend writes them: RFC 3339, or a naive ISO-8601
/// datetime that is taken to be UTC.
pub mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{Deserialize, Deserializer, Serializer};

    const NAIVE_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        let raw = raw.trim();
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NAIVE_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
            .map(|naive| naive.and_utc())
    }

    pub fn serialize<S>(dt: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&dt.to_rfc3339())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp {:?}", raw)))
    }

    pub mod option {
        use chrono::{DateTime, Utc};
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S>(dt: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
        {
            match dt {
                Some(dt) => serializer.serialize_str(&dt.to_rfc3339()),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
        where
            D: Deserializer<'de>,
        {
            match Option::<String>::deserialize(deserializer)? {
                None => Ok(None),
                Some(raw) if raw.trim().is_empty() => Ok(None),
                Some(raw) => super::parse(&raw)
                    .map(Some)
                    .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp {:?}", raw))),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_job_progress_completion() {
        assert!(JobProgress::new(5, 5).is_complete());
        assert!(!JobProgress::new(4, 5).is_complete());
        assert!(!JobProgress::new(0, 0).is_complete());
        assert!(!JobProgress::new(12, 0).is_complete());
        assert!(JobProgress::new(6, 5).is_complete());
    }

    #[test]
    fn test_job_progress_percent() {
        assert_eq!(JobProgress::new(0, 0).percent(), 0);
        assert_eq!(JobProgress::new(1, 3).percent(), 33);
        assert_eq!(JobProgress::new(9, 4).percent(), 100);
        assert_eq!(JobProgress::new(1, 4).remaining(), 3);
        assert_eq!(JobProgress::new(9, 4).remaining(), 0);
    }

    #[test]
    fn test_step_roundtrip_and_unknown() {
        let step: Step = serde_json::from_str("\"reboot-device\"").unwrap();
        assert_eq!(step, Step::RebootDevice);

        let step: Step = serde_json::from_str("\"firmware-staging\"").unwrap();
        assert_eq!(step, Step::Other("firmware-staging".into()));
        assert_eq!(serde_json::to_string(&step).unwrap(), "\"firmware-staging\"");
    }

    #[test]
    fn test_step_label() {
        assert_eq!(Step::VnfSpinupAndConfig.label(), "Vnf Spinup And Config");
        assert_eq!(Step::MgmtPort.label(), "Mgmt Port");
    }

    #[test]
    fn test_pipeline_order() {
        let steps = Step::upgrade_pipeline();
        assert_eq!(steps.first(), Some(&Step::CheckDeviceCompatibility));
        assert_eq!(steps.last(), Some(&Step::VnfSpinupAndConfig));
        assert!(!steps.contains(&Step::FlowComplete));
    }

    #[test]
    fn test_parse_workflow_event() {
        let json = r#"{
            "flowInstanceId": "f-1",
            "deviceId": "d1",
            "step": "mgmt-port",
            "status": "STARTED",
            "message": null,
            "assignedDtac": "ops-team",
            "createdAt": "2025-10-01T08:00:00",
            "lastUpdated": "2025-10-01T08:05:30.250",
            "completed": false,
            "completedTime": null,
            "processName": "nfx-upgrade",
            "processFlowId": "p-9",
            "issuer": null,
            "reScheduleCount": 2
        }"#;
        let event: WorkflowExecutionEvent = serde_json::from_str(json).unwrap();
        assert_eq!(event.device_id, "d1");
        assert_eq!(event.step, Step::MgmtPort);
        assert_eq!(event.status, ExecutionStatus::Started);
        assert_eq!(event.message, "");
        assert_eq!(event.re_schedule_count, 2);
        assert!(event.completed_time.is_none());
        assert_eq!(
            event.created_at,
            Some(Utc.with_ymd_and_hms(2025, 10, 1, 8, 0, 0).unwrap())
        );
        assert_eq!(event.last_updated_at.timestamp_subsec_millis(), 250);
    }

    #[test]
    fn test_parse_event_rfc3339_offset() {
        let json = r#"{
            "flowInstanceId": "f-1",
            "deviceId": "d1",
            "step": "flow-complete",
            "status": "SUCCESS",
            "lastUpdated": "2025-10-01T10:00:00+02:00",
            "completed": true
        }"#;
        let event: WorkflowExecutionEvent = serde_json::from_str(json).unwrap();
        assert_eq!(
            event.last_updated_at,
            Utc.with_ymd_and_hms(2025, 10, 1, 8, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_bad_timestamp_is_an_error() {
        let json = r#"{
            "flowInstanceId": "f-1",
            "deviceId": "d1",
            "step": "mgmt-port",
            "status": "STARTED",
            "lastUpdated": "yesterday"
        }"#;
        assert!(serde_json::from_str::<WorkflowExecutionEvent>(json).is_err());
    }

    #[test]
    fn test_parse_step_log_entry() {
        let json = r#"{
            "id": "l-1",
            "flowInstanceId": "f-1",
            "deviceId": "d1",
            "stage": "upgrade",
            "timestamp": 1700000000000,
            "step": "pre-upgrade-backup",
            "status": "FAILED",
            "message": "backup target unreachable",
            "logger": "BackupDelegate"
        }"#;
        let entry: StepLogEntry = serde_json::from_str(json).unwrap();
        assert_eq!(entry.step, Step::PreUpgradeBackup);
        assert_eq!(entry.status, ExecutionStatus::Failed);
        assert_eq!(entry.timestamp.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn test_parse_device_and_status() {
        let json = r#"{
            "ipAddress": "10.1.1.4",
            "deviceType": "NFX",
            "hostname": "edge-04",
            "osVersion": "21.4R3",
            "serialNumber": "SN-0004",
            "hardwareModel": "nfx250",
            "status": "FAILED_DISCOVERY",
            "masterIdentifier": "M-4",
            "description": null
        }"#;
        let device: Device = serde_json::from_str(json).unwrap();
        assert_eq!(device.status, DeviceStatus::Other("FAILED_DISCOVERY".into()));
        assert!(!device.status.is_displayable());
        assert_eq!(device.description, "");
        assert_eq!(device.hostname.as_deref(), Some("edge-04"));
    }

    #[test]
    fn test_discovery_status_defaults() {
        let status: DiscoveryStatus = serde_json::from_str(r#"{"processed": 3, "total": 8}"#).unwrap();
        assert_eq!(status.failed, 0);
        assert_eq!(status.progress(), JobProgress::new(3, 8));
    }

    #[test]
    fn test_filter_serialization_keeps_empty_fields() {
        let filter = WorkflowExecutionFilter::default();
        let json = serde_json::to_value(&filter).unwrap();
        assert_eq!(json["deviceIds"], serde_json::json!([]));
        assert_eq!(json["emailContact"], "");
        assert!(json["completed"].is_null());
        assert_eq!(json["sort"]["createdAt"], "desc");
    }

    #[test]
    fn test_page_parsing() {
        let json = r#"{"content": [], "totalElements": 0, "totalPages": 0}"#;
        let page: Page<WorkflowExecutionEvent> = serde_json::from_str(json).unwrap();
        assert!(page.content.is_empty());
        assert_eq!(page.number, 0);
    }

    #[test]
    fn test_skill_wire_names() {
        assert_eq!(Skill::Upgrade.as_str(), "Upgrade");
        assert_eq!(Skill::NewInstall.as_str(), "newInstall");
    }

    #[test]
    fn test_site_parsing_tolerates_nulls() {
        let json = r#"{"gps_site_id": null, "site_name": "Depot", "ucpe_host_name": "ucpe-7", "lcon_phone": null}"#;
        let site: Site = serde_json::from_str(json).unwrap();
        assert_eq!(site.gps_site_id, None);
        assert_eq!(site.site_name.as_deref(), Some("Depot"));
        assert_eq!(site.ucpe_hostname.as_deref(), Some("ucpe-7"));
        assert_eq!(site.city, None);
    }

    #[test]
    fn test_create_customer_payload_sends_only_known_fields() {
        let payload = CreateCustomerPayload {
            customer_name: "Acme".into(),
            site: Site {
                site_name: Some("HQ".into()),
                city: Some("Austin".into()),
                ..Site::default()
            },
            contact: Contact {
                name: "Dana".into(),
                phone: None,
                email: Some("dana@acme.test".into()),
            },
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "customer_name": "Acme",
                "site": { "site_name": "HQ", "service_location_city": "Austin" },
                "contact": { "customer_contact_name": "Dana", "customer_contact_email": "dana@acme.test" }
            })
        );
    }
}
