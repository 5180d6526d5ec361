
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{NaiveDate, TimeZone, Utc};
use fleet_tracker::types::{RescheduleTaskRequest, Skill};
use fleet_tracker::*;
use serde_json::json;
use tempfile::tempdir;
use test_helpers::{event, log_line, spawn_backend, Backend};

const FAST: Duration = Duration::from_millis(50);

async fn client_for(backend: &Arc<Backend>) -> LifecycleClient {
    let endpoint = spawn_backend(Arc::clone(backend)).await;
    LifecycleClient::new(endpoint)
}

// ── Client ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_discovery_status_and_devices() {
    let backend = Backend::new();
    backend.set_discovery(vec![(4, 10)]);
    let client = client_for(&backend).await;

    let status = client.discovery_status().await.unwrap();
    assert_eq!(status.progress(), JobProgress::new(4, 10));
    assert_eq!(status.progress().percent(), 40);

    let devices = client.devices().await.unwrap();
    assert_eq!(devices.len(), 3);
    assert_eq!(devices[0].description, "");
    assert_eq!(devices[1].os_version, "");
}

#[tokio::test]
async fn test_inventory_refresh_and_upload() {
    let backend = Backend::new();
    let client = client_for(&backend).await;
    let inventory = DeviceInventory::new(client);

    assert_eq!(inventory.refresh().await.unwrap(), 3);
    let shown: Vec<String> = inventory
        .displayable()
        .into_iter()
        .map(|d| d.master_identifier)
        .collect();
    assert_eq!(shown, vec!["rtr-1", "rtr-2"]);

    let dir = tempdir().unwrap();
    let path = dir.path().join("devices.csv");
    let csv = "serial,ip\n".repeat(20_000);
    std::fs::write(&path, &csv).unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let outcome = inventory
        .upload(&path, move |pct| sink.lock().unwrap().push(pct))
        .await
        .unwrap();
    assert_eq!(outcome.message, "Devices uploaded");

    let percents = seen.lock().unwrap().clone();
    assert!(percents.len() > 1);
    assert!(percents.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(percents.last(), Some(&100));

    let uploads = backend.seen("devices/upload");
    assert_eq!(uploads[0][0]["field"], "file");
    assert_eq!(uploads[0][0]["fileName"], "devices.csv");
    assert_eq!(uploads[0][0]["len"], csv.len());

    let state = inventory.state();
    assert_eq!(state.upload_message.as_deref(), Some("Devices uploaded"));
    assert_eq!(state.total_uploaded, outcome.total_devices);
    assert!(state.error.is_none());
}

#[tokio::test]
async fn test_upload_missing_file_is_io_error() {
    let backend = Backend::new();
    let client = client_for(&backend).await;
    let dir = tempdir().unwrap();
    let result = client
        .upload_devices(dir.path().join("absent.csv"), |_| {})
        .await;
    assert!(matches!(result, Err(TrackerError::Io { .. })));
    assert!(backend.seen("devices/upload").is_empty());
}

#[tokio::test]
async fn test_http_status_error() {
    let backend = Backend::new();
    let client = client_for(&backend).await;
    match client.task_workflows("missing").await {
        Err(TrackerError::Http { status, body }) => {
            assert_eq!(status, 404);
            assert_eq!(body, "no such task");
        }
        other => panic!("expected HTTP error, got {:?}", other),
    }
}

#[tokio::test]
async fn test_unreachable_backend_is_transient() {
    let client = LifecycleClient::new("http://127.0.0.1:9/api");
    let err = client.discovery_status().await.unwrap_err();
    assert!(matches!(err, TrackerError::Network { .. }));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_malformed_body_is_decode_error() {
    let backend = Backend::new();
    let client = client_for(&backend).await;
    match client.process_diagram("garbled").await {
        Err(TrackerError::Decode { endpoint, .. }) => {
            assert_eq!(endpoint, "process-instance/garbled/diagram");
        }
        other => panic!("expected decode error, got {:?}", other),
    }

    let diagram = client.process_diagram("flow-1").await.unwrap();
    assert!(diagram.is_active("reboot"));
    assert!(diagram.is_executed("backup"));
}

#[tokio::test]
async fn test_flow_logs_filtered_to_tracked_steps() {
    let backend = Backend::new();
    backend.set_logs(vec![
        log_line("mgmt-port", "SUCCESS", 1_759_309_200_000),
        log_line("audit-trail", "SUCCESS", 1_759_309_201_000),
        log_line("flow-complete", "SUCCESS", 1_759_309_202_000),
    ]);
    let client = client_for(&backend).await;

    let logs = client
        .flow_logs("flow-1", &Step::upgrade_pipeline())
        .await
        .unwrap();
    let steps: Vec<Step> = logs.iter().map(|l| l.step.clone()).collect();
    assert_eq!(steps, vec![Step::MgmtPort, Step::FlowComplete]);
    assert_eq!(backend.seen("logs")[0]["flowId"], "flow-1");
}

#[tokio::test]
async fn test_workflow_executions_page() {
    let backend = Backend::new();
    let client = client_for(&backend).await;

    let filter = WorkflowExecutionFilter {
        device_ids: vec!["d1".into()],
        ..Default::default()
    };
    let page = client.workflow_executions(&filter, 2, 10).await.unwrap();
    assert_eq!(page.total_elements, 21);
    assert_eq!(page.number, 2);
    assert_eq!(page.content[0].step, Step::MgmtPort);

    let seen = &backend.seen("workflow-executions")[0];
    assert_eq!(seen["query"]["page"], "2");
    assert_eq!(seen["query"]["size"], "10");
    assert_eq!(seen["filter"]["deviceIds"], json!(["d1"]));
    assert_eq!(seen["filter"]["completed"], json!(null));
    assert_eq!(seen["filter"]["sort"]["createdAt"], "desc");
}

#[tokio::test]
async fn test_available_slots_window() {
    let backend = Backend::new();
    let client = client_for(&backend).await;

    let slots = client
        .available_slots_on(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap(), Skill::NewInstall)
        .await
        .unwrap();
    assert_eq!(
        slots,
        vec![
            Utc.with_ymd_and_hms(2025, 3, 1, 2, 30, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 1, 6, 30, 0).unwrap(),
        ]
    );

    let query = &backend.seen("available-slots")[0];
    assert_eq!(query["startDate"], "2025-02-28T18:30:00.000Z");
    assert_eq!(query["endDate"], "2025-03-01T18:29:59.000Z");
    assert_eq!(query["skill"], "newInstall");
}

#[tokio::test]
async fn test_reschedule_calls() {
    let backend = Backend::new();
    let client = client_for(&backend).await;

    let request = RescheduleTaskRequest {
        task_id: "task-9".into(),
        new_start_time: Utc.with_ymd_and_hms(2025, 3, 2, 4, 0, 0).unwrap(),
        new_end_time: Utc.with_ymd_and_hms(2025, 3, 2, 8, 0, 0).unwrap(),
        employee_id: "emp-3".into(),
        username: "ops".into(),
    };
    client.reschedule_task(&request).await.unwrap();
    let body = &backend.seen("reschedule-task")[0];
    assert_eq!(body["taskId"], "task-9");
    assert_eq!(body["employeeId"], "emp-3");

    let outcome = client
        .reschedule_device("flow-7", Utc.with_ymd_and_hms(2025, 3, 2, 4, 0, 0).unwrap())
        .await
        .unwrap();
    assert_eq!(outcome.reschedule_count, Some(1));
    assert_eq!(outcome.new_scheduled_time.as_deref(), Some("2025-03-02T04:00:00.000Z"));
    assert_eq!(backend.seen("devices/reschedule")[0]["flow"], "flow-7");
}

#[tokio::test]
async fn test_customer_search() {
    let backend = Backend::new();
    let client = client_for(&backend).await;

    let names = client.search_customers("acme").await.unwrap();
    assert_eq!(names, vec!["Acme Telecom", "Acme Fibre"]);
    assert_eq!(backend.seen("customers/search")[0]["limit"], "10");

    let search = CustomerSearch::new(client);
    let result = search.search("glob").await.unwrap().unwrap();
    assert_eq!(result, vec!["Globex"]);

    let blank = search.search("").await.unwrap().unwrap();
    assert!(blank.is_empty());
    assert_eq!(backend.seen("customers/search").len(), 2);
}

#[tokio::test]
async fn test_customer_contacts_and_sites() {
    let backend = Backend::new();
    let client = client_for(&backend).await;

    let contacts = client.customer_contacts("Acme & Sons").await.unwrap();
    assert_eq!(contacts.len(), 2);
    assert_eq!(contacts[0].name, "Dana Ortiz");
    assert_eq!(contacts[0].email, None);
    assert_eq!(contacts[1].email.as_deref(), Some("lee@acme.test"));

    let sites = client.customer_sites("Acme/West").await.unwrap();
    assert_eq!(sites[0].site_name.as_deref(), Some("HQ"));
    assert_eq!(sites[0].ucpe_hostname.as_deref(), Some("ucpe-hq"));
    assert_eq!(sites[0].local_contact_name, None);
    // The slash stays inside one path segment.
    assert_eq!(backend.seen("customers/sites"), vec![json!("Acme/West")]);

    let err = client.customer_contacts("Initech").await.unwrap_err();
    assert!(matches!(err, TrackerError::Http { status: 404, .. }));
}

#[tokio::test]
async fn test_create_customer() {
    let backend = Backend::new();
    let client = client_for(&backend).await;

    let payload = CreateCustomerPayload {
        customer_name: "Globex".into(),
        site: Site {
            gps_site_id: Some("GPS-1".into()),
            site_name: Some("Plant".into()),
            ..Site::default()
        },
        contact: Contact {
            name: "Hank".into(),
            phone: Some("555-0199".into()),
            email: None,
        },
    };
    let reply = client.create_customer(&payload).await.unwrap();
    assert_eq!(reply["message"], "Customer created");

    let sent = backend.seen("customers/add");
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0]["customer_name"], "Globex");
    assert_eq!(sent[0]["site"], json!({ "gps_site_id": "GPS-1", "site_name": "Plant" }));
    assert_eq!(sent[0]["contact"]["customer_contact_phone"], "555-0199");
    assert!(sent[0]["contact"].get("customer_contact_email").is_none());
}

#[tokio::test]
async fn test_service_order_edit_and_save() {
    let backend = Backend::new();
    let client = client_for(&backend).await;

    let mut tree = ServiceTree::new(client.service_order("site-a.json").await.unwrap());
    assert_eq!(tree.file_name(), "site-a.json");
    tree.set_attribute("port-1", "portSpeed", "10G").unwrap();
    assert!(tree.is_dirty());

    let message = client.save_service_order(&mut tree).await.unwrap();
    assert_eq!(message, "Order saved");
    assert!(!tree.is_dirty());

    let saved = &backend.seen("orders/upload")[0];
    assert_eq!(saved["fileName"], "site-a.json");
    let port = &saved["content"][0]["children"][0]["metadata"];
    assert_eq!(port["serviceCharacteristicReadables"][0]["value"], "10G");
    assert_eq!(port["serviceCharacteristic"]["portSpeed"], "10G");

    let bare = client.service_order("bare.json").await.unwrap();
    assert_eq!(bare.file_name, "bare.json");
    assert_eq!(bare.nodes.len(), 1);
}

// ── Pollers ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_discovery_poller_stops_at_completion() {
    let backend = Backend::new();
    backend.set_discovery(vec![(0, 0), (1, 3), (3, 3)]);
    let client = client_for(&backend).await;

    let poller = Poller::new(DiscoveryProbe::new(client), FAST);
    poller.start();
    tokio::time::timeout(Duration::from_secs(5), poller.wait_complete())
        .await
        .expect("discovery should complete");

    assert_eq!(poller.state(), PollerState::Stopped);
    assert_eq!(poller.snapshot().map(|s| s.progress()), Some(JobProgress::new(3, 3)));

    let calls = backend.status_calls.load(Ordering::SeqCst);
    assert_eq!(calls, 3);
    tokio::time::sleep(FAST * 6).await;
    assert_eq!(backend.status_calls.load(Ordering::SeqCst), calls);
}

#[tokio::test]
async fn test_batch_poller_survives_outage() {
    let backend = Backend::new();
    backend.tasks_down.store(true, Ordering::SeqCst);
    backend.set_workflows(vec![
        event("d1", "f1", "mgmt-port", "STARTED", 1, false),
        event("d1", "f1", "flow-complete", "SUCCESS", 5, true),
        event("d2", "f2", "flow-complete", "SUCCESS", 4, true),
    ]);
    let client = client_for(&backend).await;

    let probe = BatchUpgradeProbe::new(client, "task-42", Step::upgrade_pipeline());
    let view = probe.view();
    let poller = Poller::new(probe, FAST);
    poller.start();

    tokio::time::sleep(FAST * 3).await;
    assert!(poller.stats().failed >= 1);
    assert!(poller.snapshot().is_none());
    assert!(poller.is_polling());
    // The reconciler's view lists every tracked step even before data arrives.
    assert_eq!(view.get().aggregate.per_step.len(), 7);

    backend.tasks_down.store(false, Ordering::SeqCst);
    tokio::time::timeout(Duration::from_secs(5), poller.wait_complete())
        .await
        .expect("batch should complete once the backend recovers");

    let snapshot = poller.snapshot().unwrap();
    assert!(snapshot.batch_complete);
    assert_eq!(snapshot.aggregate.all, 2);
    assert_eq!(snapshot.aggregate.tracked_total(), 0);
    assert_eq!(view.get().event_count, 3);

    let rows = snapshot.devices_at(&StepFilter::All);
    assert_eq!(rows[0].device_id, "d1");
}

#[tokio::test]
async fn test_batch_poller_in_progress_counts() {
    let backend = Backend::new();
    backend.set_workflows(vec![
        event("d1", "f1", "mgmt-port", "STARTED", 1, false),
        event("d1", "f1", "reboot-device", "STARTED", 3, false),
        event("d2", "f2", "mgmt-port", "SUCCESS", 2, false),
    ]);
    let client = client_for(&backend).await;

    let poller = Poller::new(
        BatchUpgradeProbe::new(client, "task-1", Step::upgrade_pipeline()),
        FAST,
    );
    poller.start();
    let mut reader = poller.reader();
    let view = tokio::time::timeout(Duration::from_secs(5), reader.wait_for(|v| v.is_some()))
        .await
        .unwrap()
        .flatten()
        .unwrap();

    assert_eq!(view.aggregate.all, 2);
    assert_eq!(view.aggregate.count(&Step::RebootDevice), 1);
    assert_eq!(view.aggregate.count(&Step::MgmtPort), 1);
    assert!(!view.batch_complete);
    assert_eq!(view.devices_at(&StepFilter::At(Step::MgmtPort))[0].device_id, "d2");

    poller.stop();
    // Let a request sent just before the stop reach the backend.
    tokio::time::sleep(FAST).await;
    let calls = backend.task_calls.load(Ordering::SeqCst);
    tokio::time::sleep(FAST * 4).await;
    assert_eq!(backend.task_calls.load(Ordering::SeqCst), calls);
}

#[tokio::test]
async fn test_batch_response_after_stop_leaves_view_untouched() {
    let backend = Backend::new();
    backend.task_delay_ms.store(300, Ordering::SeqCst);
    backend.set_workflows(vec![event("d1", "f1", "mgmt-port", "STARTED", 1, false)]);
    let client = client_for(&backend).await;

    let probe = BatchUpgradeProbe::new(client, "task-1", Step::upgrade_pipeline());
    let view = probe.view();
    let poller = Poller::new(probe, Duration::from_secs(5));

    poller.start();
    tokio::time::sleep(FAST).await;
    assert_eq!(backend.task_calls.load(Ordering::SeqCst), 1);
    poller.stop();

    tokio::time::sleep(Duration::from_millis(600)).await;
    assert!(poller.snapshot().is_none());
    assert_eq!(view.get().aggregate.all, 0);
    assert_eq!(view.get().event_count, 0);
    assert_eq!(poller.stats().discarded, 1);
    assert_eq!(backend.task_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_batch_restart_is_not_overwritten_by_stale_response() {
    let backend = Backend::new();
    backend.task_delay_ms.store(300, Ordering::SeqCst);
    backend.set_workflows(vec![event("d1", "f1", "mgmt-port", "STARTED", 1, false)]);
    let client = client_for(&backend).await;

    let probe = BatchUpgradeProbe::new(client, "task-1", Step::upgrade_pipeline());
    let view = probe.view();
    let poller = Poller::new(probe, Duration::from_secs(5));

    poller.start();
    tokio::time::sleep(FAST).await;
    poller.stop();

    // The new run fetches at once and gets the newer event list.
    backend.task_delay_ms.store(0, Ordering::SeqCst);
    backend.set_workflows(vec![
        event("d1", "f1", "reboot-device", "STARTED", 3, false),
        event("d2", "f2", "mgmt-port", "STARTED", 2, false),
    ]);
    poller.start();
    tokio::time::sleep(Duration::from_millis(600)).await;

    assert_eq!(backend.task_calls.load(Ordering::SeqCst), 2);
    assert_eq!(poller.stats().discarded, 1);
    assert_eq!(view.get().aggregate.all, 2);
    assert_eq!(view.get().aggregate.count(&Step::RebootDevice), 1);
    assert_eq!(poller.snapshot().unwrap().event_count, 2);
}

#[tokio::test]
async fn test_flow_log_poller_timeline() {
    let backend = Backend::new();
    backend.set_logs(vec![
        log_line("check-device-compatibility", "SUCCESS", 1_759_309_200_000),
        log_line("pre-upgrade-backup", "STARTED", 1_759_309_260_000),
    ]);
    let client = client_for(&backend).await;

    let poller = Poller::new(
        FlowLogProbe::new(client, "flow-1", Step::upgrade_pipeline()),
        FAST,
    );
    poller.start();
    tokio::time::sleep(FAST * 2).await;

    let timeline = poller.snapshot().unwrap();
    assert_eq!(timeline.active_index(), Some(1));
    assert_eq!(timeline.state_of(&Step::CheckDeviceCompatibility), Some(StepState::Completed));
    assert!(poller.is_polling());

    backend.set_logs(vec![
        log_line("check-device-compatibility", "SUCCESS", 1_759_309_200_000),
        log_line("pre-upgrade-backup", "SUCCESS", 1_759_309_260_000),
        log_line("flow-complete", "SUCCESS", 1_759_309_320_000),
    ]);
    tokio::time::timeout(Duration::from_secs(5), poller.wait_complete())
        .await
        .expect("flow should complete");
    assert_eq!(poller.snapshot().unwrap().completed_count(), 7);
}
