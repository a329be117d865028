//! Lineage edge aggregation and the scheduled maintenance passes.
//!
//! Edges are unique by (sourceServiceAccount, topic, direction) and only
//! ever grow: all-time counters are monotonic, the rolling 24h counters are
//! zeroed by the scheduled reset. Batch processing counts failures per
//! record and never aborts the batch.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::cms::{CmsClient, collections};
use crate::context::{ActivityContext, require};
use crate::doc::{doc_id, extract_relation_id};
use crate::error::{ActivityError, ActivityResult};
use crate::query::QueryBuilder;
use crate::types::{Application, Direction, LineageEdge, Topic, VirtualCluster};

const MAINTENANCE_PAGE_LIMIT: u32 = 1000;
/// Backstop for the drain loops; a page that makes no progress stops the
/// pass instead of spinning on the same records.
const MAX_MAINTENANCE_PAGES: u32 = 10_000;

// ---------------------------------------------------------------------------
// Batch processing

/// One activity record from the gateway's accounting stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LineageRecord {
    pub virtual_cluster_id: String,
    pub service_account_id: String,
    pub topic_virtual_name: String,
    /// produce | consume
    pub direction: String,
    #[serde(default)]
    pub consumer_group_id: String,
    pub bytes: i64,
    pub message_count: i64,
    #[serde(default)]
    pub window_start: Option<DateTime<Utc>>,
    #[serde(default)]
    pub window_end: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessBatchInput {
    pub records: Vec<LineageRecord>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessBatchOutput {
    pub processed: usize,
    pub failed: usize,
    pub new_edges: usize,
}

/// Upsert one edge per record; failures are counted, never propagated.
pub fn process_lineage_batch(
    ctx: &ActivityContext,
    cms: &CmsClient,
    input: &ProcessBatchInput,
) -> ActivityResult<ProcessBatchOutput> {
    ctx.info(&format!("processing {} lineage records", input.records.len()));

    let mut output = ProcessBatchOutput::default();
    for record in &input.records {
        ctx.ensure_active()?;
        match process_record(ctx, cms, record) {
            Ok(created) => {
                output.processed += 1;
                if created {
                    output.new_edges += 1;
                }
            }
            Err(err) => {
                ctx.warn(&format!(
                    "lineage record for {} on {} failed: {err:#}",
                    record.service_account_id, record.topic_virtual_name
                ));
                output.failed += 1;
            }
        }
    }

    ctx.info(&format!(
        "lineage batch complete ({} processed, {} failed, {} new edges)",
        output.processed, output.failed, output.new_edges
    ));
    Ok(output)
}

/// Returns true when a new edge was created.
fn process_record(
    ctx: &ActivityContext,
    cms: &CmsClient,
    record: &LineageRecord,
) -> ActivityResult<bool> {
    require("virtual_cluster_id", &record.virtual_cluster_id)?;
    require("service_account_id", &record.service_account_id)?;
    require("topic_virtual_name", &record.topic_virtual_name)?;
    let direction = Direction::parse(&record.direction).ok_or_else(|| {
        ActivityError::invalid_input(format!("unknown direction {}", record.direction))
    })?;

    // Resolve the denormalized workspace through VC → application.
    let vc_doc = cms.get_with_depth(
        ctx,
        collections::VIRTUAL_CLUSTERS,
        &record.virtual_cluster_id,
        1,
    )?;
    let vc = VirtualCluster::from_doc(&vc_doc);
    let workspace_id = match crate::doc::relation_doc(&vc_doc, "application") {
        Some(app_doc) => Application::from_doc(app_doc).workspace_id,
        None => {
            if vc.application_id.is_empty() {
                String::new()
            } else {
                let app_doc =
                    cms.get_with_depth(ctx, collections::APPLICATIONS, &vc.application_id, 1)?;
                extract_relation_id(&app_doc, "workspace")
            }
        }
    };

    let topic_doc = cms
        .find_one(
            ctx,
            collections::TOPICS,
            &QueryBuilder::new()
                .where_equals("virtualCluster", &record.virtual_cluster_id)
                .where_equals("name", &record.topic_virtual_name),
        )?
        .ok_or_else(|| {
            ActivityError::not_found(format!(
                "topic {} in virtual cluster {}",
                record.topic_virtual_name, record.virtual_cluster_id
            ))
        })?;
    let topic = Topic::from_doc(&topic_doc);

    let existing = cms.find_one(
        ctx,
        collections::LINEAGE_EDGES,
        &QueryBuilder::new()
            .where_equals("sourceServiceAccount", &record.service_account_id)
            .where_equals("topic", &topic.id)
            .where_equals("direction", direction.as_str()),
    )?;
    let now = Utc::now();

    match existing {
        Some(edge_doc) => {
            let edge = LineageEdge::from_doc(&edge_doc);
            let mut patch = json!({
                "bytesAllTime": edge.bytes_all_time + record.bytes,
                "messagesAllTime": edge.messages_all_time + record.message_count,
                "bytesLast24h": edge.bytes_last_24h + record.bytes,
                "messagesLast24h": edge.messages_last_24h + record.message_count,
                "lastSeen": now.to_rfc3339(),
                "isActive": true,
            });
            if !record.consumer_group_id.is_empty() {
                patch["consumerGroup"] = json!(record.consumer_group_id);
            }
            cms.update_internal(ctx, collections::LINEAGE_EDGES, &edge.id, patch)?;
            Ok(false)
        }
        None => {
            let mut body = json!({
                "sourceServiceAccount": record.service_account_id,
                "topic": topic.id,
                "direction": direction.as_str(),
                "bytesAllTime": record.bytes,
                "messagesAllTime": record.message_count,
                "bytesLast24h": record.bytes,
                "messagesLast24h": record.message_count,
                "firstSeen": now.to_rfc3339(),
                "lastSeen": now.to_rfc3339(),
                "isActive": true,
            });
            if !workspace_id.is_empty() {
                body["workspace"] = json!(workspace_id);
            }
            if !record.consumer_group_id.is_empty() {
                body["consumerGroup"] = json!(record.consumer_group_id);
            }
            cms.create(ctx, collections::LINEAGE_EDGES, body)?;
            Ok(true)
        }
    }
}

// ---------------------------------------------------------------------------
// Reset 24h metrics

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResetMetricsOutput {
    pub reset_count: usize,
    pub failed: usize,
}

/// Zero the rolling counters on every edge that has any. Runs on an hourly
/// schedule; already-zero edges fall out of the query, so re-runs are
/// no-ops.
pub fn reset_24h_metrics(ctx: &ActivityContext, cms: &CmsClient) -> ActivityResult<ResetMetricsOutput> {
    ctx.info("resetting rolling 24h lineage counters");

    let mut output = ResetMetricsOutput::default();
    let mut pages = 0u32;
    loop {
        ctx.ensure_active()?;
        pages += 1;
        if pages > MAX_MAINTENANCE_PAGES {
            break;
        }

        let found = cms.find(
            ctx,
            collections::LINEAGE_EDGES,
            &QueryBuilder::new()
                .or_where_greater_than("bytesLast24h", "0")
                .or_where_greater_than("messagesLast24h", "0")
                .limit(MAINTENANCE_PAGE_LIMIT),
        )?;
        if found.docs.is_empty() {
            break;
        }

        let mut progressed = false;
        for doc in &found.docs {
            ctx.ensure_active()?;
            let id = doc_id(doc);
            match cms.update_internal(
                ctx,
                collections::LINEAGE_EDGES,
                &id,
                json!({"bytesLast24h": 0, "messagesLast24h": 0}),
            ) {
                Ok(_) => {
                    output.reset_count += 1;
                    progressed = true;
                }
                Err(err) => {
                    ctx.warn(&format!("resetting edge {id} failed: {err:#}"));
                    output.failed += 1;
                }
            }
        }
        // Every update failed; the same page would come back forever.
        if !progressed {
            break;
        }
    }

    ctx.info(&format!(
        "reset complete ({} edges, {} failed)",
        output.reset_count, output.failed
    ));
    Ok(output)
}

// ---------------------------------------------------------------------------
// Mark inactive edges

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarkInactiveInput {
    pub hours_threshold: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarkInactiveOutput {
    pub marked: usize,
    pub failed: usize,
}

/// Deactivate edges not seen within the threshold.
pub fn mark_inactive_edges(
    ctx: &ActivityContext,
    cms: &CmsClient,
    input: &MarkInactiveInput,
) -> ActivityResult<MarkInactiveOutput> {
    if input.hours_threshold <= 0 {
        return Err(ActivityError::invalid_input(
            "hours_threshold must be positive",
        ));
    }
    let cutoff = Utc::now() - chrono::Duration::hours(input.hours_threshold);
    ctx.info(&format!("marking edges inactive (last seen before {cutoff})"));

    let mut output = MarkInactiveOutput::default();
    let mut pages = 0u32;
    loop {
        ctx.ensure_active()?;
        pages += 1;
        if pages > MAX_MAINTENANCE_PAGES {
            break;
        }

        let found = cms.find(
            ctx,
            collections::LINEAGE_EDGES,
            &QueryBuilder::new()
                .where_equals("isActive", "true")
                .where_less_than("lastSeen", cutoff.to_rfc3339())
                .limit(MAINTENANCE_PAGE_LIMIT),
        )?;
        if found.docs.is_empty() {
            break;
        }

        let mut progressed = false;
        for doc in &found.docs {
            ctx.ensure_active()?;
            let id = doc_id(doc);
            match cms.update_internal(
                ctx,
                collections::LINEAGE_EDGES,
                &id,
                json!({"isActive": false}),
            ) {
                Ok(_) => {
                    output.marked += 1;
                    progressed = true;
                }
                Err(err) => {
                    ctx.warn(&format!("deactivating edge {id} failed: {err:#}"));
                    output.failed += 1;
                }
            }
        }
        if !progressed {
            break;
        }
    }

    ctx.info(&format!(
        "inactivity pass complete ({} marked, {} failed)",
        output.marked, output.failed
    ));
    Ok(output)
}

// ---------------------------------------------------------------------------
// Daily snapshots

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateSnapshotsInput {
    /// Defaults to today (UTC).
    #[serde(default)]
    pub snapshot_date: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateSnapshotsOutput {
    pub snapshots_created: usize,
    pub topics_covered: usize,
    pub failed: usize,
}

/// Aggregate all active edges into one snapshot per topic.
pub fn create_daily_snapshots(
    ctx: &ActivityContext,
    cms: &CmsClient,
    input: &CreateSnapshotsInput,
) -> ActivityResult<CreateSnapshotsOutput> {
    let snapshot_date = if input.snapshot_date.is_empty() {
        Utc::now().format("%Y-%m-%d").to_string()
    } else {
        input.snapshot_date.clone()
    };
    ctx.info(&format!("creating lineage snapshots for {snapshot_date}"));

    // Page through every active edge, depth 1 so topic and workspace come
    // back populated.
    let mut edges = Vec::new();
    let mut page = 1u32;
    loop {
        ctx.ensure_active()?;
        let found = cms.find(
            ctx,
            collections::LINEAGE_EDGES,
            &QueryBuilder::new()
                .where_equals("isActive", "true")
                .depth(1)
                .limit(MAINTENANCE_PAGE_LIMIT)
                .page(page),
        )?;
        let batch = found.docs.len();
        edges.extend(found.docs.iter().map(LineageEdge::from_doc));
        if batch < MAINTENANCE_PAGE_LIMIT as usize {
            break;
        }
        page += 1;
    }

    // Group by topic, keeping insertion independent of query order.
    let mut by_topic: BTreeMap<String, Vec<&LineageEdge>> = BTreeMap::new();
    for edge in &edges {
        if edge.topic_id.is_empty() {
            continue;
        }
        by_topic.entry(edge.topic_id.clone()).or_default().push(edge);
    }

    let mut output = CreateSnapshotsOutput {
        topics_covered: by_topic.len(),
        ..Default::default()
    };

    for (topic_id, topic_edges) in &by_topic {
        ctx.ensure_active()?;
        let snapshot = build_snapshot(topic_id, topic_edges, &snapshot_date);
        match cms.create(ctx, collections::LINEAGE_SNAPSHOTS, snapshot) {
            Ok(_) => output.snapshots_created += 1,
            Err(err) => {
                ctx.warn(&format!("snapshot for topic {topic_id} failed: {err:#}"));
                output.failed += 1;
            }
        }
    }

    ctx.info(&format!(
        "snapshots complete ({} created over {} topics, {} failed)",
        output.snapshots_created, output.topics_covered, output.failed
    ));
    Ok(output)
}

fn build_snapshot(
    topic_id: &str,
    edges: &[&LineageEdge],
    snapshot_date: &str,
) -> serde_json::Value {
    let mut producers = Vec::new();
    let mut consumers = Vec::new();
    let mut total_bytes_in = 0i64;
    let mut total_bytes_out = 0i64;
    let mut total_messages_in = 0i64;
    let mut total_messages_out = 0i64;

    // Deterministic ordering: by service account id.
    let mut sorted: Vec<&&LineageEdge> = edges.iter().collect();
    sorted.sort_by(|a, b| a.source_service_account.cmp(&b.source_service_account));

    for edge in sorted {
        match edge.direction {
            Some(Direction::Produce) => {
                total_bytes_in += edge.bytes_all_time;
                total_messages_in += edge.messages_all_time;
                producers.push(json!({
                    "serviceAccountId": edge.source_service_account,
                    "workspaceId": edge.workspace_id,
                    "bytes": edge.bytes_all_time,
                    "messages": edge.messages_all_time,
                }));
            }
            Some(Direction::Consume) => {
                total_bytes_out += edge.bytes_all_time;
                total_messages_out += edge.messages_all_time;
                consumers.push(json!({
                    "serviceAccountId": edge.source_service_account,
                    "workspaceId": edge.workspace_id,
                    "consumerGroupId": edge.consumer_group,
                    "bytes": edge.bytes_all_time,
                    "messages": edge.messages_all_time,
                }));
            }
            None => {}
        }
    }

    json!({
        "topic": topic_id,
        "snapshotDate": snapshot_date,
        "producers": producers,
        "consumers": consumers,
        "producerCount": producers.len(),
        "consumerCount": consumers.len(),
        "totalBytesIn": total_bytes_in,
        "totalBytesOut": total_bytes_out,
        "totalMessagesIn": total_messages_in,
        "totalMessagesOut": total_messages_out,
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::testsupport::{MockCms, Route};

    fn ctx() -> ActivityContext {
        ActivityContext::background("test")
    }

    fn record() -> LineageRecord {
        LineageRecord {
            virtual_cluster_id: "vc-1".to_string(),
            service_account_id: "sa-1".to_string(),
            topic_virtual_name: "events".to_string(),
            direction: "produce".to_string(),
            bytes: 1024,
            message_count: 10,
            ..Default::default()
        }
    }

    fn vc_route() -> Route {
        Route::get(
            "/api/virtual-clusters/vc-1",
            json!({
                "id": "vc-1",
                "application": {"id": "app-1", "workspace": "ws-1"}
            }),
        )
    }

    fn topic_route() -> Route {
        Route::get(
            "/api/topics",
            json!({"docs": [{"id": "t-1", "name": "events"}], "totalDocs": 1}),
        )
    }

    #[test]
    fn first_record_creates_the_edge() {
        let cms = MockCms::start(vec![
            vc_route(),
            topic_route(),
            Route::get("/api/lineage-edges", json!({"docs": [], "totalDocs": 0})),
            Route::post("/api/lineage-edges", json!({"doc": {"id": "edge-1"}})),
        ]);

        let out = process_lineage_batch(
            &ctx(),
            &cms.client(),
            &ProcessBatchInput {
                records: vec![record()],
            },
        )
        .expect("batch");
        assert_eq!(out.processed, 1);
        assert_eq!(out.failed, 0);
        assert_eq!(out.new_edges, 1);

        let (_, _, body) = cms
            .recorded()
            .into_iter()
            .find(|(method, url, _)| method == "POST" && url.contains("lineage-edges"))
            .expect("create");
        let body: serde_json::Value = serde_json::from_str(&body).expect("json");
        assert_eq!(body["bytesAllTime"], 1024);
        assert_eq!(body["bytesLast24h"], 1024);
        assert_eq!(body["messagesAllTime"], 10);
        assert_eq!(body["workspace"], "ws-1");
        assert_eq!(body["isActive"], true);
        assert!(body["firstSeen"].is_string());
    }

    #[test]
    fn second_record_adds_to_both_counter_sets() {
        let cms = MockCms::start(vec![
            vc_route(),
            topic_route(),
            Route::get(
                "/api/lineage-edges",
                json!({"docs": [{
                    "id": "edge-1",
                    "sourceServiceAccount": "sa-1",
                    "topic": "t-1",
                    "direction": "produce",
                    "bytesAllTime": 1024,
                    "messagesAllTime": 10,
                    "bytesLast24h": 1024,
                    "messagesLast24h": 10
                }], "totalDocs": 1}),
            ),
            Route::patch("/api/internal/lineage-edges/edge-1", json!({"doc": {"id": "edge-1"}})),
        ]);

        let out = process_lineage_batch(
            &ctx(),
            &cms.client(),
            &ProcessBatchInput {
                records: vec![record()],
            },
        )
        .expect("batch");
        assert_eq!(out.new_edges, 0);
        assert_eq!(out.processed, 1);

        let patches = cms.patches_to("/api/internal/lineage-edges/edge-1");
        assert_eq!(patches[0]["bytesAllTime"], 2048);
        assert_eq!(patches[0]["messagesAllTime"], 20);
        assert_eq!(patches[0]["bytesLast24h"], 2048);
        assert_eq!(patches[0]["messagesLast24h"], 20);
        assert_eq!(patches[0]["isActive"], true);
    }

    #[test]
    fn failures_are_counted_not_propagated() {
        // Topic lookup returns nothing for the second record.
        let cms = MockCms::start(vec![
            vc_route(),
            Route::get_once(
                "/api/topics",
                json!({"docs": [{"id": "t-1", "name": "events"}], "totalDocs": 1}),
            ),
            Route::get("/api/topics", json!({"docs": [], "totalDocs": 0})),
            Route::get("/api/lineage-edges", json!({"docs": [], "totalDocs": 0})),
            Route::post("/api/lineage-edges", json!({"doc": {"id": "edge-1"}})),
        ]);

        let mut missing_topic = record();
        missing_topic.topic_virtual_name = "ghost".to_string();
        let out = process_lineage_batch(
            &ctx(),
            &cms.client(),
            &ProcessBatchInput {
                records: vec![record(), missing_topic],
            },
        )
        .expect("batch");
        assert_eq!(out.processed, 1);
        assert_eq!(out.failed, 1);
        assert_eq!(out.new_edges, 1);
    }

    #[test]
    fn consumer_records_carry_the_group() {
        let cms = MockCms::start(vec![
            vc_route(),
            topic_route(),
            Route::get("/api/lineage-edges", json!({"docs": [], "totalDocs": 0})),
            Route::post("/api/lineage-edges", json!({"doc": {"id": "edge-2"}})),
        ]);

        let mut consumer = record();
        consumer.direction = "consume".to_string();
        consumer.consumer_group_id = "cg-orders".to_string();
        process_lineage_batch(
            &ctx(),
            &cms.client(),
            &ProcessBatchInput {
                records: vec![consumer],
            },
        )
        .expect("batch");

        let (_, _, body) = cms
            .recorded()
            .into_iter()
            .find(|(method, url, _)| method == "POST" && url.contains("lineage-edges"))
            .expect("create");
        let body: serde_json::Value = serde_json::from_str(&body).expect("json");
        assert_eq!(body["direction"], "consume");
        assert_eq!(body["consumerGroup"], "cg-orders");
    }

    #[test]
    fn reset_drains_pages_until_empty() {
        let cms = MockCms::start(vec![
            Route::get_once(
                "/api/lineage-edges",
                json!({"docs": [
                    {"id": "edge-1", "bytesLast24h": 10},
                    {"id": "edge-2", "bytesLast24h": 20}
                ], "totalDocs": 2}),
            ),
            Route::get("/api/lineage-edges", json!({"docs": [], "totalDocs": 0})),
            Route::patch("/api/internal/lineage-edges/", json!({"doc": {"id": "x"}})),
        ]);

        let out = reset_24h_metrics(&ctx(), &cms.client()).expect("reset");
        assert_eq!(out.reset_count, 2);
        assert_eq!(out.failed, 0);

        // The or-group query went out.
        let (_, url, _) = &cms.recorded()[0];
        assert!(url.contains("or"));
        assert!(url.contains("bytesLast24h"));
        assert!(url.contains("messagesLast24h"));

        let patches = cms.patches_to("/api/internal/lineage-edges/");
        assert_eq!(patches.len(), 2);
        assert_eq!(patches[0]["bytesLast24h"], 0);
        assert_eq!(patches[0]["messagesLast24h"], 0);
    }

    #[test]
    fn reset_stops_when_no_update_succeeds() {
        let cms = MockCms::start(vec![
            Route::get(
                "/api/lineage-edges",
                json!({"docs": [{"id": "edge-1", "bytesLast24h": 10}], "totalDocs": 1}),
            ),
            Route::patch("/api/internal/lineage-edges/", json!({})).with_status(500),
        ]);

        let out = reset_24h_metrics(&ctx(), &cms.client()).expect("reset");
        assert_eq!(out.reset_count, 0);
        assert_eq!(out.failed, 1);
    }

    #[test]
    fn mark_inactive_uses_the_cutoff() {
        let cms = MockCms::start(vec![
            Route::get_once(
                "/api/lineage-edges",
                json!({"docs": [{"id": "edge-1", "isActive": true}], "totalDocs": 1}),
            ),
            Route::get("/api/lineage-edges", json!({"docs": [], "totalDocs": 0})),
            Route::patch("/api/internal/lineage-edges/edge-1", json!({"doc": {"id": "edge-1"}})),
        ]);

        let out = mark_inactive_edges(
            &ctx(),
            &cms.client(),
            &MarkInactiveInput {
                hours_threshold: 24,
            },
        )
        .expect("mark");
        assert_eq!(out.marked, 1);

        let (_, url, _) = &cms.recorded()[0];
        assert!(url.contains("isActive"));
        assert!(url.contains("less_than"));

        let patches = cms.patches_to("/api/internal/lineage-edges/edge-1");
        assert_eq!(patches[0]["isActive"], false);
    }

    #[test]
    fn mark_inactive_requires_a_positive_threshold() {
        let cms = MockCms::start(vec![]);
        let err = mark_inactive_edges(
            &ctx(),
            &cms.client(),
            &MarkInactiveInput { hours_threshold: 0 },
        )
        .expect_err("zero threshold");
        assert!(matches!(err, ActivityError::InvalidInput(_)));
    }

    #[test]
    fn snapshots_aggregate_per_topic() {
        let cms = MockCms::start(vec![
            Route::get(
                "/api/lineage-edges",
                json!({"docs": [
                    {
                        "id": "e1",
                        "sourceServiceAccount": "sa-b",
                        "topic": {"id": "t-1", "name": "events"},
                        "direction": "produce",
                        "bytesAllTime": 100,
                        "messagesAllTime": 10,
                        "workspace": "ws-1",
                        "isActive": true
                    },
                    {
                        "id": "e2",
                        "sourceServiceAccount": "sa-a",
                        "topic": {"id": "t-1", "name": "events"},
                        "direction": "consume",
                        "consumerGroup": "cg-1",
                        "bytesAllTime": 80,
                        "messagesAllTime": 8,
                        "workspace": "ws-2",
                        "isActive": true
                    },
                    {
                        "id": "e3",
                        "sourceServiceAccount": "sa-c",
                        "topic": {"id": "t-2", "name": "orders"},
                        "direction": "produce",
                        "bytesAllTime": 50,
                        "messagesAllTime": 5,
                        "workspace": "ws-1",
                        "isActive": true
                    }
                ], "totalDocs": 3}),
            ),
            Route::post("/api/lineage-snapshots", json!({"doc": {"id": "snap"}})),
        ]);

        let out = create_daily_snapshots(
            &ctx(),
            &cms.client(),
            &CreateSnapshotsInput {
                snapshot_date: "2026-08-01".to_string(),
            },
        )
        .expect("snapshots");
        assert_eq!(out.topics_covered, 2);
        assert_eq!(out.snapshots_created, 2);
        assert_eq!(out.failed, 0);

        let bodies: Vec<serde_json::Value> = cms
            .recorded()
            .into_iter()
            .filter(|(method, url, _)| method == "POST" && url.contains("lineage-snapshots"))
            .map(|(_, _, body)| serde_json::from_str(&body).expect("json"))
            .collect();
        assert_eq!(bodies.len(), 2);

        let t1 = bodies
            .iter()
            .find(|b| b["topic"] == "t-1")
            .expect("t-1 snapshot");
        assert_eq!(t1["snapshotDate"], "2026-08-01");
        assert_eq!(t1["producerCount"], 1);
        assert_eq!(t1["consumerCount"], 1);
        assert_eq!(t1["totalBytesIn"], 100);
        assert_eq!(t1["totalBytesOut"], 80);
        assert_eq!(t1["consumers"][0]["consumerGroupId"], "cg-1");

        let t2 = bodies
            .iter()
            .find(|b| b["topic"] == "t-2")
            .expect("t-2 snapshot");
        assert_eq!(t2["producerCount"], 1);
        assert_eq!(t2["consumerCount"], 0);
    }
}
