//! Local sync runner.
//!
//! Drives every syncer of a connector page by page, the way a sync engine
//! would, and writes each record as one JSON line.

use access_sdk::prelude::*;
use serde::Serialize;
use std::io::Write;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

use crate::error::{AppError, AppResult};

/// One line of runner output.
#[derive(Debug, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Record<'a> {
    ResourceType {
        resource_type: &'a ResourceType,
    },
    Resource {
        resource: &'a Resource,
    },
    Entitlement {
        entitlement: &'a Entitlement,
    },
    Grant {
        grant: &'a Grant,
    },
    Annotation {
        resource_type: &'a str,
        phase: &'static str,
        annotation: &'a Annotation,
    },
}

/// Record counts of a finished sync.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SyncSummary {
    pub resources: usize,
    pub entitlements: usize,
    pub grants: usize,
    pub annotations: usize,
}

/// Writes records as JSON lines.
struct RecordWriter<W: Write> {
    out: W,
}

impl<W: Write> RecordWriter<W> {
    fn write(&mut self, record: &Record<'_>) -> AppResult<()> {
        serde_json::to_writer(&mut self.out, record)
            .map_err(|e| AppError::Output(e.into()))?;
        self.out.write_all(b"\n")?;
        Ok(())
    }

    fn annotations(
        &mut self,
        resource_type: &str,
        phase: &'static str,
        results: &SyncOpResults,
        summary: &mut SyncSummary,
    ) -> AppResult<()> {
        for annotation in &results.annotations {
            self.write(&Record::Annotation {
                resource_type,
                phase,
                annotation,
            })?;
            summary.annotations += 1;
        }
        Ok(())
    }
}

/// Guards against an upstream returning the same cursor forever.
fn advance(
    resource_type: &str,
    phase: &'static str,
    current: &PageToken,
    results: &SyncOpResults,
) -> AppResult<Option<PageToken>> {
    if !results.has_more() {
        return Ok(None);
    }
    let next = results.next_token();
    if next == *current {
        return Err(AppError::StalledPaging {
            resource_type: resource_type.to_string(),
            phase,
            token: next.to_string(),
        });
    }
    Ok(Some(next))
}

/// Runs a full sync of `connector`, writing records to `out`.
///
/// # Errors
///
/// Returns the first syncer error, a cancellation, or an output failure.
#[instrument(skip_all)]
pub async fn run_sync<W: Write>(
    connector: &dyn Connector,
    cancel: &CancellationToken,
    out: W,
) -> AppResult<SyncSummary> {
    let mut writer = RecordWriter { out };
    let mut summary = SyncSummary::default();

    for syncer in connector.resource_syncers() {
        let resource_type = syncer.resource_type();
        let type_id = resource_type.id.as_str();
        writer.write(&Record::ResourceType { resource_type })?;

        let mut resources = Vec::new();
        let mut token = PageToken::first();
        loop {
            let attrs = SyncOpAttrs::page(token.clone(), cancel.clone());
            let (page, results) = syncer.list(None, &attrs).await?;
            debug!(resource_type = type_id, count = page.len(), "Listed page");
            writer.annotations(type_id, "list", &results, &mut summary)?;
            resources.extend(page);
            match advance(type_id, "list", &token, &results)? {
                Some(next) => token = next,
                None => break,
            }
        }

        for resource in &resources {
            writer.write(&Record::Resource { resource })?;
        }
        summary.resources += resources.len();

        for resource in &resources {
            if resource_type.skip == SkipPolicy::None {
                let mut token = PageToken::first();
                loop {
                    let attrs = SyncOpAttrs::page(token.clone(), cancel.clone());
                    let (entitlements, results) = syncer.entitlements(resource, &attrs).await?;
                    for entitlement in &entitlements {
                        writer.write(&Record::Entitlement { entitlement })?;
                    }
                    summary.entitlements += entitlements.len();
                    writer.annotations(type_id, "entitlements", &results, &mut summary)?;
                    match advance(type_id, "entitlements", &token, &results)? {
                        Some(next) => token = next,
                        None => break,
                    }
                }
            }

            if resource_type.skip != SkipPolicy::EntitlementsAndGrants {
                let mut token = PageToken::first();
                loop {
                    let attrs = SyncOpAttrs::page(token.clone(), cancel.clone());
                    let (grants, results) = syncer.grants(resource, &attrs).await?;
                    for grant in &grants {
                        writer.write(&Record::Grant { grant })?;
                    }
                    summary.grants += grants.len();
                    writer.annotations(type_id, "grants", &results, &mut summary)?;
                    match advance(type_id, "grants", &token, &results)? {
                        Some(next) => token = next,
                        None => break,
                    }
                }
            }
        }

        info!(
            resource_type = type_id,
            resources = resources.len(),
            "Resource type synced"
        );
    }

    writer.out.flush()?;
    Ok(summary)
}
