//! DNS operations for MockCloudflareClient
//!
//! Handles zones and records. Name filters match case-insensitively, like the API.

use super::{MockCall, MockCloudflareClient};
use crate::error::CloudflareError;
use crate::models::*;

pub async fn list_zones(client: &MockCloudflareClient) -> Result<Vec<Zone>, CloudflareError> {
    Ok(client.zones.lock().unwrap().clone())
}

pub async fn list_dns_records(
    client: &MockCloudflareClient,
    zone_id: &str,
    record_type: Option<&str>,
    name: Option<&str>,
) -> Result<Vec<DnsRecord>, CloudflareError> {
    if client.failing_record_zones.lock().unwrap().contains(zone_id) {
        return Err(CloudflareError::Api {
            status: 500,
            message: format!("injected failure listing records of zone {}", zone_id),
        });
    }

    let records = client.dns_records.lock().unwrap();
    Ok(records
        .get(zone_id)
        .map(|records| {
            records
                .iter()
                .filter(|r| record_type.is_none_or(|t| r.record_type.eq_ignore_ascii_case(t)))
                .filter(|r| name.is_none_or(|n| r.name.eq_ignore_ascii_case(n)))
                .cloned()
                .collect()
        })
        .unwrap_or_default())
}

pub async fn create_dns_record(
    client: &MockCloudflareClient,
    zone_id: &str,
    input: &DnsRecordInput,
) -> Result<DnsRecord, CloudflareError> {
    client.record(MockCall::CreateDnsRecord {
        zone_id: zone_id.to_string(),
        name: input.name.clone(),
    });

    let record = DnsRecord {
        id: client.next_id(),
        record_type: input.record_type.clone(),
        name: input.name.clone(),
        content: input.content.clone(),
        proxied: input.proxied,
        comment: input.comment.clone(),
        ttl: input.ttl,
        modified_on: Some(client.now()),
    };
    client
        .dns_records
        .lock()
        .unwrap()
        .entry(zone_id.to_string())
        .or_default()
        .push(record.clone());
    Ok(record)
}

pub async fn update_dns_record(
    client: &MockCloudflareClient,
    zone_id: &str,
    record_id: &str,
    input: &DnsRecordInput,
) -> Result<DnsRecord, CloudflareError> {
    client.record(MockCall::UpdateDnsRecord {
        zone_id: zone_id.to_string(),
        record_id: record_id.to_string(),
    });

    let now = client.now();
    let mut records = client.dns_records.lock().unwrap();
    let record = records
        .get_mut(zone_id)
        .and_then(|records| records.iter_mut().find(|r| r.id == record_id))
        .ok_or_else(|| CloudflareError::NotFound(format!("DNS record {} not found", record_id)))?;

    record.record_type = input.record_type.clone();
    record.name = input.name.clone();
    record.content = input.content.clone();
    record.proxied = input.proxied;
    record.ttl = input.ttl;
    record.comment = input.comment.clone();
    record.modified_on = Some(now);
    Ok(record.clone())
}

pub async fn delete_dns_record(
    client: &MockCloudflareClient,
    zone_id: &str,
    record_id: &str,
) -> Result<(), CloudflareError> {
    client.record(MockCall::DeleteDnsRecord {
        zone_id: zone_id.to_string(),
        record_id: record_id.to_string(),
    });

    let mut records = client.dns_records.lock().unwrap();
    let records = records
        .get_mut(zone_id)
        .ok_or_else(|| CloudflareError::NotFound(format!("zone {} has no records", zone_id)))?;
    let before = records.len();
    records.retain(|r| r.id != record_id);
    if records.len() == before {
        return Err(CloudflareError::NotFound(format!("DNS record {} not found", record_id)));
    }
    Ok(())
}
