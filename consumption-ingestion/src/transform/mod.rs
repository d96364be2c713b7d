use std::collections::{hash_map::Entry, HashMap};

use rte_client::domain::ConsumptionSample;
use serde_json::{Map, Value};
use time::{format_description::well_known::Rfc3339, macros::datetime, OffsetDateTime};

/// Canonical field names, upper-cased for storage compatibility. Provider
/// payloads are matched case-insensitively against these.
const FIELD_START_DATE: &str = "START_DATE";
const FIELD_END_DATE: &str = "END_DATE";
const FIELD_UPDATED_DATE: &str = "UPDATED_DATE";
const FIELD_VALUE: &str = "VALUE";

const RECORD_GROUPS_FIELD: &str = "short_term";
const GROUP_VALUES_FIELD: &str = "values";

#[derive(Debug, Default)]
pub struct NormalizedBatch {
    pub samples: Vec<ConsumptionSample>,
    pub dropped: usize,
}

/// Flatten a raw provider response into canonical samples.
///
/// All record groups' value lists are concatenated in provider order. A
/// malformed record (missing field, unparseable timestamp, non-numeric or
/// negative value) is dropped and counted; it never aborts the batch.
/// Null or group-less input yields an empty batch, which the caller treats
/// as "nothing to ingest".
pub fn normalize(raw: &Value) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();

    let groups = raw
        .as_object()
        .and_then(|obj| field_ci(obj, RECORD_GROUPS_FIELD))
        .and_then(Value::as_array);
    let Some(groups) = groups else {
        return batch;
    };

    for group in groups {
        let values = group
            .as_object()
            .and_then(|obj| field_ci(obj, GROUP_VALUES_FIELD))
            .and_then(Value::as_array);
        let Some(values) = values else {
            continue;
        };

        for entry in values {
            match normalize_entry(entry) {
                Ok(sample) => batch.samples.push(sample),
                Err(reason) => {
                    batch.dropped += 1;
                    tracing::warn!(%reason, "dropping malformed consumption record");
                }
            }
        }
    }

    batch
}

/// Collapse duplicate natural keys within one batch.
///
/// Per key, the sample with the latest `updated_time` survives; an absent
/// `updated_time` never beats a present one, and on a tie the
/// first-encountered sample is kept. Survivors keep the relative order of
/// each key's first occurrence.
pub fn dedupe(samples: Vec<ConsumptionSample>) -> Vec<ConsumptionSample> {
    let mut slot_by_key: HashMap<(OffsetDateTime, OffsetDateTime), usize> =
        HashMap::with_capacity(samples.len());
    let mut out: Vec<ConsumptionSample> = Vec::with_capacity(samples.len());

    for sample in samples {
        match slot_by_key.entry(sample.natural_key()) {
            Entry::Vacant(slot) => {
                slot.insert(out.len());
                out.push(sample);
            }
            Entry::Occupied(slot) => {
                let kept = &mut out[*slot.get()];
                if supersedes(&sample, kept) {
                    *kept = sample;
                }
            }
        }
    }

    out
}

fn supersedes(candidate: &ConsumptionSample, kept: &ConsumptionSample) -> bool {
    match (candidate.updated_time, kept.updated_time) {
        (Some(new), Some(old)) => new > old,
        (Some(_), None) => true,
        _ => false,
    }
}

fn field_ci<'a>(obj: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    obj.iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value)
}

fn normalize_entry(entry: &Value) -> Result<ConsumptionSample, String> {
    let obj = entry
        .as_object()
        .ok_or_else(|| "record is not an object".to_string())?;

    let start_time = required_timestamp(obj, FIELD_START_DATE)?;
    let end_time = required_timestamp(obj, FIELD_END_DATE)?;
    let updated_time = optional_timestamp(obj, FIELD_UPDATED_DATE)?;
    let value = required_value(obj, FIELD_VALUE)?;

    if value < 0.0 {
        return Err(format!("{FIELD_VALUE} must be non-negative"));
    }

    let min_ts = datetime!(2000-01-01 00:00:00 UTC);
    let max_ts = datetime!(2100-01-01 00:00:00 UTC);
    if start_time < min_ts || start_time > max_ts {
        return Err(format!("{FIELD_START_DATE} out of allowed range"));
    }

    Ok(ConsumptionSample {
        start_time,
        end_time,
        updated_time,
        value,
    })
}

fn required_timestamp(obj: &Map<String, Value>, name: &str) -> Result<OffsetDateTime, String> {
    let raw = field_ci(obj, name).ok_or_else(|| format!("missing {name}"))?;
    parse_timestamp(raw, name)
}

fn optional_timestamp(obj: &Map<String, Value>, name: &str) -> Result<Option<OffsetDateTime>, String> {
    match field_ci(obj, name) {
        None | Some(Value::Null) => Ok(None),
        Some(raw) => parse_timestamp(raw, name).map(Some),
    }
}

fn parse_timestamp(raw: &Value, name: &str) -> Result<OffsetDateTime, String> {
    let text = raw
        .as_str()
        .ok_or_else(|| format!("{name} is not a timestamp string"))?;
    OffsetDateTime::parse(text, &Rfc3339).map_err(|e| format!("unparseable {name} '{text}': {e}"))
}

fn required_value(obj: &Map<String, Value>, name: &str) -> Result<f64, String> {
    let raw = field_ci(obj, name).ok_or_else(|| format!("missing {name}"))?;
    match raw {
        Value::Number(n) => n.as_f64().ok_or_else(|| format!("{name} is not representable")),
        Value::String(s) => s
            .trim()
            .parse()
            .map_err(|_| format!("{name} '{s}' is not numeric")),
        _ => Err(format!("{name} is not numeric")),
    }
}
