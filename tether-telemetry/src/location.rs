//! Location ping decoding.
//!
//! A ping is a JSON object with at least `lat`, `lng` and `timestamp`
//! (milliseconds since the Unix epoch). Agents are inconsistent about
//! numbers versus numeric strings, so both are accepted.

use crate::source::BlobSource;
use serde::Deserialize;
use serde_json::{Map, Value};
use tether_core::{BlobEntry, DecodeError, DecodeResult, LocationEvent};

/// What to do with a missing or non-numeric field.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoercionPolicy {
    /// Substitute `0`. A fully broken ping decodes to `(0, 0, 0)`.
    #[default]
    DefaultZero,
    /// Reject the record.
    StrictDrop,
}

/// A decoded ping together with the blob it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationFix {
    pub event: LocationEvent,
    pub source: BlobEntry,
}

/// Decode a ping with the default-zero policy.
pub fn decode_location(bytes: &[u8]) -> DecodeResult<LocationEvent> {
    decode_location_with(bytes, CoercionPolicy::DefaultZero)
}

pub fn decode_location_with(bytes: &[u8], policy: CoercionPolicy) -> DecodeResult<LocationEvent> {
    let value: Value = serde_json::from_slice(bytes)?;
    let object = value.as_object().ok_or(DecodeError::NotAnObject)?;

    let lat = field(object, "lat", policy, coerce_f64)?;
    let lng = field(object, "lng", policy, coerce_f64)?;
    let timestamp_millis = field(object, "timestamp", policy, coerce_i64)?;
    Ok(LocationEvent::new(lat, lng, timestamp_millis))
}

fn field<T: Default>(
    object: &Map<String, Value>,
    name: &'static str,
    policy: CoercionPolicy,
    coerce: fn(&Value) -> Option<T>,
) -> DecodeResult<T> {
    let result = match object.get(name) {
        None | Some(Value::Null) => Err(DecodeError::MissingField { field: name }),
        Some(raw) => coerce(raw).ok_or(DecodeError::NonNumeric { field: name }),
    };
    match (result, policy) {
        (Ok(value), _) => Ok(value),
        (Err(_), CoercionPolicy::DefaultZero) => Ok(T::default()),
        (Err(err), CoercionPolicy::StrictDrop) => Err(err),
    }
}

fn coerce_f64(raw: &Value) -> Option<f64> {
    let number = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

fn coerce_i64(raw: &Value) -> Option<i64> {
    match raw {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    }
}

fn integral(value: f64) -> Option<i64> {
    if value.is_finite() && value.fract() == 0.0 && value.abs() < i64::MAX as f64 {
        Some(value as i64)
    } else {
        None
    }
}

/// Download and decode every entry, newest first.
///
/// Entries with an empty body or an undecodable one are dropped. Under
/// `StrictDrop` so are entries with missing or non-numeric fields.
pub async fn decode_located(
    entries: &[BlobEntry],
    source: &dyn BlobSource,
    policy: CoercionPolicy,
) -> Vec<LocationFix> {
    let mut fixes = Vec::with_capacity(entries.len());
    for entry in entries {
        let bytes = source.fetch(entry).await;
        if bytes.is_empty() {
            tracing::debug!(path = %entry.path, "skipping empty location blob");
            continue;
        }
        match decode_location_with(&bytes, policy) {
            Ok(event) => fixes.push(LocationFix {
                event,
                source: entry.clone(),
            }),
            Err(err) => {
                tracing::debug!(path = %entry.path, error = %err, "dropping undecodable location");
            }
        }
    }
    fixes.sort_by(|a, b| b.event.timestamp_millis.cmp(&a.event.timestamp_millis));
    fixes
}

/// Events only, with the default-zero policy.
pub async fn decode_all_locations(
    entries: &[BlobEntry],
    source: &dyn BlobSource,
) -> Vec<LocationEvent> {
    decode_all_locations_with(entries, source, CoercionPolicy::DefaultZero).await
}

pub async fn decode_all_locations_with(
    entries: &[BlobEntry],
    source: &dyn BlobSource,
    policy: CoercionPolicy,
) -> Vec<LocationEvent> {
    decode_located(entries, source, policy)
        .await
        .into_iter()
        .map(|fix| fix.event)
        .collect()
}
