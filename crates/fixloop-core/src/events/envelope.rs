//! Versioned event envelopes for bus traffic in both directions.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::EventError;
use crate::models::{FindingObserved, FindingResolved, FixApplied};

/// Every event type the pipeline consumes or produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    FindingObserved,
    FixApplied,
    FindingResolved,
    PairCreated,
    PatternPromoted,
    PatternDemoted,
    CodemodValidated,
}

impl EventType {
    pub const ALL: [EventType; 7] = [
        Self::FindingObserved,
        Self::FixApplied,
        Self::FindingResolved,
        Self::PairCreated,
        Self::PatternPromoted,
        Self::PatternDemoted,
        Self::CodemodValidated,
    ];

    /// Wire name, including the schema version suffix.
    pub fn wire_name(&self) -> &'static str {
        match self {
            Self::FindingObserved => "finding-observed.v1",
            Self::FixApplied => "fix-applied.v1",
            Self::FindingResolved => "finding-resolved.v1",
            Self::PairCreated => "pair-created.v1",
            Self::PatternPromoted => "pattern-promoted.v1",
            Self::PatternDemoted => "pattern-demoted.v1",
            Self::CodemodValidated => "codemod-validated.v1",
        }
    }

    pub fn parse(s: &str) -> Result<Self, EventError> {
        Self::ALL
            .into_iter()
            .find(|t| t.wire_name() == s)
            .ok_or_else(|| EventError::UnknownEventType(s.to_string()))
    }

}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.wire_name())
    }
}

impl Serialize for EventType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.wire_name())
    }
}

impl<'de> Deserialize<'de> for EventType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

/// Envelope shared by inbound and outbound events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub event_id: Uuid,
    pub event_type: EventType,
    pub correlation_id: String,
    pub timestamp: DateTime<Utc>,
    pub source: String,
    pub payload: serde_json::Value,
    #[serde(default)]
    pub causation_id: Option<Uuid>,
}

/// A decoded and validated inbound event.
#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    FindingObserved(FindingObserved),
    FixApplied(FixApplied),
    FindingResolved(FindingResolved),
}

impl InboundEvent {
    /// Partition key: all events of one finding are processed in order.
    pub fn finding_id(&self) -> Uuid {
        match self {
            Self::FindingObserved(e) => e.finding_id,
            Self::FixApplied(e) => e.finding_id,
            Self::FindingResolved(e) => e.finding_id,
        }
    }
}

impl EventEnvelope {
    /// Parse an envelope from JSON. Unknown event types are rejected here.
    pub fn from_json(json: &str) -> Result<Self, EventError> {
        let value: serde_json::Value =
            serde_json::from_str(json).map_err(|e| EventError::MalformedPayload {
                event_type: "<envelope>".to_string(),
                message: e.to_string(),
            })?;
        if let Some(raw_type) = value.get("event_type").and_then(|v| v.as_str()) {
            EventType::parse(raw_type)?;
        }
        serde_json::from_value(value).map_err(|e| EventError::MalformedPayload {
            event_type: "<envelope>".to_string(),
            message: e.to_string(),
        })
    }

    pub fn to_json(&self) -> Result<String, EventError> {
        serde_json::to_string(self).map_err(|e| EventError::MalformedPayload {
            event_type: self.event_type.to_string(),
            message: e.to_string(),
        })
    }

    /// Decode and validate the payload of an inbound envelope.
    pub fn decode(&self) -> Result<InboundEvent, EventError> {
        let event = match self.event_type {
            EventType::FindingObserved => {
                let e: FindingObserved = self.payload_as()?;
                e.validate()?;
                InboundEvent::FindingObserved(e)
            }
            EventType::FixApplied => {
                let e: FixApplied = self.payload_as()?;
                e.validate()?;
                InboundEvent::FixApplied(e)
            }
            EventType::FindingResolved => {
                let e: FindingResolved = self.payload_as()?;
                e.validate()?;
                InboundEvent::FindingResolved(e)
            }
            other => {
                return Err(EventError::validation(
                    "event_type",
                    format!("{other} is not an inbound event"),
                ))
            }
        };
        Ok(event)
    }

    /// Build an outbound envelope caused by `causation_id`.
    pub fn outbound<T: Serialize>(
        event_type: EventType,
        payload: &T,
        correlation_id: &str,
        causation_id: Option<Uuid>,
        source: &str,
    ) -> Result<Self, EventError> {
        let payload = serde_json::to_value(payload).map_err(|e| EventError::MalformedPayload {
            event_type: event_type.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            event_id: Uuid::new_v4(),
            event_type,
            correlation_id: correlation_id.to_string(),
            timestamp: Utc::now(),
            source: source.to_string(),
            payload,
            causation_id,
        })
    }

    fn payload_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, EventError> {
        serde_json::from_value(self.payload.clone()).map_err(|e| EventError::MalformedPayload {
            event_type: self.event_type.to_string(),
            message: e.to_string(),
        })
    }
}
