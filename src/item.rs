//! One unit of work: a submitted file and its position in the state machine.
//!
//! ```text
//!            begin()            complete(text)
//!  Queued ────────────▶ Processing ──────────────▶ Completed
//!                          │   ▲
//!                 fail(msg)│   │begin()  (explicit retry)
//!                          ▼   │
//!                          Error
//! ```
//!
//! The result text and the error message live *inside* the status variants,
//! so "result present iff completed, error present iff error" holds by
//! construction. There is no way out of `Completed` other than removal.

use crate::error::{ItemError, SefinError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Opaque, stable identifier assigned at intake.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// A fresh random identifier.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ItemId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lifecycle state of a [`FileItem`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemStatus {
    Queued,
    Processing,
    Completed { result: String },
    Error { message: String },
}

impl ItemStatus {
    pub fn label(&self) -> &'static str {
        match self {
            ItemStatus::Queued => "queued",
            ItemStatus::Processing => "processing",
            ItemStatus::Completed { .. } => "completed",
            ItemStatus::Error { .. } => "error",
        }
    }

    /// Completed and error items carry durable value and survive a reload.
    pub fn is_durable(&self) -> bool {
        matches!(self, ItemStatus::Completed { .. } | ItemStatus::Error { .. })
    }
}

/// A submitted file tracked through the conversion pipeline.
#[derive(Debug, Clone)]
pub struct FileItem {
    id: ItemId,
    name: String,
    size: u64,
    media_type: String,
    status: ItemStatus,
    // Held only for the live session; never persisted.
    raw: Option<Arc<[u8]>>,
}

impl FileItem {
    /// An accepted file, waiting in the queue with its payload.
    pub fn queued(name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            id: ItemId::new(),
            name: name.into(),
            size: bytes.len() as u64,
            media_type: media_type.into(),
            status: ItemStatus::Queued,
            raw: Some(Arc::from(bytes)),
        }
    }

    /// A file rejected at intake. It is recorded directly as an error and
    /// keeps no payload, so it can never be processed.
    pub fn rejected(
        name: impl Into<String>,
        size: u64,
        media_type: impl Into<String>,
        error: &ItemError,
    ) -> Self {
        Self {
            id: ItemId::new(),
            name: name.into(),
            size,
            media_type: media_type.into(),
            status: ItemStatus::Error {
                message: error.to_string(),
            },
            raw: None,
        }
    }

    pub fn id(&self) -> &ItemId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn status(&self) -> &ItemStatus {
        &self.status
    }

    /// Canonical text, present only when completed.
    pub fn result(&self) -> Option<&str> {
        match &self.status {
            ItemStatus::Completed { result } => Some(result),
            _ => None,
        }
    }

    /// Failure description, present only when in error.
    pub fn error(&self) -> Option<&str> {
        match &self.status {
            ItemStatus::Error { message } => Some(message),
            _ => None,
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.status, ItemStatus::Completed { .. })
    }

    /// The original bytes, if this session still holds them.
    pub fn raw_content(&self) -> Option<&Arc<[u8]>> {
        self.raw.as_ref()
    }

    pub fn has_payload(&self) -> bool {
        self.raw.is_some()
    }

    /// `queued | error → processing`. Clears any prior result or error.
    pub fn begin(&mut self) -> Result<(), SefinError> {
        match self.status {
            ItemStatus::Queued | ItemStatus::Error { .. } => {
                self.status = ItemStatus::Processing;
                Ok(())
            }
            _ => Err(self.invalid_transition("processing")),
        }
    }

    /// `processing → completed`. The payload is released; a completed item
    /// never needs it again.
    pub fn complete(&mut self, result: String) -> Result<(), SefinError> {
        match self.status {
            ItemStatus::Processing => {
                self.status = ItemStatus::Completed { result };
                self.raw = None;
                Ok(())
            }
            _ => Err(self.invalid_transition("completed")),
        }
    }

    /// `processing → error`.
    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), SefinError> {
        match self.status {
            ItemStatus::Processing => {
                self.status = ItemStatus::Error {
                    message: message.into(),
                };
                Ok(())
            }
            _ => Err(self.invalid_transition("error")),
        }
    }

    fn invalid_transition(&self, to: &'static str) -> SefinError {
        SefinError::InvalidTransition {
            name: self.name.clone(),
            from: self.status.label(),
            to,
        }
    }

    /// Persisted form, or `None` for items without durable value.
    pub fn to_record(&self) -> Option<ItemRecord> {
        let (status, result, error) = match &self.status {
            ItemStatus::Completed { result } => (RecordStatus::Completed, Some(result.clone()), None),
            ItemStatus::Error { message } => (RecordStatus::Error, None, Some(message.clone())),
            ItemStatus::Queued | ItemStatus::Processing => return None,
        };
        Some(ItemRecord {
            id: self.id.clone(),
            name: self.name.clone(),
            size: self.size,
            media_type: self.media_type.clone(),
            status,
            result,
            error,
        })
    }
}

/// Status as written to storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    #[serde(alias = "idle")]
    Queued,
    Processing,
    Completed,
    Error,
}

/// The stored shape of an item: metadata plus result or error, no payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRecord {
    pub id: ItemId,
    pub name: String,
    #[serde(default)]
    pub size: u64,
    #[serde(default, alias = "type")]
    pub media_type: String,
    pub status: RecordStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl TryFrom<ItemRecord> for FileItem {
    type Error = String;

    /// Rebuild a reloaded item. Only completed/error records with the
    /// matching field present are accepted; the payload is never restored.
    fn try_from(record: ItemRecord) -> Result<Self, Self::Error> {
        let status = match (record.status, record.result, record.error) {
            (RecordStatus::Completed, Some(result), _) => ItemStatus::Completed { result },
            (RecordStatus::Error, _, Some(message)) => ItemStatus::Error { message },
            (RecordStatus::Error, _, None) => ItemStatus::Error {
                message: "Unknown error".to_string(),
            },
            (status, _, _) => {
                return Err(format!(
                    "record '{}' has no durable result (status {:?})",
                    record.name, status
                ))
            }
        };
        Ok(Self {
            id: record.id,
            name: record.name,
            size: record.size,
            media_type: record.media_type,
            status,
            raw: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> FileItem {
        FileItem::queued("extrato.csv", "text/csv", b"a;b\n1;2\n".to_vec())
    }

    #[test]
    fn queued_item_has_no_result_or_error() {
        let item = sample();
        assert_eq!(item.status(), &ItemStatus::Queued);
        assert_eq!(item.size(), 8);
        assert!(item.result().is_none());
        assert!(item.error().is_none());
        assert!(item.has_payload());
    }

    #[test]
    fn happy_path_transitions() {
        let mut item = sample();
        item.begin().unwrap();
        assert_eq!(item.status().label(), "processing");
        item.complete("\"a\";\"b\"".into()).unwrap();
        assert_eq!(item.result(), Some("\"a\";\"b\""));
        assert!(item.error().is_none());
        assert!(!item.has_payload());
    }

    #[test]
    fn completed_is_terminal() {
        let mut item = sample();
        item.begin().unwrap();
        item.complete(String::new()).unwrap();
        let err = item.begin().unwrap_err();
        assert!(matches!(
            err,
            SefinError::InvalidTransition { from: "completed", to: "processing", .. }
        ));
    }

    #[test]
    fn retry_from_error_clears_message() {
        let mut item = sample();
        item.begin().unwrap();
        item.fail("boom").unwrap();
        assert_eq!(item.error(), Some("boom"));
        item.begin().unwrap();
        assert!(item.error().is_none());
        assert!(item.result().is_none());
    }

    #[test]
    fn cannot_complete_without_processing() {
        let mut item = sample();
        assert!(item.complete("x".into()).is_err());
        assert!(item.fail("x").is_err());
    }

    #[test]
    fn rejected_item_is_error_without_payload() {
        let item = FileItem::rejected(
            "huge.pdf",
            500,
            "application/pdf",
            &ItemError::FileTooLarge { size: 500, limit_mb: 0 },
        );
        assert!(item.error().unwrap().contains("limit"));
        assert!(!item.has_payload());
    }

    #[test]
    fn queued_items_have_no_record() {
        assert!(sample().to_record().is_none());
    }

    #[test]
    fn record_uses_camel_case_and_omits_absent_fields() {
        let mut item = sample();
        item.begin().unwrap();
        item.complete("\"x\"".into()).unwrap();
        let json = serde_json::to_value(item.to_record().unwrap()).unwrap();
        assert_eq!(json["mediaType"], "text/csv");
        assert_eq!(json["status"], "completed");
        assert!(json.get("error").is_none());
        assert!(json.get("rawContent").is_none());
    }

    #[test]
    fn record_round_trip_drops_payload() {
        let mut item = sample();
        item.begin().unwrap();
        item.fail("bad").unwrap();
        let record = item.to_record().unwrap();
        let back = FileItem::try_from(record).unwrap();
        assert_eq!(back.id(), item.id());
        assert_eq!(back.error(), Some("bad"));
        assert!(!back.has_payload());
    }

    #[test]
    fn inconsistent_records_are_refused() {
        let record = ItemRecord {
            id: ItemId::from("abc"),
            name: "x.csv".into(),
            size: 1,
            media_type: String::new(),
            status: RecordStatus::Completed,
            result: None,
            error: None,
        };
        assert!(FileItem::try_from(record).is_err());

        let queued: ItemRecord = serde_json::from_str(
            r#"{"id":"q1","name":"a.csv","size":3,"type":"text/csv","status":"idle"}"#,
        )
        .unwrap();
        assert_eq!(queued.status, RecordStatus::Queued);
        assert!(FileItem::try_from(queued).is_err());
    }
}
