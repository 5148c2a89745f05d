//! Boundary to the natural-language service.
//!
//! Turning free text into [`SemanticFields`] (and back) is done by an
//! external model. The modem only needs the shape of the answer.

use crate::fields::SemanticFields;
use serde::{Deserialize, Serialize};

/// Answer from [`TextService::summarize`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub is_accepted: bool,
    /// Present only when the message was accepted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<SemanticFields>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rejection_reason: Option<String>,
}

impl Summary {
    pub fn accepted(
        fields: SemanticFields,
        reasoning_text: impl Into<String>,
        confidence: f32,
    ) -> Self {
        Self {
            is_accepted: true,
            fields: Some(fields),
            reasoning_text: Some(reasoning_text.into()),
            confidence: Some(confidence),
            rejection_reason: None,
        }
    }

    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            is_accepted: false,
            fields: None,
            reasoning_text: None,
            confidence: None,
            rejection_reason: Some(reason.into()),
        }
    }

    /// Fields to send, if the summary is usable.
    pub fn into_fields(self) -> Option<SemanticFields> {
        if self.is_accepted {
            self.fields
        } else {
            None
        }
    }
}

/// Text ⇄ fields conversion.
pub trait TextService {
    fn summarize(&self, text: &str) -> Summary;

    fn expand(&self, fields: &SemanticFields) -> String;
}

/// Plain-English rendering used when no service is available.
pub fn describe(fields: &SemanticFields) -> String {
    let mut text = format!(
        "{} alert, severity {}/9, at {:.4}, {:.4}; about {} people",
        fields.alert_type, fields.severity, fields.lat, fields.lon, fields.pop
    );
    if !fields.msg.is_empty() {
        text.push_str(": ");
        text.push_str(&fields.msg);
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{compose, receive_frame};
    use crate::auth::{Ed25519KeyHandle, Ed25519Verifier};
    use crate::fields::{AlertType, ChecksumPolicy};

    /// Canned service standing in for the external model
    struct KeywordService;

    impl TextService for KeywordService {
        fn summarize(&self, text: &str) -> Summary {
            if !text.to_ascii_lowercase().contains("fire") {
                return Summary::rejected("not an emergency");
            }
            Summary::accepted(
                SemanticFields {
                    alert_type: AlertType::Fire,
                    severity: 8,
                    lat: 34.0522,
                    lon: -118.2437,
                    pop: 40,
                    msg: "FIRE".to_string(),
                },
                "mentions fire",
                0.9,
            )
        }

        fn expand(&self, fields: &SemanticFields) -> String {
            describe(fields)
        }
    }

    #[test]
    fn test_accepted_summary_round_trips_through_frame() {
        let service = KeywordService;
        let fields = service
            .summarize("Fire on the third floor")
            .into_fields()
            .unwrap();
        let outgoing = compose(&fields, &Ed25519KeyHandle::from_seed(&[1u8; 32]));
        let received = receive_frame(
            outgoing.frame.as_bytes(),
            ChecksumPolicy::Strict,
            &Ed25519Verifier,
        )
        .unwrap();

        let text = service.expand(&received.fields);
        assert!(text.starts_with("FI alert, severity 8/9"), "{}", text);
        assert!(text.ends_with(": FIRE"));
    }

    #[test]
    fn test_rejected_summary_has_no_fields() {
        let summary = KeywordService.summarize("hello");
        assert!(!summary.is_accepted);
        assert_eq!(summary.rejection_reason.as_deref(), Some("not an emergency"));
        assert_eq!(summary.into_fields(), None);
    }

    #[test]
    fn test_summary_json_is_camel_case() {
        let json = serde_json::to_value(Summary::rejected("spam")).unwrap();
        assert_eq!(json["isAccepted"], false);
        assert_eq!(json["rejectionReason"], "spam");
        assert!(json.get("reasoningText").is_none());
        assert!(json.get("confidence").is_none());
    }

    #[test]
    fn test_minimal_rejection_deserializes() {
        let summary: Summary =
            serde_json::from_str(r#"{"isAccepted":false,"rejectionReason":"spam"}"#).unwrap();
        assert_eq!(summary, Summary::rejected("spam"));
        assert_eq!(summary.confidence, None);
        assert_eq!(summary.reasoning_text, None);
    }

    #[test]
    fn test_accepted_summary_json_roundtrip() {
        let summary = KeywordService.summarize("brush fire");
        let json = serde_json::to_string(&summary).unwrap();
        let back: Summary = serde_json::from_str(&json).unwrap();
        assert_eq!(back, summary);
        assert_eq!(back.confidence, Some(0.9));
        assert_eq!(back.reasoning_text.as_deref(), Some("mentions fire"));
    }
}
