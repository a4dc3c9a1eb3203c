//! Review comments: the structured payload commenter agents produce.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ToolError;

/// One finding reported against a line of the diff.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewComment {
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrective_code: Option<String>,

    pub file_path: String,

    /// Line in the new file, as printed in the numbered diff.
    pub line_number: LineNumber,

    /// In `[0, 1]`.
    pub confidence_score: f64,

    pub bucket: String,

    pub rationale: String,
}

/// Models report line numbers as integers, floats, or strings like `"+12"`
/// or `"N/A"`. Removed lines in the numbered diff are negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LineNumber {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl LineNumber {
    /// Integral floats such as `12.0` become integers.
    fn normalize(&mut self) {
        if let Self::Float(f) = *self
            && f.fract() == 0.0
            && f >= i64::MIN as f64
            && f <= i64::MAX as f64
        {
            *self = Self::Integer(f as i64);
        }
    }
}

/// A set of comments. Also the shape of the final-answer tool input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReviewVerdict {
    pub comments: Vec<ReviewComment>,
}

const REQUIRED_FIELDS: [&str; 6] = [
    "description",
    "file_path",
    "line_number",
    "confidence_score",
    "bucket",
    "rationale",
];

impl ReviewVerdict {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.comments.is_empty()
    }

    /// Parse a final-answer payload, naming the first missing field on failure.
    pub fn from_final_answer(payload: &Value) -> Result<Self, ToolError> {
        let comments = payload
            .get("comments")
            .and_then(Value::as_array)
            .ok_or_else(|| ToolError::InvalidFinalAnswer("`comments` array is missing".into()))?;

        for (i, comment) in comments.iter().enumerate() {
            if let Some(field) = REQUIRED_FIELDS.iter().find(|f| comment.get(**f).is_none()) {
                return Err(ToolError::InvalidFinalAnswer(format!(
                    "comment {i} is missing required field `{field}`"
                )));
            }
        }

        let mut verdict: ReviewVerdict = serde_json::from_value(payload.clone())
            .map_err(|e| ToolError::InvalidFinalAnswer(e.to_string()))?;
        for comment in &mut verdict.comments {
            comment.confidence_score = comment.confidence_score.clamp(0.0, 1.0);
            comment.bucket = comment.bucket.trim().to_uppercase().replace(' ', "_");
            comment.line_number.normalize();
        }
        Ok(verdict)
    }

    /// Keep only comments at or above `threshold`.
    pub fn filter_by_confidence(&self, threshold: f64) -> ReviewVerdict {
        ReviewVerdict {
            comments: self
                .comments
                .iter()
                .filter(|c| c.confidence_score >= threshold)
                .cloned()
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn comment(score: f64) -> Value {
        json!({
            "description": "SQL built by string concatenation",
            "corrective_code": "cursor.execute(q, (user_id,))",
            "file_path": "app/db.py",
            "line_number": 42,
            "confidence_score": score,
            "bucket": "SECURITY",
            "rationale": "user input reaches the query"
        })
    }

    #[test]
    fn parses_valid_final_answer() {
        let verdict = ReviewVerdict::from_final_answer(&json!({ "comments": [comment(0.9)] })).unwrap();
        assert_eq!(verdict.comments.len(), 1);
        assert_eq!(verdict.comments[0].line_number, LineNumber::Integer(42));
    }

    #[test]
    fn accepts_string_line_numbers_and_missing_corrective_code() {
        let mut c = comment(0.5);
        c["line_number"] = json!("+17");
        c["bucket"] = json!("runtime error");
        c.as_object_mut().unwrap().remove("corrective_code");
        let verdict = ReviewVerdict::from_final_answer(&json!({ "comments": [c] })).unwrap();
        assert_eq!(verdict.comments[0].line_number, LineNumber::Text("+17".into()));
        assert!(verdict.comments[0].corrective_code.is_none());
        assert_eq!(verdict.comments[0].bucket, "RUNTIME_ERROR");
    }

    #[test]
    fn rejects_missing_comments_array() {
        let err = ReviewVerdict::from_final_answer(&json!({ "summary": "lgtm" })).unwrap_err();
        assert!(err.to_string().contains("comments"));
    }

    #[test]
    fn rejects_comment_missing_required_field() {
        let mut c = comment(0.5);
        c.as_object_mut().unwrap().remove("rationale");
        let err = ReviewVerdict::from_final_answer(&json!({ "comments": [c] })).unwrap_err();
        assert!(err.to_string().contains("rationale"));
    }

    #[test]
    fn accepts_negative_and_float_line_numbers() {
        let mut removed = comment(0.8);
        removed["line_number"] = json!(-3);
        let mut float = comment(0.8);
        float["line_number"] = json!(12.0);
        let mut fractional = comment(0.8);
        fractional["line_number"] = json!(12.5);
        let mut file_level = comment(0.8);
        file_level["line_number"] = json!("N/A");

        let verdict =
            ReviewVerdict::from_final_answer(&json!({ "comments": [removed, float, fractional, file_level] }))
                .unwrap();
        let lines: Vec<&LineNumber> = verdict.comments.iter().map(|c| &c.line_number).collect();
        assert_eq!(
            lines,
            vec![
                &LineNumber::Integer(-3),
                &LineNumber::Integer(12),
                &LineNumber::Float(12.5),
                &LineNumber::Text("N/A".into()),
            ]
        );
    }

    #[test]
    fn confidence_filter() {
        let verdict =
            ReviewVerdict::from_final_answer(&json!({ "comments": [comment(0.9), comment(0.3)] })).unwrap();
        assert_eq!(verdict.filter_by_confidence(0.5).comments.len(), 1);
    }
}
