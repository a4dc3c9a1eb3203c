//! The final-answer tool. It is advertised to the model like any other tool
//! but the engine intercepts calls to it instead of executing them.

use reviewloop_core::gateway::ToolDefinition;
use reviewloop_core::tool::FINAL_ANSWER_TOOL;

pub fn final_answer_definition() -> ToolDefinition {
    ToolDefinition {
        name: FINAL_ANSWER_TOOL.to_string(),
        description: "Submit the final list of review comments. Call this exactly once, when the \
                      review is complete. Submit an empty list if there is nothing to report."
            .to_string(),
        parameters: serde_json::json!({
            "type": "object",
            "properties": {
                "comments": {
                    "type": "array",
                    "items": {
                        "type": "object",
                        "properties": {
                            "description": { "type": "string", "description": "What is wrong and why it matters" },
                            "corrective_code": { "type": "string", "description": "Suggested replacement code" },
                            "file_path": { "type": "string", "description": "Path of the file, relative to the repository root" },
                            "line_number": { "type": "string", "description": "Line number in the new file, as shown in the diff" },
                            "confidence_score": { "type": "number", "minimum": 0.0, "maximum": 1.0 },
                            "bucket": { "type": "string", "description": "Category of the comment" },
                            "rationale": { "type": "string", "description": "Reasoning behind the comment" }
                        },
                        "required": ["description", "file_path", "line_number", "confidence_score", "bucket", "rationale"]
                    }
                }
            },
            "required": ["comments"]
        }),
    }
}
