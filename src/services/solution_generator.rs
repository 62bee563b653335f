use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::services::llm_provider::{LLMError, LLMProvider, ResponseFormat};

const SYSTEM_PROMPT: &str = r#"You are a math tutor specializing in the Polish curriculum.

You will receive a math problem to solve. Provide a step-by-step solution as a JSON object with
exactly this structure:

{"steps": [{"step_number": 1, "description": "What this step does", "hint": "A hint that helps without giving away the full solution", "solution": "The complete solution for this step"}]}

Break the solution into clear, logical steps. Respond with valid JSON only."#;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedStep {
    #[serde(default)]
    pub step_number: Option<i64>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub hint: String,
    #[serde(default)]
    pub solution: String,
}

#[derive(Debug, Error)]
pub enum SolutionError {
    #[error("solution model unavailable: {0}")]
    Model(#[from] LLMError),
    #[error("solution model returned no steps")]
    Empty,
}

#[derive(Debug, Deserialize)]
struct StepsReply {
    steps: Option<Vec<GeneratedStep>>,
}

pub fn build_prompt(problem_text: &str, grade_level: Option<i64>) -> String {
    match grade_level {
        Some(grade) => {
            format!("Solve this Polish math problem step by step for grade {grade}: {problem_text}")
        }
        None => format!("Solve this Polish math problem step by step: {problem_text}"),
    }
}

/// Asks the model for an ordered list of steps. Any failure is terminal for the caller.
pub async fn generate_solution(
    llm: &LLMProvider,
    problem_text: &str,
    grade_level: Option<i64>,
) -> Result<Vec<GeneratedStep>, SolutionError> {
    let prompt = build_prompt(problem_text, grade_level);
    let reply = llm
        .complete_with_system(SYSTEM_PROMPT, &prompt, ResponseFormat::JsonObject)
        .await?;

    let steps = parse_steps(&reply);
    if steps.is_empty() {
        return Err(SolutionError::Empty);
    }
    tracing::info!(steps = steps.len(), "solution generated");
    Ok(steps)
}

/// A reply that is JSON without a `steps` array, or not JSON at all, becomes one raw step.
pub fn parse_steps(reply: &str) -> Vec<GeneratedStep> {
    if reply.trim().is_empty() {
        return Vec::new();
    }

    match serde_json::from_str::<StepsReply>(reply.trim()) {
        Ok(StepsReply { steps: Some(steps) }) => steps,
        Ok(StepsReply { steps: None }) => {
            tracing::warn!("solution reply lacks a steps array, keeping raw content");
            vec![raw_step("Solution", "Review the solution carefully", reply)]
        }
        Err(err) => {
            tracing::warn!(error = %err, "solution reply is not valid JSON, keeping raw content");
            vec![raw_step("Complete solution", "Try to solve the problem step by step", reply)]
        }
    }
}

fn raw_step(description: &str, hint: &str, solution: &str) -> GeneratedStep {
    GeneratedStep {
        step_number: Some(1),
        description: description.to_string(),
        hint: hint.to_string(),
        solution: solution.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_steps_structured() {
        let reply = r#"{"steps": [
            {"step_number": 1, "description": "Subtract 5", "hint": "Undo +5", "solution": "2x = 10"},
            {"step_number": 2, "description": "Divide by 2", "hint": "Isolate x", "solution": "x = 5"}
        ]}"#;
        let steps = parse_steps(reply);
        assert_eq!(steps.len(), 2);
        assert_eq!(steps[1].description, "Divide by 2");
        assert_eq!(steps[1].solution, "x = 5");
    }

    #[test]
    fn test_parse_steps_without_array_keeps_raw() {
        let reply = r#"{"answer": "x = 5"}"#;
        let steps = parse_steps(reply);
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].description, "Solution");
        assert_eq!(steps[0].solution, reply);
    }

    #[test]
    fn test_parse_steps_plain_text_keeps_raw() {
        let steps = parse_steps("x = 5 because 2x = 10");
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].description, "Complete solution");
    }

    #[test]
    fn test_parse_steps_empty_array_is_empty() {
        assert!(parse_steps(r#"{"steps": []}"#).is_empty());
        assert!(parse_steps("  ").is_empty());
    }

    #[test]
    fn test_prompt_mentions_grade() {
        assert!(build_prompt("2x + 5 = 13", Some(7)).contains("for grade 7: 2x + 5 = 13"));
        assert!(!build_prompt("2x + 5 = 13", None).contains("grade"));
    }
}
