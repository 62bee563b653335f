//! Links a free-text solution step to curriculum goals.
//!
//! The whole requirement catalog is written into the prompt as `ID: <id> - <description>`
//! lines and the model names the relevant requirement ids. Matching is advisory: every
//! failure degrades to [`fallback_goal`] so solution delivery never blocks on it.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::db::operations::curriculum::{self, Requirement, RequirementGoalRow};
use crate::db::Database;
use crate::services::llm_provider::{LLMError, LLMProvider, ResponseFormat};

pub const FALLBACK_GOAL_ID: &str = "sample_goal_1";
pub const FALLBACK_GOAL_DESCRIPTION: &str = "Use algebraic methods to solve equations";
const FALLBACK_REQUIREMENT_ID: &str = "req_1";
const FALLBACK_REQUIREMENT_DESCRIPTION: &str = "Solve linear equations";

const SYSTEM_PROMPT: &str = "You are an education curriculum expert.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedGoal {
    pub id: String,
    pub description: String,
    pub requirements: Vec<Requirement>,
}

#[derive(Debug, Error)]
enum MatchError {
    #[error("curriculum store: {0}")]
    Store(#[from] sqlx::Error),
    #[error("model: {0}")]
    Model(#[from] LLMError),
}

#[derive(Debug, Deserialize)]
struct RequirementIdsReply {
    requirement_ids: Vec<String>,
}

pub fn fallback_goal() -> MatchedGoal {
    MatchedGoal {
        id: FALLBACK_GOAL_ID.to_string(),
        description: FALLBACK_GOAL_DESCRIPTION.to_string(),
        requirements: vec![Requirement {
            id: FALLBACK_REQUIREMENT_ID.to_string(),
            description: FALLBACK_REQUIREMENT_DESCRIPTION.to_string(),
        }],
    }
}

/// Returns the goals relevant to one step, each with the requirements that justified it.
/// Never fails.
pub async fn match_step_to_curriculum(
    db: &Database,
    llm: &LLMProvider,
    step_description: &str,
    step_solution: &str,
) -> Vec<MatchedGoal> {
    match try_match(db, llm, step_description, step_solution).await {
        Ok(goals) => goals,
        Err(err) => {
            tracing::warn!(error = %err, "curriculum matching failed, using fallback goal");
            vec![fallback_goal()]
        }
    }
}

async fn try_match(
    db: &Database,
    llm: &LLMProvider,
    step_description: &str,
    step_solution: &str,
) -> Result<Vec<MatchedGoal>, MatchError> {
    let requirements = curriculum::list_requirements(db.pool()).await?;
    if requirements.is_empty() {
        tracing::warn!("requirement catalog is empty, seed the curriculum");
        return Ok(vec![fallback_goal()]);
    }

    let prompt = build_prompt(step_description, step_solution, &requirements);
    let reply = llm
        .complete_with_system(SYSTEM_PROMPT, &prompt, ResponseFormat::JsonObject)
        .await?;

    let requirement_ids = extract_requirement_ids(&reply);
    if requirement_ids.is_empty() {
        tracing::debug!(reply = %reply, "model named no requirements");
        return Ok(vec![fallback_goal()]);
    }

    let rows = curriculum::goal_rows_for_requirements(db.pool(), &requirement_ids).await?;
    let goals = group_goals(&requirement_ids, rows);
    tracing::debug!(
        requirements = requirement_ids.len(),
        goals = goals.len(),
        "step matched to curriculum"
    );
    Ok(goals)
}

pub fn build_prompt(
    step_description: &str,
    step_solution: &str,
    requirements: &[Requirement],
) -> String {
    let catalog = requirements
        .iter()
        .map(|r| format!("ID: {} - {}", r.id, r.description))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "You are an expert in the Polish mathematics curriculum.\n\n\
         Below is a step in solving a math problem:\n\
         Step Description: {step_description}\n\
         Step Solution: {step_solution}\n\n\
         Below are curriculum requirements from the Polish math curriculum:\n\
         {catalog}\n\n\
         Identify the curriculum requirements that are most relevant to this solution step.\n\
         Respond with a JSON object of the form {{\"requirement_ids\": [\"<id>\", ...]}} \
         containing only the IDs of the relevant requirements."
    )
}

/// Reads the structured reply; falls back to scanning free text for id-like tokens.
pub fn extract_requirement_ids(reply: &str) -> Vec<String> {
    match serde_json::from_str::<RequirementIdsReply>(reply.trim()) {
        Ok(parsed) => dedupe(parsed.requirement_ids.iter().map(|id| id.trim())),
        Err(_) => parse_ids_from_text(reply),
    }
}

pub fn parse_ids_from_text(text: &str) -> Vec<String> {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    let token = TOKEN.get_or_init(|| Regex::new(r"[A-Za-z0-9_\-.]+").expect("valid token regex"));

    dedupe(
        token
            .find_iter(text.trim())
            .map(|m| m.as_str().trim_end_matches([',', '.', ';'])),
    )
}

fn dedupe<'a>(ids: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for id in ids {
        if !id.is_empty() && !out.iter().any(|seen| seen == id) {
            out.push(id.to_string());
        }
    }
    out
}

/// Groups edges by goal, in the order the model named the requirements.
fn group_goals(requirement_ids: &[String], mut rows: Vec<RequirementGoalRow>) -> Vec<MatchedGoal> {
    let rank: HashMap<&str, usize> = requirement_ids
        .iter()
        .enumerate()
        .map(|(i, id)| (id.as_str(), i))
        .collect();
    rows.sort_by_key(|row| rank.get(row.requirement_id.as_str()).copied().unwrap_or(usize::MAX));

    let mut goals: Vec<MatchedGoal> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();
    for row in rows {
        let slot = *index.entry(row.goal_id.clone()).or_insert_with(|| {
            goals.push(MatchedGoal {
                id: row.goal_id.clone(),
                description: row.goal_description.clone(),
                requirements: Vec::new(),
            });
            goals.len() - 1
        });

        let goal = &mut goals[slot];
        if !goal.requirements.iter().any(|r| r.id == row.requirement_id) {
            goal.requirements.push(Requirement {
                id: row.requirement_id,
                description: row.requirement_description,
            });
        }
    }
    goals
}
