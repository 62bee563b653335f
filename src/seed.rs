use std::path::Path;

use serde::Deserialize;
use thiserror::Error;

use crate::db::operations::curriculum::{self, Chapter, Requirement};
use crate::db::Database;

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read seed file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid seed file: {0}")]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Sql(#[from] sqlx::Error),
}

#[derive(Debug, Clone, Deserialize)]
pub struct CurriculumSeed {
    pub chapters: Vec<SeedChapter>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedChapter {
    pub id: String,
    pub name: String,
    pub grade_level: i64,
    #[serde(default)]
    pub requirements: Vec<SeedRequirement>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedRequirement {
    pub id: String,
    pub description: String,
    #[serde(default)]
    pub goals: Vec<SeedGoal>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SeedGoal {
    pub id: String,
    pub description: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SeedSummary {
    pub chapters: usize,
    pub requirements: usize,
    pub goal_links: usize,
}

pub fn parse_seed(json: &str) -> Result<CurriculumSeed, SeedError> {
    Ok(serde_json::from_str(json)?)
}

pub async fn load_seed_file(path: &Path) -> Result<CurriculumSeed, SeedError> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| SeedError::Io {
            path: path.display().to_string(),
            source,
        })?;
    parse_seed(&raw)
}

/// Inserts the curriculum graph. Existing rows are left untouched, so reseeding is a no-op.
pub async fn seed_curriculum(db: &Database, seed: &CurriculumSeed) -> Result<SeedSummary, SeedError> {
    let mut summary = SeedSummary::default();
    let mut tx = db.pool().begin().await?;

    for chapter in &seed.chapters {
        let inserted = curriculum::insert_chapter(
            &mut tx,
            &Chapter {
                id: chapter.id.clone(),
                name: chapter.name.clone(),
                grade_level: chapter.grade_level,
            },
        )
        .await?;
        if inserted {
            summary.chapters += 1;
        }

        for requirement in &chapter.requirements {
            let inserted = curriculum::insert_requirement(
                &mut tx,
                &chapter.id,
                &Requirement {
                    id: requirement.id.clone(),
                    description: requirement.description.clone(),
                },
            )
            .await?;
            if inserted {
                summary.requirements += 1;
            }

            for goal in &requirement.goals {
                curriculum::upsert_goal(&mut tx, &goal.id, &goal.description).await?;
                curriculum::link_requirement_goal(&mut tx, &requirement.id, &goal.id).await?;
                summary.goal_links += 1;
            }
        }
    }

    tx.commit().await?;
    tracing::info!(
        chapters = summary.chapters,
        requirements = summary.requirements,
        goal_links = summary.goal_links,
        "curriculum seeded"
    );
    Ok(summary)
}
