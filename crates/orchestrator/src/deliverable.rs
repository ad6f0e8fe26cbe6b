//! Stage deliverables: the markdown documents a run writes into the
//! project directory. Only the gated document stages map to a file;
//! Build and Test produce messages, not documents.

use std::path::{Path, PathBuf};

use stagegate_core::{DecodedArtifact, Payload, Stage};
use tokio::fs;
use tracing::debug;

use crate::error::{OrchestratorError, Result};

/// The file a stage's deliverable is written to, if the stage has one.
pub fn deliverable_file(stage: Stage) -> Option<&'static str> {
    match stage {
        Stage::Requirements => Some("prd.md"),
        Stage::Design => Some("system_design.md"),
        Stage::Plan => Some("api_spec_and_tasks.md"),
        Stage::Build | Stage::Test => None,
    }
}

/// Markdown rendering of a produced payload.
pub fn render_markdown(payload: &Payload) -> String {
    match payload {
        Payload::Text { content } => content.clone(),
        Payload::Artifact { artifact } => render_artifact(artifact),
    }
}

fn render_artifact(artifact: &DecodedArtifact) -> String {
    let mut out = format!("# {}\n", artifact.name);
    for (key, value) in &artifact.fields {
        out.push_str(&format!("\n## {key}\n\n{value}\n"));
    }
    out
}

/// Reads and writes deliverables under one project directory.
#[derive(Debug, Clone)]
pub struct DeliverableStore {
    dir: PathBuf,
}

impl DeliverableStore {
    pub fn new(project_dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: project_dir.into(),
        }
    }

    pub fn path(&self, stage: Stage) -> Result<PathBuf> {
        let file =
            deliverable_file(stage).ok_or(OrchestratorError::DeliverableUnmapped { stage })?;
        Ok(self.dir.join(file))
    }

    pub async fn read(&self, stage: Stage) -> Result<String> {
        let path = self.path(stage)?;
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(OrchestratorError::ContentUnavailable { stage })
            }
            Err(e) => Err(e.into()),
        }
    }

    pub async fn write(&self, stage: Stage, content: &str) -> Result<()> {
        let path = self.path(stage)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, content).await?;
        debug!(stage = %stage, path = %path.display(), "deliverable written");
        Ok(())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_and_test_have_no_deliverable() {
        assert_eq!(deliverable_file(Stage::Requirements), Some("prd.md"));
        assert_eq!(deliverable_file(Stage::Build), None);
        assert_eq!(deliverable_file(Stage::Test), None);
    }

    #[test]
    fn test_render_artifact() {
        let payload = Payload::Artifact {
            artifact: DecodedArtifact::new("prd")
                .with_field("Product Goals", "goal a")
                .with_field("Anything UNCLEAR", "nothing"),
        };
        let md = render_markdown(&payload);
        assert!(md.starts_with("# prd\n"));
        assert!(md.contains("\n## Product Goals\n\ngoal a\n"));
        assert!(md.contains("\n## Anything UNCLEAR\n"));
    }

    #[tokio::test]
    async fn test_read_write_round_trip() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DeliverableStore::new(tmp.path());

        let missing = store.read(Stage::Design).await.unwrap_err();
        assert!(matches!(
            missing,
            OrchestratorError::ContentUnavailable { stage: Stage::Design }
        ));

        store.write(Stage::Design, "# design").await.unwrap();
        assert_eq!(store.read(Stage::Design).await.unwrap(), "# design");

        let unmapped = store.read(Stage::Build).await.unwrap_err();
        assert!(matches!(
            unmapped,
            OrchestratorError::DeliverableUnmapped { stage: Stage::Build }
        ));
    }
}
