//! Publisher that records posts as JSON files in an outbox directory.

use super::Publisher;
use crate::domain::failure::CollaboratorError;
use crate::domain::types::ExternalPostId;
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

/// One published post as stored in the outbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxRecord {
    pub external_id: String,
    pub text: String,
    pub hashtags: Vec<String>,
    pub image_path: Option<PathBuf>,
    pub published_at: String,
}

#[derive(Debug, Clone)]
pub struct OutboxPublisher {
    dir: PathBuf,
}

impl OutboxPublisher {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl Publisher for OutboxPublisher {
    async fn post(
        &self,
        text: &str,
        hashtags: &[String],
        image_path: Option<&Path>,
    ) -> Result<ExternalPostId, CollaboratorError> {
        let external_id = format!("post-{}", Uuid::new_v4());
        let record = OutboxRecord {
            external_id: external_id.clone(),
            text: text.to_string(),
            hashtags: hashtags.to_vec(),
            image_path: image_path.map(Path::to_path_buf),
            published_at: Utc::now().to_rfc3339(),
        };

        let content = serde_json::to_string_pretty(&record)
            .map_err(|e| CollaboratorError::permanent("outbox", e.to_string()))?;
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            CollaboratorError::permanent(
                "outbox",
                format!("cannot create {}: {}", self.dir.display(), e),
            )
        })?;

        let path = self.dir.join(format!("{}.json", external_id));
        let temp_path = path.with_extension("json.tmp");
        tokio::fs::write(&temp_path, content)
            .await
            .map_err(|e| CollaboratorError::permanent("outbox", e.to_string()))?;
        tokio::fs::rename(&temp_path, &path)
            .await
            .map_err(|e| CollaboratorError::permanent("outbox", e.to_string()))?;

        info!(external_id = %external_id, path = %path.display(), "post written to outbox");
        Ok(ExternalPostId(external_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_post_writes_record() {
        let dir = tempfile::tempdir().expect("temp dir");
        let publisher = OutboxPublisher::new(dir.path().join("outbox"));

        let id = publisher
            .post(
                "Shipped it.\n\n#AI",
                &["AI".to_string()],
                Some(Path::new("/tmp/a.png")),
            )
            .await
            .expect("post");

        let path = publisher.dir().join(format!("{}.json", id));
        let record: OutboxRecord = serde_json::from_str(
            &std::fs::read_to_string(&path).expect("read record"),
        )
        .expect("parse record");
        assert_eq!(record.external_id, id.as_str());
        assert_eq!(record.text, "Shipped it.\n\n#AI");
        assert_eq!(record.image_path, Some(PathBuf::from("/tmp/a.png")));
    }

    #[tokio::test]
    async fn test_unwritable_outbox_is_permanent_error() {
        let dir = tempfile::tempdir().expect("temp dir");
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").expect("write blocker");
        let publisher = OutboxPublisher::new(blocker.join("outbox"));

        let err = publisher.post("text", &[], None).await.expect_err("blocked");
        assert!(!err.is_retryable());
    }
}
