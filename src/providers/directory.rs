use crate::core::error::{EngineError, Result};
use crate::core::model::Platform;
use crate::core::ports::PlatformDirectory;
use async_trait::async_trait;

/// Platform registry backed by the configured platform list.
pub struct ConfigPlatformDirectory {
    platforms: Vec<Platform>,
}

impl ConfigPlatformDirectory {
    pub fn new(platforms: Vec<Platform>) -> Self {
        Self { platforms }
    }
}

#[async_trait]
impl PlatformDirectory for ConfigPlatformDirectory {
    async fn by_id(&self, id: &str) -> Result<Platform> {
        self.platforms
            .iter()
            .find(|p| p.id == id)
            .cloned()
            .ok_or_else(|| EngineError::not_found("Platform", id))
    }

    async fn by_ids(&self, ids: &[String]) -> Result<Vec<Platform>> {
        Ok(self
            .platforms
            .iter()
            .filter(|p| ids.contains(&p.id))
            .cloned()
            .collect())
    }

    async fn all(&self) -> Result<Vec<Platform>> {
        Ok(self.platforms.clone())
    }
}
