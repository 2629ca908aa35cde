//! イメージのインポート

use crate::error::Result;
use serde_json::{Value, json};
use setflow_cluster::ClusterClient;
use setflow_core::{ImageSpec, ResourceType, applies_to_envs};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

/// 1回の実行の間、インポート済みのイメージストリームタグを覚えておくインポーター
pub struct ImageImporter {
    cluster: Arc<dyn ClusterClient>,
    imported: HashSet<String>,
}

impl ImageImporter {
    pub fn new(cluster: Arc<dyn ClusterClient>) -> Self {
        Self {
            cluster,
            imported: HashSet::new(),
        }
    }

    pub fn imported(&self) -> &HashSet<String> {
        &self.imported
    }

    /// 有効な環境に該当するイメージをインポートする
    ///
    /// 既存のタグは付け直してから再インポートし、無いタグは新規に作成します。
    pub async fn import_all(&mut self, images: &[ImageSpec], env_names: &[String]) -> Result<()> {
        for image in images {
            if !applies_to_envs(&image.envs, env_names) {
                info!(istag = %image.istag, "Image does not apply to selected envs, skipping");
                continue;
            }
            if self.imported.contains(&image.istag) {
                warn!(istag = %image.istag, "Image already imported in this run, skipping");
                continue;
            }

            let existing = self
                .cluster
                .get(ResourceType::ImageStreamTag, &image.istag)
                .await?;
            if existing.is_some() {
                info!(istag = %image.istag, from = %image.from, "Re-importing existing image");
                self.cluster
                    .tag_image(&image.from, &image.istag, image.scheduled)
                    .await?;
                self.cluster
                    .import_image(&image.istag, None, image.scheduled)
                    .await?;
            } else {
                info!(istag = %image.istag, from = %image.from, "Importing image");
                self.cluster
                    .import_image(&image.istag, Some(&image.from), image.scheduled)
                    .await?;
            }
            self.imported.insert(image.istag.clone());
        }
        Ok(())
    }
}

/// インポートで作成される ImageStream ドキュメント
pub fn image_stream_config(image: &ImageSpec) -> Value {
    let (name, tag) = image.split_istag();
    json!({
        "apiVersion": "image.openshift.io/v1",
        "kind": "ImageStream",
        "metadata": {"name": name},
        "spec": {
            "lookupPolicy": {"local": false},
            "tags": [{
                "from": {"kind": "DockerImage", "name": image.from},
                "importPolicy": {"scheduled": image.scheduled},
                "name": tag,
                "referencePolicy": {"type": "Source"},
            }],
        },
    })
}

/// 有効な環境に該当するイメージの (istag, ImageStream) 一覧
pub fn image_stream_configs(images: &[ImageSpec], env_names: &[String]) -> Vec<(String, Value)> {
    images
        .iter()
        .filter(|image| applies_to_envs(&image.envs, env_names))
        .map(|image| (image.istag.clone(), image_stream_config(image)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_stream_config() {
        let mut image = ImageSpec::new("api", "quay.io/org/api:1.2");
        image.scheduled = false;

        let config = image_stream_config(&image);
        assert_eq!(config["metadata"]["name"], "api");
        assert_eq!(config["spec"]["tags"][0]["name"], "latest");
        assert_eq!(config["spec"]["tags"][0]["from"]["name"], "quay.io/org/api:1.2");
        assert_eq!(config["spec"]["tags"][0]["importPolicy"]["scheduled"], false);
    }

    #[test]
    fn test_image_stream_configs_filter_envs() {
        let mut prod_only = ImageSpec::new("worker:2.0", "quay.io/org/worker:2.0");
        prod_only.envs = vec!["prod".to_string()];
        let images = vec![ImageSpec::new("api:1.0", "quay.io/org/api:1.0"), prod_only];

        let configs = image_stream_configs(&images, &["stage".to_string()]);
        let tags: Vec<_> = configs.iter().map(|(istag, _)| istag.as_str()).collect();
        assert_eq!(tags, vec!["api:1.0"]);
    }
}
