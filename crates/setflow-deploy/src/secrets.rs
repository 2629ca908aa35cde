//! シークレットのインポート
//!
//! インポート元はローカルのシークレットディレクトリ、次にソースプロジェクトの
//! 順に探します。どちらも設定されていない場合、シークレットは既に
//! プロジェクトに存在している必要があります。

use crate::error::{DeployError, Result};
use serde_json::Value;
use setflow_cluster::ClusterClient;
use setflow_core::files::{cfg_files_in_dir, load_cfg_file};
use setflow_core::{ResourceType, SecretSpec, applies_to_envs};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// エクスポート時に残すメタデータ
const EXPORTED_METADATA: &[&str] = &["name", "labels"];

/// 1回の実行の間、処理済みのシークレットを覚えておくインポーター
pub struct SecretImporter {
    cluster: Arc<dyn ClusterClient>,
    project: String,
    source_project: Option<String>,
    local_dir: Option<PathBuf>,
    local_secrets: Option<BTreeMap<String, Value>>,
    handled: HashSet<String>,
}

impl SecretImporter {
    pub fn new(
        cluster: Arc<dyn ClusterClient>,
        project: impl Into<String>,
        source_project: Option<String>,
        local_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            cluster,
            project: project.into(),
            source_project,
            local_dir,
            local_secrets: None,
            handled: HashSet::new(),
        }
    }

    /// 処理済みのシークレット名
    pub fn handled(&self) -> &HashSet<String> {
        &self.handled
    }

    /// 有効な環境に該当するシークレットをすべて処理する
    pub async fn import_all(&mut self, secrets: &[SecretSpec], env_names: &[String]) -> Result<()> {
        for secret in secrets {
            if !applies_to_envs(&secret.envs, env_names) {
                info!(secret = %secret.name, "Secret does not apply to selected envs, skipping");
                continue;
            }
            self.handle(secret).await?;
        }
        Ok(())
    }

    /// シークレットを用意し、サービスアカウントにリンクする
    #[instrument(skip(self, secret), fields(secret = %secret.name))]
    pub async fn handle(&mut self, secret: &SecretSpec) -> Result<()> {
        if !self.handled.contains(&secret.name) {
            if self.local_dir.is_some() || self.source_project.is_some() {
                self.import(&secret.name).await?;
            }
            if !self.handled.contains(&secret.name) {
                if self.local_dir.is_some() && self.source_project.is_none() {
                    warn!("Secret not found in local secrets dir");
                }
                self.verify_exists(&secret.name).await?;
            }
        }

        for service_account in &secret.link {
            info!(service_account = %service_account, "Linking secret to service account");
            self.cluster
                .link_secret(service_account, &secret.name)
                .await?;
        }
        Ok(())
    }

    async fn verify_exists(&mut self, name: &str) -> Result<()> {
        if self.cluster.get(ResourceType::Secret, name).await?.is_none() {
            return Err(DeployError::SecretMissing(name.to_string()));
        }
        self.handled.insert(name.to_string());
        Ok(())
    }

    async fn import(&mut self, name: &str) -> Result<()> {
        if self.local_secrets.is_none() {
            if let Some(dir) = &self.local_dir {
                self.local_secrets = Some(load_secrets_dir(dir)?);
            }
        }

        let local = self
            .local_secrets
            .as_ref()
            .and_then(|secrets| secrets.get(name))
            .cloned();
        if let Some(desired) = local {
            info!("Importing secret from local secrets dir");
            self.replace_if_changed(name, desired).await?;
            self.handled.insert(name.to_string());
            return Ok(());
        }

        if let Some(source) = self.source_project.clone() {
            info!(source_project = %source, "Importing secret from project");
            let exported = self
                .cluster
                .get_from(&source, ResourceType::Secret, name)
                .await?
                .ok_or_else(|| DeployError::SecretNotInProject {
                    name: name.to_string(),
                    project: source.clone(),
                })?;
            self.replace_if_changed(name, export_secret(exported))
                .await?;
            self.handled.insert(name.to_string());
        }
        Ok(())
    }

    /// データが異なる場合のみ削除して作り直す
    async fn replace_if_changed(&self, name: &str, desired: Value) -> Result<()> {
        let current = self.cluster.get(ResourceType::Secret, name).await?;
        let current_data = current.as_ref().and_then(|secret| secret.get("data"));
        if current_data == desired.get("data") {
            debug!("Secret data is unchanged");
            return Ok(());
        }

        info!("Replacing secret");
        // null の値を反映させるため、apply の前に削除する
        self.cluster.delete(ResourceType::Secret, name).await?;
        self.cluster.apply(&desired, &self.project).await?;
        Ok(())
    }
}

/// 他のプロジェクトから取得したシークレットを適用可能な形にする
fn export_secret(mut secret: Value) -> Value {
    if let Some(fields) = secret.as_object_mut() {
        fields.remove("status");
        if let Some(Value::Object(metadata)) = fields.get_mut("metadata") {
            metadata.retain(|key, _| EXPORTED_METADATA.contains(&key.as_str()));
        }
    }
    secret
}

fn is_kind(value: &Value, kind: &str) -> bool {
    value
        .get("kind")
        .and_then(Value::as_str)
        .map(|k| k.eq_ignore_ascii_case(kind))
        .unwrap_or(false)
}

/// 1ファイルのシークレット（`Secret` 単体または `List`）
fn parse_secret_file(path: &Path) -> Result<Vec<(String, Value)>> {
    let content = load_cfg_file(path)?;
    let items = if is_kind(&content, "list") {
        content
            .get("items")
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default()
    } else {
        vec![content]
    };

    items
        .into_iter()
        .filter(|item| is_kind(item, "secret"))
        .map(|item| {
            let name = item
                .pointer("/metadata/name")
                .and_then(Value::as_str)
                .ok_or_else(|| DeployError::InvalidSecretFile {
                    path: path.to_path_buf(),
                    message: "metadata/name がありません".to_string(),
                })?
                .to_string();
            Ok((name, item))
        })
        .collect()
}

/// ディレクトリ内のすべてのシークレットを名前ごとに読み込む
pub fn load_secrets_dir(dir: &Path) -> Result<BTreeMap<String, Value>> {
    info!(path = %dir.display(), "Loading secrets from local dir");
    let mut secrets = BTreeMap::new();
    for path in cfg_files_in_dir(dir) {
        for (name, secret) in parse_secret_file(&path)? {
            if secrets.insert(name.clone(), secret).is_some() {
                return Err(DeployError::DuplicateSecret(name));
            }
        }
        debug!(path = %path.display(), "Loaded secrets file");
    }
    Ok(secrets)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;

    #[test]
    fn test_load_secrets_dir_reads_lists_and_singles() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = temp_dir.path();
        fs::write(
            dir.join("one.yml"),
            "kind: Secret\nmetadata:\n  name: token\ndata:\n  key: dmFsdWU=\n",
        )
        .unwrap();
        fs::write(
            dir.join("many.json"),
            r#"{"kind": "List", "items": [
                {"kind": "Secret", "metadata": {"name": "db"}},
                {"kind": "ConfigMap", "metadata": {"name": "ignored"}}
            ]}"#,
        )
        .unwrap();

        let secrets = load_secrets_dir(dir).unwrap();
        assert_eq!(secrets.keys().collect::<Vec<_>>(), vec!["db", "token"]);
        assert_eq!(secrets["token"]["data"]["key"], "dmFsdWU=");
    }

    #[test]
    fn test_load_secrets_dir_rejects_duplicates() {
        let temp_dir = tempfile::tempdir().unwrap();
        let dir = temp_dir.path();
        fs::write(dir.join("a.yml"), "kind: Secret\nmetadata:\n  name: token\n").unwrap();
        fs::write(dir.join("b.yml"), "kind: Secret\nmetadata:\n  name: token\n").unwrap();

        assert!(matches!(
            load_secrets_dir(dir),
            Err(DeployError::DuplicateSecret(name)) if name == "token"
        ));
    }

    #[test]
    fn test_load_secrets_dir_requires_name() {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::write(temp_dir.path().join("a.yml"), "kind: Secret\nmetadata: {}\n").unwrap();

        assert!(matches!(
            load_secrets_dir(temp_dir.path()),
            Err(DeployError::InvalidSecretFile { .. })
        ));
    }

    #[test]
    fn test_export_secret_strips_cluster_fields() {
        let exported = export_secret(json!({
            "kind": "Secret",
            "metadata": {
                "name": "token",
                "namespace": "source",
                "uid": "1234",
                "resourceVersion": "42",
                "labels": {"app": "api"}
            },
            "data": {"key": "dmFsdWU="},
            "status": {}
        }));

        assert_eq!(
            exported,
            json!({
                "kind": "Secret",
                "metadata": {"name": "token", "labels": {"app": "api"}},
                "data": {"key": "dmFsdWU="}
            })
        );
    }
}
