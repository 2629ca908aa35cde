use async_trait::async_trait;
use serde_json::{Value, json};
use setflow_cluster::{ClusterClient, ClusterError, Renderer, Route};
use setflow_core::{ComponentVariables, RenderedTemplate, ResourceType, Template};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use tempfile::TempDir;

/// テンプレートツリーを組み立てるヘルパー
pub struct TestTemplates {
    pub root: TempDir,
}

impl TestTemplates {
    pub fn new(base_cfg: &str) -> Self {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("_cfg.yml"), base_cfg).unwrap();
        Self { root }
    }

    pub fn path(&self) -> PathBuf {
        self.root.path().to_path_buf()
    }

    pub fn write(&self, relative: &str, content: &str) {
        let path = self.root.path().join(relative);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    /// `kind` の名前付きオブジェクトを1つ持つテンプレートを書き込む
    pub fn write_template(&self, set: &str, component: &str, kind: &str) {
        self.write(
            &format!("{}/{}.yml", set, component),
            &format!(
                r#"
kind: Template
parameters:
  - name: NAMESPACE
  - name: IMAGE_TAG
objects:
  - kind: {kind}
    metadata:
      name: {component}
      namespace: ${{NAMESPACE}}
    spec:
      image: "{component}:${{IMAGE_TAG}}"
"#
            ),
        );
    }

    /// コンポーネントを1ステージに並べたサービスセットを書き込む
    pub fn write_set(&self, set: &str, components: &[&str], extra: &str) {
        let list = components
            .iter()
            .map(|c| format!("\"{}\"", c))
            .collect::<Vec<_>>()
            .join(", ");
        self.write(
            &format!("{}/_cfg.yml", set),
            &format!(
                "{extra}\ndeploy_order:\n  \"01\":\n    components: [{list}]\n"
            ),
        );
        for component in components {
            self.write_template(set, component, "DeploymentConfig");
        }
    }
}

/// 呼び出しを記録するインメモリのクラスタ
#[derive(Default)]
pub struct FakeCluster {
    pub calls: Mutex<Vec<String>>,
    pub objects: Mutex<HashMap<(ResourceType, String), Value>>,
    /// 準備が完了しないリソース名
    pub never_ready: HashSet<String>,
    /// (namespace, secret name) → secret
    pub other_namespaces: HashMap<(String, String), Value>,
}

impl FakeCluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// `prefix` で始まる呼び出し
    pub fn calls_starting_with(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|call| call.starts_with(prefix))
            .collect()
    }

    pub fn insert(&self, restype: ResourceType, name: &str, object: Value) {
        self.objects
            .lock()
            .unwrap()
            .insert((restype, name.to_string()), object);
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn with_status(&self, restype: ResourceType, name: &str, mut object: Value) -> Value {
        if self.never_ready.contains(name) {
            object["status"] = json!({"updatedReplicas": 0, "availableReplicas": 0});
            return object;
        }
        object["status"] = match restype {
            ResourceType::DeploymentConfig | ResourceType::Deployment => json!({
                "updatedReplicas": 1,
                "availableReplicas": 1,
                "unavailableReplicas": 0
            }),
            ResourceType::StatefulSet => json!({"readyReplicas": 1, "replicas": 1}),
            ResourceType::DaemonSet => {
                json!({"desiredNumberScheduled": 1, "numberAvailable": 1})
            }
            _ => object.get("status").cloned().unwrap_or(Value::Null),
        };
        object
    }
}

#[async_trait]
impl ClusterClient for FakeCluster {
    async fn apply(&self, manifest: &Value, namespace: &str) -> Result<(), ClusterError> {
        let items = match manifest.get("items").and_then(Value::as_array) {
            Some(items) => items.clone(),
            None => vec![manifest.clone()],
        };
        for item in items {
            let kind = item["kind"].as_str().unwrap_or_default();
            let name = item["metadata"]["name"].as_str().unwrap_or_default();
            self.record(format!("apply {}/{} -n {}", kind, name, namespace));
            if let Ok(restype) = ResourceType::parse(kind) {
                let object = self.with_status(restype, name, item.clone());
                self.insert(restype, name, object);
            }
        }
        Ok(())
    }

    async fn get(&self, restype: ResourceType, name: &str) -> Result<Option<Value>, ClusterError> {
        Ok(self
            .objects
            .lock()
            .unwrap()
            .get(&(restype, name.to_string()))
            .cloned())
    }

    async fn get_from(
        &self,
        namespace: &str,
        _restype: ResourceType,
        name: &str,
    ) -> Result<Option<Value>, ClusterError> {
        Ok(self
            .other_namespaces
            .get(&(namespace.to_string(), name.to_string()))
            .cloned())
    }

    async fn delete(&self, restype: ResourceType, name: &str) -> Result<(), ClusterError> {
        self.record(format!("delete {}/{}", restype, name));
        self.objects
            .lock()
            .unwrap()
            .remove(&(restype, name.to_string()));
        Ok(())
    }

    async fn delete_all(&self, namespace: &str, _label: Option<&str>) -> Result<(), ClusterError> {
        self.record(format!("delete-all -n {}", namespace));
        Ok(())
    }

    async fn start_build(&self, build_config: &str) -> Result<String, ClusterError> {
        let build = format!("{}-1", build_config);
        self.record(format!("start-build {}", build_config));
        self.insert(
            ResourceType::Build,
            &build,
            json!({"status": {"phase": "Complete"}}),
        );
        Ok(build)
    }

    async fn cancel_build(&self, build_config: &str) -> Result<(), ClusterError> {
        self.record(format!("cancel-build {}", build_config));
        Ok(())
    }

    async fn tag_image(&self, from: &str, istag: &str, _scheduled: bool) -> Result<(), ClusterError> {
        self.record(format!("tag {} {}", from, istag));
        Ok(())
    }

    async fn import_image(
        &self,
        istag: &str,
        from: Option<&str>,
        _scheduled: bool,
    ) -> Result<(), ClusterError> {
        self.record(format!("import-image {} {}", istag, from.unwrap_or("-")));
        self.insert(ResourceType::ImageStreamTag, istag, json!({}));
        Ok(())
    }

    async fn create_project(&self, name: &str) -> Result<(), ClusterError> {
        self.record(format!("new-project {}", name));
        Ok(())
    }

    async fn switch_project(&self, name: &str) -> Result<(), ClusterError> {
        self.record(format!("project {}", name));
        Ok(())
    }

    async fn list_routes(&self) -> Result<Vec<Route>, ClusterError> {
        Ok(Vec::new())
    }

    async fn link_secret(&self, service_account: &str, secret: &str) -> Result<(), ClusterError> {
        self.record(format!("link {} {}", service_account, secret));
        Ok(())
    }

    async fn rollout_latest(&self, deployment_config: &str) -> Result<bool, ClusterError> {
        self.record(format!("rollout {}", deployment_config));
        Ok(true)
    }
}

/// `${NAME}` を置換するだけのレンダラー
pub struct FakeRenderer;

#[async_trait]
impl Renderer for FakeRenderer {
    async fn render(
        &self,
        template: &Template,
        variables: &ComponentVariables,
        _scale_factor: f64,
        label: Option<&str>,
    ) -> Result<RenderedTemplate, ClusterError> {
        let mut text = serde_json::to_string(&template.content["objects"]).unwrap();
        for (name, value) in setflow_cluster::declared_parameters(template, variables) {
            text = text.replace(&format!("${{{}}}", name), &value);
        }
        let mut objects: Vec<Value> = serde_json::from_str(&text).unwrap();
        if let Some((key, value)) = label.and_then(|label| label.split_once('=')) {
            for object in &mut objects {
                object["metadata"]["labels"][key] = json!(value);
            }
        }
        Ok(RenderedTemplate::from_items(objects))
    }
}

#[allow(dead_code)]
pub fn rendered_names(processed: &[setflow_deploy::ProcessedComponent]) -> Vec<String> {
    processed
        .iter()
        .map(|item| format!("{}/{}", item.service_set, item.component))
        .collect()
}
