mod common;

use async_trait::async_trait;
use common::{FakeCluster, FakeRenderer, TestTemplates, rendered_names};
use serde_json::json;
use setflow_core::{DEFAULT_ENV_DIR_NAME, EnvResolver};
use setflow_deploy::{
    ComponentRef, DeployContext, DeployError, DeployHook, DeployHooks, DeployOptions,
    DeployRunner, DryRunOptions, HookRegistry, OnWaitFailure, PostDeployHook, PreDeployHook,
    ProcessedComponent, RunReport, StageOutput, StagePlan,
};
use std::sync::{Arc, Mutex};

const BASE_CFG: &str = r#"
deploy_order:
  "01":
    components: ["db", "api"]
  "02":
    components: ["web"]
"#;

/// db → api → web の3セット構成
fn fixture() -> TestTemplates {
    let templates = TestTemplates::new(BASE_CFG);
    templates.write_set("db", &["postgres"], "");
    templates.write_set("api", &["server"], "requires: [\"db\"]");
    templates.write_set("web", &["frontend"], "requires: [\"api\"]");
    templates
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

fn options(templates: &TestTemplates, sets: &[&str]) -> DeployOptions {
    let mut options = DeployOptions::new(templates.path(), "demo");
    options.service_sets_selected = strings(sets);
    options
}

async fn run(
    templates: &TestTemplates,
    options: DeployOptions,
    cluster: Arc<FakeCluster>,
    envs: &[&str],
    hooks: HookRegistry,
) -> (Result<RunReport, DeployError>, String) {
    let resolver = EnvResolver::named(templates.path(), strings(envs), DEFAULT_ENV_DIR_NAME);
    let mut out: Vec<u8> = Vec::new();
    let result = DeployRunner::new(options, resolver, cluster, Arc::new(FakeRenderer))
        .with_hooks(hooks)
        .run_with_output(&mut out)
        .await;
    (result, String::from_utf8(out).unwrap())
}

#[tokio::test(start_paused = true)]
async fn test_deploys_sets_in_stage_order() {
    let templates = fixture();
    let cluster = Arc::new(FakeCluster::new());

    let (result, _) = run(
        &templates,
        options(&templates, &["db", "api", "web"]),
        cluster.clone(),
        &[],
        HookRegistry::new(),
    )
    .await;
    let report = result.unwrap();

    assert_eq!(report.deployed, strings(&["db", "api", "web"]));
    assert_eq!(
        cluster.calls_starting_with("apply"),
        strings(&[
            "apply DeploymentConfig/postgres -n demo",
            "apply DeploymentConfig/server -n demo",
            "apply DeploymentConfig/frontend -n demo",
        ])
    );
    // NAMESPACE は常に注入される
    assert_eq!(
        report.processed[0].rendered.items()[0]["metadata"]["namespace"],
        "demo"
    );
}

#[tokio::test(start_paused = true)]
async fn test_missing_require_aborts() {
    let templates = fixture();
    let cluster = Arc::new(FakeCluster::new());

    let (result, _) = run(
        &templates,
        options(&templates, &["api"]),
        cluster.clone(),
        &[],
        HookRegistry::new(),
    )
    .await;

    match result {
        Err(DeployError::MissingRequire {
            service_set,
            required,
        }) => {
            assert_eq!(service_set, "api");
            assert_eq!(required, "db");
        }
        other => panic!("expected MissingRequire, got {:?}", other.map(|r| r.deployed)),
    }
    assert!(cluster.calls_starting_with("apply").is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_ignore_requires_deploys_single_set() {
    let templates = fixture();
    let mut options = options(&templates, &["api"]);
    options.ignore_requires = true;

    let (result, _) = run(
        &templates,
        options,
        Arc::new(FakeCluster::new()),
        &[],
        HookRegistry::new(),
    )
    .await;

    assert_eq!(result.unwrap().deployed, strings(&["api"]));
}

#[tokio::test]
async fn test_unknown_service_set_is_rejected() {
    let templates = fixture();

    let (result, _) = run(
        &templates,
        options(&templates, &["cache"]),
        Arc::new(FakeCluster::new()),
        &[],
        HookRegistry::new(),
    )
    .await;

    assert!(matches!(result, Err(DeployError::UnknownServiceSet(name)) if name == "cache"));
}

fn two_stage_api() -> TestTemplates {
    let templates = TestTemplates::new(BASE_CFG);
    templates.write(
        "api/_cfg.yml",
        r#"
deploy_order:
  "01":
    components: ["server"]
  "02":
    components: ["worker"]
"#,
    );
    templates.write_template("api", "server", "DeploymentConfig");
    templates.write_template("api", "worker", "StatefulSet");
    templates
}

#[tokio::test(start_paused = true)]
async fn test_pick_deploys_only_picked_component() {
    let templates = two_stage_api();
    let mut options = DeployOptions::new(templates.path(), "demo");
    options.specific_components = vec![ComponentRef::new("api", "worker")];

    let (result, _) = run(
        &templates,
        options,
        Arc::new(FakeCluster::new()),
        &[],
        HookRegistry::new(),
    )
    .await;

    assert_eq!(rendered_names(&result.unwrap().processed), strings(&["api/worker"]));
}

#[tokio::test(start_paused = true)]
async fn test_skip_removes_component() {
    let templates = two_stage_api();
    let mut options = options(&templates, &["api"]);
    options.skip = vec![ComponentRef::new("api", "server")];

    let (result, _) = run(
        &templates,
        options,
        Arc::new(FakeCluster::new()),
        &[],
        HookRegistry::new(),
    )
    .await;

    assert_eq!(rendered_names(&result.unwrap().processed), strings(&["api/worker"]));
}

#[tokio::test]
async fn test_nothing_selected_fails() {
    let templates = two_stage_api();
    let mut options = DeployOptions::new(templates.path(), "demo");
    options.specific_components = vec![ComponentRef::new("api", "scheduler")];

    let (result, _) = run(
        &templates,
        options,
        Arc::new(FakeCluster::new()),
        &[],
        HookRegistry::new(),
    )
    .await;

    assert!(matches!(result, Err(DeployError::NothingSelected)));
}

#[tokio::test]
async fn test_missing_template_fails() {
    let templates = TestTemplates::new(BASE_CFG);
    templates.write_set("db", &["postgres"], "");
    templates.write(
        "db/_cfg.yml",
        "deploy_order:\n  \"01\":\n    components: [\"postgres\", \"redis\"]\n",
    );

    let (result, _) = run(
        &templates,
        options(&templates, &["db"]),
        Arc::new(FakeCluster::new()),
        &[],
        HookRegistry::new(),
    )
    .await;

    assert!(matches!(
        result,
        Err(DeployError::MissingTemplate { service_set, component })
            if service_set == "db" && component == "redis"
    ));
}

#[tokio::test]
async fn test_dry_run_emits_without_touching_cluster() {
    let templates = TestTemplates::new(&format!(
        "images:\n  app: \"quay.io/org/app:1.0\"\n{}",
        BASE_CFG
    ));
    templates.write_set("db", &["postgres"], "");
    let cluster = Arc::new(FakeCluster::new());
    let mut options = options(&templates, &["db"]);
    options.dry_run = Some(DryRunOptions::default());

    let (result, out) = run(&templates, options, cluster.clone(), &[], HookRegistry::new()).await;
    let report = result.unwrap();

    assert_eq!(
        rendered_names(&report.processed),
        strings(&["db/_imagestreams", "db/postgres"])
    );
    assert!(out.contains("# db/_imagestreams"));
    assert!(out.contains("# db/postgres"));
    assert!(out.contains("kind: ImageStream"));
    assert!(cluster.calls().is_empty());
}

#[tokio::test]
async fn test_env_parameters_take_precedence() {
    let templates = fixture();
    templates.write(
        "env/qa.yml",
        r#"
global:
  parameters:
    IMAGE_TAG: latest
db/postgres:
  parameters:
    IMAGE_TAG: "13"
"#,
    );

    let (result, _) = run(
        &templates,
        options(&templates, &["db", "api"]),
        Arc::new(FakeCluster::new()),
        &["qa"],
        HookRegistry::new(),
    )
    .await;
    let report = result.unwrap();

    let images: Vec<_> = report
        .processed
        .iter()
        .map(|item| item.rendered.items()[0]["spec"]["image"].clone())
        .collect();
    assert_eq!(images, vec![json!("postgres:13"), json!("server:latest")]);
}

fn slow_db() -> TestTemplates {
    let templates = TestTemplates::new(BASE_CFG);
    templates.write_set("db", &["postgres"], "");
    templates.write(
        "db/_cfg.yml",
        "deploy_order:\n  \"01\":\n    components: [\"postgres\"]\n    timeout: 30\n",
    );
    templates
}

#[tokio::test(start_paused = true)]
async fn test_wait_failure_aborts_by_default() {
    let templates = slow_db();
    let cluster = Arc::new(FakeCluster {
        never_ready: ["postgres".to_string()].into_iter().collect(),
        ..Default::default()
    });

    let (result, _) = run(
        &templates,
        options(&templates, &["db"]),
        cluster,
        &[],
        HookRegistry::new(),
    )
    .await;

    assert!(matches!(
        result,
        Err(DeployError::WaitFailed { targets, .. }) if targets == "deploymentconfig/postgres"
    ));
}

#[tokio::test(start_paused = true)]
async fn test_wait_failure_can_continue() {
    let templates = slow_db();
    let cluster = Arc::new(FakeCluster {
        never_ready: ["postgres".to_string()].into_iter().collect(),
        ..Default::default()
    });
    let mut options = options(&templates, &["db"]);
    options.on_wait_failure = OnWaitFailure::Continue;

    let (result, _) = run(&templates, options, cluster, &[], HookRegistry::new()).await;

    assert_eq!(result.unwrap().deployed, strings(&["db"]));
}

#[tokio::test]
async fn test_missing_secret_without_source_fails() {
    let templates = TestTemplates::new(&format!("secrets: [\"token\"]\n{}", BASE_CFG));
    templates.write_set("db", &["postgres"], "");

    let (result, _) = run(
        &templates,
        options(&templates, &["db"]),
        Arc::new(FakeCluster::new()),
        &[],
        HookRegistry::new(),
    )
    .await;

    assert!(matches!(result, Err(DeployError::SecretMissing(name)) if name == "token"));
}

#[tokio::test(start_paused = true)]
async fn test_secret_imported_from_source_project_and_linked() {
    let templates = TestTemplates::new(BASE_CFG);
    templates.write_set(
        "db",
        &["postgres"],
        "secrets:\n  - name: token\n    link: [\"builder\"]\n",
    );
    let cluster = Arc::new(FakeCluster {
        other_namespaces: [(
            ("secrets-src".to_string(), "token".to_string()),
            json!({
                "kind": "Secret",
                "metadata": {"name": "token", "namespace": "secrets-src"},
                "data": {"key": "dmFsdWU="}
            }),
        )]
        .into_iter()
        .collect(),
        ..Default::default()
    });
    let mut options = options(&templates, &["db"]);
    options.secrets_project = Some("secrets-src".to_string());

    let (result, _) = run(&templates, options, cluster.clone(), &[], HookRegistry::new()).await;
    result.unwrap();

    let calls = cluster.calls();
    assert!(calls.contains(&"apply Secret/token -n demo".to_string()));
    assert!(calls.contains(&"link builder token".to_string()));
}

#[tokio::test(start_paused = true)]
async fn test_images_are_imported_once_per_run() {
    let templates = TestTemplates::new(&format!(
        "images:\n  - \"app:1.0\": \"quay.io/org/app:1.0\"\n{}",
        BASE_CFG
    ));
    templates.write_set(
        "db",
        &["postgres"],
        "images:\n  - istag: \"app:1.0\"\n    from: \"quay.io/org/app:1.0\"\n",
    );
    let cluster = Arc::new(FakeCluster::new());

    let (result, _) = run(
        &templates,
        options(&templates, &["db"]),
        cluster.clone(),
        &[],
        HookRegistry::new(),
    )
    .await;
    result.unwrap();

    assert_eq!(
        cluster.calls_starting_with("import-image"),
        strings(&["import-image app:1.0 quay.io/org/app:1.0"])
    );
}

#[tokio::test(start_paused = true)]
async fn test_trigger_builds_restarts_builds_after_deploy() {
    let templates = TestTemplates::new(BASE_CFG);
    templates.write(
        "db/_cfg.yml",
        "trigger_builds: true\ndeploy_order:\n  \"01\":\n    components: [\"image\"]\n",
    );
    templates.write_template("db", "image", "BuildConfig");
    let cluster = Arc::new(FakeCluster::new());

    let (result, _) = run(
        &templates,
        options(&templates, &["db"]),
        cluster.clone(),
        &[],
        HookRegistry::new(),
    )
    .await;
    result.unwrap();

    // ビルドは post_deploy で1回だけ開始される
    assert_eq!(
        cluster.calls_starting_with("start-build"),
        strings(&["start-build image"])
    );
    assert_eq!(cluster.calls_starting_with("cancel-build").len(), 1);
    let calls = cluster.calls();
    let applied = calls
        .iter()
        .position(|call| call == "apply BuildConfig/image -n demo")
        .unwrap();
    let started = calls
        .iter()
        .position(|call| call == "start-build image")
        .unwrap();
    assert!(applied < started);
}

#[tokio::test(start_paused = true)]
async fn test_build_configs_start_once_during_deploy() {
    let templates = TestTemplates::new(BASE_CFG);
    templates.write(
        "db/_cfg.yml",
        "deploy_order:\n  \"01\":\n    components: [\"image\"]\n",
    );
    templates.write_template("db", "image", "BuildConfig");
    let cluster = Arc::new(FakeCluster::new());

    let (result, _) = run(
        &templates,
        options(&templates, &["db"]),
        cluster.clone(),
        &[],
        HookRegistry::new(),
    )
    .await;
    result.unwrap();

    assert_eq!(
        cluster.calls_starting_with("start-build"),
        strings(&["start-build image"])
    );
}

#[tokio::test(start_paused = true)]
async fn test_empty_render_is_skipped() {
    let templates = TestTemplates::new(BASE_CFG);
    templates.write(
        "db/_cfg.yml",
        "deploy_order:\n  \"01\":\n    components: [\"empty\", \"postgres\"]\n",
    );
    templates.write("db/empty.yml", "kind: Template\nobjects: []\n");
    templates.write_template("db", "postgres", "DeploymentConfig");
    let cluster = Arc::new(FakeCluster::new());

    let (result, _) = run(
        &templates,
        options(&templates, &["db"]),
        cluster.clone(),
        &[],
        HookRegistry::new(),
    )
    .await;
    let report = result.unwrap();

    assert_eq!(report.deployed, strings(&["db"]));
    assert_eq!(rendered_names(&report.processed), strings(&["db/postgres"]));
    assert_eq!(
        cluster.calls_starting_with("apply"),
        strings(&["apply DeploymentConfig/postgres -n demo"])
    );
}

struct Recorder {
    events: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl PreDeployHook for Recorder {
    async fn pre_deploy(&self, ctx: &DeployContext<'_>) -> setflow_deploy::Result<()> {
        self.events
            .lock()
            .unwrap()
            .push(format!("pre {}", ctx.service_set));
        Ok(())
    }
}

#[async_trait]
impl DeployHook for Recorder {
    async fn deploy(
        &self,
        ctx: &DeployContext<'_>,
        stage: &StagePlan,
    ) -> setflow_deploy::Result<StageOutput> {
        self.events.lock().unwrap().push(format!(
            "deploy {} {}",
            ctx.service_set,
            stage.components.join(",")
        ));
        let mut output = StageOutput::default();
        for component in &stage.components {
            if let Some(rendered) = ctx.render(component).await? {
                output.processed.push((component.clone(), rendered));
            }
        }
        Ok(output)
    }
}

#[async_trait]
impl PostDeployHook for Recorder {
    async fn post_deploy(
        &self,
        ctx: &DeployContext<'_>,
        processed: &[ProcessedComponent],
        timeout: u64,
    ) -> setflow_deploy::Result<()> {
        self.events.lock().unwrap().push(format!(
            "post {} {} {}",
            ctx.service_set,
            processed.len(),
            timeout
        ));
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn test_custom_hooks_replace_default_deploy() {
    let templates = fixture();
    templates.write(
        "web/_cfg.yml",
        r#"
custom_deploy_logic: true
post_deploy_timeout: 90
deploy_order:
  "01":
    components: ["frontend"]
"#,
    );
    let events = Arc::new(Mutex::new(Vec::new()));
    let recorder = Arc::new(Recorder {
        events: events.clone(),
    });
    let mut hooks = HookRegistry::new();
    hooks.register(
        "web",
        DeployHooks {
            pre_deploy: Some(recorder.clone()),
            deploy: Some(recorder.clone()),
            post_deploy: Some(recorder),
        },
    );
    let cluster = Arc::new(FakeCluster::new());
    let mut options = options(&templates, &["web"]);
    options.ignore_requires = true;

    let (result, _) = run(&templates, options, cluster.clone(), &[], hooks).await;
    let report = result.unwrap();

    assert_eq!(
        *events.lock().unwrap(),
        strings(&["pre web", "deploy web frontend", "post web 1 90"])
    );
    assert!(cluster.calls_starting_with("apply").is_empty());
    assert_eq!(rendered_names(&report.processed), strings(&["web/frontend"]));
}
