//! Template rendering abstraction

use crate::error::Result;
use async_trait::async_trait;
use setflow_core::model::value_to_param;
use setflow_core::{ComponentVariables, RenderedTemplate, Template};
use tracing::warn;

/// Turns a template plus resolved variables into concrete objects
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Render `template`
    ///
    /// Only parameters the template declares are passed through.
    /// `scale_factor` scales CPU/memory requests and limits (0 or less
    /// strips them). `label` is a `key=value` pair stamped on every object.
    async fn render(
        &self,
        template: &Template,
        variables: &ComponentVariables,
        scale_factor: f64,
        label: Option<&str>,
    ) -> Result<RenderedTemplate>;
}

/// Split variables into the `(name, value)` pairs the template declares
///
/// Parameters the template does not know about are logged and dropped.
pub fn declared_parameters(
    template: &Template,
    variables: &ComponentVariables,
) -> Vec<(String, String)> {
    let declared = template.parameter_names();
    let mut selected = Vec::new();
    let mut skipped = Vec::new();

    for (name, value) in variables.parameters() {
        if declared.contains(name) {
            selected.push((name.clone(), value_to_param(value)));
        } else {
            skipped.push(name.as_str());
        }
    }

    if !skipped.is_empty() {
        warn!(
            template = %template.name,
            skipped = %skipped.join(", "),
            "Skipped variables defined in config but not present in template"
        );
    }
    selected
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_declared_parameters() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("api.yml");
        std::fs::write(
            &path,
            "kind: Template\nparameters:\n  - name: NAMESPACE\n  - name: REPLICAS\nobjects: []\n",
        )
        .unwrap();
        let template = Template::load(&path).unwrap();

        let mut variables = ComponentVariables::new(
            json!({"parameters": {"REPLICAS": 3, "UNUSED": "x"}})
                .as_object()
                .unwrap()
                .clone(),
        );
        variables.inject("ns", "src");

        let mut params = declared_parameters(&template, &variables);
        params.sort();
        assert_eq!(
            params,
            vec![
                ("NAMESPACE".to_string(), "ns".to_string()),
                ("REPLICAS".to_string(), "3".to_string()),
            ]
        );
    }
}
