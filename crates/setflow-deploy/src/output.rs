//! 処理済みテンプレートとドライラン出力

use crate::error::{DeployError, Result};
use crate::options::{DryRunOptions, OutputFormat};
use setflow_core::RenderedTemplate;
use std::io::Write;
use std::path::PathBuf;
use tracing::{info, warn};

/// ドライランでイメージストリームを出力する疑似コンポーネント名
pub const IMAGESTREAMS_COMPONENT: &str = "_imagestreams";

/// 1コンポーネント分のレンダリング結果
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessedComponent {
    pub service_set: String,
    pub component: String,
    pub rendered: RenderedTemplate,
}

impl ProcessedComponent {
    pub fn new(
        service_set: impl Into<String>,
        component: impl Into<String>,
        rendered: RenderedTemplate,
    ) -> Self {
        Self {
            service_set: service_set.into(),
            component: component.into(),
            rendered,
        }
    }

    /// 指定形式でシリアライズ
    pub fn to_text(&self, format: OutputFormat) -> Result<String> {
        let value = self.rendered.as_value();
        match format {
            OutputFormat::Yaml => {
                serde_yaml::to_string(value).map_err(|e| DeployError::Serialize(e.to_string()))
            }
            OutputFormat::Json => serde_json::to_string_pretty(value)
                .map(|mut text| {
                    text.push('\n');
                    text
                })
                .map_err(|e| DeployError::Serialize(e.to_string())),
        }
    }
}

/// ドライランの結果を書き出す
///
/// `to_dir` 指定時は `<to_dir>/<set>/<component>.<ext>` に、それ以外は
/// `# <set>/<component>` ヘッダ付きのドキュメントとして `out` に出力します。
pub fn emit_dry_run(
    processed: &[ProcessedComponent],
    options: &DryRunOptions,
    out: &mut dyn Write,
) -> Result<Vec<PathBuf>> {
    let mut written = Vec::new();

    for item in processed {
        if item.rendered.is_empty() {
            warn!(
                service_set = %item.service_set,
                component = %item.component,
                "Processed template is empty, not emitting"
            );
            continue;
        }
        let text = item.to_text(options.output)?;

        match &options.to_dir {
            Some(dir) => {
                let set_dir = dir.join(&item.service_set);
                std::fs::create_dir_all(&set_dir)?;
                let path = set_dir.join(format!(
                    "{}.{}",
                    item.component,
                    options.output.extension()
                ));
                std::fs::write(&path, text)?;
                info!(path = %path.display(), "Wrote processed template");
                written.push(path);
            }
            None => {
                writeln!(out, "---")?;
                writeln!(out, "# {}/{}", item.service_set, item.component)?;
                write!(out, "{}", text)?;
            }
        }
    }

    Ok(written)
}
