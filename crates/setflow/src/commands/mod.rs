pub mod deploy;
pub mod process;
pub mod rollout;
pub mod routes;
pub mod sets;
pub mod wipe;

use crate::SelectionArgs;
use anyhow::bail;
use setflow_config::{DirKind, resolve_dir};
use setflow_core::{EnvResolver, all_sets};
use setflow_deploy::{ComponentRef, DeployOptions};
use std::path::PathBuf;

/// deploy/process の選択オプションを解決した結果
pub struct Selection {
    pub template_dir: PathBuf,
    pub resolver: EnvResolver,
    pub sets: Vec<String>,
    pub picks: Vec<ComponentRef>,
    pub skip: Vec<ComponentRef>,
    pub scale_resources: f64,
}

impl Selection {
    pub fn from_args(args: &SelectionArgs) -> anyhow::Result<Self> {
        if !args.all && args.sets.is_empty() && args.pick.is_empty() {
            bail!(
                "デプロイ対象が選択されていません。--sets、--all、--pick のいずれかを指定してください"
            );
        }

        let template_dir = resolve_dir(DirKind::Templates, args.template_dir.as_deref())?;
        let resolver = EnvResolver::from_values(&template_dir, &args.env, &args.env_dir_name)?;

        let sets = if args.all {
            all_sets(&template_dir)?
        } else {
            args.sets.clone()
        };
        let picks = parse_refs(&args.pick)?;
        let skip = parse_refs(&args.skip)?;

        Ok(Self {
            template_dir,
            resolver,
            sets,
            picks,
            skip,
            scale_resources: args.scale_resources,
        })
    }

    /// 確認プロンプトに表示する説明
    pub fn describe(&self) -> String {
        let mut targets: Vec<String> = self.sets.clone();
        targets.extend(self.picks.iter().map(|pick| pick.to_string()));
        targets.join(", ")
    }

    /// 実行オプションに変換（リゾルバーは別に返す）
    pub fn into_parts(self, project: &str) -> (DeployOptions, EnvResolver) {
        let mut options = DeployOptions::new(&self.template_dir, project);
        options.service_sets_selected = self.sets;
        options.specific_components = self.picks;
        options.skip = self.skip;
        options.resources_scale_factor = self.scale_resources;
        (options, self.resolver)
    }
}

fn parse_refs(values: &[String]) -> anyhow::Result<Vec<ComponentRef>> {
    values
        .iter()
        .map(|value| value.parse::<ComponentRef>().map_err(anyhow::Error::from))
        .collect()
}
