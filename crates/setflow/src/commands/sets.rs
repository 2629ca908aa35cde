use crate::{Output, utils};
use colored::Colorize;
use serde::Serialize;
use setflow_config::{DirKind, resolve_dir};
use setflow_core::all_sets;
use std::path::Path;

#[derive(Serialize)]
struct SetList {
    service_sets: Vec<String>,
}

pub fn handle(template_dir: Option<&Path>, output: Option<Output>) -> anyhow::Result<()> {
    let template_dir = resolve_dir(DirKind::Templates, template_dir)?;
    let list = SetList {
        service_sets: all_sets(&template_dir)?,
    };

    match output {
        Some(output) => utils::print_as(&list, output),
        None => {
            println!("{}", "利用可能なサービスセット:".bold());
            for set in &list.service_sets {
                println!("  • {}", set.cyan());
            }
            Ok(())
        }
    }
}
