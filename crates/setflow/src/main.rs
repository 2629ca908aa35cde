mod commands;
mod scripts;
mod utils;

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "setflow")]
#[command(
    about = "テンプレートのサービスセットを OpenShift プロジェクトへ段階的にデプロイ",
    long_about = "テンプレートのサービスセットを OpenShift プロジェクトへ段階的にデプロイします。\n\
                  実行前に oc をインストールし、クラスタにログインしておいてください。"
)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// 出力形式
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Output {
    Yaml,
    Json,
}

/// 準備待ちに失敗したときの動作
#[derive(Clone, Copy, Debug, Default, ValueEnum)]
pub enum WaitFailure {
    #[default]
    Abort,
    Continue,
}

/// deploy と process で共通のオプション
#[derive(Args, Debug)]
pub struct SelectionArgs {
    /// すべてのサービスセットを対象にする
    #[arg(short = 'a', long = "all")]
    pub all: bool,
    /// 対象のサービスセット（カンマ区切り）
    #[arg(short, long, value_delimiter = ',')]
    pub sets: Vec<String>,
    /// 個別に対象にするコンポーネント（service_set/component、カンマ区切り）
    #[arg(short, long, value_delimiter = ',')]
    pub pick: Vec<String>,
    /// 除外するコンポーネント（service_set/component、カンマ区切り）
    #[arg(short = 'k', long, value_delimiter = ',')]
    pub skip: Vec<String>,
    /// 環境名、または環境ファイルのパス（複数指定可、先に指定したものが優先）
    #[arg(short, long = "env")]
    pub env: Vec<String>,
    /// 環境ファイルを置くディレクトリ名
    #[arg(long, default_value = setflow_core::DEFAULT_ENV_DIR_NAME)]
    pub env_dir_name: String,
    /// テンプレートディレクトリ（SETFLOW_TEMPLATES_DIR でも指定可）
    #[arg(short, long)]
    pub template_dir: Option<PathBuf>,
    /// CPU/メモリの requests/limits に掛ける倍率（0 以下で削除）
    #[arg(long, default_value_t = 1.0)]
    pub scale_resources: f64,
}

#[derive(Subcommand)]
enum Commands {
    /// プロジェクトにデプロイ
    Deploy {
        /// デプロイ先のプロジェクト
        dst_project: String,
        #[command(flatten)]
        selection: SelectionArgs,
        /// 確認なしで実行
        #[arg(short = 'f', long)]
        no_confirm: bool,
        /// シークレットファイルのディレクトリ（SETFLOW_SECRETS_DIR でも指定可）
        #[arg(long)]
        secrets_local_dir: Option<PathBuf>,
        /// シークレットのインポート元プロジェクト（空文字で無効）
        #[arg(long, default_value = "secrets")]
        secrets_src_project: String,
        /// _cfg の requires を無視する
        #[arg(short, long)]
        ignore_requires: bool,
        /// スクリプトフックのディレクトリ（SETFLOW_CUSTOM_DIR でも指定可）
        #[arg(short = 'u', long)]
        custom_dir: Option<PathBuf>,
        /// すべてのリソースに付与するラベル（例: app=test）
        #[arg(short, long)]
        label: Option<String>,
        /// 準備待ちに失敗したときの動作
        #[arg(long, value_enum, default_value_t = WaitFailure::Abort)]
        on_wait_failure: WaitFailure,
    },
    /// テンプレートを処理して出力（デプロイはしない）
    Process {
        /// 対象のプロジェクト（NAMESPACE パラメータに使用）
        dst_project: String,
        #[command(flatten)]
        selection: SelectionArgs,
        /// 出力形式
        #[arg(short, long, value_enum, default_value_t = Output::Yaml)]
        output: Output,
        /// 処理結果を保存するディレクトリ（省略時は標準出力）
        #[arg(long)]
        to_dir: Option<PathBuf>,
    },
    /// プロジェクト内のリソースをすべて削除
    Wipe {
        /// 対象のプロジェクト
        dst_project: String,
        /// 確認なしで実行
        #[arg(short = 'f', long)]
        no_confirm: bool,
        /// このラベルのリソースだけを削除（例: app=test）
        #[arg(short, long)]
        label: Option<String>,
    },
    /// プロジェクトのルートを表示
    ListRoutes {
        /// 対象のプロジェクト
        dst_project: String,
        /// 出力形式
        #[arg(short, long, value_enum)]
        output: Option<Output>,
    },
    /// 利用可能なサービスセットを表示
    ListSets {
        /// テンプレートディレクトリ（SETFLOW_TEMPLATES_DIR でも指定可）
        #[arg(short, long)]
        template_dir: Option<PathBuf>,
        /// 出力形式
        #[arg(short, long, value_enum)]
        output: Option<Output>,
    },
    /// DeploymentConfig をロールアウトして完了を待つ（フックスクリプト向け）
    Rollout {
        /// DeploymentConfig の名前
        deployment_config: String,
        /// 対象のプロジェクト（省略時は現在のプロジェクト）
        #[arg(short = 'n', long)]
        project: Option<String>,
        /// 待機する秒数
        #[arg(long, default_value_t = setflow_core::DEFAULT_STAGE_TIMEOUT)]
        timeout: u64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ログは stderr、テンプレートやルート一覧は stdout
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match cli.command {
        Commands::Deploy {
            dst_project,
            selection,
            no_confirm,
            secrets_local_dir,
            secrets_src_project,
            ignore_requires,
            custom_dir,
            label,
            on_wait_failure,
        } => {
            commands::deploy::handle(commands::deploy::DeployArgs {
                dst_project,
                selection,
                no_confirm,
                secrets_local_dir,
                secrets_src_project,
                ignore_requires,
                custom_dir,
                label,
                on_wait_failure,
            })
            .await?;
        }
        Commands::Process {
            dst_project,
            selection,
            output,
            to_dir,
        } => {
            commands::process::handle(&dst_project, &selection, output, to_dir).await?;
        }
        Commands::Wipe {
            dst_project,
            no_confirm,
            label,
        } => {
            commands::wipe::handle(&dst_project, no_confirm, label.as_deref()).await?;
        }
        Commands::ListRoutes {
            dst_project,
            output,
        } => {
            commands::routes::handle(&dst_project, output).await?;
        }
        Commands::ListSets {
            template_dir,
            output,
        } => {
            commands::sets::handle(template_dir.as_deref(), output)?;
        }
        Commands::Rollout {
            deployment_config,
            project,
            timeout,
        } => {
            commands::rollout::handle(&deployment_config, project.as_deref(), timeout).await?;
        }
    }

    Ok(())
}
