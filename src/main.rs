//! Tablebeam - bulk CSV import with a completion token

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tablebeam::ImportError;
use tablebeam::config::{self, ImportConfig, ImportOptions, RuntimeParameters, params};
use tablebeam::logging::{LogConfig, LogFormat, init_logging};
use tablebeam::runner::{ExecMode, Runner};
use tablebeam::schema::COLUMN_FAMILY;
use tablebeam::store::FakeWideColumnIO;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "tablebeam")]
#[command(author, version, about = "Import CSV rows into a wide-column table")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Write run metrics to this JSON file
    #[arg(long, global = true)]
    metrics_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run an import and wait for its completion token
    Run {
        #[command(flatten)]
        options: OptionArgs,

        #[command(flatten)]
        exec: ExecArgs,
    },

    /// Write a reusable template and exit without importing
    ///
    /// Options given here are fixed in the template; the others become
    /// runtime parameters supplied at launch.
    Stage {
        /// Where to write the template
        #[arg(long)]
        template_location: PathBuf,

        #[command(flatten)]
        options: OptionArgs,
    },

    /// Launch a staged template
    Launch {
        /// Template written by `stage`
        #[arg(long)]
        template: PathBuf,

        /// Runtime parameter as name=value, repeatable
        #[arg(short, long = "parameter")]
        parameters: Vec<String>,

        #[command(flatten)]
        exec: ExecArgs,
    },
}

#[derive(Args, Debug)]
struct ExecArgs {
    /// Process bundles on the calling thread only
    #[arg(long)]
    sequential: bool,

    /// Import into a throwaway in-memory table. The completion token is
    /// written to `<completion-file>.local` instead of the configured path.
    #[arg(long)]
    local: bool,
}

#[derive(Args, Debug)]
struct OptionArgs {
    /// Store project id
    #[arg(long, env = "BIGTABLE_PROJECT_ID")]
    bigtable_project_id: Option<String>,

    /// Store instance id
    #[arg(long, env = "BIGTABLE_INSTANCE_ID")]
    bigtable_instance_id: Option<String>,

    /// Table id
    #[arg(long, env = "BIGTABLE_TABLE_ID")]
    bigtable_table_id: Option<String>,

    /// Routing profile; empty selects the default
    #[arg(long, env = "BIGTABLE_APP_PROFILE_ID")]
    bigtable_app_profile_id: Option<String>,

    /// Upper bound on concurrent workers
    #[arg(long, env = "DATAFLOW_MAX_NUM_WORKERS")]
    dataflow_max_num_workers: Option<String>,

    /// Input file path or glob pattern
    #[arg(long, env = "TABLEBEAM_INPUT_FILE")]
    input_file: Option<String>,

    /// Path of the completion token
    #[arg(long, env = "TABLEBEAM_COMPLETION_FILE")]
    completion_file: Option<String>,

    /// Comma-separated column qualifiers, one per field after the row key
    #[arg(long, env = "TABLEBEAM_HEADERS")]
    headers: Option<String>,
}

impl OptionArgs {
    /// Fix every option given on the command line.
    fn apply(&self, options: &mut ImportOptions) -> Result<()> {
        let given = [
            (params::PROJECT_ID, &self.bigtable_project_id),
            (params::INSTANCE_ID, &self.bigtable_instance_id),
            (params::TABLE_ID, &self.bigtable_table_id),
            (params::APP_PROFILE_ID, &self.bigtable_app_profile_id),
            (params::MAX_NUM_WORKERS, &self.dataflow_max_num_workers),
            (params::INPUT_FILE, &self.input_file),
            (params::COMPLETION_FILE, &self.completion_file),
            (params::HEADERS, &self.headers),
        ];
        for (name, value) in given {
            if let Some(value) = value {
                options.set(name, value.clone())?;
            }
        }
        Ok(())
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&LogConfig::verbose(cli.verbose).with_format(cli.log_format))?;

    let result = match cli.command {
        Command::Run {
            options: args,
            exec,
        } => {
            let mut options = ImportOptions::unbound();
            args.apply(&mut options)?;
            let config = options.resolve(&RuntimeParameters::new())?;
            execute(config, &exec, cli.metrics_file.as_deref())
        }
        Command::Stage {
            template_location,
            options: args,
        } => stage(&template_location, &args),
        Command::Launch {
            template,
            parameters,
            exec,
        } => {
            let options = config::load_template(&template)?;
            let runtime = RuntimeParameters::from_pairs(&parameters)?;
            let config = options.resolve(&runtime)?;
            execute(config, &exec, cli.metrics_file.as_deref())
        }
    };

    if let Err(err) = &result {
        error!(error = %err, "import failed");
    }
    result
}

fn stage(template_location: &Path, args: &OptionArgs) -> Result<()> {
    let mut options = ImportOptions::unbound();
    args.apply(&mut options)?;
    config::save_template(&options, template_location)?;
    info!(
        template = %template_location.display(),
        runtime_parameters = ?options.runtime_parameters(),
        "template staged"
    );
    Ok(())
}

fn execute(mut config: ImportConfig, exec: &ExecArgs, metrics_file: Option<&Path>) -> Result<()> {
    if !exec.local {
        return Err(ImportError::Configuration(
            "no store client is built into this binary; pass --local to import into an in-memory table"
                .to_string(),
        )
        .into());
    }
    // The configured token path is never written in local mode.
    config.completion_file = local_token_path(&config.completion_file);
    warn!(
        table = %config.table,
        completion_file = %config.completion_file.display(),
        "local mode: rows go to an in-memory table"
    );
    let store = FakeWideColumnIO::new();
    store.create_table(&config.table, &[COLUMN_FAMILY]);

    let mode = if exec.sequential {
        ExecMode::Sequential
    } else {
        ExecMode::default()
    };
    let summary = Runner::new(mode).run(&config, Arc::new(store))?;

    if let Some(path) = metrics_file {
        summary
            .metrics
            .save_to_file(path)
            .with_context(|| format!("save metrics to {}", path.display()))?;
    }
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

fn local_token_path(path: &Path) -> PathBuf {
    let mut local = path.as_os_str().to_owned();
    local.push(".local");
    PathBuf::from(local)
}
