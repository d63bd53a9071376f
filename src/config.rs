//! Job configuration: late-bound options, templates, and the resolved config.
//!
//! Options are declared as [`ValueProvider`]s. A value known when the job is
//! built is `Static`; a value supplied only when the job is launched is
//! `Runtime` and names the parameter it will be read from. [`ImportOptions`]
//! is the serializable, possibly unresolved form (a *template*);
//! [`ImportOptions::resolve`] turns it into an [`ImportConfig`] exactly once,
//! before any input is read. Components receive the `ImportConfig` by
//! reference and never look configuration up anywhere else.
//!
//! ```
//! use tablebeam::config::{ImportOptions, RuntimeParameters, params};
//!
//! # fn main() -> anyhow::Result<()> {
//! let mut options = ImportOptions::unbound();
//! options.set(params::PROJECT_ID, "proj")?;
//! options.set(params::INSTANCE_ID, "inst")?;
//! options.set(params::TABLE_ID, "cache")?;
//!
//! let runtime = RuntimeParameters::from_pairs([
//!     "inputFile=data/cache.csv*",
//!     "completionFile=control/cache/completed.txt",
//! ])?;
//! let config = options.resolve(&runtime)?;
//! assert_eq!(config.input, "data/cache.csv*");
//! assert_eq!(config.schema.names(), ["value"]);
//! # Ok(())
//! # }
//! ```

use crate::error::ImportError;
use crate::schema::{DEFAULT_HEADERS, FieldSchema};
use crate::store::TableRef;
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tracing::warn;

/// Parameter names, shared by templates, `--parameter` pairs and the CLI.
pub mod params {
    pub const PROJECT_ID: &str = "bigtableProjectId";
    pub const INSTANCE_ID: &str = "bigtableInstanceId";
    pub const TABLE_ID: &str = "bigtableTableId";
    pub const APP_PROFILE_ID: &str = "bigtableAppProfileId";
    pub const MAX_NUM_WORKERS: &str = "dataflowMaxNumWorkers";
    pub const INPUT_FILE: &str = "inputFile";
    pub const COMPLETION_FILE: &str = "completionFile";
    pub const HEADERS: &str = "headers";

    pub const ALL: [&str; 8] = [
        PROJECT_ID,
        INSTANCE_ID,
        TABLE_ID,
        APP_PROFILE_ID,
        MAX_NUM_WORKERS,
        INPUT_FILE,
        COMPLETION_FILE,
        HEADERS,
    ];
}

static RESOURCE_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[_a-zA-Z0-9][-_.a-zA-Z0-9]*$").expect("valid id regex"));
// Project ids may be domain-scoped, e.g. `example.com:my-project`.
static PROJECT_ID_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9][-_.:a-zA-Z0-9]*$").expect("valid id regex"));

/// A value fixed at build time, or deferred to a launch parameter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueProvider {
    Static(String),
    Runtime { parameter: String },
}

impl ValueProvider {
    pub fn runtime(parameter: impl Into<String>) -> Self {
        Self::Runtime {
            parameter: parameter.into(),
        }
    }

    /// The value, if it is static or its parameter was supplied.
    #[must_use]
    pub fn get(&self, runtime: &RuntimeParameters) -> Option<String> {
        match self {
            Self::Static(value) => Some(value.clone()),
            Self::Runtime { parameter } => runtime.get(parameter).map(str::to_string),
        }
    }
}

/// Launch-time `name=value` parameters.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeParameters(BTreeMap<String, String>);

impl RuntimeParameters {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `name=value` pairs. The value may itself contain `=`.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::Configuration`] for a pair without `=`, an
    /// unknown parameter name, or a name given twice.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, ImportError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut parsed = Self::new();
        for pair in pairs {
            let pair = pair.as_ref();
            let (name, value) = pair.split_once('=').ok_or_else(|| {
                ImportError::Configuration(format!("parameter {pair:?} is not of the form name=value"))
            })?;
            if parsed.0.contains_key(name) {
                return Err(ImportError::Configuration(format!(
                    "parameter {name} given more than once"
                )));
            }
            parsed.insert(name, value)?;
        }
        Ok(parsed)
    }

    /// # Errors
    ///
    /// Returns [`ImportError::Configuration`] for an unknown parameter name.
    pub fn insert(&mut self, name: &str, value: impl Into<String>) -> Result<(), ImportError> {
        if !params::ALL.contains(&name) {
            return Err(ImportError::Configuration(format!(
                "unknown parameter {name:?}; expected one of {}",
                params::ALL.join(", ")
            )));
        }
        self.0.insert(name.to_string(), value.into());
        Ok(())
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }
}

/// Options of an import job, as built or as stored in a template.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOptions {
    pub bigtable_project_id: ValueProvider,
    pub bigtable_instance_id: ValueProvider,
    pub bigtable_table_id: ValueProvider,
    pub bigtable_app_profile_id: ValueProvider,
    pub dataflow_max_num_workers: ValueProvider,
    pub input_file: ValueProvider,
    pub completion_file: ValueProvider,
    pub headers: ValueProvider,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self::unbound()
    }
}

impl ImportOptions {
    /// Every option deferred to the launch parameter of the same name.
    #[must_use]
    pub fn unbound() -> Self {
        Self {
            bigtable_project_id: ValueProvider::runtime(params::PROJECT_ID),
            bigtable_instance_id: ValueProvider::runtime(params::INSTANCE_ID),
            bigtable_table_id: ValueProvider::runtime(params::TABLE_ID),
            bigtable_app_profile_id: ValueProvider::runtime(params::APP_PROFILE_ID),
            dataflow_max_num_workers: ValueProvider::runtime(params::MAX_NUM_WORKERS),
            input_file: ValueProvider::runtime(params::INPUT_FILE),
            completion_file: ValueProvider::runtime(params::COMPLETION_FILE),
            headers: ValueProvider::runtime(params::HEADERS),
        }
    }

    fn slot(&mut self, name: &str) -> Option<&mut ValueProvider> {
        Some(match name {
            params::PROJECT_ID => &mut self.bigtable_project_id,
            params::INSTANCE_ID => &mut self.bigtable_instance_id,
            params::TABLE_ID => &mut self.bigtable_table_id,
            params::APP_PROFILE_ID => &mut self.bigtable_app_profile_id,
            params::MAX_NUM_WORKERS => &mut self.dataflow_max_num_workers,
            params::INPUT_FILE => &mut self.input_file,
            params::COMPLETION_FILE => &mut self.completion_file,
            params::HEADERS => &mut self.headers,
            _ => return None,
        })
    }

    /// Fix the option named `name` to a static value.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::Configuration`] for an unknown option name.
    pub fn set(&mut self, name: &str, value: impl Into<String>) -> Result<(), ImportError> {
        let slot = self
            .slot(name)
            .ok_or_else(|| ImportError::Configuration(format!("unknown option {name:?}")))?;
        *slot = ValueProvider::Static(value.into());
        Ok(())
    }

    /// Names of the parameters a launch may still supply.
    #[must_use]
    pub fn runtime_parameters(&self) -> Vec<String> {
        [
            &self.bigtable_project_id,
            &self.bigtable_instance_id,
            &self.bigtable_table_id,
            &self.bigtable_app_profile_id,
            &self.dataflow_max_num_workers,
            &self.input_file,
            &self.completion_file,
            &self.headers,
        ]
        .into_iter()
        .filter_map(|v| match v {
            ValueProvider::Runtime { parameter } => Some(parameter.clone()),
            ValueProvider::Static(_) => None,
        })
        .collect()
    }

    /// Supplied parameters that no option reads, because the option they
    /// name was fixed when the template was staged.
    #[must_use]
    pub fn ignored_parameters<'a>(&self, runtime: &'a RuntimeParameters) -> Vec<&'a str> {
        let wanted = self.runtime_parameters();
        runtime
            .names()
            .filter(|name| !wanted.iter().any(|w| w == *name))
            .collect()
    }

    /// Resolve every option against `runtime` and validate the result.
    ///
    /// Optional options that are missing or empty fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ImportError::Configuration`] for a missing required option,
    /// a malformed identifier, a worker count that is not a positive integer,
    /// or an invalid header list.
    pub fn resolve(&self, runtime: &RuntimeParameters) -> Result<ImportConfig, ImportError> {
        for parameter in self.ignored_parameters(runtime) {
            warn!(parameter, "parameter ignored: its option is fixed in the template");
        }
        let project_id = required(&self.bigtable_project_id, params::PROJECT_ID, runtime)?;
        let instance_id = required(&self.bigtable_instance_id, params::INSTANCE_ID, runtime)?;
        let table_id = required(&self.bigtable_table_id, params::TABLE_ID, runtime)?;
        let input = required(&self.input_file, params::INPUT_FILE, runtime)?;
        let completion_file = required(&self.completion_file, params::COMPLETION_FILE, runtime)?;

        check_id(&PROJECT_ID_PATTERN, params::PROJECT_ID, &project_id)?;
        check_id(&RESOURCE_ID_PATTERN, params::INSTANCE_ID, &instance_id)?;
        check_id(&RESOURCE_ID_PATTERN, params::TABLE_ID, &table_id)?;

        let mut table = TableRef::new(project_id, instance_id, table_id);
        if let Some(profile) = optional(&self.bigtable_app_profile_id, runtime) {
            check_id(&RESOURCE_ID_PATTERN, params::APP_PROFILE_ID, &profile)?;
            table = table.with_app_profile(profile);
        }

        let max_workers = optional(&self.dataflow_max_num_workers, runtime)
            .map(|raw| match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => Ok(n),
                _ => Err(ImportError::Configuration(format!(
                    "{} must be a positive integer, got {raw:?}",
                    params::MAX_NUM_WORKERS
                ))),
            })
            .transpose()?;

        let headers =
            optional(&self.headers, runtime).unwrap_or_else(|| DEFAULT_HEADERS.to_string());
        let schema = FieldSchema::parse(&headers)?;

        Ok(ImportConfig {
            table,
            max_workers,
            input,
            completion_file: PathBuf::from(completion_file),
            schema,
        })
    }
}

fn required(
    value: &ValueProvider,
    name: &str,
    runtime: &RuntimeParameters,
) -> Result<String, ImportError> {
    optional(value, runtime)
        .ok_or_else(|| ImportError::Configuration(format!("missing required option {name}")))
}

fn optional(value: &ValueProvider, runtime: &RuntimeParameters) -> Option<String> {
    value.get(runtime).filter(|v| !v.trim().is_empty())
}

fn check_id(pattern: &Regex, name: &str, value: &str) -> Result<(), ImportError> {
    if pattern.is_match(value) {
        Ok(())
    } else {
        Err(ImportError::Configuration(format!(
            "{name} {value:?} is not a valid identifier"
        )))
    }
}

/// Fully resolved configuration of one import run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ImportConfig {
    pub table: TableRef,
    /// Upper bound on concurrent workers; `None` lets the runner decide.
    pub max_workers: Option<usize>,
    /// Input file path or glob pattern, also the completion token's content.
    pub input: String,
    pub completion_file: PathBuf,
    pub schema: FieldSchema,
}

/// Write `options` as a JSON template.
///
/// # Errors
///
/// Returns an error if the template cannot be serialized or written.
pub fn save_template(options: &ImportOptions, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).with_context(|| format!("mkdir -p {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(options).context("serialize template")?;
    fs::write(path, json).with_context(|| format!("write template {}", path.display()))?;
    Ok(())
}

/// Load a template written by [`save_template`].
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a valid template.
pub fn load_template(path: impl AsRef<Path>) -> Result<ImportOptions> {
    let path = path.as_ref();
    let json =
        fs::read_to_string(path).with_context(|| format!("read template {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("parse template {}", path.display()))
}
