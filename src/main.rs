//! optimus CLI entry point

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use optimus_client::client::GrpcClient;
use optimus_client::config::NamespaceConfig;
use optimus_client::{
    ClientConfig, DeployOptions, Deployer, Error, JobSpec, JobSpecReadWriter, OsFs,
    ResourceSpecReadWriter, SpecFs, SpecReadWriter,
};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// optimus - author, validate and deploy Optimus jobs and resources
#[derive(Parser, Debug)]
#[command(name = "optimus")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to optimus.yaml (defaults to ./optimus.yaml, then ~/.optimus/optimus.yaml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print server debug records and tag every record with its level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone, Default)]
struct NamespaceArgs {
    /// Namespaces to operate on (repeatable); all configured namespaces when omitted
    #[arg(short = 'N', long = "namespace")]
    namespaces: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Deploy resources, then jobs, of the selected namespaces
    Deploy {
        #[command(flatten)]
        namespaces: NamespaceArgs,

        /// Skip the job phase
        #[arg(long)]
        ignore_jobs: bool,

        /// Skip the resource phase
        #[arg(long)]
        ignore_resources: bool,
    },

    /// Job specification commands
    #[command(subcommand)]
    Job(JobCommands),

    /// Resource specification commands
    #[command(subcommand)]
    Resource(ResourceCommands),
}

#[derive(Subcommand, Debug)]
enum JobCommands {
    /// List job specs with inherited defaults applied
    #[command(alias = "ls")]
    List {
        #[command(flatten)]
        namespaces: NamespaceArgs,
    },

    /// Print one merged job spec
    Show {
        /// Job name
        name: String,

        #[command(flatten)]
        namespaces: NamespaceArgs,

        /// Print JSON instead of YAML
        #[arg(long)]
        json: bool,
    },

    /// Validate job specs, on the server or locally
    Validate {
        #[command(flatten)]
        namespaces: NamespaceArgs,

        /// Only run the local shape checks, without contacting the server
        #[arg(long)]
        local: bool,
    },

    /// Replace every job of the selected namespaces on the server
    ReplaceAll {
        #[command(flatten)]
        namespaces: NamespaceArgs,
    },

    /// Refresh job dependencies on the server and redeploy
    Refresh {
        #[command(flatten)]
        namespaces: NamespaceArgs,

        /// Jobs to refresh (repeatable)
        #[arg(short, long = "job")]
        jobs: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
enum ResourceCommands {
    /// List resource specs per namespace and datastore
    #[command(alias = "ls")]
    List {
        #[command(flatten)]
        namespaces: NamespaceArgs,
    },

    /// Upload every resource spec of the selected namespaces
    UploadAll {
        #[command(flatten)]
        namespaces: NamespaceArgs,

        /// Resources per request; 0 sends each datastore in one request
        #[arg(long, default_value_t = 0)]
        batch_size: usize,
    },
}

fn init_logger(verbose: bool, config: Option<&ClientConfig>) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        config
            .and_then(ClientConfig::log_level)
            .unwrap_or(log::LevelFilter::Info)
    };
    let level = level.to_string().to_lowercase();
    let filter = format!("warn,optimus={},optimus_client={}", level, level);

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(filter))
        .format(|buf, record| match record.level() {
            log::Level::Info => writeln!(buf, "{}", record.args()),
            level => writeln!(
                buf,
                "{}: {}",
                level.to_string().to_lowercase(),
                record.args()
            ),
        })
        .init();
}

fn spec_fs() -> Arc<dyn SpecFs> {
    Arc::new(OsFs::current_dir())
}

async fn connect(config: ClientConfig, options: DeployOptions) -> Result<Deployer> {
    config.validate()?;
    let client = GrpcClient::connect(&config.host, CONNECT_TIMEOUT)
        .await
        .map_err(Error::from)
        .with_context(|| format!("server [{}] is not reachable", config.host))?;
    let client = Arc::new(client);
    Ok(Deployer::new(config, spec_fs(), client.clone(), client).with_options(options))
}

fn read_namespace_jobs(config: &ClientConfig, namespace: &NamespaceConfig) -> Result<Vec<JobSpec>> {
    let root = config.resolve(&namespace.job.path);
    let reader = JobSpecReadWriter::new(spec_fs()).with_parent_reading(true);
    reader
        .read_all(&root)
        .with_context(|| format!("error getting job specs for namespace [{}]", namespace.name))
}

fn list_jobs(config: &ClientConfig, selection: &NamespaceArgs) -> Result<()> {
    for namespace in config.selected_namespaces(&selection.namespaces)? {
        let jobs = read_namespace_jobs(config, namespace)?;
        println!("{} ({} jobs)", namespace.name, jobs.len());
        for job in jobs {
            println!("  {}\t{}", job.name, job.path.display());
        }
    }
    Ok(())
}

fn show_job(config: &ClientConfig, name: &str, selection: &NamespaceArgs, json: bool) -> Result<()> {
    let fs = spec_fs();
    let reader = JobSpecReadWriter::new(Arc::clone(&fs)).with_parent_reading(true);
    for namespace in config.selected_namespaces(&selection.namespaces)? {
        let root = config.resolve(&namespace.job.path);
        if namespace.job.path.as_os_str().is_empty() || !fs.is_dir(&root) {
            log::debug!("namespace [{}] has no job directory", namespace.name);
            continue;
        }
        match reader.read_by_name(&root, name) {
            Ok(job) => {
                let rendered = if json {
                    serde_json::to_string_pretty(&job)?
                } else {
                    serde_yaml::to_string(&job)?
                };
                println!("# namespace: {}, path: {}", namespace.name, job.path.display());
                println!("{}", rendered.trim_end());
                for asset in job.asset.keys() {
                    println!("# asset: {}", asset);
                }
                return Ok(());
            }
            Err(Error::NotFound { .. }) => continue,
            Err(e) => return Err(e.into()),
        }
    }
    Err(Error::NotFound {
        name: name.to_string(),
    }
    .into())
}

fn validate_local(config: &ClientConfig, selection: &NamespaceArgs) -> Result<()> {
    let mut invalid = 0;
    for namespace in config.selected_namespaces(&selection.namespaces)? {
        for job in read_namespace_jobs(config, namespace)? {
            if let Err(e) = job.validate() {
                invalid += 1;
                log::error!("{}: {}", job.path.display(), e);
            }
        }
    }
    if invalid > 0 {
        anyhow::bail!("{} job specs failed validation", invalid);
    }
    log::info!("Jobs validated successfully");
    Ok(())
}

fn list_resources(config: &ClientConfig, selection: &NamespaceArgs) -> Result<()> {
    let reader = ResourceSpecReadWriter::new(spec_fs());
    for namespace in config.selected_namespaces(&selection.namespaces)? {
        for datastore in &namespace.datastore {
            let resources = reader
                .read_all(&config.resolve(&datastore.path))
                .with_context(|| {
                    format!(
                        "error getting {} resources for namespace [{}]",
                        datastore.datastore_type, namespace.name
                    )
                })?;
            println!(
                "{} / {} ({} resources)",
                namespace.name,
                datastore.datastore_type,
                resources.len()
            );
            for resource in resources {
                println!("  {}\t{}\t{}", resource.name, resource.resource_type, resource.path.display());
            }
        }
    }
    Ok(())
}

async fn run(command: Commands, config: ClientConfig, verbose: bool) -> Result<()> {
    let options = DeployOptions {
        verbose,
        ..Default::default()
    };

    match command {
        Commands::Deploy {
            namespaces,
            ignore_jobs,
            ignore_resources,
        } => {
            let selected: Vec<NamespaceConfig> = config
                .selected_namespaces(&namespaces.namespaces)?
                .into_iter()
                .cloned()
                .collect();
            log::info!(
                "Deploying project [{}] to [{}]",
                config.project.name,
                config.host
            );
            let deployer = connect(
                config,
                DeployOptions {
                    ignore_jobs,
                    ignore_resources,
                    ..options
                },
            )
            .await?;
            let selected: Vec<&NamespaceConfig> = selected.iter().collect();
            deployer.deploy(&selected).await?;
        }

        Commands::Job(JobCommands::List { namespaces }) => list_jobs(&config, &namespaces)?,
        Commands::Job(JobCommands::Show {
            name,
            namespaces,
            json,
        }) => show_job(&config, &name, &namespaces, json)?,
        Commands::Job(JobCommands::Validate { namespaces, local }) => {
            if local {
                validate_local(&config, &namespaces)?;
            } else {
                let selected: Vec<NamespaceConfig> = config
                    .selected_namespaces(&namespaces.namespaces)?
                    .into_iter()
                    .cloned()
                    .collect();
                let deployer = connect(config, options).await?;
                for namespace in &selected {
                    deployer.check_jobs(namespace).await?;
                }
            }
        }
        Commands::Job(JobCommands::ReplaceAll { namespaces }) => {
            let selected: Vec<NamespaceConfig> = config
                .selected_namespaces(&namespaces.namespaces)?
                .into_iter()
                .cloned()
                .collect();
            let deployer = connect(config, options).await?;
            let selected: Vec<&NamespaceConfig> = selected.iter().collect();
            deployer.replace_all_jobs(&selected).await?;
        }
        Commands::Job(JobCommands::Refresh { namespaces, jobs }) => {
            config.selected_namespaces(&namespaces.namespaces)?;
            let deployer = connect(config, options).await?;
            deployer.refresh_jobs(&namespaces.namespaces, &jobs).await?;
        }

        Commands::Resource(ResourceCommands::List { namespaces }) => {
            list_resources(&config, &namespaces)?
        }
        Commands::Resource(ResourceCommands::UploadAll {
            namespaces,
            batch_size,
        }) => {
            let selected: Vec<NamespaceConfig> = config
                .selected_namespaces(&namespaces.namespaces)?
                .into_iter()
                .cloned()
                .collect();
            let deployer = connect(
                config,
                DeployOptions {
                    batch_size,
                    ..options
                },
            )
            .await?;
            let selected: Vec<&NamespaceConfig> = selected.iter().collect();
            deployer.deploy_resources(&selected).await?;
            log::info!("finished uploading resource specifications to server!");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = ClientConfig::discover(cli.config.as_deref());
    init_logger(cli.verbose, config.as_ref().ok());

    let config = match config {
        Ok(config) => config,
        Err(e) => {
            log::error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let result = tokio::select! {
        result = run(cli.command, config, cli.verbose) => result,
        _ = tokio::signal::ctrl_c() => Err(Error::Cancelled.into()),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            log::error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}
