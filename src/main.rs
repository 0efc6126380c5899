use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use log::{info, warn};

use crate::namespace::PlatformNamespace;
use crate::request::message::{self, Message};
use crate::request::read::get_message_paths;
use crate::request::schema::load_schema;
use crate::request::{validate_out_dir, DownsampleDirective, DownsampleRequest};
use crate::stage::DownsampleStage;
use crate::storage::locator::RemoteRoot;
use crate::storage::publish::Publisher;
use crate::storage::read_file::ReadFile;
use crate::workflow::manifest::RunManifest;
use crate::workflow::metadata::workflow_metadata;

mod namespace;
mod request;
mod stage;
mod storage;
mod workflow;

/// Downsample paired-end reads with bbmap reformat and publish them under downsampled/
#[derive(Parser, Debug)]
#[command(name = "downsample", version)]
struct Args {
    /// Each invocation runs in <WORK_DIR>/<out dir>
    #[arg(long, global = true, value_name = "DIR", default_value = "downsample_work")]
    work_dir: PathBuf,

    /// Deployment namespace, picks the default remote root
    #[arg(long, global = true, value_enum, default_value_t = PlatformNamespace::Dev)]
    namespace: PlatformNamespace,

    /// Publish under this remote root instead of the namespace bucket, e.g. s3://bucket/prefix
    #[arg(long, global = true, value_name = "URL")]
    remote_root: Option<String>,

    /// reformat executable
    #[arg(long, global = true, env = "REFORMAT_BIN", default_value = "reformat")]
    reformat: PathBuf,

    /// Upload outputs to their remote locators (s3:// roots only)
    #[arg(long, global = true)]
    publish: bool,

    /// S3 compatible endpoint to publish to instead of AWS
    #[arg(long, global = true, env = "S3_ENDPOINT", value_name = "URL")]
    s3_endpoint: Option<String>,

    /// Validate and print the reformat command without running it
    #[arg(long, global = true)]
    dry_run: bool,

    /// Clear an existing working directory instead of refusing to run
    #[arg(long, global = true)]
    overwrite: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Downsample one pair of mates
    Run {
        /// read 1, either fasta or fastq
        #[arg(long)]
        r1: PathBuf,
        /// read 2, either fasta or fastq
        #[arg(long)]
        r2: PathBuf,
        /// name of subdir in downsampled/
        #[arg(long)]
        out_dir: String,
        #[command(flatten)]
        directive: DirectiveArgs,
    },
    /// Run a JSON request message, or every message in a directory
    Launch {
        #[arg(required_unless_present = "test_data")]
        message: Option<PathBuf>,
        /// Run the bundled "Test Data" launch plan
        #[arg(long, conflicts_with = "message")]
        test_data: bool,
    },
    /// Print the workflow metadata and parameters
    Describe,
}

#[derive(clap::Args, Debug)]
#[group(required = true, multiple = false)]
struct DirectiveArgs {
    /// exact number of OUTPUT reads (or pairs) desired
    #[arg(long)]
    out_reads: Option<u64>,
    /// fraction of input reads to retain, in (0, 1]
    #[arg(long)]
    sample_rate: Option<f64>,
}

impl DirectiveArgs {
    fn directive(&self) -> Result<DownsampleDirective> {
        match (self.out_reads, self.sample_rate) {
            (Some(n), None) => Ok(DownsampleDirective::TargetCount(n)),
            (None, Some(f)) => Ok(DownsampleDirective::TargetFraction(f)),
            _ => bail!("Set exactly one of --out-reads or --sample-rate"),
        }
    }
}

/// A directory that one stage invocation owns
pub struct WorkingDirectory {
    pub path: PathBuf,
}

impl WorkingDirectory {
    /// Reserve `<root>/<out_dir>`, refusing to reuse a non-empty directory unless overwriting
    fn for_invocation(root: &Path, out_dir: &str, overwrite: bool, dry_run: bool) -> Result<WorkingDirectory> {
        validate_out_dir(out_dir)?;
        let path = root.join(out_dir);
        if path == root || !path.starts_with(root) {
            bail!("Working directory {} is not below {}", path.display(), root.display());
        }
        let occupied = path.is_dir()
            && fs::read_dir(&path)
                .with_context(|| format!("Read {}", path.display()))?
                .next()
                .is_some();

        if occupied {
            match (overwrite, dry_run) {
                (false, _) => bail!(
                    "Working directory {} is not empty, use a different out dir or --overwrite",
                    path.display()
                ),
                (true, true) => warn!("--dry-run set, not clearing {}", path.display()),
                (true, false) => {
                    warn!("Working directory already exists, files will be overwritten");
                    fs::remove_dir_all(&path).with_context(|| format!("Delete {}", path.display()))?;
                }
            }
        }

        Ok(WorkingDirectory { path })
    }
}

fn main() -> Result<()> {
    env_logger::init();
    info!("terve! starting up :)");
    let args = Args::parse();

    let requests = match &args.command {
        Commands::Describe => {
            print!("{}", workflow_metadata().render()?);
            return Ok(());
        }
        Commands::Run { r1, r2, out_dir, directive } => {
            vec![DownsampleRequest::new(r1.clone(), r2.clone(), out_dir.clone(), directive.directive()?)]
        }
        Commands::Launch { message, test_data } => read_requests(message.as_deref(), *test_data)?,
    };

    let remote_root = match &args.remote_root {
        Some(root) => RemoteRoot::parse(root).with_context(|| format!("Invalid remote root {root}"))?,
        None => args.namespace.default_root(),
    };
    info!("Remote root is {remote_root} ({} namespace)", args.namespace);
    if args.publish && remote_root.scheme() != "s3" {
        bail!("--publish needs an s3:// remote root, got {remote_root}");
    }

    run_requests(&args, &remote_root, &requests)
}

/// Run every request in its own working directory, carrying on past failures
fn run_requests(args: &Args, remote_root: &RemoteRoot, requests: &[DownsampleRequest]) -> Result<()> {
    check_distinct_out_dirs(requests)?;

    let mut failed = 0;
    for request in requests {
        if let Err(err) = run_request(args, remote_root, request) {
            warn!("Request for out dir {} failed: {err:#}", request.out_dir);
            failed += 1;
        }
    }

    match failed {
        0 => Ok(()),
        _ if requests.len() == 1 => bail!("Downsampling failed"),
        _ => bail!("{failed} of {} requests failed", requests.len()),
    }
}

/// Two requests in one launch can't share a working directory or nest one inside the other
fn check_distinct_out_dirs(requests: &[DownsampleRequest]) -> Result<()> {
    for (i, a) in requests.iter().enumerate() {
        for b in &requests[i + 1..] {
            let (a, b) = (Path::new(&a.out_dir), Path::new(&b.out_dir));
            if a.starts_with(b) || b.starts_with(a) {
                bail!("Out dirs {} and {} overlap, each request needs its own", a.display(), b.display());
            }
        }
    }
    Ok(())
}

fn read_requests(source: Option<&Path>, test_data: bool) -> Result<Vec<DownsampleRequest>> {
    let schema = load_schema()?;
    if test_data {
        return Ok(vec![message::test_data(&schema)?]);
    }

    let path = source.context("No request message given")?;
    let paths = match path.is_dir() {
        true => get_message_paths(path).with_context(|| format!("List messages in {}", path.display()))?,
        false => vec![path.to_path_buf()],
    };
    if paths.is_empty() {
        bail!("No JSON request messages in {}", path.display());
    }

    let mut requests = Vec::new();
    for path in paths {
        let message = Message { path, compiled_schema: &schema };
        let request = message
            .read()
            .with_context(|| format!("Invalid request message {}", message.path.display()))?;
        requests.push(request);
    }
    Ok(requests)
}

fn run_request(args: &Args, remote_root: &RemoteRoot, request: &DownsampleRequest) -> Result<()> {
    if let Some(name) = &request.name {
        info!("Launching {name}");
    }
    // validate before the out dir is joined onto the work root
    request.validate()?;

    let wd = WorkingDirectory::for_invocation(&args.work_dir, &request.out_dir, args.overwrite, args.dry_run)?;
    let stage = DownsampleStage { tool: args.reformat.clone(), wd, remote_root: remote_root.clone() };
    let invocation = stage.plan(request)?;

    if args.dry_run {
        info!("--dry-run set, not running reformat");
        println!("{} {}", invocation.command.tool.display(), invocation.command.display_args().join(" "));
        return Ok(());
    }

    let (r1, r2) = stage.execute(&invocation)?;
    RunManifest::new(request, &invocation.command, &r1, &r2).write(&stage.wd.path)?;

    if args.publish {
        publish(args.s3_endpoint.as_deref(), [&r1, &r2])?;
    }

    for file in [&r1, &r2] {
        if let Some(remote) = &file.remote {
            println!("{}\t{}", file.local_path.display(), remote);
        }
    }
    Ok(())
}

fn publish(endpoint: Option<&str>, files: [&ReadFile; 2]) -> Result<()> {
    let runtime = tokio::runtime::Runtime::new().context("Start tokio runtime")?;
    runtime.block_on(async {
        let publisher = Publisher::new(endpoint)?;
        for file in files {
            publisher.publish(file).await?;
        }
        Ok::<(), anyhow::Error>(())
    })
}
