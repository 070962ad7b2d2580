//! h5view CLI
//!
//! Prints the structure of an HDF5 file (or a JSON snapshot) in text mode.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Parser};
use h5view::fixture::{self, DEMO_FILENAME};
use h5view::{Backend, File, Resolved, Selection, SnapshotBackend};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "h5view")]
#[command(author, version, about = "Text-mode viewer for HDF5 files", long_about = None)]
struct Cli {
    /// File to open; `.json` files are read as snapshots
    #[arg(default_value = DEMO_FILENAME)]
    file: PathBuf,

    /// Show a single item or attribute, e.g. `MyGroup2/MyDataset1`
    #[arg(short, long)]
    path: Option<String>,

    /// Index expression applied to the dataset given by --path, e.g. `2:4, 3:5`
    #[arg(short, long, requires = "path")]
    slice: Option<String>,

    /// List every entry with its kind, shape and type
    #[arg(short, long)]
    list: bool,

    /// Use the built-in demo file and walk through it
    #[arg(long)]
    demo: bool,

    /// More logging (-v debug, -vv trace); RUST_LOG takes precedence
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = if cli.demo || (cli.file == Path::new(DEMO_FILENAME) && !cli.file.exists()) {
        tracing::info!("using the built-in demo file");
        fixture::demo_backend().and_then(|backend| run(backend, &cli))
    } else if cli.file.extension().is_some_and(|ext| ext == "json") {
        run(SnapshotBackend, &cli)
    } else {
        open_native(&cli)
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(feature = "hdf5")]
fn open_native(cli: &Cli) -> h5view::Result<ExitCode> {
    run(h5view::Hdf5Backend, cli)
}

#[cfg(not(feature = "hdf5"))]
fn open_native(cli: &Cli) -> h5view::Result<ExitCode> {
    eprintln!(
        "Error: {} is not a JSON snapshot and this build has no HDF5 support \
         (rebuild with --features hdf5)",
        cli.file.display()
    );
    Ok(ExitCode::FAILURE)
}

fn run<B: Backend>(backend: B, cli: &Cli) -> h5view::Result<ExitCode> {
    let name = if cli.demo {
        Path::new(DEMO_FILENAME)
    } else {
        cli.file.as_path()
    };
    let file = File::new(backend, Some(name))?;
    file.scope(|f| {
        if cli.list {
            for info in f.item_infos() {
                println!("{info}");
            }
            return Ok(ExitCode::SUCCESS);
        }
        if let Some(path) = &cli.path {
            return show_member(f, path, cli.slice.as_deref());
        }
        if cli.demo {
            walkthrough(f)?;
        } else {
            println!("{f}");
        }
        Ok(ExitCode::SUCCESS)
    })
}

fn show_member<B: Backend>(
    f: &File<B>,
    path: &str,
    slice: Option<&str>,
) -> h5view::Result<ExitCode> {
    let Some(found) = f.member(path)? else {
        eprintln!("{path}: no such item or attribute");
        return Ok(ExitCode::FAILURE);
    };
    match (slice, found) {
        (Some(expr), Resolved::Item(item)) => {
            let selection: Selection = expr.parse()?;
            match item.read(&selection)? {
                Some(data) => println!("{data}"),
                None => {
                    eprintln!("{path} is a group and cannot be indexed");
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
        (Some(_), _) => {
            eprintln!("{path} is an attribute and cannot be indexed");
            return Ok(ExitCode::FAILURE);
        }
        (None, found) => println!("{found}"),
    }
    Ok(ExitCode::SUCCESS)
}

fn walkthrough<B: Backend>(f: &File<B>) -> h5view::Result<()> {
    println!("Let's display the file.");
    println!("{f}");
    println!();
    println!("Now, let's access some attributes, groups, and datasets.");

    let root = f.root()?;
    if let Some(attr) = root.get("MyAttr")? {
        println!("{attr}");
    }
    if let Some(group) = root.get("MyGroup2")? {
        println!("{group}");
    }
    if let Some(ds) = root.get("MyGroup2/MyDataset1")?.and_then(Resolved::into_item) {
        if let Some(block) = ds.read(&Selection::from([2..4, 3..5]))? {
            println!("{block}");
        }
    }
    let nested = root
        .get("MyGroup1/MyGroup11")?
        .and_then(Resolved::into_item);
    if let Some(g11) = nested {
        if let Some(ds) = g11.get("MyGroup111/MyDataset2")?.and_then(Resolved::into_item) {
            let selection: Selection = "0, 0, 0, 1:3".parse()?;
            if let Some(row) = ds.read(&selection)? {
                println!("{row}");
            }
        }
    }
    Ok(())
}
