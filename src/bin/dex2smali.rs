//! Command-line front end: disassemble a DEX file into a directory of
//! .smali files, one class per file, rendered in parallel.

use std::error::Error;
use std::fs;
use std::path::PathBuf;
use std::process;

use log::{error, info, warn};
use pico_args::Arguments;
use rayon::prelude::*;
use simple_logger::SimpleLogger;

use dexsmali::smali_write::{write_class_with, PathAllocator, WriteOptions};
use dexsmali::DexFile;

struct Cli
{
    input: PathBuf,
    output: PathBuf,
    jobs: Option<usize>,
    debug_info: bool,
    verbose: bool,
}

fn print_help()
{
    println!("dex2smali {}", env!("CARGO_PKG_VERSION"));
    println!("Disassemble an Android DEX file into smali");
    println!();
    println!("USAGE:");
    println!("    dex2smali [OPTIONS] <FILE>");
    println!();
    println!("OPTIONS:");
    println!("    -h, --help             Print help information");
    println!("    -o, --output <DIR>     Output directory (default: out)");
    println!("    -j, --jobs <N>         Worker threads (default: all cores)");
    println!("        --no-debug-info    Omit .line/.local debug directives");
    println!("        --verbose          Log each generated file");
}

fn parse_args() -> Result<Cli, Box<dyn Error>>
{
    let mut args = Arguments::from_env();

    if args.contains(["-h", "--help"])
    {
        print_help();
        process::exit(0);
    }

    let output: PathBuf = args
        .opt_value_from_str(["-o", "--output"])?
        .unwrap_or_else(|| PathBuf::from("out"));
    let jobs: Option<usize> = args.opt_value_from_str(["-j", "--jobs"])?;
    let debug_info = !args.contains("--no-debug-info");
    let verbose = args.contains("--verbose");

    let rest = args.finish();
    let input = match rest.first()
    {
        Some(p) => PathBuf::from(p),
        None => {
            eprintln!("Error: a DEX file must be provided");
            print_help();
            process::exit(1);
        }
    };

    Ok(Cli { input, output, jobs, debug_info, verbose })
}

fn run(cli: &Cli) -> Result<(), Box<dyn Error>>
{
    let bytes = fs::read(&cli.input)
        .map_err(|e| format!("error opening file {}: {}", cli.input.display(), e))?;

    let dex = DexFile::from_bytes(bytes)?;
    info!("loaded DEX with {} classes", dex.classes().len());

    if let Some(jobs) = cli.jobs
    {
        rayon::ThreadPoolBuilder::new().num_threads(jobs).build_global()?;
    }

    fs::create_dir_all(&cli.output)?;

    let options = WriteOptions { debug_info: cli.debug_info, ..WriteOptions::default() };
    let paths = PathAllocator::new();

    let failures: usize = dex
        .classes()
        .par_iter()
        .map(|class| {
            let relative = paths.allocate(&class.name);
            let text = write_class_with(class, &options);

            let mut path = cli.output.clone();
            for segment in relative.split('/')
            {
                path.push(segment);
            }
            if let Some(parent) = path.parent()
            {
                if let Err(e) = fs::create_dir_all(parent)
                {
                    warn!("cannot create {}: {}", parent.display(), e);
                    return 1usize;
                }
            }
            match fs::write(&path, text)
            {
                Ok(()) => {
                    if cli.verbose
                    {
                        info!("generated {}", relative);
                    }
                    0
                }
                Err(e) => {
                    warn!("cannot write {}: {}", path.display(), e);
                    1
                }
            }
        })
        .sum();

    if failures > 0
    {
        Err(format!("{} classes failed to write", failures).into())
    }
    else
    {
        info!("wrote {} classes to {}", dex.classes().len(), cli.output.display());
        Ok(())
    }
}

fn main()
{
    SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .init()
        .expect("logger");

    match parse_args()
    {
        Ok(cli) => {
            if let Err(e) = run(&cli)
            {
                error!("{}", e);
                process::exit(1);
            }
        }
        Err(e) => {
            error!("{}", e);
            process::exit(1);
        }
    }
}
