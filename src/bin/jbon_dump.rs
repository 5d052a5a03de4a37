//! JBON Dump - print isi feature file
//!
//! Usage:
//!   cargo run --release --bin jbon_dump -- --file features.jbon [OPTIONS]

use std::fs::File;
use std::sync::Arc;

use memmap2::Mmap;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use jbon::core::FeatureIter;
use jbon::{DictionaryStore, FeatureFile, JbDict, JbDictManager, JbFeature};

/// Dump configuration
struct DumpConfig {
    file: String,
    dictionaries: Vec<String>,
    raw: bool,
    verbose: bool,
}

impl Default for DumpConfig {
    fn default() -> Self {
        Self {
            file: "features.jbon".to_string(),
            dictionaries: Vec::new(),
            raw: false,
            verbose: false,
        }
    }
}

fn parse_args() -> DumpConfig {
    let args: Vec<String> = std::env::args().collect();
    let mut config = DumpConfig::default();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--file" | "-f" => {
                if i + 1 < args.len() {
                    config.file = args[i + 1].clone();
                    i += 1;
                }
            }
            "--dict" | "-d" => {
                if i + 1 < args.len() {
                    config.dictionaries.push(args[i + 1].clone());
                    i += 1;
                }
            }
            "--raw" => {
                config.raw = true;
            }
            "--verbose" | "-v" => {
                config.verbose = true;
            }
            "--help" | "-h" => {
                println!("JBON Dump - print features stored in a file\n");
                println!("Usage: jbon_dump [OPTIONS]\n");
                println!("Options:");
                println!("  -f, --file <PATH>     Feature file (default: features.jbon)");
                println!("  -d, --dict <PATH>     Global dictionary file, repeatable");
                println!("      --raw             File is plain concatenated features");
                println!("  -v, --verbose         Print local dictionaries");
                println!("  -h, --help            Show this help");
                std::process::exit(0);
            }
            _ => {}
        }
        i += 1;
    }

    config
}

fn load_dictionaries(config: &DumpConfig) -> Result<JbDictManager, Box<dyn std::error::Error>> {
    let store = JbDictManager::new();
    for path in &config.dictionaries {
        let bytes = std::fs::read(path)?;
        let dict = JbDict::from_bytes(&bytes)?;
        info!(path = %path, dict_id = dict.id().unwrap_or("<none>"), entries = dict.len(), "loaded dictionary");
        store.put(Arc::new(dict))?;
    }
    Ok(store)
}

fn dump(buf: &[u8], store: &JbDictManager, verbose: bool) -> Result<usize, Box<dyn std::error::Error>> {
    let mut count = 0;
    for item in FeatureIter::new(buf) {
        let (offset, bytes) = item?;
        let feature = JbFeature::parse(bytes, Some(store as &dyn DictionaryStore))?;
        println!(
            "@{offset} id={} global={} type={} size={}",
            feature.id().unwrap_or("-"),
            feature.global_dict_id().unwrap_or("-"),
            feature.feature_type()?,
            feature.size()
        );
        if verbose {
            let entries: Vec<&str> = feature.local_dictionary().iter().collect();
            println!("  local: {entries:?}");
        }
        match feature.to_value() {
            Ok(value) => println!("  {value}"),
            Err(e) => {
                warn!(offset, error = %e, "cannot decode feature content");
                println!("  <{e}>");
            }
        }
        count += 1;
    }
    Ok(count)
}

fn run(config: DumpConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = load_dictionaries(&config)?;
    let count = if config.raw {
        let file = File::open(&config.file)?;
        // SAFETY: file hanya dibaca; tool ini tidak berjalan bersamaan dengan writer
        let mmap = unsafe { Mmap::map(&file)? };
        dump(&mmap, &store, config.verbose)?
    } else {
        let file = FeatureFile::open_read(&config.file)?;
        dump(file.data(), &store, config.verbose)?
    };
    info!(file = %config.file, features = count, "dump complete");
    Ok(())
}

fn main() {
    let config = parse_args();

    let default_level = if config.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(config) {
        eprintln!("❌ Dump error: {}", e);
        std::process::exit(1);
    }
}
