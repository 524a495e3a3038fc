// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    clap::{Arg, ArgMatches, Command},
    gentoo_packaging::{
        archive::{ExtractRequest, ExtractorRegistry},
        binhost_index::BinhostIndex,
        error::GentooError,
        gpkg::{GpkgReader, GpkgReaderConfig, PackageBundle},
        record::ColonRecord,
    },
    log::{warn, LevelFilter},
    std::{
        ffi::OsStr,
        io::{BufReader, Write},
        path::Path,
    },
    thiserror::Error,
};

const CONFIG_ABOUT: &str = "\
# YAML Configuration

Commands reading gpkg files accept a `--config` argument pointing to a YAML
file with the following keys:

scratch_dir (optional) (string)
   Directory in which packages are unpacked. Each package gets its own
   sub-directory. Defaults to the system temporary directory.

scratch_prefix (optional) (string)
   Prefix of the per-package sub-directory names. Defaults to `gpkg-`.
";

const GPKG_INFO_ABOUT: &str = "\
Print information about a gpkg binary package.

The package is unpacked and validated: it must contain a `gpkg-1` marker,
a `Manifest` and `image` and `metadata` archives compressed with gzip,
bzip2 or xz. Build metadata is decoded and printed.

The unpacked package is removed afterwards unless `--keep` is given, in
which case its location is printed.
";

const INDEX_CHECK_ABOUT: &str = "\
Parse and validate a binhost `Packages` index.

Every field in the index must be known. The `PACKAGES` count in the header
is compared against the number of package entries.

With `--rewrite`, the index is written to stdout in canonical form: fields
in a fixed order and fields with empty or zero values omitted.
";

#[derive(Debug, Error)]
pub enum BhtError {
    #[error("argument parsing error: {0:?}")]
    Clap(#[from] clap::Error),

    #[error("{0}")]
    Gentoo(#[from] GentooError),

    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0:?}")]
    SerdeYaml(#[from] serde_yaml::Error),

    #[error("invalid sub-command: {0}")]
    InvalidSubCommand(String),
}

pub type Result<T> = std::result::Result<T, BhtError>;

pub fn run_cli() -> Result<()> {
    let app = Command::new("Binhost Tool")
        .version("0.1")
        .about("Interface with Gentoo binary packages and binhosts")
        .arg_required_else_help(true)
        .arg(
            Arg::new("verbose")
                .long("verbose")
                .short('v')
                .global(true)
                .multiple_occurrences(true)
                .help("Increase logging verbosity. Can be specified multiple times."),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .takes_value(true)
                .global(true)
                .allow_invalid_utf8(true)
                .help("Path to a YAML file configuring gpkg reading"),
        );

    let app = app.subcommand(
        Command::new("extract")
            .about("Extract a tar archive to a directory")
            .arg(
                Arg::new("extension")
                    .long("extension")
                    .takes_value(true)
                    .help("Archive extension (e.g. tar.gz). Required when reading stdin"),
            )
            .arg(
                Arg::new("archive")
                    .required(true)
                    .allow_invalid_utf8(true)
                    .help("Path of archive to extract, or - for stdin"),
            )
            .arg(
                Arg::new("destination")
                    .required(true)
                    .allow_invalid_utf8(true)
                    .help("Directory to extract into"),
            ),
    );

    let app = app.subcommand(
        Command::new("gpkg-info")
            .about("Print information about a gpkg binary package")
            .long_about(GPKG_INFO_ABOUT)
            .arg(
                Arg::new("keep")
                    .long("keep")
                    .help("Do not remove the unpacked package"),
            )
            .arg(
                Arg::new("path")
                    .required(true)
                    .allow_invalid_utf8(true)
                    .help("Path of gpkg to read, or - for stdin"),
            ),
    );

    let app = app.subcommand(
        Command::new("gpkg-index-entry")
            .about("Print the Packages index entry describing a gpkg")
            .arg(
                Arg::new("index_path")
                    .long("path")
                    .takes_value(true)
                    .help("Value of PATH in the entry. Defaults to the file name of the gpkg"),
            )
            .arg(
                Arg::new("path")
                    .required(true)
                    .allow_invalid_utf8(true)
                    .help("Path of gpkg to read"),
            ),
    );

    let app = app.subcommand(
        Command::new("index-check")
            .about("Validate a binhost Packages index")
            .long_about(INDEX_CHECK_ABOUT)
            .arg(
                Arg::new("rewrite")
                    .long("rewrite")
                    .help("Write the index to stdout in canonical form"),
            )
            .arg(
                Arg::new("path")
                    .required(true)
                    .allow_invalid_utf8(true)
                    .help("Path of Packages file to read, or - for stdin"),
            ),
    );

    let mut app =
        app.subcommand(Command::new("config").about("Print documentation about YAML configuration"));

    let matches = app.clone().get_matches();

    let log_level = match matches.occurrences_of("verbose") {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(log_level.as_str()),
    );

    // Disable log context except at higher log levels.
    if log_level <= LevelFilter::Info {
        builder
            .format_timestamp(None)
            .format_level(false)
            .format_target(false);
    }

    builder.init();

    let registry = ExtractorRegistry::default();

    match matches.subcommand() {
        Some(("extract", args)) => command_extract(&registry, args),
        Some(("gpkg-info", args)) => command_gpkg_info(&registry, args),
        Some(("gpkg-index-entry", args)) => command_gpkg_index_entry(&registry, args),
        Some(("index-check", args)) => command_index_check(args),
        Some(("config", _)) => {
            println!("{}", CONFIG_ABOUT);
            Ok(())
        }
        Some((command, _)) => Err(BhtError::InvalidSubCommand(command.to_string())),
        None => {
            app.print_help()?;
            Ok(())
        }
    }
}

fn reader_config(args: &ArgMatches) -> Result<GpkgReaderConfig> {
    Ok(match args.value_of_os("config") {
        Some(path) => {
            let f = std::fs::File::open(path)?;
            serde_yaml::from_reader(f)?
        }
        None => GpkgReaderConfig::default(),
    })
}

fn read_gpkg(
    registry: &ExtractorRegistry,
    args: &ArgMatches,
    path: &OsStr,
) -> Result<PackageBundle> {
    let reader = GpkgReader::with_config(registry, reader_config(args)?);

    Ok(if path == "-" {
        reader.read(std::io::stdin().lock())?
    } else {
        reader.read_path(path)?
    })
}

fn command_extract(registry: &ExtractorRegistry, args: &ArgMatches) -> Result<()> {
    let archive = args
        .value_of_os("archive")
        .expect("archive argument is required");
    let destination = args
        .value_of_os("destination")
        .expect("destination argument is required");

    if archive == "-" {
        let stdin = std::io::stdin();
        let mut reader = stdin.lock();

        let mut request = ExtractRequest::new(destination).reader(&mut reader);
        if let Some(extension) = args.value_of("extension") {
            request = request.extension(extension);
        }

        registry.extract(request)?;
    } else {
        let mut request = ExtractRequest::from_path(archive, destination);
        if let Some(extension) = args.value_of("extension") {
            request = request.extension(extension);
        }

        registry.extract(request)?;
    }

    Ok(())
}

fn command_gpkg_info(registry: &ExtractorRegistry, args: &ArgMatches) -> Result<()> {
    let path = args.value_of_os("path").expect("path argument is required");
    let bundle = read_gpkg(registry, args, path)?;
    let metadata = bundle.metadata();

    println!("CPV: {}", bundle.cpv());
    println!("Name: {}", bundle.name());
    println!("Version: {}", bundle.version());
    println!("Slot: {}", metadata.slot);
    println!("Repository: {}", bundle.repository());
    println!("EAPI: {}", metadata.eapi);
    println!("Description: {}", metadata.description);
    println!("Keywords: {}", metadata.keywords.join(" "));
    println!("License: {}", metadata.license.join(" "));
    println!("USE: {}", metadata.use_flags.join(" "));
    println!("Size: {}", bundle.size());
    println!("MD5: {}", bundle.md5().digest_hex());
    println!("SHA1: {}", bundle.sha1().digest_hex());

    if args.is_present("keep") {
        println!("Unpacked to: {}", bundle.root().display());
    } else {
        bundle.delete()?;
    }

    Ok(())
}

fn command_gpkg_index_entry(registry: &ExtractorRegistry, args: &ArgMatches) -> Result<()> {
    let path = Path::new(args.value_of_os("path").expect("path argument is required"));
    let bundle = read_gpkg(registry, args, path.as_os_str())?;

    let mut package = bundle.to_index_package();
    bundle.delete()?;

    package.path = match args.value_of("index_path") {
        Some(value) => value.to_string(),
        None => path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default(),
    };
    package.mtime = std::fs::metadata(path)?
        .modified()?
        .duration_since(std::time::UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or_default();

    let stdout = std::io::stdout();
    package.write_colon(&mut stdout.lock())?;

    Ok(())
}

fn command_index_check(args: &ArgMatches) -> Result<()> {
    let path = args.value_of_os("path").expect("path argument is required");

    let index = if path == "-" {
        BinhostIndex::parse_reader(std::io::stdin().lock())?
    } else {
        BinhostIndex::parse_reader(BufReader::new(std::fs::File::open(path)?))?
    };

    let index = match index {
        Some(index) => index,
        None => {
            warn!("index is empty");
            return Ok(());
        }
    };

    if index.header.packages != index.packages.len() as u64 {
        warn!(
            "header advertises {} packages; found {}",
            index.header.packages,
            index.packages.len()
        );
    }

    if args.is_present("rewrite") {
        let stdout = std::io::stdout();
        let mut writer = stdout.lock();
        index.write(&mut writer)?;
        writer.flush()?;
    } else {
        for package in &index.packages {
            println!("{}", package.cpv);
        }
        println!("{} packages", index.packages.len());
    }

    Ok(())
}
