use anyhow::{Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use log::debug;
use std::process::ExitCode;
use treeshape::{
    resolve_location, EngineConfig, OverlapPolicy, SchemaImporter, Severity, TreeshapeError,
    ValidationEngine, ValidatorRegistry,
};

const EXIT_VIOLATIONS: u8 = 1;
const EXIT_ERROR: u8 = 2;

fn cli() -> Command {
    Command::new("treeshape")
        .version(treeshape::VERSION)
        .about("Validate directory trees against declarative layout schemas")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("validate")
                .about("Check a dataset location against a schema")
                .arg(
                    Arg::new("schema")
                        .value_name("SCHEMA")
                        .help("Schema file (.yaml, .yml or .json)")
                        .required(true),
                )
                .arg(
                    Arg::new("dataset")
                        .value_name("LOCATION")
                        .help("Dataset root: a local path, file://path or listing://dump.txt#prefix")
                        .required(true),
                )
                .arg(
                    Arg::new("format")
                        .short('f')
                        .long("format")
                        .value_name("FORMAT")
                        .help("Report format")
                        .value_parser(["text", "json"])
                        .default_value("text"),
                )
                .arg(
                    Arg::new("parallel")
                        .short('p')
                        .long("parallel")
                        .help("Walk sibling subdirectories concurrently")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("unexpected-as-warning")
                        .long("unexpected-as-warning")
                        .help("Report entries not described by the schema as warnings")
                        .action(ArgAction::SetTrue),
                )
                .arg(
                    Arg::new("literal-first")
                        .long("literal-first")
                        .help("Let literal-named schema entries claim before pattern entries")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(
            Command::new("describe")
                .about("Print the tree a schema file describes")
                .arg(
                    Arg::new("schema")
                        .value_name("SCHEMA")
                        .help("Schema file (.yaml, .yml or .json)")
                        .required(true),
                ),
        )
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::init();

    let matches = cli().get_matches();
    let outcome = match matches.subcommand() {
        Some(("validate", args)) => validate(args).await,
        Some(("describe", args)) => describe(args).await,
        _ => unreachable!("clap enforces a subcommand"),
    };

    match outcome {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {:#}", err);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

async fn load_schema(registry: &ValidatorRegistry, path: &str) -> Result<treeshape::Schema> {
    SchemaImporter::new(registry)
        .from_file(path)
        .await
        .with_context(|| format!("failed to load schema {}", path))
}

async fn validate(args: &ArgMatches) -> Result<ExitCode> {
    let schema_path = args.get_one::<String>("schema").context("missing schema argument")?;
    let dataset = args.get_one::<String>("dataset").context("missing dataset argument")?;
    let format = args.get_one::<String>("format").map(String::as_str).unwrap_or("text");

    let registry = ValidatorRegistry::with_builtins();
    let schema = load_schema(&registry, schema_path).await?;

    let mut config = if args.get_flag("parallel") {
        EngineConfig::parallel()
    } else {
        EngineConfig::strict()
    };
    if args.get_flag("unexpected-as-warning") {
        config.unexpected_entry_severity = Severity::Warning;
    }
    if args.get_flag("literal-first") {
        config.overlap_policy = OverlapPolicy::LiteralFirst;
    }
    config.validate().map_err(TreeshapeError::Config)?;
    debug!("Engine configuration: {:?}", config);

    let (fs, root) = resolve_location(dataset)
        .await
        .with_context(|| format!("cannot open dataset location {}", dataset))?;

    let report = ValidationEngine::new(fs)
        .with_config(config)
        .validate(&schema, &root)
        .await;

    match format {
        "json" => println!("{}", serde_json::to_string_pretty(&report)?),
        _ => print!("{}", report),
    }

    Ok(if report.is_valid() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(EXIT_VIOLATIONS)
    })
}

async fn describe(args: &ArgMatches) -> Result<ExitCode> {
    let schema_path = args.get_one::<String>("schema").context("missing schema argument")?;
    let registry = ValidatorRegistry::with_builtins();
    let schema = load_schema(&registry, schema_path).await?;
    print!("{}", schema);
    Ok(ExitCode::SUCCESS)
}
