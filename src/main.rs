use anyhow::Result;
use clap::Parser;
use contract_diff::compat::{DiffConfig, OutputMode};
use contract_diff::logging::{self, Profile};
use contract_diff::source::{DocumentId, LocalFileProvider, SourceProvider};
use contract_diff::{Contract, ContractFormat, DiffError, Side};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "contract-diff")]
#[command(about = "Compare API contract versions and classify breaking changes")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Parser)]
enum Commands {
    #[command(about = "Compare two contract documents")]
    Compare {
        #[arg(help = "Old contract: a path, spec:<id> or collection:<id>[@<version>]")]
        old: String,
        #[arg(help = "New contract: a path, spec:<id> or collection:<id>[@<version>]")]
        new: String,
        #[arg(long, help = "Output mode", value_enum, default_value = "summary")]
        output: OutputArg,
        #[arg(long, help = "Document format", value_enum, default_value = "auto")]
        format: FormatArg,
        #[arg(long, help = "YAML configuration file")]
        config: Option<PathBuf>,
        #[arg(short, long, help = "Enable debug logging")]
        verbose: bool,
        #[arg(long, help = "Log line format on stderr", value_enum, default_value = "text")]
        log_format: LogFormatArg,
    },
    #[command(about = "Generate semantic fingerprint for a contract document")]
    Fingerprint {
        #[arg(help = "Path to the contract document")]
        file: PathBuf,
        #[arg(long, help = "Document format", value_enum, default_value = "auto")]
        format: FormatArg,
        #[arg(long, help = "Log line format on stderr", value_enum, default_value = "text")]
        log_format: LogFormatArg,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum LogFormatArg {
    Text,
    Json,
}

fn profile(log_format: LogFormatArg, verbose: bool) -> Profile {
    match (log_format, verbose) {
        (LogFormatArg::Json, _) => Profile::Json,
        (LogFormatArg::Text, true) => Profile::Verbose,
        (LogFormatArg::Text, false) => Profile::Quiet,
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum OutputArg {
    Summary,
    FullJson,
    Text,
}

impl From<OutputArg> for OutputMode {
    fn from(arg: OutputArg) -> Self {
        match arg {
            OutputArg::Summary => OutputMode::Summary,
            OutputArg::FullJson => OutputMode::FullJson,
            OutputArg::Text => OutputMode::Text,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum FormatArg {
    Auto,
    OpenapiJson,
    OpenapiYaml,
    Collection,
}

impl FormatArg {
    fn format(self) -> Option<ContractFormat> {
        match self {
            FormatArg::Auto => None,
            FormatArg::OpenapiJson => Some(ContractFormat::OpenApiJson),
            FormatArg::OpenapiYaml => Some(ContractFormat::OpenApiYaml),
            FormatArg::Collection => Some(ContractFormat::Collection),
        }
    }
}

fn main() {
    let code = match run(Args::parse()) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            2
        }
    };
    std::process::exit(code);
}

fn run(args: Args) -> Result<i32> {
    match args.command {
        Commands::Compare {
            old,
            new,
            output,
            format,
            config,
            verbose,
            log_format,
        } => {
            logging::init(profile(log_format, verbose));

            let config = match config {
                Some(path) => DiffConfig::from_yaml_file(&path)?,
                None => DiffConfig::default(),
            };
            let old = load(&old, format.format(), Side::Old)?;
            let new = load(&new, format.format(), Side::New)?;

            let report = old.compare_with_config(&new, &config);
            println!("{}", report.render(output.into()));
            Ok(report.verdict.exit_code())
        }
        Commands::Fingerprint {
            file,
            format,
            log_format,
        } => {
            logging::init(profile(log_format, false));
            let contract = Contract::from_file(&file, format.format())?;
            for warning in &contract.warnings {
                eprintln!("warning: {warning}");
            }
            println!("{}", contract.fingerprint);
            Ok(0)
        }
    }
}

fn load(id: &str, format: Option<ContractFormat>, side: Side) -> Result<Contract, DiffError> {
    let id = DocumentId::parse(id);
    LocalFileProvider
        .fetch(&id, format)
        .and_then(|doc| Contract::load(&doc.bytes, doc.format))
        .map_err(|source| DiffError::Load { side, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_selects_profile() {
        let args = Args::try_parse_from(["contract-diff", "compare", "a.yaml", "b.yaml", "--log-format", "json"])
            .unwrap();
        let Commands::Compare { log_format, verbose, .. } = args.command else {
            panic!("expected compare");
        };
        assert_eq!(profile(log_format, verbose), Profile::Json);

        let args = Args::try_parse_from(["contract-diff", "compare", "a.yaml", "b.yaml", "-v"]).unwrap();
        let Commands::Compare { log_format, verbose, .. } = args.command else {
            panic!("expected compare");
        };
        assert_eq!(profile(log_format, verbose), Profile::Verbose);

        let args = Args::try_parse_from(["contract-diff", "fingerprint", "a.yaml"]).unwrap();
        let Commands::Fingerprint { log_format, .. } = args.command else {
            panic!("expected fingerprint");
        };
        assert_eq!(profile(log_format, false), Profile::Quiet);
    }
}
