use std::fs;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use log::debug;
use similar::{ChangeTag, TextDiff};

use multiregion_core::inventory::CertificateInventory;
use multiregion_core::loader::{load_certificates, load_service_description, load_template};
use multiregion_core::{
    DefaultsProfile, InvocationOptions, NamingConvention, Preparation, Preparer, ResolvedContext,
    ServiceDescription, StaticInventory, Template,
};
use multiregion_provider_aws::AcmInventory;

#[derive(Parser)]
#[command(name = "multiregion")]
#[command(
    about = "Prepare multi-regional API Gateway, CloudFront and Route53 resources",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Prepare the resources and merge them into a template
    Prepare(PrepareArgs),
    /// Show the domain names derived from the configuration
    Domains(TargetArgs),
}

#[derive(Args, Clone)]
struct TargetArgs {
    /// Service file holding the `custom.dns` / `custom.cdn` sections
    #[arg(long, short, default_value = "serverless.yml")]
    config: PathBuf,

    /// Region being deployed (e.g., us-east-1)
    #[arg(long, short)]
    region: String,

    /// Stage being deployed
    #[arg(long, short, default_value = "dev")]
    stage: String,

    /// Service name; read from the service file when omitted
    #[arg(long)]
    service: Option<String>,

    /// Regional domain naming: `stage` (api-prod.example.com) or `region`
    #[arg(long, default_value = "stage")]
    naming: NamingConvention,
}

#[derive(Args)]
struct PrepareArgs {
    #[command(flatten)]
    target: TargetArgs,

    /// Resource template to prepare (defaults to the bundled one)
    #[arg(long)]
    resources: Option<PathBuf>,

    /// Template to merge the prepared resources into
    #[arg(long)]
    master: Option<PathBuf>,

    /// Write the result here instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Certificate list to use instead of querying ACM
    #[arg(long)]
    certificates: Option<PathBuf>,

    /// Price class when `custom.cdn.priceClass` is not set
    #[arg(long)]
    default_price_class: Option<String>,

    /// Forwarded headers when `custom.cdn.headers` is not set
    #[arg(long, value_delimiter = ',')]
    default_headers: Option<Vec<String>>,

    /// Show the changes made to the template
    #[arg(long)]
    diff: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Yaml,
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Prepare(args) => run_prepare(&args).await,
        Commands::Domains(args) => run_domains(&args),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Build invocation options from the arguments and the service file
fn invocation_options(
    target: &TargetArgs,
    description: &ServiceDescription,
) -> Result<InvocationOptions, String> {
    let service = target
        .service
        .clone()
        .or_else(|| description.service.clone())
        .ok_or_else(|| {
            format!(
                "No service name in {}; pass --service",
                target.config.display()
            )
        })?;
    Ok(InvocationOptions::new(
        target.region.clone(),
        target.stage.clone(),
        service,
    ))
}

fn defaults_profile(args: &PrepareArgs) -> DefaultsProfile {
    let mut defaults = DefaultsProfile::default();
    if let Some(price_class) = &args.default_price_class {
        defaults = defaults.with_price_class(price_class.clone());
    }
    if let Some(headers) = &args.default_headers {
        defaults = defaults.with_headers(headers.clone());
    }
    defaults
}

async fn inventory_for(
    args: &PrepareArgs,
    region: &str,
) -> Result<Box<dyn CertificateInventory>, String> {
    match &args.certificates {
        Some(path) => {
            let certificates = load_certificates(path).map_err(|e| e.to_string())?;
            Ok(Box::new(StaticInventory::new(certificates)))
        }
        None => Ok(Box::new(AcmInventory::new(region).await)),
    }
}

fn render(template: &Template, format: OutputFormat) -> Result<String, String> {
    match format {
        OutputFormat::Json => template.to_json_pretty(),
        OutputFormat::Yaml => template.to_yaml(),
    }
    .map_err(|e| format!("Failed to render template: {}", e))
}

async fn run_prepare(args: &PrepareArgs) -> Result<(), String> {
    let description = load_service_description(&args.target.config).map_err(|e| e.to_string())?;
    let options = invocation_options(&args.target, &description)?;

    let resources = match &args.resources {
        Some(path) => load_template(path),
        None => Template::base_resources(),
    }
    .map_err(|e| e.to_string())?;

    let mut master = match &args.master {
        Some(path) => load_template(path).map_err(|e| e.to_string())?,
        None => Template::default(),
    };
    let before = render(&master, args.format)?;

    let inventory = inventory_for(args, &options.region).await?;
    debug!("Using the {} certificate inventory", inventory.name());
    let preparer = Preparer::new(inventory)
        .with_naming(args.target.naming)
        .with_defaults(defaults_profile(args));

    let preparation = preparer
        .create_deployment_artifacts(&mut master, resources, &description.custom, &options)
        .await
        .map_err(|e| e.to_string())?;

    if let Preparation::Skipped(reason) = &preparation {
        eprintln!("{} {}", "Skipped:".yellow().bold(), reason);
    }

    let after = render(&master, args.format)?;

    if args.diff {
        print_diff(&before, &after);
    }

    match &args.output {
        Some(path) => {
            fs::write(path, &after)
                .map_err(|e| format!("Failed to write {}: {}", path.display(), e))?;
            eprintln!(
                "{} {}",
                "✓ Wrote".green().bold(),
                path.display().to_string().green()
            );
        }
        None if !args.diff => println!("{}", after),
        None => {}
    }

    Ok(())
}

fn run_domains(target: &TargetArgs) -> Result<(), String> {
    let description = load_service_description(&target.config).map_err(|e| e.to_string())?;
    let options = invocation_options(target, &description)?;

    let context = match ResolvedContext::resolve(&description.custom, &options, target.naming) {
        Ok(context) => context,
        Err(reason) => {
            println!("{} {}", "Skipped:".yellow().bold(), reason);
            return Ok(());
        }
    };

    print_context(&context);
    Ok(())
}

fn print_context(context: &ResolvedContext) {
    let zone = context
        .hosted_zone_id
        .clone()
        .unwrap_or_else(|| format!("{}.", context.host_name));

    println!("{}", "Domains:".cyan().bold());
    println!("  • global:   {}", context.full_domain_name.green());
    println!("  • regional: {}", context.regional_domain_name.green());
    println!("  • zone:     {}", zone);
    println!(
        "  • target:   {} / {}",
        context.region.bold(),
        context.stage.bold()
    );
}

fn print_diff(original: &str, updated: &str) {
    println!("\n{}", "Template changes:".cyan().bold());

    let diff = TextDiff::from_lines(original, updated);
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => "-".red(),
            ChangeTag::Insert => "+".green(),
            ChangeTag::Equal => " ".normal(),
        };
        print!("{}{}", sign, change);
    }
}
