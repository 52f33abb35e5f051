use anyhow::Context;
use clap::Parser;
use mesa_io::config::cli::{CliConfig, Mode};
use mesa_io::config::profiles;
use mesa_io::utils::{logger, validation::Validate};
use mesa_io::{
    Exporter, ImportStatus, Importer, LocalStorage, ModuleProfile, ProfilesConfig, RestCatalog,
    RestImportSink, Storage,
};
use std::sync::Arc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = CliConfig::parse();

    logger::init_cli_logger(config.verbose);

    tracing::info!("Starting mesa-io");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        eprintln!("❌ {}", e);
        std::process::exit(1);
    }

    let profile = load_profile(&config)?;

    let exit_code = match config.mode {
        Mode::Import => run_import(&config, profile).await?,
        Mode::Export => run_export(&config, profile).await?,
    };

    if exit_code > 0 {
        std::process::exit(exit_code);
    }

    Ok(())
}

fn load_profile(config: &CliConfig) -> anyhow::Result<ModuleProfile> {
    // 外部 TOML 設定優先於內建模組
    if let Some(path) = &config.profiles {
        let profiles_config = ProfilesConfig::from_file(path)
            .with_context(|| format!("failed to load profiles from {}", path))?;
        if let Some(profile) = profiles_config.build(&config.module) {
            return Ok(profile);
        }
    }

    profiles::builtin(&config.module)
        .with_context(|| format!("unknown module '{}'", config.module))
}

async fn run_import(config: &CliConfig, profile: ModuleProfile) -> anyhow::Result<i32> {
    let input = config.input.as_deref().context("--input is required")?;
    let module = profile.name.clone();

    let storage = LocalStorage::new(".".to_string());
    let bytes = storage
        .read_file(input)
        .await
        .with_context(|| format!("failed to read {}", input))?;
    let text = String::from_utf8(bytes).context("input file is not valid UTF-8")?;

    let catalog = Arc::new(RestCatalog::new(&config.api_endpoint).with_create(config.allow_create));
    let sink = Arc::new(RestImportSink::new(&format!(
        "{}/{}/import",
        config.api_endpoint.trim_end_matches('/'),
        module
    )));

    let importer = Importer::new(profile, sink).with_resolver(catalog);
    let report = importer.run(input, &text).await?;

    match report.status {
        ImportStatus::Completed => {
            println!("✅ {}: {} records imported", module, report.imported);
        }
        ImportStatus::CompletedWithWarnings => {
            println!(
                "⚠️ {}: {} of {} records imported — {}",
                module, report.imported, report.submitted, report.message
            );
        }
        ImportStatus::Failed => {
            eprintln!("❌ {}: import failed — {}", module, report.message);
        }
    }

    for error in &report.row_errors {
        eprintln!("   {}", error);
    }
    for skip in &report.skipped {
        eprintln!(
            "   Line {}: skipped ({} '{}': {})",
            skip.line, skip.field, skip.value, skip.reason
        );
    }
    for error in &report.sink_errors {
        eprintln!("   {}", error);
    }

    Ok(if report.status == ImportStatus::Failed {
        1
    } else {
        0
    })
}

async fn run_export(config: &CliConfig, profile: ModuleProfile) -> anyhow::Result<i32> {
    let module = profile.name.clone();

    let catalog = RestCatalog::new(&config.api_endpoint);
    let records = catalog
        .fetch_records(&module)
        .await
        .with_context(|| format!("failed to fetch '{}' records", module))?;

    let storage = LocalStorage::new(config.output_path.clone());
    let exporter = Exporter::new(profile, storage).with_resolver(Arc::new(catalog));

    let report = exporter.run(records, config.export_scope()).await?;

    println!(
        "✅ {}: {} records exported",
        module, report.exported
    );
    println!("📁 Output saved to: {}/{}", config.output_path, report.file_name);

    Ok(0)
}
