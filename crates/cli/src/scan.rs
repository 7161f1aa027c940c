use loaderscope_api::describe_object;
use loaderscope_core::ScanSpec;
use loaderscope_core::discovery::DiscoveryResult;
use serde::Serialize;
use std::path::Path;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use tracing::info;

#[derive(Serialize, Tabled)]
struct LoaderRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Loader")]
    loader: String,
    #[tabled(rename = "Handlers")]
    handlers: String,
}

#[derive(Serialize, Tabled)]
struct EntryRow {
    #[tabled(rename = "#")]
    index: usize,
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Loader")]
    loader: String,
}

#[derive(Serialize)]
struct ScanReport {
    loaders: Vec<LoaderRow>,
    parent_loaders: Vec<String>,
    classpath: Vec<EntryRow>,
    duration_ms: u128,
}

impl From<&DiscoveryResult> for ScanReport {
    fn from(result: &DiscoveryResult) -> Self {
        let loaders = result
            .loader_order
            .iter()
            .enumerate()
            .map(|(index, entry)| LoaderRow {
                index,
                loader: describe_object(&entry.loader),
                handlers: entry
                    .handlers
                    .iter()
                    .map(|h| h.name())
                    .collect::<Vec<_>>()
                    .join(", "),
            })
            .collect();
        let mut parent_loaders: Vec<String> =
            result.parent_loaders.iter().map(describe_object).collect();
        parent_loaders.sort();
        let classpath = result
            .classpath
            .iter()
            .enumerate()
            .map(|(index, entry)| EntryRow {
                index,
                path: entry.path.display().to_string(),
                loader: describe_object(&entry.loader),
            })
            .collect();

        Self {
            loaders,
            parent_loaders,
            classpath,
            duration_ms: result.duration.as_millis(),
        }
    }
}

pub fn run(
    snapshot: &Path,
    spec: ScanSpec,
    parallel: bool,
    json: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Scanning {} with {:?}", snapshot.display(), spec);
    let result = loaderscope_runtime::scan_snapshot(snapshot, spec, parallel)?;
    let report = ScanReport::from(&result);

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Loader order:");
    println!("{}", Table::new(&report.loaders).with(Style::rounded()));
    if !report.parent_loaders.is_empty() {
        println!("\nParent loaders:");
        for parent in &report.parent_loaders {
            println!(" - {}", parent);
        }
    }
    if report.classpath.is_empty() {
        println!("\nNo classpath entries found.");
    } else {
        println!("\nClasspath:");
        println!("{}", Table::new(&report.classpath).with(Style::rounded()));
    }
    println!("\nDiscovery took {} ms", report.duration_ms);
    Ok(())
}
