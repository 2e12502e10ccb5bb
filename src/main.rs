use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use rne_explorer::{
    export,
    summary::{filter_options, map_center, map_points, Summary},
    FilterCriteria, Session, Settings,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

/// Query the national register of elected officials.
#[derive(Parser, Debug)]
#[command(name = "rne-explorer", version)]
struct Args {
    /// YAML settings file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Directory holding the cached CSV files
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[arg(long)]
    officials_url: Option<String>,

    #[arg(long)]
    towns_url: Option<String>,

    /// Whole-request HTTP timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Keep only these territory codes (department or collectivity)
    #[arg(short = 't', long = "territory", value_name = "CODE")]
    territories: Vec<String>,

    /// Keep only these gender codes (M or F)
    #[arg(short = 'g', long = "gender", value_name = "M|F")]
    genders: Vec<String>,

    /// Case-insensitive substring of the town name
    #[arg(long)]
    town: Option<String>,

    /// Case-insensitive substring of the official's last name
    #[arg(long)]
    name: Option<String>,

    /// Print the column names of the dataset and exit
    #[arg(long)]
    columns: bool,

    /// Print the territory and gender codes available to the filters and exit
    #[arg(long)]
    list_options: bool,

    /// Print the filtered rows as CSV on stdout instead of the summary
    #[arg(long)]
    table: bool,

    /// Print the summary (or the filter options) as JSON
    #[arg(long)]
    json: bool,

    #[arg(long, value_name = "FILE")]
    export_csv: Option<PathBuf>,

    #[arg(long, value_name = "FILE")]
    export_parquet: Option<PathBuf>,
}

impl Args {
    fn settings(&self) -> Result<Settings> {
        let mut settings =
            Settings::load(self.config.as_deref()).context("loading settings")?;
        if let Some(dir) = &self.data_dir {
            settings.data_dir = dir.clone();
        }
        if let Some(url) = &self.officials_url {
            settings.officials_url = url.clone();
        }
        if let Some(url) = &self.towns_url {
            settings.towns_url = url.clone();
        }
        if let Some(secs) = self.timeout_secs {
            settings.http.timeout_secs = Some(secs);
        }
        settings.validate().context("validating settings")?;
        Ok(settings)
    }

    fn criteria(&self) -> FilterCriteria {
        let mut criteria = FilterCriteria::new()
            .territories(&self.territories)
            .genders(self.genders.iter().map(|g| g.to_uppercase()));
        if let Some(town) = &self.town {
            criteria = criteria.town_contains(town.as_str());
        }
        if let Some(name) = &self.name {
            criteria = criteria.name_contains(name.as_str());
        }
        criteria
    }
}

fn print_summary(summary: &Summary, located: usize, center: Option<(f64, f64)>) {
    println!("Élus affichés          {}", summary.rows);
    println!("Territoires            {}", summary.distinct_territories);
    println!("Part des femmes        {:.1} %", summary.female_pct);
    println!("Élus localisés         {}", located);
    if summary.dropped_without_territory > 0 {
        println!(
            "Élus écartés           {} (ni département ni collectivité)",
            summary.dropped_without_territory
        );
    }
    if let Some((lat, lon)) = center {
        println!("Centre de la carte     {:.4}, {:.4}", lat, lon);
    }

    println!("\nRépartition par genre");
    for (label, n) in &summary.gender_counts {
        println!("  {:<30} {:>8}", label, n);
    }
    println!("\nÉlus par territoire");
    for (label, n) in &summary.territory_counts {
        println!("  {:<30} {:>8}", label, n);
    }
    println!("\nCatégories socio-professionnelles");
    for (label, n) in &summary.top_professions {
        println!("  {:<60} {:>8}", label, n);
    }
}

fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let settings = args.settings()?;
    info!(
        officials = %settings.officials_path().display(),
        towns = %settings.towns_path().display(),
        "startup"
    );

    let session = Session::from_settings(&settings).context("building HTTP client")?;

    if args.list_options {
        let dataset = session.dataset();
        if let Some(error) = dataset.error() {
            eprintln!("warning: {}", error);
        }
        let options = filter_options(&dataset.into_value());
        if args.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&options).context("serializing filter options")?
            );
        } else {
            println!("Territoires: {}", options.territories.join(" "));
            println!("Genres: {}", options.genders.join(" "));
        }
        return Ok(());
    }

    let outcome = session.query(&args.criteria());
    if let Some(error) = outcome.error() {
        warn!(error = %error, "dataset degraded");
        eprintln!("warning: {}", error);
    }
    let table = outcome.into_value();

    if args.columns {
        for column in table.columns() {
            println!("{}", column);
        }
        return Ok(());
    }

    let summary = Summary::of(&table).with_dropped(session.dropped_officials());
    if args.table {
        print!("{}", export::to_csv_string(&table)?);
    } else if args.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&summary).context("serializing summary")?
        );
    } else {
        let points = map_points(&table);
        print_summary(&summary, points.len(), map_center(&points));
    }

    if let Some(path) = &args.export_csv {
        export::write_csv_file(&table, path)
            .with_context(|| format!("exporting CSV to {}", path.display()))?;
    }
    if let Some(path) = &args.export_parquet {
        export::write_parquet(&table, path)
            .with_context(|| format!("exporting Parquet to {}", path.display()))?;
    }
    Ok(())
}
