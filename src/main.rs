use anyhow::Result;
use fldash::config::Config;
use fldash::logging::{log, obj, v_str, Domain, Level};
use fldash::select::Metric;
use fldash::{Dashboard, Selection};
use serde::Serialize;

fn print_usage() {
    eprintln!("Usage: fldash <command> [options]");
    eprintln!();
    eprintln!("Commands:");
    eprintln!("  summary                          Index summary (reps, experiments, row counts)");
    eprintln!("  select [options]                 Chart datasets for a guest/rep selection");
    eprintln!("  individual --client=<id> --rep=<n>  Individual comparison dataset");
    eprintln!("  clients                          Clients and reps of the independent export");
    eprintln!();
    eprintln!("Select options:");
    eprintln!("  --guests=<g1,g2,...>   Checked guests (guest_1, guest_2, guest_3)");
    eprintln!("  --reps=<r1,r2,...>     Checked repetitions");
    eprintln!("  --metric=<m>           Only one chart: trainingLoss, testMSE, contrib");
    eprintln!();
    eprintln!("Environment: FLDASH_DATA_DIR, FLDASH_BATCH1, FLDASH_BATCH2, FLDASH_INDEPENDENT,");
    eprintln!("             FLDASH_EMPTY_BATCH=reject|zero_shift, LOG_LEVEL, LOG_DIR");
}

fn option<'a>(args: &'a [String], name: &str) -> Option<&'a str> {
    let prefix = format!("--{}=", name);
    args.iter().find_map(|a| a.strip_prefix(prefix.as_str()))
}

fn emit<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }
    let cmd = args[1].as_str();
    let rest = &args[2..];
    if !matches!(cmd, "summary" | "select" | "individual" | "clients") {
        eprintln!("Unknown command: {}", cmd);
        print_usage();
        std::process::exit(1);
    }

    let cfg = Config::from_env();
    let dashboard = match Dashboard::load(&cfg).await {
        Ok(d) => d,
        Err(err) => {
            log(
                Level::Error,
                Domain::System,
                "init_failed",
                obj(&[("msg", v_str(&err.to_string()))]),
            );
            eprintln!("Error loading or processing CSVs: {}", err);
            std::process::exit(2);
        }
    };

    match cmd {
        "summary" => emit(&dashboard.summary())?,
        "select" => {
            let selection = Selection::parse(
                option(rest, "guests").unwrap_or(""),
                option(rest, "reps").unwrap_or(""),
            )?;
            let feed = dashboard.select(&selection);
            match option(rest, "metric") {
                Some(raw) => {
                    let metric = Metric::parse(raw)
                        .ok_or_else(|| anyhow::anyhow!("unknown metric '{}'", raw))?;
                    emit(&serde_json::json!({
                        "metric": metric,
                        "axis_title": metric.axis_title(),
                        "description": metric.description(),
                        "scenario": feed.scenario,
                        "datasets": metric.datasets(&feed),
                    }))?
                }
                None => emit(&feed)?,
            }
        }
        "individual" => {
            let options = dashboard.comparison_options();
            let client = option(rest, "client")
                .map(String::from)
                .or_else(|| options.clients.first().cloned())
                .ok_or_else(|| anyhow::anyhow!("no clients in independent data"))?;
            let rep = match option(rest, "rep") {
                Some(raw) => raw.parse::<i64>()?,
                None => options
                    .reps
                    .first()
                    .copied()
                    .ok_or_else(|| anyhow::anyhow!("no reps in independent data"))?,
            };
            emit(&dashboard.individual(&client, rep))?
        }
        "clients" => emit(&dashboard.comparison_options())?,
        _ => unreachable!("command validated above"),
    }
    Ok(())
}
