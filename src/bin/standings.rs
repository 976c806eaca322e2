use regatta_scoring::calc::SeriesScorer;
use regatta_scoring::series::Series;
use regatta_scoring::system::ScoringSystem;
use std::env;
use std::fs;
use std::process::ExitCode;

fn run(system_path: &str, series_path: &str) -> Result<(), String> {
    let system = ScoringSystem::from_path(system_path)?;
    let scorer = SeriesScorer::new(system).map_err(|e| e.to_string())?;

    let raw = fs::read_to_string(series_path)
        .map_err(|e| format!("failed to read {}: {}", series_path, e))?;
    let series = Series::from_json_str(&raw).map_err(|e| format!("series parse failed: {}", e))?;

    let results = scorer.calculate(&series).map_err(|e| e.to_string())?;
    let races = series.races_by_order();

    println!("{}  ({})", series.name, scorer.system().name);
    for (competitor, result) in results.standings() {
        let name = series
            .competitors
            .iter()
            .find(|c| c.id == *competitor)
            .map(|c| c.name.as_str())
            .unwrap_or_default();
        let mut row = format!(
            "{:>4}  {:<10} {:<20}",
            result
                .rank
                .map(|r| r.to_string())
                .unwrap_or_else(|| "-".to_string()),
            competitor.as_str(),
            name,
        );
        for race in &races {
            if let Some(score) = result.scores.get(&race.id) {
                let mut cell = score.value.to_string();
                if let Some(code) = score.code.as_deref() {
                    cell = format!("{} {}", cell, code);
                }
                if score.discard {
                    cell = format!("({})", cell);
                }
                row.push_str(&format!(" {:>10}", cell));
            }
        }
        row.push_str(&format!(
            " {:>8}",
            result
                .total
                .map(|t| t.to_string())
                .unwrap_or_else(|| "-".to_string())
        ));
        println!("{}", row);
    }
    Ok(())
}

fn main() -> ExitCode {
    let args: Vec<String> = env::args().collect();
    if args.len() != 3 {
        eprintln!("usage: standings <system.yaml> <series.json>");
        return ExitCode::FAILURE;
    }
    match run(&args[1], &args[2]) {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            eprintln!("{}", message);
            ExitCode::FAILURE
        }
    }
}
