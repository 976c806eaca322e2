use regatta_scoring::calc::SeriesScorer;
use regatta_scoring::series::{Competitor, Race, Score, Series};
use regatta_scoring::system::ScoringSystem;

fn main() {
    let system = ScoringSystem::from_path("systems/appendix_a.yaml").expect("load scoring system");
    let scorer = SeriesScorer::new(system).expect("scoring system should validate");

    let series = Series::new("Spring Cup")
        .with_competitors(vec![
            Competitor::new("DK-101", "Alpha"),
            Competitor::new("DK-102", "Bravo"),
            Competitor::new("DK-103", "Charlie"),
        ])
        .with_races(vec![
            Race::new("R1", "Race 1", 1).with_scores(vec![
                Score::place("DK-101", 1),
                Score::place("DK-102", 2),
                Score::place("DK-103", 3),
            ]),
            Race::new("R2", "Race 2", 2).with_scores(vec![
                Score::place("DK-101", 2),
                Score::coded("DK-102", "DNF"),
                Score::place("DK-103", 1),
            ]),
        ]);

    let results = scorer.calculate(&series).expect("series should score");
    for (competitor, result) in results.standings() {
        println!(
            "{:>4}  {}  total={}",
            result
                .rank
                .map(|r| r.to_string())
                .unwrap_or_else(|| "-".to_string()),
            competitor.as_str(),
            result
                .total
                .map(|t| t.to_string())
                .unwrap_or_else(|| "-".to_string()),
        );
    }
}
