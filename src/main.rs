use anyhow::{anyhow, Context, Result};
use clap::{Arg, ArgAction, ArgMatches, Command};
use cutoff_advisor::analyzer::{AdmissionAnalyzer, Recommendations, SafetyTier};
use cutoff_advisor::chart::{plot_admission_trends, ChartOptions};
use cutoff_advisor::dialogue::{Dialogue, Reply};
use cutoff_advisor::models::{Config, CutoffRecord};
use cutoff_advisor::scoring::{
    parse_score, resolve_subject, SpecialtyExam, StudentScores, SubjectAnswer, EXAM_SCORE_RANGE, PRIORITY_RANGE,
};
use cutoff_advisor::{normalizer, prepare_dataset, report};
use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

fn cli() -> Command {
    let score_arg = |name: &'static str, help: &'static str| {
        Arg::new(name).long(name).value_name("SCORE").help(help)
    };

    Command::new("cutoff-advisor")
        .version("0.1")
        .about("Advises on high school admission chances from historical cutoff scores")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file path")
                .default_value("config.toml")
                .global(true),
        )
        .subcommand_required(true)
        .subcommand(Command::new("refresh").about("Rebuild the processed data cache from the sheet sources"))
        .subcommand(
            Command::new("advise")
                .about("Collect scores and recommend schools by safety tier")
                .arg(score_arg("literature", "Literature exam score (0-10)"))
                .arg(score_arg("math", "Math exam score (0-10)"))
                .arg(score_arg("english", "English exam score (0-10)"))
                .arg(score_arg("average", "Four-year average (0-10)"))
                .arg(score_arg("priority", "Priority points (0-5)").default_value("0"))
                .arg(Arg::new("specialty-subject").long("specialty-subject").value_name("SUBJECT").help("Specialised exam subject"))
                .arg(score_arg("specialty-score", "Specialised exam score (0-10)"))
                .arg(Arg::new("no-charts").long("no-charts").action(ArgAction::SetTrue).help("Skip the trend charts"))
                .arg(Arg::new("refresh").long("refresh").action(ArgAction::SetTrue).help("Ignore the cached data")),
        )
        .subcommand(
            Command::new("plot")
                .about("Chart the cutoff history of the given schools")
                .arg(Arg::new("entities").value_name("SCHOOL").num_args(1..).required(true))
                .arg(
                    Arg::new("output")
                        .short('o')
                        .long("output")
                        .value_name("FILE")
                        .default_value("trend_plot.png"),
                ),
        )
        .subcommand(Command::new("entities").about("List every school and specialised class in the data"))
}

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli().get_matches();
    let config_file = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("config.toml");

    // Load or create configuration
    let config = if Path::new(config_file).exists() {
        println!("📋 Loading configuration from: {}", config_file);
        Config::load_from_file(config_file)
            .with_context(|| format!("Invalid configuration file: {}", config_file))?
    } else {
        println!("📝 Creating default configuration file: {}", config_file);
        Config::default().save_to_file(config_file)?;
        println!("⚠️  Please edit {} and point it at your cutoff sheets, then run the program again.", config_file);
        return Ok(());
    };

    match matches.subcommand() {
        Some(("refresh", _)) => {
            let records = prepare_dataset(&config, true).await?;
            println!("✅ {} records across {} school years", records.len(), normalizer::years(&records).len());
        }
        Some(("advise", args)) => run_advise(&config, args).await?,
        Some(("plot", args)) => {
            let records = prepare_dataset(&config, false).await?;
            let entities: Vec<String> = args.get_many::<String>("entities").into_iter().flatten().cloned().collect();
            let output = args.get_one::<String>("output").map(String::as_str).unwrap_or("trend_plot.png");
            let path = plot_admission_trends(&records, &entities, Path::new(output), &ChartOptions::default())?;
            println!("📈 Chart saved to: {}", path.display());
        }
        Some(("entities", _)) => {
            let records = prepare_dataset(&config, false).await?;
            for entity in normalizer::entities(&records) {
                println!("{}", entity);
            }
        }
        _ => return Err(anyhow!("Unknown command; see --help")),
    }

    Ok(())
}

async fn run_advise(config: &Config, args: &ArgMatches) -> Result<()> {
    let records = prepare_dataset(config, args.get_flag("refresh")).await?;

    let scores = match scores_from_args(args)? {
        Some(scores) => scores,
        None => run_dialogue(io::stdin().lock(), io::stdout())?,
    };

    println!("\n🔍 Analyzing admission chances...");
    let analyzer = AdmissionAnalyzer::new(&records, config.top_n);
    let recommendations = match analyzer.recommend(&scores) {
        Ok(recommendations) => recommendations,
        Err(e) => {
            println!("❌ {}", e);
            return Ok(());
        }
    };

    report::print_recommendations(&recommendations, &scores);

    let output_dir = PathBuf::from(config.output_directory.as_deref().unwrap_or("output"));
    fs::create_dir_all(&output_dir)?;
    report::clean_output_directory(&output_dir)?;

    let csv_path = report::write_recommendations_csv(&recommendations, &output_dir)?;
    println!("\n📄 Recommendations saved to: {}", csv_path.display());

    if !args.get_flag("no-charts") {
        write_tier_charts(&records, &recommendations, &output_dir);
    }

    println!("\n✅ Consultation complete!");
    Ok(())
}

fn write_tier_charts(records: &[CutoffRecord], recommendations: &Recommendations, output_dir: &Path) {
    for tier in SafetyTier::LISTED {
        let entities = recommendations.entities(tier);
        if entities.is_empty() {
            continue;
        }

        let options = ChartOptions {
            title: format!("Tier {}: {} - cutoff trends", tier.code(), tier.title()),
            ..ChartOptions::default()
        };
        match plot_admission_trends(records, &entities, &report::tier_chart_path(output_dir, tier), &options) {
            Ok(path) => println!("📈 Tier {} chart: {}", tier.code(), path.display()),
            Err(e) => println!("   ⚠️  Could not draw tier {} chart: {}", tier.code(), e),
        }
    }
}

fn score_flag(args: &ArgMatches, name: &str, range: (f64, f64)) -> Result<Option<f64>> {
    match args.get_one::<String>(name) {
        None => Ok(None),
        Some(value) => parse_score(value, range)
            .map(Some)
            .ok_or_else(|| anyhow!("--{} must be a number from {} to {}", name, range.0, range.1)),
    }
}

/// Scores given on the command line; `None` when the dialogue should ask for them.
fn scores_from_args(args: &ArgMatches) -> Result<Option<StudentScores>> {
    let literature = score_flag(args, "literature", EXAM_SCORE_RANGE)?;
    let math = score_flag(args, "math", EXAM_SCORE_RANGE)?;
    let english = score_flag(args, "english", EXAM_SCORE_RANGE)?;
    let average = score_flag(args, "average", EXAM_SCORE_RANGE)?;
    let priority = score_flag(args, "priority", PRIORITY_RANGE)?.unwrap_or(0.0);

    let (literature, math, english, four_year_average) = match (literature, math, english, average) {
        (Some(l), Some(m), Some(e), Some(a)) => (l, m, e, a),
        (None, None, None, None) => {
            if args.contains_id("specialty-subject") || args.contains_id("specialty-score") {
                return Err(anyhow!(
                    "--specialty-subject and --specialty-score need --literature, --math, --english and --average"
                ));
            }
            return Ok(None);
        }
        _ => return Err(anyhow!("--literature, --math, --english and --average must be given together")),
    };

    let specialty = match args.get_one::<String>("specialty-subject") {
        None => None,
        Some(input) => match resolve_subject(input) {
            SubjectAnswer::None => None,
            SubjectAnswer::Unknown => return Err(anyhow!("Unknown specialised subject: {}", input)),
            SubjectAnswer::Subject(subject) => {
                let score = score_flag(args, "specialty-score", EXAM_SCORE_RANGE)?
                    .ok_or_else(|| anyhow!("--specialty-score is required with --specialty-subject"))?;
                Some(SpecialtyExam { subject, score })
            }
        },
    };

    Ok(Some(StudentScores {
        literature,
        math,
        english,
        four_year_average,
        priority_points: priority,
        specialty,
    }))
}

fn run_dialogue<R: BufRead, W: Write>(input: R, mut output: W) -> Result<StudentScores> {
    let mut dialogue = Dialogue::new();
    writeln!(output, "🤖 {}", dialogue.question())?;
    write!(output, "> ")?;
    output.flush()?;

    for line in input.lines() {
        match dialogue.answer(line?.trim()) {
            Reply::Complete(scores) => return Ok(scores),
            Reply::Next(question) => writeln!(output, "🤖 {}", question)?,
            Reply::Invalid(message) => writeln!(output, "❌ {}", message)?,
        }
        write!(output, "> ")?;
        output.flush()?;
    }

    Err(anyhow!("Input ended before all scores were collected"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dialogue_runs_over_reader() {
        let input = "8\n7.5\n8.5\n8\n0\nToán\n9\n".as_bytes();
        let mut output = Vec::new();
        let scores = run_dialogue(input, &mut output).unwrap();

        assert_eq!(scores.specialty_score(), Some(("Toán", 42.0)));
        let transcript = String::from_utf8(output).unwrap();
        assert!(transcript.contains("Math exam score"));
    }

    #[test]
    fn dialogue_errors_on_early_eof() {
        let mut output = Vec::new();
        assert!(run_dialogue("8\n".as_bytes(), &mut output).is_err());
    }

    #[test]
    fn flags_require_specialty_score() {
        let matches = cli().get_matches_from([
            "cutoff-advisor", "advise", "--literature", "8", "--math", "8", "--english", "8", "--average", "8",
            "--specialty-subject", "Toán",
        ]);
        let (_, args) = matches.subcommand().unwrap();
        assert!(scores_from_args(args).is_err());
    }

    #[test]
    fn specialty_flags_alone_are_rejected() {
        let matches = cli().get_matches_from([
            "cutoff-advisor", "advise", "--specialty-subject", "Toán", "--specialty-score", "9",
        ]);
        let (_, args) = matches.subcommand().unwrap();
        let err = scores_from_args(args).unwrap_err();
        assert!(err.to_string().contains("--specialty-subject and --specialty-score need"));
    }

    #[test]
    fn no_score_flags_fall_back_to_dialogue() {
        let matches = cli().get_matches_from(["cutoff-advisor", "advise"]);
        let (_, args) = matches.subcommand().unwrap();
        assert!(scores_from_args(args).unwrap().is_none());
    }
}
