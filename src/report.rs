use crate::analyzer::{Recommendation, Recommendations, SafetyTier};
use crate::scoring::StudentScores;
use anyhow::Result;
use csv::Writer;
use std::fs;
use std::path::{Path, PathBuf};

pub const ADVISORY_NOTES: [&str; 5] = [
    "A tier with no schools is reported as empty.",
    "Recommendations are based on historical cutoffs and your score; admission is not guaranteed.",
    "Compare the different tiers, the trend of each school, and how far the latest cutoff moved from the year before.",
    "Specialised classes opened recently (such as History) have little history; consult other sources before deciding.",
    "Trends read as <overall direction across all years> (<change against the previous year>): a rising school may still have dropped last year.",
];

/// Files written by `advise`, removed before each run.
const OUTPUT_ITEMS: [&str; 4] = ["recommendations.csv", "tier_1.png", "tier_2.png", "tier_3.png"];

pub fn tier_chart_path(output_dir: &Path, tier: SafetyTier) -> PathBuf {
    output_dir.join(format!("tier_{}.png", tier.code()))
}

pub fn format_scores(scores: &StudentScores) -> String {
    let mut content = format!(
        "Literature={:.2}, Math={:.2}, English={:.2}, Four-year average={:.2}, Priority={:.2}",
        scores.literature, scores.math, scores.english, scores.four_year_average, scores.priority_points
    );
    match scores.specialty_score() {
        Some((subject, score)) => content.push_str(&format!(
            "\nRegular score: {:.2} | Specialised score ({}): {:.2}",
            scores.regular_score(),
            subject,
            score
        )),
        None => content.push_str(&format!("\nRegular score: {:.2}", scores.regular_score())),
    }
    content
}

pub fn format_tier_table(recommendations: &[Recommendation]) -> String {
    if recommendations.is_empty() {
        return "   No schools found in this tier.\n".to_string();
    }

    let name_width = recommendations
        .iter()
        .map(|r| r.entity.chars().count())
        .max()
        .unwrap_or(0)
        .max("School".len());

    let mut content = String::new();
    content.push_str(&format!(
        "   {:>2}  {:<width$}  {:>11}  {:>10}  {:>10}  {}\n",
        "#", "School", "Last cutoff", "Your score", "Difference", "Trend",
        width = name_width
    ));
    for (i, rec) in recommendations.iter().enumerate() {
        content.push_str(&format!(
            "   {:>2}  {:<width$}  {:>11.2}  {:>10.2}  {:>10}  {}\n",
            i + 1,
            rec.entity,
            rec.last_cutoff,
            rec.student_score,
            rec.difference_label(),
            rec.trend,
            width = name_width
        ));
    }
    content
}

pub fn print_recommendations(recommendations: &Recommendations, scores: &StudentScores) {
    println!("\n📊 RECOMMENDATIONS (latest cutoffs: {})", recommendations.latest_year);
    println!("==========\n");
    println!("{}", format_scores(scores));

    let icons = ["🎯", "👍", "⚠️ "];
    for (tier, icon) in SafetyTier::LISTED.iter().zip(icons) {
        println!("\n{} Tier {}: {}", icon, tier.code(), tier.description());
        print!("{}", format_tier_table(recommendations.tier(*tier)));
    }

    if recommendations.high_risk_count > 0 {
        println!(
            "\n❌ {} school(s) fall in tier 4: {}; they are not listed.",
            recommendations.high_risk_count,
            SafetyTier::HighRisk.description()
        );
    }

    println!("\n💡 Notes:");
    for (i, note) in ADVISORY_NOTES.iter().enumerate() {
        println!("   {}. {}", i + 1, note);
    }
}

pub fn write_recommendations_csv(recommendations: &Recommendations, output_dir: &Path) -> Result<PathBuf> {
    let csv_path = output_dir.join("recommendations.csv");
    let mut writer = Writer::from_path(&csv_path)?;

    writer.write_record([
        "Tier", "Tier_Name", "School", "Last_Cutoff", "Your_Score", "Difference", "Trend",
    ])?;

    for rec in recommendations.listed() {
        writer.write_record(&[
            rec.tier.code().to_string(),
            rec.tier.title().to_string(),
            rec.entity.clone(),
            format!("{:.2}", rec.last_cutoff),
            format!("{:.2}", rec.student_score),
            rec.difference_label(),
            rec.trend.to_string(),
        ])?;
    }

    writer.flush()?;
    Ok(csv_path)
}

// Clean up previous results from output directory
pub fn clean_output_directory(output_dir: &Path) -> Result<()> {
    if !output_dir.exists() {
        return Ok(());
    }

    println!("🧹 Cleaning previous results...");

    for item in &OUTPUT_ITEMS {
        let item_path = output_dir.join(item);

        if item_path.is_file() {
            fs::remove_file(&item_path)?;
            println!("   🗑️  Removed file: {}", item);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trend::TrendSummary;

    fn rec(entity: &str, tier: SafetyTier, cutoff: f64, score: f64) -> Recommendation {
        Recommendation {
            entity: entity.to_string(),
            last_cutoff: cutoff,
            student_score: score,
            difference: crate::models::round2(score - cutoff),
            trend: TrendSummary::new(&[cutoff + 1.0, cutoff], cutoff, Some(cutoff + 1.0)),
            tier,
        }
    }

    fn sample() -> Recommendations {
        Recommendations {
            latest_year: "2023-2024".to_string(),
            high_safety: vec![rec("THPT Tây Ninh", SafetyTier::HighSafety, 18.0, 19.7)],
            safe: vec![],
            at_risk: vec![rec("THPT Lê Quý Đôn", SafetyTier::AtRisk, 21.0, 19.7)],
            high_risk_count: 2,
        }
    }

    #[test]
    fn tier_table_lists_rows_or_empty_notice() {
        let recs = sample();
        let table = format_tier_table(recs.tier(SafetyTier::HighSafety));
        assert!(table.contains("THPT Tây Ninh"));
        assert!(table.contains("+1.70"));
        assert!(table.contains("Declining (-1.00)"));

        assert!(format_tier_table(recs.tier(SafetyTier::Safe)).contains("No schools found"));
    }

    #[test]
    fn csv_has_one_row_per_listed_school() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_recommendations_csv(&sample(), dir.path()).unwrap();

        let mut reader = csv::Reader::from_path(path).unwrap();
        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);
        assert_eq!(&rows[0][0], "1");
        assert_eq!(&rows[1][2], "THPT Lê Quý Đôn");
        assert_eq!(&rows[1][5], "-1.30");
    }

    #[test]
    fn clean_removes_only_known_outputs() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("tier_1.png"), b"png").unwrap();
        fs::write(dir.path().join("keep.txt"), b"keep").unwrap();

        clean_output_directory(dir.path()).unwrap();
        assert!(!dir.path().join("tier_1.png").exists());
        assert!(dir.path().join("keep.txt").exists());
    }
}
