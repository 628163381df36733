use crate::models::{parse_decimal, round2};
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Specialised subjects offered by the specialised school.
pub const SPECIALTY_SUBJECTS: [&str; 8] = [
    "Ngữ Văn", "Toán", "Vật Lý", "Hóa học", "Sinh học", "Tiếng Anh", "Tin học", "Lịch sử",
];

/// Folded answers meaning "no specialised exam".
const NO_ANSWERS: [&str; 4] = ["khong", "ko", "0", "no"];

pub const EXAM_SCORE_RANGE: (f64, f64) = (0.0, 10.0);
pub const PRIORITY_RANGE: (f64, f64) = (0.0, 5.0);

#[derive(Debug, Clone, PartialEq)]
pub struct StudentScores {
    pub literature: f64,
    pub math: f64,
    pub english: f64,
    pub four_year_average: f64,
    pub priority_points: f64,
    pub specialty: Option<SpecialtyExam>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpecialtyExam {
    pub subject: String,
    pub score: f64,
}

impl StudentScores {
    fn exam_total(&self) -> f64 {
        self.literature + self.math + self.english
    }

    /// Composite for regular classes: 70% exams, 30% four-year average, plus priority points.
    pub fn regular_score(&self) -> f64 {
        round2(self.exam_total() * 0.7 + self.four_year_average * 0.3 + self.priority_points)
    }

    /// Composite for a specialised class: the three exams plus the specialty exam counted twice.
    pub fn specialty_score(&self) -> Option<(&str, f64)> {
        self.specialty
            .as_ref()
            .map(|exam| (exam.subject.as_str(), round2(self.exam_total() + exam.score * 2.0)))
    }

    /// Score to compare against an entity; `None` for specialised classes the student did not sit.
    pub fn score_for(&self, specialty_subject: Option<&str>) -> Option<f64> {
        match specialty_subject {
            None => Some(self.regular_score()),
            Some(subject) => self
                .specialty_score()
                .filter(|(chosen, _)| *chosen == subject)
                .map(|(_, score)| score),
        }
    }
}

/// Parse a score typed by the student, within an inclusive range.
pub fn parse_score(input: &str, range: (f64, f64)) -> Option<f64> {
    parse_decimal(input).filter(|score| *score >= range.0 && *score <= range.1)
}

/// Lowercase, drop spaces and diacritics: "Ngữ Văn" -> "nguvan".
pub fn normalize_text(s: &str) -> String {
    s.to_lowercase()
        .replace('đ', "d")
        .nfd()
        .filter(|c| !c.is_whitespace() && !is_combining_mark(*c))
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub enum SubjectAnswer {
    None,
    Subject(String),
    Unknown,
}

pub fn resolve_subject(input: &str) -> SubjectAnswer {
    let folded = normalize_text(input);
    if NO_ANSWERS.contains(&folded.as_str()) {
        return SubjectAnswer::None;
    }

    SPECIALTY_SUBJECTS
        .iter()
        .find(|subject| normalize_text(subject) == folded)
        .map(|subject| SubjectAnswer::Subject(subject.to_string()))
        .unwrap_or(SubjectAnswer::Unknown)
}
