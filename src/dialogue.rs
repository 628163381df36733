use crate::scoring::{
    normalize_text, parse_score, resolve_subject, SpecialtyExam, StudentScores, SubjectAnswer, EXAM_SCORE_RANGE,
    PRIORITY_RANGE,
};

const RESTART_COMMANDS: [&str; 2] = ["restart", "batdaulai"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    AskLiterature,
    AskMath,
    AskEnglish,
    AskAverage,
    AskPriority,
    AskSpecialtySubject,
    AskSpecialtyScore,
    Complete,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// Answer rejected; the same question stands.
    Invalid(String),
    /// Answer accepted; here is the next question.
    Next(String),
    Complete(StudentScores),
}

/// Answers collected so far.
#[derive(Debug, Clone, Default)]
struct Answers {
    literature: Option<f64>,
    math: Option<f64>,
    english: Option<f64>,
    four_year_average: Option<f64>,
    priority_points: Option<f64>,
    specialty_subject: Option<String>,
}

/// Linear questionnaire collecting a student's scores one answer at a time.
#[derive(Debug, Clone)]
pub struct Dialogue {
    step: Step,
    answers: Answers,
}

impl Default for Dialogue {
    fn default() -> Self {
        Self::new()
    }
}

impl Dialogue {
    pub fn new() -> Self {
        Self {
            step: Step::AskLiterature,
            answers: Answers::default(),
        }
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn restart(&mut self) {
        *self = Self::new();
    }

    pub fn question(&self) -> String {
        match self.step {
            Step::AskLiterature => {
                "Hello! I am the admission advisor. First, what is your expected Literature exam score?".to_string()
            }
            Step::AskMath => "Great! What is your expected Math exam score?".to_string(),
            Step::AskEnglish => "Next, what is your expected English exam score?".to_string(),
            Step::AskAverage => "Almost done! What is your four-year lower secondary average?".to_string(),
            Step::AskPriority => "Do you have any priority (bonus) points? Enter 0 if none.".to_string(),
            Step::AskSpecialtySubject => format!(
                "Finally, are you taking a specialised exam? If so, type the subject ({}). Otherwise type 'No'.",
                crate::scoring::SPECIALTY_SUBJECTS.join(", ")
            ),
            Step::AskSpecialtyScore => format!(
                "OK. What is your {} specialised exam score?",
                self.answers.specialty_subject.as_deref().unwrap_or("specialised")
            ),
            Step::Complete => String::new(),
        }
    }

    pub fn answer(&mut self, input: &str) -> Reply {
        if RESTART_COMMANDS.contains(&normalize_text(input).as_str()) {
            self.restart();
            return Reply::Next(self.question());
        }

        match self.step {
            Step::AskLiterature => self.record_score(input, EXAM_SCORE_RANGE, |a, v| a.literature = Some(v), Step::AskMath),
            Step::AskMath => self.record_score(input, EXAM_SCORE_RANGE, |a, v| a.math = Some(v), Step::AskEnglish),
            Step::AskEnglish => self.record_score(input, EXAM_SCORE_RANGE, |a, v| a.english = Some(v), Step::AskAverage),
            Step::AskAverage => {
                self.record_score(input, EXAM_SCORE_RANGE, |a, v| a.four_year_average = Some(v), Step::AskPriority)
            }
            Step::AskPriority => match parse_score(input, PRIORITY_RANGE) {
                Some(points) => {
                    self.answers.priority_points = Some(points);
                    self.advance(Step::AskSpecialtySubject)
                }
                None => Reply::Invalid("Invalid score. Please enter a number from 0 to 5 (0 if none).".to_string()),
            },
            Step::AskSpecialtySubject => match resolve_subject(input) {
                SubjectAnswer::None => self.finish(None),
                SubjectAnswer::Subject(subject) => {
                    self.answers.specialty_subject = Some(subject);
                    self.advance(Step::AskSpecialtyScore)
                }
                SubjectAnswer::Unknown => {
                    Reply::Invalid("Unknown specialised subject. Please type the subject again or 'No'.".to_string())
                }
            },
            Step::AskSpecialtyScore => match parse_score(input, EXAM_SCORE_RANGE) {
                Some(score) => self.finish(Some(score)),
                None => Reply::Invalid("Invalid score. Please enter your specialised exam score (0 to 10).".to_string()),
            },
            Step::Complete => Reply::Invalid("The consultation is over. Type 'restart' to enter new scores.".to_string()),
        }
    }

    fn record_score(&mut self, input: &str, range: (f64, f64), store: fn(&mut Answers, f64), next: Step) -> Reply {
        match parse_score(input, range) {
            Some(score) => {
                store(&mut self.answers, score);
                self.advance(next)
            }
            None => Reply::Invalid("Invalid score. Please enter a number from 0 to 10.".to_string()),
        }
    }

    fn advance(&mut self, next: Step) -> Reply {
        self.step = next;
        Reply::Next(self.question())
    }

    fn finish(&mut self, specialty_score: Option<f64>) -> Reply {
        let answers = &self.answers;
        let specialty = match (&answers.specialty_subject, specialty_score) {
            (Some(subject), Some(score)) => Some(SpecialtyExam {
                subject: subject.clone(),
                score,
            }),
            _ => None,
        };

        let scores = StudentScores {
            literature: answers.literature.unwrap_or(0.0),
            math: answers.math.unwrap_or(0.0),
            english: answers.english.unwrap_or(0.0),
            four_year_average: answers.four_year_average.unwrap_or(0.0),
            priority_points: answers.priority_points.unwrap_or(0.0),
            specialty,
        };

        self.step = Step::Complete;
        Reply::Complete(scores)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn feed(dialogue: &mut Dialogue, inputs: &[&str]) -> Reply {
        let mut last = Reply::Invalid(String::new());
        for input in inputs {
            last = dialogue.answer(input);
        }
        last
    }

    #[test]
    fn regular_path_completes_after_no() {
        let mut dialogue = Dialogue::new();
        let reply = feed(&mut dialogue, &["8", "7,5", "8.5", "8", "0.5", "Không"]);

        match reply {
            Reply::Complete(scores) => {
                assert_eq!(scores.math, 7.5);
                assert_eq!(scores.specialty, None);
                assert_eq!(scores.regular_score(), 19.7);
            }
            other => panic!("unexpected reply: {:?}", other),
        }
        assert_eq!(dialogue.step(), Step::Complete);
    }

    #[test]
    fn specialty_path_asks_for_score() {
        let mut dialogue = Dialogue::new();
        let reply = feed(&mut dialogue, &["8", "7.5", "8.5", "8", "0", "toan"]);
        assert_eq!(dialogue.step(), Step::AskSpecialtyScore);
        match reply {
            Reply::Next(question) => assert!(question.contains("Toán")),
            other => panic!("unexpected reply: {:?}", other),
        }

        match dialogue.answer("9") {
            Reply::Complete(scores) => assert_eq!(scores.specialty_score(), Some(("Toán", 42.0))),
            other => panic!("unexpected reply: {:?}", other),
        }
    }

    #[test]
    fn invalid_answers_keep_the_step() {
        let mut dialogue = Dialogue::new();
        assert!(matches!(dialogue.answer("11"), Reply::Invalid(_)));
        assert!(matches!(dialogue.answer("eight"), Reply::Invalid(_)));
        assert_eq!(dialogue.step(), Step::AskLiterature);

        feed(&mut dialogue, &["8", "8", "8", "8"]);
        assert!(matches!(dialogue.answer("5.5"), Reply::Invalid(_)));
        assert_eq!(dialogue.step(), Step::AskPriority);

        dialogue.answer("1");
        assert!(matches!(dialogue.answer("Địa lý"), Reply::Invalid(_)));
        assert_eq!(dialogue.step(), Step::AskSpecialtySubject);
    }

    #[test]
    fn restart_returns_to_first_question() {
        let mut dialogue = Dialogue::new();
        feed(&mut dialogue, &["8", "7"]);
        let reply = dialogue.answer("Bắt đầu lại");
        assert_eq!(dialogue.step(), Step::AskLiterature);
        assert_eq!(reply, Reply::Next(Dialogue::new().question()));
    }
}
