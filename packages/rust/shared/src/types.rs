//! Core domain types for QuizBuilder quizzes and authoring sessions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// SessionId
// ---------------------------------------------------------------------------

/// A UUID v7 wrapper for authoring-session identifiers (time-sortable).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Generate a new time-sortable session identifier.
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for SessionId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

// ---------------------------------------------------------------------------
// Label / QuestionKind
// ---------------------------------------------------------------------------

/// One of the four answer slots of a multiple-choice question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Label {
    A,
    B,
    C,
    D,
}

impl Label {
    /// All labels in display order.
    pub const ALL: [Label; 4] = [Label::A, Label::B, Label::C, Label::D];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
        }
    }
}

impl std::fmt::Display for Label {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Label {
    type Err = String;

    /// Case-insensitive; tolerates surrounding whitespace and a trailing `)` or `.`.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let trimmed = s.trim().trim_end_matches([')', '.', ':']).trim();
        match trimmed.to_ascii_uppercase().as_str() {
            "A" => Ok(Self::A),
            "B" => Ok(Self::B),
            "C" => Ok(Self::C),
            "D" => Ok(Self::D),
            _ => Err(format!("not an answer label: {s:?}")),
        }
    }
}

/// Presentation kind of a master question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    #[default]
    Short,
    Long,
    Image,
}

impl QuestionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Short => "short",
            Self::Long => "long",
            Self::Image => "image",
        }
    }
}

impl std::fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for QuestionKind {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "short" => Ok(Self::Short),
            "long" => Ok(Self::Long),
            "image" => Ok(Self::Image),
            other => Err(format!("unknown question kind: {other:?}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Question
// ---------------------------------------------------------------------------

/// A problem found while decoding or validating a [`Question`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationIssue {
    NotAnObject,
    MissingPrompt,
    MissingOption(Label),
    EmptyOption(Label),
    UnexpectedOption(String),
    MissingCorrectAnswer,
    InvalidCorrectAnswer(String),
    CorrectAnswerNotInOptions(Label),
    MissingExplanation,
}

impl std::fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotAnObject => f.write_str("element is not a JSON object"),
            Self::MissingPrompt => f.write_str("missing question text"),
            Self::MissingOption(l) => write!(f, "missing option {l}"),
            Self::EmptyOption(l) => write!(f, "option {l} is empty"),
            Self::UnexpectedOption(k) => write!(f, "unexpected option label {k:?}"),
            Self::MissingCorrectAnswer => f.write_str("missing correctAnswer"),
            Self::InvalidCorrectAnswer(v) => write!(f, "correctAnswer {v:?} is not A, B, C or D"),
            Self::CorrectAnswerNotInOptions(l) => {
                write!(f, "correctAnswer {l} has no matching option")
            }
            Self::MissingExplanation => f.write_str("missing explanation"),
        }
    }
}

/// The canonical multiple-choice question.
///
/// Fields are lenient so partially generated questions can be reviewed;
/// [`Question::validate`] enforces the invariant before anything is stored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(rename = "question", alias = "prompt", default)]
    pub prompt: String,
    #[serde(default)]
    pub options: BTreeMap<Label, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<Label>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(rename = "type", alias = "kind", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<QuestionKind>,
}

impl Question {
    /// Invariant check: prompt present, all four options non-empty,
    /// a correct answer that names an option, and an explanation.
    pub fn validate(&self) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        if self.prompt.trim().is_empty() {
            issues.push(ValidationIssue::MissingPrompt);
        }

        for label in Label::ALL {
            match self.options.get(&label) {
                None => issues.push(ValidationIssue::MissingOption(label)),
                Some(text) if text.trim().is_empty() => {
                    issues.push(ValidationIssue::EmptyOption(label))
                }
                Some(_) => {}
            }
        }

        match self.correct_answer {
            None => issues.push(ValidationIssue::MissingCorrectAnswer),
            Some(label) if !self.options.contains_key(&label) => {
                issues.push(ValidationIssue::CorrectAnswerNotInOptions(label))
            }
            Some(_) => {}
        }

        if self.explanation.is_none() {
            issues.push(ValidationIssue::MissingExplanation);
        }

        issues
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }

    /// Decode whatever JSON a model produced into a question.
    ///
    /// Never fails: every deviation is reported as an issue and the closest
    /// usable question is returned. Decode issues come first, followed by
    /// the [`Question::validate`] findings.
    pub fn from_value(value: &Value) -> (Question, Vec<ValidationIssue>) {
        let Some(obj) = value.as_object() else {
            let question = Question::default();
            let mut issues = vec![ValidationIssue::NotAnObject];
            issues.extend(question.validate());
            return (question, issues);
        };

        let mut issues = Vec::new();
        let mut question = Question {
            prompt: first_string(obj, &["question", "prompt", "text"]).unwrap_or_default(),
            ..Default::default()
        };

        match obj.get("options") {
            Some(Value::Object(map)) => {
                for (key, raw) in map {
                    match key.parse::<Label>() {
                        Ok(label) => {
                            question.options.insert(label, scalar_to_string(raw));
                        }
                        Err(_) => issues.push(ValidationIssue::UnexpectedOption(key.clone())),
                    }
                }
            }
            Some(Value::Array(items)) => {
                for (i, raw) in items.iter().enumerate() {
                    match Label::ALL.get(i) {
                        Some(label) => {
                            question.options.insert(*label, scalar_to_string(raw));
                        }
                        None => issues.push(ValidationIssue::UnexpectedOption(format!("#{}", i + 1))),
                    }
                }
            }
            _ => {}
        }

        let answer = ["correctAnswer", "correct_answer", "answer"]
            .iter()
            .find_map(|k| obj.get(*k));
        if let Some(raw) = answer {
            let raw = scalar_to_string(raw);
            match raw.parse::<Label>() {
                Ok(label) => question.correct_answer = Some(label),
                Err(_) => issues.push(ValidationIssue::InvalidCorrectAnswer(raw)),
            }
        }

        question.explanation = first_string(obj, &["explanation"]);

        question.kind = ["type", "kind"]
            .iter()
            .find_map(|k| obj.get(*k))
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok());

        for issue in question.validate() {
            // A bad correctAnswer string is already reported as invalid.
            if issue == ValidationIssue::MissingCorrectAnswer
                && issues
                    .iter()
                    .any(|i| matches!(i, ValidationIssue::InvalidCorrectAnswer(_)))
            {
                continue;
            }
            issues.push(issue);
        }

        (question, issues)
    }

    /// Text of the correct option, if any.
    pub fn correct_option(&self) -> Option<&str> {
        self.correct_answer
            .and_then(|label| self.options.get(&label))
            .map(String::as_str)
    }
}

fn first_string(obj: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter()
        .find_map(|k| obj.get(*k))
        .filter(|v| !v.is_null())
        .map(scalar_to_string)
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.trim().to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

// ---------------------------------------------------------------------------
// Shape / QuestionSet
// ---------------------------------------------------------------------------

/// The payload shape a pipeline stage expects from the formatter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Shape {
    Single,
    Array,
}

impl Shape {
    pub fn is_array(&self) -> bool {
        matches!(self, Self::Array)
    }
}

/// Formatter output: one question or an ordered, non-empty batch.
///
/// Serializes as the bare object or array.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum QuestionSet {
    Single(Question),
    Many(Vec<Question>),
}

impl QuestionSet {
    pub fn len(&self) -> usize {
        match self {
            Self::Single(_) => 1,
            Self::Many(questions) => questions.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_vec(self) -> Vec<Question> {
        match self {
            Self::Single(q) => vec![q],
            Self::Many(questions) => questions,
        }
    }
}

// ---------------------------------------------------------------------------
// Conversation
// ---------------------------------------------------------------------------

/// Speaker of a chat turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One turn of a chat conversation, in chat-completion wire form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Stage
// ---------------------------------------------------------------------------

/// Authoring stage. Ordered and one-directional.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    #[default]
    CreateMaster,
    GenerateVariations,
    Review,
}

impl Stage {
    /// The stage that follows this one, if any.
    pub fn next(&self) -> Option<Stage> {
        match self {
            Self::CreateMaster => Some(Self::GenerateVariations),
            Self::GenerateVariations => Some(Self::Review),
            Self::Review => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateMaster => "create_master",
            Self::GenerateVariations => "generate_variations",
            Self::Review => "review",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Question {
        Question {
            prompt: "2+2 ?".into(),
            options: Label::ALL
                .iter()
                .zip(["3", "4", "5", "6"])
                .map(|(l, t)| (*l, t.to_string()))
                .collect(),
            correct_answer: Some(Label::B),
            explanation: Some("2 et 2 font 4.".into()),
            kind: None,
        }
    }

    #[test]
    fn session_id_roundtrip() {
        let id = SessionId::new();
        let parsed: SessionId = id.to_string().parse().expect("parse SessionId");
        assert_eq!(id, parsed);
    }

    #[test]
    fn complete_question_is_valid() {
        assert!(sample().is_valid());
        assert_eq!(sample().correct_option(), Some("4"));
    }

    #[test]
    fn missing_option_invalidates() {
        let mut q = sample();
        q.options.remove(&Label::D);
        assert_eq!(q.validate(), vec![ValidationIssue::MissingOption(Label::D)]);
    }

    #[test]
    fn empty_option_invalidates() {
        let mut q = sample();
        q.options.insert(Label::C, "   ".into());
        assert_eq!(q.validate(), vec![ValidationIssue::EmptyOption(Label::C)]);
    }

    #[test]
    fn correct_answer_must_name_an_option() {
        let mut q = sample();
        q.options.remove(&Label::B);
        let issues = q.validate();
        assert!(issues.contains(&ValidationIssue::CorrectAnswerNotInOptions(Label::B)));
        assert!(!q.is_valid());
    }

    #[test]
    fn missing_explanation_invalidates() {
        let mut q = sample();
        q.explanation = None;
        assert_eq!(q.validate(), vec![ValidationIssue::MissingExplanation]);
    }

    #[test]
    fn label_parsing_is_lenient() {
        assert_eq!("b".parse::<Label>().unwrap(), Label::B);
        assert_eq!(" C) ".parse::<Label>().unwrap(), Label::C);
        assert!("E".parse::<Label>().is_err());
        assert!("AB".parse::<Label>().is_err());
    }

    #[test]
    fn question_wire_format() {
        let json = serde_json::to_value(sample()).expect("serialize");
        assert_eq!(json["question"], "2+2 ?");
        assert_eq!(json["correctAnswer"], "B");
        assert_eq!(json["options"]["A"], "3");
        assert!(json.get("type").is_none());

        let back: Question = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, sample());
    }

    #[test]
    fn from_value_accepts_well_formed_payload() {
        let value = json!({
            "question": "2+2 ?",
            "options": {"A": "3", "B": "4", "C": "5", "D": "6"},
            "correctAnswer": "B",
            "explanation": "2 et 2 font 4.",
            "type": "short"
        });
        let (q, issues) = Question::from_value(&value);
        assert!(issues.is_empty(), "{issues:?}");
        assert_eq!(q.kind, Some(QuestionKind::Short));
        assert_eq!(q.correct_answer, Some(Label::B));
    }

    #[test]
    fn from_value_reports_unknown_labels_and_missing_fields() {
        let value = json!({
            "question": "Quelle couleur ?",
            "options": {"a": "rouge", "b": "vert", "c": "bleu", "e": "jaune"},
            "correctAnswer": "a"
        });
        let (q, issues) = Question::from_value(&value);
        assert_eq!(q.options.len(), 3);
        assert!(issues.contains(&ValidationIssue::UnexpectedOption("e".into())));
        assert!(issues.contains(&ValidationIssue::MissingOption(Label::D)));
        assert!(issues.contains(&ValidationIssue::MissingExplanation));
    }

    #[test]
    fn from_value_maps_option_arrays_in_order() {
        let value = json!({
            "prompt": "Combien de pattes a une araignée ?",
            "options": ["6", 8, "10", "4"],
            "answer": "B",
            "explanation": "Les araignées ont huit pattes."
        });
        let (q, issues) = Question::from_value(&value);
        assert!(issues.is_empty(), "{issues:?}");
        assert_eq!(q.options[&Label::B], "8");
    }

    #[test]
    fn from_value_bad_answer_reported_once() {
        let value = json!({
            "question": "?",
            "options": {"A": "1", "B": "2", "C": "3", "D": "4"},
            "correctAnswer": "Z",
            "explanation": "."
        });
        let (_, issues) = Question::from_value(&value);
        assert_eq!(issues, vec![ValidationIssue::InvalidCorrectAnswer("Z".into())]);
    }

    #[test]
    fn from_value_non_object() {
        let (q, issues) = Question::from_value(&json!("juste du texte"));
        assert_eq!(q, Question::default());
        assert_eq!(issues[0], ValidationIssue::NotAnObject);
    }

    #[test]
    fn stage_order_is_monotonic() {
        assert!(Stage::CreateMaster < Stage::GenerateVariations);
        assert!(Stage::GenerateVariations < Stage::Review);
        assert_eq!(Stage::CreateMaster.next(), Some(Stage::GenerateVariations));
        assert_eq!(Stage::Review.next(), None);
        assert_eq!(Stage::GenerateVariations.to_string(), "generate_variations");
    }

    #[test]
    fn chat_message_wire_format() {
        let json = serde_json::to_string(&ChatMessage::assistant("Bonjour")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"Bonjour"}"#);
    }

    #[test]
    fn question_set_len() {
        assert_eq!(QuestionSet::Single(sample()).len(), 1);
        assert_eq!(QuestionSet::Many(vec![sample(), sample()]).into_vec().len(), 2);
    }
}
