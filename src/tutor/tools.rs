//! The four tutor tools. Each helper takes the session state by `&mut` and
//! returns a small serialisable answer; none of them can fail.

use std::{convert::Infallible, sync::LazyLock};

use regex::Regex;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::{math, state::SessionState, tool::Tool};

/// Digits, whitespace, parentheses, decimal points and arithmetic operators only.
static ARITHMETIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9\s+\-*/().%^]+$").expect("valid arithmetic pattern"));

const ALGEBRA_HINT: &str = "Attempted algebraic steps (use CAS for full solution)";
const GENERIC_HINT: &str = "I can help outline steps: please provide the exact expression \
     or ask for a numeric evaluation.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnswerKind {
    NumericEval,
    AlgebraHint,
    Hint,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Solution {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl From<f64> for Solution {
    /// Whole numbers are reported without a fractional part.
    fn from(value: f64) -> Self {
        if value.fract() == 0.0 && value.abs() < 9.0e15 {
            Solution::Integer(value as i64)
        } else {
            Solution::Float(value)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MathAnswer {
    pub topic: String,
    pub solution: Solution,
    #[serde(rename = "type")]
    pub kind: AnswerKind,
}

pub fn solve_math(problem: &str, state: &mut SessionState) -> MathAnswer {
    state.record_topic(format!("math:{problem}"));

    let expression = problem.replace('^', "**");
    if ARITHMETIC.is_match(&expression) {
        match math::evaluate(&expression) {
            Ok(value) => {
                return MathAnswer {
                    topic: problem.to_string(),
                    solution: value.into(),
                    kind: AnswerKind::NumericEval,
                };
            }
            Err(e) => debug!("no numeric solution for {:?}: {}", problem, e),
        }
    }

    let algebra_like = problem.to_lowercase().contains("solve") || problem.contains('=');
    if algebra_like && problem.matches('=').count() == 1 {
        return MathAnswer {
            topic: problem.to_string(),
            solution: Solution::Text(ALGEBRA_HINT.to_string()),
            kind: AnswerKind::AlgebraHint,
        };
    }

    MathAnswer {
        topic: problem.to_string(),
        solution: Solution::Text(GENERIC_HINT.to_string()),
        kind: AnswerKind::Hint,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ReadingLevel {
    Elementary,
    #[default]
    HighSchool,
    Undergrad,
}

impl ReadingLevel {
    /// Unknown labels read as the default level.
    pub fn from_label(label: &str) -> Self {
        match label {
            "elementary" => ReadingLevel::Elementary,
            "undergrad" => ReadingLevel::Undergrad,
            _ => ReadingLevel::HighSchool,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            ReadingLevel::Elementary => "elementary",
            ReadingLevel::HighSchool => "high-school",
            ReadingLevel::Undergrad => "undergrad",
        }
    }

    fn detail(&self) -> &'static str {
        match self {
            ReadingLevel::Elementary => {
                "Short, simple points and examples suitable for young learners."
            }
            ReadingLevel::HighSchool => {
                "Clear explanations, key devices and sample questions for discussion."
            }
            ReadingLevel::Undergrad => {
                "Deeper analysis: themes, devices, historic context, \
                 and critical reading suggestions."
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub prompt: String,
    pub level: ReadingLevel,
    pub explanation: String,
    #[serde(rename = "type")]
    pub kind: String,
}

pub fn explain_literature(
    prompt: &str,
    state: &mut SessionState,
    level: Option<&str>,
) -> Explanation {
    let level = level.map(ReadingLevel::from_label).unwrap_or_default();
    state.record_topic(format!("lit:{prompt}|{}", level.label()));
    Explanation {
        prompt: prompt.to_string(),
        level,
        explanation: format!("Explanation for '{prompt}' ({}): {}", level.label(), level.detail()),
        kind: "literature".to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Translation {
    pub original: String,
    pub translated: String,
    pub target_language: String,
}

/// Tags the text with the target language code. An empty target leaves the
/// preferred language alone.
pub fn translate_text(
    text: &str,
    state: &mut SessionState,
    target_language: &str,
) -> Translation {
    if !target_language.is_empty() {
        state.set_preferred_language(target_language);
    }
    Translation {
        original: text.to_string(),
        translated: format!("[{target_language}] {text}"),
        target_language: target_language.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressView {
    pub progress: Value,
    pub recent_topics: Vec<String>,
    pub preferred_language: Option<String>,
}

pub fn get_progress(state: &SessionState) -> ProgressView {
    ProgressView {
        progress: state.progress.clone(),
        recent_topics: state.recent_topics.clone(),
        preferred_language: state.preferred_language.clone(),
    }
}

/// Arguments of `solve_math`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SolveMathArgs {
    /// A short expression or problem statement, e.g. "2+3*4" or "solve 2x+3=7"
    pub problem: String,
}

/// Arguments of `explain_literature`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExplainLiteratureArgs {
    /// A poem name, passage, or question, e.g. "explain Macbeth Act 1 scene 5"
    pub prompt: String,
    /// Depth of the explanation: "elementary", "high-school" (default) or "undergrad"
    #[serde(default)]
    pub level: Option<String>,
}

fn default_target_language() -> String {
    "en".to_string()
}

/// Arguments of `translate_text`.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TranslateTextArgs {
    /// Text to translate
    pub text: String,
    /// Language code to translate into; also becomes the preferred language
    #[serde(default = "default_target_language")]
    pub target_language: String,
}

/// `get_progress` takes no arguments.
#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct NoArgs {}

pub struct SolveMathTool;

impl Tool for SolveMathTool {
    type Args = SolveMathArgs;
    type Output = MathAnswer;
    type Error = Infallible;
    fn name() -> String {
        "solve_math".to_string()
    }
    fn description() -> Option<String> {
        Some(
            "Evaluate a numeric expression, or give step hints for an algebra question. \
             Records the problem in the session's recent topics."
                .to_string(),
        )
    }
    fn call(
        &self,
        args: Self::Args,
        state: &mut SessionState,
    ) -> Result<Self::Output, Self::Error> {
        Ok(solve_math(&args.problem, state))
    }
}

pub struct ExplainLiteratureTool;

impl Tool for ExplainLiteratureTool {
    type Args = ExplainLiteratureArgs;
    type Output = Explanation;
    type Error = Infallible;
    fn name() -> String {
        "explain_literature".to_string()
    }
    fn description() -> Option<String> {
        Some(
            "Give a short, leveled explanation of a literary topic such as a theme, poem, \
             or passage summary."
                .to_string(),
        )
    }
    fn call(
        &self,
        args: Self::Args,
        state: &mut SessionState,
    ) -> Result<Self::Output, Self::Error> {
        Ok(explain_literature(&args.prompt, state, args.level.as_deref()))
    }
}

pub struct TranslateTextTool;

impl Tool for TranslateTextTool {
    type Args = TranslateTextArgs;
    type Output = Translation;
    type Error = Infallible;
    fn name() -> String {
        "translate_text".to_string()
    }
    fn description() -> Option<String> {
        Some(
            "Translate text into the target language and switch the student's preferred \
             language to it."
                .to_string(),
        )
    }
    fn call(
        &self,
        args: Self::Args,
        state: &mut SessionState,
    ) -> Result<Self::Output, Self::Error> {
        Ok(translate_text(&args.text, state, &args.target_language))
    }
}

pub struct GetProgressTool;

impl Tool for GetProgressTool {
    type Args = NoArgs;
    type Output = ProgressView;
    type Error = Infallible;
    fn name() -> String {
        "get_progress".to_string()
    }
    fn description() -> Option<String> {
        Some(
            "Return session-level progress and the topics the student worked on recently."
                .to_string(),
        )
    }
    fn call(
        &self,
        _args: Self::Args,
        state: &mut SessionState,
    ) -> Result<Self::Output, Self::Error> {
        Ok(get_progress(state))
    }
}
