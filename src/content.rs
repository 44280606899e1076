//! Question content rules shared by manual adds, bank items and the publish
//! validator.

use crate::model::QuestionType;
use std::collections::HashSet;

/// Trim every option and drop blanks; an empty result collapses to `None`.
pub fn normalize_options(options: Option<&[String]>) -> Option<Vec<String>> {
    let out: Vec<String> = options
        .unwrap_or_default()
        .iter()
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect();
    if out.is_empty() {
        None
    } else {
        Some(out)
    }
}

pub fn normalize_answers(answers: &[String]) -> Vec<String> {
    answers
        .iter()
        .map(|a| a.trim().to_string())
        .filter(|a| !a.is_empty())
        .collect()
}

/// Returns every violated rule in a fixed order; an empty list means valid.
pub fn validate_question_content(
    question_type: QuestionType,
    prompt: &str,
    options: Option<&[String]>,
    correct_answers: &[String],
) -> Vec<String> {
    let mut errors = Vec::new();

    if prompt.trim().is_empty() {
        errors.push("Question prompt cannot be empty.".to_string());
    }

    let answers = normalize_answers(correct_answers);
    if answers.is_empty() {
        errors.push("At least one correct answer is required.".to_string());
    }

    if question_type.is_choice() {
        let option_set: HashSet<String> = normalize_options(options)
            .unwrap_or_default()
            .into_iter()
            .collect();

        if option_set.len() < 2 {
            errors.push(format!(
                "Question type \"{}\" requires at least two options.",
                question_type.as_str()
            ));
        }

        for answer in &answers {
            if !option_set.contains(answer) {
                errors.push(format!("Correct answer \"{}\" must exist in options.", answer));
            }
        }

        if question_type == QuestionType::Mcq && answers.len() != 1 {
            errors.push("MCQ questions must have exactly one correct answer.".to_string());
        }
    }

    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strs(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn options_are_trimmed_and_blank_lists_collapse() {
        let raw = strs(&["  a ", "", "   ", "b"]);
        assert_eq!(normalize_options(Some(&raw[..])), Some(strs(&["a", "b"])));
        assert_eq!(normalize_options(Some(&strs(&[" ", ""])[..])), None);
        assert_eq!(normalize_options(None), None);
    }

    #[test]
    fn valid_mcq_passes() {
        let opts = strs(&["3", "4"]);
        let errs = validate_question_content(QuestionType::Mcq, "2 + 2?", Some(&opts[..]), &strs(&["4"]));
        assert!(errs.is_empty(), "{:?}", errs);
    }

    #[test]
    fn mcq_requires_exactly_one_member_answer() {
        let opts = strs(&["3", "4"]);
        let errs =
            validate_question_content(QuestionType::Mcq, "2 + 2?", Some(&opts[..]), &strs(&["3", "4"]));
        assert_eq!(errs, vec!["MCQ questions must have exactly one correct answer."]);

        let errs = validate_question_content(QuestionType::Mcq, "2 + 2?", Some(&opts[..]), &strs(&["5"]));
        assert_eq!(errs, vec!["Correct answer \"5\" must exist in options."]);
    }

    #[test]
    fn duplicate_options_do_not_count_twice() {
        let opts = strs(&["yes", " yes "]);
        let errs =
            validate_question_content(QuestionType::TrueFalse, "Sky is blue", Some(&opts[..]), &strs(&["yes"]));
        assert_eq!(errs, vec!["Question type \"true_false\" requires at least two options."]);
    }

    #[test]
    fn errors_accumulate_in_order() {
        let errs = validate_question_content(QuestionType::Mcq, "   ", None, &strs(&[" "]));
        assert_eq!(
            errs,
            vec![
                "Question prompt cannot be empty.",
                "At least one correct answer is required.",
                "Question type \"mcq\" requires at least two options.",
                "MCQ questions must have exactly one correct answer.",
            ]
        );
    }

    #[test]
    fn short_text_ignores_options() {
        let errs = validate_question_content(
            QuestionType::ShortText,
            "Capital of France?",
            None,
            &strs(&["Paris"]),
        );
        assert!(errs.is_empty());
    }

    #[test]
    fn multi_select_allows_several_answers() {
        let opts = strs(&["2", "3", "4"]);
        let errs = validate_question_content(
            QuestionType::MultiSelect,
            "Primes?",
            Some(&opts[..]),
            &strs(&["2", " 3"]),
        );
        assert!(errs.is_empty(), "{:?}", errs);
    }
}
