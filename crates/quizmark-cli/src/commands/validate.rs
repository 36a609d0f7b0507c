//! The `quizmark validate` command.

use std::path::PathBuf;

use anyhow::Result;

pub fn execute(quiz_path: PathBuf) -> Result<()> {
    let quizzes = if quiz_path.is_dir() {
        quizmark_core::parser::load_quiz_directory(&quiz_path)?
    } else {
        vec![quizmark_core::parser::parse_quiz(&quiz_path)?]
    };

    let mut total_warnings = 0;

    for quiz in &quizzes {
        match &quiz.generation {
            Some(params) => println!(
                "Quiz: {} (generated, {} questions on {})",
                quiz.title, params.count, params.topic
            ),
            None => println!("Quiz: {} ({} questions)", quiz.title, quiz.questions.len()),
        }

        let warnings = quizmark_core::parser::validate_quiz(quiz);
        for w in &warnings {
            let prefix = w
                .question_id
                .as_ref()
                .map(|id| format!("  [{id}]"))
                .unwrap_or_else(|| "  ".to_string());
            println!("{prefix} WARNING: {}", w.message);
        }
        total_warnings += warnings.len();
    }

    if total_warnings == 0 {
        println!("All quizzes valid.");
    } else {
        println!("\n{total_warnings} warning(s) found.");
    }

    Ok(())
}
