//! The `quizmark init` command.

use std::path::Path;

use anyhow::Result;

pub fn execute() -> Result<()> {
    write_if_missing(Path::new("quizmark.toml"), SAMPLE_CONFIG)?;

    std::fs::create_dir_all("quizzes")?;
    write_if_missing(Path::new("quizzes/example.toml"), EXAMPLE_QUIZ)?;
    write_if_missing(Path::new("quizzes/weekly.toml"), GENERATED_QUIZ)?;

    std::fs::create_dir_all("answers")?;
    write_if_missing(Path::new("answers/example.toml"), EXAMPLE_ANSWERS)?;

    println!("\nNext steps:");
    println!("  1. Set QUIZMARK_API_KEY (or edit quizmark.toml) to enable free-text grading");
    println!("  2. Run: quizmark validate --quiz quizzes");
    println!("  3. Run: quizmark grade --quiz quizzes/example.toml --answers answers/example.toml --learner alice");

    Ok(())
}

fn write_if_missing(path: &Path, content: &str) -> Result<()> {
    if path.exists() {
        println!("{} already exists, skipping.", path.display());
    } else {
        std::fs::write(path, content)?;
        println!("Created {}", path.display());
    }
    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# quizmark configuration

default_provider = "openai"
grader_timeout_secs = 20
max_retries = 1
retry_delay_ms = 500
parallelism = 4
store_path = "./quizmark-data/gradebook.json"
default_code_language = "python"
syntax_check_timeout_secs = 10

[providers.openai]
type = "openai"
api_key = "${OPENAI_API_KEY}"
models = ["gpt-4.1-mini"]

[providers.ollama]
type = "ollama"
base_url = "http://localhost:11434"
model = "llama3.1"
"#;

const EXAMPLE_QUIZ: &str = r#"[quiz]
id = "example"
title = "Example quiz"
subject = "general"

[[questions]]
id = "capital"
type = "multiple_choice"
text = "What is the capital of France?"
points = 10
correct = "B"
[questions.options]
A = "Lyon"
B = "Paris"
C = "Marseille"
D = "Nice"

[[questions]]
id = "planets"
type = "matching"
text = "Match each planet to its position from the sun"
points = 10
pairs = [
    { left = "Mercury", right = "1" },
    { left = "Earth", right = "3" },
]

[[questions]]
id = "photosynthesis"
type = "text"
text = "Explain photosynthesis in one sentence."
points = 10
reference_answer = "Plants turn light, water and carbon dioxide into sugar and oxygen."

[[questions]]
id = "add"
type = "code"
language = "python"
text = "Write a function add(a, b) that returns the sum of a and b."
points = 10
reference_answer = "def add(a, b):\n    return a + b"
"#;

const GENERATED_QUIZ: &str = r#"[quiz]
id = "weekly"
title = "Weekly practice"
subject = "general"

[quiz.generation]
topic = "World geography"
grade_level = "6"
count = 5
"#;

const EXAMPLE_ANSWERS: &str = r#"[answers]
capital = "B"
planets = ["1", "3"]
photosynthesis = "Plants use sunlight to make sugar from water and carbon dioxide."
add = """
def add(a, b):
    return a + b
"""
"#;
