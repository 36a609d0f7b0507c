use std::path::PathBuf;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use quizmark_core::parser::parse_quiz_str;
use quizmark_core::traits::extract_json_payload;

fn bench_extract_json(c: &mut Criterion) {
    let mut group = c.benchmark_group("extract_json");

    let bare = r#"Here is my assessment: {"score": 85, "feedback": "Clear and correct."} Good luck!"#;

    let fenced = r#"Sure, here are the questions:

```json
[
  {"question": "2 + 2?", "options": {"A": "3", "B": "4", "C": "5", "D": "6"}, "correct_answer": "B"},
  {"question": "3 * 3?", "options": {"A": "6", "B": "9", "C": "12", "D": "3"}, "correct_answer": "B"}
]
```
"#;

    let large = {
        let mut s = String::from("```json\n[\n");
        for i in 0..50 {
            s.push_str(&format!(
                "  {{\"question\": \"Q{i}\", \"options\": [\"a\", \"b\", \"c\", \"d\"], \"answer\": \"A\"}},\n"
            ));
        }
        s.push_str("]\n```\n");
        s
    };

    group.bench_function("bare_object", |b| {
        b.iter(|| extract_json_payload(black_box(bare), '{', '}'))
    });

    group.bench_function("fenced_array", |b| {
        b.iter(|| extract_json_payload(black_box(fenced), '[', ']'))
    });

    group.bench_function("large_array", |b| {
        b.iter(|| extract_json_payload(black_box(&large), '[', ']'))
    });

    group.finish();
}

fn bench_parse_quiz(c: &mut Criterion) {
    let mut quiz = String::from("[quiz]\nid = \"bench\"\ntitle = \"Bench\"\nsubject = \"math\"\n");
    for i in 0..100 {
        quiz.push_str(&format!(
            "\n[[questions]]\nid = \"q{i}\"\ntext = \"Question {i}\"\ncorrect = \"B\"\n[questions.options]\nA = \"1\"\nB = \"2\"\nC = \"3\"\nD = \"4\"\n"
        ));
    }
    let path = PathBuf::from("bench.toml");

    c.bench_function("parse_quiz_100_questions", |b| {
        b.iter(|| parse_quiz_str(black_box(&quiz), &path))
    });
}

criterion_group!(benches, bench_extract_json, bench_parse_quiz);
criterion_main!(benches);
