//! Line-oriented driver for walking a flow at a terminal.

use std::io::{BufRead, Write};

use anyhow::{Context, Result, bail};
use formflow_engine::{FlowSession, InputPoint, Submission, expression::format_json_value};
use serde_json::{Map, Value};
use tracing::debug;

use crate::parse_field_value;

const BACK_COMMAND: &str = ":back";
const QUIT_COMMAND: &str = ":quit";

enum Answer {
    Submit(Map<String, Value>),
    Back,
    Quit,
}

/// Prompts for every field of every input step until the flow finishes.
///
/// Returns `None` when the user quits.
pub fn drive<R: BufRead, W: Write>(session: &mut FlowSession<'_>, input: R, mut output: W) -> Result<Option<Value>> {
    let mut lines = input.lines();
    loop {
        let point = session.current().clone();
        render_step(&point, session.depth(), &mut output)?;

        let values = match read_answer(&point, &mut lines, &mut output)? {
            Answer::Submit(values) => values,
            Answer::Back => {
                if !session.back() {
                    writeln!(output, "Already at the first step.")?;
                }
                continue;
            }
            Answer::Quit => {
                debug!(address = %point.address(), "run cancelled");
                return Ok(None);
            }
        };

        match session.submit(values)? {
            Submission::Rejected(errors) => {
                if point.value().defaults.is_empty() {
                    bail!("step {} has no fields but rejects every submission", point.address());
                }
                for error in errors {
                    writeln!(output, "  ! {}: {}", error.field, error.message)?;
                }
            }
            Submission::Advanced => {}
            Submission::Finished(value) => return Ok(Some(value)),
        }
    }
}

fn render_step<W: Write>(point: &InputPoint, depth: usize, output: &mut W) -> Result<()> {
    writeln!(output, "\n== Step {depth} ({}) ==", point.address())?;
    match &point.value().presentation {
        Value::Null => {}
        Value::String(text) => writeln!(output, "{text}")?,
        other => writeln!(output, "{}", serde_json::to_string_pretty(other)?)?,
    }
    Ok(())
}

fn read_answer<B: BufRead, W: Write>(
    point: &InputPoint,
    lines: &mut std::io::Lines<B>,
    output: &mut W,
) -> Result<Answer> {
    let mut values = Map::new();
    for (field, default) in &point.value().defaults {
        write!(output, "{field} [{}]: ", format_json_value(default))?;
        output.flush()?;

        let Some(line) = lines.next() else {
            bail!("input ended before the flow finished");
        };
        let line = line.context("Failed to read answer")?;
        let value = match line.trim() {
            BACK_COMMAND => return Ok(Answer::Back),
            QUIT_COMMAND => return Ok(Answer::Quit),
            "" => default.clone(),
            text => parse_field_value(text),
        };
        values.insert(field.clone(), value);
    }
    Ok(Answer::Submit(values))
}

#[cfg(test)]
mod tests {
    use super::*;
    use formflow_engine::parse_flow_str;
    use serde_json::json;
    use std::io::Cursor;

    const FLOW: &str = r#"
- form:
    defaults: { name: "", age: 30 }
    validators:
      name: [["name != ''", "Name is required"]]
    presentation: "Tell us about yourself"
- form:
    defaults: { color: "blue" }
    presentation: { title: "Favourite color, ${{ name }}?" }
- return: { name: "${{ name }}", age: "${{ age }}", color: "${{ color }}" }
"#;

    fn run(script: &str) -> (Result<Option<Value>>, String) {
        let flow = parse_flow_str(FLOW).unwrap();
        let mut session = FlowSession::start(&flow).unwrap();
        let mut output = Vec::new();
        let result = drive(&mut session, Cursor::new(script.to_string()), &mut output);
        (result, String::from_utf8(output).unwrap())
    }

    #[test]
    fn empty_answers_keep_defaults() {
        let (result, transcript) = run("Ada\n\n\n");
        assert_eq!(result.unwrap(), Some(json!({ "name": "Ada", "age": 30, "color": "blue" })));
        assert!(transcript.contains("Tell us about yourself"));
        assert!(transcript.contains("Favourite color, Ada?"));
    }

    #[test]
    fn validation_messages_are_shown_and_step_repeats() {
        let (result, transcript) = run("\n41\nGrace\n41\ngreen\n");
        assert_eq!(result.unwrap(), Some(json!({ "name": "Grace", "age": 41, "color": "green" })));
        assert!(transcript.contains("! name: Name is required"));
        assert_eq!(transcript.matches("== Step 1").count(), 2);
    }

    #[test]
    fn back_returns_to_submitted_values() {
        let (result, transcript) = run("Ada\n7\n:back\n\n\n\n");
        assert_eq!(result.unwrap(), Some(json!({ "name": "Ada", "age": 7, "color": "blue" })));
        assert!(transcript.contains("age [7]: "));
    }

    #[test]
    fn back_on_first_step_is_reported() {
        let (result, transcript) = run(":back\n:quit\n");
        assert_eq!(result.unwrap(), None);
        assert!(transcript.contains("Already at the first step."));
    }

    #[test]
    fn running_out_of_input_is_an_error() {
        let (result, _) = run("Ada\n");
        assert!(result.unwrap_err().to_string().contains("input ended"));
    }
}
