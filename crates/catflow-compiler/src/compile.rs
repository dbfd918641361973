//! Compile a cat's steps into a router instruction document.
//!
//! Compilation is a pure function of its inputs: the same name, description
//! and step order always produce byte-identical output.

use catflow_types::{
    CompiledPipeline, InstructionDocument, RouterStepInstruction, Step, StepKind,
};
use tracing::debug;

use crate::codec;

/// Router model id for vision steps without an override.
pub const VISION_ROUTE_MODEL: &str = "vision-http";
pub const TRANSFORM_JS_ROUTE_MODEL: &str = "transform-js";
pub const TRANSFORM_PY_ROUTE_MODEL: &str = "transform-py";

const ORDER_POLICY: &str =
    "Kittens run in the order listed. Each kitten receives the previous kitten's output as its input.";
const OUTPUT_POLICY: &str =
    "Only the final kitten's output is shown to the user; intermediate outputs are internal.";
const PASS_THROUGH: &str =
    "OUTPUT: Produce only what the next kitten needs as its input. Do not address the user.";
const FINAL_STEP: &str =
    "FINAL_STEP: This is the last kitten. Your output is the answer returned to the user.";

/// Compile `steps` into model ids plus a serialized instruction document.
pub fn compile(name: &str, description: &str, steps: &[Step]) -> CompiledPipeline {
    let model_ids: Vec<String> = steps
        .iter()
        .filter_map(Step::model_id)
        .map(String::from)
        .collect();

    let doc = InstructionDocument {
        global: global_directive(name, description),
        steps: steps
            .iter()
            .enumerate()
            .map(|(i, step)| {
                let is_last = i + 1 == steps.len();
                RouterStepInstruction::new(
                    (i + 1) as u32,
                    route_model(step),
                    step_body(step, is_last),
                )
            })
            .collect(),
    };

    let instructions = codec::serialize(&doc);
    debug!(
        cat = name,
        steps = doc.steps.len(),
        models = model_ids.len(),
        bytes = instructions.len(),
        "compiled cat"
    );

    CompiledPipeline {
        model_ids,
        instructions,
    }
}

/// Pipeline-wide directive text.
pub fn global_directive(name: &str, description: &str) -> String {
    let name = name.trim();
    let name = if name.is_empty() { "Untitled cat" } else { name };

    let mut lines = vec![format!("You are running the cat \"{name}\".")];
    if !description.trim().is_empty() {
        lines.push(description.to_string());
    }
    lines.push(ORDER_POLICY.to_string());
    lines.push(OUTPUT_POLICY.to_string());
    lines.join("\n")
}

/// Model id the router addresses this step by.
pub fn route_model(step: &Step) -> String {
    let fixed = match &step.kind {
        StepKind::VisionHttp { .. } => VISION_ROUTE_MODEL,
        StepKind::TransformJs { .. } => TRANSFORM_JS_ROUTE_MODEL,
        StepKind::TransformPy { .. } => TRANSFORM_PY_ROUTE_MODEL,
        StepKind::Model { .. } | StepKind::ImageGen { .. } => "",
    };
    step.model_id().unwrap_or(fixed).to_lowercase()
}

fn step_body(step: &Step, is_last: bool) -> String {
    let mut lines = vec![format!("KITTEN_NAME: {}", step.name.trim())];

    match &step.kind {
        StepKind::Model { instructions, .. } => push_text(&mut lines, instructions),
        StepKind::VisionHttp {
            path,
            image_source,
            instructions,
            ..
        } => {
            lines.push(format!("VISION_PATH: {}", path.trim()));
            lines.push(format!("IMAGE_SOURCE: {}", image_source.as_str()));
            if let Some(text) = instructions {
                push_text(&mut lines, text);
            }
        }
        StepKind::ImageGen {
            image_source,
            system_instructions,
            instructions,
            ..
        } => {
            lines.push(format!("IMAGE_SOURCE: {}", image_source.as_str()));
            if !system_instructions.trim().is_empty() {
                lines.push(format!("SYSTEM_INSTRUCTIONS: {}", system_instructions.trim()));
            }
            push_text(&mut lines, instructions);
        }
        StepKind::TransformJs { code } => push_code(&mut lines, "js", code),
        StepKind::TransformPy { code } => push_code(&mut lines, "py", code),
    }

    lines.push(if is_last { FINAL_STEP } else { PASS_THROUGH }.to_string());
    lines.join("\n")
}

fn push_text(lines: &mut Vec<String>, text: &str) {
    let text = text.trim();
    if !text.is_empty() {
        lines.push(text.to_string());
    }
}

fn push_code(lines: &mut Vec<String>, language: &str, code: &str) {
    lines.push(format!("TRANSFORM_LANGUAGE: {language}"));
    lines.push(format!("```{language}\n{}\n```", code.trim()));
}

#[cfg(test)]
mod tests {
    use super::*;
    use catflow_types::ImageSource;

    fn model(name: &str, model_id: &str, instructions: &str) -> Step {
        Step {
            id: name.to_lowercase(),
            name: name.into(),
            kind: StepKind::Model {
                model_id: model_id.into(),
                instructions: instructions.into(),
            },
        }
    }

    fn vision(name: &str, model_id: Option<&str>) -> Step {
        Step {
            id: name.to_lowercase(),
            name: name.into(),
            kind: StepKind::VisionHttp {
                path: "/sam3/segment".into(),
                image_source: ImageSource::PreviousOverlay,
                model_id: model_id.map(String::from),
                instructions: None,
            },
        }
    }

    #[test]
    fn single_step_document() {
        let compiled = compile(
            "Roof Inspector",
            "Finds roof edges.",
            &[model("Draft", "Gemini-3-Flash", "Describe the roof.")],
        );
        assert_eq!(compiled.model_ids, vec!["Gemini-3-Flash"]);
        insta::assert_snapshot!(compiled.instructions, @r#"
        [router]
        You are running the cat "Roof Inspector".
        Finds roof edges.
        Kittens run in the order listed. Each kitten receives the previous kitten's output as its input.
        Only the final kitten's output is shown to the user; intermediate outputs are internal.
        [/router]

        [step index="1" model="gemini-3-flash"]
        KITTEN_NAME: Draft
        Describe the roof.
        FINAL_STEP: This is the last kitten. Your output is the answer returned to the user.
        [/step]
        "#);
    }

    #[test]
    fn blank_description_is_omitted() {
        let global = global_directive("Cat", "   ");
        assert_eq!(global.lines().count(), 3);
        assert!(global.starts_with("You are running the cat \"Cat\"."));
    }

    #[test]
    fn blank_name_gets_placeholder() {
        assert!(global_directive(" ", "").contains("\"Untitled cat\""));
    }

    #[test]
    fn markers_distinguish_last_step() {
        let compiled = compile(
            "c",
            "",
            &[model("One", "a", "first"), model("Two", "b", "second")],
        );
        let doc = codec::parse(&compiled.instructions);
        assert_eq!(doc.steps.len(), 2);
        assert!(doc.steps[0].instructions.ends_with(PASS_THROUGH));
        assert!(doc.steps[1].instructions.ends_with(FINAL_STEP));
        assert!(!doc.steps[0].instructions.contains("FINAL_STEP"));
    }

    #[test]
    fn model_ids_skip_steps_without_models() {
        let steps = vec![
            model("Draft", "gpt-4o", ""),
            vision("Segment", None),
            vision("Overlay", Some("sam3-large")),
            Step {
                id: "t".into(),
                name: "Clean".into(),
                kind: StepKind::TransformJs {
                    code: "function transform(input, ctx) { return input; }".into(),
                },
            },
        ];
        let compiled = compile("c", "", &steps);
        assert_eq!(compiled.model_ids, vec!["gpt-4o", "sam3-large"]);

        let doc = codec::parse(&compiled.instructions);
        let routes: Vec<&str> = doc.steps.iter().map(|s| s.model_id.as_str()).collect();
        assert_eq!(routes, vec!["gpt-4o", "vision-http", "sam3-large", "transform-js"]);
    }

    #[test]
    fn every_step_survives_serialization() {
        let steps = vec![
            model("A", "m", ""),
            vision("B", None),
            Step {
                id: "g".into(),
                name: "Paint".into(),
                kind: StepKind::ImageGen {
                    image_source: ImageSource::Original,
                    model_id: "imagen-4".into(),
                    system_instructions: "Flat colors.".into(),
                    instructions: "Paint the gutters blue.".into(),
                },
            },
            Step {
                id: "p".into(),
                name: "Py".into(),
                kind: StepKind::TransformPy {
                    code: "def transform(input, ctx):\n    return input".into(),
                },
            },
        ];
        let doc = codec::parse(&compile("c", "", &steps).instructions);
        let indices: Vec<u32> = doc.steps.iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![1, 2, 3, 4]);
        assert!(doc.steps[1].instructions.contains("VISION_PATH: /sam3/segment"));
        assert!(doc.steps[1].instructions.contains("IMAGE_SOURCE: previous_overlay"));
        assert!(doc.steps[2].instructions.contains("SYSTEM_INSTRUCTIONS: Flat colors."));
        assert!(doc.steps[3].instructions.contains("TRANSFORM_LANGUAGE: py"));
        assert!(doc.steps[3].instructions.contains("def transform(input, ctx):"));
    }

    #[test]
    fn compile_is_deterministic() {
        let steps = vec![model("A", "m", "x"), vision("B", None)];
        assert_eq!(compile("c", "d", &steps), compile("c", "d", &steps));
    }

    #[test]
    fn compile_with_no_steps_is_plain_global() {
        let compiled = compile("Solo", "", &[]);
        assert!(compiled.model_ids.is_empty());
        assert!(!codec::is_structured(&compiled.instructions));
        assert_eq!(compiled.instructions, global_directive("Solo", ""));
    }
}
