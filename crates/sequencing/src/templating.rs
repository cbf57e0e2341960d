//! Literal template substitution for message personalization.
//!
//! Replaces `{{key}}` tokens with their bound values. Tokens without a
//! matching binding are left verbatim so a degraded message still goes out
//! instead of being dropped.

use std::collections::HashMap;

use crate::types::{RenderedMessage, StepDefinition};

/// Render a single template against the given bindings. Deterministic and
/// side-effect-free.
pub fn render(template: &str, bindings: &HashMap<String, String>) -> String {
    let mut result = template.to_string();
    for (key, value) in bindings {
        let placeholder = format!("{{{{{}}}}}", key);
        result = result.replace(&placeholder, value);
    }
    result
}

/// Render a step's subject and both bodies into a [`RenderedMessage`].
pub fn render_step(step: &StepDefinition, bindings: &HashMap<String, String>) -> RenderedMessage {
    RenderedMessage {
        subject: render(&step.subject, bindings),
        html_body: render(&step.html_body, bindings),
        text_body: render(&step.text_body, bindings),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bindings(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_render_replaces_all_occurrences() {
        let out = render(
            "Hi {{firstName}}, welcome! Really, {{firstName}}.",
            &bindings(&[("firstName", "Ada")]),
        );
        assert_eq!(out, "Hi Ada, welcome! Really, Ada.");
    }

    #[test]
    fn test_render_leaves_unknown_tokens_verbatim() {
        let out = render(
            "Hi {{firstName}} from {{company}}",
            &bindings(&[("firstName", "Ada")]),
        );
        assert_eq!(out, "Hi Ada from {{company}}");
    }

    #[test]
    fn test_render_full_binding_set_leaves_no_tokens() {
        let out = render(
            "{{greeting}} {{firstName}}, your trial of {{product}} is live",
            &bindings(&[
                ("greeting", "Hello"),
                ("firstName", "Ada"),
                ("product", "LeadCadence"),
            ]),
        );
        assert!(!out.contains("{{"));
        assert_eq!(out, "Hello Ada, your trial of LeadCadence is live");
    }

    #[test]
    fn test_render_step_renders_all_parts() {
        let step = StepDefinition {
            id: "welcome".to_string(),
            label: "Welcome".to_string(),
            subject: "Welcome, {{firstName}}".to_string(),
            html_body: "<p>Hi {{firstName}}</p>".to_string(),
            text_body: "Hi {{firstName}}".to_string(),
            delay_secs: 0,
            cta: None,
        };

        let message = render_step(&step, &bindings(&[("firstName", "Ada")]));
        assert_eq!(message.subject, "Welcome, Ada");
        assert_eq!(message.html_body, "<p>Hi Ada</p>");
        assert_eq!(message.text_body, "Hi Ada");
    }
}
