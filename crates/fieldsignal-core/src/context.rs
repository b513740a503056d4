use fieldsignal_common::{EntityType, HopType};

const DEFAULT_CONTENT_TRUNCATE_CHARS: usize = 8_000;

/// Everything the judge prompt needs, shaped exactly.C6. Pure
/// and deterministic for fixed inputs — no clock, no randomness.
#[derive(Debug, Clone)]
pub struct JudgeContext {
    pub entity_name: String,
    pub entity_type: EntityType,
    pub template_signal_patterns: Vec<String>,
    pub hop_type: HopType,
    pub hypothesis_statement: String,
    pub current_confidence: f64,
    pub previous_evidence_strings: Vec<String>,
    pub fetched_content: String,
    pub mcp_evidence_patterns: Vec<String>,
}

/// Assembles judge prompt input. Truncates fetched content
/// to `K` characters so the builder's output stays deterministic and bounded
/// regardless of scrape size.
pub struct ContextBuilder {
    truncate_chars: usize,
}

impl Default for ContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ContextBuilder {
    pub fn new() -> Self {
        Self {
            truncate_chars: DEFAULT_CONTENT_TRUNCATE_CHARS,
        }
    }

    pub fn with_truncate_chars(mut self, k: usize) -> Self {
        self.truncate_chars = k;
        self
    }

    #[allow(clippy::too_many_arguments)]
    pub fn build(
        &self,
        entity_name: &str,
        entity_type: EntityType,
        template_signal_patterns: &[String],
        hop_type: HopType,
        hypothesis_statement: &str,
        current_confidence: f64,
        previous_evidence_strings: &[String],
        fetched_content: &str,
        mcp_evidence_patterns: &[String],
    ) -> JudgeContext {
        JudgeContext {
            entity_name: entity_name.to_string(),
            entity_type,
            template_signal_patterns: template_signal_patterns.to_vec(),
            hop_type,
            hypothesis_statement: hypothesis_statement.to_string(),
            current_confidence,
            previous_evidence_strings: previous_evidence_strings.to_vec(),
            fetched_content: truncate_chars(fetched_content, self.truncate_chars),
            mcp_evidence_patterns: mcp_evidence_patterns.to_vec(),
        }
    }

    /// Renders the prompt text actually sent to the LLM.
    pub fn render_prompt(&self, ctx: &JudgeContext) -> String {
        format!(
            "Entity: {} ({})\nHop type: {}\nHypothesis: {}\nCurrent confidence: {:.2}\n\
             Known signal patterns: {}\nMCP evidence patterns: {}\n\
             Previous evidence:\n{}\n\nFetched content:\n{}\n\n\
             Respond with JSON: {{decision, confidence_delta, justification, evidence_found, evidence_type}}.",
            ctx.entity_name,
            ctx.entity_type,
            ctx.hop_type,
            ctx.hypothesis_statement,
            ctx.current_confidence,
            ctx.template_signal_patterns.join(", "),
            ctx.mcp_evidence_patterns.join(", "),
            bullet_list(&ctx.previous_evidence_strings),
            ctx.fetched_content,
        )
    }
}

fn bullet_list(items: &[String]) -> String {
    if items.is_empty() {
        return "(none)".to_string();
    }
    items.iter().map(|i| format!("- {i}")).collect::<Vec<_>>().join("\n")
}

fn truncate_chars(content: &str, k: usize) -> String {
    if content.chars().count() <= k {
        return content.to_string();
    }
    content.chars().take(k).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncates_content_to_k_chars() {
        let builder = ContextBuilder::new().with_truncate_chars(5);
        let ctx = builder.build(
            "Arsenal FC",
            EntityType::SportClub,
            &[],
            HopType::RfpPage,
            "Arsenal issues an RFP",
            0.5,
            &[],
            "0123456789",
            &[],
        );
        assert_eq!(ctx.fetched_content, "01234");
    }

    #[test]
    fn build_is_deterministic_for_fixed_inputs() {
        let builder = ContextBuilder::new();
        let a = builder.build(
            "Arsenal FC",
            EntityType::SportClub,
            &["tender".to_string()],
            HopType::RfpPage,
            "stmt",
            0.5,
            &["prior".to_string()],
            "content",
            &["pattern".to_string()],
        );
        let b = builder.build(
            "Arsenal FC",
            EntityType::SportClub,
            &["tender".to_string()],
            HopType::RfpPage,
            "stmt",
            0.5,
            &["prior".to_string()],
            "content",
            &["pattern".to_string()],
        );
        assert_eq!(builder.render_prompt(&a), builder.render_prompt(&b));
    }
}
