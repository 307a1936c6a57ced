//! RAG prompt construction.
//!
//! Prompts are XML-structured: delimited context blocks give the model
//! clear section boundaries and make "answer only from the documents"
//! instructions enforceable.

use crate::chunking::Chunk;

#[derive(Debug, Clone, Default)]
pub struct PromptBuilder;

impl PromptBuilder {
    pub fn new() -> Self {
        Self
    }

    /// Build the grounded prompt: system role, retrieved documents,
    /// usage instructions, then the question.
    pub fn build_rag_prompt(&self, question: &str, chunks: &[Chunk]) -> String {
        let documents = build_documents_section(chunks);

        format!(
            "<system>\n\
             You are a helpful assistant that answers questions based on provided documentation.\n\
             Your goal is to give accurate, concise answers using only the information provided.\n\
             </system>\n\n\
             {documents}\n\n\
             <instructions>\n\
             - Answer the user's question using ONLY the information from the documents above\n\
             - If the documentation doesn't contain the answer, say \"I don't have information about that in the documentation\"\n\
             - Be concise and helpful\n\
             - When relevant, mention which document section supports your answer\n\
             - If multiple documents are relevant, synthesize the information into a coherent answer\n\
             </instructions>\n\n\
             <question>\n\
             {question}\n\
             </question>\n\n\
             Please provide your answer:"
        )
    }
}

fn build_documents_section(chunks: &[Chunk]) -> String {
    let documents = chunks
        .iter()
        .enumerate()
        .map(|(i, chunk)| {
            let heading = chunk.metadata.heading.as_deref().unwrap_or("No heading");
            format!(
                "  <document id=\"{}\" heading=\"{}\" source=\"{}\">\n{}\n  </document>",
                i + 1,
                escape_xml(heading),
                escape_xml(&chunk.metadata.source),
                escape_xml(chunk.text.trim()),
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    format!("<documents>\n{documents}\n</documents>")
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::ChunkMetadata;

    fn chunk(text: &str, heading: Option<&str>) -> Chunk {
        Chunk {
            id: "doc.md-chunk-0".to_string(),
            text: text.to_string(),
            metadata: ChunkMetadata {
                source: "doc.md".to_string(),
                heading: heading.map(str::to_string),
                index: 0,
            },
        }
    }

    #[test]
    fn prompt_embeds_question_and_context() {
        let prompt = PromptBuilder::new().build_rag_prompt(
            "How do I install?",
            &[chunk("Run the installer.", Some("Install"))],
        );

        assert!(prompt.contains("<question>\nHow do I install?\n</question>"));
        assert!(prompt.contains("heading=\"Install\""));
        assert!(prompt.contains("source=\"doc.md\""));
        assert!(prompt.contains("Run the installer."));
        assert!(prompt.contains("<instructions>"));
    }

    #[test]
    fn chunk_text_is_xml_escaped() {
        let prompt = PromptBuilder::new()
            .build_rag_prompt("q", &[chunk("use <tag> & \"quotes\"", None)]);

        assert!(prompt.contains("use &lt;tag&gt; &amp; &quot;quotes&quot;"));
        assert!(!prompt.contains("use <tag>"));
    }

    #[test]
    fn documents_are_numbered_in_retrieval_order() {
        let prompt = PromptBuilder::new().build_rag_prompt(
            "q",
            &[chunk("first", None), chunk("second", None)],
        );

        let first = prompt.find("id=\"1\"").unwrap();
        let second = prompt.find("id=\"2\"").unwrap();
        assert!(first < second);
    }

    #[test]
    fn missing_heading_gets_a_placeholder() {
        let prompt = PromptBuilder::new().build_rag_prompt("q", &[chunk("body", None)]);
        assert!(prompt.contains("heading=\"No heading\""));
    }
}
