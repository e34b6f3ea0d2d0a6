/// Answer synthesis: prompt construction around retrieved passages and the
/// call out to a language model.
///
/// The model is a collaborator. Any failure on its side, or an empty reply,
/// becomes [`Answer::Unavailable`] instead of an error.
pub mod ollama;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;
use tracing::warn;

use crate::error::Result;
use crate::retrieval::Retriever;
use crate::store::models::Passage;

const PROMPT_HEADER: &str = "Use the excerpts below (with page numbers) to answer the question. \
If the answer is not present, say so.\n\n";

#[derive(Error, Debug)]
pub enum SynthError {
    #[error("generation request failed: {0}")]
    RequestFailed(String),

    #[error("invalid generation response: {0}")]
    InvalidResponse(String),
}

/// A text generation backend bound to one statically configured model.
pub trait Synthesizer: Send + Sync {
    fn synthesize(&self, prompt: &str) -> std::result::Result<String, SynthError>;

    /// Model identifier fixed at construction.
    fn model(&self) -> &str;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Answered { text: String, pages: Vec<u32> },
    /// Retrieval found nothing to ground an answer in.
    NoContext,
    /// The model failed or returned nothing.
    Unavailable,
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Answer::Answered { text, pages } => {
                let pages: Vec<String> = pages.iter().map(u32::to_string).collect();
                write!(f, "{text}\n\n[Sourced pages: {}]", pages.join(", "))
            }
            Answer::NoContext => write!(f, "No document context found for that question."),
            Answer::Unavailable => write!(f, "No answer available right now."),
        }
    }
}

/// Prompt with every passage tagged by page, followed by the question.
pub fn build_prompt(question: &str, passages: &[Passage]) -> String {
    let mut prompt = String::from(PROMPT_HEADER);
    for p in passages {
        prompt.push_str(&format!("Page {}:\n{}\n---\n", p.page_number, p.text));
    }
    prompt.push_str(&format!("\nQuestion: {question}\nAnswer:"));
    prompt
}

/// Sorted, deduplicated page numbers for citation.
pub fn cited_pages(passages: &[Passage]) -> Vec<u32> {
    passages
        .iter()
        .map(|p| p.page_number)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Retrieve `k` passages for `question` and ask the model to answer from them.
///
/// Only retrieval errors propagate; model failures degrade to
/// [`Answer::Unavailable`].
pub async fn answer_question(
    retriever: &Retriever,
    synthesizer: Arc<dyn Synthesizer>,
    question: &str,
    k: usize,
) -> Result<Answer> {
    let passages = retriever.retrieve(question, k).await?;
    if passages.is_empty() {
        return Ok(Answer::NoContext);
    }

    let prompt = build_prompt(question, &passages);
    let model = synthesizer.model().to_string();
    let reply = tokio::task::spawn_blocking(move || synthesizer.synthesize(&prompt)).await;

    let text = match reply {
        Ok(Ok(text)) if !text.trim().is_empty() => text.trim().to_string(),
        Ok(Ok(_)) => {
            warn!(model = %model, "model returned an empty answer");
            return Ok(Answer::Unavailable);
        }
        Ok(Err(e)) => {
            warn!(model = %model, "answer generation failed: {e}");
            return Ok(Answer::Unavailable);
        }
        Err(e) => {
            warn!(model = %model, "answer generation task failed: {e}");
            return Ok(Answer::Unavailable);
        }
    };

    Ok(Answer::Answered {
        text,
        pages: cited_pages(&passages),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::Embedder;
    use crate::embedder::mock::MockEmbedder;
    use crate::indexer::chunker::Chunker;
    use crate::indexer::core::Indexer;
    use crate::store::models::Page;
    use crate::store::{Store, StorePaths};
    use std::sync::Mutex;
    use tempfile::tempdir;

    struct Canned {
        reply: std::result::Result<String, String>,
        prompts: Mutex<Vec<String>>,
    }

    impl Canned {
        fn new(reply: std::result::Result<&str, &str>) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.map(str::to_string).map_err(str::to_string),
                prompts: Mutex::new(Vec::new()),
            })
        }
    }

    impl Synthesizer for Canned {
        fn synthesize(&self, prompt: &str) -> std::result::Result<String, SynthError> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            self.reply.clone().map_err(SynthError::RequestFailed)
        }

        fn model(&self) -> &str {
            "canned"
        }
    }

    fn passage(page: u32, text: &str) -> Passage {
        Passage {
            document_id: "doc".to_string(),
            page_number: page,
            text: text.to_string(),
            distance: 0.0,
        }
    }

    async fn retriever_with(pages: &[Page]) -> (tempfile::TempDir, Retriever) {
        let dir = tempdir().unwrap();
        let store = Store::open(StorePaths::in_dir(dir.path()))
            .unwrap()
            .into_shared();
        let embedder: Arc<dyn Embedder> = Arc::new(MockEmbedder::new(64));
        if !pages.is_empty() {
            Indexer::new(store.clone(), embedder.clone(), Chunker::default())
                .ingest("doc", pages)
                .await
                .unwrap();
        }
        (dir, Retriever::new(store, embedder))
    }

    #[test]
    fn test_build_prompt() {
        let prompt = build_prompt("What colour?", &[passage(3, "It is blue."), passage(1, "Sky")]);
        assert!(prompt.starts_with("Use the excerpts below"));
        assert!(prompt.contains("Page 3:\nIt is blue.\n---\n"));
        assert!(prompt.find("Page 3").unwrap() < prompt.find("Page 1").unwrap());
        assert!(prompt.ends_with("Question: What colour?\nAnswer:"));
    }

    #[test]
    fn test_cited_pages_sorted_unique() {
        let passages = [passage(4, "a"), passage(2, "b"), passage(4, "c")];
        assert_eq!(cited_pages(&passages), vec![2, 4]);
    }

    #[test]
    fn test_display() {
        let answer = Answer::Answered {
            text: "Blue.".to_string(),
            pages: vec![1, 3],
        };
        assert_eq!(answer.to_string(), "Blue.\n\n[Sourced pages: 1, 3]");
    }

    #[tokio::test]
    async fn test_answer_from_passages() {
        let (_dir, retriever) =
            retriever_with(&[Page::new(1, "The reactor runs at 300 kelvin.")]).await;
        let synth = Canned::new(Ok("  300 kelvin.  "));

        let answer = answer_question(&retriever, synth.clone(), "reactor temperature", 5)
            .await
            .unwrap();
        assert_eq!(
            answer,
            Answer::Answered {
                text: "300 kelvin.".to_string(),
                pages: vec![1]
            }
        );
        let prompts = synth.prompts.lock().unwrap();
        assert!(prompts[0].contains("The reactor runs at 300 kelvin."));
    }

    #[tokio::test]
    async fn test_no_context() {
        let (_dir, retriever) = retriever_with(&[]).await;
        let synth = Canned::new(Ok("unused"));
        let answer = answer_question(&retriever, synth.clone(), "anything", 5)
            .await
            .unwrap();
        assert_eq!(answer, Answer::NoContext);
        assert!(synth.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_model_failure_is_not_fatal() {
        let (_dir, retriever) = retriever_with(&[Page::new(1, "Some text.")]).await;

        let failing = Canned::new(Err("quota exceeded"));
        let answer = answer_question(&retriever, failing, "text", 5).await.unwrap();
        assert_eq!(answer, Answer::Unavailable);

        let empty = Canned::new(Ok("   "));
        let answer = answer_question(&retriever, empty, "text", 5).await.unwrap();
        assert_eq!(answer, Answer::Unavailable);
    }
}
