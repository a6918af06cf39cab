//! Question answering over the built index: retrieve, then generate.
//!
//! [`Pipeline`] is the one object a caller holds. It is built once at startup
//! (see [`Pipeline::initialize`]) and answers any number of questions through
//! `&self`, so it can be shared between concurrent callers.

use tracing::debug;

use crate::chunks::Chunk;
use crate::prompt::{format_context, PromptTemplate, QA_PROMPT};
use crate::provider::{Embedder, GenerationError, Generator};
use crate::store::{IndexError, VectorIndex, DEFAULT_TOP_K};

/// Output of the retrieve step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retrieval {
    pub question: String,
    /// Retrieved chunks, nearest first. May be empty.
    pub context: Vec<Chunk>,
}

/// A fully answered question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryState {
    pub question: String,
    pub context: Vec<Chunk>,
    /// The generator's response, verbatim.
    pub answer: String,
}

pub struct Pipeline<E, G> {
    index: VectorIndex<E>,
    generator: G,
    template: PromptTemplate,
    top_k: usize,
}

impl<E: Embedder, G: Generator> Pipeline<E, G> {
    /// Wrap an index (normally already built) and a generator, with the fixed QA prompt.
    pub fn new(index: VectorIndex<E>, generator: G) -> Self {
        Self {
            index,
            generator,
            template: QA_PROMPT,
            top_k: DEFAULT_TOP_K,
        }
    }

    /// Chunks retrieved per question.
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    pub fn index(&self) -> &VectorIndex<E> {
        &self.index
    }

    pub fn generator(&self) -> &G {
        &self.generator
    }

    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Find the chunks nearest to `question`. Blank questions are rejected before any provider call.
    pub async fn retrieve(&self, question: &str) -> Result<Retrieval, PipelineError> {
        if question.trim().is_empty() {
            return Err(PipelineError::EmptyQuestion);
        }
        let hits = self.index.query(question, self.top_k).await?;
        debug!(
            question_chars = question.chars().count(),
            hits = hits.len(),
            nearest = ?hits.first().map(|h| h.distance),
            "Retrieved context"
        );
        Ok(Retrieval {
            question: question.to_string(),
            context: hits.into_iter().map(|h| h.chunk.clone()).collect(),
        })
    }

    /// The exact prompt [`generate`](Self::generate) sends for `retrieval`.
    pub fn render_prompt(&self, retrieval: &Retrieval) -> String {
        let context = format_context(&retrieval.context);
        self.template.render(&[
            ("context", context.as_str()),
            ("question", retrieval.question.as_str()),
        ])
    }

    /// Ask the generator. The response becomes the answer unchanged.
    pub async fn generate(&self, retrieval: Retrieval) -> Result<QueryState, PipelineError> {
        let prompt = self.render_prompt(&retrieval);
        let answer = self.generator.generate(&prompt).await?;
        debug!(
            prompt_chars = prompt.chars().count(),
            answer_chars = answer.chars().count(),
            "Generated answer"
        );
        Ok(QueryState {
            question: retrieval.question,
            context: retrieval.context,
            answer,
        })
    }

    /// Retrieve then generate, keeping the intermediate context.
    pub async fn ask(&self, question: &str) -> Result<QueryState, PipelineError> {
        let retrieval = self.retrieve(question).await?;
        self.generate(retrieval).await
    }

    /// Answer one question.
    pub async fn answer(&self, question: &str) -> Result<String, PipelineError> {
        Ok(self.ask(question).await?.answer)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("question must not be empty")]
    EmptyQuestion,
    #[error(transparent)]
    Index(#[from] IndexError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunks::{chunk_pages, ChunkConfig};
    use crate::document::{load_pdf, Page};
    use crate::ollama::OllamaClient;
    use crate::provider::EmbeddingError;
    use crate::test_support::{pdf_bytes, FailingGenerator, RecordingGenerator, UnreachableEmbedder, VocabEmbedder};

    const LANGGRAPH: &str = "LangGraph is a library for building stateful agent workflows.";

    fn three_pages() -> Vec<Page> {
        vec![
            Page::new(0, "This guide starts with the weather. Rain is expected on most days, so plan ahead. ".repeat(4)),
            Page::new(1, format!("Chapter two. {LANGGRAPH} It is covered in depth below.")),
            Page::new(2, "Cooking notes: boil the pasta, then prepare the sauce slowly. ".repeat(4)),
        ]
    }

    async fn pipeline_over(pages: &[Page], reply: &str) -> Pipeline<VocabEmbedder, RecordingGenerator> {
        let chunks = chunk_pages(pages, &ChunkConfig::new(120, 20).unwrap());
        let mut index = VectorIndex::new(VocabEmbedder::default());
        index.build(chunks).await.unwrap();
        Pipeline::new(index, RecordingGenerator::new(reply))
    }

    #[tokio::test]
    async fn retrieves_the_answering_chunk_and_prompts_with_it() {
        let pipeline = pipeline_over(&three_pages(), "LangGraph é uma biblioteca.").await;
        assert!(pipeline.index().len() > DEFAULT_TOP_K);

        let state = pipeline.ask("What is LangGraph?").await.unwrap();
        assert!(state.context.len() <= DEFAULT_TOP_K);
        let hit = state
            .context
            .iter()
            .find(|c| c.text.contains(LANGGRAPH))
            .expect("chunk with the LangGraph sentence is retrieved");
        assert_eq!(hit.page, 1);
        assert_eq!(state.context[0], *hit);

        let prompts = pipeline.generator().prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains(&hit.text));
        assert!(prompts[0].contains("What is LangGraph?"));
        assert_eq!(state.answer, "LangGraph é uma biblioteca.");
    }

    #[tokio::test]
    async fn answers_from_a_three_page_pdf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("langgraph_guide.pdf");
        std::fs::write(
            &path,
            pdf_bytes(
                &[
                    "This guide starts with the weather and the rain.",
                    LANGGRAPH,
                    "Cooking notes: boil the pasta, then prepare the sauce.",
                ],
                true,
            ),
        )
        .unwrap();

        let pages = load_pdf(&path).unwrap();
        assert_eq!(pages.len(), 3);
        let pipeline = pipeline_over(&pages, "LangGraph é uma biblioteca.").await;

        let state = pipeline.ask("What is LangGraph?").await.unwrap();
        let hit = state
            .context
            .iter()
            .find(|c| c.text.contains(LANGGRAPH))
            .expect("chunk with the LangGraph sentence is retrieved");
        assert_eq!(hit.page, 1);

        let prompts = pipeline.generator().prompts();
        assert!(prompts[0].contains(&hit.text));
        assert!(prompts[0].contains("What is LangGraph?"));
    }

    #[tokio::test]
    async fn context_is_joined_in_retrieved_order() {
        let pipeline = pipeline_over(&three_pages(), "ok").await;
        let retrieval = pipeline.retrieve("What is LangGraph?").await.unwrap();
        let prompt = pipeline.render_prompt(&retrieval);
        let joined = retrieval
            .context
            .iter()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        assert!(prompt.contains(&format!("Context:\n{joined}\n\nQuestion: What is LangGraph?")));
    }

    #[tokio::test]
    async fn answer_is_returned_verbatim() {
        let reply = "  Não sei.\n\n[^1] ";
        let pipeline = pipeline_over(&three_pages(), reply).await;
        assert_eq!(pipeline.answer("What is LangGraph?").await.unwrap(), reply);
    }

    #[tokio::test]
    async fn blank_question_fails_before_any_provider_call() {
        let pipeline = pipeline_over(&three_pages(), "unused").await;
        let build_calls = pipeline.index().embedder().calls();
        for q in ["", "   ", "\n\t"] {
            assert!(matches!(pipeline.answer(q).await, Err(PipelineError::EmptyQuestion)));
        }
        assert_eq!(pipeline.index().embedder().calls(), build_calls);
        assert!(pipeline.generator().prompts().is_empty());
    }

    #[tokio::test]
    async fn empty_index_still_prompts_the_generator() {
        let pipeline = pipeline_over(&[], "Não sei.").await;
        let state = pipeline.ask("What is LangGraph?").await.unwrap();
        assert!(state.context.is_empty());
        assert_eq!(state.answer, "Não sei.");
        let prompts = pipeline.generator().prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("Context:\n\n\nQuestion: What is LangGraph?"));
    }

    #[tokio::test]
    async fn failed_build_never_yields_an_answer() {
        let chunks = chunk_pages(&three_pages(), &ChunkConfig::default());
        let mut index = VectorIndex::new(UnreachableEmbedder);
        assert!(matches!(
            index.build(chunks).await,
            Err(IndexError::Embedding(EmbeddingError::Request(_)))
        ));

        let pipeline = Pipeline::new(index, RecordingGenerator::new("hallucination"));
        for _ in 0..2 {
            assert!(matches!(
                pipeline.answer("What is LangGraph?").await,
                Err(PipelineError::Index(IndexError::NotBuilt))
            ));
        }
        assert!(pipeline.generator().prompts().is_empty());
    }

    #[tokio::test]
    async fn generation_failure_is_surfaced() {
        let mut index = VectorIndex::new(VocabEmbedder::default());
        index
            .build(chunk_pages(&three_pages(), &ChunkConfig::default()))
            .await
            .unwrap();
        let pipeline = Pipeline::new(index, FailingGenerator);
        assert!(matches!(
            pipeline.answer("What is LangGraph?").await,
            Err(PipelineError::Generation(_))
        ));
        // The index is unaffected; retrieval still works.
        assert!(!pipeline.retrieve("What is LangGraph?").await.unwrap().context.is_empty());
    }

    #[tokio::test]
    async fn top_k_bounds_context() {
        let pipeline = pipeline_over(&three_pages(), "ok").await.with_top_k(1);
        let state = pipeline.ask("What is LangGraph?").await.unwrap();
        assert_eq!(state.context.len(), 1);
        assert!(state.context[0].text.contains(LANGGRAPH));
    }

    #[test]
    fn shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Pipeline<OllamaClient, OllamaClient>>();
    }
}
