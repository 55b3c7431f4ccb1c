//! Prompt templates sent to the generation provider.

/// System prompt for the relevance judge.
pub const RELEVANCE_SYSTEM_PROMPT: &str = "You are a relevance grader. Rate the relevance of the \
following document to the query on a scale of 0-10. Return ONLY the number.";

/// System prompt for answers grounded in retrieved context.
pub const GROUNDED_SYSTEM_PROMPT: &str = "You are a helpful assistant answering questions about \
a provided text. Answer the question based ONLY on the context provided. If the answer is not \
in the context, say so.";

/// Reply used when reranking leaves no usable context.
pub const NO_CONTEXT_FALLBACK: &str =
    "I couldn't find relevant information in the knowledge base to answer that.";

/// Separator placed between context chunks.
const CONTEXT_SEPARATOR: &str = "\n---\n";

/// User prompt asking the judge to score one document.
pub fn relevance_prompt(query: &str, document: &str) -> String {
    format!("Query: {query}\nDocument: {document}")
}

/// User prompt carrying the retrieved context and the question.
pub fn grounded_prompt<'a>(context: impl IntoIterator<Item = &'a str>, question: &str) -> String {
    let context = context.into_iter().collect::<Vec<_>>().join(CONTEXT_SEPARATOR);
    format!("Context:\n{context}\n\nQuestion: {question}")
}
