//! kbchat RAG - retrieval-augmented answering
//!
//! Clients for the generative and embedding models, vector index backends (Pinecone and
//! in-memory), the retrieval chain, and the [`AnswerOrchestrator`] that decides between the
//! knowledge-base path and the generative fallback.

pub mod chain;
pub mod embeddings;
mod http;
pub mod llm_client;
pub mod orchestrator;
pub mod pinecone;
pub mod retriever;

pub use chain::*;
pub use embeddings::*;
pub use llm_client::*;
pub use orchestrator::*;
pub use pinecone::*;
pub use retriever::*;
