use std::sync::Arc;
use uuid::Uuid;

use crate::config::settings::{LlmConfig, RagConfig};
use crate::database::Repository;
use crate::services::embedding::Embedder;
use crate::services::llm::LlmClient;
use crate::services::natural_language::NaturalLanguageFilter;
use crate::services::reranker::Reranker;
use crate::store::{SearchResult, VectorStore};
use crate::utils::ApiError;

const NO_DOCUMENTS_REPLY: &str =
    "Bạn chưa tải lên tài liệu nào. Vui lòng tải lên tài liệu để tôi có thể hỗ trợ bạn tra cứu thông tin.";
const NO_RELEVANT_INFO_REPLY: &str =
    "Xin lỗi, tôi không tìm thấy thông tin liên quan đến câu hỏi của bạn trong các tài liệu hiện có.";

const INCOMPLETENESS_SUFFIXES: &[&str] = &["như sau:", "như sau", "bao gồm:", "bao gồm", "cụ thể:", "cụ thể", "gồm:"];

const GROUNDING_PROMPT_TEMPLATE: &str = r#"Bạn là trợ lý tra cứu văn bản hành chính. Dựa vào các tài liệu tham khảo dưới đây, hãy trả lời câu hỏi của người dùng một cách chính xác và đầy đủ.

Tài liệu tham khảo:
{context}

Câu hỏi: {question}

Quy tắc trả lời:
1. Chỉ sử dụng thông tin có trong tài liệu tham khảo ở trên.
2. Trả lời đầy đủ, không bỏ dở câu trả lời giữa chừng.
3. Nếu liệt kê nhiều mục, hãy liệt kê tất cả các mục liên quan, không chỉ một phần.
4. Trình bày rõ ràng, có thể dùng gạch đầu dòng hoặc danh sách khi phù hợp.
5. Trích dẫn số trang hoặc tên tài liệu khi có thể.
6. Nếu không tìm thấy thông tin liên quan trong tài liệu, hãy trả lời rằng bạn không tìm thấy thông tin đó."#;

pub struct AnswerResponse {
    pub reply: String,
    pub chat_session_id: String,
}

pub struct Answerer {
    store: Arc<VectorStore>,
    embedder: Arc<dyn Embedder>,
    reranker: Arc<dyn Reranker>,
    llm: Arc<dyn LlmClient>,
    repository: Arc<Repository>,
    nl_filter: NaturalLanguageFilter,
    rag: RagConfig,
    max_tokens: usize,
    retry_max_tokens: usize,
}

impl Answerer {
    pub fn new(
        store: Arc<VectorStore>,
        embedder: Arc<dyn Embedder>,
        reranker: Arc<dyn Reranker>,
        llm: Arc<dyn LlmClient>,
        repository: Arc<Repository>,
        rag: RagConfig,
        llm_config: &LlmConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            reranker,
            llm,
            repository,
            nl_filter: NaturalLanguageFilter::new(),
            rag,
            max_tokens: llm_config.max_tokens,
            retry_max_tokens: llm_config.retry_max_tokens,
        }
    }

    pub async fn answer(
        &self,
        user_id: i64,
        question: &str,
        chat_session_id: Option<String>,
        selected_file: Option<String>,
    ) -> Result<AnswerResponse, ApiError> {
        let session_id = self.ensure_session(user_id, chat_session_id, question).await?;

        if let Some(matched) = self.nl_filter.classify(question) {
            let reply = matched.reply().to_string();
            self.persist_turn(&session_id, question, &reply).await;
            return Ok(AnswerResponse { reply, chat_session_id: session_id });
        }

        if self.store.get_stats(user_id).chunk_count == 0 {
            self.persist_turn(&session_id, question, NO_DOCUMENTS_REPLY).await;
            return Ok(AnswerResponse {
                reply: NO_DOCUMENTS_REPLY.to_string(),
                chat_session_id: session_id,
            });
        }

        let query_vector = self
            .embedder
            .encode(&[question.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::Internal("embedder returned no vector for query".to_string()))?;

        let initial = self
            .store
            .search(&query_vector, self.rag.search_top_k, selected_file.as_deref(), user_id);

        if initial.is_empty() {
            let mut reply = NO_RELEVANT_INFO_REPLY.to_string();
            if let Some(file) = &selected_file {
                reply.push_str(&format!(" (tài liệu đã chọn: {file})"));
            }
            self.persist_turn(&session_id, question, &reply).await;
            return Ok(AnswerResponse { reply, chat_session_id: session_id });
        }

        let expanded = self.store.get_adjacent(&initial, self.rag.adjacency_page_range, user_id);
        let reranked = self.reranker.rerank(question, expanded, self.rag.rerank_top_k).await;

        let context = build_context(&reranked);
        let prompt = GROUNDING_PROMPT_TEMPLATE
            .replace("{context}", &context)
            .replace("{question}", question);

        let reply = self.generate_with_retry(&prompt, &context).await;

        self.persist_turn(&session_id, question, &reply).await;
        Ok(AnswerResponse { reply, chat_session_id: session_id })
    }

    async fn generate_with_retry(&self, prompt: &str, context: &str) -> String {
        match self.llm.generate(prompt, 0.1, self.max_tokens).await {
            Ok(first) => {
                if !looks_incomplete(&first) {
                    return first;
                }
                match self.llm.generate(prompt, 0.1, self.retry_max_tokens).await {
                    Ok(second) if second.chars().count() > first.chars().count() => second,
                    _ => first,
                }
            }
            Err(_) => format!(
                "Không thể kết nối tới mô hình ngôn ngữ lúc này. Dưới đây là nội dung tài liệu liên quan:\n\n{context}"
            ),
        }
    }

    async fn ensure_session(
        &self,
        user_id: i64,
        chat_session_id: Option<String>,
        question: &str,
    ) -> Result<String, ApiError> {
        if let Some(id) = chat_session_id {
            return Ok(id);
        }

        let id = Uuid::new_v4().to_string();
        let title = default_title(question);
        self.repository.create_chat_session(&id, user_id, &title).await?;
        Ok(id)
    }

    async fn persist_turn(&self, session_id: &str, question: &str, reply: &str) {
        if let Err(e) = self.repository.save_chat_turn(session_id, "user", question).await {
            tracing::error!(error = %e, "failed to persist user turn");
        }
        if let Err(e) = self.repository.save_chat_turn(session_id, "assistant", reply).await {
            tracing::error!(error = %e, "failed to persist assistant turn");
        }
        if let Err(e) = self
            .repository
            .update_chat_session(session_id, Some(&default_title(question)), 1)
            .await
        {
            tracing::error!(error = %e, "failed to update chat session");
        }
    }
}

fn default_title(question: &str) -> String {
    let trimmed = question.trim();
    if trimmed.chars().count() > 60 {
        trimmed.chars().take(57).collect::<String>() + "..."
    } else {
        trimmed.to_string()
    }
}

fn looks_incomplete(reply: &str) -> bool {
    let trimmed = reply.trim();
    if INCOMPLETENESS_SUFFIXES.iter().any(|suffix| trimmed.ends_with(suffix)) {
        return true;
    }
    let line_count = trimmed.lines().count();
    trimmed.ends_with(':') && line_count < 3
}

/// Groups reranked chunks by (filename, page), sorted ascending, joining
/// chunk texts within a group with a space and groups with `\n\n---\n\n`.
fn build_context(results: &[SearchResult]) -> String {
    use std::collections::BTreeMap;

    let mut groups: BTreeMap<(String, i32), Vec<&str>> = BTreeMap::new();
    for result in results {
        groups
            .entry((result.metadata.filename.clone(), result.metadata.page_number))
            .or_default()
            .push(result.metadata.text.as_str());
    }

    groups
        .into_iter()
        .map(|((filename, page), texts)| {
            let joined = texts
                .iter()
                .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
                .collect::<Vec<_>>()
                .join(" ");
            format!("[{filename} - trang {page}]\n{joined}")
        })
        .collect::<Vec<_>>()
        .join("\n\n---\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::ChunkMetadata;

    fn result(filename: &str, page: i32, chunk_id: i32, text: &str) -> SearchResult {
        SearchResult {
            metadata: ChunkMetadata {
                filename: filename.to_string(),
                user_id: 1,
                page_number: page,
                chunk_id,
                text: text.to_string(),
            },
            score: 0.0,
        }
    }

    #[test]
    fn incompleteness_detects_trailing_markers() {
        assert!(looks_incomplete("Các giấy tờ cần thiết bao gồm:"));
        assert!(looks_incomplete("Chi tiết như sau"));
        assert!(!looks_incomplete("Đây là câu trả lời đầy đủ."));
    }

    #[test]
    fn incompleteness_detects_bare_trailing_colon_on_short_reply() {
        assert!(looks_incomplete("Một dòng ngắn:"));
        assert!(!looks_incomplete("Dòng một.\nDòng hai.\nDòng ba:"));
    }

    #[test]
    fn context_groups_by_filename_and_page_sorted() {
        let results = vec![
            result("b.pdf", 1, 0, "nội dung b"),
            result("a.pdf", 2, 0, "nội dung a trang 2"),
            result("a.pdf", 1, 0, "nội dung a trang 1"),
        ];
        let context = build_context(&results);
        let a1_pos = context.find("a.pdf - trang 1").unwrap();
        let a2_pos = context.find("a.pdf - trang 2").unwrap();
        let b_pos = context.find("b.pdf - trang 1").unwrap();
        assert!(a1_pos < a2_pos);
        assert!(a2_pos < b_pos);
    }
}
