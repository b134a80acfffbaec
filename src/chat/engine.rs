use std::sync::Arc;

use anyhow::{Context, Result};
use bot_providers::{ChatMessage, ChatProvider, EmbedProvider};
use bot_types::{ChatTurn, MemoryDocument, MemoryStore, TurnStore};

use super::prompt;

/// 人格参数（配置展开后的只读副本）
#[derive(Debug, Clone)]
pub struct PersonaSettings {
    pub name: String,
    pub model: String,
    pub prompt_template: String,
    pub memory_label: String,
    pub memory_top_k: usize,
    pub history_size: usize,
    pub utc_offset_hours: i32,
}

/// 检索增强对话引擎
///
/// 一次 `chat` 调用：渲染人格提示词 → 语义记忆检索 → 近期窗口拼接 →
/// LLM 调用 → 回合双写（记忆库 + 日志）。引擎本身无共享可变状态，
/// 全部历史都在外部存储里，按 user_id 分区。
pub struct ChatEngine {
    persona: PersonaSettings,
    embedder: Arc<dyn EmbedProvider>,
    llm: Arc<dyn ChatProvider>,
    memory: Arc<dyn MemoryStore>,
    turns: Arc<dyn TurnStore>,
}

impl ChatEngine {
    pub fn new(
        persona: PersonaSettings,
        embedder: Arc<dyn EmbedProvider>,
        llm: Arc<dyn ChatProvider>,
        memory: Arc<dyn MemoryStore>,
        turns: Arc<dyn TurnStore>,
    ) -> Self {
        Self {
            persona,
            embedder,
            llm,
            memory,
            turns,
        }
    }

    /// 处理一条用户消息，返回回复文本
    ///
    /// 成功时恰好写入一条 ChatTurn 与一条 MemoryDocument，二者 user_id 相同。
    /// 任一外部调用失败则整次交互失败；两个存储之间不保证原子性。
    pub async fn chat(&self, user_input: &str, user_name: &str, user_id: &str) -> Result<String> {
        let messages = self.build_messages(user_input, user_name, user_id).await?;
        tracing::debug!(
            persona = %self.persona.name,
            user_id,
            message_count = messages.len(),
            "sending chat request"
        );

        let reply = self
            .llm
            .complete(&messages)
            .await
            .context("LLM chat request failed")?;
        tracing::info!(persona = %self.persona.name, user_id, "reply: {}", reply);

        self.persist(user_input, user_name, user_id, &reply).await?;
        Ok(reply)
    }

    async fn build_messages(
        &self,
        user_input: &str,
        user_name: &str,
        user_id: &str,
    ) -> Result<Vec<ChatMessage>> {
        let mut system = prompt::render_system_prompt(
            &self.persona.prompt_template,
            user_name,
            self.persona.utc_offset_hours,
        );

        if self.persona.memory_top_k > 0 {
            let vector = self.embedder.encode(user_input).await?;
            let hits = self
                .memory
                .search(vector, user_id, self.persona.memory_top_k)
                .await?;
            if !hits.is_empty() {
                system.push_str("\n\n");
                system.push_str(&prompt::render_memory_section(
                    &self.persona.memory_label,
                    &hits,
                    self.persona.utc_offset_hours,
                ));
            }
        }

        let mut messages = vec![ChatMessage::system(system)];

        if self.persona.history_size > 0 {
            let mut turns = self
                .turns
                .recent(user_id, self.persona.history_size)
                .await?;
            // 存储按时间倒序返回，提示词需要从旧到新
            turns.reverse();
            for turn in turns {
                messages.push(ChatMessage::user(turn.user_input));
                messages.push(ChatMessage::assistant(turn.response));
            }
        }

        messages.push(ChatMessage::user(user_input));
        Ok(messages)
    }

    async fn persist(
        &self,
        user_input: &str,
        user_name: &str,
        user_id: &str,
        reply: &str,
    ) -> Result<()> {
        let content =
            prompt::format_memory_text(user_name, user_input, &self.persona.name, reply);
        let vector = self.embedder.encode(&content).await?;
        let doc = MemoryDocument::new(user_id, content, vector);
        let turn = ChatTurn::new(&self.persona.model, user_id, user_input, reply);

        // 两个写入并发发起，且无论对方结果如何都会被执行到
        let (memory_result, turn_result) =
            tokio::join!(self.memory.insert(doc), self.turns.insert(turn));
        memory_result.context("Failed to insert memory document")?;
        turn_result.context("Failed to insert chat turn")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bot_providers::Role;
    use bot_types::MemoryHit;
    use chrono::{Duration, Utc};
    use std::sync::Mutex;

    const DIM: usize = 4;

    struct FakeEmbedder {
        calls: Mutex<usize>,
    }

    impl FakeEmbedder {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(0),
            })
        }

        fn call_count(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl EmbedProvider for FakeEmbedder {
        async fn encode(&self, _text: &str) -> Result<Vec<f32>> {
            *self.calls.lock().unwrap() += 1;
            Ok(vec![0.1; DIM])
        }

        async fn encode_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
            Ok(texts.iter().map(|_| vec![0.1; DIM]).collect())
        }

        fn dimension(&self) -> usize {
            DIM
        }
    }

    struct FakeLlm {
        calls: Mutex<Vec<Vec<ChatMessage>>>,
        reply: String,
        fail: bool,
    }

    impl FakeLlm {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                reply: reply.to_string(),
                fail: false,
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                calls: Mutex::new(Vec::new()),
                reply: String::new(),
                fail: true,
            })
        }

        fn calls(&self) -> Vec<Vec<ChatMessage>> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ChatProvider for FakeLlm {
        async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
            self.calls.lock().unwrap().push(messages.to_vec());
            if self.fail {
                anyhow::bail!("connection refused");
            }
            Ok(self.reply.clone())
        }
    }

    struct FakeMemoryStore {
        docs: Mutex<Vec<MemoryDocument>>,
    }

    impl FakeMemoryStore {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                docs: Mutex::new(Vec::new()),
            })
        }

        fn documents(&self) -> Vec<MemoryDocument> {
            self.docs.lock().unwrap().clone()
        }

        fn preload(&self, doc: MemoryDocument) {
            self.docs.lock().unwrap().push(doc);
        }
    }

    #[async_trait]
    impl MemoryStore for FakeMemoryStore {
        fn dimension(&self) -> usize {
            DIM
        }

        async fn count(&self) -> Result<usize> {
            Ok(self.docs.lock().unwrap().len())
        }

        async fn insert(&self, doc: MemoryDocument) -> Result<()> {
            self.docs.lock().unwrap().push(doc);
            Ok(())
        }

        async fn search(
            &self,
            _vector: Vec<f32>,
            user_id: &str,
            limit: usize,
        ) -> Result<Vec<MemoryHit>> {
            let docs = self.docs.lock().unwrap();
            Ok(docs
                .iter()
                .filter(|d| d.user_id == user_id)
                .take(limit)
                .map(|d| MemoryHit {
                    id: d.id.clone(),
                    content: d.content.clone(),
                    t: d.t,
                    score: Some(0.9),
                })
                .collect())
        }
    }

    struct FakeTurnStore {
        turns: Mutex<Vec<ChatTurn>>,
    }

    impl FakeTurnStore {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                turns: Mutex::new(Vec::new()),
            })
        }

        fn all(&self) -> Vec<ChatTurn> {
            self.turns.lock().unwrap().clone()
        }

        fn preload(&self, turn: ChatTurn) {
            self.turns.lock().unwrap().push(turn);
        }
    }

    #[async_trait]
    impl TurnStore for FakeTurnStore {
        async fn count(&self, user_id: &str) -> Result<usize> {
            Ok(self
                .turns
                .lock()
                .unwrap()
                .iter()
                .filter(|t| t.user_id == user_id)
                .count())
        }

        async fn insert(&self, turn: ChatTurn) -> Result<()> {
            self.turns.lock().unwrap().push(turn);
            Ok(())
        }

        async fn recent(&self, user_id: &str, limit: usize) -> Result<Vec<ChatTurn>> {
            let mut turns: Vec<ChatTurn> = self
                .turns
                .lock()
                .unwrap()
                .iter()
                .filter(|t| t.user_id == user_id)
                .cloned()
                .collect();
            turns.sort_by(|a, b| b.t.cmp(&a.t));
            turns.truncate(limit);
            Ok(turns)
        }
    }

    fn settings(memory_top_k: usize, history_size: usize) -> PersonaSettings {
        PersonaSettings {
            name: "mittens".to_string(),
            model: "mistral".to_string(),
            prompt_template: "You are Mittens. Your master is {user_name}.".to_string(),
            memory_label: "The following is your conversation with the user:".to_string(),
            memory_top_k,
            history_size,
            utc_offset_hours: 8,
        }
    }

    struct Harness {
        engine: ChatEngine,
        embedder: Arc<FakeEmbedder>,
        llm: Arc<FakeLlm>,
        memory: Arc<FakeMemoryStore>,
        turns: Arc<FakeTurnStore>,
    }

    fn harness(persona: PersonaSettings, llm: Arc<FakeLlm>) -> Harness {
        let embedder = FakeEmbedder::new();
        let memory = FakeMemoryStore::new();
        let turns = FakeTurnStore::new();
        let engine = ChatEngine::new(
            persona,
            embedder.clone(),
            llm.clone(),
            memory.clone(),
            turns.clone(),
        );
        Harness {
            engine,
            embedder,
            llm,
            memory,
            turns,
        }
    }

    fn turn_at(user_id: &str, input: &str, response: &str, age_secs: i64) -> ChatTurn {
        let mut turn = ChatTurn::new("mistral", user_id, input, response);
        turn.t = Utc::now() - Duration::seconds(age_secs);
        turn
    }

    #[tokio::test]
    async fn test_new_user_gets_system_and_input_only() {
        let h = harness(settings(10, 30), FakeLlm::new("4"));

        let reply = h.engine.chat("What is 2+2?", "Alice", "u1").await.unwrap();
        assert_eq!(reply, "4");

        let calls = h.llm.calls();
        assert_eq!(calls.len(), 1);
        let messages = &calls[0];
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::System);
        assert!(messages[0].content.contains("Your master is Alice"));
        // 无历史时不出现记忆段落
        assert!(!messages[0].content.contains("conversation with the user"));
        assert_eq!(messages[1], ChatMessage::user("What is 2+2?"));
    }

    #[tokio::test]
    async fn test_each_exchange_persists_one_turn_and_one_document() {
        let h = harness(settings(10, 30), FakeLlm::new("ok"));

        for i in 0..3 {
            h.engine
                .chat(&format!("message {}", i), "Alice", "u1")
                .await
                .unwrap();
        }

        let turns = h.turns.all();
        let docs = h.memory.documents();
        assert_eq!(turns.len(), 3);
        assert_eq!(docs.len(), 3);
        assert!(turns.iter().all(|t| t.user_id == "u1"));
        assert!(docs.iter().all(|d| d.user_id == "u1"));

        assert_eq!(turns[0].model, "mistral");
        assert_eq!(turns[0].user_input, "message 0");
        assert_eq!(turns[0].response, "ok");
        assert_eq!(docs[0].content, "Alice: message 0\nmittens: ok");
    }

    #[tokio::test]
    async fn test_memory_is_partitioned_by_user() {
        let h = harness(settings(10, 0), FakeLlm::new("ok"));
        h.memory.preload(MemoryDocument::new(
            "u2",
            "Bob: secret\nmittens: noted".to_string(),
            vec![0.1; DIM],
        ));

        h.engine.chat("hello", "Alice", "u1").await.unwrap();

        let system = &h.llm.calls()[0][0];
        assert!(!system.content.contains("secret"));
    }

    #[tokio::test]
    async fn test_memory_section_appended_to_system_prompt() {
        let h = harness(settings(10, 0), FakeLlm::new("ok"));
        h.memory.preload(MemoryDocument::new(
            "u1",
            "Alice: hi\nmittens: hello 😸".to_string(),
            vec![0.1; DIM],
        ));

        h.engine.chat("how are you", "Alice", "u1").await.unwrap();

        let system = &h.llm.calls()[0][0];
        assert!(system
            .content
            .contains("The following is your conversation with the user:"));
        assert!(system.content.contains("Alice: hi\nmittens: hello 😸"));
        assert!(system.content.contains("\t\t-- "));
    }

    #[tokio::test]
    async fn test_recency_window_is_chronological() {
        let h = harness(settings(0, 30), FakeLlm::new("ok"));
        h.turns.preload(turn_at("u1", "first question", "first answer", 60));
        h.turns.preload(turn_at("u1", "second question", "second answer", 30));

        h.engine.chat("third question", "Alice", "u1").await.unwrap();

        let messages = &h.llm.calls()[0];
        assert_eq!(messages.len(), 6);
        assert_eq!(messages[1], ChatMessage::user("first question"));
        assert_eq!(messages[2], ChatMessage::assistant("first answer"));
        assert_eq!(messages[3], ChatMessage::user("second question"));
        assert_eq!(messages[4], ChatMessage::assistant("second answer"));
        assert_eq!(messages[5], ChatMessage::user("third question"));
    }

    #[tokio::test]
    async fn test_recency_window_is_capped() {
        let h = harness(settings(0, 2), FakeLlm::new("ok"));
        for i in 0..5 {
            h.turns
                .preload(turn_at("u1", &format!("q{}", i), &format!("a{}", i), 100 - i));
        }

        h.engine.chat("now", "Alice", "u1").await.unwrap();

        let messages = &h.llm.calls()[0];
        // system + 2 轮窗口 + 当前输入
        assert_eq!(messages.len(), 6);
        assert_eq!(messages[1], ChatMessage::user("q3"));
        assert_eq!(messages[3], ChatMessage::user("q4"));
    }

    #[tokio::test]
    async fn test_second_call_sees_first_turn_once() {
        let h = harness(settings(0, 30), FakeLlm::new("4"));

        h.engine.chat("What is 2+2?", "Alice", "u1").await.unwrap();
        h.engine.chat("And 3+3?", "Alice", "u1").await.unwrap();

        let calls = h.llm.calls();
        let second = &calls[1];
        let occurrences = second
            .iter()
            .filter(|m| m.content == "What is 2+2?")
            .count();
        assert_eq!(occurrences, 1);
        assert_eq!(second.last().unwrap(), &ChatMessage::user("And 3+3?"));
    }

    #[tokio::test]
    async fn test_llm_failure_persists_nothing() {
        let h = harness(settings(10, 30), FakeLlm::failing());

        let result = h.engine.chat("hello", "Alice", "u1").await;
        assert!(result.is_err());
        assert!(h.turns.all().is_empty());
        assert!(h.memory.documents().is_empty());
    }

    #[tokio::test]
    async fn test_disabled_memory_skips_retrieval_embedding() {
        let h = harness(settings(0, 30), FakeLlm::new("ok"));

        h.engine.chat("hello", "Alice", "u1").await.unwrap();

        // 仅持久化阶段编码一次，检索阶段不调用 embedding
        assert_eq!(h.embedder.call_count(), 1);
        assert_eq!(h.memory.documents().len(), 1);
    }
}
