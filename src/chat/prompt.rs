use bot_types::MemoryHit;
use chrono::{DateTime, FixedOffset, Utc};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// 渲染人格系统提示词：替换 {user_name} 与 {time} 占位符
pub fn render_system_prompt(template: &str, user_name: &str, utc_offset_hours: i32) -> String {
    let now = Utc::now().with_timezone(&offset(utc_offset_hours));
    template
        .replace("{user_name}", user_name)
        .replace("{time}", &now.format(TIME_FORMAT).to_string())
}

/// 记忆段落：引导语 + 每条 "内容\n\t\t-- 时间"，空行分隔，保持检索返回顺序
pub fn render_memory_section(label: &str, hits: &[MemoryHit], utc_offset_hours: i32) -> String {
    let entries: Vec<String> = hits
        .iter()
        .map(|hit| {
            let t = to_local(hit.t, utc_offset_hours).format(TIME_FORMAT);
            format!("{}\n\t\t-- {}", hit.content, t)
        })
        .collect();

    format!("{}\n{}", label, entries.join("\n\n"))
}

/// 写入向量库的记忆文本：一问一答各占一行
pub fn format_memory_text(user_name: &str, user_input: &str, persona: &str, reply: &str) -> String {
    format!("{}: {}\n{}: {}", user_name, user_input, persona, reply)
}

fn offset(hours: i32) -> FixedOffset {
    FixedOffset::east_opt(hours.clamp(-23, 23) * 3600).expect("clamped offset is always valid")
}

fn to_local(t: DateTime<Utc>, utc_offset_hours: i32) -> DateTime<FixedOffset> {
    t.with_timezone(&offset(utc_offset_hours))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_system_prompt_substitutes_placeholders() {
        let rendered = render_system_prompt("Hi {user_name}, now is {time}.", "Alice", 8);
        assert!(rendered.starts_with("Hi Alice, now is 2"));
        assert!(!rendered.contains("{user_name}"));
        assert!(!rendered.contains("{time}"));
    }

    #[test]
    fn test_render_system_prompt_without_placeholders() {
        let template = "You are a cat butler.";
        assert_eq!(render_system_prompt(template, "Alice", 8), template);
    }

    #[test]
    fn test_render_memory_section_format() {
        let hits = vec![
            MemoryHit {
                id: "1".to_string(),
                content: "Alice: hi\nbot: hello".to_string(),
                t: Utc::now(),
                score: Some(0.9),
            },
            MemoryHit {
                id: "2".to_string(),
                content: "Alice: bye\nbot: see you".to_string(),
                t: Utc::now(),
                score: Some(0.8),
            },
        ];

        let section = render_memory_section("以下是你與使用者的對話:", &hits, 8);
        assert!(section.starts_with("以下是你與使用者的對話:\n"));
        assert!(section.contains("Alice: hi\nbot: hello\n\t\t-- "));
        // 条目之间空行分隔，顺序保持检索结果顺序
        let first = section.find("Alice: hi").unwrap();
        let second = section.find("Alice: bye").unwrap();
        assert!(first < second);
        assert!(section.contains("\n\n"));
    }

    #[test]
    fn test_format_memory_text() {
        assert_eq!(
            format_memory_text("Alice", "What is 2+2?", "mittens", "4 😸"),
            "Alice: What is 2+2?\nmittens: 4 😸"
        );
    }
}
