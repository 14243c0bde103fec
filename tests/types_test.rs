use ollama_relay::{ChatResponse, Message, ModelCategory, ModelSummary, Role};
use serde_json::json;

#[test]
fn test_message_constructors() {
    let sys = Message::system("You are helpful");
    assert!(matches!(sys.role, Role::System));

    let user = Message::user("Hello");
    assert!(matches!(user.role, Role::User));

    let asst = Message::assistant("Hi there!");
    assert!(matches!(asst.role, Role::Assistant));
}

#[test]
fn test_message_wire_format() {
    let encoded = serde_json::to_value(Message::user("hi")).unwrap();
    assert_eq!(encoded, json!({ "role": "user", "content": "hi" }));
}

#[test]
fn test_chat_response_defaults() {
    let resp: ChatResponse = serde_json::from_value(json!({
        "message": { "role": "assistant", "content": "Paris." }
    }))
    .unwrap();
    assert_eq!(resp.content(), "Paris.");
    assert!(resp.done);
    assert!(resp.model.is_none());
    assert_eq!(resp.eval_count, 0);
}

// ============================================================================
// Model summary helpers
// ============================================================================

#[test]
fn test_size_human() {
    assert_eq!(ModelSummary::new("m").size_human(), "Unknown");
    assert_eq!(ModelSummary::new("m").with_size(512).size_human(), "512.0 B");
    assert_eq!(ModelSummary::new("m").with_size(1536).size_human(), "1.5 KB");
    assert_eq!(
        ModelSummary::new("m").with_size(4_109_853_696).size_human(),
        "3.8 GB"
    );
}

#[test]
fn test_categories() {
    let cat = |name: &str| ModelSummary::new(name).category();
    assert_eq!(cat("llama3.2:latest"), ModelCategory::Llama);
    assert_eq!(cat("codellama:13b"), ModelCategory::Llama);
    assert_eq!(cat("mistral:7b-instruct"), ModelCategory::Mistral);
    assert_eq!(cat("vicuna:13b"), ModelCategory::Vicuna);
    assert_eq!(cat("alpaca"), ModelCategory::Alpaca);
    assert_eq!(cat("phi3:mini"), ModelCategory::Other);
    assert_eq!(ModelCategory::Llama.to_string(), "LLaMA Family");
}

#[test]
fn test_capabilities() {
    let caps = ModelSummary::new("deepseek-coder:6.7b-instruct").capabilities();
    assert_eq!(
        caps,
        vec!["Text Generation", "Code Generation", "Instruction Following"]
    );
    assert_eq!(ModelSummary::new("phi3").capabilities(), vec!["Text Generation"]);
}

#[test]
fn test_summary_tolerates_extra_fields() {
    let summary: ModelSummary = serde_json::from_value(json!({
        "name": "llama3.2:latest",
        "size": 2019393189u64,
        "details": { "family": "llama", "parameter_size": "3.2B" }
    }))
    .unwrap();
    assert_eq!(summary.name, "llama3.2:latest");
    assert!(summary.digest.is_empty());
}
