//! End-to-end pipeline tests with in-process collaborators.
//!
//! Loading, chunking, indexing, retrieval, synthesis and the REPL run for
//! real; only the embedding and completion backends are replaced.

use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use engine_rag::core::chunk::ChunkParams;
use engine_rag::core::embedding::Embedder;
use engine_rag::core::llm::{ChatMessage, Completion};
use engine_rag::core::query::QuerySettings;
use engine_rag::core::{Corpus, QueryMode, RagError};
use engine_rag::loader::SourceFilter;
use engine_rag::session::{run_repl, spawn_line_reader, Session, SessionSettings};
use tempfile::TempDir;

const KEYWORDS: [&str; 5] = ["order", "fill", "book", "snapshot", "class"];

/// Bag-of-keywords embedder with a constant bias dimension.
struct KeywordEmbedder {
    fail: AtomicBool,
}

impl KeywordEmbedder {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            fail: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keywords"
    }

    fn dims(&self) -> usize {
        KEYWORDS.len() + 1
    }

    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("embedding service unavailable");
        }
        Ok(texts
            .iter()
            .map(|t| {
                let lower = t.to_lowercase();
                let mut v: Vec<f32> = KEYWORDS
                    .iter()
                    .map(|k| lower.matches(k).count() as f32)
                    .collect();
                v.push(1.0);
                v
            })
            .collect())
    }
}

/// Completion backend that numbers its answers and records every prompt.
#[derive(Default)]
struct ScriptedLlm {
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl Completion for ScriptedLlm {
    fn model_name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let prompt = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        self.prompts.lock().unwrap().push(prompt);
        Ok(format!("answer #{}", n))
    }
}

struct Fixture {
    _tmp: TempDir,
    trace: PathBuf,
    src: PathBuf,
    agent: PathBuf,
}

fn fixture() -> Fixture {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let trace = root.join("instrumentation.log");
    let mut log = String::new();
    for i in 0..40 {
        log.push_str(&format!(
            "ORDER_IN orderId={} side=BUY qty=10\nCALL OrderBook.match\nEXEC_REPORT orderId={} status=FILLED\n",
            i, i
        ));
    }
    log.push_str("SNAPSHOT bids=0 asks=3\n");
    fs::write(&trace, log).unwrap();

    let src = root.join("src/main/java/com/matching");
    fs::create_dir_all(src.join("book")).unwrap();
    fs::write(
        src.join("book/OrderBook.java"),
        "public class OrderBook {\n  // price-time priority order book\n  void match(Order o) {}\n}\n",
    )
    .unwrap();
    fs::write(
        src.join("MatchingEngine.java"),
        "public class MatchingEngine {\n  void onOrder(Order o) { book.match(o); }\n}\n",
    )
    .unwrap();
    fs::write(src.join("README.md"), "not java").unwrap();

    let agent = root.join("agent/src/main/java/com/matching");

    Fixture {
        _tmp: tmp,
        trace,
        src,
        agent,
    }
}

fn settings() -> SessionSettings {
    SessionSettings {
        chunk_params: ChunkParams::new(400, 40).unwrap(),
        embed_batch_size: 8,
        query: QuerySettings {
            top_k: 5,
            context_window_chars: 32_000,
        },
    }
}

fn java() -> SourceFilter {
    SourceFilter::new(&["java".to_string()], &[], "java").unwrap()
}

fn session() -> (Session, Arc<KeywordEmbedder>, Arc<ScriptedLlm>) {
    let embedder = KeywordEmbedder::new();
    let llm = Arc::new(ScriptedLlm::default());
    let session = Session::new(embedder.clone(), llm.clone(), settings());
    (session, embedder, llm)
}

#[tokio::test]
async fn test_missing_source_dir_is_skipped() {
    let fx = fixture();
    let (mut session, _, _) = session();

    // The agent directory was never created.
    let summary = session
        .index_source_code(&[fx.src.clone(), fx.agent.clone()], &java())
        .await
        .unwrap();

    assert_eq!(summary.corpus, Corpus::Code);
    assert_eq!(summary.documents, 2);
    let index = session.index(Corpus::Code).unwrap();
    assert_eq!(index.document_count(), 2);
    assert!(index.chunk_count() >= 2);
}

#[tokio::test]
async fn test_no_source_dirs_is_empty_corpus() {
    let fx = fixture();
    let (mut session, _, _) = session();

    let err = session
        .index_source_code(&[fx.agent.clone()], &java())
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::EmptyCorpus { corpus: Corpus::Code }));
    assert!(session.index(Corpus::Code).is_none());

    let err = session.index_source_code(&[], &java()).await.unwrap_err();
    assert!(matches!(err, RagError::EmptyCorpus { .. }));
}

#[tokio::test]
async fn test_query_before_and_after_indexing() {
    let fx = fixture();
    let (mut session, _, llm) = session();

    let err = session
        .ask(QueryMode::Instrumentation, "What was filled?")
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RagError::NotIndexed {
            corpus: Corpus::Instrumentation
        }
    ));
    assert_eq!(llm.calls.load(Ordering::SeqCst), 0);

    session.index_instrumentation(&fx.trace).await.unwrap();
    let answer = session
        .ask(QueryMode::Instrumentation, "What was filled?")
        .await
        .unwrap();
    assert!(!answer.is_empty());

    let prompts = llm.prompts.lock().unwrap();
    let last = prompts.last().unwrap();
    assert!(last.contains("What was filled?"));
    assert!(last.contains("EXEC_REPORT"));
}

#[tokio::test]
async fn test_both_requires_both_indices() {
    let fx = fixture();
    let (mut session, _, llm) = session();
    session.index_instrumentation(&fx.trace).await.unwrap();
    assert!(!session.is_ready());

    let err = session.ask(QueryMode::Both, "why?").await.unwrap_err();
    assert!(matches!(err, RagError::NotIndexed { corpus: Corpus::Code }));
    assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_both_synthesizes_per_corpus_answers() {
    let fx = fixture();
    let (mut session, _, llm) = session();
    session.index_instrumentation(&fx.trace).await.unwrap();
    session
        .index_source_code(&[fx.src.clone()], &java())
        .await
        .unwrap();
    assert!(session.is_ready());

    let merged = session
        .ask(QueryMode::Both, "Why was order 7 filled?")
        .await
        .unwrap();

    // One grounded call per corpus, then the synthesis call.
    let prompts = llm.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 3);
    assert_eq!(merged, "answer #3");
    assert!(prompts[0].contains("Context information from the instrumentation log"));
    assert!(prompts[1].contains("Context information from the source code"));

    let synthesis = &prompts[2];
    assert!(synthesis.contains("Why was order 7 filled?"));
    assert!(synthesis.contains("answer #1"));
    assert!(synthesis.contains("answer #2"));
}

#[tokio::test]
async fn test_reindexing_is_idempotent() {
    let fx = fixture();
    let (mut session, _, _) = session();

    session.index_instrumentation(&fx.trace).await.unwrap();
    let first = session.index(Corpus::Instrumentation).unwrap().spans().to_vec();

    session.index_instrumentation(&fx.trace).await.unwrap();
    let second = session.index(Corpus::Instrumentation).unwrap().spans().to_vec();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_failed_rebuild_leaves_corpus_unindexed() {
    let fx = fixture();
    let (mut session, embedder, _) = session();
    session.index_instrumentation(&fx.trace).await.unwrap();

    embedder.fail.store(true, Ordering::SeqCst);
    let err = session.index_instrumentation(&fx.trace).await.unwrap_err();
    assert!(matches!(err, RagError::IndexBuild { .. }));
    assert!(session.index(Corpus::Instrumentation).is_none());

    embedder.fail.store(false, Ordering::SeqCst);
    session.index_instrumentation(&fx.trace).await.unwrap();
    assert!(session.index(Corpus::Instrumentation).is_some());

    // A failed load discards the previous index too.
    let err = session
        .index_instrumentation(&fx.trace.with_file_name("missing.log"))
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::NotFound(_)));
    assert!(session.index(Corpus::Instrumentation).is_none());

    session
        .index_source_code(&[fx.src.clone()], &java())
        .await
        .unwrap();
    let err = session
        .index_source_code(&[fx.agent.clone()], &java())
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::EmptyCorpus { .. }));
    assert!(session.index(Corpus::Code).is_none());
}

#[tokio::test]
async fn test_repl_reports_errors_and_continues() {
    let fx = fixture();
    let (mut session, _, llm) = session();
    session.index_instrumentation(&fx.trace).await.unwrap();

    let input = "\n   \n/code How is the book sorted?\n/instr What was filled?\n/both \n/help\n/quit\n/instr never asked\n";
    let mut out = Vec::new();
    run_repl(&session, spawn_line_reader(input.as_bytes()), &mut out)
        .await
        .unwrap();
    let out = String::from_utf8(out).unwrap();

    assert!(out.contains("Error: source code not indexed"));
    assert!(out.contains("answer #1"));
    assert!(out.contains("Please provide a question"));
    assert!(out.contains("/instr <query>"));
    assert!(out.trim_end().ends_with("Goodbye!"));
    assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_repl_ends_on_eof() {
    let (session, _, llm) = session();
    let mut out = Vec::new();
    run_repl(&session, spawn_line_reader(&b""[..]), &mut out)
        .await
        .unwrap();
    let out = String::from_utf8(out).unwrap();
    assert!(out.contains("Goodbye!"));
    assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_repl_survives_invalid_utf8_line() {
    let (session, _, llm) = session();
    let input: &'static [u8] = b"/instr caf\xe9?\n/help\n/quit\n";
    let mut out = Vec::new();

    run_repl(&session, spawn_line_reader(input), &mut out)
        .await
        .unwrap();
    let out = String::from_utf8(out).unwrap();

    // The undecodable line is still a query; it fails on the missing index.
    assert!(out.contains("Error: instrumentation log not indexed"));
    assert!(out.contains("/instr <query>"));
    assert!(out.trim_end().ends_with("Goodbye!"));
    assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
}

const INTERRUPT_CHILD_ENV: &str = "ERAG_INTERRUPT_CHILD";

/// Session body for `test_interrupt_while_waiting_ends_process`; a no-op
/// unless started by it.
#[tokio::test]
async fn interrupt_child_session() {
    if std::env::var_os(INTERRUPT_CHILD_ENV).is_none() {
        return;
    }
    let (session, _, _) = session();
    let lines = spawn_line_reader(std::io::BufReader::new(std::io::stdin()));
    run_repl(&session, lines, &mut std::io::stdout())
        .await
        .unwrap();
}

#[cfg(unix)]
#[test]
fn test_interrupt_while_waiting_ends_process() {
    use std::io::Read;
    use std::process::{Command, Stdio};
    use std::time::{Duration, Instant};

    let mut child = Command::new(std::env::current_exe().unwrap())
        .args(["--exact", "interrupt_child_session", "--nocapture", "--test-threads=1"])
        .env(INTERRUPT_CHILD_ENV, "1")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .unwrap();

    // Held open so the session blocks waiting for input.
    let _stdin = child.stdin.take().unwrap();
    let mut stdout = child.stdout.take().unwrap();
    let seen = Arc::new(Mutex::new(Vec::new()));
    let reader = {
        let seen = seen.clone();
        std::thread::spawn(move || {
            let mut buf = [0u8; 256];
            while let Ok(n) = stdout.read(&mut buf) {
                if n == 0 {
                    break;
                }
                seen.lock().unwrap().extend_from_slice(&buf[..n]);
            }
        })
    };
    let output = || String::from_utf8_lossy(&seen.lock().unwrap()).to_string();

    let deadline = Instant::now() + Duration::from_secs(30);
    while !output().contains("query> ") {
        assert!(Instant::now() < deadline, "session never prompted: {}", output());
        std::thread::sleep(Duration::from_millis(20));
    }
    std::thread::sleep(Duration::from_millis(300));

    let sent = Command::new("kill")
        .args(["-INT", &child.id().to_string()])
        .status()
        .unwrap();
    assert!(sent.success());

    let deadline = Instant::now() + Duration::from_secs(10);
    let status = loop {
        if let Some(status) = child.try_wait().unwrap() {
            break status;
        }
        if Instant::now() >= deadline {
            child.kill().ok();
            panic!("session still running 10s after SIGINT: {}", output());
        }
        std::thread::sleep(Duration::from_millis(50));
    };
    reader.join().unwrap();

    assert!(status.success(), "status={:?} output={}", status, output());
    assert!(output().contains("Goodbye!"));
}
