//! Tests for the workflow engine.

use super::*;
use crate::agents::{ContentGenerator, ImageGenerator};
use crate::domain::failure::CollaboratorError;
use crate::domain::types::{PostType, Preferences};
use crate::state::Termination;
use crate::state_machine::REVISION_LIMIT_REASON;
use crate::strategy::SingleShotStrategy;
use crate::testing::{FixedImage, FnGenerator, RecordingPublisher};
use proptest::prelude::*;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

const TOPIC: &str = "Our team shipped a new search index";

struct Harness {
    engine: WorkflowEngine,
    strategy: SingleShotStrategy,
    generator: FnGenerator,
    publisher: RecordingPublisher,
    logger: Arc<StructuredLogger>,
}

fn post_generator() -> FnGenerator {
    let revisions = Arc::new(AtomicUsize::new(0));
    FnGenerator::new(move |request| match request.purpose.as_str() {
        "generate" => Ok(r#"{"content": "We shipped a new search index.", "hashtags": ["AI"], "image_prompt": "an index"}"#.to_string()),
        "revise" => {
            let n = revisions.fetch_add(1, Ordering::SeqCst) + 1;
            Ok(format!(r#"{{"content": "Revision {} of the post.", "hashtags": ["AI"]}}"#, n))
        }
        other => Err(CollaboratorError::permanent("llm", format!("unexpected {}", other))),
    })
}

fn harness_with(generator: FnGenerator, images: Vec<FixedImage>, publisher: RecordingPublisher) -> Harness {
    let shared: Arc<dyn ContentGenerator> = Arc::new(generator.clone());
    let chain = ImageProviderChain::new(
        images
            .into_iter()
            .map(|p| Arc::new(p) as Arc<dyn ImageGenerator>)
            .collect(),
    );
    Harness {
        engine: WorkflowEngine::new(chain, Arc::new(publisher.clone())),
        strategy: SingleShotStrategy::new(shared.clone(), shared),
        generator,
        publisher,
        logger: Arc::new(StructuredLogger::discard("test")),
    }
}

fn harness() -> Harness {
    harness_with(post_generator(), Vec::new(), RecordingPublisher::new())
}

fn new_state(include_image: bool) -> WorkflowState {
    WorkflowState::new(TOPIC, PostType::AiNews, Preferences::default(), include_image, 2)
}

impl Harness {
    async fn start(&self, include_image: bool) -> WorkflowState {
        self.engine
            .start(new_state(include_image), &self.strategy, self.logger.clone())
            .await
            .expect("start")
    }

    async fn resume(&self, state: WorkflowState, approved: bool, feedback: &str) -> Result<WorkflowState, WorkflowError> {
        self.engine
            .resume(
                state,
                Decision::from_input(approved, Some(feedback)),
                &self.strategy,
                self.logger.clone(),
            )
            .await
    }
}

#[tokio::test]
async fn test_start_without_image_awaits_approval() {
    let h = harness();
    let state = h.start(false).await;

    assert_eq!(state.phase, Phase::AwaitingApproval);
    let draft = state.draft.as_ref().expect("draft");
    assert!(!draft.content.is_empty());
    assert_eq!(draft.image_prompt, None);
    assert_eq!(state.image_path, None);
    assert_eq!(state.revision_count, 0);
}

#[tokio::test]
async fn test_start_with_image_uses_provider_chain() {
    let providers = vec![
        FixedImage::failing("a"),
        FixedImage::failing("b"),
        FixedImage::succeeding("c", "/tmp/c.png"),
    ];
    let h = harness_with(post_generator(), providers.clone(), RecordingPublisher::new());

    let state = h.start(true).await;

    assert_eq!(state.phase, Phase::AwaitingApproval);
    assert_eq!(state.image_path, Some(PathBuf::from("/tmp/c.png")));
    let calls: usize = providers.iter().map(FixedImage::calls).sum();
    assert_eq!(calls, 3);
}

#[tokio::test]
async fn test_image_failure_is_not_fatal() {
    let h = harness_with(
        post_generator(),
        vec![FixedImage::failing("a")],
        RecordingPublisher::new(),
    );
    let state = h.start(true).await;
    assert_eq!(state.phase, Phase::AwaitingApproval);
    assert_eq!(state.image_path, None);
    assert!(state.error.is_none());
}

#[tokio::test]
async fn test_missing_image_prompt_skips_image_step() {
    let generator = FnGenerator::new(|_| Ok(r#"{"content": "No picture here.", "hashtags": ["AI"]}"#.to_string()));
    let image = FixedImage::succeeding("a", "/tmp/a.png");
    let h = harness_with(generator, vec![image.clone()], RecordingPublisher::new());

    let state = h.start(true).await;
    assert_eq!(state.phase, Phase::AwaitingApproval);
    assert_eq!(state.image_path, None);
    assert_eq!(image.calls(), 0);
}

#[tokio::test]
async fn test_generation_failure_terminates_with_error() {
    let generator = FnGenerator::new(|_| Err(CollaboratorError::permanent("llm", "invalid api key")));
    let h = harness_with(generator, Vec::new(), RecordingPublisher::new());

    let state = h.start(false).await;
    let Some(Termination::Error { message }) = state.termination() else {
        panic!("expected error termination, got {}", state.phase);
    };
    assert!(message.starts_with("Content generation failed:"));
    assert!(message.contains("invalid api key"));
    assert_eq!(state.error.as_deref(), Some(message.as_str()));
}

#[tokio::test]
async fn test_revise_returns_to_approval_with_new_draft() {
    let h = harness();
    let state = h.start(false).await;

    let state = h.resume(state, false, "too long").await.expect("resume");

    assert_eq!(state.phase, Phase::AwaitingApproval);
    assert_eq!(state.revision_count, 1);
    assert_eq!(
        state.draft.as_ref().map(|d| d.content.as_str()),
        Some("Revision 1 of the post.")
    );
    assert!(state.approval_decision.is_none());
    assert_eq!(h.generator.calls_for("generate"), 1);
    assert_eq!(h.generator.calls_for("revise"), 1);
}

#[tokio::test]
async fn test_revision_reruns_image_step() {
    let image = FixedImage::succeeding("a", "/tmp/a.png");
    let h = harness_with(post_generator(), vec![image.clone()], RecordingPublisher::new());

    let state = h.start(true).await;
    let state = h.resume(state, false, "different angle").await.expect("resume");

    assert_eq!(state.phase, Phase::AwaitingApproval);
    assert_eq!(image.calls(), 2);
}

#[tokio::test]
async fn test_empty_feedback_rejects() {
    let h = harness();
    let state = h.start(false).await;

    let state = h.resume(state, false, "").await.expect("resume");

    assert!(state.is_rejected());
    assert!(!state.posted);
    assert!(state.error.is_none());
    assert!(h.publisher.posts().is_empty());
}

#[tokio::test]
async fn test_revision_limit_rejects() {
    let h = harness();
    let mut state = h.start(false).await;
    for _ in 0..2 {
        state = h.resume(state, false, "again").await.expect("resume");
        assert_eq!(state.phase, Phase::AwaitingApproval);
    }
    assert_eq!(state.revision_count, 2);

    let state = h.resume(state, false, "once more").await.expect("resume");
    assert_eq!(
        state.termination(),
        Some(&Termination::Rejected {
            reason: REVISION_LIMIT_REASON.to_string()
        })
    );
    assert_eq!(state.revision_count, 2);
    assert_eq!(h.generator.calls_for("revise"), 2);
}

#[tokio::test]
async fn test_approve_publishes_once() {
    let h = harness();
    let state = h.start(false).await;

    let state = h.resume(state, true, "").await.expect("resume");

    assert!(state.posted);
    assert!(matches!(state.termination(), Some(Termination::Success { .. })));
    let posts = h.publisher.posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].text, "We shipped a new search index.\n\n#AI");

    let err = h.resume(state, true, "").await.expect_err("already published");
    assert!(matches!(err, WorkflowError::InvalidTransition { .. }));
    assert_eq!(h.publisher.posts().len(), 1);
}

#[tokio::test]
async fn test_publish_failure_is_terminal() {
    let h = harness_with(
        post_generator(),
        Vec::new(),
        RecordingPublisher::failing(CollaboratorError::permanent("linkedin", "token expired")),
    );
    let state = h.start(false).await;

    let state = h.resume(state, true, "").await.expect("resume");

    let Some(Termination::Error { message }) = state.termination() else {
        panic!("expected error termination");
    };
    assert!(message.starts_with("Publishing failed:"));
    assert!(!state.posted);
}

#[tokio::test]
async fn test_revision_failure_is_terminal() {
    let generator = FnGenerator::new(|request| match request.purpose.as_str() {
        "generate" => Ok(r#"{"content": "Draft.", "hashtags": ["AI"]}"#.to_string()),
        _ => Err(CollaboratorError::transient("llm", "503 after retries")),
    });
    let h = harness_with(generator, Vec::new(), RecordingPublisher::new());
    let state = h.start(false).await;

    let state = h.resume(state, false, "shorter").await.expect("resume");

    let Some(Termination::Error { message }) = state.termination() else {
        panic!("expected error termination");
    };
    assert!(message.starts_with("Revision failed:"));
    assert_eq!(state.revision_count, 0);
}

#[tokio::test]
async fn test_resume_requires_awaiting_approval() {
    let h = harness();
    let err = h
        .resume(new_state(false), true, "")
        .await
        .expect_err("not awaiting approval");
    assert!(matches!(err, WorkflowError::InvalidTransition { .. }));
    assert!(h.publisher.posts().is_empty());
}

#[tokio::test]
async fn test_start_requires_fresh_state() {
    let h = harness();
    let state = h.start(false).await;
    let err = h
        .engine
        .start(state, &h.strategy, h.logger.clone())
        .await
        .expect_err("already started");
    assert!(matches!(err, WorkflowError::InvalidTransition { .. }));
}

#[derive(Debug, Clone)]
enum Step {
    Approve,
    Reject,
    Revise,
}

fn step() -> impl Strategy<Value = Step> {
    prop_oneof![
        1 => Just(Step::Approve),
        1 => Just(Step::Reject),
        4 => Just(Step::Revise),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn revision_count_never_exceeds_limit(
        steps in prop::collection::vec(step(), 0..8),
        max_revisions in 0u32..4,
        include_image in any::<bool>(),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("runtime");
        runtime.block_on(async {
            let h = harness_with(
                post_generator(),
                vec![FixedImage::succeeding("a", "/tmp/a.png")],
                RecordingPublisher::new(),
            );
            let initial = WorkflowState::new(TOPIC, PostType::AiNews, Preferences::default(), include_image, max_revisions);
            let mut state = h
                .engine
                .start(initial, &h.strategy, h.logger.clone())
                .await
                .expect("start");
            prop_assert_eq!(&state.phase, &Phase::AwaitingApproval);

            for step in steps {
                if state.is_terminal() {
                    break;
                }
                let (approved, feedback) = match step {
                    Step::Approve => (true, ""),
                    Step::Reject => (false, ""),
                    Step::Revise => (false, "tighten it"),
                };
                state = h.resume(state, approved, feedback).await.expect("resume");
                prop_assert!(state.revision_count <= max_revisions);
                prop_assert!(
                    state.phase == Phase::AwaitingApproval || state.is_terminal(),
                    "returned intermediate phase {}", state.phase
                );
                if state.posted {
                    let succeeded = matches!(state.termination(), Some(Termination::Success { .. }));
                    prop_assert!(succeeded, "posted without a success termination");
                }
            }
            prop_assert!(h.publisher.posts().len() <= 1);
            Ok::<(), TestCaseError>(())
        })?;
    }
}
